//! Rewrite logical file references in a generated command into real paths.
//!
//! Pure string rewrite: relative `-i` inputs move under the input root, a
//! relative output (the last positional argument) moves under the output
//! root. Options, absolute paths and URLs are left alone. `{input_dir}` and
//! `{output_dir}` placeholders are expanded after rooting, so a token that
//! names its root explicitly is never rooted twice. A command that cannot be
//! tokenized only gets its placeholders expanded.
use crate::config::PathEnv;
use std::path::Path;

const INPUT_DIR_PLACEHOLDER: &str = "{input_dir}";
const OUTPUT_DIR_PLACEHOLDER: &str = "{output_dir}";

/// FFmpeg options that take no value; every other option consumes the next
/// token.
const VALUELESS_OPTIONS: &[&str] = &[
    "-y",
    "-n",
    "-an",
    "-vn",
    "-sn",
    "-dn",
    "-shortest",
    "-hide_banner",
    "-nostdin",
    "-stats",
    "-nostats",
    "-copyts",
    "-re",
];

pub fn resolve_paths(command: &str, env: &PathEnv) -> String {
    let Ok(mut tokens) = shell_words::split(command) else {
        return expand_placeholders(command, env);
    };

    let mut changed = false;
    if let Some(input_dir) = &env.input_dir {
        for idx in 1..tokens.len() {
            if tokens[idx - 1] == "-i" && is_relative_file(&tokens[idx]) {
                tokens[idx] = input_dir.join(&tokens[idx]).display().to_string();
                changed = true;
            }
        }
    }

    if let Some(output_dir) = &env.output_dir {
        if let Some(idx) = output_position(&tokens) {
            if is_relative_file(&tokens[idx]) {
                tokens[idx] = output_dir.join(&tokens[idx]).display().to_string();
                changed = true;
            }
        }
    }

    for token in tokens.iter_mut() {
        let expanded = expand_placeholders(token, env);
        if expanded != *token {
            *token = expanded;
            changed = true;
        }
    }

    if changed {
        shell_words::join(&tokens)
    } else {
        command.to_string()
    }
}

fn expand_placeholders(text: &str, env: &PathEnv) -> String {
    let mut expanded = text.to_string();
    if let Some(dir) = &env.input_dir {
        expanded = expanded.replace(INPUT_DIR_PLACEHOLDER, &dir.display().to_string());
    }
    if let Some(dir) = &env.output_dir {
        expanded = expanded.replace(OUTPUT_DIR_PLACEHOLDER, &dir.display().to_string());
    }
    expanded
}

fn is_option(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

fn takes_value(option: &str) -> bool {
    is_option(option) && !VALUELESS_OPTIONS.contains(&option)
}

/// Index of the last positional argument after the program name.
fn output_position(tokens: &[String]) -> Option<usize> {
    (1..tokens.len())
        .rev()
        .find(|&idx| !is_option(&tokens[idx]) && !takes_value(&tokens[idx - 1]))
}

fn is_relative_file(token: &str) -> bool {
    if token.is_empty() || token.starts_with('-') {
        return false;
    }
    if token.contains("://") || token.starts_with("pipe:") {
        return false;
    }
    if token.contains(INPUT_DIR_PLACEHOLDER) || token.contains(OUTPUT_DIR_PLACEHOLDER) {
        return false;
    }
    !Path::new(token).is_absolute()
}
