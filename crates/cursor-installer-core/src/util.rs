//! Small helpers shared by the engine and the binary.

use std::env;
use std::path::Path;

const LOG_LINE_LIMIT: usize = 240;

/// Check whether a program exists in $PATH.
pub fn program_in_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Sanitizes a log string by stripping carriage returns and newlines and capping length.
pub fn sanitize_log_value(value: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    let mut cleaned = String::with_capacity(max_len.min(value.len()));
    let mut count = 0usize;
    let mut truncated = false;
    for ch in value.chars() {
        match ch {
            '\r' => continue,
            '\n' => cleaned.push(' '),
            _ => cleaned.push(ch),
        }
        count += 1;
        if count >= max_len {
            truncated = true;
            break;
        }
    }
    let trimmed = cleaned.trim_end();
    if truncated {
        format!("{trimmed}...")
    } else {
        trimmed.to_string()
    }
}

/// Produces a log pane line with the default cap.
pub fn log_snippet(value: &str) -> String {
    sanitize_log_value(value, LOG_LINE_LIMIT)
}
