//! Glob patterns translated to regular expressions.
//!
//! Supported syntax: `*` (within one path segment), `**` (any depth), `?`
//! (one character). Matching is case-insensitive and anchored at a segment
//! boundary, so `*.rs` matches `src/main.rs` and `src/**/*.rs` matches
//! `crates/x/src/a/b.rs`.

use regex_lite::Regex;
use rivet_core::error::ToolError;

pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?i)(?:^|/)");
    let mut rest = pattern.trim_start_matches("./");
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("**/") {
            out.push_str("(?:.*/)?");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = tail;
        } else {
            match c {
                '*' => out.push_str("[^/]*"),
                '?' => out.push_str("[^/]"),
                other => out.push_str(&regex_lite::escape(other.encode_utf8(&mut [0; 4]))),
            }
            rest = &rest[c.len_utf8()..];
        }
    }
    out.push('$');
    out
}

pub fn compile_glob(pattern: &str) -> Result<Regex, ToolError> {
    Regex::new(&glob_to_regex(pattern))
        .map_err(|e| ToolError::InvalidArguments(format!("Invalid pattern '{pattern}': {e}")))
}
