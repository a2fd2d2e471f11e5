//! Tool-call extraction from generated text.
//!
//! Grammar, one block per call:
//!
//! ```text
//! <tool_call>
//! name: write_file
//! arguments:
//!   path: notes.txt
//!   content: |
//!     first line
//!     second line
//! </tool_call>
//! ```
//!
//! Parsing is line-oriented and tolerant. Lines that are not `key: value`
//! are skipped. A block without a `name:` line is not a call and is
//! dropped from the text. A final block whose closing marker is missing
//! still counts when it names a tool, since backends usually stop on the
//! closing marker and leave it out.

use rivet_core::tool::{TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
use rivet_core::{ToolArgs, ToolCall, ToolResult};

/// Calls found in one response plus the prose around them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub calls: Vec<ToolCall>,
    /// Response text with call blocks and stray markers removed, trimmed
    pub text: String,
}

/// Assigns `call_<n>` ids; one parser lives for one submitted message.
#[derive(Debug, Default)]
pub struct ToolCallParser {
    next_id: usize,
}

impl ToolCallParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, response: &str) -> ParsedResponse {
        let (blocks, text) = scan(response);
        let calls = blocks
            .into_iter()
            .map(|(name, arguments)| {
                let id = format!("call_{}", self.next_id);
                self.next_id += 1;
                ToolCall {
                    id,
                    name,
                    arguments,
                }
            })
            .collect();
        ParsedResponse { calls, text }
    }

    pub fn reset(&mut self) {
        self.next_id = 0;
    }
}

/// Remove call blocks and stray markers, leaving the prose.
pub fn strip_markers(text: &str) -> String {
    scan(text).1
}

/// Render a turn's results as the single Tool message fed back to the model.
pub fn format_tool_results(outcomes: &[(ToolCall, ToolResult)]) -> String {
    let mut out = String::from("Tool Results:\n");
    for (call, result) in outcomes {
        out.push_str(&format!("\n### {} (id: {})\n", call.name, call.id));
        if result.success {
            out.push_str("Status: Success\nOutput:\n");
            out.push_str(&result.output);
            out.push('\n');
        } else {
            out.push_str("Status: Failed\n");
            out.push_str(&format!(
                "Error: {}\n",
                result.error.as_deref().unwrap_or("unknown error")
            ));
            if !result.output.is_empty() {
                out.push_str("Output:\n");
                out.push_str(&result.output);
                out.push('\n');
            }
        }
    }
    out
}

fn scan(text: &str) -> (Vec<(String, ToolArgs)>, String) {
    let mut blocks = Vec::new();
    let mut prose = String::new();
    let mut rest = text;

    while let Some(open) = rest.find(TOOL_CALL_OPEN) {
        prose.push_str(&rest[..open]);
        let after = &rest[open + TOOL_CALL_OPEN.len()..];
        let close = after.find(TOOL_CALL_CLOSE);
        let reopen = after.find(TOOL_CALL_OPEN);

        // an opening marker followed by another before any close is stray
        if let Some(r) = reopen
            && close.is_none_or(|c| r < c)
        {
            rest = after;
            continue;
        }

        match close {
            Some(c) => {
                if let Some(block) = parse_block(&after[..c]) {
                    blocks.push(block);
                }
                rest = &after[c + TOOL_CALL_CLOSE.len()..];
            }
            None => {
                match parse_block(after) {
                    Some(block) => blocks.push(block),
                    None => prose.push_str(after),
                }
                rest = "";
            }
        }
    }
    prose.push_str(rest);

    let text = prose.replace(TOOL_CALL_CLOSE, "").trim().to_string();
    (blocks, text)
}

/// Parse the inside of one block into a tool name and its arguments.
fn parse_block(body: &str) -> Option<(String, ToolArgs)> {
    let lines: Vec<&str> = body.lines().collect();
    let mut name: Option<String> = None;
    let mut in_arguments = false;
    let mut args = ToolArgs::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        let Some((indent, key, value)) = split_key_value(line) else {
            continue;
        };

        if !in_arguments {
            if key == "name" && name.is_none() {
                if !value.is_empty() {
                    name = Some(value.to_string());
                }
                continue;
            }
            if key == "arguments" {
                in_arguments = true;
                continue;
            }
        }

        if value == "|" {
            let (scalar, consumed) = block_scalar(&lines[i..], indent);
            i += consumed;
            args.insert(key, scalar);
        } else {
            args.insert(key, value);
        }
    }

    name.map(|n| (n, args))
}

/// Split `  key: value` into indentation width in chars, key and trimmed value.
fn split_key_value(line: &str) -> Option<(usize, &str, &str)> {
    let indent = line.chars().take_while(|c| c.is_whitespace()).count();
    let (key, value) = line.trim_start().split_once(':')?;
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some((indent, key, value.trim()))
}

/// Collect lines indented deeper than `key_indent`; returns the dedented
/// text and how many lines were used.
fn block_scalar(lines: &[&str], key_indent: usize) -> (String, usize) {
    let indent_of = |l: &str| l.chars().take_while(|c| c.is_whitespace()).count();
    let consumed = lines
        .iter()
        .take_while(|l| l.trim().is_empty() || indent_of(l) > key_indent)
        .count();
    let mut taken = &lines[..consumed];
    // trailing blank lines belong to whatever follows
    while let Some((last, init)) = taken.split_last()
        && last.trim().is_empty()
    {
        taken = init;
    }

    let margin = taken
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    let text = taken
        .iter()
        .map(|l| {
            let start = l.char_indices().nth(margin).map_or(l.len(), |(at, _)| at);
            l[start..].trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n");
    (text, taken.len())
}
