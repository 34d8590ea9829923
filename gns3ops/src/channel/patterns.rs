//! Pattern matching utilities for prompt and confirmation detection.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a regex anchored at the end of input.
///
/// Patterns that already end in `$` or `\z` are kept as-is; anything else
/// gets `\s*\z` appended so only a prompt at the very end of the output
/// counts.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') || pattern.ends_with("\\z") {
        pattern.to_string()
    } else {
        format!("{}\\s*\\z", pattern)
    };

    Regex::new(&pattern)
}

/// A question the device may ask mid-command, and the line to answer it with.
#[derive(Debug, Clone)]
pub struct ConfirmRule {
    /// Pattern that identifies the question.
    pub pattern: Regex,

    /// Line sent back (without line terminator). Empty means a bare newline.
    pub answer: String,
}

impl ConfirmRule {
    /// Create a new rule, returning an error if the pattern is invalid.
    pub fn new(pattern: &str, answer: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            answer: answer.into(),
        })
    }
}

/// Prompt text of the last line of `data`, trimmed.
pub fn last_line(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.trim_end()
        .rsplit('\n')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
