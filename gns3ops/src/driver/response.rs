//! Response type for command execution results.

use std::time::Duration;

use regex::bytes::Regex;
use serde::Serialize;

/// How a command's wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The prompt came back.
    Completed,

    /// The window elapsed first. `result` holds the partial output.
    TimedOut,

    /// Never sent, or the line failed underneath it.
    Aborted,
}

/// Response from a command execution.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// Output with the command echo and trailing prompt removed.
    pub result: String,

    /// Output as received (ANSI and carriage returns stripped).
    pub raw_result: String,

    /// The prompt that ended the command. Empty unless completed.
    pub prompt: String,

    pub elapsed: Duration,

    pub outcome: Outcome,

    /// Confirmation questions answered while the command ran.
    pub confirmations: usize,

    /// Why the command counts as failed, if it does.
    pub failure_message: Option<String>,
}

impl Response {
    pub fn completed(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
            outcome: Outcome::Completed,
            confirmations: 0,
            failure_message: None,
        }
    }

    pub fn timed_out(
        command: impl Into<String>,
        partial: impl Into<String>,
        raw_result: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        let mut response = Self::completed(command, partial, raw_result, "", elapsed);
        response.outcome = Outcome::TimedOut;
        response.failure_message = Some(format!("no prompt after {:?}", elapsed));
        response
    }

    pub fn aborted(command: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut response = Self::completed(command, "", "", "", Duration::ZERO);
        response.outcome = Outcome::Aborted;
        response.failure_message = Some(reason.into());
        response
    }

    pub fn with_confirmations(mut self, count: usize) -> Self {
        self.confirmations = count;
        self
    }

    pub fn with_failure(mut self, message: Option<String>) -> Self {
        if message.is_some() {
            self.failure_message = message;
        }
        self
    }

    /// Completed and not rejected by the device.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed && self.failure_message.is_none()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

/// Strip the command echo and the trailing prompt from raw output.
///
/// The echo is the first line when it equals the command or ends with it
/// (an echo that follows a prompt on the same line).
pub fn normalize_output(raw: &str, command: &str, prompt: &Regex) -> String {
    let mut text = raw;

    if let Some(m) = prompt.find(text.as_bytes()) {
        text = text.get(..m.start()).unwrap_or(text);
    }

    let text = text.trim_start_matches('\n');
    let command = command.trim();
    let body = match text.split_once('\n') {
        Some((first, rest)) if is_echo(first, command) => rest,
        None if is_echo(text, command) => "",
        _ => text,
    };

    body.trim_matches('\n').to_string()
}

fn is_echo(line: &str, command: &str) -> bool {
    let line = line.trim_end();
    !command.is_empty() && (line == command || line.ends_with(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ios;

    fn prompt() -> Regex {
        ios::platform().unwrap().prompt_pattern
    }

    #[test]
    fn test_normalize_strips_echo_and_prompt() {
        let raw = "show clock\n*10:01:02.123 UTC Fri Mar 1 2002\nR1#";
        assert_eq!(
            normalize_output(raw, "show clock", &prompt()),
            "*10:01:02.123 UTC Fri Mar 1 2002"
        );
    }

    #[test]
    fn test_normalize_echo_after_prompt() {
        let raw = "R1#show run | include hostname\nhostname R1\nR1#";
        assert_eq!(
            normalize_output(raw, "show run | include hostname", &prompt()),
            "hostname R1"
        );
    }

    #[test]
    fn test_normalize_keeps_text_between_prompts() {
        let raw = "\nline one\nline two\n\nR1(config)#";
        assert_eq!(normalize_output(raw, "", &prompt()), "line one\nline two");
    }

    #[test]
    fn test_normalize_echo_only() {
        assert_eq!(normalize_output("end\nR1#", "end", &prompt()), "");
    }

    #[test]
    fn test_success_and_outcomes() {
        let ok = Response::completed("show clock", "x", "x", "R1#", Duration::ZERO);
        assert!(ok.is_success());

        let rejected = ok
            .clone()
            .with_failure(Some("% Invalid input detected".into()));
        assert!(!rejected.is_success());

        let timed_out = Response::timed_out("show tech", "partial", "partial", Duration::from_secs(20));
        assert_eq!(timed_out.outcome, Outcome::TimedOut);
        assert_eq!(timed_out.result, "partial");
        assert!(!timed_out.is_success());

        let aborted = Response::aborted("write memory", "skipped");
        assert_eq!(aborted.outcome, Outcome::Aborted);
        assert_eq!(aborted.failure_message.as_deref(), Some("skipped"));
    }
}
