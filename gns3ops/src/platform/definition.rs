//! Platform definition: prompts, modes and canned answers of one CLI family.

use indexmap::IndexMap;
use regex::bytes::Regex;

use super::privilege_level::PrivilegeLevel;
use crate::channel::{ConfirmRule, compile_prompt_pattern};

/// Everything the session needs to know about a device's CLI.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g. "cisco_ios").
    pub name: String,

    /// Matches a prompt of any level at the end of the output.
    pub prompt_pattern: Regex,

    /// Password prompt shown by `enable` and by line login.
    pub password_pattern: Option<Regex>,

    /// Levels in chain order, root first.
    pub privilege_levels: IndexMap<String, PrivilegeLevel>,

    /// Level commands are normally run from.
    pub default_privilege: String,

    /// Mid-command questions answered automatically.
    pub confirm_rules: Vec<ConfirmRule>,

    /// Questions that may stand between the line and its first prompt.
    pub open_rules: Vec<ConfirmRule>,

    /// Output substrings that mark a command as rejected.
    pub failed_when_contains: Vec<String>,

    /// Commands run once the first prompt is seen.
    pub on_open_commands: Vec<String>,
}

impl PlatformDefinition {
    pub fn new(name: impl Into<String>, prompt_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt_pattern: compile_prompt_pattern(prompt_pattern)?,
            password_pattern: None,
            privilege_levels: IndexMap::new(),
            default_privilege: String::new(),
            confirm_rules: Vec::new(),
            open_rules: Vec::new(),
            failed_when_contains: Vec::new(),
            on_open_commands: Vec::new(),
        })
    }

    pub fn with_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_levels.insert(level.name.clone(), level);
        self
    }

    pub fn with_default_privilege(mut self, name: impl Into<String>) -> Self {
        self.default_privilege = name.into();
        self
    }

    pub fn with_password_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.password_pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_confirm_rule(mut self, rule: ConfirmRule) -> Self {
        self.confirm_rules.push(rule);
        self
    }

    pub fn with_open_rule(mut self, rule: ConfirmRule) -> Self {
        self.open_rules.push(rule);
        self
    }

    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Replace the open commands wholesale.
    pub fn with_on_open_commands(mut self, commands: Vec<String>) -> Self {
        self.on_open_commands = commands;
        self
    }

    pub fn get_privilege(&self, name: &str) -> Option<&PrivilegeLevel> {
        self.privilege_levels.get(name)
    }

    /// Level whose pattern matches `prompt`, most specific first.
    pub fn determine_privilege(&self, prompt: &str) -> Option<&PrivilegeLevel> {
        self.privilege_levels
            .values()
            .rev()
            .find(|level| level.matches(prompt))
    }

    /// First output line containing a failure pattern.
    pub fn detect_failure(&self, output: &str) -> Option<String> {
        output
            .lines()
            .find(|line| {
                self.failed_when_contains
                    .iter()
                    .any(|pattern| line.contains(pattern.as_str()))
            })
            .map(|line| line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_failure_returns_line() {
        let platform = PlatformDefinition::new("test", r"[>#]")
            .unwrap()
            .with_failure_pattern("% Invalid input");

        let output = "show ip route foo\n        ^\n% Invalid input detected at '^' marker.";
        assert_eq!(
            platform.detect_failure(output).as_deref(),
            Some("% Invalid input detected at '^' marker.")
        );
        assert!(platform.detect_failure("Gateway of last resort is not set").is_none());
    }

    #[test]
    fn test_open_commands_replaced() {
        let platform = PlatformDefinition::new("test", r"[>#]")
            .unwrap()
            .with_on_open_command("terminal length 0")
            .with_on_open_commands(Vec::new());
        assert!(platform.on_open_commands.is_empty());
    }
}
