//! Privilege level definition.

use regex::bytes::Regex;

/// One CLI mode the device can be in, identified by its prompt.
///
/// Levels form a chain: each names the parent it is entered from and the
/// commands that move between the two.
#[derive(Debug, Clone)]
pub struct PrivilegeLevel {
    /// Level name ("exec", "privileged", "configuration").
    pub name: String,

    /// Matches a prompt line of this level.
    pub pattern: Regex,

    /// Level this one is entered from. `None` for the root.
    pub parent: Option<String>,

    /// Command that enters this level from the parent.
    pub enter_command: Option<String>,

    /// Command that returns from this level to the parent.
    pub exit_command: Option<String>,

    /// Password prompt that may appear while entering this level.
    pub auth_prompt: Option<Regex>,
}

impl PrivilegeLevel {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            parent: None,
            enter_command: None,
            exit_command: None,
            auth_prompt: None,
        })
    }

    /// Enter from `parent` with `enter`, leave with `exit`.
    pub fn below(
        mut self,
        parent: impl Into<String>,
        enter: impl Into<String>,
        exit: impl Into<String>,
    ) -> Self {
        self.parent = Some(parent.into());
        self.enter_command = Some(enter.into());
        self.exit_command = Some(exit.into());
        self
    }

    pub fn with_auth(mut self, prompt_pattern: &str) -> Result<Self, regex::Error> {
        self.auth_prompt = Some(Regex::new(prompt_pattern)?);
        Ok(self)
    }

    /// Whether a prompt line belongs to this level.
    pub fn matches(&self, prompt: &str) -> bool {
        self.pattern.is_match(prompt.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_fields() {
        let level = PrivilegeLevel::new("privileged", r"^[\w.\-]+#\s*\z")
            .unwrap()
            .below("exec", "enable", "disable")
            .with_auth(r"[Pp]assword:\s*\z")
            .unwrap();

        assert_eq!(level.parent.as_deref(), Some("exec"));
        assert_eq!(level.enter_command.as_deref(), Some("enable"));
        assert!(level.matches("R1#"));
        assert!(!level.matches("R1>"));
        assert!(level.auth_prompt.is_some());
    }
}
