//! Cisco IOS platform definition.
//!
//! Covers the classic IOS images GNS3 runs under Dynamips and IOU:
//! `R1>`, `R1#`, `R1(config)#`, `R1(config-if)#` and friends.

use crate::channel::ConfirmRule;
use crate::error::{ChannelError, Result};
use crate::platform::{PlatformDefinition, PrivilegeLevel};

const HOST: &str = r"[\w.\-@/:]{1,63}";
const MODE: &str = r"\([\w.\-@/:+]{0,32}\)";

/// Prompt of any IOS level.
pub const PROMPT_PATTERN: &str = r"(?m)^[\w.\-@/:]{1,63}(?:\([\w.\-@/:+]{0,32}\))?[>#]";

/// Prompt for a password, from `enable` or line login.
pub const PASSWORD_PATTERN: &str = r"(?m)^\s*[Pp]assword:\s*\z";

/// Create the Cisco IOS platform definition.
pub fn platform() -> Result<PlatformDefinition> {
    Ok(build().map_err(ChannelError::from)?)
}

fn build() -> std::result::Result<PlatformDefinition, regex::Error> {
    let exec = PrivilegeLevel::new("exec", &format!(r"(?m)^{HOST}>\s*\z"))?;

    let privileged = PrivilegeLevel::new("privileged", &format!(r"(?m)^{HOST}#\s*\z"))?
        .below("exec", "enable", "disable")
        .with_auth(PASSWORD_PATTERN)?;

    let configuration =
        PrivilegeLevel::new("configuration", &format!(r"(?m)^{HOST}{MODE}#\s*\z"))?
            .below("privileged", "configure terminal", "end");

    Ok(PlatformDefinition::new("cisco_ios", PROMPT_PATTERN)?
        .with_password_pattern(PASSWORD_PATTERN)?
        .with_privilege(exec)
        .with_privilege(privileged)
        .with_privilege(configuration)
        .with_default_privilege("privileged")
        .with_confirm_rule(ConfirmRule::new(r"(?i)\[yes/no\]", "yes")?)
        .with_confirm_rule(ConfirmRule::new(r"\[confirm\]", "")?)
        .with_confirm_rule(ConfirmRule::new(r"Destination filename \[[^\]\n]*\]\?", "")?)
        .with_open_rule(ConfirmRule::new(
            r"(?i)initial configuration dialog\?\s*\[yes/no\]",
            "no",
        )?)
        .with_open_rule(ConfirmRule::new(r"(?i)press return to get started", "")?)
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511"))
}
