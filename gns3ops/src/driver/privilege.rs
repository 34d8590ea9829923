//! Privilege level tracking and navigation.

use indexmap::IndexMap;
use regex::bytes::Regex;

use crate::error::{DriverError, Result};
use crate::platform::PrivilegeLevel;

/// One command on the way to a target level.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Command to send.
    pub command: String,

    /// Level the device should be in afterwards.
    pub target: String,

    /// Password prompt that may appear before the new prompt.
    pub auth_prompt: Option<Regex>,
}

/// Tracks the current level and plans moves between levels.
///
/// Levels form a chain through their `parent` links, so the route between
/// two levels climbs to their nearest common ancestor and then descends.
#[derive(Debug)]
pub struct PrivilegeManager {
    levels: IndexMap<String, PrivilegeLevel>,
    current: Option<String>,
}

impl PrivilegeManager {
    pub fn new(levels: IndexMap<String, PrivilegeLevel>) -> Self {
        Self {
            levels,
            current: None,
        }
    }

    /// Current level name, once a prompt has been seen.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Record the level a prompt belongs to.
    ///
    /// Configuration sub-modes are checked before the plain `#` level.
    pub fn observe_prompt(&mut self, prompt: &str) -> Result<&str> {
        let name = self
            .levels
            .values()
            .rev()
            .find(|level| level.matches(prompt))
            .map(|level| level.name.clone())
            .ok_or_else(|| DriverError::UnknownPrivilege {
                prompt: prompt.to_string(),
            })?;

        Ok(self.current.insert(name).as_str())
    }

    /// `name` and its ancestors, nearest first.
    fn lineage(&self, name: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut cursor = Some(name.to_string());

        while let Some(level_name) = cursor {
            let level = self
                .levels
                .get(&level_name)
                .ok_or_else(|| DriverError::UnknownPrivilege {
                    prompt: level_name.clone(),
                })?;
            // A parent cycle would loop forever
            if chain.contains(&level_name) || chain.len() > self.levels.len() {
                break;
            }
            chain.push(level_name);
            cursor = level.parent.clone();
        }

        Ok(chain)
    }

    /// Commands that move the device from `from` to `to`.
    pub fn plan(&self, from: &str, to: &str) -> Result<Vec<Transition>> {
        if from == to {
            return Ok(Vec::new());
        }

        let up = self.lineage(from)?;
        let down = self.lineage(to)?;

        let no_route = || DriverError::PrivilegeAcquisitionFailed {
            target: to.to_string(),
        };

        let meet = up
            .iter()
            .position(|name| down.contains(name))
            .ok_or_else(no_route)?;
        let common = &up[meet];
        let descend = down.iter().position(|name| name == common).ok_or_else(no_route)?;

        let mut steps = Vec::new();

        for pair in up[..=meet].windows(2) {
            let level = &self.levels[pair[0].as_str()];
            steps.push(Transition {
                command: level.exit_command.clone().ok_or_else(no_route)?,
                target: pair[1].clone(),
                auth_prompt: None,
            });
        }

        for name in down[..descend].iter().rev() {
            let level = &self.levels[name.as_str()];
            steps.push(Transition {
                command: level.enter_command.clone().ok_or_else(no_route)?,
                target: name.clone(),
                auth_prompt: level.auth_prompt.clone(),
            });
        }

        Ok(steps)
    }
}
