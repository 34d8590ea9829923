//! One device session: prompt detection, command execution, confirmations.
//!
//! Every command goes through the same loop. The command line is sent,
//! then output is collected until a prompt sits at the end of the buffer.
//! A yes/no question met on the way is answered exactly once and the wait
//! window is extended. If the window closes first, the partial output is
//! returned as a timed-out response instead of an error.

use std::time::Duration;

use log::{debug, error, info, trace, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::command::{CommandSequence, CommandSpec, redact};
use super::privilege::PrivilegeManager;
use super::response::{Outcome, Response, normalize_output};
use crate::channel::{Channel, ConfirmRule, Fill, PatternBuffer, last_line};
use crate::error::{ChannelError, DriverError, Result};
use crate::platform::PlatformDefinition;
use crate::transport::{Transport, TransportProfile};

/// Level configuration commands run in.
pub const CONFIGURATION: &str = "configuration";

/// Level `show` commands and `write memory` run in.
pub const PRIVILEGED: &str = "privileged";

/// Wait windows. Every base value is multiplied by `delay_factor`.
#[derive(Debug, Clone)]
pub struct Timing {
    /// TCP connect / SSH handshake budget. Not scaled.
    pub connect_timeout: Duration,

    /// Base wait for a prompt after a command.
    pub command_timeout: Duration,

    /// Base wait after answering a confirmation, and for long-running commands.
    pub extended_timeout: Duration,

    /// Multiplier for slow emulated hardware. Values below 1 count as 1.
    pub delay_factor: u32,

    /// Gap between empty lines sent while waiting for the first prompt.
    pub nudge_interval: Duration,

    /// Quiet period that ends the drain after the first prompt.
    pub settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(10),
            extended_timeout: Duration::from_secs(30),
            delay_factor: 2,
            nudge_interval: Duration::from_secs(2),
            settle: Duration::from_millis(300),
        }
    }
}

impl Timing {
    /// `base` multiplied by the delay factor.
    pub fn scaled(&self, base: Duration) -> Duration {
        base * self.delay_factor.max(1)
    }

    fn command_window(&self, spec: &CommandSpec) -> Duration {
        let base = spec.hint.timeout().unwrap_or(if spec.hint.confirm {
            self.extended_timeout
        } else {
            self.command_timeout
        });
        self.scaled(base)
    }

    fn confirm_window(&self, spec: &CommandSpec) -> Duration {
        self.scaled(spec.hint.extended().unwrap_or(self.extended_timeout))
    }
}

/// What a sequence does after a command times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Record the timeout and send the next command.
    #[default]
    Continue,

    /// Record the remaining commands as aborted without sending them.
    Abort,
}

/// Answer the earliest unanswered question in `buffer`, if any.
fn answer_pending(rules: &[ConfirmRule], buffer: &mut PatternBuffer) -> Option<String> {
    let (end, answer) = rules
        .iter()
        .filter_map(|rule| {
            buffer
                .search_unanswered(&rule.pattern)
                .map(|(start, end)| (start, end, &rule.answer))
        })
        .min_by_key(|(start, _, _)| *start)
        .map(|(_, end, answer)| (end, answer.clone()))?;

    buffer.mark_answered(end);
    Some(answer)
}

/// Interactive session with one device.
pub struct Session<T> {
    name: String,
    channel: Channel<T>,
    platform: PlatformDefinition,
    privileges: PrivilegeManager,
    timing: Timing,
    enable_secret: Option<SecretString>,
    prompt: String,
}

impl<T: Transport> Session<T> {
    /// Wrap a connected transport. Nothing is sent until [`establish`](Self::establish).
    pub fn new(name: impl Into<String>, transport: T, platform: PlatformDefinition) -> Self {
        Self {
            name: name.into(),
            channel: Channel::new(transport),
            privileges: PrivilegeManager::new(platform.privilege_levels.clone()),
            platform,
            timing: Timing::default(),
            enable_secret: None,
            prompt: String::new(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_enable_secret(mut self, secret: Option<SecretString>) -> Self {
        self.enable_secret = secret;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last prompt seen.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Current privilege level name.
    pub fn privilege(&self) -> Option<&str> {
        self.privileges.current()
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    /// Bring the line to a prompt and run the platform's open commands.
    pub async fn establish(&mut self) -> Result<()> {
        let budget = self.timing.scaled(self.timing.command_timeout);
        let deadline = Instant::now() + budget;
        info!("{}: waiting for prompt (up to {:?})", self.name, budget);

        // A console shows nothing until the line is poked
        if self.channel.transport().profile() == TransportProfile::Console {
            self.channel.send_line("").await?;
        }
        let mut next_nudge = Instant::now() + self.timing.nudge_interval;

        let prompt = loop {
            if let Some((start, _)) = self
                .channel
                .buffer()
                .search_tail(&self.platform.prompt_pattern)
            {
                break last_line(&self.channel.buffer().as_slice()[start..]);
            }

            if let Some(answer) =
                answer_pending(&self.platform.open_rules, self.channel.buffer_mut())
            {
                debug!("{}: answering open dialog with {:?}", self.name, answer);
                self.channel.send_line(&answer).await?;
                continue;
            }

            match self.channel.fill(deadline.min(next_nudge)).await? {
                Fill::Data => {}
                Fill::Closed => return Err(ChannelError::Closed.into()),
                Fill::Deadline if Instant::now() >= deadline => {
                    return Err(ChannelError::PromptTimeout(budget).into());
                }
                Fill::Deadline => {
                    trace!("{}: no prompt yet, nudging", self.name);
                    self.channel.send_line("").await?;
                    next_nudge = Instant::now() + self.timing.nudge_interval;
                }
            }
        };

        self.set_prompt(prompt);
        self.settle().await?;
        info!(
            "{}: at prompt {:?} ({})",
            self.name,
            self.prompt,
            self.privilege().unwrap_or("unknown")
        );

        for command in self.platform.on_open_commands.clone() {
            let response = self.execute(&CommandSpec::new(command)).await?;
            if !response.is_success() {
                debug!("{}: open command '{}' ignored", self.name, response.command);
            }
        }

        Ok(())
    }

    /// Drain output still arriving (answers to extra nudges) and drop it.
    async fn settle(&mut self) -> Result<()> {
        loop {
            let quiet = Instant::now() + self.timing.settle;
            match self.channel.fill(quiet).await? {
                Fill::Data => continue,
                Fill::Deadline | Fill::Closed => break,
            }
        }
        self.channel.buffer_mut().clear();
        Ok(())
    }

    fn set_prompt(&mut self, prompt: String) {
        if let Err(e) = self.privileges.observe_prompt(&prompt) {
            warn!("{}: {}", self.name, e);
        }
        self.prompt = prompt;
    }

    /// Run one command and wait for the prompt.
    ///
    /// A timeout is a normal outcome carried in the response. Errors are
    /// reserved for the line itself failing.
    pub async fn execute(&mut self, spec: &CommandSpec) -> Result<Response> {
        self.channel.buffer_mut().clear();
        let started = Instant::now();

        debug!("{}: > {}", self.name, redact(&spec.command));
        self.channel.send_line(&spec.command).await?;

        let mut window = self.timing.command_window(spec);
        let mut deadline = Instant::now() + window;
        let mut confirmations = 0;

        loop {
            if let Some((start, _)) = self
                .channel
                .buffer()
                .search_tail(&self.platform.prompt_pattern)
            {
                let raw = self.channel.buffer_mut().take();
                let prompt = last_line(&raw[start..]);
                let raw = String::from_utf8_lossy(&raw).into_owned();
                let result = normalize_output(&raw, &spec.command, &self.platform.prompt_pattern);
                let failure = self.platform.detect_failure(&result);

                if let Some(message) = &failure {
                    warn!(
                        "{}: '{}' rejected: {}",
                        self.name,
                        redact(&spec.command),
                        message
                    );
                }

                self.set_prompt(prompt);
                return Ok(Response::completed(
                    &spec.command,
                    result,
                    raw,
                    self.prompt.clone(),
                    started.elapsed(),
                )
                .with_confirmations(confirmations)
                .with_failure(failure));
            }

            if let Some(answer) =
                answer_pending(&self.platform.confirm_rules, self.channel.buffer_mut())
            {
                confirmations += 1;
                debug!(
                    "{}: confirming '{}' with {:?}",
                    self.name,
                    redact(&spec.command),
                    answer
                );
                self.channel.send_line(&answer).await?;
                window = self.timing.confirm_window(spec);
                deadline = Instant::now() + window;
                continue;
            }

            match self.channel.fill(deadline).await? {
                Fill::Data => {}
                Fill::Deadline => {
                    warn!(
                        "{}: '{}' timed out after {:?}",
                        self.name,
                        redact(&spec.command),
                        window
                    );
                    let raw = self.channel.buffer_mut().take();
                    let raw = String::from_utf8_lossy(&raw).into_owned();
                    let partial =
                        normalize_output(&raw, &spec.command, &self.platform.prompt_pattern);
                    return Ok(
                        Response::timed_out(&spec.command, partial, raw, started.elapsed())
                            .with_confirmations(confirmations),
                    );
                }
                Fill::Closed => return Err(ChannelError::Closed.into()),
            }
        }
    }

    /// Run a single command line.
    pub async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.execute(&CommandSpec::new(command)).await
    }

    /// Run a sequence, one response per command whatever happens.
    ///
    /// After a line failure the rest are recorded as aborted. After a
    /// timeout, `policy` decides.
    pub async fn run_sequence(
        &mut self,
        sequence: &CommandSequence,
        policy: BatchPolicy,
    ) -> Vec<Response> {
        let mut responses = Vec::with_capacity(sequence.len());
        let mut halted: Option<String> = None;

        for spec in sequence {
            if let Some(reason) = &halted {
                responses.push(Response::aborted(&spec.command, reason.clone()));
                continue;
            }

            match self.execute(spec).await {
                Ok(response) => {
                    if response.outcome == Outcome::TimedOut && policy == BatchPolicy::Abort {
                        halted = Some(format!(
                            "skipped after '{}' timed out",
                            redact(&spec.command)
                        ));
                    }
                    responses.push(response);
                }
                Err(e) => {
                    error!("{}: '{}' failed: {}", self.name, spec.command, e);
                    responses.push(Response::aborted(&spec.command, e.to_string()));
                    halted = Some(format!("skipped after line failure: {}", e));
                }
            }
        }

        responses
    }

    /// Move to the named privilege level.
    pub async fn acquire_privilege(&mut self, target: &str) -> Result<()> {
        let current = self
            .privileges
            .current()
            .map(str::to_string)
            .ok_or_else(|| DriverError::UnknownPrivilege {
                prompt: self.prompt.clone(),
            })?;

        let failed = || DriverError::PrivilegeAcquisitionFailed {
            target: target.to_string(),
        };

        for step in self.privileges.plan(&current, target)? {
            debug!("{}: {} -> {}", self.name, step.command, step.target);
            self.channel.buffer_mut().clear();
            self.channel.send_line(&step.command).await?;

            let deadline = Instant::now() + self.timing.scaled(self.timing.command_timeout);
            let mut secret_sent = false;

            let prompt = loop {
                if let Some((start, _)) = self
                    .channel
                    .buffer()
                    .search_tail(&self.platform.prompt_pattern)
                {
                    let raw = self.channel.buffer_mut().take();
                    break last_line(&raw[start..]);
                }

                if let Some(auth) = &step.auth_prompt {
                    if self.channel.buffer().tail_contains(auth) {
                        // A second password prompt means the first was refused
                        let secret = match &self.enable_secret {
                            Some(secret) if !secret_sent => secret,
                            _ => return Err(failed().into()),
                        };
                        self.channel.buffer_mut().clear();
                        self.channel.send_hidden(secret.expose_secret()).await?;
                        secret_sent = true;
                        continue;
                    }
                }

                match self.channel.fill(deadline).await? {
                    Fill::Data => {}
                    Fill::Deadline => return Err(failed().into()),
                    Fill::Closed => return Err(ChannelError::Closed.into()),
                }
            };

            self.set_prompt(prompt);
            if self.privileges.current() != Some(step.target.as_str()) {
                return Err(failed().into());
            }
        }

        Ok(())
    }

    /// Enter privileged exec.
    pub async fn enable(&mut self) -> Result<()> {
        self.acquire_privilege(PRIVILEGED).await
    }

    /// Run a sequence in configuration mode, then return to privileged exec.
    pub async fn send_config(
        &mut self,
        sequence: &CommandSequence,
        policy: BatchPolicy,
    ) -> Result<Vec<Response>> {
        self.acquire_privilege(CONFIGURATION).await?;
        let responses = self.run_sequence(sequence, policy).await;
        self.acquire_privilege(PRIVILEGED).await?;
        Ok(responses)
    }

    /// Save the running configuration (`write memory`).
    pub async fn save_config(&mut self) -> Result<Response> {
        self.acquire_privilege(PRIVILEGED).await?;
        let spec = CommandSpec::new("write memory").with_timeout(self.timing.extended_timeout);
        let response = self.execute(&spec).await?;

        if response.outcome == Outcome::Completed && !response.contains("[OK]") {
            let message = Some("write memory did not report [OK]".to_string());
            return Ok(response.with_failure(message));
        }
        Ok(response)
    }

    /// Close the line.
    pub async fn close(mut self) -> Result<()> {
        debug!("{}: closing session", self.name);
        self.channel.close().await
    }
}
