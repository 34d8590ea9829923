//! Capture a device's operational state over an open session.

use chrono::Utc;
use log::{debug, warn};

use super::device::DeviceState;
use super::parse;
use crate::driver::{PRIVILEGED, Session};
use crate::error::{ParseError, Result};
use crate::transport::Transport;

/// Run the capture commands in privileged exec and parse what comes back.
///
/// `show running-config` is refused at the user exec prompt and every
/// `show` is refused in configuration mode, so the session is moved to
/// privileged exec first. A field that cannot be parsed is logged and left
/// empty. Only a failing line or a refused `enable` aborts the capture.
pub async fn capture_state<T, S>(
    session: &mut Session<T>,
    management_interfaces: &[S],
) -> Result<DeviceState>
where
    T: Transport,
    S: AsRef<str>,
{
    session.acquire_privilege(PRIVILEGED).await?;

    let name = session.name().to_string();
    let mut state = DeviceState::default();

    let field = |result: std::result::Result<(), ParseError>| {
        if let Err(e) = result {
            warn!("{}: {}", name, e);
        }
    };

    let output = session.send_command(parse::SHOW_HOSTNAME).await?;
    field(parse::hostname(&output.result).map(|v| state.hostname = Some(v)));

    let output = session.send_command(parse::SHOW_UPTIME).await?;
    field(parse::uptime(&output.result).map(|v| state.uptime = Some(v)));

    let output = session.send_command(parse::SHOW_MEMORY).await?;
    field(parse::memory(&output.result).map(|v| state.memory = Some(v)));

    let output = session.send_command(parse::SHOW_CONFIG_COUNT).await?;
    field(parse::config_lines(&output.result).map(|v| state.config_lines = Some(v)));

    let output = session.send_command(parse::SHOW_INTERFACES).await?;
    field(parse::interfaces(&output.result).map(|v| state.interfaces = v));

    state.management_ip = parse::management_ip(&state.interfaces, management_interfaces);
    state.reachable = true;
    state.last_seen = Some(Utc::now());

    debug!(
        "{}: captured hostname={:?} interfaces={} mgmt={:?}",
        session.name(),
        state.hostname,
        state.interfaces.len(),
        state.management_ip
    );

    Ok(state)
}
