//! Field extraction from IOS `show` output.

use crate::error::ParseError;

use super::device::InterfaceState;

pub const SHOW_HOSTNAME: &str = "show running-config | include hostname";
pub const SHOW_UPTIME: &str = "show version | include uptime";
pub const SHOW_MEMORY: &str = "show version | include bytes of memory";
pub const SHOW_CONFIG_COUNT: &str = "show running-config | count";
pub const SHOW_INTERFACES: &str = "show ip interface brief";

/// Interfaces tried for the management address when none is configured.
pub const DEFAULT_MANAGEMENT_INTERFACES: &[&str] =
    &["FastEthernet0/0", "Ethernet0/0", "GigabitEthernet0/0"];

type ParseResult<T> = Result<T, ParseError>;

fn missing(field: &'static str, command: &'static str) -> ParseError {
    ParseError::MissingField { field, command }
}

/// `hostname R1` -> `R1`.
pub fn hostname(output: &str) -> ParseResult<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("hostname "))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or(missing("hostname", SHOW_HOSTNAME))
}

/// `R1 uptime is 2 hours, 5 minutes` -> `2 hours, 5 minutes`.
pub fn uptime(output: &str) -> ParseResult<String> {
    output
        .lines()
        .find_map(|line| line.split_once("uptime is").map(|(_, rest)| rest.trim()))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
        .ok_or(missing("uptime", SHOW_UPTIME))
}

/// The whole `... bytes of memory.` line.
pub fn memory(output: &str) -> ParseResult<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.contains("bytes of memory"))
        .map(str::to_string)
        .ok_or(missing("memory", SHOW_MEMORY))
}

/// `Number of lines which match regexp = 127` -> 127.
pub fn config_lines(output: &str) -> ParseResult<u32> {
    output
        .lines()
        .filter(|line| line.contains('='))
        .find_map(|line| line.rsplit('=').next()?.trim().parse().ok())
        .ok_or(missing("config_lines", SHOW_CONFIG_COUNT))
}

/// Rows of `show ip interface brief`.
///
/// Status may be two words (`administratively down`), so it is everything
/// between the method column and the last column.
pub fn interfaces(output: &str) -> ParseResult<Vec<InterfaceState>> {
    let rows: Vec<InterfaceState> = output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Interface"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            let ip = fields[1];
            Some(InterfaceState {
                name: fields[0].to_string(),
                ip_address: (ip != "unassigned").then(|| ip.to_string()),
                status: fields[4..fields.len() - 1].join(" "),
                protocol: fields[fields.len() - 1].to_string(),
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(missing("interfaces", SHOW_INTERFACES));
    }
    Ok(rows)
}

/// Address of the first listed interface that has one.
pub fn management_ip<S: AsRef<str>>(
    interfaces: &[InterfaceState],
    candidates: &[S],
) -> Option<String> {
    candidates.iter().find_map(|wanted| {
        interfaces
            .iter()
            .find(|iface| iface.name == wanted.as_ref())
            .and_then(|iface| iface.ip_address.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIEF: &str = "\
Interface                  IP-Address      OK? Method Status                Protocol
FastEthernet0/0            192.168.1.10    YES manual up                    up
FastEthernet0/1            unassigned      YES unset  administratively down down
Loopback0                  10.255.0.1      YES manual up                    up";

    #[test]
    fn test_hostname() {
        assert_eq!(hostname("hostname R1").unwrap(), "R1");
        assert_eq!(hostname("\nhostname Edge-01\n").unwrap(), "Edge-01");
        assert_eq!(
            hostname("").unwrap_err(),
            ParseError::MissingField {
                field: "hostname",
                command: SHOW_HOSTNAME
            }
        );
    }

    #[test]
    fn test_uptime_and_memory() {
        let version = "R1 uptime is 1 hour, 12 minutes\nCisco 3725 (R7000) processor with 124928K/6144K bytes of memory.";
        assert_eq!(uptime(version).unwrap(), "1 hour, 12 minutes");
        assert_eq!(
            memory(version).unwrap(),
            "Cisco 3725 (R7000) processor with 124928K/6144K bytes of memory."
        );
        assert!(uptime("System returned to ROM by power-on").is_err());
    }

    #[test]
    fn test_config_lines() {
        assert_eq!(config_lines("Number of lines which match regexp = 127").unwrap(), 127);
        assert!(config_lines("% Invalid input detected").is_err());
    }

    #[test]
    fn test_interfaces() {
        let rows = interfaces(BRIEF).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].ip_address.as_deref(), Some("192.168.1.10"));
        assert!(rows[0].is_up());
        assert_eq!(rows[1].ip_address, None);
        assert_eq!(rows[1].status, "administratively down");
        assert_eq!(rows[1].protocol, "down");
        assert!(interfaces("Interface  IP-Address OK? Method Status Protocol").is_err());
    }

    #[test]
    fn test_management_ip() {
        let rows = interfaces(BRIEF).unwrap();
        assert_eq!(
            management_ip(&rows, DEFAULT_MANAGEMENT_INTERFACES).as_deref(),
            Some("192.168.1.10")
        );
        assert_eq!(management_ip(&rows, &["FastEthernet0/1"]), None);
        assert_eq!(
            management_ip(&rows, &["Loopback0".to_string()]).as_deref(),
            Some("10.255.0.1")
        );
    }
}
