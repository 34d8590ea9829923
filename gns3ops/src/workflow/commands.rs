//! Configuration sequences the workflows send.

use crate::driver::{CommandSequence, CommandSpec};
use crate::inventory::ManagementEndpoint;

/// Local user with full privileges, plus an optional enable secret.
pub fn password_commands(
    username: &str,
    password: &str,
    enable_secret: Option<&str>,
) -> CommandSequence {
    let mut commands = vec![CommandSpec::new(format!(
        "username {} privilege 15 secret {}",
        username, password
    ))];
    if let Some(secret) = enable_secret {
        commands.push(CommandSpec::new(format!("enable secret {}", secret)));
    }
    CommandSequence::new(commands)
}

/// What SSH setup puts on a router.
#[derive(Debug, Clone)]
pub struct SshSetup<'a> {
    pub domain_name: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub enable_secret: Option<&'a str>,
    pub key_modulus: u32,

    /// Address assigned when it names an interface and a netmask.
    pub management: Option<&'a ManagementEndpoint>,
}

impl SshSetup<'_> {
    pub fn commands(&self) -> CommandSequence {
        let mut commands = vec![CommandSpec::new(format!("ip domain-name {}", self.domain_name))];
        commands.extend(password_commands(self.username, self.password, self.enable_secret));
        commands.extend(
            [
                format!("crypto key generate rsa general-keys modulus {}", self.key_modulus),
                "ip ssh version 2".to_string(),
                "line vty 0 4".to_string(),
                "transport input ssh".to_string(),
                "login local".to_string(),
                "exit".to_string(),
            ]
            .into_iter()
            .map(CommandSpec::new),
        );

        if let Some(endpoint) = self.management {
            if let (Some(interface), Some(netmask)) = (&endpoint.interface, &endpoint.netmask) {
                commands.extend(
                    [
                        format!("interface {}", interface),
                        format!("ip address {} {}", endpoint.host, netmask),
                        "no shutdown".to_string(),
                        "exit".to_string(),
                    ]
                    .into_iter()
                    .map(CommandSpec::new),
                );
            }
        }

        CommandSequence::new(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(sequence: &CommandSequence) -> Vec<&str> {
        sequence.iter().map(|s| s.command.as_str()).collect()
    }

    #[test]
    fn test_password_commands() {
        let sequence = password_commands("admin", "n3w", None);
        assert_eq!(lines(&sequence), ["username admin privilege 15 secret n3w"]);

        let sequence = password_commands("admin", "n3w", Some("s3cret"));
        assert_eq!(lines(&sequence)[1], "enable secret s3cret");
    }

    #[test]
    fn test_ssh_setup_commands() {
        let endpoint = ManagementEndpoint {
            host: "192.168.1.1".into(),
            port: 22,
            interface: Some("FastEthernet0/0".into()),
            netmask: Some("255.255.255.0".into()),
        };
        let setup = SshSetup {
            domain_name: "automation.local",
            username: "admin",
            password: "cisco123",
            enable_secret: Some("enable123"),
            key_modulus: 1024,
            management: Some(&endpoint),
        };
        let sequence = setup.commands();
        let commands = lines(&sequence);

        assert_eq!(commands[0], "ip domain-name automation.local");
        assert!(commands.contains(&"ip ssh version 2"));
        assert!(commands.contains(&"ip address 192.168.1.1 255.255.255.0"));

        let keygen = sequence
            .iter()
            .find(|s| s.command.starts_with("crypto key generate"))
            .unwrap();
        assert!(keygen.hint.confirm);

        let bare = SshSetup {
            management: None,
            ..setup
        };
        assert!(!lines(&bare.commands()).iter().any(|c| c.starts_with("interface")));
    }
}
