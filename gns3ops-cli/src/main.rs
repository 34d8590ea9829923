mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use gns3ops::{AppConfig, BatchPolicy, OperationKind};

#[derive(Parser)]
#[command(name = "gns3ops")]
#[command(about = "Automation for Cisco routers in a GNS3 lab")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "gns3ops.toml")]
    config: PathBuf,

    /// Multiply every timeout by this factor
    #[arg(long, global = true)]
    delay_factor: Option<u32>,

    /// What a command sequence does after a timeout
    #[arg(long, global = true)]
    policy: Option<Policy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Continue,
    Abort,
}

impl From<Policy> for BatchPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Continue => BatchPolicy::Continue,
            Policy::Abort => BatchPolicy::Abort,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the project's routers and capture their state
    Discover,
    /// Reconnect to devices and refresh their state
    Status {
        /// Devices to check (all when omitted)
        devices: Vec<String>,
    },
    /// List the inventory
    Devices,
    /// Save the running configuration of devices
    Backup {
        /// Devices to back up (all when omitted)
        devices: Vec<String>,
    },
    /// List saved backups
    Backups {
        /// Only backups of this device
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Push a saved configuration back to a device
    Restore {
        /// Name of the device
        device: String,
        /// Backup file to restore (defaults to the latest backup)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Apply configuration commands to devices
    Apply {
        /// Devices to configure (all when omitted)
        devices: Vec<String>,
        /// File of commands, one per line (or a YAML list)
        #[arg(short, long, conflicts_with = "template", required_unless_present = "template")]
        file: Option<PathBuf>,
        /// Name of a template to apply
        #[arg(short, long)]
        template: Option<String>,
        /// Configure devices concurrently as background jobs
        #[arg(long)]
        parallel: bool,
    },
    /// Set a new local user password on devices
    RotatePassword {
        /// Devices to update (all when omitted)
        devices: Vec<String>,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        enable_secret: Option<String>,
    },
    /// Enable SSH access on devices over their console
    SetupSsh {
        /// Devices to set up (all when omitted)
        devices: Vec<String>,
    },
    /// Show the operation log
    Logs {
        #[arg(short, long)]
        device: Option<String>,
        /// Operation kind (discovery, status_check, backup, ...)
        #[arg(short, long)]
        kind: Option<OperationKind>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Manage configuration templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List built-in and custom templates
    List,
    /// Print a template's commands
    Show { name: String },
    /// Save a custom template from a file
    Create {
        name: String,
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    match cli.command {
        Commands::Discover => commands::discover(&config).await?,
        Commands::Status { devices } => commands::status(&config, &devices).await?,
        Commands::Devices => commands::devices(&config).await?,
        Commands::Backup { devices } => commands::backup(&config, &devices).await?,
        Commands::Backups { device } => commands::backups(&config, device.as_deref()).await?,
        Commands::Restore { device, file } => {
            commands::restore(&config, &device, file.as_deref()).await?
        }
        Commands::Apply {
            devices,
            file,
            template,
            parallel,
        } => {
            let source = match (file, template) {
                (Some(file), _) => commands::Source::File(file),
                (None, Some(template)) => commands::Source::Template(template),
                (None, None) => anyhow::bail!("either --file or --template is required"),
            };
            commands::apply(&config, devices, source, parallel).await?
        }
        Commands::RotatePassword {
            devices,
            username,
            password,
            enable_secret,
        } => {
            commands::rotate_password(
                &config,
                &devices,
                &username,
                &password,
                enable_secret.as_deref(),
            )
            .await?
        }
        Commands::SetupSsh { devices } => commands::setup_ssh(&config, &devices).await?,
        Commands::Logs {
            device,
            kind,
            limit,
        } => commands::logs(&config, device, kind, limit).await?,
        Commands::Templates { command } => match command {
            TemplateCommands::List => commands::templates_list(&config).await?,
            TemplateCommands::Show { name } => commands::templates_show(&config, &name).await?,
            TemplateCommands::Create { name, file } => {
                commands::templates_create(&config, &name, &file).await?
            }
        },
    }

    Ok(())
}

/// Configuration file plus command-line overrides.
async fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(&cli.config).await?;
    if let Some(factor) = cli.delay_factor {
        config.session.delay_factor = factor;
    }
    if let Some(policy) = cli.policy {
        config.session.batch_policy = policy.into();
    }
    Ok(config)
}
