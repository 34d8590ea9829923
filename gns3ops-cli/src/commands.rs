use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use gns3ops::inventory::display;
use gns3ops::{
    AppConfig, BatchReport, CommandSequence, JobRunner, JobState, LogQuery, OperationKind,
    Workflow,
};

/// Where `apply` gets its commands.
pub enum Source {
    File(PathBuf),
    Template(String),
}

fn workflow(config: &AppConfig) -> anyhow::Result<Workflow> {
    Workflow::from_config(config).context("failed to set up workflow")
}

fn print_report(report: &BatchReport) {
    for result in &report.results {
        println!("{:<12} {:<8} {}", result.device, result.status, result.detail);
    }
    println!("{}", report);
}

/// Exit non-zero unless every device succeeded.
fn finish(report: &BatchReport) -> anyhow::Result<()> {
    print_report(report);
    if report.is_success() {
        Ok(())
    } else {
        anyhow::bail!("{} of {} devices failed", report.failed(), report.results.len())
    }
}

pub async fn discover(config: &AppConfig) -> anyhow::Result<()> {
    let report = workflow(config)?
        .discover_and_capture()
        .await
        .with_context(|| format!("discovery of project '{}' failed", config.gns3.project))?;
    finish(&report)
}

pub async fn status(config: &AppConfig, devices: &[String]) -> anyhow::Result<()> {
    let report = workflow(config)?.status_check(devices).await?;
    finish(&report)
}

pub async fn devices(config: &AppConfig) -> anyhow::Result<()> {
    let inventory = config.inventory_store().load().await?;
    if inventory.is_empty() {
        println!("No devices on file. Run `gns3ops discover` first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<8} {:<8} {:<22} {:<16} {}",
        "NAME", "STATUS", "VIA", "ADDRESS", "HOSTNAME", "UPTIME"
    );
    for entry in display::view(&inventory) {
        println!(
            "{:<12} {:<8} {:<8} {:<22} {:<16} {}",
            entry.name,
            entry.status,
            entry.connection_type,
            format!("{}:{}", entry.host, entry.port),
            entry.hostname.as_deref().unwrap_or("-"),
            entry.uptime.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub async fn backup(config: &AppConfig, devices: &[String]) -> anyhow::Result<()> {
    let report = workflow(config)?.backup(devices).await?;
    finish(&report)
}

pub async fn backups(config: &AppConfig, device: Option<&str>) -> anyhow::Result<()> {
    let backups = config.backup_store().list(device).await?;
    if backups.is_empty() {
        println!("No backups found.");
    }
    for backup in backups {
        println!(
            "{:<12} {}  {:>7}  {}",
            backup.device,
            backup.taken.format("%Y-%m-%d %H:%M:%S"),
            backup.size,
            backup.path.display()
        );
    }
    Ok(())
}

pub async fn restore(config: &AppConfig, device: &str, file: Option<&Path>) -> anyhow::Result<()> {
    let report = workflow(config)?.restore(device, file).await?;
    finish(&report)
}

async fn load_sequence(config: &AppConfig, source: &Source) -> anyhow::Result<CommandSequence> {
    let sequence = match source {
        Source::File(path) => CommandSequence::load(path)
            .await
            .with_context(|| format!("failed to read commands from {}", path.display()))?,
        Source::Template(name) => config.template_store().load(name).await?.sequence(),
    };
    if sequence.is_empty() {
        anyhow::bail!("no commands to apply");
    }
    Ok(sequence)
}

pub async fn apply(
    config: &AppConfig,
    devices: Vec<String>,
    source: Source,
    parallel: bool,
) -> anyhow::Result<()> {
    let sequence = load_sequence(config, &source).await?;
    let workflow = workflow(config)?;

    if !parallel {
        let report = workflow.bulk_configure(&devices, &sequence).await?;
        return finish(&report);
    }

    let devices = if devices.is_empty() {
        config
            .inventory_store()
            .load()
            .await?
            .names()
            .map(str::to_string)
            .collect()
    } else {
        devices
    };

    let workflow = Arc::new(workflow);
    let runner = JobRunner::new();
    let failed = Arc::new(AtomicUsize::new(0));
    let mut ids = Vec::with_capacity(devices.len());
    for device in devices {
        let workflow = workflow.clone();
        let sequence = sequence.clone();
        let failed = failed.clone();
        let id = runner
            .submit(format!("{} {}", OperationKind::BulkConfig, device), async move {
                let report = workflow
                    .bulk_configure(std::slice::from_ref(&device), &sequence)
                    .await?;
                if !report.is_success() {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(report
                    .results
                    .first()
                    .map(|r| format!("{}: {} {}", r.device, r.status, r.detail))
                    .unwrap_or_default())
            })
            .await;
        ids.push(id);
    }

    for id in &ids {
        let Some(job) = runner.wait(*id).await else {
            continue;
        };
        if job.state == JobState::Failed {
            failed.fetch_add(1, Ordering::Relaxed);
        }
        println!("{}", job.summary.unwrap_or_default());
    }

    let failed = failed.load(Ordering::Relaxed);
    println!(
        "{}: {} of {} devices succeeded",
        OperationKind::BulkConfig,
        ids.len() - failed,
        ids.len()
    );

    if failed > 0 {
        anyhow::bail!("{} of {} devices failed", failed, ids.len());
    }
    Ok(())
}

pub async fn rotate_password(
    config: &AppConfig,
    devices: &[String],
    username: &str,
    password: &str,
    enable_secret: Option<&str>,
) -> anyhow::Result<()> {
    let report = workflow(config)?
        .rotate_password(devices, username, password, enable_secret)
        .await?;
    finish(&report)
}

pub async fn setup_ssh(config: &AppConfig, devices: &[String]) -> anyhow::Result<()> {
    let report = workflow(config)?.setup_ssh(devices).await?;
    finish(&report)
}

pub async fn logs(
    config: &AppConfig,
    device: Option<String>,
    kind: Option<OperationKind>,
    limit: usize,
) -> anyhow::Result<()> {
    let query = LogQuery {
        device,
        kind,
        limit: Some(limit),
    };
    for record in config.operation_log().query(&query).await? {
        println!(
            "{}  {:<12} {:<18} {:<8} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.device,
            record.kind,
            record.status,
            record.detail
        );
    }
    Ok(())
}

pub async fn templates_list(config: &AppConfig) -> anyhow::Result<()> {
    for template in config.template_store().list().await? {
        let origin = if template.builtin { "builtin" } else { "custom" };
        println!("{:<16} {:<8} {}", template.name, origin, template.description);
    }
    Ok(())
}

pub async fn templates_show(config: &AppConfig, name: &str) -> anyhow::Result<()> {
    let template = config.template_store().load(name).await?;
    println!("{}", template.content);
    Ok(())
}

pub async fn templates_create(config: &AppConfig, name: &str, file: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let template = config.template_store().create(name, text.lines()).await?;
    println!("Saved template '{}'", template.name);
    Ok(())
}
