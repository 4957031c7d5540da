// droidscan - terminal front-end for the scan controller.
//
// Parses arguments, loads config, runs one controller operation and prints
// the resulting state. All scan/uninstall/export logic lives in the library.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;

use droidscan::scanner::types::suspicious_apps;
use droidscan::{
    bulk_uninstall, BatchError, ClientConfig, HttpTransport, InventorySummary, ScanController,
    Selection, SessionState,
};

#[derive(Parser)]
#[command(name = "droidscan", version, about = "Scan a connected Android device for risky apps")]
struct Cli {
    /// Base URL of the scanning service (overrides config and DROIDSCAN_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the device and list installed apps
    Scan,
    /// Uninstall one or more packages, rescanning after each
    Uninstall {
        #[arg(required = true)]
        packages: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Export the scan report as CSV
    Export {
        /// Destination file (defaults to the configured report file name)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Only include apps with dangerous permissions
        #[arg(long)]
        suspicious_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    droidscan::init_logging();
    let cli = Cli::parse();

    let mut config =
        ClientConfig::load_with(cli.base_url).context("Failed to load configuration")?;
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }

    let controller = droidscan::connect(&config).context("Failed to set up HTTP client")?;

    match cli.command {
        Command::Scan => {
            controller.scan().await.context("Scan failed")?;
            print_state(&controller.snapshot());
        }
        Command::Uninstall { packages, yes } => {
            run_uninstall(&controller, packages, yes).await?;
        }
        Command::Export {
            out,
            suspicious_only,
        } => {
            let dest = out.unwrap_or_else(|| PathBuf::from(&config.report_filename));
            run_export(&controller, &dest, suspicious_only).await?;
        }
    }
    Ok(())
}

async fn run_uninstall(
    controller: &ScanController<HttpTransport>,
    packages: Vec<String>,
    yes: bool,
) -> Result<()> {
    let mut selection: Selection = packages.into_iter().collect();

    if !yes {
        let prompt = format!(
            "Uninstall these apps?\n  {}\n",
            selection.iter().collect::<Vec<_>>().join("\n  ")
        );
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    match bulk_uninstall(controller, &mut selection).await {
        Ok(report) => {
            println!("Uninstall commands sent. Scan refreshed.");
            for package in &report.rejected_by_device {
                println!("  warning: device did not confirm removal of {}", package);
            }
            print_state(&controller.snapshot());
            Ok(())
        }
        Err(BatchError::Failed {
            package,
            completed,
            source,
        }) => {
            if !completed.is_empty() {
                println!("Uninstalled: {}", completed.join(", "));
            }
            println!(
                "Not processed: {}",
                selection.iter().collect::<Vec<_>>().join(", ")
            );
            bail!("Uninstall of {} failed: {}", package, source)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_export(
    controller: &ScanController<HttpTransport>,
    dest: &Path,
    suspicious_only: bool,
) -> Result<()> {
    let exported = if suspicious_only {
        controller.scan().await.context("Scan failed")?;
        let subset = suspicious_apps(&controller.snapshot().apps);
        controller.export_report(Some(&subset)).await
    } else {
        controller.export_report(None).await
    };
    let info = exported.context("Export failed")?;

    let written = controller.save_export_to(dest)?;
    controller.release_export_handle()?;
    println!(
        "Saved report to {} ({} bytes, generated {})",
        dest.display(),
        written,
        info.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn print_state(state: &SessionState) {
    match &state.device_info {
        Some(device) => {
            println!("Device");
            println!("  Model:   {}", device.model);
            println!("  Serial:  {}", device.serial);
            println!("  Android: {}", device.android_version);
            for line in device.battery_info.lines() {
                println!("  | {}", line.trim_end());
            }
        }
        None => println!("No device info."),
    }
    println!();

    if state.apps.is_empty() {
        println!("No apps found. Run a scan.");
        return;
    }

    let summary = InventorySummary::from_apps(&state.apps);
    println!(
        "Installed apps: {} ({} with dangerous permissions)",
        summary.total, summary.suspicious
    );
    let width = state.apps.iter().map(|a| a.package.len()).max().unwrap_or(7);
    println!("  {:<width$}  {:<24}  {:<10}  DANGEROUS PERMS", "PACKAGE", "INSTALLER", "STATUS");
    for app in &state.apps {
        let perms = if app.is_suspicious() {
            app.dangerous_permissions.join(", ")
        } else {
            "None".to_string()
        };
        let flag = if app.is_suspicious() { "!" } else { " " };
        println!(
            "{} {:<width$}  {:<24}  {:<10}  {}",
            flag, app.package, app.installer, app.status, perms
        );
    }
}
