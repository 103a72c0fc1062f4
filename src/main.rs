use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use p4checkout::config::{Settings, SettingsFile};
use p4checkout::p4::P4Process;
use p4checkout::sync::{PlanReport, SyncOutcome, Synchronizer};

#[derive(Parser)]
#[command(name = "p4checkout")]
#[command(about = "Check out a Perforce workspace derived from a template client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the machine client and sync it to the requested revision
    Sync {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Purge and recreate the workspace even if the client has not drifted
        #[arg(long)]
        force_clean: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Append `revision=` and `client=` lines to this file (e.g. a CI step output file)
        #[arg(long, env = "GITHUB_OUTPUT")]
        output_file: Option<PathBuf>,
    },

    /// Show what `sync` would do to the machine client without changing anything
    Plan {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SettingsArgs {
    /// TOML file with defaults for the options below
    #[arg(long, env = "P4CHECKOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Template client whose view is copied
    #[arg(long, env = "P4CHECKOUT_TEMPLATE")]
    template: Option<String>,

    /// Use the template client itself instead of a host-qualified client
    #[arg(long, env = "P4CHECKOUT_USE_TEMPLATE_NAME")]
    use_template_name: bool,

    /// Absolute path of the workspace root
    #[arg(long, env = "P4CHECKOUT_ROOT")]
    root: Option<PathBuf>,

    /// Changelist, label or revision specifier to sync to (default: head)
    #[arg(long = "ref", env = "P4CHECKOUT_REF")]
    reference: Option<String>,

    /// Perforce user that owns the machine client
    #[arg(long, env = "P4USER")]
    user: Option<String>,

    /// Perforce server address
    #[arg(long, env = "P4PORT")]
    port: Option<String>,

    /// Host name used for the client name and its Host field
    #[arg(long, env = "HOSTNAME")]
    host: Option<String>,

    /// Path to the p4 executable
    #[arg(long, env = "P4CHECKOUT_P4_BIN")]
    p4_bin: Option<PathBuf>,
}

impl SettingsArgs {
    fn into_settings(self, force_clean: bool) -> anyhow::Result<Settings> {
        let file = match &self.config {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::default(),
        };

        let Some(template) = self.template.or(file.template) else {
            bail!("Missing template client. Pass --template or set `template` in the settings file.");
        };
        let Some(root) = self.root.or(file.root) else {
            bail!("Missing workspace root. Pass --root or set `root` in the settings file.");
        };
        let Some(user) = self.user.or(file.user) else {
            bail!("Missing Perforce user. Pass --user, set P4USER, or set `user` in the settings file.");
        };
        let Some(port) = self.port.or(file.port) else {
            bail!("Missing Perforce server. Pass --port, set P4PORT, or set `port` in the settings file.");
        };

        Ok(Settings {
            template,
            use_template_name: self.use_template_name || file.use_template_name.unwrap_or(false),
            root,
            reference: self.reference.or(file.reference).unwrap_or_default(),
            user,
            port,
            host: self.host.or(file.host),
            p4_bin: self
                .p4_bin
                .or(file.p4_bin)
                .unwrap_or_else(|| PathBuf::from("p4")),
            force_clean,
        })
    }
}

fn write_output_file(path: &Path, outcome: &SyncOutcome) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file {}", path.display()))?;
    writeln!(file, "revision={}", outcome.revision)?;
    writeln!(file, "client={}", outcome.client)?;
    Ok(())
}

fn print_plan(report: &PlanReport) {
    println!("client:  {}", report.client);
    println!("host:    {}", report.host);
    println!("server:  {}", report.server_version);
    println!("action:  {}", report.action);
    for item in &report.drift {
        println!("  - {item}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("p4checkout=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            settings,
            force_clean,
            json,
            output_file,
        } => {
            let settings = settings.into_settings(force_clean)?;
            let runner = P4Process::new(&settings.p4_bin);
            let outcome = Synchronizer::new(&runner).synchronize(&settings).await?;

            if let Some(path) = output_file {
                write_output_file(&path, &outcome)?;
                info!("Wrote outputs to {}", path.display());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.revision);
            }
        }
        Commands::Plan { settings, json } => {
            let settings = settings.into_settings(false)?;
            let runner = P4Process::new(&settings.p4_bin);
            let report = Synchronizer::new(&runner).plan(&settings).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_plan(&report);
            }
        }
    }

    Ok(())
}
