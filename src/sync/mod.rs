//! The checkout controller.
//!
//! A run walks through a fixed sequence of steps and stops at the first
//! failure:
//!
//! 1. prepare the workspace root and check the server version
//! 2. verify the session is logged in
//! 3. read the template client
//! 4. resolve the machine client name
//! 5. create, rebuild or keep the machine client
//! 6. activate the machine client
//! 7. after a rebuild, purge the have-list and wipe the root
//! 8. revert and clean leftovers from earlier runs
//! 9. sync to the requested revision
//! 10. report the changelist the workspace now reflects
//!
//! The server-side purge (`sync -k ...#none`) always runs before the local
//! root is removed, so the have-list never lists files that are not on disk.

mod reconcile;

pub use reconcile::{
    ClientPlan, Drift, Target, detect_drift, normalize_host, plan_client, resolve_client_name,
};

use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::client::{client_exists, fetch_client, save_client};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::p4::{CommandRunner, P4Env, RunOptions, run_plain, run_tagged};
use crate::types::Version;

/// Oldest server release the checkout sequence is known to work against.
pub const MINIMUM_SERVER_VERSION: Version = Version::new(2020, 1);

/// Non-zero exits from `revert` that only mean there was nothing to revert.
const REVERT_NOTHING_TO_DO: &[&str] = &["file(s) not opened"];

/// Non-zero exits from `clean` that only mean the workspace is already clean.
const CLEAN_NOTHING_TO_DO: &[&str] = &["no file(s) to reconcile", "file(s) up-to-date"];

/// Result of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub client: String,
    /// Changelist the workspace now reflects, or the requested revision
    /// specifier when no submitted change is synced.
    pub revision: String,
    pub created: bool,
    pub rebuilt: bool,
}

/// What a checkout would do, computed without writing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub client: String,
    pub host: String,
    pub server_version: String,
    pub action: &'static str,
    pub drift: Vec<Drift>,
}

#[derive(Debug, Clone)]
struct ServerInfo {
    version: Version,
    client_host: Option<String>,
}

struct Resolution {
    client: String,
    host: String,
    server_version: Version,
    plan: ClientPlan,
}

pub struct Synchronizer<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
}

impl<'a, R: CommandRunner + ?Sized> Synchronizer<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Brings the workspace root to the revision named in `settings`.
    pub async fn synchronize(&self, settings: &Settings) -> Result<SyncOutcome> {
        settings.validate()?;
        let env = session_env(settings);

        info!("Preparing workspace root {}", settings.root.display());
        prepare_root(&settings.root).await?;

        let resolution = self.resolve(settings, &env).await?;
        let client = resolution.client;
        let plan = resolution.plan;

        match &plan {
            ClientPlan::Create(spec) => {
                info!("Creating client {client}");
                save_client(self.runner, &env, spec).await?;
            }
            ClientPlan::Rebuild { spec, .. } => {
                info!("Rebuilding client {client} from template {}", settings.template);
                save_client(self.runner, &env, spec).await?;
            }
            ClientPlan::UpToDate(_) => {
                info!("Client {client} matches template {}", settings.template);
            }
        }

        let env = env.with_client(&client);
        let depot = format!("//{client}/...");

        if plan.needs_purge() || settings.force_clean {
            info!("Purging workspace {client}");
            run_plain(
                self.runner,
                &env,
                &["sync", "-k", &format!("{depot}#none")],
                RunOptions::STRICT,
            )
            .await?;
            recreate_root(&settings.root).await?;
        }

        info!("Restoring checkout directory");
        self.restore(&env, "revert", &depot, REVERT_NOTHING_TO_DO).await?;
        self.restore(&env, "clean", &depot, CLEAN_NOTHING_TO_DO).await?;

        let target_rev = revspec(&settings.reference);
        info!("Syncing {depot}{target_rev}");
        run_plain(
            self.runner,
            &env,
            &["sync", &format!("{depot}{target_rev}")],
            RunOptions::STRICT,
        )
        .await?;

        let revision = self.current_change(&env, &depot).await?.unwrap_or(target_rev);
        info!("Workspace {client} is at {revision}");

        Ok(SyncOutcome {
            created: matches!(plan, ClientPlan::Create(_)),
            rebuilt: matches!(plan, ClientPlan::Rebuild { .. }),
            client,
            revision,
        })
    }

    /// Runs the read-only part of a checkout and reports the decision.
    pub async fn plan(&self, settings: &Settings) -> Result<PlanReport> {
        settings.validate()?;
        let env = session_env(settings);
        let resolution = self.resolve(settings, &env).await?;

        let drift = match &resolution.plan {
            ClientPlan::Rebuild { drift, .. } => drift.clone(),
            _ => Vec::new(),
        };

        Ok(PlanReport {
            action: resolution.plan.action(),
            client: resolution.client,
            host: resolution.host,
            server_version: resolution.server_version.to_string(),
            drift,
        })
    }

    async fn resolve(&self, settings: &Settings, env: &P4Env) -> Result<Resolution> {
        let server = self.check_server(settings, env).await?;
        self.check_login(settings, env).await?;

        info!("Reading template client {}", settings.template);
        if !client_exists(self.runner, env, &settings.template).await? {
            return Err(Error::TemplateNotFound(settings.template.clone()));
        }
        let template = fetch_client(self.runner, env, &settings.template).await?;

        let host = settings
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or(server.client_host)
            .ok_or_else(|| Error::Config("unable to determine the host name".into()))?;

        let client = resolve_client_name(&settings.template, &host, settings.use_template_name);
        info!("Using client {client} on host {host}");

        let existing = if client == settings.template {
            Some(template.clone())
        } else if client_exists(self.runner, env, &client).await? {
            Some(fetch_client(self.runner, env, &client).await?)
        } else {
            None
        };

        let description = format!(
            "Created by p4checkout for host {host} from template {} at {}.\n",
            settings.template,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        let target = Target {
            name: &client,
            host: &host,
            root: &settings.root,
            user: &settings.user,
            description: &description,
        };
        let plan = plan_client(&template, existing, &target)?;

        if let ClientPlan::Rebuild { drift, .. } = &plan {
            for item in drift {
                warn!("Client {client} drifted from template: {item}");
            }
        }

        Ok(Resolution {
            client,
            host,
            server_version: server.version,
            plan,
        })
    }

    async fn check_server(&self, settings: &Settings, env: &P4Env) -> Result<ServerInfo> {
        if settings.is_ssl() {
            info!("Trusting server fingerprint for {}", settings.port);
            run_plain(self.runner, env, &["trust", "-y"], RunOptions::STRICT).await?;
        }

        let records = run_tagged(self.runner, env, &["info"]).await?;
        let record = records.first();
        let raw = record
            .and_then(|r| r.get("serverVersion"))
            .unwrap_or_default();

        let version = Version::from_server_version(raw);
        if !version.is_valid() {
            return Err(Error::UnparsableServerVersion(raw.to_string()));
        }
        if !version.compare_at_least(&MINIMUM_SERVER_VERSION)? {
            return Err(Error::UnsupportedServerVersion {
                found: version.to_string(),
                required: MINIMUM_SERVER_VERSION.to_string(),
            });
        }
        info!("Server version {version}");

        Ok(ServerInfo {
            version,
            client_host: record
                .and_then(|r| r.get("clientHost"))
                .map(str::to_string),
        })
    }

    async fn check_login(&self, settings: &Settings, env: &P4Env) -> Result<()> {
        let output = run_plain(self.runner, env, &["login", "-s"], RunOptions::TOLERANT).await?;
        if !output.is_success() {
            return Err(Error::Authentication {
                user: settings.user.clone(),
                output: output.text(),
            });
        }
        Ok(())
    }

    /// Runs a workspace cleanup command. A non-zero exit is accepted only when
    /// the output says there was nothing to do.
    async fn restore(
        &self,
        env: &P4Env,
        command: &str,
        depot: &str,
        nothing_to_do: &[&str],
    ) -> Result<()> {
        let output = run_plain(self.runner, env, &[command, depot], RunOptions::TOLERANT).await?;
        if output.is_success() {
            return Ok(());
        }

        let text = output.text();
        if nothing_to_do.iter().any(|message| text.contains(message)) {
            debug!("{command} had nothing to do: {text}");
            return Ok(());
        }
        Err(Error::CommandFailed {
            command: format!("{command} {depot}"),
            exit_code: output.exit_code,
            output: text,
        })
    }

    async fn current_change(&self, env: &P4Env, depot: &str) -> Result<Option<String>> {
        let records = run_tagged(
            self.runner,
            env,
            &["changes", "-m1", "-s", "submitted", &format!("{depot}#have")],
        )
        .await?;
        Ok(records
            .first()
            .and_then(|r| r.get("change"))
            .map(str::to_string))
    }
}

/// Session for the configured server and user. A host override is exported
/// as `P4HOST` so client-bound commands pass the server's host check.
fn session_env(settings: &Settings) -> P4Env {
    let env = P4Env::new(&settings.port, &settings.user);
    match settings.host.as_deref() {
        Some(host) if !host.trim().is_empty() => env.with_host(host),
        _ => env,
    }
}

/// Normalizes a user supplied reference into a revision specifier.
#[must_use]
pub fn revspec(reference: &str) -> String {
    let reference = reference.trim();
    if reference.is_empty() {
        return "#head".to_string();
    }
    if reference.starts_with('@') || reference.starts_with('#') {
        return reference.to_string();
    }
    format!("@{reference}")
}

/// Makes sure `root` is a directory, removing a file that occupies the path.
pub async fn prepare_root(root: &Path) -> Result<()> {
    match fs::symlink_metadata(root).await {
        Ok(metadata) if metadata.is_dir() => return Ok(()),
        Ok(_) => {
            warn!("Removing non-directory at workspace root {}", root.display());
            fs::remove_file(root).await?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    fs::create_dir_all(root).await?;
    if !fs::metadata(root).await?.is_dir() {
        return Err(Error::RootNotDirectory(root.to_path_buf()));
    }
    Ok(())
}

async fn recreate_root(root: &Path) -> Result<()> {
    info!("Recreating workspace root {}", root.display());
    match fs::remove_dir_all(root).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(root).await?;
    Ok(())
}
