//! Pure decisions about the machine client: its name, whether it drifted from
//! the template, and what it should look like afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{ClientSpec, Mapping};

/// Client name for this machine: `{template}_{host}` with each interior run of
/// hyphens in the host collapsed to one underscore.
#[must_use]
pub fn resolve_client_name(template: &str, host: &str, use_template_name: bool) -> String {
    if use_template_name {
        return template.to_string();
    }
    format!("{template}_{}", normalize_host(host))
}

#[must_use]
pub fn normalize_host(host: &str) -> String {
    let mut out = String::with_capacity(host.len());
    let mut in_run = false;
    for c in host.trim().trim_matches('-').chars() {
        if c == '-' {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// A single difference between the machine client and the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drift {
    ExtraMapping {
        depot_path: String,
        client_path: String,
    },
    MismatchedMapping {
        depot_path: String,
        expected: String,
        found: String,
    },
    MissingMapping {
        depot_path: String,
        client_path: String,
    },
    HostMismatch {
        expected: String,
        found: String,
    },
    RootMismatch {
        expected: String,
        found: String,
    },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::ExtraMapping {
                depot_path,
                client_path,
            } => write!(f, "extra mapping {depot_path} -> {client_path}"),
            Drift::MismatchedMapping {
                depot_path,
                expected,
                found,
            } => write!(
                f,
                "mapping for {depot_path} points to {found}, expected {expected}"
            ),
            Drift::MissingMapping {
                depot_path,
                client_path,
            } => write!(f, "missing mapping {depot_path} -> {client_path}"),
            Drift::HostMismatch { expected, found } => {
                write!(f, "host is '{found}', expected '{expected}'")
            }
            Drift::RootMismatch { expected, found } => {
                write!(f, "root is '{found}', expected '{expected}'")
            }
        }
    }
}

/// Compares an existing client against the view it should have, keyed by
/// depot path so that reordering alone is never drift.
pub fn detect_drift(
    expected_view: &[Mapping],
    existing: &ClientSpec,
    host: &str,
    root: &Path,
) -> Vec<Drift> {
    let mut drift = Vec::new();

    let expected: HashMap<&str, &str> = expected_view
        .iter()
        .map(|m| (m.depot_path.as_str(), m.client_path.as_str()))
        .collect();
    let actual: HashMap<&str, &str> = existing
        .view
        .iter()
        .map(|m| (m.depot_path.as_str(), m.client_path.as_str()))
        .collect();

    for mapping in &existing.view {
        match expected.get(mapping.depot_path.as_str()) {
            None => drift.push(Drift::ExtraMapping {
                depot_path: mapping.depot_path.clone(),
                client_path: mapping.client_path.clone(),
            }),
            Some(&client_path) if client_path != mapping.client_path => {
                drift.push(Drift::MismatchedMapping {
                    depot_path: mapping.depot_path.clone(),
                    expected: client_path.to_string(),
                    found: mapping.client_path.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for mapping in expected_view {
        if !actual.contains_key(mapping.depot_path.as_str()) {
            drift.push(Drift::MissingMapping {
                depot_path: mapping.depot_path.clone(),
                client_path: mapping.client_path.clone(),
            });
        }
    }

    if existing.host != host {
        drift.push(Drift::HostMismatch {
            expected: host.to_string(),
            found: existing.host.clone(),
        });
    }

    if Path::new(&existing.root) != root {
        drift.push(Drift::RootMismatch {
            expected: root.display().to_string(),
            found: existing.root.clone(),
        });
    }

    drift
}

/// What the controller has to do with the machine client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPlan {
    /// No client exists under the resolved name.
    Create(ClientSpec),
    /// The client exists but drifted; carries the repaired definition.
    Rebuild { spec: ClientSpec, drift: Vec<Drift> },
    UpToDate(ClientSpec),
}

impl ClientPlan {
    pub fn spec(&self) -> &ClientSpec {
        match self {
            ClientPlan::Create(spec) | ClientPlan::UpToDate(spec) => spec,
            ClientPlan::Rebuild { spec, .. } => spec,
        }
    }

    /// Whether the definition has to be written back to the server.
    #[must_use]
    pub fn needs_write(&self) -> bool {
        !matches!(self, ClientPlan::UpToDate(_))
    }

    /// Whether files synced under the previous view have to be discarded.
    #[must_use]
    pub fn needs_purge(&self) -> bool {
        matches!(self, ClientPlan::Rebuild { .. })
    }

    pub fn action(&self) -> &'static str {
        match self {
            ClientPlan::Create(_) => "create",
            ClientPlan::Rebuild { .. } => "rebuild",
            ClientPlan::UpToDate(_) => "up_to_date",
        }
    }
}

/// Inputs that decide what the machine client must look like.
#[derive(Debug, Clone)]
pub struct Target<'a> {
    pub name: &'a str,
    pub host: &'a str,
    pub root: &'a Path,
    pub user: &'a str,
    pub description: &'a str,
}

/// Decides whether to create, rebuild or keep the machine client. Refuses to
/// touch a client owned by somebody else.
pub fn plan_client(
    template: &ClientSpec,
    existing: Option<ClientSpec>,
    target: &Target<'_>,
) -> Result<ClientPlan> {
    let view = template.view_for(target.name);

    let Some(mut existing) = existing else {
        return Ok(ClientPlan::Create(ClientSpec {
            name: target.name.to_string(),
            owner: target.user.to_string(),
            host: target.host.to_string(),
            root: target.root.display().to_string(),
            description: target.description.to_string(),
            view,
            ..template.clone()
        }));
    };

    if existing.owner != target.user {
        return Err(Error::OwnershipConflict {
            client: existing.name,
            owner: existing.owner,
            user: target.user.to_string(),
        });
    }

    let drift = detect_drift(&view, &existing, target.host, target.root);
    if drift.is_empty() {
        return Ok(ClientPlan::UpToDate(existing));
    }

    existing.host = target.host.to_string();
    existing.root = target.root.display().to_string();
    existing.view = view;
    Ok(ClientPlan::Rebuild {
        spec: existing,
        drift,
    })
}
