//! Reading and writing client definitions on the server.

mod spec;

pub use spec::{from_record, to_spec_form};

use tracing::debug;

use crate::error::{Error, Result};
use crate::p4::{CommandRunner, P4Env, RunOptions, run_tagged};
use crate::types::ClientSpec;

/// Fetches a client definition. For a name that does not exist the server
/// returns a default definition, so use [`client_exists`] to tell them apart.
pub async fn fetch_client<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &P4Env,
    name: &str,
) -> Result<ClientSpec> {
    let records = run_tagged(runner, env, &["client", "-o", name]).await?;
    let record = records.first().ok_or_else(|| Error::MalformedRecord {
        record: format!("client {name}"),
        field: "Client".to_string(),
    })?;
    from_record(record)
}

pub async fn client_exists<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &P4Env,
    name: &str,
) -> Result<bool> {
    let records = run_tagged(runner, env, &["clients", "-e", name]).await?;
    Ok(records.iter().any(|r| r.get("client") == Some(name)))
}

/// Creates or replaces a client definition.
pub async fn save_client<R: CommandRunner + ?Sized>(
    runner: &R,
    env: &P4Env,
    spec: &ClientSpec,
) -> Result<()> {
    let form = to_spec_form(spec);
    debug!("writing client {}:\n{form}", spec.name);
    let args = vec!["client".to_string(), "-i".to_string()];
    runner
        .run(env, &args, Some(form.as_bytes()), RunOptions::STRICT)
        .await?;
    Ok(())
}
