//! Deploy command implementation.

use anyhow::{Context, Result};
use couchify_client::{CouchClient, Remote};
use couchify_types::DesignDocument;
use std::process::ExitCode;

/// Upload `doc` and print the server's answer
///
/// A response without `ok` is printed to stderr and yields a failing exit code.
pub async fn deploy(
    remote: &str,
    db: &str,
    credentials: Option<(String, String)>,
    doc: &DesignDocument,
) -> Result<ExitCode> {
    let remote = Remote::parse(remote).context("could not deploy")?;
    tracing::info!("Deploying {} to {}/{}", doc.id, remote, db);

    let mut client = CouchClient::new(remote).context("could not deploy")?;
    if let Some((user, pass)) = credentials {
        client = client.with_credentials(user, pass);
    }

    let response = client.deploy(db, doc).await.context("could not deploy")?;

    if response.ok {
        println!("{}", serde_json::to_string(&response)?);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "unexpected response: \n{}",
            serde_json::to_string_pretty(&response)?
        );
        Ok(ExitCode::FAILURE)
    }
}
