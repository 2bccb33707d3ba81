//! Status command implementation.

use super::{CommandResult, Format, Session};
use mdsync_core::ReplicationConfig;
use serde::Serialize;

/// Status report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Documents directory.
    pub root: String,
    /// Number of documents.
    pub document_count: usize,
    /// Saved replication settings.
    pub replication: ReplicationConfig,
}

/// Runs the status command.
pub async fn run(session: &Session, format: Format) -> CommandResult {
    let docs = session.coordinator.list_all().await?;
    let report = StatusReport {
        root: session.root().display().to_string(),
        document_count: docs.len(),
        replication: session.engine.config(),
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("Documents:   {} in {}", report.document_count, report.root);
            let replication = &report.replication;
            if replication.enabled {
                println!(
                    "Git sync:    enabled ({})",
                    replication.repo_url.as_deref().unwrap_or("-")
                );
                println!(
                    "Author:      {} <{}>",
                    replication.user_name.as_deref().unwrap_or("-"),
                    replication.user_email.as_deref().unwrap_or("-")
                );
            } else {
                println!("Git sync:    disabled");
            }
        }
    }
    Ok(())
}
