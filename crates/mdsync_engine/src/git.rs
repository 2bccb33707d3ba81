//! Replication through the `git` command line.

use crate::replication::{EventFeed, ReplicationEvent, ReplicationPort};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use mdsync_storage::{ActivityGate, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

const REMOTE: &str = "origin";

/// Replicates the documents directory to a git remote.
///
/// Each step runs `git` in the documents directory and reports progress on
/// the event stream. Runs hold the shared [`ActivityGate`], so file
/// operations started meanwhile are asked to retry, and a run started while
/// files are being written is asked to retry in turn.
#[derive(Debug)]
pub struct GitReplication {
    root: PathBuf,
    gate: ActivityGate,
    feed: EventFeed,
    program: String,
}

impl GitReplication {
    /// Creates an adapter for the repository at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            gate: ActivityGate::new(),
            feed: EventFeed::new(),
            program: "git".to_string(),
        }
    }

    /// Shares `gate` with the file-system backend.
    pub fn with_gate(mut self, gate: ActivityGate) -> Self {
        self.gate = gate;
        self
    }

    /// Uses `program` instead of `git` from `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the repository directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn git(&self, args: &[&str]) -> PortResult<String> {
        let line = args.join(" ");
        self.feed.emit(ReplicationEvent::debug(format!("git {line}")));
        debug!(command = %line, "running git");

        let output = Command::new(&self.program)
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PortError::rejected("git executable not found"),
                _ => PortError::from(e),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("git {line} failed with {}", output.status)
        } else {
            stderr
        };
        self.feed.emit(ReplicationEvent::error(message.clone()));
        Err(PortError::rejected(message))
    }

    async fn succeeds(&self, args: &[&str]) -> bool {
        Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Stages everything and commits if anything changed.
    async fn commit_all(&self) -> PortResult<bool> {
        self.git(&["add", "-A"]).await?;
        if self.git(&["status", "--porcelain"]).await?.is_empty() {
            self.feed.emit(ReplicationEvent::debug("Nothing to commit"));
            return Ok(false);
        }
        let message = format!(
            "Update notes {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.git(&["commit", "-m", &message]).await?;
        Ok(true)
    }
}

#[async_trait]
impl ReplicationPort for GitReplication {
    async fn configure(
        &self,
        repo_url: &str,
        user_name: &str,
        user_email: &str,
    ) -> PortResult<()> {
        let _guard = self.gate.enter_replication()?;
        tokio::fs::create_dir_all(&self.root).await?;
        self.feed
            .emit(ReplicationEvent::info("Starting sync, Please wait..."));

        self.git(&["init"]).await?;
        self.git(&["config", "user.name", user_name]).await?;
        self.git(&["config", "user.email", user_email]).await?;
        if self.succeeds(&["remote", "get-url", REMOTE]).await {
            self.git(&["remote", "set-url", REMOTE, repo_url]).await?;
        } else {
            self.git(&["remote", "add", REMOTE, repo_url]).await?;
        }

        self.feed.emit(ReplicationEvent::info("Committing documents"));
        let committed = self.commit_all().await?;
        if !committed && !self.succeeds(&["rev-parse", "--verify", "HEAD"]).await {
            self.git(&["commit", "--allow-empty", "-m", "Initialize notes"])
                .await?;
        }

        self.feed.emit(ReplicationEvent::info("Pushing to remote"));
        self.git(&["push", "-u", REMOTE, "HEAD"]).await?;
        self.feed.emit(ReplicationEvent::info("Sync setup complete"));
        Ok(())
    }

    async fn sync(&self) -> PortResult<()> {
        let _guard = self.gate.enter_replication()?;
        self.feed.emit(ReplicationEvent::info("Syncing documents"));

        self.commit_all().await?;
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        self.feed.emit(ReplicationEvent::info("Pulling remote changes"));
        self.git(&["pull", "--rebase", REMOTE, &branch]).await?;
        self.feed.emit(ReplicationEvent::info("Pushing local changes"));
        self.git(&["push", REMOTE, &branch]).await?;
        self.feed.emit(ReplicationEvent::info("Sync complete"));
        Ok(())
    }

    fn subscribe(&self, buffer: usize) -> PortResult<mpsc::Receiver<ReplicationEvent>> {
        Ok(self.feed.subscribe(buffer))
    }
}
