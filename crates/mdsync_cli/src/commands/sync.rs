//! Replication commands.

use super::{CommandResult, Session};
use std::future::Future;

async fn reporting<F>(session: &Session, attempt: F) -> CommandResult
where
    F: Future<Output = mdsync_engine::SyncResult<()>>,
{
    let mut subscription = session.engine.subscribe();
    // Events are appended ahead of the closing status message.
    let result = attempt.await;
    subscription.cancel();

    for message in session.engine.status().messages {
        println!("{message}");
    }
    Ok(result?)
}

/// Runs the sync-setup command.
pub async fn setup(
    session: &Session,
    repo_url: &str,
    user_name: &str,
    user_email: &str,
) -> CommandResult {
    reporting(
        session,
        session.engine.configure(repo_url, user_name, user_email),
    )
    .await
}

/// Runs the sync command.
pub async fn run(session: &Session) -> CommandResult {
    reporting(session, session.engine.sync()).await
}
