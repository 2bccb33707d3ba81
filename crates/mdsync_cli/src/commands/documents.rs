//! Document commands.

use super::{CommandResult, Format, Session};
use mdsync_core::{Document, MarkdownTidy};
use tracing::info;

fn describe(doc: &Document) -> String {
    let modified = doc
        .modified
        .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{modified}  {}", doc.relative_path)
}

/// Runs the list command.
pub async fn list(session: &Session, format: Format) -> CommandResult {
    let docs = session.coordinator.list_all().await?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&docs)?),
        Format::Text => {
            if docs.is_empty() {
                println!("No documents in {}", session.root().display());
            }
            for doc in &docs {
                println!("{}", describe(doc));
            }
        }
    }
    Ok(())
}

/// Runs the open command, printing the content to stdout.
pub async fn open(session: &Session, document: &str) -> CommandResult {
    let doc = session.resolve(document).await?;
    let content = session.coordinator.open(&doc.id).await?;
    print!("{content}");
    Ok(())
}

/// Runs the add command.
pub async fn add(session: &Session, file_name: &str) -> CommandResult {
    let doc = session.coordinator.add(file_name).await?;
    info!(id = %doc.id, "document created");
    println!("{}", doc.id);
    Ok(())
}

/// Runs the save command with `content` as the new buffer.
pub async fn save(session: &Session, document: &str, content: String, tidy: bool) -> CommandResult {
    let doc = session.resolve(document).await?;
    let saved = if tidy {
        let coordinator = session.formatting(MarkdownTidy);
        coordinator.open(&doc.id).await?;
        coordinator.mark_edited(content);
        coordinator.save().await?
    } else {
        session.coordinator.open(&doc.id).await?;
        session.coordinator.mark_edited(content);
        session.coordinator.save().await?
    };
    println!("Saved {}", describe(&saved));
    Ok(())
}

/// Runs the delete command.
pub async fn delete(session: &Session, document: &str) -> CommandResult {
    let doc = session.resolve(document).await?;
    session.coordinator.delete(&doc.id).await?;
    println!("Deleted {}", doc.relative_path);
    Ok(())
}

/// Runs the rename command.
pub async fn rename(session: &Session, document: &str, new_name: &str) -> CommandResult {
    let doc = session.resolve(document).await?;
    session.coordinator.rename(&doc.id, new_name).await?;
    println!("Renamed {} to {new_name}", doc.relative_path);
    Ok(())
}
