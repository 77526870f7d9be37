use anyhow::Result;

use super::database::Database;
use super::legacy_history::HistoriesFile;

/// Copy every chat from the multi-chat JSON document into the database.
///
/// The whole file is saved as one batch, so a failure imports nothing.
/// Returns the number of chats imported.
pub async fn import_histories(db: &Database, source: &HistoriesFile) -> Result<usize> {
    let chats = source.load().await;
    if chats.is_empty() {
        tracing::info!("No chats to import from {}", source.path().display());
        return Ok(0);
    }

    let count = chats.len();
    db.save_histories(chats).await?;
    tracing::info!("Imported {} chats from {}", count, source.path().display());
    Ok(count)
}
