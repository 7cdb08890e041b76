use anyhow::Result;

use lia::config::LiaConfig;
use lia::error::LiaError;
use lia::history::QueryHistory;
use lia::service::ServiceClient;

/// Print the `limit` most recent queries, newest first.
///
/// Asks a running service; when none is running the history file is read
/// directly rather than starting one.
pub async fn history(config: &LiaConfig, limit: usize) -> Result<()> {
    let client = ServiceClient::from_config(config).without_autostart();
    let entries = match client.history(limit).await {
        Ok(entries) => entries,
        Err(LiaError::IpcConnection { .. }) => {
            QueryHistory::new(config.resolved_history_path()).recent(limit)?
        }
        Err(e) => return Err(e.into()),
    };

    for (i, entry) in entries.iter().enumerate() {
        println!("{:>3}  {entry}", i + 1);
    }
    Ok(())
}
