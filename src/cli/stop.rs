use anyhow::Result;

use lia::config::LiaConfig;
use lia::service::ServiceClient;

/// Stop the resident matching service if it is running.
pub async fn stop(config: &LiaConfig) -> Result<()> {
    if ServiceClient::from_config(config).stop().await? {
        println!("Matching service stopped.");
    } else {
        println!("Matching service is not running.");
    }
    Ok(())
}
