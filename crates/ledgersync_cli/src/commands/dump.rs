//! Dump unacknowledged mutations from a device log.

use ledgersync_client::MutationLog;
use std::path::Path;
use tracing::info;

/// Prints unacknowledged mutations, oldest first.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "dumping mutation log");

    let log = MutationLog::open(path)?;
    let pending = log.replay()?;
    let limit = limit.unwrap_or(usize::MAX);

    for (id, record) in pending.iter().take(limit) {
        match format {
            "json" => {
                println!("{}", serde_json::to_string(record)?);
            }
            _ => {
                println!(
                    "#{id} {:?} {:?} {} base_version={} key={}",
                    record.operation,
                    record.entity_type,
                    record.entity_id,
                    record.base_version,
                    record.idempotency_key.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    if pending.len() > limit {
        println!("... {} more", pending.len() - limit);
    }

    Ok(())
}
