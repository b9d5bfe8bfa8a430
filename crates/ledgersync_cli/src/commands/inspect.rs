//! Summarize a device mutation log.

use ledgersync_client::MutationLog;
use ledgersync_protocol::Operation;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Prints pending-entry counts for a mutation log.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "inspecting mutation log");

    let log = MutationLog::open(path)?;
    let pending = log.replay()?;

    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    let mut monetary = 0usize;
    for (_, record) in &pending {
        let key = format!("{:?}/{:?}", record.entity_type, record.operation);
        *by_kind.entry(key).or_default() += 1;
        if record.entity_type.is_monetary() && record.operation == Operation::Create {
            monetary += 1;
        }
    }

    println!("Mutation log: {}", path.display());
    println!("Pending entries: {}", pending.len());
    println!("Pending monetary creates: {monetary}");

    if !by_kind.is_empty() {
        println!();
        println!("By kind:");
        for (kind, count) in &by_kind {
            println!("  {kind}: {count}");
        }
    }

    let missing_keys = pending
        .iter()
        .filter(|(_, r)| {
            r.entity_type.is_monetary()
                && r.operation == Operation::Create
                && r.idempotency_key.is_none()
        })
        .count();
    if missing_keys > 0 {
        println!();
        println!("WARNING: {missing_keys} monetary create(s) without an idempotency key");
    }

    Ok(())
}
