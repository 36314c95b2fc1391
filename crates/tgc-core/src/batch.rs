use tracing::{debug, info};

use crate::{
    domain::{BatchResult, IdentifierKind, ResolutionOutcome},
    ports::{BatchProgress, DirectoryTransport, ProgressSink},
    resolver::Resolver,
    validation::validate,
    Result,
};

/// Resolve `raw` identifiers one at a time, in order.
///
/// Entries that are blank after trimming are skipped. Every other entry gets
/// exactly one outcome keyed by its trimmed text; a repeated key keeps its
/// first position and takes the latest outcome. Only a missing authorization
/// fails the whole call, and it does so before any item is touched.
pub async fn run_batch<T: DirectoryTransport>(
    resolver: &Resolver<'_, T>,
    raw: &[String],
    kind: IdentifierKind,
    progress: &dyn ProgressSink,
) -> Result<BatchResult> {
    resolver.ensure_authorized()?;

    let total = raw.len();
    info!(total, kind = %kind, "batch started");

    let mut result = BatchResult::new();
    for (idx, item) in raw.iter().enumerate() {
        let key = item.trim();
        if key.is_empty() {
            continue;
        }

        let outcome = match validate(key, kind) {
            Ok(id) => resolver
                .resolve(&id)
                .await
                .unwrap_or_else(|e| ResolutionOutcome::Failed(e.kind(), e.to_string())),
            Err(e) => ResolutionOutcome::Failed(e.kind(), e.to_string()),
        };
        debug!(identifier = %key, found = outcome.is_found(), "item resolved");
        result.insert(key.to_string(), outcome);

        progress.on_item(&BatchProgress {
            index: idx + 1,
            total,
            identifier: key.to_string(),
        });
    }

    info!(
        total,
        resolved = result.len(),
        found = result.found_count(),
        "batch finished"
    );
    Ok(result)
}

/// Split free-form input (commas and/or newlines) into raw identifiers.
pub fn split_identifiers(input: &str) -> Vec<String> {
    input
        .split(|c| c == ',' || c == '\n' || c == '\r')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
