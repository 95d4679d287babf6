//! Tool batch aggregator: out-of-band metadata about tool invocations.
//!
//! Lifecycle events from the transport update this table directly, bypassing
//! the pacing buffer, since they are structural rather than textual. The
//! segment parser reads it on every render pass to decorate tool segments.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::warn;
use transport::ToolBatchInfo;

/// Metadata for one tool invocation, keyed by invocation id in the registry.
///
/// Created on "tool start" (or defensively on a stray "tool end"), finalized
/// in place when the end event arrives, never deleted during a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRecord {
    pub name: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub batch: Option<ToolBatchInfo>,
    /// False while the invocation is still executing.
    pub finished: bool,
}

/// Record table for one conversation turn.
///
/// Records are stored behind `Arc` and replaced wholesale on update, so a
/// reference handed to an in-progress parse is never mutated underneath it.
#[derive(Default)]
pub struct ToolCallRegistry {
    records: IndexMap<String, Arc<ToolInvocationRecord>>,
}

impl ToolCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or refresh) an active invocation.
    pub fn on_start(&mut self, name: &str, id: &str, batch: Option<ToolBatchInfo>) {
        let batch = self.validated_batch(id, batch);
        self.records.insert(
            id.to_string(),
            Arc::new(ToolInvocationRecord {
                name: name.to_string(),
                input_summary: None,
                output_summary: None,
                elapsed_ms: None,
                batch,
                finished: false,
            }),
        );
    }

    /// Finalize an invocation. Safe to call without a matching `on_start`
    /// and safe against duplicate delivery (last write wins).
    pub fn on_end(
        &mut self,
        name: &str,
        id: &str,
        input_summary: &str,
        output_summary: &str,
        elapsed_ms: Option<u64>,
        batch: Option<ToolBatchInfo>,
    ) {
        let existing_batch = self.records.get(id).and_then(|r| r.batch);
        let batch = self
            .validated_batch(id, batch)
            .or(existing_batch);

        self.records.insert(
            id.to_string(),
            Arc::new(ToolInvocationRecord {
                name: name.to_string(),
                input_summary: Some(input_summary.to_string()),
                output_summary: Some(output_summary.to_string()),
                elapsed_ms,
                batch,
                finished: true,
            }),
        );
    }

    /// Look up the record for a tool segment. With an id, the id must match
    /// and the name is cross-checked; without one, the most recent record
    /// with that name wins.
    pub fn lookup(&self, name: &str, id: Option<&str>) -> Option<Arc<ToolInvocationRecord>> {
        if let Some(id) = id {
            return self.records.get(id).filter(|r| r.name == name).cloned();
        }
        self.records.values().rev().find(|r| r.name == name).cloned()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.records.get(id).is_some_and(|r| !r.finished)
    }

    /// True while any invocation of `name` is still executing.
    pub fn has_active(&self, name: &str) -> bool {
        self.records.values().any(|r| r.name == name && !r.finished)
    }

    /// Wipe all records. Called at the start of each new conversational turn.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // Drop batch info that violates its own invariants, and flag size
    // mismatches within a batch (last write wins on conflict).
    fn validated_batch(&self, id: &str, batch: Option<ToolBatchInfo>) -> Option<ToolBatchInfo> {
        let batch = batch?;
        if batch.batch_index >= batch.batch_size {
            warn!(
                "invocation {id}: batch_index {} out of range for batch_size {}, ignoring batch info",
                batch.batch_index, batch.batch_size
            );
            return None;
        }
        if let Some(sibling) = self
            .records
            .values()
            .filter_map(|r| r.batch)
            .find(|b| b.batch_id == batch.batch_id && b.batch_size != batch.batch_size)
        {
            warn!(
                "batch {} reported with inconsistent sizes ({} vs {})",
                batch.batch_id, sibling.batch_size, batch.batch_size
            );
        }
        Some(batch)
    }
}
