//! Materialization and batched persistence of connection contexts

use std::sync::Arc;

use crate::codec::value;
use crate::context::context::{compress, decompress, ConnectionContext};
use crate::context::tracker::{Change, TrackedContext};
use crate::error::Result;
use crate::state::PubSubStore;

/// Per-invocation handle to one connection's context record
///
/// The first `load` within an invocation reads the backing hash; later
/// calls reuse the materialized state. `flush` drains recorded changes in
/// order, grouping contiguous same-op runs into one hash operation each.
pub struct ContextStore {
    connection_id: String,
    store: Arc<dyn PubSubStore>,
    tracked: Option<TrackedContext>,
}

impl ContextStore {
    pub fn new(connection_id: impl Into<String>, store: Arc<dyn PubSubStore>) -> Self {
        Self {
            connection_id: connection_id.into(),
            store,
            tracked: None,
        }
    }

    /// Load the context, memoized for the rest of the invocation. A missing
    /// record materializes as the default context.
    pub async fn load(&mut self) -> Result<&mut TrackedContext> {
        if self.tracked.is_none() {
            let fields = self.store.read_context(&self.connection_id).await?;
            let context = if fields.is_empty() {
                ConnectionContext::default()
            } else {
                decompress(&fields)
            };
            tracing::debug!(
                connection_id = %self.connection_id,
                fields = fields.len(),
                "Loaded connection context"
            );
            self.tracked = Some(TrackedContext::new(context));
        }
        Ok(self.tracked.get_or_insert_with(TrackedContext::default))
    }

    /// Replace the stored record with a freshly built context, bypassing
    /// change tracking. One round trip.
    pub async fn create(&mut self, context: ConnectionContext) -> Result<()> {
        let fields = compress(&context);
        self.store.put_context(&self.connection_id, fields).await?;
        self.tracked = Some(TrackedContext::new(context));
        Ok(())
    }

    /// Persist all pending changes. Idempotent; a failed batch is logged,
    /// re-queued ahead of newer changes, and the error is surfaced so the
    /// invocation does not acknowledge lost writes.
    pub async fn flush(&mut self) -> Result<()> {
        let changes = match self.tracked.as_mut() {
            Some(tracked) => tracked.take_changes(),
            None => return Ok(()),
        };
        if changes.is_empty() {
            return Ok(());
        }

        let mut applied = 0usize;
        for batch in batch_changes(&changes) {
            let result = match &batch {
                Batch::Set(fields) => {
                    self.store
                        .set_context_fields(&self.connection_id, fields)
                        .await
                }
                Batch::Del(fields) => {
                    self.store
                        .remove_context_fields(&self.connection_id, fields)
                        .await
                }
            };

            match result {
                Ok(()) => applied += batch.len(),
                Err(err) => {
                    tracing::error!(
                        connection_id = %self.connection_id,
                        error = %err,
                        "Failed to persist context batch; changes re-queued for the next flush"
                    );
                    let remaining = changes[applied..].to_vec();
                    if let Some(tracked) = self.tracked.as_mut() {
                        tracked.restore_changes(remaining);
                    }
                    return Err(err);
                }
            }
        }

        tracing::debug!(
            connection_id = %self.connection_id,
            changes = applied,
            "Flushed connection context"
        );
        Ok(())
    }
}

enum Batch {
    Set(Vec<(String, String)>),
    Del(Vec<String>),
}

impl Batch {
    fn len(&self) -> usize {
        match self {
            Batch::Set(fields) => fields.len(),
            Batch::Del(fields) => fields.len(),
        }
    }
}

/// Group contiguous same-op runs so a flush issues one hash operation per
/// run, preserving the order writes were observed in.
fn batch_changes(changes: &[Change]) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();

    for change in changes {
        match change {
            Change::Set { path, value } => {
                let encoded = (path.clone(), value::encode(value));
                match batches.last_mut() {
                    Some(Batch::Set(fields)) => fields.push(encoded),
                    _ => batches.push(Batch::Set(vec![encoded])),
                }
            }
            Change::Del { path } => match batches.last_mut() {
                Some(Batch::Del(fields)) => fields.push(path.clone()),
                _ => batches.push(Batch::Del(vec![path.clone()])),
            },
        }
    }

    batches
}
