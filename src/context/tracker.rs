//! Change-recording wrapper over the loaded context
//!
//! Every write goes through `set`/`del`, which update the in-memory tree
//! and record the mutation for the next flush. Scalar writes that match
//! the current value record nothing; container assignments are expanded to
//! one recorded change per leaf, so the persisted hash never holds nested
//! JSON.

use serde_json::Value;

use crate::codec::flatten;
use crate::context::context::{
    ConnectionContext, FIELD_ACK, FIELD_CONNECTION_PARAMS, FIELD_EXTRA, FIELD_INIT,
    FIELD_SUBSCRIPTIONS,
};

/// One recorded mutation, addressed by its dotted path
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set { path: String, value: Value },
    Del { path: String },
}

/// The loaded context plus its pending changes
#[derive(Debug, Default)]
pub struct TrackedContext {
    context: ConnectionContext,
    changes: Vec<Change>,
}

impl TrackedContext {
    pub fn new(context: ConnectionContext) -> Self {
        Self {
            context,
            changes: Vec::new(),
        }
    }

    /// Read-only view of the current state
    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Owned copy of the current state, for handing to hooks
    pub fn snapshot(&self) -> ConnectionContext {
        self.context.clone()
    }

    /// Write a value at a dotted path. Scalars equal to the current value
    /// are dropped; containers are expanded to their leaves.
    pub fn set(&mut self, path: &str, value: Value) {
        if value.is_object() || value.is_array() {
            let changes: Vec<Change> = flatten::leaves(path, &value)
                .into_iter()
                .map(|(leaf_path, leaf)| Change::Set {
                    path: leaf_path,
                    value: leaf,
                })
                .collect();
            self.apply(path, value);
            self.changes.extend(changes);
            return;
        }

        if self.current(path).as_ref() == Some(&value) {
            return;
        }
        self.apply(path, value.clone());
        self.changes.push(Change::Set {
            path: path.to_string(),
            value,
        });
    }

    /// Delete the value at a dotted path
    pub fn del(&mut self, path: &str) {
        self.remove(path);
        self.changes.push(Change::Del {
            path: path.to_string(),
        });
    }

    pub fn set_init_received(&mut self, flag: bool) {
        self.set(FIELD_INIT, Value::Bool(flag));
    }

    pub fn set_acknowledged(&mut self, flag: bool) {
        self.set(FIELD_ACK, Value::Bool(flag));
    }

    pub fn set_connection_params(&mut self, params: Value) {
        self.set(FIELD_CONNECTION_PARAMS, params);
    }

    /// Changes recorded since the last flush
    pub fn pending_changes(&self) -> &[Change] {
        &self.changes
    }

    pub(crate) fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    /// Re-queue changes that failed to persist, ahead of anything recorded
    /// since, so the next flush replays them in the original order.
    pub(crate) fn restore_changes(&mut self, mut unflushed: Vec<Change>) {
        unflushed.extend(self.changes.drain(..));
        self.changes = unflushed;
    }

    fn current(&self, path: &str) -> Option<Value> {
        let segments = flatten::split_path(path);
        let (head, rest) = segments.split_first()?;

        match *head {
            FIELD_INIT => rest
                .is_empty()
                .then(|| Value::Bool(self.context.connection_init_received)),
            FIELD_ACK => rest.is_empty().then(|| Value::Bool(self.context.acknowledged)),
            FIELD_CONNECTION_PARAMS => {
                let params = self.context.connection_params.as_ref()?;
                if rest.is_empty() {
                    Some(params.clone())
                } else {
                    flatten::get_path(params, rest).cloned()
                }
            }
            FIELD_EXTRA => {
                if rest.is_empty() {
                    Some(self.context.extra.clone())
                } else {
                    flatten::get_path(&self.context.extra, rest).cloned()
                }
            }
            FIELD_SUBSCRIPTIONS => {
                let (subscription_id, tail) = rest.split_first()?;
                let state = self.context.subscriptions.get(*subscription_id)?;
                if tail.is_empty() {
                    Some(state.clone())
                } else {
                    flatten::get_path(state, tail).cloned()
                }
            }
            _ => None,
        }
    }

    fn apply(&mut self, path: &str, value: Value) {
        let segments = flatten::split_path(path);
        let Some((head, rest)) = segments.split_first() else {
            return;
        };

        match *head {
            FIELD_INIT => {
                if let Value::Bool(flag) = value {
                    self.context.connection_init_received = flag;
                }
            }
            FIELD_ACK => {
                if let Value::Bool(flag) = value {
                    self.context.acknowledged = flag;
                }
            }
            FIELD_CONNECTION_PARAMS => {
                if rest.is_empty() {
                    self.context.connection_params = Some(value);
                } else {
                    let params = self
                        .context
                        .connection_params
                        .get_or_insert(Value::Null);
                    flatten::insert_path(params, rest, value);
                }
            }
            FIELD_EXTRA => {
                if rest.is_empty() {
                    self.context.extra = value;
                } else {
                    flatten::insert_path(&mut self.context.extra, rest, value);
                }
            }
            FIELD_SUBSCRIPTIONS => {
                if let Some((subscription_id, tail)) = rest.split_first() {
                    let slot = self
                        .context
                        .subscriptions
                        .entry(subscription_id.to_string())
                        .or_insert(Value::Null);
                    flatten::insert_path(slot, tail, value);
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring write to unrecognized context field");
            }
        }
    }

    fn remove(&mut self, path: &str) {
        let segments = flatten::split_path(path);
        let Some((head, rest)) = segments.split_first() else {
            return;
        };

        match *head {
            FIELD_CONNECTION_PARAMS => {
                if rest.is_empty() {
                    self.context.connection_params = None;
                } else if let Some(params) = self.context.connection_params.as_mut() {
                    flatten::remove_path(params, rest);
                }
            }
            FIELD_EXTRA => {
                if !rest.is_empty() {
                    flatten::remove_path(&mut self.context.extra, rest);
                }
            }
            FIELD_SUBSCRIPTIONS => match rest.split_first() {
                Some((subscription_id, tail)) if tail.is_empty() => {
                    self.context.subscriptions.remove(*subscription_id);
                }
                Some((subscription_id, tail)) => {
                    if let Some(state) = self.context.subscriptions.get_mut(*subscription_id) {
                        flatten::remove_path(state, tail);
                    }
                }
                None => {}
            },
            _ => {}
        }
    }
}
