//! The typed context record and its flattened representation

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::codec::{flatten, value};

/// Top-level context field: whether `connection_init` has been received
pub const FIELD_INIT: &str = "connectionInitReceived";
/// Top-level context field: whether the connection has been acknowledged
pub const FIELD_ACK: &str = "acknowledged";
/// Top-level context field: the client's `connection_init` payload
pub const FIELD_CONNECTION_PARAMS: &str = "connectionParams";
/// Top-level context field: application-owned data
pub const FIELD_EXTRA: &str = "extra";
/// Top-level context field: transient per-invocation subscription state
pub const FIELD_SUBSCRIPTIONS: &str = "subscriptions";

/// Protocol state for one connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionContext {
    /// Whether the client has sent `connection_init`
    pub connection_init_received: bool,

    /// Whether the server has acknowledged the connection
    pub acknowledged: bool,

    /// The payload of the client's `connection_init` message, if any
    pub connection_params: Option<Value>,

    /// Application data carried alongside the protocol state
    pub extra: Value,

    /// Transient subscription state. Never flattened back to storage.
    pub subscriptions: HashMap<String, Value>,
}

impl ConnectionContext {
    /// Fresh context carrying a request-context snapshot in `extra`
    pub fn with_extra(extra: Value) -> Self {
        Self {
            extra,
            ..Default::default()
        }
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self {
            connection_init_received: false,
            acknowledged: false,
            connection_params: None,
            extra: Value::Object(Map::new()),
            subscriptions: HashMap::new(),
        }
    }
}

/// Flatten a context into encoded hash fields. `subscriptions` is
/// deliberately left out.
pub fn compress(context: &ConnectionContext) -> Vec<(String, String)> {
    let mut fields = vec![
        (
            FIELD_INIT.to_string(),
            value::encode(&Value::Bool(context.connection_init_received)),
        ),
        (
            FIELD_ACK.to_string(),
            value::encode(&Value::Bool(context.acknowledged)),
        ),
    ];

    if let Some(params) = &context.connection_params {
        for (path, leaf) in flatten::leaves(FIELD_CONNECTION_PARAMS, params) {
            fields.push((path, value::encode(&leaf)));
        }
    }
    for (path, leaf) in flatten::leaves(FIELD_EXTRA, &context.extra) {
        fields.push((path, value::encode(&leaf)));
    }

    fields
}

/// Rebuild a context from stored hash fields. Entries under unknown
/// top-level fields are ignored; undefined markers are skipped.
pub fn decompress(fields: &HashMap<String, String>) -> ConnectionContext {
    let mut context = ConnectionContext::default();

    for (path, raw) in fields {
        let segments = flatten::split_path(path);
        let Some((head, rest)) = segments.split_first() else {
            continue;
        };
        let Some(decoded) = value::decode(raw) else {
            continue;
        };

        match *head {
            FIELD_INIT => {
                if let Value::Bool(flag) = decoded {
                    context.connection_init_received = flag;
                }
            }
            FIELD_ACK => {
                if let Value::Bool(flag) = decoded {
                    context.acknowledged = flag;
                }
            }
            FIELD_CONNECTION_PARAMS => {
                let params = context.connection_params.get_or_insert(Value::Null);
                flatten::insert_path(params, rest, decoded);
            }
            FIELD_EXTRA => {
                flatten::insert_path(&mut context.extra, rest, decoded);
            }
            FIELD_SUBSCRIPTIONS => {
                if let Some((subscription_id, tail)) = rest.split_first() {
                    let slot = context
                        .subscriptions
                        .entry(subscription_id.to_string())
                        .or_insert(Value::Null);
                    flatten::insert_path(slot, tail, decoded);
                }
            }
            other => {
                tracing::debug!(field = other, "Ignoring unrecognized context field");
            }
        }
    }

    context
}
