//! Per-connection protocol context
//!
//! The context survives between invocations as a flattened, type-tagged
//! hash. Within one invocation it is materialized once, mutated through a
//! change-recording wrapper, and written back as batched hash operations
//! when the socket flushes.

pub mod context;
pub mod store;
pub mod tracker;

pub use context::{compress, decompress, ConnectionContext};
pub use store::ContextStore;
pub use tracker::{Change, TrackedContext};
