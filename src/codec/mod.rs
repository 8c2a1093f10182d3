//! Key layout and value codec
//!
//! Everything the adapter persists goes through this module: the namespaced
//! key layout shared by every store backend, the type-tagged scalar codec
//! for context fields, and the dot-path flattening used to spread nested
//! context trees over hash fields.

pub mod flatten;
pub mod keys;
pub mod value;

pub use keys::{Channel, KeySpace};
