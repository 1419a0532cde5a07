//! Component identifiers.

/// Unique identifier of a simulation component (assigned sequentially starting from 0).
pub type Id = u32;
