//! Common data structures.

use std::fmt::{Display, Formatter};

/// Errors raised synchronously to the caller or logged locally by the service.
///
/// Only [`CoreError::ClientClosed`] is ever surfaced to a caller; the remaining kinds are handled
/// internally (counters adjusted, events emitted, or simply logged) and never propagate out of a
/// listener callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// `newServer` was called on a client that already called `close`.
    ClientClosed,
    /// A request exceeds the cores or memory of every host ever registered.
    InfeasiblePlacement,
    /// The selected host, or the policy itself, could not place the request this cycle.
    TransientPlacementFailure,
    /// `host.spawn` failed after the reservation was already applied.
    SpawnFailure,
    /// A VM state transition arrived for a host the core has no record of.
    UnknownHost,
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CoreError::ClientClosed => write!(f, "client is closed"),
            CoreError::InfeasiblePlacement => write!(f, "request exceeds capacity of every known host"),
            CoreError::TransientPlacementFailure => write!(f, "no host available this cycle"),
            CoreError::SpawnFailure => write!(f, "host failed to spawn the server"),
            CoreError::UnknownHost => write!(f, "unknown host"),
        }
    }
}

impl std::error::Error for CoreError {}
