//! FIFO queue of pending launch requests.
//!
//! Re-expresses the continuation-based client suspend from a one-shot completion handle: a
//! callback registered on the request, resolved exactly once when the server is accepted by a
//! host, or simply dropped (never called) if the request is cancelled or abandoned.

use std::collections::VecDeque;

use crate::core::vm::Server;

/// A single pending `newServer` call sitting in the queue.
pub struct LaunchRequest {
    pub server: Server,
    completion: Option<Box<dyn FnOnce(Server)>>,
}

impl LaunchRequest {
    pub fn new(server: Server, completion: Box<dyn FnOnce(Server)>) -> Self {
        Self {
            server,
            completion: Some(completion),
        }
    }

    /// Resolves the completion with `server`, if it has not already been resolved or cancelled.
    pub fn resolve(mut self, server: Server) {
        if let Some(completion) = self.completion.take() {
            completion(server);
        }
    }

    /// Drops the completion without ever calling it.
    pub fn cancel(mut self) {
        self.completion.take();
    }
}

/// Strict FIFO of [`LaunchRequest`]s, drained from the head.
///
/// Head-of-line blocking is intentional: a non-placeable head halts placement of later entries
/// even if they would fit.
#[derive(Default)]
pub struct Queue {
    requests: VecDeque<LaunchRequest>,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            requests: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, request: LaunchRequest) {
        self.requests.push_back(request);
    }

    pub fn front(&self) -> Option<&LaunchRequest> {
        self.requests.front()
    }

    pub fn pop_front(&mut self) -> Option<LaunchRequest> {
        self.requests.pop_front()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Cancels and drains every still-queued request without resolving any of them.
    pub fn cancel_all(&mut self) {
        while let Some(request) = self.requests.pop_front() {
            request.cancel();
        }
    }
}
