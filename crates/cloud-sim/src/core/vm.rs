//! Representation of a virtual machine (server) and its lifecycle state.

use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

/// 128-bit server identifier, generated from the simulation's seeded random source.
///
/// This is deliberately not a system UUID: reproducibility across runs with the same seed is a
/// requirement, not an implementation detail.
pub type Uid = u128;

/// Resource shape requested by a server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Flavor {
    pub cpu_count: u32,
    pub memory_size: u64,
}

/// Lifecycle state of a [`Server`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ServerState {
    Build,
    Active,
    Shutoff,
    Error,
}

impl Display for ServerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ServerState::Build => write!(f, "build"),
            ServerState::Active => write!(f, "active"),
            ServerState::Shutoff => write!(f, "shutoff"),
            ServerState::Error => write!(f, "error"),
        }
    }
}

/// Observer notified whenever a [`Server`] it watches changes state.
///
/// Invoked synchronously, in registration order. A watcher must not mutate the queue from inside
/// the callback; the service is single-threaded, so there is no concurrent re-entrancy to guard
/// against, but reentering the scheduler from a watcher is still undefined.
pub trait ServerWatcher {
    fn on_state_changed(&mut self, server: &Server, old_state: ServerState);
}

/// Identity of a VM request and, once placed, of the running entity itself.
#[derive(Clone)]
pub struct Server {
    pub uid: Uid,
    pub name: String,
    pub flavor: Flavor,
    /// Opaque workload descriptor; the core never interprets its contents.
    pub image: String,
    pub state: ServerState,
    watchers: Vec<Rc<RefCell<dyn ServerWatcher>>>,
}

impl Server {
    pub fn new(uid: Uid, name: String, image: String, flavor: Flavor) -> Self {
        Self {
            uid,
            name,
            flavor,
            image,
            state: ServerState::Build,
            watchers: Vec::new(),
        }
    }

    pub fn add_watcher(&mut self, watcher: Rc<RefCell<dyn ServerWatcher>>) {
        self.watchers.push(watcher);
    }

    /// Moves the server to `new_state` and notifies watchers in insertion order.
    pub fn set_state(&mut self, new_state: ServerState) {
        let old_state = self.state;
        self.state = new_state;
        for watcher in self.watchers.clone() {
            watcher.borrow_mut().on_state_changed(self, old_state);
        }
    }
}

// Watchers hold trait objects that are neither `Clone` nor meaningfully serializable; events that
// carry a `Server` only need its identity and resource shape, as `VirtualMachine` does upstream.
impl Serialize for Server {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Server", 4)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("flavor", &self.flavor)?;
        state.serialize_field("image", &self.image)?;
        state.serialize_field("state", &self.state.to_string())?;
        state.end()
    }
}
