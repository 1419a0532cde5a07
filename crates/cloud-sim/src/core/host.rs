//! Host contract and per-host accounting.
//!
//! The simulated hypervisor itself is out of scope: the core only ever calls [`Host::can_fit`],
//! [`Host::spawn`], reads [`Host::model`] and [`Host::state`], and registers itself as a listener.
//! How a concrete host decides whether it can fit a server, or what `spawn` actually does, is the
//! host implementation's business.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use sim_core::Id;

use crate::core::vm::Server;

/// Resource capacity advertised by a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HostModel {
    pub cpu_count: u32,
    pub memory_size: u64,
}

/// Observable availability of a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HostState {
    Up,
    Down,
}

/// External collaborator that can run servers.
///
/// A host is also expected to be a [`sim_core::EventHandler`] component registered with the
/// simulation; [`Host::id`] is its component id, used by the core to route the asynchronous
/// `spawn` request and to receive the resulting `SpawnSucceeded`/`SpawnFailed` notification.
pub trait Host {
    fn id(&self) -> Id;
    fn name(&self) -> String;
    fn model(&self) -> HostModel;
    fn state(&self) -> HostState;

    /// Advisory capacity check; must be consistent with the host's own placement policy.
    fn can_fit(&self, server: &Server) -> bool;

    /// Registers `listener` as the destination for this host's `HostStateChanged`,
    /// `VmStateChanged`, `SpawnSucceeded` and `SpawnFailed` notifications.
    fn add_listener(&mut self, listener: Id);

    /// Removes a previously registered listener.
    fn remove_listener(&mut self, listener: Id);
}

/// Lets a host kept as a shared, interior-mutable component (the same `Rc<RefCell<...>>` shape
/// every other component in the simulation uses) satisfy the `Host` contract by forwarding
/// through a borrow. This is what lets a caller retain its own handle to a concrete host type
/// (e.g. to flip [`HostState`] from outside) after handing a [`Host`] trait object to the core.
impl<T: Host + 'static> Host for Rc<RefCell<T>> {
    fn id(&self) -> Id {
        self.borrow().id()
    }

    fn name(&self) -> String {
        self.borrow().name()
    }

    fn model(&self) -> HostModel {
        self.borrow().model()
    }

    fn state(&self) -> HostState {
        self.borrow().state()
    }

    fn can_fit(&self, server: &Server) -> bool {
        self.borrow().can_fit(server)
    }

    fn add_listener(&mut self, listener: Id) {
        self.borrow_mut().add_listener(listener);
    }

    fn remove_listener(&mut self, listener: Id) {
        self.borrow_mut().remove_listener(listener);
    }
}

/// Per-host mutable bookkeeping owned by the core.
///
/// Every `(server, host)` pair currently placed on this host contributes exactly once to all
/// three counters, until the server reaches [`crate::core::vm::ServerState::Shutoff`].
#[derive(Clone, Debug, PartialEq)]
pub struct HostView {
    pub host_id: Id,
    cpu_count: u32,
    memory_size: u64,
    pub number_of_active_servers: u64,
    pub provisioned_cores: u32,
    pub available_memory: i64,
}

impl HostView {
    pub fn new(host_id: Id, model: HostModel) -> Self {
        Self {
            host_id,
            cpu_count: model.cpu_count,
            memory_size: model.memory_size,
            number_of_active_servers: 0,
            provisioned_cores: 0,
            available_memory: model.memory_size as i64,
        }
    }

    pub fn cpu_count(&self) -> u32 {
        self.cpu_count
    }

    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    pub fn unprovisioned_cores(&self) -> u32 {
        self.cpu_count.saturating_sub(self.provisioned_cores)
    }

    /// Applies the speculative reservation for a server about to be placed here.
    pub fn reserve(&mut self, flavor: &crate::core::vm::Flavor) {
        self.number_of_active_servers += 1;
        self.provisioned_cores += flavor.cpu_count;
        self.available_memory -= flavor.memory_size as i64;
    }

    /// Reverses a reservation, either because `spawn` failed or the server reached `SHUTOFF`.
    pub fn release(&mut self, flavor: &crate::core::vm::Flavor) {
        self.number_of_active_servers -= 1;
        self.provisioned_cores -= flavor.cpu_count;
        self.available_memory += flavor.memory_size as i64;
    }
}
