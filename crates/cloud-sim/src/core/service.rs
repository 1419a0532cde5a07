//! The provisioning and scheduling core: client surface, host listener, and scheduler cycle.
//!
//! These three concerns are specified separately but share one mutable state (the queue, the
//! host views, the counters) and run on the same single-threaded cooperative task, so they are
//! implemented as one [`sim_core::EventHandler`] component, the same way the teacher's
//! `HostManager` folds allocation bookkeeping, VM lifecycle and periodic self-re-arming into a
//! single component.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use sim_core::{cast, log_debug, log_error, Event, EventHandler, Id, SimulationContext};

use crate::core::allocation_policy::AllocationPolicy;
use crate::core::common::CoreError;
use crate::core::config::SimulationConfig;
use crate::core::events::host_contract::{HostStateChanged, SpawnFailed, SpawnRequest, SpawnSucceeded, VmStateChanged};
use crate::core::events::stream::{
    HypervisorAvailable, HypervisorUnavailable, MetricsAvailable, VmScheduled, VmStopped, VmSubmission,
    VmSubmissionInvalid,
};
use crate::core::host::{Host, HostState, HostView};
use crate::core::queue::{LaunchRequest, Queue};
use crate::core::vm::{Flavor, Server, ServerState, Uid};

/// Event the core sends to itself to fire a scheduling cycle, re-armed through [`CloudCore::request_cycle`].
#[derive(Clone, serde::Serialize)]
struct CycleFired {}

struct Counters {
    submitted: u64,
    queued: u64,
    running: u64,
    finished: u64,
    unscheduled: u64,
}

/// Point-in-time snapshot of the service counters, satisfying
/// `submitted = running + finished + queued + unscheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub submitted: u64,
    pub queued: u64,
    pub running: u64,
    pub finished: u64,
    pub unscheduled: u64,
}

impl Counters {
    fn new() -> Self {
        Self {
            submitted: 0,
            queued: 0,
            running: 0,
            finished: 0,
            unscheduled: 0,
        }
    }
}

/// The provisioning and scheduling service.
///
/// Owns the queue, the per-host [`HostView`]s, the counters, and the quantum timer guard. Hosts
/// are reached through the [`Host`] trait for synchronous reads and through the event bus for
/// the asynchronous `spawn` call and its eventual resolution.
pub struct CloudCore {
    id: Id,
    ctx: SimulationContext,
    config: Rc<SimulationConfig>,
    policy: Box<dyn AllocationPolicy>,

    hosts: HashMap<Id, Box<dyn Host>>,
    host_views: HashMap<Id, HostView>,
    available: BTreeSet<Id>,

    queue: Queue,
    /// Servers whose placement was resolved to the client but whose `spawn` has not yet completed.
    pending_spawns: HashMap<Uid, (Id, Server)>,
    /// Servers that have been spawned successfully and are tracked as running.
    active_servers: HashMap<Uid, (Id, Server)>,

    max_cores: u32,
    max_memory: u64,

    counters: Counters,
    subscribers: Vec<Id>,
    timer_armed: bool,
    closed: bool,
}

impl CloudCore {
    pub fn new(ctx: SimulationContext, config: Rc<SimulationConfig>, policy: Box<dyn AllocationPolicy>) -> Self {
        Self {
            id: ctx.id(),
            ctx,
            config,
            policy,
            hosts: HashMap::new(),
            host_views: HashMap::new(),
            available: BTreeSet::new(),
            queue: Queue::new(),
            pending_spawns: HashMap::new(),
            active_servers: HashMap::new(),
            max_cores: 0,
            max_memory: 0,
            counters: Counters::new(),
            subscribers: Vec::new(),
            timer_armed: false,
            closed: false,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Registers `subscriber` to receive the emitted event stream (`MetricsAvailable`, etc).
    pub fn subscribe(&mut self, subscriber: Id) {
        self.subscribers.push(subscriber);
    }

    /// Snapshot of a host's current bookkeeping, if it is registered.
    pub fn host_view(&self, host_id: Id) -> Option<HostView> {
        self.host_views.get(&host_id).cloned()
    }

    /// Snapshot of the service-wide counters.
    pub fn counters(&self) -> CountersSnapshot {
        CountersSnapshot {
            submitted: self.counters.submitted,
            queued: self.counters.queued,
            running: self.counters.running,
            finished: self.counters.finished,
            unscheduled: self.counters.unscheduled,
        }
    }

    // -- Client surface ---------------------------------------------------------------------

    /// Generates a fresh server, enqueues it and requests a cycle. `completion` is called exactly
    /// once, with a server handle, once the request is accepted by a host — or never, if the
    /// request is cancelled or abandoned.
    pub fn new_server(
        &mut self,
        name: String,
        image: String,
        flavor: Flavor,
        completion: Box<dyn FnOnce(Server)>,
    ) -> Result<(), CoreError> {
        if self.closed {
            return Err(CoreError::ClientClosed);
        }
        let uid = self.generate_uid();
        let server = Server::new(uid, name, image, flavor);

        log_debug!(self.ctx, "submitted server {} ({})", server.name, server.uid);
        self.emit_event(VmSubmission {
            name: server.name.clone(),
            image: server.image.clone(),
            cpu_count: server.flavor.cpu_count,
            memory_size: server.flavor.memory_size,
        });

        self.counters.submitted += 1;
        self.counters.queued += 1;
        self.queue.push_back(LaunchRequest::new(server, completion));
        self.emit_metrics();
        self.request_cycle();
        Ok(())
    }

    /// Cancels every still-queued request and disarms the quantum timer. Does not touch servers
    /// that are already placed or mid-spawn; their effects on the host are accepted to leak.
    pub fn shutdown(&mut self) {
        self.closed = true;
        self.queue.cancel_all();
        if self.timer_armed {
            let my_id = self.id;
            self.ctx.cancel_events(move |e| e.dest == my_id && e.data.is::<CycleFired>());
            self.timer_armed = false;
        }
    }

    fn generate_uid(&self) -> Uid {
        let hi: u64 = self.ctx.gen_range(0..u64::MAX);
        let lo: u64 = self.ctx.gen_range(0..u64::MAX);
        ((hi as u128) << 64) | lo as u128
    }

    // -- Host registration and listener ------------------------------------------------------

    /// Idempotent on host identity: registering the same host twice leaves state equivalent to
    /// registering it once.
    pub fn add_host(&mut self, mut host: Box<dyn Host>) {
        let host_id = host.id();
        if self.host_views.contains_key(&host_id) {
            return;
        }
        let model = host.model();
        self.max_cores = self.max_cores.max(model.cpu_count);
        self.max_memory = self.max_memory.max(model.memory_size);

        host.add_listener(self.id);
        let up = host.state() == HostState::Up;
        self.host_views.insert(host_id, HostView::new(host_id, model));
        if up {
            self.available.insert(host_id);
        }
        self.hosts.insert(host_id, host);
    }

    /// Deregisters the listener only. Servers already placed on this host remain tracked by the
    /// core and the host view is not removed; their status after this call is undefined — see
    /// the design notes.
    pub fn remove_host(&mut self, host_id: Id) {
        if let Some(host) = self.hosts.get_mut(&host_id) {
            host.remove_listener(self.id);
        }
        self.available.remove(&host_id);
    }

    fn on_host_state_changed(&mut self, host_id: Id, new_state: HostState) {
        match new_state {
            HostState::Up => {
                if self.host_views.contains_key(&host_id) {
                    self.available.insert(host_id);
                }
                self.emit_event(HypervisorAvailable { host_uid: host_id });
            }
            HostState::Down => {
                self.available.remove(&host_id);
                self.emit_event(HypervisorUnavailable { host_uid: host_id });
            }
        }
        if !self.queue.is_empty() {
            self.request_cycle();
        }
    }

    fn on_vm_state_changed(&mut self, host_id: Id, server_uid: Uid, new_state: ServerState) {
        let Some((placed_host_id, mut server)) = self.active_servers.remove(&server_uid) else {
            log_error!(self.ctx, "vm state change for unknown server {}", server_uid);
            return;
        };
        if placed_host_id != host_id {
            log_error!(self.ctx, "vm {} reported by host {} but placed on {}", server_uid, host_id, placed_host_id);
        }
        server.set_state(new_state);

        if new_state == ServerState::Shutoff {
            self.counters.running -= 1;
            self.counters.finished += 1;
            if let Some(view) = self.host_views.get_mut(&placed_host_id) {
                view.release(&server.flavor);
            }
            self.emit_event(VmStopped { name: server.name.clone() });
            self.emit_metrics();
            if !self.queue.is_empty() {
                self.request_cycle();
            }
        } else {
            self.active_servers.insert(server_uid, (placed_host_id, server));
        }
    }

    // -- Scheduler core -----------------------------------------------------------------------

    /// Arms a single one-shot timer aligned to the next multiple of `schedulingQuantum`. Re-arming
    /// while a timer is already pending is a no-op.
    fn request_cycle(&mut self) {
        if self.timer_armed || self.closed {
            return;
        }
        let now = self.ctx.time();
        let quantum = self.config.scheduling_quantum;
        let delay = quantum - (now % quantum);
        self.ctx.emit_self(CycleFired {}, delay);
        self.timer_armed = true;
    }

    fn run_cycle(&mut self) {
        self.timer_armed = false;
        loop {
            let server = match self.queue.front() {
                Some(request) => request.server.clone(),
                None => break,
            };

            let views: Vec<&HostView> = self
                .available
                .iter()
                .filter_map(|id| self.host_views.get(id))
                .collect();
            let candidate = self
                .policy
                .select(&views, &server)
                .map(|view| view.host_id)
                .filter(|id| self.hosts[id].can_fit(&server));

            match candidate {
                Some(host_id) => {
                    let request = self.queue.pop_front().unwrap();
                    self.place(host_id, request);
                }
                None => {
                    let infeasible =
                        server.flavor.memory_size > self.max_memory || server.flavor.cpu_count > self.max_cores;
                    if infeasible {
                        let request = self.queue.pop_front().unwrap();
                        self.reject_infeasible(request);
                        continue;
                    }
                    // Head-of-line blocking: stop draining, preserve arrival order.
                    break;
                }
            }
        }
    }

    fn place(&mut self, host_id: Id, request: LaunchRequest) {
        let flavor = request.server.flavor;
        let uid = request.server.uid;

        self.host_views.get_mut(&host_id).unwrap().reserve(&flavor);

        let server_for_client = request.server.clone();
        let server_for_spawn = request.server.clone();
        request.resolve(server_for_client);

        self.pending_spawns.insert(uid, (host_id, server_for_spawn.clone()));
        self.ctx
            .emit(SpawnRequest { server: server_for_spawn }, host_id, self.config.message_delay);
    }

    fn reject_infeasible(&mut self, request: LaunchRequest) {
        log_debug!(self.ctx, "server {} is infeasible on every known host", request.server.name);
        self.emit_event(VmSubmissionInvalid {
            name: request.server.name.clone(),
        });
        self.counters.queued -= 1;
        self.counters.unscheduled += 1;
        // Documented bug (see design notes): the continuation is abandoned, not failed.
        request.cancel();
        self.emit_metrics();
    }

    fn on_spawn_succeeded(&mut self, host_id: Id, server_uid: Uid) {
        let Some((placed_host_id, server)) = self.pending_spawns.remove(&server_uid) else {
            log_error!(self.ctx, "spawn succeeded for unknown request {}", server_uid);
            return;
        };
        debug_assert_eq!(placed_host_id, host_id);
        self.counters.running += 1;
        self.counters.queued -= 1;
        self.emit_event(VmScheduled { name: server.name.clone() });
        self.active_servers.insert(server_uid, (host_id, server));
        self.emit_metrics();
    }

    fn on_spawn_failed(&mut self, host_id: Id, server_uid: Uid) {
        let Some((placed_host_id, server)) = self.pending_spawns.remove(&server_uid) else {
            log_error!(self.ctx, "spawn failure for unknown request {}", server_uid);
            return;
        };
        debug_assert_eq!(placed_host_id, host_id);
        if let Some(view) = self.host_views.get_mut(&host_id) {
            view.release(&server.flavor);
        }
        // Not re-enqueued: the client has already been resolved with a handle that will now
        // never leave the BUILD state (see design notes). The request still leaves `queued` here
        // so the counter identity keeps closing even though it lands in no other bucket.
        self.counters.queued -= 1;
        log_error!(self.ctx, "spawn failed for server {} on host {}", server.name, host_id);
    }

    fn emit_metrics(&self) {
        self.emit_event(MetricsAvailable {
            service: self.ctx.name().to_string(),
            host_count: self.host_views.len() as u64,
            available_host_count: self.available.len() as u64,
            submitted: self.counters.submitted,
            running: self.counters.running,
            finished: self.counters.finished,
            queued: self.counters.queued,
            unscheduled: self.counters.unscheduled,
        });
    }

    fn emit_event<T: sim_core::event::EventData + Clone>(&self, data: T) {
        for subscriber in &self.subscribers {
            self.ctx.emit(data.clone(), *subscriber, 0.);
        }
    }
}

impl EventHandler for CloudCore {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            CycleFired {} => {
                self.run_cycle();
            }
            HostStateChanged { host_id, new_state } => {
                self.on_host_state_changed(host_id, new_state);
            }
            VmStateChanged {
                host_id,
                server_uid,
                new_state,
            } => {
                self.on_vm_state_changed(host_id, server_uid, new_state);
            }
            SpawnSucceeded { host_id, server_uid } => {
                self.on_spawn_succeeded(host_id, server_uid);
            }
            SpawnFailed { host_id, server_uid } => {
                self.on_spawn_failed(host_id, server_uid);
            }
        })
    }
}

/// Lightweight handle through which callers submit launch requests.
///
/// `close` only marks this particular handle closed; requests already submitted through it (or
/// through other handles) are unaffected. Use [`CloudCore::shutdown`] to tear down the service
/// itself and cancel every still-suspended request.
pub struct Client {
    core: Rc<std::cell::RefCell<CloudCore>>,
    closed: std::cell::Cell<bool>,
}

impl Client {
    pub fn new(core: Rc<std::cell::RefCell<CloudCore>>) -> Self {
        Self {
            core,
            closed: std::cell::Cell::new(false),
        }
    }

    pub fn new_server(
        &self,
        name: &str,
        image: &str,
        flavor: Flavor,
        completion: Box<dyn FnOnce(Server)>,
    ) -> Result<(), CoreError> {
        if self.closed.get() {
            return Err(CoreError::ClientClosed);
        }
        self.core
            .borrow_mut()
            .new_server(name.to_string(), image.to_string(), flavor, completion)
    }

    pub fn close(&self) {
        self.closed.set(true);
    }
}
