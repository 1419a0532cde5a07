//! A reference [`Host`] implementation exercising the host contract end to end.
//!
//! Useful for tests and examples. Tracks its own capacity independently of whatever view the
//! core keeps of it, boots a server after a fixed delay (optionally failing with some
//! probability), and retires it automatically after an optional lifetime.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use sim_core::{cast, log_debug, Event, EventHandler, Id, SimulationContext};

use crate::core::events::host_contract::{HostStateChanged, SpawnFailed, SpawnRequest, SpawnSucceeded, VmStateChanged};
use crate::core::host::{Host, HostModel, HostState};
use crate::core::vm::{Server, ServerState, Uid};

#[derive(Clone, Serialize)]
struct BootComplete {
    server_uid: Uid,
    fail: bool,
}

#[derive(Clone, Serialize)]
struct LifetimeExpired {
    server_uid: Uid,
}

pub struct SimpleHost {
    id: Id,
    ctx: SimulationContext,
    model: HostModel,
    state: HostState,
    boot_delay: f64,
    failure_probability: f64,
    default_lifetime: Option<f64>,
    listeners: HashSet<Id>,
    provisioned: HashMap<Uid, (u32, u64)>,
    provisioned_cores: u32,
    provisioned_memory: u64,
}

impl SimpleHost {
    pub fn new(ctx: SimulationContext, model: HostModel, boot_delay: f64, failure_probability: f64) -> Self {
        Self {
            id: ctx.id(),
            ctx,
            model,
            state: HostState::Up,
            boot_delay,
            failure_probability,
            default_lifetime: None,
            listeners: HashSet::new(),
            provisioned: HashMap::new(),
            provisioned_cores: 0,
            provisioned_memory: 0,
        }
    }

    /// Every server this host boots successfully will be retired automatically after `lifetime`.
    pub fn with_default_lifetime(mut self, lifetime: f64) -> Self {
        self.default_lifetime = Some(lifetime);
        self
    }

    /// Flips the host's own availability, notifying every registered listener.
    pub fn set_state(&mut self, new_state: HostState) {
        if self.state == new_state {
            return;
        }
        self.state = new_state;
        for listener in self.listeners.clone() {
            self.ctx.emit(
                HostStateChanged {
                    host_id: self.id,
                    new_state,
                },
                listener,
                0.,
            );
        }
    }

    fn release(&mut self, server_uid: Uid) {
        if let Some((cpu, memory)) = self.provisioned.remove(&server_uid) {
            self.provisioned_cores -= cpu;
            self.provisioned_memory -= memory;
        }
    }
}

impl Host for SimpleHost {
    fn id(&self) -> Id {
        self.id
    }

    fn name(&self) -> String {
        self.ctx.name().to_string()
    }

    fn model(&self) -> HostModel {
        self.model
    }

    fn state(&self) -> HostState {
        self.state
    }

    fn can_fit(&self, server: &Server) -> bool {
        self.provisioned_cores + server.flavor.cpu_count <= self.model.cpu_count
            && self.provisioned_memory + server.flavor.memory_size <= self.model.memory_size
    }

    fn add_listener(&mut self, listener: Id) {
        self.listeners.insert(listener);
    }

    fn remove_listener(&mut self, listener: Id) {
        self.listeners.remove(&listener);
    }
}

impl EventHandler for SimpleHost {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            SpawnRequest { server } => {
                log_debug!(self.ctx, "booting server {}", server.uid);
                self.provisioned.insert(server.uid, (server.flavor.cpu_count, server.flavor.memory_size));
                self.provisioned_cores += server.flavor.cpu_count;
                self.provisioned_memory += server.flavor.memory_size;
                let fail = self.failure_probability > 0. && self.ctx.rand() < self.failure_probability;
                self.ctx.emit_self(
                    BootComplete {
                        server_uid: server.uid,
                        fail,
                    },
                    self.boot_delay,
                );
            }
            BootComplete { server_uid, fail } => {
                if fail {
                    self.release(server_uid);
                    for listener in self.listeners.clone() {
                        self.ctx.emit(
                            SpawnFailed {
                                host_id: self.id,
                                server_uid,
                            },
                            listener,
                            0.,
                        );
                    }
                } else {
                    for listener in self.listeners.clone() {
                        self.ctx.emit(
                            SpawnSucceeded {
                                host_id: self.id,
                                server_uid,
                            },
                            listener,
                            0.,
                        );
                    }
                    if let Some(lifetime) = self.default_lifetime {
                        self.ctx.emit_self(LifetimeExpired { server_uid }, lifetime);
                    }
                }
            }
            LifetimeExpired { server_uid } => {
                if self.provisioned.contains_key(&server_uid) {
                    self.release(server_uid);
                    for listener in self.listeners.clone() {
                        self.ctx.emit(
                            VmStateChanged {
                                host_id: self.id,
                                server_uid,
                                new_state: ServerState::Shutoff,
                            },
                            listener,
                            0.,
                        );
                    }
                }
            }
        })
    }
}
