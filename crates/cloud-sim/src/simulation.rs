//! Simulation configuration and execution. Library API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sim_core::{Id, Simulation, SimulationContext};

use crate::core::allocation_policy::allocation_policy_resolver;
use crate::core::config::SimulationConfig;
use crate::core::host::{Host, HostModel, HostState, HostView};
use crate::core::host_impl::SimpleHost;
use crate::core::service::{Client, CloudCore, CountersSnapshot};
use crate::core::vm::{Flavor, Server};

/// Facade over a running simulation: owns the engine, the provisioning core, and every host
/// registered with it.
pub struct CloudSimulation {
    sim: Simulation,
    core: Rc<RefCell<CloudCore>>,
    hosts: Vec<Id>,
    simple_hosts: HashMap<Id, Rc<RefCell<SimpleHost>>>,
    sim_config: Rc<SimulationConfig>,
}

impl CloudSimulation {
    /// Creates a simulation with the given config, wiring up the provisioning core as a handler.
    pub fn new(mut sim: Simulation, sim_config: SimulationConfig) -> Self {
        let sim_config = Rc::new(sim_config);
        let policy = allocation_policy_resolver(&sim_config.allocation_policy);
        let ctx = sim.create_context("cloud_core");
        let core = Rc::new(RefCell::new(CloudCore::new(ctx, sim_config.clone(), policy)));
        sim.add_handler("cloud_core", core.clone());
        Self {
            sim,
            core,
            hosts: Vec::new(),
            simple_hosts: HashMap::new(),
            sim_config,
        }
    }

    /// Registers a simple reference host with the given capacity and boot characteristics.
    /// Returns the component id assigned to the host.
    pub fn add_simple_host(
        &mut self,
        name: &str,
        cpu_total: u32,
        memory_total: u64,
        boot_delay: f64,
        failure_probability: f64,
    ) -> Id {
        let model = HostModel {
            cpu_count: cpu_total,
            memory_size: memory_total,
        };
        let host = SimpleHost::new(self.sim.create_context(name), model, boot_delay, failure_probability);
        self.register_simple_host(name, host)
    }

    /// Like [`Self::add_simple_host`], but every server this host boots successfully is retired
    /// automatically after `lifetime`.
    pub fn add_simple_host_with_lifetime(
        &mut self,
        name: &str,
        cpu_total: u32,
        memory_total: u64,
        boot_delay: f64,
        failure_probability: f64,
        lifetime: f64,
    ) -> Id {
        let model = HostModel {
            cpu_count: cpu_total,
            memory_size: memory_total,
        };
        let host = SimpleHost::new(self.sim.create_context(name), model, boot_delay, failure_probability)
            .with_default_lifetime(lifetime);
        self.register_simple_host(name, host)
    }

    fn register_simple_host(&mut self, name: &str, host: SimpleHost) -> Id {
        let host = Rc::new(RefCell::new(host));
        let id = self.sim.add_handler(name, host.clone());
        self.core.borrow_mut().add_host(Box::new(host.clone()));
        self.hosts.push(id);
        self.simple_hosts.insert(id, host);
        id
    }

    /// Registers an arbitrary [`Host`] implementation with the provisioning core.
    ///
    /// If `host` is also a [`sim_core::EventHandler`] component, the caller is responsible for
    /// registering it with the underlying simulation (e.g. via a shared `Rc<RefCell<...>>`
    /// registered through [`sim_core::Simulation::add_handler`]); the core only ever reaches a
    /// host through the [`Host`] trait and the wire events it emits back.
    pub fn add_host(&mut self, host: Box<dyn Host>) -> Id {
        let id = host.id();
        self.core.borrow_mut().add_host(host);
        self.hosts.push(id);
        id
    }

    /// A fresh [`SimulationContext`] for a component named `name`, for wiring up a custom [`Host`]
    /// implementation before registering it with [`Self::add_host`].
    pub fn create_context(&mut self, name: &str) -> SimulationContext {
        self.sim.create_context(name)
    }

    /// Flips the state of a previously-registered [`SimpleHost`], notifying the core (and any
    /// other listener) the same way a real host transitioning `UP`/`DOWN` would. Only applies to
    /// hosts added through [`Self::add_simple_host`] or [`Self::add_simple_host_with_lifetime`].
    pub fn set_host_state(&mut self, host_id: Id, state: HostState) {
        if let Some(host) = self.simple_hosts.get(&host_id) {
            host.borrow_mut().set_state(state);
        }
    }

    /// Returns the ids of every host ever registered through this facade.
    pub fn hosts(&self) -> &[Id] {
        &self.hosts
    }

    /// Deregisters a previously added host's listener. See [`CloudCore::remove_host`].
    pub fn remove_host(&mut self, host_id: Id) {
        self.core.borrow_mut().remove_host(host_id);
    }

    /// Returns a new client handle for submitting `newServer` requests.
    pub fn client(&self) -> Client {
        Client::new(self.core.clone())
    }

    /// Convenience wrapper around [`Client::new_server`] for the default client.
    pub fn new_server(
        &self,
        name: &str,
        image: &str,
        flavor: Flavor,
        completion: Box<dyn FnOnce(Server)>,
    ) -> Result<(), crate::core::common::CoreError> {
        self.client().new_server(name, image, flavor, completion)
    }

    /// Subscribes `subscriber` to the emitted event stream (`MetricsAvailable`, `VmScheduled`, etc).
    pub fn subscribe(&self, subscriber: Id) {
        self.core.borrow_mut().subscribe(subscriber);
    }

    /// Cancels every still-queued request and disarms the quantum timer.
    pub fn shutdown(&self) {
        self.core.borrow_mut().shutdown();
    }

    /// Snapshot of a registered host's current bookkeeping.
    pub fn host_view(&self, host_id: Id) -> Option<HostView> {
        self.core.borrow().host_view(host_id)
    }

    /// Snapshot of the service-wide counters.
    pub fn counters(&self) -> CountersSnapshot {
        self.core.borrow().counters()
    }

    /// Process N simulation steps.
    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    /// Process simulation for "time" duration.
    pub fn step_for_duration(&mut self, time: f64) {
        self.sim.step_for_duration(time);
    }

    /// Steps through the simulation until there are no pending events left.
    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    /// Number of events processed yet.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    /// Get current simulation time.
    pub fn current_time(&mut self) -> f64 {
        self.sim.time()
    }

    /// Get simulation config.
    pub fn sim_config(&self) -> Rc<SimulationConfig> {
        self.sim_config.clone()
    }
}
