//! Host selection policies.

use crate::core::config::parse_config_value;
use crate::core::host::HostView;
use crate::core::vm::Server;

/// Selects a candidate host for a server from a set of available hosts.
///
/// Must be pure with respect to the core's state: it reads [`HostView`] fields and the server's
/// flavor, but never mutates anything. The core re-checks `host.can_fit(server)` on whatever is
/// returned here, since the policy's view may be stale or merely advisory.
pub trait AllocationPolicy {
    fn select<'a>(&self, available_hosts: &[&'a HostView], server: &Server) -> Option<&'a HostView>;
}

/// Resolves a policy by name, e.g. `"first-fit"`. Unknown names panic.
pub fn allocation_policy_resolver(config_str: &str) -> Box<dyn AllocationPolicy> {
    let (name, _options) = parse_config_value(config_str);
    match name.as_str() {
        "first-fit" => Box::new(FirstFit::new()),
        "active-balanced" => Box::new(ActiveBalanced::new()),
        "memory-balanced" => Box::new(MemoryBalanced::new()),
        _ => panic!("unknown allocation policy: {}", config_str),
    }
}

fn fits(host: &HostView, server: &Server) -> bool {
    host.unprovisioned_cores() >= server.flavor.cpu_count && host.available_memory >= server.flavor.memory_size as i64
}

/// First host (in iteration order) with sufficient unprovisioned cores and memory.
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl AllocationPolicy for FirstFit {
    fn select<'a>(&self, available_hosts: &[&'a HostView], server: &Server) -> Option<&'a HostView> {
        available_hosts.iter().find(|host| fits(host, server)).copied()
    }
}

/// Host minimizing `numberOfActiveServers` among those that fit.
pub struct ActiveBalanced;

impl ActiveBalanced {
    pub fn new() -> Self {
        Self {}
    }
}

impl AllocationPolicy for ActiveBalanced {
    fn select<'a>(&self, available_hosts: &[&'a HostView], server: &Server) -> Option<&'a HostView> {
        available_hosts
            .iter()
            .filter(|host| fits(host, server))
            .min_by_key(|host| host.number_of_active_servers)
            .copied()
    }
}

/// Host maximizing `availableMemory` among those that fit.
pub struct MemoryBalanced;

impl MemoryBalanced {
    pub fn new() -> Self {
        Self {}
    }
}

impl AllocationPolicy for MemoryBalanced {
    fn select<'a>(&self, available_hosts: &[&'a HostView], server: &Server) -> Option<&'a HostView> {
        available_hosts
            .iter()
            .filter(|host| fits(host, server))
            .max_by_key(|host| host.available_memory)
            .copied()
    }
}
