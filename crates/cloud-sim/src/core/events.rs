//! Events flowing in and out of the core.

// EXTERNAL EVENT STREAM //////////////////////////////////////////////////////////////////////
//
// Emitted as a lazy, multi-subscriber broadcast. Subscribers observe these purely for tracing and
// metrics purposes; the core never reacts to its own emitted events.

pub mod stream {
    use serde::Serialize;

    #[derive(Serialize, Clone)]
    pub struct MetricsAvailable {
        pub service: String,
        pub host_count: u64,
        pub available_host_count: u64,
        pub submitted: u64,
        pub running: u64,
        pub finished: u64,
        pub queued: u64,
        pub unscheduled: u64,
    }

    #[derive(Serialize, Clone)]
    pub struct HypervisorAvailable {
        pub host_uid: u32,
    }

    #[derive(Serialize, Clone)]
    pub struct HypervisorUnavailable {
        pub host_uid: u32,
    }

    #[derive(Serialize, Clone)]
    pub struct VmSubmission {
        pub name: String,
        pub image: String,
        pub cpu_count: u32,
        pub memory_size: u64,
    }

    #[derive(Serialize, Clone)]
    pub struct VmSubmissionInvalid {
        pub name: String,
    }

    #[derive(Serialize, Clone)]
    pub struct VmScheduled {
        pub name: String,
    }

    #[derive(Serialize, Clone)]
    pub struct VmStopped {
        pub name: String,
    }
}

// HOST CONTRACT //////////////////////////////////////////////////////////////////////////////
//
// Wire events exchanged between the core and a host component. A host is only reachable through
// these plus the synchronous `Host` trait methods; this is how `spawn`'s asynchrony and listener
// notifications are expressed on top of the event-driven engine.

pub mod host_contract {
    use serde::Serialize;

    use crate::core::host::HostState;
    use crate::core::vm::{Server, ServerState};

    /// Core -> host: asks the host to start running `server`.
    #[derive(Serialize, Clone)]
    pub struct SpawnRequest {
        pub server: Server,
    }

    /// Host -> core: `server` was started successfully.
    #[derive(Serialize, Clone)]
    pub struct SpawnSucceeded {
        pub host_id: u32,
        pub server_uid: u128,
    }

    /// Host -> core: starting `server` failed; the core must roll back its reservation.
    #[derive(Serialize, Clone)]
    pub struct SpawnFailed {
        pub host_id: u32,
        pub server_uid: u128,
    }

    /// Host -> core: the host itself transitioned between `UP` and `DOWN`.
    #[derive(Serialize, Clone)]
    pub struct HostStateChanged {
        pub host_id: u32,
        pub new_state: HostState,
    }

    /// Host -> core: a server running on the host changed lifecycle state.
    #[derive(Serialize, Clone)]
    pub struct VmStateChanged {
        pub host_id: u32,
        pub server_uid: u128,
        pub new_state: ServerState,
    }
}
