//! Standard simulation events.

// SIMULATION ENGINE EVENTS //
pub mod engine {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct ReplicationEnd {
        pub replication: u32,
    }

    #[derive(Clone, Serialize)]
    pub struct Checkpoint {}
}

// APPLICATION WORKLOAD EVENTS //
pub mod application {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct RequestArrival {
        pub class: usize,
        pub generation: u64,
    }

    #[derive(Clone, Serialize)]
    pub struct ServiceCompletion {
        pub tier: usize,
        pub generation: u64,
    }
}

// CONTROLLER EVENTS //
pub mod controller {
    use serde::Serialize;

    #[derive(Clone, Serialize)]
    pub struct MigrationControlTick {}

    #[derive(Clone, Serialize)]
    pub struct ApplicationControlTick {}
}
