//! Identifiers and small helpers shared across the crate.

use serde::Serialize;

use crate::resource::ResourceCategory;

pub type ApplicationId = u64;
pub type PhysicalMachineId = u64;
pub type VirtualMachineId = u64;

/// Ordered list of `(category, share)` pairs granted to a virtual machine on its host.
pub type ShareList = Vec<(ResourceCategory, f64)>;

/// Monotonic identifier generator. Identifiers start at 1 and are never reused.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IdGenerator {
    last_id: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { last_id: 0 }
    }

    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }
}

/// Returns the share of `category` from `shares`, if present.
pub fn find_share(shares: &[(ResourceCategory, f64)], category: ResourceCategory) -> Option<f64> {
    shares.iter().find(|(c, _)| *c == category).map(|(_, s)| *s)
}
