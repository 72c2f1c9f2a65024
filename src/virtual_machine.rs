//! Representation of the virtual machine hosting one application tier.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::common::{ApplicationId, PhysicalMachineId, ShareList, VirtualMachineId};
use crate::resource::{PowerStatus, ResourceCategory};

#[derive(Clone, Debug, Serialize)]
pub struct VirtualMachine {
    pub id: VirtualMachineId,
    pub name: String,
    /// Application and tier served by this VM.
    pub application_id: ApplicationId,
    pub tier: usize,
    power_status: PowerStatus,
    wanted_shares: BTreeMap<ResourceCategory, f64>,
    actual_shares: BTreeMap<ResourceCategory, f64>,
    host: Option<PhysicalMachineId>,
}

impl VirtualMachine {
    pub fn new(id: VirtualMachineId, name: String, application_id: ApplicationId, tier: usize) -> Self {
        Self {
            id,
            name,
            application_id,
            tier,
            power_status: PowerStatus::Off,
            wanted_shares: BTreeMap::new(),
            actual_shares: BTreeMap::new(),
            host: None,
        }
    }

    pub fn power_status(&self) -> PowerStatus {
        self.power_status
    }

    pub fn is_powered_on(&self) -> bool {
        self.power_status == PowerStatus::On
    }

    pub fn power_on(&mut self) -> bool {
        if self.is_powered_on() {
            return false;
        }
        self.power_status = PowerStatus::On;
        true
    }

    pub fn power_off(&mut self) -> bool {
        if !self.is_powered_on() {
            return false;
        }
        self.power_status = PowerStatus::Off;
        true
    }

    pub fn host(&self) -> Option<PhysicalMachineId> {
        self.host
    }

    pub(crate) fn set_host(&mut self, host: Option<PhysicalMachineId>) {
        self.host = host;
    }

    pub fn wanted_share(&self, category: ResourceCategory) -> Option<f64> {
        self.wanted_shares.get(&category).copied()
    }

    pub fn set_wanted_share(&mut self, category: ResourceCategory, share: f64) {
        self.wanted_shares.insert(category, share);
    }

    pub fn wanted_shares(&self) -> ShareList {
        self.wanted_shares.iter().map(|(c, s)| (*c, *s)).collect()
    }

    pub fn actual_share(&self, category: ResourceCategory) -> Option<f64> {
        self.actual_shares.get(&category).copied()
    }

    pub fn set_actual_share(&mut self, category: ResourceCategory, share: f64) {
        self.actual_shares.insert(category, share);
    }

    pub fn actual_shares(&self) -> ShareList {
        self.actual_shares.iter().map(|(c, s)| (*c, *s)).collect()
    }

    pub(crate) fn clear_shares(&mut self) {
        self.wanted_shares.clear();
        self.actual_shares.clear();
    }
}
