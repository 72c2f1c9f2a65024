//! Representation of the multi-tier application.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::application_simulation_model::ApplicationSimulationModel;
use crate::common::{find_share, ApplicationId, ShareList};
use crate::error::{Result, SimulationError};
use crate::performance_model::TandemPerformanceModel;
use crate::resource::{Resource, ResourceCategory};
use crate::sla::SlaCostModel;

/// One layer of the application, hosted by exactly one VM.
#[derive(Clone, Debug)]
pub struct ApplicationTier {
    pub name: String,
    /// Shares of the reference machine the tier is configured with.
    shares: ShareList,
}

impl ApplicationTier {
    pub fn new(name: String, shares: ShareList) -> Self {
        Self { name, shares }
    }

    pub fn share(&self, category: ResourceCategory) -> Option<f64> {
        find_share(&self.shares, category)
    }

    pub fn shares(&self) -> &ShareList {
        &self.shares
    }
}

pub struct MultiTierApplication {
    pub id: ApplicationId,
    pub name: String,
    tiers: Vec<ApplicationTier>,
    reference_resources: BTreeMap<ResourceCategory, Resource>,
    simulation_model: Rc<RefCell<ApplicationSimulationModel>>,
    performance_model: TandemPerformanceModel,
    sla_cost_model: Rc<dyn SlaCostModel>,
    running: bool,
}

impl MultiTierApplication {
    pub fn new(
        name: String,
        tiers: Vec<ApplicationTier>,
        reference_resources: Vec<Resource>,
        simulation_model: Rc<RefCell<ApplicationSimulationModel>>,
        sla_cost_model: Rc<dyn SlaCostModel>,
    ) -> Result<Self> {
        if tiers.is_empty() {
            return Err(SimulationError::InvalidConfiguration(format!(
                "application {} has no tiers",
                name
            )));
        }
        if simulation_model.borrow().num_tiers() != tiers.len() {
            return Err(SimulationError::InvalidConfiguration(format!(
                "simulation model of application {} does not match its {} tiers",
                name,
                tiers.len()
            )));
        }
        let reference_resources: BTreeMap<_, _> = reference_resources.into_iter().map(|r| (r.category, r)).collect();
        if !reference_resources.contains_key(&ResourceCategory::Cpu) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "application {} has no reference CPU",
                name
            )));
        }
        let performance_model = TandemPerformanceModel::new(simulation_model.borrow().request_classes(), tiers.len());
        Ok(Self {
            id: 0,
            name,
            tiers,
            reference_resources,
            simulation_model,
            performance_model,
            sla_cost_model,
            running: false,
        })
    }

    pub(crate) fn set_id(&mut self, id: ApplicationId) {
        self.id = id;
        self.simulation_model.borrow_mut().set_application_id(id);
    }

    pub fn num_tiers(&self) -> usize {
        self.tiers.len()
    }

    pub fn tier(&self, tier: usize) -> Result<&ApplicationTier> {
        self.tiers.get(tier).ok_or(SimulationError::InvalidTier {
            application: self.id,
            tier,
        })
    }

    pub fn tiers(&self) -> &[ApplicationTier] {
        &self.tiers
    }

    pub fn reference_resource(&self, category: ResourceCategory) -> Result<&Resource> {
        self.reference_resources
            .get(&category)
            .ok_or(SimulationError::IncompatibleCategory(category))
    }

    pub fn simulation_model(&self) -> &Rc<RefCell<ApplicationSimulationModel>> {
        &self.simulation_model
    }

    pub fn performance_model(&self) -> &TandemPerformanceModel {
        &self.performance_model
    }

    pub fn sla_cost_model(&self) -> &dyn SlaCostModel {
        self.sla_cost_model.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn start(&mut self) {
        self.running = true;
        self.simulation_model.borrow_mut().start();
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
        self.simulation_model.borrow_mut().stop();
    }

    pub(crate) fn reset(&mut self) {
        self.running = false;
        self.simulation_model.borrow_mut().reset();
    }
}
