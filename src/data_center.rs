//! Data center: catalogs of applications and machines and the placement state machine.
//!
//! All placement and power state changes go through the methods of [`DataCenter`], which keep the
//! VM monitors of the physical machines, the placement table, the power states and the service
//! speed of the application simulation models consistent with each other.

use std::collections::{BTreeMap, BTreeSet};

use dslab_core::{log_debug, log_info, log_warn, SimulationContext};

use crate::application::MultiTierApplication;
use crate::application_controller::{ApplicationController, TierObservation};
use crate::common::{ApplicationId, IdGenerator, PhysicalMachineId, ShareList, VirtualMachineId};
use crate::error::{Result, SimulationError};
use crate::physical_machine::PhysicalMachine;
use crate::physical_machine_controller::PhysicalMachineController;
use crate::resource::{Resource, ResourceCategory};
use crate::scaling::scale_resource_share;
use crate::virtual_machine::VirtualMachine;
use crate::virtual_machines_placement::VirtualMachinesPlacement;

pub struct DataCenter {
    applications: BTreeMap<ApplicationId, MultiTierApplication>,
    application_controllers: BTreeMap<ApplicationId, Box<dyn ApplicationController>>,
    physical_machines: BTreeMap<PhysicalMachineId, PhysicalMachine>,
    physical_machine_controllers: BTreeMap<PhysicalMachineId, Box<dyn PhysicalMachineController>>,
    virtual_machines: BTreeMap<VirtualMachineId, VirtualMachine>,
    placement: VirtualMachinesPlacement,
    /// VMs of every deployed application, in tier order.
    deployed: BTreeMap<ApplicationId, Vec<VirtualMachineId>>,
    inhibited: BTreeSet<ApplicationId>,

    application_ids: IdGenerator,
    physical_machine_ids: IdGenerator,
    virtual_machine_ids: IdGenerator,

    ctx: SimulationContext,
}

impl DataCenter {
    pub fn new(ctx: SimulationContext) -> Self {
        Self {
            applications: BTreeMap::new(),
            application_controllers: BTreeMap::new(),
            physical_machines: BTreeMap::new(),
            physical_machine_controllers: BTreeMap::new(),
            virtual_machines: BTreeMap::new(),
            placement: VirtualMachinesPlacement::new(),
            deployed: BTreeMap::new(),
            inhibited: BTreeSet::new(),
            application_ids: IdGenerator::new(),
            physical_machine_ids: IdGenerator::new(),
            virtual_machine_ids: IdGenerator::new(),
            ctx,
        }
    }

    // REGISTRATION //

    pub fn add_physical_machine(
        &mut self,
        name: &str,
        resources: Vec<Resource>,
        controller: Box<dyn PhysicalMachineController>,
    ) -> PhysicalMachineId {
        let id = self.physical_machine_ids.next_id();
        self.physical_machines
            .insert(id, PhysicalMachine::new(id, name.to_string(), resources));
        self.physical_machine_controllers.insert(id, controller);
        log_debug!(self.ctx, "added physical machine {} with id {}", name, id);
        id
    }

    pub fn add_application(
        &mut self,
        mut application: MultiTierApplication,
        controller: Box<dyn ApplicationController>,
    ) -> ApplicationId {
        let id = self.application_ids.next_id();
        application.set_id(id);
        log_debug!(self.ctx, "added application {} with id {}", application.name, id);
        self.applications.insert(id, application);
        self.application_controllers.insert(id, controller);
        id
    }

    // CATALOGS //

    pub fn application(&self, id: ApplicationId) -> Result<&MultiTierApplication> {
        self.applications
            .get(&id)
            .ok_or(SimulationError::InvalidApplication(id))
    }

    pub fn applications(&self) -> impl Iterator<Item = &MultiTierApplication> {
        self.applications.values()
    }

    pub fn application_controller(&self, id: ApplicationId) -> Result<&dyn ApplicationController> {
        self.application_controllers
            .get(&id)
            .map(|c| c.as_ref())
            .ok_or(SimulationError::InvalidApplication(id))
    }

    pub fn physical_machine(&self, id: PhysicalMachineId) -> Result<&PhysicalMachine> {
        self.physical_machines
            .get(&id)
            .ok_or(SimulationError::InvalidPhysicalMachine(id))
    }

    pub fn physical_machines(&self) -> impl Iterator<Item = &PhysicalMachine> {
        self.physical_machines.values()
    }

    pub fn virtual_machine(&self, id: VirtualMachineId) -> Result<&VirtualMachine> {
        self.virtual_machines
            .get(&id)
            .ok_or(SimulationError::InvalidVirtualMachine(id))
    }

    pub fn virtual_machines(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.virtual_machines.values()
    }

    pub fn current_placement(&self) -> &VirtualMachinesPlacement {
        &self.placement
    }

    pub fn is_deployed(&self, id: ApplicationId) -> bool {
        self.deployed.contains_key(&id)
    }

    pub fn is_inhibited(&self, id: ApplicationId) -> bool {
        self.inhibited.contains(&id)
    }

    pub fn deployed_applications(&self) -> Vec<ApplicationId> {
        self.deployed.keys().copied().collect()
    }

    /// VMs of a deployed application, in tier order.
    pub fn application_virtual_machines(&self, id: ApplicationId) -> Result<&[VirtualMachineId]> {
        self.application(id)?;
        self.deployed
            .get(&id)
            .map(|vms| vms.as_slice())
            .ok_or(SimulationError::NotDeployed(id))
    }

    /// Deployed applications that are not inhibited.
    pub fn active_applications(&self) -> Vec<ApplicationId> {
        self.deployed
            .keys()
            .filter(|id| !self.inhibited.contains(id))
            .copied()
            .collect()
    }

    /// Powered-on VMs of the active applications.
    pub fn active_virtual_machines(&self) -> Vec<VirtualMachineId> {
        self.active_applications()
            .iter()
            .flat_map(|app| self.deployed[app].iter())
            .filter(|vm| self.virtual_machines.get(vm).map_or(false, |v| v.is_powered_on()))
            .copied()
            .collect()
    }

    pub fn powered_on_physical_machines(&self) -> Vec<PhysicalMachineId> {
        self.physical_machines
            .values()
            .filter(|pm| pm.is_powered_on())
            .map(|pm| pm.id)
            .collect()
    }

    /// Energy consumed by all physical machines since the last system initialization.
    pub fn energy_consumed(&self) -> f64 {
        let time = self.ctx.time();
        self.physical_machines.values().map(|pm| pm.energy_consumed(time)).sum()
    }

    pub fn time(&self) -> f64 {
        self.ctx.time()
    }

    // APPLICATION LIFECYCLE //

    /// Creates one VM per tier. No-op if the application is already deployed.
    pub fn deploy_application(&mut self, id: ApplicationId) -> Result<()> {
        if self.deployed.contains_key(&id) {
            return Ok(());
        }
        let application = self
            .applications
            .get(&id)
            .ok_or(SimulationError::InvalidApplication(id))?;
        let mut vms = Vec::with_capacity(application.num_tiers());
        for (tier, spec) in application.tiers().iter().enumerate() {
            let vm_id = self.virtual_machine_ids.next_id();
            let mut vm = VirtualMachine::new(vm_id, format!("{}-{}", application.name, spec.name), id, tier);
            for (category, share) in spec.shares() {
                vm.set_wanted_share(*category, *share);
            }
            self.virtual_machines.insert(vm_id, vm);
            vms.push(vm_id);
        }
        log_info!(self.ctx, "deployed application {} with VMs {:?}", id, vms);
        self.deployed.insert(id, vms);
        Ok(())
    }

    /// Displaces and destroys every VM of the application.
    pub fn undeploy_application(&mut self, id: ApplicationId) -> Result<()> {
        let vms = self.application_virtual_machines(id)?.to_vec();
        if self.application(id)?.is_running() {
            self.application_mut(id)?.stop();
        }
        for vm in vms.iter() {
            if self.placement.placed(*vm) {
                self.displace_virtual_machine(*vm, true)?;
            } else {
                self.power_off_virtual_machine(*vm)?;
            }
            self.virtual_machines.remove(vm);
        }
        self.deployed.remove(&id);
        log_info!(self.ctx, "undeployed application {}", id);
        Ok(())
    }

    /// Powers on the VMs of the application and starts it.
    ///
    /// Returns false, with a warning, if the application is inhibited, already running or some of
    /// its VMs are not placed.
    pub fn start_application(&mut self, id: ApplicationId) -> Result<bool> {
        let vms = self.application_virtual_machines(id)?.to_vec();
        if self.inhibited.contains(&id) {
            log_warn!(self.ctx, "cannot start application {}: it is inhibited", id);
            return Ok(false);
        }
        if self.application(id)?.is_running() {
            log_warn!(self.ctx, "cannot start application {}: it is already running", id);
            return Ok(false);
        }
        if let Some(vm) = vms.iter().find(|vm| !self.placement.placed(**vm)) {
            log_warn!(self.ctx, "cannot start application {}: VM {} is not placed", id, vm);
            return Ok(false);
        }
        for vm in vms.iter() {
            self.power_on_virtual_machine(*vm)?;
        }
        self.application_mut(id)?.start();
        log_info!(self.ctx, "started application {}", id);
        Ok(true)
    }

    /// Powers off the VMs of the application and stops it. Fails like [`Self::start_application`].
    pub fn stop_application(&mut self, id: ApplicationId) -> Result<bool> {
        let vms = self.application_virtual_machines(id)?.to_vec();
        if self.inhibited.contains(&id) {
            log_warn!(self.ctx, "cannot stop application {}: it is inhibited", id);
            return Ok(false);
        }
        if !self.application(id)?.is_running() {
            log_warn!(self.ctx, "cannot stop application {}: it is not running", id);
            return Ok(false);
        }
        if let Some(vm) = vms.iter().find(|vm| !self.placement.placed(**vm)) {
            log_warn!(self.ctx, "cannot stop application {}: VM {} is not placed", id, vm);
            return Ok(false);
        }
        for vm in vms.iter() {
            self.power_off_virtual_machine(*vm)?;
        }
        self.application_mut(id)?.stop();
        log_info!(self.ctx, "stopped application {}", id);
        Ok(true)
    }

    /// Starts every deployed application that is not running. Returns the number of started ones.
    pub fn start_applications(&mut self) -> Result<usize> {
        let mut started = 0;
        for id in self.deployed_applications() {
            if !self.application(id)?.is_running() && self.start_application(id)? {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Stops every running application. Returns the number of stopped ones.
    pub fn stop_applications(&mut self) -> Result<usize> {
        let mut stopped = 0;
        for id in self.deployed_applications() {
            if self.application(id)?.is_running() && self.stop_application(id)? {
                stopped += 1;
            }
        }
        Ok(stopped)
    }

    /// Excludes the application from the active view (`flag = true`) or brings it back.
    pub fn inhibit_application(&mut self, id: ApplicationId, flag: bool) -> Result<()> {
        let application = self.application(id)?;
        application.simulation_model().borrow_mut().enable(!flag);
        if let Some(controller) = self.application_controllers.get_mut(&id) {
            controller.enable(!flag);
        }
        if flag {
            self.inhibited.insert(id);
        } else {
            self.inhibited.remove(&id);
        }
        Ok(())
    }

    // VM PLACEMENT //

    /// Hosts `vm` on `pm` with the given shares, used both as wanted and actual shares.
    ///
    /// Powers the target machine on if needed. With `update_placement` the placement table records
    /// the new mapping.
    pub fn place_virtual_machine(
        &mut self,
        vm: VirtualMachineId,
        pm: PhysicalMachineId,
        shares: ShareList,
        power_on: bool,
        update_placement: bool,
    ) -> Result<()> {
        let old_host = self.virtual_machine(vm)?.host();
        {
            let machine = self.physical_machine(pm)?;
            if let Some((category, _)) = shares.iter().find(|(c, _)| !machine.has_resource(*c)) {
                return Err(SimulationError::IncompatibleCategory(*category));
            }
        }
        if !self.physical_machine(pm)?.is_powered_on() {
            self.power_on_physical_machine(pm)?;
        }
        if old_host != Some(pm) {
            if let Some(old) = old_host {
                self.physical_machine_mut(old)?.vmm_mut().destroy_domain(vm);
            }
            self.physical_machine_mut(pm)?.vmm_mut().create_domain(vm);
            self.virtual_machine_mut(vm)?.set_host(Some(pm));
        }
        if power_on {
            self.virtual_machine_mut(vm)?.power_on();
        }
        if update_placement {
            if self.placement.placed(vm) {
                self.placement.replace(vm, pm, shares.clone())?;
            } else {
                self.placement.place(vm, pm, shares.clone())?;
            }
        }
        {
            let machine = self.virtual_machine_mut(vm)?;
            for (category, share) in shares.iter() {
                machine.set_wanted_share(*category, *share);
                machine.set_actual_share(*category, *share);
            }
        }
        self.sync_tier_share(vm)?;
        if let Some(old) = old_host.filter(|old| *old != pm) {
            self.refresh_power(old)?;
        }
        self.refresh_power(pm)
    }

    /// Moves a running VM to `pm`, or only updates its shares if it already runs there.
    ///
    /// Returns true if the VM changed host. Migrating a powered-off VM is refused with a warning.
    pub fn migrate_virtual_machine(
        &mut self,
        vm: VirtualMachineId,
        pm: PhysicalMachineId,
        shares: ShareList,
    ) -> Result<bool> {
        let (powered_on, host) = {
            let machine = self.virtual_machine(vm)?;
            (machine.is_powered_on(), machine.host())
        };
        self.physical_machine(pm)?;
        if !powered_on {
            log_warn!(self.ctx, "cannot migrate VM {}: it is powered off", vm);
            return Ok(false);
        }
        if !self.physical_machine(pm)?.is_powered_on() {
            self.power_on_physical_machine(pm)?;
        }
        let relocated = host != Some(pm);
        if relocated {
            log_debug!(self.ctx, "migrating VM {} from {:?} to {}", vm, host, pm);
        }
        self.place_virtual_machine(vm, pm, shares, false, true)?;
        Ok(relocated)
    }

    /// Removes `vm` from its host and from the placement table, optionally powering it off first.
    ///
    /// Returns false, with a warning, if the VM is not placed.
    pub fn displace_virtual_machine(&mut self, vm: VirtualMachineId, power_off: bool) -> Result<bool> {
        let host = self.virtual_machine(vm)?.host();
        if !self.placement.placed(vm) {
            log_warn!(self.ctx, "cannot displace VM {}: it is not placed", vm);
            return Ok(false);
        }
        if power_off {
            self.power_off_virtual_machine(vm)?;
        }
        if let Some(pm) = host {
            self.physical_machine_mut(pm)?.vmm_mut().destroy_domain(vm);
        }
        self.virtual_machine_mut(vm)?.set_host(None);
        self.placement.displace(vm);
        self.sync_tier_share(vm)?;
        if let Some(pm) = host {
            self.refresh_power(pm)?;
        }
        Ok(true)
    }

    /// Displaces every placed VM and clears the placement table.
    pub fn displace_virtual_machines(&mut self, power_off: bool) -> Result<()> {
        let vms: Vec<VirtualMachineId> = self.placement.iter().map(|(vm, _)| vm).collect();
        for vm in vms {
            self.displace_virtual_machine(vm, power_off)?;
        }
        self.placement.displace_all();
        Ok(())
    }

    /// Applies a whole new placement and powers off the machines left without VMs.
    ///
    /// Returns the number of VMs that changed host.
    pub fn migrate(&mut self, placement: &VirtualMachinesPlacement) -> Result<usize> {
        let mut relocated = 0;
        for (vm, entry) in placement.iter() {
            if self.placement.placed(vm) {
                if self.migrate_virtual_machine(vm, entry.physical_machine, entry.shares.clone())? {
                    relocated += 1;
                }
            } else {
                self.place_virtual_machine(vm, entry.physical_machine, entry.shares.clone(), false, true)?;
            }
        }
        let idle: Vec<PhysicalMachineId> = self
            .physical_machines
            .values()
            .filter(|pm| pm.is_powered_on() && pm.vmm().num_domains() == 0)
            .map(|pm| pm.id)
            .collect();
        for pm in idle {
            self.power_off_physical_machine(pm)?;
        }
        Ok(relocated)
    }

    // POWER //

    /// Powers the machine on. Returns false, with a warning, if it is already on.
    pub fn power_on_physical_machine(&mut self, pm: PhysicalMachineId) -> Result<bool> {
        let time = self.ctx.time();
        if !self.physical_machine_mut(pm)?.power_on(time) {
            log_warn!(self.ctx, "physical machine {} is already powered on", pm);
            return Ok(false);
        }
        log_debug!(self.ctx, "powered on physical machine {}", pm);
        self.refresh_power(pm)?;
        Ok(true)
    }

    /// Powers off the hosted VMs, then the machine itself.
    pub fn power_off_physical_machine(&mut self, pm: PhysicalMachineId) -> Result<bool> {
        if !self.physical_machine(pm)?.is_powered_on() {
            return Ok(false);
        }
        let hosted: Vec<VirtualMachineId> = self.physical_machine(pm)?.vmm().domains().collect();
        for vm in hosted {
            if self.virtual_machine(vm)?.is_powered_on() {
                self.virtual_machine_mut(vm)?.power_off();
                self.sync_tier_share(vm)?;
            }
        }
        let time = self.ctx.time();
        self.physical_machine_mut(pm)?.power_off(time);
        log_debug!(self.ctx, "powered off physical machine {}", pm);
        Ok(true)
    }

    /// Powers on a placed VM, powering on its host if needed.
    pub fn power_on_virtual_machine(&mut self, vm: VirtualMachineId) -> Result<bool> {
        let host = match self.virtual_machine(vm)?.host() {
            Some(host) => host,
            None => {
                log_warn!(self.ctx, "cannot power on VM {}: it has no host", vm);
                return Ok(false);
            }
        };
        if !self.physical_machine(host)?.is_powered_on() {
            self.power_on_physical_machine(host)?;
        }
        let changed = self.virtual_machine_mut(vm)?.power_on();
        self.sync_tier_share(vm)?;
        self.refresh_power(host)?;
        Ok(changed)
    }

    pub fn power_off_virtual_machine(&mut self, vm: VirtualMachineId) -> Result<bool> {
        let changed = self.virtual_machine_mut(vm)?.power_off();
        self.sync_tier_share(vm)?;
        if let Some(host) = self.virtual_machine(vm)?.host() {
            self.refresh_power(host)?;
        }
        Ok(changed)
    }

    // SHARES //

    /// Changes the wanted share of a VM and lets its host's controller enforce the actual shares.
    pub fn set_virtual_machine_wanted_share(
        &mut self,
        vm: VirtualMachineId,
        category: ResourceCategory,
        share: f64,
    ) -> Result<()> {
        let machine = self.virtual_machine_mut(vm)?;
        machine.set_wanted_share(category, share);
        match machine.host() {
            Some(pm) => self.enforce_physical_machine(pm),
            None => Ok(()),
        }
    }

    fn enforce_physical_machine(&mut self, pm: PhysicalMachineId) -> Result<()> {
        let updates = {
            let machine = self
                .physical_machines
                .get(&pm)
                .ok_or(SimulationError::InvalidPhysicalMachine(pm))?;
            let vms: Vec<&VirtualMachine> = machine
                .vmm()
                .domains()
                .filter_map(|id| self.virtual_machines.get(&id))
                .collect();
            let controller = self
                .physical_machine_controllers
                .get_mut(&pm)
                .ok_or(SimulationError::InvalidPhysicalMachine(pm))?;
            controller.enforce(machine, &vms)
        };
        let mut touched = BTreeSet::new();
        for (vm, category, share) in updates {
            self.virtual_machine_mut(vm)?.set_actual_share(category, share);
            if let Some(entry) = self.placement.find(vm) {
                let mut shares = entry.shares.clone();
                match shares.iter_mut().find(|(c, _)| *c == category) {
                    Some(slot) => slot.1 = share,
                    None => shares.push((category, share)),
                }
                self.placement.replace(vm, pm, shares)?;
            }
            touched.insert(vm);
        }
        for vm in touched {
            self.sync_tier_share(vm)?;
        }
        self.refresh_power(pm)
    }

    /// Runs the controller of an application once.
    pub fn control_application(&mut self, id: ApplicationId) -> Result<()> {
        let application = self.application(id)?;
        if !application.is_running() || self.inhibited.contains(&id) {
            return Ok(());
        }
        let observations = {
            let model = application.simulation_model().borrow();
            let mut observations = Vec::new();
            for vm_id in self.deployed.get(&id).into_iter().flatten() {
                let vm = self.virtual_machine(*vm_id)?;
                observations.push(TierObservation {
                    vm: vm.id,
                    tier: vm.tier,
                    busy_time: model.tier_busy_time(vm.tier)?,
                    wanted_share: vm.wanted_share(ResourceCategory::Cpu),
                });
            }
            observations
        };
        let time = self.ctx.time();
        let controller = self
            .application_controllers
            .get_mut(&id)
            .ok_or(SimulationError::InvalidApplication(id))?;
        if !controller.enabled() {
            return Ok(());
        }
        let updates = controller.control(time, &observations);
        for (vm, category, share) in updates {
            self.set_virtual_machine_wanted_share(vm, category, share)?;
        }
        Ok(())
    }

    // SIMULATION LIFECYCLE //

    /// Brings the data center back to "no VM placed, every machine off".
    pub fn on_system_initialization(&mut self) -> Result<()> {
        self.displace_virtual_machines(true)?;
        let time = self.ctx.time();
        for pm in self.physical_machines.values_mut() {
            pm.reset(time);
        }
        for vm in self.virtual_machines.values_mut() {
            vm.power_off();
            vm.set_host(None);
            vm.clear_shares();
            if let Some(tier) = self
                .applications
                .get(&vm.application_id)
                .and_then(|app| app.tiers().get(vm.tier))
            {
                for (category, share) in tier.shares() {
                    vm.set_wanted_share(*category, *share);
                }
            }
        }
        for application in self.applications.values_mut() {
            application.reset();
        }
        for controller in self.application_controllers.values_mut() {
            controller.reset();
        }
        Ok(())
    }

    /// Closes the energy accounting of the replication.
    pub fn on_system_finalization(&mut self) -> Result<()> {
        let pms: Vec<PhysicalMachineId> = self.physical_machines.keys().copied().collect();
        for pm in pms {
            self.refresh_power(pm)?;
        }
        Ok(())
    }

    // INTERNALS //

    fn application_mut(&mut self, id: ApplicationId) -> Result<&mut MultiTierApplication> {
        self.applications
            .get_mut(&id)
            .ok_or(SimulationError::InvalidApplication(id))
    }

    fn physical_machine_mut(&mut self, id: PhysicalMachineId) -> Result<&mut PhysicalMachine> {
        self.physical_machines
            .get_mut(&id)
            .ok_or(SimulationError::InvalidPhysicalMachine(id))
    }

    fn virtual_machine_mut(&mut self, id: VirtualMachineId) -> Result<&mut VirtualMachine> {
        self.virtual_machines
            .get_mut(&id)
            .ok_or(SimulationError::InvalidVirtualMachine(id))
    }

    /// Pushes the CPU share of a VM, moved to the reference frame, to its tier's service station.
    /// A VM that is off or has no host stalls the station.
    fn sync_tier_share(&self, vm: VirtualMachineId) -> Result<()> {
        let machine = self.virtual_machine(vm)?;
        let application = self.application(machine.application_id)?;
        let reference = application.reference_resource(ResourceCategory::Cpu)?;
        let share = match machine.host() {
            Some(pm) if machine.is_powered_on() => {
                let cpu = self.physical_machine(pm)?.resource(ResourceCategory::Cpu)?;
                scale_resource_share(
                    cpu.capacity,
                    cpu.threshold,
                    reference.capacity,
                    reference.threshold,
                    machine.actual_share(ResourceCategory::Cpu).unwrap_or(0.0),
                )
            }
            _ => 0.0,
        };
        application
            .simulation_model()
            .borrow_mut()
            .resource_share(machine.tier, ResourceCategory::Cpu, share)
    }

    /// Updates the power drawn by a machine from the actual CPU shares of its running VMs.
    fn refresh_power(&mut self, pm: PhysicalMachineId) -> Result<()> {
        let share: f64 = self
            .physical_machine(pm)?
            .vmm()
            .domains()
            .filter_map(|id| self.virtual_machines.get(&id))
            .filter(|vm| vm.is_powered_on())
            .filter_map(|vm| vm.actual_share(ResourceCategory::Cpu))
            .sum();
        let time = self.ctx.time();
        self.physical_machine_mut(pm)?.update_power(time, share)
    }
}
