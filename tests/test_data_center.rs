mod common;

use dslab_core::Simulation;
use vdc_simulator::error::SimulationError;
use vdc_simulator::resource::ResourceCategory;
use vdc_simulator::virtual_machines_placement::VirtualMachinesPlacement;

use common::{add_application, make_data_center};

#[test]
fn test_start_requires_every_vm_placed() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 2, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5, 0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vms = dc.application_virtual_machines(app).unwrap().to_vec();
    assert_eq!(vms.len(), 2);

    dc.place_virtual_machine(vms[0], pms[0], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    assert!(!dc.start_application(app).unwrap());
    assert!(!dc.application(app).unwrap().is_running());
    assert!(!dc.application(app).unwrap().simulation_model().borrow().is_running());
    assert!(!dc.virtual_machine(vms[0]).unwrap().is_powered_on());

    dc.place_virtual_machine(vms[1], pms[1], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    assert!(dc.start_application(app).unwrap());
    assert!(dc.application(app).unwrap().is_running());
    assert!(dc.application(app).unwrap().simulation_model().borrow().is_running());
    for vm in vms.iter() {
        assert!(dc.virtual_machine(*vm).unwrap().is_powered_on());
    }
    assert_eq!(dc.powered_on_physical_machines(), pms);

    // Starting twice is refused.
    assert!(!dc.start_application(app).unwrap());
}

#[test]
fn test_start_undeployed_application_fails() {
    let mut sim = Simulation::new(42);
    let (dc, _) = make_data_center(&mut sim, 1, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5]);
    assert_eq!(
        dc.borrow_mut().start_application(app),
        Err(SimulationError::NotDeployed(app))
    );
    assert_eq!(
        dc.borrow_mut().start_application(app + 100),
        Err(SimulationError::InvalidApplication(app + 100))
    );
}

#[test]
fn test_inhibited_application_leaves_active_sets() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 2, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5, 0.5]);
    let other = add_application(&mut sim, &dc, "other", &[0.3]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    dc.deploy_application(other).unwrap();
    let vms = dc.application_virtual_machines(app).unwrap().to_vec();
    let other_vms = dc.application_virtual_machines(other).unwrap().to_vec();
    for (vm, pm) in vms.iter().chain(other_vms.iter()).zip([pms[0], pms[1], pms[1]]) {
        dc.place_virtual_machine(*vm, pm, vec![(ResourceCategory::Cpu, 0.3)], false, true)
            .unwrap();
    }
    assert_eq!(dc.start_applications().unwrap(), 2);
    assert_eq!(dc.active_virtual_machines().len(), 3);

    dc.inhibit_application(app, true).unwrap();
    assert!(dc.is_inhibited(app));
    assert_eq!(dc.active_applications(), vec![other]);
    assert_eq!(dc.active_virtual_machines(), other_vms);
    assert_eq!(dc.applications().count(), 2);
    assert_eq!(dc.virtual_machines().count(), 3);
    assert!(!dc.application(app).unwrap().simulation_model().borrow().enabled());

    // Inhibited applications can be neither stopped nor started.
    assert!(!dc.stop_application(app).unwrap());

    dc.inhibit_application(app, false).unwrap();
    assert_eq!(dc.active_applications().len(), 2);
    assert_eq!(dc.active_virtual_machines().len(), 3);
}

#[test]
fn test_migrate_to_identical_placement_is_noop() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 2, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5, 0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vms = dc.application_virtual_machines(app).unwrap().to_vec();
    dc.place_virtual_machine(vms[0], pms[0], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    dc.place_virtual_machine(vms[1], pms[1], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    dc.start_application(app).unwrap();

    let placement = dc.current_placement().clone();
    assert_eq!(dc.migrate(&placement).unwrap(), 0);
    assert_eq!(dc.current_placement(), &placement);
    assert_eq!(dc.powered_on_physical_machines().len(), 2);
}

#[test]
fn test_migrate_consolidates_and_powers_off_idle_machines() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 2, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5, 0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vms = dc.application_virtual_machines(app).unwrap().to_vec();
    dc.place_virtual_machine(vms[0], pms[0], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    dc.place_virtual_machine(vms[1], pms[1], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    dc.start_application(app).unwrap();

    let mut target = VirtualMachinesPlacement::new();
    target.place(vms[0], pms[0], vec![(ResourceCategory::Cpu, 0.4)]).unwrap();
    target.place(vms[1], pms[0], vec![(ResourceCategory::Cpu, 0.6)]).unwrap();
    assert_eq!(dc.migrate(&target).unwrap(), 1);

    assert_eq!(dc.current_placement(), &target);
    assert_eq!(dc.virtual_machine(vms[1]).unwrap().host(), Some(pms[0]));
    assert_eq!(dc.virtual_machine(vms[1]).unwrap().actual_share(ResourceCategory::Cpu), Some(0.6));
    assert!(dc.physical_machine(pms[0]).unwrap().vmm().hosts(vms[1]));
    assert!(!dc.physical_machine(pms[1]).unwrap().vmm().hosts(vms[1]));
    assert_eq!(dc.powered_on_physical_machines(), vec![pms[0]]);

    // Service speed follows the new shares: 0.6 on a machine equal to the reference is 1.2x.
    let multiplier = dc
        .application(app)
        .unwrap()
        .simulation_model()
        .borrow()
        .tier_multiplier(1)
        .unwrap();
    assert!((multiplier - 1.2).abs() < 1e-9);
}

#[test]
fn test_migrating_powered_off_vm_is_refused() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 2, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vm = dc.application_virtual_machines(app).unwrap()[0];
    dc.place_virtual_machine(vm, pms[0], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    assert!(!dc
        .migrate_virtual_machine(vm, pms[1], vec![(ResourceCategory::Cpu, 0.5)])
        .unwrap());
    assert!(dc.current_placement().placed_on(vm, pms[0]));
}

#[test]
fn test_displace() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 1, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5, 0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vms = dc.application_virtual_machines(app).unwrap().to_vec();
    assert!(!dc.displace_virtual_machine(vms[0], true).unwrap());

    for vm in vms.iter() {
        dc.place_virtual_machine(*vm, pms[0], vec![(ResourceCategory::Cpu, 0.5)], true, true)
            .unwrap();
    }
    assert!(dc.displace_virtual_machine(vms[0], true).unwrap());
    assert!(!dc.current_placement().placed(vms[0]));
    assert!(!dc.virtual_machine(vms[0]).unwrap().is_powered_on());
    assert_eq!(dc.virtual_machine(vms[0]).unwrap().host(), None);

    dc.displace_virtual_machines(true).unwrap();
    assert!(dc.current_placement().is_empty());
    assert_eq!(dc.physical_machine(pms[0]).unwrap().vmm().num_domains(), 0);
}

#[test]
fn test_power_off_machine_powers_off_hosted_vms() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 1, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vm = dc.application_virtual_machines(app).unwrap()[0];
    dc.place_virtual_machine(vm, pms[0], vec![(ResourceCategory::Cpu, 0.5)], true, true)
        .unwrap();
    assert!(!dc.power_on_physical_machine(pms[0]).unwrap());

    assert!(dc.power_off_physical_machine(pms[0]).unwrap());
    assert!(!dc.virtual_machine(vm).unwrap().is_powered_on());
    assert_eq!(dc.physical_machine(pms[0]).unwrap().current_power(), 0.0);
    assert!(dc.active_virtual_machines().is_empty());
}

#[test]
fn test_proportional_controller_caps_oversubscribed_machine() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 1, true);
    let app = add_application(&mut sim, &dc, "app", &[0.5, 0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vms = dc.application_virtual_machines(app).unwrap().to_vec();
    for vm in vms.iter() {
        dc.place_virtual_machine(*vm, pms[0], vec![(ResourceCategory::Cpu, 0.5)], true, true)
            .unwrap();
    }

    dc.set_virtual_machine_wanted_share(vms[0], ResourceCategory::Cpu, 1.0)
        .unwrap();
    let first = dc.virtual_machine(vms[0]).unwrap();
    let second = dc.virtual_machine(vms[1]).unwrap();
    assert_eq!(first.wanted_share(ResourceCategory::Cpu), Some(1.0));
    assert!((first.actual_share(ResourceCategory::Cpu).unwrap() - 1.0 / 1.5).abs() < 1e-9);
    assert!((second.actual_share(ResourceCategory::Cpu).unwrap() - 0.5 / 1.5).abs() < 1e-9);
    let entry = dc.current_placement().find(vms[0]).unwrap();
    assert!((entry.shares[0].1 - 1.0 / 1.5).abs() < 1e-9);
}

#[test]
fn test_undeploy_removes_vms() {
    let mut sim = Simulation::new(42);
    let (dc, pms) = make_data_center(&mut sim, 1, false);
    let app = add_application(&mut sim, &dc, "app", &[0.5]);
    let mut dc = dc.borrow_mut();
    dc.deploy_application(app).unwrap();
    let vm = dc.application_virtual_machines(app).unwrap()[0];
    dc.place_virtual_machine(vm, pms[0], vec![(ResourceCategory::Cpu, 0.5)], false, true)
        .unwrap();
    dc.start_application(app).unwrap();

    dc.undeploy_application(app).unwrap();
    assert!(!dc.is_deployed(app));
    assert!(!dc.application(app).unwrap().is_running());
    assert!(matches!(
        dc.virtual_machine(vm),
        Err(SimulationError::InvalidVirtualMachine(id)) if id == vm
    ));
    assert!(dc.current_placement().is_empty());
}
