use std::collections::BTreeMap;

use vdc_simulator::error::SimulationError;
use vdc_simulator::placement_solver::PlacementSolution;
use vdc_simulator::resource::ResourceCategory;
use vdc_simulator::virtual_machines_placement::VirtualMachinesPlacement;

fn cpu(share: f64) -> Vec<(ResourceCategory, f64)> {
    vec![(ResourceCategory::Cpu, share)]
}

#[test]
fn test_place_and_find() {
    let mut placement = VirtualMachinesPlacement::new();
    assert!(placement.is_empty());
    placement.place(1, 10, cpu(0.5)).unwrap();
    placement.place(2, 10, cpu(0.25)).unwrap();
    placement.place(3, 11, cpu(0.75)).unwrap();

    assert_eq!(placement.len(), 3);
    assert!(placement.placed(1));
    assert!(!placement.placed(4));
    assert!(placement.placed_on(3, 11));
    assert!(!placement.placed_on(3, 10));
    assert_eq!(placement.find(2).unwrap().physical_machine, 10);
    assert_eq!(placement.find(2).unwrap().shares, cpu(0.25));
    assert_eq!(placement.vms_on(10), vec![1, 2]);
    assert_eq!(placement.iter().map(|(vm, _)| vm).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn test_vm_is_placed_at_most_once() {
    let mut placement = VirtualMachinesPlacement::new();
    placement.place(1, 10, cpu(0.5)).unwrap();
    assert_eq!(placement.place(1, 11, cpu(0.5)), Err(SimulationError::AlreadyPlaced(1)));
    assert!(placement.placed_on(1, 10));
    assert_eq!(placement.len(), 1);

    placement.replace(1, 11, cpu(0.3)).unwrap();
    assert!(placement.placed_on(1, 11));
    assert_eq!(placement.find(1).unwrap().shares, cpu(0.3));
    assert_eq!(placement.replace(2, 11, cpu(0.3)), Err(SimulationError::NotPlaced(2)));
}

#[test]
fn test_displace() {
    let mut placement = VirtualMachinesPlacement::new();
    placement.place(1, 10, cpu(0.5)).unwrap();
    placement.place(2, 11, cpu(0.5)).unwrap();
    assert!(placement.displace(1));
    assert!(!placement.displace(1));
    assert!(!placement.placed(1));
    // A displaced VM can be placed again.
    placement.place(1, 11, cpu(0.5)).unwrap();
    assert_eq!(placement.vms_on(11), vec![1, 2]);

    placement.displace_all();
    assert!(placement.is_empty());
}

#[test]
fn test_solution_to_placement() {
    let mut entries = BTreeMap::new();
    entries.insert((10, 1), cpu(0.5));
    entries.insert((10, 2), cpu(0.5));
    let solution = PlacementSolution {
        solved: true,
        cost: 1.0,
        placement: entries,
    };
    let placement = solution.to_placement().unwrap();
    assert!(placement.placed_on(1, 10));
    assert!(placement.placed_on(2, 10));

    // The same VM on two machines is not a placement.
    let mut entries = BTreeMap::new();
    entries.insert((10, 1), cpu(0.5));
    entries.insert((11, 1), cpu(0.5));
    let solution = PlacementSolution {
        solved: true,
        cost: 1.0,
        placement: entries,
    };
    assert_eq!(solution.to_placement(), Err(SimulationError::AlreadyPlaced(1)));
}

#[test]
fn test_mixed_operations_keep_one_host_per_vm() {
    let mut placement = VirtualMachinesPlacement::new();
    let mut expected: BTreeMap<u64, u64> = BTreeMap::new();
    // Deterministic linear congruential sequence of operations over 8 VMs and 3 machines.
    let mut state: u64 = 12345;
    for _ in 0..500 {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let vm = (state >> 33) % 8;
        let pm = 10 + (state >> 40) % 3;
        match (state >> 50) % 4 {
            0 => {
                let result = placement.place(vm, pm, cpu(0.1));
                if expected.contains_key(&vm) {
                    assert_eq!(result, Err(SimulationError::AlreadyPlaced(vm)));
                } else {
                    assert!(result.is_ok());
                    expected.insert(vm, pm);
                }
            }
            1 => {
                let result = placement.replace(vm, pm, cpu(0.2));
                if expected.contains_key(&vm) {
                    assert!(result.is_ok());
                    expected.insert(vm, pm);
                } else {
                    assert_eq!(result, Err(SimulationError::NotPlaced(vm)));
                }
            }
            2 => assert_eq!(placement.displace(vm), expected.remove(&vm).is_some()),
            _ => {
                if placement.placed(vm) {
                    placement.replace(vm, pm, cpu(0.3)).unwrap();
                } else {
                    placement.place(vm, pm, cpu(0.3)).unwrap();
                }
                expected.insert(vm, pm);
            }
        }

        assert_eq!(placement.len(), expected.len());
        for vm in 0..8 {
            assert_eq!(placement.placed(vm), expected.contains_key(&vm));
            let hosts: Vec<u64> = (10..13).filter(|pm| placement.placed_on(vm, *pm)).collect();
            match expected.get(&vm) {
                Some(pm) => assert_eq!(hosts, vec![*pm]),
                None => assert!(hosts.is_empty()),
            }
        }
        let hosted: usize = (10..13).map(|pm| placement.vms_on(pm).len()).sum();
        assert_eq!(hosted, expected.len());
    }
}
