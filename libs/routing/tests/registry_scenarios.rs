//! Routing scenarios across the public registry API

use routing::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn orders_registry() -> BindingRegistry {
    let registry = BindingRegistry::new();
    registry
        .add_binding(Binding::new("Q1", "orders.*", EndpointId(1)).unwrap())
        .unwrap();
    registry
        .add_binding(Binding::new("Q2", "orders.new", EndpointId(2)).unwrap())
        .unwrap();
    registry
}

#[test]
fn test_wildcard_and_exact_bindings_fan_out() {
    let registry = orders_registry();

    let new = registry.get_matching_bindings("orders.new").unwrap();
    assert_eq!(new.names(), vec!["Q1", "Q2"]);
    assert_eq!(new.endpoints(), vec![EndpointId(1), EndpointId(2)]);

    let old = registry.get_matching_bindings("orders.old").unwrap();
    assert_eq!(old.names(), vec!["Q1"]);

    assert!(registry.get_matching_bindings("orders").unwrap().is_empty());
    assert!(matches!(
        registry.get_matching_bindings(""),
        Err(RoutingError::InvalidAddressPattern)
    ));
}

#[test]
fn test_transactional_removal_and_rollback() {
    let registry = orders_registry();
    let tx = Transaction::new();

    let removed = registry.remove_binding("Q1", Some(&tx)).unwrap().unwrap();
    assert_eq!(removed.name(), "Q1");

    // Routing stops at once, before the transaction resolves
    let during = registry.get_matching_bindings("orders.new").unwrap();
    assert_eq!(during.names(), vec!["Q2"]);
    assert!(registry.get_bindings_for_address("orders.*").is_none());

    tx.rollback().unwrap();
    assert_eq!(registry.get_binding("Q1").unwrap().address(), "orders.*");
    let after = registry.get_matching_bindings("orders.new").unwrap();
    assert_eq!(after.names(), vec!["Q1", "Q2"]);
    assert!(registry.get_bindings_for_address("orders.*").is_some());
}

#[test]
fn test_transactional_removal_and_commit() {
    let registry = orders_registry();
    let tx = Transaction::new();
    registry.remove_binding("Q1", Some(&tx)).unwrap();
    registry.remove_binding("Q2", Some(&tx)).unwrap();
    assert_eq!(tx.operation_count(), 2);

    tx.commit().unwrap();
    assert_eq!(registry.binding_count(), 0);
    assert!(registry.addresses().is_empty());
    assert!(!registry.is_pending_delete("Q1"));
    assert!(tx.rollback().is_err());
}

#[test]
fn test_second_transaction_does_not_steal_pending_marker() {
    let registry = orders_registry();
    let first = Transaction::new();
    let second = Transaction::new();

    registry.remove_binding("Q1", Some(&first)).unwrap();
    assert!(registry.remove_binding("Q1", Some(&second)).unwrap().is_none());
    second.commit().unwrap();
    assert!(registry.is_pending_delete("Q1"));

    first.rollback().unwrap();
    assert!(registry.get_binding("Q1").is_some());
}

#[test]
fn test_concurrent_adds_converge_on_one_aggregate() {
    const THREADS: usize = 8;
    let registry = BindingRegistry::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let binding =
                    Binding::new(format!("Q{}", i), "orders.new", EndpointId(i as u64)).unwrap();
                barrier.wait();
                registry.add_binding(binding).unwrap()
            })
        })
        .collect();

    let existed: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(existed.iter().filter(|e| !**e).count(), 1);

    let aggregate = registry.get_bindings_for_address("orders.new").unwrap();
    assert_eq!(aggregate.len(), THREADS);
}

#[test]
fn test_concurrent_duplicate_adds_have_one_winner() {
    const THREADS: usize = 8;
    let registry = BindingRegistry::new();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let binding =
                    Binding::new("shared", &format!("addr.{}", i), EndpointId(i as u64)).unwrap();
                barrier.wait();
                registry.add_binding(binding).is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(registry.binding_count(), 1);
    assert_eq!(registry.addresses().len(), 1);
}

#[test]
fn test_concurrent_add_and_remove_leave_no_orphans() {
    const ROUNDS: usize = 500;
    let registry = BindingRegistry::new();

    for round in 0..ROUNDS {
        let name = format!("R{}", round);
        let barrier = Arc::new(Barrier::new(2));

        let adder = {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            let name = name.clone();
            thread::spawn(move || {
                let binding = Binding::new(name, "orders.new", EndpointId(1)).unwrap();
                barrier.wait();
                registry.add_binding(binding).unwrap();
            })
        };
        let remover = {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            let name = name.clone();
            thread::spawn(move || {
                barrier.wait();
                registry.remove_binding(&name, None).unwrap();
            })
        };
        adder.join().unwrap();
        remover.join().unwrap();

        let in_aggregate = registry
            .get_bindings_for_address("orders.new")
            .is_some_and(|aggregate| aggregate.names().contains(&name));
        assert_eq!(in_aggregate, registry.get_binding(&name).is_some());

        registry.remove_binding(&name, None).unwrap();
        assert!(registry.get_bindings_for_address("orders.new").is_none());
    }
}

#[test]
fn test_readers_run_alongside_writers() {
    let registry = orders_registry();
    let writer = {
        let registry = registry.clone();
        thread::spawn(move || {
            for i in 0..200 {
                let name = format!("T{}", i);
                registry
                    .add_binding(Binding::new(name.clone(), "orders.#", EndpointId(9)).unwrap())
                    .unwrap();
                registry.remove_binding(&name, None).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let names: HashSet<String> = registry
            .get_matching_bindings("orders.new")
            .unwrap()
            .names()
            .into_iter()
            .collect();
        assert!(names.contains("Q1") && names.contains("Q2"));
    }
    writer.join().unwrap();
    assert_eq!(registry.binding_count(), 2);
}

#[test]
fn test_clear_wipes_everything() {
    let registry = orders_registry();
    registry.clear();
    assert_eq!(registry.binding_count(), 0);
    assert!(registry.get_matching_bindings("orders.new").unwrap().is_empty());
    assert!(registry
        .add_binding(Binding::new("Q1", "orders.*", EndpointId(1)).unwrap())
        .is_ok());
}
