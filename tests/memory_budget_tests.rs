//! Memory budget enforcement tests

use std::sync::Arc;
use std::thread;

use vsort_core::budget::{BudgetGuard, MemoryBudget};
use vsort_mem::{Error, MemoryBudgetImpl};

#[test]
fn test_budget_acquire_release() {
    let budget = MemoryBudgetImpl::new(1024 * 1024); // 1MB

    let guard = budget.acquire(100 * 1024, "sort_block").expect("Acquire failed");
    assert_eq!(budget.used_bytes(), 100 * 1024);
    assert_eq!(guard.bytes(), 100 * 1024);
    assert_eq!(guard.tag(), "sort_block");

    drop(guard);
    assert_eq!(budget.used_bytes(), 0);
}

#[test]
fn test_budget_exhaustion_reports_usage() {
    let budget = MemoryBudgetImpl::new(500 * 1024);

    let _held = budget.acquire(400 * 1024, "sort_block").expect("First acquire failed");
    match budget.acquire(200 * 1024, "sort_block") {
        Err(Error::BudgetExceeded {
            tag,
            requested,
            capacity,
            used,
        }) => {
            assert_eq!(tag, "sort_block");
            assert_eq!(requested, 200 * 1024);
            assert_eq!(capacity, 500 * 1024);
            assert_eq!(used, 400 * 1024);
        }
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
    assert_eq!(budget.used_bytes(), 400 * 1024);
}

#[test]
fn test_peak_survives_release() {
    let budget = MemoryBudgetImpl::new(1000);
    {
        let _a = budget.acquire(300, "t").unwrap();
        let _b = budget.acquire(500, "t").unwrap();
    }
    let _c = budget.acquire(100, "t").unwrap();
    assert_eq!(budget.used_bytes(), 100);
    assert_eq!(budget.peak_bytes(), 800);
}

#[test]
fn test_budget_exact_capacity() {
    let budget = MemoryBudgetImpl::new(1024);

    let guard = budget.try_acquire(1024, "test").expect("Should acquire exact capacity");
    assert!(budget.try_acquire(1, "test").is_none());

    drop(guard);
    assert_eq!(budget.used_bytes(), 0);
}

#[test]
fn test_budget_try_resize() {
    let budget = MemoryBudgetImpl::new(1024);

    let mut guard = budget.acquire(100, "test").unwrap();
    assert!(guard.try_resize(200));
    assert_eq!(budget.used_bytes(), 200);

    assert!(!guard.try_resize(2048), "growing past capacity must fail");
    assert_eq!(guard.bytes(), 200);

    assert!(guard.try_resize(50));
    assert_eq!(budget.used_bytes(), 50);
}

#[test]
fn test_budget_high_contention() {
    let budget = Arc::new(MemoryBudgetImpl::new(100 * 1024)); // 100KB total
    let mut handles = vec![];

    for _ in 0..20 {
        let budget = Arc::clone(&budget);
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                if let Some(guard) = budget.try_acquire(10 * 1024, "test") {
                    thread::sleep(std::time::Duration::from_micros(100));
                    drop(guard);
                } else {
                    thread::sleep(std::time::Duration::from_micros(50));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(budget.used_bytes(), 0);
    assert!(budget.peak_bytes() <= 100 * 1024);
}
