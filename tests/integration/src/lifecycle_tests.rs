//! Lifecycle Tests - Adapter managers and request admission
//!
//! These tests cover the manager state machine as seen by callers:
//! - Holding queues calls until the manager is activated
//! - Discarding and Inactive reject calls
//! - Deactivation waits for in-flight calls when asked
//! - Bulk state changes reach every member adapter

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use futures::future::join_all;

use common::*;
use poa::{ManagerState, ObjectId, Orb, OrbConfig, PoaError, ServantHandle, ServantManager};

/// Test: calls made while Holding complete once the manager is activated
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_holding_queues_until_active() {
    init_logging();

    const CALLS: usize = 10;

    let orb = Orb::new(OrbConfig::default()).unwrap();
    assert_eq!(orb.root_manager().state(), ManagerState::Holding);

    let reference = orb
        .root_adapter()
        .servant_to_reference(&ServantHandle::new(EchoServant::new()))
        .unwrap();
    let dispatcher = orb.dispatcher();

    let calls: Vec<_> = (0..CALLS)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            let key = reference.key().clone();
            tokio::spawn(async move {
                dispatcher.invoke(&key, "echo", Bytes::from(format!("queued-{}", i))).await
            })
        })
        .collect();

    while orb.root_manager().held_requests() < CALLS {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(calls.iter().all(|c| !c.is_finished()));

    orb.root_manager().activate();
    for (i, result) in join_all(calls).await.into_iter().enumerate() {
        assert_eq!(result.unwrap().unwrap(), Bytes::from(format!("queued-{}", i)));
    }
    assert_eq!(orb.root_manager().held_requests(), 0);
}

/// Test: a full hold queue turns new calls away with a transient error
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hold_queue_capacity() {
    init_logging();

    let orb = Orb::new(OrbConfig::default().with_hold_capacity(2)).unwrap();
    let reference = orb
        .root_adapter()
        .servant_to_reference(&ServantHandle::new(EchoServant::new()))
        .unwrap();
    let dispatcher = orb.dispatcher();

    let held: Vec<_> = (0..2)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let key = reference.key().clone();
            tokio::spawn(async move { dispatcher.invoke(&key, "echo", Bytes::new()).await })
        })
        .collect();
    while orb.root_manager().held_requests() < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(matches!(
        dispatcher.invoke(reference.key(), "echo", Bytes::new()).await,
        Err(PoaError::Transient(_))
    ));

    orb.root_manager().activate();
    for result in join_all(held).await {
        assert!(result.unwrap().is_ok());
    }
}

/// Test: Discarding and Inactive reject new calls; Active admits again
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_discard_and_deactivate_reject() {
    init_logging();

    let orb = active_orb();
    let reference = orb
        .root_adapter()
        .servant_to_reference(&ServantHandle::new(EchoServant::new()))
        .unwrap();
    let dispatcher = orb.dispatcher();
    let manager = orb.root_manager();

    assert!(dispatcher.invoke(reference.key(), "echo", Bytes::new()).await.is_ok());

    manager.discard();
    let err = dispatcher
        .invoke(reference.key(), "echo", Bytes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PoaError::Transient(_)));
    assert!(err.is_retryable());

    manager.deactivate(false, true);
    assert!(!orb.root_adapter().is_active());
    assert!(matches!(
        dispatcher.invoke(reference.key(), "echo", Bytes::new()).await,
        Err(PoaError::AdapterInactive(_))
    ));

    manager.activate();
    assert!(orb.root_adapter().is_active());
    assert!(dispatcher.invoke(reference.key(), "echo", Bytes::new()).await.is_ok());
}

/// Test: an adapter's own inactive flag rejects calls even when its manager is active
#[tokio::test]
async fn test_adapter_flag_gates_admission() {
    init_logging();

    let orb = active_orb();
    let child = orb.root_adapter().create_child("child", None, &[]).unwrap();
    let reference = child
        .servant_to_reference(&ServantHandle::new(EchoServant::new()))
        .unwrap();
    let dispatcher = orb.dispatcher();

    child.deactivate(false, false);
    assert!(matches!(
        dispatcher.invoke(reference.key(), "echo", Bytes::new()).await,
        Err(PoaError::AdapterInactive(_))
    ));

    child.activate().unwrap();
    assert!(dispatcher.invoke(reference.key(), "echo", Bytes::new()).await.is_ok());
}

/// Test: deactivation with wait_for_completion returns after in-flight calls finish
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wait_for_completion_drains_calls() {
    init_logging();

    let orb = active_orb();
    let root = orb.root_adapter().clone();
    let servant = ServantHandle::new(EchoServant::with_delay(Duration::from_millis(200)));
    let reference = root.servant_to_reference(&servant).unwrap();
    let dispatcher = orb.dispatcher();

    let finished = Arc::new(AtomicBool::new(false));
    let call = {
        let finished = finished.clone();
        let key = reference.key().clone();
        tokio::spawn(async move {
            let result = dispatcher.invoke(&key, "slow", Bytes::new()).await;
            finished.store(true, Ordering::SeqCst);
            result
        })
    };

    while root.in_flight_requests() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let observed_finished = {
        let root = root.clone();
        let finished = finished.clone();
        tokio::task::spawn_blocking(move || {
            root.deactivate(false, true);
            finished.load(Ordering::SeqCst) || root.in_flight_requests() == 0
        })
        .await
        .unwrap()
    };

    assert!(observed_finished);
    assert_eq!(root.in_flight_requests(), 0);
    assert!(call.await.unwrap().is_ok());
}

/// Test: manager activation reaches every member, including individually deactivated ones
#[test]
fn test_manager_broadcast_to_members() {
    init_logging();

    let orb = active_orb();
    let manager = orb.create_manager();
    let members: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            orb.root_adapter()
                .create_child(name, Some(manager.clone()), &[])
                .unwrap()
        })
        .collect();
    assert_eq!(manager.member_count(), 3);
    assert_eq!(orb.root_manager().member_count(), 1);

    members[1].deactivate(false, false);
    manager.activate();
    assert!(members.iter().all(|m| m.is_active()));

    // Hold and discard record intent only
    manager.hold();
    manager.discard();
    assert!(members.iter().all(|m| m.is_active()));

    manager.deactivate(false, false);
    assert!(members.iter().all(|m| !m.is_active()));
    assert!(orb.root_adapter().is_active());

    // Children created without a manager join their parent's
    let nested = members[0].create_child("nested", None, &[]).unwrap();
    assert!(Arc::ptr_eq(nested.manager(), &manager));
    assert_eq!(manager.member_count(), 4);
}

/// Test: manager deactivation with etherealize releases every member's servants
#[test]
fn test_manager_deactivate_etherealizes() {
    init_logging();

    let orb = active_orb();
    let manager = orb.create_manager();
    let log = event_log();
    let mut activators = Vec::new();

    for name in ["left", "right"] {
        let adapter = orb
            .root_adapter()
            .create_child(name, Some(manager.clone()), &activator_policies())
            .unwrap();
        let activator = Arc::new(RecordingActivator::new(log.clone()));
        adapter
            .set_servant_manager(ServantManager::Activator(activator.clone()))
            .unwrap();
        for i in 0..3 {
            adapter.resolve_servant(&ObjectId::from(format!("obj-{}", i))).unwrap();
        }
        activators.push((adapter, activator));
    }

    let report = manager.deactivate(true, true);
    assert!(report.is_clean());
    assert_eq!(report.etherealized, 6);
    assert_eq!(report.adapters_destroyed, 0);
    assert_eq!(manager.state(), ManagerState::Inactive);

    for (adapter, activator) in &activators {
        assert_eq!(activator.etherealizations.load(Ordering::SeqCst), 3);
        assert_eq!(adapter.active_object_count(), 0);
        assert!(!adapter.is_destroyed());
    }
    assert!(log.lock().iter().all(|e| match e {
        Event::Etherealize { cleanup, remaining, .. } => *cleanup && !*remaining,
        Event::Incarnate { .. } => true,
        _ => false,
    }));
}

/// Test: shutdown destroys the tree and refuses a second call
#[tokio::test]
async fn test_shutdown() {
    init_logging();

    let orb = active_orb();
    let child = orb.root_adapter().create_child("svc", None, &[]).unwrap();
    let reference = child
        .servant_to_reference(&ServantHandle::new(EchoServant::new()))
        .unwrap();
    let dispatcher = orb.dispatcher();

    let report = orb.shutdown(true, true).unwrap();
    assert_eq!(report.adapters_destroyed, 2);
    assert!(orb.is_shut_down());
    assert!(child.is_destroyed());

    assert!(dispatcher
        .invoke(reference.key(), "echo", Bytes::new())
        .await
        .is_err());
    assert!(matches!(orb.shutdown(true, true), Err(PoaError::BadInvOrder(_))));
}

/// Test: async callers drain in-flight calls without blocking the runtime
#[tokio::test]
async fn test_async_drain_on_current_thread() {
    init_logging();

    let orb = active_orb();
    let servant = ServantHandle::new(EchoServant::with_delay(Duration::from_millis(100)));
    let reference = orb.root_adapter().servant_to_reference(&servant).unwrap();
    let dispatcher = orb.dispatcher();

    let call = {
        let key = reference.key().clone();
        tokio::spawn(async move { dispatcher.invoke(&key, "slow", Bytes::new()).await })
    };
    while orb.root_adapter().in_flight_requests() == 0 {
        tokio::task::yield_now().await;
    }

    orb.root_manager().discard();
    tokio::time::timeout(Duration::from_secs(2), orb.root_manager().drained())
        .await
        .expect("in-flight call never drained");
    assert_eq!(orb.root_adapter().in_flight_requests(), 0);

    let report = orb.shutdown(true, false).unwrap();
    assert_eq!(report.adapters_destroyed, 1);
    assert!(call.await.unwrap().is_ok());
}
