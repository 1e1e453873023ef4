//! Adapter Tests - Servant directory, servant managers and the adapter tree
//!
//! These tests drive the public broker API end to end:
//! - Activation, deactivation and resolution through the root adapter
//! - Activator and locator servant managers behind the dispatcher
//! - Adapter tree creation, lookup and recursive destruction
//! - Object references across adapter incarnations

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use bytes::Bytes;

use common::*;
use poa::types::{LifespanPolicy, ThreadPolicy};
use poa::{
    AdapterActivator, ObjectAdapter, ObjectId, PoaError, Policy, ServantHandle, ServantManager,
};

/// Test: activate, reject a second activation, deactivate, re-activate
#[test]
fn test_root_activation_scenario() {
    init_logging();

    let orb = active_orb();
    let root = orb.root_adapter();
    let s1 = ServantHandle::new(EchoServant::new());

    let x = root.activate_object(s1.clone()).unwrap();
    assert_eq!(root.activate_object(s1.clone()), Err(PoaError::ServantAlreadyActive));
    assert_eq!(root.resolve_servant(&x).unwrap(), s1);

    root.deactivate_object(&x).unwrap();
    assert_eq!(root.resolve_servant(&x), Err(PoaError::ObjectNotActive(x.clone())));

    let y = root.activate_object(s1.clone()).unwrap();
    assert_ne!(x, y);
    assert_eq!(root.resolve_servant(&y).unwrap(), s1);
    assert!(root.is_consistent());
}

/// Test: both directions of the directory stay in step under MultipleId
#[test]
fn test_directory_symmetry_multiple_ids() {
    init_logging();

    let orb = active_orb();
    let multi = orb
        .root_adapter()
        .create_child("multi", None, &multiple_id_policies())
        .unwrap();

    let shared = ServantHandle::new(EchoServant::new());
    let ids: Vec<ObjectId> = (0..5)
        .map(|_| multi.activate_object(shared.clone()).unwrap())
        .collect();
    assert_eq!(multi.active_object_count(), 5);
    assert_eq!(multi.servant_to_id(&shared).unwrap(), ids[0]);

    for id in &ids[..4] {
        multi.deactivate_object(id).unwrap();
        assert!(multi.is_consistent());
    }
    assert_eq!(multi.servant_to_id(&shared).unwrap(), ids[4]);

    multi.deactivate_object(&ids[4]).unwrap();
    assert_eq!(multi.servant_to_id(&shared), Err(PoaError::NoServant));
}

/// Test: the activator is consulted once per id and released on deactivate
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_activator_behind_dispatcher() {
    init_logging();

    let orb = active_orb();
    let lazy = orb
        .root_adapter()
        .create_child("lazy", None, &activator_policies())
        .unwrap();
    let log = event_log();
    let activator = Arc::new(RecordingActivator::new(log.clone()));
    lazy.set_servant_manager(ServantManager::Activator(activator.clone()))
        .unwrap();

    let dispatcher = orb.dispatcher();
    let key = lazy.object_key(ObjectId::from("account-42"));
    for i in 0..10 {
        let payload = Bytes::from(format!("call-{}", i));
        let reply = dispatcher.invoke(&key, "echo", payload.clone()).await.unwrap();
        assert_eq!(reply, payload);
    }
    assert_eq!(activator.incarnations.load(Ordering::SeqCst), 1);

    let missing = lazy.object_key(ObjectId::from("missing-1"));
    assert_eq!(
        dispatcher.invoke(&missing, "echo", Bytes::new()).await,
        Err(PoaError::ObjectNotActive(ObjectId::from("missing-1")))
    );

    lazy.deactivate_object(&ObjectId::from("account-42")).unwrap();
    assert_eq!(
        log.lock().clone(),
        vec![
            Event::Incarnate {
                adapter: "/lazy".to_string(),
                id: ObjectId::from("account-42"),
            },
            Event::Etherealize {
                adapter: "/lazy".to_string(),
                id: ObjectId::from("account-42"),
                cleanup: true,
                remaining: false,
            },
        ]
    );
}

/// Test: every preinvoke is paired with exactly one postinvoke
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_locator_pairs_every_call() {
    init_logging();

    let orb = active_orb();
    let located = orb
        .root_adapter()
        .create_child("located", None, &locator_policies())
        .unwrap();
    let log = event_log();
    let locator = Arc::new(RecordingLocator::new(log.clone()));
    located
        .set_servant_manager(ServantManager::Locator(locator.clone()))
        .unwrap();

    let dispatcher = orb.dispatcher();
    let key = located.object_key(ObjectId::from("row"));
    assert!(dispatcher.invoke(&key, "echo", Bytes::new()).await.is_ok());
    assert!(dispatcher.invoke(&key, "fail", Bytes::new()).await.is_err());
    assert!(dispatcher.invoke(&key, "slow", Bytes::new()).await.is_ok());

    let missing = located.object_key(ObjectId::from("missing-row"));
    assert!(dispatcher.invoke(&missing, "echo", Bytes::new()).await.is_err());

    let pre = locator.count(|e| matches!(e, Event::Preinvoke { .. }));
    let post = locator.count(|e| matches!(e, Event::Postinvoke { .. }));
    assert_eq!(pre, 3);
    assert_eq!(post, 3);
    assert_eq!(locator.cookie_mismatches.load(Ordering::SeqCst), 0);
    assert_eq!(located.active_object_count(), 0);

    let events = log.lock().clone();
    assert_eq!(
        events[0],
        Event::Preinvoke { id: ObjectId::from("row"), operation: "echo".to_string() }
    );
    assert_eq!(
        events[1],
        Event::Postinvoke { id: ObjectId::from("row"), operation: "echo".to_string() }
    );
}

/// Test: destruction etherealizes children before their parent
#[test]
fn test_recursive_destroy_order() {
    init_logging();

    let orb = active_orb();
    let log = event_log();
    let parent = orb
        .root_adapter()
        .create_child("parent", None, &activator_policies())
        .unwrap();
    parent
        .set_servant_manager(ServantManager::activator(RecordingActivator::new(log.clone())))
        .unwrap();

    let c1 = parent.create_child("c1", None, &[]).unwrap();
    let c2 = parent.create_child("c2", None, &[]).unwrap();
    let grandchild = c1.create_child("g", None, &[]).unwrap();
    for adapter in [&parent, &c1, &c2, &grandchild] {
        adapter
            .set_servant_manager(ServantManager::activator(RecordingActivator::new(log.clone())))
            .ok();
        adapter.resolve_servant(&ObjectId::from("obj")).unwrap();
    }
    log.lock().clear();

    let report = parent.destroy(true, true).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.adapters_destroyed, 4);
    assert_eq!(report.etherealized, 4);

    let order: Vec<String> = log
        .lock()
        .iter()
        .filter_map(|e| match e {
            Event::Etherealize { adapter, .. } => Some(adapter.clone()),
            _ => None,
        })
        .collect();
    let position = |path: &str| order.iter().position(|p| p == path).unwrap();
    assert!(position("/parent/c1/g") < position("/parent/c1"));
    assert!(position("/parent/c1") < position("/parent"));
    assert!(position("/parent/c2") < position("/parent"));

    assert!(orb.root_adapter().children().is_empty());
    assert!(orb.find_adapter_by_path(&["parent".to_string()], false).is_err());
    for adapter in [&parent, &c1, &c2, &grandchild] {
        assert!(adapter.is_destroyed());
    }
    assert_eq!(orb.root_manager().member_count(), 1);
}

/// Test: etherealize failures are reported without stopping the cascade
#[test]
fn test_destroy_collects_etherealize_failures() {
    init_logging();

    let orb = active_orb();
    let log = event_log();
    let broken = orb
        .root_adapter()
        .create_child("broken", None, &activator_policies())
        .unwrap();
    broken
        .set_servant_manager(ServantManager::activator(
            RecordingActivator::new(log.clone()).failing_etherealize(),
        ))
        .unwrap();
    let healthy = broken.create_child("healthy", None, &[]).unwrap();
    healthy
        .set_servant_manager(ServantManager::activator(RecordingActivator::new(log.clone())))
        .unwrap();

    for id in ["a", "b", "c"] {
        broken.resolve_servant(&ObjectId::from(id)).unwrap();
        healthy.resolve_servant(&ObjectId::from(id)).unwrap();
    }

    let report = orb.shutdown(true, true).unwrap();
    assert_eq!(report.etherealized, 6);
    assert_eq!(report.failures.len(), 3);
    assert!(report.failures.iter().all(|f| f.adapter == "/broken"));
    assert!(report.failures.iter().all(|f| matches!(f.error, PoaError::ServantManager(_))));
    assert!(healthy.is_destroyed());
}

/// Test: adapters created on demand by an adapter activator
#[test]
fn test_adapter_activator_builds_path() {
    struct Builder;

    impl AdapterActivator for Builder {
        fn unknown_adapter(&self, parent: &Arc<ObjectAdapter>, name: &str) -> bool {
            match parent.create_child(name, None, &[]) {
                Ok(child) => child.set_adapter_activator(Arc::new(Builder)).is_ok(),
                Err(_) => false,
            }
        }
    }

    init_logging();

    let orb = active_orb();
    orb.root_adapter().set_adapter_activator(Arc::new(Builder)).unwrap();

    let path: Vec<String> = ["tenants", "acme", "orders"].iter().map(|s| s.to_string()).collect();
    assert!(orb.find_adapter_by_path(&path, false).is_err());

    let orders = orb.find_adapter_by_path(&path, true).unwrap();
    assert_eq!(orders.path(), path.as_slice());
    assert_eq!(orders.display_path(), "/tenants/acme/orders");
    assert!(Arc::ptr_eq(&orb.find_adapter_by_path(&path, false).unwrap(), &orders));
}

/// Test: references across incarnations of transient and persistent adapters
#[tokio::test]
async fn test_reference_lifespans() {
    init_logging();

    let orb = active_orb();
    let root = orb.root_adapter();
    let dispatcher = orb.dispatcher();
    let servant = ServantHandle::new(EchoServant::new());

    let transient = root.create_child("transient", None, &[]).unwrap();
    let stale = transient.servant_to_reference(&servant).unwrap();
    transient.destroy(false, false).unwrap();
    let transient = root.create_child("transient", None, &[]).unwrap();
    transient
        .activate_object_with_id(stale.object_id().clone(), servant.clone())
        .unwrap();
    assert!(matches!(
        dispatcher.invoke(stale.key(), "echo", Bytes::new()).await,
        Err(PoaError::ObjectNotExist(_))
    ));
    assert!(matches!(
        transient.reference_to_id(&stale),
        Err(PoaError::WrongAdapter(_))
    ));

    let durable_policies = [Policy::Lifespan(LifespanPolicy::Persistent)];
    let durable = root.create_child("durable", None, &durable_policies).unwrap();
    let kept = durable.servant_to_reference(&servant).unwrap();
    durable.destroy(false, false).unwrap();
    let durable = root.create_child("durable", None, &durable_policies).unwrap();
    durable
        .activate_object_with_id(kept.object_id().clone(), servant.clone())
        .unwrap();
    let reply = dispatcher
        .invoke(kept.key(), "echo", Bytes::from("still here"))
        .await
        .unwrap();
    assert_eq!(reply, Bytes::from("still here"));
    assert_eq!(durable.reference_to_servant(&kept).unwrap(), servant);
}

/// Test: invalid policy combinations and policy-gated operations
#[test]
fn test_policy_errors() {
    init_logging();

    let orb = active_orb();
    let root = orb.root_adapter();

    assert!(matches!(
        root.create_child(
            "bad",
            None,
            &[Policy::ServantRetention(poa::types::ServantRetentionPolicy::NonRetain)],
        ),
        Err(PoaError::InvalidPolicy { .. })
    ));
    assert!(matches!(
        root.create_child(
            "twice",
            None,
            &[
                Policy::Thread(ThreadPolicy::SingleThread),
                Policy::Thread(ThreadPolicy::MainThread),
            ],
        ),
        Err(PoaError::InvalidPolicy { index: 1, .. })
    ));
    assert!(root.children().is_empty());

    let located = root.create_child("located", None, &locator_policies()).unwrap();
    let servant = ServantHandle::new(EchoServant::new());
    assert!(matches!(
        located.activate_object_with_id(ObjectId::from("x"), servant.clone()),
        Err(PoaError::WrongPolicy(_))
    ));
    assert!(matches!(located.servant_to_id(&servant), Err(PoaError::WrongPolicy(_))));
    assert!(matches!(located.get_servant(), Err(PoaError::WrongPolicy(_))));
}
