//! Adapter Tree Demo
//!
//! Builds a small adapter tree under a broker, serves calls through it and
//! tears it down again, printing what happens at each step.
//!
//! USAGE:
//!   adapter-tree [OPTIONS]
//!
//! EXAMPLES:
//!   adapter-tree                          # 3 children, 5 objects each
//!   adapter-tree --children 10            # Wider tree
//!   adapter-tree --objects 100 --calls 4  # More traffic
//!   adapter-tree --no-etherealize         # Skip servant release on teardown

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use clap::Parser;
use futures::future::join_all;
use poa::types::{IdAssignmentPolicy, ImplicitActivationPolicy, RequestProcessingPolicy};
use poa::{
    CallFuture, ManagerState, ObjectAdapter, ObjectId, Orb, OrbConfig, PoaError, Policy,
    Result, Servant, ServantActivator, ServantHandle, ServantManager,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "adapter-tree")]
#[command(version)]
#[command(about = "Object adapter demo - builds an adapter tree and dispatches calls through it")]
struct Args {
    /// Number of child adapters under the root
    #[arg(long, default_value_t = 3)]
    children: usize,

    /// Objects activated on each child
    #[arg(long, default_value_t = 5)]
    objects: usize,

    /// Calls dispatched to each object
    #[arg(long, default_value_t = 2)]
    calls: usize,

    /// Requests each manager may hold while Holding
    #[arg(long, default_value_t = poa::DEFAULT_HOLD_CAPACITY)]
    hold_capacity: usize,

    /// Do not etherealize servants when tearing the tree down
    #[arg(long)]
    no_etherealize: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Counter servant: "increment" bumps and returns the count
struct Counter {
    count: AtomicUsize,
}

impl Servant for Counter {
    fn interface_id(&self) -> &str {
        "IDL:demo/Counter:1.0"
    }

    fn invoke(&self, operation: &str, _args: Bytes) -> CallFuture {
        match operation {
            "increment" => {
                let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
                Box::pin(async move { Ok(Bytes::from(n.to_string())) })
            }
            other => {
                let error = PoaError::Servant(format!("unknown operation {}", other));
                Box::pin(async move { Err(error) })
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Activator that creates counters on first use
struct CounterFactory {
    created: AtomicUsize,
    released: AtomicUsize,
}

impl ServantActivator for CounterFactory {
    fn incarnate(&self, id: &ObjectId, adapter: &ObjectAdapter) -> Result<ServantHandle> {
        self.created.fetch_add(1, Ordering::SeqCst);
        info!("Incarnating {} in {}", id, adapter.display_path());
        Ok(ServantHandle::new(Counter {
            count: AtomicUsize::new(0),
        }))
    }

    fn etherealize(
        &self,
        id: &ObjectId,
        adapter: &ObjectAdapter,
        _servant: ServantHandle,
        _cleanup_in_progress: bool,
        _remaining_activations: bool,
    ) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        info!("Etherealizing {} in {}", id, adapter.display_path());
        Ok(())
    }
}

fn print_tree(adapter: &Arc<ObjectAdapter>, depth: usize) {
    println!(
        "  {}{} [{} objects, {}]",
        "  ".repeat(depth),
        adapter.name(),
        adapter.active_object_count(),
        adapter.policies()
    );
    for child in adapter.children() {
        print_tree(&child, depth + 1);
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let orb = Orb::new(OrbConfig::default().with_hold_capacity(args.hold_capacity))?;
    let root = orb.root_adapter().clone();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Object Adapter Demo                       ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Root adapter: {:45} ║", root.name());
    println!("║  Children:     {:45} ║", args.children);
    println!("║  Objects:      {:45} ║", args.objects);
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // One child uses an activator; the rest activate servants up front
    let factory = Arc::new(CounterFactory {
        created: AtomicUsize::new(0),
        released: AtomicUsize::new(0),
    });
    let mut keys = Vec::new();
    for i in 0..args.children {
        let name = format!("service-{}", i);
        if i == 0 {
            let lazy = root.create_child(
                &name,
                None,
                &[
                    Policy::ImplicitActivation(ImplicitActivationPolicy::NoImplicitActivation),
                    Policy::IdAssignment(IdAssignmentPolicy::UserId),
                    Policy::RequestProcessing(RequestProcessingPolicy::UseServantManager),
                ],
            )?;
            lazy.set_servant_manager(ServantManager::Activator(factory.clone()))?;
            for n in 0..args.objects {
                keys.push(lazy.object_key(ObjectId::from(format!("counter-{}", n))));
            }
        } else {
            let eager = root.create_child(&name, None, &[])?;
            for _ in 0..args.objects {
                let servant = ServantHandle::new(Counter {
                    count: AtomicUsize::new(0),
                });
                keys.push(eager.servant_to_reference(&servant)?.key().clone());
            }
        }
    }

    // The root manager starts out Holding: calls queue until it is activated
    let dispatcher = orb.dispatcher();
    let calls: Vec<_> = keys
        .iter()
        .flat_map(|key| std::iter::repeat(key.clone()).take(args.calls))
        .map(|key| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.invoke(&key, "increment", Bytes::new()).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "Manager {} holding {} calls",
        orb.root_manager().state(),
        orb.root_manager().held_requests()
    );
    orb.root_manager().activate();

    let results = join_all(calls).await;
    let succeeded = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    println!(
        "Dispatched {} calls: {} succeeded, {} counters incarnated",
        results.len(),
        succeeded,
        factory.created.load(Ordering::SeqCst)
    );
    println!();
    println!("Adapter tree:");
    print_tree(&root, 0);
    println!();

    orb.root_manager().discard();
    if let Some(key) = keys.first() {
        match dispatcher.invoke(key, "increment", Bytes::new()).await {
            Err(e) => println!("While {}: {}", ManagerState::Discarding, e),
            Ok(_) => println!("While {}: call unexpectedly admitted", ManagerState::Discarding),
        }
    }

    let report = orb.shutdown(!args.no_etherealize, true)?;
    println!();
    println!("Teardown report:");
    println!("  Adapters destroyed: {}", report.adapters_destroyed);
    println!("  Servants etherealized: {}", report.etherealized);
    println!("  Failures: {}", report.failures.len());
    for failure in &report.failures {
        println!("    {} {}: {}", failure.adapter, failure.object_id, failure.error);
    }

    Ok(())
}
