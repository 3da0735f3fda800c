use brewbus_core::{
    BusError, DispatchError, DispatchOptions, Event, EventBus, EventBusConfig, EventType, RunState,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn bus(pool_size: usize, queue_capacity: usize) -> EventBus {
    EventBus::with_config(EventBusConfig {
        pool_size,
        queue_capacity,
        auto_start: true,
    })
    .expect("bus should start inside a runtime")
}

fn brew(coffee: &str) -> Event {
    Event::with_args("brew_coffee", vec![json!(coffee), json!("2.10")]).expect("valid event")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handler_outcome_reaches_caller() {
    let bus = bus(2, 8);
    bus.add_handler("brew_coffee", |args, resolver| {
        resolver.resolve(json!({ "coffee": args[0] }));
        Ok(())
    })
    .expect("valid registration");

    let deferred = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("bus running");

    let first = deferred.wait().await.ok();
    let second = deferred.clone().wait().await.ok();
    assert_eq!(first, Some(json!({ "coffee": "latte" })));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_enforced_dispatch_without_handler() {
    let bus = bus(1, 4);
    let deferred = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("dispatch does not check for handlers");

    match deferred.wait().await {
        Err(DispatchError::NoHandler { event_type }) => assert_eq!(event_type, "brew_coffee"),
        other => panic!("expected NoHandler, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_every_observer_sees_arguments_once() {
    let bus = bus(2, 8);
    let seen = Arc::new(Mutex::new(Vec::new()));

    for id in ["audit", "metrics", "stock"] {
        let seen = seen.clone();
        bus.add_observer("brew_coffee", id, move |args| {
            seen.lock().push((id.to_string(), args.to_vec()));
            Ok(())
        })
        .expect("valid registration");
    }

    // Re-registering an id replaces the observer instead of adding a fourth
    let replaced = seen.clone();
    bus.add_observer("brew_coffee", "stock", move |args| {
        replaced.lock().push(("stock-v2".to_string(), args.to_vec()));
        Ok(())
    })
    .expect("valid registration");

    // No handler registered: observers still run
    let deferred = bus
        .dispatch(brew("mocha"), DispatchOptions::default())
        .await
        .expect("bus running");
    assert_eq!(deferred.wait().await.ok(), Some(serde_json::Value::Null));

    let seen = seen.lock();
    let mut ids: Vec<&str> = seen.iter().map(|(id, _)| id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["audit", "metrics", "stock-v2"]);
    for (_, args) in seen.iter() {
        assert_eq!(args, &vec![json!("mocha"), json!("2.10")]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_faulting_observers_are_isolated() {
    let bus = bus(1, 4);
    let healthy = Arc::new(AtomicUsize::new(0));

    bus.add_observer("brew_coffee", "a_errors", |_| anyhow::bail!("ledger offline"))
        .expect("valid registration");
    bus.add_observer("brew_coffee", "b_panics", |_| panic!("observer exploded"))
        .expect("valid registration");
    let h = healthy.clone();
    bus.add_observer("brew_coffee", "c_healthy", move |_| {
        h.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .expect("valid registration");
    bus.add_handler("brew_coffee", |_, resolver| {
        resolver.resolve(json!("served"));
        Ok(())
    })
    .expect("valid registration");

    let deferred = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("bus running");

    assert_eq!(deferred.wait().await.ok(), Some(json!("served")));
    assert_eq!(healthy.load(Ordering::SeqCst), 1);
    assert_eq!(bus.stats().observer_faults, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_handler_rejects_with_fault() {
    let bus = bus(1, 4);
    bus.add_handler("brew_coffee", |_, _| panic!("boiler pressure"))
        .expect("valid registration");

    let deferred = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("bus running");

    match deferred.wait().await {
        Err(DispatchError::HandlerFault { reason, .. }) => {
            assert!(reason.contains("boiler pressure"))
        }
        other => panic!("expected HandlerFault, got {:?}", other),
    }

    // The worker survives the panic
    bus.add_handler("brew_coffee", |_, resolver| {
        resolver.resolve(json!("recovered"));
        Ok(())
    })
    .expect("valid registration");
    let deferred = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("bus running");
    assert_eq!(deferred.wait().await.ok(), Some(json!("recovered")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bounded_by_pool_size() {
    const POOL: usize = 3;
    const EVENTS: usize = 12;

    let bus = bus(POOL, EVENTS);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (r, p) = (running.clone(), peak.clone());
    bus.add_handler("brew_coffee", move |_, resolver| {
        let now = r.fetch_add(1, Ordering::SeqCst) + 1;
        p.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(25));
        r.fetch_sub(1, Ordering::SeqCst);
        resolver.resolve(json!(now));
        Ok(())
    })
    .expect("valid registration");

    let mut deferreds = Vec::new();
    for _ in 0..EVENTS {
        deferreds.push(
            bus.dispatch(brew("espresso"), DispatchOptions::enforced())
                .await
                .expect("bus running"),
        );
    }

    for deferred in deferreds {
        let outcome = deferred.wait_timeout(Duration::from_secs(10)).await;
        assert!(outcome.is_ok());
    }
    assert!(peak.load(Ordering::SeqCst) <= POOL);
    assert_eq!(bus.stats().completed as usize, EVENTS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_queue_applies_backpressure() {
    let bus = bus(1, 1);
    let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
    let gate = Arc::new(Mutex::new(gate_rx));

    bus.add_handler("brew_coffee", move |_, resolver| {
        let _ = gate.lock().recv();
        resolver.resolve(json!("done"));
        Ok(())
    })
    .expect("valid registration");

    // One event occupies the worker, one fills the queue.
    let first = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("bus running");
    let second = tokio::time::timeout(
        Duration::from_secs(1),
        bus.dispatch(brew("latte"), DispatchOptions::enforced()),
    )
    .await
    .expect("queue has space once the worker takes the first event")
    .expect("bus running");

    let third = tokio::time::timeout(
        Duration::from_millis(50),
        bus.dispatch(brew("latte"), DispatchOptions::enforced()),
    )
    .await;
    assert!(third.is_err(), "dispatch should wait while the queue is full");

    gate_tx.send(()).expect("handler waiting");
    gate_tx.send(()).expect("handler waiting");
    assert!(first.wait().await.is_ok());
    assert!(second.wait().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_drains_queue_then_refuses() {
    let bus = bus(1, 8);
    bus.add_handler("brew_coffee", |_, resolver| {
        std::thread::sleep(Duration::from_millis(10));
        resolver.resolve(json!("brewed"));
        Ok(())
    })
    .expect("valid registration");

    let mut deferreds = Vec::new();
    for _ in 0..5 {
        deferreds.push(
            bus.dispatch(brew("americano"), DispatchOptions::enforced())
                .await
                .expect("bus running"),
        );
    }

    bus.stop().await;
    assert_eq!(bus.state(), RunState::Stopped);
    for deferred in &deferreds {
        assert_eq!(
            deferred.try_outcome().and_then(Result::ok),
            Some(json!("brewed"))
        );
    }

    let refused = bus
        .dispatch(brew("americano"), DispatchOptions::enforced())
        .await;
    assert_eq!(refused.err(), Some(BusError::EmitterStopped));

    // Stopped is terminal
    bus.start().expect("start on a stopped bus is a no-op");
    assert_eq!(bus.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_dispatch_before_start_runs_after_start() {
    let bus = EventBus::with_config(EventBusConfig {
        pool_size: 1,
        queue_capacity: 4,
        auto_start: false,
    })
    .expect("valid config");
    bus.add_handler("brew_coffee", |_, resolver| {
        resolver.resolve(json!("late start"));
        Ok(())
    })
    .expect("valid registration");

    let deferred = bus
        .dispatch(brew("latte"), DispatchOptions::enforced())
        .await
        .expect("queue accepts events before start");
    assert!(!deferred.is_settled());

    bus.start().expect("runtime available");
    assert_eq!(deferred.wait().await.ok(), Some(json!("late start")));
}

#[test]
fn test_blocking_dispatch_from_sync_code() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime");

    let bus = {
        let _guard = runtime.enter();
        bus(2, 4)
    };
    bus.add_handler("brew_coffee", |args, resolver| {
        resolver.resolve(args[0].clone());
        Ok(())
    })
    .expect("valid registration");

    let deferred = bus
        .blocking_dispatch(brew("flat white"), DispatchOptions::enforced())
        .expect("bus running");
    let outcome = runtime.block_on(deferred.wait());
    assert_eq!(outcome.ok(), Some(json!("flat white")));

    runtime.block_on(bus.stop());
}

#[tokio::test]
async fn test_registration_during_operation() {
    let bus = Arc::new(bus(2, 16));
    let brew_type = EventType::new("brew_coffee").expect("valid");

    let registrar = {
        let bus = bus.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                bus.add_observer("brew_coffee", format!("observer-{}", i), |_| Ok(()))
                    .expect("valid registration");
                tokio::task::yield_now().await;
            }
        })
    };

    let mut deferreds = Vec::new();
    for _ in 0..20 {
        deferreds.push(
            bus.dispatch(brew("latte"), DispatchOptions::default())
                .await
                .expect("bus running"),
        );
    }
    registrar.await.expect("registrar finished");

    for deferred in deferreds {
        assert!(deferred.wait().await.is_ok());
    }
    assert_eq!(bus.observer_count(&brew_type), 50);
}
