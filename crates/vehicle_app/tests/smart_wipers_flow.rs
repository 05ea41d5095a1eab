use std::{sync::Arc, time::Duration};

use databroker::{DataBroker, LocalDataBroker, Vehicle};
use plugins::{PhoneNotification, PhoneNotifierPlugin, PluginRegistry, SMART_WIPERS_PLUGIN};
use shared::{
    domain::{DataValue, FrontWipingMode, HoodIsOpen, Signal, WiperMode},
    error::BrokerError,
};
use tokio::sync::{broadcast, oneshot};
use vehicle_app::{SmartWipersApp, HOOD_OPENED_MESSAGE};

struct Harness {
    broker: Arc<LocalDataBroker>,
    vehicle: Vehicle,
    app: Arc<SmartWipersApp>,
    notifications: broadcast::Receiver<PhoneNotification>,
}

fn harness() -> Harness {
    let broker = LocalDataBroker::with_standard_signals();
    let vehicle = Vehicle::new(broker.clone());
    let phone = PhoneNotifierPlugin::new(SMART_WIPERS_PLUGIN);
    let notifications = phone.subscribe_notifications();
    let mut registry = PluginRegistry::new();
    registry.register(phone);
    let app = SmartWipersApp::new(vehicle.clone(), registry);
    Harness {
        broker,
        vehicle,
        app,
        notifications,
    }
}

async fn next_message(notifications: &mut broadcast::Receiver<PhoneNotification>) -> String {
    tokio::time::timeout(Duration::from_secs(30), notifications.recv())
        .await
        .expect("notification in time")
        .expect("notification")
        .message
}

#[tokio::test(start_paused = true)]
async fn opening_the_hood_at_the_end_of_startup_turns_wipers_back_off() {
    let mut h = harness();

    h.app.on_start().await.expect("startup");

    assert_eq!(next_message(&mut h.notifications).await, "");
    assert_eq!(next_message(&mut h.notifications).await, HOOD_OPENED_MESSAGE);
    assert_eq!(h.vehicle.body.hood.is_open.get().await, Ok(Some(true)));
    assert_eq!(
        h.vehicle.body.windshield.front.wiping.mode.get().await,
        Ok(Some(WiperMode::Off))
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_external_hood_open_still_ends_with_wipers_off() {
    let mut h = harness();
    let broker = h.broker.clone();
    let external = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(9)).await;
        broker
            .set(HoodIsOpen::PATH, DataValue::Bool(true))
            .await
            .expect("external hood open");
    });

    h.app.on_start().await.expect("startup");
    external.await.expect("external writer");

    assert_eq!(next_message(&mut h.notifications).await, "");
    assert_eq!(next_message(&mut h.notifications).await, HOOD_OPENED_MESSAGE);
    assert_eq!(
        h.vehicle.body.windshield.front.wiping.mode.get().await,
        Ok(Some(WiperMode::Off))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_wiper_command_leaves_listener_serving_later_changes() {
    let mut h = harness();
    h.broker
        .fail_next_set(
            FrontWipingMode::PATH,
            BrokerError::Transport("wiper ECU unreachable".into()),
        )
        .await;

    let err = h.app.on_start().await.expect_err("startup fails");
    assert!(format!("{err:#}").contains("wiper ECU unreachable"));
    assert_eq!(h.vehicle.body.hood.is_open.get().await, Ok(Some(false)));
    assert_eq!(h.vehicle.body.windshield.front.wiping.mode.get().await, Ok(None));

    h.vehicle.body.hood.is_open.set(true).await.expect("open hood");

    assert_eq!(next_message(&mut h.notifications).await, "");
    assert_eq!(next_message(&mut h.notifications).await, HOOD_OPENED_MESSAGE);
    assert_eq!(
        h.vehicle.body.windshield.front.wiping.mode.get().await,
        Ok(Some(WiperMode::Off))
    );
}

#[tokio::test(start_paused = true)]
async fn run_until_shutdown_releases_the_hood_subscription() {
    let mut h = harness();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(Arc::clone(&h.app).run(async move {
        let _ = shutdown_rx.await;
    }));

    assert_eq!(next_message(&mut h.notifications).await, "");
    assert_eq!(next_message(&mut h.notifications).await, HOOD_OPENED_MESSAGE);
    assert_eq!(h.broker.subscriber_count().await, 1);

    shutdown_tx.send(()).expect("shutdown");
    running.await.expect("join").expect("run");

    assert_eq!(h.broker.subscriber_count().await, 0);
    assert!(!h.app.is_listening().await);

    // Closing and reopening the hood no longer reaches the application.
    h.vehicle.body.hood.is_open.set(false).await.expect("close");
    h.vehicle
        .body
        .windshield
        .front
        .wiping
        .mode
        .set(WiperMode::Fast)
        .await
        .expect("wipers fast");
    h.vehicle.body.hood.is_open.set(true).await.expect("reopen");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        h.vehicle.body.windshield.front.wiping.mode.get().await,
        Ok(Some(WiperMode::Fast))
    );
    assert!(h.notifications.try_recv().is_err());
}
