//! The dispatcher under concurrent intake and graceful shutdown.

use std::time::Duration;

use domains::{RecordStore, View};
use integration_tests::{cmd, World};
use services::Dispatcher;

#[tokio::test]
async fn shutdown_drains_every_submitted_update() {
    let world = World::new();
    let records = world.records.clone();
    let gateway = world.gateway.clone();

    let dispatcher = Dispatcher::spawn(world.engine.clone(), 8);
    for n in 1..=20 {
        assert!(dispatcher.submit(world.event(n, cmd("/start"))).await);
    }
    dispatcher.shutdown().await;

    // Every update completed before shutdown returned: twenty fresh
    // register-status rows, each greeted with the nick prompt.
    for n in 1..=20 {
        assert!(
            records.get_user_by_external(n).await.unwrap().is_some(),
            "user {n} was not created"
        );
    }
    let prompts = gateway
        .views()
        .iter()
        .filter(|view| **view == View::AskNick)
        .count();
    assert_eq!(prompts, 20);
}

#[tokio::test]
async fn intake_refuses_events_after_shutdown_began() {
    let world = World::new();
    let dispatcher = Dispatcher::spawn(world.engine.clone(), 8);
    let intake = dispatcher.sender();

    // The transport-side handle is still alive here; shutdown must not
    // wait for it to drop.
    tokio::time::timeout(Duration::from_secs(5), dispatcher.shutdown())
        .await
        .expect("shutdown must complete while an intake handle is held");
    assert!(intake.send(world.event(1, cmd("/start"))).await.is_err());
}

#[tokio::test]
async fn shutdown_drains_queued_events_despite_live_handles() {
    let world = World::new();
    let records = world.records.clone();

    let dispatcher = Dispatcher::spawn(world.engine.clone(), 8);
    let intake = dispatcher.sender();
    for n in 1..=5 {
        intake.send(world.event(n, cmd("/start"))).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), dispatcher.shutdown())
        .await
        .expect("shutdown must complete while an intake handle is held");

    for n in 1..=5 {
        assert!(
            records.get_user_by_external(n).await.unwrap().is_some(),
            "queued update {n} was dropped instead of drained"
        );
    }
}
