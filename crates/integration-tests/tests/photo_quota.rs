//! The photo submission wizard and its rolling 24-hour quota.

use chrono::Duration;
use domains::{PhotoStatus, QuotaCounter, RecordStore, SessionStore, View};
use integration_tests::{cb, img, text, World};

async fn submit_photo(world: &World, user: i64, topic: &str, media_ref: &str) {
    world.send(user, cb("menu:new_photo")).await;
    world.send(user, cb(&format!("topic:{topic}"))).await;
    world.send(user, img(media_ref)).await;
    world.send(user, text("shot on a rainy day")).await;
    world.send(user, cb("confirm")).await;
}

#[tokio::test]
async fn wizard_runs_topic_photo_description_confirm() {
    let world = World::new();
    let member = world.register_member(3, "abcd_1").await;
    let topic = world.seed_topic("landscapes").await;

    world.send(3, cb("menu:new_photo")).await;
    assert!(matches!(
        world.gateway.take_views().as_slice(),
        [View::TopicList { .. }]
    ));

    world.send(3, cb(&format!("topic:{}", topic.id))).await;
    assert_eq!(world.gateway.take_views(), vec![View::AskPhoto]);

    world.send(3, img("file_photo")).await;
    assert_eq!(world.gateway.take_views(), vec![View::AskDescription]);

    world.send(3, text("shot on a rainy day")).await;
    assert_eq!(
        world.gateway.take_views(),
        vec![View::ConfirmPhoto {
            topic_name: "landscapes".to_string(),
            description: "shot on a rainy day".to_string(),
        }]
    );

    world.send(3, cb("confirm")).await;
    let views = world.gateway.take_views();
    assert_eq!(views[0], View::PhotoQueued);

    let photos = world.records.get_photos_for_user(member.id).await.unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].status, PhotoStatus::Pending);
    assert_eq!(photos[0].media_ref, "file_photo");
}

#[tokio::test]
async fn fourth_submission_in_a_day_is_blocked_at_the_door() {
    let world = World::new();
    let member = world.register_member(4, "abcd_1").await;
    let topic = world.seed_topic("landscapes").await;
    let topic_key = topic.id.to_string();

    for n in 0..3 {
        submit_photo(&world, 4, &topic_key, &format!("file_{n}")).await;
    }
    assert_eq!(
        world.records.get_photos_for_user(member.id).await.unwrap().len(),
        3
    );
    world.gateway.take_views();

    // Fourth attempt: rejected at scene entry, the topic list never shows.
    world.send(4, cb("menu:new_photo")).await;
    let views = world.gateway.take_views();
    assert!(matches!(views.first(), Some(View::QuotaExceeded { reset_ms }) if *reset_ms > 0));
    assert!(!views
        .iter()
        .any(|view| matches!(view, View::TopicList { .. })));
    let session = world.sessions.load(4).await.unwrap().expect("session");
    assert_eq!(session.scene, None);

    // Once the window elapses the wizard opens again and the submission
    // commits.
    world.clock.advance(Duration::hours(24) + Duration::seconds(1));
    submit_photo(&world, 4, &topic_key, "file_after").await;
    assert!(world.gateway.views().contains(&View::PhotoQueued));
    assert_eq!(
        world.records.get_photos_for_user(member.id).await.unwrap().len(),
        4
    );
}

#[tokio::test]
async fn not_yet_active_user_cannot_open_the_wizard() {
    let world = World::new();
    world.seed_topic("landscapes").await;

    // First contact leaves the user in register status.
    world.send(8, text("hi")).await;
    world.gateway.take_views();

    world.send(8, cb("menu:new_photo")).await;
    let views = world.gateway.take_views();
    assert_eq!(views.first(), Some(&View::NotAllowed));
    assert!(!views
        .iter()
        .any(|view| matches!(view, View::TopicList { .. })));
}

#[tokio::test]
async fn cancel_discards_the_draft_without_consuming_quota() {
    let world = World::new();
    let member = world.register_member(6, "abcd_1").await;
    let topic = world.seed_topic("landscapes").await;

    world.send(6, cb("menu:new_photo")).await;
    world.send(6, cb(&format!("topic:{}", topic.id))).await;
    world.send(6, img("file_draft")).await;
    world.send(6, text("nearly there")).await;
    world.send(6, cb("cancel")).await;

    assert!(world
        .records
        .get_photos_for_user(member.id)
        .await
        .unwrap()
        .is_empty());

    // All three slots are still free.
    assert_eq!(world.quota.check(member.id).await.unwrap(), 0);
    let session = world.sessions.load(6).await.unwrap().expect("session");
    assert_eq!(session.scene, None);
}
