//! Gallery browsing: paging through approved photos, rating once,
//! commenting.

use chrono::Duration;
use domains::{RateValue, RecordStore, SessionStore, View};
use integration_tests::{cb, text, World};

/// Three approved photos in one topic, oldest to newest, plus an active
/// viewer. Newest renders first.
async fn gallery_world() -> (World, Vec<uuid::Uuid>) {
    let world = World::new();
    let author = world.register_member(1, "author_1").await;
    let topic = world.seed_topic("landscapes").await;

    let mut photo_ids = Vec::new();
    for n in 0..3 {
        photo_ids.push(
            world
                .approved_photo(&author, topic.id, &format!("file_{n}"))
                .await,
        );
        // Distinct create times keep the newest-first order deterministic.
        world.clock.advance(Duration::seconds(1));
    }

    world.register_member(2, "viewer_1").await;
    world.send(2, cb("menu:gallery")).await;
    world.send(2, cb(&format!("topic:{}", topic.id))).await;
    world.gateway.take_views();
    (world, photo_ids)
}

#[tokio::test]
async fn browsing_pages_newest_first_and_respects_bounds() {
    let (world, photo_ids) = gallery_world().await;

    // Already on page 1 after topic pick; paging back does nothing.
    world.send(2, cb("page:prev")).await;
    assert!(world.gateway.take_views().is_empty());

    world.send(2, cb("page:next")).await;
    let views = world.gateway.take_views();
    match views.as_slice() {
        [View::GalleryPhoto {
            photo,
            page,
            total_pages,
            ..
        }] => {
            assert_eq!(*page, 2);
            assert_eq!(*total_pages, 3);
            // Newest first: page 2 is the middle submission.
            assert_eq!(photo.id, photo_ids[1]);
        }
        other => panic!("expected one gallery photo, got {other:?}"),
    }

    world.send(2, cb("page:next")).await;
    world.gateway.take_views();

    // Page 3 is the last one; the cursor stays put.
    world.send(2, cb("page:next")).await;
    assert!(world.gateway.take_views().is_empty());
}

#[tokio::test]
async fn paging_lands_on_last_page_when_photos_vanish_mid_browse() {
    let (world, photo_ids) = gallery_world().await;
    let author = world
        .records
        .get_user_by_external(1)
        .await
        .unwrap()
        .expect("author");

    // Walk to the last page, then the owner removes the two newest
    // photos behind the viewer's back.
    world.send(2, cb("page:next")).await;
    world.send(2, cb("page:next")).await;
    world.gateway.take_views();
    world.records.delete_photo(author.id, photo_ids[2]).await.unwrap();
    world.records.delete_photo(author.id, photo_ids[1]).await.unwrap();

    world.send(2, cb("page:prev")).await;
    let views = world.gateway.take_views();
    match views.as_slice() {
        [View::GalleryPhoto {
            photo,
            page,
            total_pages,
            ..
        }] => {
            assert_eq!(photo.id, photo_ids[0]);
            assert_eq!(*page, 1);
            assert_eq!(*total_pages, 1);
        }
        other => panic!("expected the surviving photo, got {other:?}"),
    }

    // The persisted cursor is back in bounds.
    let session = world.sessions.load(2).await.unwrap().expect("session");
    assert!(session.navigation.current_page <= session.navigation.total_pages);
    assert_eq!(session.navigation.current_page, 1);
}

#[tokio::test]
async fn a_photo_takes_each_members_rate_exactly_once() {
    let (world, _photo_ids) = gallery_world().await;

    world.send(2, cb("rate:5")).await;
    assert_eq!(
        world.gateway.take_views(),
        vec![View::RateSaved {
            value: RateValue::Five
        }]
    );

    // Second attempt on the same photo, even with a different value.
    world.send(2, cb("rate:3")).await;
    assert_eq!(world.gateway.take_views(), vec![View::AlreadyRated]);
}

#[tokio::test]
async fn rating_summary_reflects_saved_rates() {
    let (world, photo_ids) = gallery_world().await;
    // Page 1 shows the newest photo.
    let current = photo_ids[2];

    world.send(2, cb("rate:5")).await;
    world.register_member(3, "viewer_2").await;
    world.send(3, cb("menu:gallery")).await;
    let topic_id = world
        .records
        .get_topics()
        .await
        .unwrap()
        .first()
        .unwrap()
        .id;
    world.send(3, cb(&format!("topic:{topic_id}"))).await;
    world.send(3, cb("rate:2")).await;

    let (count, avg) = world.records.rating_summary(current).await.unwrap();
    assert_eq!(count, 2);
    assert!((avg - 3.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn commenting_asks_for_text_then_returns_to_browsing() {
    let (world, _photo_ids) = gallery_world().await;

    world.send(2, cb("comment")).await;
    assert_eq!(world.gateway.take_views(), vec![View::AskComment]);

    // A button press is not a comment; the prompt repeats.
    world.send(2, cb("rate:5")).await;
    assert_eq!(world.gateway.take_views(), vec![View::AskComment]);

    world.send(2, text("lovely light in this one")).await;
    assert_eq!(world.gateway.take_views(), vec![View::CommentSaved]);

    // Back in browse mode: paging works again.
    world.send(2, cb("page:next")).await;
    assert!(matches!(
        world.gateway.take_views().as_slice(),
        [View::GalleryPhoto { page: 2, .. }]
    ));
}
