//! Profile viewing, the single-step edit scenes, and own-photo deletion.

use domains::{
    PhotoStatus, PostSurface, PostedMessage, RecordStore, SessionStore, UserStatus, View,
};
use integration_tests::{cb, img, text, World};

#[tokio::test]
async fn profile_shows_the_member_and_their_photo_count() {
    let world = World::new();
    let member = world.register_member(1, "abcd_1").await;
    let topic = world.seed_topic("landscapes").await;
    world
        .records
        .create_photo(member.id, topic.id, "file_a", "one")
        .await
        .unwrap();

    world.send(1, cb("menu:profile")).await;
    match world.gateway.take_views().as_slice() {
        [View::Profile { user, photo_count }] => {
            assert_eq!(user.nick.as_deref(), Some("abcd_1"));
            assert_eq!(*photo_count, 1);
        }
        other => panic!("expected profile view, got {other:?}"),
    }
}

#[tokio::test]
async fn avatar_and_about_edits_commit_and_return_to_menu() {
    let world = World::new();
    world.register_member(1, "abcd_1").await;
    world.send(1, cb("menu:profile")).await;
    world.gateway.take_views();

    world.send(1, cb("profile:avatar")).await;
    assert_eq!(world.gateway.take_views(), vec![View::AskAvatar]);
    world.send(1, img("file_new_av")).await;
    let views = world.gateway.take_views();
    assert_eq!(views[0], View::AvatarUpdated);

    world.send(1, cb("menu:profile")).await;
    world.gateway.take_views();
    world.send(1, cb("profile:about")).await;
    assert_eq!(world.gateway.take_views(), vec![View::AskAbout]);
    world.send(1, text("a better bio")).await;
    assert_eq!(world.gateway.take_views()[0], View::AboutUpdated);

    let user = world
        .records
        .get_user_by_external(1)
        .await
        .unwrap()
        .expect("member");
    assert_eq!(user.avatar_ref.as_deref(), Some("file_new_av"));
    assert_eq!(user.about.as_deref(), Some("a better bio"));
}

#[tokio::test]
async fn delete_confirms_then_soft_removes_and_cleans_posted_copies() {
    let world = World::new();
    let member = world.register_member(1, "abcd_1").await;
    let topic = world.seed_topic("landscapes").await;
    let photo = world
        .records
        .create_photo(member.id, topic.id, "file_a", "one")
        .await
        .unwrap();
    world
        .records
        .set_photo_posted(
            photo.id,
            PostSurface::Moderation,
            PostedMessage {
                chat_ref: -50,
                message_ref: 777,
            },
        )
        .await
        .unwrap();

    world.send(1, cb("menu:my_photos")).await;
    assert!(matches!(
        world.gateway.take_views().as_slice(),
        [View::MyPhotos {
            page: 1,
            total_pages: 1,
            ..
        }]
    ));

    world.send(1, cb(&format!("delete:{}", photo.id))).await;
    assert_eq!(
        world.gateway.take_views(),
        vec![View::ConfirmDelete { photo_id: photo.id }]
    );

    world.send(1, cb("confirm")).await;
    let views = world.gateway.take_views();
    assert_eq!(views[0], View::PhotoDeleted);

    // Soft removal: gone from the listing, not from the table.
    assert!(world
        .records
        .get_photos_for_user(member.id)
        .await
        .unwrap()
        .is_empty());

    // The externally posted copy was removed best-effort.
    assert_eq!(world.gateway.removed(), vec![(-50, 777)]);
}

#[tokio::test]
async fn cancelling_the_delete_keeps_the_photo() {
    let world = World::new();
    let member = world.register_member(1, "abcd_1").await;
    let topic = world.seed_topic("landscapes").await;
    let photo = world
        .records
        .create_photo(member.id, topic.id, "file_a", "one")
        .await
        .unwrap();

    world.send(1, cb("menu:my_photos")).await;
    world.send(1, cb(&format!("delete:{}", photo.id))).await;
    world.gateway.take_views();

    world.send(1, cb("cancel")).await;
    assert!(matches!(
        world.gateway.take_views().as_slice(),
        [View::MyPhotos { .. }]
    ));

    let photos = world.records.get_photos_for_user(member.id).await.unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].status, PhotoStatus::Pending);
}

#[tokio::test]
async fn banned_member_sees_only_the_banned_notice() {
    let world = World::new();
    let member = world.register_member(1, "abcd_1").await;

    // Moderation bans out of band; the store is the source of truth.
    let mut banned = member.clone();
    banned.status = UserStatus::Banned;
    world.records.seed_user(banned).await;

    world.send(1, cb("menu:profile")).await;
    assert_eq!(world.gateway.take_views(), vec![View::Banned]);

    let session = world.sessions.load(1).await.unwrap().expect("session");
    assert_eq!(session.scene, None);
}
