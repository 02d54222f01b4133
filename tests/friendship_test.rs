//! Friendship state machine tests

mod common;

use assert_matches::assert_matches;
use chatway::conversation;
use chatway::friendship;
use chatway::model::ConversationStatus;
use chatway::GatewayError;

#[tokio::test]
async fn test_send_creates_both_projections() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;

    friendship::send(&pool, alice, bob).await.unwrap();

    let bob_view = friendship::pending_requests(&pool, bob).await.unwrap();
    assert_eq!(bob_view.received.len(), 1);
    assert_eq!(bob_view.received[0].from_user, alice);
    assert!(bob_view.sent.is_empty());

    let alice_view = friendship::pending_requests(&pool, alice).await.unwrap();
    assert_eq!(alice_view.sent.len(), 1);
    assert_eq!(alice_view.sent[0].to_user, bob);
    assert!(alice_view.received.is_empty());
}

#[tokio::test]
async fn test_self_request_is_rejected() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;

    let err = friendship::send(&pool, alice, alice).await.unwrap_err();
    assert_eq!(err.code(), "SELF_REQUEST");
}

#[tokio::test]
async fn test_request_to_unknown_user_is_rejected() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let ghost = chatway::keys::UserKey::generate();

    let err = friendship::send(&pool, alice, ghost).await.unwrap_err();
    assert_eq!(err.code(), "USER_NOT_FOUND");
}

#[tokio::test]
async fn test_duplicate_request_is_rejected_in_both_directions() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;

    friendship::send(&pool, alice, bob).await.unwrap();

    let err = friendship::send(&pool, alice, bob).await.unwrap_err();
    assert_eq!(err.code(), "REQUEST_PENDING");
    // The reverse direction conflicts too: one outstanding request per pair.
    let err = friendship::send(&pool, bob, alice).await.unwrap_err();
    assert_eq!(err.code(), "REQUEST_PENDING");
}

#[tokio::test]
async fn test_accept_makes_friends_and_is_idempotent() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;

    friendship::send(&pool, alice, bob).await.unwrap();
    assert!(friendship::accept(&pool, bob, alice).await.unwrap());

    assert!(friendship::are_friends(&pool, alice, bob).await.unwrap());
    assert!(friendship::are_friends(&pool, bob, alice).await.unwrap());

    // Second accept is a no-op returning false.
    assert!(!friendship::accept(&pool, bob, alice).await.unwrap());

    // Friendship and pending-request are mutually exclusive per pair.
    let requests = friendship::pending_requests(&pool, bob).await.unwrap();
    assert!(requests.received.is_empty() && requests.sent.is_empty());

    let err = friendship::send(&pool, alice, bob).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_FRIENDS");
    assert_matches!(err, GatewayError::Conflict { .. });
}

#[tokio::test]
async fn test_accept_only_works_for_the_recipient() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;

    friendship::send(&pool, alice, bob).await.unwrap();

    // The sender cannot accept their own request.
    assert!(!friendship::accept(&pool, alice, bob).await.unwrap());
    assert!(!friendship::are_friends(&pool, alice, bob).await.unwrap());
}

#[tokio::test]
async fn test_reject_clears_both_lists_and_allows_resend() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;

    friendship::send(&pool, alice, bob).await.unwrap();
    assert!(friendship::reject(&pool, bob, alice).await.unwrap());

    let bob_view = friendship::pending_requests(&pool, bob).await.unwrap();
    let alice_view = friendship::pending_requests(&pool, alice).await.unwrap();
    assert!(bob_view.received.is_empty());
    assert!(alice_view.sent.is_empty());
    assert!(!friendship::are_friends(&pool, alice, bob).await.unwrap());

    // No stale conflict remains.
    friendship::send(&pool, alice, bob).await.unwrap();

    // Rejecting again reports no transition.
    assert!(!friendship::reject(&pool, bob, bob).await.unwrap());
}

#[tokio::test]
async fn test_accept_flips_pending_direct_conversation() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;

    let (conv, created) = conversation::create_or_get_direct(&pool, alice, bob, alice)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(conv.status, ConversationStatus::Pending);

    friendship::send(&pool, alice, bob).await.unwrap();
    friendship::accept(&pool, bob, alice).await.unwrap();

    let conv = conversation::load(&pool, conv.id).await.unwrap();
    assert_eq!(conv.status, ConversationStatus::Accepted);
}

#[tokio::test]
async fn test_friends_of_lists_profiles() {
    let pool = common::test_pool().await;
    let alice = common::create_user(&pool, "alice").await;
    let bob = common::create_user(&pool, "bob").await;
    let carol = common::create_user(&pool, "carol").await;

    friendship::send(&pool, bob, alice).await.unwrap();
    friendship::accept(&pool, alice, bob).await.unwrap();
    friendship::send(&pool, carol, alice).await.unwrap();
    friendship::accept(&pool, alice, carol).await.unwrap();

    let friends = friendship::friends_of(&pool, alice).await.unwrap();
    let names: Vec<&str> = friends.iter().map(|f| f.username.as_str()).collect();
    assert_eq!(names, vec!["bob", "carol"]);

    assert_eq!(friendship::friends_of(&pool, bob).await.unwrap().len(), 1);
}
