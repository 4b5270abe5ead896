//! End-to-end protocol behaviour against the in-memory store.

mod common;

use common::*;
use rota_engine::*;
use rota_notify::{Channel, NotificationKind};
use rota_storage::RoundStore;

// ───────────────────────────────────── Scenarios ─────────────────────────────────────

#[tokio::test]
async fn sequential_first_candidate_accepts() {
    let h = World::new(3).engine();
    let round = h.create(RoundMode::Sequential).await;
    assert!(h.drain().await.is_empty(), "create must not notify");

    h.engine.send(&round.id, &h.creator).await.unwrap();
    let sent = h.drain().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient_id, h.friends[0]);
    assert_eq!(sent[0].title, "Invite Received");
    assert_eq!(sent[0].body, "Cara invited you to join Sunday hike");

    let outcome = h
        .engine
        .respond(&round.id, &h.friends[0], "accept")
        .await
        .unwrap();
    assert_eq!(outcome.round.status, RoundStatus::Accepted);
    assert_eq!(outcome.round.pointer_index(), 0);
    assert_eq!(outcome.next_candidate, None);
    assert_eq!(outcome.message, "Invite accepted");

    let notices = h.drain().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient_id, h.creator);
    assert_eq!(notices[0].kind, NotificationKind::InviteAccepted);
    assert_eq!(notices[0].title, "Invite Accepted!");
    assert_eq!(notices[0].body, "Friend 0 has joined Sunday hike");
}

#[tokio::test]
async fn sequential_declines_cascade_to_completion() {
    let h = World::new(3).engine();
    let round = h.create(RoundMode::Sequential).await;

    let first = h
        .engine
        .respond(&round.id, &h.friends[0], "decline")
        .await
        .unwrap();
    assert_eq!(first.round.pointer_index(), 1);
    assert_eq!(first.round.status, RoundStatus::Pending);
    assert_eq!(first.next_candidate.as_ref(), Some(&h.friends[1]));

    let notices = h.drain().await;
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].recipient_id, h.creator);
    assert_eq!(notices[0].title, "Invite Declined");
    assert_eq!(notices[0].body, "Friend 0 declined your invite to Sunday hike");
    assert_eq!(notices[1].recipient_id, h.friends[1]);
    assert_eq!(notices[1].kind, NotificationKind::InviteReceived);
    assert_eq!(notices[1].body, "Cara invited you to join Sunday hike");

    let second = h
        .engine
        .respond(&round.id, &h.friends[1], "decline")
        .await
        .unwrap();
    assert_eq!(second.round.pointer_index(), 2);
    assert_eq!(second.next_candidate.as_ref(), Some(&h.friends[2]));

    let last = h
        .engine
        .respond(&round.id, &h.friends[2], "decline")
        .await
        .unwrap();
    assert_eq!(last.round.status, RoundStatus::Completed);
    assert_eq!(last.round.pointer_index(), 3);
    assert_eq!(last.next_candidate, None);
    assert_eq!(last.message, "Invite declined, no candidates remain");
    last.round.check_invariants().unwrap();
}

#[tokio::test]
async fn sequential_out_of_turn_is_forbidden() {
    let h = World::new(3).engine();
    let round = h.create(RoundMode::Sequential).await;

    let err = h
        .engine
        .respond(&round.id, &h.friends[1], "accept")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let unchanged = h.store.get_round(&round.id).await.unwrap();
    assert_eq!(unchanged, round);
    assert!(h.drain().await.is_empty());
}

#[tokio::test]
async fn parallel_second_accept_is_rejected() {
    let h = World::new(3).engine();
    let round = h.create(RoundMode::Parallel).await;

    let won = h
        .engine
        .respond(&round.id, &h.friends[1], "accept")
        .await
        .unwrap();
    assert_eq!(won.round.status, RoundStatus::Accepted);
    assert_eq!(won.round.pointer_index(), 1);
    assert_eq!(won.round.accepted_candidate(), Some(&h.friends[1]));

    let err = h
        .engine
        .respond(&round.id, &h.friends[0], "accept")
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(msg) => {
            assert_eq!(msg, "cannot respond: invite status is accepted")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn parallel_everyone_declines() {
    let h = World::new(3).engine();
    let round = h.create(RoundMode::Parallel).await;
    let order = [h.friends[2].clone(), h.friends[0].clone(), h.friends[1].clone()];

    for (n, who) in order.iter().enumerate() {
        let outcome = h.engine.respond(&round.id, who, "decline").await.unwrap();
        assert_eq!(outcome.next_candidate, None);
        assert_eq!(outcome.round.declined(), &order[..=n]);
        let expected = if n + 1 == order.len() {
            RoundStatus::Completed
        } else {
            RoundStatus::Pending
        };
        assert_eq!(outcome.round.status, expected);
    }

    // Only the creator is told about parallel declines.
    let notices = h.drain().await;
    assert_eq!(notices.len(), 3);
    assert!(notices.iter().all(|n| n.recipient_id == h.creator));
}

#[tokio::test]
async fn invalid_action_is_rejected_before_lookup() {
    let h = World::new(1).engine();
    let missing = RoundId::generate();

    let err = h
        .engine
        .respond(&missing, &h.friends[0], "maybe")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = h
        .engine
        .respond(&missing, &h.friends[0], "accept")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

// ───────────────────────────────────── Properties ────────────────────────────────────

#[tokio::test]
async fn terminal_rounds_reject_every_response() {
    for mode in [RoundMode::Sequential, RoundMode::Parallel] {
        let h = World::new(3).engine();

        let accepted = h.create(mode).await;
        h.engine
            .respond(&accepted.id, &h.friends[0], "accept")
            .await
            .unwrap();

        let cancelled = h.create(mode).await;
        h.engine.cancel(&cancelled.id, &h.creator).await.unwrap();

        let completed = h.create(mode).await;
        for f in &h.friends {
            h.engine.respond(&completed.id, f, "decline").await.unwrap();
        }

        for id in [&accepted.id, &cancelled.id, &completed.id] {
            let before = h.store.get_round(id).await.unwrap();
            assert!(before.status.is_terminal());
            for f in &h.friends {
                for action in ["accept", "decline"] {
                    let err = h.engine.respond(id, f, action).await.unwrap_err();
                    assert!(matches!(err, EngineError::Validation(_)), "{mode} {action}");
                }
            }
            assert_eq!(h.store.get_round(id).await.unwrap(), before);
        }
    }
}

#[tokio::test]
async fn parallel_declines_from_concurrent_callers_all_land() {
    let h = World::new(4).engine();
    let round = h.create(RoundMode::Parallel).await;

    let results = futures::future::join_all(
        h.friends
            .iter()
            .map(|f| h.engine.respond(&round.id, f, "decline")),
    )
    .await;
    assert!(results.iter().all(|r| r.is_ok()));

    let stored = h.store.get_round(&round.id).await.unwrap();
    assert_eq!(stored.status, RoundStatus::Completed);
    assert_eq!(stored.declined().len(), 4);
    stored.check_invariants().unwrap();
}

// ───────────────────────────────────── Create ────────────────────────────────────────

#[tokio::test]
async fn create_validates_candidate_order() {
    let h = World::new(2).engine();
    let stranger = user();
    let cases = [
        (vec![], "must not be empty"),
        (
            vec![h.friends[0].clone(), h.friends[1].clone(), h.friends[0].clone()],
            "more than once",
        ),
        (vec![h.friends[0].clone(), stranger], "not one of your connections"),
        (vec![h.creator.clone()], "invite yourself"),
    ];

    for (candidates, expected) in cases {
        let err = h
            .engine
            .create(
                &h.creator,
                NewRound {
                    target_id: h.target.clone(),
                    mode: RoundMode::Sequential,
                    candidates,
                },
            )
            .await
            .unwrap_err();
        match err {
            EngineError::Validation(msg) => assert!(msg.contains(expected), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    assert!(h.engine.list_created(&h.creator).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_starts_pending_at_first_candidate() {
    let h = World::new(2).engine();
    for mode in [RoundMode::Sequential, RoundMode::Parallel] {
        let round = h.create(mode).await;
        assert_eq!(round.status, RoundStatus::Pending);
        assert_eq!(round.pointer_index(), 0);
        assert!(round.declined().is_empty());
        assert_eq!(round.mode(), mode);
        assert_eq!(round.candidates, h.friends);
    }
}

// ────────────────────────────────────── Send ─────────────────────────────────────────

#[tokio::test]
async fn parallel_send_skips_candidates_who_declined() {
    let h = World::new(3).engine();
    let round = h.create(RoundMode::Parallel).await;
    h.engine
        .respond(&round.id, &h.friends[1], "decline")
        .await
        .unwrap();
    h.drain().await;

    h.engine.send(&round.id, &h.creator).await.unwrap();
    let mut recipients: Vec<UserId> = h.drain().await.into_iter().map(|m| m.recipient_id).collect();
    recipients.sort();
    let mut expected = vec![h.friends[0].clone(), h.friends[2].clone()];
    expected.sort();
    assert_eq!(recipients, expected);
}

#[tokio::test]
async fn sequential_send_follows_pointer_and_repeats() {
    let h = World::new(2).engine();
    let round = h.create(RoundMode::Sequential).await;
    h.engine
        .respond(&round.id, &h.friends[0], "decline")
        .await
        .unwrap();
    h.drain().await;

    for _ in 0..2 {
        let unchanged = h.engine.send(&round.id, &h.creator).await.unwrap();
        assert_eq!(unchanged.pointer_index(), 1);
        let sent = h.drain().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_id, h.friends[1]);
    }
}

#[tokio::test]
async fn send_requires_creator_and_pending() {
    let h = World::new(2).engine();
    let round = h.create(RoundMode::Parallel).await;

    let err = h.engine.send(&round.id, &h.friends[0]).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    h.engine.cancel(&round.id, &h.creator).await.unwrap();
    let err = h.engine.send(&round.id, &h.creator).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = h
        .engine
        .send(&RoundId::generate(), &h.creator)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(h.drain().await.is_empty());
}

// ───────────────────────────────────── Cancel ────────────────────────────────────────

#[tokio::test]
async fn cancel_is_creator_only_and_silent() {
    let h = World::new(2).engine();
    let round = h.create(RoundMode::Sequential).await;

    let err = h.engine.cancel(&round.id, &h.friends[0]).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let cancelled = h.engine.cancel(&round.id, &h.creator).await.unwrap();
    assert_eq!(cancelled.status, RoundStatus::Cancelled);
    assert!(h.drain().await.is_empty());

    let err = h.engine.cancel(&round.id, &h.creator).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Authorization is checked before state.
    let err = h.engine.cancel(&round.id, &h.friends[1]).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

// ────────────────────────────────── Notifications ────────────────────────────────────

#[tokio::test]
async fn muted_channels_are_skipped() {
    let mut world = World::new(1);
    let friend = world.friends[0].clone();
    world.directory.muted.insert((friend.clone(), Channel::Email));
    let mut h = world.engine();
    h.engine = h.engine.with_channels(vec![Channel::InApp, Channel::Email]);

    let round = h.create(RoundMode::Sequential).await;
    h.engine.send(&round.id, &h.creator).await.unwrap();
    let sent = h.drain().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel, Channel::InApp);

    h.engine.respond(&round.id, &friend, "accept").await.unwrap();
    let channels: Vec<Channel> = h.drain().await.into_iter().map(|m| m.channel).collect();
    assert_eq!(channels, vec![Channel::InApp, Channel::Email]);
}

#[tokio::test]
async fn failed_preference_lookup_skips_notification_not_transition() {
    let mut world = World::new(1);
    world.directory.preferences_down = true;
    let h = world.engine();

    let round = h.create(RoundMode::Sequential).await;
    let outcome = h
        .engine
        .respond(&round.id, &h.friends[0], "accept")
        .await
        .unwrap();
    assert_eq!(outcome.round.status, RoundStatus::Accepted);
    assert!(h.drain().await.is_empty());
}

#[tokio::test]
async fn missing_profiles_fall_back_to_generic_wording() {
    let mut world = World::new(1);
    world.directory.names.clear();
    world.directory.titles.clear();
    let h = world.engine();

    let round = h.create(RoundMode::Sequential).await;
    h.engine
        .respond(&round.id, &h.friends[0], "decline")
        .await
        .unwrap();
    let notices = h.drain().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].body, "Someone declined your invite to your activity");
}

// ───────────────────────────────────── Queries ───────────────────────────────────────

#[tokio::test]
async fn get_is_limited_to_participants() {
    let h = World::new(2).engine();
    let round = h.create(RoundMode::Sequential).await;

    assert_eq!(h.engine.get(&round.id, &h.creator).await.unwrap().id, round.id);
    assert_eq!(h.engine.get(&round.id, &h.friends[1]).await.unwrap().id, round.id);
    let err = h.engine.get(&round.id, &user()).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn incoming_lists_only_rounds_waiting_on_caller() {
    let h = World::new(2).engine();
    let round = h.create(RoundMode::Sequential).await;

    assert_eq!(h.engine.list_incoming(&h.friends[0]).await.unwrap().len(), 1);
    assert!(h.engine.list_incoming(&h.friends[1]).await.unwrap().is_empty());

    h.engine
        .respond(&round.id, &h.friends[0], "decline")
        .await
        .unwrap();
    assert!(h.engine.list_incoming(&h.friends[0]).await.unwrap().is_empty());
    assert_eq!(h.engine.list_incoming(&h.friends[1]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn eligible_candidates_passes_through_connections() {
    let h = World::new(3).engine();
    let mut eligible = h.engine.eligible_candidates(&h.creator).await.unwrap();
    eligible.sort();
    let mut expected = h.friends.clone();
    expected.sort();
    assert_eq!(eligible, expected);
}
