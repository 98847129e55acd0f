//! End-to-end game flows through the service facade.

mod common;

use std::sync::Arc;

use common::{FlakyStore, seated, two_players};
use tab_game::{Color, GameError, Phase, Selection, Session, Status};
use tab_server::{Frame, Repository, ServiceError, StatsKey, Subscription};

async fn next_state(subscription: &mut Subscription) -> Session {
    let Some(Frame::State(json)) = subscription.recv().await else {
        panic!("expected a state frame");
    };
    serde_json::from_str(&json).expect("state json")
}

#[tokio::test]
async fn test_second_join_starts_the_game() {
    let service = two_players(&[]).await;

    let first = service.join("ana", "pw-a", 1, 3).await.expect("ana joins");
    assert_eq!(*first.status(), Status::Waiting);
    assert_eq!(*first.color(), Color::Blue);

    let second = service.join("bia", "pw-b", 1, 3).await.expect("bia joins");
    assert_eq!(second.session_id(), first.session_id());
    assert_eq!(*second.status(), Status::Ongoing);
    assert_eq!(*second.color(), Color::Red);

    let session = service.snapshot(first.session_id()).await.expect("snapshot");
    assert_eq!(session.players().len(), 2);
    assert_eq!(session.turn_holder(), "ana");
}

#[tokio::test]
async fn test_rejoin_is_idempotent() {
    let (service, game) = seated(&[]).await;
    let again = service.join("bia", "pw-b", 1, 3).await.expect("rejoin");
    assert_eq!(again.session_id(), &game);
    assert_eq!(*again.color(), Color::Red);
}

#[tokio::test]
async fn test_different_size_opens_another_session() {
    let service = two_players(&[]).await;
    let small = service.join("ana", "pw-a", 1, 3).await.expect("ana joins");
    let large = service.join("bia", "pw-b", 1, 5).await.expect("bia joins");
    assert_ne!(small.session_id(), large.session_id());
    assert_eq!(*large.status(), Status::Waiting);
}

#[tokio::test]
async fn test_concurrent_joins_share_one_session() {
    let service = Arc::new(two_players(&[]).await);
    let (a, b) = tokio::join!(
        service.join("ana", "pw-a", 7, 4),
        service.join("bia", "pw-b", 7, 4)
    );
    let (a, b) = (a.expect("ana joins"), b.expect("bia joins"));
    assert_eq!(a.session_id(), b.session_id());
    assert_ne!(a.color(), b.color());
}

#[tokio::test]
async fn test_roll_of_one_keeps_the_turn_after_moving() {
    let (service, game) = seated(&[1]).await;

    let outcome = service.roll("ana", "pw-a", &game).await.expect("roll");
    assert_eq!(outcome.dice.value(), 1);
    assert!(outcome.dice.extra_turn());
    assert!(!outcome.must_pass);

    let picked = service.notify("ana", "pw-a", &game, 0).await.expect("origin");
    match picked {
        Selection::OriginSelected { origin, destinations } => {
            assert_eq!(origin, 0);
            assert_eq!(destinations.into_iter().collect::<Vec<_>>(), vec![3]);
        }
        other => panic!("expected an origin selection, got {other:?}"),
    }

    let moved = service.notify("ana", "pw-a", &game, 3).await.expect("move");
    assert!(matches!(moved, Selection::Moved { from: 0, to: 3, captured: false, game_over: None }));

    let session = service.snapshot(&game).await.expect("snapshot");
    assert_eq!(session.turn_holder(), "ana");
    assert!(session.awaiting_roll());
}

#[tokio::test]
async fn test_must_pass_blocks_notify_until_pass() {
    let (service, game) = seated(&[2]).await;

    let outcome = service.roll("ana", "pw-a", &game).await.expect("roll");
    assert!(outcome.must_pass);

    let err = service.notify("ana", "pw-a", &game, 0).await.expect_err("must pass");
    assert!(matches!(err, ServiceError::Game(GameError::MustPass)));
    let err = service.roll("ana", "pw-a", &game).await.expect_err("rolled");
    assert!(matches!(err, ServiceError::Game(GameError::AlreadyRolled)));

    service.pass("ana", "pw-a", &game).await.expect("pass");
    let session = service.snapshot(&game).await.expect("snapshot");
    assert_eq!(session.turn_holder(), "bia");

    let err = service.notify("ana", "pw-a", &game, 0).await.expect_err("turn over");
    assert!(matches!(err, ServiceError::Game(GameError::NotYourTurn)));
}

#[tokio::test]
async fn test_rejected_action_leaves_state_untouched() {
    let (service, game) = seated(&[]).await;
    let before = service.snapshot(&game).await.expect("snapshot");

    let err = service.roll("bia", "pw-b", &game).await.expect_err("not bia's turn");
    assert!(matches!(err, ServiceError::Game(GameError::NotYourTurn)));
    assert_eq!(service.snapshot(&game).await.expect("snapshot"), before);
}

#[tokio::test]
async fn test_leave_settles_stats_for_both() {
    let (service, game) = seated(&[]).await;

    service.leave("ana", "pw-a", &game).await.expect("leave");
    let session = service.snapshot(&game).await.expect("snapshot");
    assert_eq!(*session.status(), Status::Ended);
    assert_eq!(session.winner().as_deref(), Some("bia"));

    let rows = service.ranking(1, 3).await.expect("ranking");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].nickname, "bia");
    assert_eq!((rows[0].wins, rows[0].games_played), (1, 1));
    assert_eq!((rows[1].wins, rows[1].games_played), (0, 1));

    let err = service.leave("bia", "pw-b", &game).await.expect_err("already over");
    assert!(matches!(err, ServiceError::Game(GameError::GameOver)));
}

#[tokio::test]
async fn test_solo_leaver_counts_one_game() {
    let service = two_players(&[]).await;
    let ticket = service.join("ana", "pw-a", 2, 3).await.expect("join");
    service
        .leave("ana", "pw-a", ticket.session_id())
        .await
        .expect("leave");

    let rows = service.ranking(2, 3).await.expect("ranking");
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].wins, rows[0].games_played), (1, 1));
}

#[tokio::test]
async fn test_waiting_session_refuses_rolls() {
    let service = two_players(&[]).await;
    let ticket = service.join("ana", "pw-a", 1, 3).await.expect("join");
    let err = service
        .roll("ana", "pw-a", ticket.session_id())
        .await
        .expect_err("alone");
    assert!(matches!(err, ServiceError::Game(GameError::WaitingForOpponent)));
}

#[tokio::test]
async fn test_credentials_and_lookup_errors() {
    let (service, game) = seated(&[]).await;

    let err = service.roll("ana", "wrong", &game).await.expect_err("bad password");
    assert!(matches!(err, ServiceError::Unauthorized));

    let err = service.roll("ana", "pw-a", "nope").await.expect_err("unknown game");
    assert!(matches!(err, ServiceError::SessionNotFound(_)));

    let err = service.register("ana", "other").await.expect_err("taken");
    assert!(matches!(err, ServiceError::CredentialsMismatch));

    let err = service.join("", "pw", 1, 3).await.expect_err("no nick");
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = service.join("ana", "pw-a", 1, 0).await.expect_err("no columns");
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn test_subscriber_sees_snapshot_then_each_mutation() {
    let (service, game) = seated(&[1]).await;
    let mut subscription = service.subscribe(&game).await.expect("subscribe");

    let Some(Frame::State(first)) = subscription.recv().await else {
        panic!("expected a state frame first");
    };
    let first: Session = serde_json::from_str(&first).expect("state json");
    assert_eq!(*first.status(), Status::Ongoing);
    assert!(first.dice().is_none());

    service.roll("ana", "pw-a", &game).await.expect("roll");
    let Some(Frame::State(second)) = subscription.recv().await else {
        panic!("expected a state frame after the roll");
    };
    let second: Session = serde_json::from_str(&second).expect("state json");
    assert_eq!(second.dice().map(|d| d.value()), Some(1));
}

#[tokio::test]
async fn test_cancelled_selection_is_published() {
    let (service, game) = seated(&[1]).await;
    let mut subscription = service.subscribe(&game).await.expect("subscribe");
    next_state(&mut subscription).await;

    service.roll("ana", "pw-a", &game).await.expect("roll");
    next_state(&mut subscription).await;
    service.notify("ana", "pw-a", &game, 0).await.expect("origin");
    let picked = next_state(&mut subscription).await;
    assert!(matches!(picked.phase(), Phase::AwaitingDestination { origin: 0, .. }));

    let cancelled = service.notify("ana", "pw-a", &game, 5).await.expect("cancel");
    assert_eq!(cancelled, Selection::Cancelled);
    let state = next_state(&mut subscription).await;
    assert_eq!(*state.phase(), Phase::AwaitingOrigin);
    assert_eq!(state.dice().map(|d| d.value()), Some(1));
}

#[tokio::test]
async fn test_concurrent_rolls_on_one_session_are_serialized() {
    let (service, game) = seated(&[]).await;
    let service = Arc::new(service);
    let (a, b) = tokio::join!(
        service.roll("ana", "pw-a", &game),
        service.roll("ana", "pw-a", &game)
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(ServiceError::Game(GameError::AlreadyRolled))))
    );
}

#[tokio::test]
async fn test_rejected_roll_keeps_the_next_throw() {
    let (service, game) = seated(&[1]).await;
    let err = service.roll("bia", "pw-b", &game).await.expect_err("not bia's turn");
    assert!(matches!(err, ServiceError::Game(GameError::NotYourTurn)));

    let outcome = service.roll("ana", "pw-a", &game).await.expect("roll");
    assert_eq!(outcome.dice.value(), 1);
}

#[tokio::test]
async fn test_failed_game_save_does_not_count_stats() {
    let store = Arc::new(FlakyStore::default());
    let service = common::service_with(store.clone(), &[]);
    service.register("ana", "pw-a").await.expect("register ana");
    service.register("bia", "pw-b").await.expect("register bia");
    service.join("ana", "pw-a", 1, 3).await.expect("ana joins");
    let ticket = service.join("bia", "pw-b", 1, 3).await.expect("bia joins");
    let game = ticket.session_id();

    store.arm();
    let err = service.leave("bia", "pw-b", game).await.expect_err("save fails");
    assert!(matches!(err, ServiceError::Store(_)));
    let session = service.snapshot(game).await.expect("snapshot");
    assert_eq!(*session.status(), Status::Ongoing);
    assert!(service.ranking(1, 3).await.expect("ranking").is_empty());

    service.leave("bia", "pw-b", game).await.expect("retry");
    let key = StatsKey::new(1, 3);
    let stats = |nick: &str| {
        let user = store.user(nick).expect("read").expect("stored");
        let stats = user.stats_for(key).copied().expect("bucket");
        (*stats.wins(), *stats.games_played())
    };
    assert_eq!(stats("ana"), (1, 1));
    assert_eq!(stats("bia"), (0, 1));
}
