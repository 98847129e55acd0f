//! A session rebuilt from its JSON document behaves identically.

use chrono::Utc;
use tab_game::{DiceRoll, Phase, Session, Status};

fn mid_game() -> Session {
    let mut session = Session::new("abc".into(), 7, 4, "ana".into(), Utc::now());
    session.join("bia").expect("join");
    let one = DiceRoll::from_value(1).expect("score");
    session.roll("ana", &one).expect("roll");
    session.notify("ana", 0).expect("select");
    session.notify("ana", 4).expect("move");
    session.roll("ana", &DiceRoll::from_value(3).expect("score")).expect("roll");
    session
}

#[test]
fn json_roundtrip_preserves_legal_moves() {
    let session = mid_game();
    let json = serde_json::to_string(&session).expect("serialize");
    let restored: Session = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(restored, session);

    for cell in 0..session.board().len() {
        for roll in [1, 2, 3, 4, 6] {
            assert_eq!(
                restored.legal_destinations(cell, roll),
                session.legal_destinations(cell, roll),
                "cell {cell} roll {roll}"
            );
        }
    }
}

#[test]
fn state_frame_uses_wire_names() {
    let session = mid_game();
    let value = serde_json::to_value(&session).expect("serialize");
    assert_eq!(value["status"], "ongoing");
    assert_eq!(value["turnHolder"], "ana");
    assert_eq!(value["initialPlayer"], "ana");
    assert_eq!(value["players"]["bia"], "Red");
    assert_eq!(value["dice"]["value"], 3);
    assert_eq!(value["dice"]["extraTurn"], false);
    assert_eq!(value["phase"]["step"], "awaitingOrigin");
    assert_eq!(value["board"].as_array().map(Vec::len), Some(16));
    assert_eq!(value["board"][4]["stage"], "moved");
    assert!(value["board"][5].is_null());
}

#[test]
fn selection_is_part_of_the_frame() {
    let mut session = mid_game();
    session.notify("ana", 4).expect("select");
    let value = serde_json::to_value(&session).expect("serialize");
    assert_eq!(value["phase"]["step"], "awaitingDestination");
    assert_eq!(value["phase"]["origin"], 4);
    assert_eq!(value["phase"]["destinations"], serde_json::json!([7]));
    assert!(matches!(session.phase(), Phase::AwaitingDestination { .. }));
    assert_eq!(*session.status(), Status::Ongoing);
}
