use labbench_core::INVALID_JSON;
use labbench_hardware::{DestructiveOp, ExecutionMode, HardwareControl, Vector};
use labbench_test_utils::{
    setup_session, DECLARATIVE_TRANSFER, SCRIPTED_DESTRUCTIVE, SCRIPTED_ERROR_LINE_2, SCRIPTED_TRANSFER,
};
use pretty_assertions::assert_eq;

#[test]
fn test_declarative_load_simulates() {
    let session = setup_session();
    let response = session.load_declarative(DECLARATIVE_TRANSFER.as_bytes());
    assert!(response.is_ok(), "{:?}", response.errors);
    assert!(response.warnings.is_empty(), "{:?}", response.warnings);

    session.with_robot(|robot| {
        assert_eq!(robot.deck().containers().len(), 4);
        // transfer (5) + mix (1 + 6 + 2)
        assert_eq!(robot.commands().len(), 14);
    });
}

#[test]
fn test_declarative_malformed_json() {
    let response = setup_session().load_declarative(b"{not json");
    assert_eq!(response.errors, vec![INVALID_JSON.to_string()]);
    assert!(response.warnings.is_empty());
}

#[test]
fn test_declarative_validation_errors_skip_simulation() {
    let session = setup_session();
    let response = session.load_declarative(
        br#"{"deck": {}, "head": {}, "instructions": [{"tool": "p200", "groups": []}]}"#,
    );
    assert_eq!(response.errors.len(), 2);
    assert!(response.errors[0].contains("1 error"));
    assert!(response.errors[1].contains("unknown tool 'p200'"));
    // no "Protocol contains no commands" warning: simulate never ran
    assert!(response.warnings.is_empty());
}

#[test]
fn test_declarative_warnings_are_merged() {
    let session = setup_session();
    let response = session.load_declarative(
        br#"{"deck": {}, "head": {}, "instructions": [], "comment": "empty"}"#,
    );
    assert!(response.is_ok());
    assert_eq!(response.warnings, vec!["Protocol contains no commands".to_string()]);
}

#[test]
fn test_scripted_load_simulates() {
    let session = setup_session();
    let response = session.load_scripted(SCRIPTED_TRANSFER.as_bytes(), "transfer.lua");
    assert_eq!(response.errors, Vec::<String>::new());
    assert!(response.warnings.is_empty(), "{:?}", response.warnings);
    session.with_robot(|robot| assert_eq!(robot.instruments().count(), 2));
}

#[test]
fn test_scripted_load_suppresses_destructive_calls() {
    let session = setup_session();
    let response = session.load_scripted(SCRIPTED_DESTRUCTIVE.as_bytes(), "destructive.lua");
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(response.warnings, vec!["Protocol contains no commands".to_string()]);

    session.with_robot(|robot| {
        for op in DestructiveOp::ALL {
            assert_eq!(robot.suppressed_calls(op), 1, "{}", op.name());
        }
        assert!(!robot.is_connected());
        assert_eq!(robot.head_position(), Vector::zero());
        assert!(robot.motions().is_empty());
    });
}

#[test]
fn test_real_methods_restored_after_success() {
    let session = setup_session();
    session.load_scripted(SCRIPTED_DESTRUCTIVE.as_bytes(), "destructive.lua");

    session.with_robot(|robot| {
        assert_eq!(robot.mode(), ExecutionMode::Live);
        let target = Vector::new(10.0, 20.0, 30.0);
        robot.move_head(target);
        assert_eq!(robot.head_position(), target);
        robot.connect(None);
        assert!(robot.is_connected());
    });
}

#[test]
fn test_real_methods_restored_after_failure() {
    let session = setup_session();
    let response = session.load_scripted(SCRIPTED_ERROR_LINE_2.as_bytes(), "broken.lua");
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].contains("line 2"));
    assert!(response.errors[0].contains("protocol aborted"));
    assert!(response.warnings.is_empty());

    session.with_robot(|robot| {
        assert_eq!(robot.mode(), ExecutionMode::Live);
        robot.move_head(Vector::new(1.0, 1.0, 1.0));
        assert_eq!(robot.head_position(), Vector::new(1.0, 1.0, 1.0));
    });
}

#[test]
fn test_load_resets_previous_protocol() {
    let session = setup_session();
    session.load_scripted(SCRIPTED_TRANSFER.as_bytes(), "transfer.lua");
    let response = session.load_scripted(b"robot:comment('only a comment')", "comment.lua");
    assert!(response.is_ok());

    session.with_robot(|robot| {
        assert!(robot.deck().containers().is_empty());
        assert_eq!(robot.instruments().count(), 0);
        assert_eq!(robot.commands().len(), 1);
    });
}

#[test]
fn test_non_utf8_payload_does_not_crash() {
    let response = setup_session().load_scripted(&[0xff, 0xfe, b'\n'], "binary.lua");
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].starts_with("Error in protocol file line"));
}

#[test]
fn test_scripted_mix_beyond_command_limit() {
    let session = setup_session();
    let response = session.load_scripted(
        b"local plate = containers.load('96-flat', 'B1', 'plate')\n\
          local p = instruments.Pipette{axis = 'a', max_volume = 1}\n\
          p:mix(1000000, 1, plate:well('A1'))\n",
        "mix.lua",
    );
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].contains("line 3"), "{}", response.errors[0]);
    assert!(response.errors[0].contains("queued commands"), "{}", response.errors[0]);
    session.with_robot(|robot| assert!(robot.commands().is_empty()));
}

#[test]
fn test_declarative_transfer_beyond_command_limit() {
    let session = setup_session();
    let response = session.load_declarative(
        br#"{
            "deck": {"plate": {"labware": "96-flat", "slot": "B1"}},
            "head": {"p1": {"tool": "pipette", "axis": "a", "volume": 1}},
            "instructions": [{"tool": "p1", "groups": [
                {"transfer": [{"from": {"container": "plate", "location": "A1"},
                               "to": {"container": "plate", "location": "A2"},
                               "volume": 2000000}]}
            ]}]
        }"#,
    );
    assert_eq!(response.errors.len(), 2);
    assert!(response.errors[1].contains("queued commands"), "{:?}", response.errors);
    assert!(response.warnings.is_empty());
    session.with_robot(|robot| assert!(robot.commands().is_empty()));
}
