use labbench_hardware::{Action, Axis, DestructiveOp, ExecutionMode, HardwareControl, Robot, Vector};
use labbench_protocol::{ScriptConfig, ScriptRunner, SharedRobot};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const TRANSFER_PROTOCOL: &str = r#"
local tiprack = containers.load('tiprack-200ul', 'A1', 'tiprack')
local plate = containers.load('96-flat', 'B1', 'plate')
local trash = containers.load('point', 'C1', 'trash')

local p200 = instruments.Pipette{
    axis = 'b', name = 'p200', max_volume = 200, tip_racks = {tiprack}, trash = trash,
}

for i = 1, 3 do
    p200:transfer(50, plate:well('A1'), plate:well(i + 8))
end
"#;

fn shared() -> SharedRobot {
    Arc::new(Mutex::new(Robot::new()))
}

#[test]
fn test_transfer_protocol_enqueues_commands() {
    let robot = shared();
    ScriptRunner::default().run(TRANSFER_PROTOCOL, &robot).unwrap();

    let mut robot = robot.lock();
    let axis = Axis::parse("B").unwrap();
    assert_eq!(robot.instrument(axis).unwrap().name(), "p200");
    assert_eq!(robot.commands().len(), 15);
    assert!(robot.commands().iter().all(|c| c.axis == Some(axis)));

    // index 9 is the first well of column two
    let plate = robot.deck().container("plate").unwrap();
    let a2 = robot.deck().well(plate, "A2").unwrap();
    assert_eq!(robot.commands()[2].location, Some(a2));

    assert!(robot.simulate().is_empty());
}

#[test]
fn test_container_label_defaults_to_type() {
    let robot = shared();
    ScriptRunner::default()
        .run("local p = containers.load('96-flat', 'D2')\nrobot:comment(p:slot() .. ' ' .. p:type())", &robot)
        .unwrap();

    let robot = robot.lock();
    assert!(robot.deck().container("96-flat").is_some());
    assert_eq!(robot.commands()[0].action, Action::Comment("D2 96-flat".to_string()));
}

#[test]
fn test_destructive_calls_follow_execution_mode() {
    let robot = shared();
    robot.lock().set_mode(ExecutionMode::Sandboxed);

    ScriptRunner::default()
        .run("robot:connect()\nrobot:move_head(5, 5, 5)\nrobot:reset()\nrobot:simulate()", &robot)
        .unwrap();

    let robot = robot.lock();
    assert!(!robot.is_connected());
    assert_eq!(robot.head_position(), Vector::zero());
    for op in [
        DestructiveOp::Connect,
        DestructiveOp::MoveHead,
        DestructiveOp::Reset,
        DestructiveOp::Simulate,
    ] {
        assert_eq!(robot.suppressed_calls(op), 1, "{}", op.name());
    }
}

#[test]
fn test_runtime_error_reports_line() {
    let fault = ScriptRunner::default()
        .run("robot:comment('start')\nerror('pipette jammed')", &shared())
        .unwrap_err();

    assert_eq!(fault.line, 2);
    assert!(fault.message.contains("pipette jammed"));
    assert!(fault.to_string().starts_with("Error in protocol file line 2 : "));
    assert!(fault.to_string().ends_with("error('pipette jammed')"));
}

#[test]
fn test_callback_error_reports_calling_line() {
    let fault = ScriptRunner::default()
        .run(
            "local plate = containers.load('96-flat', 'B1')\n\nlocal bad = containers.load('384-deep', 'B2')",
            &shared(),
        )
        .unwrap_err();

    assert_eq!(fault.line, 3);
    assert!(fault.message.contains("384-deep"));
}

#[test]
fn test_pipette_on_missing_axis_fails() {
    let fault = ScriptRunner::default()
        .run("local p = instruments.Pipette{name = 'p10'}", &shared())
        .unwrap_err();
    assert_eq!(fault.line, 1);
    assert!(fault.message.contains("requires an axis"));
}

#[test]
fn test_interpreter_limits_are_configurable() {
    let runner = ScriptRunner::new(ScriptConfig {
        memory_limit_bytes: 0,
    });
    assert_eq!(runner.config().memory_limit_bytes, 0);
    runner.run("local t = {}\nfor i = 1, 1000 do t[i] = i end", &shared()).unwrap();
}
