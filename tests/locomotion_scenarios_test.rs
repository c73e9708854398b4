//! End-to-end scenarios: a rapier world, the walker, and a scripted input
//! timeline run through the headless simulation loop.
//!
//! Run with: cargo test --test locomotion_scenarios_test -- --nocapture

use std::path::PathBuf;

use walker::controller::{ControllerEvent, ControllerState};
use walker::scenario::Scenario;
use walker::sim::{FrameRecord, Simulation, SimulationReport};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

fn load(name: &str) -> Scenario {
    Scenario::from_file(&scenario_path(name))
        .unwrap_or_else(|e| panic!("failed to load {}: {}", name, e))
}

fn run(scenario: &Scenario) -> SimulationReport {
    let mut sim = Simulation::from_scenario(scenario).expect("simulation should build");
    sim.run(scenario).expect("simulation should run")
}

/// First frame recorded at or after `time`.
fn frame_at(report: &SimulationReport, time: f32) -> &FrameRecord {
    report
        .frames
        .iter()
        .find(|f| f.time >= time)
        .unwrap_or_else(|| panic!("no frame at t={}", time))
}

fn events(report: &SimulationReport) -> impl Iterator<Item = &ControllerEvent> {
    report.frames.iter().flat_map(|f| f.events.iter())
}

fn count(report: &SimulationReport, pred: impl Fn(&ControllerEvent) -> bool) -> usize {
    events(report).filter(|e| pred(e)).count()
}

// ---------------------------------------------------------------------------
// Jump
// ---------------------------------------------------------------------------

#[test]
fn test_jump_arc_and_landing() {
    let scenario = load("jump.toml");
    let report = run(&scenario);

    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::Jump { .. })), 1);

    let peak = report
        .frames
        .iter()
        .map(|f| f.position[1])
        .fold(f32::MIN, f32::max);
    println!("jump peak: {:.3}", peak);
    assert!(peak > 1.0, "jump should clear 1m, peak {}", peak);

    // Rising/Jumping states show up before the landing
    assert!(report
        .frames
        .iter()
        .any(|f| f.state == ControllerState::Jumping));
    assert!(count(&report, |e| matches!(e, ControllerEvent::Land { .. })) >= 1);
    assert_eq!(report.final_state, ControllerState::Grounded);
    assert!(report.final_position[1].abs() < 0.15);
}

#[test]
fn test_held_jump_does_not_refire() {
    let mut scenario = load("jump.toml");
    // Hold the button for the whole run
    scenario.inputs[0].end = scenario.duration;
    let report = run(&scenario);
    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::Jump { .. })), 1);
}

// ---------------------------------------------------------------------------
// Ground contact
// ---------------------------------------------------------------------------

#[test]
fn test_walking_off_ledge_falls_and_lands() {
    let scenario = load("ledge_drop.toml");
    let report = run(&scenario);

    // Standing on the platform before walking
    let start = frame_at(&report, 0.25);
    assert_eq!(start.state, ControllerState::Grounded);
    assert!((start.position[1] - 0.9).abs() < 0.15);

    let fell = report
        .frames
        .iter()
        .filter(|f| f.time > 0.3)
        .any(|f| f.state == ControllerState::Falling);
    assert!(fell, "a drop taller than a step should leave the ground");

    // One landing from the spawn, one at the bottom of the drop
    let late_landing = report
        .frames
        .iter()
        .filter(|f| f.time > 0.3)
        .flat_map(|f| f.events.iter())
        .any(|e| matches!(e, ControllerEvent::Land { .. }));
    assert!(late_landing);

    // No single-frame snap down the full drop
    for pair in report.frames.windows(2) {
        let dy = pair[0].position[1] - pair[1].position[1];
        assert!(dy < 0.5, "dropped {} in one frame at t={}", dy, pair[1].time);
    }

    assert_eq!(report.final_state, ControllerState::Grounded);
    assert!(report.final_position[1].abs() < 0.15);
    assert!(report.final_position[2] > 2.0);
}

#[test]
fn test_steep_wedge_slides_to_floor() {
    let scenario = load("steep_slope.toml");
    let report = run(&scenario);

    let slid = report
        .frames
        .iter()
        .any(|f| f.state == ControllerState::Sliding);
    assert!(slid, "45 degrees is over the 30 degree limit");

    println!("slope final position: {:?}", report.final_position);
    assert_eq!(report.final_state, ControllerState::Grounded);
    assert!(report.final_position[0] > 1.5, "should slide toward +x");
    assert!(report.final_position[1] < 0.3);
}

// ---------------------------------------------------------------------------
// Crouch
// ---------------------------------------------------------------------------

#[test]
fn test_crouch_under_beam_waits_for_clearance() {
    let scenario = load("crouch_under_beam.toml");
    let report = run(&scenario);

    // Crouched before entering the beam
    let entering = frame_at(&report, 1.0);
    assert!(entering.crouching);
    assert!((entering.collider_height - 1.0).abs() < 1e-3);

    // Stand requested at 2.5 while underneath: refused
    let underneath = frame_at(&report, 3.5);
    println!("under beam at z={:.2}", underneath.position[2]);
    assert!(underneath.position[2] > 2.0 && underneath.position[2] < 6.0);
    assert!(underneath.crouching);
    assert!((underneath.collider_height - 1.0).abs() < 1e-3);

    // Stood up on its own once clear
    let last = report.frames.last().expect("frames");
    assert!(!last.crouching);
    assert!((last.collider_height - 2.0).abs() < 1e-3);
    assert!(report.final_position[2] > 6.5);

    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::CrouchDown)), 1);
    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::CrouchUp)), 1);
    // One sound per height change
    assert_eq!(
        count(&report, |e| matches!(e, ControllerEvent::BodySound(_))),
        2
    );
}

#[test]
fn test_hold_crouch_tracks_the_key() {
    let scenario: Scenario = toml::from_str(
        r#"
        name = "hold crouch"
        duration = 3.0

        [[parts]]
        position = [0.0, -0.5, 0.0]
        size = [20.0, 1.0, 20.0]

        [[inputs]]
        start = 0.2
        end = 1.5
        crouch = true
        "#,
    )
    .unwrap();
    let report = run(&scenario);

    let held = frame_at(&report, 1.2);
    assert!(held.crouching);
    assert!((held.camera_height - 0.85).abs() < 1e-3);

    let released = frame_at(&report, 2.5);
    assert!(!released.crouching);
    assert!((released.collider_height - 2.0).abs() < 1e-3);
    assert!((released.camera_height - 1.7).abs() < 1e-3);
}

// ---------------------------------------------------------------------------
// Mantle
// ---------------------------------------------------------------------------

#[test]
fn test_mantle_onto_ledge() {
    let scenario = load("mantle.toml");
    let report = run(&scenario);

    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::MantleStart { .. })), 1);
    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::MantleEnd)), 1);
    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::Jump { .. })), 0);

    // Movement is suspended while the camera eases onto the ledge
    assert!(report.frames.iter().any(|f| !f.can_move));

    println!("final position: {:?}", report.final_position);
    assert!(report.final_position[1] > 0.8, "should stand on the ledge");
    assert!(report.final_position[2] > 1.0);
    assert_eq!(report.final_state, ControllerState::Grounded);
    assert!(report.frames.last().map(|f| f.can_move).unwrap_or(false));
}

#[test]
fn test_mantle_disabled_falls_back_to_jump() {
    let mut scenario = load("mantle.toml");
    scenario.controller.jump.mantle_enabled = false;
    let report = run(&scenario);

    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::MantleStart { .. })), 0);
    assert_eq!(count(&report, |e| matches!(e, ControllerEvent::Jump { .. })), 1);
}

// ---------------------------------------------------------------------------
// Config files
// ---------------------------------------------------------------------------

#[test]
fn test_sample_controller_config_is_valid() {
    let config = walker::config::ControllerConfig::from_file(&scenario_path("controller.toml"))
        .expect("sample config should load");
    assert_eq!(config.body.standing_height, 2.0);
    assert_eq!(config.crouch.crouched_height, 1.0);
}

#[test]
fn test_trace_is_deterministic_with_seeded_sounds() {
    let scenario = load("crouch_under_beam.toml");
    let a = serde_json::to_string(&run(&scenario)).unwrap();
    let b = serde_json::to_string(&run(&scenario)).unwrap();
    assert_eq!(a, b);
}
