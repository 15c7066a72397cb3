//! FSM unit tests

use launchpad::deploy::fsm::{DeploymentEvent, DeploymentFsm};
use launchpad::deploy::steps::StepBoard;
use launchpad::models::deployment::{DeploymentStatus, StepName, StepStatus};

#[test]
fn test_fsm_initial_state() {
    let fsm = DeploymentFsm::new();
    assert_eq!(fsm.state(), DeploymentStatus::Running);
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_each_terminal_status() {
    let mut fsm = DeploymentFsm::new();
    fsm.process(DeploymentEvent::Succeeded).unwrap();
    assert_eq!(fsm.state(), DeploymentStatus::Success);

    let mut fsm = DeploymentFsm::new();
    fsm.process(DeploymentEvent::Failed("Git Authentication failed.".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), DeploymentStatus::Failed);
    assert_eq!(fsm.error(), Some("Git Authentication failed."));

    let mut fsm = DeploymentFsm::new();
    fsm.process(DeploymentEvent::Cancelled).unwrap();
    assert_eq!(fsm.state(), DeploymentStatus::Cancelled);
}

#[test]
fn test_fsm_terminal_states_do_not_move() {
    let terminal = [
        (DeploymentStatus::Success, DeploymentEvent::Failed("late".to_string())),
        (DeploymentStatus::Failed, DeploymentEvent::Succeeded),
        (DeploymentStatus::Cancelled, DeploymentEvent::Failed("late".to_string())),
        (DeploymentStatus::Cancelled, DeploymentEvent::Succeeded),
    ];
    for (state, event) in terminal {
        let mut fsm = DeploymentFsm::resume(state);
        assert!(fsm.process(event.clone()).is_err(), "{:?} accepted {:?}", state, event);
        assert_eq!(fsm.state(), state);
    }
}

#[test]
fn test_fsm_check_persisted_transitions() {
    use DeploymentStatus::*;

    assert!(DeploymentFsm::check(Running, Running).is_ok());
    assert!(DeploymentFsm::check(Running, Success).is_ok());
    assert!(DeploymentFsm::check(Running, Failed).is_ok());
    assert!(DeploymentFsm::check(Success, Cancelled).is_err());
    assert!(DeploymentFsm::check(Failed, Running).is_err());
    assert!(DeploymentFsm::check(Cancelled, Success).is_err());
}

#[test]
fn test_step_board_lifecycle() {
    let mut board = StepBoard::new();
    assert!(board
        .snapshot()
        .iter()
        .all(|s| s.status == StepStatus::Pending));

    board.start(StepName::SystemSetup).unwrap();
    assert_eq!(board.get(StepName::SystemSetup).status, StepStatus::Running);

    board
        .finish(StepName::SystemSetup, StepStatus::Success, Some("ok".to_string()))
        .unwrap();
    assert_eq!(board.get(StepName::SystemSetup).details.as_deref(), Some("ok"));

    board.start(StepName::DirectoryBackup).unwrap();
    assert_eq!(board.fail_running("Cancelled"), Some(StepName::DirectoryBackup));
    assert_eq!(board.get(StepName::DirectoryBackup).status, StepStatus::Failure);
    assert_eq!(board.fail_running("again"), None);
}
