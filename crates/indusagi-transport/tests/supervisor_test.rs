//! Process supervisor tests against small shell scripts standing in for the agent

#![cfg(unix)]

use indusagi_transport::{
    ProcessConfig, ProcessState, ProcessSupervisor, Transport, TransportError, TransportEvent,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Announces readiness, then echoes every input line back
const ECHO_AGENT: &str = r#"echo '{"type":"agent_start"}'; while IFS= read -r line; do echo "$line"; done"#;

fn script(body: &str) -> ProcessConfig {
    ProcessConfig::new("sh").with_args(["-c", body])
}

fn supervisor(body: &str) -> (ProcessSupervisor, mpsc::UnboundedReceiver<TransportEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProcessSupervisor::new(script(body), tx), rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_spawn_and_echo() {
    let (supervisor, mut rx) = supervisor(ECHO_AGENT);
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert_eq!(supervisor.generation(), 0);

    supervisor.ensure_running().await.unwrap();
    assert_eq!(supervisor.state(), ProcessState::Starting);
    assert_eq!(supervisor.generation(), 1);
    assert!(supervisor.pid().await.is_some());

    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Line {
            generation: 1,
            line: r#"{"type":"agent_start"}"#.to_string()
        }
    );
    supervisor.mark_ready();
    assert_eq!(supervisor.state(), ProcessState::Ready);

    supervisor
        .write_line(r#"{"type":"get_state","id":"req-1"}"#)
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Line {
            generation: 1,
            line: r#"{"type":"get_state","id":"req-1"}"#.to_string()
        }
    );

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_ensure_running_reuses_live_process() {
    let (supervisor, _rx) = supervisor(ECHO_AGENT);
    supervisor.ensure_running().await.unwrap();
    let pid = supervisor.pid().await;

    supervisor.ensure_running().await.unwrap();
    assert_eq!(supervisor.generation(), 1);
    assert_eq!(supervisor.pid().await, pid);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_ensure_running_spawns_once() {
    let (supervisor, _rx) = supervisor(ECHO_AGENT);
    let (a, b) = tokio::join!(supervisor.ensure_running(), supervisor.ensure_running());
    a.unwrap();
    b.unwrap();
    assert_eq!(supervisor.generation(), 1);
    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_spawn_failure() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let supervisor = ProcessSupervisor::new(
        ProcessConfig::new("/nonexistent/indusagi-binary-for-tests"),
        tx,
    );

    let err = supervisor.ensure_running().await.unwrap_err();
    assert!(matches!(err, TransportError::Spawn { .. }));
    assert_eq!(supervisor.state(), ProcessState::Terminated);
}

#[tokio::test]
async fn test_write_without_process() {
    let (supervisor, _rx) = supervisor(ECHO_AGENT);
    let err = supervisor.write_line("{}").await.unwrap_err();
    assert!(matches!(err, TransportError::NotRunning));
}

#[tokio::test]
async fn test_exit_flushes_partial_line_then_reports_code() {
    let (supervisor, mut rx) = supervisor(r#"echo '{"n":1}'; printf 'tail'; exit 3"#);
    supervisor.ensure_running().await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Line {
            generation: 1,
            line: r#"{"n":1}"#.to_string()
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Line {
            generation: 1,
            line: "tail".to_string()
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Exited {
            generation: 1,
            code: Some(3)
        }
    );
    assert_eq!(supervisor.state(), ProcessState::Terminated);
    assert!(matches!(
        supervisor.write_line("{}").await,
        Err(TransportError::StdinClosed)
    ));
}

#[tokio::test]
async fn test_invalid_utf8_on_stderr_keeps_agent_alive() {
    let (supervisor, mut rx) = supervisor(
        r#"printf '\377\n' >&2; sleep 0.2; printf 'more\n' >&2; sleep 0.2; echo '{"type":"agent_start"}'; exit 0"#,
    );
    supervisor.ensure_running().await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Line {
            generation: 1,
            line: r#"{"type":"agent_start"}"#.to_string()
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Exited {
            generation: 1,
            code: Some(0)
        }
    );
}

#[tokio::test]
async fn test_respawn_after_exit_bumps_generation() {
    let (supervisor, mut rx) = supervisor("exit 0");
    supervisor.ensure_running().await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Exited {
            generation: 1,
            code: Some(0)
        }
    );

    supervisor.ensure_running().await.unwrap();
    assert_eq!(supervisor.generation(), 2);
    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Exited {
            generation: 2,
            code: Some(0)
        }
    );
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (supervisor, mut rx) = supervisor(ECHO_AGENT);
    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.state(), ProcessState::Stopped);

    supervisor.ensure_running().await.unwrap();
    let _agent_start = next_event(&mut rx).await;

    supervisor.stop().await.unwrap();
    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.state(), ProcessState::Stopped);
    assert!(matches!(
        supervisor.write_line("{}").await,
        Err(TransportError::NotRunning)
    ));

    // The exit is still reported, but the state stays Stopped.
    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Exited { generation: 1, .. }
    ));
    assert_eq!(supervisor.state(), ProcessState::Stopped);
}

#[tokio::test]
async fn test_state_watch_sees_transitions() {
    let (supervisor, mut rx) = supervisor(ECHO_AGENT);
    let mut states = supervisor.subscribe_state();

    supervisor.ensure_running().await.unwrap();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), ProcessState::Starting);

    let _agent_start = next_event(&mut rx).await;
    supervisor.mark_ready();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), ProcessState::Ready);

    // Only Starting moves to Ready.
    supervisor.mark_ready();
    assert!(!states.has_changed().unwrap());

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_env_is_forwarded() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let supervisor = ProcessSupervisor::new(
        script(r#"echo "$INDUSAGI_API_KEY""#).with_env("INDUSAGI_API_KEY", "sk-test"),
        tx,
    );
    supervisor.ensure_running().await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Line {
            generation: 1,
            line: "sk-test".to_string()
        }
    );
}
