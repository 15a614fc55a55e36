//! End-to-end scenarios against the synthetic capture/converter stand-ins
//! (spec.md §8). These exercise the supervisor's public surface the way a
//! host application would, without any real GPU or platform capture API.

use std::sync::Arc;
use std::time::Duration;

use replay_core::capture::{PassthroughConverter, SyntheticCaptureAdapter};
use replay_core::mux::Mp4Muxer;
use replay_core::supervisor::{Supervisor, SupervisorState};
use replay_core::types::config::ReplayConfig;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn baseline_capture_then_save() {
    init_logging();
    let supervisor = Supervisor::new(Arc::new(Mp4Muxer::new()));
    let adapter = Box::new(SyntheticCaptureAdapter::new(320, 240));
    let converter = Box::new(PassthroughConverter::new());

    let mut config = ReplayConfig::default();
    config.replay_fps = 30;
    config.replay_duration_seconds = 5;

    supervisor
        .start(config, adapter, converter)
        .expect("start should succeed");
    assert_eq!(supervisor.state(), SupervisorState::Capturing);

    std::thread::sleep(Duration::from_millis(500));

    let tmp_dir = std::env::temp_dir();
    let out_path = tmp_dir.join("replay-core-baseline-test.mp4");
    let _ = std::fs::remove_file(&out_path);

    let save_result = supervisor.save(out_path.clone());
    assert!(save_result.is_ok(), "save should succeed once frames are buffered: {save_result:?}");

    supervisor.stop().expect("stop should succeed");
    assert_eq!(supervisor.state(), SupervisorState::Uninitialized);

    let _ = std::fs::remove_file(&out_path);
}

#[test]
fn save_rejected_before_capturing_starts() {
    init_logging();
    let supervisor = Supervisor::new(Arc::new(Mp4Muxer::new()));
    let result = supervisor.save(std::env::temp_dir().join("should-not-exist.mp4"));
    assert!(result.is_err(), "save before start() must be rejected");
}

#[test]
fn capture_recovers_from_transient_access_loss() {
    init_logging();
    let supervisor = Supervisor::new(Arc::new(Mp4Muxer::new()));
    let adapter = Box::new(SyntheticCaptureAdapter::new(320, 240).with_fail_after(10));
    let converter = Box::new(PassthroughConverter::new());

    let mut config = ReplayConfig::default();
    config.replay_fps = 60;
    config.replay_duration_seconds = 5;

    supervisor
        .start(config, adapter, converter)
        .expect("start should succeed");

    std::thread::sleep(Duration::from_millis(500));

    // A single access-loss event should be recovered (reinit succeeds
    // immediately for the synthetic adapter), leaving the supervisor
    // capturing rather than stuck in Error.
    assert_eq!(supervisor.state(), SupervisorState::Capturing);

    supervisor.stop().expect("stop should succeed");
}

#[test]
fn repeated_start_without_stop_is_rejected() {
    init_logging();
    let supervisor = Supervisor::new(Arc::new(Mp4Muxer::new()));
    let adapter = Box::new(SyntheticCaptureAdapter::new(320, 240));
    let converter = Box::new(PassthroughConverter::new());

    let config = ReplayConfig {
        replay_fps: 30,
        replay_duration_seconds: 5,
        ..ReplayConfig::default()
    };
    supervisor
        .start(config.clone(), adapter, converter)
        .expect("first start should succeed");

    let adapter2 = Box::new(SyntheticCaptureAdapter::new(320, 240));
    let converter2 = Box::new(PassthroughConverter::new());
    let second = supervisor.start(config, adapter2, converter2);
    assert!(second.is_err(), "starting twice without an intervening stop must fail");

    supervisor.stop().expect("stop should succeed");
}
