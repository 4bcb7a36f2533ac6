use super::*;
use crate::config::ShutdownConfig;
use crate::error::{Result, ServiceError};
use crate::host::{RecordingHost, RecordingStatusHandle};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const FAST_TICK: Duration = Duration::from_millis(5);
const WAIT: Duration = Duration::from_secs(5);

fn shutdown_config(countdown_seconds: u32, prefer_pre_shutdown: bool) -> ShutdownConfig {
    ShutdownConfig {
        countdown_seconds,
        prefer_pre_shutdown,
    }
}

fn spawn_service(
    host: &Arc<RecordingHost>,
    config: ShutdownConfig,
    tick: Duration,
) -> thread::JoinHandle<Result<ShutdownOutcome>> {
    let host = Arc::clone(host);
    thread::spawn(move || {
        let sequencer = ShutdownSequencer::new(&config).with_tick(tick);
        run_service_with(host.as_ref(), "test-service", config, sequencer)
    })
}

fn running_controller(
    host: &RecordingHost,
    config: ShutdownConfig,
) -> Arc<LifecycleController<RecordingStatusHandle>> {
    let controller = LifecycleController::new(config);
    controller.register_with_host(host, "test-service").unwrap();
    controller.start().unwrap();
    controller
}

/// Countdown reports carry a non-zero checkpoint; the handler's announcement does not
fn countdown_reports(reports: &[StatusReport]) -> Vec<StatusReport> {
    reports
        .iter()
        .filter(|r| r.state == LifecycleState::StopPending && r.checkpoint > 0)
        .copied()
        .collect()
}

#[test]
fn test_stop_runs_full_countdown_in_real_time() {
    let host = Arc::new(RecordingHost::new());
    let service = spawn_service(&host, shutdown_config(3, false), Duration::from_secs(1));

    assert!(host.wait_for_state(LifecycleState::Running, WAIT));
    assert_eq!(host.deliver(ControlCode::Stop), Some(HandlerResult::Accepted));

    let outcome = service.join().unwrap().unwrap();
    assert_eq!(outcome.ticks, 3);
    assert_eq!(outcome.failed_reports, 0);
    assert!(!outcome.countdown_skipped);

    let reports = host.delivered_reports();
    assert_eq!(
        reports,
        vec![
            StatusReport::running(AcceptedControls {
                stop: true,
                shutdown: true,
                pre_shutdown: false,
            }),
            StatusReport::stop_pending(3000, 0),
            StatusReport::stop_pending(3000, 1),
            StatusReport::stop_pending(2000, 2),
            StatusReport::stop_pending(1000, 3),
            StatusReport::stopped(),
        ]
    );

    let recorded = host.reports();
    for pair in recorded[2..].windows(2) {
        let spacing = pair[1].at.duration_since(pair[0].at);
        assert!(
            spacing >= Duration::from_secs(1),
            "reports only {:?} apart",
            spacing
        );
    }
    assert_eq!(host.registered_name().as_deref(), Some("test-service"));
}

#[test]
fn test_countdown_shape_for_various_lengths() {
    for countdown in [0u32, 1, 2, 5] {
        let host = Arc::new(RecordingHost::new());
        let service = spawn_service(&host, shutdown_config(countdown, false), FAST_TICK);

        assert!(host.wait_for_state(LifecycleState::Running, WAIT));
        host.deliver(ControlCode::Stop);
        let outcome = service.join().unwrap().unwrap();
        assert_eq!(outcome.ticks, countdown);

        let reports = host.delivered_reports();
        let ticks = countdown_reports(&reports);
        assert_eq!(ticks.len(), countdown as usize);

        for (i, report) in ticks.iter().enumerate() {
            let i = i as u32;
            assert_eq!(report.wait_hint_millis, (countdown - i) * 1000);
            assert_eq!(report.checkpoint, i + 1);
            assert!(report.accepted_controls.is_empty());
        }

        let stopped: Vec<_> = reports
            .iter()
            .filter(|r| r.state == LifecycleState::Stopped)
            .collect();
        assert_eq!(stopped.len(), 1);
        assert_eq!(reports.last(), Some(&StatusReport::stopped()));
    }
}

#[test]
fn test_zero_countdown_goes_straight_to_stopped() {
    let host = Arc::new(RecordingHost::new());
    let service = spawn_service(&host, shutdown_config(0, false), Duration::from_secs(1));

    assert!(host.wait_for_state(LifecycleState::Running, WAIT));
    host.deliver(ControlCode::Shutdown);
    let outcome = service.join().unwrap().unwrap();

    assert_eq!(outcome.ticks, 0);
    let reports = host.delivered_reports();
    assert!(countdown_reports(&reports).is_empty());
    assert_eq!(reports.last(), Some(&StatusReport::stopped()));
    assert_eq!(
        reports
            .iter()
            .filter(|r| r.state == LifecycleState::Stopped)
            .count(),
        1
    );
}

#[test]
fn test_concurrent_stop_requests_start_one_countdown() {
    let host = Arc::new(RecordingHost::new());
    let service = spawn_service(&host, shutdown_config(2, false), FAST_TICK);
    assert!(host.wait_for_state(LifecycleState::Running, WAIT));

    let codes = [
        ControlCode::Stop,
        ControlCode::Shutdown,
        ControlCode::PreShutdown,
        ControlCode::Stop,
        ControlCode::Shutdown,
        ControlCode::Stop,
    ];
    let barrier = Arc::new(Barrier::new(codes.len()));
    let senders: Vec<_> = codes
        .iter()
        .map(|&code| {
            let host = Arc::clone(&host);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                host.deliver(code)
            })
        })
        .collect();

    for sender in senders {
        assert_eq!(sender.join().unwrap(), Some(HandlerResult::Accepted));
    }
    service.join().unwrap().unwrap();

    let reports = host.delivered_reports();
    let announcements = reports
        .iter()
        .filter(|r| r.state == LifecycleState::StopPending && r.checkpoint == 0)
        .count();
    assert_eq!(announcements, 1);
    assert_eq!(countdown_reports(&reports).len(), 2);
    assert_eq!(
        reports.iter().filter(|r| r.checkpoint == 1).count(),
        1,
        "a second countdown was started"
    );
}

#[test]
fn test_interrogate_has_no_side_effects() {
    let host = RecordingHost::new();

    let controller: Arc<LifecycleController<RecordingStatusHandle>> =
        LifecycleController::new(shutdown_config(3, false));
    controller.register_with_host(&host, "test-service").unwrap();
    assert_eq!(host.deliver(ControlCode::Interrogate), Some(HandlerResult::Accepted));
    assert_eq!(controller.state(), LifecycleState::Starting);

    controller.start().unwrap();
    let before = host.reports().len();
    assert_eq!(host.deliver(ControlCode::Interrogate), Some(HandlerResult::Accepted));
    assert_eq!(controller.state(), LifecycleState::Running);
    assert!(!controller.is_stop_requested());
    assert_eq!(host.reports().len(), before);

    host.deliver(ControlCode::Stop);
    assert_eq!(host.deliver(ControlCode::Interrogate), Some(HandlerResult::Accepted));
    assert_eq!(controller.state(), LifecycleState::StopPending);
}

#[test]
fn test_unknown_control_is_not_implemented() {
    let host = RecordingHost::new();
    let controller = running_controller(&host, shutdown_config(3, false));
    let before = host.reports().len();

    for raw in [0x2, 0x3, 0x80, 0xff] {
        assert_eq!(
            host.deliver(ControlCode::Unknown(raw)),
            Some(HandlerResult::NotImplemented)
        );
    }

    assert_eq!(controller.state(), LifecycleState::Running);
    assert!(!controller.is_stop_requested());
    assert_eq!(host.reports().len(), before);
}

#[test]
fn test_failed_stop_pending_report_leaves_latch_unset() {
    let host = RecordingHost::new();
    let controller = running_controller(&host, shutdown_config(3, false));

    host.fail_reports_in(LifecycleState::StopPending);
    assert_eq!(host.deliver(ControlCode::Stop), Some(HandlerResult::NotImplemented));
    assert!(!controller.is_stop_requested());
    assert_eq!(controller.state(), LifecycleState::Running);

    host.clear_failures();
    assert_eq!(host.deliver(ControlCode::Stop), Some(HandlerResult::Accepted));
    assert!(controller.is_stop_requested());
    assert_eq!(controller.state(), LifecycleState::StopPending);
}

#[test]
fn test_stop_before_running_is_refused() {
    let host = RecordingHost::new();
    let controller: Arc<LifecycleController<RecordingStatusHandle>> =
        LifecycleController::new(shutdown_config(3, false));
    controller.register_with_host(&host, "test-service").unwrap();

    assert_eq!(host.deliver(ControlCode::Stop), Some(HandlerResult::NotImplemented));
    assert!(!controller.is_stop_requested());
    assert!(host.reports().is_empty());
}

#[test]
fn test_pre_shutdown_preference() {
    let host = Arc::new(RecordingHost::new());
    let service = spawn_service(&host, shutdown_config(1, true), FAST_TICK);
    assert!(host.wait_for_state(LifecycleState::Running, WAIT));

    let running = host.delivered_reports()[0];
    assert_eq!(
        running.accepted_controls,
        AcceptedControls {
            stop: true,
            shutdown: false,
            pre_shutdown: true,
        }
    );

    // Shutdown is still stop-class even though it was not advertised
    assert!(!running.accepted_controls.contains(ControlCode::Shutdown));
    assert_eq!(host.deliver(ControlCode::Shutdown), Some(HandlerResult::Accepted));
    service.join().unwrap().unwrap();

    let reports = host.delivered_reports();
    assert_eq!(countdown_reports(&reports), vec![StatusReport::stop_pending(1000, 1)]);
    assert_eq!(reports.last(), Some(&StatusReport::stopped()));
}

#[test]
fn test_countdown_report_failure_is_not_fatal() {
    let host = Arc::new(RecordingHost::new());
    // attempts: 0 Running, 1 announcement, 2..=4 countdown, 5 Stopped
    host.fail_report_attempt(3);
    let service = spawn_service(&host, shutdown_config(3, false), FAST_TICK);

    assert!(host.wait_for_state(LifecycleState::Running, WAIT));
    host.deliver(ControlCode::Stop);
    let outcome = service.join().unwrap().unwrap();

    assert_eq!(outcome.ticks, 3);
    assert_eq!(outcome.failed_reports, 1);

    let recorded = host.reports();
    assert_eq!(recorded.len(), 6);
    assert!(!recorded[3].delivered);
    let checkpoints: Vec<u32> = recorded[2..5].iter().map(|r| r.report.checkpoint).collect();
    assert_eq!(checkpoints, vec![1, 2, 3]);
    assert_eq!(host.delivered_reports().last(), Some(&StatusReport::stopped()));
}

#[test]
fn test_terminal_report_failure_is_counted() {
    let host = Arc::new(RecordingHost::new());
    host.fail_reports_in(LifecycleState::Stopped);
    let service = spawn_service(&host, shutdown_config(1, false), FAST_TICK);

    assert!(host.wait_for_state(LifecycleState::Running, WAIT));
    host.deliver(ControlCode::Stop);
    let outcome = service.join().unwrap().unwrap();

    assert_eq!(outcome.failed_reports, 1);
    let last = host.reports().last().copied().unwrap();
    assert_eq!(last.report, StatusReport::stopped());
    assert!(!last.delivered);
}

#[test]
fn test_lost_channel_skips_countdown() {
    let host = Arc::new(RecordingHost::new());
    let service = spawn_service(&host, shutdown_config(5, false), Duration::from_secs(1));

    assert!(host.wait_for_state(LifecycleState::Running, WAIT));
    assert!(host.drop_channel("notifier exited"));
    let outcome = service.join().unwrap().unwrap();

    assert!(outcome.countdown_skipped);
    assert_eq!(outcome.ticks, 0);
    let reports = host.delivered_reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1], StatusReport::stopped());
}

#[test]
fn test_registration_failure_is_fatal() {
    let host = RecordingHost::new();
    host.refuse_registration();

    let config = shutdown_config(3, false);
    let result = run_service_with(&host, "test-service", config, ShutdownSequencer::new(&config));

    match result {
        Err(ServiceError::Registration { code, .. }) => assert!(code.is_some()),
        other => panic!("expected registration failure, got {:?}", other),
    }
    assert!(host.reports().is_empty());
    assert_eq!(host.deliver(ControlCode::Stop), None);
}

#[test]
fn test_running_report_failure_ends_the_run() {
    let host = RecordingHost::new();
    host.fail_reports_in(LifecycleState::Running);

    let config = shutdown_config(3, false);
    let result = run_service_with(&host, "test-service", config, ShutdownSequencer::new(&config));

    assert!(matches!(result, Err(ServiceError::Report { .. })));
    assert_eq!(host.delivered_reports(), vec![StatusReport::stopped()]);
}

#[test]
fn test_double_registration_is_rejected() {
    let host = RecordingHost::new();
    let controller: Arc<LifecycleController<RecordingStatusHandle>> =
        LifecycleController::new(shutdown_config(3, false));

    controller.register_with_host(&host, "test-service").unwrap();
    assert!(controller.register_with_host(&host, "test-service").is_err());
}
