// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
mod common;

use std::cell::Cell;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::{Duration, Instant};

use common::*;
use contact_tracker::input::{SourceKind, SourceSpec};
use contact_tracker::pipeline::{Control, Phase, SessionError, ThresholdKind, TickOutcome};
use contact_tracker::recorder::{Recorder, HEADER};

fn tick_n(h: &mut Harness, n: usize) -> Vec<TickOutcome> {
    (0..n).map(|_| h.session.on_tick()).collect()
}

#[test]
fn test_ten_frame_scenario() {
    let mut h = harness(10, &SCENARIO_HITS);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();

    let outcomes = tick_n(&mut h, 10);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, TickOutcome::Presented { .. })));

    let series = h.session.series();
    let frames: Vec<u64> = series.samples().iter().map(|s| s.frame_index).collect();
    assert_eq!(frames, vec![3, 5, 8]);
    assert_eq!(series.display_range_x(), Some((325.0, 725.0)));
    assert_eq!(h.probe.series_updates.get(), 3);
    assert_eq!(h.probe.predict_calls.get(), 10);
}

#[test]
fn test_loads_never_overlap_handles() {
    let mut h = harness(10, &[]);
    h.session.load(video()).unwrap();
    h.session.load(video()).unwrap();
    h.session.load(SourceSpec::Camera(0)).unwrap();
    assert_eq!(h.probe.opened.get(), 3);
    assert_eq!(h.probe.max_live.get(), 1);
    assert_eq!(h.probe.live.get(), 1);

    h.session.stop();
    assert_eq!(h.probe.live.get(), 0);
}

#[test]
fn test_recorder_lifecycle() {
    let mut h = harness(10, &SCENARIO_HITS);
    h.session.load(video()).unwrap();
    assert!(!h.session.state().is_recording);

    h.session.start_detect().unwrap();
    assert!(h.session.state().is_recording);
    let path = h.session.recorder_path().unwrap().to_path_buf();
    tick_n(&mut h, 6);
    // detection paused: frame 8 is not recorded
    h.session.pause_detect();
    tick_n(&mut h, 3);
    assert!(h.session.state().is_recording);

    h.session.stop();
    assert!(!h.session.state().is_recording);
    assert!(h.session.recorder_path().is_none());
    h.session.stop();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        format!("{}\n3,150.00,200.00\n5,160.00,205.00\n", HEADER)
    );
    assert_eq!(h.record_files(), vec![path]);
}

#[test]
fn test_recorder_create_failure_keeps_detecting() {
    let mut h = harness(10, &SCENARIO_HITS);
    std::fs::write(h.record_dir(), "not a directory").unwrap();
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();

    assert!(!h.session.state().is_recording);
    assert_eq!(h.session.phase(), Phase::Detecting);
    tick_n(&mut h, 10);
    assert_eq!(h.session.series().len(), 3);
    assert_eq!(h.probe.series_updates.get(), 3);
    assert!(!h.session.state().is_recording);
}

#[test]
fn test_recorder_write_failure_keeps_tracking() {
    let mut h = harness(10, &SCENARIO_HITS);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();
    let attempts = Rc::new(Cell::new(0));
    let sink = FlakySink {
        ok_writes: 1,
        attempts: attempts.clone(),
    };
    // header goes through, every row after it fails
    h.session
        .attach_recorder(Recorder::from_writer("flaky.csv", sink).unwrap())
        .unwrap();
    assert_eq!(attempts.get(), 1);

    let outcomes = tick_n(&mut h, 10);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, TickOutcome::Presented { .. })));
    assert_eq!(attempts.get(), 4);
    assert_eq!(h.session.series().len(), 3);
    assert!(h.session.state().is_recording);
    assert_eq!(h.session.recorder_path(), Some(std::path::Path::new("flaky.csv")));
}

#[test]
fn test_attach_recorder_needs_source() {
    let mut h = harness(10, &[]);
    let recorder = Recorder::from_writer("sink.csv", Vec::new()).unwrap();
    assert!(matches!(
        h.session.attach_recorder(recorder),
        Err(SessionError::NoSource)
    ));
}

#[test]
fn test_end_of_stream_stops_session() {
    let mut h = harness(10, &SCENARIO_HITS);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();
    tick_n(&mut h, 10);
    assert_eq!(h.probe.reads.get(), 10);

    assert_eq!(h.session.on_tick(), TickOutcome::Exhausted);
    assert_eq!(h.session.phase(), Phase::Idle);
    assert_eq!(h.probe.live.get(), 0);
    assert_eq!(h.probe.clears.get(), 1);

    assert_eq!(h.session.on_tick(), TickOutcome::Inactive);
    assert_eq!(h.session.run_due(Instant::now() + Duration::from_secs(1)), None);
    assert_eq!(h.probe.reads.get(), 10);
    // stop keeps the series
    assert_eq!(h.session.series().len(), 3);
}

#[test]
fn test_image_runs_one_shot_detection() {
    let mut h = harness(10, &[(1, (4.0, 4.0))]);
    h.session.load(image()).unwrap();
    assert_eq!(h.session.phase(), Phase::Loaded);
    assert_eq!(h.session.state().source_kind, Some(SourceKind::Image));
    assert_eq!(*h.probe.shown.borrow(), vec![(1, false)]);
    assert!(!h.session.is_ticking());

    h.session.start_detect().unwrap();
    assert_eq!(h.session.phase(), Phase::Detecting);
    assert_eq!(*h.probe.shown.borrow(), vec![(1, false), (1, true)]);
    assert_eq!(h.probe.predict_calls.get(), 1);
    assert!(h.session.series().is_empty());

    assert_eq!(h.session.on_tick(), TickOutcome::Inactive);
    h.session.play();
    assert!(!h.session.state().is_playing);
    assert_eq!(h.probe.predict_calls.get(), 1);
}

#[test]
fn test_play_pause_idempotent() {
    let mut h = harness(10, &[]);
    h.session.load(video()).unwrap();
    assert_eq!(h.session.phase(), Phase::Playing);

    h.session.pause();
    h.session.pause();
    assert_eq!(h.session.phase(), Phase::Loaded);
    assert_eq!(h.session.on_tick(), TickOutcome::Inactive);

    h.session.play();
    h.session.play();
    assert!(h.session.is_ticking());
    assert!(matches!(
        h.session.on_tick(),
        TickOutcome::Presented { frame_index: 1, sample: None }
    ));

    h.session.toggle_play();
    assert!(!h.session.state().is_playing);
    h.session.toggle_play();
    assert!(h.session.state().is_playing);
}

#[test]
fn test_pause_detect_keeps_playback() {
    let mut h = harness(10, &SCENARIO_HITS);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();
    h.session.pause_detect();
    assert_eq!(h.session.phase(), Phase::Playing);

    let outcomes = tick_n(&mut h, 5);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, TickOutcome::Presented { sample: None, .. })));
    assert!(h.probe.shown.borrow().iter().all(|(_, annotated)| !annotated));
    assert!(h.session.recorder_path().is_some());

    h.session.start_detect().unwrap();
    assert_eq!(h.record_files().len(), 1);
}

#[test]
fn test_threshold_validation_and_immediate_effect() {
    let mut h = harness(10, &[]);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();

    assert!(matches!(
        h.session.set_conf(1.5),
        Err(SessionError::ThresholdOutOfRange(_))
    ));
    assert!(h.session.set_iou(-0.1).is_err());
    assert_eq!(h.session.state().conf_thres, 0.25);
    assert_eq!(h.session.state().iou_thres, 0.45);

    h.session.on_tick();
    h.session.set_conf(0.6).unwrap();
    h.session.set_iou(0.3).unwrap();
    h.session.on_tick();

    let seen = h.probe.thresholds_seen.borrow();
    assert_eq!(seen[0].conf(), 0.25);
    assert_eq!(seen[1].conf(), 0.6);
    assert_eq!(seen[1].iou(), 0.3);
}

#[test]
fn test_threshold_debounce_fires_once() {
    let mut h = harness(10, &[]);
    h.session.set_conf(0.3).unwrap();
    h.session.set_conf(0.4).unwrap();
    h.session.set_conf(0.5).unwrap();
    assert_eq!(h.session.state().conf_thres, 0.5);

    assert!(h.session.fire_debounced(Instant::now()).is_empty());
    let later = Instant::now() + Duration::from_millis(600);
    let fired = h.session.fire_debounced(later);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, ThresholdKind::Conf);
    assert_eq!(fired[0].value, 0.5);
    assert!(h.session.fire_debounced(later).is_empty());
}

#[test]
fn test_inference_error_skips_frame() {
    let mut h = harness_with(10, &SCENARIO_HITS, &[5]);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();

    let outcomes = tick_n(&mut h, 10);
    assert_eq!(
        outcomes[4],
        TickOutcome::Presented {
            frame_index: 5,
            sample: None
        }
    );
    assert_eq!(h.session.phase(), Phase::Detecting);
    let frames: Vec<u64> = h.session.series().samples().iter().map(|s| s.frame_index).collect();
    assert_eq!(frames, vec![3, 8]);
    assert_eq!(h.probe.shown.borrow()[4], (5, false));
}

#[test]
fn test_open_failure_leaves_session_idle() {
    let mut h = harness(10, &[]);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();

    let err = h.session.load(SourceSpec::Camera(MISSING_CAMERA)).unwrap_err();
    assert!(matches!(err, SessionError::Open(_)));
    assert_eq!(h.session.phase(), Phase::Idle);
    assert_eq!(h.session.state().source_kind, None);
    assert!(!h.session.state().is_recording);
    assert_eq!(h.probe.live.get(), 0);
    assert_eq!(h.probe.errors.borrow().len(), 1);

    assert!(matches!(
        h.session.start_detect(),
        Err(SessionError::NoSource)
    ));
}

#[test]
fn test_load_clears_series() {
    let mut h = harness(10, &SCENARIO_HITS);
    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();
    tick_n(&mut h, 5);
    h.session.stop();
    assert_eq!(h.session.series().len(), 2);

    h.session.load(video()).unwrap();
    assert!(h.session.series().is_empty());
    assert!(!h.session.state().is_detecting);
}

#[test]
fn test_run_due_follows_interval() {
    let mut h = harness(10, &[]);
    h.session.load(video()).unwrap();
    let t = Instant::now();
    assert!(h.session.run_due(t).is_some());
    assert!(h.session.run_due(t).is_none());
    assert!(h.session.next_tick_in(t).is_some());
    assert!(h.session.run_due(t + Duration::from_millis(30)).is_some());

    h.session.pause();
    assert!(h.session.run_due(t + Duration::from_secs(1)).is_none());
    assert_eq!(h.session.next_tick_in(t), None);
}

#[test]
fn test_save_result() {
    let mut h = harness(10, &SCENARIO_HITS);
    assert!(matches!(
        h.session.save_result(),
        Err(SessionError::NothingToSave)
    ));

    h.session.load(video()).unwrap();
    h.session.start_detect().unwrap();
    tick_n(&mut h, 3);
    let path = h.session.save_result().unwrap();
    assert!(path.starts_with(h.results_dir()));
    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.get_pixel(0, 0)[0], 3);
    assert_eq!(*saved.get_pixel(1, 1), ANNOTATION_MARK);

    let second = h.session.save_result().unwrap();
    assert_ne!(path, second);
}

#[test]
fn test_save_result_reports_io_error() {
    let mut h = harness(10, &[]);
    h.session.load(video()).unwrap();
    h.session.on_tick();
    std::fs::write(h.results_dir(), "not a directory").unwrap();
    assert!(matches!(
        h.session.save_result(),
        Err(SessionError::Io(_))
    ));
}

#[test]
fn test_controls_map_to_operations() {
    let mut h = harness(10, &SCENARIO_HITS);
    let flow = |r: Result<ControlFlow<()>, SessionError>| r.unwrap();

    assert_eq!(
        flow(h.session.apply(Control::OpenCamera(1))),
        ControlFlow::Continue(())
    );
    assert_eq!(h.session.state().source_kind, Some(SourceKind::Camera));
    flow(h.session.apply(Control::StartDetect));
    flow(h.session.apply(Control::SetConf(0.7)));
    assert_eq!(h.session.thresholds().conf(), 0.7);
    flow(h.session.apply(Control::TogglePlay));
    assert_eq!(h.session.phase(), Phase::Detecting);
    assert!(!h.session.state().is_playing);

    assert!(h.session.apply(Control::SetIou(2.0)).is_err());
    assert_eq!(
        flow(h.session.apply(Control::Quit)),
        ControlFlow::Break(())
    );
    assert_eq!(h.session.phase(), Phase::Idle);
}

#[test]
fn test_drop_releases_source_and_recorder() {
    let h = harness(10, &[]);
    let probe = h.probe.clone();
    let Harness {
        mut session, dir, ..
    } = h;
    session.load(video()).unwrap();
    session.start_detect().unwrap();
    let path = session.recorder_path().unwrap().to_path_buf();
    drop(session);

    assert_eq!(probe.live.get(), 0);
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        format!("{}\n", HEADER)
    );
    drop(dir);
}
