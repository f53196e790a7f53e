mod common;

use std::{
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use common::{FakeImage, CallLog};
use pixledit::{
    core::ledger::LedgerResponse,
    core::versions::Resolution,
    engine::{
        raster::{MAX_RADIUS, RasterImage},
        traits::EngineError,
    },
    op::{HistoryEntry, OpValue, OperationKind},
    render::{RenderError, handoff::materialize, scratch::ScratchBuffer, surface::DisplaySurface},
    session::{
        gate::OperationGate,
        image::{EditError, EditOutcome, ImageSession, UndoOutcome, ViewState},
        registry::{OpenKind, SessionRegistry},
    },
    types::PixelFormat,
};

fn fake_session(log: &Arc<CallLog>) -> ImageSession<FakeImage> {
    ImageSession::open(
        1,
        "fake.png",
        FakeImage::new(3, 2, log),
        Arc::new(ScratchBuffer::new()),
        PixelFormat::Rgba8,
    )
    .expect("open")
}

fn entry(kind: OperationKind, value: OpValue) -> HistoryEntry {
    HistoryEntry { kind, value }
}

#[test_log::test]
fn repeated_slider_edits_undo_one_step_at_a_time() {
    let log = CallLog::new();
    let session = fake_session(&log);
    assert_eq!((session.generation_count(), session.history_len()), (1, 0));

    session
        .apply_edit(OperationKind::Brighten, Some(OpValue::Scalar(10.0)))
        .unwrap();
    session
        .apply_edit(OperationKind::Brighten, Some(OpValue::Scalar(20.0)))
        .unwrap();
    assert_eq!(
        session.history(),
        vec![
            entry(OperationKind::Brighten, OpValue::Scalar(10.0)),
            entry(OperationKind::Brighten, OpValue::Scalar(20.0)),
        ]
    );
    assert_eq!(session.generation_count(), 3);

    let undone = session.undo_last().unwrap();
    assert!(matches!(
        undone,
        UndoOutcome::Undone {
            kind: OperationKind::Brighten,
            ..
        }
    ));
    assert_eq!(session.generation_count(), 2);
    assert_eq!(
        session.history(),
        vec![entry(OperationKind::Brighten, OpValue::Scalar(10.0))]
    );
    assert_eq!(session.filter_values().brightness, 10.0);

    session.undo_last().unwrap();
    assert_eq!(session.filter_values().brightness, 0.0);
    assert!(!session.busy());
}

#[test]
fn flip_is_undone_by_flipping_again() {
    let log = CallLog::new();
    let session = fake_session(&log);
    let original = session.with_current(|g| g.pixels().to_vec());

    let outcome = session.apply_edit(OperationKind::VerticalFlip, None).unwrap();
    assert!(matches!(
        outcome,
        EditOutcome::Applied {
            response: LedgerResponse::NewOperation,
            resolution: Resolution::InPlace,
            ..
        }
    ));
    assert_eq!(session.generation_count(), 1);
    assert_eq!(session.history_len(), 1);

    session.undo_last().unwrap();
    assert_eq!(log.count("vertical_flip"), 2);
    assert_eq!(session.history_len(), 0);
    assert_eq!(session.generation_count(), 1);
    assert_eq!(session.with_current(|g| g.pixels().to_vec()), original);
}

#[test]
fn every_geometric_edit_applied_twice_is_pixel_identical() {
    for kind in [
        OperationKind::VerticalFlip,
        OperationKind::HorizontalFlip,
        OperationKind::Transpose,
        OperationKind::Rotate180,
    ] {
        let log = CallLog::new();
        let session = fake_session(&log);
        let before = session.surface().snapshot();

        session.apply_edit(kind, None).unwrap();
        session.apply_edit(kind, None).unwrap();

        assert_eq!(session.surface().snapshot(), before, "{kind}");
        assert_eq!(session.generation_count(), 1, "{kind}");
        assert_eq!(session.history_len(), 2, "{kind}");
    }
}

#[test]
fn transpose_reallocates_the_surface() {
    let log = CallLog::new();
    let session = fake_session(&log);
    assert_eq!(session.surface().read(|f| (f.width(), f.height())), (3, 2));

    session.apply_edit(OperationKind::Transpose, None).unwrap();
    assert_eq!(session.surface().read(|f| (f.width(), f.height())), (2, 3));
}

#[test]
fn size_mismatch_aborts_without_touching_the_surface() {
    let log = CallLog::new();
    let session = fake_session(&log);
    let before = session.surface().snapshot();
    let version = session.surface().version();

    log.skew_size(4);
    let err = session
        .apply_edit(OperationKind::Brighten, Some(OpValue::Scalar(10.0)))
        .unwrap_err();
    assert!(matches!(
        err,
        EditError::Render(RenderError::SizeMismatch { .. })
    ));

    assert_eq!(session.surface().snapshot(), before);
    assert_eq!(session.surface().version(), version);
    assert_eq!(session.generation_count(), 1);
    assert_eq!(session.history_len(), 0);
    assert_eq!(session.filter_values().brightness, 0.0);
}

#[test]
fn materialize_rejects_a_lying_generation() {
    let log = CallLog::new();
    let scratch = ScratchBuffer::new();
    let surface = DisplaySurface::new(PixelFormat::Rgba8);
    let mut good = FakeImage::new(4, 4, &log);
    assert_eq!(materialize(&mut good, &scratch, &surface).unwrap(), 1);
    let before = surface.snapshot();

    log.skew_size(1);
    let mut liar = FakeImage::new(8, 8, &log);
    assert!(matches!(
        materialize(&mut liar, &scratch, &surface),
        Err(RenderError::SizeMismatch {
            expected: 256,
            actual: 257
        })
    ));
    assert_eq!(surface.snapshot(), before);
    assert_eq!(surface.version(), 1);
    assert_eq!(scratch.capacity(), 64);
}

#[test]
fn engine_failure_rolls_back_the_fork() {
    let log = CallLog::new();
    let session = fake_session(&log);
    log.fail_on(Some("median_blur"));

    let err = session
        .apply_edit(OperationKind::MedianBlur, Some(OpValue::Radius(2)))
        .unwrap_err();
    assert!(matches!(err, EditError::Engine(_)));
    assert_eq!(session.generation_count(), 1);
    assert_eq!(session.history_len(), 0);
    assert_eq!(log.released(), 1);

    log.fail_on(None);
    session
        .apply_edit(OperationKind::MedianBlur, Some(OpValue::Radius(2)))
        .unwrap();
    assert_eq!(session.filter_values().median_blur, 2);
}

#[test]
fn failed_in_place_flip_is_reverted() {
    let log = CallLog::new();
    let session = fake_session(&log);
    let original = session.with_current(|g| g.pixels().to_vec());

    log.skew_size(4);
    assert!(session.apply_edit(OperationKind::HorizontalFlip, None).is_err());
    assert_eq!(log.count("horizontal_flip"), 2);
    assert_eq!(session.with_current(|g| g.pixels().to_vec()), original);
    assert_eq!(session.history_len(), 0);
}

#[test]
fn contract_errors_leave_the_session_alone() {
    let log = CallLog::new();
    let session = fake_session(&log);

    let err = session.apply_edit(OperationKind::Levels, None).unwrap_err();
    assert!(matches!(err, EditError::Contract(_)));
    assert!(log.calls().is_empty());
    assert_eq!(session.generation_count(), 1);
}

#[test]
fn tiny_slider_moves_are_ignored() {
    let log = CallLog::new();
    let session = fake_session(&log);

    let outcome = session
        .apply_edit(OperationKind::Contrast, Some(OpValue::Scalar(0.002)))
        .unwrap();
    assert_eq!(outcome, EditOutcome::Unchanged);
    assert_eq!(session.history_len(), 0);
    assert_eq!(session.generation_count(), 1);
    assert_eq!(log.count("contrast"), 0);
}

#[test]
fn untracked_edits_mutate_in_place_without_history() {
    let log = CallLog::new();
    let session = fake_session(&log);

    let outcome = session
        .apply_untracked(OperationKind::Brighten, Some(OpValue::Scalar(10.0)))
        .unwrap();
    assert!(matches!(
        outcome,
        EditOutcome::Applied {
            response: LedgerResponse::Dummy,
            resolution: Resolution::InPlace,
            ..
        }
    ));
    assert_eq!(session.history_len(), 0);
    assert_eq!(session.generation_count(), 1);
    assert_eq!(session.filter_values().brightness, 0.0);
}

#[test]
fn undo_with_empty_history_is_a_no_op() {
    let log = CallLog::new();
    let session = fake_session(&log);
    let version = session.surface().version();

    assert_eq!(session.undo_last().unwrap(), UndoOutcome::NothingToUndo);
    assert_eq!(session.surface().version(), version);
}

#[test]
fn undoing_everything_restores_the_original_raster() {
    let pixels: Vec<u8> = (0..4 * 4 * 4).map(|i| (i * 7 % 256) as u8).collect();
    let image = RasterImage::from_rgba8(4, 4, pixels.clone()).unwrap();
    let session = ImageSession::open(
        1,
        "raster.png",
        image,
        Arc::new(ScratchBuffer::new()),
        PixelFormat::Rgba8,
    )
    .unwrap();

    session
        .apply_edit(OperationKind::Brighten, Some(OpValue::Scalar(25.0)))
        .unwrap();
    session.apply_edit(OperationKind::Rotate180, None).unwrap();
    session
        .apply_edit(OperationKind::GaussianBlur, Some(OpValue::Radius(1)))
        .unwrap();
    session.apply_edit(OperationKind::Edges, None).unwrap();
    assert_ne!(session.surface().read(|f| f.pixels().to_vec()), pixels);

    while session.undo_last().unwrap() != UndoOutcome::NothingToUndo {}

    assert_eq!(session.generation_count(), 1);
    assert_eq!(session.surface().read(|f| f.pixels().to_vec()), pixels);
}

#[test]
fn reopening_a_path_resets_history_but_keeps_the_view() {
    let log = CallLog::new();
    let mut registry = SessionRegistry::new(PixelFormat::Rgba8);

    let (session, kind) = registry.open("a.png", FakeImage::new(2, 2, &log)).unwrap();
    assert_eq!(kind, OpenKind::Created);
    let view = ViewState {
        zoom: 2.5,
        offset_x: 10.0,
        offset_y: -4.0,
    };
    session.set_view(view);
    session
        .apply_edit(OperationKind::Exposure, Some(OpValue::Scalar(0.5)))
        .unwrap();

    let (again, kind) = registry.open("a.png", FakeImage::new(2, 2, &log)).unwrap();
    assert_eq!(kind, OpenKind::Reset);
    assert_eq!(again.id(), session.id());
    assert_eq!(again.history_len(), 0);
    assert_eq!(again.generation_count(), 1);
    assert_eq!(again.filter_values().exposure, 0.0);
    assert_eq!(again.view(), view);
    assert_eq!(registry.len(), 1);
    assert_eq!(log.released(), 2);
}

#[test]
fn closing_the_active_tab_moves_to_the_previous_one() {
    let log = CallLog::new();
    let mut registry = SessionRegistry::new(PixelFormat::Rgba8);
    let a = registry.open("a.png", FakeImage::new(1, 1, &log)).unwrap().0.id();
    let b = registry.open("b.png", FakeImage::new(1, 1, &log)).unwrap().0.id();
    let c = registry.open("c.png", FakeImage::new(1, 1, &log)).unwrap().0.id();
    assert_eq!(registry.active(), Some(c));
    assert_eq!(registry.ids(), &[a, b, c]);

    assert!(registry.activate(b));
    assert!(registry.close(b).is_some());
    assert_eq!(registry.active(), Some(a));

    assert!(registry.close(a).is_some());
    assert_eq!(registry.active(), Some(c));

    assert!(registry.close(c).is_some());
    assert_eq!(registry.active(), None);
    assert!(registry.close(c).is_none());
    assert!(registry.is_empty());
}

#[test]
fn sessions_share_one_growing_scratch_buffer() {
    let log = CallLog::new();
    let mut registry = SessionRegistry::new(PixelFormat::Rgba8);
    registry.open("big.png", FakeImage::new(8, 8, &log)).unwrap();
    registry.open("small.png", FakeImage::new(2, 2, &log)).unwrap();

    let scratch = registry.scratch();
    assert_eq!(scratch.capacity(), 8 * 8 * 4);
    assert_eq!(scratch.grow_count(), 1);
}

#[test]
fn engine_panic_rolls_back_like_an_error() {
    let log = CallLog::new();
    let session = fake_session(&log);
    session
        .apply_edit(OperationKind::Brighten, Some(OpValue::Scalar(10.0)))
        .unwrap();
    log.panic_on(Some("median_blur"));

    let err = session
        .apply_edit(OperationKind::MedianBlur, Some(OpValue::Radius(3)))
        .unwrap_err();
    match err {
        EditError::Engine(EngineError::Panicked(msg)) => assert!(msg.contains("rigged to panic")),
        other => panic!("expected a caught panic, got {other:?}"),
    }
    let history = session.history();
    assert_eq!(
        history,
        vec![entry(OperationKind::Brighten, OpValue::Scalar(10.0))]
    );
    let non_trivial = history.iter().filter(|e| !e.kind.trivial_undo()).count();
    assert_eq!(session.generation_count(), 1 + non_trivial);
    assert_eq!(session.filter_values().median_blur, 0);
    assert_eq!(log.released(), 1);

    log.panic_on(None);
    session
        .apply_edit(OperationKind::MedianBlur, Some(OpValue::Radius(3)))
        .unwrap();
    assert_eq!(session.generation_count(), 3);
    session.undo_last().unwrap();
    assert_eq!(session.generation_count(), 2);
}

#[test]
fn oversized_blur_radius_is_rejected_before_any_work() {
    let image = RasterImage::from_rgba8(1, 1, vec![10, 20, 30, 255]).unwrap();
    let session = ImageSession::open(
        1,
        "tiny.png",
        image,
        Arc::new(ScratchBuffer::new()),
        PixelFormat::Rgba8,
    )
    .unwrap();

    for (kind, radius) in [
        (OperationKind::MedianBlur, u32::MAX),
        (OperationKind::BilateralBlur, u32::MAX),
        (OperationKind::BoxBlur, MAX_RADIUS + 1),
        (OperationKind::GaussianBlur, MAX_RADIUS + 1),
    ] {
        let err = session
            .apply_edit(kind, Some(OpValue::Radius(radius)))
            .unwrap_err();
        assert!(
            matches!(err, EditError::Engine(EngineError::InvalidParameter(_))),
            "{kind}: {err:?}"
        );
        assert_eq!(session.history_len(), 0);
        assert_eq!(session.generation_count(), 1);
    }

    session
        .apply_edit(OperationKind::MedianBlur, Some(OpValue::Radius(2)))
        .unwrap();
    assert_eq!(session.history_len(), 1);
    assert_eq!(session.surface().read(|f| f.pixels().to_vec()), vec![10, 20, 30, 255]);
}

#[test]
fn concurrent_edits_on_one_session_run_one_at_a_time() {
    let log = CallLog::new();
    let session = fake_session(&log);
    log.slow_down(Duration::from_millis(2));

    thread::scope(|s| {
        for t in 0..4u32 {
            let session = &session;
            s.spawn(move || {
                for i in 1..=5 {
                    session
                        .apply_edit(OperationKind::BoxBlur, Some(OpValue::Radius(t * 10 + i)))
                        .expect("blur");
                }
            });
        }
    });

    let history = session.history();
    assert_eq!(history.len(), 20);
    assert_eq!(session.generation_count(), 1 + history.len());
    assert_eq!(log.count("box_blur"), 20);
    for t in 0..4u32 {
        let radii: Vec<u32> = history
            .iter()
            .filter_map(|e| match &e.value {
                OpValue::Radius(r) if (r - 1) / 10 == t => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(radii, (t * 10 + 1..=t * 10 + 5).collect::<Vec<_>>());
    }
    let last = match &history[19].value {
        OpValue::Radius(r) => *r,
        other => panic!("unexpected value {other:?}"),
    };
    assert_eq!(session.filter_values().box_blur, last);
    assert!(!session.busy());
}

#[test]
fn busy_while_a_slow_edit_holds_the_gate() {
    let log = CallLog::new();
    let session = fake_session(&log);
    log.slow_down(Duration::from_millis(200));

    thread::scope(|s| {
        let edit = s.spawn(|| session.apply_edit(OperationKind::Edges, None));
        while log.count("edges") == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(session.busy());
        edit.join().expect("edit thread").expect("edges");
    });
    assert!(!session.busy());
}

#[test]
fn queries_wait_on_the_gate_without_counting_as_busy() {
    let gate = OperationGate::new(0u32);
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    thread::scope(|s| {
        let writer_gate = &gate;
        s.spawn(move || {
            writer_gate.with_exclusive_access(|value| {
                *value += 1;
                held_tx.send(()).expect("held");
                release_rx.recv().expect("release");
            })
        });
        held_rx.recv().expect("writer holds the gate");

        let reader = s.spawn(|| gate.read(|value| *value));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(gate.in_flight(), 1);

        release_tx.send(()).expect("release");
        assert_eq!(reader.join().expect("reader"), 1);
    });
    assert!(!gate.busy());
}
