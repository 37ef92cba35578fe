use ndarray::array;
use std::sync::Arc;
use vesselstudy_core::{discover, read_snapshot, series_path, write_snapshot, StudyError};
use vesselstudy_parallel::{CountingProgress, StageRunner};

#[test]
fn batch_writes_one_snapshot_per_discovered_step() {
    let dir = tempfile::tempdir().unwrap();
    for step in [0u32, 3, 7, 12] {
        write_snapshot(
            &series_path(dir.path(), "Disp", step, "D"),
            &array![[step as f64, 1.0], [2.0, step as f64]],
        )
        .unwrap();
    }
    let index = discover(dir.path(), "Disp", "D").unwrap();

    let progress = Arc::new(CountingProgress::new());
    let runner = StageRunner::new(4, progress.clone()).unwrap();
    let report = runner
        .run("double", index.steps(), |step| {
            let disp = read_snapshot(&series_path(dir.path(), "Disp", step, "D"))?;
            write_snapshot(&series_path(dir.path(), "Twice", step, "D"), &(&disp * 2.0))
        })
        .unwrap();

    assert_eq!(report.completed, 4);
    assert_eq!(progress.advanced(), 4);
    let out = discover(dir.path(), "Twice", "D").unwrap();
    assert_eq!(out.steps(), index.steps());
    let last = read_snapshot(&series_path(dir.path(), "Twice", 12, "D")).unwrap();
    assert_eq!(last, array![[24.0, 2.0], [4.0, 24.0]]);
}

#[test]
fn missing_input_surfaces_after_peers_finish() {
    let dir = tempfile::tempdir().unwrap();
    for step in [1u32, 2] {
        write_snapshot(
            &series_path(dir.path(), "U0", step, "D"),
            &array![[1.0]],
        )
        .unwrap();
    }
    let runner = StageRunner::silent(2).unwrap();
    let err = runner
        .run("negate", &[1, 2, 3], |step| {
            let u0 = read_snapshot(&series_path(dir.path(), "U0", step, "D"))?;
            write_snapshot(&series_path(dir.path(), "RefDisp", step, "D"), &(-u0))
        })
        .unwrap_err();

    match err {
        StudyError::StageFailed { step, failures, .. } => {
            assert_eq!(step, 3);
            assert_eq!(failures, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
    let written = discover(dir.path(), "RefDisp", "D").unwrap();
    assert_eq!(written.steps(), &[1, 2]);
}
