use super::*;
use crate::storage::temp_path;
use crate::task::TaskState;
use crate::test_support::{fast_policy, video, Script, ScriptedSource};

fn fetcher(source: ScriptedSource, max_attempts: u32) -> (Arc<ScriptedSource>, SegmentFetcher<ScriptedSource>) {
    let source = Arc::new(source);
    let fetcher = SegmentFetcher::new(Arc::clone(&source), fast_policy(max_attempts));
    (source, fetcher)
}

#[test]
fn success_writes_final_file() {
    let dir = tempfile::tempdir().unwrap();
    let (_, f) = fetcher(ScriptedSource::new().with("/a.mp4", Script::ok(b"payload")), 3);
    let dest = dir.path().join("a.mp4");
    let out = f
        .fetch_to(Arc::new(video("2024-01-01 10:00:00", "/a.mp4")), dest.clone(), &CancelToken::new())
        .unwrap();
    assert_eq!(out.path, dest);
    assert_eq!(out.bytes, 7);
    assert_eq!(out.attempts, 1);
    assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    assert!(!temp_path(&dest).exists());
}

#[test]
fn two_failures_then_success_reports_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let (source, f) = fetcher(
        ScriptedSource::new().with("/a.mp4", Script::ok(b"abc").failing(2)),
        3,
    );
    let mut task = DownloadTask::new(
        0,
        Arc::new(video("2024-01-01 10:00:00", "/a.mp4")),
        dir.path().join("a.mp4"),
    );
    let out = f.fetch(&mut task, &CancelToken::new()).unwrap();
    assert_eq!(out.attempts, 3);
    assert_eq!(task.attempt(), 3);
    assert_eq!(task.state(), TaskState::Succeeded);
    assert_eq!(source.attempts("/a.mp4"), 3);
}

#[test]
fn exhausted_retries_leave_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let (source, f) = fetcher(
        ScriptedSource::new().with("/a.mp4", Script::ok(b"abcdef").failing(u32::MAX)),
        3,
    );
    let dest = dir.path().join("a.mp4");
    let mut task = DownloadTask::new(0, Arc::new(video("2024-01-01 10:00:00", "/a.mp4")), dest.clone());
    let err = f.fetch(&mut task, &CancelToken::new()).unwrap_err();
    assert_eq!(err.attempts, 3);
    assert!(matches!(err.last_cause, SegmentError::Http(503)));
    assert_eq!(task.state(), TaskState::Failed);
    assert_eq!(source.attempts("/a.mp4"), 3);
    assert!(!dest.exists());
    assert!(!temp_path(&dest).exists());
    assert!(err.to_string().contains("3 attempt(s)"));
}

#[test]
fn non_retryable_error_fails_immediately() {
    let dir = tempfile::tempdir().unwrap();
    // No script for the path: the source answers 404.
    let (source, f) = fetcher(ScriptedSource::new(), 5);
    let err = f
        .fetch_to(
            Arc::new(video("2024-01-01 10:00:00", "/missing.mp4")),
            dir.path().join("m.mp4"),
            &CancelToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.attempts, 1);
    assert!(matches!(err.last_cause, SegmentError::Http(404)));
    assert_eq!(source.attempts("/missing.mp4"), 1);
}

#[test]
fn empty_payload_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (_, f) = fetcher(ScriptedSource::new().with("/e.mp4", Script::ok(b"")), 2);
    let dest = dir.path().join("e.mp4");
    let err = f
        .fetch_to(Arc::new(video("2024-01-01 10:00:00", "/e.mp4")), dest.clone(), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err.last_cause, SegmentError::Empty));
    assert_eq!(err.attempts, 2);
    assert!(!dest.exists());
}

#[test]
fn cancelled_before_start_never_calls_source() {
    let dir = tempfile::tempdir().unwrap();
    let (source, f) = fetcher(ScriptedSource::new().with("/a.mp4", Script::ok(b"x")), 3);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = f
        .fetch_to(Arc::new(video("2024-01-01 10:00:00", "/a.mp4")), dir.path().join("a.mp4"), &cancel)
        .unwrap_err();
    assert!(matches!(err.last_cause, SegmentError::Cancelled));
    assert_eq!(err.attempts, 0);
    assert_eq!(source.attempts("/a.mp4"), 0);
}

#[test]
fn interrupted_transfer_leaves_nothing_at_final_path() {
    let dir = tempfile::tempdir().unwrap();
    let (_, f) = fetcher(
        ScriptedSource::new().with(
            "/slow.mp4",
            Script::ok(b"slow body").slow(std::time::Duration::from_secs(5)),
        ),
        3,
    );
    let dest = dir.path().join("slow.mp4");
    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(30));
        canceller.cancel();
    });
    let err = f
        .fetch_to(Arc::new(video("2024-01-01 10:00:00", "/slow.mp4")), dest.clone(), &cancel)
        .unwrap_err();
    handle.join().unwrap();
    assert!(matches!(err.last_cause, SegmentError::Cancelled));
    assert!(!dest.exists());
    assert!(!temp_path(&dest).exists());
}
