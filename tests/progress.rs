use std::sync::Mutex;

use voxlift_core::progress::{ProgressEvent, ProgressSink, ProgressTracker};

struct Collect(Mutex<Vec<ProgressEvent>>);

impl Collect {
    fn new() -> Self {
        Collect(Mutex::new(Vec::new()))
    }

    fn percents(&self) -> Vec<f32> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for Collect {
    fn emit(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[test]
fn progress_is_monotonic_and_bounded() {
    let sink = Collect::new();
    let tracker = ProgressTracker::new(&sink);

    tracker.progress(10.0);
    tracker.progress(5.0); // regression is clamped up
    tracker.progress(50.0);
    tracker.progress(250.0); // out of range is clamped down
    tracker.progress(80.0);

    let got = sink.percents();
    assert_eq!(got, vec![10.0, 10.0, 50.0, 100.0, 100.0]);
    assert!(got.windows(2).all(|w| w[0] <= w[1]));
    assert!(got.iter().all(|p| (0.0..=100.0).contains(p)));
}

#[test]
fn status_percent_is_tracked_too() {
    let sink = Collect::new();
    let tracker = ProgressTracker::new(&sink);

    tracker.status("working", Some(40.0));
    tracker.progress(20.0); // cannot go back below 40

    let events = sink.0.lock().unwrap();
    assert!(matches!(
        events[0],
        ProgressEvent::Status {
            percent: Some(p),
            ..
        } if p == 40.0
    ));
    assert!(matches!(events[1], ProgressEvent::Progress(p) if p == 40.0));
}

#[test]
fn span_scales_local_percent_into_range() {
    let sink = Collect::new();
    let tracker = ProgressTracker::new(&sink);
    let span = tracker.span(0.0, 70.0);

    span.percent(34.0);
    span.percent(78.0);
    span.percent(100.0);

    let got = sink.percents();
    assert!((got[0] - 23.8).abs() < 1e-3);
    assert!((got[1] - 54.6).abs() < 1e-3);
    assert!((got[2] - 70.0).abs() < 1e-3);
}

#[test]
fn muted_span_drops_percent_but_forwards_lines() {
    let sink = Collect::new();
    let tracker = ProgressTracker::new(&sink);
    let span = tracker.muted_span();

    span.percent(99.0);
    span.raw_line("37%| some diagnostic");

    let events = sink.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ProgressEvent::RawOutput(_)));
}
