use std::collections::VecDeque;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use ojo::{
    Annotator, Candidate, Collaborators, ConfidenceThreshold, DetectionReport, DetectorBackend,
    DisplaySink, Frame, FrameSource, InitError, LabelMap, Localizer, ModelLoader, NoPrerequisite,
    Pipeline, PipelineSettings, PipelineState, Prerequisite, StopReason, StubLoader,
};

type EventLog = Arc<Mutex<Vec<String>>>;

fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

struct ScriptedSource {
    frames: VecDeque<Frame>,
    log: EventLog,
    fail_open: bool,
}

impl ScriptedSource {
    fn new(frames: Vec<Frame>, log: EventLog) -> Self {
        Self {
            frames: frames.into(),
            log,
            fail_open: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&mut self) -> Result<()> {
        self.log.lock().unwrap().push("source.open".into());
        if self.fail_open {
            return Err(anyhow!("device busy"));
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        self.log.lock().unwrap().push("source.read".into());
        self.frames
            .pop_front()
            .ok_or_else(|| anyhow!("camera unplugged"))
    }

    fn release(&mut self) {
        self.log.lock().unwrap().push("source.release".into());
    }
}

#[derive(Default)]
struct RecordingSink {
    shown: Arc<Mutex<Vec<Frame>>>,
    keys: VecDeque<Option<char>>,
    log: EventLog,
}

impl DisplaySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        self.log.lock().unwrap().push(format!("sink.show {}", window));
        self.shown.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        self.keys.pop_front().flatten()
    }

    fn close_all(&mut self) {
        self.log.lock().unwrap().push("sink.close_all".into());
    }
}

struct FailingLoader;

impl ModelLoader for FailingLoader {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn load(&mut self) -> Result<Box<dyn DetectorBackend>> {
        Err(anyhow!("weights not found"))
    }
}

struct Offline;

impl Prerequisite for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn check(&self) -> Result<()> {
        Err(anyhow!("could not reach https://github.com"))
    }
}

/// Fails on the second frame, succeeds otherwise.
struct FlakyBackend {
    calls: usize,
}

impl DetectorBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn infer(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Candidate>> {
        self.calls += 1;
        if self.calls == 2 {
            return Err(anyhow!("tensor shape mismatch"));
        }
        Ok(vec![Candidate::new("dog", 0.75, [10.0, 10.0, 50.0, 50.0])])
    }
}

struct FlakyLoader;

impl ModelLoader for FlakyLoader {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn load(&mut self) -> Result<Box<dyn DetectorBackend>> {
        Ok(Box::new(FlakyBackend { calls: 0 }))
    }
}

struct PanickingBackend;

impl DetectorBackend for PanickingBackend {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn infer(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Candidate>> {
        panic!("backend crashed");
    }
}

struct PanickingLoader;

impl ModelLoader for PanickingLoader {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn load(&mut self) -> Result<Box<dyn DetectorBackend>> {
        Ok(Box::new(PanickingBackend))
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    log: EventLog,
    shown: Arc<Mutex<Vec<Frame>>>,
    console: SharedBuffer,
    states: Arc<Mutex<Vec<PipelineState>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            log: EventLog::default(),
            shown: Arc::default(),
            console: SharedBuffer::default(),
            states: Arc::default(),
        }
    }

    fn black_frames(&self, count: usize) -> Vec<Frame> {
        (0..count)
            .map(|_| Frame::filled(100, 100, [0, 0, 0]).unwrap())
            .collect()
    }

    fn sink(&self, keys: Vec<Option<char>>) -> RecordingSink {
        RecordingSink {
            shown: self.shown.clone(),
            keys: keys.into(),
            log: self.log.clone(),
        }
    }

    fn pipeline(
        &self,
        settings: PipelineSettings,
        prerequisite: Box<dyn Prerequisite>,
        loader: Box<dyn ModelLoader>,
        source: ScriptedSource,
        sink: RecordingSink,
    ) -> Pipeline {
        let states = self.states.clone();
        Pipeline::new(
            settings,
            Localizer::new(LabelMap::spanish()),
            Annotator::new().unwrap(),
            Collaborators {
                prerequisite,
                loader,
                source: Box::new(source),
                sink: Box::new(sink),
            },
        )
        .with_report(DetectionReport::new(Box::new(self.console.clone())))
        .on_transition(move |state| states.lock().unwrap().push(state))
    }

    fn scripted(
        &self,
        script: Vec<Vec<Candidate>>,
        frames: usize,
        settings: PipelineSettings,
    ) -> Pipeline {
        self.pipeline(
            settings,
            Box::new(NoPrerequisite),
            Box::new(StubLoader::with_script(script)),
            ScriptedSource::new(self.black_frames(frames), self.log.clone()),
            self.sink(Vec::new()),
        )
    }
}

fn count(log: &[String], event: &str) -> usize {
    log.iter().filter(|entry| entry.as_str() == event).count()
}

#[test]
fn confident_dog_is_drawn_and_reported_in_spanish() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.scripted(
        vec![vec![Candidate::new("dog", 0.75, [10.0, 10.0, 50.0, 50.0])]],
        1,
        PipelineSettings::default(),
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.frames, 1);
    assert_eq!(summary.detections, 1);
    assert_eq!(
        summary.stop_reason,
        StopReason::SourceEnded("camera unplugged".to_string())
    );
    assert_eq!(
        harness.console.text(),
        "Objetos detectados:\n- perro (Confianza: 0.75)\n"
    );
    let shown = harness.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].pixel(10, 10), Some([0, 255, 0]));
    assert_eq!(shown[0].pixel(30, 30), Some([0, 0, 0]));
    // The label is pushed down to row 0 and rendered above the box's top edge.
    let label_pixels = (0..10)
        .flat_map(|y| (0..100).map(move |x| (x, y)))
        .filter(|&(x, y)| shown[0].pixel(x, y) != Some([0, 0, 0]))
        .count();
    assert!(label_pixels > 0, "label text drawn on the frame");
    Ok(())
}

#[test]
fn low_confidence_cat_leaves_frame_and_console_untouched() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.scripted(
        vec![vec![Candidate::new("cat", 0.30, [10.0, 10.0, 50.0, 50.0])]],
        1,
        PipelineSettings::default(),
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.detections, 0);
    assert_eq!(harness.console.text(), "");
    let shown = harness.shown.lock().unwrap();
    assert_eq!(shown[0], Frame::filled(100, 100, [0, 0, 0])?);
    Ok(())
}

#[test]
fn unknown_class_keeps_its_canonical_name() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.scripted(
        vec![vec![Candidate::new("drone", 0.9, [20.0, 20.0, 60.0, 40.0])]],
        1,
        PipelineSettings::default(),
    );

    pipeline.run()?;

    assert_eq!(
        harness.console.text(),
        "Objetos detectados:\n- drone (Confianza: 0.90)\n"
    );
    Ok(())
}

#[test]
fn threshold_boundary_is_exclusive() -> Result<()> {
    let harness = Harness::new();
    let settings = PipelineSettings {
        threshold: ConfidenceThreshold::new(0.5)?,
        ..PipelineSettings::default()
    };
    let pipeline = harness.scripted(
        vec![vec![
            Candidate::new("dog", 0.5, [10.0, 10.0, 50.0, 50.0]),
            Candidate::new("cat", 0.51, [60.0, 60.0, 90.0, 90.0]),
        ]],
        1,
        settings,
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.detections, 1);
    assert_eq!(
        harness.console.text(),
        "Objetos detectados:\n- gato (Confianza: 0.51)\n"
    );
    Ok(())
}

#[test]
fn failed_first_read_stops_without_processing() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.scripted(
        vec![vec![Candidate::new("dog", 0.75, [10.0, 10.0, 50.0, 50.0])]],
        0,
        PipelineSettings::default(),
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.frames, 0);
    assert_eq!(summary.detections, 0);
    assert!(matches!(summary.stop_reason, StopReason::SourceEnded(_)));
    assert_eq!(
        summary.states,
        vec![
            PipelineState::Initializing,
            PipelineState::Ready,
            PipelineState::Running,
            PipelineState::Stopping,
            PipelineState::Terminated,
        ]
    );
    let log = events(&harness.log);
    assert_eq!(
        log,
        vec![
            "source.open",
            "source.read",
            "source.release",
            "sink.close_all"
        ]
    );
    assert!(harness.shown.lock().unwrap().is_empty());
    assert_eq!(harness.console.text(), "");
    Ok(())
}

#[test]
fn model_load_failure_never_opens_the_source() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineSettings::default(),
        Box::new(NoPrerequisite),
        Box::new(FailingLoader),
        ScriptedSource::new(harness.black_frames(1), harness.log.clone()),
        harness.sink(Vec::new()),
    );

    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, InitError::ModelLoad { .. }));
    assert!(err.to_string().contains("weights not found"));
    assert!(!err.remediation().is_empty());
    assert!(events(&harness.log).is_empty());
    assert_eq!(
        *harness.states.lock().unwrap(),
        vec![PipelineState::Initializing, PipelineState::Error]
    );
}

#[test]
fn connectivity_failure_stops_before_model_load() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineSettings::default(),
        Box::new(Offline),
        Box::new(PanickingLoader),
        ScriptedSource::new(harness.black_frames(1), harness.log.clone()),
        harness.sink(Vec::new()),
    );

    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, InitError::Connectivity { .. }));
    assert!(events(&harness.log).is_empty());
    assert_eq!(
        harness.states.lock().unwrap().last(),
        Some(&PipelineState::Error)
    );
}

#[test]
fn source_open_failure_still_releases() {
    let harness = Harness::new();
    let mut source = ScriptedSource::new(harness.black_frames(1), harness.log.clone());
    source.fail_open = true;
    let pipeline = harness.pipeline(
        PipelineSettings::default(),
        Box::new(NoPrerequisite),
        Box::new(StubLoader::new()),
        source,
        harness.sink(Vec::new()),
    );

    let err = pipeline.run().unwrap_err();

    assert!(matches!(err, InitError::SourceOpen { .. }));
    assert!(err.to_string().contains("device busy"));
    let log = events(&harness.log);
    assert_eq!(count(&log, "source.release"), 1);
    assert_eq!(count(&log, "sink.close_all"), 1);
    assert_eq!(count(&log, "source.read"), 0);
    assert_eq!(
        *harness.states.lock().unwrap(),
        vec![
            PipelineState::Initializing,
            PipelineState::Ready,
            PipelineState::Error
        ]
    );
}

#[test]
fn stop_key_ends_the_run_after_the_current_frame() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineSettings::default(),
        Box::new(NoPrerequisite),
        Box::new(StubLoader::with_script(Vec::new())),
        ScriptedSource::new(harness.black_frames(5), harness.log.clone()),
        harness.sink(vec![None, Some('x'), Some('Q')]),
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.stop_reason, StopReason::UserRequested);
    assert_eq!(summary.frames, 3);
    assert_eq!(harness.shown.lock().unwrap().len(), 3);
    assert_eq!(count(&events(&harness.log), "source.release"), 1);
    Ok(())
}

#[test]
fn interrupt_flag_is_honored_once_per_frame() -> Result<()> {
    let harness = Harness::new();
    let flag = Arc::new(AtomicBool::new(true));
    let pipeline = harness
        .scripted(Vec::new(), 5, PipelineSettings::default())
        .with_interrupt(flag);

    let summary = pipeline.run()?;

    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert_eq!(summary.frames, 1);
    Ok(())
}

#[test]
fn frame_limit_stops_the_run() -> Result<()> {
    let harness = Harness::new();
    let settings = PipelineSettings {
        max_frames: Some(2),
        ..PipelineSettings::default()
    };
    let summary = harness.scripted(Vec::new(), 5, settings).run()?;

    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert_eq!(summary.frames, 2);
    Ok(())
}

#[test]
fn inference_failure_skips_one_frame_and_continues() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineSettings::default(),
        Box::new(NoPrerequisite),
        Box::new(FlakyLoader),
        ScriptedSource::new(harness.black_frames(3), harness.log.clone()),
        harness.sink(Vec::new()),
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.inference_failures, 1);
    assert_eq!(summary.detections, 2);
    assert_eq!(harness.shown.lock().unwrap().len(), 3);
    assert_eq!(
        harness.console.text().matches("Objetos detectados:").count(),
        2
    );
    Ok(())
}

#[test]
fn malformed_records_are_dropped_and_counted() -> Result<()> {
    let harness = Harness::new();
    let pipeline = harness.scripted(
        vec![vec![
            Candidate::new("", 0.9, [0.0, 0.0, 10.0, 10.0]),
            Candidate::new("dog", 1.5, [0.0, 0.0, 10.0, 10.0]),
            Candidate::new("dog", 0.9, [30.0, 30.0, 30.5, 40.0]),
            Candidate::new("dog", 0.9, [f32::NAN, 0.0, 10.0, 10.0]),
            Candidate::new("dog", 0.9, [10.0, 10.0, 20.0, 20.0]),
        ]],
        1,
        PipelineSettings::default(),
    );

    let summary = pipeline.run()?;

    assert_eq!(summary.rejected_records, 4);
    assert_eq!(summary.detections, 1);
    Ok(())
}

#[test]
fn panic_in_backend_still_releases_resources() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineSettings::default(),
        Box::new(NoPrerequisite),
        Box::new(PanickingLoader),
        ScriptedSource::new(harness.black_frames(1), harness.log.clone()),
        harness.sink(Vec::new()),
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(move || pipeline.run()));

    assert!(outcome.is_err());
    let log = events(&harness.log);
    assert_eq!(count(&log, "source.release"), 1);
    assert_eq!(count(&log, "sink.close_all"), 1);
}
