//! The detection loop.
//!
//! ```text
//! Initializing -> Ready -> Running -> Stopping -> Terminated
//!      |            |
//!      +-> Error <--+
//! ```
//!
//! `Initializing` checks the prerequisite and loads the model. `Ready` opens
//! the source and the display. `Running` repeats read, infer, filter,
//! localize, annotate, report, show, poll until a stop condition. The source
//! and display are released by a guard, so release also happens when a
//! panic unwinds out of the loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::annotate::{Annotation, Annotator};
use crate::detect::{filter, ConfidenceThreshold, Detection, InferenceAdapter, ModelLoader};
use crate::display::DisplaySink;
use crate::error::{InferenceError, InitError};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::labels::Localizer;
use crate::prereq::Prerequisite;
use crate::report::DetectionReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Ready,
    Running,
    Stopping,
    Terminated,
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Initializing => "initializing",
            PipelineState::Ready => "ready",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Terminated => "terminated",
            PipelineState::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The stop key was pressed.
    UserRequested,
    /// The interrupt flag was raised (Ctrl-C).
    Interrupted,
    /// `read` failed; carries the source's error message.
    SourceEnded(String),
    FrameLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::UserRequested => f.write_str("stop key pressed"),
            StopReason::Interrupted => f.write_str("interrupted"),
            StopReason::SourceEnded(reason) => write!(f, "frame source ended: {}", reason),
            StopReason::FrameLimit => f.write_str("frame limit reached"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames read from the source.
    pub frames: u64,
    /// Accepted detections across all frames.
    pub detections: u64,
    pub inference_failures: u64,
    /// Model records dropped because they failed validation.
    pub rejected_records: u64,
    pub stop_reason: StopReason,
    pub states: Vec<PipelineState>,
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub threshold: ConfidenceThreshold,
    pub window_title: String,
    /// Matched case-insensitively.
    pub stop_key: char,
    pub max_frames: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            threshold: ConfidenceThreshold::default(),
            window_title: "Detección de Objetos".to_string(),
            stop_key: 'q',
            max_frames: None,
        }
    }
}

/// External capabilities the pipeline drives.
pub struct Collaborators {
    pub prerequisite: Box<dyn Prerequisite>,
    pub loader: Box<dyn ModelLoader>,
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn DisplaySink>,
}

/// Result of processing one frame.
#[derive(Debug)]
pub struct FrameOutcome {
    pub accepted: Vec<Detection>,
    pub annotations: Vec<Annotation>,
    pub rejected_records: usize,
    /// Set when inference failed; the frame then counts as having no detections.
    pub inference_error: Option<InferenceError>,
}

/// Infer, filter, localize and annotate a single frame.
pub struct FrameProcessor {
    adapter: InferenceAdapter,
    localizer: Localizer,
    annotator: Annotator,
    threshold: ConfidenceThreshold,
}

impl FrameProcessor {
    pub fn new(
        adapter: InferenceAdapter,
        localizer: Localizer,
        annotator: Annotator,
        threshold: ConfidenceThreshold,
    ) -> Self {
        Self {
            adapter,
            localizer,
            annotator,
            threshold,
        }
    }

    pub fn adapter_mut(&mut self) -> &mut InferenceAdapter {
        &mut self.adapter
    }

    /// Never fails: inference errors are logged and reported in the outcome.
    pub fn process(&mut self, frame: &mut Frame) -> FrameOutcome {
        let mut raw = match self.adapter.infer(frame) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("frame treated as empty: {}", err);
                return FrameOutcome {
                    accepted: Vec::new(),
                    annotations: Vec::new(),
                    rejected_records: 0,
                    inference_error: Some(err),
                };
            }
        };

        let kept = filter(raw.by_ref(), self.threshold);
        let accepted: Vec<Detection> = kept
            .into_iter()
            .map(|detection| detection.localize(&self.localizer))
            .collect();
        let annotations = self.annotator.annotate(frame, &accepted);
        for detection in &accepted {
            log::debug!(
                "{} ({}) {:.2} at {:?}",
                detection.localized_name(),
                detection.class_name(),
                detection.confidence(),
                detection.bbox()
            );
        }

        FrameOutcome {
            accepted,
            annotations,
            rejected_records: raw.rejected(),
            inference_error: None,
        }
    }
}

type TransitionObserver = Box<dyn FnMut(PipelineState)>;

struct StateMachine {
    current: Option<PipelineState>,
    history: Vec<PipelineState>,
    observer: Option<TransitionObserver>,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            current: None,
            history: Vec::new(),
            observer: None,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        match self.current {
            Some(previous) => log::info!("pipeline: {} -> {}", previous, next),
            None => log::info!("pipeline: {}", next),
        }
        self.current = Some(next);
        self.history.push(next);
        if let Some(observer) = self.observer.as_mut() {
            observer(next);
        }
    }
}

/// Opened source and display. Dropping the guard releases both.
struct Resources<'a> {
    source: &'a mut dyn FrameSource,
    sink: &'a mut dyn DisplaySink,
}

impl<'a> Resources<'a> {
    fn acquire(
        source: &'a mut dyn FrameSource,
        sink: &'a mut dyn DisplaySink,
    ) -> Result<Self, InitError> {
        let resources = Self { source, sink };
        resources
            .source
            .open()
            .map_err(|err| InitError::SourceOpen {
                uri: resources.source.name().to_string(),
                reason: format!("{:#}", err),
            })?;
        resources.sink.open().map_err(|err| InitError::SinkOpen {
            sink: resources.sink.name().to_string(),
            reason: format!("{:#}", err),
        })?;
        Ok(resources)
    }
}

impl Drop for Resources<'_> {
    fn drop(&mut self) {
        self.source.release();
        self.sink.close_all();
        log::info!(
            "released frame source {} and display {}",
            self.source.name(),
            self.sink.name()
        );
    }
}

#[derive(Default)]
struct Counters {
    frames: u64,
    detections: u64,
    inference_failures: u64,
    rejected_records: u64,
}

pub struct Pipeline {
    settings: PipelineSettings,
    processor: FrameProcessor,
    collaborators: Collaborators,
    report: DetectionReport,
    interrupt: Option<Arc<AtomicBool>>,
    states: StateMachine,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        localizer: Localizer,
        annotator: Annotator,
        collaborators: Collaborators,
    ) -> Self {
        let processor = FrameProcessor::new(
            InferenceAdapter::new(),
            localizer,
            annotator,
            settings.threshold,
        );
        Self {
            settings,
            processor,
            collaborators,
            report: DetectionReport::stdout(),
            interrupt: None,
            states: StateMachine::new(),
        }
    }

    pub fn with_report(mut self, report: DetectionReport) -> Self {
        self.report = report;
        self
    }

    /// Stop at the end of the current frame once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Called after every state change.
    pub fn on_transition(mut self, observer: impl FnMut(PipelineState) + 'static) -> Self {
        self.states.observer = Some(Box::new(observer));
        self
    }

    /// Run until a stop condition. Initialization failures end in `Error`
    /// and are returned; everything after `Running` is reported in the summary.
    pub fn run(self) -> Result<RunSummary, InitError> {
        let Pipeline {
            settings,
            mut processor,
            mut collaborators,
            mut report,
            interrupt,
            mut states,
        } = self;

        states.enter(PipelineState::Initializing);
        if let Err(err) = initialize(&mut collaborators, &mut processor) {
            return Err(fail(&mut states, err));
        }

        states.enter(PipelineState::Ready);
        let mut resources = match Resources::acquire(
            collaborators.source.as_mut(),
            collaborators.sink.as_mut(),
        ) {
            Ok(resources) => resources,
            Err(err) => return Err(fail(&mut states, err)),
        };

        states.enter(PipelineState::Running);
        let mut counters = Counters::default();
        let stop_reason = drive(
            &mut resources,
            &mut processor,
            &mut report,
            &settings,
            interrupt.as_deref(),
            &mut counters,
        );
        log::info!("stopping: {}", stop_reason);

        states.enter(PipelineState::Stopping);
        drop(resources);
        states.enter(PipelineState::Terminated);

        Ok(RunSummary {
            frames: counters.frames,
            detections: counters.detections,
            inference_failures: counters.inference_failures,
            rejected_records: counters.rejected_records,
            stop_reason,
            states: states.history,
        })
    }
}

fn initialize(
    collaborators: &mut Collaborators,
    processor: &mut FrameProcessor,
) -> Result<(), InitError> {
    let prerequisite = collaborators.prerequisite.as_ref();
    log::info!("checking prerequisite: {}", prerequisite.name());
    prerequisite
        .check()
        .map_err(|err| InitError::Connectivity {
            reason: format!("{:#}", err),
        })?;
    processor
        .adapter_mut()
        .load(collaborators.loader.as_mut())
}

fn fail(states: &mut StateMachine, err: InitError) -> InitError {
    log::error!("{}", err);
    states.enter(PipelineState::Error);
    err
}

fn drive(
    resources: &mut Resources<'_>,
    processor: &mut FrameProcessor,
    report: &mut DetectionReport,
    settings: &PipelineSettings,
    interrupt: Option<&AtomicBool>,
    counters: &mut Counters,
) -> StopReason {
    loop {
        let mut frame = match resources.source.read() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("frame source {}: {:#}", resources.source.name(), err);
                return StopReason::SourceEnded(format!("{:#}", err));
            }
        };
        counters.frames += 1;

        let outcome = processor.process(&mut frame);
        if outcome.inference_error.is_some() {
            counters.inference_failures += 1;
        }
        counters.detections += outcome.accepted.len() as u64;
        counters.rejected_records += outcome.rejected_records as u64;

        if let Err(err) = report.frame(&outcome.accepted) {
            log::warn!("could not write detection report: {}", err);
        }
        if let Err(err) = resources.sink.show(&settings.window_title, &frame) {
            log::warn!("display {}: {:#}", resources.sink.name(), err);
        }

        if let Some(key) = resources.sink.poll_key() {
            if key.eq_ignore_ascii_case(&settings.stop_key) {
                return StopReason::UserRequested;
            }
        }
        if interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            return StopReason::Interrupted;
        }
        if settings
            .max_frames
            .is_some_and(|limit| counters.frames >= limit)
        {
            return StopReason::FrameLimit;
        }
    }
}
