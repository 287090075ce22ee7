//! Per-frame stream loop
//!
//! `Init -> Streaming -> Done`, with `Error` when the source cannot be
//! opened. Each frame: resize to the working resolution, dehaze, detect on
//! the dehazed copy, annotate the original, then persist and display.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use adas::{Annotator, VehicleDetector};
use camera_capture::{
    classify, open_display, open_sink, open_source, DisplayAction, FrameDisplay, FrameSink,
    FrameSource, SourceInput, VideoFrame, WaitMode,
};
use dehaze::Dehazer;
use tracing::{debug, error, info, warn};

use crate::PipelineError;

/// Runner lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Streaming,
    Done,
    Error,
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: usize,
    /// Units that failed to decode
    pub frames_skipped: usize,
    pub detections: usize,
    pub alerts: usize,
    pub outputs_written: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Square working resolution
    pub frame_size: u32,
    pub alert_enabled: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            frame_size: 640,
            alert_enabled: true,
        }
    }
}

pub struct StreamRunner {
    config: RunnerConfig,
    dehazer: Box<dyn Dehazer>,
    detector: VehicleDetector,
    annotator: Annotator,
    state: RunState,
    stop: Arc<AtomicBool>,
}

impl StreamRunner {
    pub fn new(
        config: RunnerConfig,
        dehazer: Box<dyn Dehazer>,
        detector: VehicleDetector,
        annotator: Annotator,
    ) -> Self {
        Self {
            config,
            dehazer,
            detector,
            annotator,
            state: RunState::Init,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Flag checked once per frame; setting it ends the run after the
    /// current frame
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            info!("Runner: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Classify and open `input`, then stream it to completion
    pub fn run_input(
        &mut self,
        input: &SourceInput,
        output_dir: Option<&Path>,
        show: bool,
    ) -> Result<RunSummary, PipelineError> {
        self.transition(RunState::Init);

        let opened = classify(input).and_then(|kind| {
            info!("Source: {}", kind);
            let source = open_source(&kind)?;
            let sink = match output_dir {
                Some(dir) => Some(open_sink(&kind, dir, source.fps(), self.config.frame_size)?),
                None => None,
            };
            Ok((kind, source, sink))
        });

        let (kind, source, sink) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                error!("Cannot open source: {}", e);
                self.transition(RunState::Error);
                return Err(e.into());
            }
        };

        let display = if show { Some(open_display()) } else { None };
        Ok(self.run(source, sink, display, kind.wait_mode()))
    }

    /// Drive the frame loop until the source is exhausted or a stop is
    /// requested. Source, sink and display are released before returning.
    pub fn run(
        &mut self,
        mut source: Box<dyn FrameSource>,
        mut sink: Option<Box<dyn FrameSink>>,
        mut display: Option<Box<dyn FrameDisplay>>,
        wait: WaitMode,
    ) -> RunSummary {
        self.transition(RunState::Streaming);
        info!("Streaming {}", source.describe());

        let mut summary = RunSummary::default();
        while !self.stop.load(Ordering::SeqCst) {
            let unit = match source.next_frame() {
                Some(Ok(unit)) => unit,
                Some(Err(e)) => {
                    debug!("Skipping unit: {}", e);
                    summary.frames_skipped += 1;
                    continue;
                }
                None => break,
            };

            let frame = self.process(unit.frame, &mut summary);

            if let Some(sink) = sink.as_mut() {
                if let Err(e) = sink.write(&frame, unit.name.as_deref()) {
                    debug!("Skipping output for frame #{}: {}", frame.sequence, e);
                }
            }

            if let Some(screen) = display.as_mut() {
                match screen.show(&frame, wait) {
                    Ok(DisplayAction::Quit) => {
                        info!("Quit requested");
                        break;
                    }
                    Ok(DisplayAction::Continue) => {}
                    Err(e) => {
                        warn!("Display {} failed, continuing without it: {}", screen.name(), e);
                        display = None;
                    }
                }
            }
        }

        if self.stop.load(Ordering::SeqCst) {
            info!("Stop requested");
        }

        if let Some(mut sink) = sink.take() {
            if let Err(e) = sink.finish() {
                warn!("Failed to finalise output: {}", e);
            }
            summary.outputs_written = sink.written();
        }
        drop(display);
        drop(source);

        self.transition(RunState::Done);
        info!(
            "Processed {} frame(s), skipped {}, {} detection(s), {} alert(s), {} output(s)",
            summary.frames_processed,
            summary.frames_skipped,
            summary.detections,
            summary.alerts,
            summary.outputs_written
        );
        summary
    }

    /// Resize, dehaze, detect and annotate one frame
    pub fn process(&mut self, frame: VideoFrame, summary: &mut RunSummary) -> VideoFrame {
        let size = self.config.frame_size;
        let mut frame = if frame.width() == size && frame.height() == size {
            frame
        } else {
            frame.resize(size, size)
        };

        let dehazed = self.dehazer.enhance(&frame);
        let detections = match self.detector.detect(&dehazed) {
            Ok(detections) => detections,
            Err(e) => {
                debug!("Detection failed on frame #{}: {}", frame.sequence, e);
                Vec::new()
            }
        };

        let annotation = self
            .annotator
            .annotate(&mut frame, &detections, self.config.alert_enabled);

        summary.frames_processed += 1;
        summary.detections += detections.len();
        summary.alerts += annotation.alerts;
        frame
    }
}
