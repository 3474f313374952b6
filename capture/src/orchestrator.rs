use std::path::PathBuf;
use std::time::Duration;

use timelapse_common::frame::Frame;
use tracing::{debug, info, warn};

use crate::camera::{CameraDriver, CaptureSession, SessionSettings};
use crate::similarity::{Decision, Similarity, SimilarityGate};
use crate::storage::ShotStore;
use crate::tracker::{Clock, ElapsedTracker, MonotonicClock};
use crate::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Between captures, waiting for the interval to elapse.
    Waiting,
    /// A capture session is open.
    Capturing,
    /// Scoring the fresh shot against the previous one.
    Comparing,
    /// The subject has left; no further captures.
    Terminated,
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub captured: Option<PathBuf>,
    pub decision: Option<Decision>,
}

/// Drives the capture loop: tracker → capture session → shot store →
/// similarity gate, one synchronous step per [`Orchestrator::tick`].
///
/// The previous frame is carried in memory from one comparison to the next.
/// It is read back from disk only when there is nothing in memory, i.e. for
/// the first comparison after a (re)start.
pub struct Orchestrator<D: CameraDriver, S: Similarity, C: Clock = MonotonicClock> {
    driver: D,
    settings: SessionSettings,
    store: ShotStore,
    tracker: ElapsedTracker<C>,
    gate: SimilarityGate<S>,
    poll_interval: Duration,
    state: CaptureState,
    /// Forces a capture regardless of elapsed time until one succeeds.
    first_run: bool,
    /// A shot was stored since the last similarity decision.
    fresh_capture: bool,
    current: Option<Frame>,
    previous: Option<Frame>,
    captures: u64,
}

impl<D: CameraDriver, S: Similarity, C: Clock> Orchestrator<D, S, C> {
    pub fn new(
        driver: D,
        settings: SessionSettings,
        store: ShotStore,
        gate: SimilarityGate<S>,
        clock: C,
        poll_interval: Duration,
    ) -> Self {
        Self {
            driver,
            settings,
            store,
            tracker: ElapsedTracker::new(clock),
            gate,
            poll_interval,
            state: CaptureState::Waiting,
            first_run: true,
            fresh_capture: false,
            current: None,
            previous: None,
            captures: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn store(&self) -> &ShotStore {
        &self.store
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &ElapsedTracker<C> {
        &self.tracker
    }

    #[cfg(test)]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Shots stored by this process.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    fn interval(&self) -> Duration {
        self.settings.interval
    }

    /// One iteration of the loop. Fatal errors are returned; a blank camera
    /// read is not an error and is retried on the next tick.
    pub fn tick(&mut self) -> Result<TickReport, CaptureError> {
        let mut report = TickReport::default();
        if self.state == CaptureState::Terminated {
            return Ok(report);
        }

        self.tracker.update();

        if self.first_run || self.tracker.due(self.interval()) {
            self.state = CaptureState::Capturing;
            report.captured = self.capture()?;
            self.state = CaptureState::Waiting;
        }

        let seconds_remaining = self.tracker.remaining(self.interval()).as_secs();
        info!(
            seconds_remaining,
            "{seconds_remaining} seconds until next capture"
        );

        if self.store.index() > 0 && self.fresh_capture {
            self.state = CaptureState::Comparing;
            report.decision = self.compare()?;
            match report.decision {
                Some(decision) if decision.should_stop => {
                    info!(
                        index = self.store.index(),
                        score = format!("{:.4}", decision.score),
                        "COMPARING→TERMINATED: subject has left the scene"
                    );
                    self.state = CaptureState::Terminated;
                }
                _ => self.state = CaptureState::Waiting,
            }
        }

        Ok(report)
    }

    fn capture(&mut self) -> Result<Option<PathBuf>, CaptureError> {
        let session = CaptureSession::new(&mut self.driver, &self.settings)?;
        let Some(frame) = session.capture_frame()? else {
            warn!(
                index = self.store.index(),
                elapsed_secs = self.tracker.elapsed().as_secs(),
                "CAPTURING→WAITING: invalid frame, retrying next tick"
            );
            return Ok(None);
        };

        let path = self.store.store(&frame)?;
        let index = self.store.index();
        let captured_at = chrono::DateTime::from_timestamp_millis(frame.captured_at_ms)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        info!(index, captured_at, "Capturing image #{}...", index);

        self.tracker.reset();
        self.first_run = false;
        self.fresh_capture = true;
        self.captures += 1;
        // An uncompared shot (the very first one) is the newest prior frame.
        if let Some(uncompared) = self.current.replace(frame) {
            self.previous = Some(uncompared);
        }
        Ok(Some(path))
    }

    fn compare(&mut self) -> Result<Option<Decision>, CaptureError> {
        let index = self.store.index();

        if self.previous.is_none() {
            self.previous = self.store.load_previous(1)?;
        }
        let (Some(current), Some(previous)) = (self.current.as_ref(), self.previous.as_ref())
        else {
            warn!(
                index,
                "previous shot #{} missing on disk, skipping comparison",
                index.saturating_sub(1)
            );
            self.previous = self.current.take();
            self.fresh_capture = false;
            return Ok(None);
        };

        let decision = self.gate.evaluate(current, previous)?;
        info!(
            index,
            score = format!("{:.4}", decision.score),
            "Similarity score between image #{} and image #{} is {}%",
            index,
            index.saturating_sub(1),
            decision.percent()
        );

        self.fresh_capture = false;
        if !decision.should_stop {
            self.previous = self.current.take();
        }
        Ok(Some(decision))
    }

    /// Tick until the scene is vacated, sleeping `poll_interval` between ticks.
    pub async fn run(&mut self) -> Result<(), CaptureError> {
        self.store.ensure_writable()?;
        info!(
            storage = %self.store.storage_path().display(),
            device = self.settings.device,
            interval_secs = self.interval().as_secs(),
            poll_ms = self.poll_interval.as_millis() as u64,
            threshold = self.gate.threshold(),
            "entering capture loop"
        );

        while self.state() != CaptureState::Terminated {
            let report = self.tick()?;
            if self.state() == CaptureState::Terminated {
                break;
            }
            debug!(
                state = ?self.state,
                captured = report.captured.is_some(),
                compared = report.decision.is_some(),
                "sleeping until next tick"
            );
            tokio::time::sleep(self.poll_interval).await;
        }

        // Sessions release after every capture; this only covers a driver
        // that kept something open on its own.
        if let Err(e) = self.driver.release() {
            warn!(error = %e, "failed to release camera on shutdown");
        }
        info!(captures = self.captures, last_index = self.store.index(), "capture loop finished");
        Ok(())
    }
}
