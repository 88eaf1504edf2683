//! Decides, once per frame tick, whether caches get swept and how deeply.
//!
//! Metric-style caches carry no visual risk and are swept on their own
//! cadence.  Renderer and canvas entries are only destroyed on ticks that
//! actually repainted, so an object about to be redrawn never loses its
//! renderer mid-frame.

use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Timestamp;
use crate::config::CacheConfig;
use crate::object::CanvasId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepKind {
    /// Nothing to do this tick.
    Skipped,
    /// Font metrics and icon rasters only.
    Light,
    /// Light, plus canvas and renderer entries of the listed canvases.
    Full,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepPlan {
    pub kind: SweepKind,
    /// Canvases whose expired content may be destroyed.  Empty unless
    /// `kind` is [`SweepKind::Full`].
    pub canvases: Vec<CanvasId>,
}

impl SweepPlan {
    fn skipped() -> Self {
        SweepPlan {
            kind: SweepKind::Skipped,
            canvases: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    last_sweep_at: Option<Timestamp>,
    /// A repaint happened on a tick that was too early to sweep; the next
    /// sweep must be a full one.
    skipped_with_refresh: bool,
    skipped_canvases: Vec<CanvasId>,
}

#[derive(Debug)]
pub struct SweepScheduler {
    min_interval: Duration,
    clean_interval: Duration,
    state: Mutex<State>,
}

impl SweepScheduler {
    pub fn new(config: &CacheConfig) -> Self {
        SweepScheduler {
            min_interval: config.min_sweep_interval,
            clean_interval: config.clean_interval(),
            state: Mutex::new(State::default()),
        }
    }

    /// Makes the decision for the tick at `now` and, when a sweep is due,
    /// records `now` as the last sweep.
    pub fn evaluate(&self, now: Timestamp, did_repaint: bool, refreshed: &[CanvasId]) -> SweepPlan {
        let mut state = self.state.lock();
        let elapsed = state.last_sweep_at.map(|last| now.duration_since(last));

        if matches!(elapsed, Some(e) if e < self.min_interval) {
            if did_repaint {
                state.skipped_with_refresh = true;
                for canvas in refreshed {
                    if !state.skipped_canvases.contains(canvas) {
                        state.skipped_canvases.push(*canvas);
                    }
                }
            }
            return SweepPlan::skipped();
        }

        let mut full = did_repaint;
        if state.skipped_with_refresh {
            state.skipped_with_refresh = false;
            full = true;
        }

        if !full && matches!(elapsed, Some(e) if e < self.clean_interval) {
            return SweepPlan::skipped();
        }

        state.last_sweep_at = Some(now);
        let mut canvases = std::mem::take(&mut state.skipped_canvases);
        if !full {
            return SweepPlan {
                kind: SweepKind::Light,
                canvases: Vec::new(),
            };
        }
        for canvas in refreshed {
            if !canvases.contains(canvas) {
                canvases.push(*canvas);
            }
        }
        SweepPlan {
            kind: SweepKind::Full,
            canvases,
        }
    }

    pub fn last_sweep_at(&self) -> Option<Timestamp> {
        self.state.lock().last_sweep_at
    }

    /// `true` while a skipped repaint is waiting to force a full sweep.
    pub fn has_pending_refresh(&self) -> bool {
        self.state.lock().skipped_with_refresh
    }
}
