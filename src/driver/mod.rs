//! The fixed-rate frame loop.
//!
//! Every tick drains work queued for the frame thread, polls platform
//! events, repaints the windows whose canvas changed (or walks the ones that
//! did not, to keep their cache entries alive), lets the cache manager decide
//! on a sweep, and finally tears down closing windows.

mod tasks;

pub use tasks::{FrameError, FrameHandle};

use std::sync::Arc;

use crossbeam_channel::{never, select, unbounded, Receiver, Sender};

use crate::clock::Timestamp;
use crate::config::CacheConfig;
use crate::manager::{CacheManager, SweepReport};
use crate::object::CanvasId;
use crate::painter::Painter;
use crate::walk::{paint_tree, touch_tree, Canvas};
use tasks::FrameTasks;

/// The native surface a canvas is presented on.
pub trait Surface {
    fn should_close(&self) -> bool;

    fn is_visible(&self) -> bool {
        true
    }

    fn swap_buffers(&mut self) {}

    /// Gives the GPU context back to the platform.  Called once, when the
    /// window is destroyed.
    fn release_context(&mut self);
}

/// Windowing and animation hooks invoked by the loop.
pub trait Platform {
    fn poll_events(&mut self);

    fn advance_animations(&mut self, _now: Timestamp) {}

    fn on_started(&mut self) {}

    fn on_stopped(&mut self) {}
}

/// Notification that theme, scale or font settings changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChange {
    /// Name of the newly selected theme, if that is what changed.
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Open,
    /// Asked to close; destroyed at the end of the current tick.
    Closing,
}

pub struct Window {
    canvas: Box<dyn Canvas>,
    surface: Box<dyn Surface>,
    state: WindowState,
    last_walked: Option<Timestamp>,
}

impl Window {
    pub fn new(canvas: Box<dyn Canvas>, surface: Box<dyn Surface>) -> Self {
        Window {
            canvas,
            surface,
            state: WindowState::Open,
            last_walked: None,
        }
    }

    pub fn canvas_id(&self) -> CanvasId {
        self.canvas.id()
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// When the canvas tree was last painted or walked.
    pub fn last_walked(&self) -> Option<Timestamp> {
        self.last_walked
    }

    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    pub fn canvas_mut(&mut self) -> &mut dyn Canvas {
        self.canvas.as_mut()
    }

    /// Forces a walk on the next tick that does not repaint this window.
    pub fn reset_walk(&mut self) {
        self.last_walked = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Quit,
}

/// What one call to [`FrameDriver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tasks_run: usize,
    pub repainted: usize,
    pub walked: usize,
    pub closed: usize,
    pub sweep: SweepReport,
    pub state: DriverState,
}

/// Lets any thread stop the loop.
#[derive(Clone)]
pub struct QuitHandle {
    sender: Sender<()>,
}

impl QuitHandle {
    pub fn quit(&self) {
        let _ = self.sender.send(());
    }
}

pub struct FrameDriver<P> {
    cache: Arc<CacheManager>,
    platform: P,
    painter: Box<dyn Painter>,
    windows: Vec<Window>,
    tasks: FrameTasks,
    settings: Option<Receiver<SettingsChange>>,
    quit_tx: Sender<()>,
    quit_rx: Receiver<()>,
    state: DriverState,
    // Reused across ticks.
    refreshed: Vec<CanvasId>,
}

impl<P: Platform> FrameDriver<P> {
    pub fn new(cache: Arc<CacheManager>, platform: P, painter: Box<dyn Painter>) -> Self {
        let (quit_tx, quit_rx) = unbounded();
        FrameDriver {
            cache,
            platform,
            painter,
            windows: Vec::new(),
            tasks: FrameTasks::new(),
            settings: None,
            quit_tx,
            quit_rx,
            state: DriverState::Idle,
            refreshed: Vec::new(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn config(&self) -> &CacheConfig {
        self.cache.config()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn handle(&self) -> FrameHandle {
        self.tasks.handle()
    }

    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            sender: self.quit_tx.clone(),
        }
    }

    /// Subscribes the loop to settings changes.
    pub fn listen_settings(&mut self, settings: Receiver<SettingsChange>) {
        self.settings = Some(settings);
    }

    /// Adds a window and registers its canvas with the cache manager.
    pub fn add_window(&mut self, window: Window) -> CanvasId {
        let id = window.canvas_id();
        self.cache.register_canvas(id);
        self.windows.push(window);
        id
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn window_mut(&mut self, canvas: CanvasId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.canvas_id() == canvas)
    }

    /// Stops the loop after the current tick.
    pub fn quit(&mut self) {
        if self.state != DriverState::Quit {
            tracing::info!("frame loop quitting");
            self.state = DriverState::Quit;
        }
    }

    /// Runs one frame.  Does nothing once the driver has quit.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            tasks_run: 0,
            repainted: 0,
            walked: 0,
            closed: 0,
            sweep: SweepReport::skipped(),
            state: self.state,
        };
        if self.state == DriverState::Quit {
            return report;
        }

        report.tasks_run = self.tasks.drain();
        self.poll_settings();
        self.platform.poll_events();

        for window in &mut self.windows {
            if window.state == WindowState::Open && window.surface.should_close() {
                window.state = WindowState::Closing;
            }
        }

        let now = self.cache.now();
        self.platform.advance_animations(now);

        self.refreshed.clear();
        let (repainted, walked) = self.draw_windows(now);
        report.repainted = repainted;
        report.walked = walked;

        report.sweep = self
            .cache
            .sweep(repainted > 0, &self.refreshed, self.painter.as_mut());

        report.closed = self.destroy_closing();
        if report.closed > 0 && self.windows.is_empty() {
            tracing::info!("last window closed");
            self.quit();
        }
        report.state = self.state;
        report
    }

    fn draw_windows(&mut self, now: Timestamp) -> (usize, usize) {
        let cache = self.cache.as_ref();
        let painter = self.painter.as_mut();
        let config = cache.config();
        // Walk a little before entries could expire.
        let walk_after = config.cache_duration.saturating_sub(config.walk_slack);

        let mut repainted = 0;
        let mut walked = 0;
        for window in self.windows.iter_mut() {
            if window.state == WindowState::Closing {
                continue;
            }
            let canvas_id = window.canvas.id();
            if !window.surface.is_visible() || !window.canvas.check_dirty_and_clear() {
                let due = window
                    .last_walked
                    .map_or(true, |at| now.duration_since(at) > walk_after);
                if due {
                    let touched = touch_tree(window.canvas.as_ref(), cache);
                    tracing::trace!(canvas = ?canvas_id, touched, "walked static canvas");
                    window.last_walked = Some(now);
                    walked += 1;
                }
                continue;
            }

            for object in window.canvas.take_dirty_textures() {
                cache.free_texture(object, &mut *painter);
            }
            painter.begin_frame(canvas_id);
            let painted = paint_tree(window.canvas.as_ref(), cache, &mut *painter);
            painter.end_frame(canvas_id);
            if window.surface.is_visible() {
                window.surface.swap_buffers();
            }
            tracing::trace!(canvas = ?canvas_id, painted, "repainted canvas");
            window.last_walked = Some(now);
            self.refreshed.push(canvas_id);
            repainted += 1;
        }
        (repainted, walked)
    }

    fn destroy_closing(&mut self) -> usize {
        let cache = self.cache.as_ref();
        let painter = self.painter.as_mut();
        let mut closed = 0;
        self.windows.retain_mut(|window| {
            if window.state != WindowState::Closing {
                return true;
            }
            let canvas = window.canvas.id();
            let removed = cache.clean_canvas(canvas, &mut *painter);
            window.surface.release_context();
            tracing::info!(?canvas, removed, "window closed");
            closed += 1;
            false
        });
        closed
    }

    fn poll_settings(&mut self) {
        let Some(settings) = &self.settings else {
            return;
        };
        let mut changed = false;
        while let Ok(change) = settings.try_recv() {
            tracing::debug!(theme = ?change.theme, "settings changed");
            changed = true;
        }
        if changed {
            self.apply_settings();
        }
    }

    /// Drops theme-derived caches and asks every canvas to re-apply theme
    /// and scale.
    pub fn apply_settings(&mut self) {
        self.painter.clear_font_cache();
        self.cache.reset_theme_caches();
        for window in &mut self.windows {
            window.canvas.apply_settings();
        }
    }

    /// Runs ticks at the configured rate until quit is requested or the last
    /// window closes.
    ///
    /// Queued frame tasks are run as they arrive, between ticks.
    pub fn run(&mut self) {
        if self.state != DriverState::Idle {
            tracing::debug!(state = ?self.state, "frame loop already started");
            return;
        }
        self.state = DriverState::Running;
        self.tasks.enter();
        self.platform.on_started();

        let ticker = crossbeam_channel::tick(self.config().tick_interval());
        let tasks = self.tasks.receiver().clone();
        let quit = self.quit_rx.clone();
        let mut settings = self.settings.clone().unwrap_or_else(never);

        while self.state != DriverState::Quit {
            let mut settings_closed = false;
            select! {
                recv(quit) -> _ => self.quit(),
                recv(tasks) -> task => {
                    if let Ok(task) = task {
                        task.run();
                    }
                }
                recv(settings) -> change => match change {
                    Ok(change) => {
                        tracing::debug!(theme = ?change.theme, "settings changed");
                        self.apply_settings();
                    }
                    Err(_) => settings_closed = true,
                },
                recv(ticker) -> _ => {
                    self.tick();
                }
            }
            if settings_closed {
                settings = never();
            }
        }

        self.tasks.exit();
        self.platform.on_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::object::{ObjectId, Position};
    use crate::painter::TextureHandle;
    use crate::walk::{RenderNode, SceneCanvas};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct NullPainter;

    impl Painter for NullPainter {
        fn create_texture(&mut self, object: ObjectId) -> Option<TextureHandle> {
            Some(TextureHandle(object.raw() as u32))
        }
        fn delete_texture(&mut self, _: TextureHandle) {}
        fn release_renderer(&mut self, _: ObjectId) {}
        fn paint(&mut self, _: ObjectId, _: Position, _: Option<TextureHandle>) {}
    }

    struct FlagSurface {
        close: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
    }

    impl Surface for FlagSurface {
        fn should_close(&self) -> bool {
            self.close.load(Ordering::SeqCst)
        }
        fn release_context(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct Headless;

    impl Platform for Headless {
        fn poll_events(&mut self) {}
    }

    fn driver() -> (FrameDriver<Headless>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(CacheManager::with_clock(CacheConfig::default(), clock.clone()));
        (FrameDriver::new(cache, Headless, Box::new(NullPainter)), clock)
    }

    fn window(close: &Arc<AtomicBool>, released: &Arc<AtomicBool>) -> Window {
        let mut canvas = SceneCanvas::new();
        canvas.add_root(RenderNode::plain(ObjectId::next()), Position::default());
        Window::new(
            Box::new(canvas),
            Box::new(FlagSurface {
                close: close.clone(),
                released: released.clone(),
            }),
        )
    }

    #[test]
    fn first_tick_repaints_then_idles() {
        let (mut driver, clock) = driver();
        let flag = Arc::new(AtomicBool::new(false));
        driver.add_window(window(&flag, &flag));

        let first = driver.tick();
        assert_eq!(first.repainted, 1);
        assert_eq!(first.walked, 0);

        clock.advance(Duration::from_millis(16));
        let second = driver.tick();
        assert_eq!(second.repainted, 0);
        assert_eq!(second.walked, 0);
    }

    #[test]
    fn closing_last_window_quits() {
        let (mut driver, _clock) = driver();
        let close = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));
        let id = driver.add_window(window(&close, &released));
        driver.tick();
        assert!(driver.cache().is_canvas_registered(id));

        close.store(true, Ordering::SeqCst);
        let report = driver.tick();
        assert_eq!(report.closed, 1);
        assert_eq!(report.state, DriverState::Quit);
        assert!(released.load(Ordering::SeqCst));
        assert!(!driver.cache().is_canvas_registered(id));

        // Ticks after quitting are inert.
        assert_eq!(driver.tick().repainted, 0);
    }

    #[test]
    fn no_windows_does_not_quit() {
        let (mut driver, _clock) = driver();
        assert_eq!(driver.tick().state, DriverState::Idle);
    }
}
