//! The single owner of every render cache in the process.
//!
//! One `CacheManager` is built at startup, wrapped in an `Arc`, and handed to
//! the frame driver and to whatever API surface needs cache access.
//!
//! Methods that can destroy GPU resources borrow the frame thread's
//! [`Painter`]; everything else is callable from any thread.

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};

use crate::cache::TypedCache;
use crate::clock::{Clock, SystemClock, Timestamp};
use crate::config::CacheConfig;
use crate::entries::{
    CanvasEntry, FontMetric, FontMetricKey, RendererEntry, SvgKey, SvgRaster, TextStyle,
    TextureEntry, ThemeOverride,
};
use crate::metrics::stats::Metrics;
use crate::object::{CanvasId, ObjectId, ObjectKind, Size, Widget};
use crate::painter::{Painter, TextureHandle};
use crate::scheduler::{SweepKind, SweepScheduler};

/// Snapshot of every cache's statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub font_metrics: Metrics,
    pub svgs: Metrics,
    pub canvases: Metrics,
    pub renderers: Metrics,
    pub textures: Metrics,
    pub overrides: Metrics,
}

impl CacheStats {
    /// All six caches summed.
    pub fn total(&self) -> Metrics {
        [
            self.svgs,
            self.canvases,
            self.renderers,
            self.textures,
            self.overrides,
        ]
        .into_iter()
        .fold(self.font_metrics, Metrics::merge)
    }
}

/// What one call to [`CacheManager::sweep`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub kind: SweepKind,
    /// Font metrics and icon rasters dropped.
    pub values_removed: usize,
    /// Canvas entries dropped.
    pub objects_unmounted: usize,
    /// Renderers destroyed (with their textures and overrides).
    pub renderers_destroyed: usize,
}

impl SweepReport {
    pub(crate) fn skipped() -> Self {
        SweepReport {
            kind: SweepKind::Skipped,
            values_removed: 0,
            objects_unmounted: 0,
            renderers_destroyed: 0,
        }
    }
}

pub struct CacheManager {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    font_metrics: TypedCache<FontMetricKey, FontMetric>,
    svgs: TypedCache<SvgKey, SvgRaster>,
    canvases: TypedCache<ObjectId, CanvasEntry>,
    renderers: TypedCache<ObjectId, RendererEntry>,
    // Textures and overrides never expire on their own; they live exactly as
    // long as the renderer or canvas entry they belong to.
    textures: TypedCache<ObjectId, TextureEntry>,
    overrides: TypedCache<ObjectId, ThemeOverride>,
    live_canvases: RwLock<AHashSet<CanvasId>>,
    scheduler: SweepScheduler,
    /// Serialises renderer/texture/override teardown per widget.
    teardown: Mutex<()>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = config.cache_duration;
        CacheManager {
            font_metrics: build(ttl, &clock),
            svgs: build(ttl, &clock),
            canvases: build(ttl, &clock),
            renderers: build(ttl, &clock),
            textures: build(Duration::MAX, &clock),
            overrides: build(Duration::MAX, &clock),
            live_canvases: RwLock::new(AHashSet::new()),
            scheduler: SweepScheduler::new(&config),
            teardown: Mutex::new(()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn scheduler(&self) -> &SweepScheduler {
        &self.scheduler
    }

    // -----------------------------------------------------------------------
    // Font metrics and icon rasters
    // -----------------------------------------------------------------------

    /// Cached size and baseline for a run of text, if measured recently.
    pub fn font_metrics(
        &self,
        text: &str,
        size: f32,
        style: TextStyle,
        source: Option<&str>,
    ) -> Option<FontMetric> {
        let key = FontMetricKey::new(text, size, style, source);
        self.font_metrics.get(&key).map(|m| *m)
    }

    pub fn set_font_metrics(
        &self,
        text: &str,
        size: f32,
        style: TextStyle,
        source: Option<&str>,
        measured: Size,
        baseline: f32,
    ) {
        let key = FontMetricKey::new(text, size, style, source);
        self.font_metrics.insert(
            key,
            FontMetric {
                size: measured,
                baseline,
            },
        );
    }

    pub fn svg(&self, key: &SvgKey) -> Option<Arc<SvgRaster>> {
        self.svgs.get(key)
    }

    pub fn set_svg(&self, key: SvgKey, raster: SvgRaster) {
        self.svgs.insert(key, raster);
    }

    /// Drops everything derived from the theme: icon rasters and text
    /// measurements.
    pub fn reset_theme_caches(&self) {
        self.svgs.clear();
        self.font_metrics.clear();
    }

    // -----------------------------------------------------------------------
    // Canvas membership
    // -----------------------------------------------------------------------

    pub fn register_canvas(&self, canvas: CanvasId) {
        self.live_canvases.write().insert(canvas);
    }

    pub fn is_canvas_registered(&self, canvas: CanvasId) -> bool {
        self.live_canvases.read().contains(&canvas)
    }

    /// The canvas `object` is mounted on, marking the entry alive.
    ///
    /// Returns `None` when the object is unknown, expired, or its canvas has
    /// been torn down.
    pub fn canvas_for_object(&self, object: ObjectId) -> Option<CanvasId> {
        let entry = self.canvases.get(&object)?;
        self.is_canvas_registered(entry.canvas).then_some(entry.canvas)
    }

    /// Records that `object` is mounted on `canvas`.
    pub fn set_canvas_for_object(&self, object: ObjectId, canvas: CanvasId, kind: ObjectKind) {
        let entry = CanvasEntry { canvas, kind };
        match self.canvases.get(&object) {
            Some(current) if *current == entry => {}
            _ => self.canvases.insert(object, entry),
        }
    }

    /// Marks a mounted object, and its renderer if it has one, alive
    /// without creating anything.  Returns `false` if `object` is not
    /// mounted.
    pub fn touch_object(&self, object: ObjectId) -> bool {
        if !self.canvases.touch(&object) {
            return false;
        }
        self.renderers.touch(&object);
        true
    }

    // -----------------------------------------------------------------------
    // Renderers and overrides
    // -----------------------------------------------------------------------

    /// The renderer for `widget`, created on first use.
    ///
    /// An expired renderer still waiting for the sweep is destroyed here
    /// rather than reused.
    pub fn renderer(&self, widget: &dyn Widget, painter: &mut dyn Painter) -> Arc<RendererEntry> {
        let id = widget.id();
        if let Some(entry) = self.renderers.get(&id) {
            return entry;
        }
        self.destroy_widget(id, painter, Some(self.now()));
        self.renderers.get_or_create(id, || RendererEntry {
            renderer: widget.create_renderer(),
        })
    }

    /// The renderer for `object` if one is alive; marks it alive.
    pub fn cached_renderer(&self, object: ObjectId) -> Option<Arc<RendererEntry>> {
        self.renderers.get(&object)
    }

    /// `true` if a live renderer exists, without extending its life.
    pub fn is_rendered(&self, object: ObjectId) -> bool {
        self.renderers.peek(&object).is_some()
    }

    pub fn set_override(&self, object: ObjectId, theme: ThemeOverride) {
        self.overrides.insert(object, theme);
    }

    pub fn override_for(&self, object: ObjectId) -> Option<Arc<ThemeOverride>> {
        self.overrides.get(&object)
    }

    // -----------------------------------------------------------------------
    // Textures
    // -----------------------------------------------------------------------

    /// The texture for `object`, uploading it on first use.
    ///
    /// A failed upload is not remembered; the next call tries again.
    pub fn texture(&self, object: ObjectId, painter: &mut dyn Painter) -> Option<TextureHandle> {
        let entry = self.textures.try_get_or_create(object, || {
            painter
                .create_texture(object)
                .map(|handle| TextureEntry { handle })
        });
        if entry.is_none() {
            tracing::warn!(?object, "texture creation failed, retrying on next paint");
        }
        entry.map(|e| e.handle)
    }

    pub fn cached_texture(&self, object: ObjectId) -> Option<TextureHandle> {
        self.textures.peek(&object).map(|e| e.handle)
    }

    /// Deletes the texture of `object`, if any.
    pub fn free_texture(&self, object: ObjectId, painter: &mut dyn Painter) -> bool {
        match self.textures.remove(&object) {
            Some(entry) => {
                painter.delete_texture(entry.handle);
                true
            }
            None => false,
        }
    }

    /// Destroys renderer, texture and override of `object` together.
    ///
    /// With `expired_at` set, nothing happens unless the renderer is expired
    /// at that instant.  Returns `true` if a renderer was destroyed.
    fn destroy_widget(
        &self,
        object: ObjectId,
        painter: &mut dyn Painter,
        expired_at: Option<Timestamp>,
    ) -> bool {
        let _tx = self.teardown.lock();
        let removed = match expired_at {
            Some(now) => self.renderers.remove_if_expired(&object, now),
            None => self.renderers.remove(&object),
        };
        let Some(entry) = removed else {
            return false;
        };
        entry.renderer.destroy();
        painter.release_renderer(object);
        self.free_texture(object, painter);
        self.overrides.remove(&object);
        true
    }

    // -----------------------------------------------------------------------
    // Sweeping and teardown
    // -----------------------------------------------------------------------

    /// Runs the per-tick cleanup decision and whatever sweep it calls for.
    ///
    /// `refreshed` lists the canvases repainted this tick. Expired canvas
    /// entries are dropped only for those canvases and for canvases no longer
    /// registered; a full sweep destroys every expired renderer.
    pub fn sweep(
        &self,
        did_repaint: bool,
        refreshed: &[CanvasId],
        painter: &mut dyn Painter,
    ) -> SweepReport {
        let now = self.now();
        let plan = self.scheduler.evaluate(now, did_repaint, refreshed);
        if plan.kind == SweepKind::Skipped {
            return SweepReport::skipped();
        }

        let mut report = SweepReport::skipped();
        report.kind = plan.kind;
        report.values_removed =
            self.svgs.sweep_expired(now).len() + self.font_metrics.sweep_expired(now).len();

        if plan.kind == SweepKind::Full {
            let (unmounted, destroyed) = self.sweep_canvases(now, &plan.canvases, painter);
            report.objects_unmounted = unmounted;
            report.renderers_destroyed = destroyed + self.sweep_renderers(now, painter);
        }

        tracing::debug!(
            kind = ?report.kind,
            values = report.values_removed,
            unmounted = report.objects_unmounted,
            renderers = report.renderers_destroyed,
            "cache sweep"
        );
        report
    }

    fn in_scope(&self, canvas: CanvasId, refreshed: &[CanvasId]) -> bool {
        refreshed.contains(&canvas) || !self.is_canvas_registered(canvas)
    }

    fn sweep_canvases(
        &self,
        now: Timestamp,
        refreshed: &[CanvasId],
        painter: &mut dyn Painter,
    ) -> (usize, usize) {
        let mut unmounted = 0;
        let mut destroyed = 0;
        for (object, entry) in self.canvases.expired_entries(now) {
            if !self.in_scope(entry.canvas, refreshed) {
                continue;
            }
            if self.canvases.remove_if_expired(&object, now).is_none() {
                continue;
            }
            unmounted += 1;
            match entry.kind {
                ObjectKind::Widget => {
                    if self.destroy_widget(object, painter, Some(now)) {
                        destroyed += 1;
                    }
                }
                ObjectKind::Plain => {
                    self.free_texture(object, painter);
                }
            }
        }
        (unmounted, destroyed)
    }

    fn sweep_renderers(&self, now: Timestamp, painter: &mut dyn Painter) -> usize {
        let mut destroyed = 0;
        for (object, _) in self.renderers.expired_entries(now) {
            if self.destroy_widget(object, painter, Some(now)) {
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Immediately forgets everything mounted on `canvas`, destroying the
    /// renderers, textures and overrides of its objects.
    ///
    /// Used when a window closes; returns the number of objects removed.
    pub fn clean_canvas(&self, canvas: CanvasId, painter: &mut dyn Painter) -> usize {
        self.live_canvases.write().remove(&canvas);
        let mut removed = 0;
        self.canvases.range(|object, _| {
            let Some(entry) = self.canvases.remove_if(object, |e| e.canvas == canvas) else {
                return true;
            };
            removed += 1;
            match entry.kind {
                ObjectKind::Widget => {
                    self.destroy_widget(*object, &mut *painter, None);
                }
                ObjectKind::Plain => {
                    self.free_texture(*object, &mut *painter);
                }
            }
            true
        });
        tracing::debug!(?canvas, removed, "canvas cleaned");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            font_metrics: self.font_metrics.stats(),
            svgs: self.svgs.stats(),
            canvases: self.canvases.stats(),
            renderers: self.renderers.stats(),
            textures: self.textures.stats(),
            overrides: self.overrides.stats(),
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::from_env())
    }
}

fn build<K, V>(ttl: Duration, clock: &Arc<dyn Clock>) -> TypedCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    TypedCache::builder()
        .time_to_idle(ttl)
        .clock(Arc::clone(clock))
        .build()
}
