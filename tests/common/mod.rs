#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use paintcache::driver::Surface;
use paintcache::object::{CanvasId, Destroyable, ObjectId, Position, Renderer, Widget};
use paintcache::painter::{Painter, TextureHandle};

/// Everything a [`RecordingPainter`] was asked to do.
#[derive(Debug, Default)]
pub struct PaintLog {
    pub created: Vec<ObjectId>,
    pub deleted: Vec<TextureHandle>,
    pub released: Vec<ObjectId>,
    pub painted: Vec<ObjectId>,
    pub frames: Vec<CanvasId>,
    pub font_cache_clears: usize,
    pub fail_textures: bool,
    next_handle: u32,
}

#[derive(Clone, Default)]
pub struct RecordingPainter {
    pub log: Arc<Mutex<PaintLog>>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Painter for RecordingPainter {
    fn create_texture(&mut self, object: ObjectId) -> Option<TextureHandle> {
        let mut log = self.log.lock();
        if log.fail_textures {
            return None;
        }
        log.next_handle += 1;
        log.created.push(object);
        Some(TextureHandle(log.next_handle))
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        self.log.lock().deleted.push(handle);
    }

    fn release_renderer(&mut self, object: ObjectId) {
        self.log.lock().released.push(object);
    }

    fn paint(&mut self, object: ObjectId, _position: Position, _texture: Option<TextureHandle>) {
        self.log.lock().painted.push(object);
    }

    fn begin_frame(&mut self, canvas: CanvasId) {
        self.log.lock().frames.push(canvas);
    }

    fn clear_font_cache(&mut self) {
        self.log.lock().font_cache_clears += 1;
    }
}

pub struct CountingRenderer {
    destroyed: Arc<AtomicUsize>,
}

impl Destroyable for CountingRenderer {
    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A widget that counts how many renderers it made and how many were
/// destroyed.
pub struct TestWidget {
    id: ObjectId,
    pub created: AtomicUsize,
    pub destroyed: Arc<AtomicUsize>,
}

impl TestWidget {
    pub fn new() -> Arc<Self> {
        Arc::new(TestWidget {
            id: ObjectId::next(),
            created: AtomicUsize::new(0),
            destroyed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Widget for TestWidget {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn create_renderer(&self) -> Box<dyn Renderer> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingRenderer {
            destroyed: Arc::clone(&self.destroyed),
        })
    }
}

/// A surface that closes when its shared flag is set.
#[derive(Clone, Default)]
pub struct TestSurface {
    pub close: Arc<std::sync::atomic::AtomicBool>,
    pub released: Arc<AtomicUsize>,
    pub swaps: Arc<AtomicUsize>,
}

impl TestSurface {
    pub fn request_close(&self) {
        self.close.store(true, Ordering::SeqCst);
    }
}

impl Surface for TestSurface {
    fn should_close(&self) -> bool {
        self.close.load(Ordering::SeqCst)
    }

    fn swap_buffers(&mut self) {
        self.swaps.fetch_add(1, Ordering::SeqCst);
    }

    fn release_context(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
