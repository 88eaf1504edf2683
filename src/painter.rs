//! The graphics capability consumed by the cache core.
//!
//! A `Painter` is bound to the frame thread's graphics context.  It is not
//! required to be `Send`; every cache operation that can destroy a GPU
//! resource borrows one, which keeps those operations on the frame thread.

use crate::object::{CanvasId, ObjectId, Position};

/// Opaque GPU texture name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

pub trait Painter {
    /// Uploads the texture for `object`.  `None` means creation failed; the
    /// painter reports the failure itself and the core simply retries on the
    /// next access.
    fn create_texture(&mut self, object: ObjectId) -> Option<TextureHandle>;

    fn delete_texture(&mut self, handle: TextureHandle);

    /// Releases whatever GPU state the painter keeps for a widget renderer.
    fn release_renderer(&mut self, object: ObjectId);

    fn paint(&mut self, object: ObjectId, position: Position, texture: Option<TextureHandle>);

    fn begin_frame(&mut self, _canvas: CanvasId) {}

    fn end_frame(&mut self, _canvas: CanvasId) {}

    /// Drops glyph caches held by the painter after a theme or font change.
    fn clear_font_cache(&mut self) {}
}
