//! Identities and capabilities of the things the caches are keyed on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);
static NEXT_CANVAS: AtomicU64 = AtomicU64::new(1);

/// Identity of a canvas object (widgets included).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocates a process-unique id.
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        ObjectId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Identity of a canvas.  Cache entries hold this instead of the canvas
/// itself, so a closed canvas is never kept alive by the cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanvasId(u64);

impl CanvasId {
    pub fn next() -> Self {
        CanvasId(NEXT_CANVAS.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        CanvasId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canvas#{}", self.0)
    }
}

/// Capability tag recorded when an object is first mounted, so sweeps never
/// need to ask the object what it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Drawn directly by the painter; may own a texture.
    Plain,
    /// Drawn through a cached [`Renderer`].
    Widget,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Position { x, y }
    }
}

impl std::ops::Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Size { width, height }
    }
}

/// Something that holds resources which must be given back exactly once.
pub trait Destroyable: Send + Sync {
    fn destroy(&self);
}

/// Draws one widget.  Owned by the renderer cache; `destroy` is called when
/// the cache lets go of it.
pub trait Renderer: Destroyable {}

impl<T: Destroyable> Renderer for T {}

/// A widget: a canvas object whose drawing goes through a renderer.
pub trait Widget: Send + Sync {
    fn id(&self) -> ObjectId;

    fn create_renderer(&self) -> Box<dyn Renderer>;
}

/// How a tree node is drawn, decided once when the node is built.
#[derive(Clone)]
pub enum Capability {
    Plain,
    Widget(Arc<dyn Widget>),
}

impl Capability {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Capability::Plain => ObjectKind::Plain,
            Capability::Widget(_) => ObjectKind::Widget,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Plain => f.write_str("Plain"),
            Capability::Widget(w) => f.debug_tuple("Widget").field(&w.id()).finish(),
        }
    }
}
