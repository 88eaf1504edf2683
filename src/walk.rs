//! Traversal of a window's object tree.
//!
//! The same traversal serves two purposes: painting a dirty canvas, which
//! creates or reuses cache entries as it goes, and keeping a static canvas's
//! entries alive, which only touches what already exists.

use std::sync::Arc;

use crate::manager::CacheManager;
use crate::object::{Capability, CanvasId, ObjectId, ObjectKind, Position, Widget};
use crate::painter::Painter;

/// One object in a canvas tree, as seen by the cache core.
#[derive(Clone, Debug)]
pub struct RenderNode {
    pub object: ObjectId,
    pub capability: Capability,
    /// Painted from a GPU texture owned by the texture cache.
    pub textured: bool,
}

impl RenderNode {
    pub fn plain(object: ObjectId) -> Self {
        RenderNode {
            object,
            capability: Capability::Plain,
            textured: false,
        }
    }

    pub fn textured(object: ObjectId) -> Self {
        RenderNode {
            object,
            capability: Capability::Plain,
            textured: true,
        }
    }

    pub fn widget(widget: Arc<dyn Widget>) -> Self {
        RenderNode {
            object: widget.id(),
            capability: Capability::Widget(widget),
            textured: false,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.capability.kind()
    }
}

/// The canvas capability consumed by the frame driver.
pub trait Canvas {
    fn id(&self) -> CanvasId;

    /// Returns whether the content changed since the last paint, and clears
    /// the flag.
    fn check_dirty_and_clear(&mut self) -> bool;

    fn set_dirty(&mut self);

    /// Visits every mounted object with its absolute position, parents
    /// before children.
    fn walk_tree(&self, visit: &mut dyn FnMut(&RenderNode, Position));

    /// Objects whose texture content changed and must be re-uploaded.
    fn take_dirty_textures(&mut self) -> Vec<ObjectId> {
        Vec::new()
    }

    /// Re-applies theme and scale after a settings change.
    fn apply_settings(&mut self) {
        self.set_dirty();
    }
}

/// Paints every object of `canvas`, registering it in the canvas cache and
/// fetching (or creating) its renderer and texture on the way.
///
/// Returns the number of objects painted.
pub fn paint_tree(canvas: &dyn Canvas, cache: &CacheManager, painter: &mut dyn Painter) -> usize {
    let canvas_id = canvas.id();
    let mut painted = 0;
    canvas.walk_tree(&mut |node, position| {
        cache.set_canvas_for_object(node.object, canvas_id, node.kind());
        if let Capability::Widget(widget) = &node.capability {
            cache.renderer(widget.as_ref(), &mut *painter);
        }
        let texture = if node.textured {
            cache.texture(node.object, &mut *painter)
        } else {
            None
        };
        painter.paint(node.object, position, texture);
        painted += 1;
    });
    painted
}

/// Extends the life of every mounted object of `canvas` without painting
/// or creating anything.  Returns the number of entries touched.
pub fn touch_tree(canvas: &dyn Canvas, cache: &CacheManager) -> usize {
    let mut touched = 0;
    canvas.walk_tree(&mut |node, _| {
        if cache.touch_object(node.object) {
            touched += 1;
        }
    });
    touched
}

// ---------------------------------------------------------------------------
// SceneCanvas
// ---------------------------------------------------------------------------

struct SceneNode {
    node: RenderNode,
    offset: Position,
    children: Vec<usize>,
}

/// A retained object tree that implements [`Canvas`].
///
/// Nodes are positioned relative to their parent; removal takes the whole
/// subtree with it.
pub struct SceneCanvas {
    id: CanvasId,
    nodes: Vec<Option<SceneNode>>,
    roots: Vec<usize>,
    dirty: bool,
    dirty_textures: Vec<ObjectId>,
}

impl SceneCanvas {
    pub fn new() -> Self {
        SceneCanvas {
            id: CanvasId::next(),
            nodes: Vec::new(),
            roots: Vec::new(),
            dirty: true,
            dirty_textures: Vec::new(),
        }
    }

    fn push(&mut self, node: RenderNode, offset: Position) -> usize {
        self.dirty = true;
        self.nodes.push(Some(SceneNode {
            node,
            offset,
            children: Vec::new(),
        }));
        self.nodes.len() - 1
    }

    /// Adds a top-level object and returns its slot.
    pub fn add_root(&mut self, node: RenderNode, offset: Position) -> usize {
        let slot = self.push(node, offset);
        self.roots.push(slot);
        slot
    }

    /// Adds `node` under `parent`.  Returns `None` if `parent` is gone.
    pub fn add_child(&mut self, parent: usize, node: RenderNode, offset: Position) -> Option<usize> {
        self.nodes.get(parent)?.as_ref()?;
        let slot = self.push(node, offset);
        if let Some(Some(p)) = self.nodes.get_mut(parent) {
            p.children.push(slot);
        }
        Some(slot)
    }

    /// Unmounts `slot` and everything below it.
    pub fn remove(&mut self, slot: usize) {
        let Some(removed) = self.nodes.get_mut(slot).and_then(Option::take) else {
            return;
        };
        for child in removed.children {
            self.remove(child);
        }
        self.roots.retain(|&r| r != slot);
        for node in self.nodes.iter_mut().flatten() {
            node.children.retain(|&c| c != slot);
        }
        self.dirty = true;
    }

    /// Asks for `object`'s texture to be re-uploaded on the next paint.
    pub fn invalidate_texture(&mut self, object: ObjectId) {
        self.dirty_textures.push(object);
        self.dirty = true;
    }

    fn visit(&self, slot: usize, origin: Position, visit: &mut dyn FnMut(&RenderNode, Position)) {
        let Some(Some(scene)) = self.nodes.get(slot) else {
            return;
        };
        let at = origin + scene.offset;
        visit(&scene.node, at);
        for &child in &scene.children {
            self.visit(child, at, visit);
        }
    }
}

impl Default for SceneCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas for SceneCanvas {
    fn id(&self) -> CanvasId {
        self.id
    }

    fn check_dirty_and_clear(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn set_dirty(&mut self) {
        self.dirty = true;
    }

    fn walk_tree(&self, visit: &mut dyn FnMut(&RenderNode, Position)) {
        for &root in &self.roots {
            self.visit(root, Position::default(), visit);
        }
    }

    fn take_dirty_textures(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.dirty_textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(canvas: &SceneCanvas) -> Vec<(ObjectId, Position)> {
        let mut out = Vec::new();
        canvas.walk_tree(&mut |node, pos| out.push((node.object, pos)));
        out
    }

    #[test]
    fn walk_yields_absolute_positions_parent_first() {
        let mut canvas = SceneCanvas::new();
        let a = ObjectId::from_raw(1);
        let b = ObjectId::from_raw(2);
        let root = canvas.add_root(RenderNode::plain(a), Position::new(10.0, 10.0));
        canvas
            .add_child(root, RenderNode::plain(b), Position::new(5.0, 0.0))
            .unwrap();
        assert_eq!(
            collect(&canvas),
            vec![(a, Position::new(10.0, 10.0)), (b, Position::new(15.0, 10.0))]
        );
    }

    #[test]
    fn remove_takes_subtree() {
        let mut canvas = SceneCanvas::new();
        let root = canvas.add_root(RenderNode::plain(ObjectId::from_raw(1)), Position::default());
        let child = canvas
            .add_child(root, RenderNode::plain(ObjectId::from_raw(2)), Position::default())
            .unwrap();
        canvas
            .add_child(child, RenderNode::plain(ObjectId::from_raw(3)), Position::default())
            .unwrap();
        canvas.remove(child);
        assert_eq!(collect(&canvas).len(), 1);
        assert!(canvas.add_child(child, RenderNode::plain(ObjectId::from_raw(4)), Position::default()).is_none());
    }

    #[test]
    fn dirty_flag_clears_once() {
        let mut canvas = SceneCanvas::new();
        assert!(canvas.check_dirty_and_clear());
        assert!(!canvas.check_dirty_and_clear());
        canvas.apply_settings();
        assert!(canvas.check_dirty_and_clear());
    }
}
