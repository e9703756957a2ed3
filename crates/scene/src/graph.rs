//! Retained-mode scene graph.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Each node
//! carries a local [`Transform`]; world matrices are the product of the parent
//! chain. A node may carry a [`Renderable`], which is what the renderer draws
//! and the raycaster tests against.

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::transform::Transform;

/// Handle to a node in a [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to mesh geometry uploaded by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Handle to a texture/material uploaded by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("unknown scene node {0:?}")]
    UnknownNode(NodeId),

    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

pub type SceneResult<T> = std::result::Result<T, SceneError>;

/// Drawable payload of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Renderable {
    pub mesh: MeshId,
    pub material: MaterialId,
    /// Color multiplied with the texture.
    pub base_color: Vec3,
    /// Replaces `base_color` while set (hover highlight).
    pub highlight: Option<Vec3>,
    /// Unlit, e.g. the sun and orbit rings.
    pub emissive: bool,
    /// Considered by the raycaster.
    pub pickable: bool,
    /// Bounding-sphere radius in local units.
    pub pick_radius: f32,
}

impl Renderable {
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            mesh,
            material,
            base_color: Vec3::ONE,
            highlight: None,
            emissive: false,
            pickable: false,
            pick_radius: 1.0,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    pub fn emissive(mut self) -> Self {
        self.emissive = true;
        self
    }

    /// Make the node pickable with the given local bounding radius.
    pub fn pickable(mut self, radius: f32) -> Self {
        self.pickable = true;
        self.pick_radius = radius;
        self
    }

    /// Color the renderer should use this frame.
    pub fn color(&self) -> Vec3 {
        self.highlight.unwrap_or(self.base_color)
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub renderable: Option<Renderable>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A visible renderable with its composed world matrix.
#[derive(Clone, Copy, Debug)]
pub struct VisibleNode<'a> {
    pub id: NodeId,
    pub world: Mat4,
    pub renderable: &'a Renderable,
}

/// Arena of nodes forming a forest.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a node under `parent`, or as a root when `parent` is `None`.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        parent: Option<NodeId>,
    ) -> SceneResult<NodeId> {
        if let Some(p) = parent {
            self.node(p)?;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            name: name.into(),
            transform,
            visible: true,
            renderable: None,
            parent,
            children: Vec::new(),
        }));

        match parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(SceneError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SceneError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn transform_mut(&mut self, id: NodeId) -> SceneResult<&mut Transform> {
        Ok(&mut self.node_mut(id)?.transform)
    }

    pub fn set_renderable(&mut self, id: NodeId, renderable: Renderable) -> SceneResult<()> {
        self.node_mut(id)?.renderable = Some(renderable);
        Ok(())
    }

    pub fn renderable_mut(&mut self, id: NodeId) -> SceneResult<Option<&mut Renderable>> {
        Ok(self.node_mut(id)?.renderable.as_mut())
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> SceneResult<()> {
        self.node_mut(id)?.visible = visible;
        Ok(())
    }

    /// First node with the given name, in creation order.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(i, n)| {
            n.as_ref()
                .filter(|n| n.name == name)
                .map(|_| NodeId(i as u32))
        })
    }

    /// Composed matrix from the root down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> SceneResult<Mat4> {
        let node = self.node(id)?;
        let local = node.transform.local_matrix();
        match node.parent {
            Some(parent) => Ok(self.world_matrix(parent)? * local),
            None => Ok(local),
        }
    }

    pub fn world_position(&self, id: NodeId) -> SceneResult<Vec3> {
        Ok(self.world_matrix(id)?.transform_point3(Vec3::ZERO))
    }

    /// Whether `ancestor` appears on the parent chain of `id` (or is `id`).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> SceneResult<bool> {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return Ok(true);
            }
            current = self.node(c)?.parent;
        }
        Ok(false)
    }

    /// Move `child` under `parent` (or to the roots). The local transform is
    /// kept as-is, so the world position changes with the new parent.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> SceneResult<()> {
        self.node(child)?;
        if let Some(p) = parent
            && self.is_ancestor(child, p)?
        {
            return Err(SceneError::Cycle { child, parent: p });
        }

        self.detach(child)?;
        self.node_mut(child)?.parent = parent;
        match parent {
            Some(p) => self.node_mut(p)?.children.push(child),
            None => self.roots.push(child),
        }
        Ok(())
    }

    /// Remove `id` and all of its descendants. Returns how many nodes were
    /// removed. Handles to removed nodes become invalid.
    pub fn remove_subtree(&mut self, id: NodeId) -> SceneResult<usize> {
        self.detach(id)?;

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.index()).and_then(Option::take) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Every renderable whose node and ancestors are visible, with world
    /// matrices, in depth-first order from the roots.
    pub fn visible_renderables(&self) -> Vec<VisibleNode<'_>> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, Mat4)> =
            self.roots.iter().rev().map(|&r| (r, Mat4::IDENTITY)).collect();

        while let Some((id, parent_world)) = stack.pop() {
            let Ok(node) = self.node(id) else { continue };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.local_matrix();
            if let Some(renderable) = &node.renderable {
                out.push(VisibleNode {
                    id,
                    world,
                    renderable,
                });
            }
            stack.extend(node.children.iter().rev().map(|&c| (c, world)));
        }
        out
    }

    fn detach(&mut self, id: NodeId) -> SceneResult<()> {
        match self.node(id)?.parent {
            Some(p) => self.node_mut(p)?.children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
        Ok(())
    }
}
