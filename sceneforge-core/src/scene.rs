//! Scene graph store: a flat pool of named nodes with cached world
//! transforms and shared geometry/image data.
//!
//! The graph owns every node; parent/child relations are id-based
//! back-references, never ownership, so removing a parent can detach its
//! children without dangling links. Mesh geometry and image pixels are
//! shared between nodes through `Arc` and are dropped together with the
//! last node that references them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of a node inside a [`Scene`]. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// What a node contributes to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Renderable node referencing shared mesh geometry.
    Mesh,
    /// Non-renderable organizational node (groups children, no geometry).
    Placeholder,
}

/// World-space placement of a node: translation, rotation (quaternion,
/// `[x, y, z, w]`) and non-uniform scale.
///
/// The value is a cached snapshot, not a live function of the parent
/// chain. Structural edits (reparenting, ancestor removal) do not keep it
/// numerically correct on their own; callers that mutate the hierarchy
/// must capture and restore transforms themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };

    /// Returns the same placement mirrored across the YZ plane.
    pub fn mirrored_x(mut self) -> Transform {
        self.scale[0] = -self.scale[0];
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Vertex data for mesh geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub uv: Option<[f32; 2]>,
}

/// Geometry payload shared by any number of mesh nodes (instancing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Realized pixel data for an image, RGBA8 row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePixels {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

/// Reference to named image data, shared by any material that uses it.
/// `pixels` is `None` for images whose data was never realized; export
/// skips those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub pixels: Option<ImagePixels>,
}

/// Material slot on a mesh node; carries the images its shader samples.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub images: Vec<Arc<ImageRef>>,
}

/// A named entity in the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub world_transform: Transform,
    pub parent: Option<NodeId>,
    pub mesh: Option<Arc<MeshData>>,
    pub materials: Vec<Material>,
}

/// Flat, id-keyed store of scene nodes with a name index.
///
/// Node names are unique among live nodes; a removed node's name becomes
/// available again. Creating a node under a name that is still live is a
/// caller error and is debug-asserted rather than validated.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh node referencing shared geometry. Returns its id.
    pub fn add_mesh(
        &mut self,
        name: impl Into<String>,
        world_transform: Transform,
        mesh: Arc<MeshData>,
    ) -> NodeId {
        self.insert(name.into(), NodeKind::Mesh, world_transform, Some(mesh))
    }

    /// Add a non-renderable placeholder node. Returns its id.
    pub fn add_placeholder(&mut self, name: impl Into<String>, world_transform: Transform) -> NodeId {
        self.insert(name.into(), NodeKind::Placeholder, world_transform, None)
    }

    fn insert(
        &mut self,
        name: String,
        kind: NodeKind,
        world_transform: Transform,
        mesh: Option<Arc<MeshData>>,
    ) -> NodeId {
        debug_assert!(
            !self.names.contains_key(&name),
            "node name {name:?} is already live"
        );
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.names.insert(name.clone(), id);
        self.nodes.insert(
            id,
            Node {
                id,
                name,
                kind,
                world_transform,
                parent: None,
                mesh,
                materials: Vec::new(),
            },
        );
        id
    }

    /// Remove a node, detaching its children to the root first. Children
    /// are never destroyed together with a parent. Returns the removed
    /// node, or `None` if the id is not live.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        let child_ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.parent == Some(id))
            .map(|n| n.id)
            .collect();
        for child in child_ids {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = None;
            }
        }
        let node = self.nodes.remove(&id)?;
        self.names.remove(&node.name);
        Some(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Look up a live node by its unique name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Reattach a node below a new parent (or detach it with `None`).
    /// The node's cached world transform is left untouched.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) {
        debug_assert!(parent.map_or(true, |p| self.nodes.contains_key(&p)));
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = parent;
        }
    }

    /// Ids of the direct children of `id`.
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.parent == Some(id))
            .map(|n| n.id)
            .collect();
        children.sort();
        children
    }

    /// All live node ids, in creation order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
