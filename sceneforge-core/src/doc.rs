//! JSON scene documents.
//!
//! A [`SceneDocument`] is the serialized form of a [`Scene`]: shared mesh
//! and image pools are flattened into keyed tables and nodes reference
//! them by key, so instancing survives a save/load round trip instead of
//! being silently duplicated. The CLI uses documents to pipe a scene
//! between import, cleanup, and export runs.

use crate::scene::{ImageRef, MeshData, NodeKind, Scene, Transform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Current document format version.
pub const FORMAT_VERSION: u32 = 1;

/// Errors raised while reading or writing scene documents.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unsupported document version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),

    #[error("node {node} references unknown mesh key {key}")]
    UnknownMesh { node: String, key: String },

    #[error("node {node} references unknown image key {key}")]
    UnknownImage { node: String, key: String },

    #[error("node {node} references unknown parent {parent}")]
    UnknownParent { node: String, parent: String },

    #[error("mesh node {0} carries no geometry key")]
    MissingGeometry(String),

    #[error("duplicate node name {0}")]
    DuplicateName(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct MeshEntry {
    key: String,
    #[serde(flatten)]
    mesh: MeshData,
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageEntry {
    key: String,
    #[serde(flatten)]
    image: ImageRef,
}

#[derive(Debug, Serialize, Deserialize)]
struct MaterialEntry {
    name: String,
    images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeEntry {
    name: String,
    kind: NodeKind,
    transform: Transform,
    parent: Option<String>,
    mesh: Option<String>,
    materials: Vec<MaterialEntry>,
}

/// Serialized scene graph with shared pools flattened into keyed tables.
#[derive(Debug, Serialize, Deserialize)]
pub struct SceneDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    meshes: Vec<MeshEntry>,
    images: Vec<ImageEntry>,
    nodes: Vec<NodeEntry>,
}

impl SceneDocument {
    /// Snapshot a scene into document form.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut mesh_keys: HashMap<*const MeshData, String> = HashMap::new();
        let mut image_keys: HashMap<*const ImageRef, String> = HashMap::new();
        let mut meshes = Vec::new();
        let mut images = Vec::new();
        let mut nodes = Vec::new();

        for id in scene.ids() {
            let node = scene.node(id).expect("id came from the scene");
            let mesh_key = node.mesh.as_ref().map(|mesh| {
                mesh_keys
                    .entry(Arc::as_ptr(mesh))
                    .or_insert_with(|| {
                        let key = format!("mesh{}", meshes.len());
                        meshes.push(MeshEntry {
                            key: key.clone(),
                            mesh: (**mesh).clone(),
                        });
                        key
                    })
                    .clone()
            });
            let materials = node
                .materials
                .iter()
                .map(|material| MaterialEntry {
                    name: material.name.clone(),
                    images: material
                        .images
                        .iter()
                        .map(|image| {
                            image_keys
                                .entry(Arc::as_ptr(image))
                                .or_insert_with(|| {
                                    let key = format!("img{}", images.len());
                                    images.push(ImageEntry {
                                        key: key.clone(),
                                        image: (**image).clone(),
                                    });
                                    key
                                })
                                .clone()
                        })
                        .collect(),
                })
                .collect();
            let parent = node
                .parent
                .and_then(|pid| scene.node(pid))
                .map(|p| p.name.clone());
            nodes.push(NodeEntry {
                name: node.name.clone(),
                kind: node.kind,
                transform: node.world_transform,
                parent,
                mesh: mesh_key,
                materials,
            });
        }

        SceneDocument {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            meshes,
            images,
            nodes,
        }
    }

    /// Rebuild a live scene, restoring mesh/image sharing from the keyed
    /// tables.
    pub fn to_scene(&self) -> Result<Scene, SceneError> {
        if self.version != FORMAT_VERSION {
            return Err(SceneError::UnsupportedVersion(self.version));
        }

        let mesh_pool: HashMap<&str, Arc<MeshData>> = self
            .meshes
            .iter()
            .map(|entry| (entry.key.as_str(), Arc::new(entry.mesh.clone())))
            .collect();
        let image_pool: HashMap<&str, Arc<ImageRef>> = self
            .images
            .iter()
            .map(|entry| (entry.key.as_str(), Arc::new(entry.image.clone())))
            .collect();

        let mut scene = Scene::new();
        for entry in &self.nodes {
            if scene.find_by_name(&entry.name).is_some() {
                return Err(SceneError::DuplicateName(entry.name.clone()));
            }
            let mesh = match &entry.mesh {
                Some(key) => Some(Arc::clone(mesh_pool.get(key.as_str()).ok_or_else(
                    || SceneError::UnknownMesh {
                        node: entry.name.clone(),
                        key: key.clone(),
                    },
                )?)),
                None => None,
            };
            let id = match entry.kind {
                NodeKind::Mesh => {
                    let mesh =
                        mesh.ok_or_else(|| SceneError::MissingGeometry(entry.name.clone()))?;
                    scene.add_mesh(entry.name.clone(), entry.transform, mesh)
                }
                NodeKind::Placeholder => scene.add_placeholder(entry.name.clone(), entry.transform),
            };
            let node = scene.node_mut(id).expect("just created");
            for material in &entry.materials {
                let mut resolved = Vec::with_capacity(material.images.len());
                for key in &material.images {
                    let image =
                        image_pool
                            .get(key.as_str())
                            .ok_or_else(|| SceneError::UnknownImage {
                                node: entry.name.clone(),
                                key: key.clone(),
                            })?;
                    resolved.push(Arc::clone(image));
                }
                node.materials.push(crate::scene::Material {
                    name: material.name.clone(),
                    images: resolved,
                });
            }
        }

        // Parents resolve by name after every node exists.
        for entry in &self.nodes {
            let Some(parent_name) = &entry.parent else {
                continue;
            };
            let parent =
                scene
                    .find_by_name(parent_name)
                    .ok_or_else(|| SceneError::UnknownParent {
                        node: entry.name.clone(),
                        parent: parent_name.clone(),
                    })?;
            let child = scene
                .find_by_name(&entry.name)
                .expect("created in the first pass");
            scene.set_parent(child, Some(parent));
        }

        Ok(scene)
    }

    /// Write the document as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes)?;
        info!(path = %path.display(), nodes = self.nodes.len(), "scene document saved");
        Ok(())
    }

    /// Read a document from disk.
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let bytes = fs::read(path)?;
        let document: SceneDocument = serde_json::from_slice(&bytes)?;
        info!(path = %path.display(), nodes = document.nodes.len(), "scene document loaded");
        Ok(document)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Convenience: serialize `scene` straight to `path`.
pub fn save_scene(scene: &Scene, path: &Path) -> Result<(), SceneError> {
    SceneDocument::from_scene(scene).save(path)
}

/// Convenience: load the scene stored at `path`.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    SceneDocument::load(path)?.to_scene()
}
