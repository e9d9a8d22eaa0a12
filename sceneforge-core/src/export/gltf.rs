//! Built-in glTF 2.0 geometry exporter, the generic interchange target.
//!
//! Shared mesh data is deduplicated: nodes that instance the same
//! geometry reference one glTF mesh. Buffers are embedded as base64 data
//! URIs so the output is a single self-contained file; textures travel
//! separately in the surrounding archive.

use crate::export::package::{ExportError, ExportFormat, ExportOptions, GeometryExporter};
use crate::scene::{MeshData, NodeId, Scene, Transform};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UINT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

pub struct GltfExporter;

impl GltfExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GltfExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryExporter for GltfExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Gltf
    }

    fn export(
        &self,
        scene: &Scene,
        selection: &[NodeId],
        options: &ExportOptions,
        path: &Path,
    ) -> Result<(), ExportError> {
        let mut meshes: Vec<Arc<MeshData>> = Vec::new();
        let mut gltf_nodes = Vec::new();

        for id in selection {
            let node = match scene.node(*id) {
                Some(node) => node,
                None => return Err(ExportError::MissingNode(*id)),
            };
            let Some(mesh) = &node.mesh else {
                debug!(node = %node.name, "selected node carries no geometry, skipped");
                continue;
            };
            let mesh_index = match meshes.iter().position(|m| Arc::ptr_eq(m, mesh)) {
                Some(index) => index,
                None => {
                    meshes.push(Arc::clone(mesh));
                    meshes.len() - 1
                }
            };
            let transform = if options.preserve_transforms {
                node.world_transform
            } else {
                axis_corrected(&node.world_transform)
            };
            gltf_nodes.push(json!({
                "name": node.name,
                "mesh": mesh_index,
                "translation": transform.translation,
                "rotation": transform.rotation,
                "scale": transform.scale,
            }));
        }

        let mut buffers = Vec::new();
        let mut buffer_views = Vec::new();
        let mut accessors = Vec::new();
        let mut gltf_meshes = Vec::new();

        for mesh in &meshes {
            let entry = encode_mesh(mesh, buffers.len(), &mut buffer_views, &mut accessors);
            buffers.push(entry.buffer);
            gltf_meshes.push(entry.mesh);
        }

        let scene_node_indices: Vec<usize> = (0..gltf_nodes.len()).collect();
        let document = json!({
            "asset": {
                "version": "2.0",
                "generator": format!("SceneForge v{}", env!("CARGO_PKG_VERSION")),
            },
            "scene": 0,
            "scenes": [{ "name": "Scene", "nodes": scene_node_indices }],
            "nodes": gltf_nodes,
            "meshes": gltf_meshes,
            "accessors": accessors,
            "bufferViews": buffer_views,
            "buffers": buffers,
        });

        let bytes = serde_json::to_vec_pretty(&document)?;
        fs::write(path, bytes)?;
        debug!(path = %path.display(), meshes = meshes.len(), "glTF written");
        Ok(())
    }
}

struct EncodedMesh {
    buffer: serde_json::Value,
    mesh: serde_json::Value,
}

/// Serialize one mesh into an embedded buffer with vertex and index
/// views, registering buffer views and accessors as it goes.
fn encode_mesh(
    mesh: &MeshData,
    buffer_index: usize,
    buffer_views: &mut Vec<serde_json::Value>,
    accessors: &mut Vec<serde_json::Value>,
) -> EncodedMesh {
    let has_normals = mesh.vertices.iter().any(|v| v.normal.is_some());
    let has_uvs = mesh.vertices.iter().any(|v| v.uv.is_some());
    let vertex_count = mesh.vertices.len();

    let mut binary: Vec<u8> = Vec::new();
    let mut attributes = serde_json::Map::new();

    // POSITION
    let (min, max) = position_bounds(mesh);
    attributes.insert("POSITION".to_string(), json!(accessors.len()));
    accessors.push(json!({
        "bufferView": buffer_views.len(),
        "byteOffset": binary.len(),
        "componentType": COMPONENT_FLOAT,
        "count": vertex_count,
        "type": "VEC3",
        "min": min,
        "max": max,
    }));
    for vertex in &mesh.vertices {
        for component in vertex.position {
            binary.extend_from_slice(&component.to_le_bytes());
        }
    }

    if has_normals {
        attributes.insert("NORMAL".to_string(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": buffer_views.len(),
            "byteOffset": binary.len(),
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC3",
        }));
        for vertex in &mesh.vertices {
            let normal = vertex.normal.unwrap_or([0.0, 0.0, 1.0]);
            for component in normal {
                binary.extend_from_slice(&component.to_le_bytes());
            }
        }
    }

    if has_uvs {
        attributes.insert("TEXCOORD_0".to_string(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": buffer_views.len(),
            "byteOffset": binary.len(),
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC2",
        }));
        for vertex in &mesh.vertices {
            let uv = vertex.uv.unwrap_or([0.0, 0.0]);
            for component in uv {
                binary.extend_from_slice(&component.to_le_bytes());
            }
        }
    }

    buffer_views.push(json!({
        "buffer": buffer_index,
        "byteOffset": 0,
        "byteLength": binary.len(),
        "target": TARGET_ARRAY_BUFFER,
    }));

    // Indices go into their own view behind the vertex data.
    let index_offset = binary.len();
    for index in &mesh.indices {
        binary.extend_from_slice(&index.to_le_bytes());
    }
    let indices_accessor = accessors.len();
    accessors.push(json!({
        "bufferView": buffer_views.len(),
        "byteOffset": 0,
        "componentType": COMPONENT_UINT,
        "count": mesh.indices.len(),
        "type": "SCALAR",
    }));
    buffer_views.push(json!({
        "buffer": buffer_index,
        "byteOffset": index_offset,
        "byteLength": binary.len() - index_offset,
        "target": TARGET_ELEMENT_ARRAY_BUFFER,
    }));

    let buffer = json!({
        "byteLength": binary.len(),
        "uri": format!(
            "data:application/octet-stream;base64,{}",
            BASE64_STANDARD.encode(&binary)
        ),
    });
    let mesh_value = json!({
        "name": mesh.name,
        "primitives": [{
            "attributes": attributes,
            "indices": indices_accessor,
            "mode": MODE_TRIANGLES,
        }],
    });

    EncodedMesh {
        buffer,
        mesh: mesh_value,
    }
}

fn position_bounds(mesh: &MeshData) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for vertex in &mesh.vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(vertex.position[axis]);
            max[axis] = max[axis].max(vertex.position[axis]);
        }
    }
    if mesh.vertices.is_empty() {
        return ([0.0; 3], [0.0; 3]);
    }
    (min, max)
}

/// Bake the Z-up scene convention into glTF's Y-up one: a -90 degree
/// rotation about X applied to every node placement.
fn axis_corrected(t: &Transform) -> Transform {
    let correction = [
        -std::f32::consts::FRAC_1_SQRT_2,
        0.0,
        0.0,
        std::f32::consts::FRAC_1_SQRT_2,
    ];
    Transform {
        translation: [t.translation[0], t.translation[2], -t.translation[1]],
        rotation: quat_mul(correction, t.rotation),
        scale: [t.scale[0], t.scale[2], t.scale[1]],
    }
}

fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}
