//! End-to-end pipeline tests: import-shaped scene -> cleanup -> export.

use crate::cleanup::cleanup;
use crate::export::{ExportOptions, Packager};
use crate::scene::{ImagePixels, ImageRef, Material, MeshData, Scene, Transform, Vertex};
use std::fs::File;
use std::sync::Arc;
use tempfile::TempDir;

fn tri(name: &str) -> Arc<MeshData> {
    Arc::new(MeshData {
        name: name.to_string(),
        vertices: vec![
            Vertex { position: [0.0, 0.0, 0.0], normal: None, uv: Some([0.0, 0.0]) },
            Vertex { position: [1.0, 0.0, 0.0], normal: None, uv: Some([1.0, 0.0]) },
            Vertex { position: [0.0, 1.0, 0.0], normal: None, uv: Some([0.0, 1.0]) },
        ],
        indices: vec![0, 1, 2],
    })
}

fn paint(name: &str) -> Arc<ImageRef> {
    Arc::new(ImageRef {
        name: name.to_string(),
        pixels: Some(ImagePixels {
            width: 2,
            height: 2,
            rgba8: vec![200u8; 16],
        }),
    })
}

/// Assemble the kind of scene the placement importer produces for a
/// vehicle model: body, collision shapes, a wheel template, and
/// placeholder slots.
fn imported_car() -> Scene {
    let mut scene = Scene::new();

    let body_t = Transform {
        translation: [10.0, 20.0, 0.5],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };
    let body = scene.add_mesh("landstalker", body_t, tri("body"));
    scene.node_mut(body).unwrap().materials.push(Material {
        name: "paint".to_string(),
        images: vec![paint("Body_Diffuse"), paint("Body Detail")],
    });

    scene.add_mesh("landstalker_colmesh", Transform::IDENTITY, tri("col"));
    scene.add_mesh("landstalker_ColSphere01", Transform::IDENTITY, tri("sph"));
    scene.add_mesh("landstalkervlo", Transform::IDENTITY, tri("lod"));

    scene.add_mesh("wheel", Transform::IDENTITY, tri("wheel"));
    for (slot, x) in [("wheel_lf", -1.0f32), ("wheel_rf", 1.0), ("wheel_lb", -1.0), ("wheel_rb", 1.0)] {
        scene.add_placeholder(
            slot,
            Transform {
                translation: [x, 0.0, 0.3],
                ..Transform::IDENTITY
            },
        );
    }

    scene
}

#[test]
fn full_pipeline_cleans_then_packages() {
    let mut scene = imported_car();
    let body_before = scene
        .node(scene.find_by_name("landstalker").unwrap())
        .unwrap()
        .world_transform;

    let report = cleanup(&mut scene);

    // 3 tagged + the template + 4 placeholders removed, 4 instances made.
    assert_eq!(report.removed_count(), 8);
    assert_eq!(report.created_count(), 4);
    // body + 4 wheel instances survive
    assert_eq!(scene.len(), 5);

    let body = scene.find_by_name("landstalker").unwrap();
    assert_eq!(scene.node(body).unwrap().world_transform, body_before);

    // Left-side instances mirror, right-side ones do not.
    for (name, sx) in [
        ("wheel_wheel_lf", -1.0f32),
        ("wheel_wheel_rf", 1.0),
        ("wheel_wheel_lb", -1.0),
        ("wheel_wheel_rb", 1.0),
    ] {
        let id = scene.find_by_name(name).unwrap();
        assert_eq!(scene.node(id).unwrap().world_transform.scale[0], sx);
    }

    // Export the body: geometry + two distinct sanitized textures.
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("landstalker.zip");
    let archive = Packager::new()
        .scratch_root(tmp.path())
        .export_selection(&scene, &[body], &ExportOptions::default(), Some(&out))
        .unwrap();

    let file = File::open(&archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "body_detail.png".to_string(),
            "body_diffuse.png".to_string(),
            "landstalker.gltf".to_string(),
        ]
    );
}

#[test]
fn cleanup_twice_then_document_round_trip_is_stable() {
    let mut scene = imported_car();
    cleanup(&mut scene);
    let second = cleanup(&mut scene);
    assert!(second.is_noop());

    let rebuilt = crate::doc::SceneDocument::from_scene(&scene)
        .to_scene()
        .unwrap();
    assert_eq!(rebuilt.len(), scene.len());

    // All four instances still share one mesh after the round trip.
    let meshes: Vec<_> = ["wheel_wheel_lf", "wheel_wheel_rf", "wheel_wheel_lb", "wheel_wheel_rb"]
        .iter()
        .map(|name| {
            let id = rebuilt.find_by_name(name).unwrap();
            Arc::clone(rebuilt.node(id).unwrap().mesh.as_ref().unwrap())
        })
        .collect();
    assert!(meshes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}
