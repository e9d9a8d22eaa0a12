//! Transform-preserving export packager.
//!
//! Given a non-empty selection of mesh nodes, the packager writes every
//! referenced texture with realized pixels to a scratch directory as PNG,
//! exports the selected geometry through a registered
//! [`GeometryExporter`], and assembles one flat zip archive from the
//! results. Scratch files are intentionally left behind; their lifetime
//! belongs to the caller's environment, not to this component.

use crate::scene::{NodeId, Scene};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while packaging a selection.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("selection is empty, nothing to export")]
    EmptySelection,

    #[error("selected node {0:?} does not exist in the scene")]
    MissingNode(NodeId),

    #[error("no geometry exporter registered for format {0:?}")]
    ExporterUnavailable(ExportFormat),

    #[error("texture {name} carries malformed pixel data")]
    MalformedPixels { name: String },

    #[error("cannot resolve a home directory for the default output path")]
    NoHomeDirectory,

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("geometry serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive assembly failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Target geometry format of an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    /// glTF 2.0, the generic interchange target. A built-in exporter is
    /// always available.
    #[default]
    Gltf,
    /// RenderWare DFF, the engine-native format. The codec is an external
    /// collaborator and must be registered before use.
    Dff,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Gltf => "gltf",
            ExportFormat::Dff => "dff",
        }
    }
}

/// Export configuration consumed by the packager and its exporters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Keep the scene's native transforms verbatim instead of baking the
    /// destination engine's axis convention into the geometry.
    pub preserve_transforms: bool,
    pub format: ExportFormat,
}

/// Seam for the opaque geometry codecs. Implementations write exactly the
/// selected nodes to `path` in their format; how they encode is their
/// business.
pub trait GeometryExporter: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn export(
        &self,
        scene: &Scene,
        selection: &[NodeId],
        options: &ExportOptions,
        path: &Path,
    ) -> Result<(), ExportError>;
}

/// Format-keyed registry of geometry exporters.
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: HashMap<ExportFormat, Box<dyn GeometryExporter>>,
}

impl ExporterRegistry {
    /// An empty registry with no formats available.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default registry: glTF built in, DFF left to an external codec.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(super::GltfExporter::new()));
        registry
    }

    pub fn register(&mut self, exporter: Box<dyn GeometryExporter>) {
        let format = exporter.format();
        debug!(?format, "registering geometry exporter");
        self.exporters.insert(format, exporter);
    }

    pub fn get(&self, format: ExportFormat) -> Option<&dyn GeometryExporter> {
        self.exporters.get(&format).map(|e| e.as_ref())
    }
}

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_\-]").expect("sanitizer pattern is valid"));

/// Reduce a name to the archive-safe character set: lowercase with every
/// character outside `[a-z0-9_-]` replaced by `_`.
pub fn safe_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(&name.to_lowercase(), "_").into_owned()
}

/// `Body_Diffuse.png` -> `Body_Diffuse`; names without an extension pass
/// through unchanged.
fn image_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Assembles self-contained archives from scene selections.
pub struct Packager {
    registry: ExporterRegistry,
    scratch_root: Option<PathBuf>,
}

impl Packager {
    pub fn new() -> Self {
        Self {
            registry: ExporterRegistry::with_defaults(),
            scratch_root: None,
        }
    }

    pub fn with_registry(registry: ExporterRegistry) -> Self {
        Self {
            registry,
            scratch_root: None,
        }
    }

    /// Place scratch files under `root` instead of the system temp
    /// directory. The caller owns the lifetime of whatever lands there.
    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn registry_mut(&mut self) -> &mut ExporterRegistry {
        &mut self.registry
    }

    /// Export `selection` to a zip archive and return the archive path.
    ///
    /// With no `output` the archive lands on the user's Desktop, named
    /// after the first selected node. A supplied path that lacks the
    /// `.zip` extension gets it appended. On failure nothing is rolled
    /// back: scratch files and a partially written archive may remain.
    pub fn export_selection(
        &self,
        scene: &Scene,
        selection: &[NodeId],
        options: &ExportOptions,
        output: Option<&Path>,
    ) -> Result<PathBuf, ExportError> {
        if selection.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        for id in selection {
            if scene.node(*id).is_none() {
                return Err(ExportError::MissingNode(*id));
            }
        }
        let first = scene
            .node(selection[0])
            .expect("checked above")
            .name
            .clone();
        let base = safe_name(&first);

        info!(
            nodes = selection.len(),
            format = ?options.format,
            "exporting selection rooted at {first}"
        );

        let scratch = self.create_scratch()?;
        let mut files: Vec<PathBuf> = Vec::new();

        // Stage 1: texture extraction. First writer wins on sanitized
        // name collisions; no content-based deduplication.
        let mut written: Vec<String> = Vec::new();
        for id in selection {
            let node = scene.node(*id).expect("checked above");
            for material in &node.materials {
                for image in &material.images {
                    let Some(pixels) = &image.pixels else {
                        debug!(image = %image.name, "skipping image without realized pixels");
                        continue;
                    };
                    let stem = safe_name(image_stem(&image.name));
                    if written.iter().any(|w| *w == stem) {
                        warn!(image = %image.name, file = %stem, "sanitized name collision, keeping first");
                        continue;
                    }
                    let path = scratch.join(format!("{stem}.png"));
                    let buffer = image::RgbaImage::from_raw(
                        pixels.width,
                        pixels.height,
                        pixels.rgba8.clone(),
                    )
                    .ok_or_else(|| ExportError::MalformedPixels {
                        name: image.name.clone(),
                    })?;
                    buffer.save_with_format(&path, image::ImageFormat::Png)?;
                    debug!(image = %image.name, path = %path.display(), "texture written");
                    written.push(stem);
                    files.push(path);
                }
            }
        }

        // Stage 2: geometry export through the registered codec.
        let exporter = self
            .registry
            .get(options.format)
            .ok_or(ExportError::ExporterUnavailable(options.format))?;
        let geometry_path = scratch.join(format!("{base}.{}", options.format.extension()));
        exporter.export(scene, selection, options, &geometry_path)?;
        files.push(geometry_path);

        // Stage 3: flat zip assembly.
        let archive_path = match output {
            Some(path) => ensure_zip_extension(path),
            None => default_output_path(&base)?,
        };
        if let Some(parent) = archive_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_archive(&archive_path, &files)?;

        info!(
            archive = %archive_path.display(),
            entries = files.len(),
            "export finished"
        );
        Ok(archive_path)
    }

    fn create_scratch(&self) -> Result<PathBuf, ExportError> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("sceneforge-export-");
            b
        };
        let dir = match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        // Persist the scratch directory; its cleanup is the environment's
        // responsibility.
        Ok(dir.into_path())
    }
}

impl Default for Packager {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_zip_extension(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if text.to_lowercase().ends_with(".zip") {
        path.to_path_buf()
    } else {
        PathBuf::from(format!("{text}.zip"))
    }
}

fn default_output_path(base: &str) -> Result<PathBuf, ExportError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .ok_or(ExportError::NoHomeDirectory)?;
    Ok(PathBuf::from(home)
        .join("Desktop")
        .join(format!("{base}.zip")))
}

fn write_archive(archive_path: &Path, files: &[PathBuf]) -> Result<(), ExportError> {
    let file = File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let entry_options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for path in files {
        let entry_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.start_file(entry_name, entry_options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ImagePixels, ImageRef, Material, MeshData, Transform, Vertex};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn mesh(name: &str) -> Arc<MeshData> {
        Arc::new(MeshData {
            name: name.to_string(),
            vertices: vec![
                Vertex { position: [0.0, 0.0, 0.0], normal: None, uv: None },
                Vertex { position: [1.0, 0.0, 0.0], normal: None, uv: None },
                Vertex { position: [0.0, 1.0, 0.0], normal: None, uv: None },
            ],
            indices: vec![0, 1, 2],
        })
    }

    fn solid_image(name: &str, rgba: [u8; 4]) -> Arc<ImageRef> {
        Arc::new(ImageRef {
            name: name.to_string(),
            pixels: Some(ImagePixels {
                width: 2,
                height: 2,
                rgba8: rgba.repeat(4),
            }),
        })
    }

    fn archive_entries(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn empty_selection_is_rejected_before_any_io() {
        let scene = Scene::new();
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("empty.zip");

        let result = Packager::new()
            .scratch_root(tmp.path())
            .export_selection(&scene, &[], &ExportOptions::default(), Some(&out));

        assert!(matches!(result, Err(ExportError::EmptySelection)));
        assert!(!out.exists());
    }

    #[test]
    fn archive_holds_geometry_plus_every_distinct_texture() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("Landstalker Body", Transform::IDENTITY, mesh("body"));
        scene.node_mut(id).unwrap().materials.push(Material {
            name: "paint".to_string(),
            images: vec![
                solid_image("Body_Diffuse", [255, 0, 0, 255]),
                solid_image("Body_Specular.tga", [0, 255, 0, 255]),
            ],
        });

        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("pack.zip");
        let archive = Packager::new()
            .scratch_root(tmp.path())
            .export_selection(&scene, &[id], &ExportOptions::default(), Some(&out))
            .unwrap();

        assert_eq!(archive, out);
        let entries = archive_entries(&archive);
        assert_eq!(
            entries,
            vec![
                "body_diffuse.png".to_string(),
                "body_specular.png".to_string(),
                "landstalker_body.gltf".to_string(),
            ]
        );
    }

    #[test]
    fn colliding_sanitized_names_keep_the_first_writer() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("crate", Transform::IDENTITY, mesh("crate"));
        scene.node_mut(id).unwrap().materials.push(Material {
            name: "wood".to_string(),
            images: vec![
                solid_image("Body Diffuse", [1, 2, 3, 255]),
                solid_image("body.diffuse.dds", [9, 9, 9, 255]),
            ],
        });

        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("collide.zip");
        let archive = Packager::new()
            .scratch_root(tmp.path())
            .export_selection(&scene, &[id], &ExportOptions::default(), Some(&out))
            .unwrap();

        let entries = archive_entries(&archive);
        // One texture entry plus the geometry file.
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&"body_diffuse.png".to_string()));

        // The surviving pixels belong to the first image written.
        let file = File::open(&archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let mut entry = zip.by_name("body_diffuse.png").unwrap();
        let mut bytes = Vec::new();
        io::Read::read_to_end(&mut entry, &mut bytes).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn unrealized_images_are_skipped() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("fence", Transform::IDENTITY, mesh("fence"));
        scene.node_mut(id).unwrap().materials.push(Material {
            name: "links".to_string(),
            images: vec![Arc::new(ImageRef {
                name: "missing_texture".to_string(),
                pixels: None,
            })],
        });

        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("fence.zip");
        let archive = Packager::new()
            .scratch_root(tmp.path())
            .export_selection(&scene, &[id], &ExportOptions::default(), Some(&out))
            .unwrap();

        assert_eq!(archive_entries(&archive), vec!["fence.gltf".to_string()]);
    }

    #[test]
    fn zip_extension_is_appended_when_missing() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("lamp", Transform::IDENTITY, mesh("lamp"));

        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("lamp_export");
        let archive = Packager::new()
            .scratch_root(tmp.path())
            .export_selection(&scene, &[id], &ExportOptions::default(), Some(&out))
            .unwrap();

        assert_eq!(archive, tmp.path().join("lamp_export.zip"));
        assert!(archive.exists());
    }

    // Single test for both home-directory branches: it mutates process
    // environment, so the cases must run sequentially.
    #[test]
    fn default_output_lands_on_the_desktop_or_fails_without_a_home() {
        let tmp = TempDir::new().unwrap();
        let old_home = std::env::var_os("HOME");
        let old_profile = std::env::var_os("USERPROFILE");
        std::env::set_var("HOME", tmp.path());
        std::env::remove_var("USERPROFILE");

        let path = default_output_path("lamp").unwrap();
        assert_eq!(path, tmp.path().join("Desktop").join("lamp.zip"));

        let mut scene = Scene::new();
        let id = scene.add_mesh("lamp", Transform::IDENTITY, mesh("lamp"));
        let archive = Packager::new()
            .scratch_root(tmp.path())
            .export_selection(&scene, &[id], &ExportOptions::default(), None)
            .unwrap();
        assert_eq!(archive, tmp.path().join("Desktop").join("lamp.zip"));
        assert!(archive.exists());

        std::env::remove_var("HOME");
        assert!(matches!(
            default_output_path("lamp"),
            Err(ExportError::NoHomeDirectory)
        ));

        match old_home {
            Some(value) => std::env::set_var("HOME", value),
            None => std::env::remove_var("HOME"),
        }
        match old_profile {
            Some(value) => std::env::set_var("USERPROFILE", value),
            None => std::env::remove_var("USERPROFILE"),
        }
    }

    #[test]
    fn native_format_without_codec_is_unavailable() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("lamp", Transform::IDENTITY, mesh("lamp"));

        let options = ExportOptions {
            preserve_transforms: true,
            format: ExportFormat::Dff,
        };
        let tmp = TempDir::new().unwrap();
        let result = Packager::new().scratch_root(tmp.path()).export_selection(
            &scene,
            &[id],
            &options,
            Some(&tmp.path().join("lamp.zip")),
        );

        assert!(matches!(
            result,
            Err(ExportError::ExporterUnavailable(ExportFormat::Dff))
        ));
    }

    #[test]
    fn registered_codec_handles_the_native_format() {
        struct StubDff;
        impl GeometryExporter for StubDff {
            fn format(&self) -> ExportFormat {
                ExportFormat::Dff
            }
            fn export(
                &self,
                _scene: &Scene,
                _selection: &[NodeId],
                _options: &ExportOptions,
                path: &Path,
            ) -> Result<(), ExportError> {
                fs::write(path, b"DFF")?;
                Ok(())
            }
        }

        let mut scene = Scene::new();
        let id = scene.add_mesh("lamp", Transform::IDENTITY, mesh("lamp"));

        let mut packager = Packager::new();
        packager.registry_mut().register(Box::new(StubDff));

        let options = ExportOptions {
            preserve_transforms: false,
            format: ExportFormat::Dff,
        };
        let tmp = TempDir::new().unwrap();
        let archive = packager
            .scratch_root(tmp.path())
            .export_selection(&scene, &[id], &options, Some(&tmp.path().join("lamp.zip")))
            .unwrap();

        assert_eq!(archive_entries(&archive), vec!["lamp.dff".to_string()]);
    }

    #[test]
    fn safe_name_reduces_to_archive_safe_charset() {
        assert_eq!(safe_name("Body_Diffuse"), "body_diffuse");
        assert_eq!(safe_name("Chair #3 (broken)"), "chair__3__broken_");
        assert_eq!(safe_name("straße"), "stra_e");
        assert_eq!(safe_name("ok-name_42"), "ok-name_42");
    }

    #[test]
    fn image_stem_strips_one_extension() {
        assert_eq!(image_stem("Body_Diffuse.png"), "Body_Diffuse");
        assert_eq!(image_stem("Body_Diffuse"), "Body_Diffuse");
        assert_eq!(image_stem(".hidden"), ".hidden");
        assert_eq!(image_stem("a.b.c"), "a.b");
    }
}
