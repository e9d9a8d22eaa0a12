//! # SceneForge Core
//!
//! Post-import asset preparation for game map scenes.
//!
//! A placement importer (external to this crate) populates a scene graph
//! from a map description file and a model repository. SceneForge then:
//!
//! - **normalizes** the graph: collision meshes, collision spheres, and
//!   LOD variants are removed, wheel instance slots are consolidated onto
//!   the shared template geometry, placeholders are dissolved, and every
//!   surviving node keeps its exact pre-cleanup world transform;
//! - **packages** a selected subset of the graph into one portable zip
//!   archive: geometry in an interchange format plus every referenced
//!   texture as PNG.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sceneforge_core::{cleanup, ExportOptions, Packager, Scene};
//!
//! let mut scene = Scene::new();
//! // ... populated by a placement importer ...
//!
//! let report = cleanup(&mut scene);
//! println!("cleanup: {report}");
//!
//! let selection = scene.ids();
//! let archive = Packager::new().export_selection(
//!     &scene,
//!     &selection,
//!     &ExportOptions::default(),
//!     None,
//! )?;
//! println!("archive at {}", archive.display());
//! # Ok::<(), sceneforge_core::ExportError>(())
//! ```
//!
//! Both operations run synchronously on the caller's thread and mutate or
//! read the scene in place; callers serialize access themselves.

pub mod cleanup;
pub mod doc;
pub mod export;
pub mod placement;
pub mod scene;

#[cfg(test)]
mod test_integration;

// Re-export commonly used types
pub use cleanup::{cleanup, CleanupAction, CleanupReport};
pub use doc::{load_scene, save_scene, SceneDocument, SceneError};
pub use export::{
    safe_name, ExportError, ExportFormat, ExportOptions, ExporterRegistry, GeometryExporter,
    GltfExporter, Packager,
};
pub use placement::{
    find_model_folder, parse_placements, place_records, scan_placement_files, PlacementError,
    PlacementRecord, PlacementSource,
};
pub use scene::{
    ImagePixels, ImageRef, Material, MeshData, Node, NodeId, NodeKind, Scene, Transform, Vertex,
};

use std::path::PathBuf;
use tracing::info;

/// Version of the core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize structured logging for embedders without their own
/// subscriber. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sceneforge_core=info,sceneforge_cli=info")
        .with_target(false)
        .try_init();

    info!("SceneForge Core v{} ready", VERSION);
}

/// Configuration surface produced by the orchestration layer and consumed
/// by the core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding placement files and the model repository.
    pub root_path: Option<PathBuf>,
    /// Keep native transforms verbatim on export instead of baking the
    /// destination axis convention.
    pub preserve_transforms: bool,
    /// Geometry format for exported selections.
    pub export_format: ExportFormat,
    /// Override for the export scratch area; system temp when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_path: None,
            preserve_transforms: false,
            export_format: ExportFormat::Gltf,
            scratch_dir: None,
        }
    }
}

impl Config {
    /// Export options derived from this configuration.
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            preserve_transforms: self.preserve_transforms,
            format: self.export_format,
        }
    }

    /// A packager honoring this configuration's scratch override.
    pub fn packager(&self) -> Packager {
        match &self.scratch_dir {
            Some(dir) => Packager::new().scratch_root(dir.clone()),
            None => Packager::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_interchange_without_preserved_transforms() {
        let config = Config::default();
        assert_eq!(config.export_format, ExportFormat::Gltf);
        assert!(!config.preserve_transforms);

        let options = config.export_options();
        assert_eq!(options.format, ExportFormat::Gltf);
        assert!(!options.preserve_transforms);
    }
}
