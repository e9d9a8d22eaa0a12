//! Seams toward the placement importer.
//!
//! Map description files (`.ipl`) list model references with world
//! placements; the model repository is a directory tree of `.dff`
//! geometry files. Parsing either format is an external concern — this
//! module only defines the records the importer produces, the discovery
//! helpers the orchestration layer needs, and the step that turns parsed
//! records into placeholder slots in the scene store.

use crate::scene::{NodeId, Scene, Transform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Errors surfaced by the placement seams.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("placement file not found: {0}")]
    NotFound(PathBuf),

    #[error("malformed placement data: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One placement entry: a model reference and where it sits in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub model: String,
    pub transform: Transform,
}

/// External parser seam. Implementations own the placement file format.
pub trait PlacementSource {
    fn parse(&self, path: &Path) -> Result<Vec<PlacementRecord>, PlacementError>;
}

/// Parse a placement file through `source`, rejecting missing paths up
/// front so parsers can assume an existing file.
pub fn parse_placements(
    source: &dyn PlacementSource,
    path: &Path,
) -> Result<Vec<PlacementRecord>, PlacementError> {
    if !path.exists() {
        return Err(PlacementError::NotFound(path.to_path_buf()));
    }
    let records = source.parse(path)?;
    info!(path = %path.display(), records = records.len(), "placements parsed");
    Ok(records)
}

/// Recursively collect every placement file under `root`, as
/// `(full path, file name)` pairs. Extension matching is
/// case-insensitive.
pub fn scan_placement_files(root: &Path) -> Vec<(PathBuf, String)> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".ipl") {
            found.push((entry.path().to_path_buf(), name));
        }
    }
    debug!(root = %root.display(), count = found.len(), "placement scan finished");
    found
}

/// Find the first directory under `root` that contains model geometry
/// (`.dff` files). Returns `None` when the repository holds no models.
pub fn find_model_folder(root: &Path) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(".dff") {
            if let Some(parent) = entry.path().parent() {
                dirs.push(parent.to_path_buf());
            }
        }
    }
    dirs.sort();
    dirs.into_iter().next()
}

/// Materialize placement records as placeholder slots in the store.
///
/// Geometry decoding happens elsewhere; the importer later swaps slots
/// for mesh nodes as model files are realized. Model names repeat freely
/// in placement data, so repeated names get a numeric suffix to keep the
/// store's live names unique.
pub fn place_records(scene: &mut Scene, records: &[PlacementRecord]) -> Vec<NodeId> {
    let mut created = Vec::with_capacity(records.len());
    for record in records {
        let name = unique_name(scene, &record.model);
        let id = scene.add_placeholder(name, record.transform);
        created.push(id);
    }
    info!(count = created.len(), "placement slots created");
    created
}

fn unique_name(scene: &Scene, base: &str) -> String {
    if scene.find_by_name(base).is_none() {
        return base.to_string();
    }
    let mut counter = 1usize;
    loop {
        let candidate = format!("{base}.{counter:03}");
        if scene.find_by_name(&candidate).is_none() {
            return candidate;
        }
        counter += 1;
    }
}
