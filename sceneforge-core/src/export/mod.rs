//! Export pipeline for packaging a scene selection into a portable
//! archive: geometry in an interchange format plus every referenced
//! texture as PNG, flattened into one zip file.

mod gltf;
mod package;

pub use gltf::GltfExporter;
pub use package::{
    safe_name, ExportError, ExportFormat, ExportOptions, ExporterRegistry, GeometryExporter,
    Packager,
};
