use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use sceneforge_core::{ExportFormat, ExportOptions, NodeId, Packager, SceneDocument};
use std::path::PathBuf;

use crate::ui::{format_file_size, spinner, success};

/// Package selected nodes into a zip archive
#[derive(Args)]
pub struct ExportCommand {
    /// Scene document holding the nodes to export
    #[arg(short, long)]
    pub scene: PathBuf,

    /// Names of the nodes to export
    #[arg(long, value_delimiter = ',', required = true)]
    pub select: Vec<String>,

    /// Geometry format for the archive
    #[arg(long, value_enum, default_value_t = FormatArg::Gltf)]
    pub format: FormatArg,

    /// Keep scene transforms verbatim instead of baking the destination
    /// axis convention
    #[arg(long)]
    pub preserve_transforms: bool,

    /// Archive path (defaults to the Desktop, named after the first
    /// selected node)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    Gltf,
    Dff,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Gltf => ExportFormat::Gltf,
            FormatArg::Dff => ExportFormat::Dff,
        }
    }
}

impl ExportCommand {
    pub fn execute(&self) -> Result<()> {
        let scene = SceneDocument::load(&self.scene)
            .with_context(|| format!("failed to load scene {}", self.scene.display()))?
            .to_scene()
            .context("scene document is not usable")?;

        let mut selection: Vec<NodeId> = Vec::with_capacity(self.select.len());
        for name in &self.select {
            match scene.find_by_name(name) {
                Some(id) => selection.push(id),
                None => bail!("no node named {name:?} in the scene"),
            }
        }

        let options = ExportOptions {
            preserve_transforms: self.preserve_transforms,
            format: self.format.into(),
        };

        let pb = spinner("Packaging selection...");
        let archive = Packager::new()
            .export_selection(&scene, &selection, &options, self.output.as_deref())
            .context("export failed")?;
        pb.finish_and_clear();

        let size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
        success(&format!(
            "exported {} node(s) to {} ({})",
            selection.len(),
            archive.display(),
            format_file_size(size)
        ));
        Ok(())
    }
}
