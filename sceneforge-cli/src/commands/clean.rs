use anyhow::{Context, Result};
use clap::Args;
use sceneforge_core::{cleanup, SceneDocument};
use std::path::PathBuf;

use crate::ui::{info, success};

/// Run the cleanup pass over a scene document
#[derive(Args)]
pub struct CleanCommand {
    /// Scene document to normalize
    #[arg(short, long)]
    pub scene: PathBuf,

    /// Where to write the cleaned document (defaults to in-place)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

impl CleanCommand {
    pub fn execute(&self) -> Result<()> {
        let document = SceneDocument::load(&self.scene)
            .with_context(|| format!("failed to load scene {}", self.scene.display()))?;
        let mut scene = document
            .to_scene()
            .context("scene document is not usable")?;

        let report = cleanup(&mut scene);
        for action in &report.actions {
            info(&action.to_string());
        }

        let target = self.out.as_ref().unwrap_or(&self.scene);
        sceneforge_core::save_scene(&scene, target)
            .with_context(|| format!("failed to save scene {}", target.display()))?;

        success(&format!(
            "cleanup finished ({report}), saved to {}",
            target.display()
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_core::{save_scene, MeshData, Scene, Transform, Vertex};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_mesh(name: &str) -> Arc<MeshData> {
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

    #[test]
    fn cleans_a_scene_document_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let scene_path = tmp.path().join("scene.json");
        let out_path = tmp.path().join("clean.json");

        let mut scene = Scene::new();
        scene.add_mesh("chair", Transform::IDENTITY, sample_mesh("chair"));
        scene.add_mesh("colmesh01", Transform::IDENTITY, sample_mesh("col"));
        save_scene(&scene, &scene_path).unwrap();

        let cmd = CleanCommand {
            scene: scene_path.clone(),
            out: Some(out_path.clone()),
        };
        cmd.execute().unwrap();

        let cleaned = sceneforge_core::load_scene(&out_path).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert!(cleaned.find_by_name("chair").is_some());
        assert!(cleaned.find_by_name("colmesh01").is_none());

        // The source document is untouched when --out is given.
        let original = sceneforge_core::load_scene(&scene_path).unwrap();
        assert_eq!(original.len(), 2);
    }

    #[test]
    fn missing_scene_document_fails() {
        let cmd = CleanCommand {
            scene: PathBuf::from("/no/such/scene.json"),
            out: None,
        };
        assert!(cmd.execute().is_err());
    }
}
