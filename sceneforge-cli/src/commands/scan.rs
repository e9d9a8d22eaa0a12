use anyhow::{bail, Result};
use clap::Args;
use sceneforge_core::{find_model_folder, scan_placement_files};
use std::path::PathBuf;

use crate::ui::{info, warning};

/// Find placement files and the model repository under a root directory
#[derive(Args)]
pub struct ScanCommand {
    /// Root directory of the unpacked map content
    #[arg(short, long)]
    pub root: PathBuf,
}

impl ScanCommand {
    pub fn execute(&self) -> Result<()> {
        if !self.root.is_dir() {
            bail!("root directory not found: {}", self.root.display());
        }

        let placements = scan_placement_files(&self.root);
        if placements.is_empty() {
            warning("no placement files found");
        } else {
            info(&format!("{} placement file(s):", placements.len()));
            for (path, _) in &placements {
                println!("  {}", path.display());
            }
        }

        match find_model_folder(&self.root) {
            Some(folder) => info(&format!("model repository: {}", folder.display())),
            None => warning("no model repository found (no .dff files under root)"),
        }

        Ok(())
    }
}
