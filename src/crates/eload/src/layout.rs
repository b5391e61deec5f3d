//! Directory layouts
//!
//! A layout is an ordered, fixed set of symbolic folder names mapped to paths
//! relative to a root directory. Downstream pipelines expect these exact
//! relative paths, so the tables below are part of the external contract.

use crate::error::{EloadError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ordered mapping from symbolic folder name to relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLayout {
    name: &'static str,
    folders: &'static [(&'static str, &'static str)],
}

/// Layout of a submission root (`<eloads_dir>/ELOAD_<n>`)
pub const SUBMISSION_LAYOUT: DirectoryLayout = DirectoryLayout {
    name: "submission",
    folders: &[
        ("vcf", "10_submitted/vcf_files"),
        ("metadata", "10_submitted/metadata_file"),
        ("vcf_check", "13_validation/vcf_format"),
        ("assembly_check", "13_validation/assembly_check"),
        ("sample_check", "13_validation/sample_concordance"),
        ("biosamples", "18_brokering/biosamples"),
        ("ena", "18_brokering/ena"),
        ("scratch", "20_scratch"),
    ],
};

/// Layout of a project directory (`<projects_dir>/<project accession>`)
pub const PROJECT_LAYOUT: DirectoryLayout = DirectoryLayout {
    name: "project",
    folders: &[
        ("logs", "00_logs"),
        ("valid", "30_eva_valid"),
        ("transformed", "40_transformed"),
        ("stats", "50_stats"),
        ("annotation", "51_annotation"),
        ("accessions", "52_accessions"),
        ("public", "60_eva_public"),
        ("external", "70_external_submissions"),
        ("deprecated", "80_deprecated"),
    ],
};

impl DirectoryLayout {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Symbolic folder names in layout order
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.folders.iter().map(|(key, _)| *key)
    }

    pub fn relative_path(&self, key: &str) -> Result<&'static str> {
        self.folders
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, rel)| *rel)
            .ok_or_else(|| {
                EloadError::configuration(format!(
                    "unknown folder '{}' in the {} layout (known: {})",
                    key,
                    self.name,
                    self.keys().collect::<Vec<_>>().join(", ")
                ))
            })
    }

    /// Create every folder of the layout under `root`. Existing folders are left alone.
    pub async fn ensure(&self, root: &Path) -> Result<()> {
        for (key, rel) in self.folders {
            let dir = root.join(rel);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| EloadError::io(&dir, e))?;
            debug!(layout = self.name, folder = key, path = %dir.display(), "Folder ready");
        }
        Ok(())
    }

    /// Absolute location of a symbolic folder under `root`
    pub fn path_for(&self, root: &Path, key: &str) -> Result<PathBuf> {
        Ok(root.join(self.relative_path(key)?))
    }
}
