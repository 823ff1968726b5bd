//! Screenshot artifacts.
//!
//! Two directories under one root: `screenshots/` for slot events,
//! `error_screenshots/` for recovery diagnostics. Files are named
//! `<event>_<YYYYMMDD_HHMMSS>.png`; the timestamp has one-second
//! granularity, so a numeric suffix keeps names unique when two captures
//! land in the same second.

use std::path::{Path, PathBuf};

use chrono::Local;
use rdv_driver::PageDriver;
use tracing::info;

use crate::error::Result;
use crate::flow::Site;

/// A capture event, deciding directory and file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    SlotFound,
    SlotConfirmed,
    SessionFailure(Site),
}

impl Artifact {
    fn stem(&self) -> String {
        match self {
            Artifact::SlotFound => "slot_found".to_owned(),
            Artifact::SlotConfirmed => "slot_confirmed".to_owned(),
            Artifact::SessionFailure(site) => format!("{}_error", site.slug()),
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, Artifact::SessionFailure(_))
    }
}

/// Filesystem home for captured screenshots.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    shots_dir: PathBuf,
    errors_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates both directories under `root` if they do not exist.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        let shots_dir = root.join("screenshots");
        let errors_dir = root.join("error_screenshots");
        std::fs::create_dir_all(&shots_dir)?;
        std::fs::create_dir_all(&errors_dir)?;
        Ok(Self {
            shots_dir,
            errors_dir,
        })
    }

    /// Captures a full-page screenshot for `artifact` and returns the path
    /// it was saved under.
    pub async fn capture(&self, page: &dyn PageDriver, artifact: Artifact) -> Result<PathBuf> {
        let dir = if artifact.is_error() {
            &self.errors_dir
        } else {
            &self.shots_dir
        };
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = unique_path(dir, &artifact.stem(), &timestamp);
        page.screenshot(&path, true).await?;
        info!(target = "rdv", path = %path.display(), "screenshot saved");
        Ok(path)
    }
}

/// First non-existing `<stem>_<timestamp>.png` under `dir`, suffixing
/// `_1`, `_2`, ... on collision.
fn unique_path(dir: &Path, stem: &str, timestamp: &str) -> PathBuf {
    let base = dir.join(format!("{stem}_{timestamp}.png"));
    if !base.exists() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{timestamp}_{n}.png"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
