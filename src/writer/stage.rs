//! Staged write, atomic publish.
//!
//! Profile files are built inside a temporary staging directory and moved to
//! their permanent destination in a single operation once finalized. A
//! partially written file is therefore never visible under its final name,
//! even if the process dies mid-write. Staged artifacts are owner-only
//! while under construction; published files are world-readable at the end
//! of the run.

use crate::error::AppResult;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The temporary directory artifacts are built in.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub fn new() -> AppResult<Self> {
        let dir = tempfile::Builder::new().prefix("glider-nc-").tempdir()?;
        log::debug!("Temporary NetCDF directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a unique staged path for one profile file.
    pub fn stage_file(&self, prefix: &str) -> AppResult<PathBuf> {
        let staged = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".nc")
            .tempfile_in(self.dir.path())?;
        let (_, path) = staged.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Remove the staging directory and everything still in it.
    ///
    /// Failure here is the one end-of-run error that must abort with a
    /// non-zero exit, after successful artifacts have already been placed.
    pub fn remove(self) -> AppResult<()> {
        let path = self.dir.path().to_path_buf();
        log::debug!("Removing temporary directory: {}", path.display());
        self.dir.close()?;
        Ok(())
    }
}

/// Move a finalized staged file to its permanent destination.
///
/// Rename is atomic on the same filesystem; when the staging area lives on
/// a different device the fallback copies then removes, still never
/// exposing a partial file under the final name (the copy goes to a
/// dot-prefixed sibling first).
pub fn publish(staged: &Path, dest: &Path) -> AppResult<()> {
    match fs::rename(staged, dest) {
        Ok(()) => {}
        Err(_) => {
            let tmp_sibling = sibling_temp_name(dest);
            fs::copy(staged, &tmp_sibling)?;
            fs::rename(&tmp_sibling, dest)?;
            fs::remove_file(staged)?;
        }
    }
    set_mode(dest, 0o755)
}

/// Relax a published artifact to world-readable once the run is complete.
pub fn relax_permissions(path: &Path) -> AppResult<()> {
    set_mode(path, 0o664)
}

/// Remove a staged artifact that will never be finalized.
pub fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove staged file {}: {}", staged.display(), e);
        }
    }
}

fn sibling_temp_name(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact.nc".to_string());
    dest.with_file_name(format!(".{name}.partial"))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> AppResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn staged_files_are_unique_and_inside_the_area() {
        let area = StagingArea::new().unwrap();
        let a = area.stage_file("unit_595-profile").unwrap();
        let b = area.stage_file("unit_595-profile").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(area.path()));
        area.remove().unwrap();
    }

    #[test]
    fn publish_moves_and_discard_removes() {
        let area = StagingArea::new().unwrap();
        let staged = area.stage_file("p").unwrap();
        fs::File::create(&staged)
            .unwrap()
            .write_all(b"payload")
            .unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let dest = out_dir.path().join("p.nc");
        publish(&staged, &dest).unwrap();
        assert!(dest.is_file());
        assert!(!staged.exists());

        let orphan = area.stage_file("q").unwrap();
        discard(&orphan);
        assert!(!orphan.exists());
        area.remove().unwrap();
    }
}
