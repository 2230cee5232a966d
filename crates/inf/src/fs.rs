use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub fn create_directory_for_file(p: &Path) -> Result {
    if let Some(parent_dir) = p.parent()
        && !parent_dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent_dir).map_err(|e| {
            Error::Runtime(format!(
                "Failed to create output directory for file '{}' ({e})",
                p.to_string_lossy()
            ))
        })?;
    }

    Ok(())
}

/// The paths that make up a file set: the main file followed by the sidecar files
/// that share its stem (e.g. `roads.shp`, `roads.shx`, `roads.dbf`)
pub fn file_set(path: &Path, sidecar_extensions: &[&str]) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    paths.extend(sidecar_extensions.iter().map(|ext| path.with_extension(ext)));
    paths
}

/// Removes the sidecar files of `path` that are not in `keep`, missing files are ignored.
/// Used after overwriting a file set that previously had more sidecars than the new one.
pub fn remove_stale_sidecars(path: &Path, sidecar_extensions: &[&str], keep: &[PathBuf]) -> Result {
    for file in file_set(path, sidecar_extensions).into_iter().skip(1) {
        if keep.contains(&file) {
            continue;
        }

        match std::fs::remove_file(&file) {
            Ok(()) => log::debug!("Removed stale sidecar '{}'", file.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(Error::Runtime(format!("Failed to remove '{}' ({err})", file.display())));
            }
        }
    }

    Ok(())
}

/// A temporary directory next to an output file.
/// Output is produced inside the directory and only moved to the target location on [`StagingDirectory::commit`].
/// Dropping the directory without committing removes everything that was written to it.
pub struct StagingDirectory {
    dir: tempfile::TempDir,
    target: PathBuf,
}

impl StagingDirectory {
    pub fn for_target(target: &Path) -> Result<Self> {
        let file_name = target.file_name().ok_or_else(|| Error::InvalidPath(target.to_path_buf()))?;
        create_directory_for_file(target)?;

        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let dir = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name.to_string_lossy()))
            .tempdir_in(&parent)?;

        Ok(Self {
            dir,
            target: target.to_path_buf(),
        })
    }

    /// The location inside the staging directory where the output should be written
    pub fn staged_path(&self) -> PathBuf {
        // for_target guarantees the target has a file name
        self.dir.path().join(self.target.file_name().unwrap_or_default())
    }

    /// Copies the current target (and its sidecars) into the staging directory so it can be updated in place
    pub fn stage_existing(&self, sidecar_extensions: &[&str]) -> Result {
        let staged = self.staged_path();
        for (source, destination) in file_set(&self.target, sidecar_extensions)
            .into_iter()
            .zip(file_set(&staged, sidecar_extensions))
        {
            if source.exists() {
                std::fs::copy(&source, &destination)?;
            }
        }

        Ok(())
    }

    /// Moves every file produced in the staging directory next to the target.
    /// The main file is moved last so it never appears without its sidecars.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let output_dir = self.dir.path().to_path_buf();
        let target_dir = self
            .target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let main_file = self.staged_path();
        let mut produced = std::fs::read_dir(&output_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<PathBuf>>>()?;

        if !produced.contains(&main_file) {
            return Err(Error::Runtime(format!(
                "No output was produced for '{}'",
                self.target.to_string_lossy()
            )));
        }

        produced.sort_by_key(|p| *p == main_file);

        let mut placed = Vec::with_capacity(produced.len());
        for path in produced {
            let destination = target_dir.join(path.file_name().unwrap_or_default());
            std::fs::rename(&path, &destination).map_err(|err| {
                Error::Runtime(format!(
                    "Failed to move '{}' to '{}' ({err})",
                    path.display(),
                    destination.display()
                ))
            })?;
            placed.push(destination);
        }

        Ok(placed)
    }
}
