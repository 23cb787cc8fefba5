// Folder measuring and zip creation for deploys.

use crate::cancel::CancelToken;
use crate::error::DeployError;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Largest folder the Hostme API accepts.
pub const MAX_UPLOAD_BYTES: u64 = 127_000_000;

const COPY_CHUNK: usize = 64 * 1024;

/// Total size in bytes of the regular files below `root`. Symlinks are not
/// followed.
pub fn folder_size(root: &Path) -> Result<u64, DeployError> {
    if !root.is_dir() {
        return Err(DeployError::Archive(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let mut total = 0u64;
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| DeployError::Archive(err.to_string()))?;
        if entry.file_type().is_file() {
            let meta = entry
                .metadata()
                .map_err(|err| DeployError::Archive(err.to_string()))?;
            total += meta.len();
        }
    }
    Ok(total)
}

/// The `<slug>.zip` file produced for one deploy. Removed from disk when
/// dropped, whatever way the workflow ends.
#[derive(Debug)]
pub struct ArchiveFile {
    path: PathBuf,
}

impl ArchiveFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the archive on disk.
    pub fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Delete the archive now.
    pub fn remove(self) {
        drop(self);
    }
}

impl Drop for ArchiveFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "archive removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "failed to remove archive")
            }
        }
    }
}

/// Compress the contents of `root` into `dest` with maximum Deflate level.
///
/// Entry names are relative to `root`, so the folder's own name does not
/// appear in the archive. `progress` receives the cumulative number of file
/// bytes read. When `cancel` fires the write stops, the partial file is
/// removed and `DeployError::Cancelled` is returned.
pub fn zip_folder(
    root: &Path,
    dest: &Path,
    cancel: &CancelToken,
    mut progress: impl FnMut(u64),
) -> Result<ArchiveFile, DeployError> {
    let file = File::create(dest).map_err(|err| {
        DeployError::Archive(format!("failed to create {}: {err}", dest.display()))
    })?;
    // From here on the guard owns the file, so every early return cleans up.
    let archive = ArchiveFile {
        path: dest.to_path_buf(),
    };
    let own_path = fs::canonicalize(dest).ok();

    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut done = 0u64;
    let mut buf = vec![0u8; COPY_CHUNK];
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled);
        }
        let entry = entry.map_err(|err| DeployError::Archive(err.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|err| DeployError::Archive(err.to_string()))?;
        let name = relative.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .map_err(|err| DeployError::Archive(err.to_string()))?;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if own_path.is_some() && fs::canonicalize(entry.path()).ok() == own_path {
            continue;
        }

        zip.start_file(name, options)
            .map_err(|err| DeployError::Archive(err.to_string()))?;
        let mut input = File::open(entry.path()).map_err(|err| {
            DeployError::Archive(format!("failed to read {}: {err}", entry.path().display()))
        })?;
        loop {
            if cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            let read = input
                .read(&mut buf)
                .map_err(|err| DeployError::Archive(err.to_string()))?;
            if read == 0 {
                break;
            }
            zip.write_all(&buf[..read])
                .map_err(|err| DeployError::Archive(err.to_string()))?;
            done += read as u64;
            progress(done);
        }
    }

    let mut writer = zip
        .finish()
        .map_err(|err| DeployError::Archive(err.to_string()))?;
    writer
        .flush()
        .map_err(|err| DeployError::Archive(err.to_string()))?;
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    fn sample_site(dir: &Path) -> PathBuf {
        let root = dir.join("site");
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("index.html"), "<h1>hello</h1>").unwrap();
        fs::write(root.join("assets/app.js"), "console.log(1)").unwrap();
        root
    }

    #[test]
    fn measures_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = sample_site(dir.path());
        assert_eq!(folder_size(&root).unwrap(), 14 + 14);
    }

    #[test]
    fn rejects_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(folder_size(&file), Err(DeployError::Archive(_))));
    }

    #[test]
    fn entries_are_relative_to_the_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = sample_site(dir.path());
        let dest = dir.path().join("site.zip");
        let mut seen = Vec::new();
        let archive = zip_folder(&root, &dest, &CancelToken::new(), |done| seen.push(done)).unwrap();

        let mut zip = ZipArchive::new(File::open(archive.path()).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["assets/", "assets/app.js", "index.html"]);

        let mut body = String::new();
        zip.by_name("index.html")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "<h1>hello</h1>");
        assert_eq!(seen.last().copied(), Some(28));
    }

    #[test]
    fn dropping_the_guard_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = sample_site(dir.path());
        let dest = dir.path().join("site.zip");
        let archive = zip_folder(&root, &dest, &CancelToken::new(), |_| {}).unwrap();
        assert!(dest.exists());
        archive.remove();
        assert!(!dest.exists());
    }

    #[test]
    fn cancellation_removes_partial_archive() {
        let dir = tempfile::tempdir().unwrap();
        let root = sample_site(dir.path());
        let dest = dir.path().join("site.zip");
        let cancel = CancelToken::new();
        let result = zip_folder(&root, &dest, &cancel, |_| cancel.cancel());
        assert!(matches!(result, Err(DeployError::Cancelled)));
        assert!(!dest.exists());
    }

    #[test]
    fn skips_itself_when_written_inside_the_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = sample_site(dir.path());
        let dest = root.join("site.zip");
        let archive = zip_folder(&root, &dest, &CancelToken::new(), |_| {}).unwrap();
        let zip = ZipArchive::new(File::open(archive.path()).unwrap()).unwrap();
        assert!(zip.file_names().all(|name| name != "site.zip"));
    }
}
