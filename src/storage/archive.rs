/// Cache archive creation
///
/// Packs the cached paths into a single tar stream compressed with zstd.
/// Entry names are the absolute paths with the root stripped, so
/// `/home/runner/.npm/_cacache/index` is stored as
/// `home/runner/.npm/_cacache/index` and unpacking at `/` restores it.
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tar::Builder;

/// What ended up in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub file_count: usize,
    /// Size of the compressed archive on disk
    pub size_bytes: u64,
}

/// Archive `paths` into a tar+zstd file at `archive_path`
pub fn create_archive(
    paths: &[PathBuf],
    archive_path: &Path,
    compression_level: i32,
) -> Result<ArchiveSummary> {
    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive: {}", archive_path.display()))?;

    let encoder = zstd::Encoder::new(BufWriter::new(file), compression_level)
        .context("Failed to initialize zstd encoder")?;

    let mut tar = Builder::new(encoder);
    tar.follow_symlinks(false);

    let mut file_count = 0;

    for path in paths {
        let name = entry_name(path);

        if path.is_dir() {
            tar.append_dir_all(&name, path)
                .with_context(|| format!("Failed to archive directory: {}", path.display()))?;
            file_count += count_files(path)?;
        } else {
            tar.append_path_with_name(path, &name)
                .with_context(|| format!("Failed to archive file: {}", path.display()))?;
            file_count += 1;
        }
    }

    let encoder = tar.into_inner().context("Failed to finalize tar archive")?;
    let mut writer = encoder
        .finish()
        .context("Failed to compress archive with zstd")?;
    writer
        .flush()
        .context("Failed to write compressed archive")?;
    drop(writer);

    let size_bytes = std::fs::metadata(archive_path)
        .with_context(|| format!("Failed to stat archive: {}", archive_path.display()))?
        .len();

    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        file_count,
        size_bytes,
    })
}

/// Name of the archive entry for `path`: the path without root or prefix
fn entry_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}

fn count_files(path: &Path) -> Result<usize> {
    let mut file_count = 0;

    for entry in walkdir::WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            file_count += 1;
        }
    }

    Ok(file_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tar::Archive;
    use tempfile::TempDir;

    fn entries(archive_path: &Path) -> Vec<String> {
        let compressed = fs::read(archive_path).unwrap();
        let tar_data = zstd::decode_all(compressed.as_slice()).unwrap();
        let mut archive = Archive::new(tar_data.as_slice());
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_entry_name_strips_root() {
        assert_eq!(
            entry_name(Path::new("/home/runner/.npm")),
            PathBuf::from("home/runner/.npm")
        );
        assert_eq!(entry_name(Path::new("cache/dir")), PathBuf::from("cache/dir"));
    }

    #[test]
    fn test_archive_directory() {
        let temp = TempDir::new().unwrap();
        let cache_dir = temp.path().join("npm-cache");
        fs::create_dir_all(cache_dir.join("_cacache/index")).unwrap();
        fs::write(cache_dir.join("_cacache/index/a"), "a").unwrap();
        fs::write(cache_dir.join("_cacache/index/b"), "bb").unwrap();

        let archive_path = temp.path().join("cache.tzst");
        let summary = create_archive(&[cache_dir.clone()], &archive_path, 3).unwrap();

        assert_eq!(summary.file_count, 2);
        assert!(summary.size_bytes > 0);
        assert_eq!(summary.path, archive_path);

        let expected_prefix = entry_name(&cache_dir).to_string_lossy().into_owned();
        let names = entries(&archive_path);
        assert!(names
            .iter()
            .any(|n| n == &format!("{}/_cacache/index/a", expected_prefix)));
        assert!(names
            .iter()
            .any(|n| n == &format!("{}/_cacache/index/b", expected_prefix)));
    }

    #[test]
    fn test_archive_single_file_and_extract() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("store.bin");
        fs::write(&file, "hello world").unwrap();

        let archive_path = temp.path().join("cache.tzst");
        let summary = create_archive(&[file.clone()], &archive_path, 3).unwrap();
        assert_eq!(summary.file_count, 1);

        let out = TempDir::new().unwrap();
        let compressed = fs::read(&archive_path).unwrap();
        let tar_data = zstd::decode_all(compressed.as_slice()).unwrap();
        Archive::new(tar_data.as_slice()).unpack(out.path()).unwrap();

        let restored = out.path().join(entry_name(&file));
        assert_eq!(fs::read_to_string(restored).unwrap(), "hello world");
    }
}
