//! Directory walking: candidate discovery for mapping and sample discovery
//! for synthesis.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::{is_excluded_dir, is_excluded_path, CodeMapConfig};
use crate::errors::{CodeMapError, Result};
use crate::languages::LanguageRegistry;

/// A file selected for mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative: String,
}

/// Finds every file with a known extension under the scan directories.
///
/// Scan directories are resolved against `project_root` unless absolute.
/// Excluded and hidden directories are not descended into; files matching an
/// exclude glob or larger than `max_file_size` are skipped. The result is
/// sorted by relative path with duplicates removed.
pub fn discover_files(
    project_root: &Path,
    dirs: &[PathBuf],
    registry: &LanguageRegistry,
    config: &CodeMapConfig,
) -> Result<Vec<DiscoveredFile>> {
    let mut files = Vec::new();

    for dir in dirs {
        let scan_root = project_root.join(dir);
        if !scan_root.is_dir() {
            return Err(CodeMapError::File {
                message: "scan directory does not exist or is not a directory".to_string(),
                path: scan_root.display().to_string(),
            });
        }

        for entry in WalkDir::new(&scan_root)
            .into_iter()
            .filter_entry(|e| keep_entry(e, config))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => {
                    return Err(CodeMapError::File {
                        message: format!("failed to read scan directory: {}", e),
                        path: scan_root.display().to_string(),
                    })
                }
                Err(e) => {
                    tracing::debug!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !registry.is_known(entry.path()) {
                continue;
            }

            let relative = relative_path(project_root, entry.path());
            if is_excluded_path(&relative, config) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) if metadata.len() <= config.max_file_size => {}
                Ok(_) => {
                    tracing::debug!(path = %relative, "skipping file over max_file_size");
                    continue;
                }
                Err(_) => continue,
            }

            files.push(DiscoveredFile {
                path: entry.into_path(),
                relative,
            });
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    files.dedup_by(|a, b| a.relative == b.relative);
    Ok(files)
}

/// Picks a representative file with one of `extensions` for synthesis.
///
/// Scan directories are searched in order, entries sorted by name, at most
/// `sample_max_depth` directories deep. The first file with more than
/// `sample_min_lines` lines wins; failing that, the longest file seen (the
/// earliest one on ties).
pub fn find_sample(
    project_root: &Path,
    dirs: &[PathBuf],
    extensions: &[&str],
    config: &CodeMapConfig,
) -> Option<PathBuf> {
    let mut longest: Option<(usize, PathBuf)> = None;

    for dir in dirs {
        let scan_root = project_root.join(dir);
        if !scan_root.is_dir() {
            continue;
        }

        let walker = WalkDir::new(&scan_root)
            .max_depth(config.sample_max_depth + 1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| keep_entry(e, config));

        for entry in walker.filter_map(|e| e.ok()) {
            let has_extension = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.contains(&ext))
                .unwrap_or(false);
            if !entry.file_type().is_file() || !has_extension {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };

            let lines = content.trim().lines().count();
            if lines > config.sample_min_lines {
                return Some(entry.into_path());
            }
            if longest.as_ref().map_or(true, |(best, _)| lines > *best) {
                longest = Some((lines, entry.into_path()));
            }
        }
    }

    longest.map(|(_, path)| path)
}

/// Directories below a scan root are dropped when hidden or excluded.
fn keep_entry(entry: &DirEntry, config: &CodeMapConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    !is_excluded_dir(&entry.file_name().to_string_lossy(), config)
}

/// `path` relative to `root`, `/`-separated and without `.` components.
/// Paths outside the root are returned as given, `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return path
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
    };
    relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
