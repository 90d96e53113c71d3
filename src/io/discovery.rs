//! Input discovery and mate pairing for FASTQ files

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{AlignError, Result};

/// Accepted read-file suffixes, matched case-insensitively on the file name
pub const READ_EXTENSIONS: [&str; 2] = ["fastq", "fq"];

/// Directories starting with this prefix hold output of earlier runs
pub const RESERVED_DIR_PREFIX: &str = "shardalign";

/// Characters removed from the extension-less name to form the pair key:
/// the designator (`_1`) plus the dot left behind by the extension
pub const DEFAULT_MATE_SUFFIX_LEN: usize = 3;

/// Files sharing one pair key: `primary` is the first seen, `mate` the second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MateGroup {
    pub primary: PathBuf,
    pub mate: Option<PathBuf>,
}

impl MateGroup {
    pub fn is_paired(&self) -> bool {
        self.mate.is_some()
    }
}

/// Recursively collect read files below `root`.
///
/// Directories whose name starts with [`RESERVED_DIR_PREFIX`] are skipped,
/// as are subdirectories that cannot be listed. Fails with
/// [`AlignError::NotFound`] if the root is missing or unreadable, or if
/// nothing is found.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        warn!("The folder {} is either empty or was not found", root.display());
        return Err(AlignError::NotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_read_files(root, true, &mut files)?;

    if files.is_empty() {
        warn!("The folder {} is either empty or was not found", root.display());
        return Err(AlignError::NotFound(root.to_path_buf()));
    }

    info!("Discovered {} read files under {}", files.len(), root.display());
    Ok(files)
}

fn collect_read_files(dir: &Path, is_root: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = match fs::read_dir(dir).and_then(|rd| rd.collect::<std::io::Result<Vec<_>>>()) {
        Ok(entries) => entries,
        Err(e) => return unreadable_dir(dir, is_root, e),
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_lowercase();

        if path.is_dir() {
            if name.starts_with(RESERVED_DIR_PREFIX) {
                debug!("Skipping output directory {}", path.display());
                continue;
            }
            collect_read_files(&path, false, files)?;
        } else if is_read_file(&name) {
            files.push(path);
        }
    }
    Ok(())
}

/// An unlistable root means there is no input; an unlistable subdirectory
/// is skipped.
fn unreadable_dir(dir: &Path, is_root: bool, e: std::io::Error) -> Result<()> {
    if is_root {
        warn!("The folder {} is either empty or was not found: {}", dir.display(), e);
        Err(AlignError::NotFound(dir.to_path_buf()))
    } else {
        warn!("Skipping unreadable directory {}: {}", dir.display(), e);
        Ok(())
    }
}

fn is_read_file(lowercase_name: &str) -> bool {
    READ_EXTENSIONS.iter().any(|ext| lowercase_name.ends_with(ext))
}

fn read_extension_len(name: &str) -> usize {
    if name.to_lowercase().ends_with("fq") {
        2
    } else {
        5
    }
}

/// File name with its read extension and dot removed (`a_1.fastq` -> `a_1`)
pub fn strip_read_extension(name: &str) -> &str {
    let cut = name.len().saturating_sub(read_extension_len(name) + 1);
    name.get(..cut).unwrap_or("")
}

/// Key under which mates are grouped.
///
/// The extension letters are removed (the dot stays), then the last
/// `suffix_len` characters: `/d/a_1.fastq` -> `/d/a_1.` -> `/d/a`.
pub fn pair_key(path: &Path, suffix_len: usize) -> String {
    let full = path.to_string_lossy();
    let cut = full.len().saturating_sub(read_extension_len(&full));
    let stem = full.get(..cut).unwrap_or("");
    let keep = stem.chars().count().saturating_sub(suffix_len);
    stem.chars().take(keep).collect()
}

/// Group files into mates by [`pair_key`].
///
/// A third file with the same key replaces the mate slot. The order of the
/// returned groups is unspecified.
pub fn pair(files: &[PathBuf], suffix_len: usize) -> Vec<MateGroup> {
    let mut groups: HashMap<String, MateGroup> = HashMap::new();

    for file in files {
        let key = pair_key(file, suffix_len);
        match groups.get_mut(&key) {
            Some(group) => {
                if let Some(previous) = group.mate.replace(file.clone()) {
                    warn!(
                        "More than two files share pair key {}; {} replaces {}",
                        key,
                        file.display(),
                        previous.display()
                    );
                }
            }
            None => {
                groups.insert(
                    key,
                    MateGroup {
                        primary: file.clone(),
                        mate: None,
                    },
                );
            }
        }
    }

    groups.into_values().collect()
}
