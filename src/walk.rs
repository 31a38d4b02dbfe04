use crate::config::EncodingOptions;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// One independent unit of work found under the input path. Units fail
/// independently; a bad cue sheet never stops its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
    /// A cue sheet describing one or more tracks cut from album images.
    CueSheet(PathBuf),
    /// A lossless audio file converted whole.
    SingleFile(PathBuf),
}

impl WorkUnit {
    pub fn path(&self) -> &Path {
        match self {
            WorkUnit::CueSheet(p) | WorkUnit::SingleFile(p) => p,
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("'{0}' is neither an existing file nor a directory")]
    InvalidPath(PathBuf),
    #[error("'{0}' is not a cue sheet or recognized audio file")]
    UnrecognizedFile(PathBuf),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Find the work units under `input`. A `.cue` file or audio file is a
/// single unit; a directory is walked recursively. Audio files sitting in
/// a directory that also holds a cue sheet are skipped, the cue sheet owns
/// them.
pub fn discover(input: &Path, options: &EncodingOptions) -> Result<Vec<WorkUnit>, DiscoverError> {
    if input.is_file() {
        return Ok(vec![classify_file(input, options)?]);
    }
    if !input.is_dir() {
        return Err(DiscoverError::InvalidPath(input.to_path_buf()));
    }

    let mut cue_sheets: Vec<PathBuf> = Vec::new();
    let mut audio_files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(input).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if has_extension(path, "cue") {
            cue_sheets.push(path.to_path_buf());
        } else if extension_of(path)
            .map(|ext| options.recognizes_extension(&ext))
            .unwrap_or(false)
        {
            audio_files.push(path.to_path_buf());
        }
    }

    let cue_dirs: HashSet<PathBuf> = cue_sheets
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect();

    let mut units: Vec<WorkUnit> = cue_sheets.into_iter().map(WorkUnit::CueSheet).collect();
    units.extend(
        audio_files
            .into_iter()
            .filter(|p| {
                p.parent()
                    .map(|dir| !cue_dirs.contains(dir))
                    .unwrap_or(true)
            })
            .map(WorkUnit::SingleFile),
    );
    units.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(units)
}

fn classify_file(path: &Path, options: &EncodingOptions) -> Result<WorkUnit, DiscoverError> {
    if has_extension(path, "cue") {
        return Ok(WorkUnit::CueSheet(path.to_path_buf()));
    }
    match extension_of(path) {
        Some(ext) if options.recognizes_extension(&ext) => {
            Ok(WorkUnit::SingleFile(path.to_path_buf()))
        }
        _ => Err(DiscoverError::UnrecognizedFile(path.to_path_buf())),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().into_owned())
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    extension_of(path)
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// The input subdirectory of `current` below `root`, used to mirror the
/// input tree under the output directory. `current` must live under `root`.
pub fn relative_subpath(root: &Path, current: &Path) -> PathBuf {
    current
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| current.to_path_buf())
}
