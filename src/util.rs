use std::path::Path;

/// Convert a Path to &str, failing on non-UTF-8 paths. ffmpeg argument
/// vectors are built from &str, so non-UTF-8 inputs are rejected up front.
pub fn path_to_str(path: &Path) -> anyhow::Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid path (not UTF-8): {}", path.display()))
}
