use crate::cue::{AlbumPlan, TrackPlan};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One independent transcode. Jobs never read each other's output, so a
/// batch may run in any order, including in parallel.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Trim offset into the source. `None` means encode the whole file.
    pub start_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub tags: BTreeMap<String, String>,
    pub bitrate_kbps: u32,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("tracks {first} and {second} both map to destination '{destination}'")]
    DuplicateDestination {
        first: u32,
        second: u32,
        destination: String,
    },
}

/// How a track's output filename is derived. The artist component was part
/// of the historical convention and is kept selectable; tags always carry
/// the artist either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingPolicy {
    /// `NN - Title.mp3`
    #[default]
    TitleOnly,
    /// `NN - Artist - Title.mp3`
    ArtistTitle,
}

impl NamingPolicy {
    pub fn filename(&self, track: &TrackPlan) -> String {
        let title = sanitize(track.title.as_deref().unwrap_or("Untitled"));
        match self {
            NamingPolicy::TitleOnly => format!("{:02} - {}.mp3", track.number, title),
            NamingPolicy::ArtistTitle => {
                let artist = sanitize(track.artist.as_deref().unwrap_or("Unknown"));
                format!("{:02} - {} - {}.mp3", track.number, artist, title)
            }
        }
    }
}

/// Colons collide with path rules on some platforms and with the tag
/// delimiter convention upstream.
fn sanitize(value: &str) -> String {
    value.replace(':', "-")
}

/// One job per track of the album plan, in track order.
pub fn build_album_jobs(
    plan: &AlbumPlan,
    out_dir: &Path,
    bitrate_kbps: u32,
    naming: NamingPolicy,
) -> Result<Vec<TranscodeJob>, JobError> {
    let total = plan.tracks.len();
    let mut jobs: Vec<TranscodeJob> = Vec::with_capacity(total);
    for track in &plan.tracks {
        let mut tags = BTreeMap::new();
        tags.insert(
            "artist".to_string(),
            track.artist.clone().unwrap_or_default(),
        );
        tags.insert("title".to_string(), track.title.clone().unwrap_or_default());
        tags.insert("album".to_string(), track.album.clone().unwrap_or_default());
        tags.insert("track".to_string(), format!("{}/{}", track.number, total));
        if let Some(genre) = &track.genre {
            tags.insert("genre".to_string(), genre.clone());
        }
        if let Some(date) = &track.date {
            tags.insert("date".to_string(), date.clone());
        }

        let destination = out_dir.join(naming.filename(track));
        if let Some(previous) = jobs.iter().position(|j| j.destination == destination) {
            return Err(JobError::DuplicateDestination {
                first: plan.tracks[previous].number,
                second: track.number,
                destination: destination.display().to_string(),
            });
        }

        jobs.push(TranscodeJob {
            source: track.source.clone(),
            destination,
            start_seconds: Some(track.start_seconds),
            duration_seconds: track.duration_seconds,
            tags,
            bitrate_kbps,
        });
    }
    Ok(jobs)
}

/// Whole-file conversion: same stem, `.mp3` extension, no trim, no tag
/// injection (ffmpeg carries existing tags over on its own).
pub fn build_single_file_job(input: &Path, out_dir: &Path, bitrate_kbps: u32) -> TranscodeJob {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    TranscodeJob {
        source: input.to_path_buf(),
        destination: out_dir.join(format!("{}.mp3", stem)),
        start_seconds: None,
        duration_seconds: None,
        tags: BTreeMap::new(),
        bitrate_kbps,
    }
}

/// Fractional seconds to `HH:MM:SS` with the seconds truncated, the form
/// ffmpeg's `-ss`/`-t` get handed.
pub fn format_offset(seconds: f64) -> String {
    let whole = seconds as u64;
    format!("{:02}:{:02}:{:02}", whole / 3600, whole / 60 % 60, whole % 60)
}
