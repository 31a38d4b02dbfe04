use std::path::{Path, PathBuf};
use thiserror::Error;

/// Album-level tags accumulated from the cue sheet header region.
/// Tracks inherit a snapshot of these; later header lines do not
/// retroactively affect tracks already opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumMetadata {
    pub genre: Option<String>,
    pub date: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// One `TRACK` entry of a cue sheet, in file order.
#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub number: u32,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub album: Option<String>,
    /// Audio file this track is cut from, resolved against the cue sheet's
    /// directory. A cue sheet may switch `FILE` mid-sheet; each track keeps
    /// the one that most recently preceded it.
    pub source: PathBuf,
    /// Offset of the track's `INDEX 01` in fractional seconds.
    pub start_seconds: f64,
    /// Inferred from the next track's start. The last track has none and
    /// plays to the end of its source file.
    pub duration_seconds: Option<f64>,
}

/// Parsed cue sheet: header tags plus the ordered track list.
#[derive(Debug, Clone)]
pub struct AlbumPlan {
    pub metadata: AlbumMetadata,
    pub tracks: Vec<TrackPlan>,
}

#[derive(Debug, Error)]
pub enum CueError {
    #[error("cue sheet contains no TRACK entries")]
    NoTracks,
    #[error("line {line}: {field} before any TRACK entry")]
    FieldBeforeTrack { line: usize, field: &'static str },
    #[error("line {line}: TRACK entry without a preceding FILE line")]
    TrackWithoutFile { line: usize },
    #[error("line {line}: invalid track number '{value}'")]
    InvalidTrackNumber { line: usize, value: String },
    #[error("line {line}: invalid INDEX timestamp '{value}', expected mm:ss:ff")]
    InvalidTimestamp { line: usize, value: String },
    #[error("track {number} has no INDEX 01 line")]
    MissingIndex { number: u32 },
    #[error("line {line}: TRACK {number} follows TRACK {previous}, numbers must increase")]
    NonIncreasingTrackNumber {
        line: usize,
        number: u32,
        previous: u32,
    },
    #[error("track {number} starts at {start:.2}s, before the previous track at {previous:.2}s")]
    NonMonotonicStart {
        number: u32,
        start: f64,
        previous: f64,
    },
}

// Intermediate state while a track's INDEX 01 has not been seen yet.
struct OpenTrack {
    number: u32,
    title: Option<String>,
    artist: Option<String>,
    genre: Option<String>,
    date: Option<String>,
    album: Option<String>,
    source: PathBuf,
    start_seconds: Option<f64>,
}

/// Parse cue sheet text into an [`AlbumPlan`].
///
/// Single forward pass. The grammar is the small subset actually consumed:
/// `REM GENRE`, `REM DATE`, `PERFORMER` and `TITLE` at column 0 set album
/// metadata; `FILE` switches the current source; two-space-indented `TRACK`
/// opens a track and four-space-indented `TITLE`/`PERFORMER`/`INDEX 01`
/// fill it in. Anything else (`FLAGS`, `CATALOG`, `REM COMMENT`, pregap
/// `INDEX 00`, ...) is ignored.
pub fn parse_cue_sheet(text: &str, cue_dir: &Path) -> Result<AlbumPlan, CueError> {
    let mut metadata = AlbumMetadata::default();
    let mut current_file: Option<PathBuf> = None;
    let mut open: Vec<OpenTrack> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(rest) = line.strip_prefix("REM GENRE ") {
            metadata.genre = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("REM DATE ") {
            metadata.date = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("PERFORMER ") {
            metadata.artist = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("TITLE ") {
            metadata.album = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("FILE ") {
            current_file = Some(cue_dir.join(parse_file_target(rest)));
        } else if let Some(rest) = line.strip_prefix("  TRACK ") {
            let number_str = rest.split_whitespace().next().unwrap_or("");
            let number: u32 =
                number_str
                    .parse()
                    .map_err(|_| CueError::InvalidTrackNumber {
                        line: line_no,
                        value: number_str.to_string(),
                    })?;
            let source = current_file
                .clone()
                .ok_or(CueError::TrackWithoutFile { line: line_no })?;
            // Track numbers are not required to be contiguous, but they
            // must never repeat or go backwards.
            if let Some(last) = open.last() {
                if number <= last.number {
                    return Err(CueError::NonIncreasingTrackNumber {
                        line: line_no,
                        number,
                        previous: last.number,
                    });
                }
            }
            // Snapshot of the album metadata as of this line; header lines
            // appearing later in the sheet belong to later tracks only.
            open.push(OpenTrack {
                number,
                title: None,
                artist: metadata.artist.clone(),
                genre: metadata.genre.clone(),
                date: metadata.date.clone(),
                album: metadata.album.clone(),
                source,
                start_seconds: None,
            });
        } else if let Some(rest) = line.strip_prefix("    TITLE ") {
            let track = open.last_mut().ok_or(CueError::FieldBeforeTrack {
                line: line_no,
                field: "TITLE",
            })?;
            track.title = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("    PERFORMER ") {
            let track = open.last_mut().ok_or(CueError::FieldBeforeTrack {
                line: line_no,
                field: "PERFORMER",
            })?;
            track.artist = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("    INDEX 01 ") {
            let track = open.last_mut().ok_or(CueError::FieldBeforeTrack {
                line: line_no,
                field: "INDEX",
            })?;
            track.start_seconds = Some(parse_timestamp(rest.trim()).ok_or_else(|| {
                CueError::InvalidTimestamp {
                    line: line_no,
                    value: rest.trim().to_string(),
                }
            })?);
        }
    }

    if open.is_empty() {
        return Err(CueError::NoTracks);
    }

    let mut tracks = Vec::with_capacity(open.len());
    for t in open {
        let start_seconds = t
            .start_seconds
            .ok_or(CueError::MissingIndex { number: t.number })?;
        tracks.push(TrackPlan {
            number: t.number,
            title: t.title,
            artist: t.artist,
            genre: t.genre,
            date: t.date,
            album: t.album,
            source: t.source,
            start_seconds,
            duration_seconds: None,
        });
    }

    // Duration inference; also enforces that start offsets never go
    // backwards across the sheet.
    for i in 0..tracks.len() - 1 {
        let duration = tracks[i + 1].start_seconds - tracks[i].start_seconds;
        if duration < 0.0 {
            return Err(CueError::NonMonotonicStart {
                number: tracks[i + 1].number,
                start: tracks[i + 1].start_seconds,
                previous: tracks[i].start_seconds,
            });
        }
        tracks[i].duration_seconds = Some(duration);
    }

    Ok(AlbumPlan { metadata, tracks })
}

/// `mm:ss:ff` to fractional seconds. Frames are treated as hundredths of a
/// second, matching the converter this replaces; the cue standard's 75
/// frames per second is deliberately not applied (see DESIGN.md).
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    let frames: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(minutes as f64 * 60.0 + seconds as f64 + frames as f64 / 100.0)
}

/// `FILE "name.flac" WAVE` -> `name.flac` (trailing type token dropped,
/// surrounding quotes stripped).
fn parse_file_target(rest: &str) -> String {
    let rest = rest.trim();
    let without_type = match rest.rsplit_once(' ') {
        Some((target, _type)) => target,
        None => rest,
    };
    unquote(without_type)
}

fn unquote(value: &str) -> String {
    value.trim().replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"REM GENRE "Electronic"
REM DATE 1998
PERFORMER "Album Artist"
TITLE "Album Title"
FILE "album.flac" WAVE
  TRACK 01 AUDIO
    TITLE "First"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Second"
    PERFORMER "Guest"
    INDEX 00 02:03:00
    INDEX 01 02:05:50
  TRACK 03 AUDIO
    TITLE "Third"
    INDEX 01 05:00:00
"#;

    fn parse(text: &str) -> Result<AlbumPlan, CueError> {
        parse_cue_sheet(text, Path::new("/music/album"))
    }

    #[test]
    fn parses_one_track_per_track_line() {
        let plan = parse(SHEET).unwrap();
        assert_eq!(plan.tracks.len(), 3);
        assert_eq!(
            plan.tracks.iter().map(|t| t.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn header_fields_populate_album_metadata() {
        let plan = parse(SHEET).unwrap();
        assert_eq!(plan.metadata.genre.as_deref(), Some("Electronic"));
        assert_eq!(plan.metadata.date.as_deref(), Some("1998"));
        assert_eq!(plan.metadata.artist.as_deref(), Some("Album Artist"));
        assert_eq!(plan.metadata.album.as_deref(), Some("Album Title"));
    }

    #[test]
    fn timestamp_frames_are_hundredths() {
        let plan = parse(SHEET).unwrap();
        assert_eq!(plan.tracks[1].start_seconds, 2.0 * 60.0 + 5.0 + 0.5);
    }

    #[test]
    fn durations_inferred_from_next_start_except_last() {
        let plan = parse(SHEET).unwrap();
        assert_eq!(plan.tracks[0].duration_seconds, Some(125.5));
        assert_eq!(plan.tracks[1].duration_seconds, Some(174.5));
        assert_eq!(plan.tracks[2].duration_seconds, None);
    }

    #[test]
    fn source_resolved_against_cue_dir_and_follows_file_lines() {
        let text = r#"FILE "side_a.flac" WAVE
  TRACK 01 AUDIO
    TITLE "A"
    INDEX 01 00:00:00
FILE "side_b.flac" WAVE
  TRACK 02 AUDIO
    TITLE "B"
    INDEX 01 00:00:00
"#;
        let plan = parse(text).unwrap();
        assert_eq!(plan.tracks[0].source, Path::new("/music/album/side_a.flac"));
        assert_eq!(plan.tracks[1].source, Path::new("/music/album/side_b.flac"));
    }

    #[test]
    fn album_metadata_is_snapshotted_per_track() {
        let text = r#"PERFORMER "A"
FILE "x.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    INDEX 01 00:00:00
PERFORMER "B"
  TRACK 02 AUDIO
    TITLE "Two"
    INDEX 01 01:00:00
"#;
        let plan = parse(text).unwrap();
        assert_eq!(plan.tracks[0].artist.as_deref(), Some("A"));
        assert_eq!(plan.tracks[1].artist.as_deref(), Some("B"));
    }

    #[test]
    fn track_performer_overrides_inherited_artist() {
        let plan = parse(SHEET).unwrap();
        assert_eq!(plan.tracks[0].artist.as_deref(), Some("Album Artist"));
        assert_eq!(plan.tracks[1].artist.as_deref(), Some("Guest"));
    }

    #[test]
    fn missing_index_01_is_rejected() {
        let text = r#"FILE "x.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
"#;
        assert!(matches!(
            parse(text),
            Err(CueError::MissingIndex { number: 1 })
        ));
    }

    #[test]
    fn index_before_any_track_is_rejected() {
        let text = r#"FILE "x.flac" WAVE
    INDEX 01 00:00:00
"#;
        assert!(matches!(
            parse(text),
            Err(CueError::FieldBeforeTrack { field: "INDEX", .. })
        ));
    }

    #[test]
    fn backwards_start_offsets_are_rejected() {
        let text = r#"FILE "x.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    INDEX 01 03:00:00
  TRACK 02 AUDIO
    TITLE "Two"
    INDEX 01 01:00:00
"#;
        assert!(matches!(
            parse(text),
            Err(CueError::NonMonotonicStart { number: 2, .. })
        ));
    }

    #[test]
    fn duplicate_track_numbers_are_rejected() {
        let text = r#"FILE "x.flac" WAVE
  TRACK 01 AUDIO
    INDEX 01 00:00:00
  TRACK 01 AUDIO
    INDEX 01 01:00:00
"#;
        assert!(matches!(
            parse(text),
            Err(CueError::NonIncreasingTrackNumber {
                number: 1,
                previous: 1,
                ..
            })
        ));
    }

    #[test]
    fn decreasing_track_numbers_are_rejected() {
        let text = r#"FILE "x.flac" WAVE
  TRACK 02 AUDIO
    INDEX 01 00:00:00
  TRACK 01 AUDIO
    INDEX 01 01:00:00
"#;
        assert!(matches!(
            parse(text),
            Err(CueError::NonIncreasingTrackNumber {
                number: 1,
                previous: 2,
                ..
            })
        ));
    }

    #[test]
    fn non_contiguous_increasing_track_numbers_are_accepted() {
        let text = r#"FILE "x.flac" WAVE
  TRACK 01 AUDIO
    INDEX 01 00:00:00
  TRACK 05 AUDIO
    INDEX 01 01:00:00
"#;
        let plan = parse(text).unwrap();
        assert_eq!(
            plan.tracks.iter().map(|t| t.number).collect::<Vec<_>>(),
            vec![1, 5]
        );
    }

    #[test]
    fn sheet_without_tracks_is_rejected() {
        assert!(matches!(
            parse("TITLE \"Only a header\"\n"),
            Err(CueError::NoTracks)
        ));
    }

    #[test]
    fn unrecognized_directives_are_ignored() {
        let text = r#"CATALOG 0000000000000
REM COMMENT "ExactAudioCopy v1.3"
FILE "x.flac" WAVE
  TRACK 01 AUDIO
    FLAGS DCP
    TITLE "One"
    INDEX 01 00:00:00
"#;
        let plan = parse(text).unwrap();
        assert_eq!(plan.tracks.len(), 1);
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let text = r#"FILE "x.flac" WAVE
  TRACK 01 AUDIO
    INDEX 01 00:xx:00
"#;
        assert!(matches!(parse(text), Err(CueError::InvalidTimestamp { .. })));
    }
}
