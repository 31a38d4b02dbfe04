use crate::jobs::{TranscodeJob, format_offset};
use crate::util::path_to_str;
use regex::Regex;
use std::{
    io,
    process::{Command, Stdio},
};
use thiserror::Error;

#[derive(Debug)]
pub struct FfmpegVersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug)]
pub struct FfmpegCheckResult {
    pub available: bool,
    pub version: Option<FfmpegVersionInfo>,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("`{0}` command not found. Please ensure it is installed and in your PATH.")]
    CommandNotFound(String),
    #[error("Failed to run `{0}`: {1}")]
    CommandFailed(String, String),
    #[error("ffmpeg exited with an error while writing '{destination}'")]
    TranscodeFailed { destination: String },
    #[error("Invalid path (not UTF-8): {0}")]
    NonUtf8Path(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn run_ffmpeg(ffmpeg_path: &str, args: &[&str], debug: bool) -> Result<(), FfmpegError> {
    log::debug!("{} {}", ffmpeg_path, args.join(" "));
    let mut command = Command::new(ffmpeg_path);
    command.args(args);

    if !debug {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let status = command.status().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            FfmpegError::CommandNotFound(ffmpeg_path.to_string())
        } else {
            FfmpegError::Io(e)
        }
    })?;
    if !status.success() {
        return Err(FfmpegError::CommandFailed(
            args.join(" "),
            "ffmpeg failed".to_string(),
        ));
    }
    Ok(())
}

/// Map a [`TranscodeJob`] onto an ffmpeg argument vector. Pure; the caller
/// decides when and where to execute it. Arguments stay a vector end to end,
/// nothing is ever joined into a shell string.
pub fn transcode_args(job: &TranscodeJob) -> Result<Vec<String>, FfmpegError> {
    let source = path_str(job.source.as_path())?;
    let destination = path_str(job.destination.as_path())?;

    let mut args = vec!["-y".to_string(), "-i".to_string(), source.to_string()];
    if let Some(start) = job.start_seconds {
        args.push("-ss".to_string());
        args.push(format_offset(start));
    }
    if let Some(duration) = job.duration_seconds {
        args.push("-t".to_string());
        args.push(format_offset(duration));
    }
    for (key, value) in &job.tags {
        args.push("-metadata".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push("-b:a".to_string());
    args.push(format!("{}k", job.bitrate_kbps));
    args.push(destination.to_string());
    Ok(args)
}

pub fn run_transcode(
    ffmpeg_path: &str,
    job: &TranscodeJob,
    debug: bool,
) -> Result<(), FfmpegError> {
    let args = transcode_args(job)?;
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    run_ffmpeg(ffmpeg_path, &arg_refs, debug).map_err(|e| match e {
        FfmpegError::CommandFailed(..) => FfmpegError::TranscodeFailed {
            destination: job.destination.display().to_string(),
        },
        other => other,
    })
}

fn path_str(path: &std::path::Path) -> Result<&str, FfmpegError> {
    path_to_str(path).map_err(|_| FfmpegError::NonUtf8Path(path.display().to_string()))
}

pub fn check_dependency(cmd: &str) -> Result<(), FfmpegError> {
    match Command::new(cmd)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => Ok(()),
        Err(e) => {
            if e.kind() == io::ErrorKind::NotFound {
                Err(FfmpegError::CommandNotFound(cmd.to_string()))
            } else {
                Err(FfmpegError::CommandFailed(cmd.to_string(), e.to_string()))
            }
        }
    }
}

pub fn check_ffmpeg_installation(ffmpeg_path: &str) -> FfmpegCheckResult {
    let mut result = FfmpegCheckResult {
        available: false,
        version: None,
        error: None,
    };

    match Command::new(ffmpeg_path).arg("-version").output() {
        Ok(output) => {
            if output.status.success() {
                result.available = true;

                let version_info = String::from_utf8_lossy(&output.stdout);
                let re = Regex::new(r"ffmpeg version (\d+)\.(\d+)(?:\.(\d+))?")
                    .expect("version regex is valid");

                if let Some(caps) = re.captures(&version_info) {
                    let major: u32 = caps
                        .get(1)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0);
                    let minor: u32 = caps
                        .get(2)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0);
                    let patch: u32 = caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0));

                    result.version = Some(FfmpegVersionInfo {
                        major,
                        minor,
                        patch,
                    });
                }
            }
        }
        Err(e) => {
            if e.kind() == io::ErrorKind::NotFound {
                result.error = Some(format!("{} not found in PATH", ffmpeg_path));
            } else {
                result.error = Some(format!("Failed to check ffmpeg: {}", e));
            }
        }
    }

    result
}
