use crate::cli::Args;
use crate::config::EncodingOptions;
use crate::cue::parse_cue_sheet;
use crate::executor::{ExecStrategy, JobOutcome, run_batch};
use crate::ffmpeg::{check_dependency, check_ffmpeg_installation, run_transcode};
use crate::jobs::{
    NamingPolicy, TranscodeJob, build_album_jobs, build_single_file_job, format_offset,
};
use crate::walk::{WorkUnit, discover, relative_subpath};
use anyhow::{Context, Result, bail};
use comfy_table::{Table, presets::UTF8_FULL};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn run(args: Args) -> Result<()> {
    let options = EncodingOptions::load(args.config.as_deref())?;

    // Handle --check-ffmpeg command
    if args.check_ffmpeg {
        return handle_ffmpeg_check(&options);
    }

    let bitrate_kbps = match &args.bitrate {
        Some(value) => options.parse_bitrate(value)?,
        None => options.default_bitrate_kbps,
    };

    let input = PathBuf::from(&args.input);
    let units = discover(&input, &options)?;
    if units.is_empty() {
        println!("ℹ️ No cue sheets or recognized audio files under {}", args.input);
        return Ok(());
    }

    let naming = if args.artist_in_filename {
        NamingPolicy::ArtistTitle
    } else {
        NamingPolicy::TitleOnly
    };
    let out_root = args
        .outdir
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    // Mirroring is anchored at the walked directory; for a plain file input
    // everything lands directly in the output root.
    let mirror_root = if input.is_dir() {
        input.clone()
    } else {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let (jobs, failed_units) = assemble_jobs(
        &units,
        &mirror_root,
        &out_root,
        args.samedir,
        bitrate_kbps,
        naming,
    );

    if !failed_units.is_empty() {
        println!("\n⚠️ Skipped units:");
        for (path, error) in &failed_units {
            println!("  {}: {:#}", path.display(), error);
        }
    }
    if jobs.is_empty() {
        bail!("No convertible tracks found ({} unit(s) failed).", failed_units.len());
    }

    let strategy = match args.jobs {
        None => ExecStrategy::Sequential,
        Some(0) => ExecStrategy::parallel(),
        Some(n) => ExecStrategy::WorkerPool(n),
    };

    print_plan(&args, &options, &jobs, bitrate_kbps, strategy);

    if args.yes {
        println!("\n--yes flag provided, proceeding without confirmation.");
    } else {
        println!("\nProceed with this plan? [y/N]");
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborting operation.");
            return Ok(());
        }
    }

    check_dependency(&options.ffmpeg_path)?;

    // Every destination directory must exist before its first job runs.
    let out_dirs: BTreeSet<PathBuf> = jobs
        .iter()
        .filter_map(|j| j.destination.parent().map(Path::to_path_buf))
        .collect();
    for dir in &out_dirs {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    println!("\n▶️ Converting {} track(s)...", jobs.len());
    let ffmpeg_path = options.ffmpeg_path.clone();
    let outcomes = run_batch(&jobs, strategy, |job| {
        println!("🎵 {}", job.destination.display());
        run_transcode(&ffmpeg_path, job, args.debug)
    });

    report_outcomes(&outcomes, &failed_units)
}

/// Build jobs for every unit up front. A malformed unit fails alone and
/// never blocks its siblings. Destination uniqueness is enforced across the
/// whole batch, not just within one cue sheet: a unit whose output would
/// land on a destination an earlier unit already claimed is rejected, since
/// two parallel jobs must never write the same file.
fn assemble_jobs(
    units: &[WorkUnit],
    mirror_root: &Path,
    out_root: &Path,
    samedir: bool,
    bitrate_kbps: u32,
    naming: NamingPolicy,
) -> (Vec<TranscodeJob>, Vec<(PathBuf, anyhow::Error)>) {
    let mut jobs: Vec<TranscodeJob> = Vec::new();
    let mut failed_units: Vec<(PathBuf, anyhow::Error)> = Vec::new();
    let mut claimed: BTreeSet<PathBuf> = BTreeSet::new();
    for unit in units {
        let out_dir = unit_out_dir(unit, mirror_root, out_root, samedir);
        match build_unit_jobs(unit, &out_dir, bitrate_kbps, naming) {
            Ok(unit_jobs) => {
                if let Some(dup) = unit_jobs.iter().find(|j| claimed.contains(&j.destination)) {
                    let e = anyhow::anyhow!(
                        "destination '{}' is already written by another input",
                        dup.destination.display()
                    );
                    log::warn!("skipping {}: {:#}", unit.path().display(), e);
                    failed_units.push((unit.path().to_path_buf(), e));
                } else {
                    claimed.extend(unit_jobs.iter().map(|j| j.destination.clone()));
                    jobs.extend(unit_jobs);
                }
            }
            Err(e) => {
                log::warn!("skipping {}: {:#}", unit.path().display(), e);
                failed_units.push((unit.path().to_path_buf(), e));
            }
        }
    }
    (jobs, failed_units)
}

fn unit_out_dir(unit: &WorkUnit, mirror_root: &Path, out_root: &Path, samedir: bool) -> PathBuf {
    let unit_dir = unit
        .path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    if samedir {
        unit_dir
    } else {
        out_root.join(relative_subpath(mirror_root, &unit_dir))
    }
}

fn build_unit_jobs(
    unit: &WorkUnit,
    out_dir: &Path,
    bitrate_kbps: u32,
    naming: NamingPolicy,
) -> Result<Vec<TranscodeJob>> {
    match unit {
        WorkUnit::CueSheet(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let cue_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let plan = parse_cue_sheet(&text, &cue_dir)
                .with_context(|| format!("malformed cue sheet {}", path.display()))?;
            Ok(build_album_jobs(&plan, out_dir, bitrate_kbps, naming)?)
        }
        WorkUnit::SingleFile(path) => Ok(vec![build_single_file_job(path, out_dir, bitrate_kbps)]),
    }
}

fn print_plan(
    args: &Args,
    options: &EncodingOptions,
    jobs: &[TranscodeJob],
    bitrate_kbps: u32,
    strategy: ExecStrategy,
) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Source", "Start", "Duration", "Destination"]);
    for (i, job) in jobs.iter().enumerate() {
        table.add_row(vec![
            format!("{}", i + 1),
            job.source.display().to_string(),
            job.start_seconds.map(format_offset).unwrap_or_else(|| "-".to_string()),
            job.duration_seconds
                .map(format_offset)
                .unwrap_or_else(|| "to end".to_string()),
            job.destination.display().to_string(),
        ]);
    }
    println!("\n▶️ Proposed Conversion Plan:");
    println!("{table}");

    let workers = match strategy {
        ExecStrategy::Sequential => "1 (sequential)".to_string(),
        ExecStrategy::WorkerPool(n) => format!("{}", n),
    };
    let mut info_table = Table::new();
    info_table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Parameter", "Value"]);
    info_table
        .add_row(vec!["Input", &args.input])
        .add_row(vec![
            "Output Directory",
            &args
                .outdir
                .clone()
                .unwrap_or_else(|| if args.samedir { "(same as input)".into() } else { ".".into() }),
        ])
        .add_row(vec!["Bitrate", &format!("{}k", bitrate_kbps)])
        .add_row(vec!["Workers", &workers])
        .add_row(vec!["ffmpeg", &options.ffmpeg_path]);
    println!("\n▶️ Job Details:");
    println!("{info_table}");
}

fn report_outcomes(outcomes: &[JobOutcome], failed_units: &[(PathBuf, anyhow::Error)]) -> Result<()> {
    let failed: Vec<&JobOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    let succeeded = outcomes.len() - failed.len();

    if !failed.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Destination", "Error"]);
        for outcome in &failed {
            if let Err(e) = &outcome.result {
                table.add_row(vec![outcome.destination.display().to_string(), e.to_string()]);
            }
        }
        println!("\n❌ Failed jobs:");
        println!("{table}");
    }

    println!(
        "\n✅ {} of {} track(s) converted.",
        succeeded,
        outcomes.len()
    );
    if !failed.is_empty() || !failed_units.is_empty() {
        bail!(
            "{} job(s) failed, {} unit(s) skipped.",
            failed.len(),
            failed_units.len()
        );
    }
    Ok(())
}

fn handle_ffmpeg_check(options: &EncodingOptions) -> Result<()> {
    println!("🔍 Checking ffmpeg installation...\n");

    let check_result = check_ffmpeg_installation(&options.ffmpeg_path);

    if check_result.available {
        if let Some(version) = &check_result.version {
            println!("✅ ffmpeg found:");
            println!(
                "   Version: {}.{}.{}",
                version.major, version.minor, version.patch
            );
        } else {
            println!("⚠️  Could not parse ffmpeg version from output");
        }
        println!("\n🎉 ffmpeg check complete!");
        Ok(())
    } else {
        println!("❌ ffmpeg not found at '{}'", options.ffmpeg_path);
        println!("   Please install ffmpeg and ensure it's accessible from the command line");
        match &check_result.error {
            Some(error) => bail!("ffmpeg is required but not installed: {}", error),
            None => bail!("ffmpeg is required but not installed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn colliding_destinations_across_units_fail_that_unit() {
        // a.flac and a.ape both render to a.mp3; only the first may run.
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.flac"));
        touch(&dir.path().join("a.ape"));
        let units = discover(dir.path(), &EncodingOptions::default()).unwrap();
        assert_eq!(units.len(), 2);

        let (jobs, failed) = assemble_jobs(
            &units,
            dir.path(),
            Path::new("/out"),
            false,
            192,
            NamingPolicy::TitleOnly,
        );
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].destination, Path::new("/out/a.mp3"));
        assert_eq!(failed.len(), 1);
        assert!(
            failed[0].1.to_string().contains("already written"),
            "unexpected error: {}",
            failed[0].1
        );
    }

    #[test]
    fn cue_sheets_sharing_an_output_directory_collide() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = concat!(
            "FILE \"disc.flac\" WAVE\n",
            "  TRACK 01 AUDIO\n",
            "    TITLE \"Same\"\n",
            "    INDEX 01 00:00:00\n",
        );
        fs::write(dir.path().join("one.cue"), sheet).unwrap();
        fs::write(dir.path().join("two.cue"), sheet).unwrap();
        let units = discover(dir.path(), &EncodingOptions::default()).unwrap();
        assert_eq!(units.len(), 2);

        let (jobs, failed) = assemble_jobs(
            &units,
            dir.path(),
            Path::new("/out"),
            false,
            192,
            NamingPolicy::TitleOnly,
        );
        // Both sheets map track 1 to "01 - Same.mp3"; the second is skipped.
        assert_eq!(jobs.len(), 1);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, dir.path().join("two.cue"));
    }

    #[test]
    fn distinct_destinations_across_units_all_survive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.flac"));
        touch(&dir.path().join("b.flac"));
        let units = discover(dir.path(), &EncodingOptions::default()).unwrap();

        let (jobs, failed) = assemble_jobs(
            &units,
            dir.path(),
            Path::new("/out"),
            false,
            192,
            NamingPolicy::TitleOnly,
        );
        assert_eq!(jobs.len(), 2);
        assert!(failed.is_empty());
        assert_ne!(jobs[0].destination, jobs[1].destination);
    }
}
