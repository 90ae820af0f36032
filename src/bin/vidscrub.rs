use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use vidscrub::{FfmpegLogLevel, PixelBuffer, ReaderOptions, ScrubError, VideoReader};

const CLI_AFTER_HELP: &str = "Examples:\n  vidscrub info input.mp4 --json\n  vidscrub frame input.mp4 120 --out frame.png\n  vidscrub walk input.mp4 --start 00:01:00 --count 48 --out frames --reverse --progress\n  vidscrub completions zsh > _vidscrub";

#[derive(Debug, Parser)]
#[command(
    name = "vidscrub",
    version,
    about = "Read video frames by index, forwards or backwards",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Print every saved frame.
    #[arg(long)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Frame rate to assume when the file declares none.
    #[arg(long)]
    fallback_fps: Option<f64>,

    /// Maximum frames decoded and discarded to reach a seek target.
    #[arg(long)]
    seek_discard_limit: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print stream information.
    #[command(
        about = "Print video stream information",
        visible_alias = "probe",
        after_help = "Examples:\n  vidscrub info input.mp4\n  vidscrub info input.mp4 --json"
    )]
    Info {
        /// Input video path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Save a single frame as an image.
    #[command(
        about = "Save one frame",
        after_help = "Examples:\n  vidscrub frame input.mp4 120 --out frame.png\n  vidscrub frame input.mp4 00:00:04 --out frame.jpg"
    )]
    Frame {
        /// Input video path.
        input: PathBuf,
        /// Frame index, or a time as HH:MM:SS / MM:SS / seconds with a fraction.
        position: String,
        /// Output image path; the format follows the extension.
        #[arg(long)]
        out: PathBuf,
    },

    /// Step through consecutive frames and save each one.
    #[command(
        about = "Walk frames forward or backward",
        after_help = "Examples:\n  vidscrub walk input.mp4 --start 0 --count 30 --out frames\n  vidscrub walk input.mp4 --start 500 --count 100 --out frames --reverse --ext jpg"
    )]
    Walk {
        /// Input video path.
        input: PathBuf,
        /// Output directory for frame images.
        #[arg(long)]
        out: PathBuf,
        /// First frame, as an index or a time.
        #[arg(long, default_value = "0")]
        start: String,
        /// Number of frames to save.
        #[arg(long, default_value_t = 16)]
        count: u64,
        /// Walk toward the start of the video.
        #[arg(long)]
        reverse: bool,
        /// Output image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    if !seconds.is_finite() {
        return Err(format!("invalid seconds in time: {trimmed}").into());
    }
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Duration::try_from_secs_f64(total_seconds.max(0.0))
        .map_err(|error| format!("time out of range: {trimmed} ({error})").into())
}

/// Resolve a frame index, a `HH:MM:SS` time, or fractional seconds to a
/// frame index.
fn parse_position(value: &str, frames_per_second: f64) -> Result<i64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.contains(':') {
        let time = parse_timecode(trimmed)?;
        return Ok((time.as_secs_f64() * frames_per_second).floor() as i64);
    }
    if let Ok(index) = trimmed.parse::<i64>() {
        return Ok(index);
    }
    let seconds = trimmed
        .parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite())
        .ok_or_else(|| format!("invalid frame position: {trimmed}"))?;
    Ok((seconds.max(0.0) * frames_per_second).floor() as i64)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn reader_options(global: &GlobalOptions) -> ReaderOptions {
    let mut options = ReaderOptions::new();
    if let Some(fps) = global.fallback_fps {
        options = options.with_fallback_frames_per_second(fps);
    }
    if let Some(limit) = global.seek_discard_limit {
        options = options.with_seek_discard_limit(limit);
    }
    options
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        vidscrub::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn save_frame(
    frame: &PixelBuffer,
    path: &Path,
    global: &GlobalOptions,
    frame_index: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_writable_path(path, global.overwrite)?;
    frame.save(path)?;
    if global.verbose {
        eprintln!("saved frame {frame_index} -> {}", path.display());
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Info { input, json } => {
            let reader = VideoReader::open_with_options(&input, reader_options(&cli.global))?;
            let info = reader.info();
            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "codec": info.codec,
                    "width": info.width,
                    "height": info.height,
                    "fps": info.frames_per_second,
                    "frame_count": info.frame_count,
                    "duration_seconds": info.duration.as_secs_f64(),
                    "time_base": info.time_base.to_string(),
                    "start_timestamp": info.start_timestamp,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("File: {}", input.display());
                println!(
                    "Video: {}x{} @ {:.3} fps [{}]",
                    info.width, info.height, info.frames_per_second, info.codec
                );
                println!("Frames: {}", info.frame_count);
                println!("Duration: {:?}", info.duration);
                println!("Time base: {}", info.time_base);
            }
        }
        Commands::Frame {
            input,
            position,
            out,
        } => {
            let mut reader = VideoReader::open_with_options(&input, reader_options(&cli.global))?;
            let frame_index = parse_position(&position, reader.fps())?;
            let frame = reader.get_frame(frame_index)?;
            save_frame(frame, &out, &cli.global, frame_index as u64)?;
            println!("{} {}", "saved".green().bold(), out.display());
        }
        Commands::Walk {
            input,
            out,
            start,
            count,
            reverse,
            ext,
            progress,
        } => {
            if count == 0 {
                return Err("--count must be greater than 0".into());
            }

            if out.exists() {
                if !cli.global.overwrite {
                    return Err(format!(
                        "output directory already exists: {} (use --overwrite)",
                        out.display()
                    )
                    .into());
                }
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("writing into existing directory {}", out.display()).yellow()
                );
            }
            fs::create_dir_all(&out)?;

            let mut reader = VideoReader::open_with_options(&input, reader_options(&cli.global))?;
            let last = reader.frame_count().saturating_sub(1) as i64;
            let start_index = parse_position(&start, reader.fps())?.clamp(0, last);
            let ext_clean = ext.trim_start_matches('.').to_ascii_lowercase();

            let progress_bar = if progress {
                let pb = ProgressBar::new(count);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let mut saved = 0_u64;
            let mut previous: Option<u64> = None;
            while saved < count {
                let frame = match previous {
                    None => reader.get_frame(start_index)?,
                    Some(_) if reverse => reader.get_prev_frame()?,
                    Some(_) => reader.get_next_frame()?,
                }
                .clone();
                let frame_index = reader.current_frame_index();
                if previous == Some(frame_index) {
                    break;
                }

                let path = out.join(format!("frame_{frame_index:06}.{ext_clean}"));
                save_frame(&frame, &path, &cli.global, frame_index)?;

                previous = Some(frame_index);
                saved += 1;
                if let Some(pb) = &progress_bar {
                    pb.inc(1);
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            let statistics = reader.statistics();
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Saved {saved} frame(s) to {}", out.display()).green()
            );
            println!(
                "{} requests={} misses={} seeks={} decoded={} discarded={} hit rate={:.1}%",
                "cache".cyan().bold(),
                statistics.requests,
                statistics.cache_misses,
                statistics.seeks,
                statistics.frames_decoded,
                statistics.frames_discarded,
                statistics.hit_rate() * 100.0
            );
            if saved < count {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("reached the {} of the video", if reverse { "start" } else { "end" })
                        .yellow()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vidscrub", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        if let Some(ScrubError::FrameOutOfRange { .. }) = error.downcast_ref::<ScrubError>() {
            eprintln!("{} {error}", "error:".red().bold());
            std::process::exit(2);
        }
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
