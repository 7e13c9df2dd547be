//! Swing CLI Tool
//!
//! Command-line interface for burning avatar badges and caption cards into
//! videos, probing videos and previewing the overlay bitmaps.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swing_core::{geometry, OverlayConfig, OverlayRequest, VideoInfo};
use swing_overlay::{CancelToken, OverlayChannel, OverlayCompositor, OverlayWorker};
use swing_raster::{AvatarRasterizer, CaptionRasterizer};
use swing_transform::{FfmpegProber, FfmpegTransformer, Prober};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "swing")]
#[command(about = "Swing overlays - burn an avatar badge and a caption card into videos")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite overlays onto a video
    Overlay {
        /// Input video file path
        input: PathBuf,

        /// Output video file path
        #[arg(short, long)]
        output: PathBuf,

        /// Avatar photo to cut into a round badge
        #[arg(long)]
        avatar: Option<PathBuf>,

        /// Caption text for the bottom card
        #[arg(long)]
        caption: Option<String>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the transform timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Show video dimensions and bitrate
    Probe {
        /// Input video file path
        input: PathBuf,
    },

    /// Dispatch a method call and print its JSON reply
    Call {
        /// Method name, e.g. processVideo
        method: String,

        /// JSON argument object
        #[arg(long, default_value = "{}")]
        args: String,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Render an avatar badge to a PNG
    RenderAvatar {
        /// Photo file path
        image: PathBuf,

        /// Badge diameter in pixels; derived from --video-size when omitted
        #[arg(long)]
        size: Option<u32>,

        /// Video size used to derive the diameter, as WIDTHxHEIGHT
        #[arg(long, default_value = "1920x1080")]
        video_size: String,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Render a caption card to a PNG
    RenderCaption {
        /// Caption text
        text: String,

        /// Video width the card is laid out for
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Video height the card is laid out for
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Overlay {
            input,
            output,
            avatar,
            caption,
            config,
            timeout_secs,
        } => overlay_video(input, output, avatar, caption, config, timeout_secs)?,

        Commands::Probe { input } => probe_video(&input)?,

        Commands::Call {
            method,
            args,
            config,
        } => call_method(&method, &args, config)?,

        Commands::RenderAvatar {
            image,
            size,
            video_size,
            output,
            config,
        } => render_avatar(&image, size, &video_size, &output, config)?,

        Commands::RenderCaption {
            text,
            width,
            height,
            output,
            config,
        } => render_caption(&text, width, height, &output, config)?,
    }

    Ok(())
}

/// Colored output for terminals, JSON when `LOG_FORMAT=json`
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swing=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn load_config(path: Option<PathBuf>) -> Result<OverlayConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<OverlayConfig>(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => OverlayConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn overlay_video(
    input: PathBuf,
    output: PathBuf,
    avatar: Option<PathBuf>,
    caption: Option<String>,
    config: Option<PathBuf>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let mut config = load_config(config)?;
    if let Some(secs) = timeout_secs {
        config.transform.timeout_secs = secs;
    }

    println!("Processing video: {}", input.display());
    println!("Output: {}", output.display());

    let mut request = OverlayRequest::new(input, output);
    if let Some(avatar) = avatar {
        request = request.with_avatar(avatar);
    }
    if let Some(caption) = caption {
        request = request.with_caption(caption);
    }

    let compositor = OverlayCompositor::with_ffmpeg(config).context("Failed to set up compositor")?;
    let written = compositor
        .process(&request, &CancelToken::new())
        .context("Failed to overlay video")?;

    println!("Successfully wrote {}", written.display());
    Ok(())
}

fn probe_video(input: &Path) -> Result<()> {
    let info = FfmpegProber.probe(input).context("Failed to probe video")?;
    print_info(input, &info);
    Ok(())
}

fn call_method(method: &str, args: &str, config: Option<PathBuf>) -> Result<()> {
    let args: serde_json::Value = serde_json::from_str(args).context("--args must be valid JSON")?;
    let config = load_config(config)?;

    let compositor = OverlayCompositor::new(
        config,
        Arc::new(FfmpegProber),
        Arc::new(FfmpegTransformer::default()),
    )
    .context("Failed to set up compositor")?;
    let worker = OverlayWorker::spawn(compositor).context("Failed to start overlay worker")?;
    let channel = OverlayChannel::new(worker);

    let reply = channel.call(method, args);
    println!("{}", serde_json::to_string_pretty(&reply)?);
    if !reply.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn render_avatar(
    image: &Path,
    size: Option<u32>,
    video_size: &str,
    output: &Path,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    let size = match size {
        Some(size) => size,
        None => {
            let (width, height) = parse_video_size(video_size)?;
            geometry::avatar_size(&config, &VideoInfo::new(width, height, 0))
        }
    };

    let badge = AvatarRasterizer::new(&config.avatar)
        .try_build(image, size)
        .with_context(|| format!("Failed to build avatar from {}", image.display()))?;
    badge.save(output).context("Failed to save avatar")?;

    info!(size, output = %output.display(), "Avatar rendered");
    println!("Saved {}x{} avatar to {}", badge.width(), badge.height(), output.display());
    Ok(())
}

fn render_caption(text: &str, width: u32, height: u32, output: &Path, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let rasterizer = CaptionRasterizer::new(config);
    if !rasterizer.has_fonts() {
        bail!("No caption font available; set caption.font_path in the config");
    }

    let card = rasterizer
        .build(text, width, height)
        .context("Caption card could not be drawn")?;
    card.save(output).context("Failed to save caption")?;

    println!("Saved {}x{} caption card to {}", card.width(), card.height(), output.display());
    Ok(())
}

fn parse_video_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("Video size {value:?} is not WIDTHxHEIGHT"))?;
    let width = width.trim().parse().context("Invalid video width")?;
    let height = height.trim().parse().context("Invalid video height")?;
    Ok((width, height))
}

fn print_info(input: &Path, info: &VideoInfo) {
    println!("\n=== Video Information ===");
    println!("File: {}", input.display());
    println!("Resolution: {}x{}", info.width, info.height);
    match info.target_bitrate() {
        Some(bitrate) => println!("Bitrate: {} bps ({:.2} Mbps)", bitrate, bitrate as f64 / 1_000_000.0),
        None => println!("Bitrate: unknown"),
    }

    let config = OverlayConfig::default();
    if info.is_valid() {
        println!("\n=== Default overlay geometry ===");
        println!("Avatar size: {} px", geometry::avatar_size(&config, info));
        println!("Avatar margin: {} px", geometry::avatar_margin(&config, info));
        println!("Caption margin: {} px", geometry::caption_margin(&config, info));
        println!("Caption text size: {:.1} px", geometry::caption_text_size(&config, info));
        println!("Caption max width: {} px", geometry::caption_max_width(&config, info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_size() {
        assert_eq!(parse_video_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_video_size("720X1280").unwrap(), (720, 1280));
        assert!(parse_video_size("1920").is_err());
        assert!(parse_video_size("axb").is_err());
    }

    #[test]
    fn test_cli_parses_overlay() {
        let cli = Cli::try_parse_from([
            "swing",
            "overlay",
            "in.mp4",
            "-o",
            "out.mp4",
            "--caption",
            "Nice swing",
            "--timeout-secs",
            "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Overlay {
                caption,
                timeout_secs,
                avatar,
                ..
            } => {
                assert_eq!(caption.as_deref(), Some("Nice swing"));
                assert_eq!(timeout_secs, Some(30));
                assert!(avatar.is_none());
            }
            _ => panic!("expected overlay"),
        }
    }
}
