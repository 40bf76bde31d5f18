mod audio;
mod cli;
mod config;
mod encode;
mod error;
mod plan;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use cli::Cli;
use encode::ffmpeg::{AudioSource, ExportSettings};
use plan::external::{load_suggestions, ExternalCandidate};
use plan::types::ImageAttributes;
use plan::PlanOptions;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Explicit --config path, or auto-detect beatcut.toml / global config
    let config_path = cli.config.clone().or_else(config::discover_config);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Config values apply only when the CLI is at its default
            if cli.width == 1920 { cli.width = cfg.output.width; }
            if cli.height == 1080 { cli.height = cfg.output.height; }
            if cli.fps == 30 { cli.fps = cfg.output.fps; }
            if cli.crf == 18 { cli.crf = cfg.output.crf; }
            if cli.codec == "libx264" { cli.codec = cfg.output.codec; }
            if cli.mood.is_none() { cli.mood = cfg.plan.mood; }
            if cli.title.is_none() { cli.title = cfg.plan.title; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("beatcut - beat-synced slideshow planner");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());

    let images = load_images(&cli)?;
    log::info!("Images: {}", images.len());

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(input)?;
    let window = audio_data
        .window(cli.start, cli.end)
        .context("Invalid audio selection")?;
    log::info!(
        "Selection: {:.2}s-{:.2}s ({:.2}s of {:.2}s)",
        window.start_time,
        window.end_time,
        window.duration(),
        audio_data.duration()
    );

    // 2. Analyze
    log::info!("Analyzing audio...");
    let analysis = audio::analysis::analyze(&window);
    if let Some(ref path) = cli.analysis_out {
        write_json(path, &analysis)?;
        log::info!("Wrote analysis to {}", path.display());
    }

    // 3. Outside suggestions are optional; any failure means heuristics only
    let external: Vec<ExternalCandidate> = match cli.candidates.as_deref() {
        Some(source) => load_suggestions(source).unwrap_or_else(|err| {
            log::warn!("Ignoring external suggestions: {:#}", err);
            Vec::new()
        }),
        None => Vec::new(),
    };

    // 4. Plan
    let options = PlanOptions {
        overall_mood: cli.mood.clone(),
        title: cli
            .title
            .clone()
            .unwrap_or_else(|| plan::DEFAULT_TITLE.to_string()),
    };
    let editing_plan = plan::build_plan(&analysis, &images, &external, &options)
        .context("Failed to build editing plan")?;
    write_json(&cli.output, &editing_plan)?;
    log::info!("Wrote plan to {}", cli.output.display());

    // 5. Optional video export
    if let Some(ref export_path) = cli.export {
        let settings = ExportSettings {
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
            codec: cli.codec.clone(),
            crf: cli.crf,
        };
        let source = AudioSource {
            path: input,
            start: window.start_time,
            duration: window.duration(),
        };
        encode::ffmpeg::export_plan(&editing_plan, &images, &source, export_path, &settings)?;
    }

    log::info!("Done!");
    Ok(())
}

fn load_images(cli: &Cli) -> Result<Vec<ImageAttributes>> {
    match (&cli.images, cli.count) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read image attributes: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid image attributes JSON: {}", path.display()))
        }
        (None, Some(count)) => Ok(vec![ImageAttributes::default(); count]),
        (None, None) => anyhow::bail!("Pass --images <file> or --count <n>"),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
