use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::plan::types::{EditingClip, EditingPlan, ImageAttributes, MotionKind, TransitionKind};

#[derive(Clone, Debug)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub crf: u32,
}

/// Where the soundtrack comes from: the decoded file and the selected window.
pub struct AudioSource<'a> {
    pub path: &'a Path,
    pub start: f64,
    pub duration: f64,
}

/// Render the plan as a slideshow video with ffmpeg.
pub fn export_plan(
    plan: &EditingPlan,
    images: &[ImageAttributes],
    audio: &AudioSource,
    output_path: &Path,
    settings: &ExportSettings,
) -> Result<()> {
    let args = build_args(plan, images, audio, output_path, settings)?;
    log::debug!("ffmpeg {}", args.join(" "));

    let child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

    log::info!(
        "FFmpeg export started: {} clips, {}x{} @ {}fps, codec={}",
        plan.clips.len(),
        settings.width,
        settings.height,
        settings.fps,
        settings.codec
    );

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Rendering {}", output_path.display()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let output = child.wait_with_output().context("Failed to wait for ffmpeg")?;
    pb.finish_and_clear();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
    }

    log::info!("FFmpeg export complete: {}", output_path.display());
    Ok(())
}

/// Full ffmpeg argument list: one looped still per clip, the trimmed audio
/// last, and a filter graph that scales, moves and joins the clips.
pub fn build_args(
    plan: &EditingPlan,
    images: &[ImageAttributes],
    audio: &AudioSource,
    output_path: &Path,
    settings: &ExportSettings,
) -> Result<Vec<String>> {
    if plan.clips.is_empty() {
        anyhow::bail!("Plan has no clips to export");
    }

    let mut args = vec!["-y".to_string()];
    for (i, clip) in plan.clips.iter().enumerate() {
        let path = image_path(images, clip.image_index)?;
        args.extend([
            "-loop".into(),
            "1".into(),
            "-framerate".into(),
            settings.fps.to_string(),
            "-t".into(),
            format!("{:.3}", input_secs(&plan.clips, i)),
            "-i".into(),
            path_arg(&path)?,
        ]);
    }

    args.extend([
        "-ss".into(),
        format!("{:.3}", audio.start),
        "-t".into(),
        format!("{:.3}", audio.duration),
        "-i".into(),
        path_arg(audio.path)?,
    ]);

    args.extend([
        "-filter_complex".into(),
        filter_graph(&plan.clips, settings),
        "-map".into(),
        "[outv]".into(),
        "-map".into(),
        format!("{}:a", plan.clips.len()),
        "-c:v".into(),
        settings.codec.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-crf".into(),
        settings.crf.to_string(),
        "-preset".into(),
        "medium".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        path_arg(output_path)?,
    ]);

    Ok(args)
}

fn image_path(images: &[ImageAttributes], index: usize) -> Result<PathBuf> {
    images
        .get(index)
        .and_then(|img| img.path.clone())
        .with_context(|| format!("Image {} has no path; export needs image files", index))
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

/// Seconds of footage clip `i` contributes: its own span plus the overlap the
/// next clip's transition blends over.
fn input_secs(clips: &[EditingClip], i: usize) -> f64 {
    clips[i].duration() + clips.get(i + 1).map_or(0.0, blend_secs)
}

/// Length of the blend into `clip`; zero for hard cuts.
fn blend_secs(clip: &EditingClip) -> f64 {
    if clip.transition.kind == TransitionKind::Cut {
        0.0
    } else {
        clip.transition.duration.max(0.0)
    }
}

/// ffmpeg `xfade` transition name.
fn xfade_name(kind: TransitionKind) -> &'static str {
    match kind {
        TransitionKind::Cut | TransitionKind::Fade => "fade",
        TransitionKind::Dissolve => "dissolve",
        TransitionKind::SlideLeft => "slideleft",
        TransitionKind::SlideRight => "slideright",
        TransitionKind::Zoom => "zoomin",
        TransitionKind::Wipe => "wipeleft",
    }
}

fn filter_graph(clips: &[EditingClip], settings: &ExportSettings) -> String {
    let (w, h, fps) = (settings.width, settings.height, settings.fps);
    let mut chains: Vec<String> = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            let frames = ((input_secs(clips, i) * fps as f64).round() as u64).max(1);
            let (z, x, y) = zoompan_exprs(clip.motion.kind, clip.motion.intensity, frames);
            let mut chain = format!(
                "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,\
                 zoompan=z='{z}':x='{x}':y='{y}':d=1:s={w}x{h}:fps={fps}"
            );
            // Nothing precedes the first clip, so its transition comes in from black
            if i == 0 && blend_secs(clip) > 0.0 {
                chain.push_str(&format!(",fade=t=in:st=0:d={:.3}", blend_secs(clip)));
            }
            chain.push_str(&format!(",format=yuv420p,settb=AVTB[v{i}]"));
            chain
        })
        .collect();

    if clips.len() == 1 {
        chains.push("[v0]null[outv]".to_string());
        return chains.join(";");
    }

    // Fold the clips left to right; clip i's blend starts at its start time
    let mut joined = "v0".to_string();
    for (i, clip) in clips.iter().enumerate().skip(1) {
        let label = if i + 1 == clips.len() {
            "outv".to_string()
        } else {
            format!("x{i}")
        };
        let blend = blend_secs(clip);
        let join = if blend > 0.0 {
            format!(
                "xfade=transition={}:duration={:.3}:offset={:.3}",
                xfade_name(clip.transition.kind),
                blend,
                clip.start_time - clips[0].start_time
            )
        } else {
            "concat=n=2:v=1:a=0".to_string()
        };
        chains.push(format!("[{joined}][v{i}]{join}[{label}]"));
        joined = label;
    }
    chains.join(";")
}

/// zoompan expressions for one motion over `frames` output frames. `on` is
/// the output frame number inside the clip.
fn zoompan_exprs(kind: MotionKind, intensity: f64, frames: u64) -> (String, String, String) {
    let k = format!("{:.4}", intensity);
    let centre_x = "iw/2-(iw/zoom/2)".to_string();
    let centre_y = "ih/2-(ih/zoom/2)".to_string();
    let progress = format!("on/{}", frames);
    let hold = format!("1+{k}");

    match kind {
        MotionKind::Static => ("1".into(), "0".into(), "0".into()),
        MotionKind::ZoomIn => (format!("1+{k}*{progress}"), centre_x, centre_y),
        MotionKind::ZoomOut => (format!("1+{k}-{k}*{progress}"), centre_x, centre_y),
        MotionKind::PanLeft => (hold, format!("(iw-iw/zoom)*(1-{progress})"), centre_y),
        MotionKind::PanRight => (hold, format!("(iw-iw/zoom)*{progress}"), centre_y),
        MotionKind::PanUp => (hold, centre_x, format!("(ih-ih/zoom)*(1-{progress})")),
        MotionKind::PanDown => (hold, centre_x, format!("(ih-ih/zoom)*{progress}")),
    }
}
