use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use eframe::egui;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod exiftool;
mod orientation;
mod pose;
mod session;
mod sphere;
mod targets;
mod viewer;

use exiftool::ExifTool;
use session::Session;
use viewer::{CommitSlot, PanoViewer};

const APP_ID: &str = "pano-level";

#[derive(Parser, Debug)]
#[command(name = "pano-level")]
#[command(about = "Level and north-align 360° photospheres, writing the pose back with exiftool")]
struct Args {
    /// Image to open, or `glob:<pattern>` to open every match in turn.
    target: String,

    /// exiftool executable used to write the corrected pose.
    #[arg(long, default_value = exiftool::DEFAULT_PROGRAM)]
    exiftool: PathBuf,

    /// Degrees of view rotation per dragged pixel.
    #[arg(long, default_value_t = orientation::DEFAULT_SENSITIVITY)]
    sensitivity: f64,

    /// Log the exiftool command instead of running it.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let tool = ExifTool::locate(&args.exiftool)?.dry_run(args.dry_run);
    info!(program = %tool.program().display(), dry_run = args.dry_run, "exiftool found");
    let paths = targets::expand(&args.target)?;
    if paths.is_empty() {
        warn!(pattern = %args.target, "nothing matched");
        return Ok(());
    }

    // One independent session per file, one after another.
    let mut failed = 0;
    for path in &paths {
        if let Err(e) = run_session(path, &tool, args.sensitivity) {
            error!(path = %path.display(), "{e:#}");
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} panoramas were not saved", paths.len());
    }
    Ok(())
}

fn run_session(path: &Path, tool: &ExifTool, sensitivity: f64) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pose = pose::Pose::from_image_bytes(&bytes);
    let image = viewer::decode(path, &bytes)?;
    drop(bytes);
    let session = Session::new(path.to_path_buf(), pose, Box::new(tool.clone()), sensitivity);

    let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("Photosphere Viewer - {name}"))
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([200.0, 150.0])
            .with_app_id(APP_ID),
        // Hand control back after the window closes so the next file can open.
        run_and_return: true,
        ..Default::default()
    };

    let committed: CommitSlot = Rc::default();
    let slot = committed.clone();
    eframe::run_native(
        APP_ID,
        options,
        Box::new(move |cc| Ok(Box::new(PanoViewer::new(cc, session, image, slot)))),
    )
    .map_err(|e| anyhow!("viewer failed: {e}"))?;

    match committed.take() {
        Some(Ok(pose)) => {
            info!(path = %path.display(), %pose, "saved");
            Ok(())
        }
        Some(Err(e)) => Err(e).context("failed to write corrected pose"),
        None => {
            warn!(path = %path.display(), "window closed without saving");
            Ok(())
        }
    }
}
