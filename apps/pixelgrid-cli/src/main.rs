use anyhow::Context;
use clap::{Parser, Subcommand};
use pixelgrid_common::{BlockGrid, Viewport};
use pixelgrid_kernel::{ManualClock, Showcase, stop_go_eased};
use pixelgrid_render::{
    AlignOutcome, CpuPipeline, FrameOrchestrator, OrthoCamera, PixelGridAligner,
    PixelationConfig, PresentedImage, Presenter, RenderError, SoftwareRasterizer,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixelgrid-cli", about = "Headless pixelgrid tools")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, default settings and the showcase scene size
    Info,
    /// Compute the pixel block grid for a viewport
    Grid {
        #[arg(long, default_value = "1920")]
        width: u32,
        #[arg(long, default_value = "1080")]
        height: u32,
        #[arg(short, long, default_value = "6")]
        block_size: u32,
    },
    /// Render the showcase at a point in time and write a PNG
    Render {
        #[arg(long, default_value = "640")]
        width: u32,
        #[arg(long, default_value = "360")]
        height: u32,
        /// Scene time in seconds
        #[arg(short, long, default_value = "0")]
        time: f64,
        /// Output PNG path
        #[arg(short, long, default_value = "frame.png")]
        out: PathBuf,
        /// Pixelation settings (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the pixel block size
        #[arg(short, long)]
        block_size: Option<u32>,
    },
    /// Trace pixel alignment while the camera pans sideways
    Align {
        /// Number of frames to trace
        #[arg(short, long, default_value = "8")]
        frames: u32,
        /// Pan per frame, in output pixels
        #[arg(short, long, default_value = "0.25")]
        step: f32,
        #[arg(long, default_value = "1920")]
        width: u32,
        #[arg(long, default_value = "1080")]
        height: u32,
        #[arg(short, long, default_value = "6")]
        block_size: u32,
    },
    /// Tabulate the stop-go easing curve
    Ease {
        #[arg(short, long, default_value = "4")]
        period: f64,
        #[arg(short, long, default_value = "2")]
        downtime: f64,
        #[arg(short, long, default_value = "17")]
        samples: u32,
    },
}

/// Writes each presented frame to a PNG file.
struct PngPresenter {
    path: PathBuf,
    frames: u32,
}

impl PngPresenter {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames: 0,
        }
    }
}

impl Presenter for PngPresenter {
    fn present(&mut self, image: &PresentedImage) -> Result<(), RenderError> {
        image::save_buffer(
            &self.path,
            &image.rgba,
            image.width,
            image.height,
            image::ColorType::Rgba8,
        )
        .map_err(|e| RenderError::Present(e.to_string()))?;
        self.frames += 1;
        Ok(())
    }
}

fn load_config(path: Option<&Path>, block_size: Option<u32>) -> anyhow::Result<PixelationConfig> {
    let mut config = match path {
        Some(path) => PixelationConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => PixelationConfig::default(),
    };
    if let Some(block_size) = block_size {
        config.pixel_block_size = block_size;
    }
    for issue in config.validate() {
        tracing::warn!("{issue}; clamping");
    }
    Ok(config.sanitized())
}

/// Render one showcase frame at `time` into `out`.
fn render_frame(
    viewport: Viewport,
    time: f64,
    config: PixelationConfig,
    out: &Path,
) -> anyhow::Result<pixelgrid_render::TickReport> {
    let mut orchestrator = FrameOrchestrator::showcase(ManualClock::at(time), config);
    orchestrator.surface_ready(viewport);
    let mut pipeline = CpuPipeline::new(SoftwareRasterizer::new(), PngPresenter::new(out));
    let report = orchestrator.tick(&mut pipeline)?;
    tracing::debug!(frames = pipeline.presenter().frames, "render finished");
    Ok(report)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("pixelgrid-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "default config: {}",
                serde_json::to_string(&PixelationConfig::default())?
            );
            println!("showcase objects: {}", Showcase::build().scene.object_count());
        }
        Commands::Grid {
            width,
            height,
            block_size,
        } => {
            let grid = BlockGrid::for_viewport(Viewport::new(width, height), block_size);
            println!(
                "{width}x{height} @ {} -> {} x {} blocks",
                grid.block_size, grid.columns, grid.rows
            );
            println!(
                "covered {}x{}, strip {}px right / {}px bottom",
                grid.covered_width(),
                grid.covered_height(),
                width - grid.covered_width(),
                height - grid.covered_height()
            );
            if grid.is_degenerate() {
                println!("degenerate: viewport is smaller than one block, alignment is skipped");
            }
        }
        Commands::Render {
            width,
            height,
            time,
            out,
            config,
            block_size,
        } => {
            let config = load_config(config.as_deref(), block_size)?;
            let report = render_frame(Viewport::new(width, height), time, config, &out)?;
            println!(
                "wrote {} ({width}x{height}, {} x {} blocks, t={time})",
                out.display(),
                report.grid.columns,
                report.grid.rows
            );
        }
        Commands::Align {
            frames,
            step,
            width,
            height,
            block_size,
        } => {
            let viewport = Viewport::new(width, height);
            let aspect = viewport.aspect_ratio();
            let grid = BlockGrid::for_viewport(viewport, block_size);
            let mut camera = OrthoCamera::showcase(aspect);
            let mut aligner = PixelGridAligner::new();
            let pixel = camera.visible_width() / grid.columns.max(1) as f32;

            println!("frame  offset_px  fract_x  fract_y     left    right");
            for frame in 0..frames {
                let outcome = aligner.update(&mut camera, aspect, grid, true);
                let (fx, fy) = match outcome {
                    AlignOutcome::Aligned { fract_x, fract_y } => (fract_x, fract_y),
                    _ => (0.0, 0.0),
                };
                println!(
                    "{frame:>5}  {:>9.3}  {fx:>7.3}  {fy:>7.3}  {:>7.4}  {:>7.4}",
                    frame as f32 * step,
                    camera.left,
                    camera.right
                );
                camera.position += camera.right_axis() * (step * pixel);
            }
        }
        Commands::Ease {
            period,
            downtime,
            samples,
        } => {
            anyhow::ensure!(period > 0.0, "period must be positive");
            anyhow::ensure!(
                (0.0..period).contains(&downtime),
                "downtime must lie in [0, period)"
            );
            let samples = samples.max(2);
            println!("       t   turns");
            for i in 0..samples {
                let t = 2.0 * period * f64::from(i) / f64::from(samples - 1);
                println!("{t:>8.3}  {:>6.3}", stop_go_eased(t, downtime, period));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_writes_png_of_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frame.png");
        let report = render_frame(
            Viewport::new(96, 54),
            1.0,
            PixelationConfig::default(),
            &out,
        )
        .unwrap();
        assert_eq!((report.grid.columns, report.grid.rows), (16, 9));

        let (w, h) = image::image_dimensions(&out).unwrap();
        assert_eq!((w, h), (96, 54));
    }

    #[test]
    fn config_file_is_clamped_and_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.json");
        std::fs::write(&path, r#"{"pixel_block_size": 40, "depth_edge_strength": 0.2}"#).unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.pixel_block_size, 16);
        assert_eq!(config.depth_edge_strength, 0.2);

        let config = load_config(Some(&path), Some(3)).unwrap();
        assert_eq!(config.pixel_block_size, 3);
    }
}
