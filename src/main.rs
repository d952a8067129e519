use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use strokeboard::canvas::{Canvas, Document, draw_demo};
use strokeboard::config::Config;
use strokeboard::geometry::Extent;
use strokeboard::gpu::SoftwareDevice;
use strokeboard::persistence::{FileStore, PersistenceManager};

/// Size of the offscreen view the CLI renders into.
const VIEW_EXTENT: Extent = Extent::new(1280, 800);

#[derive(Parser, Debug)]
#[command(name = "strokeboard")]
#[command(
    version,
    about = "Infinite-canvas ink engine with incremental GPU rendering"
)]
struct Cli {
    /// Document file to open (created on first save)
    #[arg(long, short = 'f', value_name = "FILE")]
    document: Option<PathBuf>,

    /// Configuration file (defaults to ~/.config/strokeboard/config.toml)
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print element counts and document bounds
    #[arg(long, short = 's', action = ArgAction::SetTrue)]
    stats: bool,

    /// Render a preview of the whole document to a PNG file
    #[arg(long, short = 'p', value_name = "OUT.png")]
    preview: Option<PathBuf>,

    /// Draw a scripted sample scene into the document
    #[arg(long, action = ArgAction::SetTrue)]
    demo: bool,

    /// Write the documented example configuration and exit
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["document", "stats", "preview", "demo"])]
    init_config: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };

    if cli.init_config {
        Config::create_default_file(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    if !cli.stats && !cli.demo && cli.preview.is_none() {
        println!("strokeboard: infinite-canvas ink engine");
        println!();
        println!("Usage:");
        println!("  strokeboard --document board.json --demo     Draw a sample scene and save it");
        println!("  strokeboard --document board.json --stats    Summarise a document");
        println!("  strokeboard --document board.json --preview out.png");
        println!("  strokeboard --init-config                    Write the example config");
        println!("  strokeboard --help                           Show help");
        return Ok(());
    }

    let config = Config::load_from(&config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to start the persistence runtime")?;

    let mut document = Document::new(
        cli.document
            .as_deref()
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string()),
    );
    if let Some(path) = &cli.document {
        let store = Arc::new(FileStore::with_options(path, config.file_store_options()));
        document = document.with_persistence(PersistenceManager::new(
            runtime.handle(),
            store,
            config.retry_policy(),
        ));
    }

    let mut canvas = Canvas::new(
        document,
        Box::new(SoftwareDevice::new()),
        VIEW_EXTENT,
        &config,
    );
    let loaded = runtime
        .block_on(canvas.load_all())
        .context("Failed to load document")?;
    log::info!("Loaded {} elements", loaded);

    if cli.demo {
        let drawn = draw_demo(&mut canvas).context("Failed to draw the demo scene")?;
        println!("Drew {drawn} demo strokes");
    }

    if cli.stats {
        println!("{}", canvas.stats());
    }

    if let Some(out) = &cli.preview {
        let image = canvas
            .render_preview_image()
            .context("Failed to render preview")?
            .context("Document is empty, nothing to preview")?;
        save_preview(&image, out)?;
        println!(
            "Wrote {}x{} preview to {}",
            image.extent().width,
            image.extent().height,
            out.display()
        );
    }

    runtime
        .block_on(canvas.flush())
        .context("Failed to flush pending saves")?;
    if let Some(persistence) = canvas.document().persistence()
        && let Some(failure) = runtime.block_on(persistence.take_last_failure())
    {
        return Err(anyhow::anyhow!("Saving the document failed: {failure}"));
    }

    Ok(())
}

#[cfg(feature = "png")]
fn save_preview(image: &strokeboard::gpu::Bitmap, out: &std::path::Path) -> Result<()> {
    strokeboard::export::save_png(image, out)
}

#[cfg(not(feature = "png"))]
fn save_preview(_image: &strokeboard::gpu::Bitmap, _out: &std::path::Path) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG export is not available; rebuild with `--features png`"
    ))
}
