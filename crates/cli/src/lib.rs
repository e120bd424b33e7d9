use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use overlay_model::intake::{check_source, check_source_size};
use overlay_model::{OverlaySession, SessionSettings};
use pdf_engine::{
    compose_session, default_engine, merge_documents, parse_page_ranges, render_with_overlay,
    split_document, DocumentHandle, LopdfEngine, OpenSource, PdfEngine, SplitMode,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{load_config_from, EditorConfig, Storage};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod layout;

pub use layout::{load_layout, Layout, LayoutElement, LoadedLayout, Placement};

#[derive(Debug, Parser)]
#[command(name = "overlay-cli")]
#[command(about = "Place text, images, shapes and drawings over PDF pages")]
pub struct Cli {
    /// Editor config file. Defaults to the per-user config.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log debug output to stderr. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a page at the display width, with layout elements painted on top.
    RenderPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_name = "LAYOUT")]
        layout: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Flatten the elements of a layout file into a copy of the PDF.
    Compose {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "LAYOUT")]
        layout: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Concatenate PDFs in the given order.
    Merge {
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Split a PDF into one file per page or per range.
    Split {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Comma-separated pages or ranges, e.g. "1-3, 5". Omit for one file per page.
        #[arg(long)]
        ranges: Option<String>,
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
    output_name: String,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    page: u32,
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ComposeSummary {
    output: String,
    drawn: usize,
    skipped_pages: Vec<u32>,
    skipped_images: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::RenderPage { file, page, layout, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_render_page(&file, page, layout.as_deref(), output.as_deref(), &config)
        }
        Commands::Compose { file, layout, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_compose(&file, &layout, output.as_deref(), &config)
        }
        Commands::Merge { files, output } => run_merge(&files, output.as_deref()),
        Commands::Split { file, ranges, output_dir } => {
            run_split(&file, ranges.as_deref(), output_dir.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    if let Some(path) = path {
        return load_config_from(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    match Storage::from_default_project() {
        Ok(storage) => storage.load_config().context("failed to load stored config"),
        Err(err) => {
            debug!(error = %err, "no config directory, using defaults");
            Ok(EditorConfig::default())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let pages = (0..page_count)
        .map(|index| {
            let size = engine.page_size(handle, index)?;
            Ok(PageSizeOutput { page: index + 1, width: size.width_pt, height: size.height_pt })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        pages,
        output_name: overlay_model::intake::edited_file_name(&file_name(file)),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn open_session(
    file: &Path,
    settings: SessionSettings,
) -> Result<(LopdfEngine, DocumentHandle, OverlaySession)> {
    ensure_pdf_exists(file)?;

    let size = fs::metadata(file)?.len();
    check_source_size(size, settings.max_source_bytes)
        .with_context(|| format!("refusing to open {}", file.display()))?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    check_source(&bytes, settings.max_source_bytes)
        .with_context(|| format!("refusing to open {}", file.display()))?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::Bytes(bytes)).context("failed to open PDF")?;
    let source = engine.source_document(handle, &file_name(file))?;

    let mut session = OverlaySession::new(settings);
    session.open(source).context("failed to start editing session")?;

    Ok((engine, handle, session))
}

fn run_render_page(
    file: &Path,
    page: u32,
    layout: Option<&Path>,
    output: Option<&Path>,
    config: &EditorConfig,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let (mut engine, handle, mut session) = open_session(file, config.to_session_settings())?;
    let page_count = session.page_count();
    if page > page_count {
        anyhow::bail!("page {page} out of range (page_count={page_count})");
    }

    if let Some(layout) = layout {
        load_layout(layout)?.apply(&mut session)?;
    }

    let image = {
        let view = engine.view(handle)?;
        render_with_overlay(&view, &session, page).context("failed to render page")?
    };

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(file, page));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save_with_format(&output, ImageFormat::Png)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_compose(
    file: &Path,
    layout: &Path,
    output: Option<&Path>,
    config: &EditorConfig,
) -> Result<()> {
    let (mut engine, handle, mut session) = open_session(file, config.to_session_settings())?;
    load_layout(layout)?.apply(&mut session)?;

    let composed = compose_session(&session).context("failed to compose document")?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| file.with_file_name(session.output_file_name()));
    write_output(&output, &composed.bytes)?;
    info!(output = %output.display(), drawn = composed.report.drawn, "wrote composed document");

    let summary = ComposeSummary {
        output: output.display().to_string(),
        drawn: composed.report.drawn,
        skipped_pages: composed.report.skipped_pages,
        skipped_images: composed.report.skipped_images.iter().map(ToString::to_string).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    engine.close(handle)?;

    Ok(())
}

fn run_merge(files: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let inputs = files
        .iter()
        .map(|file| {
            ensure_pdf_exists(file)?;
            fs::read(file).with_context(|| format!("failed to read {}", file.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_documents(&inputs).context("failed to merge PDFs")?;

    let output = match output {
        Some(output) => output.to_path_buf(),
        None => files.first().map_or_else(
            || PathBuf::from("merged.pdf"),
            |first| first.with_file_name("merged.pdf"),
        ),
    };
    write_output(&output, &merged)?;

    println!("{}", output.display());
    Ok(())
}

fn run_split(file: &Path, ranges: Option<&str>, output_dir: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let mode = match ranges {
        Some(ranges) => {
            let mut engine = default_engine();
            let handle =
                engine.open(OpenSource::Bytes(bytes.clone())).context("failed to open PDF")?;
            let page_count = engine.page_count(handle)?;
            engine.close(handle)?;

            SplitMode::Ranges(parse_page_ranges(ranges, page_count)?)
        }
        None => SplitMode::EachPage,
    };

    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");
    let parts = split_document(&bytes, stem, &mode).context("failed to split PDF")?;

    let output_dir = output_dir
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| file.parent().map(Path::to_path_buf).unwrap_or_default());
    fs::create_dir_all(&output_dir)?;

    for part in parts {
        let path = output_dir.join(&part.name);
        write_output(&path, &part.bytes)?;
        println!("{}", path.display());
    }

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn file_name(file: &Path) -> String {
    file.file_name().and_then(|name| name.to_str()).unwrap_or("document.pdf").to_owned()
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn default_outputs_sit_next_to_input() {
        let file = Path::new("/tmp/docs/report.pdf");

        assert_eq!(default_page_output(file, 3), PathBuf::from("/tmp/docs/report-page-3.png"));
        assert_eq!(file_name(file), "report.pdf");
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let err = load_config(Some(Path::new("/definitely/missing/config.json")))
            .expect_err("missing config should fail");

        assert!(format!("{err:#}").contains("failed to load config"));
    }
}
