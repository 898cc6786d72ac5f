mod logging;
pub mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkseal_core::{
    CaptureMode, DocumentEditorSession, EditorBackends, EditorConfig, SignatureCapture,
};
use inkseal_raster::{DocumentLoader, LopdfBackend, OpenSource, PageRasterizer};
use inkseal_storage::{FileSignatureStore, PdfSink, PngDirectorySink};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "inkseal")]
#[command(about = "Annotate, redact and sign PDF documents")]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Rasterize one page to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.5)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay an editing script and export the flattened pages.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON array of script steps.
        #[arg(long)]
        script: PathBuf,
        /// Editor configuration JSON.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write one PNG per page into this directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Write all pages into this PDF.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Render a typed signature to PNG.
    Signature {
        #[arg(long)]
        name: String,
        #[arg(long)]
        output: PathBuf,
        /// Also save the signature into the library at this directory.
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    title: Option<String>,
    page_count: usize,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    page: usize,
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct AnnotateOutput {
    page_count: usize,
    objects_per_page: Vec<usize>,
    outputs: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SignatureOutput {
    id: String,
    width: u32,
    height: u32,
    output: String,
    stored: bool,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    logging::init(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, scale, output } => run_render(&file, page, scale, output.as_deref()),
        Commands::Annotate { file, script, config, out_dir, pdf } => {
            run_annotate(&file, &script, config.as_deref(), out_dir.as_deref(), pdf.as_deref())
        }
        Commands::Signature { name, output, store, config } => {
            run_signature(&name, &output, store.as_deref(), config.as_deref())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let backend = LopdfBackend::new();
    let doc = backend.load(&OpenSource::from(file)).context("failed to open PDF")?;

    let pages = doc
        .pages
        .iter()
        .map(|page| PageSizeOutput {
            page: page.index as usize + 1,
            width: page.size.width_pt,
            height: page.size.height_pt,
        })
        .collect();
    let payload = InfoOutput {
        path: file.display().to_string(),
        title: doc.title.clone(),
        page_count: doc.page_count(),
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    backend.close(doc.handle);

    Ok(())
}

fn run_render(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let backend = LopdfBackend::new();
    let doc = backend.load(&OpenSource::from(file)).context("failed to open PDF")?;

    let handle = doc
        .page(page as usize - 1)
        .with_context(|| format!("page {page} does not exist (page_count={})", doc.page_count()))?;
    let image = backend.render(handle, scale).context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(file, page));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    backend.close(doc.handle);

    Ok(())
}

fn run_annotate(
    file: &Path,
    script_path: &Path,
    config: Option<&Path>,
    out_dir: Option<&Path>,
    pdf: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;
    let steps = script::load(script_path)?;
    let config = load_config(config)?;

    let backend = Arc::new(LopdfBackend::new());
    let mut session = DocumentEditorSession::open(file, EditorBackends::from_backend(backend), config)
        .context("failed to open PDF")?;

    script::run(&mut session, &steps)?;
    // Commit a gesture the script left open.
    let tool = session.tool_state().active_tool;
    session.set_tool(tool);

    let pdf = match (out_dir, pdf) {
        (None, None) => Some(default_pdf_output(file)),
        (_, pdf) => pdf.map(ToOwned::to_owned),
    };

    let mut outputs = Vec::new();
    if let Some(dir) = out_dir {
        let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");
        let mut sink = PngDirectorySink::new(dir).with_stem(stem);
        session.save(&mut sink).context("failed to export pages")?;
        outputs.extend(sink.written().iter().map(|path| path.display().to_string()));
    }
    if let Some(pdf) = pdf {
        let mut sink = PdfSink::new(&pdf);
        session.save(&mut sink).context("failed to export PDF")?;
        outputs.push(pdf.display().to_string());
    }

    let payload = AnnotateOutput {
        page_count: session.page_count(),
        objects_per_page: session.pages().iter().map(|page| page.surface().len()).collect(),
        outputs,
    };
    session.close();

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_signature(name: &str, output: &Path, store: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;

    let mut capture = SignatureCapture::new(CaptureMode::Type, config.signature);
    capture.set_name(name);

    let stored = store.is_some();
    let asset = match store {
        Some(dir) => {
            let mut library = FileSignatureStore::with_root(dir);
            capture.finish_into(&mut library).context("failed to save signature")?
        }
        None => capture.finish().context("failed to create signature")?,
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    asset
        .preview
        .save(output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    let (width, height) = asset.preview.dimensions();
    let payload = SignatureOutput {
        id: asset.id.to_string(),
        width,
        height,
        output: output.display().to_string(),
        stored,
    };
    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EditorConfig::default()),
    }
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

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

fn default_pdf_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}-signed.pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_outputs_sit_next_to_input() {
        let file = Path::new("/tmp/docs/lease.pdf");
        assert_eq!(default_page_output(file, 2), PathBuf::from("/tmp/docs/lease-page-2.png"));
        assert_eq!(default_pdf_output(file), PathBuf::from("/tmp/docs/lease-signed.pdf"));
    }

    #[test]
    fn cli_parses_global_verbose_flag() {
        let cli = Cli::parse_from(["inkseal", "info", "doc.pdf", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Info { .. }));
    }
}
