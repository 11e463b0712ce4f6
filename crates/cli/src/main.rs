use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use stash_core::{
    ExtractedContent, Extractor, ExtractorConfig, FetchConfig, FetchContext, LocatorConfig, fetch_file, fetch_stdin,
    fetch_url, is_pdf_source, needs_render_fallback,
};
use tracing_subscriber::EnvFilter;
use url::Url;

mod echo;

use echo::{
    format_size, print_banner, print_detail, print_extraction_details, print_info, print_step, print_success,
    print_warning,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for the extracted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Markdown,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: markdown, json", s)),
        }
    }
}

/// Save web pages, PDFs and shared text as clean Markdown
#[derive(Parser, Debug)]
#[command(name = "stash")]
#[command(version = VERSION)]
#[command(about = "Save web pages, PDFs and shared text as clean Markdown", long_about = None)]
struct Args {
    /// URL to fetch, local HTML/PDF file, or "-" for stdin
    #[arg(value_name = "INPUT", required_unless_present = "completions")]
    input: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    format: OutputFormat,

    /// Treat the input as shared plain text rather than a page
    #[arg(long)]
    text: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Nesting depth below the article root that still produces Markdown
    #[arg(long, default_value = "50", value_name = "NUM")]
    max_depth: usize,

    /// JSON file with locator selector and exclusion tables
    #[arg(long, value_name = "FILE")]
    locator_config: Option<PathBuf>,

    /// Never retry thin pages through a headless browser
    #[arg(long)]
    no_fallback: bool,

    /// Overall bound on one headless render, in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    render_timeout: u64,

    /// Declared MIME type of the input (e.g. application/pdf)
    #[arg(long, value_name = "TYPE")]
    mime: Option<String>,

    /// URL used to resolve relative links and images
    #[arg(long, value_name = "URL")]
    base_url: Option<Url>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "stash_core=debug" } else { "stash_core=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn file_url(path: &str) -> Option<Url> {
    let absolute = fs::canonicalize(Path::new(path)).ok()?;
    Url::from_file_path(absolute).ok()
}

fn extractor_config(args: &Args) -> anyhow::Result<ExtractorConfig> {
    let locator = match &args.locator_config {
        Some(path) => LocatorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load locator table: {}", path.display()))?,
        None => LocatorConfig::from_config_dir().context("Failed to load locator table from config directory")?,
    };

    Ok(ExtractorConfig::builder()
        .locator(locator)
        .max_depth(args.max_depth)
        .render_fallback(!args.no_fallback)
        .render_timeout(Duration::from_secs(args.render_timeout))
        .build())
}

/// Reads the input and builds the context it is extracted under.
async fn read_input(args: &Args, input: &str) -> anyhow::Result<(Vec<u8>, FetchContext)> {
    let (bytes, mut context) = if input == "-" {
        let bytes = fetch_stdin().context("Failed to read from stdin")?;
        (bytes, FetchContext::new())
    } else if is_url(input) {
        let config = FetchConfig {
            timeout: args.timeout,
            user_agent: args.user_agent.clone().unwrap_or_else(|| FetchConfig::default().user_agent),
        };
        let fetched = fetch_url(input, &config).await.with_context(|| format!("Failed to fetch URL: {}", input))?;
        let context = fetched.context();
        (fetched.bytes, context)
    } else {
        let bytes = fetch_file(input).with_context(|| format!("Failed to read file: {}", input))?;
        (bytes, FetchContext { base_url: file_url(input), declared_mime_type: None })
    };

    if let Some(base) = &args.base_url {
        context.base_url = Some(base.clone());
    }
    if let Some(mime) = &args.mime {
        context.declared_mime_type = Some(mime.clone());
    }
    Ok((bytes, context))
}

#[cfg(feature = "render")]
async fn render_fallback(
    extractor: &Extractor,
    html: &str,
    context: &FetchContext,
    content: ExtractedContent,
) -> anyhow::Result<ExtractedContent> {
    let renderer = match stash_core::ChromiumRenderer::launch().await {
        Ok(renderer) => renderer,
        Err(e) => {
            print_warning(&format!("Could not launch headless browser: {}", e));
            return Ok(content);
        }
    };
    let rendered = extractor.extract_with_fallback(html, context, &renderer).await;
    renderer.shutdown().await;
    Ok(rendered?)
}

#[cfg(not(feature = "render"))]
async fn render_fallback(
    _extractor: &Extractor,
    _html: &str,
    _context: &FetchContext,
    content: ExtractedContent,
) -> anyhow::Result<ExtractedContent> {
    print_warning("Page looks script-rendered; rebuild with --features render to retry it in a browser");
    Ok(content)
}

async fn extract(
    extractor: &Extractor,
    args: &Args,
    bytes: Vec<u8>,
    context: FetchContext,
) -> anyhow::Result<ExtractedContent> {
    if args.text {
        return Ok(extractor.extract_text(&String::from_utf8_lossy(&bytes), &context));
    }

    if is_pdf_source(&bytes, &context) {
        return extractor.extract_in_background(bytes, context).await.context("Could not read this document");
    }

    let html = String::from_utf8_lossy(&bytes).into_owned();
    let content = extractor.extract_html(&html, &context).context("Failed to extract content")?;
    if extractor.config().render_fallback && needs_render_fallback(&content, &context, extractor.config()) {
        return render_fallback(extractor, &html, &context, content).await;
    }
    Ok(content)
}

fn render_output(content: &ExtractedContent, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Markdown => Ok(format!("{}\n", content.markdown)),
        OutputFormat::Json => {
            let value = content.to_json().context("Failed to serialize record")?;
            Ok(format!("{}\n", serde_json::to_string_pretty(&value)?))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "stash", &mut io::stdout());
        return Ok(());
    }

    init_logging(args.verbose);

    let Some(input) = args.input.clone() else {
        bail!("No input given");
    };

    if args.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let extractor = Extractor::with_config(extractor_config(&args)?);

    if args.verbose {
        let source = if input == "-" { "stdin".to_string() } else { input.clone() };
        print_step(1, 3, &format!("Reading {}", source.bright_white()));
    }
    let (bytes, context) = read_input(&args, &input).await?;

    if args.verbose {
        print_detail("Size", &format_size(bytes.len()));
        if let Some(mime) = &context.declared_mime_type {
            print_detail("Type", mime);
        }
        eprintln!();
        print_step(2, 3, "Extracting content");
    }

    let content = extract(&extractor, &args, bytes, context).await?;
    if content.markdown.is_empty() && !args.text {
        print_warning("No readable content was found");
    }

    if args.verbose {
        print_extraction_details(&content);
        print_step(3, 3, "Writing output");
    }

    let output = render_output(&content, args.format)?;
    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => print!("{}", output),
    }

    Ok(())
}
