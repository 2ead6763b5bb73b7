//! CLI binary for screenplay-breakdown.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the breakdown.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use screenplay_breakdown::{
    BreakdownRecord, ExtractionConfig, ExtractionProgressCallback, Extractor, ProgressCallback,
    TablePreset, TaggerRegistry,
};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per tagger
/// failure. Scenes complete out of order, so timings are keyed by index.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-scene wall-clock start times.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Tagger failures seen so far.
    errors: AtomicUsize,
    /// Slowest scene, in milliseconds.
    slowest_ms: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a spinner; `on_extraction_start` turns it into a bar once the
    /// scene count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Segmenting script…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
            slowest_ms: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} scenes  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Tagging");
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, index: usize) -> u128 {
        self.start_times
            .lock()
            .map(|mut times| times.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_scenes: usize) {
        self.activate_bar(total_scenes);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Tagging {total_scenes} scenes…"))
        ));
    }

    fn on_scene_start(&self, index: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(format!("scene {index}"));
    }

    fn on_scene_complete(&self, index: usize, _total: usize, _candidates: usize) {
        let elapsed = self.elapsed_ms(index) as usize;
        self.slowest_ms.fetch_max(elapsed, Ordering::SeqCst);
        self.bar.inc(1);
    }

    fn on_tagger_error(&self, tagger: &str, index: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Scene {:>3}  {:<12}  {}",
            red("✗"),
            index,
            tagger,
            red(&msg),
        ));
    }

    fn on_extraction_complete(&self, total_scenes: usize, entities: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        let slowest = self.slowest_ms.load(Ordering::SeqCst);

        if errors == 0 {
            eprintln!(
                "{} {} scenes, {} entities  {}",
                green("✔"),
                bold(&total_scenes.to_string()),
                bold(&entities.to_string()),
                dim(&format!("slowest scene {slowest}ms")),
            );
        } else {
            eprintln!(
                "{} {} scenes, {} entities  ({} tagger failures)",
                cyan("⚠"),
                bold(&total_scenes.to_string()),
                bold(&entities.to_string()),
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown breakdown table (stdout)
  breakdown script.txt

  # Department columns and a synopsis
  breakdown --preset extended script.txt

  # Pick columns
  breakdown --preset scene,location,characters script.txt

  # Full record as JSON
  breakdown --format json script.txt > breakdown.json

  # Tab-separated for spreadsheets
  breakdown --format tsv script.txt -o breakdown.tsv

  # CSV for Excel (files get a UTF-8 BOM, stdout does not)
  breakdown --format csv --preset extended script.txt -o breakdown.csv

  # Read from stdin, force Russian taggers
  pdftotext script.pdf - | breakdown --language ru -

INPUT:
  Plain text as produced by a PDF/DOCX text extractor. UTF-8, UTF-16 with
  BOM, and legacy encodings (windows-1251, KOI8-R, …) are detected
  automatically. Form feeds mark page breaks.

ENVIRONMENT VARIABLES:
  RUST_LOG                 Override the log filter (e.g. screenplay_breakdown=debug)
  BREAKDOWN_FORMAT         Default output format
  BREAKDOWN_PRESET         Default table preset
  BREAKDOWN_LANGUAGE       Language hint
"#;

/// Produce a scene breakdown from screenplay text.
#[derive(Parser, Debug)]
#[command(
    name = "breakdown",
    version,
    about = "Produce a scene breakdown (locations, characters, props) from screenplay text",
    long_about = "Split an extracted screenplay into scenes on INT./EXT. sluglines and list the \
locations, characters and objects of every scene. Aliases such as JOHN / John Smith are merged \
into one entity with a stable identifier.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Text file to read, or `-` for stdin.
    input: String,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "BREAKDOWN_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "BREAKDOWN_FORMAT", value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Shorthand for `--format json`.
    #[arg(long)]
    json: bool,

    /// Table columns: basic, extended, or a comma-separated column list.
    #[arg(long, env = "BREAKDOWN_PRESET", default_value = "basic",
          value_parser = parse_preset)]
    preset: TablePreset,

    /// Document language (en, ru). Detected from the script mix if omitted.
    #[arg(short, long, env = "BREAKDOWN_LANGUAGE")]
    language: Option<String>,

    /// Language assumed when detection is inconclusive.
    #[arg(long, env = "BREAKDOWN_FALLBACK_LANGUAGE", default_value = "en")]
    fallback_language: String,

    /// Number of scenes tagged in parallel. Defaults to the CPU count.
    #[arg(short, long, env = "BREAKDOWN_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Drop objects whose tagger confidence is below this (0.0–1.0).
    #[arg(long, env = "BREAKDOWN_OBJECT_MIN_CONFIDENCE")]
    object_min_confidence: Option<f32>,

    /// Keep `(MORE)` / `(CONTINUED)` lines.
    #[arg(long)]
    keep_continuations: bool,

    /// Disable progress bar.
    #[arg(long, env = "BREAKDOWN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BREAKDOWN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BREAKDOWN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Markdown,
    Tsv,
    Csv,
    Json,
}

fn parse_preset(s: &str) -> std::result::Result<TablePreset, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.json { FormatArg::Json } else { cli.format };

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v asks for everything.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read input ───────────────────────────────────────────────────────
    let (bytes, source_name) = read_input(&cli.input)?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let extractor = Extractor::new(config, TaggerRegistry::builtin());
    let mut record = extractor
        .extract_bytes(&bytes, cli.language.as_deref())
        .await
        .with_context(|| format!("Breakdown of {} failed", source_name))?;
    record.metadata.source_name = Some(source_name);

    // ── Write output ─────────────────────────────────────────────────────
    let rendered = render(&record, format, &cli.preset, cli.output.is_some())?;
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&rendered)
                .context("Failed to write to stdout")?;
            if !rendered.ends_with(b"\n") {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        for warning in &record.warnings {
            eprintln!("{} {}", cyan("⚠"), warning);
        }
        if !show_progress {
            eprintln!(
                "{} scenes, {} entities in {}ms ({})",
                record.stats.scene_count,
                record.registry.len(),
                record.stats.total_duration_ms,
                dim(&record.stats.taggers_used.join(", ")),
            );
        }
    }

    Ok(())
}

/// Read the whole input as bytes; the library detects the encoding.
fn read_input(input: &str) -> Result<(Vec<u8>, String)> {
    if input == "-" {
        let mut bytes = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Failed to read stdin")?;
        return Ok((bytes, "<stdin>".to_string()));
    }
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input))?;
    Ok((bytes, input.to_string()))
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .fallback_language(cli.fallback_language.clone())
        .strip_continuations(!cli.keep_continuations);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(c) = cli.object_min_confidence {
        builder = builder.object_min_confidence(c);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Render the record. `to_file` adds the byte order mark Excel expects on
/// CSV files.
fn render(
    record: &BreakdownRecord,
    format: FormatArg,
    preset: &TablePreset,
    to_file: bool,
) -> Result<Vec<u8>> {
    Ok(match format {
        FormatArg::Json => serde_json::to_vec_pretty(record).context("Failed to serialise breakdown")?,
        FormatArg::Markdown => record.to_table(preset).to_markdown().into_bytes(),
        FormatArg::Tsv => record.to_table(preset).to_tsv().into_bytes(),
        FormatArg::Csv => {
            let mut buf = Vec::new();
            record
                .to_table(preset)
                .write_csv(&mut buf, to_file)
                .context("Failed to write CSV")?;
            buf
        }
    })
}
