//! Command-line interface for the legal document redactor.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::ops::Range;
use std::path::{Path, PathBuf};

use legal_redactor::report::{save_csv, ReviewPayload};
use legal_redactor::{ForcedMask, OutputMode, Policy, RedactionService, RuntimeOverrides};

/// Japanese legal document redactor
///
/// Masks personal and confidential information in .txt, .docx and .pdf
/// files while keeping formatting and layout. Use 'extract' to print the
/// canonical text that offsets refer to.
#[derive(Parser)]
#[command(name = "legal-redactor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input file (.txt, .docx or .pdf)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Policy YAML (defaults to the built-in policy)
    #[arg(long, value_name = "FILE")]
    policy: Option<PathBuf>,

    /// Output mode, overriding the policy
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Term to leave unmasked for this run (repeatable)
    #[arg(long = "allow", value_name = "TERM")]
    allow: Vec<String>,

    /// Force a mask over START:END[:TYPE] (repeatable)
    #[arg(long = "force", value_name = "START:END[:TYPE]", value_parser = parse_force)]
    force: Vec<ForcedMask>,

    /// Never mask anything intersecting START:END (repeatable)
    #[arg(long = "keep", value_name = "START:END", value_parser = parse_range)]
    keep: Vec<Range<usize>>,

    /// Write hits as CSV
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Write the review payload as JSON
    #[arg(long = "review-json", value_name = "FILE")]
    review_json: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Label,
    Black,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Label => OutputMode::Label,
            ModeArg::Black => OutputMode::Black,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical text of a document (offsets for --force/--keep)
    Extract {
        /// Input file path
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Output text file (optional, defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn parse_range(s: &str) -> std::result::Result<Range<usize>, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", s))?;
    let start: usize = start.trim().parse().map_err(|_| format!("invalid start in '{}'", s))?;
    let end: usize = end.trim().parse().map_err(|_| format!("invalid end in '{}'", s))?;
    if start >= end {
        return Err(format!("empty range '{}'", s));
    }
    Ok(start..end)
}

fn parse_force(s: &str) -> std::result::Result<ForcedMask, String> {
    let mut parts = s.splitn(3, ':');
    let range = match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => parse_range(&format!("{}:{}", a, b))?,
        _ => return Err(format!("expected START:END[:TYPE], got '{}'", s)),
    };
    let mask = ForcedMask::new(range.start, range.end);
    Ok(match parts.next().map(str::trim).filter(|t| !t.is_empty()) {
        Some(entity) => mask.with_entity(entity),
        None => mask,
    })
}

/// Redaction command handler with dependency injection.
struct RedactionHandler {
    service: RedactionService,
    verbose: bool,
}

impl RedactionHandler {
    fn new(policy: Policy, verbose: bool) -> Result<Self> {
        Ok(Self {
            service: RedactionService::new(policy).context("Failed to build analyzer")?,
            verbose,
        })
    }

    fn redact(
        &self,
        input: &Path,
        output: &Path,
        overrides: &RuntimeOverrides,
        csv: Option<&Path>,
        review_json: Option<&Path>,
    ) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        if self.verbose {
            println!("Input:  {}", input.display());
            println!("Output: {}", output.display());
        }

        let report = self
            .service
            .redact(input, output, overrides)
            .with_context(|| "Redaction failed")?;

        if let Some(path) = csv {
            save_csv(path, &report.analysis.hits)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        if let Some(path) = review_json {
            ReviewPayload::build(&report)
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        let analysis = &report.analysis;
        if self.verbose {
            println!("\nRedaction Summary:");
            println!("  Mode:         {:?}", analysis.mode);
            println!("  Hits:         {}", analysis.hits.len());
            println!("  For review:   {}", analysis.review_hits());
            for (entity, count) in analysis.by_entity() {
                println!("    {:<10} {}", entity, count);
            }
            if let Some(stats) = &report.pdf_stats {
                println!("  Rectangles:   {}", stats.applied_rects);
            }
        }
        for warning in report.warnings.docx.iter().chain(&report.warnings.pdf) {
            eprintln!("⚠ {}", warning);
        }

        if report.has_redactions() {
            println!(
                "✓ Successfully redacted {} instance(s) → {}",
                report.instances_redacted,
                output.display()
            );
        } else {
            println!("⚠ No instances found to redact");
        }
        Ok(())
    }

    fn extract(&self, input: &Path, output: Option<&Path>) -> Result<()> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }

        let text = self
            .service
            .extract_text(input)
            .with_context(|| "Text extraction failed")?;

        if let Some(output_path) = output {
            std::fs::write(output_path, &text)
                .with_context(|| format!("Failed to write to {}", output_path.display()))?;
            println!(
                "✓ Extracted {} characters → {}",
                text.chars().count(),
                output_path.display()
            );
        } else {
            print!("{}", text);
        }
        Ok(())
    }
}

fn load_policy(cli: &Cli) -> Result<Policy> {
    let mut policy = match &cli.policy {
        Some(path) => Policy::load(path)
            .with_context(|| format!("Failed to load policy {}", path.display()))?,
        None => Policy::default(),
    };
    if let Some(mode) = cli.mode {
        policy.output.mode = mode.into();
    }
    Ok(policy)
}

fn build_overrides(cli: &Cli) -> RuntimeOverrides {
    RuntimeOverrides {
        once_allowlist: cli.allow.clone(),
        forced_masks: cli.force.clone(),
        keep_spans: cli.keep.clone(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let handler = RedactionHandler::new(load_policy(&cli)?, cli.verbose)?;

    match &cli.command {
        Some(Commands::Extract { input, output }) => {
            handler.extract(input, output.as_deref())?;
        }
        None => {
            let input = cli
                .input
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--input is required"))?;
            let output = cli
                .output
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("--output is required"))?;

            handler.redact(
                input,
                output,
                &build_overrides(&cli),
                cli.csv.as_deref(),
                cli.review_json.as_deref(),
            )?;
        }
    }

    Ok(())
}
