//! unresume CLI - resume section extraction tool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use unresume::{JsonFormat, Orchestrator, ParseOptions, ParseOutput};

#[derive(Parser)]
#[command(name = "unresume")]
#[command(version)]
#[command(about = "Extract labeled resume sections from PDF, DOCX, and scans", long_about = None)]
struct Cli {
    /// Input file or folder
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output directory for JSON results
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Worker threads for folder inputs (default: CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file or every resume in a folder
    Parse {
        /// Input file or folder
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output directory for JSON results
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Worker threads for folder inputs (default: CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,

        /// Section database path
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,

        /// OCR render resolution
        #[arg(long)]
        dpi: Option<u32>,

        /// OCR languages, comma separated
        #[arg(long)]
        langs: Option<String>,
    },

    /// Parse one file and print a section summary
    Info {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Parse {
            input,
            output,
            workers,
            compact,
            db,
            dpi,
            langs,
        }) => cmd_parse(&input, output.as_deref(), workers, compact, db, dpi, langs),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            if let Some(input) = cli.input {
                cmd_parse(&input, cli.output.as_deref(), cli.workers, false, None, None, None)
            } else {
                println!("{}", "Usage: unresume <INPUT> [-o OUTPUT]".yellow());
                println!("       unresume --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn build_options(
    db: Option<PathBuf>,
    dpi: Option<u32>,
    langs: Option<String>,
) -> ParseOptions {
    let mut options = ParseOptions::from_env();
    if let Some(db) = db {
        options = options.with_db_path(db);
    }
    if let Some(dpi) = dpi {
        options.ocr.dpi = dpi;
        options.ocr = options.ocr.clone().clamped();
    }
    if let Some(langs) = langs {
        options.ocr.languages = langs;
    }
    options
}

#[allow(clippy::too_many_arguments)]
fn cmd_parse(
    input: &Path,
    output: Option<&Path>,
    workers: Option<usize>,
    compact: bool,
    db: Option<PathBuf>,
    dpi: Option<u32>,
    langs: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(db, dpi, langs);
    let orchestrator = Orchestrator::new(options)?;
    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    if input.is_dir() {
        parse_folder(&orchestrator, input, output, workers, format)
    } else {
        let out = orchestrator.parse_path(input)?;
        let json = out.to_json(format)?;
        match output {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                let path = dir.join(json_name(input));
                fs::write(&path, &json)?;
                print_summary(input, &out);
                println!("{} {}", "Saved to".green(), path.display());
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}

/// Parse every supported file in a folder with a bounded worker pool,
/// one parse per file.
fn parse_folder(
    orchestrator: &Orchestrator,
    folder: &Path,
    output: Option<&Path>,
    workers: Option<usize>,
    format: JsonFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_inputs(folder)?;
    if files.is_empty() {
        println!("{}", "No resume files found".yellow());
        return Ok(());
    }

    let out_dir = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| folder.join("parsed"));
    fs::create_dir_all(&out_dir)?;

    let workers = workers
        .filter(|w| *w > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let failures = AtomicUsize::new(0);
    pool.install(|| {
        files.par_iter().for_each(|file| {
            pb.set_message(
                file.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            match orchestrator.parse_path(file) {
                Ok(out) => {
                    let json = out.to_json(format).unwrap_or_default();
                    let path = out_dir.join(json_name(file));
                    if let Err(e) = fs::write(&path, json) {
                        log::error!("{}: write failed: {e}", file.display());
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(e) => {
                    log::error!("{}: {e}", file.display());
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            pb.inc(1);
        });
    });
    pb.finish_with_message("done");

    let failed = failures.load(Ordering::Relaxed);
    println!(
        "\n{} {} parsed, {} failed, results in {}",
        "Done!".green().bold(),
        files.len() - failed,
        failed,
        out_dir.display()
    );
    Ok(())
}

fn collect_inputs(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if matches!(ext.as_str(), "pdf" | "docx" | "png" | "jpg" | "jpeg" | "tif" | "tiff") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn json_name(input: &Path) -> String {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    format!("{stem}.json")
}

fn print_summary(input: &Path, out: &ParseOutput) {
    println!("{}", "Parse Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!(
        "{}: {} ({} pages{})",
        "Type".bold(),
        out.file.file_type,
        out.file.pages,
        if out.file.scanned { ", scanned" } else { "" }
    );
    println!(
        "{}: {} via {}",
        "Quality".bold(),
        out.quality.rung.as_str(),
        out.metadata.strategy_used
    );
    if !out.metadata.fallbacks_tried.is_empty() {
        println!(
            "{}: {}",
            "Fallbacks".bold(),
            out.metadata.fallbacks_tried.join(", ")
        );
    }
    println!();
    for section in &out.sections {
        println!(
            "  {} {} {}",
            "├─".dimmed(),
            section.name.bold(),
            format!("({} lines)", section.lines.len()).dimmed()
        );
    }
    if !out.unknown_headers.is_empty() {
        println!(
            "  {} {} unknown header(s)",
            "└─".dimmed(),
            out.unknown_headers.len()
        );
    }
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Orchestrator::new(ParseOptions::from_env())?;
    let out = orchestrator.parse_path(input)?;
    print_summary(input, &out);

    println!();
    println!("{}", "Layouts".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for layout in &out.layouts {
        println!(
            "  page {}: {} ({} column(s), confidence {:.2})",
            layout.page, layout.layout_type, layout.columns, layout.confidence
        );
    }
    if !out.metadata.learned_variants.is_empty() {
        println!();
        println!("{}", "Learned variants".cyan().bold());
        for learned in &out.metadata.learned_variants {
            println!("  {}", learned);
        }
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "unresume".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Resume section extraction tool");
}
