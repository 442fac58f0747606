// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! polyframe-compile CLI
//!
//! Set `RUST_LOG` (or pass `-v`/`-vv`) to see pipeline logging, e.g.
//! `RUST_LOG=polyframe_compile=debug polyframe-compile compile part.scad -o part.stl`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use polyframe_compile::cli::{discover_scad, output_path_for, parse_assignment, Reporter};
use polyframe_compile::params::{rewrite_with, ParameterKind, RewriteOptions};
use polyframe_compile::{
    stl, Backend, CompilationWorker, CompileRequest, CompilerConfig, ParameterSet,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "polyframe-compile")]
#[command(about = "Compile OpenSCAD models to binary STL in a per-request sandbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./polyframe-compile.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a SCAD file to binary STL
    Compile {
        /// Input SCAD file
        input: PathBuf,

        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,

        /// Numeric override passed to the compiler as -D name=value
        #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
        defines: Vec<String>,

        /// Enable an experimental compiler feature (e.g. manifold)
        #[arg(long = "enable", value_name = "FEATURE")]
        features: Vec<String>,

        /// Use a WASI build of OpenSCAD
        #[arg(long, value_name = "MODULE", conflicts_with = "openscad")]
        wasm: Option<PathBuf>,

        /// Use a native openscad executable
        #[arg(long, value_name = "PATH")]
        openscad: Option<PathBuf>,

        /// Fallback font file mounted into the sandbox
        #[arg(long, value_name = "FILE")]
        font: Vec<PathBuf>,

        /// Print a JSON result instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Rewrite parameter assignments in a SCAD file
    Rewrite {
        /// Input SCAD file
        input: PathBuf,

        /// Parameter to set
        #[arg(short, long = "param", value_name = "NAME=VALUE", required = true)]
        params: Vec<String>,

        /// Value type for all parameters (inferred when omitted)
        #[arg(long)]
        kind: Option<ParameterKind>,

        /// Prepend an assignment when the source has none
        #[arg(long)]
        inject: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check binary STL files structurally
    Validate {
        /// STL files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Compile every .scad file under a directory
    Batch {
        /// Directory to scan
        dir: PathBuf,

        /// Output directory, mirroring the input layout
        #[arg(short, long)]
        output: PathBuf,

        /// Concurrent compiles
        #[arg(short, long, default_value = "4")]
        jobs: usize,
    },

    /// Show version information
    Version,
}

fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "polyframe_compile=info",
            2 => "polyframe_compile=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    match path {
        Some(path) => {
            let mut config = CompilerConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => CompilerConfig::load(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        Reporter::report_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compile {
            input,
            output,
            defines,
            features,
            wasm,
            openscad,
            font,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(module) = wasm {
                config.backend = Backend::Wasm { module };
            } else if let Some(executable) = openscad {
                config.backend = Backend::Process { executable };
            }
            config.features.extend(features);
            let mut fonts = font;
            fonts.append(&mut config.fonts);
            config.fonts = fonts;
            compile_command(&config, &input, &output, &defines, json, cli.quiet).await?;
        }
        Commands::Rewrite {
            input,
            params,
            kind,
            inject,
            output,
        } => {
            rewrite_command(&input, &params, kind, inject, output.as_deref(), cli.quiet)?;
        }
        Commands::Validate { files, json } => {
            validate_command(&files, json)?;
        }
        Commands::Batch { dir, output, jobs } => {
            let config = load_config(cli.config.as_deref())?;
            batch_command(&config, &dir, &output, jobs.max(1), cli.quiet).await?;
        }
        Commands::Version => {
            println!("polyframe-compile v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn compile_command(
    config: &CompilerConfig,
    input: &Path,
    output: &Path,
    defines: &[String],
    json: bool,
    quiet: bool,
) -> Result<()> {
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut overrides = ParameterSet::new();
    for define in defines {
        let parameter = parse_assignment(define, None)?;
        if parameter.value.as_finite_number().is_none() {
            Reporter::report_warning(&format!(
                "{} is not a finite number and will not be passed to the compiler",
                parameter.name
            ));
        }
        overrides.insert(parameter.name, parameter.value);
    }

    let worker = CompilationWorker::from_config(config)?;
    let start = Instant::now();
    let result = worker
        .compile(CompileRequest::new(source).with_overrides(overrides))
        .await;
    let duration = start.elapsed();

    match result {
        Ok(model) => {
            std::fs::write(output, &model.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if json {
                let report = json!({
                    "output": output,
                    "triangleCount": model.triangle_count,
                    "warnings": model.warnings,
                    "elapsedMs": duration.as_millis() as u64,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !quiet {
                Reporter::report_compile(
                    &input.display().to_string(),
                    &output.display().to_string(),
                    &model,
                    duration,
                );
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let report = json!({
                    "error": e.to_string(),
                    "exitCode": e.exit_code(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                Reporter::report_compile_failure(&input.display().to_string(), &e);
            }
            std::process::exit(1);
        }
    }
}

fn rewrite_command(
    input: &Path,
    params: &[String],
    kind: Option<ParameterKind>,
    inject: bool,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let mut source = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let options = RewriteOptions {
        inject_if_missing: inject,
    };

    for text in params {
        let parameter = parse_assignment(text, kind)?;
        let rewritten = rewrite_with(&source, &parameter, options);
        if !quiet {
            Reporter::report_rewrite(&parameter, &rewritten.outcome);
        }
        source = rewritten.source;
    }

    match output {
        Some(path) => std::fs::write(path, &source)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{source}"),
    }
    Ok(())
}

fn validate_command(files: &[PathBuf], json: bool) -> Result<()> {
    let mut reports = Vec::new();
    let mut failed = 0;

    for file in files {
        let bytes =
            std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let result = stl::validate(&bytes);
        if result.is_err() {
            failed += 1;
        }
        if json {
            reports.push(match &result {
                Ok(report) => json!({
                    "file": file,
                    "valid": true,
                    "triangleCount": report.triangle_count,
                    "warnings": report.warnings,
                }),
                Err(e) => json!({
                    "file": file,
                    "valid": false,
                    "error": e.to_string(),
                }),
            });
        } else {
            Reporter::report_validation(&file.display().to_string(), &result);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn batch_command(
    config: &CompilerConfig,
    dir: &Path,
    out_dir: &Path,
    jobs: usize,
    quiet: bool,
) -> Result<()> {
    let inputs = discover_scad(dir);
    if inputs.is_empty() {
        Reporter::report_warning(&format!("No .scad files found under {}", dir.display()));
        return Ok(());
    }
    if !quiet {
        Reporter::report_info(&format!(
            "Compiling {} files with {} jobs",
            inputs.len(),
            jobs
        ));
    }

    let worker = Arc::new(CompilationWorker::from_config(config)?);
    let limit = Arc::new(Semaphore::new(jobs));
    let pb = if quiet {
        None
    } else {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let start = Instant::now();
    let mut tasks = JoinSet::new();
    for input in inputs {
        let worker = Arc::clone(&worker);
        let limit = Arc::clone(&limit);
        let output = output_path_for(&input, dir, out_dir);
        tasks.spawn(async move {
            let _permit = limit.acquire_owned().await;
            let result = match tokio::fs::read_to_string(&input).await {
                Ok(source) => worker
                    .compile(CompileRequest::new(source))
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("Failed to read {}: {}", input.display(), e)),
            };
            (input, output, result)
        });
    }

    let mut succeeded = 0;
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (input, output, result) = joined.context("Batch task panicked")?;
        match result {
            Ok(model) => {
                if let Some(parent) = output.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&output, &model.bytes)
                    .await
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                succeeded += 1;
            }
            Err(message) => failures.push((input, message)),
        }
        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    for (input, message) in &failures {
        eprintln!("{} {}", "❌".red(), input.display().to_string().cyan());
        eprintln!("   {}", message.red());
    }
    if !quiet {
        Reporter::report_batch_summary(succeeded, failures.len(), start.elapsed());
    }
    if !failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
