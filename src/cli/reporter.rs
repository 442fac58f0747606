// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use crate::error::CompileError;
use crate::params::{Parameter, RewriteOutcome};
use crate::stl::{StlReport, StlValidationError};
use crate::worker::CompiledModel;
use colored::*;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Report a successful compile
    pub fn report_compile(file: &str, output: &str, model: &CompiledModel, duration: Duration) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!("{} {}", "Compiled:".bold(), file.cyan());
        println!("{}", "━".repeat(80).bright_black());
        println!("  {} {}", "Output:".bright_black(), output.cyan());
        println!(
            "  {} {}",
            "Triangles:".bright_black(),
            model.triangle_count.to_string().cyan()
        );
        println!(
            "  {} {}",
            "Size:".bright_black(),
            format!("{} bytes", model.bytes.len()).cyan()
        );
        println!(
            "  {} {}",
            "Time:".bright_black(),
            Self::format_duration(duration).yellow()
        );
        Self::print_warnings(&model.warnings);
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Report a failed compile, including the compiler transcript
    pub fn report_compile_failure(file: &str, error: &CompileError) {
        eprintln!("\n{}", "━".repeat(80).bright_black());
        eprintln!("{} {}", "❌ Compile failed:".red().bold(), file.cyan());
        eprintln!("{}", "━".repeat(80).bright_black());
        let headline = match error {
            CompileError::CompilerInvocation { reason, .. } => reason.clone(),
            CompileError::StructuralValidation { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        eprintln!("  {}", headline.red());
        if let Some(transcript) = error.transcript() {
            if !transcript.stderr.is_empty() {
                eprintln!("\n{}", "stderr:".bold());
                for line in &transcript.stderr {
                    eprintln!("  {}", line.bright_black());
                }
            }
            if !transcript.stdout.is_empty() {
                eprintln!("\n{}", "stdout:".bold());
                for line in &transcript.stdout {
                    eprintln!("  {}", line.bright_black());
                }
            }
        }
        eprintln!("{}", "━".repeat(80).bright_black());
    }

    /// Report a structural STL check
    pub fn report_validation(file: &str, result: &Result<StlReport, StlValidationError>) {
        match result {
            Ok(report) => {
                println!(
                    "{} {} {}",
                    "✅".green(),
                    file.cyan(),
                    format!("({} triangles)", report.triangle_count).bright_black()
                );
                for warning in &report.warnings {
                    println!("   {} {}", "⚠️".yellow(), warning.yellow());
                }
            }
            Err(e) => {
                println!("{} {}", "❌".red(), file.cyan());
                println!("   {}", e.to_string().red());
            }
        }
    }

    /// Report the result of a parameter rewrite
    pub fn report_rewrite(parameter: &Parameter, outcome: &RewriteOutcome) {
        let name = parameter.name.as_str().bold();
        let value = parameter.value.to_scad_literal().cyan();
        match outcome {
            RewriteOutcome::Replaced { line } => {
                eprintln!("{} {} = {} (line {})", "✏️".bright_blue(), name, value, line);
            }
            RewriteOutcome::Injected => {
                eprintln!("{} {} = {} (injected)", "➕".green(), name, value);
            }
            RewriteOutcome::Unchanged => {
                eprintln!(
                    "{} {} {}",
                    "⚠️ ".yellow(),
                    name,
                    "has no top-level assignment; source unchanged".yellow()
                );
            }
        }
    }

    /// One-line summary for a batch run
    pub fn report_batch_summary(succeeded: usize, failed: usize, duration: Duration) {
        println!("\n{}", "Batch summary:".bold());
        println!(
            "  {} {}   {} {}   {} {}",
            "Succeeded:".bright_black(),
            succeeded.to_string().green(),
            "Failed:".bright_black(),
            if failed == 0 {
                failed.to_string().green()
            } else {
                failed.to_string().red()
            },
            "Time:".bright_black(),
            Self::format_duration(duration).yellow()
        );
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    fn print_warnings(warnings: &[String]) {
        if warnings.is_empty() {
            return;
        }
        println!("\n{}", "Warnings:".bold());
        for warning in warnings {
            println!("  {} {}", "⚠️".yellow(), warning.yellow());
        }
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(
            Reporter::format_duration(Duration::from_micros(500)),
            "500µs"
        );
        assert_eq!(
            Reporter::format_duration(Duration::from_millis(5)),
            "5.00ms"
        );
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }
}
