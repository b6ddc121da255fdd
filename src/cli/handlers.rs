// FILE: src/cli/handlers.rs
use super::{OutputFormat, SlyCli};
use crate::compiler::backend::{Backend, CommandCollector, JsonBackend, TextBackend};
use crate::error::{CompilerError, Diagnostics, Result};
use crate::{CompilationStats, Compiler, CompilerOptions};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File extensions `check -r` picks up.
const TEMPLATE_EXTENSIONS: &[&str] = &["html", "htm"];

fn required_input(matches: &clap::ArgMatches) -> Result<&String> {
    matches
        .get_one::<String>("input")
        .ok_or_else(|| CompilerError::configuration("Missing input path"))
}

fn open_input(input_path: &Path) -> Result<File> {
    File::open(input_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", input_path.display(), e),
    })
}

fn print_diagnostics(input_path: &Path, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{}:{}", input_path.display(), diagnostic);
    }
}

// --- COMPILE ---
pub fn handle_compile_command(cli: &SlyCli, matches: &clap::ArgMatches) -> Result<bool> {
    let input_path = PathBuf::from(required_input(matches)?);
    let format = matches.get_one::<OutputFormat>("format").copied().unwrap_or(OutputFormat::Text);
    let options = cli.build_compiler_options(matches)?;

    let writer: Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(output_path) => {
            log::info!("Writing {} -> {}", input_path.display(), output_path);
            Box::new(BufWriter::new(File::create(output_path)?))
        }
        None => Box::new(io::stdout().lock()),
    };

    let (diagnostics, stats) = compile_to_writer(&input_path, options, format, writer)?;
    print_diagnostics(&input_path, &diagnostics);
    if matches.get_flag("stats") {
        print_detailed_stats(&stats);
    }
    Ok(!diagnostics.has_errors())
}

/// Compile one file and write its command stream in `format`.
pub fn compile_to_writer<W: Write>(
    input_path: &Path,
    options: CompilerOptions,
    format: OutputFormat,
    mut writer: W,
) -> Result<(Diagnostics, CompilationStats)> {
    let compiler = Compiler::new(options)?;
    let input = open_input(input_path)?;
    let compile_start = Instant::now();

    let (diagnostics, mut stats) = match format {
        OutputFormat::Json => compile_into(&compiler, input, &mut JsonBackend::new(&mut writer, true))?,
        OutputFormat::Text => compile_into(&compiler, input, &mut TextBackend::new(&mut writer))?,
        OutputFormat::Debug => {
            let mut collector = CommandCollector::new();
            let result = compile_into(&compiler, input, &mut collector)?;
            writeln!(writer, "{:#?}", collector.commands())?;
            result
        }
    };
    writer.flush()?;

    stats.source_size = std::fs::metadata(input_path).map(|m| m.len()).unwrap_or(0);
    log::debug!(
        "{} compiled in {:.2}ms",
        input_path.display(),
        compile_start.elapsed().as_secs_f64() * 1000.0
    );
    Ok((diagnostics, stats))
}

fn compile_into(compiler: &Compiler, input: File, backend: &mut dyn Backend) -> Result<(Diagnostics, CompilationStats)> {
    compiler.compile_with_stats(input, backend)
}

fn print_detailed_stats(stats: &CompilationStats) {
    eprintln!("\n📊 Compilation Statistics:");
    eprintln!("   Source size: {} bytes", stats.source_size);
    eprintln!("   Elements: {}", stats.element_count);
    eprintln!("   Expressions: {}", stats.expression_count);
    eprintln!("   Commands: {}", stats.command_count);
    eprintln!("   Diagnostics: {}", stats.diagnostic_count);
    eprintln!("   Compile time: {}ms", stats.compile_time_ms);
}

// --- CHECK ---

/// Result of checking one or more templates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub total_files: usize,
    pub error_files: usize,
}

pub fn handle_check_command(cli: &SlyCli, matches: &clap::ArgMatches) -> Result<bool> {
    let input_path = PathBuf::from(required_input(matches)?);
    let recursive = matches.get_flag("recursive");
    let compiler = Compiler::new(cli.base_options())?;

    let summary = if recursive && input_path.is_dir() {
        let summary = check_directory_recursive(&compiler, &input_path)?;
        println!("\n📊 Check Summary:");
        println!("   Total files: {}", summary.total_files);
        println!("   Files with errors: {}", summary.error_files);
        summary
    } else {
        let clean = check_single_file(&compiler, &input_path)?;
        CheckSummary {
            total_files: 1,
            error_files: usize::from(!clean),
        }
    };
    Ok(summary.error_files == 0)
}

/// Returns whether the file compiled without Error diagnostics.
fn check_single_file(compiler: &Compiler, input_path: &Path) -> Result<bool> {
    let input = open_input(input_path)?;
    match compiler.compile(input, &mut CommandCollector::new()) {
        Ok(diagnostics) => {
            print_diagnostics(input_path, &diagnostics);
            if diagnostics.has_errors() {
                println!("❌ {}", input_path.display());
                Ok(false)
            } else {
                println!("✅ {} - No issues found", input_path.display());
                Ok(true)
            }
        }
        Err(e) => {
            println!("❌ {} - {}", input_path.display(), e);
            Ok(false)
        }
    }
}

pub fn check_directory_recursive(compiler: &Compiler, dir_path: &Path) -> Result<CheckSummary> {
    let mut summary = CheckSummary::default();

    for entry in walkdir::WalkDir::new(dir_path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CompilerError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        let is_template = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| TEMPLATE_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_template {
            summary.total_files += 1;
            if !check_single_file(compiler, entry.path())? {
                summary.error_files += 1;
            }
        }
    }
    Ok(summary)
}

// --- PARSE ---
pub fn handle_parse_command(cli: &SlyCli, matches: &clap::ArgMatches) -> Result<bool> {
    let input_path = PathBuf::from(required_input(matches)?);
    let compiler = Compiler::new(cli.base_options())?;
    let template = compiler.parse(open_input(&input_path)?)?;

    let mut stdout = io::stdout().lock();
    match matches.get_one::<String>("format").map(String::as_str) {
        Some("debug") => writeln!(stdout, "{:#?}", template)?,
        _ => {
            serde_json::to_writer_pretty(&mut stdout, &template).map_err(io::Error::from)?;
            writeln!(stdout)?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_compile_to_writer_text() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        fs::write(&input, "<p data-sly-test=\"${on}\">hi</p>").unwrap();

        let mut output = Vec::new();
        let (diagnostics, stats) =
            compile_to_writer(&input, CompilerOptions::default(), OutputFormat::Text, &mut output).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(stats.element_count, 1);
        assert_eq!(stats.source_size, 31);
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("let var_0 = on\n  if var_0\n"));
    }

    #[test]
    fn test_compile_to_writer_json() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        fs::write(&input, "<br>").unwrap();

        let mut output = Vec::new();
        compile_to_writer(&input, CompilerOptions::default(), OutputFormat::Json, &mut output).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value[0]["command"], "outText");
        assert_eq!(value[0]["text"], "<br>");
    }

    #[test]
    fn test_missing_input() {
        let result = compile_to_writer(
            Path::new("/no/such/template.html"),
            CompilerOptions::default(),
            OutputFormat::Text,
            Vec::new(),
        );
        assert!(matches!(result, Err(CompilerError::FileNotFound { .. })));
    }

    #[test]
    fn test_check_directory_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("good.html"), "<p>${a}</p>").unwrap();
        fs::write(dir.path().join("nested").join("bad.html"), "<div data-sly-bogus=\"x\"></div>").unwrap();
        fs::write(dir.path().join("nested").join("broken.HTM"), "<!-- never closed").unwrap();
        fs::write(dir.path().join("notes.txt"), "<!--").unwrap();

        let summary = check_directory_recursive(&Compiler::default(), dir.path()).unwrap();
        assert_eq!(
            summary,
            CheckSummary {
                total_files: 3,
                error_files: 2
            }
        );
    }
}
