use std::{
    fs,
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    process::ExitCode,
};

use accessorize_core::{
    config::{load_sections, ConfigSection},
    init_tracing, CompilationDatabase, Driver, OutputMode, RunSummary,
};
use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{error, info, warn};

fn cli() -> Command {
    Command::new("accessorize")
        .version(accessorize_core::VERSION)
        .about("Encapsulate C++ member fields behind generated accessors")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("JSON configuration file (reads stdin when omitted)"),
        )
        .arg(
            Arg::new("build-path")
                .long("build-path")
                .short('p')
                .value_name("DIR")
                .help("Directory containing compile_commands.json")
                .default_value("."),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .value_name("DIR")
                .help("Write rewritten files into DIR instead of in place")
                .conflicts_with("stdout"),
        )
        .arg(
            Arg::new("stdout")
                .long("stdout")
                .help("Print rewritten files to stdout")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("backup")
                .long("backup")
                .help("Keep a <file>.orig copy when rewriting in place")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Report what would change without writing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("include")
                .short('I')
                .value_name("DIR")
                .help("Additional header search directory")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .short('v')
                .help("More logging (repeat for trace)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("files")
                .value_name("FILES")
                .help("Files to transform; overrides the configuration's Files")
                .num_args(0..),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_count("debug"));

    match run(&matches) {
        Ok(summary) if summary.success() => ExitCode::SUCCESS,
        Ok(summary) => {
            for (file, message) in &summary.errors {
                error!("{}: {message}", file.display());
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> Result<RunSummary> {
    let sections = read_config(matches.get_one::<String>("config"))?;
    if sections.is_empty() {
        bail!("configuration contains no sections");
    }

    let output = if matches.get_flag("stdout") {
        OutputMode::Stdout
    } else if let Some(dir) = matches.get_one::<String>("output-dir") {
        OutputMode::Directory(PathBuf::from(dir))
    } else {
        OutputMode::InPlace
    };
    let include_dirs: Vec<PathBuf> = matches
        .get_many::<String>("include")
        .map(|dirs| dirs.map(PathBuf::from).collect())
        .unwrap_or_default();
    let cli_files: Vec<PathBuf> = matches
        .get_many::<String>("files")
        .map(|files| files.map(PathBuf::from).collect())
        .unwrap_or_default();
    let build_path = matches
        .get_one::<String>("build-path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut summary = RunSummary::new();
    for (index, section) in sections.iter().enumerate() {
        if !section.has_transforms() {
            warn!(section = index, "no transforms configured, section skipped");
            continue;
        }

        let files = select_files(section, &cli_files, &build_path)?;
        let driver = Driver::from_section(section)
            .with_context(|| format!("invalid transforms in section {index}"))?
            .include_dirs(include_dirs.clone())
            .output_mode(output.clone())
            .backup_originals(matches.get_flag("backup"))
            .dry_run(matches.get_flag("dry-run"));

        info!(section = index, files = files.len(), "running section");
        summary.merge(driver.run_files(&files));
    }

    info!(
        processed = summary.files_processed,
        rewritten = summary.files_rewritten,
        warnings = summary.warnings,
        errors = summary.errors.len(),
        "done"
    );
    Ok(summary)
}

fn read_config(path: Option<&String>) -> Result<Vec<ConfigSection>> {
    match path {
        Some(path) => {
            let file = fs::File::open(path).with_context(|| format!("cannot open config {path}"))?;
            load_sections(file).with_context(|| format!("invalid config {path}"))
        }
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                bail!("no --config given and stdin is a terminal");
            }
            load_sections(stdin.lock()).context("invalid config on stdin")
        }
    }
}

/// Command-line files, else the section's `Files`, else the compilation database
fn select_files(section: &ConfigSection, cli_files: &[PathBuf], build_path: &Path) -> Result<Vec<PathBuf>> {
    if !cli_files.is_empty() {
        return Ok(cli_files.to_vec());
    }
    if let Some(files) = &section.files {
        return Ok(files.clone());
    }
    warn!("No files selected. Operating on all files.");
    let db = CompilationDatabase::load_from_directory(build_path)
        .with_context(|| format!("no Files configured and no database in {}", build_path.display()))?;
    Ok(db.files())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_parse() {
        let matches = cli()
            .try_get_matches_from(["accessorize", "--config", "a.json", "-I", "inc", "-I", "more", "-vv", "x.cpp"])
            .unwrap();
        assert_eq!(matches.get_count("debug"), 2);
        assert_eq!(matches.get_many::<String>("include").unwrap().count(), 2);
        assert_eq!(matches.get_one::<String>("build-path").unwrap(), ".");

        assert!(cli()
            .try_get_matches_from(["accessorize", "--stdout", "--output-dir", "out"])
            .is_err());
    }

    #[test]
    fn test_select_files_precedence() -> Result<()> {
        let section = ConfigSection {
            files: Some(vec![PathBuf::from("configured.cpp")]),
            ..Default::default()
        };
        let build = PathBuf::from(".");
        assert_eq!(
            select_files(&section, &[PathBuf::from("cli.cpp")], &build)?,
            vec![PathBuf::from("cli.cpp")]
        );
        assert_eq!(select_files(&section, &[], &build)?, vec![PathBuf::from("configured.cpp")]);

        let dir = tempfile::TempDir::new()?;
        let empty = ConfigSection::default();
        assert!(select_files(&empty, &[], dir.path()).is_err());
        Ok(())
    }
}
