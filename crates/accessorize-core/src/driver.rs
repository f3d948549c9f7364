/*!
# Driver

Runs the transforms of one configuration section over a set of files.

Each file is handled on its own: read, parse together with the local
headers it includes, run every transform in configuration order
(re-parsing the updated text in between), then write the result according
to the [`OutputMode`]. A failure on one file is recorded in the
[`RunSummary`] and the remaining files are still processed.
*/

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::ConfigSection;
use crate::diagnostics::{Diagnostic, Severity};
use crate::parser::CppParser;
use crate::transform::{CompilationUnit, Transform, TransformStats};
use crate::{Error, Result};

/// Upper bound on headers parsed as context for one file
const MAX_CONTEXT_HEADERS: usize = 256;

/// Where rewritten sources go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Overwrite the input file
    #[default]
    InPlace,
    /// Write under this directory, keeping the file name
    Directory(PathBuf),
    /// Print rewritten files to stdout
    Stdout,
}

/// Result of running the transforms over one file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    /// Final text, `None` when no transform changed anything
    pub rewritten: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: TransformStats,
}

impl FileReport {
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Totals over a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_processed: u64,
    pub files_rewritten: u64,
    pub warnings: u64,
    pub errors: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.files_processed += other.files_processed;
        self.files_rewritten += other.files_rewritten;
        self.warnings += other.warnings;
        self.errors.extend(other.errors);
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Driver {
    transforms: Vec<Transform>,
    output: OutputMode,
    backup_originals: bool,
    dry_run: bool,
    include_dirs: Vec<PathBuf>,
}

impl Driver {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self {
            transforms,
            output: OutputMode::default(),
            backup_originals: false,
            dry_run: false,
            include_dirs: Vec::new(),
        }
    }

    /// Driver for a configuration section: its transforms and include dirs
    pub fn from_section(section: &ConfigSection) -> Result<Self> {
        Ok(Self::new(section.build_transforms()?).include_dirs(section.include_dirs.clone()))
    }

    pub fn output_mode(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Copy each file to `<file>.orig` before overwriting it in place
    pub fn backup_originals(mut self, backup: bool) -> Self {
        self.backup_originals = backup;
        self
    }

    /// Compute and report, write nothing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Add header search directories, after the including file's own
    pub fn include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.include_dirs.extend(dirs);
        self
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn run_files(&self, files: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::new();
        for file in files {
            summary.files_processed += 1;
            match self.transform_file(file) {
                Ok(report) => {
                    summary.warnings += report.warning_count() as u64;
                    if report.rewritten.is_some() {
                        summary.files_rewritten += 1;
                    }
                    info!(
                        file = %file.display(),
                        rewritten = report.rewritten.is_some(),
                        reads = report.stats.reads,
                        writes = report.stats.writes,
                        accessors = report.stats.accessors_inserted,
                        warnings = report.warning_count(),
                        "processed file"
                    );
                }
                Err(err) => {
                    error!(file = %file.display(), "{err}");
                    summary.errors.push((file.clone(), err.to_string()));
                }
            }
        }
        summary
    }

    /// Read, transform and write one file
    pub fn transform_file(&self, path: &Path) -> Result<FileReport> {
        let source = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let report = self.transform_source(path, &source)?;
        if let Some(text) = &report.rewritten {
            if self.dry_run {
                debug!(file = %path.display(), "dry run, not writing");
            } else {
                self.write_output(path, text)?;
            }
        }
        Ok(report)
    }

    /// Run every transform over in-memory source; nothing is written
    pub fn transform_source(&self, path: &Path, source: &str) -> Result<FileReport> {
        let mut parser = CppParser::new()?;
        let mut current = source.to_string();
        let mut changed = false;
        let mut diagnostics = Vec::new();
        let mut stats = TransformStats::default();

        for transform in &self.transforms {
            let unit = self.load_unit(&mut parser, path, &current)?;
            let outcome = transform.run(&unit)?;
            debug!(file = %path.display(), transform = transform.name(), changed = outcome.rewritten.is_some(), "ran transform");
            diagnostics.extend(outcome.diagnostics);
            stats.merge(&outcome.stats);
            if let Some(text) = outcome.rewritten {
                current = text;
                changed = true;
            }
        }

        Ok(FileReport {
            path: path.to_path_buf(),
            rewritten: changed.then_some(current),
            diagnostics,
            stats,
        })
    }

    /// Parse `source` and, breadth-first, every local header it includes
    pub fn load_unit(&self, parser: &mut CppParser, path: &Path, source: &str) -> Result<CompilationUnit> {
        let primary = parser.parse(path, source)?;
        let mut context = Vec::new();

        let mut visited = HashSet::new();
        visited.insert(canonical(path));
        let mut pending: VecDeque<(PathBuf, String)> = VecDeque::new();
        let dir = parent_dir(path);
        pending.extend(primary.includes.iter().map(|inc| (dir.clone(), inc.clone())));

        while let Some((dir, include)) = pending.pop_front() {
            if context.len() >= MAX_CONTEXT_HEADERS {
                warn!(file = %path.display(), "too many included headers, ignoring the rest");
                break;
            }
            let Some(header) = self.resolve_include(&dir, &include) else {
                debug!(include = %include, "header not found, skipped");
                continue;
            };
            if !visited.insert(canonical(&header)) {
                continue;
            }
            let text = match fs::read_to_string(&header) {
                Ok(text) => text,
                Err(err) => {
                    warn!(header = %header.display(), "cannot read header: {err}");
                    continue;
                }
            };

            let unit = parser.parse(&header, text)?;
            let header_dir = parent_dir(&header);
            pending.extend(unit.includes.iter().map(|inc| (header_dir.clone(), inc.clone())));
            debug!(header = %header.display(), "parsed context header");
            context.push(unit);
        }

        Ok(CompilationUnit::new(primary).with_context(context))
    }

    fn resolve_include(&self, dir: &Path, include: &str) -> Option<PathBuf> {
        std::iter::once(dir)
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|base| base.join(include))
            .find(|candidate| candidate.is_file())
    }

    fn write_output(&self, path: &Path, text: &str) -> Result<()> {
        match &self.output {
            OutputMode::InPlace => {
                if self.backup_originals {
                    let mut backup = path.as_os_str().to_owned();
                    backup.push(".orig");
                    fs::copy(path, &backup).map_err(|err| Error::io(PathBuf::from(&backup), err))?;
                }
                fs::write(path, text).map_err(|err| Error::io(path, err))
            }
            OutputMode::Directory(dir) => {
                let name = path
                    .file_name()
                    .ok_or_else(|| Error::Config(format!("{} has no file name", path.display())))?;
                fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))?;
                let target = dir.join(name);
                fs::write(&target, text).map_err(|err| Error::io(target.clone(), err))
            }
            OutputMode::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(text.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|err| Error::io(path, err))
            }
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accessors(fields: &[&str]) -> Vec<Transform> {
        vec![Transform::from_config("Accessors", &json!(fields)).unwrap()]
    }

    #[test]
    fn test_transform_source_without_headers() {
        let driver = Driver::new(accessors(&["Foo::x"]));
        let report = driver
            .transform_source(Path::new("main.cpp"), "struct Foo { int x; };\nvoid f(Foo &foo) { foo.x = 1; }\n")
            .unwrap();
        let text = report.rewritten.unwrap();
        assert!(text.contains("foo.setX( 1 );"));
        assert_eq!(report.stats.targets, 1);
    }

    #[test]
    fn test_unchanged_file_has_no_rewrite() {
        let driver = Driver::new(accessors(&["Foo::x"]));
        let report = driver.transform_source(Path::new("main.cpp"), "int main() { return 0; }\n").unwrap();
        assert!(report.rewritten.is_none());
        assert_eq!(report.warning_count(), 0);
    }

    #[test]
    fn test_summary_merge() {
        let mut total = RunSummary::new();
        total.merge(RunSummary {
            files_processed: 2,
            files_rewritten: 1,
            warnings: 3,
            errors: vec![(PathBuf::from("a.cpp"), "boom".to_string())],
        });
        total.merge(RunSummary {
            files_processed: 1,
            ..Default::default()
        });
        assert_eq!(total.files_processed, 3);
        assert_eq!(total.files_rewritten, 1);
        assert!(!total.success());
    }
}
