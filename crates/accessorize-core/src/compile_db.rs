//! compile_commands.json discovery: the default file set when a section
//! names no files.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

pub const DATABASE_FILE: &str = "compile_commands.json";

/// One entry of a JSON compilation database
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl CompileCommand {
    /// Source path, joined to the entry's directory when relative
    pub fn source_path(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.directory.join(&self.file)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    commands: Vec<CompileCommand>,
}

impl CompilationDatabase {
    pub fn load_from_directory(dir: &Path) -> Result<Self> {
        let path = dir.join(DATABASE_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|err| Error::CompileDb(format!("cannot read {}: {err}", path.display())))?;
        let db = Self::from_json(&text)
            .map_err(|err| Error::CompileDb(format!("{}: {err}", path.display())))?;
        debug!(path = %path.display(), entries = db.commands.len(), "loaded compilation database");
        Ok(db)
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            commands: serde_json::from_str(text)?,
        })
    }

    pub fn commands(&self) -> &[CompileCommand] {
        &self.commands
    }

    /// Every source file, first occurrence wins
    pub fn files(&self) -> Vec<PathBuf> {
        let files: IndexSet<PathBuf> = self.commands.iter().map(CompileCommand::source_path).collect();
        files.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_files_are_absolute_and_deduplicated() {
        let db = CompilationDatabase::from_json(
            r#"[
  {"directory": "/work/build", "file": "../src/a.cpp", "command": "c++ -c ../src/a.cpp"},
  {"directory": "/work", "file": "/work/src/b.cpp", "arguments": ["c++", "-c", "src/b.cpp"]},
  {"directory": "/work/build", "file": "../src/a.cpp", "command": "c++ -O2 -c ../src/a.cpp"}
]"#,
        )
        .unwrap();
        assert_eq!(db.commands().len(), 3);
        assert_eq!(
            db.files(),
            vec![PathBuf::from("/work/build/../src/a.cpp"), PathBuf::from("/work/src/b.cpp")]
        );
    }

    #[test]
    fn test_load_from_directory() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let build = dir.path().display().to_string();
        fs::write(
            dir.path().join(DATABASE_FILE),
            format!(r#"[{{"directory": {build:?}, "file": "main.cpp", "command": "c++ main.cpp"}}]"#),
        )?;

        let db = CompilationDatabase::load_from_directory(dir.path())?;
        assert_eq!(db.files(), vec![dir.path().join("main.cpp")]);
        Ok(())
    }

    #[test]
    fn test_missing_or_malformed_database() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        assert!(matches!(
            CompilationDatabase::load_from_directory(dir.path()),
            Err(Error::CompileDb(_))
        ));

        fs::write(dir.path().join(DATABASE_FILE), "{not json")?;
        assert!(matches!(
            CompilationDatabase::load_from_directory(dir.path()),
            Err(Error::CompileDb(_))
        ));
        Ok(())
    }
}
