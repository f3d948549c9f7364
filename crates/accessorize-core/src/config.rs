/*!
# Configuration

Run configuration is JSON. A stream may carry several concatenated
documents; each document is one section object or an array of them.

```json
{
  "Files": ["src/main.cpp"],
  "IncludeDirs": ["include"],
  "Transforms": {
    "Accessors": ["ns::Foo::x", "Bar::y"]
  }
}
```

Transform parameters stay as raw JSON here and are parsed by the transform
they belong to (see [`crate::transform::build_transforms`]).
*/

use std::io::Read;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::transform::{build_transforms, Transform};
use crate::{Error, Result};

/// One configuration section: a file set and the transforms to run on it
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ConfigSection {
    /// Files to transform; `None` falls back to the compilation database
    #[serde(default)]
    pub files: Option<Vec<PathBuf>>,
    /// Transform name to parameters, in configuration order
    #[serde(default)]
    pub transforms: IndexMap<String, Value>,
    /// Extra directories searched for `#include "..."` headers
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
}

impl ConfigSection {
    pub fn has_transforms(&self) -> bool {
        !self.transforms.is_empty()
    }

    pub fn build_transforms(&self) -> Result<Vec<Transform>> {
        build_transforms(&self.transforms)
    }
}

/// Read every section from a reader (a file or stdin)
pub fn load_sections<R: Read>(mut reader: R) -> Result<Vec<ConfigSection>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|err| Error::Config(format!("failed to read configuration: {err}")))?;
    load_sections_from_str(&text)
}

pub fn load_sections_from_str(text: &str) -> Result<Vec<ConfigSection>> {
    let mut sections = Vec::new();
    for document in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match document? {
            Value::Array(items) => {
                for item in items {
                    sections.push(section_from(item)?);
                }
            }
            object @ Value::Object(_) => sections.push(section_from(object)?),
            Value::Null => {}
            other => {
                return Err(Error::Config(format!(
                    "expected a section object or an array of sections, found {other}"
                )))
            }
        }
    }
    Ok(sections)
}

fn section_from(value: Value) -> Result<ConfigSection> {
    serde_json::from_value(value).map_err(|err| Error::Config(format!("invalid section: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_section() {
        let sections = load_sections_from_str(
            r#"{"Files": ["a.cpp"], "Transforms": {"Accessors": ["Foo::x"]}}"#,
        )
        .unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].files, Some(vec![PathBuf::from("a.cpp")]));
        assert_eq!(sections[0].transforms["Accessors"], json!(["Foo::x"]));
        assert!(sections[0].include_dirs.is_empty());
    }

    #[test]
    fn test_concatenated_documents_and_arrays() {
        let text = r#"
{"Transforms": {"Accessors": ["A::a"]}}
[
  {"Files": ["b.cpp"], "Transforms": {"Accessors": {"Fields": ["B::b"], "Scope": "main"}}},
  {"Files": ["c.cpp"]}
]
"#;
        let sections = load_sections_from_str(text).unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].files, None);
        assert!(sections[1].has_transforms());
        assert!(!sections[2].has_transforms());
        assert_eq!(sections[1].build_transforms().unwrap().len(), 1);
    }

    #[test]
    fn test_transform_order_is_preserved() {
        let sections = load_sections_from_str(
            r#"{"Transforms": {"AccessorsTransform": ["Z::z"], "Accessors": ["A::a"]}}"#,
        )
        .unwrap();
        let names: Vec<&str> = sections[0].transforms.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["AccessorsTransform", "Accessors"]);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(load_sections_from_str("42"), Err(Error::Config(_))));
        assert!(matches!(load_sections_from_str(r#"{"Fils": []}"#), Err(Error::Config(_))));
        assert!(matches!(load_sections_from_str("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_from_reader() {
        let sections = load_sections(r#"{"IncludeDirs": ["inc"]}"#.as_bytes()).unwrap();
        assert_eq!(sections[0].include_dirs, vec![PathBuf::from("inc")]);
    }
}
