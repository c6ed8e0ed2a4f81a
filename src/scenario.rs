//! # Scenario Files
//!
//! A scenario is a JSON document describing one benchmark run:
//!
//! ```json
//! {
//!   "description": ["Two emitters against one subscriber"],
//!   "options": { "url": "localhost:6020" },
//!   "perf-listener": { "type": "single-user-subscriber", "event": "e", "on-event": "discard", "timeout-ms": 5000 },
//!   "perf-talker":   { "type": "single-user-event-emitter", "event": "e", "frequency": "10 per second", "timeout-ms": 4000 }
//! }
//! ```
//!
//! Every top-level key starting with [`RUNNER_PREFIX`] declares a runner.
//! Declarations keep the order in which they appear in the document, which
//! is also the order reports are printed in.

use crate::error::ScenarioError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reserved prefix marking a top-level key as a runner declaration.
pub const RUNNER_PREFIX: &str = "perf-";

/// Free-form text printed before the runners are described.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Line(String),
    Lines(Vec<String>),
}

impl Description {
    /// The description as individual lines.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Description::Line(line) => vec![line.as_str()],
            Description::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Description::Line(line) => line.is_empty(),
            Description::Lines(lines) => lines.is_empty(),
        }
    }
}

impl Default for Description {
    fn default() -> Self {
        Description::Line(String::new())
    }
}

/// One `perf-*` entry of a scenario, before it is decoded into a runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerDeclaration {
    /// Key with the prefix stripped, or the explicit `name` field
    pub name: String,
    /// The raw fields of the entry, `type` included
    pub fields: Map<String, Value>,
}

impl RunnerDeclaration {
    /// The `type` discriminator, if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }
}

/// A parsed scenario file.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    /// Path the scenario was loaded from (empty for in-memory scenarios)
    pub path: PathBuf,
    pub description: Description,
    /// Passed opaquely to the pub/sub client factory
    pub options: Map<String, Value>,
    pub runners: Vec<RunnerDeclaration>,
}

impl Scenario {
    /// Read and parse the scenario at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scenario = Self::from_json_str(&text).map_err(|e| match e {
            ScenarioError::Format { reason, .. } => ScenarioError::Format {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        scenario.path = path.to_path_buf();
        debug!(
            "Loaded scenario {:?} with {} runner(s)",
            scenario.path,
            scenario.runners.len()
        );
        Ok(scenario)
    }

    /// Parse a scenario from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ScenarioError> {
        let format_error = |reason: String| ScenarioError::Format {
            path: PathBuf::new(),
            reason,
        };

        let document: Value = serde_json::from_str(text).map_err(|e| format_error(e.to_string()))?;
        let Value::Object(mut document) = document else {
            return Err(format_error("top level is not an object".to_string()));
        };

        let description = match document.shift_remove("description") {
            None | Some(Value::Null) => Description::default(),
            Some(value) => serde_json::from_value(value).map_err(|_| {
                format_error("description must be a string or a list of strings".to_string())
            })?,
        };

        let options = match document.shift_remove("options") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(options)) => options,
            Some(_) => return Err(format_error("options must be an object".to_string())),
        };

        let runners = runner_declarations(document)?;

        Ok(Self {
            path: PathBuf::new(),
            description,
            options,
            runners,
        })
    }

    /// Find a runner declaration by its effective name.
    pub fn find_runner(&self, name: &str) -> Option<(usize, &RunnerDeclaration)> {
        self.runners
            .iter()
            .enumerate()
            .find(|(_, declaration)| declaration.name == name)
    }
}

/// Select the `perf-*` keys in document order and turn each into a
/// declaration. A non-object value yields a declaration with no fields.
fn runner_declarations(document: Map<String, Value>) -> Result<Vec<RunnerDeclaration>, ScenarioError> {
    let mut seen = HashSet::new();
    let mut runners = Vec::new();

    for (key, value) in document {
        let Some(stripped) = key.strip_prefix(RUNNER_PREFIX) else {
            continue;
        };

        let fields = match value {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(stripped)
            .to_string();

        if !seen.insert(name.clone()) {
            return Err(ScenarioError::DuplicateRunner(name));
        }
        runners.push(RunnerDeclaration { name, fields });
    }

    Ok(runners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_declarations_keep_document_order() {
        let scenario = Scenario::from_json_str(
            r#"{
                "perf-zeta": { "type": "a" },
                "options": { "url": "localhost" },
                "perf-alpha": { "type": "b" },
                "unrelated": 1,
                "perf-mid": { "type": "c" }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = scenario.runners.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(scenario.runners[1].kind(), Some("b"));
        assert_eq!(scenario.options.get("url"), Some(&Value::from("localhost")));

        let scenario = Scenario::from_json_str(
            r#"{
                "description": "d",
                "options": {},
                "perf-a": {},
                "perf-b": {},
                "perf-c": {}
            }"#,
        )
        .unwrap();
        let names: Vec<_> = scenario.runners.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_explicit_name_overrides_key() {
        let scenario = Scenario::from_json_str(
            r#"{ "perf-one": { "type": "x", "name": "renamed" }, "perf-two": {} }"#,
        )
        .unwrap();
        assert_eq!(scenario.runners[0].name, "renamed");
        assert_eq!(scenario.runners[1].name, "two");
        assert_eq!(scenario.runners[1].kind(), None);
        assert!(scenario.find_runner("one").is_none());
        assert_eq!(scenario.find_runner("two").map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_description_variants() {
        let single = Scenario::from_json_str(r#"{ "description": "hello" }"#).unwrap();
        assert_eq!(single.description.lines(), vec!["hello"]);

        let many = Scenario::from_json_str(r#"{ "description": ["a", "b"] }"#).unwrap();
        assert_eq!(many.description.lines(), vec!["a", "b"]);

        let none = Scenario::from_json_str("{}").unwrap();
        assert!(none.description.is_empty());
        assert!(none.options.is_empty());
        assert!(none.runners.is_empty());

        assert!(matches!(
            Scenario::from_json_str(r#"{ "description": 5 }"#),
            Err(ScenarioError::Format { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let result = Scenario::from_json_str(
            r#"{ "perf-a": { "type": "x" }, "perf-b": { "type": "x", "name": "a" } }"#,
        );
        assert!(matches!(result, Err(ScenarioError::DuplicateRunner(name)) if name == "a"));
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            Scenario::from_json_str("{ not json"),
            Err(ScenarioError::Format { .. })
        ));
        assert!(matches!(
            Scenario::from_json_str("[1, 2]"),
            Err(ScenarioError::Format { .. })
        ));
        assert!(matches!(
            Scenario::from_json_str(r#"{ "options": [] }"#),
            Err(ScenarioError::Format { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "perf-demo": {{ "type": "single-user-event-emitter" }}, "perf-other": {{}} }}"#
        )
        .unwrap();

        let scenario = Scenario::from_file(file.path()).unwrap();
        assert_eq!(scenario.path, file.path());
        assert_eq!(scenario.runners.len(), 2);
        assert_eq!(scenario.runners[0].name, "demo");
    }

    #[test]
    fn test_from_file_errors_carry_path() {
        let missing = Scenario::from_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ScenarioError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "nope").unwrap();
        match Scenario::from_file(file.path()) {
            Err(ScenarioError::Format { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected a format error, got {:?}", other),
        }
    }
}
