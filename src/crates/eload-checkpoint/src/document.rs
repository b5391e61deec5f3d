//! The checkpoint document: a nested YAML mapping addressed by key paths
//!
//! Paths are slices of key segments rather than dotted strings because some
//! keys are file paths (`brokering.vcf_files./data/a.vcf.gz.index`) and may
//! contain dots themselves. Paths are only joined with `.` for display.

use crate::error::{CheckpointError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

/// Key of the schema version stamped on every persisted document
pub const VERSION_KEY: &str = "version";

/// Current schema version of the checkpoint document
pub const SCHEMA_VERSION: u64 = 1;

/// Render a key path the way operators write it (`ingestion.database.db_name`)
pub fn display_path(path: &[&str]) -> String {
    path.join(".")
}

/// Hierarchical record of facts and stage outcomes for one submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointDocument {
    root: Mapping,
}

impl CheckpointDocument {
    /// An empty document, as seen on the first run of a submission
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from YAML text. Empty text yields an empty document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        match serde_yaml::from_str::<Value>(text)? {
            Value::Null => Ok(Self::new()),
            Value::Mapping(root) => Ok(Self { root }),
            other => Err(CheckpointError::Invalid(format!(
                "top level must be a mapping, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Serialize the document as human-editable YAML
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Look up a value. A missing key anywhere along the path is `None`.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(*first)?;
        for segment in rest {
            current = current.as_mapping()?.get(*segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &[&str]) -> bool {
        self.get(path).map(|v| !v.is_null()).unwrap_or(false)
    }

    /// Present and truthy: not null, not `false`, not zero, not an empty
    /// string, sequence or mapping.
    pub fn is_truthy(&self, path: &[&str]) -> bool {
        match self.get(path) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Sequence(seq)) => !seq.is_empty(),
            Some(Value::Mapping(map)) => !map.is_empty(),
            Some(Value::Tagged(tagged)) => !tagged.value.is_null(),
        }
    }

    /// String value at `path`, if it is a string
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Deserialize the sub-tree at `path` into a typed record
    pub fn query_as<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .map_err(|e| CheckpointError::TypeMismatch {
                    path: display_path(path),
                    reason: e.to_string(),
                }),
        }
    }

    /// Write `value` at `path`, creating intermediate mappings as needed.
    ///
    /// The document is left untouched if any ancestor already holds a
    /// non-mapping value.
    pub fn set(&mut self, path: &[&str], value: impl Into<Value>) -> Result<()> {
        let (last, parents) = path.split_last().ok_or_else(|| CheckpointError::InvalidPath {
            path: String::new(),
            segment: String::new(),
        })?;
        self.check_writable(path, parents)?;

        let mut node = &mut self.root;
        for segment in parents {
            let is_mapping = matches!(node.get(*segment), Some(Value::Mapping(_)));
            if !is_mapping {
                node.insert(Value::from(*segment), Value::Mapping(Mapping::new()));
            }
            node = node
                .get_mut(*segment)
                .and_then(Value::as_mapping_mut)
                .ok_or_else(|| CheckpointError::InvalidPath {
                    path: display_path(path),
                    segment: segment.to_string(),
                })?;
        }
        node.insert(Value::from(*last), value.into());
        Ok(())
    }

    /// Serialize any value and write it at `path`
    pub fn set_serialized<T: Serialize + ?Sized>(&mut self, path: &[&str], value: &T) -> Result<()> {
        let value = serde_yaml::to_value(value)?;
        self.set(path, value)
    }

    /// Schema version recorded in the document, if any
    pub fn schema_version(&self) -> Option<u64> {
        self.root.get(VERSION_KEY).and_then(Value::as_u64)
    }

    pub(crate) fn stamp_version(&mut self) {
        if self.schema_version().is_none() {
            self.root.insert(Value::from(VERSION_KEY), Value::from(SCHEMA_VERSION));
        }
    }

    fn check_writable(&self, path: &[&str], parents: &[&str]) -> Result<()> {
        let mut current = &self.root;
        for segment in parents {
            match current.get(*segment) {
                None | Some(Value::Null) => return Ok(()),
                Some(Value::Mapping(child)) => current = child,
                Some(_) => {
                    return Err(CheckpointError::InvalidPath {
                        path: display_path(path),
                        segment: segment.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_missing_path_is_absent_not_error() {
        let doc = CheckpointDocument::new();
        assert!(doc.get(&["brokering", "ena", "PROJECT"]).is_none());
        assert!(!doc.contains(&["brokering"]));
        assert!(!doc.is_truthy(&["brokering", "vcf_files"]));
    }

    #[test]
    fn test_set_creates_intermediate_mappings() {
        let mut doc = CheckpointDocument::new();
        doc.set(&["ingestion", "database", "db_name"], "eva_hsapiens_grch38").unwrap();

        assert_eq!(
            doc.get_str(&["ingestion", "database", "db_name"]),
            Some("eva_hsapiens_grch38")
        );
        assert!(doc.get(&["ingestion", "database"]).unwrap().is_mapping());
    }

    #[test]
    fn test_set_preserves_siblings() {
        let mut doc = CheckpointDocument::new();
        doc.set(&["ingestion", "database", "db_name"], "eva_x").unwrap();
        doc.set(&["ingestion", "database", "exists"], true).unwrap();

        assert_eq!(doc.get_str(&["ingestion", "database", "db_name"]), Some("eva_x"));
        assert_eq!(doc.get(&["ingestion", "database", "exists"]), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_set_through_scalar_fails_without_mutation() {
        let mut doc = CheckpointDocument::new();
        doc.set(&["ingestion", "aggregation"], "none").unwrap();
        let before = doc.clone();

        let err = doc.set(&["ingestion", "aggregation", "mode"], "basic").unwrap_err();

        assert!(matches!(err, CheckpointError::InvalidPath { .. }));
        assert!(err.to_string().contains("ingestion.aggregation.mode"));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_keys_with_dots_are_single_segments() {
        let mut doc = CheckpointDocument::new();
        doc.set(&["brokering", "vcf_files", "/data/a.vcf.gz", "index"], "/data/a.vcf.gz.csi")
            .unwrap();

        assert_eq!(
            doc.get_str(&["brokering", "vcf_files", "/data/a.vcf.gz", "index"]),
            Some("/data/a.vcf.gz.csi")
        );
    }

    #[test]
    fn test_truthiness() {
        let mut doc = CheckpointDocument::new();
        doc.set(&["a"], false).unwrap();
        doc.set(&["b"], "").unwrap();
        doc.set(&["c"], Value::Sequence(vec![])).unwrap();
        doc.set(&["d"], "PRJEB1234").unwrap();
        doc.set(&["e"], 0).unwrap();

        assert!(!doc.is_truthy(&["a"]));
        assert!(!doc.is_truthy(&["b"]));
        assert!(!doc.is_truthy(&["c"]));
        assert!(doc.is_truthy(&["d"]));
        assert!(!doc.is_truthy(&["e"]));
    }

    #[test]
    fn test_query_as_typed_record() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Database {
            db_name: String,
            exists: bool,
        }

        let mut doc = CheckpointDocument::new();
        doc.set(&["ingestion", "database", "db_name"], "eva_x").unwrap();
        doc.set(&["ingestion", "database", "exists"], true).unwrap();

        let db: Database = doc.query_as(&["ingestion", "database"]).unwrap().unwrap();
        assert_eq!(db, Database { db_name: "eva_x".into(), exists: true });

        let missing: Option<Database> = doc.query_as(&["nothing"]).unwrap();
        assert!(missing.is_none());

        let wrong: Result<Option<u32>> = doc.query_as(&["ingestion", "database"]);
        assert!(matches!(wrong, Err(CheckpointError::TypeMismatch { .. })));
    }

    #[test]
    fn test_yaml_text_round_trip() {
        let mut doc = CheckpointDocument::new();
        doc.set(&["brokering", "ena", "PROJECT"], "PRJEB1").unwrap();
        doc.set(&["submission", "taxonomy_id"], 9606).unwrap();

        let text = doc.to_yaml_string().unwrap();
        assert!(text.contains("PROJECT: PRJEB1"));

        let parsed = CheckpointDocument::from_yaml_str(&text).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_parse_rejects_non_mapping_top_level() {
        assert!(CheckpointDocument::from_yaml_str("").unwrap().is_empty());
        assert!(CheckpointDocument::from_yaml_str("~").unwrap().is_empty());
        assert!(matches!(
            CheckpointDocument::from_yaml_str("- a\n- b\n"),
            Err(CheckpointError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let mut doc = CheckpointDocument::new();
        assert!(doc.set(&[], 1).is_err());
    }
}
