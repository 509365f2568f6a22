pub mod definition;
pub mod ordered;

pub use definition::*;

use crate::error::CompileError;
use std::fs;
use std::path::Path;

impl Flow {
    /// Parses a flow document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        Self::parse(json, "<input>")
    }

    /// Loads a flow document from disk.
    ///
    /// Files are expected to carry a `.json` or `.tfl` extension. Anything else is
    /// still parsed, with a warning, so content-sniffed JSON files load too.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        if !path.exists() {
            return Err(CompileError::FileNotFound(display));
        }

        let content = fs::read_to_string(path).map_err(|e| CompileError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let tagged = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("tfl"));
        if !tagged && serde_json::from_str::<serde_json::Value>(&content).is_err() {
            tracing::warn!(
                "Expected .json or .tfl file, got '{}'",
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
        }

        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(display);
        Self::parse(&content, &file)
    }

    fn parse(json: &str, file: &str) -> Result<Self, CompileError> {
        serde_json::from_str(json).map_err(|e| CompileError::JsonParseError {
            file: file.to_string(),
            message: e.to_string(),
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The workbook path of the first connection that is a tabular source.
    pub fn source_path(&self) -> Option<&str> {
        self.connections.iter().find_map(Connection::source_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order_of_nodes() {
        let flow = Flow::from_json(
            r#"{
                "nodes": {
                    "z": {"nodeType": ".v1.Filter", "name": "Z"},
                    "a": {"nodeType": ".v1.Filter", "name": "A"},
                    "m": {"id": "explicit", "nodeType": ".v1.Filter", "name": "M"}
                }
            }"#,
        )
        .unwrap();
        let ids: Vec<_> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["z", "a", "explicit"]);
    }

    #[test]
    fn first_sql_connection_with_filename_wins() {
        let flow = Flow::from_json(
            r#"{
                "connections": {
                    "c0": {"connectionType": ".v1.SqlConnection", "connectionAttributes": {"class": "excel-direct"}},
                    "c1": {"connectionType": ".v1.FileConnection", "connectionAttributes": {"filename": "other.csv"}},
                    "c2": {"connectionType": ".v1.SqlConnection", "connectionAttributes": {"filename": "C:\\data\\sales.xlsx"}},
                    "c3": {"connectionType": ".v1.SqlConnection", "connectionAttributes": {"filename": "late.xlsx"}}
                },
                "nodes": {}
            }"#,
        )
        .unwrap();
        assert_eq!(flow.source_path(), Some("C:\\data\\sales.xlsx"));
        assert_eq!(flow.connections[2].id, "c2");
    }

    #[test]
    fn missing_nodes_is_a_parse_error() {
        let err = Flow::from_json(r#"{"connections": {}}"#).unwrap_err();
        assert!(matches!(err, CompileError::JsonParseError { .. }));
    }
}
