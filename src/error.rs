use thiserror::Error;

/// Fatal errors that stop a compilation before any script text is produced.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Could not read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Invalid JSON format in {file}: {message}")]
    JsonParseError { file: String, message: String },

    #[error(
        "No Excel file path found in flow file connections. Please specify one with a source override."
    )]
    NoSourcePath,
}

/// Errors raised while compiling a single node.
///
/// These never abort a compilation. The compiler renders them as a comment in place
/// of the node's fragment and keeps going with the rest of the flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("{operation} requires {expected}, got {found}")]
    InputCount {
        operation: &'static str,
        expected: String,
        found: usize,
    },

    #[error("{operation} node missing required property '{property}'")]
    MissingProperty {
        operation: &'static str,
        property: &'static str,
    },

    #[error("{operation} operation requires {requirement}")]
    MissingRequirement {
        operation: &'static str,
        requirement: &'static str,
    },

    #[error("SuperJoin node missing actionNode")]
    MissingActionNode,

    #[error("No dependencies found")]
    NoDependencies,

    #[error("Missing upstream tables: [{}]", .0.join(", "))]
    MissingUpstream(Vec<String>),

    #[error("No handler for node type {0}")]
    UnsupportedNodeType(String),
}

impl NodeError {
    pub(crate) fn input_count(
        operation: &'static str,
        expected: impl Into<String>,
        found: usize,
    ) -> Self {
        NodeError::InputCount {
            operation,
            expected: expected.into(),
            found,
        }
    }
}
