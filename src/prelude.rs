//! Prelude module for convenient imports
//!
//! Re-exports the types needed to load a flow, compile it and inspect the result.
//!
//! # Example
//!
//! ```rust,no_run
//! use tflm::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let compiled = Compiler::from_file("path/to/flow.json")?
//!     .with_debug(true)
//!     .build()
//!     .compile()?;
//!
//! println!("{}", compiled.script);
//! # Ok(())
//! # }
//! ```

// Compilation
pub use crate::compiler::{
    CompilationContext, CompiledScript, Compiler, CompilerBuilder, Diagnostic, NodeHandler, Stage,
};

// Flow model
pub use crate::flow::{Flow, Node, NodeKind};

// Script helpers
pub use crate::script::{ColumnType, detect_column_type, sanitize_name, translate_expression};

// Error types
pub use crate::error::{CompileError, NodeError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
