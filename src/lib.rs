//! # tflm - Tableau Prep to Power Query M compiler
//!
//! **tflm** turns a Tableau Prep flow document (a graph of data sources and table
//! transformations) into a single Power Query M script that rebuilds the same
//! tables from the flow's Excel workbook.
//!
//! ## Core Workflow
//!
//! 1.  **Load the flow**: [`Flow::from_file`](flow::Flow::from_file) or
//!     [`Flow::from_json`](flow::Flow::from_json) parse the document. Node and
//!     connection order is kept exactly as written.
//! 2.  **Configure**: [`Compiler::builder`](compiler::Compiler::builder) returns a
//!     `CompilerBuilder` for overriding the workbook path, preselecting the output
//!     table, turning on debug narration, aliasing node types or plugging in custom
//!     node handlers.
//! 3.  **Compile**: `compile()` orders the nodes topologically, emits one M fragment
//!     per node and assembles the `let ... in` script.
//!
//! Problems with a single node never abort the compilation. The node's fragment is
//! replaced by a comment and the problem is reported in
//! [`CompiledScript::diagnostics`](compiler::CompiledScript::diagnostics).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tflm::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let flow = Flow::from_file("flows/superstore.tfl")?;
//!
//!     let compiled = Compiler::builder(flow)
//!         .with_source_path(r"D:\data\Superstore.xlsx")
//!         .with_selected_table("Orders_by_Region")
//!         .build()
//!         .compile()?;
//!
//!     for diagnostic in &compiled.diagnostics {
//!         eprintln!("{}", diagnostic);
//!     }
//!     compiled.write_to("output.pq")?;
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod error;
pub mod flow;
pub mod prelude;
pub mod script;
