use crate::error::{CompileError, NodeError};
use crate::flow::{Flow, Node, NodeKind};
use crate::script::quote;
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::fmt;
use std::fs;
use std::path::Path;

mod assembly;
pub mod context;
mod dependencies;
pub mod handlers;

pub use context::CompilationContext;

use context::StepLookup;
pub use handlers::{HandlerRegistry, NodeHandler};

use dependencies::DependencyResolver;
use handlers::register_default_handlers;

/// The stages a compilation moves through. `Failed` absorbs any fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    SourceExtraction,
    SourceRegistration,
    TopologicalCompilation,
    OutputAssembly,
    Done,
    Failed,
}

/// A problem the compiler worked around while producing the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A node could not be compiled; its fragment was replaced by a comment.
    NodeFailed {
        node_id: String,
        node_type: String,
        error: NodeError,
    },
    /// The topological pass stopped making progress with these nodes left over.
    Unresolved { node_ids: Vec<String> },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NodeFailed {
                error: NodeError::UnsupportedNodeType(node_type),
                ..
            } => write!(f, "// Warning: No handler for node type {}", node_type),
            Diagnostic::NodeFailed {
                node_id,
                node_type,
                error,
            } => write!(
                f,
                "// Error processing node {} ({}): {}",
                node_id, node_type, error
            ),
            Diagnostic::Unresolved { node_ids } => write!(
                f,
                "// Warning: Circular or unresolvable dependencies detected in nodes: {}",
                node_ids.join(", ")
            ),
        }
    }
}

/// The result of a successful compilation.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    /// The full M script.
    pub script: String,
    /// The workbook the script reads from.
    pub source_path: String,
    /// `(node id, identifier)` for every table bound in the script, in binding order.
    pub tables: Vec<(String, String)>,
    pub diagnostics: Vec<Diagnostic>,
    /// Ids of the nodes the topological pass visited, in visiting order.
    pub processing_order: Vec<String>,
}

impl CompiledScript {
    pub fn table(&self, node_id: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, identifier)| identifier.as_str())
    }

    /// Writes the script to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), CompileError> {
        let path = path.as_ref();
        fs::write(path, &self.script).map_err(|e| CompileError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl fmt::Display for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.script)
    }
}

/// Maps node types used by other flow schema versions onto the built-in ones.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeAliases(AHashMap<String, String>);

impl TypeAliases {
    pub(crate) fn canonical<'t>(&'t self, node_type: &'t str) -> &'t str {
        self.0.get(node_type).map_or(node_type, String::as_str)
    }

    pub(crate) fn kind(&self, node: &Node) -> NodeKind {
        NodeKind::from_type(self.canonical(&node.node_type))
    }
}

/// Compiles a [`Flow`] into a Power Query M script.
pub struct Compiler {
    flow: Flow,
    handlers: HandlerRegistry,
    aliases: TypeAliases,
    source_override: Option<String>,
    selected_table: String,
    debug: bool,
}

pub struct CompilerBuilder {
    flow: Flow,
    handlers: HandlerRegistry,
    aliases: TypeAliases,
    source_override: Option<String>,
    selected_table: String,
    debug: bool,
}

impl fmt::Debug for CompilerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilerBuilder")
            .field("flow", &self.flow)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .field("source_override", &self.source_override)
            .field("selected_table", &self.selected_table)
            .field("debug", &self.debug)
            .finish()
    }
}

impl CompilerBuilder {
    pub fn new(flow: Flow) -> Self {
        let mut handlers = HandlerRegistry::new();
        register_default_handlers(&mut handlers);
        Self {
            flow,
            handlers,
            aliases: TypeAliases::default(),
            source_override: None,
            selected_table: String::new(),
            debug: false,
        }
    }

    /// Uses `path` as the workbook location instead of the one found in the
    /// flow's connections.
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_override = Some(path.into());
        self
    }

    /// Narrates dependency resolution and per-node outcomes through `tracing`.
    /// Never changes the produced script.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Preselects the table `GetSelectedTable` returns.
    pub fn with_selected_table(mut self, name: impl Into<String>) -> Self {
        self.selected_table = name.into();
        self
    }

    /// Treats nodes of `user_type_name` as `builtin_type_name`. Unknown targets
    /// are ignored.
    pub fn with_type_mapping(mut self, user_type_name: &str, builtin_type_name: &str) -> Self {
        if self.handlers.contains_key(builtin_type_name)
            || NodeKind::from_type(builtin_type_name) != NodeKind::Unknown
        {
            self.aliases
                .0
                .insert(user_type_name.to_string(), builtin_type_name.to_string());
        }
        self
    }

    /// Registers a handler for a node type, replacing any built-in one.
    pub fn with_handler(mut self, handler: Box<dyn NodeHandler>) -> Self {
        self.handlers.insert(handler.node_type().to_string(), handler);
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            flow: self.flow,
            handlers: self.handlers,
            aliases: self.aliases,
            source_override: self.source_override,
            selected_table: self.selected_table,
            debug: self.debug,
        }
    }
}

impl Compiler {
    pub fn builder(flow: Flow) -> CompilerBuilder {
        CompilerBuilder::new(flow)
    }

    /// Loads a flow document from disk and returns a builder for it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<CompilerBuilder, CompileError> {
        Flow::from_file(path).map(CompilerBuilder::new)
    }

    pub fn compile(self) -> Result<CompiledScript, CompileError> {
        if self.debug {
            tracing::info!(
                stage = ?Stage::Loading,
                "Loaded flow with {} nodes and {} connections",
                self.flow.nodes.len(),
                self.flow.connections.len()
            );
        }
        self.enter(Stage::SourceExtraction);
        let source_path = match self.resolve_source_path() {
            Ok(path) => path,
            Err(e) => {
                self.enter(Stage::Failed);
                return Err(e);
            }
        };

        let steps = StepLookup::new(&self.handlers, &self.aliases);
        let mut ctx = CompilationContext::with_steps(steps);
        let mut lines = vec!["let".to_string()];

        self.enter(Stage::SourceRegistration);
        self.register_sources(&source_path, &mut ctx, &mut lines);

        self.enter(Stage::TopologicalCompilation);
        lines.push(String::new());
        lines.push("    // Transformations".to_string());
        let (diagnostics, processing_order) = self.compile_transformations(&mut ctx, &mut lines);
        if self.debug {
            tracing::info!("Processing order: {:?}", processing_order);
        }

        self.enter(Stage::OutputAssembly);
        let identifiers: Vec<&str> = ctx
            .tables()
            .iter()
            .map(|(_, identifier)| identifier.as_str())
            .collect();
        lines.extend(assembly::output_section(&identifiers, &self.selected_table));

        self.enter(Stage::Done);
        Ok(CompiledScript {
            script: lines.join("\n"),
            source_path,
            tables: ctx.tables().to_vec(),
            diagnostics,
            processing_order,
        })
    }

    fn enter(&self, stage: Stage) {
        if self.debug {
            tracing::info!(?stage, "Entering stage");
        }
    }

    fn resolve_source_path(&self) -> Result<String, CompileError> {
        self.source_override
            .clone()
            .or_else(|| self.flow.source_path().map(str::to_string))
            .ok_or(CompileError::NoSourcePath)
    }

    /// Root nodes that load a sheet from the workbook, in `initialNodes` order.
    fn source_nodes(&self) -> impl Iterator<Item = &Node> {
        self.flow
            .initial_nodes
            .iter()
            .filter_map(move |id| self.flow.node(id))
            .filter(move |n| self.aliases.kind(n) == NodeKind::Source)
    }

    /// Emits the workbook loader and binds every root source sheet.
    fn register_sources(
        &self,
        source_path: &str,
        ctx: &mut CompilationContext<'_>,
        lines: &mut Vec<String>,
    ) {
        let sources: Vec<&Node> = self.source_nodes().collect();
        let sheet_names: Vec<&str> = sources.iter().map(|n| n.name.as_str()).collect();
        lines.extend(assembly::loader_function(source_path, &sheet_names));

        lines.push(String::new());
        lines.push("    // Load base tables".to_string());
        for node in sources {
            let identifier = ctx.claim(&node.id, &node.display_name());
            lines.push(format!(
                "    {} = GetSheetData({}),",
                identifier,
                quote(&node.name)
            ));
            ctx.register(&node.id, &identifier);
        }
    }

    /// Compiles every remaining node in dependency order, one round at a time.
    ///
    /// A round compiles all nodes whose dependencies were processed in earlier
    /// rounds. A round that finds nothing to compile ends the pass.
    fn compile_transformations(
        &self,
        ctx: &mut CompilationContext<'_>,
        lines: &mut Vec<String>,
    ) -> (Vec<Diagnostic>, Vec<String>) {
        let resolver = DependencyResolver::new(&self.flow, &self.aliases, self.debug);
        let mut diagnostics = Vec::new();
        let mut order = Vec::new();
        let mut processed: AHashSet<String> =
            ctx.tables().iter().map(|(id, _)| id.clone()).collect();
        let mut remaining: Vec<&Node> = self
            .flow
            .nodes
            .iter()
            .filter(|n| !processed.contains(&n.id) && !self.aliases.kind(n).is_terminal())
            .collect();

        while !remaining.is_empty() {
            let mut ready = Vec::new();
            let mut waiting = Vec::new();
            for node in remaining {
                let deps = resolver.dependencies(node);
                if deps.iter().all(|dep| processed.contains(*dep)) {
                    ready.push((node, deps));
                } else {
                    if self.debug {
                        let missing: Vec<&str> = deps
                            .iter()
                            .copied()
                            .filter(|dep| !processed.contains(*dep))
                            .collect();
                        tracing::info!(
                            "Node {} ({}): Waiting for dependencies {:?}",
                            node.id,
                            node.node_type,
                            missing
                        );
                    }
                    waiting.push(node);
                }
            }

            if ready.is_empty() {
                let diagnostic = Diagnostic::Unresolved {
                    node_ids: waiting.iter().map(|n| n.id.clone()).collect(),
                };
                if self.debug {
                    tracing::warn!("{}", diagnostic);
                    for node in &waiting {
                        tracing::info!(
                            "Node {} ({}): {}, Dependencies: {:?}",
                            node.id,
                            node.node_type,
                            node.display_name(),
                            resolver.dependencies(node)
                        );
                    }
                }
                lines.extend(assembly::indent(&diagnostic.to_string()));
                diagnostics.push(diagnostic);
                break;
            }

            for (node, deps) in ready {
                processed.insert(node.id.clone());
                order.push(node.id.clone());
                match self.compile_node(node, &deps, ctx) {
                    Ok(fragment) => {
                        if self.debug {
                            tracing::info!(
                                "Processed node {} ({}): {}",
                                node.id,
                                node.node_type,
                                node.display_name()
                            );
                        }
                        lines.extend(assembly::indent(&fragment));
                    }
                    Err(error) => {
                        let diagnostic = Diagnostic::NodeFailed {
                            node_id: node.id.clone(),
                            node_type: node.node_type.clone(),
                            error,
                        };
                        if self.debug {
                            tracing::warn!("{}", diagnostic);
                        }
                        lines.extend(assembly::indent(&diagnostic.to_string()));
                        diagnostics.push(diagnostic);
                    }
                }
            }
            remaining = waiting;
        }

        (diagnostics, order)
    }

    /// Compiles one node whose dependencies have all been processed.
    fn compile_node(
        &self,
        node: &Node,
        deps: &[&str],
        ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        let handler = self
            .handlers
            .get(&node.node_type)
            .or_else(|| self.handlers.get(self.aliases.canonical(&node.node_type)))
            .ok_or_else(|| NodeError::UnsupportedNodeType(node.node_type.clone()))?;

        if deps.is_empty() && self.aliases.kind(node) != NodeKind::Container {
            return Err(NodeError::NoDependencies);
        }

        let inputs: Vec<Option<&str>> = deps.iter().map(|dep| ctx.table(dep)).collect();
        if inputs.iter().any(Option::is_none) {
            if self.debug {
                for dep in deps.iter().filter(|dep| !ctx.is_compiled(dep)) {
                    let dep_type = self.flow.node(dep).map_or("Unknown", |n| n.node_type.as_str());
                    tracing::info!("Potential missing node: {}, Type: {}", dep, dep_type);
                }
            }
            let tables = deps
                .iter()
                .zip(&inputs)
                .map(|(dep, table)| match table {
                    Some(table) => table.to_string(),
                    None => format!("MissingTable_{}", dep),
                })
                .collect();
            return Err(NodeError::MissingUpstream(tables));
        }
        let inputs: Vec<String> = inputs.into_iter().flatten().map(str::to_string).collect();

        let checkpoint = ctx.checkpoint();
        let output = ctx.claim(&node.id, &node.display_name());
        match handler.emit(node, &output, &inputs, ctx) {
            Ok(fragment) => {
                if self.debug {
                    tracing::info!(
                        "Generated code for {} ({}): {}...",
                        node.id,
                        node.node_type,
                        fragment.lines().next().unwrap_or_default()
                    );
                }
                ctx.register(&node.id, &output);
                Ok(fragment)
            }
            Err(error) => {
                ctx.rollback(checkpoint);
                Err(error)
            }
        }
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("nodes", &self.flow.nodes.len())
            .field(
                "handlers",
                &self.handlers.keys().sorted().collect::<Vec<_>>(),
            )
            .field("source_override", &self.source_override)
            .field("debug", &self.debug)
            .finish()
    }
}
