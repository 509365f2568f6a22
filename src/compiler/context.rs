use super::TypeAliases;
use super::handlers::{HandlerRegistry, NodeHandler};
use crate::flow::NodeKind;
use crate::script::sanitize_name;
use ahash::{AHashMap, AHashSet};
use std::fmt;

/// Identifiers the assembled script binds itself. Node names never shadow these.
pub(crate) const RESERVED_IDENTIFIERS: &[&str] = &[
    "GetSheetData",
    "CombinedTables",
    "SelectedSheetName",
    "SelectedSheets",
    "GetSelectedTable",
];

/// Number of node-id characters used to disambiguate a colliding identifier.
const ID_SUFFIX_LEN: usize = 8;

/// State threaded through one compilation: which nodes have been compiled and
/// which identifiers are already bound in the script's `let` block.
#[derive(Clone)]
pub struct CompilationContext<'h> {
    tables: Vec<(String, String)>,
    by_node: AHashMap<String, usize>,
    claimed: Vec<String>,
    taken: AHashSet<String>,
    steps: Option<StepLookup<'h>>,
}

/// Resolves the handler for a step nested in a container, with the same
/// registry and type aliases the compiler uses for top-level nodes.
#[derive(Clone, Copy)]
pub(crate) struct StepLookup<'h> {
    handlers: &'h HandlerRegistry,
    aliases: &'h TypeAliases,
}

impl<'h> StepLookup<'h> {
    pub(crate) fn new(handlers: &'h HandlerRegistry, aliases: &'h TypeAliases) -> Self {
        Self { handlers, aliases }
    }

    /// Containers never nest, so a step that is itself a container has no handler.
    fn get(&self, node_type: &str) -> Option<&'h dyn NodeHandler> {
        let canonical = self.aliases.canonical(node_type);
        if NodeKind::from_type(canonical) == NodeKind::Container {
            return None;
        }
        self.handlers
            .get(node_type)
            .or_else(|| self.handlers.get(canonical))
            .map(|handler| &**handler as &dyn NodeHandler)
    }
}

impl fmt::Debug for CompilationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationContext")
            .field("tables", &self.tables)
            .field("claimed", &self.claimed)
            .finish()
    }
}

/// A point the context can be rolled back to.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    claimed: usize,
}

impl Default for CompilationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h> CompilationContext<'h> {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            by_node: AHashMap::new(),
            claimed: Vec::new(),
            taken: RESERVED_IDENTIFIERS.iter().map(|s| s.to_string()).collect(),
            steps: None,
        }
    }

    pub(crate) fn with_steps(steps: StepLookup<'h>) -> Self {
        Self {
            steps: Some(steps),
            ..Self::new()
        }
    }

    /// The handler the compiler would use for a container step of `node_type`.
    ///
    /// `None` when the context was created outside a compiler run.
    pub fn step_handler(&self, node_type: &str) -> Option<&'h dyn NodeHandler> {
        self.steps.and_then(|steps| steps.get(node_type))
    }

    /// Claims a unique identifier for `display_name`.
    ///
    /// The sanitized name is used when it is free. Otherwise a suffix taken from
    /// the node id is appended, then a counter if that is taken as well.
    pub fn claim(&mut self, node_id: &str, display_name: &str) -> String {
        let base = sanitize_name(display_name);
        let identifier = if !base.is_empty() && !self.taken.contains(&base) {
            base
        } else {
            let suffix: String = node_id
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .take(ID_SUFFIX_LEN)
                .collect();
            let stem = match (base.is_empty(), suffix.is_empty()) {
                (true, _) => format!("Node_{}", suffix),
                (false, true) => base,
                (false, false) => format!("{}_{}", base, suffix),
            };
            let mut candidate = stem.clone();
            let mut counter = 2;
            while self.taken.contains(&candidate) {
                candidate = format!("{}_{}", stem, counter);
                counter += 1;
            }
            tracing::debug!(
                "Identifier '{}' for node {} is taken, using '{}'",
                sanitize_name(display_name),
                node_id,
                candidate
            );
            candidate
        };
        self.taken.insert(identifier.clone());
        self.claimed.push(identifier.clone());
        identifier
    }

    /// Records `node_id` as compiled under `identifier`.
    pub fn register(&mut self, node_id: &str, identifier: &str) {
        match self.by_node.get(node_id) {
            Some(&index) => self.tables[index].1 = identifier.to_string(),
            None => {
                self.by_node.insert(node_id.to_string(), self.tables.len());
                self.tables
                    .push((node_id.to_string(), identifier.to_string()));
            }
        }
    }

    pub fn table(&self, node_id: &str) -> Option<&str> {
        self.by_node
            .get(node_id)
            .map(|&index| self.tables[index].1.as_str())
    }

    pub fn is_compiled(&self, node_id: &str) -> bool {
        self.by_node.contains_key(node_id)
    }

    /// `(node id, identifier)` pairs in registration order.
    pub fn tables(&self) -> &[(String, String)] {
        &self.tables
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            claimed: self.claimed.len(),
        }
    }

    /// Releases every identifier claimed since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        for identifier in self.claimed.drain(checkpoint.claimed..) {
            self.taken.remove(&identifier);
        }
    }
}
