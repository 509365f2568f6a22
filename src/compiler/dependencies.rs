use super::TypeAliases;
use crate::flow::{Flow, Node, NodeKind};
use ahash::AHashMap;
use itertools::Itertools;

/// A predecessor of some node, with the side of the edge it arrives on.
#[derive(Debug, Clone, Copy)]
struct Incoming<'a> {
    source: &'a str,
    namespace: Option<&'a str>,
}

/// Derives the upstream nodes of any node in a flow.
///
/// Flow documents only encode forward edges (`nextNodes`). The resolver inverts
/// them once into a predecessor index and then answers lookups from that index.
pub(super) struct DependencyResolver<'a> {
    aliases: &'a TypeAliases,
    debug: bool,
    predecessors: AHashMap<&'a str, Vec<Incoming<'a>>>,
    /// Sub-node id -> id of the top-level container holding it.
    parent_container: AHashMap<&'a str, &'a str>,
}

impl<'a> DependencyResolver<'a> {
    pub(super) fn new(flow: &'a Flow, aliases: &'a TypeAliases, debug: bool) -> Self {
        let mut predecessors: AHashMap<&'a str, Vec<Incoming<'a>>> = AHashMap::new();
        let mut parent_container = AHashMap::new();

        for node in &flow.nodes {
            for edge in &node.next_nodes {
                predecessors
                    .entry(edge.next_node_id.as_str())
                    .or_default()
                    .push(Incoming {
                        source: &node.id,
                        namespace: edge.next_namespace.as_deref(),
                    });
            }
            for sub_id in node.sub_node_ids() {
                parent_container.entry(sub_id).or_insert(node.id.as_str());
            }
        }

        Self {
            aliases,
            debug,
            predecessors,
            parent_container,
        }
    }

    /// Returns the ids `node` consumes, de-duplicated and in input order.
    ///
    /// Inputs follow document order, except that an edge arriving on the `Left`
    /// side of a join sorts before untagged edges and a `Right` edge after them.
    /// A join wrapper reads the edges that target the wrapper itself.
    pub(super) fn dependencies(&self, node: &'a Node) -> Vec<&'a str> {
        let kind = self.aliases.kind(node);
        let mut incoming: Vec<Incoming<'a>> = match kind {
            NodeKind::Source | NodeKind::Sink => return Vec::new(),
            _ => self.incoming(&node.id),
        };

        match kind {
            NodeKind::Container => {
                if let Some(container) = &node.loom_container {
                    incoming.extend(container.initial_nodes.iter().map(|id| Incoming {
                        source: id.as_str(),
                        namespace: None,
                    }));
                }
                incoming.retain(|dep| !node.contains_sub_node(dep.source));
            }
            NodeKind::AddColumn => {
                // Nested derived columns carry no edge of their own; they read
                // whatever feeds their container.
                if let Some(container_id) = self.parent_container.get(node.id.as_str()) {
                    incoming.extend(self.incoming(container_id));
                }
            }
            _ => {}
        }

        incoming.sort_by_key(|dep| side_rank(dep.namespace));
        let dependencies: Vec<&'a str> = incoming
            .into_iter()
            .map(|dep| dep.source)
            .unique()
            .collect();

        if dependencies.is_empty() && self.debug {
            tracing::warn!(
                "Warning: No dependencies found for node {} ({})",
                node.id,
                node.node_type
            );
        }
        dependencies
    }

    fn incoming(&self, node_id: &str) -> Vec<Incoming<'a>> {
        self.predecessors.get(node_id).cloned().unwrap_or_default()
    }
}

fn side_rank(namespace: Option<&str>) -> u8 {
    match namespace {
        Some(ns) if ns.eq_ignore_ascii_case("left") => 0,
        Some(ns) if ns.eq_ignore_ascii_case("right") => 2,
        _ => 1,
    }
}
