use super::ordered;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Node type tags as they appear in Tableau Prep flow documents.
pub mod node_types {
    pub const LOAD_EXCEL: &str = ".v1.LoadExcel";
    pub const WRITE_TO_HYPER: &str = ".v1.WriteToHyper";
    pub const SIMPLE_JOIN: &str = ".v1.SimpleJoin";
    pub const ADD_COLUMN: &str = ".v1.AddColumn";
    pub const AGGREGATE: &str = ".v1.Aggregate";
    pub const UNION: &str = ".v1.Union";
    pub const PIVOT: &str = ".v1.Pivot";
    pub const FILTER: &str = ".v1.Filter";
    pub const CONTAINER: &str = ".v1.Container";
    pub const SUPER_JOIN: &str = ".v2018_2_3.SuperJoin";
}

/// Connection type that marks a connection as the flow's tabular source.
pub const SOURCE_CONNECTION_TYPE: &str = ".v1.SqlConnection";

/// The closed set of node kinds the compiler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Source,
    Sink,
    Join,
    AddColumn,
    Aggregate,
    Union,
    Pivot,
    Filter,
    Container,
    SuperJoin,
    Unknown,
}

impl NodeKind {
    pub fn from_type(node_type: &str) -> Self {
        match node_type {
            node_types::LOAD_EXCEL => NodeKind::Source,
            node_types::WRITE_TO_HYPER => NodeKind::Sink,
            node_types::SIMPLE_JOIN => NodeKind::Join,
            node_types::ADD_COLUMN => NodeKind::AddColumn,
            node_types::AGGREGATE => NodeKind::Aggregate,
            node_types::UNION => NodeKind::Union,
            node_types::PIVOT => NodeKind::Pivot,
            node_types::FILTER => NodeKind::Filter,
            node_types::CONTAINER => NodeKind::Container,
            node_types::SUPER_JOIN => NodeKind::SuperJoin,
            _ => NodeKind::Unknown,
        }
    }

    /// Sources and sinks sit at the edges of the graph and are never compiled
    /// by the topological pass.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeKind::Source | NodeKind::Sink)
    }
}

/// The whole flow document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    #[serde(default, with = "ordered")]
    pub connections: Vec<Connection>,
    #[serde(with = "ordered")]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub initial_nodes: Vec<String>,
}

/// Describes one external data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub connection_type: String,
    #[serde(default)]
    pub connection_attributes: AHashMap<String, serde_json::Value>,
}

/// One vertex of the flow graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub next_nodes: Vec<NextNode>,

    // Join
    #[serde(default)]
    pub conditions: Vec<JoinCondition>,
    pub join_type: Option<String>,

    // AddColumn
    pub column_name: Option<String>,
    pub expression: Option<String>,

    // Aggregate
    #[serde(default)]
    pub group_by_fields: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,

    // Pivot
    pub pivot_column: Option<String>,
    pub value_column: Option<String>,
    pub pivot_type: Option<String>,
    #[serde(default)]
    pub value_columns: Vec<String>,

    // Filter
    pub filter_expression: Option<String>,

    // Container
    pub loom_container: Option<LoomContainer>,

    // SuperJoin
    pub action_node: Option<Box<Node>>,
}

/// A forward edge `self -> next_node_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextNode {
    #[serde(default)]
    pub next_node_id: String,
    pub namespace: Option<String>,
    pub next_namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCondition {
    #[serde(default)]
    pub left_expression: String,
    #[serde(default)]
    pub right_expression: String,
    pub comparator: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub aggregation_type: Option<String>,
    #[serde(default)]
    pub column: String,
    pub new_name: Option<String>,
}

/// The nested sub-flow of a container node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoomContainer {
    #[serde(default, with = "ordered")]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub initial_nodes: Vec<String>,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_type(&self.node_type)
    }

    /// The name used for this node's binding. Unnamed nodes fall back to `Transform_<id>`.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Transform_{}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Ids of the nodes nested inside this node's container, if any.
    pub fn sub_node_ids(&self) -> impl Iterator<Item = &str> {
        self.loom_container
            .iter()
            .flat_map(|c| c.nodes.iter().map(|n| n.id.as_str()))
    }

    pub fn contains_sub_node(&self, id: &str) -> bool {
        self.sub_node_ids().any(|sub| sub == id)
    }
}

impl Connection {
    /// The workbook path of this connection, when it is the flow's tabular source.
    pub fn source_path(&self) -> Option<&str> {
        if self.connection_type != SOURCE_CONNECTION_TYPE {
            return None;
        }
        self.connection_attributes
            .get("filename")
            .and_then(|v| v.as_str())
    }
}

impl ordered::Keyed for Node {
    fn assign_key(&mut self, key: String) {
        if self.id.is_empty() {
            self.id = key;
        }
    }

    fn key(&self) -> &str {
        &self.id
    }
}

impl ordered::Keyed for Connection {
    fn assign_key(&mut self, key: String) {
        if self.id.is_empty() {
            self.id = key;
        }
    }

    fn key(&self) -> &str {
        &self.id
    }
}
