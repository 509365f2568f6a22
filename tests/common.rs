//! Common test utilities for building flow documents.
//!
//! `json!` objects iterate in key order, so fixture ids are picked to sort in the
//! order the nodes should be declared.
use serde_json::{Value, json};
use tflm::prelude::*;

/// A forward edge into `to` on the default side.
#[allow(dead_code)]
pub fn edge(to: &str) -> Value {
    json!({"namespace": "Default", "nextNodeId": to, "nextNamespace": "Default"})
}

/// A forward edge into `to` arriving on the given join side.
#[allow(dead_code)]
pub fn side_edge(to: &str, side: &str) -> Value {
    json!({"namespace": "Default", "nextNodeId": to, "nextNamespace": side})
}

/// The connection block of a flow reading from `Superstore.xlsx`.
#[allow(dead_code)]
pub fn excel_connections() -> Value {
    json!({
        "conn-1": {
            "connectionType": ".v1.SqlConnection",
            "connectionAttributes": {
                "class": "excel-direct",
                "filename": "C:\\data\\Superstore.xlsx"
            }
        }
    })
}

#[allow(dead_code)]
pub fn node(value: Value) -> Node {
    serde_json::from_value(value).expect("invalid node fixture")
}

#[allow(dead_code)]
pub fn flow(value: Value) -> Flow {
    serde_json::from_value(value).expect("invalid flow fixture")
}

/// Orders and Returns joined, cleaned in a container, aggregated by region and
/// written to a Hyper extract.
///
/// `orders, returns -> join -> clean[calc, keep] -> agg -> out`
#[allow(dead_code)]
pub fn superstore_json() -> Value {
    json!({
        "connections": excel_connections(),
        "initialNodes": ["orders", "returns"],
        "nodes": {
            "orders": {
                "nodeType": ".v1.LoadExcel",
                "name": "Orders",
                "nextNodes": [side_edge("join", "Left")]
            },
            "returns": {
                "nodeType": ".v1.LoadExcel",
                "name": "Returns",
                "nextNodes": [side_edge("join", "Right")]
            },
            "join": {
                "nodeType": ".v1.SimpleJoin",
                "name": "Orders + Returns",
                "joinType": "left",
                "conditions": [
                    {"leftExpression": "[Order ID]", "rightExpression": "[Order ID]", "comparator": "=="}
                ],
                "nextNodes": [edge("clean")]
            },
            "clean": {
                "nodeType": ".v1.Container",
                "name": "Clean 1",
                "loomContainer": {
                    "initialNodes": ["calc"],
                    "nodes": {
                        "calc": {
                            "nodeType": ".v1.AddColumn",
                            "name": "Calc Profit Ratio",
                            "columnName": "Profit Ratio",
                            "expression": "[Profit] / [Sales]"
                        },
                        "keep": {
                            "nodeType": ".v1.Filter",
                            "name": "Keep West",
                            "filterExpression": "[Region] == \"West\""
                        }
                    }
                },
                "nextNodes": [edge("agg")]
            },
            "agg": {
                "nodeType": ".v1.Aggregate",
                "name": "Sales by Region",
                "groupByFields": ["[Region]"],
                "aggregations": [
                    {"aggregationType": "sum", "column": "[Sales]", "newName": "TotalSales"}
                ],
                "nextNodes": [edge("out")]
            },
            "out": {
                "nodeType": ".v1.WriteToHyper",
                "name": "Output"
            }
        }
    })
}

#[allow(dead_code)]
pub fn superstore_flow() -> Flow {
    flow(superstore_json())
}

/// A single `Orders` source feeding the given nodes, all declared after it.
#[allow(dead_code)]
pub fn orders_feeding(targets: &[&str], nodes: Value) -> Flow {
    let mut all = serde_json::Map::new();
    all.insert(
        "orders".to_string(),
        json!({
            "nodeType": ".v1.LoadExcel",
            "name": "Orders",
            "nextNodes": targets.iter().map(|t| edge(t)).collect::<Vec<_>>()
        }),
    );
    if let Value::Object(extra) = nodes {
        all.extend(extra);
    }
    flow(json!({
        "connections": excel_connections(),
        "initialNodes": ["orders"],
        "nodes": all
    }))
}
