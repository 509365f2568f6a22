//! Tests for the fragments produced by each built-in node handler.
mod common;
use common::*;
use serde_json::json;
use tflm::compiler::handlers::{
    AddColumnHandler, AggregateHandler, ContainerHandler, FilterHandler, JoinHandler,
    PivotHandler, SuperJoinHandler, UnionHandler,
};
use tflm::prelude::*;

fn inputs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Emits `fixture` into `Out` with a fresh context.
fn emit(
    handler: &dyn NodeHandler,
    fixture: serde_json::Value,
    names: &[&str],
) -> std::result::Result<String, NodeError> {
    let mut ctx = CompilationContext::new();
    handler.emit(&node(fixture), "Out", &inputs(names), &mut ctx)
}

#[test]
fn test_join_fragment() {
    let fragment = emit(
        &JoinHandler,
        json!({
            "nodeType": ".v1.SimpleJoin",
            "joinType": "full",
            "conditions": [
                {"leftExpression": "[Region]", "rightExpression": "[Region]"},
                {"leftExpression": "[Year]", "rightExpression": "[Fiscal Year]"}
            ]
        }),
        &["Sales", "Targets"],
    )
    .unwrap();

    assert_eq!(
        fragment,
        "Out = Table.Join(
    Sales,
    {\"Region\", \"Year\"},
    Targets,
    {\"Region\", \"Fiscal Year\"},
    JoinKind.FullOuter
),"
    );
}

#[test]
fn test_join_defaults_to_inner() {
    let fragment = emit(
        &JoinHandler,
        json!({"conditions": [{"leftExpression": "[Id]", "rightExpression": "[Id]"}]}),
        &["A", "B"],
    )
    .unwrap();
    assert!(fragment.ends_with("    JoinKind.Inner\n),"));
}

#[test]
fn test_join_errors() {
    let node = json!({"conditions": [{"leftExpression": "[Id]", "rightExpression": "[Id]"}]});
    let err = emit(&JoinHandler, node.clone(), &["A"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Join operation requires exactly 2 inputs, got 1"
    );
    let err = emit(&JoinHandler, node, &["A", "B", "C"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Join operation requires exactly 2 inputs, got 3"
    );

    let err = emit(&JoinHandler, json!({"conditions": []}), &["A", "B"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Join operation requires at least one condition"
    );
}

#[test]
fn test_super_join_uses_action_node() {
    let fragment = emit(
        &SuperJoinHandler,
        json!({
            "name": "Wrapper",
            "actionNode": {
                "nodeType": ".v1.SimpleJoin",
                "joinType": "rightOnly",
                "conditions": [{"leftExpression": "[Id]", "rightExpression": "[Key]"}]
            }
        }),
        &["A", "B"],
    )
    .unwrap();
    assert!(fragment.starts_with("Out = Table.Join(\n    A,\n    {\"Id\"},\n    B,\n    {\"Key\"},"));
    assert!(fragment.contains("JoinKind.RightAnti"));

    let err = emit(&SuperJoinHandler, json!({"name": "Wrapper"}), &["A", "B"]).unwrap_err();
    assert_eq!(err, NodeError::MissingActionNode);
    assert_eq!(err.to_string(), "SuperJoin node missing actionNode");
}

#[test]
fn test_add_column_fragment() {
    let fragment = emit(
        &AddColumnHandler,
        json!({
            "columnName": "Order Count",
            "expression": "IF [Returned] == \"Yes\" && [Qty] > 0 THEN 1 ELSE 0 END"
        }),
        &["Orders"],
    )
    .unwrap();
    assert_eq!(
        fragment,
        "Out = Table.AddColumn(
    Orders,
    \"Order Count\",
    each IF [Returned] = \"Yes\"  and  [Qty] > 0 THEN 1 ELSE 0 END,
    type number
),"
    );
}

#[test]
fn test_add_column_requires_properties() {
    let err = emit(&AddColumnHandler, json!({"expression": "[A]"}), &["T"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "AddColumn node missing required property 'columnName'"
    );
    let err = emit(&AddColumnHandler, json!({"columnName": "A"}), &["T"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "AddColumn node missing required property 'expression'"
    );
    let err = emit(
        &AddColumnHandler,
        json!({"columnName": "A", "expression": "[A]"}),
        &["T", "U"],
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "AddColumn requires exactly 1 input, got 2");
}

#[test]
fn test_aggregate_fragment() {
    let fragment = emit(
        &AggregateHandler,
        json!({
            "groupByFields": ["[Region]", "[Segment]"],
            "aggregations": [
                {"aggregationType": "sum", "column": "[Sales]", "newName": "TotalSales"},
                {"aggregationType": "countd", "column": "[Customer ID]"},
                {"column": "[Profit]"}
            ]
        }),
        &["Orders"],
    )
    .unwrap();
    assert_eq!(
        fragment,
        "Out = Table.Group(
    Orders,
    {\"Region\", \"Segment\"},
    {{\"TotalSales\", each List.Sum([Sales])}, {\"Customer ID_countd\", each List.Count(List.Distinct([Customer ID]))}, {\"Profit_sum\", each List.Sum([Profit])}}
),"
    );
}

#[test]
fn test_aggregate_requires_groups_or_aggregations() {
    let err = emit(&AggregateHandler, json!({}), &["Orders"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Aggregate operation requires groupByFields or aggregations"
    );
}

#[test]
fn test_union_fragment() {
    let fragment = emit(&UnionHandler, json!({}), &["East", "West", "Central"]).unwrap();
    assert_eq!(
        fragment,
        "Out = Table.Combine(\n    {East, West, Central}\n),"
    );

    let err = emit(&UnionHandler, json!({}), &["East"]).unwrap_err();
    assert_eq!(err.to_string(), "Union requires at least 2 inputs, got 1");
}

#[test]
fn test_pivot_columns_fragment() {
    let fragment = emit(
        &PivotHandler,
        json!({"pivotColumn": "[Category]", "valueColumn": "[Sales]"}),
        &["Orders"],
    )
    .unwrap();
    assert_eq!(
        fragment,
        "Out = Table.Pivot(
    Orders,
    List.Distinct(Table.Column(Orders, \"Category\")),
    \"Category\",
    \"Sales\",
    List.Sum
),"
    );
}

#[test]
fn test_pivot_rows_fragment() {
    let fragment = emit(
        &PivotHandler,
        json!({
            "pivotColumn": "Month",
            "valueColumn": "Amount",
            "pivotType": "rows",
            "valueColumns": ["[Jan]", "[Feb]"]
        }),
        &["Budget"],
    )
    .unwrap();
    assert_eq!(
        fragment,
        "Out = Table.Unpivot(
    Budget,
    {\"Jan\", \"Feb\"},
    \"Month\",
    \"Amount\"
),"
    );
}

#[test]
fn test_pivot_requires_columns() {
    let err = emit(&PivotHandler, json!({"pivotColumn": "[Category]"}), &["T"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Pivot operation requires pivotColumn and valueColumn"
    );
    let err = emit(
        &PivotHandler,
        json!({"pivotColumn": "", "valueColumn": "[Sales]"}),
        &["T"],
    )
    .unwrap_err();
    assert_eq!(
        err,
        NodeError::MissingRequirement {
            operation: "Pivot",
            requirement: "pivotColumn and valueColumn",
        }
    );
}

#[test]
fn test_filter_fragment() {
    let fragment = emit(
        &FilterHandler,
        json!({"filterExpression": "[Sales] > 100 || ![Returned]"}),
        &["Orders"],
    )
    .unwrap();
    assert_eq!(
        fragment,
        "Out = Table.SelectRows(\n    Orders,\n    each [Sales] > 100  or  not [Returned]\n),"
    );

    let err = emit(&FilterHandler, json!({"filterExpression": "  "}), &["Orders"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Filter operation requires filterExpression"
    );
}

#[test]
fn test_container_threads_steps_through_context() {
    let container = node(json!({
        "nodeType": ".v1.Container",
        "loomContainer": {
            "nodes": {
                "a1": {"nodeType": ".v1.Filter", "name": "Out", "filterExpression": "[A] > 0"},
                "a2": {"nodeType": ".v1.Mystery", "name": "Odd"},
                "a3": {"nodeType": ".v1.AddColumn", "name": "Double", "columnName": "B", "expression": "[A] * 2"}
            }
        }
    }));

    let mut ctx = CompilationContext::new();
    let output = ctx.claim("box", "Out");
    let fragment = ContainerHandler::new()
        .emit(&container, &output, &inputs(&["Orders"]), &mut ctx)
        .unwrap();

    assert_eq!(
        fragment,
        "// Container: Out
Out_a1 = Table.SelectRows(
    Orders,
    each [A] > 0
),
// Warning: No handler for sub-node type .v1.Mystery in Out
Double = Table.AddColumn(
    Out_a1,
    \"B\",
    each [A] * 2,
    type number
),
Out = Double,"
    );
    assert!(ctx.tables().is_empty());
}

#[test]
fn test_container_does_not_nest_containers() {
    let container = node(json!({
        "loomContainer": {
            "nodes": {
                "inner": {"nodeType": ".v1.Container", "name": "Inner"}
            }
        }
    }));
    let mut ctx = CompilationContext::new();
    let fragment = ContainerHandler::new()
        .emit(&container, "Outer", &inputs(&["T"]), &mut ctx)
        .unwrap();
    assert_eq!(
        fragment,
        "// Container: Outer\n// Warning: No handler for sub-node type .v1.Container in Outer\nOuter = T,"
    );
}
