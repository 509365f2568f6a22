use super::context::CompilationContext;
use crate::error::NodeError;
use crate::flow::{Node, node_types};
use crate::script::{detect_column_type, quote, quoted_list, strip_brackets, translate_expression};
use ahash::AHashMap;
use itertools::Itertools;

/// Maps node type tags to the handler that compiles them.
pub type HandlerRegistry = AHashMap<String, Box<dyn NodeHandler>>;

/// Defines the contract for turning one node type into an M fragment.
///
/// `output` is the identifier the fragment must bind, `inputs` are the identifiers
/// of the upstream tables in input order. Fragments are unindented and end with a
/// trailing comma so they can be dropped straight into a `let` block.
pub trait NodeHandler: Send + Sync {
    fn node_type(&self) -> &str;
    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError>;
}

/// Registers the built-in handlers, container included.
pub(crate) fn register_default_handlers(registry: &mut HandlerRegistry) {
    register_step_handlers(registry);
    let container = ContainerHandler::new();
    registry.insert(container.node_type().to_string(), Box::new(container));
}

/// Handlers that may also run inside a container.
fn register_step_handlers(registry: &mut HandlerRegistry) {
    let handlers: [Box<dyn NodeHandler>; 7] = [
        Box::new(JoinHandler),
        Box::new(AddColumnHandler),
        Box::new(AggregateHandler),
        Box::new(UnionHandler),
        Box::new(PivotHandler),
        Box::new(FilterHandler),
        Box::new(SuperJoinHandler),
    ];
    for handler in handlers {
        registry.insert(handler.node_type().to_string(), handler);
    }
}

fn require_inputs(
    inputs: &[String],
    count: usize,
    operation: &'static str,
) -> Result<(), NodeError> {
    if inputs.len() != count {
        Err(NodeError::input_count(
            operation,
            format!("exactly {} input{}", count, if count == 1 { "" } else { "s" }),
            inputs.len(),
        ))
    } else {
        Ok(())
    }
}

/// Upper-cases the first letter and lower-cases the rest.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct JoinHandler;

impl JoinHandler {
    /// Maps a Prep join type onto an M `JoinKind` member.
    ///
    /// Prep's own names do not all exist in M, so the known ones are translated
    /// (`left` -> `LeftOuter`, `leftOnly` -> `LeftAnti` and so on) instead of
    /// being capitalized as declared. Anything unrecognized is capitalized.
    fn join_kind(join_type: &str) -> String {
        match join_type.to_ascii_lowercase().as_str() {
            "inner" => "Inner".to_string(),
            "left" | "leftouter" => "LeftOuter".to_string(),
            "right" | "rightouter" => "RightOuter".to_string(),
            "full" | "fullouter" | "outer" => "FullOuter".to_string(),
            "leftonly" | "leftanti" => "LeftAnti".to_string(),
            "rightonly" | "rightanti" => "RightAnti".to_string(),
            _ => capitalize(join_type),
        }
    }

    fn emit_join(join: &Node, output: &str, inputs: &[String]) -> Result<String, NodeError> {
        require_inputs(inputs, 2, "Join operation")?;
        if join.conditions.is_empty() {
            return Err(NodeError::MissingRequirement {
                operation: "Join",
                requirement: "at least one condition",
            });
        }
        let left_keys = quoted_list(
            join.conditions
                .iter()
                .map(|c| strip_brackets(&c.left_expression)),
        );
        let right_keys = quoted_list(
            join.conditions
                .iter()
                .map(|c| strip_brackets(&c.right_expression)),
        );
        let kind = Self::join_kind(join.join_type.as_deref().unwrap_or("inner"));

        Ok(format!(
            "{output} = Table.Join(\n    {left},\n    {left_keys},\n    {right},\n    {right_keys},\n    JoinKind.{kind}\n),",
            left = inputs[0],
            right = inputs[1],
        ))
    }
}

impl NodeHandler for JoinHandler {
    fn node_type(&self) -> &str {
        node_types::SIMPLE_JOIN
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        Self::emit_join(node, output, inputs)
    }
}

/// The join variant that wraps a plain join in an outer `actionNode`.
pub struct SuperJoinHandler;

impl NodeHandler for SuperJoinHandler {
    fn node_type(&self) -> &str {
        node_types::SUPER_JOIN
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        let action = node
            .action_node
            .as_deref()
            .ok_or(NodeError::MissingActionNode)?;
        JoinHandler::emit_join(action, output, inputs)
    }
}

pub struct AddColumnHandler;

impl NodeHandler for AddColumnHandler {
    fn node_type(&self) -> &str {
        node_types::ADD_COLUMN
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        require_inputs(inputs, 1, "AddColumn")?;
        let column = node
            .column_name
            .as_deref()
            .ok_or(NodeError::MissingProperty {
                operation: "AddColumn",
                property: "columnName",
            })?;
        let expression = node
            .expression
            .as_deref()
            .ok_or(NodeError::MissingProperty {
                operation: "AddColumn",
                property: "expression",
            })?;
        let column_type = detect_column_type(column, Some(expression));

        Ok(format!(
            "{output} = Table.AddColumn(\n    {input},\n    {column},\n    each {expr},\n    {column_type}\n),",
            input = inputs[0],
            column = quote(column),
            expr = translate_expression(expression),
        ))
    }
}

pub struct AggregateHandler;

impl AggregateHandler {
    /// Renders the per-group M expression for one aggregation, e.g. `List.Sum([Sales])`.
    fn aggregate_call(aggregation_type: &str, column: &str) -> String {
        let field = format!("[{}]", column);
        match aggregation_type.to_ascii_lowercase().as_str() {
            "avg" | "average" | "mean" => format!("List.Average({})", field),
            "countd" | "countdistinct" => format!("List.Count(List.Distinct({}))", field),
            other => format!("List.{}({})", capitalize(other), field),
        }
    }
}

impl NodeHandler for AggregateHandler {
    fn node_type(&self) -> &str {
        node_types::AGGREGATE
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        require_inputs(inputs, 1, "Aggregate")?;
        if node.group_by_fields.is_empty() && node.aggregations.is_empty() {
            return Err(NodeError::MissingRequirement {
                operation: "Aggregate",
                requirement: "groupByFields or aggregations",
            });
        }

        let groups = quoted_list(node.group_by_fields.iter().map(|f| strip_brackets(f)));
        let aggregations = node
            .aggregations
            .iter()
            .map(|agg| {
                let agg_type = agg.aggregation_type.as_deref().unwrap_or("Sum");
                let column = strip_brackets(&agg.column);
                let new_name = agg
                    .new_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("{}_{}", column, agg_type.to_lowercase()));
                format!(
                    "{{{}, each {}}}",
                    quote(&new_name),
                    Self::aggregate_call(agg_type, column)
                )
            })
            .join(", ");

        Ok(format!(
            "{output} = Table.Group(\n    {input},\n    {groups},\n    {{{aggregations}}}\n),",
            input = inputs[0],
        ))
    }
}

pub struct UnionHandler;

impl NodeHandler for UnionHandler {
    fn node_type(&self) -> &str {
        node_types::UNION
    }

    fn emit(
        &self,
        _node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        if inputs.len() < 2 {
            return Err(NodeError::input_count("Union", "at least 2 inputs", inputs.len()));
        }
        Ok(format!(
            "{output} = Table.Combine(\n    {{{}}}\n),",
            inputs.join(", ")
        ))
    }
}

pub struct PivotHandler;

impl NodeHandler for PivotHandler {
    fn node_type(&self) -> &str {
        node_types::PIVOT
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        require_inputs(inputs, 1, "Pivot")?;
        let requirement = NodeError::MissingRequirement {
            operation: "Pivot",
            requirement: "pivotColumn and valueColumn",
        };
        let pivot = non_empty(node.pivot_column.as_deref().map(strip_brackets))
            .ok_or_else(|| requirement.clone())?;
        let value =
            non_empty(node.value_column.as_deref().map(strip_brackets)).ok_or(requirement)?;
        let input = &inputs[0];

        if node.pivot_type.as_deref().unwrap_or("columns") == "columns" {
            Ok(format!(
                "{output} = Table.Pivot(\n    {input},\n    List.Distinct(Table.Column({input}, {pivot_name})),\n    {pivot_name},\n    {value_name},\n    List.Sum\n),",
                pivot_name = quote(pivot),
                value_name = quote(value),
            ))
        } else {
            let columns = quoted_list(node.value_columns.iter().map(|c| strip_brackets(c)));
            Ok(format!(
                "{output} = Table.Unpivot(\n    {input},\n    {columns},\n    {pivot_name},\n    {value_name}\n),",
                pivot_name = quote(pivot),
                value_name = quote(value),
            ))
        }
    }
}

pub struct FilterHandler;

impl NodeHandler for FilterHandler {
    fn node_type(&self) -> &str {
        node_types::FILTER
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        _ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        require_inputs(inputs, 1, "Filter")?;
        let condition =
            non_empty(node.filter_expression.as_deref()).ok_or(NodeError::MissingRequirement {
                operation: "Filter",
                requirement: "filterExpression",
            })?;
        Ok(format!(
            "{output} = Table.SelectRows(\n    {input},\n    each {condition}\n),",
            input = inputs[0],
            condition = translate_expression(condition),
        ))
    }
}

/// Compiles a container by threading its input through each nested step.
///
/// Steps run in the order they are declared in the container, not in a
/// dependency order of their own. Step handlers come from the compiler's
/// registry, so type aliases and custom handlers apply inside containers too.
/// A context created outside a compiler run falls back to the built-in steps.
pub struct ContainerHandler {
    steps: HandlerRegistry,
}

impl ContainerHandler {
    pub fn new() -> Self {
        let mut steps = HandlerRegistry::new();
        register_step_handlers(&mut steps);
        Self { steps }
    }
}

impl Default for ContainerHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeHandler for ContainerHandler {
    fn node_type(&self) -> &str {
        node_types::CONTAINER
    }

    fn emit(
        &self,
        node: &Node,
        output: &str,
        inputs: &[String],
        ctx: &mut CompilationContext<'_>,
    ) -> Result<String, NodeError> {
        require_inputs(inputs, 1, "Container")?;
        let mut lines = vec![format!("// Container: {}", output)];
        let mut current = inputs[0].clone();

        let sub_nodes = node.loom_container.iter().flat_map(|c| c.nodes.iter());
        for sub_node in sub_nodes {
            let handler = ctx
                .step_handler(&sub_node.node_type)
                .or_else(|| self.steps.get(&sub_node.node_type).map(|h| &**h));
            let Some(handler) = handler else {
                lines.push(format!(
                    "// Warning: No handler for sub-node type {} in {}",
                    sub_node.node_type, output
                ));
                continue;
            };
            let step_output = ctx.claim(&sub_node.id, &sub_node.display_name());
            let fragment = handler.emit(sub_node, &step_output, &[current], ctx)?;
            lines.push(fragment);
            current = step_output;
        }

        lines.push(format!("{} = {},", output, current));
        Ok(lines.join("\n"))
    }
}
