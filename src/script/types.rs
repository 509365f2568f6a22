use std::fmt;

/// The M column type attached to a derived column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Number,
    DateTime,
    Logical,
    Text,
    Any,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m_type = match self {
            ColumnType::Integer => "Int64.Type",
            ColumnType::Number => "type number",
            ColumnType::DateTime => "type datetime",
            ColumnType::Logical => "type logical",
            ColumnType::Text => "type text",
            ColumnType::Any => "type any",
        };
        f.write_str(m_type)
    }
}

const WHOLE_NUMBER_HINTS: &[&str] = &["count", "quantity", "qty", "units", "revenue"];
const NUMBER_HINTS: &[&str] = &["amount", "price", "cost", "value", "total"];
const DATETIME_HINTS: &[&str] = &["date", "time", "year", "month", "day"];

/// Guesses the type of a derived column from its name and defining expression.
///
/// This is keyword matching, not type inference. Callers must tolerate the odd
/// misclassification.
pub fn detect_column_type(column_name: &str, expression: Option<&str>) -> ColumnType {
    let name = column_name.to_lowercase();

    if let Some(expr) = expression.map(str::trim).filter(|e| !e.is_empty()) {
        if is_field_product(expr) {
            return if contains_any(&name, WHOLE_NUMBER_HINTS) {
                ColumnType::Integer
            } else {
                ColumnType::Number
            };
        }
        if expr.contains(['+', '-', '*', '/', '[']) {
            return ColumnType::Number;
        }
        if expr.contains(['"', '\'', '&']) {
            return ColumnType::Text;
        }
    }

    if contains_any(&name, NUMBER_HINTS) {
        ColumnType::Number
    } else if contains_any(&name, DATETIME_HINTS) {
        ColumnType::DateTime
    } else if name.contains("flag") || name.starts_with("is_") || name.starts_with("has_") {
        ColumnType::Logical
    } else {
        ColumnType::Any
    }
}

/// `[A] * [B] * ...` with nothing but bracketed field references as factors.
fn is_field_product(expr: &str) -> bool {
    let factors: Vec<&str> = expr.split('*').map(str::trim).collect();
    factors.len() >= 2
        && factors.iter().all(|f| {
            f.len() > 2
                && f.starts_with('[')
                && f.ends_with(']')
                && !f[1..f.len() - 1].contains(['[', ']'])
        })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
