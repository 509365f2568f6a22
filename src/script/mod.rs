//! Pure text helpers shared by the node handlers.

pub mod expression;
pub mod names;
pub mod types;

pub use expression::translate_expression;
pub use names::sanitize_name;
pub use types::{ColumnType, detect_column_type};

/// Quotes `text` as an M string literal. M escapes `"` by doubling it.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Renders `{"a", "b"}` from a list of column names.
pub fn quoted_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted = itertools::join(items.into_iter().map(|s| quote(s.as_ref())), ", ");
    format!("{{{}}}", quoted)
}

/// Strips the `[...]` decoration Prep puts around field references.
pub fn strip_brackets(field: &str) -> &str {
    field.trim_matches(|c| c == '[' || c == ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn renders_lists() {
        assert_eq!(quoted_list(["A", "B"]), r#"{"A", "B"}"#);
        assert_eq!(quoted_list(Vec::<String>::new()), "{}");
    }

    #[test]
    fn strips_only_outer_brackets() {
        assert_eq!(strip_brackets("[Order ID]"), "Order ID");
        assert_eq!(strip_brackets("Region"), "Region");
        assert_eq!(strip_brackets("[[x]]"), "x");
    }
}
