/// Rewrites a Prep calculation into M syntax.
///
/// This is a plain ordered text substitution, not a parser: `==` becomes `=`,
/// `&&`/`||` become `and`/`or` and every `!` becomes `not `. Field references in
/// brackets pass through unchanged. A `!=` therefore turns into `not =`.
pub fn translate_expression(expr: &str) -> String {
    expr.replace("==", "=")
        .replace("&&", " and ")
        .replace("||", " or ")
        .replace('!', "not ")
}
