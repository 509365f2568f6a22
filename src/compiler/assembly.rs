//! Fixed sections of the generated script: the workbook loader at the top and the
//! table selection at the bottom.

use crate::script::{quote, quoted_list};
use itertools::Itertools;

const INDENT: &str = "    ";

/// Indents every line of a fragment by one level of the outer `let` block.
pub(super) fn indent(fragment: &str) -> impl Iterator<Item = String> + '_ {
    fragment.lines().map(|line| {
        if line.is_empty() {
            String::new()
        } else {
            format!("{}{}", INDENT, line)
        }
    })
}

/// The `GetSheetData` function that loads, types and cleans one sheet of the workbook.
pub(super) fn loader_function(source_path: &str, sheet_names: &[&str]) -> Vec<String> {
    let header = [
        "GetSheetData = (SelectedSheetName as text) => let".to_string(),
        "    // Load the Excel file".to_string(),
        format!(
            "    Source = Excel.Workbook(File.Contents({}), null, true),",
            quote(source_path)
        ),
        String::new(),
        "    // Filter sheets of interest".to_string(),
        format!("    SelectedSheets = {},", quoted_list(sheet_names)),
    ];
    let body = r#"    FilteredSheets = Table.SelectRows(Source, each List.Contains(SelectedSheets, [Name])),

    // Validate selected sheet exists
    TargetSheet = Table.SelectRows(FilteredSheets, each [Name] = SelectedSheetName),
    CheckSheet = if Table.IsEmpty(TargetSheet) then
        error Error.Record(
            "Sheet not found",
            "Available sheets: " & Text.Combine(FilteredSheets[Name], ", "),
            [RequestedSheet = SelectedSheetName]
        )
    else TargetSheet,

    // Extract sheet data
    SheetData = try CheckSheet{0}[Data] otherwise error Error.Record(
        "Data extraction failed",
        "Verify sheet structure",
        [SheetName = SelectedSheetName, AvailableColumns = Table.ColumnNames(CheckSheet)]
    ),

    // Promote headers and clean data
    PromotedHeaders = Table.PromoteHeaders(SheetData, [PromoteAllScalars=true]),
    ColumnsToTransform = Table.ColumnNames(PromotedHeaders),
    ChangedTypes = Table.TransformColumnTypes(
        PromotedHeaders,
        List.Transform(
            ColumnsToTransform,
            each {_,
                let
                    SampleValue = List.First(Table.Column(PromotedHeaders, _), null),
                    TypeDetect = if SampleValue = null then type text
                        else if Value.Is(SampleValue, Number.Type) then
                            if Number.Round(SampleValue) = SampleValue then Int64.Type else type number
                        else if Value.Is(SampleValue, Date.Type) then type date
                        else if Value.Is(SampleValue, DateTime.Type) then type datetime
                        else type text
                in
                    TypeDetect}
        )
    ),
    CleanedData = Table.SelectRows(ChangedTypes, each not List.Contains(Record.FieldValues(_), null)),
    FinalTable = Table.Distinct(CleanedData)
in
    FinalTable,"#;

    header
        .into_iter()
        .chain(body.lines().map(str::to_string))
        .flat_map(|line| indent(&line).collect::<Vec<_>>())
        .collect()
}

/// Binds every compiled table into one record and selects the requested one.
///
/// The selection is resolved when the script runs: an empty selection raises
/// "No sheet selected", an unknown one lists the available tables.
pub(super) fn output_section(identifiers: &[&str], selected_table: &str) -> Vec<String> {
    let mut lines = vec![String::new(), "// Create combined table set".to_string()];
    if identifiers.is_empty() {
        lines.push("CombinedTables = [],".to_string());
    } else {
        lines.push("CombinedTables = [".to_string());
        let fields = identifiers
            .iter()
            .map(|name| format!("{INDENT}{name} = {name}"))
            .join(",\n");
        lines.extend(fields.lines().map(str::to_string));
        lines.push("],".to_string());
    }

    lines.extend(
        [
            String::new(),
            "// Parameter handling".to_string(),
            format!("SelectedSheetName = {},", quote(selected_table)),
            "SelectedSheets = Record.FieldNames(CombinedTables),".to_string(),
            String::new(),
            "GetSelectedTable = if SelectedSheetName = \"\" then".to_string(),
            "    error \"No sheet selected\"".to_string(),
            "else".to_string(),
            "    try Record.Field(CombinedTables, SelectedSheetName)".to_string(),
            "    otherwise error Error.Record(".to_string(),
            "        \"Sheet not found\",".to_string(),
            "        \"Available tables: \" & Text.Combine(SelectedSheets, \", \"),".to_string(),
            "        [RequestedTable = SelectedSheetName]".to_string(),
            "    )".to_string(),
        ],
    );

    let mut section: Vec<String> = lines
        .iter()
        .flat_map(|line| indent(line).collect::<Vec<_>>())
        .collect();
    section.push("in".to_string());
    section.push(format!("{INDENT}GetSelectedTable"));
    section
}
