use clap::Parser;
use std::time::Instant;
use tflm::prelude::*;
use tracing_subscriber::EnvFilter;

/// Convert a Tableau Prep flow (TFL/JSON) to a Power Query M script
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the Tableau Prep JSON/TFL file
    input_file: String,

    /// Output file path
    #[arg(short, long, default_value = "output.pq")]
    output: String,

    /// Override the Excel workbook path detected from the flow's connections
    #[arg(long, alias = "excel")]
    source: Option<String>,

    /// Table returned by the generated script when it runs
    #[arg(long)]
    table: Option<String>,

    /// Narrate dependency resolution and per-node outcomes
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let start = Instant::now();
    let mut builder = Compiler::from_file(&cli.input_file)
        .unwrap_or_else(|e| exit_with_error(&e.to_string()))
        .with_debug(cli.debug);
    if let Some(source) = cli.source {
        builder = builder.with_source_path(source);
    }
    if let Some(table) = cli.table {
        builder = builder.with_selected_table(table);
    }

    let compiled = builder
        .build()
        .compile()
        .unwrap_or_else(|e| exit_with_error(&format!("Conversion failed: {}", e)));
    compiled
        .write_to(&cli.output)
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));

    for diagnostic in &compiled.diagnostics {
        tracing::warn!("{}", diagnostic);
    }
    println!("Successfully converted to {}", cli.output);
    println!("Using Excel file: {}", compiled.source_path);
    println!(
        "{} tables bound, {} diagnostics, in {:?}",
        compiled.tables.len(),
        compiled.diagnostics.len(),
        start.elapsed()
    );
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "tflm=info" } else { "tflm=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    // A second subscriber can only fail to install if one already exists.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
