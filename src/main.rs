use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use shipstats::{Filter, RecordSet, Report, Schema};

/// Ranks shipment records by category share and by total sales.
///
/// Reads a CSV export of shipment records, works out what proportion of each
/// state's orders are technology orders, and ranks cities by total sales,
/// both restricted to First Class shipments, then writes the rankings to a
/// text file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the shipment records CSV file
    #[arg(default_value = "SampleSuperstore.csv")]
    input: PathBuf,

    /// Path to write the report to (replaced if it exists)
    #[arg(short, long, default_value = "project1_output.txt", value_name = "FILE")]
    output: PathBuf,

    /// CSV file of `group,pattern,type` rules describing the input columns
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Column to group the category share by
    #[arg(long, default_value = "State")]
    ratio_by: String,

    /// Column holding the category to measure the share of
    #[arg(long, default_value = "Category")]
    category_column: String,

    /// Category whose share is measured
    #[arg(long, default_value = "Technology")]
    target: String,

    /// Column to group sales totals by
    #[arg(long, default_value = "City")]
    sum_by: String,

    /// Numeric column to total
    #[arg(long, default_value = "Sales")]
    sum_column: String,

    /// Column to restrict both rankings by
    #[arg(long, default_value = "Ship Mode")]
    filter_column: String,

    /// Value the filter column must have (case and whitespace are ignored)
    #[arg(long, default_value = "First Class")]
    filter_value: String,

    /// Rank every row, ignoring the filter
    #[arg(long)]
    no_filter: bool,

    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialised");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let schema = match &args.schema {
        Some(path) => Schema::read_csv(path)?,
        None => Schema::superstore()?,
    };
    let records = RecordSet::read_csv(&args.input, &schema)?;
    info!(
        rows = records.len(),
        dropped = records.dropped(),
        "read {}",
        args.input.display()
    );
    let filter = (!args.no_filter).then(|| Filter::new(&args.filter_column, &args.filter_value));
    let ratio = records.ratio_by(
        &args.ratio_by,
        &args.category_column,
        &args.target,
        filter.as_ref(),
    )?;
    let total = records.sum_by(&args.sum_by, &args.sum_column, filter.as_ref())?;
    let path = Report::new(ratio, total).write(&args.output)?;
    println!("{}", path.display());
    Ok(())
}
