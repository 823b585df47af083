//! icalfilter: filter a local iCalendar file.

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use icalfilter::Calendar;
use icalfilter::calendar::cutoff_for_months;

/// Drop events that ended more than N months ago from an iCalendar file.
#[derive(Parser)]
#[command(name = "icalfilter")]
#[command(version = icalfilter::PKG_VERSION)]
struct Args {
    /// Input file ("-" or omitted for stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file ("-" or omitted for stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Months of past events to keep.
    #[arg(short, long, default_value_t = 3)]
    months: u32,
}

/// `None` for the stdin/stdout placeholder.
fn real_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| p.as_os_str() != "-")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut calendar = match real_path(args.input) {
        Some(path) => Calendar::open(&path)?,
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Calendar::parse(&source)?
        }
    };

    calendar.filter_before(cutoff_for_months(chrono::Utc::now(), args.months));
    let result = calendar.to_ics();

    match real_path(args.output) {
        Some(path) => std::fs::write(path, result)?,
        None => std::io::stdout().write_all(result.as_bytes())?,
    }

    Ok(())
}
