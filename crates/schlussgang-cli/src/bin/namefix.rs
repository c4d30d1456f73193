use std::path::PathBuf;
use std::process;

use clap::Parser;
use clap::error::ErrorKind;
use log::LevelFilter;
use schlussgang::normalize::normalize_file;

/// Transliterates umlauts and moves surnames to the front of a names list.
/// Lines mentioning "portrait" are dropped.
#[derive(Parser)]
#[command(name = "namefix")]
struct Cli {
    #[arg(value_name = "INPUT_FILE", help = "Names file to read, one name per line")]
    input: PathBuf,

    #[arg(value_name = "OUTPUT_FILE", help = "File to write the normalized names to")]
    output: PathBuf,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::try_parse().unwrap_or_else(|e| {
        if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            e.exit();
        }
        // clap's message already ends with the usage line
        let _ = e.print();
        process::exit(1);
    });

    match normalize_file(&cli.input, &cli.output) {
        Ok(written) => println!(
            "Processing complete. {} name(s) saved to {}.",
            written,
            cli.output.display()
        ),
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    }
}
