mod logging;

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use schlussgang::browser::{BrowserKind, WebDriverOptions};
use schlussgang::stats::{DEFAULT_COLUMNS, Table, analyze};
use schlussgang::{
    Browser, HttpBrowser, PortraitScraper, ResultSet, ScrapeConfig, WebDriverBrowser, chart,
    csv_out,
};

#[derive(Parser)]
#[command(name = "schlussgang")]
#[command(about = "A schlussgang.ch portrait scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the console logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long = "log-file",
        default_value = "schlussgang_scraper.log",
        global = true,
        help = "Run log file, rewritten on every run at debug level"
    )]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum Backend {
    /// A WebDriver endpoint such as geckodriver or chromedriver
    Webdriver,
    /// Plain HTTP requests, no script execution
    Http,
}

#[derive(Debug, Clone, ValueEnum)]
enum BrowserName {
    Firefox,
    Chrome,
}

impl From<BrowserName> for BrowserKind {
    fn from(name: BrowserName) -> Self {
        match name {
            BrowserName::Firefox => BrowserKind::Firefox,
            BrowserName::Chrome => BrowserKind::Chrome,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct BrowserArgs {
    #[arg(
        long,
        value_enum,
        default_value = "webdriver",
        help = "How pages are loaded"
    )]
    backend: Backend,

    #[arg(
        long,
        default_value = "http://localhost:4444",
        help = "WebDriver endpoint"
    )]
    webdriver_url: String,

    #[arg(
        long = "browser",
        value_enum,
        default_value = "firefox",
        help = "Browser to drive"
    )]
    kind: BrowserName,

    #[arg(long, help = "Run the browser without a window")]
    headless: bool,

    #[arg(long, help = "Site root used to resolve relative links")]
    site_root: Option<String>,

    #[arg(
        long,
        value_name = "MILLIS",
        help = "Pause between portraits [default: 1000 for scrape, 2000 for names]"
    )]
    delay_ms: Option<u64>,

    #[arg(
        long,
        default_value_t = 50,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Maximum scrolls while waiting for the listing to stop growing"
    )]
    max_scrolls: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// List the portrait links found on the listing page
    Discover {
        #[command(flatten)]
        browser: BrowserArgs,

        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Scrape every portrait linked from the listing page into a CSV file
    Scrape {
        #[command(flatten)]
        browser: BrowserArgs,

        #[arg(
            short = 'o',
            long = "output",
            default_value = "schlussgang_portraits.csv",
            help = "CSV file to write"
        )]
        output: PathBuf,

        #[arg(
            long,
            help = "Only scrape the first N discovered portraits",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        limit: Option<u16>,

        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            help = "Also print the scraped records in this format"
        )]
        format: Option<OutputFormat>,
    },
    /// Scrape the portraits of the names listed in a file into a CSV file
    Names {
        #[arg(help = "Names file, one name per line")]
        names_file: PathBuf,

        #[command(flatten)]
        browser: BrowserArgs,

        #[arg(
            short = 'o',
            long = "output",
            default_value = "schlussgang_portraits.csv",
            help = "CSV file to write"
        )]
        output: PathBuf,

        #[arg(
            long = "suffix",
            value_name = "SUFFIX",
            help = "URL suffix tried after the bare name, repeatable [default: -0]"
        )]
        suffixes: Vec<String>,

        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            help = "Also print the scraped records in this format"
        )]
        format: Option<OutputFormat>,
    },
    /// Summarize columns of a scraped CSV file and draw one chart per column
    Stats {
        #[arg(help = "CSV file produced by scrape or names")]
        input: PathBuf,

        #[arg(
            short = 'c',
            long = "column",
            value_name = "COLUMN",
            help = "Column to summarize, repeatable [default: the standard portrait columns]"
        )]
        columns: Vec<String>,

        #[arg(
            long,
            default_value = ".",
            help = "Directory the SVG charts are written to"
        )]
        out_dir: PathBuf,

        #[arg(long, help = "Skip chart rendering")]
        no_charts: bool,

        #[arg(
            short = 'f',
            long = "format",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn build_config(args: &BrowserArgs, default_delay: Duration) -> ScrapeConfig {
    let mut config = ScrapeConfig {
        max_scrolls: args.max_scrolls,
        request_delay: args
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or(default_delay),
        ..Default::default()
    };
    if let Some(site_root) = &args.site_root {
        config.site_root = site_root.trim_end_matches('/').to_string();
    }
    config
}

async fn open_browser(args: &BrowserArgs, config: &ScrapeConfig) -> Box<dyn Browser> {
    match args.backend {
        Backend::Webdriver => {
            let options = WebDriverOptions {
                endpoint: args.webdriver_url.clone(),
                kind: args.kind.clone().into(),
                headless: args.headless,
                page_load_timeout: config.page_timeout,
            };
            let browser = WebDriverBrowser::connect(&options)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Could not start the WebDriver session: {}", e);
                    process::exit(1);
                });
            Box::new(browser)
        }
        Backend::Http => {
            let browser = HttpBrowser::new(config.page_timeout).unwrap_or_else(|e| {
                log::error!("Error creating HTTP client: {}", e);
                process::exit(1);
            });
            Box::new(browser)
        }
    }
}

async fn start_scraper(args: &BrowserArgs, config: ScrapeConfig) -> PortraitScraper {
    let config = config.validate().unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });
    let browser = open_browser(args, &config).await;
    PortraitScraper::new(browser, config)
}

/// Runs `work` unless Ctrl-C arrives first.
async fn until_interrupted<T>(work: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        output = work => Some(output),
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, closing the browser session");
            None
        }
    }
}

async fn close_browser(scraper: PortraitScraper) {
    if let Err(e) = scraper.close().await {
        log::warn!("Failed to close the browser session: {}", e);
    }
}

fn format_records(results: &ResultSet, format: &OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(results),
        OutputFormat::Text => Ok(results
            .iter()
            .map(|record| record.to_string())
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn print_records(results: &ResultSet, format: &OutputFormat) {
    match format_records(results, format) {
        Ok(out) if out.is_empty() => println!("No portraits were scraped."),
        Ok(out) => println!("{}", out),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

/// Releases the browser, then reports what the run produced.
async fn finish(scraper: PortraitScraper, results: &ResultSet, output: &Path) {
    let stats = scraper.stats();
    close_browser(scraper).await;

    match csv_out::write_csv(results, output) {
        Ok(true) => log::info!(
            "{} portraits have been extracted and saved to '{}'",
            results.len(),
            output.display()
        ),
        Ok(false) => {
            log::warn!("No data was extracted. Please check the connection and website structure.")
        }
        Err(e) => {
            log::error!("Error saving {}: {}", output.display(), e);
            process::exit(1);
        }
    }
    print!("{}", stats);
}

fn read_names(path: &Path) -> Vec<String> {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        log::error!("Error reading names file {}: {}", path.display(), e);
        process::exit(1);
    });
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_file, cli.log_level.clone().into()) {
        eprintln!("Error opening log file {}: {}", cli.log_file.display(), e);
        process::exit(1);
    }

    match cli.command {
        Commands::Discover { browser, format } => {
            let config = build_config(&browser, Duration::from_secs(1));
            let mut scraper = start_scraper(&browser, config).await;
            let listing_url = scraper.config().listing_url();

            let Some(found) = until_interrupted(scraper.discover_links(&listing_url)).await else {
                close_browser(scraper).await;
                process::exit(130);
            };
            let links: Vec<String> = found.iter().map(|l| scraper.config().resolve(l)).collect();
            close_browser(scraper).await;

            match format {
                OutputFormat::Json => serialize_json(&links),
                OutputFormat::Text => {
                    if links.is_empty() {
                        println!("No portrait links found.");
                    } else {
                        for (i, link) in links.iter().enumerate() {
                            println!("{:>4}. {}", i + 1, link);
                        }
                    }
                }
            }
        }

        Commands::Scrape {
            browser,
            output,
            limit,
            format,
        } => {
            let config = build_config(&browser, Duration::from_secs(1));
            let mut scraper = start_scraper(&browser, config).await;

            let Some(results) =
                until_interrupted(scraper.run_discovery(limit.map(usize::from))).await
            else {
                close_browser(scraper).await;
                process::exit(130);
            };
            if let Some(format) = &format {
                print_records(&results, format);
            }
            finish(scraper, &results, &output).await;
        }

        Commands::Names {
            names_file,
            browser,
            output,
            suffixes,
            format,
        } => {
            let names = read_names(&names_file);
            log::info!("Read {} name(s) from {}", names.len(), names_file.display());

            let mut config = build_config(&browser, Duration::from_secs(2));
            if !suffixes.is_empty() {
                config.name_suffixes = std::iter::once(String::new()).chain(suffixes).collect();
            }
            let mut scraper = start_scraper(&browser, config).await;

            let Some(results) = until_interrupted(scraper.run_name_list(&names)).await else {
                close_browser(scraper).await;
                process::exit(130);
            };
            if let Some(format) = &format {
                print_records(&results, format);
            }
            finish(scraper, &results, &output).await;
        }

        Commands::Stats {
            input,
            columns,
            out_dir,
            no_charts,
            format,
        } => {
            let columns: Vec<String> = if columns.is_empty() {
                DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
            } else {
                columns
            };

            let table = Table::from_path(&input).unwrap_or_else(|e| {
                log::error!("Error reading {}: {}", input.display(), e);
                process::exit(1);
            });
            log::info!("Loaded {} row(s) from {}", table.len(), input.display());

            let summaries = analyze(&table, &columns).unwrap_or_else(|e| {
                log::error!("Error computing statistics: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&summaries),
                OutputFormat::Text => {
                    for summary in &summaries {
                        println!("{}", summary);
                    }
                }
            }

            if !no_charts {
                if let Err(e) = fs::create_dir_all(&out_dir) {
                    log::error!("Error creating {}: {}", out_dir.display(), e);
                    process::exit(1);
                }
                for summary in &summaries {
                    if let Err(e) = chart::write_chart(summary, &out_dir) {
                        log::error!("Error writing chart for {}: {}", summary.column(), e);
                        process::exit(1);
                    }
                }
                println!("\nCharts have been saved to {}", out_dir.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schlussgang::SubjectRecord;

    fn results() -> ResultSet {
        let mut wicki = SubjectRecord::new("Joel Wicki");
        wicki.insert("Wohnort", "Sörenberg");
        let mut giger = SubjectRecord::new("Samuel Giger");
        giger.insert("Grösse (cm)", "193");
        vec![wicki, giger].into_iter().collect()
    }

    #[test]
    fn test_scrape_accepts_record_format() {
        let cli = Cli::try_parse_from(["schlussgang", "scrape", "-f", "json", "--limit", "3"]).unwrap();
        match cli.command {
            Commands::Scrape { format, limit, .. } => {
                assert!(matches!(format, Some(OutputFormat::Json)));
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_names_record_format_is_optional() {
        let cli = Cli::try_parse_from(["schlussgang", "names", "names.txt"]).unwrap();
        match cli.command {
            Commands::Names { format, suffixes, .. } => {
                assert!(format.is_none());
                assert!(suffixes.is_empty());
            }
            _ => panic!("expected names"),
        }
    }

    #[test]
    fn test_records_as_json_array() {
        let json = format_records(&results(), &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["Name"], "Joel Wicki");
        assert_eq!(value[0]["Wohnort"], "Sörenberg");
        assert_eq!(value[1]["Grösse (cm)"], "193");
    }

    #[test]
    fn test_records_as_text() {
        let text = format_records(&results(), &OutputFormat::Text).unwrap();

        assert!(text.contains("┌─ Joel Wicki"));
        assert!(text.contains("│  Wohnort: Sörenberg"));
        assert!(text.contains("┌─ Samuel Giger"));
        assert_eq!(text.matches("field(s)").count(), 2);
    }

    #[test]
    fn test_empty_results_format_to_nothing() {
        assert_eq!(format_records(&ResultSet::new(), &OutputFormat::Text).unwrap(), "");
        assert_eq!(format_records(&ResultSet::new(), &OutputFormat::Json).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_finished_work_is_not_interrupted() {
        assert_eq!(until_interrupted(async { 42 }).await, Some(42));
    }
}
