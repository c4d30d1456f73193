use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

/// Dependencies that are chatty at debug level.
const QUIET_MODULES: [&str; 5] = ["html5ever", "selectors", "hyper", "hyper_util", "reqwest"];

/// Sends every record to the run log file and, at a coarser level, to stderr.
struct RunLogger {
    file: Logger,
    console: Logger,
}

impl RunLogger {
    fn max_level(&self) -> LevelFilter {
        self.file.filter().max(self.console.filter())
    }
}

impl Log for RunLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file.enabled(metadata) || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        self.file.log(record);
        self.console.log(record);
    }

    fn flush(&self) {
        self.file.flush();
        self.console.flush();
    }
}

fn builder(level: LevelFilter) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(level);
    if level > LevelFilter::Warn {
        for module in QUIET_MODULES {
            builder.filter_module(module, LevelFilter::Warn);
        }
    }
    builder
}

fn run_logger(
    file: Box<dyn Write + Send>,
    console: Target,
    console_level: LevelFilter,
) -> RunLogger {
    RunLogger {
        file: builder(LevelFilter::Debug)
            .target(Target::Pipe(file))
            .write_style(WriteStyle::Never)
            .build(),
        console: builder(console_level).target(console).build(),
    }
}

/// Truncates `log_file` and installs the global logger.
pub fn init(log_file: &Path, console_level: LevelFilter) -> io::Result<()> {
    let file = File::create(log_file)?;
    let logger = run_logger(Box::new(file), Target::Stderr, console_level);

    let max_level = logger.max_level();
    log::set_boxed_logger(Box::new(logger)).map_err(io::Error::other)?;
    log::set_max_level(max_level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn emit(logger: &RunLogger, level: Level, target: &str, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(format_args!("{}", message))
                .build(),
        );
        logger.flush();
    }

    fn logger_with_buffers(console_level: LevelFilter) -> (RunLogger, SharedBuf, SharedBuf) {
        let file = SharedBuf::default();
        let console = SharedBuf::default();
        let logger = run_logger(
            Box::new(file.clone()),
            Target::Pipe(Box::new(console.clone())),
            console_level,
        );
        (logger, file, console)
    }

    #[test]
    fn test_debug_reaches_file_only() {
        let (logger, file, console) = logger_with_buffers(LevelFilter::Info);

        emit(&logger, Level::Debug, "schlussgang::scraper", "Scroll height 4200");

        assert!(file.contents().contains("Scroll height 4200"));
        assert!(!console.contents().contains("Scroll height 4200"));
    }

    #[test]
    fn test_info_reaches_both() {
        let (logger, file, console) = logger_with_buffers(LevelFilter::Info);

        emit(&logger, Level::Info, "schlussgang::scraper", "Scraped Joel Wicki");

        assert!(file.contents().contains("Scraped Joel Wicki"));
        assert!(console.contents().contains("Scraped Joel Wicki"));
    }

    #[test]
    fn test_console_level_is_respected() {
        let (logger, file, console) = logger_with_buffers(LevelFilter::Error);

        emit(&logger, Level::Warn, "schlussgang::csv_out", "No data was extracted");

        assert!(file.contents().contains("No data was extracted"));
        assert!(console.contents().is_empty());
    }

    #[test]
    fn test_dependency_debug_is_quiet() {
        let (logger, file, _console) = logger_with_buffers(LevelFilter::Info);

        emit(&logger, Level::Debug, "html5ever::tree_builder", "noisy parser detail");
        emit(&logger, Level::Warn, "html5ever::tree_builder", "parser warning");

        assert!(!file.contents().contains("noisy parser detail"));
        assert!(file.contents().contains("parser warning"));
    }

    #[test]
    fn test_max_level_covers_file() {
        let (logger, _, _) = logger_with_buffers(LevelFilter::Warn);
        assert_eq!(logger.max_level(), LevelFilter::Debug);

        let (logger, _, _) = logger_with_buffers(LevelFilter::Trace);
        assert_eq!(logger.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_init_truncates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "previous run\n").unwrap();

        init(&path, LevelFilter::Off).unwrap();
        log::debug!("fresh run");
        log::logger().flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("previous run"));
        assert!(contents.contains("fresh run"));
    }
}
