use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const UMLAUTS: [(char, &str); 6] = [
    ('ü', "ue"),
    ('ä', "ae"),
    ('ö', "oe"),
    ('Ü', "Ue"),
    ('Ä', "Ae"),
    ('Ö', "Oe"),
];

const DROP_MARKER: &str = "portrait";

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

pub fn transliterate_umlauts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match UMLAUTS.iter().find(|(u, _)| *u == c) {
            Some((_, digraph)) => out.push_str(digraph),
            None => out.push(c),
        }
    }
    out
}

/// `None` for lines mentioning "portrait" (any case); otherwise the
/// transliterated line with its last word moved to the front.
///
/// Lines of fewer than two words keep their original spacing.
pub fn normalize_line(line: &str) -> Option<String> {
    if line.to_lowercase().contains(DROP_MARKER) {
        return None;
    }

    let line = transliterate_umlauts(line);
    let mut words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 2 {
        return Some(line);
    }
    if let Some(last) = words.pop() {
        words.insert(0, last);
    }
    Some(words.join(" "))
}

/// Normalizes `input` line by line into `output`, returning the number of lines written.
///
/// Any read error, including invalid UTF-8, aborts the run.
pub fn normalize_file(input: &Path, output: &Path) -> Result<usize, NormalizeError> {
    let read_err = |source| NormalizeError::Read {
        path: input.display().to_string(),
        source,
    };
    let write_err = |source| NormalizeError::Write {
        path: output.display().to_string(),
        source,
    };

    let reader = BufReader::new(File::open(input).map_err(read_err)?);
    let mut writer = BufWriter::new(File::create(output).map_err(write_err)?);

    let mut written = 0;
    for line in reader.lines() {
        let line = line.map_err(read_err)?;
        match normalize_line(&line) {
            Some(normalized) => {
                writeln!(writer, "{}", normalized).map_err(write_err)?;
                written += 1;
            }
            None => log::debug!("Dropped line: {}", line),
        }
    }
    writer.flush().map_err(write_err)?;

    log::info!("Wrote {} line(s) to {}", written, output.display());
    Ok(written)
}
