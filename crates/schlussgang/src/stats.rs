use std::collections::HashMap;
use std::fmt::Display;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

pub const DEFAULT_COLUMNS: [&str; 6] = [
    "jetziger Beruf",
    "erlernter Beruf",
    "Schuhgrösse",
    "Lieblingsgetränk",
    "Grösse (cm)",
    "Gewicht (kg)",
];

/// Columns whose cells can hold several `/`-separated answers.
pub const MULTI_VALUE_COLUMNS: [&str; 4] = [
    "jetziger Beruf",
    "gelernter Beruf",
    "erlernter Beruf",
    "Lieblingsgetränk",
];

const MULTI_VALUE_SEPARATOR: char = '/';

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
}

/// A CSV file held in memory, header plus string rows.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StatsError> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;
        Self::from_csv(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StatsError> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, StatsError> {
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|r| r.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        log::debug!("Loaded {} row(s)", rows.len());
        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-empty, trimmed cells of `name`.
    pub fn column(&self, name: &str) -> Result<Vec<&str>, StatsError> {
        let index = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| StatsError::MissingColumn(name.to_string()))?;

        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frequency {
    pub value: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    Categorical {
        column: String,
        multi_value: bool,
        total: usize,
        frequencies: Vec<Frequency>,
    },
    Numeric {
        column: String,
        summary: NumericSummary,
        #[serde(skip)]
        values: Vec<f64>,
    },
}

impl ColumnStats {
    pub fn column(&self) -> &str {
        match self {
            ColumnStats::Categorical { column, .. } | ColumnStats::Numeric { column, .. } => column,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counts per distinct value, most frequent first, ties by value.
pub fn frequencies<'a>(items: impl IntoIterator<Item = &'a str>) -> (usize, Vec<Frequency>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0;
    for item in items {
        *counts.entry(item).or_default() += 1;
        total += 1;
    }

    let mut frequencies: Vec<Frequency> = counts
        .into_iter()
        .map(|(value, count)| Frequency {
            value: value.to_string(),
            count,
            percentage: round2(count as f64 / total as f64 * 100.0),
        })
        .collect();
    frequencies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

    (total, frequencies)
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

pub fn summarize(values: &[f64]) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let variance =
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    });

    Some(NumericSummary {
        count,
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

fn parse_numbers(cells: &[&str]) -> Option<Vec<f64>> {
    cells
        .iter()
        .map(|c| c.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

/// Numeric summary when every non-empty cell is a number, frequencies otherwise.
pub fn analyze_column(table: &Table, column: &str) -> Result<ColumnStats, StatsError> {
    let cells = table.column(column)?;

    if let Some(values) = parse_numbers(&cells)
        && let Some(summary) = summarize(&values)
    {
        return Ok(ColumnStats::Numeric {
            column: column.to_string(),
            summary,
            values,
        });
    }

    let multi_value = MULTI_VALUE_COLUMNS.contains(&column);
    let (total, frequencies) = if multi_value {
        frequencies(
            cells
                .iter()
                .copied()
                .flat_map(|c| c.split(MULTI_VALUE_SEPARATOR))
                .map(str::trim)
                .filter(|item| !item.is_empty()),
        )
    } else {
        frequencies(cells.iter().copied())
    };

    Ok(ColumnStats::Categorical {
        column: column.to_string(),
        multi_value,
        total,
        frequencies,
    })
}

/// Analyzes every column, failing on the first missing one.
pub fn analyze(table: &Table, columns: &[String]) -> Result<Vec<ColumnStats>, StatsError> {
    columns.iter().map(|c| analyze_column(table, c)).collect()
}

impl Display for ColumnStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics for {}:", self.column())?;
        match self {
            ColumnStats::Categorical {
                total, frequencies, ..
            } => {
                writeln!(f, "  {:<40} {:>7} {:>11}", "Value", "Count", "Percentage")?;
                for freq in frequencies {
                    writeln!(
                        f,
                        "  {:<40} {:>7} {:>10.2}%",
                        freq.value, freq.count, freq.percentage
                    )?;
                }
                write!(f, "  {:<40} {:>7}", "Total", total)
            }
            ColumnStats::Numeric { summary, .. } => {
                writeln!(f, "  count  {:>10}", summary.count)?;
                writeln!(f, "  mean   {:>10.2}", summary.mean)?;
                match summary.std {
                    Some(std) => writeln!(f, "  std    {:>10.2}", std)?,
                    None => writeln!(f, "  std    {:>10}", "NaN")?,
                }
                writeln!(f, "  min    {:>10.2}", summary.min)?;
                writeln!(f, "  25%    {:>10.2}", summary.q25)?;
                writeln!(f, "  50%    {:>10.2}", summary.median)?;
                writeln!(f, "  75%    {:>10.2}", summary.q75)?;
                write!(f, "  max    {:>10.2}", summary.max)
            }
        }
    }
}
