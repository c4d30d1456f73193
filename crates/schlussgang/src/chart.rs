use std::path::{Path, PathBuf};

use crate::stats::ColumnStats;

pub const TOP_MULTI_VALUE_BARS: usize = 15;
pub const HISTOGRAM_BINS: usize = 20;

const WIDTH: f64 = 1400.0;
const HEIGHT: f64 = 800.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 70.0;
const MARGIN_BOTTOM: f64 = 220.0;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn chart_file_name(column: &str) -> String {
    format!("{}_distribution.svg", column.replace(' ', "_"))
}

fn frame(title: &str, x_label: &str, y_label: &str) -> String {
    let plot_bottom = HEIGHT - MARGIN_BOTTOM;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">
<rect width="100%" height="100%" fill="white"/>
<text x="{}" y="35" font-size="22" text-anchor="middle">{}</text>
"#,
        WIDTH / 2.0,
        escape(title)
    );
    svg.push_str(&format!(
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{plot_bottom}" stroke="black"/>
<line x1="{MARGIN_LEFT}" y1="{plot_bottom}" x2="{}" y2="{plot_bottom}" stroke="black"/>
<text x="{}" y="{}" font-size="16" text-anchor="middle">{}</text>
<text x="25" y="{}" font-size="16" text-anchor="middle" transform="rotate(-90 25 {})">{}</text>
"#,
        WIDTH - MARGIN_RIGHT,
        (MARGIN_LEFT + WIDTH - MARGIN_RIGHT) / 2.0,
        HEIGHT - 20.0,
        escape(x_label),
        (MARGIN_TOP + plot_bottom) / 2.0,
        (MARGIN_TOP + plot_bottom) / 2.0,
        escape(y_label)
    ));
    svg
}

/// Bars scaled to the tallest one, each labelled with its count.
pub fn bar_chart(title: &str, x_label: &str, bars: &[(String, usize)]) -> String {
    bars_svg(title, x_label, "Count", bars)
}

fn bars_svg(title: &str, x_label: &str, y_label: &str, bars: &[(String, usize)]) -> String {
    let mut svg = frame(title, x_label, y_label);
    let plot_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let plot_bottom = HEIGHT - MARGIN_BOTTOM;
    let max = bars.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;
    let slot = plot_width / bars.len().max(1) as f64;

    for (i, (label, count)) in bars.iter().enumerate() {
        let bar_height = *count as f64 / max * plot_height;
        let x = MARGIN_LEFT + i as f64 * slot + slot * 0.1;
        let y = plot_bottom - bar_height;
        let center = x + slot * 0.4;
        svg.push_str(&format!(
            r#"<rect x="{x:.1}" y="{y:.1}" width="{:.1}" height="{bar_height:.1}" fill="steelblue"/>
<text x="{center:.1}" y="{:.1}" font-size="12" text-anchor="middle">{count}</text>
<text x="{center:.1}" y="{:.1}" font-size="12" text-anchor="end" transform="rotate(-45 {center:.1} {:.1})">{}</text>
"#,
            slot * 0.8,
            y - 5.0,
            plot_bottom + 15.0,
            plot_bottom + 15.0,
            escape(label)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Equal-width bin counts between the smallest and largest value.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in values {
        let index = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * width, min + (i + 1) as f64 * width, c))
        .collect()
}

pub fn histogram(title: &str, x_label: &str, values: &[f64], bins: usize) -> String {
    let bars: Vec<(String, usize)> = histogram_bins(values, bins)
        .into_iter()
        .map(|(lo, hi, c)| (format!("{lo:.1}–{hi:.1}"), c))
        .collect();
    bars_svg(title, x_label, "Frequency", &bars)
}

/// Bar chart for categorical stats (top entries only for multi-value
/// columns), histogram for numeric ones.
pub fn render(stats: &ColumnStats) -> String {
    let column = stats.column();
    let title = format!("Distribution of {column}");
    match stats {
        ColumnStats::Categorical {
            multi_value,
            frequencies,
            ..
        } => {
            let take = if *multi_value {
                TOP_MULTI_VALUE_BARS
            } else {
                frequencies.len()
            };
            let bars: Vec<(String, usize)> = frequencies
                .iter()
                .take(take)
                .map(|f| (f.value.clone(), f.count))
                .collect();
            bar_chart(&title, column, &bars)
        }
        ColumnStats::Numeric { values, .. } => histogram(&title, column, values, HISTOGRAM_BINS),
    }
}

/// Renders `stats` into `dir` and returns the written path.
pub fn write_chart(stats: &ColumnStats, dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(chart_file_name(stats.column()));
    std::fs::write(&path, render(stats))?;
    log::info!("Chart saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Frequency, summarize};

    fn categorical(multi_value: bool, n: usize) -> ColumnStats {
        ColumnStats::Categorical {
            column: "jetziger Beruf".to_string(),
            multi_value,
            total: n,
            frequencies: (0..n)
                .map(|i| Frequency {
                    value: format!("Beruf {i}"),
                    count: n - i,
                    percentage: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_chart_file_name() {
        assert_eq!(
            chart_file_name("jetziger Beruf"),
            "jetziger_Beruf_distribution.svg"
        );
        assert_eq!(
            chart_file_name("Grösse (cm)"),
            "Grösse_(cm)_distribution.svg"
        );
    }

    #[test]
    fn test_multi_value_chart_keeps_top_entries() {
        let svg = render(&categorical(true, 20));
        assert_eq!(svg.matches("<rect x=").count(), TOP_MULTI_VALUE_BARS);
        assert!(svg.contains("Distribution of jetziger Beruf"));

        let svg = render(&categorical(false, 20));
        assert_eq!(svg.matches("<rect x=").count(), 20);
    }

    #[test]
    fn test_labels_are_escaped() {
        let svg = bar_chart("A & B", "x", &[("<Bier>".to_string(), 3)]);
        assert!(svg.contains("A &amp; B"));
        assert!(svg.contains("&lt;Bier&gt;"));
        assert!(!svg.contains("<Bier>"));
    }

    #[test]
    fn test_histogram_bins_cover_all_values() {
        let values = [180.0, 182.0, 185.0, 190.0, 200.0];
        let bins = histogram_bins(&values, HISTOGRAM_BINS);
        assert_eq!(bins.len(), HISTOGRAM_BINS);
        assert_eq!(bins.iter().map(|(_, _, c)| c).sum::<usize>(), values.len());
        assert_eq!(bins[0].0, 180.0);
        assert_eq!(bins[HISTOGRAM_BINS - 1].2, 1, "max lands in the last bin");
    }

    #[test]
    fn test_histogram_single_value() {
        let bins = histogram_bins(&[45.0, 45.0], 4);
        assert_eq!(bins.iter().map(|(_, _, c)| c).sum::<usize>(), 2);
        assert!(histogram_bins(&[], 4).is_empty());
    }

    #[test]
    fn test_numeric_render_is_histogram() {
        let values = vec![184.0, 186.0, 190.0, 193.0];
        let stats = ColumnStats::Numeric {
            column: "Grösse (cm)".to_string(),
            summary: summarize(&values).unwrap(),
            values,
        };
        let svg = render(&stats);
        assert!(svg.contains(">Frequency<"));
        assert_eq!(svg.matches("<rect x=").count(), HISTOGRAM_BINS);
    }

    #[test]
    fn test_write_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_chart(&categorical(false, 3), dir.path()).unwrap();
        assert!(path.ends_with("jetziger_Beruf_distribution.svg"));
        assert!(std::fs::read_to_string(path).unwrap().starts_with("<svg"));
    }
}
