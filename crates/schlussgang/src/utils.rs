use std::fmt::Display;

/// Upper bound on URL variants tried for a single name.
pub const MAX_CANDIDATES: usize = 5;

fn fold_char(c: char, out: &mut String) {
    match c {
        'ä' | 'à' | 'á' | 'â' | 'ã' | 'å' => out.push('a'),
        'ö' | 'ò' | 'ó' | 'ô' | 'õ' => out.push('o'),
        'ü' | 'ù' | 'ú' | 'û' => out.push('u'),
        'é' | 'è' | 'ê' | 'ë' => out.push('e'),
        'ï' | 'î' | 'í' | 'ì' => out.push('i'),
        'ç' => out.push('c'),
        'ñ' => out.push('n'),
        'ß' => out.push_str("ss"),
        _ => out.push(c),
    }
}

/// Lowercased, diacritic-folded, hyphen-joined path segment for a name.
///
/// `"Hans Müller"` becomes `"hans-muller"`.
pub fn slugify(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        fold_char(c, &mut folded);
    }
    folded.split_whitespace().collect::<Vec<_>>().join("-")
}

pub fn candidate_urls(base: &str, slug: &str, suffixes: &[String]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for suffix in suffixes.iter().take(MAX_CANDIDATES) {
        let url = format!("{base}{slug}{suffix}");
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub targets: usize,
    pub scraped: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn record(&mut self, success: bool) {
        self.targets += 1;
        if success {
            self.scraped += 1;
        } else {
            self.skipped += 1;
        }
    }
}

impl Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Targets:  {}", self.targets)?;
        writeln!(f, "  Scraped:  {}", self.scraped)?;
        writeln!(f, "  Skipped:  {}", self.skipped)
    }
}
