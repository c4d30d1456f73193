use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::types::SubjectRecord;

pub(crate) const BODY_CSS: &str = "body";
pub(crate) const TABLE_CSS: &str = "tbody";
pub(crate) const TABLE_OR_BANNER_CSS: &str = "tbody, .alert-danger";

static SEL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: link"));
static SEL_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("invalid selector: heading"));
static SEL_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(TABLE_CSS).expect("invalid selector: table"));
static SEL_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("invalid selector: row"));
static SEL_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("invalid selector: label cell"));
static SEL_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("invalid selector: value cell"));
static SEL_BANNER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".alert-danger").expect("invalid selector: banner"));

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

/// True when at least one element matches `css`. An unparsable selector never matches.
pub(crate) fn has_element(html: &str, css: &str) -> bool {
    let Ok(selector) = Selector::parse(css) else {
        log::error!("Invalid selector: {}", css);
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

/// Hrefs containing `filter`, minus the listing's own `sentinel` link.
///
/// Duplicates are dropped; first-seen order is kept.
pub(crate) fn parse_portrait_links(html: &str, filter: &str, sentinel: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let matching: Vec<&str> = document
        .select(&SEL_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains(filter))
        .collect();
    log::debug!("Found {} potential portrait links", matching.len());

    let mut links: Vec<String> = Vec::new();
    for href in matching {
        if href == sentinel || links.iter().any(|l| l == href) {
            continue;
        }
        links.push(href.to_string());
    }
    log::debug!("Filtered to {} valid portrait links", links.len());

    links
}

pub(crate) fn has_not_found_banner(html: &str, phrase: &str) -> bool {
    Html::parse_document(html)
        .select(&SEL_BANNER)
        .any(|banner| elem_text(banner).contains(phrase))
}

/// Heading plus every complete `th`/`td` row of the first table body.
pub(crate) fn parse_portrait(html: &str, placeholder_name: &str) -> SubjectRecord {
    let document = Html::parse_document(html);

    let name = document
        .select(&SEL_HEADING)
        .next()
        .map(|h| elem_text(h).trim().to_string())
        .unwrap_or_else(|| placeholder_name.to_string());
    let mut record = SubjectRecord::new(name);

    let Some(table) = document.select(&SEL_TABLE).next() else {
        log::warn!("Table not found on the page");
        return record;
    };

    for row in table.select(&SEL_ROW) {
        let (Some(th), Some(td)) = (
            row.select(&SEL_LABEL).next(),
            row.select(&SEL_VALUE).next(),
        ) else {
            continue;
        };
        let key = elem_text(th).trim().to_string();
        let value = elem_text(td).trim().to_string();
        log::debug!("Extracted: {} - {}", key, value);
        record.insert(key, value);
    }

    record
}
