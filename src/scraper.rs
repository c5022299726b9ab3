use crate::{Result, ScraperError};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Labels that mark the start of the next field when scanning page text.
const NEXT_FIELD_INDICATORS: [&str; 7] = [
    "Mounting Position:",
    "Catalog Number:",
    "Voltage Class",
    "BIL (kV):",
    "Application",
    "Current Rating",
    "ABB Style Number:",
];

/// How far past a label the text scan looks for its value.
const FIELD_SCAN_CHARS: usize = 300;

/// A label contained in a longer cell must cover more than this share of the cell text.
const PARTIAL_MATCH_RATIO: f64 = 0.7;

/// The `LabelScraper` struct extracts labeled values from vendor pages.
/// It looks labels up in table cells or in the flattened page text.
pub struct LabelScraper {
    /// Selects every table row.
    rows: Selector,
    /// Selects the cells of a row.
    cells: Selector,
    /// Selects every link.
    links: Selector,
}

impl LabelScraper {
    /// Creates a new `LabelScraper`.
    ///
    /// # Returns
    ///
    /// A `Result` containing the scraper, or an extraction error if a selector fails to parse.
    pub fn new() -> Result<Self> {
        Ok(Self {
            rows: parse_selector("tr")?,
            cells: parse_selector("td, th")?,
            links: parse_selector("a")?,
        })
    }

    /// Extracts the value of a label from the page's tables.
    ///
    /// A cell matches when its text equals the label, or contains it and the label is longer
    /// than 70% of the cell text; the value is then the next cell of the row. Failing that,
    /// a cell of the form `label: value` yields the text after the first colon.
    ///
    /// # Arguments
    ///
    /// * `document` - The parsed HTML document.
    /// * `label` - The label text to search for (e.g. `"Style Number:"`).
    ///
    /// # Returns
    ///
    /// The value with whitespace collapsed, or an empty string when the label is absent.
    pub fn table_value(&self, document: &Html, label: &str) -> String {
        for row in document.select(&self.rows) {
            let cells: Vec<ElementRef> = row.select(&self.cells).collect();

            for (i, cell) in cells.iter().enumerate() {
                let cell_text = element_text(cell);

                if label_matches(label, &cell_text) {
                    if let Some(value_cell) = cells.get(i + 1) {
                        return element_text(value_cell);
                    }
                }

                if cell_text.contains(label) {
                    if let Some((before, after)) = cell_text.split_once(':') {
                        if before.contains(label) {
                            return after.trim().to_string();
                        }
                    }
                }
            }
        }

        String::new()
    }

    /// Tries each label in turn and returns the first non-empty table value.
    pub fn first_table_value(&self, document: &Html, labels: &[&str]) -> String {
        labels
            .iter()
            .map(|label| self.table_value(document, label))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    /// Finds the first link whose text looks like an identifier and whose parent markup
    /// mentions any of `context_markers`.
    ///
    /// A link text qualifies when it is longer than five characters and contains a digit.
    pub fn identifier_link(&self, document: &Html, context_markers: &[&str]) -> Option<String> {
        document.select(&self.links).find_map(|link| {
            let text = link.text().collect::<String>();
            let text = text.trim();

            if text.chars().count() <= 5 || !text.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }

            let parent_markup = link.parent().and_then(ElementRef::wrap)?.html();
            context_markers
                .iter()
                .any(|marker| parent_markup.contains(marker))
                .then(|| text.to_string())
        })
    }
}

/// Flattens the document into its text content, the way a browser's `textContent` would,
/// leaving out script and style bodies.
pub fn page_text(document: &Html) -> String {
    let mut text = String::new();

    for node in document.root_element().descendants() {
        if let Node::Text(fragment) = node.value() {
            let in_code = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|e| e.name()))
                .map_or(false, |name| name == "script" || name == "style");
            if !in_code {
                text.push_str(fragment);
            }
        }
    }

    text
}

/// Extracts the value following a label in flattened page text.
///
/// Looks at the 300 characters after the first occurrence of the label and cuts them at the
/// earliest next-field indicator.
///
/// # Arguments
///
/// * `text` - The page text.
/// * `label` - The label to find (e.g. `"Original Bushing Manufacturer:"`).
///
/// # Returns
///
/// The value with whitespace collapsed, or an empty string when the label is absent.
pub fn extract_field_value(text: &str, label: &str) -> String {
    let Some(pos) = text.find(label) else {
        return String::new();
    };

    let remaining = take_chars(&text[pos + label.len()..], FIELD_SCAN_CHARS);
    let end = NEXT_FIELD_INDICATORS
        .iter()
        .filter_map(|indicator| remaining.find(indicator))
        .min()
        .unwrap_or(remaining.len());

    normalize_whitespace(&remaining[..end])
}

/// Returns the first line after `label` inside `section` that is not empty and contains
/// none of the `excluded` words.
pub fn first_clean_line_after(section: &str, label: &str, excluded: &[&str]) -> Option<String> {
    let pos = section.find(label)?;
    section[pos + label.len()..]
        .trim()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !excluded.iter().any(|word| line.contains(word)))
        .map(str::to_string)
}

/// Returns the text between the first occurrence of `start` and the first occurrence of `end`.
///
/// Empty when either marker is missing or `end` comes first.
pub fn section_between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    match (text.find(start), text.find(end)) {
        (Some(from), Some(to)) if from <= to => &text[from..to],
        _ => "",
    }
}

/// Returns at most `max_chars` characters of `text` starting at the first occurrence of `marker`.
pub fn window_from<'a>(text: &'a str, marker: &str, max_chars: usize) -> Option<&'a str> {
    text.find(marker)
        .map(|pos| take_chars(&text[pos..], max_chars))
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the prefix of `text` holding at most `max_chars` characters.
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn label_matches(label: &str, cell_text: &str) -> bool {
    label == cell_text
        || (cell_text.contains(label)
            && label.chars().count() as f64 > cell_text.chars().count() as f64 * PARTIAL_MATCH_RATIO)
}

fn element_text(element: &ElementRef) -> String {
    let joined = element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_whitespace(&joined)
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScraperError::ExtractionError(format!("invalid selector '{}': {}", selector, e)))
}
