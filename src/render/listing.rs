//! The YAML publications listing consumed by the site's publications page.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    authors::AuthorFormatter,
    error::Result,
    normalize::{clean_bibtex_authors, expand_journal_name, latex_to_text, strip_title_link},
    record::Record,
};

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub key: String,
    pub authors: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ListingEntry {
    pub fn from_record(rec: &Record, authors: &AuthorFormatter) -> Self {
        let field = |name: &str| rec.get(name).map(latex_to_text);

        let raw_authors = clean_bibtex_authors(rec.get("author").unwrap_or_default());
        let title = strip_title_link(rec.get("title").unwrap_or_default());
        let doi = field("doi");
        let url = match &doi {
            Some(doi) => Some(format!("https://doi.org/{doi}")),
            None => field("adsurl"),
        };

        ListingEntry {
            key: rec.key.clone(),
            authors: authors.format_list(&raw_authors),
            title: latex_to_text(&title),
            year: field("year"),
            month: field("month"),
            volume: field("volume"),
            number: field("number"),
            pages: field("pages"),
            doi,
            journal: field("journal").map(|j| expand_journal_name(&j)),
            url,
        }
    }

    fn sort_key(&self) -> (i64, u32) {
        let year = self
            .year
            .as_deref()
            .and_then(|y| y.trim().parse().ok())
            .unwrap_or(0);
        let month = self.month.as_deref().map_or(0, month_number);
        (year, month)
    }
}

/// Month as 1..=12 from a full English name, a three-letter abbreviation or a number; 0 when
/// unrecognised.
pub fn month_number(month: &str) -> u32 {
    let month = month.trim().to_lowercase();
    if let Ok(n) = month.parse::<u32>() {
        return if (1..=12).contains(&n) { n } else { 0 };
    }
    MONTHS
        .iter()
        .position(|full| {
            *full == month || (month.len() == 3 && full.starts_with(month.as_str()))
        })
        .map_or(0, |i| i as u32 + 1)
}

/// Build listing entries, newest first by year then month; ties keep store order.
pub fn build(records: &[Record], authors: &AuthorFormatter) -> Vec<ListingEntry> {
    let mut entries: Vec<ListingEntry> = records
        .iter()
        .map(|r| ListingEntry::from_record(r, authors))
        .collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.sort_key()));
    entries
}

/// Full listing document: a provenance comment followed by the YAML sequence.
pub fn render(entries: &[ListingEntry], source_name: &str, today: NaiveDate) -> Result<String> {
    let mut out = format!("# Generated from {source_name} on {}\n", today.format("%Y-%m-%d"));
    if entries.is_empty() {
        out.push_str("[]\n");
    } else {
        out.push_str(&serde_yaml::to_string(entries)?);
    }
    Ok(out)
}
