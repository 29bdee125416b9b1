//! Publication extraction from the LaTeX source of the CV.
//!
//! The CV lists refereed articles under a fixed heading, grouped by year:
//!
//! ```latex
//! \hrulefill \vspace{0.1in}\\{\large\textcolor{darkgray}{Paul O. Hayne: Refereed Journal Articles}}
//! \noindent\textcolor{darkgray}{2017}
//! \item{\small Hayne, P. O., ... (2017). Title, \textit{Journal}, 122(12), pp. 2371--2400.}
//! ```
//!
//! Older CVs put each year in its own `longtable` instead; that layout is used when the heading
//! cannot be found.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    config::CvConfig,
    error::Result,
    extract::{Extraction, KeyAllocator},
    record::Record,
};

const ITEM_MARKER: &str = r"\item{\small";
const NEXT_ITEM: &str = r"\item{";
const BLOCK_END: &str = r"\hrulefill";
const UNKNOWN_JOURNAL: &str = "Unknown Journal";

static YEAR_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\noindent\\textcolor\{darkgray\}\{(\d{4})\}").unwrap());
static LONGTABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\\noindent\s*\\begin\{longtable\}.*?\\textcolor\{darkgray\}\{(2\d{3})\}(.*?)\\end\{longtable\}",
    )
    .unwrap()
});
static ENVIRONMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:begin|end)\{[^}]*\}").unwrap());
static COMMAND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\w+").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static AUTHOR_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)\((\d{4})\)").unwrap());
static TITLE_VENUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?),\s*(.*?)(?:,|$)").unwrap());
static VOLUME_PAGES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)(?:\((\d+)\))?,\s*(?:pp\.\s*)?(\d+)--(\d+)").unwrap()
});

/// Fields recovered from one CV item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvPublication {
    pub authors: String,
    pub year: String,
    pub title: String,
    pub journal: String,
    pub volume: String,
    pub number: String,
    pub pages: String,
}

impl CvPublication {
    /// `lowercase(last word of the first author) + year`.
    pub fn base_key(&self) -> String {
        let first = self.authors.split(',').next().unwrap_or_default();
        match first.split_whitespace().last() {
            Some(surname) => format!("{}{}", surname.to_lowercase(), self.year),
            None => format!("unknown{}", self.year),
        }
    }

    pub fn into_record(self, key: String) -> Record {
        let mut rec = Record::new(key, "article")
            .with("title", format!("{{{}}}", self.title))
            .with("author", self.authors)
            .with("journal", self.journal)
            .with("year", self.year);
        for (name, value) in [
            ("volume", self.volume),
            ("number", self.number),
            ("pages", self.pages),
        ] {
            if !value.is_empty() {
                rec.set(name, value);
            }
        }
        rec
    }
}

/// Extract article records from the CV source.
pub fn extract(tex: &str, cfg: &CvConfig) -> Result<Extraction> {
    let items = find_items(tex, cfg)?;
    info!(count = items.len(), "found publications in CV");

    let mut keys = KeyAllocator::new();
    let mut out = Extraction::default();
    for (i, item) in items.iter().enumerate() {
        match parse_publication(item, &cfg.strip_markers) {
            Some(publication) => {
                let key = keys.allocate(&publication.base_key());
                out.records.push(publication.into_record(key));
            }
            None => {
                warn!(item = i + 1, "failed to parse publication");
                out.dropped += 1;
            }
        }
    }
    Ok(out)
}

/// Raw text of every publication item, in document order.
pub fn find_items(tex: &str, cfg: &CvConfig) -> Result<Vec<String>> {
    let heading = heading_regex(&cfg.section_title)?;
    let sections: Vec<(String, &str)> = match heading.find(tex) {
        Some(m) => {
            let rest = &tex[m.end()..];
            let block = rest.find(BLOCK_END).map_or(rest, |end| &rest[..end]);
            year_sections(block)
        }
        None => {
            debug!("publications heading not found; trying longtable layout");
            LONGTABLE_RE
                .captures_iter(tex)
                .filter_map(|c| Some((c.get(1)?.as_str().to_string(), c.get(2)?.as_str())))
                .collect()
        }
    };

    let mut items = Vec::new();
    for (year, section) in sections {
        let found = section_items(section);
        debug!(%year, count = found.len(), "publications for year");
        items.extend(found);
    }
    Ok(items)
}

fn heading_regex(title: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"\\hrulefill\s*\\vspace\{{0\.1in\}}\\\\\{{\\large\\textcolor\{{darkgray\}}\{{{}\}}\}}",
        regex::escape(title)
    ))?)
}

fn year_sections(block: &str) -> Vec<(String, &str)> {
    let markers: Vec<_> = YEAR_MARKER_RE.captures_iter(block).collect();
    markers
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(block.len(), |next| next.start());
            Some((caps[1].to_string(), &block[whole.end()..end]))
        })
        .collect()
}

fn section_items(section: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut rest = section;
    while let Some(start) = rest.find(ITEM_MARKER) {
        let body = &rest[start + ITEM_MARKER.len()..];
        let end = body.find(NEXT_ITEM).unwrap_or(body.len());
        items.push(body[..end].trim().to_string());
        rest = &body[end..];
    }
    items
}

/// Reduce an item to plain text: drop the configured markers and the markup, keep the words.
pub fn delex(item: &str, strip_markers: &[String]) -> String {
    let mut text = item.to_string();
    for marker in strip_markers {
        text = text.replace(marker.as_str(), "");
    }
    let text = ENVIRONMENT_RE.replace_all(&text, " ");
    let text = text
        .replace("}{", " ")
        .replace(r"\textbf{", "")
        .replace(r"\textit{", "")
        .replace(r"\href{", "")
        .replace(r"\&", "&")
        .replace(['{', '}'], "");
    let text = COMMAND_RE.replace_all(&text, " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Split one item into its fields. `None` when there is no `Authors (YYYY)` prefix.
pub fn parse_publication(item: &str, strip_markers: &[String]) -> Option<CvPublication> {
    let text = delex(item, strip_markers);
    let caps = AUTHOR_YEAR_RE.captures(&text)?;
    let authors = caps[1].trim().replace(" & ", " and ");
    let year = caps[2].to_string();
    let rest = text[caps.get(0)?.end()..]
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end();

    let (title, journal) = match TITLE_VENUE_RE.captures(rest) {
        Some(tv) => (tv[1].trim().to_string(), tv[2].trim().to_string()),
        None => (rest.to_string(), UNKNOWN_JOURNAL.to_string()),
    };

    let (volume, number, pages) = match VOLUME_PAGES_RE.captures(rest) {
        Some(vp) => (
            vp[1].to_string(),
            vp.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            format!("{}--{}", &vp[3], &vp[4]),
        ),
        None => Default::default(),
    };

    Some(CvPublication {
        authors,
        year,
        title,
        journal,
        volume,
        number,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CV: &str = r"\documentclass{article}
\begin{document}
\hrulefill \vspace{0.1in}\\{\large\textcolor{darkgray}{Paul O. Hayne: Refereed Journal Articles}}

\noindent\textcolor{darkgray}{2017}
\begin{itemize}
\item{\small \textbf{Hayne, P. O.}, Bandfield, J. L., Siegler, M. A. (2017). Global regolith thermophysical properties of the Moon, \textit{Journal of Geophysical Research: Planets}, 122(12), pp. 2371--2400.}
\item{\small \textcolor{darkred}{$^*$(G)Horvath, T.}, \textbf{Hayne, P. O.} (2017). Thermal inertia of Ceres, Icarus, 300, 1--10.}
\end{itemize}
\noindent\textcolor{darkgray}{2015}
\begin{itemize}
\item{\small Hayne, P. O. (2015). Lunar cold traps, Science, 350, 11--14.}
\item{\small In preparation, no year given.}
\end{itemize}

\hrulefill \vspace{0.1in}\\{\large\textcolor{darkgray}{Paul O. Hayne: Conference Abstracts}}
\item{\small Hayne, P. O. (2016). Not an article, LPSC, 1, 1--2.}
\end{document}
";

    #[test]
    fn items_come_from_the_publications_block_only() {
        let items = find_items(CV, &CvConfig::default()).unwrap();
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|i| !i.contains("Not an article")));
    }

    #[test]
    fn extraction_builds_keyed_records_and_counts_drops() {
        let out = extract(CV, &CvConfig::default()).unwrap();
        assert_eq!(out.dropped, 1);
        let keys: Vec<&str> = out.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["hayne2017", "horvath2017", "hayne2015"]);

        let first = &out.records[0];
        assert_eq!(first.entry_type, "article");
        assert_eq!(
            first.get("title"),
            Some("{Global regolith thermophysical properties of the Moon}")
        );
        assert_eq!(
            first.get("journal"),
            Some("Journal of Geophysical Research: Planets")
        );
        assert_eq!(first.get("volume"), Some("122"));
        assert_eq!(first.get("number"), Some("12"));
        assert_eq!(first.get("pages"), Some("2371--2400"));

        let second = &out.records[1];
        assert_eq!(second.get("author"), Some("Horvath, T., Hayne, P. O."));
        assert!(!second.contains("number"));
        assert_eq!(second.get("pages"), Some("1--10"));
    }

    #[test]
    fn same_author_and_year_get_suffixes() {
        let tex = CV.replace("Horvath, T.}, ", "");
        let out = extract(&tex, &CvConfig::default()).unwrap();
        let keys: Vec<&str> = out.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["hayne2017", "hayne2017a", "hayne2015"]);
    }

    #[test]
    fn longtable_layout_is_a_fallback() {
        let tex = r"\noindent \begin{longtable}{p{1in}p{5in}}
\textcolor{darkgray}{2012} &
\item{\small Paige, D. A. & Hayne, P. O. (2012). Diviner results, Space Science Reviews, 150(1), 125--160.}
\end{longtable}
\noindent \begin{longtable}{p{1in}p{5in}}
\textcolor{darkgray}{2010} &
\item{\small Hayne, P. O. (2010). Early work, Icarus.}
\end{longtable}";
        let out = extract(tex, &CvConfig::default()).unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].key, "paige2012");
        assert_eq!(out.records[0].get("author"), Some("Paige, D. A. and Hayne, P. O."));
        assert_eq!(out.records[1].get("journal"), Some("Icarus."));
        assert!(!out.records[1].contains("pages"));
    }

    #[test]
    fn missing_publications_yield_nothing() {
        let out = extract(r"\begin{document}\end{document}", &CvConfig::default()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.dropped, 0);
    }

    #[test]
    fn title_without_venue_gets_placeholder_journal() {
        let p = parse_publication("Doe, J. (2020). Just a title", &[]).unwrap();
        assert_eq!(p.title, "Just a title");
        assert_eq!(p.journal, UNKNOWN_JOURNAL);
        assert_eq!(p.base_key(), "doe2020");
    }

    #[test]
    fn delex_strips_markup_and_collapses_whitespace() {
        let markers = CvConfig::default().strip_markers;
        assert_eq!(
            delex(
                "\\textcolor{blue}{$^*$(P)Lee, K.}  \\&\n \\href{http://x.org}{Paper}",
                &markers
            ),
            "Lee, K. & http://x.org Paper"
        );
    }
}
