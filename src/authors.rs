use once_cell::sync::Lazy;
use regex::Regex;

use crate::{config::AuthorRules, error::Result};

/// Maximum number of names shown before the list is cut with "et al.".
pub const MAX_SHOWN: usize = 3;

static HTML_SPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>[^<]+</[^>]+>").unwrap());
static INITIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]\.").unwrap());

/// Formats raw author lists into the display strings used on the publications page.
pub struct AuthorFormatter {
    rules: AuthorRules,
    distinguished: Regex,
    confusable: Option<Regex>,
    /// Lowercased group member names (full names and last names).
    roster: Vec<String>,
}

impl AuthorFormatter {
    pub fn new(rules: AuthorRules, roster: Vec<String>) -> Result<Self> {
        let distinguished = word_regex(&rules.surname)?;
        let confusable = rules.confusable.as_deref().map(word_regex).transpose()?;
        let roster = roster.into_iter().map(|m| m.to_lowercase()).collect();
        Ok(AuthorFormatter {
            rules,
            distinguished,
            confusable,
            roster,
        })
    }

    pub fn is_distinguished(&self, author: &str) -> bool {
        self.distinguished.is_match(author)
            && !self
                .confusable
                .as_ref()
                .is_some_and(|re| re.is_match(author))
    }

    fn is_distinguished_member(&self, member: &str) -> bool {
        member.contains(&self.rules.surname.to_lowercase())
            && member.contains(&self.rules.given_name.to_lowercase())
    }

    fn is_group_member(&self, apa: &str) -> bool {
        let apa = apa.to_lowercase();
        self.roster
            .iter()
            .filter(|m| !self.is_distinguished_member(m))
            .flat_map(|m| m.split_whitespace())
            .any(|part| part.chars().count() >= self.rules.min_token_len && apa.contains(part))
    }

    /// Render one author: the distinguished author in its canonical bold form, group members
    /// highlighted, everyone else in plain APA form.
    pub fn format_name(&self, author: &str) -> String {
        if self.is_distinguished(author) {
            return format!("<b>{}</b>", self.rules.display_name);
        }
        let apa = format_apa(author);
        if self.is_group_member(&apa) {
            format!(
                "<b><span style=\"color:{}\">{}</span></b>",
                self.rules.highlight_color, apa
            )
        } else {
            apa
        }
    }

    /// Render a whole author list, truncating after [`MAX_SHOWN`] names.
    pub fn format_list(&self, authors: &str) -> String {
        let authors = split_authors(authors);
        if authors.is_empty() {
            return String::new();
        }
        let distinguished_at = authors.iter().position(|a| self.is_distinguished(a));
        let formatted: Vec<String> = authors.iter().map(|a| self.format_name(a)).collect();

        if formatted.len() > MAX_SHOWN {
            let mut out = formatted[..MAX_SHOWN].join(", ");
            out.push_str(", et al.");
            if distinguished_at.is_some_and(|i| i >= MAX_SHOWN) {
                out.push_str(&format!(" (including {})", self.rules.note_name));
            }
            out
        } else {
            formatted.join(", ")
        }
    }
}

fn word_regex(name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name.trim())))?)
}

/// Split an author list into individual names.
///
/// Lists joined with " and " split on that; otherwise commas separate names, except that a
/// part starting with an initial is glued back onto the surname before it. Embedded HTML spans
/// are shielded from splitting. Empty parts and "et al." are dropped.
pub fn split_authors(list: &str) -> Vec<String> {
    let spans: Vec<String> = HTML_SPAN_RE
        .find_iter(list)
        .map(|m| m.as_str().to_string())
        .collect();
    let mut shielded = list.to_string();
    for (i, span) in spans.iter().enumerate() {
        shielded = shielded.replace(span.as_str(), &placeholder(i));
    }

    let parts: Vec<String> = if shielded.contains(" and ") {
        shielded.split(" and ").map(|a| a.trim().to_string()).collect()
    } else {
        let pieces: Vec<&str> = shielded.split(',').map(str::trim).collect();
        let mut out = Vec::new();
        let mut i = 0;
        while i < pieces.len() {
            if i + 1 < pieces.len() && INITIAL_RE.is_match(pieces[i + 1]) {
                out.push(format!("{}, {}", pieces[i], pieces[i + 1]));
                i += 2;
            } else {
                out.push(pieces[i].to_string());
                i += 1;
            }
        }
        out
    };

    parts
        .into_iter()
        .map(|mut a| {
            for (i, span) in spans.iter().enumerate() {
                a = a.replace(&placeholder(i), span);
            }
            a.trim().to_string()
        })
        .filter(|a| !a.is_empty() && !a.to_lowercase().contains("et al."))
        .collect()
}

fn placeholder(i: usize) -> String {
    format!("__HTML_TAG_{i}__")
}

/// APA-style "Surname, F. M." from either "Surname, First Middle" or "First Middle Surname".
pub fn format_apa(author: &str) -> String {
    let author = author.replace('~', " ");
    let author = author.trim();
    let (last, firsts): (&str, Vec<&str>) = match author.split_once(',') {
        Some((last, rest)) => (last.trim(), rest.split_whitespace().collect()),
        None => {
            let parts: Vec<&str> = author.split_whitespace().collect();
            match parts.split_last() {
                Some((last, firsts)) if !firsts.is_empty() => (*last, firsts.to_vec()),
                _ => return author.to_string(),
            }
        }
    };
    let initials: Vec<String> = firsts
        .iter()
        .filter_map(|n| n.chars().next())
        .map(|c| format!("{c}."))
        .collect();
    if initials.is_empty() {
        last.to_string()
    } else {
        format!("{}, {}", last, initials.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(roster: &[&str]) -> AuthorFormatter {
        AuthorFormatter::new(
            AuthorRules::default(),
            roster.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn apa_from_both_name_orders() {
        assert_eq!(format_apa("Bandfield, Joshua L."), "Bandfield, J. L.");
        assert_eq!(format_apa("Joshua L. Bandfield"), "Bandfield, J. L.");
        assert_eq!(format_apa("Paige, D.~A."), "Paige, D. A.");
        assert_eq!(format_apa("Plato"), "Plato");
        assert_eq!(format_apa("Siegler,"), "Siegler");
    }

    #[test]
    fn distinguished_author_is_strict() {
        let f = formatter(&[]);
        assert!(f.is_distinguished("Hayne, P. O."));
        assert!(f.is_distinguished("paul o. hayne"));
        assert!(!f.is_distinguished("Hayes, A. G."));
        assert!(!f.is_distinguished("Haynes, R."));
    }

    #[test]
    fn distinguished_author_gets_canonical_form() {
        let f = formatter(&[]);
        assert_eq!(f.format_name("Hayne, Paul"), "<b>Hayne, P. O.</b>");
    }

    #[test]
    fn group_members_are_highlighted() {
        let f = formatter(&["Paul Hayne", "Hayne", "Tyler Horvath", "Horvath", "Al Li", "Li"]);
        assert_eq!(
            f.format_name("Horvath, T. J."),
            "<b><span style=\"color:#6495ED\">Horvath, T. J.</span></b>"
        );
        // Tokens shorter than four characters never match.
        assert_eq!(f.format_name("Li, Q."), "Li, Q.");
        assert_eq!(f.format_name("Siegler, M. A."), "Siegler, M. A.");
    }

    #[test]
    fn comma_lists_keep_initials_with_surnames() {
        assert_eq!(
            split_authors("Hayne, P. O., Aharonson, O., et al."),
            vec!["Hayne, P. O.", "Aharonson, O."]
        );
        assert_eq!(
            split_authors("Hayne and Paige and Siegler"),
            vec!["Hayne", "Paige", "Siegler"]
        );
    }

    #[test]
    fn html_spans_are_not_split() {
        let list = "<b><span>Horvath, T.</span></b>, Paige, D.";
        let parts = split_authors(list);
        assert_eq!(parts[0], "<b><span>Horvath, T.</span></b>");
        assert_eq!(parts.last().map(String::as_str), Some("Paige, D."));
    }

    #[test]
    fn four_authors_led_by_distinguished_author() {
        let f = formatter(&[]);
        let out = f.format_list("Hayne, P. O. and Paige, D. A. and Siegler, M. A. and Bandfield, J. L.");
        assert_eq!(out, "<b>Hayne, P. O.</b>, Paige, D. A., Siegler, M. A., et al.");
        assert!(!out.contains("including"));
    }

    #[test]
    fn distinguished_author_past_cutoff_gets_note() {
        let f = formatter(&[]);
        let out = f.format_list("Paige, D. A. and Siegler, M. A. and Bandfield, J. L. and Hayne, P. O.");
        assert_eq!(
            out,
            "Paige, D. A., Siegler, M. A., Bandfield, J. L., et al. (including P. O. Hayne)"
        );
    }

    #[test]
    fn short_lists_are_shown_whole() {
        let f = formatter(&[]);
        assert_eq!(
            f.format_list("Paige, D. A. and Hayne, P. O."),
            "Paige, D. A., <b>Hayne, P. O.</b>"
        );
        assert_eq!(f.format_list(""), "");
    }
}
