//! Field normalisation: venue names, LaTeX markup, author strings and title links.

use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::{Captures, Regex};

const DOI_PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Abbreviated venue names as they come out of ADS macros (`\psj`, `\grl`, ...).
static JOURNAL_ABBREVIATIONS: &[(&str, &str)] = &[
    ("psj", "Planetary Science Journal"),
    ("ssr", "Space Science Reviews"),
    ("ssrv", "Space Science Reviews"),
    ("grl", "Geophysical Research Letters"),
    ("jgre", "Journal of Geophysical Research: Planets"),
    ("planss", "Planetary and Space Science"),
    ("p&ss", "Planetary and Space Science"),
    ("natgeo", "Nature Geoscience"),
    ("natas", "Nature Astronomy"),
    ("acaau", "Acta Astronautica"),
    ("revmg", "Reviews in Mineralogy and Geochemistry"),
    ("rvmg", "Reviews in Mineralogy and Geochemistry"),
    ("chegg", "Chemie der Erde - Geochemistry"),
    ("cheg", "Chemie der Erde - Geochemistry"),
    ("e&ss", "Earth and Space Science"),
    ("capj", "Current Applications in Planetary Sciences"),
    ("natco", "Nature Communications"),
    ("sci", "Science"),
    ("pnas", "Proceedings of the National Academy of Sciences"),
    ("jvgr", "Journal of Volcanology and Geothermal Research"),
    ("rems", "Remote Sensing"),
    ("plsci", "Planetary Science"),
];

/// Expand an abbreviated journal name; unknown names pass through unchanged.
pub fn expand_journal_name(abbrev: &str) -> String {
    let lower = abbrev.trim().to_lowercase();
    if let Some((_, full)) = JOURNAL_ABBREVIATIONS.iter().find(|(k, _)| *k == lower) {
        return (*full).to_string();
    }
    // Unicode look-alikes that survive the BibTeX decoding step.
    if abbrev.contains("\u{131}carus") {
        return "Icarus".to_string();
    }
    if abbrev.contains("ßr") {
        return "Space Science Reviews".to_string();
    }
    abbrev.to_string()
}

static SUBSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$_(?:\{([^}$]+)\}|(\d+))\$").unwrap());
static SUPERSCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\^(?:\{([^}$]+)\}|(\d+))\$").unwrap());
static ROMAN_MATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{\\rm ([^}$]+)\}\$").unwrap());
static MATH_DELIM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$+([^$]+)\$+").unwrap());

static TEXT_COMMANDS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\\textquoteright(?:\{\})?", "'"),
        (r"\\textquoteleft(?:\{\})?", "'"),
        (r"\\textquotedbl(?:\{\})?", "\""),
        (r"\\textendash(?:\{\})?", "–"),
        (r"\\textemdash(?:\{\})?", "—"),
        (r"\\textasciitilde(?:\{\})?", "~"),
        // Entity form, so the catch-all below cannot strip it on a second pass.
        (r"\\textbackslash(?:\{\})?", "&#92;"),
        (r"\\textgreater(?:\{\})?", ">"),
        (r"\\textless(?:\{\})?", "<"),
        (r"\\textbar(?:\{\})?", "|"),
        (r"\\textbf\{([^}]+)\}", "<b>$1</b>"),
        (r"\\textit\{([^}]+)\}", "<i>$1</i>"),
        (r"\\emph\{([^}]+)\}", "<i>$1</i>"),
        (r"\\textsuperscript\{([^}]+)\}", "<sup>$1</sup>"),
        (r"\\textsubscript\{([^}]+)\}", "<sub>$1</sub>"),
        (r"\\_", "_"),
        (r"\\&", "&"),
        (r"\\%", "%"),
        (r"\\#", "#"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).unwrap(), r))
    .collect()
});

static LETTER_ACCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([vcuH=])\{([a-zA-Z])\}").unwrap());
static SYMBOL_ACCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\\(["'`^~.])([a-zA-Z])"#).unwrap());
static NAMED_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(aa|AA|ae|AE|ss|o|O|i|j|l|L)(?:\{\}|\b)").unwrap());
static CATCH_ALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\+").unwrap());
static CO2_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CO_2").unwrap());

fn combining_mark(accent: &str) -> char {
    match accent {
        "\"" => '\u{308}',
        "'" => '\u{301}',
        "`" => '\u{300}',
        "^" => '\u{302}',
        "~" => '\u{303}',
        "." => '\u{307}',
        "v" => '\u{30C}',
        "c" => '\u{327}',
        "u" => '\u{306}',
        "H" => '\u{30B}',
        "=" => '\u{304}',
        _ => '\u{34F}',
    }
}

fn accented(caps: &Captures<'_>) -> String {
    format!("{}{}", &caps[2], combining_mark(&caps[1]))
}

fn named_symbol(name: &str) -> &'static str {
    match name {
        "aa" => "å",
        "AA" => "Å",
        "ae" => "æ",
        "AE" => "Æ",
        "ss" => "ß",
        "o" => "ø",
        "O" => "Ø",
        "i" => "ı",
        "j" => "ȷ",
        "l" => "ł",
        "L" => "Ł",
        _ => "",
    }
}

/// Convert LaTeX-flavoured field text into display text with inline HTML.
///
/// The passes run in a fixed order: sub/superscripts before the generic `$` stripping, and
/// every named command before the catch-all that drops remaining backslashes. Nothing in the
/// output can match an earlier pass, which makes the conversion idempotent.
pub fn latex_to_text(text: &str) -> String {
    let mut s = SUBSCRIPT_RE
        .replace_all(text, |c: &Captures<'_>| {
            format!("<sub>{}</sub>", c.get(1).or_else(|| c.get(2)).map_or("", |m| m.as_str()))
        })
        .into_owned();
    s = SUPERSCRIPT_RE
        .replace_all(&s, |c: &Captures<'_>| {
            format!("<sup>{}</sup>", c.get(1).or_else(|| c.get(2)).map_or("", |m| m.as_str()))
        })
        .into_owned();
    s = ROMAN_MATH_RE.replace_all(&s, "$1").into_owned();
    s = MATH_DELIM_RE.replace_all(&s, "$1").into_owned();

    for (re, rep) in TEXT_COMMANDS.iter() {
        s = re.replace_all(&s, *rep).into_owned();
    }
    s = LETTER_ACCENT_RE
        .replace_all(&s, |c: &Captures<'_>| accented(c))
        .into_owned();
    s = NAMED_SYMBOL_RE
        .replace_all(&s, |c: &Captures<'_>| named_symbol(&c[1]).to_string())
        .into_owned();

    s = s.replace(['{', '}'], "");

    s = SYMBOL_ACCENT_RE
        .replace_all(&s, |c: &Captures<'_>| accented(c))
        .into_owned();
    s = CATCH_ALL_RE.replace_all(&s, "").into_owned();

    CO2_RE.replace_all(&s, "CO<sub>2</sub>").into_owned()
}

static OUTER_BRACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\{(.*)\}$").unwrap());

/// Strip BibTeX decoration from an author list before it is split into names.
pub fn clean_bibtex_authors(authors: &str) -> String {
    let trimmed = authors.trim();
    let inner = OUTER_BRACES_RE.replace(trimmed, "$1");
    inner
        .replace('\\', "")
        .replace(['{', '}'], "")
        .replace('~', " ")
}

static TITLE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<a href="[^"]*" target="[^"]*">(.*?)</a>"#).unwrap());

/// Remove an embedded `<a href=...>` wrapper, keeping the link text.
pub fn strip_title_link(title: &str) -> String {
    TITLE_LINK_RE.replace_all(title, "$1").into_owned()
}

/// Marker used to detect a title that already carries a hand-added link.
pub const LINK_MARKER: &str = "<a href=";

/// Rewrite a raw title: drop its braces and, when a DOI is known, wrap it in a DOI link.
///
/// The result keeps one level of protective braces so BibTeX leaves its casing alone.
pub fn link_title(title: &str, doi: Option<&str>) -> String {
    let bare = title.replace(['{', '}'], "");
    let bare = bare.trim();
    match doi.map(str::trim).filter(|d| !d.is_empty()) {
        Some(doi) => {
            let enc = utf8_percent_encode(doi, DOI_PATH_ENCODE_SET);
            format!("{{<a href=\"https://doi.org/{enc}\" target=\"\\_\">{bare}</a>}}")
        }
        None => format!("{{{bare}}}"),
    }
}
