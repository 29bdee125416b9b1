use std::{collections::HashMap, fs, io::ErrorKind, path::Path};

use biblatex::RawBibliography;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    record::{Field, Record, raw_value},
};

/// Header written when the store has none of its own (empty Jekyll front matter).
pub const DEFAULT_HEADER: &str = "---\n---\n\n";

static FRONT_MATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?sm)\A---[ \t]*\r?\n(.*?)^---[ \t]*\r?\n").unwrap());

/// The persisted bibliography: an opaque header followed by keyed records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub header: String,
    /// `@preamble` text as written, quotes included.
    pub preamble: String,
    /// `@string` definitions, written back ahead of the entries.
    pub strings: Vec<Field>,
    pub records: Vec<Record>,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            header: DEFAULT_HEADER.to_string(),
            preamble: String::new(),
            strings: Vec::new(),
            records: Vec::new(),
        }
    }
}

/// Everything a BibTeX blob holds that the store writes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parsed {
    pub preamble: String,
    pub strings: Vec<Field>,
    pub records: Vec<Record>,
}

impl Store {
    /// Parse store text. The front matter, if any, is kept byte for byte.
    pub fn parse(content: &str) -> Result<Self> {
        let (header, body) = match FRONT_MATTER_RE.find(content) {
            Some(m) => (m.as_str().to_string(), &content[m.end()..]),
            None => (DEFAULT_HEADER.to_string(), content),
        };
        let parsed = parse_bibtex(body)?;
        Ok(Store {
            header,
            preamble: parsed.preamble,
            strings: parsed.strings,
            records: parsed.records,
        })
    }

    /// Load the store at `path`; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no existing store, starting empty");
                Ok(Store::default())
            }
            Err(e) => Err(Error::read(path, e)),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.header.clone();
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push('\n');
        }
        if !self.preamble.is_empty() {
            out.push_str(&format!("@preamble{{{}}}\n\n", self.preamble));
        }
        for s in &self.strings {
            out.push_str(&format!("@string{{{} = {}}}\n", s.name, s.to_bibtex()));
        }
        if !self.strings.is_empty() {
            out.push('\n');
        }
        let entries: Vec<String> = self.records.iter().map(render_record).collect();
        out.push_str(&entries.join("\n"));
        out
    }

    /// Write the store through a sibling temporary file so the target is replaced whole.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render())
    }
}

/// Parse a BibTeX blob (store body or API export) without decoding field text.
///
/// Records come out in source order. A key that appears twice keeps the later entry at the
/// earlier one's position.
pub fn parse_bibtex(src: &str) -> Result<Parsed> {
    let raw = RawBibliography::parse(src).map_err(|e| Error::Bibtex(e.to_string()))?;

    let mut records: Vec<Record> = Vec::with_capacity(raw.entries.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for entry in &raw.entries {
        let rec = Record::from_raw(&entry.v, src);
        match seen.get(&rec.key) {
            Some(&i) => {
                warn!(key = %rec.key, "duplicate key in bibliography, keeping the later entry");
                records[i] = rec;
            }
            None => {
                seen.insert(rec.key.clone(), records.len());
                records.push(rec);
            }
        }
    }

    let strings = raw
        .abbreviations
        .iter()
        .map(|pair| {
            let (value, bare) = raw_value(&pair.value, src);
            Field {
                name: pair.key.v.to_string(),
                value,
                bare,
            }
        })
        .collect();

    Ok(Parsed {
        preamble: raw.preamble,
        strings,
        records,
    })
}

/// Serialise one record in the `@type{key,\n  field = {value},\n}` layout.
pub fn render_record(rec: &Record) -> String {
    let mut out = String::new();
    out.push('@');
    out.push_str(&rec.entry_type);
    out.push('{');
    out.push_str(&rec.key);
    out.push_str(",\n");
    for field in rec.fields() {
        out.push_str("  ");
        out.push_str(&field.name);
        out.push_str(" = ");
        out.push_str(&field.to_bibtex());
        out.push_str(",\n");
    }
    out.push_str("}\n");
    out
}

pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| Error::write(dir, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    fs::write(&tmp, content).map_err(|e| Error::write(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::write(path, e))
}
