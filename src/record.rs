use biblatex::{Field as RawField, RawChunk, RawEntry, Spanned};

/// One field of a record.
///
/// `value` is raw BibTeX text. Braced and quoted values are held without their outer
/// delimiters; bare values (macros such as `dec`, numbers and `#` concatenations) are held
/// exactly as written and rendered back without braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub bare: bool,
}

impl Field {
    /// The value as it appears after `name = ` in BibTeX source.
    pub fn to_bibtex(&self) -> String {
        if self.bare {
            self.value.clone()
        } else {
            format!("{{{}}}", self.value)
        }
    }
}

/// One bibliography entry as it lives in the store.
///
/// Field values are kept as raw BibTeX text and in source order, so fields we know nothing
/// about survive a read/write cycle untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub entry_type: String,
    fields: Vec<Field>,
}

impl Record {
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Record {
            key: key.into(),
            entry_type: entry_type.into().to_ascii_lowercase(),
            fields: Vec::new(),
        }
    }

    /// Builder-style variant of [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    /// Field value with protective braces removed and surrounding whitespace trimmed.
    pub fn plain(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| v.replace(['{', '}'], "").trim().to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Set a braced field, replacing an existing value in place or appending a new one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.put(Field {
            name: name.to_ascii_lowercase(),
            value: value.into(),
            bare: false,
        });
    }

    /// Copy `name` from `other` exactly as it is stored there, delimiters included.
    pub fn copy_from(&mut self, other: &Record, name: &str) {
        if let Some(field) = other.field(name) {
            self.put(field.clone());
        }
    }

    fn put(&mut self, field: Field) {
        match self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&field.name))
        {
            Some(slot) => {
                slot.value = field.value;
                slot.bare = field.bare;
            }
            None => self.fields.push(field),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Publication year as an integer; missing or unparseable years count as 0.
    pub fn year(&self) -> i64 {
        self.plain("year")
            .and_then(|y| y.parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Lift a raw parsed entry into a record. `src` is the text the entry was parsed from;
    /// field text is taken from it verbatim.
    pub fn from_raw(entry: &RawEntry, src: &str) -> Self {
        let mut rec = Record::new(entry.key.v, entry.kind.v);
        for pair in &entry.fields {
            let (value, bare) = raw_value(&pair.value, src);
            rec.put(Field {
                name: pair.key.v.to_ascii_lowercase(),
                value,
                bare,
            });
        }
        rec
    }
}

/// Source text of a field value and whether it is bare.
///
/// A single braced or quoted chunk yields its inner text. Anything else is returned as the
/// exact source slice, so abbreviations stay abbreviations.
pub fn raw_value(value: &Spanned<RawField>, src: &str) -> (String, bool) {
    let written = src
        .get(value.span.clone())
        .map(str::trim_end)
        .unwrap_or_default();
    match value.v.as_slice() {
        [Spanned {
            v: RawChunk::Normal(inner),
            ..
        }] if written.starts_with('{') || written.starts_with('"') => (inner.to_string(), false),
        _ => (written.to_string(), true),
    }
}
