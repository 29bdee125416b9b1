//! Run configuration: site paths, API parameters and the site's naming rules.
//!
//! Every value has a default matching the original site layout, so an absent config file is
//! valid. The file is TOML:
//!
//! ```toml
//! [ads]
//! author_queries = ['author:"Hayne, P"', 'author:"Hayne, Paul"']
//! min_year = 2003
//!
//! [authors]
//! surname = "Hayne"
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "bibsync.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site root every relative path is resolved against. Set from the command line.
    #[serde(skip)]
    pub root: PathBuf,
    pub paths: Paths,
    pub ads: AdsConfig,
    pub cv: CvConfig,
    pub authors: AuthorRules,
    pub group: GroupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub bibliography: PathBuf,
    pub cv: PathBuf,
    pub members: PathBuf,
    pub group_page: PathBuf,
    pub image_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            bibliography: "_bibliography/papers.bib".into(),
            cv: "assets/files/Hayne-CV/main.tex".into(),
            members: "_data/group_members.yml".into(),
            group_page: "_pages/2_group.md".into(),
            image_dir: "assets/img/group".into(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AdsConfig {
    pub search_url: String,
    pub export_url: String,
    /// Fallback when neither `--token` nor `ADS_API_TOKEN` is given.
    pub token: Option<String>,
    pub author_queries: Vec<String>,
    pub orcid: Option<String>,
    pub refereed_only: bool,
    /// Lowercase ADS doctypes to keep; empty keeps everything.
    pub doc_types: Vec<String>,
    pub min_year: i32,
    pub max_results: u32,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for AdsConfig {
    fn default() -> Self {
        AdsConfig {
            search_url: "https://api.adsabs.harvard.edu/v1/search/query".to_string(),
            export_url: "https://api.adsabs.harvard.edu/v1/export/bibtex".to_string(),
            token: None,
            author_queries: vec![
                r#"author:"Hayne, P""#.to_string(),
                r#"author:"Hayne, Paul""#.to_string(),
                r#"author:"Hayne, Paul O""#.to_string(),
            ],
            orcid: Some("0000-0003-4399-0449".to_string()),
            refereed_only: true,
            doc_types: vec![
                "article".to_string(),
                "inbook".to_string(),
                "inproceedings".to_string(),
            ],
            min_year: 2003,
            max_results: 300,
            batch_size: 50,
            batch_delay_ms: 1000,
            timeout_secs: 30,
        }
    }
}

// Hand-written so a token from the config file never ends up in logs.
impl std::fmt::Debug for AdsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsConfig")
            .field("search_url", &self.search_url)
            .field("export_url", &self.export_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("author_queries", &self.author_queries)
            .field("orcid", &self.orcid)
            .field("refereed_only", &self.refereed_only)
            .field("doc_types", &self.doc_types)
            .field("min_year", &self.min_year)
            .field("max_results", &self.max_results)
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AdsConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    /// Heading text of the refereed publications section.
    pub section_title: String,
    /// Literal markup fragments removed from each item before field extraction.
    pub strip_markers: Vec<String>,
}

impl Default for CvConfig {
    fn default() -> Self {
        CvConfig {
            section_title: "Paul O. Hayne: Refereed Journal Articles".to_string(),
            strip_markers: vec![
                r"\textcolor{darkred}{$^*$(G)".to_string(),
                r"\textcolor{darkred}{$^*$(U)".to_string(),
                r"\textcolor{blue}{$^*$(P)".to_string(),
            ],
        }
    }
}

/// Who the distinguished author is and how group members are highlighted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorRules {
    pub surname: String,
    pub given_name: String,
    /// A surname that must not be mistaken for `surname`.
    pub confusable: Option<String>,
    /// Canonical display form, rendered in bold.
    pub display_name: String,
    /// Name used in the note appended when the author falls past the truncation point.
    pub note_name: String,
    pub highlight_color: String,
    pub min_token_len: usize,
}

impl Default for AuthorRules {
    fn default() -> Self {
        AuthorRules {
            surname: "Hayne".to_string(),
            given_name: "Paul".to_string(),
            confusable: Some("Hayes".to_string()),
            display_name: "Hayne, P. O.".to_string(),
            note_name: "P. O. Hayne".to_string(),
            highlight_color: "#6495ED".to_string(),
            min_token_len: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Member always listed as Principal Investigator, whatever the stored role says.
    pub pinned_leader: String,
    pub image_web_path: String,
    pub default_image: String,
    pub description: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            pinned_leader: "Paul Hayne".to_string(),
            image_web_path: "/assets/img/group/".to_string(),
            default_image: "missing.jpg".to_string(),
            description: "Members of the Hayne Research Group".to_string(),
        }
    }
}

impl Config {
    /// Load configuration for the site at `root`.
    ///
    /// An explicit `path` must exist; otherwise `bibsync.toml` in the root is used when present
    /// and defaults apply when it is not.
    pub fn load(root: &Path, path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (root.join(DEFAULT_CONFIG_FILE), false),
        };
        let mut config = match fs::read_to_string(&file) {
            Ok(text) => Self::from_toml(&text).map_err(|source| Error::Toml {
                path: file.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound && !required => Config::default(),
            Err(e) => return Err(Error::read(&file, e)),
        };
        config.root = root.to_path_buf();
        Ok(config)
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Resolve a configured path against the site root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
