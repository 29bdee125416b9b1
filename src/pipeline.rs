//! The four batch runs behind the subcommands.
//!
//! Each run reads its inputs, transforms them and performs at most one write. Nothing is
//! written when there is nothing to write.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    authors::AuthorFormatter,
    config::Config,
    error::{Error, Result},
    extract::{
        Extraction,
        ads::{self, AdsApi, HttpAds},
        cv,
    },
    merge::{MergeCounts, merge},
    people,
    render::{
        group::{self, GroupPage},
        listing,
    },
    store::{Store, write_atomic},
};

/// What a run did, for the user-facing summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Store(StoreUpdate),
    Listing { path: PathBuf, entries: usize },
    Group(GroupUpdate),
    /// The run found nothing to do and left its output untouched.
    Nothing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUpdate {
    pub path: PathBuf,
    pub counts: MergeCounts,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUpdate {
    pub path: PathBuf,
    pub current: usize,
    pub alumni: usize,
    pub manual_region_kept: bool,
}

/// Build the ADS client, taking the token from the command line / environment first and the
/// config file second.
pub fn ads_client(config: &Config, token: Option<String>) -> Result<HttpAds> {
    let token = token
        .or_else(|| config.ads.token.clone())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(
                "no ADS API token: pass --token, set ADS_API_TOKEN or add ads.token to the config"
                    .to_string(),
            )
        })?;
    HttpAds::new(&config.ads, token)
}

pub fn run_ads(config: &Config, api: &impl AdsApi) -> Result<Summary> {
    let fetched = ads::fetch(api, &config.ads)?;
    reconcile(config, fetched, "no publications were fetched")
}

pub fn run_cv(config: &Config) -> Result<Summary> {
    let path = config.resolve(&config.paths.cv);
    info!(path = %path.display(), "reading CV");
    let tex = fs::read_to_string(&path).map_err(|e| Error::read(&path, e))?;
    let extracted = cv::extract(&tex, &config.cv)?;
    reconcile(config, extracted, "no publications were extracted")
}

fn reconcile(config: &Config, fresh: Extraction, empty_reason: &str) -> Result<Summary> {
    if fresh.records.is_empty() {
        warn!("{empty_reason}; leaving the bibliography untouched");
        return Ok(Summary::Nothing(empty_reason.to_string()));
    }
    let path = config.resolve(&config.paths.bibliography);
    let mut store = Store::load(&path)?;
    info!(existing = store.records.len(), fresh = fresh.records.len(), "merging");

    let merged = merge(fresh.records, std::mem::take(&mut store.records));
    store.records = merged.records;
    store.save(&path)?;
    info!(path = %path.display(), total = store.records.len(), "bibliography written");

    Ok(Summary::Store(StoreUpdate {
        path,
        counts: merged.counts,
        dropped: fresh.dropped,
    }))
}

/// Convert `input` (a BibTeX store) into the YAML listing at `output`.
///
/// Both paths are used as given; group members for highlighting come from the configured
/// members file.
pub fn run_yaml(config: &Config, input: &Path, output: &Path, today: NaiveDate) -> Result<Summary> {
    let text = fs::read_to_string(input).map_err(|e| Error::read(input, e))?;
    let store = Store::parse(&text)?;

    let roster = people::roster_names(&config.resolve(&config.paths.members))?;
    debug!(names = roster.len(), "group roster loaded");
    let formatter = AuthorFormatter::new(config.authors.clone(), roster)?;

    let entries = listing::build(&store.records, &formatter);
    let source_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    write_atomic(output, &listing::render(&entries, &source_name, today)?)?;
    info!(count = entries.len(), path = %output.display(), "listing written");

    Ok(Summary::Listing {
        path: output.to_path_buf(),
        entries: entries.len(),
    })
}

pub fn run_group(config: &Config, today: NaiveDate) -> Result<Summary> {
    let members_path = config.resolve(&config.paths.members);
    let members = people::load_members(&members_path)?;
    if members.is_empty() {
        warn!(path = %members_path.display(), "members file lists nobody");
        return Ok(Summary::Nothing("no group members found".to_string()));
    }
    info!(count = members.len(), "members loaded");

    let page_path = config.resolve(&config.paths.group_page);
    let manual = match fs::read_to_string(&page_path) {
        Ok(page) => group::extract_manual_region(&page),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(Error::read(&page_path, e)),
    };
    if manual.is_some() {
        debug!("keeping hand-written page content");
    }

    let roster = group::categorize(&members, &config.group.pinned_leader);
    let image_dir = config.resolve(&config.paths.image_dir);
    let page = GroupPage::new(&config.group, &image_dir).render(&roster, manual.as_deref(), today);
    write_atomic(&page_path, &page)?;
    info!(path = %page_path.display(), "group page written");

    Ok(Summary::Group(GroupUpdate {
        path: page_path,
        current: roster.current.iter().map(|(_, m)| m.len()).sum(),
        alumni: roster.alumni.len(),
        manual_region_kept: manual.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ads::{AdsDocument, SearchQuery, SearchResponse};
    use tempfile::TempDir;

    struct CannedAds {
        bibtex: String,
    }

    impl AdsApi for CannedAds {
        fn search(&self, _query: &SearchQuery) -> Result<SearchResponse> {
            Ok(SearchResponse {
                num_found: 1,
                docs: vec![AdsDocument {
                    bibcode: "2021PSJ.....2..100L".into(),
                    doctype: Some("article".into()),
                    year: Some("2021".into()),
                }],
            })
        }

        fn export_bibtex(&self, _bibcodes: &[String]) -> Result<String> {
            Ok(self.bibtex.clone())
        }
    }

    fn site() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        (dir, config)
    }

    #[test]
    fn ads_run_merges_into_existing_store() {
        let (_dir, config) = site();
        let bib = config.resolve(&config.paths.bibliography);
        fs::create_dir_all(bib.parent().unwrap()).unwrap();
        fs::write(
            &bib,
            "---\nlayout: none\n---\n\n@article{doe2020,\n  title = {Old},\n  year = {2020},\n}\n",
        )
        .unwrap();

        let api = CannedAds {
            bibtex: "@ARTICLE{2021PSJ.....2..100L,\n  title = \"{Ice}\",\n  year = {2021},\n}\n"
                .into(),
        };
        let summary = run_ads(&config, &api).unwrap();

        let update = match summary {
            Summary::Store(update) => update,
            other => panic!("expected a store update, got {other:?}"),
        };
        assert_eq!(update.counts.added, 1);
        assert_eq!(update.counts.kept, 1);
        let written = fs::read_to_string(&bib).unwrap();
        assert!(written.starts_with("---\nlayout: none\n---\n"));
        let first = written.find("2021PSJ").unwrap();
        let second = written.find("doe2020").unwrap();
        assert!(first < second);
    }

    #[test]
    fn empty_fetch_leaves_store_alone() {
        let (_dir, config) = site();
        let api = CannedAds {
            bibtex: String::new(),
        };
        let summary = run_ads(&config, &api).unwrap();
        assert!(matches!(summary, Summary::Nothing(_)));
        assert!(!config.resolve(&config.paths.bibliography).exists());
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let (_dir, config) = site();
        assert!(matches!(ads_client(&config, None), Err(Error::Config(_))));
        assert!(matches!(
            ads_client(&config, Some("  ".into())),
            Err(Error::Config(_))
        ));
        assert!(ads_client(&config, Some("token".into())).is_ok());
    }

    #[test]
    fn group_run_requires_members_file() {
        let (_dir, config) = site();
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(matches!(run_group(&config, today), Err(Error::Read { .. })));
    }
}
