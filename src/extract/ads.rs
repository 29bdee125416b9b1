//! Publication retrieval from the NASA ADS search and export API.

use std::{thread, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::{
    config::AdsConfig,
    error::{Error, Result},
    extract::Extraction,
    normalize::link_title,
    record::Record,
    store::parse_bibtex,
};

/// Fields requested for every search hit.
pub const SEARCH_FIELDS: &str =
    "bibcode,title,author,pub,volume,issue,page,year,doctype,identifier,doi,abstract";
pub const SEARCH_SORT: &str = "date desc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub fl: String,
    pub rows: u32,
    pub sort: String,
}

impl SearchQuery {
    pub fn from_config(cfg: &AdsConfig) -> Self {
        let mut parts = Vec::new();
        if !cfg.author_queries.is_empty() {
            parts.push(format!("({})", cfg.author_queries.join(" OR ")));
        }
        if let Some(orcid) = cfg.orcid.as_deref().filter(|o| !o.is_empty()) {
            parts.push(format!("OR orcid:{orcid}"));
        }
        if cfg.refereed_only {
            parts.push("property:refereed".to_string());
        }
        parts.push(format!("year:{}-", cfg.min_year));

        SearchQuery {
            q: parts.join(" "),
            fl: SEARCH_FIELDS.to_string(),
            rows: cfg.max_results,
            sort: SEARCH_SORT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "numFound", default)]
    pub num_found: u64,
    #[serde(default)]
    pub docs: Vec<AdsDocument>,
}

/// The parts of a search hit that matter before export; everything else comes from the
/// exported BibTeX.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdsDocument {
    pub bibcode: String,
    #[serde(default)]
    pub doctype: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

/// The two ADS operations the pipeline needs.
pub trait AdsApi {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse>;
    /// Export the given bibcodes as one BibTeX blob.
    fn export_bibtex(&self, bibcodes: &[String]) -> Result<String>;
}

#[derive(Deserialize)]
struct SearchEnvelope {
    response: Option<SearchResponse>,
}

#[derive(Serialize)]
struct ExportRequest<'a> {
    bibcode: &'a [String],
}

#[derive(Deserialize)]
struct ExportEnvelope {
    export: Option<String>,
}

/// [`AdsApi`] over HTTPS.
pub struct HttpAds {
    agent: ureq::Agent,
    search_url: Url,
    export_url: Url,
    token: String,
}

impl HttpAds {
    pub fn new(cfg: &AdsConfig, token: impl Into<String>) -> Result<Self> {
        let agent_cfg = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(10)))
            .timeout_global(Some(cfg.timeout()))
            .build();
        Ok(HttpAds {
            agent: ureq::Agent::new_with_config(agent_cfg),
            search_url: parse_url("search_url", &cfg.search_url)?,
            export_url: parse_url("export_url", &cfg.export_url)?,
            token: token.into(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Config(format!("invalid ads.{name} {raw:?}: {e}")))
}

fn unexpected(endpoint: &Url, body: &str) -> Error {
    let mut detail: String = body.chars().take(200).collect();
    if detail.len() < body.len() {
        detail.push('…');
    }
    Error::UnexpectedResponse {
        endpoint: endpoint.to_string(),
        detail,
    }
}

impl AdsApi for HttpAds {
    fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", &query.q)
            .append_pair("fl", &query.fl)
            .append_pair("rows", &query.rows.to_string())
            .append_pair("sort", &query.sort);
        debug!(q = %query.q, rows = query.rows, "querying ADS");

        let body = self
            .agent
            .get(url.as_str())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .call()?
            .body_mut()
            .read_to_string()?;

        let envelope: SearchEnvelope = serde_json::from_str(&body)?;
        envelope
            .response
            .ok_or_else(|| unexpected(&self.search_url, &body))
    }

    fn export_bibtex(&self, bibcodes: &[String]) -> Result<String> {
        let payload = serde_json::to_string(&ExportRequest { bibcode: bibcodes })?;
        let body = self
            .agent
            .post(self.export_url.as_str())
            .header("Authorization", self.bearer())
            .header("Content-Type", "application/json")
            .send(payload)?
            .body_mut()
            .read_to_string()?;

        let envelope: ExportEnvelope = serde_json::from_str(&body)?;
        envelope
            .export
            .ok_or_else(|| unexpected(&self.export_url, &body))
    }
}

/// Keep documents of an allowed type published no earlier than `min_year`.
///
/// An empty type list allows every type; a year that does not parse is not filtered on.
pub fn select_documents<'a>(docs: &'a [AdsDocument], cfg: &AdsConfig) -> Vec<&'a AdsDocument> {
    docs.iter()
        .filter(|doc| {
            cfg.doc_types.is_empty()
                || doc.doctype.as_deref().is_some_and(|t| {
                    cfg.doc_types
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(t))
                })
        })
        .filter(|doc| {
            doc.year
                .as_deref()
                .and_then(|y| y.trim().get(..4))
                .and_then(|y| y.parse::<i32>().ok())
                .is_none_or(|y| y >= cfg.min_year)
        })
        .collect()
}

/// Search, filter, export in batches and prepare the exported records.
///
/// Any API failure aborts the whole fetch so the caller never merges a partial result.
pub fn fetch(api: &impl AdsApi, cfg: &AdsConfig) -> Result<Extraction> {
    let query = SearchQuery::from_config(cfg);
    let response = api.search(&query)?;
    info!(found = response.num_found, "ADS search finished");

    let selected = select_documents(&response.docs, cfg);
    info!(count = selected.len(), "publications left after filtering");
    if selected.is_empty() {
        return Ok(Extraction::default());
    }

    let bibcodes: Vec<String> = selected.iter().map(|d| d.bibcode.clone()).collect();
    let mut records = export_batches(api, &bibcodes, cfg.batch_size, cfg.batch_delay())?;
    info!(count = records.len(), "BibTeX entries exported");

    for rec in &mut records {
        prepare_record(rec);
    }
    Ok(Extraction {
        records,
        dropped: 0,
    })
}

fn export_batches(
    api: &impl AdsApi,
    bibcodes: &[String],
    batch_size: usize,
    delay: Duration,
) -> Result<Vec<Record>> {
    let batches: Vec<&[String]> = bibcodes.chunks(batch_size.max(1)).collect();
    let bar = ProgressBar::new(batches.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:30.cyan/dim}] {pos}/{len}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message("Exporting BibTeX");

    let mut records = Vec::new();
    for (i, batch) in batches.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        debug!(batch = i + 1, of = batches.len(), size = batch.len(), "exporting batch");
        let blob = match api.export_bibtex(batch) {
            Ok(blob) => blob,
            Err(e) => {
                bar.abandon();
                return Err(e);
            }
        };
        records.extend(parse_bibtex(&blob)?.records);
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(records)
}

/// Normalise an exported entry: year as plain text, title linked to its DOI.
pub fn prepare_record(rec: &mut Record) {
    if let Some(year) = rec.plain("year") {
        rec.set("year", year);
    }
    if let Some(title) = rec.get("title") {
        let doi = rec.plain("doi");
        let linked = link_title(title, doi.as_deref());
        rec.set("title", linked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeAds {
        docs: Vec<AdsDocument>,
        fail_export: bool,
        batches: RefCell<Vec<Vec<String>>>,
    }

    impl FakeAds {
        fn new(docs: Vec<AdsDocument>) -> Self {
            FakeAds {
                docs,
                fail_export: false,
                batches: RefCell::new(Vec::new()),
            }
        }
    }

    impl AdsApi for FakeAds {
        fn search(&self, _query: &SearchQuery) -> Result<SearchResponse> {
            Ok(SearchResponse {
                num_found: self.docs.len() as u64,
                docs: self.docs.clone(),
            })
        }

        fn export_bibtex(&self, bibcodes: &[String]) -> Result<String> {
            if self.fail_export {
                return Err(Error::UnexpectedResponse {
                    endpoint: "export".into(),
                    detail: "{}".into(),
                });
            }
            self.batches.borrow_mut().push(bibcodes.to_vec());
            Ok(bibcodes
                .iter()
                .map(|b| {
                    format!(
                        "@ARTICLE{{{b},\n  author = {{{{Hayne}}, P.~O.}},\n  title = \"{{Lunar {b}}}\",\n  doi = {{10.1000/{b}}},\n  year = {{2020}},\n}}\n"
                    )
                })
                .collect())
        }
    }

    fn doc(bibcode: &str, doctype: &str, year: &str) -> AdsDocument {
        AdsDocument {
            bibcode: bibcode.to_string(),
            doctype: Some(doctype.to_string()),
            year: Some(year.to_string()),
        }
    }

    fn cfg() -> AdsConfig {
        AdsConfig {
            batch_delay_ms: 0,
            ..AdsConfig::default()
        }
    }

    #[test]
    fn query_combines_variants_orcid_and_filters() {
        let q = SearchQuery::from_config(&AdsConfig::default());
        assert_eq!(
            q.q,
            r#"(author:"Hayne, P" OR author:"Hayne, Paul" OR author:"Hayne, Paul O") OR orcid:0000-0003-4399-0449 property:refereed year:2003-"#
        );
        assert_eq!(q.rows, 300);
        assert_eq!(q.sort, "date desc");
        assert!(q.fl.starts_with("bibcode,title,author"));
    }

    #[test]
    fn query_without_orcid_or_refereed() {
        let c = AdsConfig {
            author_queries: vec![r#"author:"Doe, J""#.into()],
            orcid: None,
            refereed_only: false,
            min_year: 2010,
            ..AdsConfig::default()
        };
        assert_eq!(SearchQuery::from_config(&c).q, r#"(author:"Doe, J") year:2010-"#);
    }

    #[test]
    fn documents_are_filtered_by_type_and_year() {
        let docs = vec![
            doc("a", "article", "2020"),
            doc("b", "abstract", "2020"),
            doc("c", "INPROCEEDINGS", "2004"),
            doc("d", "article", "1999"),
        ];
        let kept: Vec<&str> = select_documents(&docs, &cfg())
            .iter()
            .map(|d| d.bibcode.as_str())
            .collect();
        assert_eq!(kept, vec!["a", "c"]);

        let open = AdsConfig {
            doc_types: vec![],
            ..cfg()
        };
        assert_eq!(select_documents(&docs, &open).len(), 3);
    }

    #[test]
    fn export_runs_in_batches_and_links_titles() {
        let docs: Vec<AdsDocument> = (0..5)
            .map(|i| doc(&format!("2020Icar{i}"), "article", "2020"))
            .collect();
        let api = FakeAds::new(docs);
        let c = AdsConfig {
            batch_size: 2,
            ..cfg()
        };

        let out = fetch(&api, &c).unwrap();

        let sizes: Vec<usize> = api.batches.borrow().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(out.records.len(), 5);
        let first = &out.records[0];
        assert_eq!(first.key, "2020Icar0");
        assert_eq!(first.get("year"), Some("2020"));
        assert_eq!(
            first.get("title"),
            Some(r#"{<a href="https://doi.org/10.1000/2020Icar0" target="\_">Lunar 2020Icar0</a>}"#)
        );
    }

    #[test]
    fn nothing_selected_means_no_export() {
        let api = FakeAds::new(vec![doc("x", "abstract", "2020")]);
        let out = fetch(&api, &cfg()).unwrap();
        assert!(out.records.is_empty());
        assert!(api.batches.borrow().is_empty());
    }

    #[test]
    fn export_failure_aborts_the_fetch() {
        let mut api = FakeAds::new(vec![doc("a", "article", "2020")]);
        api.fail_export = true;
        assert!(matches!(
            fetch(&api, &cfg()),
            Err(Error::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn prepare_record_without_doi_just_braces_title() {
        let mut rec = Record::new("k", "article").with("title", "{Ice} in {Cold} Traps");
        prepare_record(&mut rec);
        assert_eq!(rec.get("title"), Some("{Ice in Cold Traps}"));
    }

    #[test]
    fn search_envelope_without_response_is_detected() {
        let env: SearchEnvelope = serde_json::from_str(r#"{"error": "Unauthorized"}"#).unwrap();
        assert!(env.response.is_none());
        let env: SearchEnvelope =
            serde_json::from_str(r#"{"response": {"numFound": 1, "docs": [{"bibcode": "b", "doctype": "article", "year": "2021", "title": ["T"]}]}}"#)
                .unwrap();
        assert_eq!(env.response.unwrap().docs[0].bibcode, "b");
    }
}
