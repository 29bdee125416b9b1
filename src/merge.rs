//! Reconciliation of freshly extracted records with the existing store.

use std::collections::HashMap;

use tracing::debug;

use crate::{normalize::LINK_MARKER, record::Record};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub added: usize,
    pub updated: usize,
    pub kept: usize,
}

impl MergeCounts {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.kept
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub records: Vec<Record>,
    pub counts: MergeCounts,
}

/// Merge `fresh` records into `existing` ones.
///
/// - A fresh record whose key is new is taken as is.
/// - A fresh record whose key exists starts from the fresh data, keeps the existing title when
///   only the existing one carries a link, and inherits every field only the existing record
///   has.
/// - Existing records that were not refetched are kept unchanged, in store order.
///
/// Fresh records sharing a key collapse into the last of them, at the first one's place.
///
/// The result is stably sorted by year, newest first, with unparseable years last.
pub fn merge(fresh: Vec<Record>, existing: Vec<Record>) -> Merged {
    let index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key.clone(), i))
        .collect();
    let mut pending: Vec<Option<Record>> = existing.into_iter().map(Some).collect();

    let mut counts = MergeCounts::default();
    let mut records = Vec::with_capacity(fresh.len() + pending.len());

    for mut rec in dedup_fresh(fresh) {
        match index.get(&rec.key).and_then(|&i| pending[i].take()) {
            Some(old) => {
                reconcile(&mut rec, &old);
                counts.updated += 1;
            }
            None => counts.added += 1,
        }
        records.push(rec);
    }

    for old in pending.into_iter().flatten() {
        records.push(old);
        counts.kept += 1;
    }

    records.sort_by_key(|r| std::cmp::Reverse(r.year()));
    Merged { records, counts }
}

fn dedup_fresh(fresh: Vec<Record>) -> Vec<Record> {
    let mut out: Vec<Record> = Vec::with_capacity(fresh.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for rec in fresh {
        match seen.get(&rec.key) {
            Some(&i) => {
                debug!(key = %rec.key, "key extracted twice, keeping the later record");
                out[i] = rec;
            }
            None => {
                seen.insert(rec.key.clone(), out.len());
                out.push(rec);
            }
        }
    }
    out
}

fn has_link(rec: &Record) -> bool {
    rec.get("title").is_some_and(|t| t.contains(LINK_MARKER))
}

fn reconcile(rec: &mut Record, old: &Record) {
    if has_link(old) && !has_link(rec) {
        rec.copy_from(old, "title");
    }
    for field in old.fields() {
        if !rec.contains(&field.name) {
            rec.copy_from(old, &field.name);
        }
    }
}
