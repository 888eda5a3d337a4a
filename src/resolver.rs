//! Record lookup. The core only ever reads through [`RecordResolver`];
//! [`Catalog`] is the read-only in-memory implementation loaded from JSON.

use crate::{
    error::{ConstructError, Result},
    feature::{Feature, Strand},
    record::{SequenceRecord, Topology},
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};
use tracing::debug;

pub trait RecordResolver {
    fn resolve(&self, id: &str) -> Option<SequenceRecord>;
}

impl<F> RecordResolver for F
where
    F: Fn(&str) -> Option<SequenceRecord>,
{
    fn resolve(&self, id: &str) -> Option<SequenceRecord> {
        self(id)
    }
}

/// Resolves or fails with [`ConstructError::UnresolvedRecord`].
pub fn resolve_required(resolver: &impl RecordResolver, id: &str) -> Result<SequenceRecord> {
    resolver
        .resolve(id)
        .ok_or_else(|| ConstructError::UnresolvedRecord {
            record_id: id.to_string(),
        })
}

lazy_static! {
    static ref TRAILING_PLUS: Regex = Regex::new(r"\+\s*$").expect("valid regex");
    static ref TRAILING_MINUS: Regex = Regex::new(r"-\s*$").expect("valid regex");
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]").expect("valid regex");
}

/// Lowercase alphanumeric lookup key. Polarity suffixes survive as
/// `plus`/`minus`, so `pcDNA3.1(+)` and `pcDNA3.1(-)` stay distinct.
pub fn normalize_name(name: &str) -> String {
    let name = name.replace("(+)", "plus").replace("(-)", "minus");
    let name = TRAILING_PLUS.replace(&name, "plus");
    let name = TRAILING_MINUS.replace(&name, "minus");
    NON_ALNUM
        .replace_all(&name.to_lowercase(), "")
        .to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogFeature {
    #[serde(alias = "name")]
    pub label: String,
    #[serde(alias = "type")]
    pub key: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub strand: Strand,
}

#[derive(Clone, Debug, Deserialize)]
pub struct McsPosition {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sequence: String,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default)]
    pub features: Vec<CatalogFeature>,
    #[serde(default)]
    pub mcs_position: Option<McsPosition>,
}

impl CatalogEntry {
    fn to_record(&self, id: &str) -> Result<SequenceRecord> {
        let record = if self.sequence.trim().is_empty() {
            SequenceRecord::pending(id, self.topology)
        } else {
            SequenceRecord::new(id, &self.sequence, self.topology)?
        };
        let mut features: Vec<Feature> = self
            .features
            .iter()
            .map(|f| Feature::new(&f.key, &f.label, f.start, f.end, f.strand))
            .collect();
        if let Some(mcs) = &self.mcs_position {
            let note = mcs
                .description
                .as_deref()
                .unwrap_or("multiple cloning site");
            features.push(
                Feature::new("misc_feature", "MCS", mcs.start, mcs.end, Strand::Forward)
                    .with_qualifier("note", Some(note)),
            );
        }
        let record = record.with_features(features)?;
        Ok(match &self.description {
            Some(description) => record.with_description(description),
            None => record,
        })
    }
}

/// Validated records keyed by id, plus a normalized alias index.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    records: HashMap<String, SequenceRecord>,
    aliases: HashMap<String, String>,
}

impl Catalog {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let entries: HashMap<String, CatalogEntry> = serde_json::from_str(text)?;
        let mut catalog = Self::default();
        for (id, entry) in &entries {
            catalog.insert(entry.to_record(id)?);
            for alias in entry.aliases.iter().chain(entry.name.iter()) {
                catalog
                    .aliases
                    .insert(normalize_name(alias), id.to_string());
            }
        }
        debug!(records = catalog.records.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn insert(&mut self, record: SequenceRecord) {
        self.aliases
            .insert(normalize_name(record.id()), record.id().to_string());
        self.records.insert(record.id().to_string(), record);
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordResolver for Catalog {
    fn resolve(&self, id: &str) -> Option<SequenceRecord> {
        if let Some(record) = self.records.get(id) {
            return Some(record.clone());
        }
        self.aliases
            .get(&normalize_name(id))
            .and_then(|canonical| self.records.get(canonical))
            .cloned()
    }
}
