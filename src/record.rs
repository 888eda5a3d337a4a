use crate::{
    error::{ConstructError, Result},
    feature::{Feature, FeatureKind, Strand},
    feature_location::{from_gb_location, to_gb_location},
    sequence::{self, SequenceStats},
};
use gb_io::seq::{Feature as GbFeature, Seq};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    #[default]
    Linear,
    Circular,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Circular => write!(f, "circular"),
        }
    }
}

impl From<gb_io::seq::Topology> for Topology {
    fn from(topology: gb_io::seq::Topology) -> Self {
        match topology {
            gb_io::seq::Topology::Linear => Self::Linear,
            gb_io::seq::Topology::Circular => Self::Circular,
        }
    }
}

impl From<Topology> for gb_io::seq::Topology {
    fn from(topology: Topology) -> Self {
        match topology {
            Topology::Linear => Self::Linear,
            Topology::Circular => Self::Circular,
        }
    }
}

/// A named nucleotide sequence with its annotations.
///
/// Records are immutable once built: every constructor validates the
/// sequence and every feature bound, so downstream stages never re-check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordData")]
pub struct SequenceRecord {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    sequence: String,
    topology: Topology,
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct RecordData {
    id: String,
    #[serde(default)]
    description: Option<String>,
    sequence: String,
    #[serde(default)]
    topology: Topology,
    #[serde(default)]
    features: Vec<Feature>,
}

impl TryFrom<RecordData> for SequenceRecord {
    type Error = ConstructError;

    fn try_from(data: RecordData) -> Result<Self> {
        let record = if data.sequence.trim().is_empty() {
            Self::pending(&data.id, data.topology)
        } else {
            Self::new(&data.id, &data.sequence, data.topology)?
        };
        let record = record.with_features(data.features)?;
        Ok(match data.description {
            Some(description) => record.with_description(&description),
            None => record,
        })
    }
}

impl SequenceRecord {
    /// Cleans and validates `sequence`. Empty sequences are rejected; use
    /// [`SequenceRecord::pending`] for metadata-only records.
    pub fn new(id: &str, sequence: &str, topology: Topology) -> Result<Self> {
        let sequence = sequence::clean_sequence(sequence);
        if sequence.is_empty() {
            return Err(ConstructError::empty(id));
        }
        sequence::check_nucleotides(id, sequence.as_bytes())?;
        Ok(Self {
            id: id.to_string(),
            description: None,
            sequence,
            topology,
            features: vec![],
        })
    }

    /// A record whose bases have not been fetched yet.
    pub fn pending(id: &str, topology: Topology) -> Self {
        Self {
            id: id.to_string(),
            description: None,
            sequence: String::new(),
            topology,
            features: vec![],
        }
    }

    /// Replaces the feature list after checking every bound against the sequence.
    pub fn with_features(mut self, features: Vec<Feature>) -> Result<Self> {
        for feature in &features {
            self.check_feature(feature)?;
        }
        self.features = features;
        Ok(self)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn check_feature(&self, feature: &Feature) -> Result<()> {
        let len = self.len();
        if feature.start == 0 || feature.end == 0 || feature.start > len || feature.end > len {
            return Err(ConstructError::malformed(
                &self.id,
                format!(
                    "feature '{}' at {}..{} lies outside 1..{len}",
                    feature.label, feature.start, feature.end
                ),
            ));
        }
        if feature.wraps_origin() && !self.is_circular() {
            return Err(ConstructError::malformed(
                &self.id,
                format!(
                    "feature '{}' wraps the origin ({}..{}) on a linear sequence",
                    feature.label, feature.start, feature.end
                ),
            ));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        self.sequence.as_bytes()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn is_circular(&self) -> bool {
        self.topology == Topology::Circular
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn features_of_kind(&self, kind: FeatureKind) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(move |f| f.kind == kind)
    }

    /// The feature's bases in its own reading direction.
    pub fn feature_sequence(&self, feature: &Feature) -> Vec<u8> {
        let forward = feature.extract(self.as_bytes());
        match feature.strand {
            Strand::Forward => forward,
            Strand::Reverse => sequence::reverse_complement(&forward),
        }
    }

    pub fn stats(&self) -> SequenceStats {
        SequenceStats::from_text(&self.sequence)
    }

    pub fn to_gb_seq(&self) -> Seq {
        let mut seq = Seq::empty();
        seq.name = Some(self.id.clone());
        seq.topology = self.topology.into();
        seq.definition = self.description.clone();
        seq.molecule_type = Some("DNA".to_string());
        seq.division = "SYN".to_string();
        seq.len = Some(self.len());
        seq.seq = self.sequence.as_bytes().to_vec();
        seq.features = self
            .features
            .iter()
            .map(|feature| {
                let mut qualifiers: Vec<(_, Option<String>)> =
                    vec![("label".into(), Some(feature.label.clone()))];
                qualifiers.extend(
                    feature
                        .qualifiers
                        .iter()
                        .map(|(k, v)| (k.clone().into(), v.clone())),
                );
                GbFeature {
                    kind: feature.key.clone().into(),
                    location: to_gb_location(feature, self.len()),
                    qualifiers,
                }
            })
            .collect();
        seq
    }

    /// Converts a gb-io record; features with locations that do not reduce to
    /// a single span are dropped with a warning.
    pub fn from_gb_seq(seq: &Seq) -> Result<Self> {
        let id = seq.name.clone().unwrap_or_else(|| "unnamed".to_string());
        let topology = Topology::from(seq.topology.clone());
        let text = String::from_utf8_lossy(&seq.seq);
        let record = Self::new(&id, &text, topology)?;
        let circular = record.is_circular();
        let features = seq
            .features
            .iter()
            .filter_map(|gb| {
                let key = gb.kind.to_string();
                let Some(span) = from_gb_location(&gb.location, circular) else {
                    warn!(record = %id, key = %key, "skipping feature without a usable location");
                    return None;
                };
                let qualifiers = gb
                    .qualifiers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect();
                Some(Feature::from_parts(&key, qualifiers, span.start, span.end, span.strand))
            })
            .collect();
        let record = record.with_features(features)?;
        Ok(match &seq.definition {
            Some(definition) => record.with_description(definition),
            None => record,
        })
    }
}
