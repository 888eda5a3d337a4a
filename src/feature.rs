//! Positioned, typed annotations and the controlled vocabulary that types them.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Promoter,
    Origin,
    ResistanceMarker,
    #[serde(rename = "polyA_signal")]
    PolyASignal,
    Mcs,
    Cds,
    Other,
}

impl FeatureKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Promoter => "promoter",
            Self::Origin => "origin",
            Self::ResistanceMarker => "resistance_marker",
            Self::PolyASignal => "polyA_signal",
            Self::Mcs => "mcs",
            Self::Cds => "cds",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }
}

pub type Qualifier = (String, Option<String>);

lazy_static! {
    /// Normalized feature key -> kind. Anything missing is `Other`.
    static ref KEY_KINDS: HashMap<&'static str, FeatureKind> = HashMap::from([
        ("promoter", FeatureKind::Promoter),
        ("enhancer_promoter", FeatureKind::Promoter),
        ("rep_origin", FeatureKind::Origin),
        ("origin_of_replication", FeatureKind::Origin),
        ("ori", FeatureKind::Origin),
        ("resistance_marker", FeatureKind::ResistanceMarker),
        ("selectable_marker", FeatureKind::ResistanceMarker),
        ("polya_signal", FeatureKind::PolyASignal),
        ("polya_site", FeatureKind::PolyASignal),
        ("mcs", FeatureKind::Mcs),
        ("multiple_cloning_site", FeatureKind::Mcs),
        ("cds", FeatureKind::Cds),
    ]);

    /// INSDC `/regulatory_class` value -> kind for `regulatory` features.
    /// Classes missing here, such as `enhancer` or `terminator`, stay `Other`.
    static ref REGULATORY_CLASSES: HashMap<&'static str, FeatureKind> = HashMap::from([
        ("promoter", FeatureKind::Promoter),
        ("minus_10_signal", FeatureKind::Promoter),
        ("minus_35_signal", FeatureKind::Promoter),
        ("tata_box", FeatureKind::Promoter),
        ("polya_signal_sequence", FeatureKind::PolyASignal),
        ("polya_site", FeatureKind::PolyASignal),
    ]);

    /// Label/qualifier hints that refine a `cds`, `gene` or unrecognized key.
    static ref LABEL_HINTS: Vec<(&'static str, FeatureKind)> = vec![
        ("promoter", FeatureKind::Promoter),
        ("multiple cloning site", FeatureKind::Mcs),
        ("mcs", FeatureKind::Mcs),
        ("poly(a)", FeatureKind::PolyASignal),
        ("polya", FeatureKind::PolyASignal),
        ("resistance", FeatureKind::ResistanceMarker),
        ("ampr", FeatureKind::ResistanceMarker),
        ("kanr", FeatureKind::ResistanceMarker),
        ("neor", FeatureKind::ResistanceMarker),
        ("cmr", FeatureKind::ResistanceMarker),
        ("hygr", FeatureKind::ResistanceMarker),
        ("puror", FeatureKind::ResistanceMarker),
        ("bsdr", FeatureKind::ResistanceMarker),
        ("zeor", FeatureKind::ResistanceMarker),
        ("specr", FeatureKind::ResistanceMarker),
        ("tetr", FeatureKind::ResistanceMarker),
        ("bla", FeatureKind::ResistanceMarker),
        ("nptii", FeatureKind::ResistanceMarker),
    ];
}

/// Qualifiers whose values feed the kind hints, in label-fallback order.
const NAMING_QUALIFIERS: [&str; 4] = ["label", "gene", "product", "note"];

pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

fn hint_matches(text: &str, hint: &str) -> bool {
    if hint.bytes().all(|b| b.is_ascii_alphanumeric()) {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == hint)
    } else {
        text.contains(hint)
    }
}

fn naming_text(label: &str, qualifiers: &[Qualifier]) -> String {
    let mut text = label.to_ascii_lowercase();
    for (name, value) in qualifiers {
        if let Some(value) = value {
            if NAMING_QUALIFIERS.contains(&name.as_str()) {
                text.push(' ');
                text.push_str(&value.to_ascii_lowercase());
            }
        }
    }
    text
}

fn regulatory_kind(qualifiers: &[Qualifier]) -> Option<FeatureKind> {
    qualifiers
        .iter()
        .filter(|(name, _)| name == "regulatory_class")
        .filter_map(|(_, value)| value.as_deref())
        .find_map(|class| REGULATORY_CLASSES.get(normalize_key(class).as_str()).copied())
}

/// Infers the kind from the feature key, then lets naming qualifiers refine
/// keys that do not pin the biology down on their own.
pub fn infer_kind(key: &str, label: &str, qualifiers: &[Qualifier]) -> FeatureKind {
    let key = normalize_key(key);
    if key == "regulatory" {
        if let Some(kind) = regulatory_kind(qualifiers) {
            return kind;
        }
    }
    let base = KEY_KINDS
        .get(key.as_str())
        .copied()
        .unwrap_or(FeatureKind::Other);
    if !matches!(base, FeatureKind::Cds | FeatureKind::Other) {
        return base;
    }

    let text = naming_text(label, qualifiers);
    LABEL_HINTS
        .iter()
        .filter(|(_, kind)| base == FeatureKind::Other || *kind == FeatureKind::ResistanceMarker)
        .find(|(hint, _)| hint_matches(&text, hint))
        .map(|(_, kind)| *kind)
        .unwrap_or(base)
}

/// A feature in 1-based inclusive coordinates.
///
/// `start > end` only occurs on circular parents and means the feature runs
/// past the last base and continues at position 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub key: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
}

impl Feature {
    pub fn new(key: &str, label: &str, start: usize, end: usize, strand: Strand) -> Self {
        Self {
            kind: infer_kind(key, label, &[]),
            key: key.to_string(),
            label: label.to_string(),
            start,
            end,
            strand,
            qualifiers: vec![],
        }
    }

    /// Builds a feature the way the flat-file parser sees it: the `/label`
    /// qualifier becomes the label, otherwise the first naming qualifier or
    /// the key itself does.
    pub fn from_parts(
        key: &str,
        mut qualifiers: Vec<Qualifier>,
        start: usize,
        end: usize,
        strand: Strand,
    ) -> Self {
        let label = match qualifiers.iter().position(|(name, _)| name == "label") {
            Some(idx) => qualifiers.remove(idx).1.unwrap_or_default(),
            None => NAMING_QUALIFIERS[1..]
                .iter()
                .find_map(|name| {
                    qualifiers
                        .iter()
                        .find(|(k, v)| k == name && v.is_some())
                        .and_then(|(_, v)| v.clone())
                })
                .unwrap_or_else(|| key.to_string()),
        };
        Self {
            kind: infer_kind(key, &label, &qualifiers),
            key: key.to_string(),
            label,
            start,
            end,
            strand,
            qualifiers,
        }
    }

    pub fn with_qualifier(mut self, name: &str, value: Option<&str>) -> Self {
        self.qualifiers
            .push((name.to_string(), value.map(str::to_string)));
        self.kind = infer_kind(&self.key, &self.label, &self.qualifiers);
        self
    }

    pub fn qualifier(&self, name: &str) -> Option<&str> {
        self.qualifiers
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// A promoter named after the selection marker it drives, such as
    /// `AmpR promoter` or `NeoR/KanR promoter`.
    pub fn is_marker_promoter(&self) -> bool {
        if self.kind != FeatureKind::Promoter {
            return false;
        }
        let text = naming_text(&self.label, &self.qualifiers);
        LABEL_HINTS
            .iter()
            .filter(|(_, kind)| *kind == FeatureKind::ResistanceMarker)
            .any(|(hint, _)| hint_matches(&text, hint))
    }

    #[inline(always)]
    pub fn wraps_origin(&self) -> bool {
        self.start > self.end
    }

    pub fn span_len(&self, parent_len: usize) -> usize {
        if self.wraps_origin() {
            parent_len - self.start + 1 + self.end
        } else {
            self.end - self.start + 1
        }
    }

    pub fn contains(&self, pos: usize) -> bool {
        if self.wraps_origin() {
            pos >= self.start || pos <= self.end
        } else {
            pos >= self.start && pos <= self.end
        }
    }

    /// Whether any base of `from..=to` lies inside the feature. An empty
    /// span (`to < from`) overlaps nothing.
    pub fn overlaps(&self, from: usize, to: usize) -> bool {
        if to < from {
            return false;
        }
        if self.wraps_origin() {
            to >= self.start || from <= self.end
        } else {
            from <= self.end && to >= self.start
        }
    }

    /// The feature's bases on the forward strand of `parent`.
    pub fn extract(&self, parent: &[u8]) -> Vec<u8> {
        if self.start == 0 || self.end > parent.len() || self.start > parent.len() {
            return vec![];
        }
        if self.wraps_origin() {
            parent[self.start - 1..]
                .iter()
                .chain(parent[..self.end].iter())
                .copied()
                .collect()
        } else {
            parent[self.start - 1..self.end].to_vec()
        }
    }

    pub(crate) fn moved(&self, start: usize, end: usize, strand: Strand) -> Self {
        Self {
            start,
            end,
            strand,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quals(pairs: &[(&str, &str)]) -> Vec<Qualifier> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    #[test]
    fn test_infer_kind_from_key() {
        assert_eq!(infer_kind("promoter", "CMV", &[]), FeatureKind::Promoter);
        assert_eq!(infer_kind("rep_origin", "pUC ori", &[]), FeatureKind::Origin);
        assert_eq!(infer_kind("polyA_signal", "bGH", &[]), FeatureKind::PolyASignal);
        assert_eq!(infer_kind("CDS", "EGFP", &[]), FeatureKind::Cds);
        assert_eq!(infer_kind("protein_bind", "lacO", &[]), FeatureKind::Other);
        assert_eq!(infer_kind("source", "source", &[]), FeatureKind::Other);
    }

    #[test]
    fn test_infer_kind_refines_with_hints() {
        assert_eq!(infer_kind("CDS", "AmpR", &[]), FeatureKind::ResistanceMarker);
        assert_eq!(
            infer_kind("CDS", "x", &quals(&[("product", "beta-lactamase (bla)")])),
            FeatureKind::ResistanceMarker
        );
        assert_eq!(
            infer_kind("misc_feature", "MCS", &[]),
            FeatureKind::Mcs
        );
        assert_eq!(
            infer_kind("misc_feature", "x", &quals(&[("note", "multiple cloning site")])),
            FeatureKind::Mcs
        );
        assert_eq!(
            infer_kind("misc_feature", "SV40 poly(A) signal", &[]),
            FeatureKind::PolyASignal
        );
        // a promoter stays a promoter no matter what it drives
        assert_eq!(infer_kind("promoter", "AmpR promoter", &[]), FeatureKind::Promoter);
        // CDS keys are only refined towards markers
        assert_eq!(infer_kind("CDS", "MCS-tag", &[]), FeatureKind::Cds);
        // whole words only
        assert_eq!(infer_kind("CDS", "blast", &[]), FeatureKind::Cds);
    }

    #[test]
    fn test_regulatory_class_sets_kind() {
        let promoter = Feature::from_parts(
            "regulatory",
            quals(&[("regulatory_class", "promoter")]),
            1,
            8,
            Strand::Forward,
        );
        let poly_a = Feature::from_parts(
            "regulatory",
            quals(&[("regulatory_class", "polyA_signal_sequence"), ("note", "bGH")]),
            10,
            18,
            Strand::Forward,
        );
        let enhancer = Feature::from_parts(
            "regulatory",
            quals(&[("regulatory_class", "enhancer"), ("note", "CMV enhancer")]),
            20,
            30,
            Strand::Forward,
        );
        assert_eq!(promoter.kind, FeatureKind::Promoter);
        assert_eq!(poly_a.kind, FeatureKind::PolyASignal);
        assert_eq!(enhancer.kind, FeatureKind::Other);
        assert_eq!(infer_kind("regulatory", "x", &[]), FeatureKind::Other);
    }

    #[test]
    fn test_marker_promoters() {
        let amp = Feature::new("promoter", "AmpR promoter", 1, 10, Strand::Forward);
        assert!(amp.is_marker_promoter());
        assert!(Feature::new("promoter", "NeoR/KanR promoter", 1, 10, Strand::Forward).is_marker_promoter());
        assert!(!Feature::new("promoter", "CMV promoter", 1, 10, Strand::Forward).is_marker_promoter());
        assert!(!Feature::new("promoter", "SV40 promoter", 1, 10, Strand::Forward).is_marker_promoter());
        // promoter labels on generic keys still count as promoters
        let lac = Feature::new("misc_feature", "lac promoter", 1, 10, Strand::Forward);
        assert_eq!(lac.kind, FeatureKind::Promoter);
        let amp_misc = Feature::new("misc_feature", "AmpR promoter", 1, 10, Strand::Forward);
        assert_eq!(amp_misc.kind, FeatureKind::Promoter);
        assert!(amp_misc.is_marker_promoter());
    }

    #[test]
    fn test_from_parts_label_fallback() {
        let f = Feature::from_parts(
            "CDS",
            quals(&[("gene", "neo"), ("label", "NeoR/KanR")]),
            10,
            20,
            Strand::Forward,
        );
        assert_eq!(f.label, "NeoR/KanR");
        assert_eq!(f.qualifiers, quals(&[("gene", "neo")]));
        assert_eq!(f.kind, FeatureKind::ResistanceMarker);

        let f = Feature::from_parts("CDS", quals(&[("product", "EGFP")]), 1, 720, Strand::Forward);
        assert_eq!(f.label, "EGFP");
        assert_eq!(f.kind, FeatureKind::Cds);

        let f = Feature::from_parts("rep_origin", vec![], 1, 20, Strand::Reverse);
        assert_eq!(f.label, "rep_origin");
    }

    #[test]
    fn test_wrapping_geometry() {
        let f = Feature::new("misc_feature", "wrap", 8, 2, Strand::Forward);
        assert!(f.wraps_origin());
        assert_eq!(f.span_len(10), 5);
        assert!(f.contains(9) && f.contains(1) && !f.contains(5));
        assert!(f.overlaps(1, 1));
        assert!(!f.overlaps(3, 7));
        assert_eq!(f.extract(b"ABCDEFGHIJ"), b"HIJAB".to_vec());

        let f = Feature::new("CDS", "lin", 3, 5, Strand::Forward);
        assert_eq!(f.span_len(10), 3);
        assert!(f.overlaps(5, 9));
        assert!(!f.overlaps(6, 9));
        assert!(!f.overlaps(4, 3));
        assert_eq!(f.extract(b"ABCDEFGHIJ"), b"CDE".to_vec());
    }
}
