//! N-part linear fusion of coding sequences.

use crate::{
    error::{ConstructError, Result},
    feature::{Feature, Strand},
    record::{SequenceRecord, Topology},
    sequence::{self, has_stop_codon},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// (GGGGS)x4 flexible linker.
pub const GGGGS_X4: &str = "GGTGGCGGTGGCTCTGGCGGTGGTGGTTCCGGTGGCGGTGGCTCCGGCGGTGGCGGTAGC";
pub const KOZAK: &str = "GCCACC";

/// Linker used when none is given: (GGGGS)x4 followed by the Kozak motif.
pub fn default_linker() -> String {
    format!("{GGGGS_X4}{KOZAK}")
}

/// How parts are joined. `Direct` is an empty linker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Linker {
    #[default]
    Default,
    Direct,
    Custom(String),
}

impl From<Option<&str>> for Linker {
    fn from(linker: Option<&str>) -> Self {
        match linker {
            None => Self::Default,
            Some(text) if text.trim().is_empty() => Self::Direct,
            Some(text) => Self::Custom(text.to_string()),
        }
    }
}

impl Linker {
    /// The cleaned, validated junction sequence.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Default => Ok(default_linker()),
            Self::Direct => Ok(String::new()),
            Self::Custom(text) => {
                let clean = sequence::clean_sequence(text);
                sequence::check_nucleotides("linker", clean.as_bytes())?;
                Ok(clean)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartRole {
    First,
    Middle,
    Last,
}

impl PartRole {
    fn for_index(index: usize, count: usize) -> Self {
        if index == 0 {
            Self::First
        } else if index + 1 == count {
            Self::Last
        } else {
            Self::Middle
        }
    }

    /// Only the last part keeps its stop codon.
    pub fn strips_stop(self) -> bool {
        self != Self::Last
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FusionPart {
    pub source_id: String,
    pub role: PartRole,
    pub source: String,
    pub trimmed: String,
    pub stop_trimmed: bool,
}

/// Assigns roles and trims trailing stops. The start codon is never removed.
pub fn plan_parts(parts: &[SequenceRecord]) -> Result<Vec<FusionPart>> {
    if parts.len() < 2 {
        return Err(ConstructError::EmptyFusionList { count: parts.len() });
    }
    parts
        .iter()
        .enumerate()
        .map(|(index, record)| {
            if record.is_empty() {
                return Err(ConstructError::empty(record.id()));
            }
            let role = PartRole::for_index(index, parts.len());
            let source = record.sequence();
            let stop_trimmed = role.strips_stop() && has_stop_codon(source.as_bytes());
            let trimmed = if stop_trimmed {
                &source[..source.len() - 3]
            } else {
                source
            };
            debug!(part = record.id(), ?role, stop_trimmed, "fusion part");
            Ok(FusionPart {
                source_id: record.id().to_string(),
                role,
                source: source.to_string(),
                trimmed: trimmed.to_string(),
                stop_trimmed,
            })
        })
        .collect()
}

/// Joins the trimmed parts with the linker. The result is linear, named by
/// the part ids joined with `-`, and carries one `CDS` feature per part.
pub fn fuse(parts: &[SequenceRecord], linker: &Linker) -> Result<SequenceRecord> {
    let planned = plan_parts(parts)?;
    let junction = linker.resolve()?;

    let mut fused = String::new();
    let mut features = Vec::with_capacity(planned.len());
    for (index, part) in planned.iter().enumerate() {
        if index > 0 {
            fused.push_str(&junction);
        }
        let start = fused.len() + 1;
        fused.push_str(&part.trimmed);
        let role = match part.role {
            PartRole::First => "first",
            PartRole::Middle => "middle",
            PartRole::Last => "last",
        };
        features.push(
            Feature::new("CDS", &part.source_id, start, fused.len(), Strand::Forward)
                .with_qualifier("note", Some(&format!("fusion part {} ({role})", index + 1))),
        );
    }

    let id = planned.iter().map(|p| p.source_id.as_str()).collect::<Vec<_>>().join("-");
    debug!(id = %id, parts = planned.len(), linker = junction.len(), length = fused.len(), "fused parts");
    SequenceRecord::new(&id, &fused, Topology::Linear)?.with_features(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAG: &str = "ATGGATTACAAGGATGACGACGAT";

    fn record(id: &str, seq: &str) -> SequenceRecord {
        SequenceRecord::new(id, seq, Topology::Linear).unwrap()
    }

    #[test]
    fn test_default_linker() {
        assert_eq!(GGGGS_X4.len(), 60);
        assert_eq!(default_linker().len(), 66);
        assert!(default_linker().ends_with(KOZAK));
        assert_eq!(Linker::from(None), Linker::Default);
        assert_eq!(Linker::from(Some("")), Linker::Direct);
        assert_eq!(Linker::from(Some("ggt")), Linker::Custom("ggt".to_string()));
    }

    #[test]
    fn test_roles_and_trimming() {
        let parts = [
            record("a", "ATGAAATAA"),
            record("b", "ATGCCCTGA"),
            record("c", "ATGGGGTAG"),
        ];
        let planned = plan_parts(&parts).unwrap();
        let roles: Vec<PartRole> = planned.iter().map(|p| p.role).collect();
        assert_eq!(roles, vec![PartRole::First, PartRole::Middle, PartRole::Last]);
        assert_eq!(planned[0].trimmed, "ATGAAA");
        assert_eq!(planned[1].trimmed, "ATGCCC");
        assert_eq!(planned[2].trimmed, "ATGGGGTAG");
        assert!(planned[0].stop_trimmed && !planned[2].stop_trimmed);
    }

    #[test]
    fn test_direct_fusion_keeps_every_start_codon() {
        let parts = [record("FLAG", FLAG), record("X", "ATGAAATAA")];
        let fused = fuse(&parts, &Linker::Direct).unwrap();
        assert_eq!(fused.sequence(), format!("{FLAG}ATGAAATAA"));
        assert_eq!(fused.id(), "FLAG-X");
        let spans: Vec<(usize, usize)> = fused.features().iter().map(|f| (f.start, f.end)).collect();
        assert_eq!(spans, vec![(1, 24), (25, 33)]);
    }

    #[test]
    fn test_linker_lengths() {
        let parts = [record("a", "ATGAAATAA"), record("b", "ATGCCC")];
        let fused = fuse(&parts, &Linker::Default).unwrap();
        assert_eq!(fused.len(), 6 + 66 + 6);
        assert_eq!(&fused.sequence()[6..72], default_linker());

        let fused = fuse(&parts, &Linker::from(Some("ggt ggc"))).unwrap();
        assert_eq!(fused.sequence(), "ATGAAAGGTGGCATGCCC");
        assert_eq!(fused.features()[1].start, 13);
    }

    #[test]
    fn test_three_part_length() {
        let parts = [
            record("a", "ATGAAATAA"),
            record("b", "ATGCCCTGA"),
            record("c", "ATGGGGTAG"),
        ];
        let linker = default_linker();
        let fused = fuse(&parts, &Linker::Default).unwrap();
        assert_eq!(fused.len(), 6 + linker.len() + 6 + linker.len() + 9);
        assert_eq!(
            fused.sequence(),
            format!("ATGAAA{linker}ATGCCC{linker}ATGGGGTAG")
        );
        let spans: Vec<(usize, usize)> = fused.features().iter().map(|f| (f.start, f.end)).collect();
        assert_eq!(spans, vec![(1, 6), (73, 78), (145, 153)]);
        assert_eq!(fused.id(), "a-b-c");
    }

    #[test]
    fn test_fusion_errors() {
        assert!(matches!(
            fuse(&[record("a", "ATG")], &Linker::Direct),
            Err(ConstructError::EmptyFusionList { count: 1 })
        ));
        assert!(matches!(
            fuse(&[], &Linker::Direct),
            Err(ConstructError::EmptyFusionList { count: 0 })
        ));
        let parts = [record("a", "ATG"), SequenceRecord::pending("b", Topology::Linear)];
        assert!(matches!(
            fuse(&parts, &Linker::Direct),
            Err(ConstructError::EmptySequence { .. })
        ));
        let parts = [record("a", "ATG"), record("b", "ATG")];
        assert!(matches!(
            fuse(&parts, &Linker::from(Some("GGZ"))),
            Err(ConstructError::InvalidNucleotide { record_id, .. }) if record_id == "linker"
        ));
    }
}
