//! Two-part splice and replace of an insert into a backbone.

use crate::{
    error::{ConstructError, Result},
    feature::{Feature, Strand},
    record::{SequenceRecord, Topology},
    sequence,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Forward,
    Reverse,
}

impl Orientation {
    pub fn strand(self) -> Strand {
        match self {
            Self::Forward => Strand::Forward,
            Self::Reverse => Strand::Reverse,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Reverse => write!(f, "reverse"),
        }
    }
}

/// An assembled sequence and enough bookkeeping to undo the edit.
///
/// `insert_start..=insert_end` are the 1-based positions of the (possibly
/// reverse-complemented) insert in `sequence`; `replaced` holds the backbone
/// bases that were removed in its place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Construct {
    sequence: String,
    backbone_ref: String,
    insert_ref: String,
    insert_start: usize,
    insert_end: usize,
    orientation: Orientation,
    topology: Topology,
    replaced: String,
}

/// Where an insert of `insert_len` bases lands at 1-based `position`,
/// replacing `replaced_len` backbone bases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splice {
    pub position: usize,
    pub replaced_len: usize,
    pub insert_len: usize,
    pub topology: Topology,
}

impl Splice {
    /// Last backbone base that was removed, or `P - 1` for a pure insertion.
    pub fn replace_end(&self) -> usize {
        self.position - 1 + self.replaced_len
    }

    /// Backbone span removed by a replacement, `None` for a pure insertion.
    pub fn edited_span(&self) -> Option<(usize, usize)> {
        (self.replaced_len > 0).then(|| (self.position, self.replace_end()))
    }

    /// Net length change of the backbone.
    pub fn shift(&self) -> isize {
        self.insert_len as isize - self.replaced_len as isize
    }

    /// Where a backbone base ended up. `None` for bases that were replaced.
    pub fn map_position(&self, pos: usize) -> Option<usize> {
        if pos < self.position {
            Some(pos)
        } else if pos <= self.replace_end() {
            None
        } else {
            Some(pos - self.replaced_len + self.insert_len)
        }
    }

    /// Backbone neighbours of the junction: the base before the insert and
    /// the first base after the replaced span, wrapping on circular backbones.
    fn junction_neighbours(&self, backbone_len: usize) -> (Option<usize>, Option<usize>) {
        let circular = self.topology == Topology::Circular;
        let left = match self.position - 1 {
            0 if circular => Some(backbone_len),
            0 => None,
            pos => Some(pos),
        };
        let right = match self.replace_end() + 1 {
            pos if pos > backbone_len && circular => Some(1),
            pos if pos > backbone_len => None,
            pos => Some(pos),
        };
        (left, right)
    }

    /// Moves a backbone feature into construct coordinates. Features that lose
    /// bases to a replacement or are split by the insert have no image.
    pub fn map_feature(&self, feature: &Feature, backbone_len: usize) -> Option<Feature> {
        if let Some((from, to)) = self.edited_span() {
            if feature.overlaps(from, to) {
                return None;
            }
        }
        if let (Some(left), Some(right)) = self.junction_neighbours(backbone_len) {
            if feature.contains(left) && feature.contains(right) {
                return None;
            }
        }
        let start = self.map_position(feature.start)?;
        let end = self.map_position(feature.end)?;
        Some(feature.moved(start, end, feature.strand))
    }
}

/// Builds `backbone[..P-1] + insert' + backbone[E..]` where `E` is
/// `replace_region_end` or `P - 1` for a pure insertion.
///
/// All coordinates are 1-based. No frame correction is attempted.
pub fn assemble(
    backbone: &SequenceRecord,
    insert: &SequenceRecord,
    insertion_position: usize,
    replace_region_end: Option<usize>,
    reverse_complement_insert: bool,
) -> Result<Construct> {
    if backbone.is_empty() {
        return Err(ConstructError::empty(backbone.id()));
    }
    if insert.is_empty() {
        return Err(ConstructError::empty(insert.id()));
    }

    let len = backbone.len();
    if insertion_position == 0 || insertion_position > len + 1 {
        return Err(ConstructError::OutOfBounds {
            record_id: backbone.id().to_string(),
            index: insertion_position,
            lower: 1,
            upper: len + 1,
        });
    }
    let upstream_end = insertion_position - 1;
    let downstream_start = match replace_region_end {
        Some(end) if end < insertion_position || end > len => {
            return Err(ConstructError::OutOfBounds {
                record_id: backbone.id().to_string(),
                index: end,
                lower: insertion_position,
                upper: len,
            });
        }
        Some(end) => end,
        None => upstream_end,
    };

    let source = backbone.sequence();
    let insert_seq = if reverse_complement_insert {
        sequence::reverse_complement_str(insert.sequence())
    } else {
        insert.sequence().to_string()
    };

    let mut assembled = String::with_capacity(len - (downstream_start - upstream_end) + insert_seq.len());
    assembled.push_str(&source[..upstream_end]);
    assembled.push_str(&insert_seq);
    assembled.push_str(&source[downstream_start..]);

    let construct = Construct {
        backbone_ref: backbone.id().to_string(),
        insert_ref: insert.id().to_string(),
        insert_start: insertion_position,
        insert_end: upstream_end + insert_seq.len(),
        orientation: if reverse_complement_insert {
            Orientation::Reverse
        } else {
            Orientation::Forward
        },
        topology: backbone.topology(),
        replaced: source[upstream_end..downstream_start].to_string(),
        sequence: assembled,
    };
    info!(
        backbone = %construct.backbone_ref,
        insert = %construct.insert_ref,
        position = insertion_position,
        replaced = construct.replaced.len(),
        orientation = %construct.orientation,
        length = construct.len(),
        "assembled construct"
    );
    Ok(construct)
}

impl Construct {
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

    pub fn backbone_ref(&self) -> &str {
        &self.backbone_ref
    }

    pub fn insert_ref(&self) -> &str {
        &self.insert_ref
    }

    pub fn insert_start(&self) -> usize {
        self.insert_start
    }

    pub fn insert_end(&self) -> usize {
        self.insert_end
    }

    pub fn insert_len(&self) -> usize {
        self.insert_end + 1 - self.insert_start
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn replaced(&self) -> &str {
        &self.replaced
    }

    pub fn replaced_len(&self) -> usize {
        self.replaced.len()
    }

    /// The insert as it sits in the construct.
    pub fn insert_sequence(&self) -> &str {
        &self.sequence[self.insert_start - 1..self.insert_end]
    }

    /// The edit as a coordinate mapping from backbone to construct.
    pub fn splice(&self) -> Splice {
        Splice {
            position: self.insert_start,
            replaced_len: self.replaced.len(),
            insert_len: self.insert_len(),
            topology: self.topology,
        }
    }

    pub fn edited_span(&self) -> Option<(usize, usize)> {
        self.splice().edited_span()
    }

    pub fn shift(&self) -> isize {
        self.splice().shift()
    }

    pub fn map_backbone_position(&self, pos: usize) -> Option<usize> {
        self.splice().map_position(pos)
    }

    pub fn map_feature(&self, feature: &Feature, backbone_len: usize) -> Option<Feature> {
        self.splice().map_feature(feature, backbone_len)
    }

    /// Moves a feature of the insert record into construct coordinates,
    /// mirroring it when the insert was reverse-complemented.
    pub fn map_insert_feature(&self, feature: &Feature) -> Option<Feature> {
        if feature.wraps_origin() || feature.end > self.insert_len() {
            return None;
        }
        let offset = self.insert_start - 1;
        Some(match self.orientation {
            Orientation::Forward => feature.moved(
                offset + feature.start,
                offset + feature.end,
                feature.strand,
            ),
            Orientation::Reverse => {
                let len = self.insert_len();
                feature.moved(
                    offset + len - feature.end + 1,
                    offset + len - feature.start + 1,
                    feature.strand.flipped(),
                )
            }
        })
    }

    /// Removes the insert and puts the replaced bases back.
    pub fn restore_backbone(&self) -> String {
        let mut restored = String::with_capacity(self.len() - self.insert_len() + self.replaced_len());
        restored.push_str(&self.sequence[..self.insert_start - 1]);
        restored.push_str(&self.replaced);
        restored.push_str(&self.sequence[self.insert_end..]);
        restored
    }

    /// The `CDS` annotation covering the whole insert.
    pub fn insert_feature(&self) -> Feature {
        Feature::new(
            "CDS",
            &self.insert_ref,
            self.insert_start,
            self.insert_end,
            self.orientation.strand(),
        )
        .with_qualifier("note", Some(&format!("Insert: {}", self.insert_ref)))
    }

    /// Feature table of the construct: the insert CDS, the insert's own
    /// features, then every backbone feature that survived the edit.
    pub fn annotations(&self, backbone: &SequenceRecord, insert: &SequenceRecord) -> Vec<Feature> {
        let insert_features = insert
            .features()
            .iter()
            .filter_map(|f| self.map_insert_feature(f));
        let backbone_features = backbone
            .features()
            .iter()
            .filter_map(|f| self.map_feature(f, backbone.len()));
        std::iter::once(self.insert_feature())
            .chain(insert_features)
            .chain(backbone_features)
            .unique_by(|f| (f.key.clone(), f.start, f.end, f.strand))
            .sorted_by_key(|f| f.start)
            .collect()
    }

    /// Locus-style name, `{insert}_in_{backbone}`.
    pub fn name(&self) -> String {
        format!("{}_in_{}", self.insert_ref, self.backbone_ref)
    }

    pub fn description(&self) -> String {
        format!("{} in {}, {} bp", self.insert_ref, self.backbone_ref, self.len())
    }

    pub fn to_record(&self, backbone: &SequenceRecord, insert: &SequenceRecord) -> Result<SequenceRecord> {
        Ok(SequenceRecord::new(&self.name(), &self.sequence, self.topology)?
            .with_features(self.annotations(backbone, insert))?
            .with_description(&self.description()))
    }
}
