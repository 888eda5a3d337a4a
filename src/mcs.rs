//! Multiple cloning site detection by recognition-site scanning.
//!
//! Sites are only located, never cut. Coordinates are 1-based inclusive.

use crate::{
    assembler::Orientation,
    feature::{Feature, FeatureKind},
    record::SequenceRecord,
    sequence::find_all_subsequences,
};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Recognition sites commonly found in vector MCS regions.
pub const COMMON_MCS_ENZYMES: [(&str, &str); 11] = [
    ("EcoRI", "GAATTC"),
    ("BamHI", "GGATCC"),
    ("KpnI", "GGTACC"),
    ("XbaI", "TCTAGA"),
    ("SalI", "GTCGAC"),
    ("PstI", "CTGCAG"),
    ("NotI", "GCGGCCGC"),
    ("XhoI", "CTCGAG"),
    ("NheI", "GCTAGC"),
    ("SmaI", "CCCGGG"),
    ("ApaI", "GGGCCC"),
];

/// Sites further apart than this (end of one to start of the next) start a new cluster.
pub const DEFAULT_MAX_GAP: usize = 40;
const MIN_CLUSTER_SITES: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionSite {
    pub enzyme: String,
    pub recognition: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct McsBounds {
    pub start: usize,
    pub end: usize,
    pub sites: Vec<RestrictionSite>,
}

impl McsBounds {
    pub fn unique_enzymes(&self) -> usize {
        count_unique_enzymes(&self.sites)
    }

    fn center(&self) -> f64 {
        (self.start + self.end) as f64 / 2.0
    }
}

fn count_unique_enzymes(sites: &[RestrictionSite]) -> usize {
    sites.iter().map(|s| s.enzyme.as_str()).unique().count()
}

/// All forward-strand occurrences of the common MCS sites, ordered by start.
pub fn find_mcs_sites(seq: &[u8]) -> Vec<RestrictionSite> {
    let seq = seq.to_ascii_uppercase();
    let mut sites: Vec<RestrictionSite> = COMMON_MCS_ENZYMES
        .par_iter()
        .flat_map_iter(|(enzyme, recognition)| {
            find_all_subsequences(&seq, recognition.as_bytes())
                .into_iter()
                .map(move |offset| RestrictionSite {
                    enzyme: enzyme.to_string(),
                    recognition: recognition.to_string(),
                    start: offset + 1,
                    end: offset + recognition.len(),
                })
        })
        .collect();
    sites.sort_by_key(|site| site.start);
    sites
}

/// The densest cluster of sites: the one with the most distinct enzymes,
/// the first on ties. Needs at least three sites.
pub fn find_mcs_boundaries(seq: &[u8], max_gap: usize) -> Option<McsBounds> {
    let sites = find_mcs_sites(seq);
    if sites.len() < MIN_CLUSTER_SITES {
        warn!(sites = sites.len(), "not enough restriction sites for an MCS");
        return None;
    }

    let mut clusters: Vec<Vec<RestrictionSite>> = vec![];
    for site in sites {
        match clusters.last_mut() {
            Some(cluster)
                if cluster
                    .last()
                    .is_some_and(|prev| site.start as isize - prev.end as isize - 1 <= max_gap as isize) =>
            {
                cluster.push(site)
            }
            _ => clusters.push(vec![site]),
        }
    }

    let mut best: Option<Vec<RestrictionSite>> = None;
    for cluster in clusters {
        let better = best
            .as_ref()
            .is_none_or(|b| count_unique_enzymes(&cluster) > count_unique_enzymes(b));
        if better {
            best = Some(cluster);
        }
    }
    let best = best?;
    if best.len() < MIN_CLUSTER_SITES {
        warn!(sites = best.len(), "no dense restriction site cluster");
        return None;
    }
    let start = best.first()?.start;
    let end = best.last()?.end;
    debug!(start, end, sites = best.len(), "MCS cluster");
    Some(McsBounds {
        start,
        end,
        sites: best,
    })
}

pub(crate) fn is_expression_promoter(feature: &Feature) -> bool {
    feature.kind == FeatureKind::Promoter && !feature.is_marker_promoter()
}

/// Forward when the nearest expression promoter sits upstream of the MCS,
/// reverse when it sits downstream. Without promoters the MCS reads forward.
pub fn detect_mcs_direction(start: usize, end: usize, features: &[Feature]) -> Orientation {
    let center = (start + end) as f64 / 2.0;
    let distance = |f: &Feature| (f.start as f64 - center).abs().min((f.end as f64 - center).abs());
    let nearest = features
        .iter()
        .filter(|f| is_expression_promoter(f))
        .min_by(|a, b| distance(a).total_cmp(&distance(b)));
    match nearest {
        Some(promoter) if (promoter.start + promoter.end) as f64 / 2.0 > center => Orientation::Reverse,
        _ => Orientation::Forward,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteSource {
    AnnotatedMcs,
    RestrictionCluster,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionSite {
    pub position: usize,
    pub orientation: Orientation,
    pub source: SiteSource,
    pub mcs_start: usize,
    pub mcs_end: usize,
}

/// Picks the promoter-proximal end of the MCS: the first MCS base when the
/// cassette reads forward, the base after the MCS when it reads in reverse.
pub fn suggest_insertion_site(backbone: &SequenceRecord) -> Option<InsertionSite> {
    let annotated = backbone
        .features_of_kind(FeatureKind::Mcs)
        .find(|f| !f.wraps_origin())
        .map(|f| (f.start, f.end, SiteSource::AnnotatedMcs));
    let (start, end, source) = match annotated {
        Some(found) => found,
        None => {
            let bounds = find_mcs_boundaries(backbone.as_bytes(), DEFAULT_MAX_GAP)?;
            (bounds.start, bounds.end, SiteSource::RestrictionCluster)
        }
    };
    let orientation = detect_mcs_direction(start, end, backbone.features());
    let position = match orientation {
        Orientation::Forward => start,
        Orientation::Reverse => end + 1,
    };
    debug!(backbone = backbone.id(), position, %orientation, ?source, "suggested insertion site");
    Some(InsertionSite {
        position,
        orientation,
        source,
        mcs_start: start,
        mcs_end: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{feature::Strand, record::Topology};

    // EcoRI, BamHI, XhoI packed together; a lone NotI far away
    fn polylinker() -> String {
        format!(
            "{}GAATTCAAGGATCCTTCTCGAG{}GCGGCCGC{}",
            "A".repeat(100),
            "T".repeat(200),
            "A".repeat(50)
        )
    }

    #[test]
    fn test_find_mcs_sites() {
        let sites = find_mcs_sites(polylinker().as_bytes());
        let names: Vec<&str> = sites.iter().map(|s| s.enzyme.as_str()).collect();
        assert_eq!(names, vec!["EcoRI", "BamHI", "XhoI", "NotI"]);
        assert_eq!((sites[0].start, sites[0].end), (101, 106));
        assert_eq!((sites[1].start, sites[1].end), (109, 114));
        assert_eq!((sites[3].start, sites[3].end), (323, 330));
        assert!(find_mcs_sites(b"gaattc")[0].start == 1);
    }

    #[test]
    fn test_find_mcs_boundaries() {
        let bounds = find_mcs_boundaries(polylinker().as_bytes(), DEFAULT_MAX_GAP).unwrap();
        assert_eq!((bounds.start, bounds.end), (101, 122));
        assert_eq!(bounds.unique_enzymes(), 3);

        // a gap above the limit splits the cluster below three sites
        assert!(find_mcs_boundaries(polylinker().as_bytes(), 1).is_none());
        assert!(find_mcs_boundaries(b"GAATTCGGATCC", DEFAULT_MAX_GAP).is_none());
    }

    #[test]
    fn test_detect_mcs_direction() {
        let upstream = Feature::new("promoter", "CMV", 10, 60, Strand::Forward);
        let downstream = Feature::new("promoter", "T7", 150, 170, Strand::Reverse);
        let amp = Feature::new("promoter", "AmpR promoter", 125, 130, Strand::Forward);
        assert_eq!(detect_mcs_direction(101, 122, &[]), Orientation::Forward);
        assert_eq!(detect_mcs_direction(101, 122, &[upstream.clone()]), Orientation::Forward);
        assert_eq!(detect_mcs_direction(101, 122, &[downstream.clone()]), Orientation::Reverse);
        assert_eq!(
            detect_mcs_direction(101, 122, &[upstream, downstream, amp.clone()]),
            Orientation::Reverse
        );
        assert_eq!(detect_mcs_direction(101, 122, &[amp]), Orientation::Forward);
    }

    #[test]
    fn test_suggest_insertion_site() {
        let seq = polylinker();
        let plain = SequenceRecord::new("plain", &seq, Topology::Circular).unwrap();
        let site = suggest_insertion_site(&plain).unwrap();
        assert_eq!(site.position, 101);
        assert_eq!(site.orientation, Orientation::Forward);
        assert_eq!(site.source, SiteSource::RestrictionCluster);

        let reversed = plain
            .clone()
            .with_features(vec![Feature::new("promoter", "T7", 200, 220, Strand::Reverse)])
            .unwrap();
        let site = suggest_insertion_site(&reversed).unwrap();
        assert_eq!((site.position, site.orientation), (123, Orientation::Reverse));

        let annotated = plain
            .with_features(vec![
                Feature::new("promoter", "CMV", 1, 50, Strand::Forward),
                Feature::new("misc_feature", "MCS", 90, 130, Strand::Forward),
            ])
            .unwrap();
        let site = suggest_insertion_site(&annotated).unwrap();
        assert_eq!((site.position, site.source), (90, SiteSource::AnnotatedMcs));

        let bare = SequenceRecord::new("bare", "ACGTACGT", Topology::Linear).unwrap();
        assert!(suggest_insertion_site(&bare).is_none());
    }
}
