//! Weighted checklist scoring of an assembled construct.
//!
//! Every check is an independent predicate that yields one finding. The
//! rubric never errors: broken inputs show up as failed findings.

use crate::{
    assembler::{Construct, Orientation, Splice},
    export::{self, ExportFormat},
    feature::{Feature, FeatureKind},
    fusion::KOZAK,
    genbank, mcs,
    record::SequenceRecord,
    sequence::{self, find_subsequence, reverse_complement},
};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use tracing::{debug, info};

lazy_static! {
    static ref LOCUS_SIZE: Regex = Regex::new(r"^LOCUS\s+\S+\s+(\d+)\s+bp").expect("valid regex");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    InputValidation,
    Assembly,
    Integrity,
    BiologicalSanity,
    Export,
    GroundTruth,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Self::InputValidation,
        Self::Assembly,
        Self::Integrity,
        Self::BiologicalSanity,
        Self::Export,
        Self::GroundTruth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::Assembly => "assembly",
            Self::Integrity => "integrity",
            Self::BiologicalSanity => "biological_sanity",
            Self::Export => "export",
            Self::GroundTruth => "ground_truth",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub fn weight(self) -> f64 {
        match self {
            Self::Critical => 2.0,
            Self::Major => 1.0,
            Self::Minor => 0.5,
            Self::Info => 0.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Info => write!(f, "info"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub section: Section,
    pub name: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

impl ValidationFinding {
    pub fn new(
        section: Section,
        name: impl Into<String>,
        severity: Severity,
        passed: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            section,
            name: name.into(),
            severity,
            passed,
            message: message.into(),
        }
    }

    pub fn earned(&self) -> f64 {
        if self.passed {
            self.severity.weight()
        } else {
            0.0
        }
    }
}

/// Findings plus the scores derived from them. Scores are fixed at
/// construction; there is no way to edit a report afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationReport {
    findings: Vec<ValidationFinding>,
    total_score: f64,
    max_score: f64,
    score_pct: f64,
    has_critical_failure: bool,
    passed: bool,
    pass_threshold: f64,
}

impl ValidationReport {
    pub fn new(findings: Vec<ValidationFinding>, pass_threshold: f64) -> Self {
        let total_score: f64 = findings.iter().map(ValidationFinding::earned).sum();
        let max_score: f64 = findings.iter().map(|f| f.severity.weight()).sum();
        let ratio = if max_score > 0.0 {
            total_score / max_score
        } else {
            1.0
        };
        let has_critical_failure = findings
            .iter()
            .any(|f| f.severity == Severity::Critical && !f.passed);
        Self {
            total_score,
            max_score,
            score_pct: (ratio * 1000.0).round() / 10.0,
            has_critical_failure,
            passed: !has_critical_failure && ratio >= pass_threshold,
            pass_threshold,
            findings,
        }
    }

    pub fn findings(&self) -> &[ValidationFinding] {
        &self.findings
    }

    pub fn findings_in(&self, section: Section) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(move |f| f.section == section)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| !f.passed)
    }

    pub fn critical_failures(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.failures().filter(|f| f.severity == Severity::Critical)
    }

    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    pub fn score_pct(&self) -> f64 {
        self.score_pct
    }

    pub fn has_critical_failure(&self) -> bool {
        self.has_critical_failure
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// `PASS: 95.2% (20/21 pts, 18/19 checks)`. Info findings are not counted as checks.
    pub fn summary(&self) -> String {
        let scored: Vec<&ValidationFinding> = self
            .findings
            .iter()
            .filter(|f| f.severity != Severity::Info)
            .collect();
        let scored_passed = scored.iter().filter(|f| f.passed).count();
        format!(
            "{}: {:.1}% ({}/{} pts, {}/{} checks)",
            if self.passed { "PASS" } else { "FAIL" },
            self.score_pct,
            self.total_score,
            self.max_score,
            scored_passed,
            scored.len()
        )
    }

    pub fn render_table(&self) -> String {
        let mut out = String::from("| Section | Check | Severity | Result | Detail |\n|---|---|---|---|---|\n");
        for section in Section::ALL {
            for finding in self.findings_in(section) {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    section,
                    escape_cell(&finding.name),
                    finding.severity,
                    if finding.passed { "PASS" } else { "FAIL" },
                    escape_cell(&finding.message)
                );
            }
        }
        let _ = write!(out, "\n**{}**\n", self.summary());
        let critical: Vec<&ValidationFinding> = self.critical_failures().collect();
        if !critical.is_empty() {
            out.push_str("\nCritical failures:\n");
            for finding in critical {
                let _ = writeln!(out, "- {}: {}", finding.name, finding.message);
            }
        }
        out
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricConfig {
    pub pass_threshold: f64,
    pub ground_truth_strict: bool,
    /// Backbone feature kinds whose bases must survive the edit unchanged.
    pub key_feature_kinds: Vec<FeatureKind>,
    /// Score the Kozak motif instead of only reporting the context.
    pub expect_kozak: bool,
    pub kozak_window: usize,
}

impl Default for RubricConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.90,
            ground_truth_strict: false,
            key_feature_kinds: vec![
                FeatureKind::Promoter,
                FeatureKind::Cds,
                FeatureKind::Origin,
                FeatureKind::ResistanceMarker,
            ],
            expect_kozak: false,
            kozak_window: KOZAK.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertCategory {
    #[default]
    #[serde(alias = "fluorescent_protein", alias = "reporter")]
    Cds,
    EpitopeTag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportedText<'a> {
    pub format: ExportFormat,
    pub text: &'a str,
}

/// What the construct is checked against besides its own inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidationContext<'a> {
    /// Defaults to the position the construct was assembled at.
    pub expected_insert_position: Option<usize>,
    pub insert_category: InsertCategory,
    pub ground_truth: Option<&'a str>,
    pub exported: Option<ExportedText<'a>>,
}

#[derive(Clone, Copy, Debug)]
pub struct ValidationJob<'a> {
    pub construct: &'a Construct,
    pub backbone: &'a SequenceRecord,
    pub insert: &'a SequenceRecord,
    pub context: ValidationContext<'a>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rubric {
    config: RubricConfig,
}

impl Rubric {
    pub fn new(config: RubricConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RubricConfig {
        &self.config
    }

    pub fn validate(
        &self,
        construct: &Construct,
        backbone: &SequenceRecord,
        insert: &SequenceRecord,
        context: &ValidationContext,
    ) -> ValidationReport {
        let position = context
            .expected_insert_position
            .filter(|&pos| pos >= 1)
            .unwrap_or_else(|| construct.insert_start());
        let oriented = match construct.orientation() {
            Orientation::Forward => insert.as_bytes().to_vec(),
            Orientation::Reverse => reverse_complement(insert.as_bytes()),
        };
        let mut eval = Evaluation {
            config: &self.config,
            construct,
            backbone,
            insert,
            context,
            splice: Splice {
                position,
                replaced_len: construct.replaced_len(),
                insert_len: insert.len(),
                topology: backbone.topology(),
            },
            oriented,
            findings: vec![],
        };
        eval.input_validation();
        eval.assembly();
        eval.integrity();
        eval.biological_sanity();
        if let Some(exported) = context.exported {
            eval.export(exported);
        }
        if let Some(reference) = context.ground_truth {
            eval.ground_truth(reference);
        }

        let report = ValidationReport::new(eval.findings, self.config.pass_threshold);
        info!(
            construct = %construct.name(),
            score = report.score_pct(),
            critical_failure = report.has_critical_failure(),
            passed = report.passed(),
            "validated construct"
        );
        report
    }

    /// Independent jobs are evaluated in parallel; reports keep job order.
    pub fn validate_batch(&self, jobs: &[ValidationJob]) -> Vec<ValidationReport> {
        jobs.par_iter()
            .map(|job| self.validate(job.construct, job.backbone, job.insert, &job.context))
            .collect()
    }
}

/// Scores a construct with the default rubric.
pub fn validate(
    construct: &Construct,
    backbone: &SequenceRecord,
    insert: &SequenceRecord,
    expected_insert_position: Option<usize>,
) -> ValidationReport {
    let context = ValidationContext {
        expected_insert_position,
        ..Default::default()
    };
    Rubric::default().validate(construct, backbone, insert, &context)
}

pub fn validate_batch(jobs: &[ValidationJob]) -> Vec<ValidationReport> {
    Rubric::default().validate_batch(jobs)
}

struct Evaluation<'a> {
    config: &'a RubricConfig,
    construct: &'a Construct,
    backbone: &'a SequenceRecord,
    insert: &'a SequenceRecord,
    context: &'a ValidationContext<'a>,
    /// The edit as expected, independent of the construct's own bookkeeping.
    splice: Splice,
    /// Insert bases as they should read on the construct's forward strand.
    oriented: Vec<u8>,
    findings: Vec<ValidationFinding>,
}

fn describe_validity(len: usize, invalid: &[char]) -> String {
    if len == 0 {
        "empty sequence".to_string()
    } else if invalid.is_empty() {
        format!("{len} bp of valid nucleotides")
    } else {
        let listed: Vec<String> = invalid.iter().map(char::to_string).collect();
        format!("invalid characters: {}", listed.join(", "))
    }
}

fn is_purine(base: u8) -> bool {
    matches!(base.to_ascii_uppercase(), b'A' | b'G')
}

impl Evaluation<'_> {
    fn check(
        &mut self,
        section: Section,
        name: impl Into<String>,
        severity: Severity,
        passed: bool,
        message: impl Into<String>,
    ) {
        let finding = ValidationFinding::new(section, name, severity, passed, message);
        debug!(section = %finding.section, name = %finding.name, passed, "rubric check");
        self.findings.push(finding);
    }

    fn position(&self) -> usize {
        self.splice.position
    }

    /// 1-based last base of the insert in the construct.
    fn insert_end(&self) -> usize {
        self.position() - 1 + self.oriented.len()
    }

    fn is_tag(&self) -> bool {
        self.context.insert_category == InsertCategory::EpitopeTag
    }

    /// `Some(true)` when the feature reappears with identical bases at its
    /// expected construct coordinates, `None` when the edit consumed it.
    fn preserved(&self, feature: &Feature) -> Option<bool> {
        let moved = self.splice.map_feature(feature, self.backbone.len())?;
        let before = feature.extract(self.backbone.as_bytes());
        let after = moved.extract(self.construct.as_bytes());
        Some(!before.is_empty() && before == after)
    }

    fn input_validation(&mut self) {
        let section = Section::InputValidation;
        let (backbone, insert) = (self.backbone, self.insert);

        let invalid = sequence::invalid_characters(backbone.as_bytes());
        self.check(
            section,
            format!("Backbone ({}) is valid DNA", backbone.id()),
            Severity::Critical,
            !backbone.is_empty() && invalid.is_empty(),
            describe_validity(backbone.len(), &invalid),
        );
        self.check(
            section,
            "Backbone length",
            Severity::Info,
            true,
            format!("{} bp, {}", backbone.len(), backbone.topology()),
        );

        let invalid = sequence::invalid_characters(insert.as_bytes());
        self.check(
            section,
            format!("Insert ({}) is valid DNA", insert.id()),
            Severity::Critical,
            !insert.is_empty() && invalid.is_empty(),
            describe_validity(insert.len(), &invalid),
        );

        if self.is_tag() {
            self.check(
                section,
                "Codon checks",
                Severity::Info,
                true,
                "epitope tag: start, stop and frame checks do not apply",
            );
            return;
        }
        let seq = insert.as_bytes();
        let start = seq.get(..3).map(String::from_utf8_lossy).unwrap_or_default();
        self.check(
            section,
            "Insert starts with ATG",
            Severity::Minor,
            sequence::has_start_codon(seq),
            format!("first codon {start}"),
        );
        let stop = seq
            .len()
            .checked_sub(3)
            .map(|from| String::from_utf8_lossy(&seq[from..]))
            .unwrap_or_default();
        self.check(
            section,
            "Insert ends with a stop codon",
            Severity::Minor,
            sequence::has_stop_codon(seq),
            format!("last codon {stop}"),
        );
        let remainder = seq.len() % 3;
        self.check(
            section,
            "Insert length is a multiple of 3",
            Severity::Major,
            remainder == 0,
            if remainder == 0 {
                format!("{} codons", seq.len() / 3)
            } else {
                format!("{} bp leaves {remainder} extra base(s), the reading frame shifts", seq.len())
            },
        );
    }

    fn assembly(&mut self) {
        let section = Section::Assembly;
        let (construct, backbone) = (self.construct, self.backbone);
        let (construct, backbone) = (construct.as_bytes(), backbone.as_bytes());

        let invalid = sequence::invalid_characters(construct);
        self.check(
            section,
            "Construct is valid DNA",
            Severity::Critical,
            !construct.is_empty() && invalid.is_empty(),
            describe_validity(construct.len(), &invalid),
        );

        let forward_hit = find_subsequence(construct, &self.oriented, 0);
        let reverse_hit = find_subsequence(construct, &reverse_complement(&self.oriented), 0);
        self.check(
            section,
            "Insert sequence present",
            Severity::Critical,
            forward_hit.is_some() || reverse_hit.is_some(),
            match (forward_hit, reverse_hit) {
                (Some(at), _) | (None, Some(at)) => format!("found at {}", at + 1),
                (None, None) => format!("{} bp insert not found in construct", self.oriented.len()),
            },
        );

        let orientation = self.construct.orientation();
        self.check(
            section,
            format!("Insert in {orientation} orientation"),
            Severity::Critical,
            forward_hit.is_some(),
            match (forward_hit, reverse_hit) {
                (Some(_), _) => format!("reads {orientation} as requested"),
                (None, Some(_)) => "found only in the opposite orientation".to_string(),
                (None, None) => "insert not found".to_string(),
            },
        );

        let position = self.position();
        let at_position = construct
            .get(position - 1..self.insert_end())
            .is_some_and(|window| window == self.oriented.as_slice());
        self.check(
            section,
            "Insert at expected position",
            Severity::Critical,
            at_position,
            match (at_position, forward_hit) {
                (true, _) => format!("{}..{}", position, self.insert_end()),
                (false, Some(at)) => format!("expected at {position}, found at {}", at + 1),
                (false, None) => format!("expected at {position}, not found"),
            },
        );

        let upstream_len = position - 1;
        let upstream_ok = match (construct.get(..upstream_len), backbone.get(..upstream_len)) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        };
        self.check(
            section,
            "Backbone upstream of insert preserved",
            Severity::Critical,
            upstream_ok,
            format!("backbone 1..{upstream_len}"),
        );

        let downstream_ok = match (
            construct.get(self.insert_end()..),
            backbone.get(self.splice.replace_end()..),
        ) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        };
        self.check(
            section,
            "Backbone downstream of insert preserved",
            Severity::Critical,
            downstream_ok,
            format!("backbone {}..{}", self.splice.replace_end() + 1, backbone.len()),
        );
    }

    fn integrity(&mut self) {
        let section = Section::Integrity;
        let expected = self.backbone.len().saturating_sub(self.splice.replaced_len) + self.insert.len();
        let actual = self.construct.len();
        self.check(
            section,
            "Construct size",
            Severity::Critical,
            expected == actual,
            format!(
                "{actual} bp, expected {} - {} + {} = {expected}",
                self.backbone.len(),
                self.splice.replaced_len,
                self.insert.len()
            ),
        );

        let backbone = self.backbone;
        let key: Vec<&Feature> = backbone
            .features()
            .iter()
            .filter(|f| self.config.key_feature_kinds.contains(&f.kind))
            .collect();
        if key.is_empty() {
            self.check(section, "Key features preserved", Severity::Info, true, "no key features annotated");
            return;
        }
        let mut checked = 0;
        let mut consumed = 0;
        let mut damaged = vec![];
        for feature in key {
            match self.preserved(feature) {
                Some(true) => checked += 1,
                Some(false) => damaged.push(feature.label.clone()),
                None => consumed += 1,
            }
        }
        let mut message = if damaged.is_empty() {
            format!("{checked} preserved, shifted by {:+} bp after the insert", self.splice.shift())
        } else {
            format!("altered or moved: {}", damaged.join(", "))
        };
        if consumed > 0 {
            let _ = write!(message, "; {consumed} overlapping the edit not checked");
        }
        self.check(section, "Key features preserved", Severity::Major, damaged.is_empty(), message);
    }

    /// The leader read toward the insert: `window` bases immediately before
    /// the first insert base in reading direction.
    fn upstream_context(&self, window: usize) -> Option<Vec<u8>> {
        let construct = self.construct.as_bytes();
        match self.construct.orientation() {
            Orientation::Forward => {
                let end = self.position() - 1;
                construct.get(end.checked_sub(window)?..end).map(<[u8]>::to_vec)
            }
            Orientation::Reverse => {
                let start = self.insert_end();
                construct.get(start..start + window).map(reverse_complement)
            }
        }
    }

    fn biological_sanity(&mut self) {
        self.internal_stops();
        self.promoter();
        self.poly_a();
        self.intact_kind(FeatureKind::ResistanceMarker, "Resistance markers intact", Severity::Major);
        self.intact_kind(FeatureKind::Origin, "Replication origins intact", Severity::Minor);
        self.kozak();
    }

    fn internal_stops(&mut self) {
        let section = Section::BiologicalSanity;
        let insert = self.insert;
        let seq = insert.as_bytes();
        if !sequence::is_in_frame(seq) {
            self.check(section, "No premature stop codons", Severity::Info, true, "skipped, insert is out of frame");
            return;
        }
        let stops: Vec<String> = sequence::internal_stop_codons(seq)
            .into_iter()
            .map(|offset| (offset + 1).to_string())
            .collect();
        self.check(
            section,
            "No premature stop codons",
            Severity::Major,
            stops.is_empty(),
            if stops.is_empty() {
                "no in-frame stop before the last codon".to_string()
            } else {
                format!("in-frame stops at insert position(s) {}", stops.join(", "))
            },
        );
    }

    fn promoter(&mut self) {
        let section = Section::BiologicalSanity;
        let backbone = self.backbone;
        let promoters: Vec<&Feature> = backbone
            .features()
            .iter()
            .filter(|f| mcs::is_expression_promoter(f))
            .collect();
        if promoters.is_empty() {
            self.check(section, "Promoter upstream of insert", Severity::Info, true, "no promoter annotated");
            return;
        }

        // Only promoters transcribing along the insert's strand can drive it.
        let strand = self.construct.orientation().strand();
        let surviving = promoters
            .into_iter()
            .filter(|f| !f.wraps_origin() && f.strand == strand)
            .filter_map(|f| Some((f, self.splice.map_feature(f, backbone.len())?)));
        let nearest = match self.construct.orientation() {
            Orientation::Forward => surviving
                .filter(|(_, moved)| moved.end < self.position())
                .max_by_key(|(_, moved)| moved.end),
            Orientation::Reverse => surviving
                .filter(|(_, moved)| moved.start > self.insert_end())
                .min_by_key(|(_, moved)| moved.start),
        };
        let Some((promoter, moved)) = nearest else {
            self.check(
                section,
                "Promoter upstream of insert",
                Severity::Critical,
                false,
                format!(
                    "no {} strand promoter reads into the insert",
                    self.construct.orientation()
                ),
            );
            return;
        };
        let gap = match self.construct.orientation() {
            Orientation::Forward => self.position() - 1 - moved.end,
            Orientation::Reverse => moved.start - self.insert_end() - 1,
        };
        self.check(
            section,
            "Promoter upstream of insert",
            Severity::Critical,
            true,
            format!("{} at {}..{}, {gap} bp away", promoter.label, promoter.start, promoter.end),
        );

        // Without its own ATG the insert is read from an upstream start.
        if sequence::has_start_codon(self.insert.as_bytes()) {
            return;
        }
        let Some(leader) = self.upstream_context(gap) else {
            return;
        };
        let in_frame = &leader[leader.len() % 3..];
        let codons: Vec<&[u8]> = sequence::codons(in_frame).collect();
        let stop = codons.iter().rposition(|codon| sequence::is_stop_codon(codon));
        self.check(
            section,
            "No in-frame stop between promoter and insert",
            Severity::Minor,
            stop.is_none(),
            match stop {
                None => format!("{gap} bp leader is open in the insert frame"),
                Some(codon) => format!("stop codon {} bp upstream of the insert", in_frame.len() - codon * 3),
            },
        );
    }

    fn poly_a(&mut self) {
        let section = Section::BiologicalSanity;
        let backbone = self.backbone;
        let signals: Vec<&Feature> = backbone.features_of_kind(FeatureKind::PolyASignal).collect();
        if signals.is_empty() {
            self.check(section, "PolyA signal downstream", Severity::Info, true, "no polyA signal annotated");
            return;
        }
        let strand = self.construct.orientation().strand();
        let surviving = signals
            .into_iter()
            .filter(|f| !f.wraps_origin() && f.strand == strand)
            .filter_map(|f| Some((f, self.splice.map_feature(f, backbone.len())?)));
        let nearest = match self.construct.orientation() {
            Orientation::Forward => surviving
                .filter(|(_, moved)| moved.start > self.insert_end())
                .min_by_key(|(_, moved)| moved.start),
            Orientation::Reverse => surviving
                .filter(|(_, moved)| moved.end < self.position())
                .max_by_key(|(_, moved)| moved.end),
        };
        let Some((signal, moved)) = nearest else {
            self.check(
                section,
                "PolyA signal downstream",
                Severity::Major,
                false,
                format!(
                    "no {} strand polyA signal follows the insert",
                    self.construct.orientation()
                ),
            );
            return;
        };
        self.check(
            section,
            "PolyA signal downstream",
            Severity::Major,
            true,
            format!("{} at {}..{}", signal.label, moved.start, moved.end),
        );
        let intact = self.preserved(signal) == Some(true);
        self.check(
            section,
            "PolyA signal intact",
            Severity::Major,
            intact,
            if intact {
                format!("{} bp unchanged", signal.span_len(self.backbone.len()))
            } else {
                format!("{} altered", signal.label)
            },
        );
    }

    /// Every feature of `kind` must sit outside the edit with unchanged bases.
    fn intact_kind(&mut self, kind: FeatureKind, name: &str, severity: Severity) {
        let section = Section::BiologicalSanity;
        let backbone = self.backbone;
        let features: Vec<&Feature> = backbone.features_of_kind(kind).collect();
        if features.is_empty() {
            self.check(section, name, Severity::Info, true, format!("no {kind} annotated"));
            return;
        }
        let broken: Vec<String> = features
            .iter()
            .filter(|f| self.preserved(f) != Some(true))
            .map(|f| f.label.clone())
            .collect();
        let labels: Vec<&str> = features.iter().map(|f| f.label.as_str()).collect();
        self.check(
            section,
            name,
            severity,
            broken.is_empty(),
            if broken.is_empty() {
                labels.join(", ")
            } else {
                format!("disrupted by the edit: {}", broken.join(", "))
            },
        );
    }

    fn kozak(&mut self) {
        let section = Section::BiologicalSanity;
        let insert = self.insert;
        let insert = insert.as_bytes();
        if self.is_tag() || !sequence::has_start_codon(insert) {
            return;
        }
        let window = self.config.kozak_window.max(3);
        let severity = if self.config.expect_kozak {
            Severity::Minor
        } else {
            Severity::Info
        };
        let Some(context) = self.upstream_context(window) else {
            self.check(
                section,
                "Kozak context",
                severity,
                !self.config.expect_kozak,
                "not enough sequence upstream of the start codon",
            );
            return;
        };
        let minus_three = is_purine(context[window - 3]);
        let plus_four = insert.get(3).is_some_and(|b| b.eq_ignore_ascii_case(&b'G'));
        let strength = match (minus_three, plus_four) {
            (true, true) => "strong",
            (true, false) | (false, true) => "adequate",
            (false, false) => "weak",
        };
        let shown = format!(
            "{}|{}",
            String::from_utf8_lossy(&context),
            String::from_utf8_lossy(&insert[..insert.len().min(4)])
        );
        if self.config.expect_kozak {
            let motif = context.ends_with(KOZAK.as_bytes());
            self.check(
                section,
                "Kozak motif upstream of ATG",
                severity,
                motif,
                format!("{strength} context {shown}"),
            );
        } else {
            self.check(section, "Kozak context", severity, true, format!("{strength} context {shown}"));
        }
    }

    fn export(&mut self, exported: ExportedText) {
        let section = Section::Export;
        let text = exported.text;
        let header_ok = match exported.format {
            ExportFormat::GenBank => text.starts_with("LOCUS"),
            ExportFormat::Fasta => text.starts_with('>'),
            ExportFormat::Raw => {
                let clean = sequence::clean_sequence(text);
                !clean.is_empty() && sequence::invalid_characters(clean.as_bytes()).is_empty()
            }
        };
        self.check(
            section,
            format!("{} header", exported.format),
            Severity::Minor,
            header_ok,
            text.lines().next().unwrap_or_default().chars().take(60).collect::<String>(),
        );

        let parsed = match exported.format {
            ExportFormat::GenBank => genbank::parse(text),
            ExportFormat::Fasta => export::parse_fasta(text).map(|mut records| records.remove(0)),
            ExportFormat::Raw => SequenceRecord::new(&self.construct.name(), text, self.construct.topology()),
        };
        let parsed = match parsed {
            Ok(record) => {
                self.check(section, "Output parses back", Severity::Minor, true, format!("{} bp", record.len()));
                record
            }
            Err(e) => {
                self.check(section, "Output parses back", Severity::Minor, false, e.to_string());
                return;
            }
        };

        let same_sequence = parsed.sequence() == self.construct.sequence();
        let same_topology =
            exported.format != ExportFormat::GenBank || parsed.topology() == self.construct.topology();
        self.check(
            section,
            "Exported sequence matches construct",
            Severity::Minor,
            same_sequence && same_topology,
            if !same_sequence {
                format!("{} bp exported, construct has {} bp", parsed.len(), self.construct.len())
            } else if !same_topology {
                format!("topology {} exported as {}", self.construct.topology(), parsed.topology())
            } else {
                "identical".to_string()
            },
        );

        if exported.format != ExportFormat::GenBank {
            return;
        }
        let declared = LOCUS_SIZE
            .captures(text)
            .and_then(|caps| caps.get(1)?.as_str().parse::<usize>().ok());
        self.check(
            section,
            "LOCUS size matches construct",
            Severity::Minor,
            declared == Some(self.construct.len()),
            match declared {
                Some(size) => format!("LOCUS declares {size} bp"),
                None => "no size on LOCUS line".to_string(),
            },
        );
        let (start, end) = (self.construct.insert_start(), self.construct.insert_end());
        let annotated = parsed
            .features_of_kind(FeatureKind::Cds)
            .any(|f| f.start == start && f.end == end);
        self.check(
            section,
            "Insert annotated in feature table",
            Severity::Minor,
            annotated,
            format!("CDS {start}..{end}"),
        );
    }

    fn ground_truth(&mut self, reference: &str) {
        let section = Section::GroundTruth;
        let reference = sequence::clean_sequence(reference);
        let construct = self.construct;
        let ours = construct.as_bytes();
        let theirs = reference.as_bytes();
        let exact = ours == theirs;
        let severity = if self.config.ground_truth_strict {
            Severity::Critical
        } else {
            Severity::Info
        };
        self.check(
            section,
            "Matches ground truth",
            severity,
            exact,
            if exact {
                format!("{} bp identical", ours.len())
            } else {
                format!("{} bp vs {} bp reference", ours.len(), theirs.len())
            },
        );
        if exact {
            return;
        }

        let message = if ours.len() == theirs.len() {
            let mismatches = ours.iter().zip(theirs).filter(|(a, b)| a != b).count();
            let identity = (1.0 - mismatches as f64 / ours.len().max(1) as f64) * 100.0;
            format!("{mismatches} mismatches, {identity:.1}% identity")
        } else {
            let found = find_subsequence(theirs, &self.oriented, 0).is_some();
            format!(
                "size differs by {:+} bp, insert {} in reference",
                ours.len() as isize - theirs.len() as isize,
                if found { "found" } else { "not found" }
            )
        };
        self.check(section, "Ground truth similarity", Severity::Info, true, message);
    }
}
