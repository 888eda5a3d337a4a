//! One design request end to end: resolve, fuse, assemble, export, validate.

use crate::{
    assembler::{Construct, Orientation, assemble},
    error::{ConstructError, Result},
    export::{ExportFormat, export},
    feature::Feature,
    fusion::{Linker, fuse},
    mcs::{InsertionSite, suggest_insertion_site},
    record::SequenceRecord,
    resolver::{RecordResolver, resolve_required},
    rubric::{ExportedText, InsertCategory, Rubric, RubricConfig, ValidationContext, ValidationReport},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub backbone: String,
    /// More than one insert is fused in order before assembly.
    pub inserts: Vec<String>,
    /// `None` is the default linker, an empty string joins parts directly.
    #[serde(default)]
    pub linker: Option<String>,
    /// 1-based. Derived from the backbone MCS when missing.
    #[serde(default)]
    pub insertion_position: Option<usize>,
    #[serde(default)]
    pub replace_region_end: Option<usize>,
    /// Follows the detected MCS direction when missing and the site is derived.
    #[serde(default)]
    pub reverse_complement_insert: Option<bool>,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub insert_category: InsertCategory,
    /// Reference sequence the construct is expected to equal.
    #[serde(default)]
    pub ground_truth: Option<String>,
    #[serde(default)]
    pub rubric: RubricConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DesignOutcome {
    pub construct: Construct,
    /// The fused record when several inserts were given.
    pub fused_insert: Option<SequenceRecord>,
    pub insertion_site: Option<InsertionSite>,
    pub annotations: Vec<Feature>,
    pub exported: String,
    pub report: ValidationReport,
}

pub fn design(request: &DesignRequest, resolver: &impl RecordResolver) -> Result<DesignOutcome> {
    let backbone = resolve_required(resolver, &request.backbone)?;
    let parts = request
        .inserts
        .iter()
        .map(|id| resolve_required(resolver, id))
        .collect::<Result<Vec<SequenceRecord>>>()?;

    let (insert, fused_insert) = match <[SequenceRecord; 1]>::try_from(parts) {
        Ok([single]) => (single, None),
        Err(parts) => {
            let fused = fuse(&parts, &Linker::from(request.linker.as_deref()))?;
            (fused.clone(), Some(fused))
        }
    };

    let (position, reverse, insertion_site) = match request.insertion_position {
        Some(position) => (position, request.reverse_complement_insert.unwrap_or(false), None),
        None => {
            let site = suggest_insertion_site(&backbone).ok_or_else(|| ConstructError::NoInsertionSite {
                record_id: backbone.id().to_string(),
            })?;
            let reverse = request
                .reverse_complement_insert
                .unwrap_or(site.orientation == Orientation::Reverse);
            (site.position, reverse, Some(site))
        }
    };
    debug!(position, reverse, derived = insertion_site.is_some(), "insertion site");

    let construct = assemble(&backbone, &insert, position, request.replace_region_end, reverse)?;
    let annotations = construct.annotations(&backbone, &insert);
    let exported = export(&construct, request.format, &annotations)?;

    let context = ValidationContext {
        expected_insert_position: Some(position),
        insert_category: request.insert_category,
        ground_truth: request.ground_truth.as_deref(),
        exported: Some(ExportedText {
            format: request.format,
            text: &exported,
        }),
    };
    let report = Rubric::new(request.rubric.clone()).validate(&construct, &backbone, &insert, &context);
    info!(construct = %construct.name(), summary = %report.summary(), "design finished");

    Ok(DesignOutcome {
        construct,
        fused_insert,
        insertion_site,
        annotations,
        exported,
        report,
    })
}
