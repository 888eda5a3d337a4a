use plasmid_assembler::{
    ConstructError, FeatureKind, Linker, Orientation, SequenceRecord, Topology, assemble,
    export::{self, ExportFormat, read_fasta_file},
    fuse, genbank,
    pipeline::{DesignRequest, design},
    resolver::{Catalog, RecordResolver},
    rubric::{InsertCategory, Section, Severity, validate},
    sequence::reverse_complement_str,
};
use std::fs;

const BACKBONE: &str = "test_files/pcDNA3.1_like.gb";
const EGFP: &str = "test_files/EGFP.fa";
const FLAG: &str = "test_files/FLAG.fa";
const LIBRARY: &str = "test_files/library.json";

fn backbone() -> SequenceRecord {
    genbank::parse(&fs::read_to_string(BACKBONE).unwrap()).unwrap()
}

fn first_fasta(path: &str) -> SequenceRecord {
    read_fasta_file(path).unwrap().remove(0)
}

fn egfp() -> SequenceRecord {
    first_fasta(EGFP)
}

#[test]
fn fixtures_parse_as_expected() {
    let bb = backbone();
    assert_eq!(bb.id(), "pcDNA3.1_like");
    assert_eq!(bb.len(), 5428);
    assert_eq!(bb.topology(), Topology::Circular);
    assert_eq!(bb.description(), Some("Synthetic pcDNA3.1-like expression vector."));

    let kinds: Vec<FeatureKind> = bb.features().iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FeatureKind::Promoter,
            FeatureKind::Mcs,
            FeatureKind::PolyASignal,
            FeatureKind::Origin,
            FeatureKind::ResistanceMarker,
            FeatureKind::Other,
        ]
    );
    let wrap = &bb.features()[5];
    assert_eq!((wrap.start, wrap.end), (5300, 100));
    assert_eq!(wrap.label, "origin-spanning region");
    assert_eq!(bb.feature_sequence(wrap).len(), 229);

    assert_eq!(egfp().len(), 720);
    assert_eq!(first_fasta(FLAG).len(), 24);
}

#[test]
fn simple_insertion() {
    let (bb, ins) = (backbone(), egfp());
    let construct = assemble(&bb, &ins, 895, None, false).unwrap();
    assert_eq!(construct.len(), 6148);
    assert_eq!((construct.insert_start(), construct.insert_end()), (895, 1614));
    assert_eq!(&construct.sequence()[..894], &bb.sequence()[..894]);
    assert_eq!(&construct.sequence()[894..1614], ins.sequence());
    assert_eq!(&construct.sequence()[1614..], &bb.sequence()[894..]);

    let report = validate(&construct, &bb, &ins, Some(895));
    assert!(report.passed(), "{}", report.render_table());
    assert!(!report.has_critical_failure());
}

#[test]
fn insertion_is_invertible() {
    let (bb, ins) = (backbone(), egfp());
    for (position, replace_end, reverse) in [
        (1, None, false),
        (895, None, true),
        (895, Some(1010), false),
        (5429, None, false),
        (5000, Some(5428), true),
    ] {
        let construct = assemble(&bb, &ins, position, replace_end, reverse).unwrap();
        let replaced = replace_end.map_or(0, |end| end - position + 1);
        assert_eq!(construct.len(), bb.len() - replaced + ins.len());
        assert_eq!(construct.restore_backbone(), bb.sequence());
    }
}

#[test]
fn reverse_orientation() {
    let (bb, ins) = (backbone(), egfp());
    let construct = assemble(&bb, &ins, 895, None, true).unwrap();
    assert_eq!(construct.orientation(), Orientation::Reverse);
    assert_eq!(construct.insert_sequence(), reverse_complement_str(ins.sequence()));
    assert_eq!(&construct.sequence()[894..897], "TTA");

    let report = validate(&construct, &bb, &ins, Some(895));
    let assembly: Vec<_> = report.findings_in(Section::Assembly).collect();
    assert!(assembly.iter().all(|f| f.passed));
    // CMV reads away from a reversed insert
    assert!(report.has_critical_failure());
}

#[test]
fn out_of_frame_insert_is_flagged() {
    let bb = backbone();
    let long = SequenceRecord::new("EGFP_plus_one", &format!("{}A", egfp().sequence()), Topology::Linear).unwrap();
    assert_eq!(long.len(), 721);
    let construct = assemble(&bb, &long, 895, None, false).unwrap();
    let report = validate(&construct, &bb, &long, None);
    assert!(report.findings_in(Section::InputValidation).any(|f| {
        !f.passed && matches!(f.severity, Severity::Major | Severity::Critical)
    }));
}

#[test]
fn tag_fusion_direct() {
    let (flag, gfp) = (first_fasta(FLAG), egfp());
    let fused = fuse(&[flag.clone(), gfp.clone()], &Linker::from(Some(""))).unwrap();
    assert_eq!(fused.len(), 744);
    assert!(fused.sequence().starts_with("GACTACAAAGACGATGACGACAAGATGCGACTGACG"));
    assert_eq!(fused.sequence(), format!("{}{}", flag.sequence(), gfp.sequence()));
    assert!(fused.sequence().ends_with("TAA"));

    let fused = fuse(&[gfp.clone(), flag.clone()], &Linker::Default).unwrap();
    assert_eq!(fused.len(), 717 + 66 + 24);
    assert!(!fused.sequence()[..717].ends_with("TAA"));

    let construct = assemble(&backbone(), &fused, 895, None, false).unwrap();
    assert_eq!(construct.len(), 5428 + 807);
}

#[test]
fn export_round_trips() {
    let bb = backbone();
    let text = export::export_record(&bb, ExportFormat::GenBank);
    assert_eq!(genbank::parse(&text).unwrap(), bb);

    let ins = egfp();
    let construct = assemble(&bb, &ins, 895, None, false).unwrap();
    let annotations = construct.annotations(&bb, &ins);
    let text = export::export(&construct, ExportFormat::GenBank, &annotations).unwrap();
    let parsed = genbank::parse(&text).unwrap();
    assert_eq!(parsed.sequence(), construct.sequence());
    assert_eq!(parsed.topology(), Topology::Circular);
    assert_eq!(parsed.features(), annotations.as_slice());
    let polya = parsed
        .features_of_kind(FeatureKind::PolyASignal)
        .next()
        .unwrap();
    assert_eq!((polya.start, polya.end), (1016 + 720, 1240 + 720));

    let fasta = export::export(&construct, ExportFormat::Fasta, &annotations).unwrap();
    assert_eq!(export::parse_fasta(&fasta).unwrap()[0].sequence(), construct.sequence());
}

#[test]
fn gb_io_file_interop() {
    let bb = backbone();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backbone.gb");
    genbank::write_gb_file(&bb, &path).unwrap();
    let back = genbank::read_gb_file(&path).unwrap().remove(0);
    assert_eq!(back.sequence(), bb.sequence());
    assert_eq!(back.topology(), Topology::Circular);
    let spans: Vec<(usize, usize)> = back.features().iter().map(|f| (f.start, f.end)).collect();
    let expected: Vec<(usize, usize)> = bb.features().iter().map(|f| (f.start, f.end)).collect();
    assert_eq!(spans, expected);
}

#[test]
fn rubric_prefers_the_correct_construct() {
    let (bb, ins) = (backbone(), egfp());
    let correct = assemble(&bb, &ins, 895, None, false).unwrap();
    let shifted = assemble(&bb, &ins, 896, None, false).unwrap();
    let right = validate(&correct, &bb, &ins, Some(895));
    let wrong = validate(&shifted, &bb, &ins, Some(895));
    assert!(right.total_score() > wrong.total_score());
    assert!(right.score_pct() > wrong.score_pct());
    assert!(!right.has_critical_failure());
    assert!(wrong.has_critical_failure());
    assert!(!wrong.passed());

    let misread = validate(&correct, &bb, &ins, Some(896));
    assert!(right.total_score() > misread.total_score());
    assert!(misread.has_critical_failure());
}

#[test]
fn flag_with_start_codon_fused_to_egfp() {
    let flag = SequenceRecord::new(
        "FLAG_ATG",
        &format!("ATG{}", first_fasta(FLAG).sequence()),
        Topology::Linear,
    )
    .unwrap();
    let gfp = egfp();
    assert_eq!(flag.sequence(), "ATGGACTACAAAGACGATGACGACAAG");

    let fused = fuse(&[flag, gfp.clone()], &Linker::from(Some(""))).unwrap();
    assert_eq!(fused.len(), 27 + 720);
    assert_eq!(
        &fused.sequence()[..39],
        "ATGGACTACAAAGACGATGACGACAAGATGCGACTGACG"
    );
    assert_eq!(&fused.sequence()[27..], gfp.sequence());
    assert!(fused.sequence().ends_with("TAA"));

    let bb = backbone();
    let construct = assemble(&bb, &fused, 895, None, false).unwrap();
    assert_eq!(construct.len(), 5428 + 747);
    assert_eq!(&construct.sequence()[894..921], "ATGGACTACAAAGACGATGACGACAAG");
    let report = validate(&construct, &bb, &fused, Some(895));
    assert!(report.passed(), "{}", report.render_table());
}

#[test]
fn design_from_catalog_and_files() {
    let catalog = Catalog::from_json_file(LIBRARY).unwrap();
    assert!(catalog.resolve("enhanced GFP").is_some());
    let backbone = backbone();
    let resolver = |id: &str| {
        if id == backbone.id() {
            Some(backbone.clone())
        } else {
            catalog.resolve(id)
        }
    };

    let request: DesignRequest = serde_json::from_str(
        r#"{"backbone": "pcDNA3.1_like", "inserts": ["eGFP"], "format": "genbank"}"#,
    )
    .unwrap();
    let outcome = design(&request, &resolver).unwrap();
    assert_eq!(outcome.insertion_site.unwrap().position, 895);
    assert_eq!(outcome.construct.len(), 6148);
    assert!(outcome.report.passed(), "{}", outcome.report.render_table());
    assert!(outcome.report.findings_in(Section::Export).all(|f| f.passed));

    let request = DesignRequest {
        backbone: "pcDNA3.1_like".to_string(),
        inserts: vec!["FLAG".to_string(), "EGFP".to_string()],
        linker: Some(String::new()),
        insertion_position: Some(895),
        insert_category: InsertCategory::EpitopeTag,
        ..Default::default()
    };
    let outcome = design(&request, &resolver).unwrap();
    assert_eq!(outcome.fused_insert.unwrap().id(), "FLAG_tag-EGFP");
    assert_eq!(outcome.construct.len(), 5428 + 744);

    let missing = DesignRequest {
        backbone: "pcDNA3.1_like".to_string(),
        inserts: vec!["mCherry".to_string()],
        ..Default::default()
    };
    assert!(matches!(
        design(&missing, &resolver),
        Err(ConstructError::UnresolvedRecord { .. })
    ));
}
