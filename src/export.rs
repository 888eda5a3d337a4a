use crate::{
    assembler::Construct,
    error::{ConstructError, Result},
    feature::Feature,
    genbank,
    record::{SequenceRecord, Topology},
};
use bio::io::fasta;
use serde::{Deserialize, Serialize};
use std::{fmt, fs::File, io::Read, path::Path, str::FromStr};

const FASTA_LINE_WIDTH: usize = 80;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Raw,
    Fasta,
    #[default]
    GenBank,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Fasta => write!(f, "fasta"),
            Self::GenBank => write!(f, "genbank"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "txt" => Ok(Self::Raw),
            "fasta" | "fa" | "fna" => Ok(Self::Fasta),
            "genbank" | "gb" | "gbk" => Ok(Self::GenBank),
            other => Err(format!(
                "Unknown output format '{other}', use 'raw', 'fasta' or 'genbank'"
            )),
        }
    }
}

/// `>{id} {description}` followed by 80-column sequence lines.
pub fn write_fasta(id: &str, description: Option<&str>, sequence: &[u8]) -> String {
    let mut out = format!(">{}", genbank::locus_name(id));
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        out.push(' ');
        out.push_str(description);
    }
    out.push('\n');
    for chunk in sequence.chunks(FASTA_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out
}

/// Serializes an assembled construct. The GenBank form carries `annotations`
/// as its feature table; every annotation must fit the construct.
pub fn export(construct: &Construct, format: ExportFormat, annotations: &[Feature]) -> Result<String> {
    Ok(match format {
        ExportFormat::Raw => construct.sequence().to_string(),
        ExportFormat::Fasta => write_fasta(
            &construct.name(),
            Some(&construct.description()),
            construct.as_bytes(),
        ),
        ExportFormat::GenBank => {
            let record = SequenceRecord::new(&construct.name(), construct.sequence(), construct.topology())?
                .with_features(annotations.to_vec())?
                .with_description(&construct.description());
            genbank::write_record(&record)
        }
    })
}

pub fn export_record(record: &SequenceRecord, format: ExportFormat) -> String {
    match format {
        ExportFormat::Raw => record.sequence().to_string(),
        ExportFormat::Fasta => write_fasta(record.id(), record.description(), record.as_bytes()),
        ExportFormat::GenBank => genbank::write_record(record),
    }
}

fn records_from_fasta(reader: impl Read) -> Result<Vec<SequenceRecord>> {
    fasta::Reader::new(reader)
        .records()
        .map(|record| {
            let record = record?;
            let text = String::from_utf8_lossy(record.seq());
            let parsed = SequenceRecord::new(record.id(), &text, Topology::Linear)?;
            Ok(match record.desc() {
                Some(desc) => parsed.with_description(desc),
                None => parsed,
            })
        })
        .collect()
}

/// Reads FASTA text. Records come back linear and without features.
pub fn parse_fasta(text: &str) -> Result<Vec<SequenceRecord>> {
    let records = records_from_fasta(text.as_bytes())?;
    if records.is_empty() {
        return Err(ConstructError::malformed("fasta", "no FASTA records found"));
    }
    Ok(records)
}

pub fn read_fasta_file(path: impl AsRef<Path>) -> Result<Vec<SequenceRecord>> {
    records_from_fasta(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembler::assemble, feature::Strand};

    fn construct() -> (Construct, SequenceRecord, SequenceRecord) {
        let backbone = SequenceRecord::new("vec", &"ACGT".repeat(25), Topology::Circular)
            .unwrap()
            .with_features(vec![Feature::new("promoter", "P", 1, 20, Strand::Forward)])
            .unwrap();
        let insert = SequenceRecord::new("gene", &format!("ATG{}TAA", "GCC".repeat(30)), Topology::Linear).unwrap();
        let construct = assemble(&backbone, &insert, 41, None, false).unwrap();
        (construct, backbone, insert)
    }

    #[test]
    fn test_format_names() {
        assert_eq!("GB".parse::<ExportFormat>(), Ok(ExportFormat::GenBank));
        assert_eq!("fa".parse::<ExportFormat>(), Ok(ExportFormat::Fasta));
        assert_eq!(" raw ".parse::<ExportFormat>(), Ok(ExportFormat::Raw));
        assert!("embl".parse::<ExportFormat>().is_err());
        assert_eq!(serde_json::to_string(&ExportFormat::GenBank).unwrap(), "\"genbank\"");
    }

    #[test]
    fn test_fasta_wraps_at_80() {
        let (c, bb, ins) = construct();
        let text = export(&c, ExportFormat::Fasta, &c.annotations(&bb, &ins)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ">gene_in_vec gene in vec, 196 bp");
        assert_eq!(lines[1].len(), 80);
        assert_eq!(lines[2].len(), 80);
        assert_eq!(lines[3].len(), 36);
        assert_eq!(lines[1..].concat(), c.sequence());

        let back = parse_fasta(&text).unwrap();
        assert_eq!(back[0].id(), "gene_in_vec");
        assert_eq!(back[0].sequence(), c.sequence());
        assert_eq!(back[0].description(), Some("gene in vec, 196 bp"));
    }

    #[test]
    fn test_genbank_export_has_insert_and_shifted_features() {
        let (c, bb, ins) = construct();
        let text = export(&c, ExportFormat::GenBank, &c.annotations(&bb, &ins)).unwrap();
        assert!(text.starts_with("LOCUS       gene_in_vec        196 bp    DNA     circular   UNK\n"));
        assert!(text.contains("DEFINITION  gene in vec, 196 bp\n"));
        assert!(text.contains("     CDS             41..136\n"));
        assert!(text.contains("                     /note=\"Insert: gene\"\n"));

        let parsed = genbank::parse(&text).unwrap();
        assert_eq!(parsed.sequence(), c.sequence());
        assert_eq!(parsed.features().len(), 2);
    }

    #[test]
    fn test_raw_and_bad_annotations() {
        let (c, _, _) = construct();
        assert_eq!(export(&c, ExportFormat::Raw, &[]).unwrap(), c.sequence());
        let outside = Feature::new("CDS", "x", 190, 200, Strand::Forward);
        assert!(matches!(
            export(&c, ExportFormat::GenBank, &[outside]),
            Err(ConstructError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_parse_fasta_errors() {
        assert!(parse_fasta("").is_err());
        assert!(matches!(
            parse_fasta(">x\nACGZ\n"),
            Err(ConstructError::InvalidNucleotide { .. })
        ));
        let records = parse_fasta(">a first\nACGT\nAC\n>b\nGG\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence(), "ACGTAC");
        assert_eq!(records[1].description(), None);
    }

    #[test]
    fn test_read_fasta_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ins.fa");
        let record = SequenceRecord::new("ins", "ATGAAATAA", Topology::Linear).unwrap();
        std::fs::write(&path, export_record(&record, ExportFormat::Fasta)).unwrap();
        let back = read_fasta_file(&path).unwrap();
        assert_eq!(back, vec![record]);
    }
}
