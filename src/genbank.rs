//! GenBank flat files: a line-oriented reader with strict length checks, a
//! writer for the same layout, and gb-io backed file helpers.

use crate::{
    error::{ConstructError, Result},
    feature::{Feature, Qualifier},
    feature_location::{format_location, parse_location},
    record::{SequenceRecord, Topology},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::{fmt::Write as _, fs::File, path::Path};
use tracing::{debug, warn};

/// Column where locations and qualifiers start.
const QUALIFIER_INDENT: usize = 21;
const BASES_PER_LINE: usize = 60;
const BASES_PER_GROUP: usize = 10;

lazy_static! {
    static ref QUALIFIER: Regex = Regex::new(r"^/([^=\s]+)(?:=(.*))?$").expect("valid regex");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Header,
    Definition,
    Features,
    Origin,
}

#[derive(Debug, Default)]
struct RawFeature {
    key: String,
    location: String,
    qualifiers: Vec<(String, Option<String>)>,
}

impl RawFeature {
    fn location_open(&self) -> bool {
        self.qualifiers.is_empty()
            && self.location.matches('(').count() > self.location.matches(')').count()
    }

    fn last_value_open(&self) -> bool {
        self.qualifiers
            .last()
            .and_then(|(_, v)| v.as_ref())
            .is_some_and(|v| v.starts_with('"') && v.matches('"').count() % 2 == 1)
    }
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = value.strip_suffix('"').unwrap_or(value);
    value.replace("\"\"", "\"")
}

#[derive(Debug, Default)]
struct RecordBuilder {
    name: Option<String>,
    declared_len: Option<usize>,
    topology: Topology,
    has_locus: bool,
    definition: Vec<String>,
    features: Vec<RawFeature>,
    sequence: String,
    section: Option<Section>,
}

impl RecordBuilder {
    fn feed(&mut self, line: &str) {
        let content = line.trim_start();
        let indent = line.len() - content.len();
        if content.is_empty() {
            return;
        }
        if indent == 0 {
            self.header_line(line);
            return;
        }
        match self.section {
            Some(Section::Definition) => self.definition.push(content.trim_end().to_string()),
            Some(Section::Features) => self.feature_line(content.trim_end(), indent),
            Some(Section::Origin) => self.sequence.extend(
                content
                    .chars()
                    .filter(|c| !c.is_whitespace() && !c.is_ascii_digit()),
            ),
            Some(Section::Header) | None => {}
        }
    }

    fn header_line(&mut self, line: &str) {
        let keyword = line.split_whitespace().next().unwrap_or_default();
        let rest = line.get(keyword.len()..).unwrap_or_default().trim();
        self.section = Some(match keyword {
            "LOCUS" => {
                self.has_locus = true;
                self.locus_line(line);
                Section::Header
            }
            "DEFINITION" => {
                if !rest.is_empty() {
                    self.definition.push(rest.to_string());
                }
                Section::Definition
            }
            "FEATURES" => Section::Features,
            "ORIGIN" => Section::Origin,
            _ => Section::Header,
        });
    }

    /// `LOCUS name length bp|aa [molecule] [topology] [division] [date]`.
    /// The unit token anchors the layout, so ids that look like a length or
    /// a topology keyword stay ids.
    fn locus_line(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().skip(1).collect();
        let is_unit = |token: &str| token.eq_ignore_ascii_case("bp") || token.eq_ignore_ascii_case("aa");
        let unit = (1..tokens.len())
            .find(|&i| is_unit(tokens[i]) && tokens[i - 1].parse::<usize>().is_ok());
        self.declared_len = unit.and_then(|i| tokens[i - 1].parse().ok());
        self.name = match unit {
            Some(1) => None,
            _ => tokens.first().map(|token| token.to_string()),
        };
        let tail = unit.map_or(&[][..], |i| &tokens[i + 1..]);
        self.topology = if tail.iter().any(|token| token.eq_ignore_ascii_case("circular")) {
            Topology::Circular
        } else {
            Topology::Linear
        };
    }

    fn feature_line(&mut self, content: &str, indent: usize) {
        if indent < QUALIFIER_INDENT {
            let (key, location) = content
                .split_once(char::is_whitespace)
                .unwrap_or((content, ""));
            self.features.push(RawFeature {
                key: key.to_string(),
                location: location.trim().to_string(),
                qualifiers: vec![],
            });
            return;
        }
        let Some(feature) = self.features.last_mut() else {
            return;
        };
        if feature.location_open() {
            feature.location.push_str(content);
        } else if feature.last_value_open() {
            if let Some((_, Some(value))) = feature.qualifiers.last_mut() {
                value.push(' ');
                value.push_str(content);
            }
        } else if let Some(caps) = QUALIFIER.captures(content) {
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let value = caps.get(2).map(|m| m.as_str().to_string());
            feature.qualifiers.push((name, value));
        } else if let Some((_, Some(value))) = feature.qualifiers.last_mut() {
            // unquoted continuation, e.g. a wrapped /note=text value
            value.push(' ');
            value.push_str(content);
        }
    }

    fn build(self) -> Result<SequenceRecord> {
        let id = self.name.unwrap_or_else(|| "unnamed".to_string());
        if !self.has_locus {
            return Err(ConstructError::malformed(&id, "missing LOCUS line"));
        }
        let Some(declared) = self.declared_len else {
            return Err(ConstructError::malformed(&id, "LOCUS line declares no length"));
        };
        if declared != self.sequence.len() {
            return Err(ConstructError::malformed(
                &id,
                format!(
                    "LOCUS declares {declared} bp but the ORIGIN block holds {} bp",
                    self.sequence.len()
                ),
            ));
        }

        let record = if declared == 0 {
            SequenceRecord::pending(&id, self.topology)
        } else {
            SequenceRecord::new(&id, &self.sequence, self.topology)?
        };
        let circular = record.is_circular();
        let features = self
            .features
            .into_iter()
            .filter_map(|raw| {
                let Some(span) = parse_location(&raw.location, circular) else {
                    warn!(record = %id, key = %raw.key, location = %raw.location, "skipping feature with zero-length or unreadable location");
                    return None;
                };
                let qualifiers: Vec<Qualifier> = raw
                    .qualifiers
                    .into_iter()
                    .map(|(name, value)| (name, value.map(|v| unquote(&v))))
                    .collect();
                Some(Feature::from_parts(&raw.key, qualifiers, span.start, span.end, span.strand))
            })
            .collect();
        let record = record.with_features(features)?;

        let definition = self.definition.join(" ");
        let record = match definition.trim() {
            "" | "." => record,
            text => record.with_description(text),
        };
        debug!(record = %record.id(), length = record.len(), features = record.features().len(), "parsed flat file");
        Ok(record)
    }
}

/// Parses every record in `text`. Records end at a `//` line; a trailing
/// record without one is still read.
pub fn parse_many(text: &str) -> Result<Vec<SequenceRecord>> {
    let mut records = vec![];
    let mut builder: Option<RecordBuilder> = None;
    for line in text.lines() {
        if line.trim() == "//" {
            if let Some(done) = builder.take() {
                records.push(done.build()?);
            }
            continue;
        }
        builder.get_or_insert_with(RecordBuilder::default).feed(line);
    }
    if let Some(rest) = builder {
        if rest.has_locus {
            records.push(rest.build()?);
        }
    }
    Ok(records)
}

/// Parses the first record of a flat file.
pub fn parse(text: &str) -> Result<SequenceRecord> {
    parse_many(text)?
        .into_iter()
        .next()
        .ok_or_else(|| ConstructError::malformed("unnamed", "missing LOCUS line"))
}

pub fn locus_name(id: &str) -> String {
    id.split_whitespace().collect::<Vec<_>>().join("_")
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn write_feature(out: &mut String, feature: &Feature, parent_len: usize) {
    let location = format_location(feature, parent_len);
    let pad = " ".repeat(QUALIFIER_INDENT);
    if feature.key.len() < QUALIFIER_INDENT - 6 {
        let _ = writeln!(out, "     {:<16}{location}", feature.key);
    } else {
        let _ = writeln!(out, "     {} {location}", feature.key);
    }
    let _ = writeln!(out, "{pad}/label={}", quote(&feature.label));
    for (name, value) in &feature.qualifiers {
        match value {
            Some(value) => {
                let _ = writeln!(out, "{pad}/{name}={}", quote(value));
            }
            None => {
                let _ = writeln!(out, "{pad}/{name}");
            }
        }
    }
}

/// Writes the ORIGIN block: 60 lowercase bases per line in groups of ten,
/// each line led by its right-justified 1-based offset.
pub fn write_origin(out: &mut String, sequence: &[u8]) {
    out.push_str("ORIGIN\n");
    for (line_no, chunk) in sequence.chunks(BASES_PER_LINE).enumerate() {
        let groups: Vec<String> = chunk
            .chunks(BASES_PER_GROUP)
            .map(|group| String::from_utf8_lossy(group).to_ascii_lowercase())
            .collect();
        let _ = writeln!(out, "{:>9} {}", line_no * BASES_PER_LINE + 1, groups.join(" "));
    }
    out.push_str("//\n");
}

/// Serializes a record so that [`parse`] reads it back unchanged.
pub fn write_record(record: &SequenceRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "LOCUS       {:<16} {:>5} bp    DNA     {}   UNK",
        locus_name(record.id()),
        record.len(),
        record.topology()
    );
    let _ = writeln!(out, "DEFINITION  {}", record.description().unwrap_or("."));
    out.push_str("FEATURES             Location/Qualifiers\n");
    for feature in record.features() {
        write_feature(&mut out, feature, record.len());
    }
    write_origin(&mut out, record.as_bytes());
    out
}

/// Reads a GenBank file through gb-io.
pub fn read_gb_file(path: impl AsRef<Path>) -> Result<Vec<SequenceRecord>> {
    let path = path.as_ref();
    let seqs = gb_io::reader::parse_file(path)
        .map_err(|e| ConstructError::malformed(&path.display().to_string(), e.to_string()))?;
    seqs.iter().map(SequenceRecord::from_gb_seq).collect()
}

/// Writes a record through gb-io.
pub fn write_gb_file(record: &SequenceRecord, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    gb_io::writer::write(file, &record.to_gb_seq())?;
    Ok(())
}
