//! Plasmid construct assembly, fusion, GenBank annotation parsing and
//! rubric validation. All coordinates are 1-based and inclusive.

pub mod about;
pub mod assembler;
pub mod error;
pub mod export;
pub mod feature;
pub mod feature_location;
pub mod fusion;
pub mod genbank;
pub mod iupac_code;
pub mod mcs;
pub mod pipeline;
pub mod record;
pub mod resolver;
pub mod rubric;
pub mod sequence;

pub use assembler::{Construct, Orientation, Splice, assemble};
pub use error::{ConstructError, Result};
pub use export::{ExportFormat, export, export_record};
pub use feature::{Feature, FeatureKind, Strand};
pub use fusion::{Linker, fuse};
pub use genbank::parse;
pub use record::{SequenceRecord, Topology};
pub use resolver::{Catalog, RecordResolver};
pub use rubric::{Rubric, RubricConfig, ValidationReport, validate};
