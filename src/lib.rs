//! Parsing, validation, mutation and serialization of VCF 4.1, 4.2 and 4.3 files.
//!
//! The header is parsed first and turned into a [`Registry`] of declared fields; records
//! are then validated against that registry at one of three [`ValidationLevel`]s.

pub mod checks;
pub mod document;
pub mod error;
pub mod grammar;
pub mod header;
pub(crate) mod parser;
pub mod reader;
pub mod record;
pub mod types;
pub mod writer;

pub use document::{Document, DocumentBuilder, Options};
pub use error::{
    ConfigError, HeaderValidationError, MutationError, ParseError, RecordValidationError, Result,
    VcfError,
};
pub use header::{Declaration, Header, HeaderPatch, Registry};
pub use reader::VcfReader;
pub use record::{Record, RecordInput, RecordPatch, RecordValidator, SampleEntry};
pub use types::{FieldType, MetaKey, Number, RecordField, ValidationLevel, VcfVersion};
pub use writer::VcfWriter;

#[cfg(test)]
mod test {
    use super::reader::VcfReader;
    use super::*;

    #[test]
    fn test_samples() {
        let reader = VcfReader::from_path("resources/example.vcf", None).unwrap();
        assert_eq!(
            reader.header().sample_names(),
            vec!["NA00001", "NA00002", "NA00003"]
        );
    }

    #[test]
    fn test_compressed_input() {
        let plain = Document::from_path("resources/example.vcf", Options::default()).unwrap();
        let gzipped = Document::from_path("resources/example.vcf.gz", Options::default()).unwrap();
        assert_eq!(plain.records(), gzipped.records());
        assert!(plain.errors().is_empty());
    }
}
