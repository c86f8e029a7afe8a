//! A whole VCF file in memory: the header, its registry and the validated records.
//!
//! Every mutation validates before it commits. A failed mutation leaves the document
//! exactly as it was.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use getset::{CopyGetters, Getters};
use indexmap::IndexMap;
use log::{debug, warn};
use multimap::MultiMap;

use crate::error::{ConfigError, MutationError, RecordValidationError, Result, VcfError};
use crate::header::{Header, HeaderPatch, Registry};
use crate::reader::VcfReader;
use crate::record::{Record, RecordInput, RecordPatch, RecordValidator, UniqueIds};
use crate::types::{MetaKey, RecordField, ValidationLevel};
use crate::writer::VcfWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Options {
    validation: ValidationLevel,
    /// return the first record error instead of collecting them
    fail_fast: bool,
    /// reject records reusing a non-missing ID
    check_unique_ids: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            validation: ValidationLevel::Strict,
            fail_fast: false,
            check_unique_ids: false,
        }
    }
}

impl Options {
    pub fn new(validation: ValidationLevel) -> Self {
        Self {
            validation,
            ..Self::default()
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_check_unique_ids(mut self, check_unique_ids: bool) -> Self {
        self.check_unique_ids = check_unique_ids;
        self
    }
}

/// Collects construction parameters for a [`Document`].
///
/// # Examples
///
/// ```
/// use rust_vcf::{DocumentBuilder, Header};
///
/// let header = Header::new(rust_vcf::VcfVersion::V4_2);
/// let document = DocumentBuilder::new()
///     .data(header, Vec::new())
///     .validation("basic")
///     .build();
/// // INFO, FORMAT and FILTER declarations are required at every level
/// assert!(document.is_err());
/// assert!(DocumentBuilder::new().validation("lenient").build().is_err());
/// ```
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    data: Option<(Header, Vec<Record>)>,
    file: Option<PathBuf>,
    validation: Option<String>,
    fail_fast: bool,
    check_unique_ids: bool,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, header: Header, records: Vec<Record>) -> Self {
        self.data = Some((header, records));
        self
    }

    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// One of `basic`, `relaxed` or `strict`; defaults to `strict`.
    pub fn validation(mut self, level: &str) -> Self {
        self.validation = Some(level.to_owned());
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn check_unique_ids(mut self, check_unique_ids: bool) -> Self {
        self.check_unique_ids = check_unique_ids;
        self
    }

    pub fn options(&self) -> Result<Options> {
        let validation = match &self.validation {
            Some(level) => ValidationLevel::from_str(level)
                .map_err(|_| ConfigError::InvalidValidationLevel(level.clone()))?,
            None => ValidationLevel::default(),
        };
        Ok(Options::new(validation)
            .with_fail_fast(self.fail_fast)
            .with_check_unique_ids(self.check_unique_ids))
    }

    pub fn build(self) -> Result<Document> {
        let options = self.options()?;
        match (self.file, self.data) {
            (Some(path), data) => {
                if data.is_some() {
                    warn!("both a file and in-memory data were given, reading {}", path.display());
                }
                Document::from_path(path, options)
            }
            (None, Some((header, records))) => Document::from_data(header, records, options),
            (None, None) => Err(ConfigError::NoInput.into()),
        }
    }
}

#[derive(Debug, Clone, Getters)]
pub struct Document {
    #[getset(get = "pub")]
    header: Header,
    #[getset(get = "pub")]
    registry: Registry,
    #[getset(get = "pub")]
    records: Vec<Record>,
    /// record errors collected during the bulk pass, in file order
    #[getset(get = "pub")]
    errors: Vec<RecordValidationError>,
    options: Options,
    index: MultiMap<String, usize>,
    unique: Option<UniqueIds>,
}

impl Document {
    fn empty(header: Header, options: Options) -> Self {
        Self {
            registry: header.extract_registry(),
            header,
            records: Vec::new(),
            errors: Vec::new(),
            options,
            index: MultiMap::new(),
            unique: if options.check_unique_ids {
                Some(UniqueIds::new())
            } else {
                None
            },
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        Self::from_records(VcfReader::from_path(path, Some(options.validation))?, options)
    }

    pub fn from_reader<R: BufRead>(reader: R, options: Options) -> Result<Self> {
        Self::from_records(VcfReader::new(reader, Some(options.validation))?, options)
    }

    pub fn from_text(text: &str, options: Options) -> Result<Self> {
        Self::from_reader(text.as_bytes(), options)
    }

    /// Validate an in-memory header and records. Records are validated in order with the
    /// same error policy as the bulk pass over a file.
    pub fn from_data(header: Header, records: Vec<Record>, options: Options) -> Result<Self> {
        header.validate(options.validation)?;
        let mut document = Self::empty(header, options);
        for mut record in records {
            let checked = RecordValidator::new(&document.registry, options.validation).validate(&mut record);
            let outcome = checked
                .map_err(VcfError::from)
                .and_then(|_| document.track_unique(&record, None));
            match outcome {
                Ok(()) => document.push(record),
                Err(e) => document.collect(e)?,
            }
        }
        Ok(document)
    }

    fn from_records<R: BufRead>(mut reader: VcfReader<R>, options: Options) -> Result<Self> {
        let mut document = Self::empty(reader.header().clone(), options);
        while let Some(item) = reader.next() {
            let line = Some(reader.line_number());
            match item.and_then(|record| document.track_unique(&record, line).map(|_| record)) {
                Ok(record) => document.push(record),
                Err(e) => document.collect(e)?,
            }
        }
        debug!(
            "read {} records, {} rejected",
            document.records.len(),
            document.errors.len()
        );
        Ok(document)
    }

    /// Keep a record error and continue, or hand any other error back to abort the pass.
    fn collect(&mut self, error: VcfError) -> Result<()> {
        match error {
            VcfError::Record(e) if !self.options.fail_fast => {
                warn!("skipping record: {}", e);
                self.errors.push(e);
                Ok(())
            }
            e => Err(e),
        }
    }

    fn track_unique(&mut self, record: &Record, line: Option<usize>) -> Result<()> {
        if let Some(unique) = self.unique.as_mut() {
            unique.check(record).map_err(|e| e.at(line))?;
        }
        Ok(())
    }

    fn push(&mut self, record: Record) {
        self.index
            .insert(record.identity_key().clone(), self.records.len());
        self.records.push(record);
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.identity_key().clone(), i))
            .collect();
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn version(&self) -> crate::types::VcfVersion {
        self.registry.version()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records with the given identity key (`CHROM`, `POS`, `REF`, `ALT` joined by tabs).
    pub fn find(&self, identity_key: &str) -> Vec<&Record> {
        self.index
            .get_vec(identity_key)
            .map(|indices| indices.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Add a header declaration and rebuild the registry.
    pub fn add_declaration<K, V, I>(&mut self, kind: MetaKey, attributes: I) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.header.add(kind, attributes, self.options.validation)?;
        self.registry = self.header.extract_registry();
        Ok(())
    }

    /// Change the header, then re-validate every record against the new registry.
    /// Rejected as a whole if the header or any record no longer validates.
    pub fn change_header(&mut self, target: &str, patch: HeaderPatch) -> Result<()> {
        let level = self.options.validation;
        let mut header = self.header.clone();
        header.change(target, patch, level)?;
        let registry = header.extract_registry();
        let validator = RecordValidator::new(&registry, level);
        let mut records = self.records.clone();
        for record in records.iter_mut() {
            validator.validate(record)?;
        }
        self.header = header;
        self.registry = registry;
        self.records = records;
        self.rebuild_index();
        Ok(())
    }

    /// Validate a new record and append it. INFO keys, FORMAT keys and samples are put
    /// in the order of the first record so all lines share one column layout.
    pub fn add_record<'a, I: Into<RecordInput<'a>>>(&mut self, input: I) -> Result<()> {
        let mut record = RecordValidator::new(&self.registry, self.options.validation).check(input.into())?;
        if let Some(first) = self.records.first() {
            record.follow_layout(first);
        }
        self.track_unique(&record, None)?;
        self.push(record);
        Ok(())
    }

    fn record_mut(&mut self, index: usize) -> Result<&mut Record> {
        let len = self.records.len();
        self.records.get_mut(index).ok_or_else(|| {
            MutationError::Missing {
                kind: "record".into(),
                key: format!("{} of {}", index, len),
            }
            .into()
        })
    }

    pub fn add_key_value_attr(
        &mut self,
        index: usize,
        field: RecordField,
        pairs: IndexMap<String, Vec<String>>,
    ) -> Result<()> {
        let level = self.options.validation;
        let registry = self.registry.clone();
        self.record_mut(index)?
            .add_key_value_attr(field, pairs, &registry, level)
    }

    pub fn add_key_attr<S: AsRef<str>>(&mut self, index: usize, field: RecordField, keys: &[S]) -> Result<()> {
        let level = self.options.validation;
        let registry = self.registry.clone();
        let record = self.record_mut(index)?;
        let before = record.identity_key().clone();
        record.add_key_attr(field, keys, &registry, level)?;
        if *record.identity_key() != before {
            self.rebuild_index();
        }
        Ok(())
    }

    /// Apply `patch` to one record. With unique IDs on, the patched record must not
    /// reuse an ID held by any other record.
    pub fn change_record(&mut self, index: usize, patch: RecordPatch) -> Result<()> {
        let level = self.options.validation;
        let mut candidate = self.record_mut(index)?.clone();
        candidate.change(patch, &self.registry, level)?;
        if self.unique.is_some() {
            let records = self
                .records
                .iter()
                .enumerate()
                .map(|(i, record)| if i == index { &candidate } else { record });
            self.unique = Some(UniqueIds::from_records(records)?);
        }
        self.records[index] = candidate;
        Ok(())
    }

    /// Keep only the records for which `keep` returns true.
    pub fn retain<F: FnMut(&Record) -> bool>(&mut self, mut keep: F) -> Result<()> {
        let records: Vec<Record> = self.records.iter().filter(|record| keep(*record)).cloned().collect();
        if self.unique.is_some() {
            self.unique = Some(UniqueIds::from_records(&records)?);
        }
        self.records = records;
        self.rebuild_index();
        Ok(())
    }

    /// Write the header and all records. Nothing is validated at this point.
    pub fn write_to<W: Write>(&self, sink: W) -> Result<W> {
        let mut writer = VcfWriter::new(sink);
        writer.write_header(&self.header)?;
        for record in &self.records {
            writer.write_record(record)?;
        }
        writer.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::test::HEADER;
    use crate::record::SampleEntry;

    fn text(records: &[&str]) -> String {
        let mut text = HEADER.to_owned();
        for record in records {
            text.push_str(record);
            text.push('\n');
        }
        text
    }

    fn relaxed() -> Options {
        Options::new(ValidationLevel::Relaxed)
    }

    #[test]
    fn test_bulk_pass_collects_record_errors() {
        let input = text(&[
            "20\t100\t.\tG\tA\t.\tPASS\tNS=2\tGT:DP\t0/1:3\t0/0:4",
            "20\t200\t.\tG\tA,T\t.\tPASS\tAF=0.5\tGT\t0/1\t0/0",
            "20\t300\t.\tC\tT\t.\tp30\t.\tGT\t0/1\t0/0",
            "20\t100\trs1\tG\tA\t.\t.\t.\tGT\t1/1\t0/0",
        ]);
        let document = Document::from_text(&input, relaxed()).unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document.errors().len(), 2);
        assert_eq!(document.errors()[0].line, Some(15));
        assert_eq!(document.errors()[1].field, RecordField::Filter);
        assert_eq!(document.find("20\t100\tG\tA").len(), 2);
        assert!(document.find("20\t200\tG\tA,T").is_empty());

        let err = Document::from_text(&input, relaxed().with_fail_fast(true)).unwrap_err();
        assert!(matches!(err, VcfError::Record(RecordValidationError { line: Some(15), .. })));

        let mut broken = input.clone();
        broken.push_str("20\t400\n");
        assert!(matches!(Document::from_text(&broken, relaxed()), Err(VcfError::Parse(_))));
    }

    #[test]
    fn test_unique_ids_are_opt_in() {
        let input = text(&[
            "20\t100\trs1\tG\tA\t.\t.\t.\tGT\t0/1\t0/0",
            "20\t200\trs1\tG\tA\t.\t.\t.\tGT\t0/1\t0/0",
        ]);
        assert_eq!(Document::from_text(&input, relaxed()).unwrap().len(), 2);
        let document = Document::from_text(&input, relaxed().with_check_unique_ids(true)).unwrap();
        assert_eq!(document.len(), 1);
        assert_eq!(document.errors()[0].field, RecordField::Id);
        assert_eq!(document.errors()[0].line, Some(15));
    }

    #[test]
    fn test_unique_ids_hold_across_record_changes() {
        let input = text(&[
            "20\t100\trs1\tG\tA\t.\t.\t.\tGT\t0/1\t0/0",
            "20\t200\trs2\tG\tA\t.\t.\t.\tGT\t0/1\t0/0",
        ]);
        let mut document = Document::from_text(&input, relaxed().with_check_unique_ids(true)).unwrap();
        match document.change_record(1, RecordPatch::Id(vec!["rs1".into()])) {
            Err(VcfError::Record(e)) => assert_eq!(e.field, RecordField::Id),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(document.records()[1].id(), &["rs2"]);

        document.change_record(1, RecordPatch::Id(vec!["rs3".into()])).unwrap();
        // rs2 was released by the change
        document
            .add_record("20\t300\trs2\tG\tA\t.\t.\t.\tGT\t0/1\t0/0")
            .unwrap();
        assert!(document
            .add_record("20\t400\trs3\tG\tA\t.\t.\t.\tGT\t0/1\t0/0")
            .is_err());

        document.retain(|record| record.pos() != 200).unwrap();
        document
            .add_record("20\t400\trs3\tG\tA\t.\t.\t.\tGT\t0/1\t0/0")
            .unwrap();
        assert_eq!(document.len(), 3);
    }

    #[test]
    fn test_add_record_follows_first_layout() {
        let mut document = Document::from_text(
            &text(&["20\t100\t.\tG\tA\t.\t.\tNS=2;AF=0.5\tGT:DP\t0/1:3\t0/0:4"]),
            relaxed(),
        )
        .unwrap();
        let record = Record::new("20", 150, "C", vec!["T"])
            .with_info("AF", vec!["0.1"])
            .with_info("DB", Vec::<String>::new())
            .with_info("NS", vec!["1"])
            .with_format(vec!["GT", "DP"])
            .with_sample(SampleEntry::new("", 1).with_attr("DP", vec!["7".into()]).with_attr("GT", vec!["1/1".into()]))
            .with_sample(SampleEntry::new("", 0).with_attr("GT", vec!["0/1".into()]));
        document.add_record(record).unwrap();
        let added = &document.records()[1];
        assert_eq!(added.info().keys().collect::<Vec<_>>(), ["NS", "AF", "DB"]);
        assert_eq!(added.sample()[0].name(), "NA00001");
        assert_eq!(added.to_string(), "20\t150\t.\tC\tT\t.\t.\tNS=1;AF=0.1;DB\tGT:DP\t0/1:.\t1/1:7");

        let before = document.records().len();
        assert!(document.add_record("20\t1\t.\tG\tA\t.\tp30\t.\tGT\t0/1\t0/0").is_err());
        assert_eq!(document.records().len(), before);
        document.add_record("20\t1\t.\tG\tA\t.\tq10\t.\tGT\t0/1\t0/0").unwrap();
        assert_eq!(document.find("20\t1\tG\tA").len(), 1);
    }

    #[test]
    fn test_change_header_revalidates_records() {
        let mut document = Document::from_text(
            &text(&["20\t100\t.\tG\tA\t.\t.\tNS=2\tGT:DP\t0/1:3\t0/0:4"]),
            relaxed(),
        )
        .unwrap();
        let before = document.header().clone();
        let patch = HeaderPatch::Attribute {
            id: "NS".into(),
            key: "Number".into(),
            value: "2".into(),
        };
        assert!(matches!(document.change_header("INFO", patch), Err(VcfError::Record(_))));
        assert_eq!(document.header(), &before);

        let patch = HeaderPatch::Attribute {
            id: "NS".into(),
            key: "Type".into(),
            value: "Float".into(),
        };
        document.change_header("INFO", patch).unwrap();
        assert_eq!(document.registry().info()["NS"].kind(), crate::types::FieldType::Float);

        document
            .add_declaration(MetaKey::Filter, vec![("ID", "p30"), ("Description", "\"Pass 30\"")])
            .unwrap();
        assert!(document.registry().filter().contains("p30"));
    }

    #[test]
    fn test_record_mutations_and_retain() {
        let mut document = Document::from_text(
            &text(&[
                "20\t100\t.\tG\tA\t.\t.\t.\tGT\t0/1\t0/0",
                "20\t200\t.\tG\tT\t.\t.\t.\tGT\t0/1\t0/0",
            ]),
            relaxed(),
        )
        .unwrap();
        document.add_key_attr(0, RecordField::Alt, &["DEL:ME:ALU"]).unwrap();
        assert_eq!(document.find("20\t100\tG\tA,<DEL:ME:ALU>").len(), 1);
        assert!(document.find("20\t100\tG\tA").is_empty());

        let mut pairs = IndexMap::new();
        pairs.insert("AF".to_owned(), vec!["0.1".to_owned(), "0.2".to_owned()]);
        document.add_key_value_attr(0, RecordField::Info, pairs).unwrap();
        document
            .change_record(1, RecordPatch::Qual("12.5".into()))
            .unwrap();
        assert_eq!(document.records()[1].qual(), "12.5");
        assert!(matches!(
            document.change_record(5, RecordPatch::Qual("1".into())),
            Err(VcfError::Mutation(MutationError::Missing { .. }))
        ));

        document.retain(|record| record.pos() > 150).unwrap();
        assert_eq!(document.len(), 1);
        assert_eq!(document.find("20\t200\tG\tT").len(), 1);
        assert!(document.find("20\t100\tG\tA,<DEL:ME:ALU>").is_empty());
    }

    #[test]
    fn test_builder() {
        assert!(matches!(
            DocumentBuilder::new().build(),
            Err(VcfError::Config(ConfigError::NoInput))
        ));
        assert!(matches!(
            DocumentBuilder::new().validation("loose").build(),
            Err(VcfError::Config(ConfigError::InvalidValidationLevel(_)))
        ));
        let header = Header::parse(HEADER).unwrap();
        let records = vec![
            Record::new("20", 1, "G", vec!["A"]),
            Record::new("20", 2, "G", vec!["G"]),
        ];
        let document = DocumentBuilder::new()
            .data(header, records)
            .validation("basic")
            .build()
            .unwrap();
        assert_eq!(document.options().validation(), ValidationLevel::Basic);
        assert_eq!(document.len(), 1);
        assert_eq!(document.errors()[0].field, RecordField::Alt);

        let written = document.write_to(Vec::new()).unwrap();
        let reread = Document::from_reader(&written[..], Options::new(ValidationLevel::Basic)).unwrap();
        assert_eq!(reread.records(), document.records());
    }
}
