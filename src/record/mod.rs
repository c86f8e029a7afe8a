//! Data lines: the eight fixed columns plus FORMAT and per-sample genotype columns.

mod mutate;
mod validate;

use getset::{CopyGetters, Getters};
use indexmap::IndexMap;

use crate::error::{RecordValidationError, Result};
use crate::parser::{self, split_list};
use crate::types::{RecordField, IDENTITY_KEY_SEPARATOR, MISSING};

pub use mutate::RecordPatch;
pub use validate::{RecordValidator, UniqueIds};

/// One sample column, its values keyed by FORMAT key in FORMAT order.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct SampleEntry {
    #[getset(get = "pub")]
    name: String,
    /// position among the sample columns
    #[getset(get_copy = "pub")]
    order: usize,
    #[getset(get = "pub")]
    attrs: IndexMap<String, Vec<String>>,
}

impl SampleEntry {
    pub fn new(name: impl Into<String>, order: usize) -> Self {
        Self {
            name: name.into(),
            order,
            attrs: IndexMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.attrs.insert(key.into(), values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.attrs.get(key).map(Vec::as_slice)
    }
}

/// A variant record. Lists hold the split column values; missing columns hold `["."]`.
///
/// Records built in memory are normalized by [`RecordValidator::validate`], which also
/// computes the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Record {
    #[getset(get = "pub")]
    chrom: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    id: Vec<String>,
    #[getset(get = "pub")]
    reference: String,
    #[getset(get = "pub")]
    alt: Vec<String>,
    #[getset(get = "pub")]
    qual: String,
    #[getset(get = "pub")]
    filter: Vec<String>,
    #[getset(get = "pub")]
    info: IndexMap<String, Vec<String>>,
    #[getset(get = "pub")]
    format: Vec<String>,
    #[getset(get = "pub")]
    sample: Vec<SampleEntry>,
    #[getset(get = "pub")]
    identity_key: String,
}

/// The two shapes a record can be validated from.
#[derive(Debug, Clone)]
pub enum RecordInput<'a> {
    Text { line: &'a str, line_no: Option<usize> },
    Structured(Record),
}

impl<'a> From<&'a str> for RecordInput<'a> {
    fn from(line: &'a str) -> Self {
        RecordInput::Text { line, line_no: None }
    }
}

impl From<Record> for RecordInput<'_> {
    fn from(record: Record) -> Self {
        RecordInput::Structured(record)
    }
}

pub(crate) fn identity_key(chrom: &str, pos: u64, reference: &str, alt: &[String]) -> String {
    let sep = IDENTITY_KEY_SEPARATOR;
    format!("{}{}{}{}{}{}{}", chrom, sep, pos, sep, reference, sep, alt.join(","))
}

pub(crate) fn parse_pos(value: &str) -> Result<u64, RecordValidationError> {
    value
        .parse()
        .map_err(|_| RecordValidationError::new(RecordField::Pos, value, "must be a non-negative integer"))
}

pub(crate) fn parse_info(value: &str) -> Result<IndexMap<String, Vec<String>>, RecordValidationError> {
    let mut info = IndexMap::new();
    for (key, values) in parser::info_pairs(value) {
        if info.contains_key(&key) {
            return Err(RecordValidationError::new(RecordField::Info, key, "key given more than once"));
        }
        info.insert(key, values);
    }
    Ok(info)
}

pub(crate) fn parse_format(value: &str) -> Vec<String> {
    split_list(value, ':')
}

/// Split sample columns against the FORMAT keys. Names come from the header's column line.
pub(crate) fn parse_samples(
    format: &[String],
    columns: &[&str],
    names: &[String],
) -> Result<Vec<SampleEntry>, RecordValidationError> {
    columns
        .iter()
        .enumerate()
        .map(|(order, column)| {
            let fields: Vec<&str> = column.split(':').collect();
            if fields.len() > format.len() {
                return Err(RecordValidationError::new(
                    RecordField::Sample,
                    *column,
                    format!("{} fields for {} FORMAT keys", fields.len(), format.len()),
                ));
            }
            let name = names.get(order).cloned().unwrap_or_default();
            Ok(SampleEntry {
                name,
                order,
                attrs: format
                    .iter()
                    .zip(fields)
                    .map(|(key, field)| (key.clone(), split_list(field, ',')))
                    .collect(),
            })
        })
        .collect()
}

impl Record {
    /// A record with the given position and alleles; ID, QUAL, FILTER and INFO are missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_vcf::Record;
    ///
    /// let record = Record::new("20", 14370, "G", vec!["A"])
    ///     .with_id(vec!["rs6054257"])
    ///     .with_info("DB", Vec::<String>::new());
    /// assert_eq!(record.alt(), &["A"]);
    /// assert_eq!(record.qual(), ".");
    /// ```
    pub fn new<S: Into<String>>(chrom: impl Into<String>, pos: u64, reference: impl Into<String>, alt: Vec<S>) -> Self {
        let chrom = chrom.into();
        let reference = reference.into();
        let alt: Vec<String> = alt.into_iter().map(Into::into).collect();
        let identity_key = identity_key(&chrom, pos, &reference, &alt);
        Self {
            chrom,
            pos,
            id: vec![MISSING.to_owned()],
            reference,
            alt,
            qual: MISSING.to_owned(),
            filter: vec![MISSING.to_owned()],
            info: IndexMap::new(),
            format: Vec::new(),
            sample: Vec::new(),
            identity_key,
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: Vec<S>) -> Self {
        self.id = id.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_qual(mut self, qual: impl Into<String>) -> Self {
        self.qual = qual.into();
        self
    }

    pub fn with_filter<S: Into<String>>(mut self, filter: Vec<S>) -> Self {
        self.filter = filter.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_info<S: Into<String>>(mut self, key: impl Into<String>, values: Vec<S>) -> Self {
        self.info
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_format<S: Into<String>>(mut self, format: Vec<S>) -> Self {
        self.format = format.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sample(mut self, sample: SampleEntry) -> Self {
        self.sample.push(sample);
        self
    }

    /// Split a data line into a record without checking it against any header.
    /// `sample_names` names the sample columns in order.
    ///
    /// Only structure is enforced here: at least eight columns, an integer POS, unique
    /// INFO keys and no sample with more fields than FORMAT has keys.
    pub fn parse(line: &str, line_no: Option<usize>, sample_names: &[String]) -> Result<Record> {
        let columns = parser::record_columns(line, line_no)?;
        let at = |e: RecordValidationError| e.at(line_no);
        let chrom = columns[0].to_owned();
        let pos = parse_pos(columns[1]).map_err(at)?;
        let reference = columns[3].to_owned();
        let alt = split_list(columns[4], ',');
        let info = parse_info(columns[7]).map_err(at)?;
        let format = columns.get(8).map(|f| parse_format(f)).unwrap_or_default();
        let sample = parse_samples(&format, columns.get(9..).unwrap_or(&[]), sample_names).map_err(at)?;
        Ok(Record {
            identity_key: identity_key(&chrom, pos, &reference, &alt),
            chrom,
            pos,
            id: split_list(columns[2], ';'),
            reference,
            alt,
            qual: columns[5].to_owned(),
            filter: split_list(columns[6], ';'),
            info,
            format,
            sample,
        })
    }

    /// Alternate alleles, not counting the missing marker.
    pub fn alt_allele_count(&self) -> usize {
        alt_allele_count(&self.alt)
    }

    pub fn sample_by_name(&self, name: &str) -> Option<&SampleEntry> {
        self.sample.iter().find(|s| s.name == name)
    }

    /// Order INFO keys, FORMAT keys and sample fields like `layout`'s, keys it lacks
    /// last. GT stays first.
    pub(crate) fn follow_layout(&mut self, layout: &Record) {
        let info_keys: Vec<String> = self.info.keys().cloned().collect();
        let layout_info: Vec<String> = layout.info.keys().cloned().collect();
        let mut info = IndexMap::with_capacity(self.info.len());
        for key in ordered_like(&info_keys, &layout_info) {
            if let Some(values) = self.info.shift_remove(&key) {
                info.insert(key, values);
            }
        }
        self.info = info;

        let mut format = ordered_like(&self.format, &layout.format);
        if let Some(gt) = format.iter().position(|k| k == "GT") {
            let gt = format.remove(gt);
            format.insert(0, gt);
        }
        for sample in self.sample.iter_mut() {
            let mut attrs = IndexMap::with_capacity(format.len());
            for key in &format {
                if let Some(values) = sample.attrs.shift_remove(key) {
                    attrs.insert(key.clone(), values);
                }
            }
            sample.attrs = attrs;
        }
        self.format = format;
    }
}

/// `keys` in the order of `layout`, keys missing from `layout` after them in their own order.
fn ordered_like(keys: &[String], layout: &[String]) -> Vec<String> {
    let known = layout.iter().filter(|k| keys.contains(k));
    let extra = keys.iter().filter(|k| !layout.contains(k));
    known.chain(extra).cloned().collect()
}

pub(crate) fn alt_allele_count(alt: &[String]) -> usize {
    alt.iter().filter(|a| *a != MISSING).count()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::VcfError;

    fn names() -> Vec<String> {
        vec!["NA00001".into(), "NA00002".into()]
    }

    #[test]
    fn test_parse_line() {
        let line = "20\t14370\trs6054257\tG\tA\t29\tPASS\tNS=3;DP=14;AF=0.5;DB;H2\tGT:GQ:DP:HQ\t0|0:48:1:51,51\t1|0:48:8";
        let record = Record::parse(line, Some(10), &names()).unwrap();
        assert_eq!(record.chrom(), "20");
        assert_eq!(record.pos(), 14370);
        assert_eq!(record.id(), &["rs6054257"]);
        assert_eq!(record.info()["AF"], ["0.5"]);
        assert!(record.info()["DB"].is_empty());
        assert_eq!(record.format(), &["GT", "GQ", "DP", "HQ"]);
        assert_eq!(record.sample()[0].get("HQ"), Some(&["51".to_owned(), "51".to_owned()][..]));
        // trailing fields may be dropped; validation pads them
        assert_eq!(record.sample()[1].attrs().len(), 3);
        assert_eq!(record.sample()[1].name(), "NA00002");
        assert_eq!(record.identity_key(), "20\t14370\tG\tA");
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            Record::parse("20\t-5\t.\tG\tA\t.\t.\t.", Some(4), &[]),
            Err(VcfError::Record(RecordValidationError { field: RecordField::Pos, line: Some(4), .. }))
        ));
        assert!(matches!(
            Record::parse("20\t1\t.\tG\tA\t.\t.\tDP=1;DP=2", None, &[]),
            Err(VcfError::Record(RecordValidationError { field: RecordField::Info, .. }))
        ));
        assert!(matches!(
            Record::parse("20\t1\t.\tG\tA\t.\t.\t.\tGT\t0/1:5", None, &names()),
            Err(VcfError::Record(RecordValidationError { field: RecordField::Sample, .. }))
        ));
        assert!(matches!(Record::parse("20\t1", None, &[]), Err(VcfError::Parse(_))));
    }

    #[test]
    fn test_pos_zero_is_accepted() {
        assert_eq!(parse_pos("0").unwrap(), 0);
        assert!(parse_pos("1.5").is_err());
        assert!(parse_pos("-1").is_err());
    }
}
