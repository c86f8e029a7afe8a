//! The column-by-column record check. Text lines and in-memory records go through the
//! same per-column functions, so both shapes normalize to the same [`Record`].

use std::collections::HashSet;

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, trace};

use super::{
    alt_allele_count, identity_key, parse_format, parse_info, parse_pos, parse_samples, Record,
    RecordInput, SampleEntry,
};
use crate::checks::{check_cardinality, check_type, expected_count, is_missing};
use crate::error::{RecordValidationError, Result};
use crate::grammar::is_genotype;
use crate::header::{FieldDeclaration, Registry};
use crate::parser::{self, split_list};
use crate::types::{FieldType, Number, RecordField, ValidationLevel, MISSING, PASS};

type Check<T = ()> = std::result::Result<T, RecordValidationError>;

fn invalid(field: RecordField, value: impl Into<String>, reason: impl Into<String>) -> RecordValidationError {
    RecordValidationError::new(field, value, reason)
}

fn missing_if_empty(values: &mut Vec<String>) {
    if values.is_empty() {
        values.push(MISSING.to_owned());
    }
}

/// Validates records against a [`Registry`] at one [`ValidationLevel`].
///
/// Columns are checked left to right and the first violation is returned.
#[derive(Debug, Clone, Copy)]
pub struct RecordValidator<'a> {
    registry: &'a Registry,
    level: ValidationLevel,
}

impl<'a> RecordValidator<'a> {
    pub fn new(registry: &'a Registry, level: ValidationLevel) -> Self {
        Self { registry, level }
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    /// Validate either input shape, returning the normalized record.
    pub fn check(&self, input: RecordInput<'_>) -> Result<Record> {
        match input {
            RecordInput::Text { line, line_no } => self.parse_and_validate(line, line_no),
            RecordInput::Structured(mut record) => {
                self.validate(&mut record)?;
                Ok(record)
            }
        }
    }

    /// Check an already parsed or hand-built record and normalize it in place:
    /// empty lists become `["."]`, samples are sorted by column and their fields
    /// padded and ordered to match FORMAT, and the identity key is recomputed.
    pub fn validate(&self, record: &mut Record) -> Check {
        missing_if_empty(&mut record.id);
        missing_if_empty(&mut record.alt);
        missing_if_empty(&mut record.filter);
        if record.qual.is_empty() {
            record.qual = MISSING.to_owned();
        }
        self.check_chrom(&record.chrom)?;
        self.check_pos(&record.chrom, record.pos)?;
        self.check_id(&record.id)?;
        self.check_ref(&record.reference)?;
        self.check_alt(&record.alt, &record.reference)?;
        self.check_qual(&record.qual)?;
        self.check_filter(&record.filter)?;
        let alt_count = alt_allele_count(&record.alt);
        self.check_info(&record.info, alt_count)?;
        self.check_format(&record.format)?;
        self.check_samples(&mut record.sample, &record.format, alt_count)?;
        record.identity_key = identity_key(&record.chrom, record.pos, &record.reference, &record.alt);
        trace!("validated {}", record.identity_key.replace('\t', ":"));
        Ok(())
    }

    /// Split and check a data line in one pass. Accepts and rejects exactly the lines
    /// that [`Record::parse`] followed by [`RecordValidator::validate`] does, and yields
    /// the same record; a line with several defects may report a different one first.
    pub fn parse_and_validate(&self, line: &str, line_no: Option<usize>) -> Result<Record> {
        let columns = parser::record_columns(line, line_no)?;
        let at = |e: RecordValidationError| e.at(line_no);

        let chrom = columns[0];
        self.check_chrom(chrom).map_err(at)?;
        let pos = parse_pos(columns[1]).map_err(at)?;
        self.check_pos(chrom, pos).map_err(at)?;
        let id = split_list(columns[2], ';');
        self.check_id(&id).map_err(at)?;
        let reference = columns[3];
        self.check_ref(reference).map_err(at)?;
        let alt = split_list(columns[4], ',');
        self.check_alt(&alt, reference).map_err(at)?;
        let qual = columns[5];
        self.check_qual(qual).map_err(at)?;
        let filter = split_list(columns[6], ';');
        self.check_filter(&filter).map_err(at)?;
        let alt_count = alt_allele_count(&alt);
        let info = parse_info(columns[7]).map_err(at)?;
        self.check_info(&info, alt_count).map_err(at)?;
        let format = columns.get(8).map(|f| parse_format(f)).unwrap_or_default();
        self.check_format(&format).map_err(at)?;
        let mut sample = parse_samples(
            &format,
            columns.get(9..).unwrap_or(&[]),
            self.registry.sample_names(),
        )
        .map_err(at)?;
        self.check_samples(&mut sample, &format, alt_count).map_err(at)?;

        let record = Record {
            identity_key: identity_key(chrom, pos, reference, &alt),
            chrom: chrom.to_owned(),
            pos,
            id,
            reference: reference.to_owned(),
            alt,
            qual: qual.to_owned(),
            filter,
            info,
            format,
            sample,
        };
        trace!("validated line {:?}", line_no);
        Ok(record)
    }

    pub(super) fn check_chrom(&self, chrom: &str) -> Check {
        if chrom.is_empty() {
            return Err(invalid(RecordField::Chrom, chrom, "must not be empty"));
        }
        if self.level >= ValidationLevel::Relaxed && chrom.contains(|c: char| c == ':' || c.is_whitespace()) {
            return Err(invalid(RecordField::Chrom, chrom, "must not contain ':' or whitespace"));
        }
        if self.level == ValidationLevel::Strict
            && self.registry.has_contigs()
            && !self.registry.contig().contains_key(chrom)
        {
            return Err(invalid(RecordField::Chrom, chrom, "not declared as a contig"));
        }
        Ok(())
    }

    pub(super) fn check_pos(&self, chrom: &str, pos: u64) -> Check {
        if self.level == ValidationLevel::Strict {
            if let Some(Some(length)) = self.registry.contig().get(chrom) {
                if pos > length.saturating_add(1) {
                    return Err(invalid(
                        RecordField::Pos,
                        pos.to_string(),
                        format!("beyond the end of contig {} (length {})", chrom, length),
                    ));
                }
            }
        }
        Ok(())
    }

    pub(super) fn check_id(&self, id: &[String]) -> Check {
        if id.len() == 1 && id[0] == MISSING {
            return Ok(());
        }
        for token in id {
            if token.is_empty() || token == MISSING {
                return Err(invalid(RecordField::Id, id.join(";"), "empty or missing identifier in a list"));
            }
            if self.level == ValidationLevel::Strict
                && !token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
            {
                return Err(invalid(RecordField::Id, token.as_str(), "must match [A-Za-z0-9_.-]*"));
            }
        }
        Ok(())
    }

    pub(super) fn check_ref(&self, reference: &str) -> Check {
        if !self.registry.grammar().is_reference(reference) {
            return Err(invalid(
                RecordField::Ref,
                reference,
                format!("not a valid reference allele for {}", self.registry.version()),
            ));
        }
        Ok(())
    }

    fn is_declared_symbolic(&self, allele: &str) -> bool {
        allele.len() > 2
            && allele.starts_with('<')
            && allele.ends_with('>')
            && self.registry.alt().contains(&allele[1..allele.len() - 1])
    }

    pub(super) fn check_alt(&self, alt: &[String], reference: &str) -> Check {
        if alt.len() == 1 && alt[0] == MISSING {
            return Ok(());
        }
        let grammar = self.registry.grammar();
        for allele in alt {
            if allele == MISSING {
                return Err(invalid(RecordField::Alt, alt.join(","), "'.' must be the only allele"));
            }
            if !self.is_declared_symbolic(allele) && !grammar.is_alt_allele(allele) {
                return Err(invalid(
                    RecordField::Alt,
                    allele.as_str(),
                    format!("neither a declared ALT ID nor a valid {} allele", grammar.version),
                ));
            }
            if allele.eq_ignore_ascii_case(reference) {
                return Err(invalid(RecordField::Alt, allele.as_str(), "allele equals REF"));
            }
        }
        Ok(())
    }

    pub(super) fn check_qual(&self, qual: &str) -> Check {
        if qual != MISSING && !crate::grammar::is_float(qual) {
            return Err(invalid(RecordField::Qual, qual, "must be a number or '.'"));
        }
        Ok(())
    }

    pub(super) fn check_filter(&self, filter: &[String]) -> Check {
        if filter.len() == 1 && (filter[0] == MISSING || filter[0] == PASS) {
            return Ok(());
        }
        for token in filter {
            if token.is_empty() || token == MISSING || token == PASS {
                return Err(invalid(
                    RecordField::Filter,
                    filter.join(";"),
                    "PASS and '.' must stand alone, empty filters are not allowed",
                ));
            }
            if self.level >= ValidationLevel::Relaxed && !self.registry.filter().contains(token) {
                return Err(invalid(RecordField::Filter, token.as_str(), "not declared in the header"));
            }
        }
        Ok(())
    }

    /// Type and cardinality of one INFO or sample field.
    fn check_values(
        &self,
        field: RecordField,
        key: &str,
        values: &[String],
        declaration: &FieldDeclaration,
        alt_count: usize,
    ) -> Check {
        let shown = || format!("{}={}", key, values.join(","));
        if declaration.kind() == FieldType::Flag {
            return if values.is_empty() {
                Ok(())
            } else {
                Err(invalid(field, shown(), format!("{} is a flag and takes no value", key)))
            };
        }
        if values.is_empty() {
            return Err(invalid(field, key, format!("{} requires a value", key)));
        }
        if is_missing(values) {
            return Ok(());
        }
        if let Some(bad) = values.iter().find(|v| !check_type(v, declaration.kind())) {
            return Err(invalid(
                field,
                shown(),
                format!("{:?} is not a valid {}", bad, declaration.kind()),
            ));
        }
        if declaration.number() == Number::Genotypes {
            debug!("{}: Number=G cardinality is not checked", key);
            return Ok(());
        }
        if check_cardinality(values, declaration.number(), alt_count) {
            return Ok(());
        }
        let expected = expected_count(declaration.number(), alt_count).unwrap_or_default();
        Err(invalid(
            field,
            shown(),
            format!("{} expects {} values, found {}", key, expected, values.len()),
        ))
    }

    pub(super) fn check_info(&self, info: &IndexMap<String, Vec<String>>, alt_count: usize) -> Check {
        let grammar = self.registry.grammar();
        for (key, values) in info {
            let declaration = self
                .registry
                .info()
                .get(key)
                .ok_or_else(|| invalid(RecordField::Info, key.as_str(), "not declared in the header"))?;
            if self.level >= ValidationLevel::Relaxed && !grammar.is_info_id(key) {
                return Err(invalid(
                    RecordField::Info,
                    key.as_str(),
                    format!("not a valid INFO key for {}", grammar.version),
                ));
            }
            self.check_values(RecordField::Info, key, values, declaration, alt_count)?;
        }
        Ok(())
    }

    pub(super) fn check_format(&self, format: &[String]) -> Check {
        if let Some(duplicate) = format.iter().duplicates().next() {
            return Err(invalid(RecordField::Format, duplicate.as_str(), "key given more than once"));
        }
        if let Some(empty) = format.iter().find(|k| k.is_empty()) {
            return Err(invalid(RecordField::Format, empty.as_str(), "empty key"));
        }
        if self.level >= ValidationLevel::Relaxed {
            // a declared GT leads every non-empty FORMAT
            if !format.is_empty()
                && self.registry.format().contains_key("GT")
                && format[0] != "GT"
            {
                return Err(invalid(RecordField::Format, format.join(":"), "GT must be the first key"));
            }
            if let Some(undeclared) = format.iter().find(|k| !self.registry.format().contains_key(*k)) {
                return Err(invalid(RecordField::Format, undeclared.as_str(), "not declared in the header"));
            }
        }
        Ok(())
    }

    pub(super) fn check_samples(&self, samples: &mut Vec<SampleEntry>, format: &[String], alt_count: usize) -> Check {
        let names = self.registry.sample_names();
        if format.is_empty() {
            if !samples.is_empty() {
                return Err(invalid(RecordField::Sample, samples.len().to_string(), "sample columns without FORMAT"));
            }
            if !names.is_empty() && self.level >= ValidationLevel::Relaxed {
                return Err(invalid(RecordField::Format, MISSING, "header declares samples but FORMAT is absent"));
            }
            return Ok(());
        }
        if samples.len() != names.len() {
            return Err(invalid(
                RecordField::Sample,
                samples.len().to_string(),
                format!("{} sample columns declared in the header", names.len()),
            ));
        }

        samples.sort_by_key(|s| s.order);
        for (order, (sample, expected)) in samples.iter_mut().zip(names).enumerate() {
            if sample.name.is_empty() {
                sample.name = expected.clone();
            } else if &sample.name != expected {
                return Err(invalid(
                    RecordField::Sample,
                    sample.name.as_str(),
                    format!("column {} belongs to sample {}", order + 1, expected),
                ));
            }
            sample.order = order;

            let mut attrs = std::mem::take(&mut sample.attrs);
            let mut ordered = IndexMap::with_capacity(format.len());
            for key in format {
                let values = attrs
                    .shift_remove(key)
                    .unwrap_or_else(|| vec![MISSING.to_owned()]);
                ordered.insert(key.clone(), values);
            }
            if let Some(stray) = attrs.keys().next() {
                return Err(invalid(
                    RecordField::Sample,
                    stray.as_str(),
                    format!("sample {} has a field missing from FORMAT", sample.name),
                ));
            }
            sample.attrs = ordered;

            for (key, values) in &sample.attrs {
                if key == "GT" {
                    let gt = values.join(",");
                    if !is_genotype(&gt) {
                        return Err(invalid(
                            RecordField::Sample,
                            gt,
                            format!("not a valid genotype for sample {}", sample.name),
                        ));
                    }
                }
                if let Some(declaration) = self.registry.format().get(key) {
                    self.check_values(RecordField::Sample, key, values, declaration, alt_count)?;
                }
            }
        }
        Ok(())
    }
}

/// Record IDs seen so far in a bulk pass; rejects a non-missing ID used twice.
#[derive(Debug, Clone, Default)]
pub struct UniqueIds {
    seen: HashSet<String>,
}

impl UniqueIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// The IDs of `records`, failing on the first one used twice.
    pub fn from_records<'r, I>(records: I) -> Check<Self>
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut unique = Self::new();
        for record in records {
            unique.check(record)?;
        }
        Ok(unique)
    }

    /// Check `record`'s IDs and remember them. Nothing is remembered on failure.
    pub fn check(&mut self, record: &Record) -> Check {
        let mut fresh = HashSet::new();
        for id in record.id.iter().filter(|id| *id != MISSING) {
            if self.seen.contains(id) {
                return Err(invalid(RecordField::Id, id.as_str(), "already used by another record"));
            }
            if !fresh.insert(id.as_str()) {
                return Err(invalid(RecordField::Id, record.id.join(";"), "identifier repeated within the record"));
            }
        }
        self.seen.extend(fresh.into_iter().map(str::to_owned));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
