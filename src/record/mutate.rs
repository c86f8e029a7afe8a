//! Mutations on validated records. Every operation works on a copy, re-checks the
//! affected columns and only then replaces the record.

use indexmap::IndexMap;

use super::{alt_allele_count, identity_key, Record, RecordValidator};
use crate::error::{MutationError, Result};
use crate::header::Registry;
use crate::parser::split_list;
use crate::types::{RecordField, ValidationLevel, MISSING, PASS};

/// A single-attribute overwrite accepted by [`Record::change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPatch {
    /// Replace the values of an INFO key already on the record.
    Info { key: String, values: Vec<String> },
    /// Replace one FORMAT field of one sample.
    Sample {
        name: String,
        key: String,
        values: Vec<String>,
    },
    Qual(String),
    Id(Vec<String>),
    Filter(Vec<String>),
}

fn undeclared(field: RecordField, key: &str) -> MutationError {
    MutationError::Undeclared {
        kind: field.to_string(),
        key: key.to_owned(),
    }
}

fn duplicate(field: RecordField, key: &str) -> MutationError {
    MutationError::DuplicateKey {
        kind: field.to_string(),
        key: key.to_owned(),
    }
}

fn is_sentinel(values: &[String]) -> bool {
    values.len() == 1 && (values[0] == MISSING || values[0] == PASS)
}

/// `DEL` and `<DEL>` both name the declared ALT ID `DEL`.
fn symbolic_id(key: &str) -> &str {
    key.trim_start_matches('<').trim_end_matches('>')
}

impl Record {
    /// Add `key=values` pairs to INFO, or a new FORMAT key to every sample.
    ///
    /// For [`RecordField::Sample`], each key maps to one raw value per sample in column
    /// order (`"0,1"` for a two-valued field). Keys must be declared and absent from the
    /// record; use [`Record::change`] to overwrite.
    pub fn add_key_value_attr(
        &mut self,
        field: RecordField,
        pairs: IndexMap<String, Vec<String>>,
        registry: &Registry,
        level: ValidationLevel,
    ) -> Result<()> {
        let validator = RecordValidator::new(registry, level);
        let mut candidate = self.clone();
        let alt_count = alt_allele_count(&candidate.alt);
        match field {
            RecordField::Info => {
                for (key, values) in pairs {
                    if !registry.info().contains_key(&key) {
                        return Err(undeclared(field, &key).into());
                    }
                    if candidate.info.contains_key(&key) {
                        return Err(duplicate(field, &key).into());
                    }
                    candidate.info.insert(key, values);
                }
                validator.check_info(&candidate.info, alt_count)?;
            }
            RecordField::Sample => {
                for (key, values) in pairs {
                    if !registry.format().contains_key(&key) {
                        return Err(undeclared(field, &key).into());
                    }
                    if candidate.format.contains(&key) {
                        return Err(duplicate(field, &key).into());
                    }
                    if values.len() != candidate.sample.len() {
                        return Err(MutationError::MalformedPatch {
                            target: field.to_string(),
                            reason: format!(
                                "{} values given for {} samples",
                                values.len(),
                                candidate.sample.len()
                            ),
                        }
                        .into());
                    }
                    for (sample, raw) in candidate.sample.iter_mut().zip(values) {
                        sample.attrs.insert(key.clone(), split_list(&raw, ','));
                    }
                    if key == "GT" {
                        candidate.format.insert(0, key);
                    } else {
                        candidate.format.push(key);
                    }
                }
                validator.check_format(&candidate.format)?;
                validator.check_samples(&mut candidate.sample, &candidate.format, alt_count)?;
            }
            other => return Err(MutationError::ImmutableField { field: other }.into()),
        }
        *self = candidate;
        Ok(())
    }

    /// Add keys to ALT, FILTER or FORMAT. A lone `.` (or `PASS` for FILTER) is replaced
    /// rather than appended to. New FORMAT keys are filled with `.` in every sample,
    /// `GT` goes first.
    pub fn add_key_attr<S: AsRef<str>>(
        &mut self,
        field: RecordField,
        keys: &[S],
        registry: &Registry,
        level: ValidationLevel,
    ) -> Result<()> {
        let validator = RecordValidator::new(registry, level);
        let mut candidate = self.clone();
        match field {
            RecordField::Alt => {
                for key in keys {
                    let id = symbolic_id(key.as_ref());
                    if !registry.alt().contains(id) {
                        return Err(undeclared(field, key.as_ref()).into());
                    }
                    let allele = format!("<{}>", id);
                    if candidate.alt.contains(&allele) {
                        return Err(duplicate(field, &allele).into());
                    }
                    if candidate.alt.len() == 1 && candidate.alt[0] == MISSING {
                        candidate.alt.clear();
                    }
                    candidate.alt.push(allele);
                }
                // A and R cardinalities follow the allele count
                let alt_count = alt_allele_count(&candidate.alt);
                validator.check_alt(&candidate.alt, &candidate.reference)?;
                validator.check_info(&candidate.info, alt_count)?;
                validator.check_samples(&mut candidate.sample, &candidate.format, alt_count)?;
                candidate.identity_key = identity_key(
                    &candidate.chrom,
                    candidate.pos,
                    &candidate.reference,
                    &candidate.alt,
                );
            }
            RecordField::Filter => {
                for key in keys {
                    let key = key.as_ref();
                    if !registry.filter().contains(key) {
                        return Err(undeclared(field, key).into());
                    }
                    if candidate.filter.iter().any(|f| f == key) {
                        return Err(duplicate(field, key).into());
                    }
                    if is_sentinel(&candidate.filter) {
                        candidate.filter.clear();
                    }
                    candidate.filter.push(key.to_owned());
                }
                validator.check_filter(&candidate.filter)?;
            }
            RecordField::Format => {
                for key in keys {
                    let key = key.as_ref();
                    if !registry.format().contains_key(key) {
                        return Err(undeclared(field, key).into());
                    }
                    if candidate.format.iter().any(|f| f == key) {
                        return Err(duplicate(field, key).into());
                    }
                    if key == "GT" {
                        candidate.format.insert(0, key.to_owned());
                    } else {
                        candidate.format.push(key.to_owned());
                    }
                }
                let alt_count = alt_allele_count(&candidate.alt);
                validator.check_format(&candidate.format)?;
                validator.check_samples(&mut candidate.sample, &candidate.format, alt_count)?;
            }
            other => return Err(MutationError::ImmutableField { field: other }.into()),
        }
        *self = candidate;
        Ok(())
    }

    /// Overwrite one existing attribute. The whole record is re-validated before the
    /// change is kept; on failure the record is unchanged.
    pub fn change(&mut self, patch: RecordPatch, registry: &Registry, level: ValidationLevel) -> Result<()> {
        let mut candidate = self.clone();
        match patch {
            RecordPatch::Info { key, values } => match candidate.info.get_mut(&key) {
                Some(current) => *current = values,
                None => {
                    return Err(MutationError::Missing {
                        kind: RecordField::Info.to_string(),
                        key,
                    }
                    .into())
                }
            },
            RecordPatch::Sample { name, key, values } => {
                let current = candidate
                    .sample
                    .iter_mut()
                    .find(|s| s.name == name)
                    .and_then(|s| s.attrs.get_mut(&key));
                match current {
                    Some(current) => *current = values,
                    None => {
                        return Err(MutationError::Missing {
                            kind: RecordField::Sample.to_string(),
                            key: format!("{}:{}", name, key),
                        }
                        .into())
                    }
                }
            }
            RecordPatch::Qual(qual) => candidate.qual = qual,
            RecordPatch::Id(id) => candidate.id = id,
            RecordPatch::Filter(filter) => candidate.filter = filter,
        }
        RecordValidator::new(registry, level).validate(&mut candidate)?;
        *self = candidate;
        Ok(())
    }
}
