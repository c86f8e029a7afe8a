//! Type and cardinality checks for INFO and sample values.
//! Pure functions; callers attach field names, values and line numbers to failures.

use crate::grammar::{is_float, is_integer};
use crate::types::{FieldType, Number, MISSING};

/// Whether `value` is a valid scalar of the declared type. `.` is valid for every
/// type that carries values.
pub fn check_type(value: &str, kind: FieldType) -> bool {
    if value == MISSING {
        return kind != FieldType::Flag;
    }
    match kind {
        FieldType::Integer => is_integer(value),
        FieldType::Float => is_float(value),
        FieldType::Character => {
            let mut chars = value.chars();
            matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
        }
        FieldType::String => !value.is_empty() && !value.contains(|c: char| c == '\t' || c == '\n' || c == '\r'),
        FieldType::Flag => false,
    }
}

/// The number of values a declaration's `Number` demands, if it fixes one.
/// `G` is not resolved against the ploidy and, like `.`, fixes nothing.
pub fn expected_count(number: Number, alt_allele_count: usize) -> Option<usize> {
    match number {
        Number::Count(n) => Some(n),
        Number::AlternateAlleles => Some(alt_allele_count),
        Number::Alleles => Some(alt_allele_count + 1),
        Number::Genotypes | Number::Unknown => None,
    }
}

pub fn check_cardinality<S: AsRef<str>>(values: &[S], number: Number, alt_allele_count: usize) -> bool {
    expected_count(number, alt_allele_count).map_or(true, |expected| values.len() == expected)
}

/// A single `.` stands for a missing value of any cardinality.
pub fn is_missing<S: AsRef<str>>(values: &[S]) -> bool {
    values.len() == 1 && values[0].as_ref() == MISSING
}
