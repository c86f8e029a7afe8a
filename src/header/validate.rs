use std::collections::HashSet;
use std::str::FromStr;

use strum::IntoEnumIterator;

use super::{is_quoted, Declaration, Header};
use crate::error::HeaderValidationError;
use crate::grammar::{grammar_for, Grammar};
use crate::types::{
    FieldType, MetaKey, Number, ValidationLevel, VcfVersion, FORMAT_COLUMN, MANDATORY_COLUMNS,
};

/// Declaration kinds every header must contain at least once.
const REQUIRED_KINDS: [MetaKey; 3] = [MetaKey::Info, MetaKey::Format, MetaKey::Filter];

impl Header {
    /// Validate the whole header at `level`.
    ///
    /// Requires `fileformat`, at least one INFO, FORMAT and FILTER declaration and the eight
    /// mandatory columns; at `strict`, meta keys outside the version's vocabulary are rejected.
    /// Each declaration is then checked by [`validate_declaration`].
    pub fn validate(&self, level: ValidationLevel) -> Result<(), HeaderValidationError> {
        validate_structure(self, level)?;
        let grammar = grammar_for(self.fileformat());
        for (kind, declarations) in self.declaration_groups() {
            for declaration in declarations {
                validate_declaration(kind, declaration, grammar, level)?;
            }
        }
        Ok(())
    }
}

/// Checks that span the header as a whole rather than one declaration.
pub(crate) fn validate_structure(header: &Header, level: ValidationLevel) -> Result<(), HeaderValidationError> {
    let fileformat = header.fileformat().ok_or_else(|| {
        HeaderValidationError::new(MetaKey::FileFormat.as_ref(), "", "missing required meta line")
    })?;
    if level >= ValidationLevel::Relaxed && VcfVersion::from_str(fileformat).is_err() {
        return Err(HeaderValidationError::new(
            MetaKey::FileFormat.as_ref(),
            fileformat,
            "unsupported VCF version",
        ));
    }
    for kind in REQUIRED_KINDS.iter() {
        if header.declarations(*kind).is_empty() {
            return Err(HeaderValidationError::new(
                kind.as_ref(),
                "",
                "at least one declaration is required",
            ));
        }
    }
    validate_columns(header.columns())?;

    if level >= ValidationLevel::Relaxed {
        if let Some(key) = header
            .unknown_keys()
            .find(|key| MetaKey::from_str(key).map_or(false, MetaKey::is_declaration))
        {
            return Err(HeaderValidationError::new(
                key,
                "",
                "declarations must be written as <ID=...>",
            ));
        }
    }

    if level == ValidationLevel::Strict {
        if header.has_late_fileformat() {
            return Err(HeaderValidationError::new(
                MetaKey::FileFormat.as_ref(),
                fileformat,
                "must be the first header line",
            ));
        }
        let version = header.version();
        if let Some(key) = header.unknown_keys().next() {
            return Err(HeaderValidationError::new(
                key,
                "",
                format!("not a meta key of {}", version),
            ));
        }
        for kind in MetaKey::iter().filter(|k| k.is_declaration()) {
            let declarations = header.declarations(kind);
            if !declarations.is_empty() && !kind.is_known_in(version) {
                return Err(HeaderValidationError::new(
                    kind.as_ref(),
                    "",
                    format!("not a meta key of {}", version),
                ));
            }
            let mut seen = HashSet::new();
            for id in declarations.iter().filter_map(Declaration::id) {
                if !seen.insert(id) {
                    return Err(HeaderValidationError::new(kind.as_ref(), id, "duplicate ID"));
                }
            }
        }
        let mut seen = HashSet::new();
        for name in header.sample_names() {
            if !seen.insert(name) {
                return Err(HeaderValidationError::new("#CHROM", name.as_str(), "duplicate sample name"));
            }
        }
    }
    Ok(())
}

fn validate_columns(columns: &[String]) -> Result<(), HeaderValidationError> {
    if columns.len() < MANDATORY_COLUMNS.len() {
        return Err(HeaderValidationError::new(
            "#CHROM",
            columns.join("\t"),
            format!("expected the {} mandatory columns", MANDATORY_COLUMNS.len()),
        ));
    }
    for (found, expected) in columns.iter().zip(MANDATORY_COLUMNS.iter()) {
        if found != expected {
            return Err(HeaderValidationError::new(
                "#CHROM",
                found.as_str(),
                format!("expected column {}", expected),
            ));
        }
    }
    match columns.get(MANDATORY_COLUMNS.len()) {
        Some(column) if column != FORMAT_COLUMN => Err(HeaderValidationError::new(
            "#CHROM",
            column.as_str(),
            "sample columns must follow a FORMAT column",
        )),
        _ => Ok(()),
    }
}

/// Validate one declaration of `kind` against the version grammar.
///
/// All levels: required keys present, no empty values; INFO/FORMAT `Type` from the allowed
/// set, `Number` from the version's cardinality grammar, `Type=Flag` only with `Number=0`.
/// `relaxed`: the declaration was terminated by `>`, VCFv4.3 INFO ID naming,
/// contig `length` is an integer. `strict`: no duplicate keys, `Description` is quoted.
pub(crate) fn validate_declaration(
    kind: MetaKey,
    declaration: &Declaration,
    grammar: &Grammar,
    level: ValidationLevel,
) -> Result<(), HeaderValidationError> {
    let id = declaration.id().unwrap_or_default();
    let error = |value: &str, reason: String| HeaderValidationError::new(kind.as_ref(), value, reason);

    if level >= ValidationLevel::Relaxed && !declaration.is_terminated() {
        return Err(error(id, "declaration is missing its closing '>'".into()));
    }
    for key in kind.required_keys() {
        if declaration.raw(key).is_none() {
            return Err(error(id, format!("missing required key {}", key)));
        }
    }
    for (key, value) in declaration.attributes() {
        if value.is_empty() || value == "\"\"" {
            return Err(error(id, format!("key {} has an empty value", key)));
        }
    }
    if level == ValidationLevel::Strict {
        let mut seen = HashSet::new();
        for (key, _) in declaration.attributes() {
            if !seen.insert(key.as_str()) {
                return Err(error(id, format!("duplicate key {}", key)));
            }
        }
        if let Some(description) = declaration.raw("Description") {
            if !is_quoted(description) {
                return Err(error(description, "Description must be a double-quoted string".into()));
            }
        }
    }

    match kind {
        MetaKey::Info | MetaKey::Format => {
            let raw_type = declaration.get("Type").unwrap_or_default();
            let field_type = FieldType::from_str(raw_type)
                .ok()
                .filter(|t| t.allowed_for(kind))
                .ok_or_else(|| error(raw_type, format!("Type of {} is not allowed for {}", id, kind)))?;
            let raw_number = declaration.get("Number").unwrap_or_default();
            let number = grammar.number(raw_number).ok_or_else(|| {
                error(
                    raw_number,
                    format!("Number of {} is not a valid cardinality for {}", id, grammar.version),
                )
            })?;
            if kind == MetaKey::Info && field_type == FieldType::Flag && number != Number::Count(0) {
                return Err(error(raw_number, format!("flag {} must have Number=0", id)));
            }
            if kind == MetaKey::Info && level >= ValidationLevel::Relaxed && !grammar.is_info_id(id) {
                return Err(error(id, format!("not a valid INFO ID for {}", grammar.version)));
            }
        }
        MetaKey::Contig if level >= ValidationLevel::Relaxed => {
            if let Some(length) = declaration.get("length") {
                if length.parse::<u64>().is_err() {
                    return Err(error(length, format!("length of contig {} is not an integer", id)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grammar::grammar;
    use crate::header::test::HEADER;

    fn info(attributes: Vec<(&str, &str)>) -> Declaration {
        Declaration::new(attributes)
    }

    fn check(declaration: &Declaration, version: VcfVersion, level: ValidationLevel) -> bool {
        validate_declaration(MetaKey::Info, declaration, grammar(version), level).is_ok()
    }

    #[test]
    fn test_header_validates_at_every_level_but_strict() {
        let header = Header::parse(HEADER).unwrap();
        header.validate(ValidationLevel::Basic).unwrap();
        header.validate(ValidationLevel::Relaxed).unwrap();
        // ##GATKCommandLine is not part of the VCFv4.2 vocabulary
        let err = header.validate(ValidationLevel::Strict).unwrap_err();
        assert_eq!(err.field, "GATKCommandLine");
    }

    #[test]
    fn test_required_structure() {
        let text = HEADER.replace("##fileformat=VCFv4.2\n", "");
        let err = Header::parse(&text).unwrap().validate(ValidationLevel::Basic).unwrap_err();
        assert_eq!(err.field, "fileformat");

        let text: String = HEADER
            .lines()
            .filter(|l| !l.starts_with("##FILTER"))
            .map(|l| format!("{}\n", l))
            .collect();
        let err = Header::parse(&text).unwrap().validate(ValidationLevel::Basic).unwrap_err();
        assert_eq!(err.field, "FILTER");

        let text = HEADER.replace("\tQUAL\t", "\tQUALITY\t");
        let err = Header::parse(&text).unwrap().validate(ValidationLevel::Basic).unwrap_err();
        assert_eq!(err.value, "QUALITY");
    }

    #[test]
    fn test_single_pass_reports_line_numbers() {
        let text = HEADER.replace("Number=A,Type=Float", "Number=A,Type=Double");
        assert!(Header::parse(&text).is_ok());
        match Header::parse_and_validate(&text, ValidationLevel::Basic) {
            Err(crate::error::VcfError::Header(err)) => {
                assert_eq!(err.line, Some(6));
                assert_eq!(err.value, "Double");
            }
            other => panic!("unexpected {:?}", other),
        }
        let err = Header::parse(&text).unwrap().validate(ValidationLevel::Basic).unwrap_err();
        assert_eq!(err.line, None);
        assert_eq!(err.value, "Double");
    }

    #[test]
    fn test_declarations_before_fileformat_use_its_grammar() {
        // `1kg` is only an invalid INFO ID under the 4.3 grammar
        let text = "##INFO=<ID=1kg,Number=0,Type=Flag,Description=\"In 1000 Genomes\">\n\
##fileformat=VCFv4.2\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
##FILTER=<ID=q10,Description=\"Quality below 10\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        let header = Header::parse(text).unwrap();
        assert!(header.has_late_fileformat());
        assert_eq!(header.version(), VcfVersion::V4_2);
        for level in [ValidationLevel::Basic, ValidationLevel::Relaxed, ValidationLevel::Strict].iter() {
            assert_eq!(
                Header::parse_and_validate(text, *level).is_ok(),
                header.validate(*level).is_ok(),
                "{}",
                level
            );
        }
        header.validate(ValidationLevel::Relaxed).unwrap();
        let err = header.validate(ValidationLevel::Strict).unwrap_err();
        assert_eq!(err.field, "fileformat");
        assert_eq!(err.value, "VCFv4.2");

        let text = text.replace("ID=1kg", "ID=1kg,Type=Integer");
        match Header::parse_and_validate(&text, ValidationLevel::Strict) {
            Err(crate::error::VcfError::Header(err)) => assert_eq!(err.line, Some(1)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_first_fileformat_wins() {
        let text = HEADER.replace("##fileDate", "##fileformat=VCFv4.3\n##fileDate");
        let header = Header::parse(&text).unwrap();
        assert_eq!(header.version(), VcfVersion::V4_2);
        assert!(!header.has_late_fileformat());
    }

    #[test]
    fn test_number_grammar_is_versioned() {
        let declaration = info(vec![
            ("ID", "AD"),
            ("Number", "R"),
            ("Type", "Integer"),
            ("Description", "\"Allelic depths\""),
        ]);
        assert!(!check(&declaration, VcfVersion::V4_1, ValidationLevel::Basic));
        assert!(check(&declaration, VcfVersion::V4_2, ValidationLevel::Strict));
    }

    #[test]
    fn test_flag_requires_number_zero() {
        let declaration = info(vec![("ID", "DB"), ("Number", "1"), ("Type", "Flag"), ("Description", "\"x\"")]);
        assert!(!check(&declaration, VcfVersion::V4_2, ValidationLevel::Basic));
        let declaration = info(vec![("ID", "DB"), ("Number", "0"), ("Type", "Flag"), ("Description", "\"x\"")]);
        assert!(check(&declaration, VcfVersion::V4_2, ValidationLevel::Strict));
        assert!(!validate_declaration(MetaKey::Format, &declaration, grammar(VcfVersion::V4_2), ValidationLevel::Basic).is_ok());
    }

    #[test]
    fn test_strict_only_checks() {
        let unquoted = info(vec![("ID", "DP"), ("Number", "1"), ("Type", "Integer"), ("Description", "Depth")]);
        assert!(check(&unquoted, VcfVersion::V4_2, ValidationLevel::Relaxed));
        assert!(!check(&unquoted, VcfVersion::V4_2, ValidationLevel::Strict));

        let duplicated = info(vec![
            ("ID", "DP"),
            ("Number", "1"),
            ("Type", "Integer"),
            ("Description", "\"Depth\""),
            ("Number", "2"),
        ]);
        assert!(check(&duplicated, VcfVersion::V4_2, ValidationLevel::Relaxed));
        assert!(!check(&duplicated, VcfVersion::V4_2, ValidationLevel::Strict));
    }

    #[test]
    fn test_missing_and_empty_keys() {
        let missing = info(vec![("ID", "DP"), ("Number", "1"), ("Description", "\"Depth\"")]);
        let err = validate_declaration(MetaKey::Info, &missing, grammar(VcfVersion::V4_2), ValidationLevel::Basic)
            .unwrap_err();
        assert!(err.reason.contains("Type"));
        let empty = info(vec![("ID", "DP"), ("Number", ""), ("Type", "Integer"), ("Description", "\"Depth\"")]);
        assert!(!check(&empty, VcfVersion::V4_2, ValidationLevel::Basic));
    }

    #[test]
    fn test_info_id_naming_in_v43() {
        let declaration = info(vec![("ID", "1kg"), ("Number", "0"), ("Type", "Flag"), ("Description", "\"x\"")]);
        assert!(check(&declaration, VcfVersion::V4_3, ValidationLevel::Basic));
        assert!(!check(&declaration, VcfVersion::V4_3, ValidationLevel::Relaxed));
        assert!(check(&declaration, VcfVersion::V4_2, ValidationLevel::Strict));
    }

    #[test]
    fn test_unterminated_declaration_is_tolerated_at_basic_only() {
        let text = HEADER.replace("Description=\"Quality below 10\">", "Description=\"Quality below 10\"");
        let header = Header::parse(&text).unwrap();
        assert!(!header.filter()[0].is_terminated());
        header.validate(ValidationLevel::Basic).unwrap();
        assert!(header.validate(ValidationLevel::Relaxed).is_err());
    }

    #[test]
    fn test_strict_rejects_duplicate_ids_and_samples() {
        let text = HEADER.replace("\tNA00002\n", "\tNA00001\n").replace("##GATKCommandLine=<ID=HaplotypeCaller,Version=4.1>\n", "");
        let header = Header::parse(&text).unwrap();
        header.validate(ValidationLevel::Relaxed).unwrap();
        let err = header.validate(ValidationLevel::Strict).unwrap_err();
        assert_eq!(err.reason, "duplicate sample name");
    }
}
