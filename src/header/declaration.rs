use std::str::FromStr;

use getset::{CopyGetters, Getters};
use indexmap::IndexMap;

use super::Declaration;
use crate::grammar::Grammar;
use crate::types::{FieldType, Number};

fn extra(declaration: &Declaration, known: &[&str]) -> IndexMap<String, String> {
    declaration
        .attributes()
        .iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// An INFO or FORMAT declaration.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct FieldDeclaration {
    #[getset(get = "pub")]
    id: String,
    #[getset(get_copy = "pub")]
    number: Number,
    #[getset(get_copy = "pub")]
    kind: FieldType,
    #[getset(get = "pub")]
    description: String,
    /// Source, Version and any other attributes, as written
    #[getset(get = "pub")]
    extra: IndexMap<String, String>,
}

impl FieldDeclaration {
    const KNOWN: [&'static str; 4] = ["ID", "Number", "Type", "Description"];

    /// Build the typed view; `None` if ID, Number or Type are missing or unparseable.
    pub fn from_declaration(declaration: &Declaration, grammar: &Grammar) -> Option<Self> {
        Some(FieldDeclaration {
            id: declaration.id()?.to_owned(),
            number: grammar.number(declaration.get("Number")?)?,
            kind: FieldType::from_str(declaration.get("Type")?).ok()?,
            description: declaration
                .get("Description")
                .unwrap_or_default()
                .to_owned(),
            extra: extra(declaration, &Self::KNOWN),
        })
    }
}

/// A FILTER, ALT, SAMPLE or META declaration.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct SimpleDeclaration {
    id: String,
    description: Option<String>,
    extra: IndexMap<String, String>,
}

impl SimpleDeclaration {
    pub fn from_declaration(declaration: &Declaration) -> Option<Self> {
        Some(SimpleDeclaration {
            id: declaration.id()?.to_owned(),
            description: declaration.get("Description").map(str::to_owned),
            extra: extra(declaration, &["ID", "Description"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ContigDeclaration {
    #[getset(get = "pub")]
    id: String,
    #[getset(get_copy = "pub")]
    length: Option<u64>,
    #[getset(get = "pub")]
    extra: IndexMap<String, String>,
}

impl ContigDeclaration {
    pub fn from_declaration(declaration: &Declaration) -> Option<Self> {
        Some(ContigDeclaration {
            id: declaration.id()?.to_owned(),
            length: declaration.get("length").and_then(|l| l.parse().ok()),
            extra: extra(declaration, &["ID", "length"]),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grammar::grammar;
    use crate::types::VcfVersion;

    #[test]
    fn test_field_declaration() {
        let declaration = Declaration::new(vec![
            ("ID", "AF"),
            ("Number", "A"),
            ("Type", "Float"),
            ("Description", "\"Allele Frequency\""),
            ("Source", "\"gnomAD\""),
        ]);
        let field = FieldDeclaration::from_declaration(&declaration, grammar(VcfVersion::V4_2)).unwrap();
        assert_eq!(field.id(), "AF");
        assert_eq!(field.number(), Number::AlternateAlleles);
        assert_eq!(field.kind(), FieldType::Float);
        assert_eq!(field.description(), "Allele Frequency");
        assert_eq!(field.extra().get("Source").map(String::as_str), Some("\"gnomAD\""));
    }

    #[test]
    fn test_unparseable_number_has_no_typed_view() {
        let declaration = Declaration::new(vec![("ID", "X"), ("Number", "R"), ("Type", "Integer")]);
        assert!(FieldDeclaration::from_declaration(&declaration, grammar(VcfVersion::V4_1)).is_none());
        assert!(FieldDeclaration::from_declaration(&declaration, grammar(VcfVersion::V4_2)).is_some());
    }

    #[test]
    fn test_contig_length() {
        let declaration = Declaration::new(vec![("ID", "chr1"), ("length", "248956422"), ("md5", "abc")]);
        let contig = ContigDeclaration::from_declaration(&declaration).unwrap();
        assert_eq!(contig.length(), Some(248_956_422));
        assert_eq!(contig.extra().len(), 1);
        let simple = SimpleDeclaration::from_declaration(&declaration).unwrap();
        assert_eq!(simple.description(), &None);
    }
}
