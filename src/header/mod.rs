//! The meta-information header: scalar meta fields, typed declaration collections,
//! unrecognised meta lines and the `#CHROM` column line.

mod declaration;
mod registry;
pub(crate) mod validate;

use std::collections::HashMap;
use std::str::FromStr;

use getset::Getters;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, warn};

use crate::error::{MutationError, ParseError, Result};
use crate::grammar::grammar_for;
use crate::parser::{self, MetaLine};
use crate::types::{MetaKey, ValidationLevel, VcfVersion, FORMAT_COLUMN, MANDATORY_COLUMNS};

pub use declaration::{ContigDeclaration, FieldDeclaration, SimpleDeclaration};
pub use registry::Registry;

/// One bracketed declaration (`<ID=DP,Number=1,...>`), attributes in file order.
/// Quoted values are kept with their quotes so they are written back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    attributes: Vec<(String, String)>,
    terminated: bool,
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}

fn unquote(value: &str) -> &str {
    if is_quoted(value) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn quote(value: &str) -> String {
    if is_quoted(value) {
        value.to_owned()
    } else {
        format!("\"{}\"", value.replace('"', "\\\""))
    }
}

impl Declaration {
    pub fn new<K, V, I>(attributes: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            terminated: true,
        }
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// false if the line this was parsed from lacked its closing `>`
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// The value as written, quotes included.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).map(unquote)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let value = if key == "Description" {
            quote(&value)
        } else {
            value
        };
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_owned(), value)),
        }
    }

    /// Mandatory keys first in their canonical order, the rest sorted by key;
    /// `Description` is quoted.
    pub(crate) fn normalized(self, kind: MetaKey) -> Self {
        let required = kind.required_keys();
        let mut attributes = self.attributes;
        attributes.sort_by_key(|(key, _)| {
            match required.iter().position(|r| *r == key.as_str()) {
                Some(position) => (0, position, String::new()),
                None => (1, 0, key.clone()),
            }
        });
        for (key, value) in attributes.iter_mut() {
            if key == "Description" {
                *value = quote(value);
            }
        }
        Self {
            attributes,
            terminated: true,
        }
    }
}

/// Meta lines whose key is not part of any supported vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Text(String),
    Declaration(Declaration),
}

/// Changes accepted by [`Header::change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderPatch {
    /// Replace a scalar meta field such as `source`.
    Value(String),
    /// Overwrite one attribute of the declaration with the given ID.
    Attribute { id: String, key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct Header {
    scalars: HashMap<MetaKey, String>,
    declarations: HashMap<MetaKey, Vec<Declaration>>,
    /// unrecognised meta keys, in file order
    #[getset(get = "pub")]
    other: IndexMap<String, Vec<MetaValue>>,
    /// column names without the leading `#`
    #[getset(get = "pub")]
    columns: Vec<String>,
    /// `##fileformat` was read after another header line
    late_fileformat: bool,
}

impl Header {
    /// An empty header for `version` with the eight mandatory columns.
    pub fn new(version: VcfVersion) -> Self {
        let mut header = Header::default();
        header
            .scalars
            .insert(MetaKey::FileFormat, version.to_string());
        header.columns = MANDATORY_COLUMNS.iter().map(|c| c.to_string()).collect();
        header
    }

    /// Parse header text up to and including the `#CHROM` line, without validating it.
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_vcf::Header;
    ///
    /// let text = "##fileformat=VCFv4.2\n\
    ///             ###source=example\n\
    ///             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
    /// let header = Header::parse(text).unwrap();
    /// assert_eq!(header.fileformat(), Some("VCFv4.2"));
    /// assert_eq!(header.scalar(rust_vcf::MetaKey::Source), Some("example"));
    /// ```
    pub fn parse(text: &str) -> Result<Header> {
        Self::parse_lines(text, None)
    }

    /// Parse and validate in one pass; declaration errors carry their line number.
    pub fn parse_and_validate(text: &str, level: ValidationLevel) -> Result<Header> {
        Self::parse_lines(text, Some(level))
    }

    fn parse_lines(text: &str, level: Option<ValidationLevel>) -> Result<Header> {
        let mut parser = HeaderParser::new(level);
        for (i, line) in text.lines().enumerate() {
            if parser.push(i + 1, line)? {
                break;
            }
        }
        parser.finish()
    }

    pub fn scalar(&self, key: MetaKey) -> Option<&str> {
        self.scalars.get(&key).map(String::as_str)
    }

    pub fn fileformat(&self) -> Option<&str> {
        self.scalar(MetaKey::FileFormat)
    }

    /// The version whose grammar applies; unknown or missing versions map to the newest.
    pub fn version(&self) -> VcfVersion {
        VcfVersion::from_fileformat(self.fileformat())
    }

    /// True when the parsed text did not open with `##fileformat`.
    pub fn has_late_fileformat(&self) -> bool {
        self.late_fileformat
    }

    pub fn declarations(&self, kind: MetaKey) -> &[Declaration] {
        self.declarations
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contig(&self) -> &[Declaration] {
        self.declarations(MetaKey::Contig)
    }

    pub fn info(&self) -> &[Declaration] {
        self.declarations(MetaKey::Info)
    }

    pub fn format(&self) -> &[Declaration] {
        self.declarations(MetaKey::Format)
    }

    pub fn filter(&self) -> &[Declaration] {
        self.declarations(MetaKey::Filter)
    }

    pub fn alt(&self) -> &[Declaration] {
        self.declarations(MetaKey::Alt)
    }

    pub fn sample(&self) -> &[Declaration] {
        self.declarations(MetaKey::Sample)
    }

    pub fn meta(&self) -> &[Declaration] {
        self.declarations(MetaKey::Meta)
    }

    /// Sample names, i.e. the columns after `FORMAT`.
    pub fn sample_names(&self) -> &[String] {
        match self.columns.get(MANDATORY_COLUMNS.len()) {
            Some(format) if format == FORMAT_COLUMN => &self.columns[MANDATORY_COLUMNS.len() + 1..],
            _ => &[],
        }
    }

    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    /// Store a parsed meta line. Returns the kind and index of a stored declaration.
    fn insert(&mut self, line: MetaLine) -> Option<(MetaKey, usize)> {
        match line {
            MetaLine::Scalar { key, value } => {
                match MetaKey::from_str(&key) {
                    Ok(MetaKey::FileFormat) if self.scalars.contains_key(&MetaKey::FileFormat) => {
                        warn!("fileformat given more than once, keeping the first, dropping {:?}", value);
                    }
                    Ok(kind) if !kind.is_declaration() => {
                        if let Some(previous) = self.scalars.insert(kind, value) {
                            debug!("{} given more than once, dropping {:?}", kind, previous);
                        }
                    }
                    _ => self
                        .other
                        .entry(key)
                        .or_insert_with(Vec::new)
                        .push(MetaValue::Text(value)),
                }
                None
            }
            MetaLine::Structured {
                key,
                attributes,
                terminated,
            } => {
                let declaration = Declaration {
                    attributes,
                    terminated,
                };
                if !terminated {
                    warn!("{} declaration {:?} is missing its closing '>'", key, declaration.id().unwrap_or(""));
                }
                match MetaKey::from_str(&key) {
                    Ok(kind) if kind.is_declaration() => {
                        let declarations = self.declarations.entry(kind).or_insert_with(Vec::new);
                        declarations.push(declaration);
                        Some((kind, declarations.len() - 1))
                    }
                    Ok(kind) => {
                        // e.g. ##PEDIGREE=<ID=Child,Father=F,Mother=M>
                        self.scalars.insert(kind, declaration.to_string());
                        None
                    }
                    Err(_) => {
                        self.other
                            .entry(key)
                            .or_insert_with(Vec::new)
                            .push(MetaValue::Declaration(declaration));
                        None
                    }
                }
            }
        }
    }

    /// Add a declaration of `kind`. Fails if a declaration with the same ID exists
    /// or if the normalized declaration does not validate at `level`.
    pub fn add<K, V, I>(&mut self, kind: MetaKey, attributes: I, level: ValidationLevel) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        if !kind.is_declaration() {
            return Err(MutationError::NotADeclaration { kind }.into());
        }
        let declaration = Declaration::new(attributes).normalized(kind);
        if let Some(id) = declaration.id() {
            if self.declarations(kind).iter().any(|d| d.id() == Some(id)) {
                return Err(MutationError::DuplicateKey {
                    kind: kind.to_string(),
                    key: id.to_owned(),
                }
                .into());
            }
        }
        validate::validate_declaration(kind, &declaration, grammar_for(self.fileformat()), level)?;
        self.declarations
            .entry(kind)
            .or_insert_with(Vec::new)
            .push(declaration);
        Ok(())
    }

    /// Change a scalar meta field or one attribute of a declaration.
    /// The whole header is re-validated at `level` before the change is committed;
    /// on failure the header is left as it was.
    pub fn change(&mut self, target: &str, patch: HeaderPatch, level: ValidationLevel) -> Result<()> {
        let kind = MetaKey::from_str(target).map_err(|_| MutationError::UnknownTarget {
            target: target.to_owned(),
        })?;
        let mut candidate = self.clone();
        match (kind.is_declaration(), patch) {
            (false, HeaderPatch::Value(value)) => {
                candidate.scalars.insert(kind, value);
            }
            (true, HeaderPatch::Attribute { id, key, value }) => {
                if key.is_empty() {
                    return Err(MutationError::MalformedPatch {
                        target: target.to_owned(),
                        reason: "attribute key is empty".into(),
                    }
                    .into());
                }
                let declaration = candidate
                    .declarations
                    .get_mut(&kind)
                    .and_then(|ds| ds.iter_mut().find(|d| d.id() == Some(id.as_str())))
                    .ok_or_else(|| MutationError::UnknownId {
                        kind,
                        id: id.clone(),
                    })?;
                declaration.set(&key, value);
                let new_id = declaration.id().map(str::to_owned);
                if let Some(new_id) = new_id {
                    if candidate
                        .declarations(kind)
                        .iter()
                        .filter(|d| d.id() == Some(new_id.as_str()))
                        .count()
                        > 1
                    {
                        return Err(MutationError::DuplicateKey {
                            kind: kind.to_string(),
                            key: new_id,
                        }
                        .into());
                    }
                }
            }
            (false, HeaderPatch::Attribute { .. }) => {
                return Err(MutationError::MalformedPatch {
                    target: target.to_owned(),
                    reason: "scalar meta fields take a plain value".into(),
                }
                .into())
            }
            (true, HeaderPatch::Value(_)) => {
                return Err(MutationError::MalformedPatch {
                    target: target.to_owned(),
                    reason: "declarations take an {id, key, value} patch".into(),
                }
                .into())
            }
        }
        candidate.validate(level)?;
        *self = candidate;
        Ok(())
    }

    /// All declaration kinds present, with their declarations, in write order.
    pub(crate) fn declaration_groups(&self) -> impl Iterator<Item = (MetaKey, &[Declaration])> + '_ {
        use strum::IntoEnumIterator;
        MetaKey::iter()
            .filter(|kind| kind.is_declaration())
            .map(move |kind| (kind, self.declarations(kind)))
    }

    /// All scalar meta fields present, in write order.
    pub(crate) fn scalar_fields(&self) -> impl Iterator<Item = (MetaKey, &str)> + '_ {
        use strum::IntoEnumIterator;
        MetaKey::iter()
            .filter(|kind| !kind.is_declaration())
            .filter_map(move |kind| self.scalar(kind).map(|value| (kind, value)))
    }

    pub(crate) fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.other.keys().map(String::as_str)
    }

    pub(crate) fn column_line(&self) -> String {
        format!("#{}", self.columns.iter().join("\t"))
    }
}

/// Line-by-line header construction shared by [`Header::parse`] and the reader.
/// With a validation level, every declaration is validated as soon as its version is
/// known: declarations read before `##fileformat` wait until [`HeaderParser::finish`].
pub(crate) struct HeaderParser {
    header: Header,
    level: Option<ValidationLevel>,
    lines_seen: usize,
    complete: bool,
    /// kind, index and line number of declarations read before `##fileformat`
    deferred: Vec<(MetaKey, usize, usize)>,
}

impl HeaderParser {
    pub(crate) fn new(level: Option<ValidationLevel>) -> Self {
        Self {
            header: Header::default(),
            level,
            lines_seen: 0,
            complete: false,
            deferred: Vec::new(),
        }
    }

    fn check_declaration(&self, kind: MetaKey, index: usize, line_no: usize, level: ValidationLevel) -> Result<()> {
        let grammar = grammar_for(self.header.fileformat());
        let declaration = &self.header.declarations(kind)[index];
        validate::validate_declaration(kind, declaration, grammar, level)
            .map_err(|e| e.at(Some(line_no)).into())
    }

    /// Feed one line. Returns true once the `#CHROM` line has been consumed.
    pub(crate) fn push(&mut self, line_no: usize, line: &str) -> Result<bool> {
        if line.trim().is_empty() {
            return Ok(false);
        }
        let first = self.lines_seen == 0;
        self.lines_seen += 1;
        if line.starts_with("##") {
            let meta = parser::meta_line(line, Some(line_no))?;
            let is_fileformat = matches!(&meta, MetaLine::Scalar { key, .. } if key == "fileformat");
            if first && !is_fileformat {
                warn!(
                    "line {}: first meta line is not ##fileformat, assuming {}",
                    line_no,
                    VcfVersion::LATEST
                );
            }
            if !first && is_fileformat && self.header.fileformat().is_none() {
                self.header.late_fileformat = true;
            }
            if let Some((kind, index)) = self.header.insert(meta) {
                if let Some(level) = self.level {
                    if self.header.fileformat().is_some() {
                        self.check_declaration(kind, index, line_no, level)?;
                    } else {
                        self.deferred.push((kind, index, line_no));
                    }
                }
            }
            Ok(false)
        } else if line.starts_with('#') && !first {
            self.header.columns = parser::column_line(line, Some(line_no))?;
            self.complete = true;
            Ok(true)
        } else if first {
            Err(ParseError::MissingFileformat {
                text: line.chars().take(40).collect(),
            }
            .into())
        } else {
            Err(ParseError::MissingColumnHeader.into())
        }
    }

    pub(crate) fn finish(self) -> Result<Header> {
        if !self.complete {
            return Err(ParseError::MissingColumnHeader.into());
        }
        if let Some(level) = self.level {
            for &(kind, index, line_no) in &self.deferred {
                self.check_declaration(kind, index, line_no, level)?;
            }
            validate::validate_structure(&self.header, level)?;
        }
        Ok(self.header)
    }
}
