use std::fmt;

use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Missing value marker used throughout VCF columns.
pub const MISSING: &str = ".";

/// The FILTER value of records that passed all filters.
pub const PASS: &str = "PASS";

/// Separates the components of a record's identity key.
/// Tabs delimit columns, so they never occur inside a column value.
pub const IDENTITY_KEY_SEPARATOR: char = '\t';

/// The eight mandatory columns of the `#CHROM` line.
pub const MANDATORY_COLUMNS: [&str; 8] =
    ["CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

pub const FORMAT_COLUMN: &str = "FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display, EnumIter)]
pub enum VcfVersion {
    #[strum(serialize = "VCFv4.1")]
    V4_1,
    #[strum(serialize = "VCFv4.2")]
    V4_2,
    #[strum(serialize = "VCFv4.3")]
    V4_3,
}

impl VcfVersion {
    pub const LATEST: VcfVersion = VcfVersion::V4_3;

    /// Resolve a `##fileformat` value, falling back to the newest supported version.
    pub fn from_fileformat(fileformat: Option<&str>) -> Self {
        match fileformat {
            Some(value) => value.parse().unwrap_or_else(|_| {
                log::warn!(
                    "unsupported fileformat {:?}, using {} grammar",
                    value,
                    VcfVersion::LATEST
                );
                VcfVersion::LATEST
            }),
            None => VcfVersion::LATEST,
        }
    }
}

impl Default for VcfVersion {
    fn default() -> Self {
        VcfVersion::LATEST
    }
}

/// How much conformance is enforced beyond structural sanity.
/// Every check performed at a level is also performed at all stricter levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ValidationLevel {
    Basic,
    Relaxed,
    Strict,
}

impl Default for ValidationLevel {
    fn default() -> Self {
        ValidationLevel::Strict
    }
}

/// Keys of the meta-information lines known to the VCF specifications,
/// in the order they are written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
pub enum MetaKey {
    #[strum(serialize = "fileformat")]
    FileFormat,
    #[strum(serialize = "fileDate")]
    FileDate,
    #[strum(serialize = "source")]
    Source,
    #[strum(serialize = "reference")]
    Reference,
    #[strum(serialize = "assembly")]
    Assembly,
    #[strum(serialize = "phasing")]
    Phasing,
    #[strum(serialize = "commandline")]
    CommandLine,
    #[strum(serialize = "PEDIGREE")]
    Pedigree,
    #[strum(serialize = "pedigreeDB")]
    PedigreeDb,
    #[strum(serialize = "contig")]
    Contig,
    #[strum(serialize = "INFO")]
    Info,
    #[strum(serialize = "FORMAT")]
    Format,
    #[strum(serialize = "FILTER")]
    Filter,
    #[strum(serialize = "ALT")]
    Alt,
    #[strum(serialize = "SAMPLE")]
    Sample,
    #[strum(serialize = "META")]
    Meta,
}

impl MetaKey {
    /// Whether lines with this key carry a bracketed `<ID=...>` declaration.
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            MetaKey::Contig
                | MetaKey::Info
                | MetaKey::Format
                | MetaKey::Filter
                | MetaKey::Alt
                | MetaKey::Sample
                | MetaKey::Meta
        )
    }

    /// Whether the key belongs to the meta vocabulary of `version`.
    pub fn is_known_in(self, version: VcfVersion) -> bool {
        match self {
            MetaKey::Meta => version >= VcfVersion::V4_3,
            _ => true,
        }
    }

    /// Keys that must be present in every declaration of this kind,
    /// in the order they are written.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            MetaKey::Info | MetaKey::Format => &["ID", "Number", "Type", "Description"],
            MetaKey::Filter | MetaKey::Alt => &["ID", "Description"],
            MetaKey::Meta => &["ID", "Type", "Number", "Values"],
            MetaKey::Contig | MetaKey::Sample => &["ID"],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumString, Display)]
pub enum FieldType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

impl FieldType {
    /// Types a declaration of the given kind may use.
    pub fn allowed_for(self, kind: MetaKey) -> bool {
        match kind {
            MetaKey::Info => true,
            MetaKey::Format => self != FieldType::Flag,
            _ => false,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
pub enum Number {
    Count(usize),
    /// `A`: one value per alternate allele
    AlternateAlleles,
    /// `R`: one value per allele, including the reference
    Alleles,
    /// `G`: one value per possible genotype
    Genotypes,
    /// `.`
    Unknown,
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Count(n) => write!(f, "{}", n),
            Number::AlternateAlleles => f.write_str("A"),
            Number::Alleles => f.write_str("R"),
            Number::Genotypes => f.write_str("G"),
            Number::Unknown => f.write_str(MISSING),
        }
    }
}

/// The columns of a data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum RecordField {
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    Info,
    Format,
    Sample,
}
