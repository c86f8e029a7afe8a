//! Per-version regular grammars for ALT alleles, REF, `Number` codes,
//! numeric scalars, genotypes and (VCFv4.3) INFO identifiers.
//!
//! The version-specific parts are plain data in [`Grammar`]; the parsers below are
//! ordinary nom combinators parameterised by that data.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, tag_no_case, take_while, take_while1};
use nom::character::complete::{char, digit1, one_of, satisfy};
use nom::combinator::{all_consuming, opt, recognize};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

use crate::types::{Number, VcfVersion};

#[derive(Debug)]
pub struct Grammar {
    pub version: VcfVersion,
    /// characters allowed in REF
    ref_base: fn(char) -> bool,
    /// characters allowed in sequence ALT alleles
    alt_base: fn(char) -> bool,
    /// `*` as a stand-alone allele (overlapping deletion)
    spanning_deletion: bool,
    /// `<*>` as a symbolic allele
    unspecified_symbolic: bool,
    /// `R` as a `Number` code
    number_r: bool,
    /// INFO IDs must match `[A-Za-z_][0-9A-Za-z_.]*` or be `1000G`
    restricted_info_ids: bool,
}

fn acgtn(c: char) -> bool {
    matches!(c, 'A' | 'C' | 'G' | 'T' | 'N' | 'a' | 'c' | 'g' | 't' | 'n')
}

fn iupac(c: char) -> bool {
    "ACGTURYSWKMBDHVNacgturyswkmbdhvn".contains(c)
}

fn iupac_or_gap(c: char) -> bool {
    iupac(c) || c == '*' || c == '-'
}

static VCF_4_1: Grammar = Grammar {
    version: VcfVersion::V4_1,
    ref_base: acgtn,
    alt_base: acgtn,
    spanning_deletion: false,
    unspecified_symbolic: false,
    number_r: false,
    restricted_info_ids: false,
};

static VCF_4_2: Grammar = Grammar {
    version: VcfVersion::V4_2,
    ref_base: acgtn,
    alt_base: acgtn,
    spanning_deletion: true,
    unspecified_symbolic: false,
    number_r: true,
    restricted_info_ids: false,
};

static VCF_4_3: Grammar = Grammar {
    version: VcfVersion::V4_3,
    ref_base: iupac,
    alt_base: iupac_or_gap,
    spanning_deletion: true,
    unspecified_symbolic: true,
    number_r: true,
    restricted_info_ids: true,
};

/// Select the grammar for a version.
pub fn grammar(version: VcfVersion) -> &'static Grammar {
    match version {
        VcfVersion::V4_1 => &VCF_4_1,
        VcfVersion::V4_2 => &VCF_4_2,
        VcfVersion::V4_3 => &VCF_4_3,
    }
}

/// Select the grammar for a `##fileformat` value; unknown values get the newest grammar.
pub fn grammar_for(fileformat: Option<&str>) -> &'static Grammar {
    grammar(VcfVersion::from_fileformat(fileformat))
}

fn contig_name(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('<'), is_not(">"), char('>'))),
        is_not(":[]<>"),
    ))(input)
}

fn mate_position(input: &str) -> IResult<&str, &str> {
    recognize(tuple((contig_name, char(':'), digit1)))(input)
}

fn subtype(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn mobile_element(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag(":ME"), opt(preceded(char(':'), subtype))))(input)
}

/// The reserved structural variant IDs: DEL, INS, DUP, INV, CNV and their compounds.
fn structural_variant_id(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(tag("DEL"), opt(mobile_element))),
        recognize(pair(tag("INS"), opt(alt((mobile_element, tag(":NOVEL")))))),
        recognize(pair(tag("DUP"), opt(tag(":TANDEM")))),
        tag("INV"),
        tag("CNV"),
    ))(input)
}

fn allele_index(input: &str) -> IResult<&str, &str> {
    alt((digit1, tag(".")))(input)
}

fn genotype(input: &str) -> IResult<&str, &str> {
    recognize(pair(allele_index, many0(pair(one_of("|/"), allele_index))))(input)
}

fn integer(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1))(input)
}

fn float(input: &str) -> IResult<&str, &str> {
    let mantissa = alt((
        recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
        recognize(pair(char('.'), digit1)),
    ));
    let exponent = opt(tuple((one_of("eE"), opt(one_of("+-")), digit1)));
    let special = alt((tag_no_case("infinity"), tag_no_case("inf"), tag_no_case("nan")));
    recognize(pair(
        opt(one_of("+-")),
        alt((recognize(pair(mantissa, exponent)), special)),
    ))(input)
}

fn info_id(input: &str) -> IResult<&str, &str> {
    alt((
        tag("1000G"),
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
        )),
    ))(input)
}

fn matches<'a, F>(parser: F, input: &'a str) -> bool
where
    F: FnMut(&'a str) -> IResult<&'a str, &'a str>,
{
    all_consuming(parser)(input).is_ok()
}

/// `[+-]?digits`
pub fn is_integer(value: &str) -> bool {
    matches(integer, value)
}

/// Signed decimal or exponential notation, `Inf` or `NaN`.
pub fn is_float(value: &str) -> bool {
    matches(float, value)
}

/// `(.|digits)([|/](.|digits))*`
pub fn is_genotype(value: &str) -> bool {
    matches(genotype, value)
}

impl Grammar {
    pub fn is_reference(&self, allele: &str) -> bool {
        matches(take_while1(self.ref_base), allele)
    }

    /// Whether `allele` is a bracketed symbolic allele using a reserved ID.
    /// IDs declared in the header's ALT section are checked by the caller.
    pub fn is_reserved_symbolic(&self, allele: &str) -> bool {
        let unspecified = self.unspecified_symbolic;
        matches(
            recognize(delimited(
                char('<'),
                alt((
                    structural_variant_id,
                    nom::combinator::verify(tag("*"), move |_: &str| unspecified),
                )),
                char('>'),
            )),
            allele,
        )
    }

    fn is_breakend(&self, allele: &str) -> bool {
        let bases = take_while1(self.alt_base);
        matches(
            alt((
                recognize(tuple((&bases, char('['), mate_position, char('[')))),
                recognize(tuple((&bases, char(']'), mate_position, char(']')))),
                recognize(tuple((char(']'), mate_position, char(']'), &bases))),
                recognize(tuple((char('['), mate_position, char('['), &bases))),
                recognize(pair(char('.'), &bases)),
                recognize(pair(&bases, char('.'))),
            )),
            allele,
        )
    }

    /// Whether a single ALT allele is valid for this version, ignoring header-declared IDs.
    pub fn is_alt_allele(&self, allele: &str) -> bool {
        allele == "."
            || (self.spanning_deletion && allele == "*")
            || matches(take_while1(self.alt_base), allele)
            || self.is_breakend(allele)
            || self.is_reserved_symbolic(allele)
    }

    /// Parse a `Number` code: `digits | A | G | R | .` (`R` since VCFv4.2).
    pub fn number(&self, value: &str) -> Option<Number> {
        match value {
            "A" => Some(Number::AlternateAlleles),
            "R" if self.number_r => Some(Number::Alleles),
            "G" => Some(Number::Genotypes),
            "." => Some(Number::Unknown),
            digits if matches(digit1, digits) => digits.parse().ok().map(Number::Count),
            _ => None,
        }
    }

    /// Whether `id` is an acceptable INFO identifier for this version.
    pub fn is_info_id(&self, id: &str) -> bool {
        !self.restricted_info_ids || matches(info_id, id)
    }
}
