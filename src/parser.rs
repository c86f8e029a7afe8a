use nom::bytes::complete::{escaped, is_not, tag, take_while};
use nom::character::complete::{anychar, char};
use nom::combinator::{opt, recognize};
use nom::multi::separated_list0;
use nom::sequence::{delimited, separated_pair};
use nom::IResult;

use crate::error::ParseError;
use crate::types::MANDATORY_COLUMNS;

/// A `##KEY=...` line, split into its key and either a plain value or a list of attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MetaLine {
    Scalar {
        key: String,
        value: String,
    },
    Structured {
        key: String,
        attributes: Vec<(String, String)>,
        /// false if the closing `>` was missing
        terminated: bool,
    },
}

/// A double-quoted string, returned with its quotes. Backslash escapes the next character.
fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('"'),
        opt(escaped(is_not("\\\""), '\\', anychar)),
        char('"'),
    ))(input)
}

fn attribute_value(input: &str) -> IResult<&str, &str> {
    if input.starts_with('"') {
        quoted(input)
    } else {
        // an unquoted value runs to the next comma, `=` included
        take_while(|c: char| c != ',')(input)
    }
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(is_not("=,"), tag("="), attribute_value)(input)
}

fn attributes(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    let (input, pairs) = separated_list0(char(','), key_value)(input)?;
    // tolerate a trailing comma before `>`
    let (input, _) = opt(char(','))(input)?;
    Ok((input, pairs))
}

/// Split the inside of `<...>` into attribute pairs, keeping quotes on quoted values.
pub(crate) fn declaration_attributes(inner: &str) -> Result<Vec<(String, String)>, String> {
    match attributes(inner) {
        Ok(("", pairs)) => Ok(pairs
            .into_iter()
            .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
            .collect()),
        Ok((rest, _)) => Err(format!("unexpected text {:?}", rest)),
        Err(_) => Err("unbalanced quotes".into()),
    }
}

/// Parse one meta-information line (starting with `##`).
pub(crate) fn meta_line(line: &str, line_no: Option<usize>) -> Result<MetaLine, ParseError> {
    let malformed = |reason: &str| ParseError::MalformedMeta {
        text: line.to_owned(),
        reason: reason.to_owned(),
        line: line_no,
    };
    let body = line
        .strip_prefix("##")
        .ok_or_else(|| malformed("meta lines start with ##"))?;
    let (key, value) = body
        .split_once('=')
        .ok_or_else(|| malformed("expected KEY=value"))?;
    if key.is_empty() {
        return Err(malformed("empty key"));
    }
    match value.strip_prefix('<') {
        Some(inner) => {
            let (inner, terminated) = match inner.strip_suffix('>') {
                Some(inner) => (inner, true),
                None => (inner, false),
            };
            let attributes = declaration_attributes(inner).map_err(|reason| malformed(&reason))?;
            Ok(MetaLine::Structured {
                key: key.to_owned(),
                attributes,
                terminated,
            })
        }
        None => Ok(MetaLine::Scalar {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

/// Parse the `#CHROM ...` line into column names (without the leading `#`).
pub(crate) fn column_line(line: &str, line_no: Option<usize>) -> Result<Vec<String>, ParseError> {
    let columns: Vec<String> = line
        .trim_start_matches('#')
        .split('\t')
        .map(str::to_owned)
        .collect();
    if columns.len() < MANDATORY_COLUMNS.len() {
        return Err(ParseError::TooFewColumns {
            expected: MANDATORY_COLUMNS.len(),
            found: columns.len(),
            line: line_no,
        });
    }
    Ok(columns)
}

/// Split a data line into its tab-separated columns.
pub(crate) fn record_columns(line: &str, line_no: Option<usize>) -> Result<Vec<&str>, ParseError> {
    if line.trim().is_empty() {
        return Err(ParseError::EmptyLine { line: line_no });
    }
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < MANDATORY_COLUMNS.len() {
        return Err(ParseError::TooFewColumns {
            expected: MANDATORY_COLUMNS.len(),
            found: columns.len(),
            line: line_no,
        });
    }
    Ok(columns)
}

/// Split a delimited column, treating the missing marker as a single element.
pub(crate) fn split_list(value: &str, delimiter: char) -> Vec<String> {
    value.split(delimiter).map(str::to_owned).collect()
}

/// Split an INFO column into `(key, values)` pairs. Flags have no values.
pub(crate) fn info_pairs(value: &str) -> Vec<(String, Vec<String>)> {
    if value == crate::types::MISSING {
        return Vec::new();
    }
    value
        .split(';')
        .map(|entry| match entry.split_once('=') {
            Some((key, values)) => (key.to_owned(), split_list(values, ',')),
            None => (entry.to_owned(), Vec::new()),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quoted_description_keeps_commas() {
        let line = r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Depth, total; per site">"#;
        let parsed = meta_line(line, Some(2)).unwrap();
        assert_eq!(
            parsed,
            MetaLine::Structured {
                key: "INFO".into(),
                attributes: vec![
                    ("ID".into(), "DP".into()),
                    ("Number".into(), "1".into()),
                    ("Type".into(), "Integer".into()),
                    ("Description".into(), "\"Depth, total; per site\"".into()),
                ],
                terminated: true,
            }
        );
    }

    #[test]
    fn test_unquoted_value_with_equals_is_kept_whole() {
        let line = "##contig=<ID=1,URL=http://example.org/?a=b,length=100>";
        match meta_line(line, None).unwrap() {
            MetaLine::Structured { attributes, .. } => {
                assert_eq!(attributes[1], ("URL".into(), "http://example.org/?a=b".into()));
                assert_eq!(attributes[2], ("length".into(), "100".into()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_escaped_quotes_and_trailing_comma() {
        let line = r#"##FILTER=<ID=q10,Description="below \"10\", see docs",>"#;
        match meta_line(line, None).unwrap() {
            MetaLine::Structured { attributes, .. } => {
                assert_eq!(attributes.len(), 2);
                assert_eq!(attributes[1].1, r#""below \"10\", see docs""#);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(quoted(r#""" rest"#), Ok((" rest", r#""""#)));
        assert_eq!(quoted(r#""a\\",b"#), Ok((",b", r#""a\\""#)));
        assert!(quoted(r#""a\""#).is_err());
        assert!(quoted("plain").is_err());
    }

    #[test]
    fn test_unterminated_declaration() {
        let line = r#"##FILTER=<ID=q10,Description="low""#;
        match meta_line(line, None).unwrap() {
            MetaLine::Structured { terminated, .. } => assert!(!terminated),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scalar_and_malformed() {
        assert_eq!(
            meta_line("##fileformat=VCFv4.2", None).unwrap(),
            MetaLine::Scalar {
                key: "fileformat".into(),
                value: "VCFv4.2".into()
            }
        );
        assert!(meta_line("##novalue", Some(3)).is_err());
        assert!(meta_line(r#"##INFO=<ID=X,Description="open>"#, None).is_err());
        assert!(meta_line("##INFO=<ID=X,Flag>", None).is_err());
    }

    #[test]
    fn test_record_columns() {
        assert_eq!(
            record_columns("", Some(9)),
            Err(ParseError::EmptyLine { line: Some(9) })
        );
        assert!(matches!(
            record_columns("1\t2\t.", None),
            Err(ParseError::TooFewColumns { found: 3, .. })
        ));
        assert_eq!(record_columns("1\t2\t.\tA\tT\t.\t.\t.", None).unwrap().len(), 8);
    }

    #[test]
    fn test_info_pairs() {
        assert!(info_pairs(".").is_empty());
        assert_eq!(
            info_pairs("DP=10;DB;AF=0.1,0.2"),
            vec![
                ("DP".to_owned(), vec!["10".to_owned()]),
                ("DB".to_owned(), vec![]),
                ("AF".to_owned(), vec!["0.1".to_owned(), "0.2".to_owned()]),
            ]
        );
    }
}
