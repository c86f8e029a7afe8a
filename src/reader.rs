use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use log::debug;

use crate::error::{ParseError, Result};
use crate::header::{Header, HeaderParser, Registry};
use crate::record::{Record, RecordValidator};
use crate::types::ValidationLevel;

/// Reads the header up front, then yields one record per data line.
///
/// With a validation level the header is validated while it is read and every record
/// is validated against the header's registry; without one, lines are only split.
pub struct VcfReader<R: BufRead> {
    header: Header,
    registry: Registry,
    level: Option<ValidationLevel>,
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> VcfReader<R> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of the line read last, counting from 1.
    pub fn line_number(&self) -> usize {
        self.line_no
    }
}

impl VcfReader<BufReader<Box<dyn Read>>> {
    /// Open a plain or gzip-compressed file.
    pub fn from_path<P: AsRef<Path>>(path: P, level: Option<ValidationLevel>) -> Result<Self> {
        let (reader, format) = niffler::from_path(path)?;
        debug!("opened input with compression {:?}", format);
        Self::new(BufReader::new(reader), level)
    }
}

impl<R: BufRead> VcfReader<R> {
    pub fn new(reader: R, level: Option<ValidationLevel>) -> Result<Self> {
        let mut lines = reader.lines();
        let mut parser = HeaderParser::new(level);
        let mut line_no = 0;
        for line in &mut lines {
            line_no += 1;
            let line = line?;
            if parser.push(line_no, line.trim_end_matches('\r'))? {
                break;
            }
        }
        let header = parser.finish()?;
        let registry = header.extract_registry();
        debug!(
            "header read in {} lines, {} samples",
            line_no,
            registry.sample_names().len()
        );
        Ok(Self {
            header,
            registry,
            level,
            lines,
            line_no,
        })
    }

    fn record(&self, line: &str) -> Result<Record> {
        let line_no = Some(self.line_no);
        if line.trim().is_empty() {
            return Err(ParseError::EmptyLine { line: line_no }.into());
        }
        match self.level {
            Some(level) => RecordValidator::new(&self.registry, level).parse_and_validate(line, line_no),
            None => Record::parse(line, line_no, self.registry.sample_names()),
        }
    }
}

impl<R: BufRead> Iterator for VcfReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line.map_err(Into::into).and_then(|line| self.record(line.trim_end_matches('\r'))))
    }
}
