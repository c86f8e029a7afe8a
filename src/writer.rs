//! Rendering headers and records back to VCF text, and a sink that writes them.
//! Nothing here validates; callers validate before writing.

use std::fmt;
use std::io::{self, Write};

use itertools::Itertools;

use crate::error::Result;
use crate::header::{Declaration, Header, MetaValue};
use crate::record::Record;
use crate::types::MISSING;

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}>",
            self.attributes()
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .join(",")
        )
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(text) => f.write_str(text),
            MetaValue::Declaration(declaration) => write!(f, "{}", declaration),
        }
    }
}

impl Header {
    /// Meta lines in write order followed by the column line, without line terminators.
    pub fn to_lines(&self) -> Vec<String> {
        let scalars = self
            .scalar_fields()
            .map(|(key, value)| format!("##{}={}", key, value));
        let declarations = self.declaration_groups().flat_map(|(kind, declarations)| {
            declarations
                .iter()
                .map(move |declaration| format!("##{}={}", kind, declaration))
        });
        let other = self.other().iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| format!("##{}={}", key, value))
        });
        scalars
            .chain(declarations)
            .chain(other)
            .chain(std::iter::once(self.column_line()))
            .collect()
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = if self.info().is_empty() {
            MISSING.to_owned()
        } else {
            self.info()
                .iter()
                .map(|(key, values)| {
                    if values.is_empty() {
                        key.clone()
                    } else {
                        format!("{}={}", key, values.join(","))
                    }
                })
                .join(";")
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom(),
            self.pos(),
            self.id().join(";"),
            self.reference(),
            self.alt().join(","),
            self.qual(),
            self.filter().join(";"),
            info
        )?;
        if !self.format().is_empty() {
            write!(f, "\t{}", self.format().join(":"))?;
            for sample in self.sample().iter().sorted_by_key(|s| s.order()) {
                let fields = self
                    .format()
                    .iter()
                    .map(|key| match sample.get(key) {
                        Some(values) if !values.is_empty() => values.join(","),
                        _ => MISSING.to_owned(),
                    })
                    .join(":");
                write!(f, "\t{}", fields)?;
            }
        }
        Ok(())
    }
}

/// Writes a header once, then any number of records, to a caller-provided sink.
pub struct VcfWriter<W: Write> {
    inner: W,
    records_written: usize,
    header_written: bool,
}

impl<W: Write> VcfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records_written: 0,
            header_written: false,
        }
    }

    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        if self.header_written {
            return Err(io::Error::new(io::ErrorKind::Other, "VCF header already written").into());
        }
        write!(self.inner, "{}", header)?;
        self.header_written = true;
        Ok(())
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        writeln!(self.inner, "{}", record)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::test::HEADER;
    use crate::record::SampleEntry;
    use crate::types::{MetaKey, ValidationLevel};

    #[test]
    fn test_header_round_trip() {
        let header = Header::parse(HEADER).unwrap();
        let written = header.to_string();
        assert_eq!(Header::parse(&written).unwrap(), header);
        // FORMAT is written before FILTER regardless of input order
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), HEADER.lines().count());
        assert_eq!(lines[9], "##FILTER=<ID=q10,Description=\"Quality below 10\">");
        assert_eq!(lines[11], "##GATKCommandLine=<ID=HaplotypeCaller,Version=4.1>");
    }

    #[test]
    fn test_emission_order() {
        let text = "##fileformat=VCFv4.3\n\
##FILTER=<ID=q10,Description=\"Quality below 10\">\n\
##custom=value\n\
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">\n\
##source=caller\n\
##contig=<ID=1>\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        let mut header = Header::parse(text).unwrap();
        header
            .add(MetaKey::Filter, vec![("ID", "p20"), ("Description", "Pass 20")], ValidationLevel::Strict)
            .unwrap();
        let lines = header.to_lines();
        assert_eq!(
            lines,
            [
                "##fileformat=VCFv4.3",
                "##source=caller",
                "##contig=<ID=1>",
                "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">",
                "##FILTER=<ID=q10,Description=\"Quality below 10\">",
                "##FILTER=<ID=p20,Description=\"Pass 20\">",
                "##custom=value",
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
            ]
        );
    }

    #[test]
    fn test_record_line() {
        let line = "20\t14370\trs1;rs2\tG\tA,T\t29\tq10;p20\tNS=3;DB;AF=0.5,0.1\tGT:DP\t0|0:1\t1|0:.";
        let names = vec!["NA00001".to_owned(), "NA00002".to_owned()];
        let record = Record::parse(line, None, &names).unwrap();
        assert_eq!(record.to_string(), line);

        let built = Record::new("1", 5, "A", vec!["C"])
            .with_format(vec!["GT", "DP"])
            .with_sample(SampleEntry::new("b", 1).with_attr("GT", vec!["1/1".into()]))
            .with_sample(SampleEntry::new("a", 0).with_attr("DP", vec!["4".into()]).with_attr("GT", vec!["0/1".into()]));
        assert_eq!(built.to_string(), "1\t5\t.\tA\tC\t.\t.\t.\tGT:DP\t0/1:4\t1/1:.");
    }

    #[test]
    fn test_writer_counts_and_refuses_second_header() {
        let header = Header::parse(HEADER).unwrap();
        let mut writer = VcfWriter::new(Vec::new());
        writer.write_header(&header).unwrap();
        assert!(writer.write_header(&header).is_err());
        let record = Record::new("20", 1, "G", vec!["A"]);
        writer.write_record(&record).unwrap();
        assert_eq!(writer.records_written(), 1);
        let bytes = writer.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("##fileformat=VCFv4.2\n"));
        assert!(text.ends_with("20\t1\t.\tG\tA\t.\t.\t.\n"));
    }
}
