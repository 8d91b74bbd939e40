use std::io::{BufRead, Lines};
use std::sync::Arc;
use tracing::debug;

use crate::config::TabularFormat;
use crate::error::{ReconcileError, Result};

pub mod cx;

/// One data line, positionally aligned with the header established for its file
#[derive(Debug, Clone)]
pub struct RawRow {
    /// Zero-based line index within the source
    pub line: usize,
    pub header: Arc<Vec<String>>,
    pub values: Vec<String>,
}

impl RawRow {
    /// Column name and raw value pairs in column order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields().find(|(name, _)| *name == column).map(|(_, v)| v)
    }
}

/// Forward-only reader over a tab-delimited source.
///
/// The header is taken from `header_line` (comment prefix stripped) and rows
/// are yielded from `data_start` onwards. Lines in between are preamble.
pub struct RawRowReader<R: BufRead> {
    source_id: String,
    format: TabularFormat,
    lines: Lines<R>,
    line_index: usize,
    header: Option<Arc<Vec<String>>>,
    finished: bool,
}

impl<R: BufRead> RawRowReader<R> {
    pub fn new(source_id: &str, format: TabularFormat, input: R) -> Self {
        Self {
            source_id: source_id.to_string(),
            format,
            lines: input.lines(),
            line_index: 0,
            header: None,
            finished: false,
        }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_ref().map(|h| h.as_slice())
    }

    fn parse_header(&self, line: &str) -> Vec<String> {
        let prefix = self.format.comment_prefix.as_str();
        let stripped = if !prefix.is_empty() {
            line.strip_prefix(prefix).unwrap_or(line)
        } else {
            line
        };
        stripped
            .trim_start()
            .split(self.format.column_separator.as_str())
            .map(|name| name.trim().to_string())
            .collect()
    }

    fn fail(&mut self, reason: String) -> Option<Result<RawRow>> {
        self.finished = true;
        Some(Err(ReconcileError::malformed(&self.source_id, reason)))
    }
}

impl<R: BufRead> Iterator for RawRowReader<R> {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    if self.header.is_none() {
                        let reason = format!(
                            "header line {} never reached ({} lines read)",
                            self.format.header_line, self.line_index
                        );
                        return Some(Err(ReconcileError::malformed(&self.source_id, reason)));
                    }
                    return None;
                }
            };

            let index = self.line_index;
            self.line_index += 1;
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if index == self.format.header_line {
                let header = self.parse_header(line);
                debug!(
                    "RawRowReader[{}]: header at line {} with {} columns",
                    self.source_id,
                    index,
                    header.len()
                );
                self.header = Some(Arc::new(header));
                continue;
            }
            if index < self.format.data_start {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            let prefix = self.format.comment_prefix.as_str();
            if !prefix.is_empty() && line.starts_with(prefix) {
                continue;
            }

            let Some(header) = self.header.clone() else {
                let reason = format!("data line {} precedes the header", index);
                return self.fail(reason);
            };

            let values: Vec<String> = line
                .split(self.format.column_separator.as_str())
                .map(str::to_string)
                .collect();
            if values.len() != header.len() {
                let reason = format!(
                    "line {} has {} columns, header has {}",
                    index,
                    values.len(),
                    header.len()
                );
                return self.fail(reason);
            }

            return Some(Ok(RawRow {
                line: index,
                header,
                values,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn format(header_line: usize, data_start: usize) -> TabularFormat {
        TabularFormat {
            header_line,
            data_start,
            comment_prefix: "#".to_string(),
            column_separator: "\t".to_string(),
        }
    }

    fn read_all(text: &str, fmt: TabularFormat) -> Vec<Result<RawRow>> {
        RawRowReader::new("test", fmt, Cursor::new(text.to_string())).collect()
    }

    #[test]
    fn test_reads_header_on_first_line() {
        let text = "#Gene A\tGene B\n10\t20\n30\t40\n";
        let rows: Vec<RawRow> = read_all(text, format(0, 1))
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].header.as_slice(), &["Gene A", "Gene B"]);
        assert_eq!(rows[0].get("Gene B"), Some("20"));
        assert_eq!(rows[1].line, 2);
    }

    #[test]
    fn test_skips_preamble_and_separator_lines() {
        let mut text = String::new();
        for i in 0..3 {
            text.push_str(&format!("# preamble {}\n", i));
        }
        text.push_str("# ChemicalName\tGeneID\n");
        text.push_str("#\n");
        text.push_str("Aspirin\t5743\r\n");

        let rows: Vec<RawRow> = read_all(&text, format(3, 5))
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].header.as_slice(), &["ChemicalName", "GeneID"]);
        assert_eq!(rows[0].values, vec!["Aspirin", "5743"]);
    }

    #[test]
    fn test_header_never_reached_is_malformed() {
        let results = read_all("#only\n", format(5, 6));
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(ReconcileError::MalformedInput { source_id, reason }) => {
                assert_eq!(source_id, "test");
                assert!(reason.contains("never reached"));
            }
            other => panic!("expected malformed input, got {:?}", other),
        }
    }

    #[test]
    fn test_column_count_mismatch_is_malformed_and_stops() {
        let text = "#a\tb\n1\t2\n1\t2\t3\n4\t5\n";
        let results = read_all(text, format(0, 1));

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ReconcileError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let text = "#a\tb\n1\t2\n\n3\t4\n";
        let rows = read_all(text, format(0, 1));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_fields_pairs_in_column_order() {
        let text = "a\tb\tc\nx\t\ty\n";
        let rows = read_all(text, format(0, 1));
        let row = rows.into_iter().next().unwrap().unwrap();
        let pairs: Vec<(&str, &str)> = row.fields().collect();
        assert_eq!(pairs, vec![("a", "x"), ("b", ""), ("c", "y")]);
    }
}
