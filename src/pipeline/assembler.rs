use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read};
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::config::{IdentifierRule, SourceConfig, SourceFormat};
use crate::error::{ReconcileError, Result};
use crate::pipeline::processing::canonical::{PairCanonicalizer, PairResolution};
use crate::pipeline::processing::conflation::{CanonicalRecord, EvidenceAggregator};
use crate::pipeline::processing::group::FieldGrouper;
use crate::pipeline::processing::normalize::FieldNormalizer;
use crate::pipeline::processing::reader::cx::{CxDocument, CxEdge};
use crate::pipeline::processing::reader::RawRowReader;
use crate::pipeline::processing::record::Record;

/// Counters for the non-fatal outcomes of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Data rows (or graph edges) consumed
    pub rows_read: usize,
    /// Rows with no usable identifier on one side, or edges to unknown nodes
    pub rows_skipped: usize,
    /// Graph edges with a different interaction label
    pub edges_filtered: usize,
    pub duplicate_evidence: usize,
    pub coercion_fallbacks: usize,
    pub records_emitted: usize,
    pub evidence_entries: usize,
    pub duplicate_ids: Vec<String>,
}

/// Finished output of one pass: swept lazily as it is consumed
pub struct Reconciliation {
    source_id: String,
    records: std::vec::IntoIter<CanonicalRecord>,
    stats: ReconcileStats,
}

impl Reconciliation {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }
}

impl Iterator for Reconciliation {
    type Item = CanonicalRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(CanonicalRecord::swept)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

/// Wires read, normalize, group, canonicalize, aggregate and sweep for one source
pub struct RecordAssembler {
    config: SourceConfig,
    normalizer: FieldNormalizer,
    grouper: FieldGrouper,
    canonicalizer: PairCanonicalizer,
}

impl RecordAssembler {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        config.validate()?;
        let (rules_a, rules_b) = identifier_rules(config);
        Ok(Self {
            config: config.clone(),
            normalizer: FieldNormalizer::new(config.fields.clone()),
            grouper: FieldGrouper::new(config.groups.clone()),
            canonicalizer: PairCanonicalizer::new(rules_a, rules_b),
        })
    }

    pub fn source_id(&self) -> &str {
        &self.config.source_id
    }

    /// Consume the whole input and return the reconciled records.
    /// Each call starts from empty state.
    pub fn reconcile<R: BufRead>(&self, input: R) -> Result<Reconciliation> {
        let start = Instant::now();
        let mut stats = ReconcileStats::default();
        let mut aggregator = EvidenceAggregator::new(self.source_id());

        match self.config.format {
            SourceFormat::Tabular => self.consume_rows(input, &mut aggregator, &mut stats)?,
            SourceFormat::GraphExchange => self.consume_graph(input, &mut aggregator, &mut stats)?,
        }

        let aggregation = aggregator.finish();
        stats.duplicate_evidence = aggregation.duplicate_evidence;
        stats.duplicate_ids = aggregation
            .duplicate_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        stats.records_emitted = aggregation.records.len();
        stats.evidence_entries = aggregation.records.iter().map(|r| r.evidence.len()).sum();

        info!(
            "RecordAssembler[{}]: rows_read={} skipped={} filtered={} records={} evidence={} duplicates={} fallbacks={} in {:.2}ms",
            self.source_id(),
            stats.rows_read,
            stats.rows_skipped,
            stats.edges_filtered,
            stats.records_emitted,
            stats.evidence_entries,
            stats.duplicate_evidence,
            stats.coercion_fallbacks,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Reconciliation {
            source_id: self.source_id().to_string(),
            records: aggregation.records.into_iter(),
            stats,
        })
    }

    fn consume_rows<R: BufRead>(
        &self,
        input: R,
        aggregator: &mut EvidenceAggregator,
        stats: &mut ReconcileStats,
    ) -> Result<()> {
        let Some(format) = self.config.tabular.clone() else {
            return Err(ReconcileError::Config(format!(
                "source '{}' has no tabular layout",
                self.source_id()
            )));
        };

        let mut header_checked = false;
        for row in RawRowReader::new(self.source_id(), format, input) {
            let row = row?;
            if !header_checked {
                self.normalizer
                    .check_header(&row.header)
                    .map_err(|reason| ReconcileError::malformed(self.source_id(), reason))?;
                header_checked = true;
            }
            stats.rows_read += 1;
            let normalized = self.normalizer.normalize(&row);
            stats.coercion_fallbacks += normalized.coercion_fallbacks;
            self.aggregate(self.grouper.group(normalized.record), row.line, aggregator, stats)?;
        }
        Ok(())
    }

    fn consume_graph<R: BufRead>(
        &self,
        mut input: R,
        aggregator: &mut EvidenceAggregator,
        stats: &mut ReconcileStats,
    ) -> Result<()> {
        let Some(graph) = self.config.graph.as_ref() else {
            return Err(ReconcileError::Config(format!(
                "source '{}' has no graph section",
                self.source_id()
            )));
        };

        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let document = CxDocument::parse(self.source_id(), &bytes)?;

        for (index, edge) in document.edges(graph).enumerate() {
            stats.rows_read += 1;
            match edge {
                CxEdge::Eligible(record) => {
                    self.aggregate(self.grouper.group(record), index, aggregator, stats)?
                }
                CxEdge::Filtered => stats.edges_filtered += 1,
                CxEdge::Dangling => stats.rows_skipped += 1,
            }
        }
        debug!(
            "RecordAssembler[{}]: {} of {} edges filtered by interaction label",
            self.source_id(),
            stats.edges_filtered,
            document.edge_count()
        );
        Ok(())
    }

    fn aggregate(
        &self,
        record: Record,
        line: usize,
        aggregator: &mut EvidenceAggregator,
        stats: &mut ReconcileStats,
    ) -> Result<()> {
        match self.canonicalizer.canonicalize(record) {
            PairResolution::Resolved(pair) => {
                aggregator.add(pair)?;
            }
            PairResolution::Skipped(reason) => {
                trace!(
                    "RecordAssembler[{}]: skipping row {}: {}",
                    self.source_id(),
                    line,
                    reason
                );
                stats.rows_skipped += 1;
            }
        }
        Ok(())
    }
}

/// Configured rules, or the node namespace for graph sources that declare none
fn identifier_rules(config: &SourceConfig) -> (Vec<IdentifierRule>, Vec<IdentifierRule>) {
    let derived = || {
        config
            .graph
            .as_ref()
            .map(|graph| {
                vec![IdentifierRule {
                    field: graph.namespace.clone(),
                    namespace: graph.namespace.clone(),
                    numeric: true,
                }]
            })
            .unwrap_or_default()
    };
    let a = if config.identifiers.a.is_empty() {
        derived()
    } else {
        config.identifiers.a.clone()
    };
    let b = if config.identifiers.b.is_empty() {
        derived()
    } else {
        config.identifiers.b.clone()
    };
    (a, b)
}

/// Reconcile `input` with a fresh assembler for `config`
pub fn reconcile<R: BufRead>(input: R, config: &SourceConfig) -> Result<Reconciliation> {
    RecordAssembler::new(config)?.reconcile(input)
}
