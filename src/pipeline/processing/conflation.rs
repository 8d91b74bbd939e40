use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::constants::{INTERACTOR_A, INTERACTOR_B};
use crate::error::Result;
use crate::pipeline::processing::canonical::{CanonicalId, CanonicalPair};
use crate::pipeline::processing::record::{
    structural_signature, sweep_record, FieldValue, Record,
};

/// One document per unique undirected interactor pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: CanonicalId,
    pub interactor_a: Record,
    pub interactor_b: Record,
    /// Structurally distinct observations, in the order first seen
    pub evidence: Vec<Record>,
}

impl CanonicalRecord {
    fn seed(id: CanonicalId, interactor_a: Record, interactor_b: Record) -> Self {
        Self {
            id,
            interactor_a,
            interactor_b,
            evidence: Vec::new(),
        }
    }

    /// Strip null and empty leaves from the interactors and every evidence entry
    pub fn swept(self) -> Self {
        Self {
            id: self.id,
            interactor_a: sweep_record(self.interactor_a),
            interactor_b: sweep_record(self.interactor_b),
            evidence: self.evidence.into_iter().map(sweep_record).collect(),
        }
    }
}

/// What [`EvidenceAggregator::add`] did with a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    /// First time this CanonicalID was seen
    Created,
    /// Existing pair, new distinct evidence
    Appended,
    /// Evidence structurally equal to an entry already held; not appended
    Duplicate,
}

/// Everything the aggregator accumulated over one full pass
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// In first-seen order, not yet swept
    pub records: Vec<CanonicalRecord>,
    pub duplicate_evidence: usize,
    /// Pairs that received at least one duplicate, in first-duplicate order
    pub duplicate_ids: Vec<CanonicalId>,
}

struct PairSlot {
    record: CanonicalRecord,
    signatures: HashSet<String>,
    duplicates: usize,
}

/// Folds canonicalized rows into one [`CanonicalRecord`] per pair.
///
/// Holds every in-progress pair until the input is exhausted; any later row
/// may still contribute to a pair seen at the very start.
pub struct EvidenceAggregator {
    source_id: String,
    index: HashMap<CanonicalId, usize>,
    slots: Vec<PairSlot>,
    duplicate_evidence: usize,
    duplicate_ids: Vec<CanonicalId>,
}

impl EvidenceAggregator {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            index: HashMap::new(),
            slots: Vec::new(),
            duplicate_evidence: 0,
            duplicate_ids: Vec::new(),
        }
    }

    pub fn pair_count(&self) -> usize {
        self.slots.len()
    }

    pub fn evidence_count(&self) -> usize {
        self.slots.iter().map(|s| s.record.evidence.len()).sum()
    }

    pub fn duplicate_evidence(&self) -> usize {
        self.duplicate_evidence
    }

    pub fn add(&mut self, pair: CanonicalPair) -> Result<AggregateOutcome> {
        let CanonicalPair { id, mut record, .. } = pair;
        let interactor_a = take_interactor(&mut record, INTERACTOR_A);
        let interactor_b = take_interactor(&mut record, INTERACTOR_B);

        // Swept first so an absent field and a null field compare equal
        let evidence = sweep_record(record);
        let signature = structural_signature(&evidence)?;

        let Some(&slot_index) = self.index.get(&id) else {
            debug!("EvidenceAggregator[{}]: new pair {}", self.source_id, id);
            let mut canonical = CanonicalRecord::seed(id.clone(), interactor_a, interactor_b);
            canonical.evidence.push(evidence);
            self.index.insert(id, self.slots.len());
            self.slots.push(PairSlot {
                record: canonical,
                signatures: HashSet::from([signature]),
                duplicates: 0,
            });
            return Ok(AggregateOutcome::Created);
        };

        let slot = &mut self.slots[slot_index];
        merge_interactors(&mut slot.record.interactor_a, interactor_a);
        merge_interactors(&mut slot.record.interactor_b, interactor_b);

        if !slot.signatures.insert(signature) {
            warn!(
                "EvidenceAggregator[{}]: duplicate evidence for {}",
                self.source_id, id
            );
            if slot.duplicates == 0 {
                self.duplicate_ids.push(id);
            }
            slot.duplicates += 1;
            self.duplicate_evidence += 1;
            return Ok(AggregateOutcome::Duplicate);
        }

        slot.record.evidence.push(evidence);
        Ok(AggregateOutcome::Appended)
    }

    pub fn finish(self) -> Aggregation {
        Aggregation {
            records: self.slots.into_iter().map(|s| s.record).collect(),
            duplicate_evidence: self.duplicate_evidence,
            duplicate_ids: self.duplicate_ids,
        }
    }

    /// Finished records, swept, in first-seen order
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.finish()
            .records
            .into_iter()
            .map(CanonicalRecord::swept)
            .collect()
    }
}

/// Interactor objects are swept per row so blank cells never reach a merge
fn take_interactor(record: &mut Record, side: &str) -> Record {
    match record.remove(side) {
        Some(FieldValue::Object(fields)) => sweep_record(fields),
        _ => Record::new(),
    }
}

/// Union `incoming` into `existing` key by key
pub fn merge_interactors(existing: &mut Record, incoming: Record) {
    for (key, value) in incoming {
        match existing.get_mut(&key) {
            Some(current) => {
                let merged = merge_values(std::mem::replace(current, FieldValue::Null), value);
                *current = merged;
            }
            None => {
                existing.insert(key, value);
            }
        }
    }
}

/// Null and empty values are treated as absent. Equal values stay as they
/// are; differing scalars become a two-element list; lists union in
/// first-seen order.
pub fn merge_values(existing: FieldValue, incoming: FieldValue) -> FieldValue {
    match (existing, incoming) {
        (existing, incoming) if incoming.is_empty() => existing,
        (existing, incoming) if existing.is_empty() => incoming,
        (existing, incoming) if existing == incoming => existing,
        (existing, incoming) => {
            let mut items = into_items(existing);
            for item in into_items(incoming) {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            if items.len() == 1 {
                items.remove(0)
            } else {
                FieldValue::List(items)
            }
        }
    }
}

fn into_items(value: FieldValue) -> Vec<FieldValue> {
    let items = match value {
        FieldValue::List(items) => items,
        other => vec![other],
    };
    let mut unique: Vec<FieldValue> = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_empty() && !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DIRECTION;
    use crate::pipeline::processing::canonical::{
        canonical_id, Direction, IdentifierValue, InteractorKey,
    };

    fn key(id: i64) -> InteractorKey {
        InteractorKey::new("entrezgene", IdentifierValue::Numeric(id))
    }

    fn side(id: i64, extra: &[(&str, FieldValue)]) -> FieldValue {
        let mut fields = Record::new();
        fields.insert("entrezgene".to_string(), FieldValue::Int(id));
        for (k, v) in extra {
            fields.insert(k.to_string(), v.clone());
        }
        FieldValue::Object(fields)
    }

    fn pair(low: i64, high: i64, score: f64, extra_a: &[(&str, FieldValue)]) -> CanonicalPair {
        let (id, direction) = canonical_id(&key(low), &key(high));
        let mut record = Record::new();
        record.insert(INTERACTOR_A.to_string(), side(low, extra_a));
        record.insert(INTERACTOR_B.to_string(), side(high, &[]));
        record.insert("score".to_string(), FieldValue::Float(score));
        record.insert(DIRECTION.to_string(), FieldValue::from(direction.as_str()));
        CanonicalPair {
            id,
            direction: Direction::AToB,
            record,
        }
    }

    #[test]
    fn test_distinct_evidence_retained() {
        let mut agg = EvidenceAggregator::new("test");
        assert_eq!(agg.add(pair(10, 20, 0.5, &[])).unwrap(), AggregateOutcome::Created);
        assert_eq!(agg.add(pair(10, 20, 0.7, &[])).unwrap(), AggregateOutcome::Appended);

        let records = agg.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_str(), "entrezgene:10-entrezgene:20");
        assert_eq!(records[0].evidence.len(), 2);
        assert!(!records[0].evidence[0].contains_key(INTERACTOR_A));
    }

    #[test]
    fn test_duplicate_evidence_suppressed() {
        let mut agg = EvidenceAggregator::new("test");
        agg.add(pair(10, 20, 0.5, &[])).unwrap();
        assert_eq!(agg.add(pair(10, 20, 0.5, &[])).unwrap(), AggregateOutcome::Duplicate);
        agg.add(pair(10, 20, 0.5, &[])).unwrap();

        assert_eq!(agg.duplicate_evidence(), 2);
        let aggregation = agg.finish();
        assert_eq!(aggregation.duplicate_ids.len(), 1);
        assert_eq!(aggregation.records[0].evidence.len(), 1);
    }

    #[test]
    fn test_null_and_absent_evidence_fields_are_equal() {
        let mut agg = EvidenceAggregator::new("test");
        agg.add(pair(1, 2, 0.5, &[])).unwrap();

        let mut with_null = pair(1, 2, 0.5, &[]);
        with_null.record.insert("author".to_string(), FieldValue::Null);
        assert_eq!(agg.add(with_null).unwrap(), AggregateOutcome::Duplicate);
    }

    #[test]
    fn test_interactor_metadata_union() {
        let mut agg = EvidenceAggregator::new("test");
        agg.add(pair(1, 2, 0.1, &[("symbol", FieldValue::from("TP53"))])).unwrap();
        agg.add(pair(1, 2, 0.2, &[("symbol", FieldValue::from("P53"))])).unwrap();
        agg.add(pair(1, 2, 0.3, &[("symbol", FieldValue::from("TP53"))])).unwrap();
        agg.add(pair(1, 2, 0.4, &[("taxid", FieldValue::Int(9606))])).unwrap();

        let records = agg.into_records();
        let a = &records[0].interactor_a;
        assert_eq!(
            a.get("symbol"),
            Some(&FieldValue::List(vec![FieldValue::from("TP53"), FieldValue::from("P53")]))
        );
        assert_eq!(a.get("taxid"), Some(&FieldValue::Int(9606)));
        assert_eq!(a.get("entrezgene"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_merge_values_policy() {
        let x = FieldValue::from("x");
        let y = FieldValue::from("y");
        let z = FieldValue::from("z");

        assert_eq!(merge_values(x.clone(), FieldValue::Null), x);
        assert_eq!(merge_values(FieldValue::Null, x.clone()), x);
        assert_eq!(merge_values(x.clone(), x.clone()), x);
        assert_eq!(merge_values(FieldValue::from(""), x.clone()), x);
        assert_eq!(merge_values(x.clone(), FieldValue::from("")), x);
        assert_eq!(
            merge_values(FieldValue::List(vec![FieldValue::from(""), x.clone()]), y.clone()),
            FieldValue::List(vec![x.clone(), y.clone()])
        );
        assert_eq!(
            merge_values(FieldValue::List(vec![x.clone(), y.clone()]), y.clone()),
            FieldValue::List(vec![x.clone(), y.clone()])
        );
        assert_eq!(
            merge_values(
                FieldValue::List(vec![x.clone(), y.clone()]),
                FieldValue::List(vec![z.clone(), x.clone()])
            ),
            FieldValue::List(vec![x, y, z])
        );
    }

    #[test]
    fn test_records_keep_first_seen_order() {
        let mut agg = EvidenceAggregator::new("test");
        agg.add(pair(5, 6, 0.1, &[])).unwrap();
        agg.add(pair(1, 2, 0.1, &[])).unwrap();
        agg.add(pair(5, 6, 0.2, &[])).unwrap();

        assert_eq!(agg.pair_count(), 2);
        assert_eq!(agg.evidence_count(), 3);
        let ids: Vec<String> = agg.into_records().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["entrezgene:5-entrezgene:6", "entrezgene:1-entrezgene:2"]
        );
    }

    #[test]
    fn test_blank_interactor_field_does_not_join_merge() {
        let mut agg = EvidenceAggregator::new("test");
        agg.add(pair(1, 2, 0.1, &[("symbol", FieldValue::from(""))])).unwrap();
        agg.add(pair(1, 2, 0.2, &[("symbol", FieldValue::from("A1BG"))])).unwrap();
        agg.add(pair(1, 2, 0.3, &[("symbol", FieldValue::from(""))])).unwrap();

        let records = agg.into_records();
        assert_eq!(records[0].interactor_a.get("symbol"), Some(&FieldValue::from("A1BG")));
    }

    #[test]
    fn test_swept_output_drops_empty_interactor_fields() {
        let mut agg = EvidenceAggregator::new("test");
        agg.add(pair(1, 2, 0.1, &[("alias", FieldValue::Null), ("name", FieldValue::from(""))]))
            .unwrap();
        let records = agg.into_records();
        assert_eq!(records[0].interactor_a.len(), 1);
    }
}
