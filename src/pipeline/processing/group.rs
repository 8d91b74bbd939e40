use crate::config::GroupSpec;
use crate::pipeline::processing::record::{FieldValue, Record};

/// Relocates declared fields into nested objects, one group at a time.
///
/// Groups run in declaration order. A field claimed by an earlier group is
/// gone by the time a later group asks for it, so the order is significant.
pub struct FieldGrouper {
    groups: Vec<GroupSpec>,
}

impl FieldGrouper {
    pub fn new(groups: Vec<GroupSpec>) -> Self {
        Self { groups }
    }

    pub fn group(&self, mut record: Record) -> Record {
        for spec in &self.groups {
            group_fields(&mut record, spec);
        }
        record
    }
}

/// Move `spec.fields` out of the top level into `record[spec.name]`.
/// Absent source fields appear as null so every group has a complete key set.
pub fn group_fields(record: &mut Record, spec: &GroupSpec) {
    let nested: Record = spec
        .fields
        .iter()
        .map(|(source, target)| {
            let value = record.remove(source).unwrap_or(FieldValue::Null);
            (target.clone(), value)
        })
        .collect();
    record.insert(spec.name.clone(), FieldValue::Object(nested));
}
