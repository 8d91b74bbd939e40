use std::collections::BTreeMap;
use tracing::trace;

use crate::config::{CompositeField, FieldRules};
use crate::pipeline::processing::reader::RawRow;
use crate::pipeline::processing::record::{FieldValue, Record};

/// Result of normalizing a single row
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub record: Record,
    /// Declared numeric values that were not numbers and fell back to zero
    pub coercion_fallbacks: usize,
}

/// Turns raw rows into typed records according to a source's field rules.
///
/// Stage order is fixed: sentinel substitution, renaming, integer and float
/// coercion, list splitting, integer-list splitting, composite expansion.
pub struct FieldNormalizer {
    rules: FieldRules,
}

impl FieldNormalizer {
    pub fn new(rules: FieldRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    /// Fails with the offending columns when two header names rename to the
    /// same field
    pub fn check_header(&self, header: &[String]) -> Result<(), String> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for column in header {
            let field = rename_field(column, &self.rules.rename);
            if let Some(first) = seen.insert(field.clone(), column) {
                return Err(format!(
                    "columns '{}' and '{}' both map to field '{}'",
                    first, column, field
                ));
            }
        }
        Ok(())
    }

    pub fn normalize(&self, row: &RawRow) -> NormalizedRow {
        let mut record = Record::new();
        for (column, raw) in row.fields() {
            let value = match &self.rules.empty_sentinel {
                Some(sentinel) if raw == sentinel => FieldValue::Null,
                _ => FieldValue::from(raw),
            };
            record.insert(rename_field(column, &self.rules.rename), value);
        }

        let mut fallbacks = 0;
        let separator = self.rules.list_separator.as_str();

        for field in &self.rules.int_fields {
            if let Some(value) = record.get_mut(field) {
                let (coerced, fell_back) = coerce_int(std::mem::replace(value, FieldValue::Null));
                *value = coerced;
                fallbacks += fell_back;
            }
        }
        for field in &self.rules.float_fields {
            if let Some(value) = record.get_mut(field) {
                let (coerced, fell_back) = coerce_float(std::mem::replace(value, FieldValue::Null));
                *value = coerced;
                fallbacks += fell_back;
            }
        }
        for field in &self.rules.list_fields {
            if let Some(value) = record.get_mut(field) {
                *value = split_list(std::mem::replace(value, FieldValue::Null), separator);
            }
        }
        for field in &self.rules.int_list_fields {
            if let Some(value) = record.get_mut(field) {
                let split = split_list(std::mem::replace(value, FieldValue::Null), separator);
                let (coerced, fell_back) = coerce_int(split);
                *value = coerced;
                fallbacks += fell_back;
            }
        }
        for composite in &self.rules.composite_fields {
            expand_composite(&mut record, composite, separator);
        }

        if fallbacks > 0 {
            trace!(
                "FieldNormalizer: line {} had {} numeric fallbacks",
                row.line,
                fallbacks
            );
        }

        NormalizedRow {
            record,
            coercion_fallbacks: fallbacks,
        }
    }
}

/// Explicit rename when mapped, otherwise lower-case with spaces as underscores
pub fn rename_field(name: &str, rename: &BTreeMap<String, String>) -> String {
    match rename.get(name) {
        Some(target) => target.clone(),
        None => name.to_lowercase().replace(' ', "_"),
    }
}

/// Integer coercion: null or blank stays null, valid text parses,
/// anything else becomes zero. Lists are coerced element-wise.
/// Returns the value and how many elements fell back to zero.
pub fn coerce_int(value: FieldValue) -> (FieldValue, usize) {
    match value {
        FieldValue::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                (FieldValue::Null, 0)
            } else {
                match trimmed.parse::<i64>() {
                    Ok(i) => (FieldValue::Int(i), 0),
                    Err(_) => (FieldValue::Int(0), 1),
                }
            }
        }
        FieldValue::List(items) => coerce_each(items, coerce_int),
        other => (other, 0),
    }
}

/// Float coercion with the same null / valid / zero policy as [`coerce_int`]
pub fn coerce_float(value: FieldValue) -> (FieldValue, usize) {
    match value {
        FieldValue::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                (FieldValue::Null, 0)
            } else {
                match trimmed.parse::<f64>() {
                    Ok(f) => (FieldValue::Float(f), 0),
                    Err(_) => (FieldValue::Float(0.0), 1),
                }
            }
        }
        FieldValue::Int(i) => (FieldValue::Float(i as f64), 0),
        FieldValue::List(items) => coerce_each(items, coerce_float),
        other => (other, 0),
    }
}

fn coerce_each(
    items: Vec<FieldValue>,
    coerce: fn(FieldValue) -> (FieldValue, usize),
) -> (FieldValue, usize) {
    let mut fallbacks = 0;
    let coerced = items
        .into_iter()
        .map(|item| {
            let (v, n) = coerce(item);
            fallbacks += n;
            v
        })
        .collect();
    (FieldValue::List(coerced), fallbacks)
}

/// Split delimiter-joined text. A single element collapses to a bare scalar;
/// null or empty input yields null. Non-text values pass through.
pub fn split_list(value: FieldValue, separator: &str) -> FieldValue {
    match value {
        FieldValue::Str(s) if s.is_empty() => FieldValue::Null,
        FieldValue::Str(s) => {
            let mut parts: Vec<FieldValue> = s.split(separator).map(FieldValue::from).collect();
            if parts.len() == 1 {
                parts.remove(0)
            } else {
                FieldValue::List(parts)
            }
        }
        other => other,
    }
}

/// Replace a composite column with a list of part objects under its target name
fn expand_composite(record: &mut Record, composite: &CompositeField, list_separator: &str) {
    let Some(raw) = record.remove(&composite.field) else {
        return;
    };
    let expanded = match raw {
        FieldValue::Str(s) if !s.is_empty() => FieldValue::List(
            s.split(list_separator)
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    let mut pieces = entry.split(composite.separator.as_str());
                    let object: Record = composite
                        .parts
                        .iter()
                        .map(|part| {
                            let value = pieces
                                .next()
                                .map(FieldValue::from)
                                .unwrap_or(FieldValue::Null);
                            (part.clone(), value)
                        })
                        .collect();
                    FieldValue::Object(object)
                })
                .collect(),
        ),
        _ => FieldValue::Null,
    };
    record.insert(composite.target.clone(), expanded);
}
