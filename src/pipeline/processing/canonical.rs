use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::config::IdentifierRule;
use crate::constants::{DIRECTION, DIRECTION_A_TO_B, DIRECTION_B_TO_A, INTERACTOR_A, INTERACTOR_B};
use crate::pipeline::processing::record::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentifierValue {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for IdentifierValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierValue::Numeric(i) => write!(f, "{}", i),
            IdentifierValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A typed identifier for one interactor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InteractorKey {
    pub namespace: String,
    pub id: IdentifierValue,
}

impl InteractorKey {
    pub fn new(namespace: &str, id: IdentifierValue) -> Self {
        Self {
            namespace: namespace.to_string(),
            id,
        }
    }

    /// Namespace first, then id: numerically when both ids are numeric,
    /// otherwise by their text. Antisymmetric, so pair ordering is commutative.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.namespace.cmp(&other.namespace).then_with(|| match (&self.id, &other.id) {
            (IdentifierValue::Numeric(a), IdentifierValue::Numeric(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        })
    }
}

impl fmt::Display for InteractorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// `{ns_low}:{id_low}-{ns_high}:{id_high}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn from_keys(low: &InteractorKey, high: &InteractorKey) -> Self {
        CanonicalId(format!("{}-{}", low, high))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    AToB,
    BToA,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::AToB => DIRECTION_A_TO_B,
            Direction::BToA => DIRECTION_B_TO_A,
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            Direction::AToB => Direction::BToA,
            Direction::BToA => Direction::AToB,
        }
    }
}

/// Why a record produced no canonical id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The interactor group is missing or not an object
    MissingInteractor(&'static str),
    /// No identifier rule found a usable value on this side
    UnresolvedIdentifier(&'static str),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingInteractor(side) => write!(f, "missing {}", side),
            SkipReason::UnresolvedIdentifier(side) => {
                write!(f, "no usable identifier for {}", side)
            }
        }
    }
}

/// A record with its canonical id, orientation set and interactors ordered
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPair {
    pub id: CanonicalId,
    pub direction: Direction,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairResolution {
    Resolved(CanonicalPair),
    Skipped(SkipReason),
}

/// Assigns canonical pair ids and orders interactors so `interactor_a`
/// is always the lower side
pub struct PairCanonicalizer {
    rules_a: Vec<IdentifierRule>,
    rules_b: Vec<IdentifierRule>,
}

impl PairCanonicalizer {
    pub fn new(rules_a: Vec<IdentifierRule>, rules_b: Vec<IdentifierRule>) -> Self {
        Self { rules_a, rules_b }
    }

    pub fn canonicalize(&self, mut record: Record) -> PairResolution {
        let key_a = match interactor(&record, INTERACTOR_A) {
            Some(side) => resolve_key(side, &self.rules_a),
            None => return PairResolution::Skipped(SkipReason::MissingInteractor(INTERACTOR_A)),
        };
        let key_b = match interactor(&record, INTERACTOR_B) {
            Some(side) => resolve_key(side, &self.rules_b),
            None => return PairResolution::Skipped(SkipReason::MissingInteractor(INTERACTOR_B)),
        };
        let Some(key_a) = key_a else {
            return PairResolution::Skipped(SkipReason::UnresolvedIdentifier(INTERACTOR_A));
        };
        let Some(key_b) = key_b else {
            return PairResolution::Skipped(SkipReason::UnresolvedIdentifier(INTERACTOR_B));
        };

        let (id, direction) = canonical_id(&key_a, &key_b);

        if direction == Direction::BToA {
            let a = record.remove(INTERACTOR_A);
            let b = record.remove(INTERACTOR_B);
            if let Some(b) = b {
                record.insert(INTERACTOR_A.to_string(), b);
            }
            if let Some(a) = a {
                record.insert(INTERACTOR_B.to_string(), a);
            }
        }
        record.insert(DIRECTION.to_string(), FieldValue::from(direction.as_str()));

        PairResolution::Resolved(CanonicalPair {
            id,
            direction,
            record,
        })
    }
}

/// Order two keys; `A->B` only when side A is strictly the lower one
pub fn canonical_id(key_a: &InteractorKey, key_b: &InteractorKey) -> (CanonicalId, Direction) {
    if key_a.canonical_cmp(key_b) == Ordering::Less {
        (CanonicalId::from_keys(key_a, key_b), Direction::AToB)
    } else {
        (CanonicalId::from_keys(key_b, key_a), Direction::BToA)
    }
}

fn interactor<'a>(record: &'a Record, side: &str) -> Option<&'a Record> {
    record.get(side).and_then(|v| v.as_object())
}

/// First rule with a usable value wins
pub fn resolve_key(side: &Record, rules: &[IdentifierRule]) -> Option<InteractorKey> {
    rules.iter().find_map(|rule| {
        let id = match side.get(&rule.field)? {
            FieldValue::Int(i) => IdentifierValue::Numeric(*i),
            FieldValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if rule.numeric {
                    IdentifierValue::Numeric(trimmed.parse::<i64>().ok()?)
                } else {
                    IdentifierValue::Text(trimmed.to_string())
                }
            }
            _ => return None,
        };
        Some(InteractorKey::new(&rule.namespace, id))
    })
}
