//! Inferring column types from sample records.
//!
//! For every field we collect the set of value kinds seen across all records, then widen that set to one
//! [ColumnType] by walking [WIDENING_RULES] in order.  A record which doesn't have a field contributes nothing for it;
//! an explicit null is an observation of kind null.  Fields come out in the order they were first seen.
use std::collections::{BTreeMap, BTreeSet};

use crate::value::{Record, ValueKind};

/// Types of a table's columns.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ColumnType {
    /// A 64-bit signed integer.  Booleans are stored as these.
    Integer,
    /// A double.
    Float,
    /// A string.
    Text,
}

/// Column types keyed by field name, kept in insertion order.
///
/// The order is the order columns get created in.  Two `ColumnTypes` are equal if they map the same names to the same
/// types, whatever the order.
#[derive(Clone, Debug, Default)]
pub struct ColumnTypes {
    entries: Vec<(String, ColumnType)>,
}

impl ColumnTypes {
    pub fn new() -> ColumnTypes {
        Default::default()
    }

    /// Set a column's type, returning the old one.  Replacing keeps the column's position.
    pub fn insert(&mut self, name: impl Into<String>, column_type: ColumnType) -> Option<ColumnType> {
        let name = name.into();
        if let Some(e) = self.entries.iter_mut().find(|e| e.0 == name) {
            return Some(std::mem::replace(&mut e.1, column_type));
        }
        self.entries.push((name, column_type));
        None
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.entries.iter().find(|e| e.0 == name).map(|e| e.1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.0.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.entries.iter().map(|e| (e.0.as_str(), e.1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for ColumnTypes {
    fn eq(&self, other: &ColumnTypes) -> bool {
        self.len() == other.len() && self.iter().all(|(n, t)| other.get(n) == Some(t))
    }
}

impl Eq for ColumnTypes {}

impl<K: Into<String>> FromIterator<(K, ColumnType)> for ColumnTypes {
    fn from_iter<I: IntoIterator<Item = (K, ColumnType)>>(iter: I) -> Self {
        let mut types = ColumnTypes::new();
        for (k, t) in iter {
            types.insert(k, t);
        }
        types
    }
}

impl ColumnType {
    /// The type keyword used in `CREATE TABLE`.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "TEXT",
        }
    }

    /// The column type for a field where only this kind was seen.
    pub fn for_kind(kind: ValueKind) -> ColumnType {
        match kind {
            ValueKind::Boolean | ValueKind::Integer => ColumnType::Integer,
            ValueKind::Float => ColumnType::Float,
            ValueKind::Null | ValueKind::Text => ColumnType::Text,
        }
    }
}

/// One step of the widening policy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum WideningRule {
    /// Exactly one kind was seen.
    SingleKind,
    /// Only integers and booleans.
    IntegerLike,
    /// Only integers, booleans, and floats.
    Numeric,
    /// Anything else, including any null mixed with something.
    Fallback,
}

/// Evaluated in order; the first rule which applies wins.  `Fallback` always applies, so it must stay last.
const WIDENING_RULES: &[WideningRule] = &[
    WideningRule::SingleKind,
    WideningRule::IntegerLike,
    WideningRule::Numeric,
    WideningRule::Fallback,
];

fn all_within(kinds: &BTreeSet<ValueKind>, allowed: &[ValueKind]) -> bool {
    kinds.iter().all(|k| allowed.contains(k))
}

impl WideningRule {
    fn apply(&self, kinds: &BTreeSet<ValueKind>) -> Option<ColumnType> {
        match self {
            WideningRule::SingleKind if kinds.len() == 1 => {
                kinds.iter().next().copied().map(ColumnType::for_kind)
            }
            WideningRule::IntegerLike
                if all_within(kinds, &[ValueKind::Integer, ValueKind::Boolean]) =>
            {
                Some(ColumnType::Integer)
            }
            WideningRule::Numeric
                if all_within(
                    kinds,
                    &[ValueKind::Integer, ValueKind::Float, ValueKind::Boolean],
                ) =>
            {
                Some(ColumnType::Float)
            }
            WideningRule::Fallback => Some(ColumnType::Text),
            _ => None,
        }
    }
}

/// Widen a set of observed kinds to a single column type.
pub fn widen(kinds: &BTreeSet<ValueKind>) -> ColumnType {
    WIDENING_RULES
        .iter()
        .find_map(|r| r.apply(kinds))
        .unwrap_or(ColumnType::Text)
}

/// Determine one column type for every field which appears in any of `records`.
///
/// Which type each field gets doesn't depend on the order of the records; only the order of the fields does, which
/// is the order they first appear in.  No records means no columns.
pub fn infer_column_types<'a>(records: impl IntoIterator<Item = &'a Record>) -> ColumnTypes {
    // Field name to its slot in `observed`.
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut observed: Vec<(&str, BTreeSet<ValueKind>)> = vec![];

    for r in records {
        for (name, value) in r.iter() {
            let slot = *index.entry(name).or_insert_with(|| {
                observed.push((name, BTreeSet::new()));
                observed.len() - 1
            });
            observed[slot].1.insert(value.kind());
        }
    }

    observed
        .into_iter()
        .map(|(name, kinds)| (name, widen(&kinds)))
        .collect()
}
