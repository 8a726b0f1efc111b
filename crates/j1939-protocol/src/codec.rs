//! Signal codec
//!
//! Converts between raw bus values and engineering units, and between raw
//! codes and discrete labels.
//!
//! Numeric conversion is linear: `decoded = raw * scale + offset`. Encoding
//! inverts it and rounds to the nearest integer with
//! [`f64::round_ties_even`], so ties go to the even neighbour (`0.5 -> 0`,
//! `1.5 -> 2`, `2.5 -> 2`, `-0.5 -> 0`).
//!
//! Discrete (ENUM) signals have no scale at all: the catalog represents them
//! as [`SignalEncoding::Discrete`], so the numeric functions below can only be
//! reached with a real scale.

use std::collections::BTreeMap;

/// Decode a raw value into engineering units
pub fn decode(raw: u32, scale: f64, offset: f64) -> f64 {
    raw as f64 * scale + offset
}

/// Encode an engineering-unit value into a raw value
///
/// The result may be negative or exceed the field width when `decoded` lies
/// outside the signal's range; callers check it against the field.
pub fn encode(decoded: f64, scale: f64, offset: f64) -> i64 {
    ((decoded - offset) / scale).round_ties_even() as i64
}

/// Look up the label for a raw code, or `""` for an unallocated code
pub fn get_label(values: &DiscreteValues, raw: u32) -> &str {
    values.get(raw).unwrap_or("")
}

/// Find the first raw code whose label equals `label`
///
/// Several codes may share a label, so this is not guaranteed to invert
/// [`get_label`].
pub fn get_label_value(values: &DiscreteValues, label: &str) -> Option<u32> {
    values
        .iter()
        .find(|(_, candidate)| *candidate == label)
        .map(|(raw, _)| raw)
}

/// Scale and offset of a continuous signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    /// Resolution per bit
    pub scale: f64,
    /// Value added after scaling
    pub offset: f64,
}

impl LinearScale {
    /// Create a new scale
    pub fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    /// Decode a raw value
    pub fn decode(&self, raw: u32) -> f64 {
        decode(raw, self.scale, self.offset)
    }

    /// Encode a decoded value
    pub fn encode(&self, decoded: f64) -> i64 {
        encode(decoded, self.scale, self.offset)
    }

    /// Number of decimal places implied by the scale (`0.125` -> 3, `2` -> 0)
    pub fn decimals(&self) -> usize {
        let text = self.scale.to_string();
        match text.split_once('.') {
            Some((_, fraction)) => fraction.len(),
            None => 0,
        }
    }
}

/// Raw code to label table of a discrete signal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscreteValues {
    labels: BTreeMap<u32, String>,
}

impl DiscreteValues {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the label for a raw code
    pub fn insert(&mut self, raw: u32, label: impl Into<String>) {
        self.labels.insert(raw, label.into());
    }

    /// Label for a raw code, if allocated
    pub fn get(&self, raw: u32) -> Option<&str> {
        self.labels.get(&raw).map(String::as_str)
    }

    /// Iterate `(raw, label)` pairs in ascending raw order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.labels.iter().map(|(raw, label)| (*raw, label.as_str()))
    }

    /// All labels in ascending raw order (the operator's option list)
    pub fn labels(&self) -> Vec<&str> {
        self.labels.values().map(String::as_str).collect()
    }

    /// Number of allocated codes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no codes are allocated
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(u32, String)> for DiscreteValues {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// How a signal's raw value maps to something an operator understands
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEncoding {
    /// Continuous value with scale and offset
    Linear(LinearScale),
    /// Discrete codes with text labels
    Discrete(DiscreteValues),
}

impl SignalEncoding {
    /// Whether this is a discrete (ENUM) signal
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Discrete(_))
    }
}
