//! Protocol catalog
//!
//! The catalog describes every Parameter Group (PGN) this node can transmit
//! and the signals (SPNs) inside it. It is produced offline from the J1939
//! Digital Annex, loaded once at startup and never mutated afterwards.
//!
//! Records are validated into typed [`PgnSpec`]/[`SpnSpec`] values at load
//! time. A malformed PGN fails the load; an SPN this crate cannot transmit
//! (ASCII or binary data, odd bit lengths, missing position) is left out and
//! listed in [`ProtocolCatalog::rejected_spns`].

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::{debug, info};

use crate::codec::{DiscreteValues, LinearScale, SignalEncoding};
use crate::error::{CatalogError, CodecError};
use crate::layout::FieldLayout;

/// Payload length used for PGNs whose length is "Variable"
pub const VARIABLE_LENGTH_FALLBACK: usize = 8;

/// Priority used when a PGN record has none
pub const DEFAULT_PRIORITY: u8 = 6;

/// Transmission period used when a PGN record has none
pub const DEFAULT_TX_PERIOD: Duration = Duration::from_millis(5000);

/// Largest single-frame payload
pub const MAX_PAYLOAD_LEN: usize = 8;

// ============================================================================
// Typed specs
// ============================================================================

/// One signal inside a PGN
#[derive(Debug, Clone, PartialEq)]
pub struct SpnSpec {
    /// Suspect Parameter Number
    pub spn: u32,
    /// Signal name
    pub name: String,
    /// Position within the payload
    pub layout: FieldLayout,
    /// Numeric scale or discrete labels
    pub encoding: SignalEncoding,
    /// Smallest valid decoded value
    pub min_value: Option<f64>,
    /// Largest valid decoded value
    pub max_value: Option<f64>,
    /// Engineering unit (may be empty)
    pub unit: String,
}

impl SpnSpec {
    /// Create a continuous signal
    pub fn linear(spn: u32, name: impl Into<String>, layout: FieldLayout, scale: LinearScale) -> Self {
        Self {
            spn,
            name: name.into(),
            layout,
            encoding: SignalEncoding::Linear(scale),
            min_value: None,
            max_value: None,
            unit: String::new(),
        }
    }

    /// Create a discrete signal
    pub fn discrete(
        spn: u32,
        name: impl Into<String>,
        layout: FieldLayout,
        values: DiscreteValues,
    ) -> Self {
        Self {
            spn,
            name: name.into(),
            layout,
            encoding: SignalEncoding::Discrete(values),
            min_value: None,
            max_value: None,
            unit: String::new(),
        }
    }

    /// Set the valid decoded range
    pub fn with_range(mut self, min_value: f64, max_value: f64) -> Self {
        self.min_value = Some(min_value);
        self.max_value = Some(max_value);
        self
    }

    /// Set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Bit length of the field
    pub fn length_bits(&self) -> u8 {
        self.layout.length()
    }

    /// Whether this is a discrete (ENUM) signal
    pub fn is_discrete(&self) -> bool {
        self.encoding.is_discrete()
    }

    /// Numeric scale, if this is a continuous signal
    pub fn scale(&self) -> Option<LinearScale> {
        match &self.encoding {
            SignalEncoding::Linear(scale) => Some(*scale),
            SignalEncoding::Discrete(_) => None,
        }
    }

    /// Label table, if this is a discrete signal
    pub fn discrete_values(&self) -> Option<&DiscreteValues> {
        match &self.encoding {
            SignalEncoding::Linear(_) => None,
            SignalEncoding::Discrete(values) => Some(values),
        }
    }

    /// Largest raw value the field can hold
    pub fn max_raw(&self) -> u32 {
        self.layout.max_raw()
    }

    /// Decode a raw value into engineering units
    pub fn decode(&self, raw: u32) -> Result<f64, CodecError> {
        self.scale()
            .map(|scale| scale.decode(raw))
            .ok_or(CodecError::NotNumeric { spn: self.spn })
    }

    /// Encode an engineering-unit value into a raw value
    pub fn encode(&self, decoded: f64) -> Result<i64, CodecError> {
        self.scale()
            .map(|scale| scale.encode(decoded))
            .ok_or(CodecError::NotNumeric { spn: self.spn })
    }

    /// Label for a raw code (`""` when the code is unallocated)
    pub fn label(&self, raw: u32) -> Result<&str, CodecError> {
        self.discrete_values()
            .map(|values| crate::codec::get_label(values, raw))
            .ok_or(CodecError::NotDiscrete { spn: self.spn })
    }

    /// First raw code carrying `label`
    pub fn label_value(&self, label: &str) -> Result<u32, CodecError> {
        let values = self
            .discrete_values()
            .ok_or(CodecError::NotDiscrete { spn: self.spn })?;
        crate::codec::get_label_value(values, label).ok_or_else(|| CodecError::LabelNotFound {
            spn: self.spn,
            label: label.to_string(),
        })
    }

    /// Raw values an operator may select
    ///
    /// For continuous signals this is the encoded `min_value..=max_value`,
    /// clamped to the field width; for discrete signals the whole field.
    pub fn raw_range(&self) -> RangeInclusive<u32> {
        let max_raw = self.max_raw();
        let Some(scale) = self.scale() else {
            return 0..=max_raw;
        };

        let clamp = |raw: i64| raw.clamp(0, max_raw as i64) as u32;
        let low = self.min_value.map(|v| clamp(scale.encode(v))).unwrap_or(0);
        let high = self
            .max_value
            .map(|v| clamp(scale.encode(v)))
            .unwrap_or(max_raw);

        if low <= high {
            low..=high
        } else {
            high..=low
        }
    }
}

/// One Parameter Group
#[derive(Debug, Clone, PartialEq)]
pub struct PgnSpec {
    /// Parameter Group Number
    pub pgn: u32,
    /// Parameter group label
    pub label: String,
    /// Short acronym (e.g. "EEC1")
    pub acronym: String,
    /// Default priority (0-7)
    pub priority: u8,
    /// Payload length in bytes (1-8)
    pub length: usize,
    /// Default transmission period
    pub period: Duration,
    spns: BTreeMap<u32, SpnSpec>,
}

impl PgnSpec {
    /// Create a PGN with no signals
    pub fn new(pgn: u32, priority: u8, length: usize, period: Duration) -> Result<Self, CatalogError> {
        if priority > crate::can_id::MAX_PRIORITY {
            return Err(CatalogError::InvalidPgn {
                pgn,
                reason: format!("priority {} out of range 0-7", priority),
            });
        }
        if length == 0 || length > MAX_PAYLOAD_LEN {
            return Err(CatalogError::InvalidPgn {
                pgn,
                reason: format!("payload length {} out of range 1-8", length),
            });
        }
        if pgn > crate::can_id::MAX_PGN {
            return Err(CatalogError::InvalidPgn {
                pgn,
                reason: "PGN does not fit in 18 bits".to_string(),
            });
        }
        Ok(Self {
            pgn,
            label: String::new(),
            acronym: String::new(),
            priority,
            length,
            period,
            spns: BTreeMap::new(),
        })
    }

    /// Set the label and acronym
    pub fn with_names(mut self, label: impl Into<String>, acronym: impl Into<String>) -> Self {
        self.label = label.into();
        self.acronym = acronym.into();
        self
    }

    /// Add a signal, checking that it fits in the payload
    pub fn add_spn(&mut self, spec: SpnSpec) -> Result<(), CatalogError> {
        if spec.layout.end_bit() > self.length * 8 {
            return Err(CatalogError::InvalidSpn {
                pgn: self.pgn,
                spn: spec.spn,
                reason: format!(
                    "field ends at bit {} but payload is {} bytes",
                    spec.layout.end_bit(),
                    self.length
                ),
            });
        }
        self.spns.insert(spec.spn, spec);
        Ok(())
    }

    /// Builder form of [`PgnSpec::add_spn`]
    pub fn with_spn(mut self, spec: SpnSpec) -> Result<Self, CatalogError> {
        self.add_spn(spec)?;
        Ok(self)
    }

    /// Look up a signal
    pub fn spn(&self, spn: u32) -> Option<&SpnSpec> {
        self.spns.get(&spn)
    }

    /// Signals in ascending SPN order
    pub fn spns(&self) -> impl Iterator<Item = &SpnSpec> {
        self.spns.values()
    }

    /// SPN numbers in ascending order
    pub fn spn_numbers(&self) -> Vec<u32> {
        self.spns.keys().copied().collect()
    }
}

/// An SPN left out of the catalog and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSpn {
    /// Parameter group the SPN belongs to
    pub pgn: u32,
    /// Rejected SPN
    pub spn: u32,
    /// Why it cannot be transmitted
    pub reason: String,
}

/// A PGN left out of the catalog and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPgn {
    /// Rejected PGN
    pub pgn: u32,
    /// Why it cannot be transmitted as a single frame
    pub reason: String,
}

/// Read-only lookup table of PGNs and SPNs
#[derive(Debug, Clone, Default)]
pub struct ProtocolCatalog {
    pgns: BTreeMap<u32, PgnSpec>,
    rejected: Vec<RejectedSpn>,
    rejected_pgns: Vec<RejectedPgn>,
}

impl ProtocolCatalog {
    /// Build a catalog from already validated PGNs
    pub fn from_pgns(pgns: impl IntoIterator<Item = PgnSpec>) -> Self {
        Self {
            pgns: pgns.into_iter().map(|spec| (spec.pgn, spec)).collect(),
            rejected: Vec::new(),
            rejected_pgns: Vec::new(),
        }
    }

    /// Validate raw records into a catalog
    pub fn from_records(records: BTreeMap<u32, PgnRecord>) -> Result<Self, CatalogError> {
        let mut pgns = BTreeMap::new();
        let mut rejected = Vec::new();
        let mut rejected_pgns = Vec::new();

        for (pgn, record) in records {
            if let Some(DataLengthRecord::Bytes(length)) = record.data_length {
                if length > MAX_PAYLOAD_LEN as u64 {
                    debug!("Rejecting PGN {}: {} byte multi-packet payload", pgn, length);
                    rejected_pgns.push(RejectedPgn {
                        pgn,
                        reason: format!(
                            "data length {} exceeds a single {} byte frame",
                            length, MAX_PAYLOAD_LEN
                        ),
                    });
                    continue;
                }
            }
            let mut spec = record.to_spec(pgn)?;
            for (spn, spn_record) in record.spns {
                let result = spn_record
                    .to_spec(pgn, spn)
                    .and_then(|spn_spec| spec.add_spn(spn_spec));
                if let Err(e) = result {
                    debug!("Rejecting SPN {} of PGN {}: {}", spn, pgn, e);
                    rejected.push(RejectedSpn {
                        pgn,
                        spn,
                        reason: e.to_string(),
                    });
                }
            }
            pgns.insert(pgn, spec);
        }

        info!(
            "Loaded protocol catalog: {} PGNs ({} rejected), {} SPNs ({} rejected)",
            pgns.len(),
            rejected_pgns.len(),
            pgns.values().map(|p: &PgnSpec| p.spns.len()).sum::<usize>(),
            rejected.len()
        );

        Ok(Self {
            pgns,
            rejected,
            rejected_pgns,
        })
    }

    /// Parse and validate a catalog JSON document
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let records: BTreeMap<u32, PgnRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Read, parse and validate a catalog JSON file
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        debug!("Loading protocol catalog from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Look up a PGN
    pub fn get(&self, pgn: u32) -> Option<&PgnSpec> {
        self.pgns.get(&pgn)
    }

    /// Look up an SPN within a PGN
    pub fn spn(&self, pgn: u32, spn: u32) -> Option<&SpnSpec> {
        self.pgns.get(&pgn).and_then(|p| p.spn(spn))
    }

    /// PGNs in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &PgnSpec> {
        self.pgns.values()
    }

    /// Number of PGNs
    pub fn len(&self) -> usize {
        self.pgns.len()
    }

    /// Whether the catalog has no PGNs
    pub fn is_empty(&self) -> bool {
        self.pgns.is_empty()
    }

    /// SPNs that were left out at load time
    pub fn rejected_spns(&self) -> &[RejectedSpn] {
        &self.rejected
    }

    /// PGNs that were left out at load time
    pub fn rejected_pgns(&self) -> &[RejectedPgn] {
        &self.rejected_pgns
    }
}

// ============================================================================
// Records as emitted by the Digital Annex conversion
// ============================================================================

/// "PGN Data Length": a byte count or the text "Variable"
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DataLengthRecord {
    /// Fixed length in bytes
    Bytes(u64),
    /// Textual length such as "Variable"
    Text(String),
}

/// SPN scale: a number, or a keyword such as "ENUM" or "ASCII"
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ScaleRecord {
    /// Numeric resolution per bit
    Number(f64),
    /// Non-numeric scale keyword
    Keyword(String),
}

/// A discrete value's label text; duplicate descriptions arrive as a list
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum LabelRecord {
    /// Single label
    One(String),
    /// Several description lines for the same code
    Many(Vec<String>),
}

impl LabelRecord {
    fn into_label(self) -> String {
        match self {
            Self::One(label) => label,
            Self::Many(labels) => labels.join("; "),
        }
    }
}

/// One PGN as stored in the catalog document
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PgnRecord {
    /// Parameter group label
    #[cfg_attr(feature = "serde", serde(rename = "Parameter Group Label", default))]
    pub label: Option<String>,
    /// Acronym
    #[cfg_attr(feature = "serde", serde(rename = "Acronym", default))]
    pub acronym: Option<String>,
    /// Payload length
    #[cfg_attr(feature = "serde", serde(rename = "PGN Data Length", default))]
    pub data_length: Option<DataLengthRecord>,
    /// Default priority
    #[cfg_attr(feature = "serde", serde(rename = "Default Priority", default))]
    pub default_priority: Option<u64>,
    /// Transmission period in milliseconds
    #[cfg_attr(feature = "serde", serde(default))]
    pub transmission_rate_ms: Option<u64>,
    /// Signals keyed by SPN
    #[cfg_attr(feature = "serde", serde(rename = "SPNs", default))]
    pub spns: BTreeMap<u32, SpnRecord>,
}

impl PgnRecord {
    fn to_spec(&self, pgn: u32) -> Result<PgnSpec, CatalogError> {
        let length = match &self.data_length {
            Some(DataLengthRecord::Bytes(n)) => *n as usize,
            Some(DataLengthRecord::Text(text)) if text.eq_ignore_ascii_case("variable") => {
                VARIABLE_LENGTH_FALLBACK
            }
            Some(DataLengthRecord::Text(text)) => {
                return Err(CatalogError::InvalidPgn {
                    pgn,
                    reason: format!("unrecognised data length {:?}", text),
                })
            }
            None => VARIABLE_LENGTH_FALLBACK,
        };
        let priority = match self.default_priority {
            Some(p) if p <= crate::can_id::MAX_PRIORITY as u64 => p as u8,
            Some(p) => {
                return Err(CatalogError::InvalidPgn {
                    pgn,
                    reason: format!("priority {} out of range 0-7", p),
                })
            }
            None => DEFAULT_PRIORITY,
        };
        let period = self
            .transmission_rate_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TX_PERIOD);

        Ok(PgnSpec::new(pgn, priority, length, period)?.with_names(
            self.label.clone().unwrap_or_default(),
            self.acronym.clone().unwrap_or_default(),
        ))
    }
}

/// One SPN as stored in the catalog document
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpnRecord {
    /// Signal name
    #[cfg_attr(feature = "serde", serde(rename = "SPN Name", default))]
    pub name: Option<String>,
    /// Zero-based start byte
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_byte: Option<u64>,
    /// Zero-based start bit within the start byte
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_bit: Option<u64>,
    /// Field width in bits
    #[cfg_attr(feature = "serde", serde(default))]
    pub length_bits: Option<u64>,
    /// Resolution per bit or scale keyword
    #[cfg_attr(feature = "serde", serde(default))]
    pub scale: Option<ScaleRecord>,
    /// Offset
    #[cfg_attr(feature = "serde", serde(default))]
    pub offset: Option<f64>,
    /// Data range minimum
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_value: Option<f64>,
    /// Data range maximum
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_value: Option<f64>,
    /// Operational range minimum (overrides `min_value`)
    #[cfg_attr(feature = "serde", serde(default))]
    pub op_min_value: Option<f64>,
    /// Operational range maximum (overrides `max_value`)
    #[cfg_attr(feature = "serde", serde(default))]
    pub op_max_value: Option<f64>,
    /// Engineering unit
    #[cfg_attr(feature = "serde", serde(default))]
    pub unit: Option<String>,
    /// Discrete labels keyed by raw code
    #[cfg_attr(feature = "serde", serde(default))]
    pub discrete_values: Option<BTreeMap<u32, Option<LabelRecord>>>,
}

impl SpnRecord {
    fn to_spec(&self, pgn: u32, spn: u32) -> Result<SpnSpec, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidSpn { pgn, spn, reason };

        let (Some(start_byte), Some(length)) = (self.start_byte, self.length_bits) else {
            return Err(invalid("missing position or length".to_string()));
        };
        if start_byte >= MAX_PAYLOAD_LEN as u64 {
            return Err(invalid(format!(
                "start byte {} outside a {} byte payload",
                start_byte, MAX_PAYLOAD_LEN
            )));
        }
        let start_bit = self.start_bit.unwrap_or(0);
        if start_bit > 7 || length > u8::MAX as u64 {
            return Err(invalid(format!(
                "start bit {} / length {} out of range",
                start_bit, length
            )));
        }
        let layout = FieldLayout::new(start_byte as usize, start_bit as u8, length as u8)
            .map_err(|e| invalid(e.to_string()))?;

        let encoding = match &self.scale {
            None => SignalEncoding::Linear(LinearScale::new(1.0, self.offset.unwrap_or(0.0))),
            Some(ScaleRecord::Number(scale)) if *scale != 0.0 && scale.is_finite() => {
                SignalEncoding::Linear(LinearScale::new(*scale, self.offset.unwrap_or(0.0)))
            }
            Some(ScaleRecord::Number(scale)) => {
                return Err(invalid(format!("unusable scale {}", scale)))
            }
            Some(ScaleRecord::Keyword(keyword)) if keyword == "ENUM" => {
                SignalEncoding::Discrete(
                    self.discrete_values
                        .clone()
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|(raw, label)| Some((raw, label?.into_label())))
                        .collect(),
                )
            }
            Some(ScaleRecord::Keyword(keyword)) => {
                return Err(invalid(format!("non-numeric scale {}", keyword)))
            }
        };

        Ok(SpnSpec {
            spn,
            name: self.name.clone().unwrap_or_default(),
            layout,
            encoding,
            min_value: self.op_min_value.or(self.min_value),
            max_value: self.op_max_value.or(self.max_value),
            unit: self.unit.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_temperature() -> SpnSpec {
        SpnSpec::linear(
            110,
            "Engine Coolant Temperature",
            FieldLayout::new(0, 0, 8).unwrap(),
            LinearScale::new(1.0, -40.0),
        )
        .with_range(-40.0, 210.0)
        .with_unit("°C")
    }

    fn switch() -> SpnSpec {
        let values = [(0, "Off".to_string()), (1, "On".to_string())]
            .into_iter()
            .collect();
        SpnSpec::discrete(
            1081,
            "Wait to Start Lamp",
            FieldLayout::new(1, 0, 2).unwrap(),
            values,
        )
    }

    #[test]
    fn test_numeric_operation_on_enum_fails_fast() {
        let spec = switch();
        assert_eq!(spec.decode(1), Err(CodecError::NotNumeric { spn: 1081 }));
        assert_eq!(spec.encode(1.0), Err(CodecError::NotNumeric { spn: 1081 }));
    }

    #[test]
    fn test_label_operation_on_numeric_fails() {
        let spec = engine_temperature();
        assert_eq!(spec.label(0), Err(CodecError::NotDiscrete { spn: 110 }));
    }

    #[test]
    fn test_spn_level_codec() {
        let temp = engine_temperature();
        assert_eq!(temp.decode(40), Ok(0.0));
        assert_eq!(temp.encode(-38.0), Ok(2));

        let lamp = switch();
        assert_eq!(lamp.label(1), Ok("On"));
        assert_eq!(lamp.label(3), Ok(""));
        assert_eq!(lamp.label_value("Off"), Ok(0));
        assert_eq!(
            lamp.label_value("Blinking"),
            Err(CodecError::LabelNotFound {
                spn: 1081,
                label: "Blinking".to_string()
            })
        );
    }

    #[test]
    fn test_raw_range() {
        assert_eq!(engine_temperature().raw_range(), 0..=250);
        assert_eq!(switch().raw_range(), 0..=3);

        // range wider than the field is clamped
        let wide = engine_temperature().with_range(-100.0, 1000.0);
        assert_eq!(wide.raw_range(), 0..=255);
    }

    #[test]
    fn test_pgn_rejects_field_overflowing_payload() {
        let mut pgn = PgnSpec::new(65262, 6, 2, Duration::from_secs(1)).unwrap();
        let late = SpnSpec::linear(
            175,
            "Engine Oil Temperature 1",
            FieldLayout::new(1, 0, 16).unwrap(),
            LinearScale::new(0.03125, -273.0),
        );
        assert!(matches!(
            pgn.add_spn(late),
            Err(CatalogError::InvalidSpn { pgn: 65262, spn: 175, .. })
        ));
    }

    #[test]
    fn test_pgn_validation() {
        assert!(PgnSpec::new(61444, 8, 8, DEFAULT_TX_PERIOD).is_err());
        assert!(PgnSpec::new(61444, 3, 0, DEFAULT_TX_PERIOD).is_err());
        assert!(PgnSpec::new(61444, 3, 9, DEFAULT_TX_PERIOD).is_err());
        assert!(PgnSpec::new(0x4_0000, 3, 8, DEFAULT_TX_PERIOD).is_err());
        assert!(PgnSpec::new(61444, 3, 8, DEFAULT_TX_PERIOD).is_ok());
    }

    #[test]
    fn test_catalog_lookup() {
        let pgn = PgnSpec::new(65262, 6, 8, Duration::from_secs(1))
            .unwrap()
            .with_spn(engine_temperature())
            .unwrap();
        let catalog = ProtocolCatalog::from_pgns([pgn]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(65262).is_some());
        assert_eq!(catalog.spn(65262, 110).map(|s| s.unit.as_str()), Some("°C"));
        assert!(catalog.spn(65262, 999).is_none());
        assert!(catalog.get(61444).is_none());

        let listed: Vec<(u32, Vec<bool>)> = catalog
            .iter()
            .map(|p| (p.pgn, p.spns().map(SpnSpec::is_discrete).collect()))
            .collect();
        assert_eq!(listed, vec![(65262, vec![false])]);
    }

    #[test]
    fn test_records_defaults_and_rejections() {
        let mut spns = BTreeMap::new();
        spns.insert(
            190,
            SpnRecord {
                name: Some("Engine Speed".into()),
                start_byte: Some(3),
                start_bit: Some(0),
                length_bits: Some(16),
                scale: Some(ScaleRecord::Number(0.125)),
                offset: Some(0.0),
                min_value: Some(0.0),
                max_value: Some(8031.875),
                unit: Some("rpm".into()),
                ..Default::default()
            },
        );
        spns.insert(
            1675,
            SpnRecord {
                start_byte: Some(7),
                start_bit: Some(0),
                length_bits: Some(4),
                scale: Some(ScaleRecord::Keyword("ASCII".into())),
                ..Default::default()
            },
        );
        spns.insert(
            2432,
            SpnRecord {
                start_byte: Some(0),
                length_bits: Some(12),
                ..Default::default()
            },
        );
        let mut records = BTreeMap::new();
        records.insert(
            61444,
            PgnRecord {
                acronym: Some("EEC1".into()),
                data_length: Some(DataLengthRecord::Text("Variable".into())),
                spns,
                ..Default::default()
            },
        );

        let catalog = ProtocolCatalog::from_records(records).unwrap();
        let eec1 = catalog.get(61444).unwrap();

        assert_eq!(eec1.length, VARIABLE_LENGTH_FALLBACK);
        assert_eq!(eec1.priority, DEFAULT_PRIORITY);
        assert_eq!(eec1.period, DEFAULT_TX_PERIOD);
        assert_eq!(eec1.spn_numbers(), vec![190]);

        let rejected: Vec<u32> = catalog.rejected_spns().iter().map(|r| r.spn).collect();
        assert_eq!(rejected, vec![1675, 2432]);
    }

    #[test]
    fn test_records_skip_multi_packet_pgn() {
        let mut records = BTreeMap::new();
        records.insert(
            65251,
            PgnRecord {
                acronym: Some("EC1".into()),
                data_length: Some(DataLengthRecord::Bytes(39)),
                ..Default::default()
            },
        );
        records.insert(
            65262,
            PgnRecord {
                acronym: Some("ET1".into()),
                data_length: Some(DataLengthRecord::Bytes(8)),
                ..Default::default()
            },
        );

        let catalog = ProtocolCatalog::from_records(records).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(65262).is_some());
        assert!(catalog.get(65251).is_none());

        let rejected: Vec<u32> = catalog.rejected_pgns().iter().map(|r| r.pgn).collect();
        assert_eq!(rejected, vec![65251]);
        assert!(catalog.rejected_spns().is_empty());
    }

    #[test]
    fn test_records_reject_start_byte_past_payload() {
        let mut spns = BTreeMap::new();
        for (spn, start_byte) in [(110, 0), (175, 8), (176, 1 << 61), (177, u64::MAX)] {
            spns.insert(
                spn,
                SpnRecord {
                    start_byte: Some(start_byte),
                    length_bits: Some(8),
                    ..Default::default()
                },
            );
        }
        let mut records = BTreeMap::new();
        records.insert(
            65262,
            PgnRecord {
                data_length: Some(DataLengthRecord::Bytes(8)),
                spns,
                ..Default::default()
            },
        );

        let catalog = ProtocolCatalog::from_records(records).unwrap();
        assert_eq!(catalog.get(65262).unwrap().spn_numbers(), vec![110]);
        let rejected: Vec<u32> = catalog.rejected_spns().iter().map(|r| r.spn).collect();
        assert_eq!(rejected, vec![175, 176, 177]);
    }

    #[test]
    fn test_records_reject_bad_priority() {
        let mut records = BTreeMap::new();
        records.insert(
            61444,
            PgnRecord {
                default_priority: Some(9),
                data_length: Some(DataLengthRecord::Bytes(8)),
                ..Default::default()
            },
        );
        assert!(matches!(
            ProtocolCatalog::from_records(records),
            Err(CatalogError::InvalidPgn { pgn: 61444, .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json() {
        let json = r#"{
            "61444": {
                "Parameter Group Label": "Electronic Engine Controller 1",
                "Acronym": "EEC1",
                "PGN Data Length": 8,
                "Default Priority": 3,
                "transmission_rate_ms": 20,
                "SPNs": {
                    "190": {
                        "SPN Name": "Engine Speed",
                        "start_byte": 3, "start_bit": 0, "length_bits": 16,
                        "scale": 0.125, "offset": 0,
                        "min_value": 0, "max_value": 8031.875, "unit": "rpm"
                    },
                    "899": {
                        "SPN Name": "Engine Torque Mode",
                        "start_byte": 0, "start_bit": 0, "length_bits": 4,
                        "scale": "ENUM", "offset": 0, "unit": "",
                        "discrete_values": {
                            "0": "0000 - Low idle governor/no request",
                            "1": ["0001 - Accelerator pedal", "0001 - operator selection"],
                            "15": null
                        }
                    },
                    "1483": {
                        "SPN Name": "Source Address of Controlling Device",
                        "start_byte": 4, "start_bit": 0, "length_bits": 8,
                        "scale": 1, "offset": 0,
                        "min_value": 0, "max_value": 255,
                        "op_min_value": 0, "op_max_value": 253
                    }
                }
            }
        }"#;

        let catalog = ProtocolCatalog::from_json_str(json).unwrap();
        let eec1 = catalog.get(61444).unwrap();
        assert_eq!(eec1.priority, 3);
        assert_eq!(eec1.period, Duration::from_millis(20));
        assert_eq!(eec1.acronym, "EEC1");

        let speed = eec1.spn(190).unwrap();
        assert_eq!(speed.layout, FieldLayout::Word { start_byte: 3 });
        assert_eq!(speed.decode(0x1234), Ok(582.5));

        let mode = eec1.spn(899).unwrap();
        assert_eq!(
            mode.label(1),
            Ok("0001 - Accelerator pedal; 0001 - operator selection")
        );
        assert_eq!(mode.label(15), Ok(""));

        let source = eec1.spn(1483).unwrap();
        assert_eq!(source.max_value, Some(253.0));
        assert_eq!(source.raw_range(), 0..=253);
    }
}
