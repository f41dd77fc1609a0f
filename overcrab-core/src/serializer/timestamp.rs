use super::*;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Highest supported number of sub-second digits.
pub const MAX_PRECISION: u32 = 9;

const NANOS_PER_SECOND: u32 = 1_000_000_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// A point in time: whole seconds since epoch plus a sub-second nanosecond part.
///
/// `nanos` is always below one second; negative instants carry a negative
/// `seconds` and a positive `nanos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: u32) -> Result<Self, SerializerError> {
        if nanos >= NANOS_PER_SECOND {
            return Err(SerializerError::InvalidArgument(format!(
                "nanosecond part {nanos} must be below one second"
            )));
        }
        Ok(Self { seconds, nanos })
    }

    pub fn from_epoch_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1_000),
            nanos: millis.rem_euclid(1_000) as u32 * NANOS_PER_MILLI,
        }
    }

    /// `from_epoch_millis` plus extra nanoseconds within that millisecond.
    pub fn from_epoch_millis_and_nanos(
        millis: i64,
        nano_of_millisecond: u32,
    ) -> Result<Self, SerializerError> {
        if nano_of_millisecond >= NANOS_PER_MILLI {
            return Err(SerializerError::InvalidArgument(format!(
                "nano-of-millisecond {nano_of_millisecond} must be below one millisecond"
            )));
        }
        let mut ts = Self::from_epoch_millis(millis);
        ts.nanos += nano_of_millisecond;
        Ok(ts)
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Milliseconds since epoch, rounded towards negative infinity.
    /// `None` when that does not fit in an `i64`.
    pub fn epoch_millis(&self) -> Option<i64> {
        self.seconds
            .checked_mul(1_000)?
            .checked_add(i64::from(self.nanos / NANOS_PER_MILLI))
    }

    /// Nanoseconds past the last whole millisecond.
    pub fn nano_of_millisecond(&self) -> u32 {
        self.nanos % NANOS_PER_MILLI
    }

    /// Drop sub-second digits beyond `precision` (0..=9).
    pub fn truncate_to(&self, precision: u32) -> Self {
        let precision = precision.min(MAX_PRECISION);
        let unit = 10u32.pow(MAX_PRECISION - precision);
        Self {
            seconds: self.seconds,
            nanos: self.nanos - self.nanos % unit,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            // Leap seconds are reported as nanos >= 1e9.
            nanos: dt.timestamp_subsec_nanos().min(NANOS_PER_SECOND - 1),
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => write!(f, "{}.{:09}s", self.seconds, self.nanos),
        }
    }
}

fn check_precision(precision: u32) -> Result<(), SerializerError> {
    if precision > MAX_PRECISION {
        return Err(SerializerError::InvalidArgument(format!(
            "precision {precision} is outside 0..={MAX_PRECISION}"
        )));
    }
    Ok(())
}

fn checked_epoch_millis(value: &Timestamp) -> Result<i64, SerializerError> {
    value.epoch_millis().ok_or_else(|| {
        SerializerError::InvalidArgument(format!("{value} does not fit in epoch milliseconds"))
    })
}

// ── TimestampSerializer ───────────────────────────────────────────────────────

/// Serializer for [`Timestamp`] at a fixed sub-second precision.
///
/// Layout (big-endian):
///
/// ```text
/// precision <= 3:  [epoch_millis: i64]
/// precision  > 3:  [epoch_millis: i64][nano_of_millisecond: i32]
/// ```
///
/// Values are truncated to `precision` digits before they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampSerializer {
    precision: u32,
}

impl TimestampSerializer {
    pub fn new(precision: u32) -> Result<Self, SerializerError> {
        check_precision(precision)?;
        Ok(Self { precision })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn is_compact(&self) -> bool {
        self.precision <= 3
    }

    fn encode(&self, value: &Timestamp) -> Result<Vec<u8>, SerializerError> {
        let value = value.truncate_to(self.precision);
        let millis = checked_epoch_millis(&value)?;
        let mut bytes = millis.to_be_bytes().to_vec();
        if !self.is_compact() {
            // nano_of_millisecond < 1_000_000, always fits.
            bytes.extend_from_slice(&(value.nano_of_millisecond() as i32).to_be_bytes());
        }
        Ok(bytes)
    }
}

impl TypeSerializer<Timestamp> for TimestampSerializer {
    fn is_immutable_type(&self) -> bool {
        false
    }

    fn create_instance(&self) -> Timestamp {
        Timestamp::from_epoch_millis(0)
    }

    fn copy(&self, from: &Timestamp) -> Timestamp {
        *from
    }

    fn length(&self) -> Option<usize> {
        Some(if self.is_compact() { 8 } else { 12 })
    }

    fn serialize(
        &self,
        value: Option<&Timestamp>,
        writer: &mut dyn Write,
    ) -> Result<(), SerializerError> {
        let value = value.ok_or_else(|| {
            SerializerError::InvalidArgument("the timestamp must not be null".to_string())
        })?;
        writer.write_all(&self.encode(value)?)?;
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<Timestamp, SerializerError> {
        let millis = read_i64(reader)?;
        if self.is_compact() {
            return Ok(Timestamp::from_epoch_millis(millis));
        }
        let nano_of_milli = read_i32(reader)?;
        u32::try_from(nano_of_milli)
            .ok()
            .and_then(|n| Timestamp::from_epoch_millis_and_nanos(millis, n).ok())
            .ok_or_else(|| {
                SerializerError::Corrupt(format!("nano-of-millisecond {nano_of_milli} out of range"))
            })
    }

    fn snapshot_configuration(&self) -> Box<dyn TypeSerializerSnapshot<Timestamp>> {
        Box::new(TimestampSerializerSnapshot::new(self.precision))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Persisted configuration of a [`TimestampSerializer`]: `[version][precision]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampSerializerSnapshot {
    precision: u32,
}

impl TimestampSerializerSnapshot {
    pub const CURRENT_VERSION: i32 = 1;

    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    /// Precision the state was written with.
    pub fn precision(&self) -> u32 {
        self.precision
    }
}

impl TypeSerializerSnapshot<Timestamp> for TimestampSerializerSnapshot {
    fn current_version(&self) -> i32 {
        Self::CURRENT_VERSION
    }

    fn write_snapshot(&self, writer: &mut dyn Write) -> Result<(), SerializerError> {
        writer.write_all(&(self.precision as i32).to_be_bytes())?;
        Ok(())
    }

    fn read_snapshot(
        &mut self,
        version: i32,
        reader: &mut dyn Read,
    ) -> Result<(), SerializerError> {
        if version != Self::CURRENT_VERSION {
            return Err(SerializerError::UnsupportedVersion {
                found: version,
                current: Self::CURRENT_VERSION,
            });
        }
        let precision = read_i32(reader)?;
        let precision = u32::try_from(precision)
            .ok()
            .filter(|p| *p <= MAX_PRECISION)
            .ok_or_else(|| SerializerError::Corrupt(format!("precision {precision} out of range")))?;
        self.precision = precision;
        Ok(())
    }

    fn restore_serializer(&self) -> Result<Box<dyn TypeSerializer<Timestamp>>, SerializerError> {
        Ok(Box::new(TimestampSerializer::new(self.precision)?))
    }

    fn resolve_schema_compatibility(
        &self,
        new_serializer: &dyn TypeSerializer<Timestamp>,
    ) -> SchemaCompatibility {
        match new_serializer.as_any().downcast_ref::<TimestampSerializer>() {
            Some(serializer) if serializer.precision == self.precision => {
                SchemaCompatibility::CompatibleAsIs
            }
            _ => SchemaCompatibility::Incompatible,
        }
    }
}

// ── EpochMillisSerializer ─────────────────────────────────────────────────────

/// Serializer for [`Timestamp`] as plain epoch milliseconds: `[epoch_millis: i64]`.
///
/// Shares the byte width of a low-precision [`TimestampSerializer`] but is a
/// different format; one never reads the other's snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochMillisSerializer;

impl TypeSerializer<Timestamp> for EpochMillisSerializer {
    fn is_immutable_type(&self) -> bool {
        false
    }

    fn create_instance(&self) -> Timestamp {
        Timestamp::default()
    }

    fn copy(&self, from: &Timestamp) -> Timestamp {
        *from
    }

    fn length(&self) -> Option<usize> {
        Some(8)
    }

    fn serialize(
        &self,
        value: Option<&Timestamp>,
        writer: &mut dyn Write,
    ) -> Result<(), SerializerError> {
        let value = value.ok_or_else(|| {
            SerializerError::InvalidArgument("the timestamp must not be null".to_string())
        })?;
        writer.write_all(&checked_epoch_millis(value)?.to_be_bytes())?;
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<Timestamp, SerializerError> {
        Ok(Timestamp::from_epoch_millis(read_i64(reader)?))
    }

    fn snapshot_configuration(&self) -> Box<dyn TypeSerializerSnapshot<Timestamp>> {
        Box::new(EpochMillisSerializerSnapshot)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Snapshot of an [`EpochMillisSerializer`]; the payload is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpochMillisSerializerSnapshot;

impl EpochMillisSerializerSnapshot {
    pub const CURRENT_VERSION: i32 = 1;
}

impl TypeSerializerSnapshot<Timestamp> for EpochMillisSerializerSnapshot {
    fn current_version(&self) -> i32 {
        Self::CURRENT_VERSION
    }

    fn write_snapshot(&self, _writer: &mut dyn Write) -> Result<(), SerializerError> {
        Ok(())
    }

    fn read_snapshot(
        &mut self,
        version: i32,
        _reader: &mut dyn Read,
    ) -> Result<(), SerializerError> {
        if version != Self::CURRENT_VERSION {
            return Err(SerializerError::UnsupportedVersion {
                found: version,
                current: Self::CURRENT_VERSION,
            });
        }
        Ok(())
    }

    fn restore_serializer(&self) -> Result<Box<dyn TypeSerializer<Timestamp>>, SerializerError> {
        Ok(Box::new(EpochMillisSerializer))
    }

    fn resolve_schema_compatibility(
        &self,
        new_serializer: &dyn TypeSerializer<Timestamp>,
    ) -> SchemaCompatibility {
        if new_serializer.as_any().is::<EpochMillisSerializer>() {
            SchemaCompatibility::CompatibleAsIs
        } else {
            SchemaCompatibility::Incompatible
        }
    }
}
