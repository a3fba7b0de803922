use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Monotonically increasing identifier assigned to each completed capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameNumber(pub u64);

/// Identifier of a submitted capture request. Requests are numbered before
/// any of their frames complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestNumber(pub u64);

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result keys that a 3A exit condition can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKey {
    AeState,
    AfState,
    AwbState,
    AeMode,
    AfMode,
    AwbMode,
    FlashState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AeState {
    Inactive,
    Searching,
    Converged,
    Locked,
    FlashRequired,
    Precapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfState {
    Inactive,
    PassiveScan,
    PassiveFocused,
    ActiveScan,
    FocusedLocked,
    NotFocusedLocked,
    PassiveUnfocused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwbState {
    Inactive,
    Searching,
    Converged,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashState {
    Unavailable,
    Charging,
    Ready,
    Fired,
    Partial,
}

/// A single metadata value as reported by the camera for one key.
///
/// Values of different kinds never compare equal, so an `AeState::Converged`
/// does not satisfy a condition written against `AwbState::Converged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataValue {
    Ae(AeState),
    Af(AfState),
    Awb(AwbState),
    Flash(FlashState),
    /// Raw control mode (AE/AF/AWB mode keys).
    Mode(i32),
}

impl From<AeState> for MetadataValue {
    fn from(state: AeState) -> Self {
        Self::Ae(state)
    }
}

impl From<AfState> for MetadataValue {
    fn from(state: AfState) -> Self {
        Self::Af(state)
    }
}

impl From<AwbState> for MetadataValue {
    fn from(state: AwbState) -> Self {
        Self::Awb(state)
    }
}

impl From<FlashState> for MetadataValue {
    fn from(state: FlashState) -> Self {
        Self::Flash(state)
    }
}

/// Read access to the metadata of one completed frame.
///
/// Implemented by whatever the capture pipeline hands out per frame; the
/// convergence logic only ever reads through this trait.
pub trait FrameMetadata: Send + Sync {
    fn frame_number(&self) -> FrameNumber;

    /// Value reported for `key`, or `None` if the frame does not carry it.
    fn get(&self, key: MetadataKey) -> Option<MetadataValue>;

    /// Sensor timestamp of the frame in nanoseconds, if reported.
    fn timestamp_ns(&self) -> Option<i64>;
}

/// Owned, in-memory frame metadata.
#[derive(Debug, Clone)]
pub struct CapturedMetadata {
    frame_number: FrameNumber,
    timestamp_ns: Option<i64>,
    values: HashMap<MetadataKey, MetadataValue>,
}

impl CapturedMetadata {
    pub fn new(frame_number: u64) -> Self {
        Self {
            frame_number: FrameNumber(frame_number),
            timestamp_ns: None,
            values: HashMap::new(),
        }
    }

    pub fn with_timestamp_ns(mut self, timestamp_ns: i64) -> Self {
        self.timestamp_ns = Some(timestamp_ns);
        self
    }

    pub fn with(mut self, key: MetadataKey, value: impl Into<MetadataValue>) -> Self {
        self.values.insert(key, value.into());
        self
    }
}

impl FrameMetadata for CapturedMetadata {
    fn frame_number(&self) -> FrameNumber {
        self.frame_number
    }

    fn get(&self, key: MetadataKey) -> Option<MetadataValue> {
        self.values.get(&key).copied()
    }

    fn timestamp_ns(&self) -> Option<i64> {
        self.timestamp_ns
    }
}
