//! Identity & roster data model (spec §3, §4.1).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SrsError;

/// Number of radio slots every client carries; slot 10 is reserved for intercom.
pub const RADIO_SLOT_COUNT: usize = 11;

/// Carrier type of a simulated radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Modulation {
    Am = 0,
    Fm = 1,
    Intercom = 2,
    Disabled = 3,
    HaveQuick = 4,
    Satcom = 5,
    Mids = 6,
    Sincgars = 7,
}

impl TryFrom<u8> for Modulation {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Modulation::Am,
            1 => Modulation::Fm,
            2 => Modulation::Intercom,
            3 => Modulation::Disabled,
            4 => Modulation::HaveQuick,
            5 => Modulation::Satcom,
            6 => Modulation::Mids,
            7 => Modulation::Sincgars,
            other => return Err(SrsError::UnknownModulation(other)),
        })
    }
}

impl Serialize for Modulation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Modulation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Modulation::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// Side affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Coalition {
    Spectator = 0,
    Red = 1,
    Blue = 2,
}

impl TryFrom<u8> for Coalition {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Coalition::Spectator,
            1 => Coalition::Red,
            2 => Coalition::Blue,
            other => return Err(SrsError::ProtocolError(format!("unknown coalition: {other}"))),
        })
    }
}

impl Serialize for Coalition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Coalition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Coalition::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// How the IFF transponder mode is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IffControlMode {
    Cockpit = 0,
    Overlay = 1,
    Disabled = 2,
}

impl TryFrom<u8> for IffControlMode {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => IffControlMode::Cockpit,
            1 => IffControlMode::Overlay,
            2 => IffControlMode::Disabled,
            other => {
                return Err(SrsError::ProtocolError(format!(
                    "unknown iff control mode: {other}"
                )))
            }
        })
    }
}

impl Serialize for IffControlMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for IffControlMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        IffControlMode::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// IFF transponder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IffStatus {
    Off = 0,
    Normal = 1,
    /// Blinks on LotATC.
    Ident = 2,
}

impl TryFrom<u8> for IffStatus {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => IffStatus::Off,
            1 => IffStatus::Normal,
            2 => IffStatus::Ident,
            other => {
                return Err(SrsError::ProtocolError(format!(
                    "unknown iff status: {other}"
                )))
            }
        })
    }
}

impl Serialize for IffStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for IffStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        IffStatus::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// A single radio slot. A "disabled" slot has `freq == 1.0` and `modulation == Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadioInformation {
    #[serde(rename = "enc")]
    pub encryption_enabled: bool,
    #[serde(rename = "encKey")]
    pub encryption_key: i64,
    pub freq: f64,
    pub modulation: Modulation,
    #[serde(rename = "secFreq")]
    pub secondary_freq: f64,
    pub retransmit: bool,
}

impl RadioInformation {
    /// A disabled slot: `freq=1`, `modulation=DISABLED`.
    pub fn disabled() -> Self {
        Self::new(1.0, Modulation::Disabled)
    }

    pub fn new(freq: f64, modulation: Modulation) -> Self {
        Self {
            encryption_enabled: false,
            encryption_key: 0,
            freq,
            modulation,
            secondary_freq: 1.0,
            retransmit: false,
        }
    }
}

/// IFF transponder record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transponder {
    pub control: IffControlMode,
    pub mode1: i32,
    pub mode2: i32,
    pub mode3: i32,
    pub mode4: bool,
    pub mic: i32,
    pub status: IffStatus,
}

impl Default for Transponder {
    fn default() -> Self {
        Self {
            control: IffControlMode::Disabled,
            mode1: -1,
            mode2: -1,
            mode3: -1,
            mode4: false,
            mic: -1,
            status: IffStatus::Off,
        }
    }
}

/// Ambient background noise settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambient {
    pub vol: f64,
    #[serde(rename = "abType")]
    pub ab_type: String,
}

impl Default for Ambient {
    fn default() -> Self {
        Self {
            vol: 1.0,
            ab_type: String::new(),
        }
    }
}

/// A client's full radio configuration: exactly 11 slots plus unit/IFF/ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioInfo {
    pub radios: [RadioInformation; RADIO_SLOT_COUNT],
    pub unit: String,
    #[serde(rename = "unitId")]
    pub unit_id: u32,
    pub iff: Transponder,
    pub ambient: Ambient,
}

impl Default for RadioInfo {
    fn default() -> Self {
        Self {
            radios: [RadioInformation::disabled(); RADIO_SLOT_COUNT],
            unit: String::new(),
            unit_id: 0,
            iff: Transponder::default(),
            ambient: Ambient::default(),
        }
    }
}

/// Latitude/longitude/altitude position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLngPosition {
    pub lat: f64,
    pub lng: f64,
    pub alt: f64,
}

/// Per-client record, as carried in `Client`/`Clients` message fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(rename = "Coalition")]
    pub coalition: Coalition,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ClientGuid")]
    pub client_guid: String,
    #[serde(rename = "RadioInfo")]
    pub radio_info: RadioInfo,
    #[serde(rename = "LatLngPosition")]
    pub lat_lng_position: LatLngPosition,
    #[serde(rename = "AllowRecord")]
    pub allow_record: bool,
    #[serde(rename = "Seat")]
    pub seat: i32,
}

/// Build a freshly-minted client record: spectator, all radios disabled, IFF off.
pub fn new_default_client(guid: impl Into<String>, name: impl Into<String>) -> ClientInfo {
    ClientInfo {
        coalition: Coalition::Spectator,
        name: name.into(),
        client_guid: guid.into(),
        radio_info: RadioInfo::default(),
        lat_lng_position: LatLngPosition::default(),
        allow_record: true,
        seat: 0,
    }
}
