//! Sensor Protocol Tables
//!
//! Static configuration for the sensor families the gateway knows about:
//! GATT UUIDs for the connected sensors, the company identifier that marks a
//! broadcast frame, and the table that maps a data characteristic to the
//! decoder for its payload. Adding a sensor family is a change to these
//! tables, not to the acquisition logic.

use crate::domain::codec;
use crate::domain::error::CodecError;
use crate::domain::models::{Measurement, MeasurementKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Humidity/Temperature Sensor Service UUID
pub const HT_SERVICE_UUID: Uuid = Uuid::from_u128(0xf000aa20_0451_4000_b000_000000000000);
/// Humidity/Temperature Sensor Data
pub const HT_DATA_UUID: Uuid = Uuid::from_u128(0xf000aa21_0451_4000_b000_000000000000);
/// Humidity/Temperature Sensor Configuration
pub const HT_CONFIG_UUID: Uuid = Uuid::from_u128(0xf000aa22_0451_4000_b000_000000000000);

/// Optical Sensor Service UUID
pub const OPTICAL_SERVICE_UUID: Uuid = Uuid::from_u128(0xf000aa70_0451_4000_b000_000000000000);
/// Optical Sensor Data
pub const OPTICAL_DATA_UUID: Uuid = Uuid::from_u128(0xf000aa71_0451_4000_b000_000000000000);
/// Optical Sensor Configuration
pub const OPTICAL_CONFIG_UUID: Uuid = Uuid::from_u128(0xf000aa72_0451_4000_b000_000000000000);

/// Company identifier carried by broadcast-style sensor frames (Nordic Semiconductor)
pub const BROADCAST_COMPANY_ID: u16 = 0x0059;

/// Value written to a configuration characteristic to switch its sensor on
pub const SENSOR_ENABLE: &[u8] = &[0x01];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFamilyKind {
    #[default]
    HumidityTemperature,
    Optical,
}

impl SensorFamilyKind {
    pub fn family(&self) -> &'static SensorFamily {
        match self {
            Self::HumidityTemperature => &HUMIDITY_TEMPERATURE,
            Self::Optical => &OPTICAL,
        }
    }
}

/// GATT layout of one connected sensor family.
#[derive(Debug, PartialEq, Eq)]
pub struct SensorFamily {
    pub name: &'static str,
    pub service: Uuid,
    pub data: Uuid,
    pub config: Uuid,
}

pub static HUMIDITY_TEMPERATURE: SensorFamily = SensorFamily {
    name: "humidity/temperature",
    service: HT_SERVICE_UUID,
    data: HT_DATA_UUID,
    config: HT_CONFIG_UUID,
};

pub static OPTICAL: SensorFamily = SensorFamily {
    name: "optical",
    service: OPTICAL_SERVICE_UUID,
    data: OPTICAL_DATA_UUID,
    config: OPTICAL_CONFIG_UUID,
};

/// Which codec function applies to a characteristic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    CharacteristicTemperature,
    CharacteristicHumidity,
    Illuminance,
}

impl DecoderKind {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Self::CharacteristicTemperature => MeasurementKind::Temperature,
            Self::CharacteristicHumidity => MeasurementKind::Humidity,
            Self::Illuminance => MeasurementKind::Illuminance,
        }
    }

    pub fn decode(&self, payload: &[u8]) -> Result<Measurement, CodecError> {
        Ok(match self {
            Self::CharacteristicTemperature => {
                Measurement::Temperature(codec::decode_characteristic_temperature(payload)?)
            }
            Self::CharacteristicHumidity => {
                Measurement::Humidity(codec::decode_characteristic_humidity(payload)?)
            }
            Self::Illuminance => Measurement::Illuminance(codec::decode_illuminance(payload)?),
        })
    }
}

/// Decoder per data characteristic.
///
/// The humidity/temperature data characteristic is reported as temperature.
pub const DECODERS: &[(Uuid, DecoderKind)] = &[
    (HT_DATA_UUID, DecoderKind::CharacteristicTemperature),
    (OPTICAL_DATA_UUID, DecoderKind::Illuminance),
];

pub fn decoder_for(characteristic: &Uuid) -> Option<DecoderKind> {
    DECODERS
        .iter()
        .find(|(uuid, _)| uuid == characteristic)
        .map(|(_, decoder)| *decoder)
}
