//! Tariff model.

use super::{InvalidEnumValue, PropertyType};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Which property types a rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TariffScope {
    #[default]
    All,
    Rumah,
    Tanah,
}

impl TariffScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TariffScope::All => "all",
            TariffScope::Rumah => "rumah",
            TariffScope::Tanah => "tanah",
        }
    }

    pub fn covers(&self, property_type: PropertyType) -> bool {
        match self {
            TariffScope::All => true,
            TariffScope::Rumah => property_type == PropertyType::Rumah,
            TariffScope::Tanah => property_type == PropertyType::Tanah,
        }
    }
}

impl FromStr for TariffScope {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TariffScope::All),
            "rumah" => Ok(TariffScope::Rumah),
            "tanah" => Ok(TariffScope::Tanah),
            other => Err(InvalidEnumValue::new("tariff scope", other)),
        }
    }
}

impl TryFrom<String> for TariffScope {
    type Error = InvalidEnumValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Recurring monthly dues versus a one-off levy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TariffType {
    #[default]
    Rutin,
    Insidentil,
}

impl TariffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TariffType::Rutin => "rutin",
            TariffType::Insidentil => "insidentil",
        }
    }
}

impl FromStr for TariffType {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rutin" => Ok(TariffType::Rutin),
            "insidentil" => Ok(TariffType::Insidentil),
            other => Err(InvalidEnumValue::new("tariff type", other)),
        }
    }
}

impl TryFrom<String> for TariffType {
    type Error = InvalidEnumValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A rate with an inclusive validity range.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    #[serde(rename = "id")]
    pub tariff_id: Uuid,
    pub amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub property_type: TariffScope,
    #[sqlx(try_from = "String")]
    pub tariff_type: TariffType,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Fields an admin supplies when adding or replacing a tariff.
#[derive(Debug, Clone)]
pub struct TariffInput {
    pub amount: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub property_type: TariffScope,
    pub tariff_type: TariffType,
    pub description: Option<String>,
}
