//! Property model.

use super::InvalidEnumValue;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of plot, which decides the tariffs that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Rumah,
    Tanah,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Rumah => "rumah",
            PropertyType::Tanah => "tanah",
        }
    }
}

impl FromStr for PropertyType {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rumah" => Ok(PropertyType::Rumah),
            "tanah" => Ok(PropertyType::Tanah),
            other => Err(InvalidEnumValue::new("property type", other)),
        }
    }
}

impl TryFrom<String> for PropertyType {
    type Error = InvalidEnumValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A house or land plot, keyed naturally by block letter and number.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "id")]
    pub property_id: Uuid,
    pub block: String,
    pub number: i32,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub property_type: PropertyType,
    pub owner_id: Option<Uuid>,
    pub bast_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Property {
    /// Human address, e.g. "Blok A No. 12".
    pub fn address(&self) -> String {
        format!("Blok {} No. {}", self.block, self.number)
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// Input for registering a property.
#[derive(Debug, Clone)]
pub struct CreateProperty {
    pub block: String,
    pub number: i32,
    pub property_type: PropertyType,
    pub owner_id: Option<Uuid>,
    pub bast_date: Option<NaiveDate>,
}

/// How a resident relates to a property they are linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Pemilik,
    Keluarga,
    Sewa,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Pemilik => "pemilik",
            RelationType::Keluarga => "keluarga",
            RelationType::Sewa => "sewa",
        }
    }
}

impl FromStr for RelationType {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pemilik" => Ok(RelationType::Pemilik),
            "keluarga" => Ok(RelationType::Keluarga),
            "sewa" => Ok(RelationType::Sewa),
            other => Err(InvalidEnumValue::new("relation type", other)),
        }
    }
}

impl TryFrom<String> for RelationType {
    type Error = InvalidEnumValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Link between a property and a resident account. One link per (property, user).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PropertyUser {
    #[serde(rename = "id")]
    pub link_id: Uuid,
    pub property_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub relation_type: RelationType,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
