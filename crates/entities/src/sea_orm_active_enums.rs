//! Postgres enum types shared by the position tables.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "position_direction")]
#[serde(rename_all = "lowercase")]
pub enum PositionDirection {
    #[sea_orm(string_value = "yes")]
    Yes,
    #[sea_orm(string_value = "no")]
    No,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "position_status")]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "pending")]
    Pending,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "thesis_status")]
#[serde(rename_all = "lowercase")]
pub enum ThesisStatus {
    #[sea_orm(string_value = "intact")]
    Intact,
    #[sea_orm(string_value = "strengthened")]
    Strengthened,
    #[sea_orm(string_value = "weakened")]
    Weakened,
    #[sea_orm(string_value = "degraded")]
    Degraded,
    #[sea_orm(string_value = "invalidated")]
    Invalidated,
}

impl PositionDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionDirection::Yes => "yes",
            PositionDirection::No => "no",
        }
    }
}

impl PositionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
            PositionStatus::Pending => "pending",
        }
    }
}

impl ThesisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThesisStatus::Intact => "intact",
            ThesisStatus::Strengthened => "strengthened",
            ThesisStatus::Weakened => "weakened",
            ThesisStatus::Degraded => "degraded",
            ThesisStatus::Invalidated => "invalidated",
        }
    }
}
