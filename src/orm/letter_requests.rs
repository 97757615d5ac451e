//! SeaORM Entity for letter_requests table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a letter request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum LetterStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl LetterStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "letter_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub citizen_id: i32,
    pub village_id: i32,
    pub letter_type: String,
    #[sea_orm(column_type = "Text")]
    pub purpose: String,
    pub status: LetterStatus,
    pub created_at: DateTime,
    pub approved_at: Option<DateTime>,
    pub approved_by: Option<i32>,
    pub rejected_at: Option<DateTime>,
    pub rejected_by: Option<i32>,
    pub rejection_reason: Option<String>,
    pub letter_number: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::citizens::Entity",
        from = "Column::CitizenId",
        to = "super::citizens::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Citizen,
    #[sea_orm(
        belongs_to = "super::villages::Entity",
        from = "Column::VillageId",
        to = "super::villages::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Village,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ApprovedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Approver,
}

impl Related<super::citizens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Citizen.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
