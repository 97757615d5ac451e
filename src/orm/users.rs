//! SeaORM Entity for users table (staff accounts)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Staff roles stored on the account. Citizens are not users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    #[sea_orm(string_value = "super_admin")]
    SuperAdmin,
    #[sea_orm(string_value = "admin_desa")]
    AdminDesa,
    #[sea_orm(string_value = "perangkat_desa")]
    PerangkatDesa,
}

impl StaffRole {
    /// Village-bound roles must carry a village_id; the super admin must not.
    pub fn requires_village(&self) -> bool {
        !matches!(self, Self::SuperAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[sea_orm(string_value = "aktif")]
    Aktif,
    #[sea_orm(string_value = "nonaktif")]
    Nonaktif,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub role: StaffRole,
    pub status: AccountStatus,
    pub village_id: Option<i32>,
    #[serde(skip_serializing)]
    pub failed_login_attempts: i32,
    #[serde(skip_serializing)]
    pub locked_until: Option<DateTime>,
    pub last_login_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::villages::Entity",
        from = "Column::VillageId",
        to = "super::villages::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Village,
}

impl Related<super::villages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Village.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
