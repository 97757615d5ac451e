//! SeaORM Entity for citizens table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "citizens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub village_id: i32,
    #[sea_orm(unique)]
    pub nik: String,
    pub no_kk: String,
    pub nama: String,
    /// Kept as the literal `YYYY-MM-DD` string; it doubles as the portal credential.
    pub tanggal_lahir: String,
    pub alamat: String,
    pub no_telepon: Option<String>,
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
        on_delete = "Cascade"
    )]
    Village,
    #[sea_orm(has_many = "super::letter_requests::Entity")]
    LetterRequests,
}

impl Related<super::villages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Village.def()
    }
}

impl Related<super::letter_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LetterRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
