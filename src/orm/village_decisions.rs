//! SeaORM Entity for village_decisions table (Keputusan Kepala Desa)

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "village_decisions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub village_id: i32,
    pub number: String,
    pub issued_on: Date,
    /// Number and date under which the decision was reported upward.
    pub report_number: Option<String>,
    pub report_date: Option<Date>,
    #[sea_orm(column_type = "Text")]
    pub subject: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Option<i32>,
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
}

impl ActiveModelBehavior for ActiveModel {}
