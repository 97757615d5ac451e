//! SeaORM Entity for services table (public village services)

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub village_id: i32,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub requirements: Option<String>,
    pub is_active: bool,
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
