//! SeaORM Entity for website_contents table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "website_contents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub village_id: i32,
    /// Page section the block belongs to, e.g. "profil" or "sejarah".
    pub section: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub sort_order: i32,
    pub is_published: bool,
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
