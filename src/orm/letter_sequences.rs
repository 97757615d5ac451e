//! SeaORM Entity for letter_sequences table
//!
//! One row per (village, letter type, year, month). `last_value` is the last
//! sequence number handed out for that scope.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "letter_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope: String,
    pub village_id: i32,
    pub letter_type: String,
    pub year: i32,
    pub month: i32,
    pub last_value: i32,
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
