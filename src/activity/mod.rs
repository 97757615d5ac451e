//! Append-only audit trail of portal actions.

use crate::constants::ACTIVITY_LOG_LIMIT;
use crate::orm::activity_logs;
use chrono::NaiveDateTime;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, Set};

/// Actor and scope of an activity entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Actor {
    pub user_id: Option<i32>,
    pub village_id: Option<i32>,
}

impl Actor {
    pub fn staff(user_id: i32, village_id: Option<i32>) -> Self {
        Self {
            user_id: Some(user_id),
            village_id,
        }
    }

    /// Citizen and system events have no staff actor.
    pub fn anonymous(village_id: Option<i32>) -> Self {
        Self {
            user_id: None,
            village_id,
        }
    }
}

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    actor: Actor,
    action: &str,
    details: Option<String>,
    now: NaiveDateTime,
) -> Result<activity_logs::Model, DbErr> {
    activity_logs::ActiveModel {
        user_id: Set(actor.user_id),
        village_id: Set(actor.village_id),
        action: Set(action.to_string()),
        details: Set(details),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Records an activity. A failed write is logged and never fails the caller.
pub async fn record<C: ConnectionTrait>(
    db: &C,
    actor: Actor,
    action: &str,
    details: Option<String>,
    now: NaiveDateTime,
) {
    if let Err(e) = insert(db, actor, action, details, now).await {
        log::error!("Failed to record activity '{}': {}", action, e);
    }
}

/// Latest entries, optionally restricted to one village.
pub async fn recent<C: ConnectionTrait>(
    db: &C,
    village_id: Option<i32>,
) -> Result<Vec<activity_logs::Model>, DbErr> {
    let mut query = activity_logs::Entity::find()
        .order_by_desc(activity_logs::Column::CreatedAt)
        .order_by_desc(activity_logs::Column::Id);

    if let Some(village_id) = village_id {
        query = query.filter(activity_logs::Column::VillageId.eq(village_id));
    }

    query.limit(ACTIVITY_LOG_LIMIT).all(db).await
}
