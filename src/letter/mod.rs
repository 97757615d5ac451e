//! Letter requests (permohonan surat): submit, approve, reject.
//!
//! `pending` is the only state that can change. Approval and rejection are
//! written with an update guarded on `status = pending`, so a request that
//! reached a terminal state is never moved again.

pub mod numbering;

use crate::activity::{self, Actor};
use crate::citizen::matches_search;
use crate::constants::{APPROVAL_RETRY_BACKOFF_MS, MAX_LETTER_TYPE_LENGTH};
use crate::error::{PortalError, PortalResult};
use crate::orm::letter_requests::{self, LetterStatus};
use crate::orm::{citizens, users, villages};
use crate::role::{Capability, Principal, VillageScope};
use chrono::NaiveDateTime;
use numbering::Allocation;
use sea_orm::sea_query::Expr;
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct LetterRequestForm {
    #[validate(length(min = 1, max = 255, message = "must not be empty"))]
    pub letter_type: String,
    #[validate(length(min = 1, max = 5000, message = "must not be empty"))]
    pub purpose: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LetterFilter {
    pub search: Option<String>,
    pub status: Option<LetterStatus>,
}

/// A request with the citizen it belongs to, as listed for staff.
#[derive(Clone, Debug, Serialize)]
pub struct LetterRequestView {
    #[serde(flatten)]
    pub request: letter_requests::Model,
    pub citizen_name: String,
    pub citizen_nik: String,
}

impl LetterRequestView {
    fn matches(&self, filter: &LetterFilter) -> bool {
        if let Some(status) = filter.status {
            if self.request.status != status {
                return false;
            }
        }
        match filter.search.as_deref() {
            Some(term) => matches_search(
                term,
                &[
                    &self.request.letter_type,
                    &self.request.purpose,
                    &self.citizen_name,
                    &self.citizen_nik,
                ],
            ),
            None => true,
        }
    }
}

fn view(
    (request, citizen): (letter_requests::Model, Option<citizens::Model>),
) -> LetterRequestView {
    let (citizen_name, citizen_nik) = citizen
        .map(|c| (c.nama, c.nik))
        .unwrap_or_default();
    LetterRequestView {
        request,
        citizen_name,
        citizen_nik,
    }
}

/// Everything needed to print an approved letter.
#[derive(Clone, Debug)]
pub struct PrintableLetter {
    pub request: letter_requests::Model,
    pub citizen: citizens::Model,
    pub village: villages::Model,
    pub approver_name: Option<String>,
}

/// Files a new pending request for a citizen.
pub async fn create_request(
    db: &DatabaseConnection,
    citizen_id: i32,
    form: LetterRequestForm,
    now: NaiveDateTime,
) -> PortalResult<letter_requests::Model> {
    let form = LetterRequestForm {
        letter_type: form.letter_type.trim().to_string(),
        purpose: form.purpose.trim().to_string(),
    };
    form.validate()?;
    if form.letter_type.chars().count() > MAX_LETTER_TYPE_LENGTH {
        return Err(PortalError::validation("letter_type: too long"));
    }

    let citizen = citizens::Entity::find_by_id(citizen_id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Citizen"))?;

    let request = letter_requests::ActiveModel {
        citizen_id: Set(citizen.id),
        village_id: Set(citizen.village_id),
        letter_type: Set(form.letter_type),
        purpose: Set(form.purpose),
        status: Set(LetterStatus::Pending),
        created_at: Set(now),
        approved_at: Set(None),
        approved_by: Set(None),
        rejected_at: Set(None),
        rejected_by: Set(None),
        rejection_reason: Set(None),
        letter_number: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    activity::record(
        db,
        Actor::anonymous(Some(citizen.village_id)),
        "Ajukan surat",
        Some(format!("{} oleh {}", request.letter_type, citizen.nama)),
        now,
    )
    .await;

    Ok(request)
}

async fn find_in_village<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    id: i32,
) -> PortalResult<letter_requests::Model> {
    letter_requests::Entity::find_by_id(id)
        .filter(letter_requests::Column::VillageId.eq(village_id))
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Letter request"))
}

fn ensure_pending(request: &letter_requests::Model) -> PortalResult<()> {
    if request.status.is_terminal() {
        return Err(PortalError::InvalidTransition(format!(
            "Letter request is already {}",
            request.status.as_str()
        )));
    }
    Ok(())
}

enum Attempt {
    Approved(String),
    Retry,
}

async fn approve_once(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<Attempt> {
    let txn = db.begin().await?;
    if db.get_database_backend() == DbBackend::Sqlite {
        numbering::lock_for_write(&txn, now).await?;
    }
    let checked = match find_in_village(&txn, scope.village_id, id).await {
        Ok(request) => ensure_pending(&request).map(|_| request),
        Err(e) => Err(e),
    };
    let request = match checked {
        Ok(request) => request,
        Err(e) => {
            txn.rollback().await?;
            return Err(e);
        }
    };

    let sequence = match numbering::allocate(&txn, scope.village_id, &request.letter_type, now)
        .await?
    {
        Allocation::Allocated(sequence) => sequence,
        Allocation::Lost => {
            txn.rollback().await?;
            return Ok(Attempt::Retry);
        }
    };
    let number = numbering::letter_number(&request.letter_type, sequence, now);

    let res = letter_requests::Entity::update_many()
        .col_expr(
            letter_requests::Column::Status,
            Expr::value(LetterStatus::Approved.as_str()),
        )
        .col_expr(letter_requests::Column::ApprovedBy, Expr::value(scope.actor_id))
        .col_expr(letter_requests::Column::ApprovedAt, Expr::value(now))
        .col_expr(
            letter_requests::Column::LetterNumber,
            Expr::value(number.clone()),
        )
        .filter(letter_requests::Column::Id.eq(id))
        .filter(letter_requests::Column::Status.eq(LetterStatus::Pending))
        .exec(&txn)
        .await?;

    if res.rows_affected != 1 {
        // Decided by someone else meanwhile; the next attempt reports it.
        txn.rollback().await?;
        return Ok(Attempt::Retry);
    }

    txn.commit().await?;
    Ok(Attempt::Approved(number))
}

/// One approval transaction. Lock contention counts as a lost race.
async fn try_approve(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<Attempt> {
    match approve_once(db, scope, id, now).await {
        Err(PortalError::Backend(e)) if crate::db::is_lock_contention(&e) => {
            log::debug!("approval of request {} contended: {}", id, e);
            Ok(Attempt::Retry)
        }
        other => other,
    }
}

/// Approves a pending request of the scope's village and assigns its number.
///
/// Nothing is written unless the number and the status change commit
/// together. A lost race on the sequence retries the whole transaction.
pub async fn approve_request(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    now: NaiveDateTime,
) -> PortalResult<letter_requests::Model> {
    let attempts = crate::app_config::letters().sequence_retry_limit.max(1);

    for attempt in 1..=attempts {
        match try_approve(db, scope, id, now).await? {
            Attempt::Approved(number) => {
                let request = find_in_village(db, scope.village_id, id).await?;
                activity::record(
                    db,
                    Actor::staff(scope.actor_id, Some(scope.village_id)),
                    "Setujui surat",
                    Some(format!("{} ({})", request.letter_type, number)),
                    now,
                )
                .await;
                log::info!("Letter request {} approved as {}", id, number);
                return Ok(request);
            }
            Attempt::Retry => {
                log::debug!("approval of request {} retrying (attempt {})", id, attempt);
                if attempt < attempts {
                    actix_web::rt::time::sleep(Duration::from_millis(
                        APPROVAL_RETRY_BACKOFF_MS * attempt as u64,
                    ))
                    .await;
                }
            }
        }
    }

    log::warn!(
        "Giving up approving request {} after {} attempts",
        id,
        attempts
    );
    Err(PortalError::conflict(
        "Letter number could not be allocated, please try again",
    ))
}

/// Rejects a pending request with a reason.
pub async fn reject_request(
    db: &DatabaseConnection,
    scope: &VillageScope,
    id: i32,
    reason: &str,
    now: NaiveDateTime,
) -> PortalResult<letter_requests::Model> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(PortalError::validation("reason: must not be empty"));
    }

    let request = find_in_village(db, scope.village_id, id).await?;
    ensure_pending(&request)?;

    let res = letter_requests::Entity::update_many()
        .col_expr(
            letter_requests::Column::Status,
            Expr::value(LetterStatus::Rejected.as_str()),
        )
        .col_expr(letter_requests::Column::RejectedBy, Expr::value(scope.actor_id))
        .col_expr(letter_requests::Column::RejectedAt, Expr::value(now))
        .col_expr(
            letter_requests::Column::RejectionReason,
            Expr::value(reason.to_string()),
        )
        .filter(letter_requests::Column::Id.eq(id))
        .filter(letter_requests::Column::Status.eq(LetterStatus::Pending))
        .exec(db)
        .await?;

    let request = find_in_village(db, scope.village_id, id).await?;
    if res.rows_affected != 1 {
        ensure_pending(&request)?;
    }

    activity::record(
        db,
        Actor::staff(scope.actor_id, Some(scope.village_id)),
        "Tolak surat",
        Some(format!("{}: {}", request.letter_type, reason)),
        now,
    )
    .await;

    Ok(request)
}

pub async fn get_request<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    id: i32,
) -> PortalResult<LetterRequestView> {
    letter_requests::Entity::find_by_id(id)
        .filter(letter_requests::Column::VillageId.eq(village_id))
        .find_also_related(citizens::Entity)
        .one(db)
        .await?
        .map(view)
        .ok_or(PortalError::NotFound("Letter request"))
}

/// Requests of a village, newest first, narrowed by `filter`.
pub async fn list_requests<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    filter: &LetterFilter,
) -> PortalResult<Vec<LetterRequestView>> {
    let rows = letter_requests::Entity::find()
        .filter(letter_requests::Column::VillageId.eq(village_id))
        .find_also_related(citizens::Entity)
        .order_by_desc(letter_requests::Column::CreatedAt)
        .order_by_desc(letter_requests::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(view)
        .filter(|v| v.matches(filter))
        .collect())
}

/// Latest pending requests of a village.
pub async fn pending_requests<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    limit: u64,
) -> Result<Vec<LetterRequestView>, DbErr> {
    Ok(letter_requests::Entity::find()
        .filter(letter_requests::Column::VillageId.eq(village_id))
        .filter(letter_requests::Column::Status.eq(LetterStatus::Pending))
        .find_also_related(citizens::Entity)
        .order_by_desc(letter_requests::Column::CreatedAt)
        .order_by_desc(letter_requests::Column::Id)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(view)
        .collect())
}

/// A citizen's own requests, newest first.
pub async fn citizen_requests<C: ConnectionTrait>(
    db: &C,
    citizen_id: i32,
) -> Result<Vec<letter_requests::Model>, DbErr> {
    letter_requests::Entity::find()
        .filter(letter_requests::Column::CitizenId.eq(citizen_id))
        .order_by_desc(letter_requests::Column::CreatedAt)
        .order_by_desc(letter_requests::Column::Id)
        .all(db)
        .await
}

/// An approved letter, if the principal may see it.
///
/// Citizens see their own letters; staff see letters of their village.
pub async fn printable_letter(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
) -> PortalResult<PrintableLetter> {
    let request = letter_requests::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(PortalError::NotFound("Letter request"))?;

    let visible = match principal {
        Principal::Citizen { citizen_id, .. } => request.citizen_id == *citizen_id,
        Principal::Staff { .. } => {
            principal.village_scope(Capability::ProcessLetters)?.village_id == request.village_id
        }
    };
    if !visible {
        return Err(PortalError::NotFound("Letter request"));
    }
    if request.status != LetterStatus::Approved {
        return Err(PortalError::InvalidTransition(
            "Letter has not been approved".to_string(),
        ));
    }

    let (citizen, village, approver) = futures::try_join!(
        citizens::Entity::find_by_id(request.citizen_id).one(db),
        villages::Entity::find_by_id(request.village_id).one(db),
        async {
            match request.approved_by {
                Some(user_id) => users::Entity::find_by_id(user_id).one(db).await,
                None => Ok(None),
            }
        },
    )?;

    Ok(PrintableLetter {
        citizen: citizen.ok_or(PortalError::NotFound("Citizen"))?,
        village: village.ok_or(PortalError::NotFound("Village"))?,
        approver_name: approver.map(|u| u.full_name),
        request,
    })
}
