//! Letter numbers: `PREFIX/SEQ/MM/YYYY`.
//!
//! SEQ counts approvals per village, letter type and calendar month. It is
//! handed out from `letter_sequences` with a compare-and-swap update, so two
//! approvals racing for the same scope never receive the same number; the
//! loser sees [`Allocation::Lost`] and retries its whole transaction.

use crate::constants::{GENERIC_LETTER_PREFIX, LETTER_PREFIXES};
use crate::db::is_unique_violation;
use crate::orm::letter_requests::{self, LetterStatus};
use crate::orm::letter_sequences;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, PaginatorTrait, Set};

/// Prefix for a letter type, by case-insensitive substring match.
pub fn prefix_for(letter_type: &str) -> &'static str {
    let lowered = letter_type.to_lowercase();
    LETTER_PREFIXES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, prefix)| *prefix)
        .unwrap_or(GENERIC_LETTER_PREFIX)
}

pub fn format_letter_number(prefix: &str, sequence: i32, month: u32, year: i32) -> String {
    format!("{}/{:03}/{:02}/{}", prefix, sequence, month, year)
}

/// Full letter number for the `sequence`th approval of `letter_type` in the
/// month of `approved_at`.
pub fn letter_number(letter_type: &str, sequence: i32, approved_at: NaiveDateTime) -> String {
    format_letter_number(
        prefix_for(letter_type),
        sequence,
        approved_at.month(),
        approved_at.year(),
    )
}

/// Primary key of a sequence row.
pub fn scope_key(village_id: i32, letter_type: &str, year: i32, month: u32) -> String {
    format!("{}/{:04}-{:02}/{}", village_id, year, month, letter_type)
}

/// Start and end (exclusive) of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let start = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.and_hms_opt(0, 0, 0)?;
    Some((start, end))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    Allocated(i32),
    /// Another approval moved the counter first.
    Lost,
}

/// Approved letters already numbered in this scope, used to seed a new
/// sequence row.
async fn approved_in_month<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    letter_type: &str,
    year: i32,
    month: u32,
) -> Result<i32, DbErr> {
    let (start, end) = month_bounds(year, month)
        .ok_or_else(|| DbErr::Custom(format!("invalid month {}-{}", year, month)))?;

    let count = letter_requests::Entity::find()
        .filter(letter_requests::Column::VillageId.eq(village_id))
        .filter(letter_requests::Column::LetterType.eq(letter_type))
        .filter(letter_requests::Column::Status.eq(LetterStatus::Approved))
        .filter(letter_requests::Column::ApprovedAt.gte(start))
        .filter(letter_requests::Column::ApprovedAt.lt(end))
        .count(db)
        .await?;
    Ok(count as i32)
}

/// Moves an existing counter from the value in `seen` to the next one.
///
/// Only succeeds while the stored value still equals `seen.last_value`.
pub async fn advance<C: ConnectionTrait>(
    txn: &C,
    seen: &letter_sequences::Model,
    now: NaiveDateTime,
) -> Result<Allocation, DbErr> {
    let next = seen.last_value + 1;
    let res = letter_sequences::Entity::update_many()
        .col_expr(letter_sequences::Column::LastValue, Expr::value(next))
        .col_expr(letter_sequences::Column::UpdatedAt, Expr::value(now))
        .filter(letter_sequences::Column::Scope.eq(seen.scope.as_str()))
        .filter(letter_sequences::Column::LastValue.eq(seen.last_value))
        .exec(txn)
        .await?;

    if res.rows_affected == 1 {
        Ok(Allocation::Allocated(next))
    } else {
        log::debug!("letter sequence {} moved, retrying", seen.scope);
        Ok(Allocation::Lost)
    }
}

/// Creates the counter for a scope seen for the first time, seeded from the
/// approvals already numbered in that month.
pub async fn create<C: ConnectionTrait>(
    txn: &C,
    village_id: i32,
    letter_type: &str,
    now: NaiveDateTime,
) -> Result<Allocation, DbErr> {
    let (year, month) = (now.year(), now.month());
    let key = scope_key(village_id, letter_type, year, month);
    let next = approved_in_month(txn, village_id, letter_type, year, month).await? + 1;
    let row = letter_sequences::ActiveModel {
        scope: Set(key.clone()),
        village_id: Set(village_id),
        letter_type: Set(letter_type.to_string()),
        year: Set(year),
        month: Set(month as i32),
        last_value: Set(next),
        updated_at: Set(now),
    };

    match letter_sequences::Entity::insert(row).exec(txn).await {
        Ok(_) => Ok(Allocation::Allocated(next)),
        Err(e) if is_unique_violation(&e) => {
            log::debug!("letter sequence {} created concurrently, retrying", key);
            Ok(Allocation::Lost)
        }
        Err(e) => Err(e),
    }
}

/// Takes the next sequence number for (village, type, month of `now`).
///
/// Must run inside the caller's transaction so the number is only kept if
/// the approval commits.
pub async fn allocate<C: ConnectionTrait>(
    txn: &C,
    village_id: i32,
    letter_type: &str,
    now: NaiveDateTime,
) -> Result<Allocation, DbErr> {
    let key = scope_key(village_id, letter_type, now.year(), now.month());

    match letter_sequences::Entity::find_by_id(key).one(txn).await? {
        Some(row) => advance(txn, &row, now).await,
        None => create(txn, village_id, letter_type, now).await,
    }
}

/// Takes the database write lock for the rest of the transaction.
///
/// SQLite starts transactions as readers and refuses to upgrade a reader
/// whose snapshot went stale, without waiting. A write as the first
/// statement makes the connection wait for the lock instead.
pub async fn lock_for_write<C: ConnectionTrait>(
    txn: &C,
    now: NaiveDateTime,
) -> Result<(), DbErr> {
    letter_sequences::Entity::update_many()
        .col_expr(letter_sequences::Column::UpdatedAt, Expr::value(now))
        .filter(letter_sequences::Column::Scope.eq(""))
        .exec(txn)
        .await?;
    Ok(())
}
