//! Read-side aggregation for village reports and exports.

pub mod export;

use crate::archive;
use crate::citizen;
use crate::error::{PortalError, PortalResult};
use crate::letter::numbering::month_bounds;
use crate::orm::letter_requests::{self, LetterStatus};
use crate::orm::{citizens, village_decisions, village_regulations};
use chrono::{Datelike, NaiveDateTime};
use sea_orm::{entity::*, query::*, ConnectionTrait, PaginatorTrait};
use serde::Serialize;

pub use export::{export_filename, slugify, Table};

/// Counts shown on the village dashboard and report header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VillageSummary {
    pub citizens: u64,
    pub letters_total: u64,
    pub letters_pending: u64,
    pub letters_approved: u64,
    pub letters_rejected: u64,
    pub approved_this_month: u64,
    pub regulations: u64,
    pub decisions: u64,
}

pub async fn village_summary<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    now: NaiveDateTime,
) -> PortalResult<VillageSummary> {
    let (month_start, month_end) = month_bounds(now.year(), now.month())
        .ok_or_else(|| PortalError::validation("invalid reporting month"))?;

    let letters = || {
        letter_requests::Entity::find()
            .filter(letter_requests::Column::VillageId.eq(village_id))
    };
    let status_count = |status: LetterStatus| {
        letters()
            .filter(letter_requests::Column::Status.eq(status))
            .count(db)
    };

    let (
        citizen_count,
        letters_total,
        letters_pending,
        letters_approved,
        letters_rejected,
        approved_this_month,
        regulations,
        decisions,
    ) = futures::try_join!(
        citizens::Entity::find()
            .filter(citizens::Column::VillageId.eq(village_id))
            .count(db),
        letters().count(db),
        status_count(LetterStatus::Pending),
        status_count(LetterStatus::Approved),
        status_count(LetterStatus::Rejected),
        letters()
            .filter(letter_requests::Column::Status.eq(LetterStatus::Approved))
            .filter(letter_requests::Column::ApprovedAt.gte(month_start))
            .filter(letter_requests::Column::ApprovedAt.lt(month_end))
            .count(db),
        village_regulations::Entity::find()
            .filter(village_regulations::Column::VillageId.eq(village_id))
            .count(db),
        village_decisions::Entity::find()
            .filter(village_decisions::Column::VillageId.eq(village_id))
            .count(db),
    )?;

    Ok(VillageSummary {
        citizens: citizen_count as u64,
        letters_total: letters_total as u64,
        letters_pending: letters_pending as u64,
        letters_approved: letters_approved as u64,
        letters_rejected: letters_rejected as u64,
        approved_this_month: approved_this_month as u64,
        regulations: regulations as u64,
        decisions: decisions as u64,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Citizens,
    Letters,
    Regulations,
    Decisions,
}

impl Dataset {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "citizens" => Some(Self::Citizens),
            "letters" => Some(Self::Letters),
            "regulations" => Some(Self::Regulations),
            "decisions" => Some(Self::Decisions),
            _ => None,
        }
    }

    /// Leading part of the export file name.
    pub fn purpose(&self) -> &'static str {
        match self {
            Self::Citizens => "data-penduduk",
            Self::Letters => "surat-keluar",
            Self::Regulations => "peraturan-desa",
            Self::Decisions => "keputusan-desa",
        }
    }
}

fn date_or_blank(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Every citizen of a village, ordered by name.
pub async fn citizens_table<C: ConnectionTrait>(db: &C, village_id: i32) -> PortalResult<Table> {
    let mut table = Table::new(&[
        "No",
        "NIK",
        "No KK",
        "Nama",
        "Tanggal Lahir",
        "Alamat",
        "No Telepon",
    ]);
    for (idx, c) in citizen::list_citizens(db, village_id, None)
        .await?
        .into_iter()
        .enumerate()
    {
        table.push_row(vec![
            (idx + 1).to_string(),
            c.nik,
            c.no_kk,
            c.nama,
            c.tanggal_lahir,
            c.alamat,
            c.no_telepon.unwrap_or_default(),
        ]);
    }
    Ok(table)
}

/// Approved letters of a village in approval order.
pub async fn letters_table<C: ConnectionTrait>(db: &C, village_id: i32) -> PortalResult<Table> {
    let rows = letter_requests::Entity::find()
        .filter(letter_requests::Column::VillageId.eq(village_id))
        .filter(letter_requests::Column::Status.eq(LetterStatus::Approved))
        .find_also_related(citizens::Entity)
        .order_by_asc(letter_requests::Column::ApprovedAt)
        .order_by_asc(letter_requests::Column::Id)
        .all(db)
        .await?;

    let mut table = Table::new(&[
        "No",
        "Nomor Surat",
        "Jenis Surat",
        "Nama Pemohon",
        "NIK",
        "Keperluan",
        "Tanggal Disetujui",
    ]);
    for (idx, (request, citizen)) in rows.into_iter().enumerate() {
        let (nama, nik) = citizen.map(|c| (c.nama, c.nik)).unwrap_or_default();
        table.push_row(vec![
            (idx + 1).to_string(),
            request.letter_number.unwrap_or_default(),
            request.letter_type,
            nama,
            nik,
            request.purpose,
            date_or_blank(request.approved_at.map(|t| t.date())),
        ]);
    }
    Ok(table)
}

pub async fn regulations_table<C: ConnectionTrait>(db: &C, village_id: i32) -> PortalResult<Table> {
    let mut table = Table::new(&[
        "No",
        "Nomor",
        "Tanggal",
        "Tentang",
        "Nomor Kesepakatan",
        "Tanggal Kesepakatan",
        "Status",
        "Keterangan",
    ]);
    for (idx, r) in archive::list_regulations(db, village_id)
        .await?
        .into_iter()
        .enumerate()
    {
        table.push_row(vec![
            (idx + 1).to_string(),
            r.number,
            date_or_blank(Some(r.issued_on)),
            r.subject,
            r.agreement_number.unwrap_or_default(),
            date_or_blank(r.agreement_date),
            r.status,
            r.notes.unwrap_or_default(),
        ]);
    }
    Ok(table)
}

pub async fn decisions_table<C: ConnectionTrait>(db: &C, village_id: i32) -> PortalResult<Table> {
    let mut table = Table::new(&[
        "No",
        "Nomor",
        "Tanggal",
        "Tentang",
        "Nomor Laporan",
        "Tanggal Laporan",
        "Status",
        "Keterangan",
    ]);
    for (idx, d) in archive::list_decisions(db, village_id)
        .await?
        .into_iter()
        .enumerate()
    {
        table.push_row(vec![
            (idx + 1).to_string(),
            d.number,
            date_or_blank(Some(d.issued_on)),
            d.subject,
            d.report_number.unwrap_or_default(),
            date_or_blank(d.report_date),
            d.status,
            d.notes.unwrap_or_default(),
        ]);
    }
    Ok(table)
}

pub async fn dataset_table<C: ConnectionTrait>(
    db: &C,
    village_id: i32,
    dataset: Dataset,
) -> PortalResult<Table> {
    match dataset {
        Dataset::Citizens => citizens_table(db, village_id).await,
        Dataset::Letters => letters_table(db, village_id).await,
        Dataset::Regulations => regulations_table(db, village_id).await,
        Dataset::Decisions => decisions_table(db, village_id).await,
    }
}
