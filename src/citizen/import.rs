//! Bulk citizen import from CSV text.
//!
//! Every row is validated before anything is written. Only a fully valid
//! file is inserted, in fixed size batches. A batch that fails stops the
//! import; batches already inserted stay and are reported as imported.

use crate::constants::IMPORT_HEADERS;
use crate::orm::citizens;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use derive_more::Display;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, Set, TransactionTrait};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::{is_sixteen_digits, is_valid_birth_date};

/// Placeholders per `IN (...)` lookup, below the SQLite variable limit.
const NIK_LOOKUP_CHUNK: usize = 500;

#[derive(Clone, Copy, Debug)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub max_reported_errors: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_reported_errors: 5,
        }
    }
}

impl ImportSettings {
    pub fn from_config() -> Self {
        let import = crate::app_config::import();
        Self {
            batch_size: import.batch_size.max(1),
            max_reported_errors: import.max_reported_errors,
        }
    }
}

/// One validated CSV row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitizenRecord {
    pub nik: String,
    pub no_kk: String,
    pub nama: String,
    pub tanggal_lahir: String,
    pub alamat: String,
    pub no_telepon: Option<String>,
}

/// Result of parsing a file: the rows that passed, and one message per row
/// that did not.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    /// Valid rows with their file line number.
    pub rows: Vec<(usize, CitizenRecord)>,
    pub errors: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
}

#[derive(Debug, Display)]
pub enum ImportError {
    #[display(fmt = "File CSV kosong")]
    Empty,
    /// Holds the missing header names, comma separated.
    #[display(fmt = "Header wajib tidak ditemukan: {}", _0)]
    MissingHeaders(String),
    /// Nothing was written. `summary` holds the reported messages.
    #[display(fmt = "{}", summary)]
    InvalidRows { summary: String, error_count: usize },
    #[display(
        fmt = "Import terhenti: {} data sudah tersimpan sebelum terjadi kesalahan ({})",
        imported,
        cause
    )]
    BatchFailed { imported: usize, cause: String },
    #[display(fmt = "Database error")]
    Backend(DbErr),
}

impl std::error::Error for ImportError {}

impl From<DbErr> for ImportError {
    fn from(e: DbErr) -> Self {
        ImportError::Backend(e)
    }
}

impl From<ImportError> for crate::error::PortalError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Backend(db) => crate::error::PortalError::Backend(db),
            other => crate::error::PortalError::Import(other.to_string()),
        }
    }
}

/// Where validated rows are written.
#[async_trait]
pub trait CitizenSink {
    /// The subset of `niks` that is already registered.
    async fn existing_niks(&self, niks: &[String]) -> Result<HashSet<String>, DbErr>;

    /// Inserts one batch atomically.
    async fn insert_batch(
        &self,
        village_id: i32,
        batch: &[CitizenRecord],
        now: NaiveDateTime,
    ) -> Result<(), DbErr>;
}

#[async_trait]
impl CitizenSink for DatabaseConnection {
    async fn existing_niks(&self, niks: &[String]) -> Result<HashSet<String>, DbErr> {
        let mut found = HashSet::new();
        for chunk in niks.chunks(NIK_LOOKUP_CHUNK) {
            let rows = citizens::Entity::find()
                .filter(citizens::Column::Nik.is_in(chunk.iter().cloned()))
                .all(self)
                .await?;
            found.extend(rows.into_iter().map(|c| c.nik));
        }
        Ok(found)
    }

    async fn insert_batch(
        &self,
        village_id: i32,
        batch: &[CitizenRecord],
        now: NaiveDateTime,
    ) -> Result<(), DbErr> {
        if batch.is_empty() {
            return Ok(());
        }

        let models = batch.iter().map(|r| citizens::ActiveModel {
            village_id: Set(village_id),
            nik: Set(r.nik.clone()),
            no_kk: Set(r.no_kk.clone()),
            nama: Set(r.nama.clone()),
            tanggal_lahir: Set(r.tanggal_lahir.clone()),
            alamat: Set(r.alamat.clone()),
            no_telepon: Set(r.no_telepon.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        });

        let txn = self.begin().await?;
        citizens::Entity::insert_many(models).exec(&txn).await?;
        txn.commit().await
    }
}

/// Splits a line on commas and strips one pair of wrapping double quotes.
/// Quoted commas are not supported.
fn split_fields(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| {
            let field = field.trim();
            let field = field
                .strip_prefix('"')
                .and_then(|f| f.strip_suffix('"'))
                .unwrap_or(field);
            field.trim().to_string()
        })
        .collect()
}

/// Column index of every required header, matched by name ignoring case.
fn header_positions(line: &str) -> Result<HashMap<&'static str, usize>, ImportError> {
    let names: Vec<String> = split_fields(line)
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let mut positions = HashMap::new();
    let mut missing = Vec::new();
    for header in IMPORT_HEADERS.iter() {
        match names.iter().position(|n| n == header) {
            Some(idx) => {
                positions.insert(*header, idx);
            }
            None => missing.push(header.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(positions)
    } else {
        Err(ImportError::MissingHeaders(missing.join(", ")))
    }
}

fn validate_row(
    line_no: usize,
    fields: &[String],
    positions: &HashMap<&'static str, usize>,
) -> Result<CitizenRecord, String> {
    let get = |name: &str| -> String {
        positions
            .get(name)
            .and_then(|&idx| fields.get(idx))
            .cloned()
            .unwrap_or_default()
    };

    let record = CitizenRecord {
        nik: get("nik"),
        no_kk: get("no_kk"),
        nama: get("nama"),
        tanggal_lahir: get("tanggal_lahir"),
        alamat: get("alamat"),
        no_telepon: Some(get("no_telepon")).filter(|p| !p.is_empty()),
    };

    let mut problems = Vec::new();
    for (name, value) in [
        ("nik", &record.nik),
        ("no_kk", &record.no_kk),
        ("nama", &record.nama),
        ("tanggal_lahir", &record.tanggal_lahir),
        ("alamat", &record.alamat),
    ] {
        if value.is_empty() {
            problems.push(format!("{} wajib diisi", name));
        }
    }
    if !record.nik.is_empty() && !is_sixteen_digits(&record.nik) {
        problems.push("NIK harus 16 digit".to_string());
    }
    if !record.no_kk.is_empty() && !is_sixteen_digits(&record.no_kk) {
        problems.push("No KK harus 16 digit".to_string());
    }
    if !record.tanggal_lahir.is_empty() && !is_valid_birth_date(&record.tanggal_lahir) {
        problems.push("Format tanggal lahir harus YYYY-MM-DD".to_string());
    }

    if problems.is_empty() {
        Ok(record)
    } else {
        Err(format!("Baris {}: {}", line_no, problems.join(", ")))
    }
}

/// Parses and validates CSV text. Line numbers count the header as line 1;
/// blank lines are skipped but still counted.
pub fn parse_citizen_csv(text: &str) -> Result<ParsedCsv, ImportError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(ImportError::Empty)?;
    let positions = header_positions(header)?;

    let mut parsed = ParsedCsv::default();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (line_no, line) in lines {
        let fields = split_fields(line);
        match validate_row(line_no, &fields, &positions) {
            Ok(record) => {
                if let Some(first) = seen.get(&record.nik) {
                    parsed.errors.push(format!(
                        "Baris {}: NIK {} sudah ada di baris {}",
                        line_no, record.nik, first
                    ));
                    continue;
                }
                seen.insert(record.nik.clone(), line_no);
                parsed.rows.push((line_no, record));
            }
            Err(message) => parsed.errors.push(message),
        }
    }

    if parsed.rows.is_empty() && parsed.errors.is_empty() {
        return Err(ImportError::Empty);
    }

    Ok(parsed)
}

/// First `max` messages, one per line, plus a marker for the rest.
pub fn summarize_errors(errors: &[String], max: usize) -> String {
    let mut summary = errors
        .iter()
        .take(max)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if errors.len() > max {
        summary.push_str(&format!(
            "\n... dan {} kesalahan lainnya",
            errors.len() - max
        ));
    }
    summary
}

/// Validates the whole file, then inserts it batch by batch through `sink`.
pub async fn import_citizens<S: CitizenSink + ?Sized>(
    sink: &S,
    village_id: i32,
    text: &str,
    settings: &ImportSettings,
    now: NaiveDateTime,
) -> Result<ImportOutcome, ImportError> {
    let ParsedCsv { rows, mut errors } = parse_citizen_csv(text)?;

    let niks: Vec<String> = rows.iter().map(|(_, r)| r.nik.clone()).collect();
    let registered = sink.existing_niks(&niks).await?;
    for (line_no, record) in rows.iter() {
        if registered.contains(&record.nik) {
            errors.push(format!(
                "Baris {}: NIK {} sudah terdaftar",
                line_no, record.nik
            ));
        }
    }

    if !errors.is_empty() {
        // Row order across both passes.
        errors.sort_by_key(|e| line_of(e));
        log::info!(
            "Citizen import rejected for village {}: {} invalid rows",
            village_id,
            errors.len()
        );
        return Err(ImportError::InvalidRows {
            summary: summarize_errors(&errors, settings.max_reported_errors),
            error_count: errors.len(),
        });
    }

    let records: Vec<CitizenRecord> = rows.into_iter().map(|(_, r)| r).collect();
    let mut imported = 0;
    for batch in records.chunks(settings.batch_size.max(1)) {
        if let Err(e) = sink.insert_batch(village_id, batch, now).await {
            log::error!(
                "Citizen import for village {} failed after {} rows: {}",
                village_id,
                imported,
                e
            );
            return Err(ImportError::BatchFailed {
                imported,
                cause: e.to_string(),
            });
        }
        imported += batch.len();
    }

    log::info!(
        "Imported {} citizens into village {}",
        imported,
        village_id
    );
    Ok(ImportOutcome { imported })
}

fn line_of(message: &str) -> usize {
    message
        .strip_prefix("Baris ")
        .and_then(|rest| rest.split(':').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}
