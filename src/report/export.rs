//! Flat tables and their CSV rendering.

use chrono::NaiveDate;
use serde::Serialize;
use std::borrow::Cow;

/// Row-oriented table handed to exporters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Comma separated, one `\n` terminated line per row, header first.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.headers).chain(self.rows.iter()) {
            let fields: Vec<Cow<str>> = line.iter().map(|f| csv_field(f)).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

/// Quotes a field only when it holds a comma, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Lowercase ASCII letters and digits, everything else collapsed into `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// `{purpose}-{village-slug}-{YYYY-MM-DD}.{ext}`
pub fn export_filename(purpose: &str, village_name: &str, date: NaiveDate, ext: &str) -> String {
    let village = slugify(village_name);
    let village = if village.is_empty() {
        "desa".to_string()
    } else {
        village
    };
    format!(
        "{}-{}-{}.{}",
        purpose,
        village,
        date.format("%Y-%m-%d"),
        ext.trim_start_matches('.')
    )
}
