//! Application-wide constants

/// Length of a NIK (national identity number) and of a No KK (family card number).
pub const NIK_LENGTH: usize = 16;

/// Headers every citizen CSV import must carry, in canonical order.
pub const IMPORT_HEADERS: [&str; 6] = [
    "nik",
    "no_kk",
    "nama",
    "tanggal_lahir",
    "alamat",
    "no_telepon",
];

/// Letter number prefixes, matched against the letter type in this order.
pub const LETTER_PREFIXES: [(&str, &str); 3] = [
    ("domisili", "SKD"),
    ("usaha", "SKU"),
    ("tidak mampu", "SKTM"),
];

/// Prefix for letter types without a dedicated one.
pub const GENERIC_LETTER_PREFIX: &str = "SK";

/// Letter types offered on the citizen request form. Free text is still accepted.
pub const LETTER_TYPES: [&str; 8] = [
    "Surat Keterangan Domisili",
    "Surat Keterangan Usaha",
    "Surat Keterangan Tidak Mampu",
    "Surat Keterangan Kelahiran",
    "Surat Keterangan Kematian",
    "Surat Keterangan Pindah",
    "Surat Pengantar SKCK",
    "Surat Keterangan Belum Menikah",
];

/// Maximum length of the free-text letter type.
pub const MAX_LETTER_TYPE_LENGTH: usize = 255;

/// Number of rows returned by the activity log view.
pub const ACTIVITY_LOG_LIMIT: u64 = 100;

/// Pending requests shown on the staff dashboard.
pub const DASHBOARD_RECENT_REQUESTS: u64 = 5;

/// Role name handed to the presentation layer for citizens.
pub const CITIZEN_ROLE_NAME: &str = "masyarakat";

/// Pause before another approval attempt, multiplied by the attempt number.
pub const APPROVAL_RETRY_BACKOFF_MS: u64 = 20;
