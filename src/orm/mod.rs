//! SeaORM entities, one module per table.

pub mod activity_logs;
pub mod citizens;
pub mod letter_requests;
pub mod letter_sequences;
pub mod news;
pub mod services;
pub mod users;
pub mod village_decisions;
pub mod village_regulations;
pub mod villages;
pub mod website_contents;
pub mod website_settings;
