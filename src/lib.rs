pub mod account;
pub mod activity;
pub mod app_config;
pub mod archive;
pub mod auth;
pub mod citizen;
pub mod constants;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod letter;
pub mod middleware;
pub mod orm;
pub mod report;
pub mod role;
pub mod session;
pub mod village;
pub mod web;
pub mod website;
