//! Renaturalization project indicators: schema, validation rules, CSV
//! import/export, dashboard aggregation and the HTTP API.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod report;
pub mod seed;
pub mod state;
pub mod validation;
