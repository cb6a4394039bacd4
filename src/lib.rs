//! Meeting bot backend: transcript ingestion, chat commands, meeting
//! lifecycle, and one-time transcript email delivery.

pub mod api;
pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod delivery;
pub mod global;
pub mod ingest;
pub mod mailer;
pub mod meeting;
pub mod provider;
pub mod transcript;
