//! API route modules.

pub mod bots;
pub mod chat;
pub mod meetings;
