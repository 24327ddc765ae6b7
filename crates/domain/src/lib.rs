pub mod capability;
pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod trace;
