// Domain module - Types, errors and configuration model
pub mod config;
pub mod error;
