pub mod config;
pub mod content;
pub mod database;
pub mod entities;
pub mod errors;
pub mod job_scheduling;
pub mod models;
pub mod network;
pub mod services;
