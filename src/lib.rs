pub mod api;
pub mod classifier;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod guard;
pub mod preview;
pub mod service;
pub mod session;
