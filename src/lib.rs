pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod org;
pub mod repository;
pub mod speech;
pub mod storage;
pub mod sync;
pub mod worker;
