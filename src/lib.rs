// Library for the binary and tests to access modules

pub mod config;
pub mod engine_repo;
pub mod error;
pub mod inventory;
pub mod models;
pub mod operations;
pub mod policy;
pub mod presentation;
pub mod routes;
pub mod version;
pub mod worker;
