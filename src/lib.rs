// Library exports so integration tests can drive the modules directly.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod posts;
pub mod routes;
pub mod social;
pub mod state;
pub mod storage;
pub mod users;
