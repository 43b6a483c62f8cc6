pub mod auth;
pub mod follows;
pub mod likes;
pub mod posts;
pub mod users;
