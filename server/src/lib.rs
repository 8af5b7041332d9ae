pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod embed;
pub mod error;
pub mod files;
pub mod housekeeping;
pub mod images;
pub mod markdown;
pub mod model;
pub mod policy;
pub mod seed;
pub mod users;
