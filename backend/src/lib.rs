pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod transaction;
