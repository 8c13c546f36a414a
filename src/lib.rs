pub mod app;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod docs;
pub mod errors;
pub mod response;
pub mod state;
pub mod users;
