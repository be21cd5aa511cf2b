pub mod catalog;
pub mod config;
pub mod console;
pub mod db;
pub mod server;

/// Application name for XDG paths
pub const APP_NAME: &str = "djlog";
