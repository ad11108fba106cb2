pub mod bot;
pub mod config;
pub mod db;
pub mod gigachat;
pub mod locales;
pub mod state;
