pub mod app;
pub mod attributes;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod images;
pub mod recipes;
pub mod state;
pub mod storage;
