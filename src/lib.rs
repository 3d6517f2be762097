pub mod cli;
pub mod config;
pub mod crypto;
pub mod database;
pub mod encryption;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observer;
pub mod repair;
pub mod services;
