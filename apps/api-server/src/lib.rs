pub mod auth;
pub mod config;
pub mod ctx;
pub mod db;
pub mod error;
pub mod routes;
pub mod session;
pub mod standalone;
pub mod workflow;

pub use ctx::Ctx;
