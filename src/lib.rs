pub mod api;
pub mod consumers;
pub mod core;
pub mod domain;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod schema;
pub mod services;
