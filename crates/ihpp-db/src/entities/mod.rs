//! Database entities

pub mod proxy_config;
pub mod proxy_session;
