mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
    pub mod table;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
}
mod config;
mod constants;
mod media;
pub mod routes;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use media::*;
