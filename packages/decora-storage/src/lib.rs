pub mod db;
pub mod jobs;
pub mod models;
pub mod objects;
pub mod outbox;
pub mod projects;
pub mod rate_limit;
pub mod schema;
pub mod usage;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
