//! Infrastructure adapters: Postgres persistence, the work-queue push,
//! blob storage, artifact cache, telemetry and the HTTP surface.

pub mod cache;
pub mod db;
pub mod error;
pub mod http;
pub mod storage;
pub mod telemetry;
