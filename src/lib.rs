//! Vellum: orchestration for asynchronous document conversion.
//!
//! The crate coordinates conversion requests against an external worker
//! fleet: it submits each logical conversion to the work queue exactly
//! once, tracks progress through a persisted task record, and resolves a
//! final outcome (a signed download URL or an error code) either
//! immediately or after a bounded synchronous wait.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
