//! The Deliberation State Machine: entities, the persistence trait, the
//! public operation surface, and the in-process job queue that takes
//! Mediation Engine rounds off the request path.
//!
//! This crate composes `dsm_algo` (the Ranking Predictor / Statement
//! Generator capability sets) and `dsm_mediation` (the round executor) but
//! knows nothing about HTTP; `dsm_server` is the thin transport wrapper on
//! top of [`service::DeliberationService`].

#![forbid(unsafe_code)]

pub mod entities;
pub mod error;
pub mod jobs;
pub mod service;
pub mod store;
pub mod views;

pub use entities::{
    Critique, Deliberation, HumanFeedback, Opinion, Participant, Ranking, Stage, Statement,
};
pub use error::DsmError;
pub use service::{DeliberationService, EngineConfig};
pub use store::{InMemoryStore, Store};
pub use views::{DeliberationDetail, DeliberationResult};
