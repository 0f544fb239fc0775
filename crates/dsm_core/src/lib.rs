//! Shared primitives for the deliberation platform: identifiers, a
//! deterministic RNG used for Schulze tie-breaking and Mediation Engine
//! shuffling, and small timestamp helpers.
//!
//! This crate has no knowledge of HTTP, storage, or the text-generation
//! model; it exists so that `dsm_algo`, `dsm_mediation`, `dsm_state`, and
//! `dsm_server` all agree on the same identifier and RNG types.

pub mod ids;
pub mod rng;
pub mod time;

pub use ids::{
    CritiqueId, DeliberationId, FeedbackId, OpinionId, ParticipantId, RankingId, StatementId,
};
pub use rng::EngineRng;
pub use time::Timestamp;
