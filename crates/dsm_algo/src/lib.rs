//! Social-choice aggregation and the pluggable Ranking Predictor / Statement
//! Generator variants.
//!
//! This crate knows nothing about deliberations, rounds, or persistence — it
//! exposes the Schulze aggregator, the arrow-notation grammar, the
//! `<answer>...<sep>...</answer>` envelope parser, and the three
//! capability-set traits the Mediation Engine composes.

#![forbid(unsafe_code)]

pub mod arrow;
pub mod envelope;
pub mod generator;
pub mod llm;
pub mod predictor;
pub mod schulze;

pub use arrow::{normalize, parse_arrow, render_arrow, ArrowError, MOCK};
pub use envelope::{extract_answer, Envelope, EnvelopeError};
pub use generator::{GeneratorInput, GeneratorOutput, StatementGenerator};
pub use llm::{MockSampleTextClient, SampleTextClient, SampleTextRequest};
pub use predictor::{PredictorInput, PredictorOutput, RankingPredictor};
pub use schulze::{aggregate, SchulzeError, SocialRanking, TiePolicy};
