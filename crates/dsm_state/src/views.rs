//! Aggregate read models for the `get`/`get_result` operations: bundles
//! the deliberation plus every opinion, statement, ranking, critique, and
//! feedback row. Domain entities already derive `Serialize`; these are
//! plain aggregates over them, not a parallel DTO layer.

use serde::Serialize;

use crate::entities::{Critique, Deliberation, HumanFeedback, Opinion, Ranking, Statement};

/// The "full current view" returned by `get(id)`.
#[derive(Debug, Clone, Serialize)]
pub struct DeliberationDetail {
    pub deliberation: Deliberation,
    pub opinions: Vec<Opinion>,
    pub statements: Vec<Statement>,
    pub rankings: Vec<Ranking>,
    pub critiques: Vec<Critique>,
    pub feedback: Vec<HumanFeedback>,
}

/// The "full finalized view" returned by `get_result(id)`: a
/// [`DeliberationDetail`] plus the resolved final statement.
#[derive(Debug, Clone, Serialize)]
pub struct DeliberationResult {
    #[serde(flatten)]
    pub detail: DeliberationDetail,
    pub final_statement: Statement,
}
