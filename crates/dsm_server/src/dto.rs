//! Request/response JSON shapes. Kept separate from `dsm_state`'s entities
//! so the wire format can evolve independently of the state machine's
//! internal types.

use serde::{Deserialize, Serialize};

use dsm_core::{ParticipantId, StatementId};
use dsm_state::{Critique, Deliberation, HumanFeedback, Opinion, Participant, Ranking, Stage, Statement};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub human_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: ParticipantId,
    pub name: String,
    pub human_name: String,
    pub token: String,
    pub created_at: dsm_core::Timestamp,
}

impl RegisterResponse {
    pub fn new(participant: Participant, token: String) -> Self {
        Self {
            id: participant.id,
            name: participant.name,
            human_name: participant.human_name,
            token,
            created_at: participant.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliberationRequest {
    pub question: String,
    pub max_participants: Option<u32>,
    #[serde(default = "default_critique_rounds")]
    pub num_critique_rounds: u32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_critique_rounds() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct StageQuery {
    pub stage: Option<String>,
}

impl StageQuery {
    pub fn parse(&self) -> Result<Option<Stage>, String> {
        match self.stage.as_deref() {
            None => Ok(None),
            Some(s) => match s.to_ascii_uppercase().as_str() {
                "OPINION" => Ok(Some(Stage::Opinion)),
                "RANKING" => Ok(Some(Stage::Ranking)),
                "CRITIQUE" => Ok(Some(Stage::Critique)),
                "CONCLUDED" => Ok(Some(Stage::Concluded)),
                "FINALIZED" => Ok(Some(Stage::Finalized)),
                other => Err(format!("unknown stage {other}")),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeliberationListResponse {
    pub deliberations: Vec<Deliberation>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitOpinionRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct StatementRankingEntry {
    pub statement_id: StatementId,
    pub rank: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRankingRequest {
    pub statement_rankings: Vec<StatementRankingEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitCritiqueRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub agreement_level: u8,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeliberationDetailResponse {
    pub deliberation: Deliberation,
    pub opinions: Vec<Opinion>,
    pub statements: Vec<Statement>,
    pub rankings: Vec<Ranking>,
    pub critiques: Vec<Critique>,
    pub feedback: Vec<HumanFeedback>,
}

impl From<dsm_state::DeliberationDetail> for DeliberationDetailResponse {
    fn from(d: dsm_state::DeliberationDetail) -> Self {
        Self {
            deliberation: d.deliberation,
            opinions: d.opinions,
            statements: d.statements,
            rankings: d.rankings,
            critiques: d.critiques,
            feedback: d.feedback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeliberationResultResponse {
    #[serde(flatten)]
    pub detail: DeliberationDetailResponse,
    pub final_statement: Statement,
}

impl From<dsm_state::DeliberationResult> for DeliberationResultResponse {
    fn from(r: dsm_state::DeliberationResult) -> Self {
        Self {
            detail: r.detail.into(),
            final_statement: r.final_statement,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub text_model_id: String,
}
