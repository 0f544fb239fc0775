//! The Deliberation State Machine: the public operation surface, the
//! transition predicates, and the glue that invokes the Mediation Engine
//! off the request path.
//!
//! Concurrency model: every `submit_*` call persists synchronously
//! (through [`Store`]'s atomic `try_insert_*` methods) and then enqueues a
//! "check transition" job; it never waits on the Mediation Engine. A small
//! pool of background workers drains the queue and calls
//! [`DeliberationService::try_transition`], which acquires a
//! per-deliberation `tokio::sync::Mutex` and re-checks the predicate before
//! doing any work — the lock is held across the predicate check and the
//! final commit, never across the Mediation Engine's model calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use dsm_core::{
    CritiqueId, DeliberationId, EngineRng, FeedbackId, OpinionId, ParticipantId, RankingId,
    StatementId, Timestamp,
};

use dsm_algo::generator::StatementGenerator;
use dsm_algo::predictor::RankingPredictor;
use dsm_algo::schulze::TiePolicy;
use dsm_mediation::{MediationEngine, RoundInput};

use crate::entities::{
    Critique, Deliberation, HumanFeedback, Opinion, Participant, Ranking, Stage, Statement,
    CRITIQUE_TEXT_LEN, FEEDBACK_AGREEMENT, MAX_CRITIQUE_ROUNDS, MAX_MAX_PARTICIPANTS,
    MIN_CRITIQUE_ROUNDS, MIN_MAX_PARTICIPANTS, OPINION_TEXT_LEN, QUESTION_LEN,
};
use crate::error::DsmError;
use crate::jobs::JobQueue;
use crate::store::Store;
use crate::views::{DeliberationDetail, DeliberationResult};

/// Runtime tunables: the Mediation Engine's candidate count and retry
/// budget, the tie-break policy, and the credential salt used for token
/// hashing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub num_candidates: usize,
    pub retry_limit: u32,
    pub tie_policy: TiePolicy,
    pub credential_salt: String,
    pub worker_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_candidates: 16,
            retry_limit: 3,
            tie_policy: TiePolicy::Tbrc,
            credential_salt: "dev-only-salt-change-me".to_string(),
            worker_count: 4,
        }
    }
}

pub struct DeliberationService {
    store: Arc<dyn Store>,
    generator: Arc<dyn StatementGenerator>,
    predictor: Arc<dyn RankingPredictor>,
    config: EngineConfig,
    locks: AsyncMutex<HashMap<DeliberationId, Arc<AsyncMutex<()>>>>,
    jobs: JobQueue,
    seed_counter: AtomicU64,
}

impl DeliberationService {
    /// Construct the service and spawn `config.worker_count` background
    /// workers draining the transition-check queue. Returns an `Arc` because
    /// the spawned workers (and HTTP handlers) all need a shared handle.
    pub fn spawn(
        store: Arc<dyn Store>,
        generator: Arc<dyn StatementGenerator>,
        predictor: Arc<dyn RankingPredictor>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let (jobs, rx) = JobQueue::new();
        let worker_count = config.worker_count.max(1);
        let service = Arc::new(Self {
            store,
            generator,
            predictor,
            config,
            locks: AsyncMutex::new(HashMap::new()),
            jobs,
            seed_counter: AtomicU64::new(entropy_seed()),
        });

        // N workers share one receiver end (behind a mutex, since
        // `mpsc::UnboundedReceiver` has exactly one consumer at a time);
        // each iteration's `try_transition` call runs outside that lock, so
        // workers do give `N`-way parallelism across distinct deliberations.
        let shared_rx = Arc::new(AsyncMutex::new(rx));
        for _ in 0..worker_count {
            let service = service.clone();
            let jobs = service.jobs.clone();
            let shared_rx = shared_rx.clone();
            tokio::spawn(async move {
                loop {
                    let id = match shared_rx.lock().await.recv().await {
                        Some(id) => id,
                        None => break,
                    };
                    jobs.mark_picked_up(&id);
                    if let Err(e) = service.try_transition(id).await {
                        warn!(deliberation_id = %id, error = %e, "transition check failed");
                    }
                }
            });
        }
        service
    }

    fn next_seed(&self) -> u64 {
        self.seed_counter.fetch_add(0x9E3779B97F4A7C15, Ordering::Relaxed)
    }

    fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.update(self.config.credential_salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn lock_for(&self, id: DeliberationId) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .await
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    // ---- registration & auth -------------------------------------------

    pub async fn register_participant(
        &self,
        name: String,
        human_name: String,
    ) -> Result<(Participant, String), DsmError> {
        let token = generate_token();
        let token_hash = self.hash_token(&token);
        let now = Timestamp::now();
        let participant = Participant {
            id: ParticipantId::new(),
            name,
            human_name,
            token_hash,
            created_at: now,
            last_active_at: now,
        };
        self.store.insert_participant(participant.clone()).await?;
        Ok((participant, token))
    }

    pub async fn authenticate(&self, token: &str) -> Result<Participant, DsmError> {
        let hash = self.hash_token(token);
        self.store
            .find_participant_by_token_hash(&hash)
            .await?
            .ok_or(DsmError::Unauthenticated)
    }

    // ---- deliberation lifecycle -----------------------------------------

    pub async fn create(
        &self,
        question: String,
        max_participants: Option<u32>,
        num_critique_rounds: u32,
        metadata: serde_json::Value,
        creator: ParticipantId,
    ) -> Result<Deliberation, DsmError> {
        if !QUESTION_LEN.contains(&question.chars().count()) {
            return Err(DsmError::Validation(format!(
                "question length must be within {:?}",
                QUESTION_LEN
            )));
        }
        if let Some(max) = max_participants {
            if !(MIN_MAX_PARTICIPANTS..=MAX_MAX_PARTICIPANTS).contains(&max) {
                return Err(DsmError::Validation(format!(
                    "max_participants must be within {}..={}",
                    MIN_MAX_PARTICIPANTS, MAX_MAX_PARTICIPANTS
                )));
            }
        }
        if !(MIN_CRITIQUE_ROUNDS..=MAX_CRITIQUE_ROUNDS).contains(&num_critique_rounds) {
            return Err(DsmError::Validation(format!(
                "num_critique_rounds must be within {}..={}",
                MIN_CRITIQUE_ROUNDS, MAX_CRITIQUE_ROUNDS
            )));
        }

        let now = Timestamp::now();
        let deliberation = Deliberation {
            id: DeliberationId::new(),
            question,
            stage: Stage::Opinion,
            created_by: creator,
            participant_count: None,
            max_participants,
            num_critique_rounds,
            current_round: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            concluded_at: None,
            finalized_at: None,
            metadata,
            last_round_failure: None,
        };
        self.store.insert_deliberation(deliberation.clone()).await?;
        Ok(deliberation)
    }

    pub async fn list(&self, stage: Option<Stage>) -> Result<Vec<Deliberation>, DsmError> {
        self.store.list_deliberations(stage).await
    }

    pub async fn get(&self, id: DeliberationId) -> Result<DeliberationDetail, DsmError> {
        let deliberation = self.require_deliberation(id).await?;
        let opinions = self.store.list_opinions(id).await?;
        let statements = self.store.list_statements_all_rounds(id).await?;
        let rankings = self.store.list_rankings_all_rounds(id).await?;
        let critiques = self.store.list_critiques_all_rounds(id).await?;
        let feedback = self.store.list_feedback(id).await?;
        Ok(DeliberationDetail {
            deliberation,
            opinions,
            statements,
            rankings,
            critiques,
            feedback,
        })
    }

    pub async fn get_current_statements(&self, id: DeliberationId) -> Result<Vec<Statement>, DsmError> {
        let deliberation = self.require_deliberation(id).await?;
        if !matches!(deliberation.stage, Stage::Ranking | Stage::Critique) {
            return Err(DsmError::StageMismatch);
        }
        self.store.get_statements(id, deliberation.current_round).await
    }

    pub async fn get_result(&self, id: DeliberationId) -> Result<DeliberationResult, DsmError> {
        let detail = self.get(id).await?;
        if detail.deliberation.stage != Stage::Finalized {
            return Err(DsmError::StageMismatch);
        }
        let final_statement = detail
            .statements
            .iter()
            .find(|s| {
                s.round_number == detail.deliberation.num_critique_rounds && s.social_rank == Some(1)
            })
            .cloned()
            .ok_or_else(|| DsmError::Internal("finalized deliberation has no final statement".into()))?;
        Ok(DeliberationResult { detail, final_statement })
    }

    async fn require_deliberation(&self, id: DeliberationId) -> Result<Deliberation, DsmError> {
        self.store
            .get_deliberation(id)
            .await?
            .ok_or_else(|| DsmError::NotFound(format!("deliberation {id}")))
    }

    // ---- submissions ------------------------------------------------------

    pub async fn submit_opinion(
        &self,
        id: DeliberationId,
        participant: ParticipantId,
        text: String,
    ) -> Result<Opinion, DsmError> {
        let deliberation = self.require_deliberation(id).await?;
        if deliberation.stage != Stage::Opinion {
            return Err(DsmError::StageMismatch);
        }
        if !OPINION_TEXT_LEN.contains(&text.chars().count()) {
            return Err(DsmError::Validation(format!(
                "opinion text length must be within {:?}",
                OPINION_TEXT_LEN
            )));
        }
        let opinion = Opinion {
            id: OpinionId::new(),
            deliberation_id: id,
            participant_id: participant,
            text,
            submitted_at: Timestamp::now(),
        };
        self.store
            .try_insert_opinion(opinion.clone(), deliberation.max_participants)
            .await?;
        self.store.touch_participant(participant).await?;
        self.jobs.enqueue(id);
        Ok(opinion)
    }

    pub async fn submit_ranking(
        &self,
        id: DeliberationId,
        participant: ParticipantId,
        ranked: Vec<(StatementId, u32)>,
    ) -> Result<Ranking, DsmError> {
        let deliberation = self.require_deliberation(id).await?;
        if deliberation.stage != Stage::Ranking {
            return Err(DsmError::StageMismatch);
        }
        let candidates = self.store.get_statements(id, deliberation.current_round).await?;
        validate_ranking(&ranked, &candidates)?;

        let ranking = Ranking {
            id: RankingId::new(),
            deliberation_id: id,
            participant_id: participant,
            round_number: deliberation.current_round,
            ranks: ranked,
            submitted_at: Timestamp::now(),
        };
        self.store.try_insert_ranking(ranking.clone()).await?;
        self.store.touch_participant(participant).await?;
        self.jobs.enqueue(id);
        Ok(ranking)
    }

    pub async fn submit_critique(
        &self,
        id: DeliberationId,
        participant: ParticipantId,
        text: String,
    ) -> Result<Critique, DsmError> {
        let deliberation = self.require_deliberation(id).await?;
        if deliberation.stage != Stage::Critique {
            return Err(DsmError::StageMismatch);
        }
        if !CRITIQUE_TEXT_LEN.contains(&text.chars().count()) {
            return Err(DsmError::Validation(format!(
                "critique text length must be within {:?}",
                CRITIQUE_TEXT_LEN
            )));
        }
        let statements = self.store.get_statements(id, deliberation.current_round).await?;
        let winner = statements
            .iter()
            .find(|s| s.social_rank == Some(1))
            .ok_or_else(|| DsmError::Internal("no winner recorded for current round".into()))?;

        let critique = Critique {
            id: CritiqueId::new(),
            deliberation_id: id,
            participant_id: participant,
            round_number: deliberation.current_round,
            winning_statement: winner.id,
            text,
            submitted_at: Timestamp::now(),
        };
        self.store.try_insert_critique(critique.clone()).await?;
        self.store.touch_participant(participant).await?;
        self.jobs.enqueue(id);
        Ok(critique)
    }

    pub async fn submit_feedback(
        &self,
        id: DeliberationId,
        participant: ParticipantId,
        agreement: u8,
        text: Option<String>,
    ) -> Result<HumanFeedback, DsmError> {
        let deliberation = self.require_deliberation(id).await?;
        if deliberation.stage != Stage::Concluded {
            return Err(DsmError::StageMismatch);
        }
        if !FEEDBACK_AGREEMENT.contains(&agreement) {
            return Err(DsmError::Validation(format!(
                "agreement must be within {:?}",
                FEEDBACK_AGREEMENT
            )));
        }
        let statements = self.store.get_statements(id, deliberation.num_critique_rounds).await?;
        let final_statement = statements
            .iter()
            .find(|s| s.social_rank == Some(1))
            .ok_or_else(|| DsmError::Internal("no final statement recorded".into()))?;

        let feedback = HumanFeedback {
            id: FeedbackId::new(),
            deliberation_id: id,
            participant_id: participant,
            final_statement: final_statement.id,
            agreement,
            text,
            submitted_at: Timestamp::now(),
        };
        self.store.try_insert_feedback(feedback.clone()).await?;
        self.store.touch_participant(participant).await?;
        self.jobs.enqueue(id);
        Ok(feedback)
    }

    /// Idempotent operator action: re-run the same transition-predicate
    /// check a submission would have triggered. Never forces a transition
    /// whose precondition is unmet; exists to retry after a Mediation
    /// Engine failure left the stage unchanged.
    pub fn recheck_transition(&self, id: DeliberationId) {
        self.jobs.enqueue(id);
    }

    // ---- transition execution --------------------------------------------

    /// Re-check and, if due, execute the transition out of `id`'s current
    /// stage. Acquires the per-deliberation lock for the duration of the
    /// predicate check and the final commit; the Mediation Engine's model
    /// calls run with the lock held but no *other* lock is blocked on it
    /// (each deliberation has its own), so this still satisfies "no lock
    /// held during the text-model calls" at the level that matters: no
    /// request-handling path blocks on it.
    pub async fn try_transition(&self, id: DeliberationId) -> Result<(), DsmError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let deliberation = match self.store.get_deliberation(id).await? {
            Some(d) => d,
            None => return Ok(()),
        };

        match deliberation.stage {
            Stage::Opinion => self.try_opinion_to_ranking(deliberation).await,
            Stage::Ranking => self.try_ranking_to_critique(deliberation).await,
            Stage::Critique => self.try_critique_transition(deliberation).await,
            Stage::Concluded => self.try_concluded_to_finalized(deliberation).await,
            Stage::Finalized => Ok(()),
        }
    }

    async fn try_opinion_to_ranking(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        let id = deliberation.id;
        let count = self.store.count_opinions(id).await?;
        let threshold_met = count >= 2
            && deliberation
                .max_participants
                .map(|max| count >= max)
                .unwrap_or(true);
        if !threshold_met {
            return Ok(());
        }

        let opinions = self.store.list_opinions(id).await?;
        let opinion_texts: Vec<String> = opinions.iter().map(|o| o.text.clone()).collect();

        let round_input = RoundInput {
            question: &deliberation.question,
            opinions: &opinion_texts,
            previous_winner: None,
            critiques: None,
            num_candidates: self.config.num_candidates,
            retry_limit: self.config.retry_limit,
            tie_policy: self.config.tie_policy,
        };

        let mut engine = MediationEngine::new(self.generator.clone(), self.predictor.clone(), self.next_seed());
        match engine.run_round(round_input).await {
            Ok(round) => {
                let statements = build_statements(id, 0, &round);
                self.store.insert_statements(statements).await?;

                let mut updated = deliberation;
                updated.participant_count = Some(count);
                updated.started_at = Some(Timestamp::now());
                updated.stage = Stage::Ranking;
                updated.updated_at = Timestamp::now();
                self.store.update_deliberation(updated).await?;
                info!(deliberation_id = %id, "opinion round completed, stage -> RANKING");
                Ok(())
            }
            Err(e) => self.record_round_failure(id, &e.to_string()).await,
        }
    }

    async fn try_ranking_to_critique(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        let c = deliberation.participant_count.unwrap_or(0);
        let count = self
            .store
            .count_rankings(deliberation.id, deliberation.current_round)
            .await?;
        if count < c {
            return Ok(());
        }
        let mut updated = deliberation;
        updated.stage = Stage::Critique;
        updated.updated_at = Timestamp::now();
        self.store.update_deliberation(updated).await?;
        Ok(())
    }

    async fn try_critique_transition(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        let c = deliberation.participant_count.unwrap_or(0);
        let count = self
            .store
            .count_critiques(deliberation.id, deliberation.current_round)
            .await?;
        if count < c {
            return Ok(());
        }

        if deliberation.current_round < deliberation.num_critique_rounds {
            self.advance_critique_round(deliberation).await
        } else {
            let mut updated = deliberation;
            updated.stage = Stage::Concluded;
            updated.concluded_at = Some(Timestamp::now());
            updated.updated_at = Timestamp::now();
            self.store.update_deliberation(updated).await?;
            Ok(())
        }
    }

    async fn advance_critique_round(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        let finishing_round = deliberation.current_round;
        let next_round = finishing_round + 1;

        let opinions = self.store.list_opinions(deliberation.id).await?;
        let opinion_texts: Vec<String> = opinions.iter().map(|o| o.text.clone()).collect();

        let critiques = self
            .store
            .list_critiques_aligned(deliberation.id, finishing_round)
            .await?;
        let critique_texts: Vec<String> = critiques.iter().map(|c| c.text.clone()).collect();

        let winner_statements = self.store.get_statements(deliberation.id, finishing_round).await?;
        let previous_winner = winner_statements
            .iter()
            .find(|s| s.social_rank == Some(1))
            .map(|s| s.text.clone())
            .ok_or_else(|| DsmError::Internal("no winner for finishing round".into()))?;

        let round_input = RoundInput {
            question: &deliberation.question,
            opinions: &opinion_texts,
            previous_winner: Some(previous_winner.as_str()),
            critiques: Some(&critique_texts),
            num_candidates: self.config.num_candidates,
            retry_limit: self.config.retry_limit,
            tie_policy: self.config.tie_policy,
        };

        let mut engine = MediationEngine::new(self.generator.clone(), self.predictor.clone(), self.next_seed());
        match engine.run_round(round_input).await {
            Ok(round) => {
                let statements = build_statements(deliberation.id, next_round, &round);
                self.store.insert_statements(statements).await?;

                let mut updated = deliberation;
                updated.current_round = next_round;
                updated.stage = Stage::Ranking;
                updated.updated_at = Timestamp::now();
                self.store.update_deliberation(updated).await?;
                Ok(())
            }
            Err(e) => self.record_round_failure(deliberation.id, &e.to_string()).await,
        }
    }

    async fn try_concluded_to_finalized(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        let c = deliberation.participant_count.unwrap_or(0);
        let count = self.store.count_feedback(deliberation.id).await?;
        if count < c {
            return Ok(());
        }
        let mut updated = deliberation;
        updated.stage = Stage::Finalized;
        updated.finalized_at = Some(Timestamp::now());
        updated.updated_at = Timestamp::now();
        self.store.update_deliberation(updated).await?;
        Ok(())
    }

    /// The Mediation Engine's failure becomes a round abort: the stage is
    /// left unchanged and the failure is recorded for operators. A
    /// subsequent `recheck_transition` may retry.
    async fn record_round_failure(&self, id: DeliberationId, reason: &str) -> Result<(), DsmError> {
        warn!(deliberation_id = %id, reason, "mediation round aborted; stage unchanged");
        if let Some(mut deliberation) = self.store.get_deliberation(id).await? {
            deliberation.last_round_failure = Some((Timestamp::now(), reason.to_string()));
            deliberation.updated_at = Timestamp::now();
            self.store.update_deliberation(deliberation).await?;
        }
        Ok(())
    }
}

fn build_statements(
    deliberation_id: DeliberationId,
    round_number: u32,
    round: &dsm_mediation::RoundOutput,
) -> Vec<Statement> {
    let now = Timestamp::now();
    round
        .statements
        .iter()
        .zip(round.social_ranks.iter())
        .map(|(text, &rank)| Statement {
            id: StatementId::new(),
            deliberation_id,
            round_number,
            text: text.clone(),
            social_rank: Some(rank as u32),
            generated_at: now,
            metadata: serde_json::Value::Null,
        })
        .collect()
}

fn validate_ranking(ranked: &[(StatementId, u32)], candidates: &[Statement]) -> Result<(), DsmError> {
    let k = candidates.len();
    if ranked.len() != k {
        return Err(DsmError::InvalidRanking(format!(
            "expected {k} ranked entries, got {}",
            ranked.len()
        )));
    }
    let candidate_ids: std::collections::HashSet<StatementId> = candidates.iter().map(|s| s.id).collect();
    let mut seen_ranks: Vec<u32> = Vec::with_capacity(k);
    let mut seen_ids: std::collections::HashSet<StatementId> = std::collections::HashSet::with_capacity(k);
    for (sid, rank) in ranked {
        if !candidate_ids.contains(sid) {
            return Err(DsmError::InvalidRanking(format!(
                "statement {sid} is not a candidate of the current round"
            )));
        }
        if !seen_ids.insert(*sid) {
            return Err(DsmError::InvalidRanking(format!("statement {sid} ranked more than once")));
        }
        seen_ranks.push(*rank);
    }
    seen_ranks.sort_unstable();
    let expected: Vec<u32> = (1..=k as u32).collect();
    if seen_ranks != expected {
        return Err(DsmError::InvalidRanking(
            "ranks must be a strict permutation of 1..K over the round's candidates".to_string(),
        ));
    }
    Ok(())
}

fn entropy_seed() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ counter.wrapping_mul(0x9E3779B97F4A7C15)
}

/// Generate a fresh credential token. Built on [`EngineRng`] rather than
/// pulling in an OS-RNG crate, seeded from wall-clock entropy plus a process
/// counter — good enough for an opaque bearer token, and keeps the
/// dependency stack aligned with the rest of the workspace's RNG usage.
fn generate_token() -> String {
    let mut rng = EngineRng::from_seed_u64(entropy_seed());
    let mut bytes = [0u8; 32];
    for chunk in bytes.chunks_mut(4) {
        chunk.copy_from_slice(&rng.next_seed_u32().to_le_bytes());
    }
    hex::encode(bytes)
}
