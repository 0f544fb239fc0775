//! The persistence boundary: a `Store` trait plus an in-memory,
//! `tokio`-synchronized implementation. A relational store would implement
//! the same trait; this crate deliberately stops short of a concrete SQL
//! schema, but this is exactly where one would be grafted in.
//!
//! The `try_insert_*` methods fold the idempotency-key duplicate check and
//! the insert into one call — the duplicate submission check and the
//! insert are one transaction. A relational implementation gets this for
//! free from a unique constraint; the in-memory implementation holds its
//! single `Mutex` across both steps.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dsm_core::{DeliberationId, ParticipantId};

use crate::entities::{Critique, Deliberation, HumanFeedback, Opinion, Participant, Ranking, Stage, Statement};
use crate::error::DsmError;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_participant(&self, participant: Participant) -> Result<(), DsmError>;
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, DsmError>;
    async fn find_participant_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Participant>, DsmError>;
    async fn touch_participant(&self, id: ParticipantId) -> Result<(), DsmError>;

    async fn insert_deliberation(&self, deliberation: Deliberation) -> Result<(), DsmError>;
    async fn get_deliberation(&self, id: DeliberationId) -> Result<Option<Deliberation>, DsmError>;
    async fn list_deliberations(&self, stage: Option<Stage>) -> Result<Vec<Deliberation>, DsmError>;
    async fn update_deliberation(&self, deliberation: Deliberation) -> Result<(), DsmError>;

    /// Insert `opinion` unless `(deliberation, participant)` already has one
    /// ([`DsmError::DuplicateSubmission`]) or the deliberation has a
    /// `max_participants` cap already reached by prior opinions
    /// ([`DsmError::StageMismatch`] — opinion collection is effectively
    /// closed). The cap check and the insert happen under the same lock, so
    /// concurrent submissions racing for the last slot admit exactly one.
    async fn try_insert_opinion(
        &self,
        opinion: Opinion,
        max_participants: Option<u32>,
    ) -> Result<(), DsmError>;
    async fn count_opinions(&self, id: DeliberationId) -> Result<u32, DsmError>;
    /// Opinions frozen in a stable, deterministic order (by participant id):
    /// this is the canonical index order the Mediation Engine and aligned
    /// critique lookups rely on.
    async fn list_opinions(&self, id: DeliberationId) -> Result<Vec<Opinion>, DsmError>;

    async fn insert_statements(&self, statements: Vec<Statement>) -> Result<(), DsmError>;
    async fn get_statements(
        &self,
        id: DeliberationId,
        round: u32,
    ) -> Result<Vec<Statement>, DsmError>;
    async fn list_statements_all_rounds(&self, id: DeliberationId) -> Result<Vec<Statement>, DsmError>;

    /// Insert `ranking` unless `(deliberation, round, participant)` already
    /// has one, in which case returns [`DsmError::DuplicateSubmission`].
    async fn try_insert_ranking(&self, ranking: Ranking) -> Result<(), DsmError>;
    async fn count_rankings(&self, id: DeliberationId, round: u32) -> Result<u32, DsmError>;
    async fn list_rankings_all_rounds(&self, id: DeliberationId) -> Result<Vec<Ranking>, DsmError>;

    /// Insert `critique` unless `(deliberation, round, participant)` already
    /// has one, in which case returns [`DsmError::DuplicateSubmission`].
    async fn try_insert_critique(&self, critique: Critique) -> Result<(), DsmError>;
    async fn count_critiques(&self, id: DeliberationId, round: u32) -> Result<u32, DsmError>;
    /// Critiques of `round`, in the same participant-id order as
    /// [`Store::list_opinions`] so callers can zip the two lists for the
    /// Statement Generator's critique-variant prompt.
    async fn list_critiques_aligned(
        &self,
        id: DeliberationId,
        round: u32,
    ) -> Result<Vec<Critique>, DsmError>;
    async fn list_critiques_all_rounds(&self, id: DeliberationId) -> Result<Vec<Critique>, DsmError>;

    /// Insert `feedback` unless `(deliberation, participant)` already has
    /// one, in which case returns [`DsmError::DuplicateSubmission`].
    async fn try_insert_feedback(&self, feedback: HumanFeedback) -> Result<(), DsmError>;
    async fn count_feedback(&self, id: DeliberationId) -> Result<u32, DsmError>;
    async fn list_feedback(&self, id: DeliberationId) -> Result<Vec<HumanFeedback>, DsmError>;
}

#[derive(Default)]
struct Inner {
    participants: HashMap<ParticipantId, Participant>,
    token_index: HashMap<String, ParticipantId>,
    deliberations: HashMap<DeliberationId, Deliberation>,
    opinions: HashMap<DeliberationId, Vec<Opinion>>,
    statements: HashMap<(DeliberationId, u32), Vec<Statement>>,
    rankings: HashMap<(DeliberationId, u32), Vec<Ranking>>,
    critiques: HashMap<(DeliberationId, u32), Vec<Critique>>,
    feedback: HashMap<DeliberationId, Vec<HumanFeedback>>,
}

/// In-memory `Store`. All state lives behind one `tokio::sync::Mutex`; each
/// method acquires it only for the duration of its own read/write, never
/// across an `.await` of unrelated work.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_participant(&self, participant: Participant) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        inner
            .token_index
            .insert(participant.token_hash.clone(), participant.id);
        inner.participants.insert(participant.id, participant);
        Ok(())
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, DsmError> {
        Ok(self.inner.lock().await.participants.get(&id).cloned())
    }

    async fn find_participant_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Participant>, DsmError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .token_index
            .get(token_hash)
            .and_then(|id| inner.participants.get(id))
            .cloned())
    }

    async fn touch_participant(&self, id: ParticipantId) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        if let Some(p) = inner.participants.get_mut(&id) {
            p.last_active_at = dsm_core::Timestamp::now();
        }
        Ok(())
    }

    async fn insert_deliberation(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        self.inner
            .lock()
            .await
            .deliberations
            .insert(deliberation.id, deliberation);
        Ok(())
    }

    async fn get_deliberation(&self, id: DeliberationId) -> Result<Option<Deliberation>, DsmError> {
        Ok(self.inner.lock().await.deliberations.get(&id).cloned())
    }

    async fn list_deliberations(&self, stage: Option<Stage>) -> Result<Vec<Deliberation>, DsmError> {
        let inner = self.inner.lock().await;
        let mut items: Vec<Deliberation> = inner
            .deliberations
            .values()
            .filter(|d| stage.map(|s| d.stage == s).unwrap_or(true))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn update_deliberation(&self, deliberation: Deliberation) -> Result<(), DsmError> {
        self.inner
            .lock()
            .await
            .deliberations
            .insert(deliberation.id, deliberation);
        Ok(())
    }

    async fn try_insert_opinion(
        &self,
        opinion: Opinion,
        max_participants: Option<u32>,
    ) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        let bucket = inner.opinions.entry(opinion.deliberation_id).or_default();
        if bucket.iter().any(|o| o.participant_id == opinion.participant_id) {
            return Err(DsmError::DuplicateSubmission);
        }
        if let Some(max) = max_participants {
            if bucket.len() as u32 >= max {
                return Err(DsmError::StageMismatch);
            }
        }
        bucket.push(opinion);
        Ok(())
    }

    async fn count_opinions(&self, id: DeliberationId) -> Result<u32, DsmError> {
        Ok(self
            .inner
            .lock()
            .await
            .opinions
            .get(&id)
            .map(|v| v.len() as u32)
            .unwrap_or(0))
    }

    async fn list_opinions(&self, id: DeliberationId) -> Result<Vec<Opinion>, DsmError> {
        let mut opinions = self.inner.lock().await.opinions.get(&id).cloned().unwrap_or_default();
        opinions.sort_by_key(|o| o.participant_id);
        Ok(opinions)
    }

    async fn insert_statements(&self, statements: Vec<Statement>) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        for s in statements {
            inner
                .statements
                .entry((s.deliberation_id, s.round_number))
                .or_default()
                .push(s);
        }
        Ok(())
    }

    async fn get_statements(
        &self,
        id: DeliberationId,
        round: u32,
    ) -> Result<Vec<Statement>, DsmError> {
        Ok(self
            .inner
            .lock()
            .await
            .statements
            .get(&(id, round))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_statements_all_rounds(&self, id: DeliberationId) -> Result<Vec<Statement>, DsmError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Statement> = inner
            .statements
            .iter()
            .filter(|((d, _), _)| *d == id)
            .flat_map(|(_, v)| v.iter().cloned())
            .collect();
        out.sort_by_key(|s| (s.round_number, s.social_rank));
        Ok(out)
    }

    async fn try_insert_ranking(&self, ranking: Ranking) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        let bucket = inner
            .rankings
            .entry((ranking.deliberation_id, ranking.round_number))
            .or_default();
        if bucket.iter().any(|r| r.participant_id == ranking.participant_id) {
            return Err(DsmError::DuplicateSubmission);
        }
        bucket.push(ranking);
        Ok(())
    }

    async fn count_rankings(&self, id: DeliberationId, round: u32) -> Result<u32, DsmError> {
        Ok(self
            .inner
            .lock()
            .await
            .rankings
            .get(&(id, round))
            .map(|v| v.len() as u32)
            .unwrap_or(0))
    }

    async fn list_rankings_all_rounds(&self, id: DeliberationId) -> Result<Vec<Ranking>, DsmError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Ranking> = inner
            .rankings
            .iter()
            .filter(|((d, _), _)| *d == id)
            .flat_map(|(_, v)| v.iter().cloned())
            .collect();
        out.sort_by_key(|r| r.round_number);
        Ok(out)
    }

    async fn try_insert_critique(&self, critique: Critique) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        let bucket = inner
            .critiques
            .entry((critique.deliberation_id, critique.round_number))
            .or_default();
        if bucket.iter().any(|c| c.participant_id == critique.participant_id) {
            return Err(DsmError::DuplicateSubmission);
        }
        bucket.push(critique);
        Ok(())
    }

    async fn count_critiques(&self, id: DeliberationId, round: u32) -> Result<u32, DsmError> {
        Ok(self
            .inner
            .lock()
            .await
            .critiques
            .get(&(id, round))
            .map(|v| v.len() as u32)
            .unwrap_or(0))
    }

    async fn list_critiques_aligned(
        &self,
        id: DeliberationId,
        round: u32,
    ) -> Result<Vec<Critique>, DsmError> {
        let mut critiques = self
            .inner
            .lock()
            .await
            .critiques
            .get(&(id, round))
            .cloned()
            .unwrap_or_default();
        critiques.sort_by_key(|c| c.participant_id);
        Ok(critiques)
    }

    async fn list_critiques_all_rounds(&self, id: DeliberationId) -> Result<Vec<Critique>, DsmError> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Critique> = inner
            .critiques
            .iter()
            .filter(|((d, _), _)| *d == id)
            .flat_map(|(_, v)| v.iter().cloned())
            .collect();
        out.sort_by_key(|c| c.round_number);
        Ok(out)
    }

    async fn try_insert_feedback(&self, feedback: HumanFeedback) -> Result<(), DsmError> {
        let mut inner = self.inner.lock().await;
        let bucket = inner.feedback.entry(feedback.deliberation_id).or_default();
        if bucket.iter().any(|f| f.participant_id == feedback.participant_id) {
            return Err(DsmError::DuplicateSubmission);
        }
        bucket.push(feedback);
        Ok(())
    }

    async fn count_feedback(&self, id: DeliberationId) -> Result<u32, DsmError> {
        Ok(self
            .inner
            .lock()
            .await
            .feedback
            .get(&id)
            .map(|v| v.len() as u32)
            .unwrap_or(0))
    }

    async fn list_feedback(&self, id: DeliberationId) -> Result<Vec<HumanFeedback>, DsmError> {
        Ok(self.inner.lock().await.feedback.get(&id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Stage;

    fn new_opinion(deliberation_id: DeliberationId, participant_id: ParticipantId) -> Opinion {
        Opinion {
            id: dsm_core::OpinionId::new(),
            deliberation_id,
            participant_id,
            text: "a sufficiently long opinion text".to_string(),
            submitted_at: dsm_core::Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn try_insert_opinion_rejects_duplicate_participant() {
        let store = InMemoryStore::new();
        let deliberation_id = DeliberationId::new();
        let participant_id = ParticipantId::new();

        store
            .try_insert_opinion(new_opinion(deliberation_id, participant_id), None)
            .await
            .unwrap();
        let err = store
            .try_insert_opinion(new_opinion(deliberation_id, participant_id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DsmError::DuplicateSubmission));
        assert_eq!(store.count_opinions(deliberation_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn try_insert_opinion_rejects_once_max_participants_reached() {
        let store = InMemoryStore::new();
        let deliberation_id = DeliberationId::new();

        store
            .try_insert_opinion(new_opinion(deliberation_id, ParticipantId::new()), Some(2))
            .await
            .unwrap();
        store
            .try_insert_opinion(new_opinion(deliberation_id, ParticipantId::new()), Some(2))
            .await
            .unwrap();
        let err = store
            .try_insert_opinion(new_opinion(deliberation_id, ParticipantId::new()), Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DsmError::StageMismatch));
        assert_eq!(store.count_opinions(deliberation_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_deliberations_filters_by_stage() {
        let store = InMemoryStore::new();
        let mut d = sample_deliberation();
        d.stage = Stage::Opinion;
        store.insert_deliberation(d.clone()).await.unwrap();

        let mut d2 = sample_deliberation();
        d2.stage = Stage::Finalized;
        store.insert_deliberation(d2).await.unwrap();

        let opinions_only = store.list_deliberations(Some(Stage::Opinion)).await.unwrap();
        assert_eq!(opinions_only.len(), 1);
        assert_eq!(opinions_only[0].id, d.id);

        let all = store.list_deliberations(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    fn sample_deliberation() -> Deliberation {
        Deliberation {
            id: DeliberationId::new(),
            question: "what should we do about it?".to_string(),
            stage: Stage::Opinion,
            created_by: ParticipantId::new(),
            participant_count: None,
            max_participants: None,
            num_critique_rounds: 1,
            current_round: 0,
            created_at: dsm_core::Timestamp::now(),
            updated_at: dsm_core::Timestamp::now(),
            started_at: None,
            concluded_at: None,
            finalized_at: None,
            metadata: serde_json::Value::Null,
            last_round_failure: None,
        }
    }
}
