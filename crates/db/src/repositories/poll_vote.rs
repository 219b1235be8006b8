//! Poll vote repository.
//!
//! A participant's ballot is the set of rows sharing their identity key within
//! one poll. The only write path replaces that set wholesale.

use std::sync::Arc;

use crate::entities::{Poll, PollVote, poll_vote};
use agora_common::{AppError, AppResult, IdGenerator, Participant, ParticipantKey};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// Rows belonging to one participant in one poll.
///
/// Email keys match on the stored email. Name keys only match rows without an
/// email, so a named-only voter never collides with an emailed one.
fn ballot_condition(poll_id: &str, key: &ParticipantKey) -> Condition {
    let by_key = match key {
        ParticipantKey::Email(email) => {
            Condition::all().add(poll_vote::Column::ParticipantEmail.eq(email.as_str()))
        }
        ParticipantKey::Name(name) => Condition::all()
            .add(poll_vote::Column::ParticipantNameLower.eq(name.as_str()))
            .add(poll_vote::Column::ParticipantEmail.is_null()),
    };

    Condition::all()
        .add(poll_vote::Column::PollId.eq(poll_id))
        .add(by_key)
}

/// Poll vote repository for database operations.
#[derive(Clone)]
pub struct PollVoteRepository {
    db: Arc<DatabaseConnection>,
    id_gen: IdGenerator,
}

impl PollVoteRepository {
    /// Create a new poll vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            id_gen: IdGenerator::new(),
        }
    }

    /// Check whether the participant already has a ballot in the poll.
    pub async fn has_existing_ballot(&self, poll_id: &str, key: &ParticipantKey) -> AppResult<bool> {
        let count = PollVote::find()
            .filter(ballot_condition(poll_id, key))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Open a ballot transaction for one participant.
    ///
    /// The poll row is locked (`FOR UPDATE` where the backend supports it),
    /// so concurrent writers to the same poll queue up behind each other and
    /// the existence check done inside the transaction stays valid until
    /// commit.
    pub async fn begin_ballot(
        &self,
        poll_id: &str,
        key: &ParticipantKey,
    ) -> AppResult<BallotTransaction> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Poll::find_by_id(poll_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))?;

        Ok(BallotTransaction {
            txn,
            poll_id: poll_id.to_string(),
            key: key.clone(),
            id_gen: self.id_gen.clone(),
        })
    }

    /// Replace the participant's ballot with one row per selected option.
    ///
    /// Prior rows are deleted and the new ones inserted in a single
    /// transaction. Any failure rolls the whole replacement back and leaves
    /// the previous ballot untouched.
    pub async fn replace_ballot(
        &self,
        poll_id: &str,
        participant: &Participant,
        option_ids: &[String],
        comment: Option<&str>,
    ) -> AppResult<Vec<poll_vote::Model>> {
        let ballot = self.begin_ballot(poll_id, &participant.key).await?;
        ballot.replace(participant, option_ids, comment).await
    }

    /// Current rows of a poll, oldest first.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .order_by_asc(poll_vote::Column::CreatedAt)
            .order_by_asc(poll_vote::Column::OptionId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Rows of one participant in a poll.
    pub async fn find_ballot(
        &self,
        poll_id: &str,
        key: &ParticipantKey,
    ) -> AppResult<Vec<poll_vote::Model>> {
        PollVote::find()
            .filter(ballot_condition(poll_id, key))
            .order_by_asc(poll_vote::Column::OptionId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// An open transaction over one participant's ballot.
///
/// Dropping it without calling [`BallotTransaction::replace`] rolls back.
pub struct BallotTransaction {
    txn: DatabaseTransaction,
    poll_id: String,
    key: ParticipantKey,
    id_gen: IdGenerator,
}

impl BallotTransaction {
    /// Whether the participant already has rows, as seen inside the lock.
    pub async fn has_existing(&self) -> AppResult<bool> {
        let count = PollVote::find()
            .filter(ballot_condition(&self.poll_id, &self.key))
            .count(&self.txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Delete the prior rows, insert the new ones and commit.
    pub async fn replace(
        self,
        participant: &Participant,
        option_ids: &[String],
        comment: Option<&str>,
    ) -> AppResult<Vec<poll_vote::Model>> {
        let removed = PollVote::delete_many()
            .filter(ballot_condition(&self.poll_id, &self.key))
            .exec(&self.txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(option_ids.len());
        for option_id in option_ids {
            let row = poll_vote::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(self.poll_id.clone()),
                option_id: Set(option_id.clone()),
                participant_name: Set(participant.name.clone()),
                participant_name_lower: Set(participant.name.to_lowercase()),
                participant_email: Set(participant.email.clone()),
                comment: Set(comment.map(ToString::to_string)),
                created_at: Set(now.into()),
            }
            .insert(&self.txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
            inserted.push(row);
        }

        self.txn
            .commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(
            poll_id = %self.poll_id,
            participant = %self.key,
            removed = removed.rows_affected,
            inserted = inserted.len(),
            "Replaced ballot"
        );

        Ok(inserted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{
        poll,
        poll::{PollType, ResponseMode},
        poll_option,
    };
    use agora_common::resolve_participant;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_vote(id: &str, option_id: &str, name: &str, email: Option<&str>) -> poll_vote::Model {
        poll_vote::Model {
            id: id.to_string(),
            poll_id: "poll1".to_string(),
            option_id: option_id.to_string(),
            participant_name: name.to_string(),
            participant_name_lower: name.to_lowercase(),
            participant_email: email.map(ToString::to_string),
            comment: None,
            created_at: Utc::now().into(),
        }
    }

    /// Fresh SQLite database holding one poll with options `a`, `b`, `c`.
    async fn seeded_repo() -> PollVoteRepository {
        let conn = Arc::new(crate::test_utils::memory_database().await.unwrap());

        poll::ActiveModel {
            id: Set("poll1".to_string()),
            token: Set("tok".to_string()),
            title: Set("Dinner".to_string()),
            description: Set(None),
            creator_name: Set(None),
            response_mode: Set(ResponseMode::Single),
            poll_type: Set(PollType::Meeting),
            require_consent: Set(false),
            deadline_at: Set(None),
            organizer_code_hash: Set(None),
            is_archived: Set(false),
            created_at: Set(Utc::now().into()),
        }
        .insert(conn.as_ref())
        .await
        .unwrap();

        for (position, id) in ["a", "b", "c"].into_iter().enumerate() {
            poll_option::ActiveModel {
                id: Set(id.to_string()),
                poll_id: Set("poll1".to_string()),
                label: Set(id.to_uppercase()),
                position: Set(position as i32 + 1),
            }
            .insert(conn.as_ref())
            .await
            .unwrap();
        }

        PollVoteRepository::new(conn)
    }

    #[tokio::test]
    async fn test_has_existing_ballot_counts_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_row(1)]])
                .append_query_results([[count_row(0)]])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let key = ParticipantKey::Name("alice".to_string());
        assert!(repo.has_existing_ballot("poll1", &key).await.unwrap());
        assert!(!repo.has_existing_ballot("poll1", &key).await.unwrap());
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        std::collections::BTreeMap::from([("num_items", n.into())])
    }

    #[tokio::test]
    async fn test_find_by_poll_mock() {
        let votes = vec![
            create_test_vote("v1", "a", "Alice", None),
            create_test_vote("v2", "b", "Bob", Some("bob@example.com")),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([votes])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo.find_by_poll("poll1").await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(
            result[1].participant_key(),
            ParticipantKey::Email("bob@example.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_replace_ballot_removes_previous_rows() {
        let repo = seeded_repo().await;
        let alice = resolve_participant("Alice", None).unwrap();

        repo.replace_ballot("poll1", &alice, &["a".to_string(), "c".to_string()], Some("hi"))
            .await
            .unwrap();
        assert!(repo.has_existing_ballot("poll1", &alice.key).await.unwrap());

        repo.replace_ballot("poll1", &alice, &["b".to_string()], None)
            .await
            .unwrap();

        let rows = repo.find_ballot("poll1", &alice.key).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].option_id, "b");
        assert_eq!(rows[0].comment, None);
    }

    #[tokio::test]
    async fn test_name_key_matches_case_insensitively() {
        let repo = seeded_repo().await;
        let first = resolve_participant("Alice", None).unwrap();
        repo.replace_ballot("poll1", &first, &["a".to_string()], None)
            .await
            .unwrap();

        let again = resolve_participant("ALICE", None).unwrap();
        assert!(repo.has_existing_ballot("poll1", &again.key).await.unwrap());

        let rows = repo.find_ballot("poll1", &again.key).await.unwrap();
        assert_eq!(rows[0].participant_name, "Alice");
    }

    #[tokio::test]
    async fn test_named_and_emailed_ballots_are_separate() {
        let repo = seeded_repo().await;
        let named = resolve_participant("Alice", None).unwrap();
        let emailed = resolve_participant("Alice", Some("alice@example.com")).unwrap();

        repo.replace_ballot("poll1", &emailed, &["a".to_string()], None)
            .await
            .unwrap();
        assert!(!repo.has_existing_ballot("poll1", &named.key).await.unwrap());

        repo.replace_ballot("poll1", &named, &["b".to_string()], None)
            .await
            .unwrap();
        assert_eq!(repo.find_by_poll("poll1").await.unwrap().len(), 2);

        // Replacing the named ballot leaves the emailed one alone
        repo.replace_ballot("poll1", &named, &["c".to_string()], None)
            .await
            .unwrap();
        let emailed_rows = repo.find_ballot("poll1", &emailed.key).await.unwrap();
        assert_eq!(emailed_rows.len(), 1);
        assert_eq!(emailed_rows[0].option_id, "a");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_prior_ballot() {
        let repo = seeded_repo().await;
        let alice = resolve_participant("Alice", None).unwrap();
        repo.replace_ballot("poll1", &alice, &["a".to_string()], None)
            .await
            .unwrap();

        // Unknown option violates the foreign key after the delete has run
        let result = repo
            .replace_ballot("poll1", &alice, &["b".to_string(), "nope".to_string()], None)
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let rows = repo.find_ballot("poll1", &alice.key).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].option_id, "a");
    }

    #[tokio::test]
    async fn test_begin_ballot_on_missing_poll() {
        let repo = seeded_repo().await;
        let key = ParticipantKey::Name("alice".to_string());

        let result = repo.begin_ballot("missing", &key).await;
        assert!(matches!(result, Err(AppError::PollNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_dropped_ballot_transaction_writes_nothing() {
        let repo = seeded_repo().await;
        let alice = resolve_participant("Alice", None).unwrap();
        repo.replace_ballot("poll1", &alice, &["a".to_string()], None)
            .await
            .unwrap();

        {
            let ballot = repo.begin_ballot("poll1", &alice.key).await.unwrap();
            assert!(ballot.has_existing().await.unwrap());
        }

        let bob = resolve_participant("Bob", None).unwrap();
        let ballot = repo.begin_ballot("poll1", &bob.key).await.unwrap();
        assert!(!ballot.has_existing().await.unwrap());
        drop(ballot);

        let rows = repo.find_by_poll("poll1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].participant_name, "Alice");
    }

    // Single-connection SQLite serializes every statement, so this only shows
    // that readers never observe the delete without the insert. The
    // multi-connection version runs against Postgres in `db_integration.rs`.
    #[tokio::test]
    async fn test_concurrent_reads_never_see_partial_ballot() {
        let repo = seeded_repo().await;
        let alice = resolve_participant("Alice", None).unwrap();
        repo.replace_ballot("poll1", &alice, &["a".to_string()], None)
            .await
            .unwrap();

        let writer = {
            let repo = repo.clone();
            let alice = alice.clone();
            tokio::spawn(async move {
                for round in 0..40 {
                    let option = if round % 2 == 0 { "b" } else { "a" };
                    repo.replace_ballot("poll1", &alice, &[option.to_string()], None)
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let repo = repo.clone();
                let key = alice.key.clone();
                tokio::spawn(async move {
                    for _ in 0..40 {
                        let rows = repo.find_by_poll("poll1").await.unwrap();
                        let mine = rows.iter().filter(|r| r.participant_key() == key).count();
                        assert_eq!(mine, 1);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
