//! Poll service.
//!
//! Covers the poll lifecycle (creation, viewing, organizer access, archival,
//! deadline changes) and the ballot submission flow.

use std::collections::HashSet;

use agora_common::{
    AppError, AppResult, IdGenerator, Participant, clip_text, resolve_participant,
};
use agora_db::{
    entities::{
        poll::{self, PollType, ResponseMode},
        poll_option,
    },
    repositories::{PollRepository, PollVoteRepository},
};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use super::capability::{Capability, CapabilityService, Subject};
use super::tally::{self, OptionTally, ParticipantBallot};
use super::user::{hash_password, verify_password};

const MAX_TITLE_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 600;
const MAX_CREATOR_CHARS: usize = 80;
const MAX_OPTION_CHARS: usize = 120;
const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 30;
const MIN_ORGANIZER_CODE_CHARS: usize = 8;
const MAX_COMMENT_CHARS: usize = 280;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    vote_repo: PollVoteRepository,
    capabilities: CapabilityService,
    id_gen: IdGenerator,
}

/// Input for creating a poll.
#[derive(Debug, Deserialize)]
pub struct CreatePollInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub response_mode: ResponseMode,
    /// `meeting` or `opinion`; anything else is read as `meeting`.
    #[serde(default)]
    pub poll_type: Option<String>,
    #[serde(default)]
    pub require_consent: bool,
    /// RFC 3339, or `YYYY-MM-DDTHH:MM` read as UTC.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub organizer_code: Option<String>,
    pub options: Vec<String>,
}

/// Input for submitting a ballot.
#[derive(Debug, Deserialize)]
pub struct SubmitBallotInput {
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub consent: bool,
    /// Overwrite an existing ballot from the same participant.
    #[serde(default)]
    pub replace_existing: bool,
}

/// Option as displayed, in position order.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: String,
    pub label: String,
    pub position: i32,
}

/// Everything a poll page shows.
#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub poll: poll::Model,
    /// Archived or past the deadline.
    pub closed: bool,
    pub options: Vec<OptionView>,
    /// Sorted best first.
    pub tallies: Vec<OptionTally>,
    pub recommendation: Option<OptionTally>,
    pub voter_count: usize,
    /// Only present for the organizer and admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballots: Option<Vec<ParticipantBallot>>,
}

/// A freshly created poll with the organizer's token.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedPoll {
    #[serde(flatten)]
    pub view: PollView,
    pub organizer_token: String,
}

/// Progress of one ballot submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Validating,
    CheckingDuplicate,
    Writing,
    Done,
    Rejected,
}

/// Tracks a submission through its stages and logs each transition.
struct Submission<'a> {
    poll_token: &'a str,
    stage: SubmissionStage,
}

impl<'a> Submission<'a> {
    const fn start(poll_token: &'a str) -> Self {
        Self {
            poll_token,
            stage: SubmissionStage::Validating,
        }
    }

    fn advance(&mut self, next: SubmissionStage) {
        tracing::debug!(poll = %self.poll_token, from = ?self.stage, to = ?next, "Ballot stage");
        self.stage = next;
    }

    fn reject(&mut self, err: AppError) -> AppError {
        if err.is_server_error() {
            tracing::warn!(poll = %self.poll_token, stage = ?self.stage, error = %err, "Ballot rejected");
        } else {
            tracing::info!(poll = %self.poll_token, stage = ?self.stage, error = %err, "Ballot rejected");
        }
        self.stage = SubmissionStage::Rejected;
        err
    }
}

/// A ballot that passed validation.
struct ValidBallot {
    participant: Participant,
    option_ids: Vec<String>,
    comment: Option<String>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        vote_repo: PollVoteRepository,
        capabilities: CapabilityService,
    ) -> Self {
        Self {
            poll_repo,
            vote_repo,
            capabilities,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a poll with its options.
    pub async fn create_poll(&self, input: CreatePollInput) -> AppResult<CreatedPoll> {
        let title = clip_text(&input.title, MAX_TITLE_CHARS);
        if title.is_empty() {
            return Err(AppError::Validation("Poll title is required".to_string()));
        }

        let labels: Vec<String> = input
            .options
            .iter()
            .map(|label| clip_text(label, MAX_OPTION_CHARS))
            .filter(|label| !label.is_empty())
            .collect();
        if labels.len() < MIN_OPTIONS {
            return Err(AppError::Validation(format!(
                "Poll must have at least {MIN_OPTIONS} options"
            )));
        }
        if labels.len() > MAX_OPTIONS {
            return Err(AppError::Validation(format!(
                "Poll cannot have more than {MAX_OPTIONS} options"
            )));
        }

        let organizer_code_hash = match input.organizer_code.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(code) if code.chars().count() < MIN_ORGANIZER_CODE_CHARS => {
                return Err(AppError::Validation(format!(
                    "Organizer code must be at least {MIN_ORGANIZER_CODE_CHARS} characters"
                )));
            }
            Some(code) => Some(hash_password(code)?),
        };

        let deadline_at = parse_deadline(input.deadline.as_deref())?;

        let poll_id = self.id_gen.generate();
        let token = self.id_gen.generate_poll_token();

        let model = poll::ActiveModel {
            id: Set(poll_id.clone()),
            token: Set(token.clone()),
            title: Set(title),
            description: Set(optional_text(input.description.as_deref(), MAX_DESCRIPTION_CHARS)),
            creator_name: Set(optional_text(input.creator_name.as_deref(), MAX_CREATOR_CHARS)),
            response_mode: Set(input.response_mode),
            poll_type: Set(PollType::coerce(input.poll_type.as_deref())),
            require_consent: Set(input.require_consent),
            deadline_at: Set(deadline_at),
            organizer_code_hash: Set(organizer_code_hash),
            is_archived: Set(false),
            created_at: Set(Utc::now().into()),
        };

        let options = labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| poll_option::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(poll_id.clone()),
                label: Set(label),
                position: Set(i as i32 + 1),
            })
            .collect();

        let (poll, options) = self.poll_repo.create_with_options(model, options).await?;

        tracing::info!(poll = %poll.token, options = options.len(), "Poll created");

        let organizer_token = self.capabilities.issue(Subject::Organizer {
            poll_token: token,
        })?;
        let view = build_view(poll, options, Vec::new(), true);

        Ok(CreatedPoll {
            view,
            organizer_token,
        })
    }

    /// Load a poll with its current results.
    ///
    /// Individual ballots are included only when `capability` may manage the
    /// poll.
    pub async fn view_poll(
        &self,
        token: &str,
        capability: Option<&Capability>,
    ) -> AppResult<PollView> {
        let poll = self.poll_repo.get_by_token(token).await?;
        let show_ballots = capability.is_some_and(|cap| cap.can_manage(&poll.token));
        self.load_view(poll, show_ballots).await
    }

    /// Record a ballot and return the updated poll view.
    ///
    /// An existing ballot from the same participant is only overwritten when
    /// `replace_existing` is set; otherwise the submission is rejected as a
    /// duplicate and nothing changes.
    pub async fn submit_ballot(&self, input: SubmitBallotInput) -> AppResult<PollView> {
        let mut submission = Submission::start(&input.token);

        let poll = self
            .poll_repo
            .get_by_token(&input.token)
            .await
            .map_err(|e| submission.reject(e))?;
        let options = self
            .poll_repo
            .find_options(&poll.id)
            .await
            .map_err(|e| submission.reject(e))?;

        let ballot = validate_ballot(&poll, &options, &input, Utc::now().fixed_offset())
            .map_err(|e| submission.reject(e))?;

        // The duplicate check and the write share one transaction holding the
        // poll lock, so two first-time submissions cannot both pass the check.
        submission.advance(SubmissionStage::CheckingDuplicate);
        let locked = self
            .vote_repo
            .begin_ballot(&poll.id, &ballot.participant.key)
            .await
            .map_err(|e| submission.reject(e))?;
        let exists = locked
            .has_existing()
            .await
            .map_err(|e| submission.reject(e))?;
        if exists && !input.replace_existing {
            drop(locked);
            return Err(submission.reject(AppError::DuplicateBallot(format!(
                "{} has already voted on this poll",
                ballot.participant.name
            ))));
        }

        submission.advance(SubmissionStage::Writing);
        locked
            .replace(
                &ballot.participant,
                &ballot.option_ids,
                ballot.comment.as_deref(),
            )
            .await
            .map_err(|e| submission.reject(e))?;

        submission.advance(SubmissionStage::Done);
        tracing::info!(
            poll = %poll.token,
            participant = %ballot.participant.key,
            selected = ballot.option_ids.len(),
            replaced = exists,
            "Ballot recorded"
        );

        let votes = self.vote_repo.find_by_poll(&poll.id).await?;
        Ok(build_view(poll, options, votes, false))
    }

    /// Exchange the organizer code for an organizer token.
    pub async fn organizer_login(&self, token: &str, code: &str) -> AppResult<String> {
        let poll = self.poll_repo.get_by_token(token).await?;

        let Some(hash) = poll.organizer_code_hash.as_deref() else {
            return Err(AppError::Unauthorized);
        };
        if !verify_password(code.trim(), hash)? {
            tracing::debug!(poll = %poll.token, "Wrong organizer code");
            return Err(AppError::Unauthorized);
        }

        self.capabilities.issue(Subject::Organizer {
            poll_token: poll.token,
        })
    }

    /// Archive or reopen a poll.
    pub async fn set_archived(
        &self,
        token: &str,
        archived: bool,
        capability: &Capability,
    ) -> AppResult<PollView> {
        let poll = self.managed_poll(token, capability).await?;

        let mut active: poll::ActiveModel = poll.into();
        active.is_archived = Set(archived);
        let poll = self.poll_repo.update(active).await?;

        tracing::info!(poll = %poll.token, archived, "Poll archive flag changed");
        self.load_view(poll, true).await
    }

    /// Change or clear the deadline of a poll.
    pub async fn set_deadline(
        &self,
        token: &str,
        deadline: Option<&str>,
        capability: &Capability,
    ) -> AppResult<PollView> {
        let poll = self.managed_poll(token, capability).await?;
        let deadline_at = parse_deadline(deadline)?;

        let mut active: poll::ActiveModel = poll.into();
        active.deadline_at = Set(deadline_at);
        let poll = self.poll_repo.update(active).await?;

        tracing::info!(poll = %poll.token, deadline = ?poll.deadline_at, "Poll deadline changed");
        self.load_view(poll, true).await
    }

    async fn managed_poll(&self, token: &str, capability: &Capability) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_token(token).await?;
        if !capability.can_manage(&poll.token) {
            return Err(AppError::Forbidden(
                "Only the organizer or an admin can manage this poll".to_string(),
            ));
        }
        Ok(poll)
    }

    async fn load_view(&self, poll: poll::Model, show_ballots: bool) -> AppResult<PollView> {
        let options = self.poll_repo.find_options(&poll.id).await?;
        let votes = self.vote_repo.find_by_poll(&poll.id).await?;
        Ok(build_view(poll, options, votes, show_ballots))
    }
}

fn build_view(
    poll: poll::Model,
    options: Vec<poll_option::Model>,
    votes: Vec<agora_db::entities::poll_vote::Model>,
    show_ballots: bool,
) -> PollView {
    let tallies = tally::aggregate(&options, &votes);
    let recommendation = tally::recommend(&tallies).cloned();
    let ballots = show_ballots.then(|| tally::ballots(&options, &votes));

    PollView {
        closed: poll.is_closed_at(Utc::now().fixed_offset()),
        voter_count: tally::voter_count(&votes),
        options: options
            .into_iter()
            .map(|o| OptionView {
                id: o.id,
                label: o.label,
                position: o.position,
            })
            .collect(),
        tallies,
        recommendation,
        ballots,
        poll,
    }
}

/// Check a submission against the poll's rules.
///
/// Chosen ids come back deduplicated and in option order.
fn validate_ballot(
    poll: &poll::Model,
    options: &[poll_option::Model],
    input: &SubmitBallotInput,
    now: DateTime<FixedOffset>,
) -> AppResult<ValidBallot> {
    if poll.is_closed_at(now) {
        return Err(AppError::Validation(
            "This poll is closed to new votes".to_string(),
        ));
    }
    if options.is_empty() {
        return Err(AppError::Validation("This poll has no options".to_string()));
    }

    let participant = resolve_participant(&input.name, input.email.as_deref())?;

    if poll.require_consent && !input.consent {
        return Err(AppError::Validation(
            "Consent is required to vote on this poll".to_string(),
        ));
    }
    if let Some(email) = participant.email.as_deref()
        && !email.validate_email()
    {
        return Err(AppError::Validation(format!("Invalid email address: {email}")));
    }

    if poll.response_mode == ResponseMode::Single && input.option_ids.len() != 1 {
        return Err(AppError::Validation(
            "Exactly one option must be chosen".to_string(),
        ));
    }

    let chosen: HashSet<&str> = input.option_ids.iter().map(String::as_str).collect();
    let known: HashSet<&str> = options.iter().map(|o| o.id.as_str()).collect();
    if let Some(unknown) = chosen.iter().find(|id| !known.contains(*id)) {
        return Err(AppError::Validation(format!(
            "Option {unknown} does not belong to this poll"
        )));
    }

    let option_ids = options
        .iter()
        .filter(|o| chosen.contains(o.id.as_str()))
        .map(|o| o.id.clone())
        .collect();

    Ok(ValidBallot {
        participant,
        option_ids,
        comment: optional_text(input.comment.as_deref(), MAX_COMMENT_CHARS),
    })
}

fn optional_text(text: Option<&str>, max_chars: usize) -> Option<String> {
    text.map(|t| clip_text(t, max_chars))
        .filter(|t| !t.is_empty())
}

/// Parse a deadline. Blank input means no deadline.
fn parse_deadline(raw: Option<&str>) -> AppResult<Option<DateTime<FixedOffset>>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|naive| Some(naive.and_utc().fixed_offset()))
        .map_err(|_| AppError::Validation(format!("Invalid deadline: {raw}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agora_common::config::AuthConfig;
    use chrono::Duration;
    use std::sync::Arc;

    async fn create_service() -> PollService {
        let conn = Arc::new(agora_db::test_utils::memory_database().await.unwrap());
        let capabilities = CapabilityService::new(&AuthConfig {
            secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
            admin_usernames: vec![],
        })
        .unwrap();

        PollService::new(
            PollRepository::new(conn.clone()),
            PollVoteRepository::new(conn),
            capabilities,
        )
    }

    fn poll_input(mode: ResponseMode, options: &[&str]) -> CreatePollInput {
        CreatePollInput {
            title: "Team dinner".to_string(),
            description: None,
            creator_name: Some("Olga".to_string()),
            response_mode: mode,
            poll_type: None,
            require_consent: false,
            deadline: None,
            organizer_code: Some("organizer-code".to_string()),
            options: options.iter().map(ToString::to_string).collect(),
        }
    }

    fn ballot(token: &str, name: &str, option_ids: &[&str]) -> SubmitBallotInput {
        SubmitBallotInput {
            token: token.to_string(),
            name: name.to_string(),
            email: None,
            option_ids: option_ids.iter().map(ToString::to_string).collect(),
            comment: None,
            consent: false,
            replace_existing: false,
        }
    }

    /// Option id for `label` in a view.
    fn id_of(view: &PollView, label: &str) -> String {
        view.options
            .iter()
            .find(|o| o.label == label)
            .map(|o| o.id.clone())
            .unwrap()
    }

    fn counts(view: &PollView) -> Vec<(String, usize, usize)> {
        view.tallies
            .iter()
            .map(|t| (t.label.clone(), t.yes_count, t.no_count))
            .collect()
    }

    fn row(label: &str, yes: usize, no: usize) -> (String, usize, usize) {
        (label.to_string(), yes, no)
    }

    #[tokio::test]
    async fn test_single_mode_vote_and_replace() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");
        let b = id_of(&created.view, "B");

        let view = service.submit_ballot(ballot(&token, "Alice", &[&a])).await.unwrap();
        assert_eq!(counts(&view), [row("A", 1, 0), row("B", 0, 1)]);
        assert_eq!(view.recommendation.unwrap().label, "A");

        // Same participant, no replace flag
        let err = service
            .submit_ballot(ballot(&token, "alice", &[&b]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateBallot(_)));
        let view = service.view_poll(&token, None).await.unwrap();
        assert_eq!(counts(&view), [row("A", 1, 0), row("B", 0, 1)]);

        let mut replace = ballot(&token, "Alice", &[&b]);
        replace.replace_existing = true;
        let view = service.submit_ballot(replace).await.unwrap();
        assert_eq!(counts(&view), [row("B", 1, 0), row("A", 0, 1)]);
        assert_eq!(view.recommendation.unwrap().label, "B");
        assert_eq!(view.voter_count, 1);
    }

    #[tokio::test]
    async fn test_replace_twice_is_idempotent() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Multiple, &["A", "B", "C"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");
        let c = id_of(&created.view, "C");

        service.submit_ballot(ballot(&token, "Bob", &[&a])).await.unwrap();

        let mut replace = ballot(&token, "Bob", &[&a, &c]);
        replace.replace_existing = true;
        let once = service.submit_ballot(replace).await.unwrap();

        let mut replace = ballot(&token, "Bob", &[&a, &c]);
        replace.replace_existing = true;
        let twice = service.submit_ballot(replace).await.unwrap();

        assert_eq!(once.tallies, twice.tallies);
    }

    #[tokio::test]
    async fn test_multiple_mode_rows_and_implicit_no() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Multiple, &["X", "Y", "Z"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let x = id_of(&created.view, "X");
        let z = id_of(&created.view, "Z");

        // Duplicate ids collapse
        let view = service
            .submit_ballot(ballot(&token, "Vera", &[&z, &x, &z]))
            .await
            .unwrap();

        let y = view.tallies.iter().find(|t| t.label == "Y").unwrap();
        assert_eq!(y.no_count, 1);
        let yes_total: usize = view.tallies.iter().map(|t| t.yes_count).sum();
        assert_eq!(yes_total, 2);
    }

    #[tokio::test]
    async fn test_single_mode_requires_exactly_one() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");
        let b = id_of(&created.view, "B");

        for choice in [vec![], vec![a.as_str(), b.as_str()]] {
            let err = service
                .submit_ballot(ballot(&token, "Alice", &choice))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_foreign_option_rejected() {
        let service = create_service().await;
        let first = service
            .create_poll(poll_input(ResponseMode::Multiple, &["A", "B"]))
            .await
            .unwrap();
        let second = service
            .create_poll(poll_input(ResponseMode::Multiple, &["C", "D"]))
            .await
            .unwrap();
        let c = id_of(&second.view, "C");

        let err = service
            .submit_ballot(ballot(&first.view.poll.token, "Alice", &[&c]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validation_rules() {
        let service = create_service().await;
        let mut input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.require_consent = true;
        let created = service.create_poll(input).await.unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");

        // Missing consent
        let err = service
            .submit_ballot(ballot(&token, "Alice", &[&a]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Blank name
        let mut input = ballot(&token, "   ", &[&a]);
        input.consent = true;
        let err = service.submit_ballot(input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Malformed email
        let mut input = ballot(&token, "Alice", &[&a]);
        input.consent = true;
        input.email = Some("not an email".to_string());
        let err = service.submit_ballot(input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut input = ballot(&token, "Alice", &[&a]);
        input.consent = true;
        input.email = Some(" Alice@Example.com ".to_string());
        input.comment = Some(format!("  {}", "c".repeat(400)));
        let view = service.view_poll(&token, None).await.unwrap();
        assert_eq!(view.voter_count, 0);
        service.submit_ballot(input).await.unwrap();

        let cap = service
            .capabilities
            .verify(&created.organizer_token)
            .unwrap();
        let view = service.view_poll(&token, Some(&cap)).await.unwrap();
        let ballots = view.ballots.unwrap();
        assert_eq!(ballots[0].email.as_deref(), Some("alice@example.com"));
        assert_eq!(ballots[0].comment.as_ref().unwrap().chars().count(), MAX_COMMENT_CHARS);
    }

    #[tokio::test]
    async fn test_overlong_email_rejected() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");

        // Well-formed address whose labels all fit, but too long to store
        let labels = vec!["d".repeat(60); 4].join(".");
        let email = format!("{}@{labels}.com", "u".repeat(64));
        assert!(email.validate_email());

        let mut input = ballot(&token, "Alice", &[&a]);
        input.email = Some(email);
        let err = service.submit_ballot(input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let view = service.view_poll(&token, None).await.unwrap();
        assert_eq!(view.voter_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_ballots_keep_one() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");
        let b = id_of(&created.view, "B");

        for round in 0..20 {
            let name = format!("Voter {round}");
            let first = tokio::spawn({
                let service = service.clone();
                let input = ballot(&token, &name, &[&a]);
                async move { service.submit_ballot(input).await }
            });
            let second = tokio::spawn({
                let service = service.clone();
                let input = ballot(&token, &name, &[&b]);
                async move { service.submit_ballot(input).await }
            });

            let (first, second) = tokio::join!(first, second);
            let results = [first.unwrap(), second.unwrap()];
            let accepted = results.iter().filter(|r| r.is_ok()).count();
            let duplicates = results
                .iter()
                .filter(|r| matches!(r, Err(AppError::DuplicateBallot(_))))
                .count();
            assert_eq!((accepted, duplicates), (1, 1), "round {round}");
        }

        let view = service.view_poll(&token, None).await.unwrap();
        assert_eq!(view.voter_count, 20);
        let total_yes: usize = view.tallies.iter().map(|t| t.yes_count).sum();
        assert_eq!(total_yes, 20);
    }

    #[tokio::test]
    async fn test_poll_type_is_coerced() {
        let service = create_service().await;

        let mut input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.poll_type = Some(" OPINION ".to_string());
        let created = service.create_poll(input).await.unwrap();
        assert_eq!(created.view.poll.poll_type, PollType::Opinion);

        let mut input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.poll_type = Some("survey".to_string());
        let created = service.create_poll(input).await.unwrap();
        assert_eq!(created.view.poll.poll_type, PollType::Meeting);

        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let view = service.view_poll(&created.view.poll.token, None).await.unwrap();
        assert_eq!(view.poll.poll_type, PollType::Meeting);
    }

    #[tokio::test]
    async fn test_closed_poll_rejects_votes() {
        let service = create_service().await;
        let mut input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.deadline = Some((Utc::now() - Duration::hours(1)).to_rfc3339());
        let created = service.create_poll(input).await.unwrap();
        assert!(created.view.closed);

        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");
        let err = service
            .submit_ballot(ballot(&token, "Alice", &[&a]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Organizer clears the deadline, then archives
        let cap = service
            .capabilities
            .verify(&created.organizer_token)
            .unwrap();
        let view = service.set_deadline(&token, None, &cap).await.unwrap();
        assert!(!view.closed);
        service.submit_ballot(ballot(&token, "Alice", &[&a])).await.unwrap();

        let view = service.set_archived(&token, true, &cap).await.unwrap();
        assert!(view.closed);
        let err = service
            .submit_ballot(ballot(&token, "Bob", &[&a]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ballots_hidden_from_public() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();
        let a = id_of(&created.view, "A");
        service.submit_ballot(ballot(&token, "Alice", &[&a])).await.unwrap();

        assert!(service.view_poll(&token, None).await.unwrap().ballots.is_none());

        let other = service
            .capabilities
            .issue(Subject::Organizer {
                poll_token: "someone-else".to_string(),
            })
            .unwrap();
        let other = service.capabilities.verify(&other).unwrap();
        assert!(service.view_poll(&token, Some(&other)).await.unwrap().ballots.is_none());

        let err = service.set_archived(&token, true, &other).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_organizer_login() {
        let service = create_service().await;
        let created = service
            .create_poll(poll_input(ResponseMode::Single, &["A", "B"]))
            .await
            .unwrap();
        let token = created.view.poll.token.clone();

        let issued = service.organizer_login(&token, "organizer-code").await.unwrap();
        let cap = service.capabilities.verify(&issued).unwrap();
        assert!(cap.can_manage(&token));

        let err = service.organizer_login(&token, "wrong-code").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));

        let mut input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.organizer_code = None;
        let no_code = service.create_poll(input).await.unwrap();
        let err = service
            .organizer_login(&no_code.view.poll.token, "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn test_create_poll_validation() {
        let service = create_service().await;

        let mut input = poll_input(ResponseMode::Single, &["A", "  ", ""]);
        let err = service.create_poll(input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.title = "   ".to_string();
        assert!(service.create_poll(input).await.is_err());

        input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.organizer_code = Some("short".to_string());
        assert!(service.create_poll(input).await.is_err());

        input = poll_input(ResponseMode::Single, &["A", "B"]);
        input.deadline = Some("next tuesday".to_string());
        assert!(service.create_poll(input).await.is_err());

        let labels: Vec<String> = (0..31).map(|i| format!("Slot {i}")).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        input = poll_input(ResponseMode::Multiple, &refs);
        assert!(service.create_poll(input).await.is_err());
    }

    #[tokio::test]
    async fn test_create_poll_keeps_option_order() {
        let service = create_service().await;
        let mut input = poll_input(ResponseMode::Multiple, &[" Tue ", "", "Mon"]);
        input.title = format!("  {}", "t".repeat(200));
        let created = service.create_poll(input).await.unwrap();

        let labels: Vec<_> = created.view.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["Tue", "Mon"]);
        assert_eq!(created.view.options[1].position, 2);
        assert_eq!(created.view.poll.title.chars().count(), MAX_TITLE_CHARS);
        assert!(created.view.recommendation.is_none());
    }

    #[tokio::test]
    async fn test_unknown_poll() {
        let service = create_service().await;
        let err = service.view_poll("missing", None).await.unwrap_err();
        assert!(matches!(err, AppError::PollNotFound(_)));
    }

    #[test]
    fn test_parse_deadline_formats() {
        let parsed = parse_deadline(Some("2030-05-01T18:30")).unwrap().unwrap();
        assert_eq!(parsed.to_rfc3339(), "2030-05-01T18:30:00+00:00");

        let parsed = parse_deadline(Some("2030-05-01T18:30:00+02:00")).unwrap().unwrap();
        assert_eq!(parsed.with_timezone(&Utc).to_rfc3339(), "2030-05-01T16:30:00+00:00");

        assert!(parse_deadline(Some("  ")).unwrap().is_none());
        assert!(parse_deadline(None).unwrap().is_none());
        assert!(parse_deadline(Some("01/05/2030")).is_err());
    }
}
