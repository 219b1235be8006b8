//! Poll entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How many options a ballot may select.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Exactly one option per ballot.
    #[default]
    #[sea_orm(string_value = "single")]
    Single,
    /// Any subset of the options, including none.
    #[sea_orm(string_value = "multiple")]
    Multiple,
}

/// What the poll is about. Only affects presentation.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PollType {
    /// Picking a date or slot.
    #[default]
    #[sea_orm(string_value = "meeting")]
    Meeting,
    /// Gathering opinions on a question.
    #[sea_orm(string_value = "opinion")]
    Opinion,
}

impl PollType {
    /// Read a submitted poll type. Blank or unknown values fall back to
    /// [`PollType::Meeting`].
    #[must_use]
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_lowercase()).as_deref() {
            Some("opinion") => Self::Opinion,
            _ => Self::Meeting,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Public, unguessable identifier shared with participants
    #[sea_orm(unique)]
    pub token: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub creator_name: Option<String>,

    pub response_mode: ResponseMode,

    pub poll_type: PollType,

    /// Whether voters must tick the consent box
    #[sea_orm(default_value = false)]
    pub require_consent: bool,

    /// Votes are refused after this instant (null for no deadline)
    #[sea_orm(nullable)]
    pub deadline_at: Option<DateTimeWithTimeZone>,

    /// Argon2 hash of the organizer code
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub organizer_code_hash: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_archived: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the poll refuses new ballots at `now`.
    #[must_use]
    pub fn is_closed_at(&self, now: DateTimeWithTimeZone) -> bool {
        self.is_archived || self.deadline_at.is_some_and(|deadline| now > deadline)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,

    #[sea_orm(has_many = "super::poll_vote::Entity")]
    PollVote,
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl Related<super::poll_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollVote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
