//! Poll vote entity.
//!
//! One row per selected option of a participant's current ballot. Options the
//! participant did not select have no row.

use agora_common::ParticipantKey;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll_vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub poll_id: String,

    #[sea_orm(indexed)]
    pub option_id: String,

    /// Display name as submitted (trimmed, original casing)
    pub participant_name: String,

    /// Lowercased name, used to match participants without an email
    pub participant_name_lower: String,

    /// Normalized email (null when the participant gave none)
    #[sea_orm(nullable)]
    pub participant_email: Option<String>,

    /// Participant comment, repeated on each of their rows
    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Identity key of the participant who owns this row.
    #[must_use]
    pub fn participant_key(&self) -> ParticipantKey {
        ParticipantKey::from_stored(&self.participant_name, self.participant_email.as_deref())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Poll,

    #[sea_orm(
        belongs_to = "super::poll_option::Entity",
        from = "Column::OptionId",
        to = "super::poll_option::Column::Id",
        on_delete = "Cascade"
    )]
    PollOption,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
