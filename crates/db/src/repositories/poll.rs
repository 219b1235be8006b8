//! Poll repository.

use std::sync::Arc;

use crate::entities::{Poll, PollOption, poll, poll_option};
use agora_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by its public token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<poll::Model>> {
        Poll::find()
            .filter(poll::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by token, returning error if not found.
    pub async fn get_by_token(&self, token: &str) -> AppResult<poll::Model> {
        self.find_by_token(token)
            .await?
            .ok_or_else(|| AppError::PollNotFound(token.to_string()))
    }

    /// Insert a poll together with its options.
    ///
    /// Either the poll and every option are stored, or nothing is.
    pub async fn create_with_options(
        &self,
        model: poll::ActiveModel,
        options: Vec<poll_option::ActiveModel>,
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let poll = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut inserted = Vec::with_capacity(options.len());
        for option in options {
            let option = option
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            inserted.push(option);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((poll, inserted))
    }

    /// Options of a poll in display order.
    pub async fn find_options(&self, poll_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Position)
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
