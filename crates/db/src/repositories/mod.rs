//! Database repositories.

mod poll;
mod poll_vote;
mod user;

pub use poll::PollRepository;
pub use poll_vote::{BallotTransaction, PollVoteRepository};
pub use user::UserRepository;
