//! Business logic services.

#![allow(missing_docs)]

pub mod capability;
pub mod poll;
pub mod tally;
pub mod user;

pub use capability::{Capability, CapabilityService, Subject};
pub use poll::{
    CreatePollInput, CreatedPoll, OptionView, PollService, PollView, SubmissionStage,
    SubmitBallotInput,
};
pub use tally::{OptionTally, ParticipantBallot};
pub use user::{AccountSession, SigninInput, SignupInput, UserService};
