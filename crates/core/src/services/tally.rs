//! Vote aggregation.
//!
//! Tallies are computed from the current vote rows of one poll. A participant
//! who voted but did not select an option counts as an implicit "no" for it,
//! so `yes_count + no_count` always equals the number of distinct voters.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use agora_common::ParticipantKey;
use agora_db::entities::{poll_option, poll_vote};
use serde::Serialize;

/// Result counts for one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub option_id: String,
    pub label: String,
    pub position: i32,
    pub yes_count: usize,
    pub no_count: usize,
}

/// One participant's current ballot, as shown to organizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantBallot {
    pub name: String,
    pub email: Option<String>,
    /// Selected option ids, in option order.
    pub option_ids: Vec<String>,
    pub comment: Option<String>,
}

/// Number of distinct participants with at least one row.
#[must_use]
pub fn voter_count(votes: &[poll_vote::Model]) -> usize {
    votes
        .iter()
        .map(poll_vote::Model::participant_key)
        .collect::<HashSet<_>>()
        .len()
}

/// Tally every option and sort the result.
///
/// Order: most "yes" first, then fewest "no", then label ignoring case, then
/// position. Rows pointing at options outside `options` only count towards
/// the voter total.
#[must_use]
pub fn aggregate(
    options: &[poll_option::Model],
    votes: &[poll_vote::Model],
) -> Vec<OptionTally> {
    let total = voter_count(votes);

    let mut yes: HashMap<&str, HashSet<ParticipantKey>> = HashMap::new();
    for vote in votes {
        yes.entry(vote.option_id.as_str())
            .or_default()
            .insert(vote.participant_key());
    }

    let mut tallies: Vec<OptionTally> = options
        .iter()
        .map(|option| {
            let yes_count = yes.get(option.id.as_str()).map_or(0, HashSet::len);
            OptionTally {
                option_id: option.id.clone(),
                label: option.label.clone(),
                position: option.position,
                yes_count,
                no_count: total.saturating_sub(yes_count),
            }
        })
        .collect();

    tallies.sort_by(compare_tallies);
    tallies
}

fn compare_tallies(a: &OptionTally, b: &OptionTally) -> Ordering {
    b.yes_count
        .cmp(&a.yes_count)
        .then_with(|| a.no_count.cmp(&b.no_count))
        .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        .then_with(|| a.position.cmp(&b.position))
}

/// The recommended option: the head of the sorted tallies.
///
/// `None` when the poll has no options or nobody has voted yet.
#[must_use]
pub fn recommend(tallies: &[OptionTally]) -> Option<&OptionTally> {
    tallies
        .first()
        .filter(|head| head.yes_count + head.no_count > 0)
}

/// Group rows into per-participant ballots, ordered by name ignoring case.
#[must_use]
pub fn ballots(
    options: &[poll_option::Model],
    votes: &[poll_vote::Model],
) -> Vec<ParticipantBallot> {
    let order: HashMap<&str, i32> = options
        .iter()
        .map(|o| (o.id.as_str(), o.position))
        .collect();

    let mut grouped: BTreeMap<ParticipantKey, Vec<&poll_vote::Model>> = BTreeMap::new();
    for vote in votes {
        grouped.entry(vote.participant_key()).or_default().push(vote);
    }

    let mut result: Vec<(ParticipantKey, ParticipantBallot)> = grouped
        .into_iter()
        .map(|(key, mut rows)| {
            rows.sort_by_key(|row| (order.get(row.option_id.as_str()).copied(), row.option_id.clone()));

            let comment = rows
                .iter()
                .filter_map(|row| row.comment.as_deref())
                .map(str::trim)
                .find(|c| !c.is_empty())
                .map(ToString::to_string);

            let ballot = ParticipantBallot {
                name: rows[0].participant_name.clone(),
                email: rows[0].participant_email.clone(),
                option_ids: rows.iter().map(|row| row.option_id.clone()).collect(),
                comment,
            };
            (key, ballot)
        })
        .collect();

    result.sort_by(|(ka, a), (kb, b)| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| ka.cmp(kb))
    });
    result.into_iter().map(|(_, ballot)| ballot).collect()
}
