//! Vote Aggregator
//!
//! Applies vote and un-vote actions to a [`Poll`] while keeping the per-option
//! counts and the per-voter selections in agreement. Callers must hold the
//! poll exclusively for the duration of a call; the registry does that.

use super::poll::{Poll, PollError, UserId};
use serde::Serialize;

/// What a vote action did to the poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum VoteOutcome {
    /// Single-choice re-click on the option already held; nothing changed
    Unchanged,
    /// The option was added to the voter's selections
    Selected,
    /// Single-choice vote moved from another option
    Switched { from: usize },
    /// Multi-choice toggle removed the option from the voter's selections
    Deselected,
}

impl VoteOutcome {
    /// Whether the tally changed and projections should be refreshed
    pub fn is_changed(&self) -> bool {
        !matches!(self, VoteOutcome::Unchanged)
    }

    /// Short acknowledgement shown to the voter
    pub fn notice(&self) -> &'static str {
        match self {
            VoteOutcome::Unchanged | VoteOutcome::Selected | VoteOutcome::Switched { .. } => {
                "Vote saved!"
            }
            VoteOutcome::Deselected => "Selection removed.",
        }
    }
}

/// Apply one click of `voter` on `option`.
///
/// Single-choice polls move the voter's one selection; multi-choice polls
/// toggle membership of `option` in the voter's selection set.
pub fn apply_vote(poll: &mut Poll, voter: &UserId, option: usize) -> Result<VoteOutcome, PollError> {
    if poll.is_closed() {
        return Err(PollError::PollClosed);
    }
    if option >= poll.options().len() {
        return Err(PollError::InvalidOption(option));
    }

    let multi = poll.is_multi_choice();
    let (votes, voters) = poll.tally_mut();

    let outcome = if multi {
        let selections = voters.entry(voter.clone()).or_default();
        if let Some(pos) = selections.iter().position(|&i| i == option) {
            selections.remove(pos);
            votes[option] = votes[option].saturating_sub(1);
            if selections.is_empty() {
                voters.shift_remove(voter);
            }
            VoteOutcome::Deselected
        } else {
            selections.push(option);
            votes[option] += 1;
            VoteOutcome::Selected
        }
    } else {
        let prior = voters.get(voter).and_then(|sel| sel.first().copied());
        match prior {
            Some(prior) if prior == option => VoteOutcome::Unchanged,
            Some(prior) => {
                votes[prior] = votes[prior].saturating_sub(1);
                votes[option] += 1;
                voters.insert(voter.clone(), vec![option]);
                VoteOutcome::Switched { from: prior }
            }
            None => {
                votes[option] += 1;
                voters.insert(voter.clone(), vec![option]);
                VoteOutcome::Selected
            }
        }
    };

    debug_assert!(poll.tally_is_consistent());
    Ok(outcome)
}

/// Signal that a multi-choice voter has finished toggling.
///
/// Changes nothing; it only exists so the caller can refresh its projection.
pub fn set_multi_choice_done(poll: &Poll, _voter: &UserId) -> Result<(), PollError> {
    if !poll.is_multi_choice() {
        return Err(PollError::InvalidInput(
            "poll does not allow multiple choices".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::poll::PollKind;

    fn poll(items: &[&str]) -> Poll {
        Poll::new(
            "creator",
            "chat",
            "Question?",
            items.iter().map(|s| s.to_string()).collect(),
            PollKind::Poll,
        )
        .unwrap()
    }

    fn multi(items: &[&str]) -> Poll {
        let mut p = poll(items);
        assert!(p.set_multi_choice(true));
        p
    }

    #[test]
    fn test_single_choice_switch() {
        let mut p = poll(&["Red", "Blue"]);
        let u1 = UserId::from("U1");

        assert_eq!(apply_vote(&mut p, &u1, 0).unwrap(), VoteOutcome::Selected);
        assert_eq!(
            apply_vote(&mut p, &u1, 1).unwrap(),
            VoteOutcome::Switched { from: 0 }
        );

        assert_eq!(p.votes(), &[0, 1]);
        assert_eq!(p.selections_of(&u1), &[1]);
        assert_eq!(p.voters().len(), 1);
    }

    #[test]
    fn test_single_choice_reclick_is_unchanged() {
        let mut p = poll(&["Red", "Blue"]);
        let u1 = UserId::from("U1");

        apply_vote(&mut p, &u1, 0).unwrap();
        let outcome = apply_vote(&mut p, &u1, 0).unwrap();
        assert_eq!(outcome, VoteOutcome::Unchanged);
        assert!(!outcome.is_changed());
        assert_eq!(p.votes(), &[1, 0]);
    }

    #[test]
    fn test_multi_choice_toggle() {
        let mut p = multi(&["A", "B", "C"]);
        let u1 = UserId::from("U1");

        apply_vote(&mut p, &u1, 0).unwrap();
        apply_vote(&mut p, &u1, 2).unwrap();
        assert_eq!(apply_vote(&mut p, &u1, 0).unwrap(), VoteOutcome::Deselected);

        assert_eq!(p.votes(), &[0, 0, 1]);
        assert_eq!(p.selections_of(&u1), &[2]);
    }

    #[test]
    fn test_multi_choice_empty_voter_is_removed() {
        let mut p = multi(&["A", "B"]);
        let u1 = UserId::from("U1");

        apply_vote(&mut p, &u1, 1).unwrap();
        apply_vote(&mut p, &u1, 1).unwrap();

        assert!(!p.has_voted(&u1));
        assert_eq!(p.votes(), &[0, 0]);
        assert!(p.tally_is_consistent());
    }

    #[test]
    fn test_closed_poll_rejects_votes() {
        let mut p = poll(&["A", "B"]);
        let u1 = UserId::from("U1");
        apply_vote(&mut p, &u1, 0).unwrap();
        p.close();

        assert_eq!(apply_vote(&mut p, &u1, 1), Err(PollError::PollClosed));
        assert_eq!(p.votes(), &[1, 0]);
        assert_eq!(p.selections_of(&u1), &[0]);
    }

    #[test]
    fn test_invalid_option() {
        let mut p = poll(&["A", "B"]);
        let u1 = UserId::from("U1");
        assert_eq!(apply_vote(&mut p, &u1, 2), Err(PollError::InvalidOption(2)));
        assert!(p.voters().is_empty());
    }

    #[test]
    fn test_interleaved_voters_keep_tally() {
        let mut p = multi(&["A", "B", "C"]);
        // Deterministic pseudo-random click sequence across five voters
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let voter = UserId::from(format!("U{}", seed % 5));
            let option = ((seed >> 8) % 3) as usize;
            apply_vote(&mut p, &voter, option).unwrap();
            assert!(p.tally_is_consistent());
        }
    }

    #[test]
    fn test_done_requires_multi_choice() {
        let single = poll(&["A", "B"]);
        let u1 = UserId::from("U1");
        assert!(matches!(
            set_multi_choice_done(&single, &u1),
            Err(PollError::InvalidInput(_))
        ));

        let p = multi(&["A", "B"]);
        assert!(set_multi_choice_done(&p, &u1).is_ok());
    }
}
