//! Poll Registry
//!
//! Owns every published poll. Each poll sits behind its own mutex so that
//! votes and management actions on one poll are applied one at a time while
//! different polls proceed independently. Readers get cloned snapshots.

use super::poll::{Poll, PollError, PollId, UserId};
use super::vote::{self, VoteOutcome};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

type PollSlot = Arc<Mutex<Poll>>;

/// Registry of published polls, in insertion order
#[derive(Debug, Default)]
pub struct PollEngine {
    polls: RwLock<IndexMap<PollId, PollSlot>>,
}

impl PollEngine {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a published poll. Fails if its identifier is already taken.
    pub fn insert(&self, poll: Poll) -> Result<PollId, PollError> {
        let id = poll.id().clone();
        let mut polls = self.polls.write();
        if polls.contains_key(&id) {
            return Err(PollError::InvalidInput(format!(
                "poll with ID '{}' already exists",
                id
            )));
        }
        polls.insert(id.clone(), Arc::new(Mutex::new(poll)));
        info!(poll_id = %id, "poll registered");
        Ok(id)
    }

    /// Snapshot of a poll
    pub fn get(&self, id: &PollId) -> Result<Poll, PollError> {
        let slot = self.slot(id)?;
        let poll = slot.lock();
        live(&poll, id)?;
        Ok(poll.clone())
    }

    /// Whether `id` is still registered
    pub fn contains(&self, id: &PollId) -> bool {
        self.polls.read().contains_key(id)
    }

    /// Snapshots of every poll created by `creator`, in insertion order
    pub fn list_by_creator(&self, creator: &UserId) -> Vec<Poll> {
        let slots: Vec<PollSlot> = self.polls.read().values().cloned().collect();
        slots
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|poll| poll.is_created_by(creator))
            .collect()
    }

    /// Apply a vote and return the outcome with a snapshot taken under the
    /// same lock.
    pub fn vote(
        &self,
        id: &PollId,
        voter: &UserId,
        option: usize,
    ) -> Result<(VoteOutcome, Poll), PollError> {
        let slot = self.slot(id)?;
        Self::vote_in_slot(&slot, id, voter, option)
    }

    fn vote_in_slot(
        slot: &PollSlot,
        id: &PollId,
        voter: &UserId,
        option: usize,
    ) -> Result<(VoteOutcome, Poll), PollError> {
        let mut poll = slot.lock();
        live(&poll, id)?;
        let outcome = vote::apply_vote(&mut poll, voter, option)?;
        debug!(poll_id = %id, voter = %voter, option, ?outcome, "vote applied");
        Ok((outcome, poll.clone()))
    }

    /// Open or close a poll on behalf of its creator
    pub fn set_closed(&self, id: &PollId, actor: &UserId, closed: bool) -> Result<Poll, PollError> {
        self.update_as_creator(id, actor, |poll| {
            if closed {
                poll.close();
            } else {
                poll.reopen();
            }
        })
    }

    /// Delete a poll on behalf of its creator and return its final state
    pub fn remove(&self, id: &PollId, actor: &UserId) -> Result<Poll, PollError> {
        let mut polls = self.polls.write();
        let slot = polls
            .get(id)
            .cloned()
            .ok_or_else(|| PollError::NotFound(id.clone()))?;
        let mut poll = slot.lock();
        live(&poll, id)?;
        if !poll.is_created_by(actor) {
            return Err(PollError::NotAuthorized);
        }
        poll.mark_deleted();
        let last = poll.clone();
        drop(poll);
        polls.shift_remove(id);
        info!(poll_id = %id, "poll deleted");
        Ok(last)
    }

    /// Run `updater` on a poll if `actor` created it
    pub fn update_as_creator(
        &self,
        id: &PollId,
        actor: &UserId,
        updater: impl FnOnce(&mut Poll),
    ) -> Result<Poll, PollError> {
        let slot = self.slot(id)?;
        Self::update_in_slot(&slot, id, actor, updater)
    }

    fn update_in_slot(
        slot: &PollSlot,
        id: &PollId,
        actor: &UserId,
        updater: impl FnOnce(&mut Poll),
    ) -> Result<Poll, PollError> {
        let mut poll = slot.lock();
        live(&poll, id)?;
        if !poll.is_created_by(actor) {
            return Err(PollError::NotAuthorized);
        }
        updater(&mut poll);
        Ok(poll.clone())
    }

    /// Snapshot of a poll that only its creator may see
    pub fn get_as_creator(&self, id: &PollId, actor: &UserId) -> Result<Poll, PollError> {
        let poll = self.get(id)?;
        if !poll.is_created_by(actor) {
            return Err(PollError::NotAuthorized);
        }
        Ok(poll)
    }

    pub fn len(&self) -> usize {
        self.polls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registry statistics
    pub fn stats(&self) -> PollEngineStats {
        let slots: Vec<PollSlot> = self.polls.read().values().cloned().collect();
        let mut stats = PollEngineStats {
            total_polls: slots.len(),
            ..PollEngineStats::default()
        };
        for slot in &slots {
            let poll = slot.lock();
            if poll.is_closed() {
                stats.closed_polls += 1;
            } else {
                stats.open_polls += 1;
            }
            stats.total_selections += poll.total_selections() as usize;
            stats.total_voters += poll.voters().len();
        }
        stats
    }

    fn slot(&self, id: &PollId) -> Result<PollSlot, PollError> {
        self.polls
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PollError::NotFound(id.clone()))
    }
}

/// A slot fetched before a concurrent delete still points at the removed
/// poll; treat it as gone.
fn live(poll: &Poll, id: &PollId) -> Result<(), PollError> {
    if poll.is_deleted() {
        return Err(PollError::NotFound(id.clone()));
    }
    Ok(())
}

/// Statistics for the poll registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollEngineStats {
    /// Total number of polls
    pub total_polls: usize,
    /// Polls accepting votes
    pub open_polls: usize,
    /// Closed polls
    pub closed_polls: usize,
    /// Selections across all polls
    pub total_selections: usize,
    /// Voters across all polls (a user voting in two polls counts twice)
    pub total_voters: usize,
}

/// Create a shared poll registry
pub fn create_engine() -> Arc<PollEngine> {
    Arc::new(PollEngine::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::poll::PollKind;
    use std::thread;

    fn create_test_poll(creator: &str) -> Poll {
        Poll::new(
            creator,
            "chat",
            "Favorite color?",
            vec!["Red".to_string(), "Blue".to_string(), "Green".to_string()],
            PollKind::Poll,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let engine = PollEngine::new();
        let poll = create_test_poll("user1");
        let id = engine.insert(poll.clone()).unwrap();

        let retrieved = engine.get(&id).unwrap();
        assert_eq!(retrieved.question(), "Favorite color?");

        // Duplicate should fail
        assert!(engine.insert(poll).is_err());

        let missing = PollId::from("nonexistent");
        assert_eq!(engine.get(&missing).unwrap_err(), PollError::NotFound(missing));
    }

    #[test]
    fn test_list_by_creator_in_insertion_order() {
        let engine = PollEngine::new();
        let a = engine.insert(create_test_poll("user1")).unwrap();
        engine.insert(create_test_poll("user2")).unwrap();
        let c = engine.insert(create_test_poll("user1")).unwrap();

        let listed: Vec<PollId> = engine
            .list_by_creator(&UserId::from("user1"))
            .iter()
            .map(|p| p.id().clone())
            .collect();
        assert_eq!(listed, vec![a, c]);
        assert!(engine.list_by_creator(&UserId::from("nobody")).is_empty());
    }

    #[test]
    fn test_close_and_reopen_poll() {
        let engine = PollEngine::new();
        let id = engine.insert(create_test_poll("user1")).unwrap();
        let owner = UserId::from("user1");

        let closed = engine.set_closed(&id, &owner, true).unwrap();
        assert!(closed.is_closed());

        let reopened = engine.set_closed(&id, &owner, false).unwrap();
        assert!(!reopened.is_closed());
    }

    #[test]
    fn test_only_creator_can_manage() {
        let engine = PollEngine::new();
        let id = engine.insert(create_test_poll("user1")).unwrap();
        let intruder = UserId::from("user2");

        assert_eq!(
            engine.set_closed(&id, &intruder, true).unwrap_err(),
            PollError::NotAuthorized
        );
        assert_eq!(engine.remove(&id, &intruder).unwrap_err(), PollError::NotAuthorized);
        assert_eq!(
            engine.get_as_creator(&id, &intruder).unwrap_err(),
            PollError::NotAuthorized
        );
        assert!(!engine.get(&id).unwrap().is_closed());
    }

    #[test]
    fn test_remove_poll() {
        let engine = PollEngine::new();
        let id = engine.insert(create_test_poll("user1")).unwrap();
        let owner = UserId::from("user1");

        assert!(engine.remove(&id, &owner).is_ok());
        assert!(engine.get(&id).is_err());
        assert_eq!(engine.remove(&id, &owner).unwrap_err(), PollError::NotFound(id));
    }

    #[test]
    fn test_slot_held_across_delete_rejects_changes() {
        let engine = PollEngine::new();
        let id = engine.insert(create_test_poll("user1")).unwrap();
        let owner = UserId::from("user1");
        let slot = engine.slot(&id).unwrap();

        let last = engine.remove(&id, &owner).unwrap();
        assert!(last.is_deleted());

        let err = PollEngine::vote_in_slot(&slot, &id, &UserId::from("late"), 0).unwrap_err();
        assert_eq!(err, PollError::NotFound(id.clone()));
        let err = PollEngine::update_in_slot(&slot, &id, &owner, |poll| poll.close()).unwrap_err();
        assert_eq!(err, PollError::NotFound(id.clone()));

        let poll = slot.lock();
        assert_eq!(poll.votes(), &[0, 0, 0]);
        assert!(!poll.is_closed());
    }

    #[test]
    fn test_vote_on_closed_poll() {
        let engine = PollEngine::new();
        let id = engine.insert(create_test_poll("user1")).unwrap();
        engine.set_closed(&id, &UserId::from("user1"), true).unwrap();

        let err = engine.vote(&id, &UserId::from("voter"), 0).unwrap_err();
        assert_eq!(err, PollError::PollClosed);
        assert_eq!(engine.get(&id).unwrap().votes(), &[0, 0, 0]);
    }

    #[test]
    fn test_concurrent_votes_keep_tally() {
        let engine = create_engine();
        let mut poll = create_test_poll("user1");
        poll.set_multi_choice(true);
        let id = engine.insert(poll).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let engine = Arc::clone(&engine);
                let id = id.clone();
                thread::spawn(move || {
                    let voter = UserId::from(format!("voter{}", t));
                    for i in 0..300 {
                        engine.vote(&id, &voter, (i + t) % 3).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let poll = engine.get(&id).unwrap();
        assert!(poll.tally_is_consistent());
        // 300 toggles per voter: every option toggled 100 times, an even count
        assert_eq!(poll.total_selections(), 0);
        assert!(poll.voters().is_empty());
    }

    #[test]
    fn test_engine_stats() {
        let engine = PollEngine::new();
        assert_eq!(engine.stats(), PollEngineStats::default());

        let a = engine.insert(create_test_poll("user1")).unwrap();
        let b = engine.insert(create_test_poll("user1")).unwrap();
        engine.vote(&a, &UserId::from("v1"), 0).unwrap();
        engine.vote(&a, &UserId::from("v2"), 1).unwrap();
        engine.set_closed(&b, &UserId::from("user1"), true).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total_polls, 2);
        assert_eq!(stats.open_polls, 1);
        assert_eq!(stats.closed_polls, 1);
        assert_eq!(stats.total_selections, 2);
        assert_eq!(stats.total_voters, 2);
    }
}
