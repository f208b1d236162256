//! Voting-based addition events
//!
//! Before a child entity is added to its parent, every registered voter is
//! asked. A single veto refuses the addition.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// A voter's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vote {
    Accept,
    Veto(String),
}

impl Vote {
    pub fn veto(reason: impl Into<String>) -> Self {
        Self::Veto(reason.into())
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

type Voter<T> = Arc<dyn Fn(&T) -> Vote + Send + Sync>;

/// Collects voters for additions of `T`.
pub struct VotingNotificator<T> {
    voters: RwLock<Vec<Voter<T>>>,
}

impl<T> VotingNotificator<T> {
    pub fn new() -> Self {
        Self {
            voters: RwLock::new(Vec::new()),
        }
    }

    /// Register a voter.
    pub fn on_vote<F>(&self, voter: F)
    where
        F: Fn(&T) -> Vote + Send + Sync + 'static,
    {
        self.voters.write().push(Arc::new(voter));
    }

    /// Ask every voter. All voters are asked even after a veto; the first
    /// veto is returned.
    pub fn vote(&self, candidate: &T) -> Vote {
        // Voters run without the lock held so they may register further voters.
        let voters: Vec<Voter<T>> = self.voters.read().clone();
        let mut outcome = Vote::Accept;
        for voter in voters {
            if let Vote::Veto(reason) = voter(candidate) {
                debug!(reason = reason.as_str(), "Addition vetoed");
                if outcome.is_accepted() {
                    outcome = Vote::Veto(reason);
                }
            }
        }
        outcome
    }

    pub fn voter_count(&self) -> usize {
        self.voters.read().len()
    }
}

impl<T> Default for VotingNotificator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for VotingNotificator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VotingNotificator")
            .field("voters", &self.voter_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn no_voters_accepts() {
        let notificator = VotingNotificator::<u32>::new();
        assert_eq!(notificator.vote(&1), Vote::Accept);
    }

    #[test]
    fn first_veto_wins_but_everyone_is_asked() {
        let asked = Arc::new(AtomicUsize::new(0));
        let notificator = VotingNotificator::<u32>::new();
        for reason in ["too big", "odd"] {
            let asked = asked.clone();
            notificator.on_vote(move |n| {
                asked.fetch_add(1, Ordering::SeqCst);
                if *n > 10 {
                    Vote::veto(reason)
                } else {
                    Vote::Accept
                }
            });
        }

        assert_eq!(notificator.vote(&5), Vote::Accept);
        assert_eq!(notificator.vote(&11), Vote::Veto("too big".into()));
        assert_eq!(asked.load(Ordering::SeqCst), 4);
    }
}
