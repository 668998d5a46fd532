//! Leadership state machine.
//!
//! # States
//! ```text
//! Unknown → Acquiring → Leader → Lost
//!               │
//!               └── cancelled (stays Acquiring, elector is never reused)
//! ```

use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipState {
    Unknown,
    Acquiring,
    Leader,
    Lost,
}

impl LeadershipState {
    pub fn is_leader(self) -> bool {
        self == Self::Leader
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: LeadershipState) -> bool {
        use LeadershipState::*;
        matches!(
            (self, next),
            (Unknown, Acquiring) | (Acquiring, Leader) | (Leader, Lost)
        )
    }
}

impl fmt::Display for LeadershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Acquiring => "acquiring",
            Self::Leader => "leader",
            Self::Lost => "lost",
        };
        f.write_str(s)
    }
}

/// Read-only view of an elector's state.
#[derive(Clone)]
pub struct LeadershipWatch {
    rx: watch::Receiver<LeadershipState>,
}

impl LeadershipWatch {
    pub(crate) fn new(rx: watch::Receiver<LeadershipState>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> LeadershipState {
        *self.rx.borrow()
    }

    pub fn is_leader(&self) -> bool {
        self.current().is_leader()
    }

    /// Wait until the state becomes Leader.
    ///
    /// Returns `false` if the elector went away or reached Lost first.
    pub async fn wait_for_leader(&mut self) -> bool {
        match self
            .rx
            .wait_for(|s| matches!(s, LeadershipState::Leader | LeadershipState::Lost))
            .await
        {
            Ok(state) => state.is_leader(),
            Err(_) => false,
        }
    }

    /// Wait until the state becomes Lost (or the elector is dropped).
    pub async fn wait_for_lost(&mut self) {
        let _ = self.rx.wait_for(|s| *s == LeadershipState::Lost).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LeadershipState::*;

    #[test]
    fn test_transitions() {
        assert!(Unknown.can_transition_to(Acquiring));
        assert!(Acquiring.can_transition_to(Leader));
        assert!(Leader.can_transition_to(Lost));

        // Lost is terminal.
        for next in [Unknown, Acquiring, Leader, Lost] {
            assert!(!Lost.can_transition_to(next));
        }
        assert!(!Unknown.can_transition_to(Leader));
        assert!(!Leader.can_transition_to(Acquiring));
    }
}
