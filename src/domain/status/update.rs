//! Status transitions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::timestamped::Timestamped;

/// The transition of one entity from an old to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusUpdate<Id, T> {
    pub id: Id,
    pub old_status: Timestamped<T>,
    pub new_status: Timestamped<T>,
}

impl<Id, T: PartialEq> StatusUpdate<Id, T> {
    pub fn new(id: Id, old_status: Timestamped<T>, new_status: Timestamped<T>) -> Self {
        Self {
            id,
            old_status,
            new_status,
        }
    }

    /// Whether the value actually changed (a re-stamp of the same value does not count).
    pub fn is_change(&self) -> bool {
        self.old_status.value != self.new_status.value
    }
}

impl<Id: fmt::Display, T: fmt::Display> fmt::Display for StatusUpdate<Id, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.id, self.old_status.value, self.new_status.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::EvseId;
    use crate::domain::status::EvseStatus;

    #[test]
    fn displays_as_transition() {
        let update = StatusUpdate::new(
            EvseId::parse("DE*GEF*E1").unwrap(),
            Timestamped::now(EvseStatus::Available),
            Timestamped::now(EvseStatus::Charging),
        );
        assert!(update.is_change());
        assert_eq!(update.to_string(), "DE*GEF*E1: Available -> Charging");
    }
}
