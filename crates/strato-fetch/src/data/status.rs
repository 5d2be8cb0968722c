use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a single transfer.
///
/// `Scheduled → InProgress → (Completed | Failed | Cancelled)`; terminal
/// states are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferStatus {
    Scheduled = 0,
    InProgress = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }

    fn from_u8(value: u8) -> TransferStatus {
        match value {
            1 => TransferStatus::InProgress,
            2 => TransferStatus::Completed,
            3 => TransferStatus::Failed,
            4 => TransferStatus::Cancelled,
            _ => TransferStatus::Scheduled,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStatus::Scheduled => "Scheduled",
            TransferStatus::InProgress => "InProgress",
            TransferStatus::Completed => "Completed",
            TransferStatus::Failed => "Failed",
            TransferStatus::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Atomic holder for a transfer status enforcing the state machine.
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(TransferStatus::Scheduled as u8))
    }

    pub fn get(&self) -> TransferStatus {
        TransferStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempt the transition to `next`. Returns false when the current
    /// state is terminal or the transition would move backwards.
    pub fn set(&self, next: TransferStatus) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let state = TransferStatus::from_u8(current);
            let allowed = !state.is_terminal() && (next as u8) > current;
            if !allowed {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_progression() {
        let cell = StatusCell::new();
        assert_eq!(cell.get(), TransferStatus::Scheduled);
        assert!(cell.set(TransferStatus::InProgress));
        assert!(cell.set(TransferStatus::Completed));
        assert_eq!(cell.get(), TransferStatus::Completed);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let cell = StatusCell::new();
        assert!(cell.set(TransferStatus::Failed));
        assert!(!cell.set(TransferStatus::Completed));
        assert!(!cell.set(TransferStatus::Cancelled));
        assert_eq!(cell.get(), TransferStatus::Failed);
    }

    #[test]
    fn test_no_backwards_transition() {
        let cell = StatusCell::new();
        assert!(cell.set(TransferStatus::InProgress));
        assert!(!cell.set(TransferStatus::Scheduled));
        assert_eq!(cell.get(), TransferStatus::InProgress);
    }
}
