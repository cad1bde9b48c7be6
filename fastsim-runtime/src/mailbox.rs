//! Single-slot handoff between a producer thread and the coordinator

use parking_lot::Mutex;
use std::fmt;

/// A slot holding at most one item
///
/// The first item offered wins: while the slot is occupied, further offers
/// are refused and handed back to the caller. [`take`](Mailbox::take) empties
/// the slot atomically.
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Stage `item` if the slot is free, otherwise return it unchanged
    pub fn offer(&self, item: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(item);
        }
        *slot = Some(item);
        Ok(())
    }

    /// Remove and return the staged item; the slot is empty afterwards
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_offer_wins() {
        let mailbox = Mailbox::new();
        assert!(mailbox.offer(1).is_ok());
        assert_eq!(mailbox.offer(2), Err(2));
        assert_eq!(mailbox.take(), Some(1));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_take_frees_slot() {
        let mailbox = Mailbox::new();
        mailbox.offer("a").unwrap();
        assert!(mailbox.is_occupied());
        mailbox.take();
        assert!(!mailbox.is_occupied());
        assert!(mailbox.offer("b").is_ok());
    }

    #[test]
    fn test_concurrent_offers_keep_exactly_one() {
        let mailbox = Arc::new(Mailbox::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mailbox = Arc::clone(&mailbox);
                thread::spawn(move || mailbox.offer(i).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
        assert!(mailbox.take().is_some());
        assert!(mailbox.take().is_none());
    }
}
