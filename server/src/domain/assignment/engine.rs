//! Workload-balancing pick engine
//!
//! Pure, in-memory fairness logic for bulk assignment. The ledger is seeded
//! once from current active-lead counts and then tracks increments itself;
//! the surrounding service decides when to seed and what a pick means.
//!
//! Fairness rules:
//! - the user with the fewest active leads wins the next pick
//! - ties go to the user listed first at seed time
//! - an incremented user re-enters the queue behind users with equal counts
//! - a user who reaches the cap drops out entirely

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Least-loaded-first pick queue over a fixed set of users
pub struct WorkloadLedger {
    users: Vec<String>,
    /// Min-heap of (count, insertion_seq, user index)
    heap: BinaryHeap<Reverse<(i64, u64, usize)>>,
    next_seq: u64,
    cap: i64,
}

impl WorkloadLedger {
    /// Seed from `(user_id, active_lead_count)` pairs, in priority order
    ///
    /// Users already at or above `cap` never enter the queue.
    pub fn new(seeds: Vec<(String, i64)>, cap: i64) -> Self {
        let mut users = Vec::with_capacity(seeds.len());
        let mut heap = BinaryHeap::with_capacity(seeds.len());
        let mut next_seq = 0u64;

        for (user_id, count) in seeds {
            let idx = users.len();
            users.push(user_id);
            if count < cap {
                heap.push(Reverse((count, next_seq, idx)));
                next_seq += 1;
            }
        }

        Self {
            users,
            heap,
            next_seq,
            cap,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pick the least-loaded user and charge them one lead
    ///
    /// Returns `None` once every user is at the cap.
    pub fn pick(&mut self) -> Option<&str> {
        let Reverse((count, _, idx)) = self.heap.pop()?;

        let charged = count + 1;
        if charged < self.cap {
            // Fresh seq puts the user behind others with the same count
            self.heap.push(Reverse((charged, self.next_seq, idx)));
            self.next_seq += 1;
        }

        Some(&self.users[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
        pairs.iter().map(|(u, c)| (u.to_string(), *c)).collect()
    }

    #[test]
    fn test_least_loaded_wins_and_reenters_behind_equals() {
        let mut ledger = WorkloadLedger::new(seeds(&[("u1", 0), ("u2", 3), ("u3", 1)]), 20);

        // u1 has 0 -> picks first; now at 1, behind u3 which also has 1
        assert_eq!(ledger.pick(), Some("u1"));
        assert_eq!(ledger.pick(), Some("u3"));
        assert_eq!(ledger.pick(), Some("u1"));
    }

    #[test]
    fn test_ties_go_to_first_listed() {
        let mut ledger = WorkloadLedger::new(seeds(&[("u1", 2), ("u2", 2), ("u3", 2)]), 20);
        assert_eq!(ledger.pick(), Some("u1"));
        assert_eq!(ledger.pick(), Some("u2"));
        assert_eq!(ledger.pick(), Some("u3"));
        assert_eq!(ledger.pick(), Some("u1"));
    }

    #[test]
    fn test_capped_users_drop_out() {
        let mut ledger = WorkloadLedger::new(seeds(&[("u1", 0), ("u2", 1)]), 2);

        assert_eq!(ledger.pick(), Some("u1")); // u1 -> 1
        assert_eq!(ledger.pick(), Some("u2")); // u2 -> 2, dropped
        assert_eq!(ledger.pick(), Some("u1")); // u1 -> 2, dropped
        assert_eq!(ledger.pick(), None);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_everyone_already_at_cap() {
        let mut ledger = WorkloadLedger::new(seeds(&[("u1", 1), ("u2", 1)]), 1);
        assert!(ledger.is_empty());
        assert_eq!(ledger.pick(), None);
    }

    #[test]
    fn test_no_users() {
        let mut ledger = WorkloadLedger::new(vec![], 20);
        assert!(ledger.is_empty());
        assert_eq!(ledger.pick(), None);
    }
}
