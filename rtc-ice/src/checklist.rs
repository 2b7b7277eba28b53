use std::time::Instant;

use stun::TransactionId;

use crate::candidate::RemoteCandidate;

pub const MAX_CHECKLIST_ENTRIES: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Waiting,
    InProgress,
    Succeeded,
    Failed,
}

/// One candidate pair under consideration: our single bound socket against one
/// remote candidate.
#[derive(Debug, Clone)]
pub struct ChecklistEntry {
    pub remote: RemoteCandidate,
    pub priority: u64,
    pub state: EntryState,
    pub nominated: bool,
    pub first_check_at: Option<Instant>,
    pub last_check_at: Option<Instant>,
    pub last_response_at: Option<Instant>,
    pub last_binding_request_at: Option<Instant>,
    pub transaction_id: Option<TransactionId>,
    pub use_candidate_sent: bool,
}

impl ChecklistEntry {
    fn new(remote: RemoteCandidate, priority: u64) -> Self {
        ChecklistEntry {
            remote,
            priority,
            state: EntryState::Waiting,
            nominated: false,
            first_check_at: None,
            last_check_at: None,
            last_response_at: None,
            last_binding_request_at: None,
            transaction_id: None,
            use_candidate_sent: false,
        }
    }
}

/// RFC 8445 §6.1.2.3 pair priority: `2^32 * min(G,D) + 2*max(G,D) + (G>D ? 1 : 0)`.
pub fn pair_priority(controlling_priority: u32, controlled_priority: u32) -> u64 {
    let g = controlling_priority as u64;
    let d = controlled_priority as u64;
    let min = g.min(d);
    let max = g.max(d);
    let tie = if g > d { 1 } else { 0 };
    (min << 32) + 2 * max + tie
}

/// The candidate-pair checklist: at most [`MAX_CHECKLIST_ENTRIES`] entries,
/// always sorted descending by priority, at most one nominated entry.
#[derive(Debug, Default)]
pub struct Checklist {
    entries: Vec<ChecklistEntry>,
}

impl Checklist {
    pub fn new() -> Self {
        Checklist {
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[ChecklistEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nominated(&self) -> Option<&ChecklistEntry> {
        self.entries.iter().find(|e| e.nominated)
    }

    fn find_index(&self, addr: &std::net::SocketAddr) -> Option<usize> {
        self.entries.iter().position(|e| e.remote.addr == *addr)
    }

    /// Adds or updates an entry for `remote`, deduplicated by destination
    /// address. On a priority collision the higher-priority entry wins unless
    /// the incumbent is already nominated. Always re-sorts descending by
    /// priority and trims to [`MAX_CHECKLIST_ENTRIES`].
    pub fn add_or_update(&mut self, remote: RemoteCandidate, priority: u64) {
        if let Some(idx) = self.find_index(&remote.addr) {
            let incumbent = &self.entries[idx];
            if incumbent.nominated || incumbent.priority >= priority {
                return;
            }
            self.entries[idx] = ChecklistEntry::new(remote, priority);
        } else {
            self.entries.push(ChecklistEntry::new(remote, priority));
        }
        self.sort_and_trim();
    }

    fn sort_and_trim(&mut self) {
        self.entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        if self.entries.len() > MAX_CHECKLIST_ENTRIES {
            self.entries.truncate(MAX_CHECKLIST_ENTRIES);
        }
    }

    pub fn mark_in_progress(
        &mut self,
        idx: usize,
        now: Instant,
        transaction_id: TransactionId,
        use_candidate: bool,
    ) {
        let entry = &mut self.entries[idx];
        entry.state = EntryState::InProgress;
        if entry.first_check_at.is_none() {
            entry.first_check_at = Some(now);
        }
        entry.last_check_at = Some(now);
        entry.last_binding_request_at = Some(now);
        entry.transaction_id = Some(transaction_id);
        entry.use_candidate_sent = use_candidate;
    }

    pub fn mark_succeeded(&mut self, idx: usize, now: Instant) {
        let entry = &mut self.entries[idx];
        entry.state = EntryState::Succeeded;
        entry.last_response_at = Some(now);
    }

    pub fn mark_failed(&mut self, idx: usize) {
        self.entries[idx].state = EntryState::Failed;
    }

    /// Nominates the entry at `idx`, clearing nomination on any other entry so
    /// the "at most one nominated" invariant always holds.
    pub fn nominate(&mut self, idx: usize) {
        for (i, e) in self.entries.iter_mut().enumerate() {
            e.nominated = i == idx;
        }
    }

    pub fn find_by_transaction(&self, transaction_id: &TransactionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.transaction_id.as_ref() == Some(transaction_id))
    }

    pub fn find_by_addr(&self, addr: &std::net::SocketAddr) -> Option<usize> {
        self.find_index(addr)
    }

    pub fn get(&self, idx: usize) -> &ChecklistEntry {
        &self.entries[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateKind;

    fn remote(port: u16) -> RemoteCandidate {
        RemoteCandidate {
            foundation: format!("f{port}"),
            component: 1,
            priority: port as u32,
            addr: format!("198.51.100.1:{port}").parse().unwrap(),
            kind: CandidateKind::Host,
        }
    }

    #[test]
    fn sorted_descending_and_bounded() {
        let mut list = Checklist::new();
        for port in 1..=30u16 {
            list.add_or_update(remote(port), port as u64);
        }
        assert!(list.entries().len() <= MAX_CHECKLIST_ENTRIES);
        let priorities: Vec<u64> = list.entries().iter().map(|e| e.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn at_most_one_nominated() {
        let mut list = Checklist::new();
        list.add_or_update(remote(1), 10);
        list.add_or_update(remote(2), 20);
        list.nominate(0);
        list.nominate(1);
        assert_eq!(list.entries().iter().filter(|e| e.nominated).count(), 1);
        assert!(list.entries()[1].nominated);
    }

    #[test]
    fn collision_keeps_nominated_incumbent() {
        let mut list = Checklist::new();
        list.add_or_update(remote(1), 10);
        list.nominate(0);
        list.add_or_update(remote(1), 999);
        assert_eq!(list.entries().len(), 1);
        assert!(list.entries()[0].nominated);
        assert_eq!(list.entries()[0].priority, 10);
    }

    #[test]
    fn pair_priority_favors_controlling_agent_on_tie() {
        let a = pair_priority(100, 100);
        assert_eq!(a, (100u64 << 32) + 201);
    }
}
