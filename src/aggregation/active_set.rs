//! Active set (`Sigma`) — which matches currently contribute to the "left"
//! (eta1) side of a split candidate versus the complement (eta2), with a
//! journal allowing `O(|changed|)` rollback (spec §3, §4.4).
//!
//! Matches whose aggregated value is null are pinned inactive for the
//! lifetime of the set: every mutator routes through [`ActiveSet::set`],
//! which refuses to activate a null position regardless of call order, so
//! "null samples are always deactivated" is an invariant rather than
//! something callers must remember to re-assert after `activate_all`.

pub struct ActiveSet {
    active: Vec<bool>,
    is_null: Vec<bool>,
    /// Positions flipped since the last [`ActiveSet::checkpoint`], recorded
    /// so [`ActiveSet::rollback`] can restore exactly those positions
    /// without rescanning the whole set.
    journal: Vec<usize>,
}

impl ActiveSet {
    pub fn new(is_null: Vec<bool>) -> Self {
        let active = vec![false; is_null.len()];
        ActiveSet { active, is_null, journal: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_active(&self, i: usize) -> bool {
        self.active[i]
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.is_null[i]
    }

    /// Sets position `i`'s membership. A null position is never activated.
    /// When `journal` is `true` the flip is recorded for a later
    /// [`ActiveSet::rollback`]; pass `false` for mutations meant to become
    /// the new permanent baseline (use [`ActiveSet::checkpoint`] after).
    pub fn set(&mut self, i: usize, want: bool, journal: bool) {
        if self.is_null[i] {
            return;
        }
        if self.active[i] != want {
            if journal {
                self.journal.push(i);
            }
            self.active[i] = want;
        }
    }

    pub fn activate_all(&mut self) {
        for i in 0..self.active.len() {
            self.set(i, true, false);
        }
    }

    pub fn deactivate_all(&mut self) {
        for i in 0..self.active.len() {
            self.set(i, false, false);
        }
    }

    /// Clears the journal without touching membership: the current state
    /// becomes the new baseline that `rollback` cannot undo past.
    pub fn checkpoint(&mut self) {
        self.journal.clear();
    }

    /// Undoes every flip recorded since the last checkpoint, restoring
    /// exactly the pre-checkpoint membership.
    pub fn rollback_to(&mut self, baseline: &[bool]) {
        for &i in &self.journal {
            self.active[i] = baseline[i];
        }
        self.journal.clear();
    }

    pub fn snapshot(&self) -> Vec<bool> {
        self.active.clone()
    }
}
