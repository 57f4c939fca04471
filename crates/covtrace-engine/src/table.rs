use std::collections::HashMap;

/// One runtime address whose execution is tracked during a session.
#[derive(Debug)]
pub struct TrackedAddress {
    addr: u64,
    original: Option<u64>,
    patched: bool,
    hit: bool,
}

impl TrackedAddress {
    fn new(addr: u64) -> Self {
        Self {
            addr,
            original: None,
            patched: false,
            hit: false,
        }
    }

    /// Tracked runtime address.
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Whether the address executed during the session.
    pub fn is_hit(&self) -> bool {
        self.hit
    }

    /// Aligned machine word captured at the address before any patch was
    /// written there, if the session reached installation.
    pub fn original_word(&self) -> Option<u64> {
        self.original
    }

    /// Records the pre-instrumentation word. The first capture wins; the
    /// word must predate any patch.
    pub(crate) fn capture_original(&mut self, word: u64) {
        if self.original.is_none() {
            self.original = Some(word);
        }
    }

    pub(crate) fn is_patched(&self) -> bool {
        self.patched
    }

    pub(crate) fn set_patched(&mut self, patched: bool) {
        self.patched = patched;
    }

    pub(crate) fn mark_hit(&mut self) {
        self.hit = true;
    }
}

/// The set of tracked addresses for one tracing session.
///
/// The table is built by an external collaborator (typically a debug-info
/// resolver), mutated by the session as breakpoints install and trap, and
/// read afterwards by a downstream reporter.
#[derive(Debug, Default)]
pub struct CoverageTable {
    entries: HashMap<u64, TrackedAddress>,
}

impl CoverageTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `addr`. Inserting an address twice is a no-op.
    pub fn insert(&mut self, addr: u64) {
        self.entries
            .entry(addr)
            .or_insert_with(|| TrackedAddress::new(addr));
    }

    /// Looks up the tracked address `addr`.
    pub fn get(&self, addr: u64) -> Option<&TrackedAddress> {
        self.entries.get(&addr)
    }

    pub(crate) fn get_mut(&mut self, addr: u64) -> Option<&mut TrackedAddress> {
        self.entries.get_mut(&addr)
    }

    /// Iterates over all tracked addresses, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedAddress> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedAddress> {
        self.entries.values_mut()
    }

    /// Number of tracked addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table tracks no address at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tracked addresses that executed.
    pub fn hit_count(&self) -> usize {
        self.entries.values().filter(|e| e.hit).count()
    }
}

impl FromIterator<u64> for CoverageTable {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut table = Self::new();
        for addr in iter {
            table.insert(addr);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_keeps_existing_state() {
        let mut table = CoverageTable::new();
        table.insert(0x1000);

        let entry = table.get_mut(0x1000).unwrap();
        entry.capture_original(0xdead_beef);
        entry.mark_hit();

        table.insert(0x1000);

        let entry = table.get(0x1000).unwrap();
        assert_eq!(entry.original_word(), Some(0xdead_beef));
        assert!(entry.is_hit());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn first_captured_original_wins() {
        let mut entry = TrackedAddress::new(0x1000);

        entry.capture_original(0x11);
        entry.capture_original(0x22);

        assert_eq!(entry.original_word(), Some(0x11));
    }

    #[test]
    fn hit_counts_cover_only_hit_entries() {
        let mut table: CoverageTable = [0x1000u64, 0x1040].into_iter().collect();

        table.get_mut(0x1000).unwrap().mark_hit();

        assert_eq!(table.hit_count(), 1);
        assert!(!table.get(0x1040).unwrap().is_hit());
    }
}
