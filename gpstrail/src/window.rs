//! Retention window: the bounded, newest-first history of fixes.
//!
//! The window keeps fixes in arrival order with the most recently inserted
//! fix at the head and the oldest at the tail. Eviction walks from the tail
//! and drops every fix whose age has reached the time-to-live.
//!
//! # Eviction scan
//!
//! [`EvictionScan::StopAtFirstFresh`] stops at the first fix that is still
//! within the TTL, assuming arrival order follows timestamp order. A provider
//! that delivers an out-of-order fix can leave expired fixes behind that
//! barrier until it expires itself. [`EvictionScan::Exhaustive`] checks every
//! fix on every pass instead.
//!
//! # Snapshots
//!
//! [`RetentionWindow::snapshot`] copies the current contents into a shared,
//! immutable [`WindowSnapshot`]. Later mutations never reach a snapshot that
//! has already been handed out.
//!
//! Every mutation bumps the window's revision, and each snapshot carries the
//! revision it was taken at. Subscribers use it to tell a late, older
//! snapshot from a newer one.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::fix::Fix;
use crate::time::EpochMillis;

/// Time-to-live of a fix in the window (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Strategy used by [`RetentionWindow::evict_stale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionScan {
    /// Scan from the tail and stop at the first fix that is not stale.
    #[default]
    StopAtFirstFresh,
    /// Remove every stale fix regardless of its position.
    Exhaustive,
}

impl std::fmt::Display for EvictionScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopAtFirstFresh => write!(f, "stop_at_first_fresh"),
            Self::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

impl std::str::FromStr for EvictionScan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop_at_first_fresh" => Ok(Self::StopAtFirstFresh),
            "exhaustive" => Ok(Self::Exhaustive),
            other => Err(format!("unknown eviction scan '{}'", other)),
        }
    }
}

/// Ordered in-memory history of fixes, newest first.
#[derive(Debug, Clone, Default)]
pub struct RetentionWindow {
    fixes: VecDeque<Fix>,
    scan: EvictionScan,
    revision: u64,
}

impl RetentionWindow {
    /// Create an empty window using the default eviction scan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty window with an explicit eviction scan.
    pub fn with_scan(scan: EvictionScan) -> Self {
        Self {
            fixes: VecDeque::new(),
            scan,
            revision: 0,
        }
    }

    /// The eviction strategy in use.
    pub fn scan(&self) -> EvictionScan {
        self.scan
    }

    /// Insert a fix at the head. Always succeeds.
    pub fn insert_newest(&mut self, fix: Fix) {
        self.fixes.push_front(fix);
        self.revision += 1;
    }

    /// Append a fix at the tail.
    ///
    /// Used when seeding the window from a newest-first record list.
    pub fn push_oldest(&mut self, fix: Fix) {
        self.fixes.push_back(fix);
        self.revision += 1;
    }

    /// Remove stale fixes and return how many were removed.
    ///
    /// A fix is stale when `now - timestamp >= ttl`.
    pub fn evict_stale(&mut self, now: EpochMillis, ttl: Duration) -> usize {
        let before = self.fixes.len();

        match self.scan {
            EvictionScan::StopAtFirstFresh => {
                while self
                    .fixes
                    .back()
                    .is_some_and(|oldest| oldest.is_stale_at(now, ttl))
                {
                    self.fixes.pop_back();
                }
            }
            EvictionScan::Exhaustive => {
                self.fixes.retain(|fix| !fix.is_stale_at(now, ttl));
            }
        }

        let evicted = before - self.fixes.len();
        if evicted > 0 {
            self.revision += 1;
        }
        evicted
    }

    /// Take an immutable point-in-time copy of the window.
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            fixes: self.fixes.iter().cloned().collect(),
            revision: self.revision,
        }
    }

    /// Remove every fix.
    pub fn clear(&mut self) {
        self.fixes.clear();
        self.revision += 1;
    }

    /// Mutation counter; starts at 0 and only grows.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of retained fixes.
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    /// True when no fix is retained.
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Most recently inserted fix.
    pub fn newest(&self) -> Option<&Fix> {
        self.fixes.front()
    }

    /// Oldest retained fix.
    pub fn oldest(&self) -> Option<&Fix> {
        self.fixes.back()
    }

    /// Iterate head (newest) to tail (oldest).
    pub fn iter(&self) -> impl Iterator<Item = &Fix> {
        self.fixes.iter()
    }
}

/// Immutable, cheaply clonable view of the window at one point in time.
///
/// Ordered newest first, like the window it was taken from. Snapshots
/// compare by their fixes only.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    fixes: Arc<[Fix]>,
    revision: u64,
}

impl Default for WindowSnapshot {
    fn default() -> Self {
        Self {
            fixes: Arc::from(Vec::new()),
            revision: 0,
        }
    }
}

impl PartialEq for WindowSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.fixes == other.fixes
    }
}

impl WindowSnapshot {
    /// Snapshot containing no fixes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from fixes already ordered newest first.
    pub fn from_fixes(fixes: Vec<Fix>) -> Self {
        Self {
            fixes: fixes.into(),
            revision: 0,
        }
    }

    /// Window revision this snapshot was taken at.
    ///
    /// `0` marks a snapshot built outside a window; such snapshots are never
    /// treated as superseded.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Fixes, newest first.
    pub fn as_slice(&self) -> &[Fix] {
        &self.fixes
    }

    /// Iterate newest to oldest.
    pub fn iter(&self) -> std::slice::Iter<'_, Fix> {
        self.fixes.iter()
    }

    /// Number of fixes.
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    /// True when the snapshot holds no fixes.
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Most recent fix.
    pub fn newest(&self) -> Option<&Fix> {
        self.fixes.first()
    }

    /// Oldest fix.
    pub fn oldest(&self) -> Option<&Fix> {
        self.fixes.last()
    }

    /// Copy out the fixes.
    pub fn to_vec(&self) -> Vec<Fix> {
        self.fixes.to_vec()
    }
}

impl<'a> IntoIterator for &'a WindowSnapshot {
    type Item = &'a Fix;
    type IntoIter = std::slice::Iter<'a, Fix>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
