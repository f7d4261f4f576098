//! Live object accounting.
//!
//! Pairs creation and deletion lines by `(connection, identity)` to answer
//! "what is still alive, and who allocated it?". Every tracer numbers its
//! objects from 1, so an identity alone is ambiguous across connections.
//!
//! # Architecture
//!
//! - **`LiveObjectTracker`** - incremental aggregation as lines arrive
//! - **`LiveObjectSummary`** - snapshot for printing at the end of a run
//!
//! ## Data Flow
//!
//! ```text
//! c_<id>_... ──► live.insert((conn, id), site)    created += 1
//! d_<id>_... ──► live.remove((conn, id))          destroyed += 1, lifetime += Δt
//!                    └─ unknown id ──► unmatched += 1
//! ```
//!
//! # Performance
//!
//! - `record()`: O(1) amortized
//! - `summary()`: O(live + sites log sites)
//! - Memory: O(live objects); the site string is shared per allocation site

// Mean lifetime is reported as a float
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use objtrace_common::{Flavor, WireEvent, EMPTY_FRAMES_MARKER};

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// One allocation site ranked by objects still alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSite {
    /// Nearest rendered frame of the allocation (`<empty>` when none)
    pub site: String,
    pub live: u64,
}

/// End-of-run view of a tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveObjectSummary {
    pub created: u64,
    pub destroyed: u64,
    pub live: u64,
    /// Deletions with no creation on the same connection. Runtime-internal
    /// objects are tagged but their creations are never transmitted, so
    /// most of these are expected; the rest come from lines dropped on a
    /// full queue.
    pub unmatched_deletions: u64,
    /// Creations per flavor, in wire order
    pub by_flavor: Vec<(Flavor, u64)>,
    /// Mean creation-to-deletion time of destroyed objects
    pub mean_lifetime_ms: Option<f64>,
    pub top_sites: Vec<AllocationSite>,
}

impl fmt::Display for LiveObjectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "objects: {} created, {} destroyed, {} live", self.created, self.destroyed, self.live)?;
        if self.unmatched_deletions > 0 {
            writeln!(f, "unmatched deletions: {}", self.unmatched_deletions)?;
        }
        for (flavor, count) in self.by_flavor.iter().filter(|(_, count)| *count > 0) {
            writeln!(f, "  {:<4} {count}", flavor.code())?;
        }
        if let Some(mean) = self.mean_lifetime_ms {
            writeln!(f, "mean lifetime: {mean:.1} ms")?;
        }
        if !self.top_sites.is_empty() {
            writeln!(f, "top live allocation sites:")?;
            for site in &self.top_sites {
                writeln!(f, "  {:>8}  {}", site.live, site.site)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// TRACKER
// =============================================================================

#[derive(Debug)]
struct LiveObject {
    created_at_ms: u64,
    site: Arc<str>,
}

/// Incremental creation/deletion pairing.
#[derive(Debug, Default)]
pub struct LiveObjectTracker {
    /// Keyed by (connection, identity)
    live: HashMap<(u64, u64), LiveObject>,
    /// Interned site strings
    sites: HashMap<String, Arc<str>>,
    created: u64,
    destroyed: u64,
    unmatched_deletions: u64,
    by_flavor: [u64; Flavor::COUNT],
    total_lifetime_ms: u64,
}

impl LiveObjectTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one event received on `connection`.
    pub fn record(&mut self, connection: u64, event: &WireEvent) {
        match event {
            WireEvent::Creation(line) => {
                self.created += 1;
                self.by_flavor[line.flavor.index()] += 1;

                let site = line
                    .frames
                    .first()
                    .map_or_else(|| EMPTY_FRAMES_MARKER.to_string(), ToString::to_string);
                let site = Arc::clone(self.sites.entry(site.clone()).or_insert_with(|| Arc::from(site)));
                self.live.insert((connection, line.id), LiveObject { created_at_ms: line.timestamp_ms, site });
            }
            WireEvent::Deletion(line) => match self.live.remove(&(connection, line.id)) {
                Some(object) => {
                    self.destroyed += 1;
                    let lifetime = line.timestamp_ms.saturating_sub(object.created_at_ms);
                    self.total_lifetime_ms = self.total_lifetime_ms.saturating_add(lifetime);
                }
                None => self.unmatched_deletions += 1,
            },
        }
    }

    #[must_use]
    pub fn live_count(&self) -> u64 {
        self.live.len() as u64
    }

    /// Snapshot with the `top` allocation sites by live objects.
    #[must_use]
    pub fn summary(&self, top: usize) -> LiveObjectSummary {
        let mut per_site: HashMap<&Arc<str>, u64> = HashMap::new();
        for object in self.live.values() {
            *per_site.entry(&object.site).or_insert(0) += 1;
        }

        let mut top_sites: Vec<AllocationSite> = per_site
            .into_iter()
            .map(|(site, live)| AllocationSite { site: site.to_string(), live })
            .collect();
        top_sites.sort_unstable_by(|a, b| b.live.cmp(&a.live).then_with(|| a.site.cmp(&b.site)));
        top_sites.truncate(top);

        LiveObjectSummary {
            created: self.created,
            destroyed: self.destroyed,
            live: self.live_count(),
            unmatched_deletions: self.unmatched_deletions,
            by_flavor: Flavor::ALL.iter().map(|f| (*f, self.by_flavor[f.index()])).collect(),
            mean_lifetime_ms: (self.destroyed > 0)
                .then(|| self.total_lifetime_ms as f64 / self.destroyed as f64),
            top_sites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut LiveObjectTracker, lines: &[&str]) {
        for line in lines {
            tracker.record(1, &line.parse().unwrap());
        }
    }

    #[test]
    fn test_pairs_creations_and_deletions() {
        let mut tracker = LiveObjectTracker::new();
        feed(
            &mut tracker,
            &[
                "c_1_U_1000_Foo.bar@10[Foo.java:20]",
                "c_2_U_1000_Foo.bar@10[Foo.java:20]",
                "c_3_U_1500_Main.main@5[Main.java:3]",
                "d_1_1100",
                "d_3_1800",
            ],
        );

        let summary = tracker.summary(10);
        assert_eq!((summary.created, summary.destroyed, summary.live), (3, 2, 1));
        assert_eq!(summary.mean_lifetime_ms, Some(200.0));
        assert_eq!(
            summary.top_sites,
            vec![AllocationSite { site: "Foo.bar@10[Foo.java:20]".to_string(), live: 1 }]
        );
    }

    #[test]
    fn test_counts_unmatched_deletions() {
        let mut tracker = LiveObjectTracker::new();
        feed(&mut tracker, &["d_99_1000"]);
        let summary = tracker.summary(5);
        assert_eq!(summary.unmatched_deletions, 1);
        assert_eq!(summary.destroyed, 0);
        assert_eq!(summary.mean_lifetime_ms, None);
    }

    #[test]
    fn test_same_identity_on_two_connections() {
        let mut tracker = LiveObjectTracker::new();
        tracker.record(1, &"c_1_U_1000_A.a@1[A.java:1]".parse().unwrap());
        tracker.record(2, &"c_1_U_1000_B.b@1[B.java:1]".parse().unwrap());
        tracker.record(2, &"d_1_1200".parse().unwrap());

        let summary = tracker.summary(5);
        assert_eq!((summary.created, summary.destroyed, summary.live), (2, 1, 1));
        assert_eq!(summary.unmatched_deletions, 0);
        assert_eq!(summary.top_sites[0].site, "A.a@1[A.java:1]");

        // a deletion is never matched against another connection's creation
        tracker.record(3, &"d_1_1300".parse().unwrap());
        assert_eq!(tracker.live_count(), 1);
        assert_eq!(tracker.summary(5).unmatched_deletions, 1);
    }

    #[test]
    fn test_lifetime_total_saturates() {
        let mut tracker = LiveObjectTracker::new();
        feed(
            &mut tracker,
            &["c_1_U_0_<empty>", "c_2_U_0_<empty>", "d_1_18446744073709551615", "d_2_18446744073709551615"],
        );
        let summary = tracker.summary(5);
        assert_eq!(summary.destroyed, 2);
        assert_eq!(summary.mean_lifetime_ms, Some(u64::MAX as f64 / 2.0));
    }

    #[test]
    fn test_ranks_sites_by_live_objects() {
        let mut tracker = LiveObjectTracker::new();
        feed(
            &mut tracker,
            &[
                "c_1_U_1_A.a@1[A.java:1]",
                "c_2_U_1_B.b@1[B.java:1]",
                "c_3_U_1_B.b@1[B.java:1]",
                "c_4_BVS_1_<empty>",
            ],
        );

        let summary = tracker.summary(2);
        assert_eq!(summary.top_sites.len(), 2);
        assert_eq!(summary.top_sites[0].site, "B.b@1[B.java:1]");
        assert_eq!(summary.top_sites[0].live, 2);

        let flavors: HashMap<Flavor, u64> = summary.by_flavor.into_iter().collect();
        assert_eq!(flavors[&Flavor::User], 3);
        assert_eq!(flavors[&Flavor::BeforeRuntimeStart], 1);
    }

    #[test]
    fn test_summary_display() {
        let mut tracker = LiveObjectTracker::new();
        feed(&mut tracker, &["c_1_U_1_A.a@1[A.java:1]"]);
        let text = tracker.summary(5).to_string();
        assert!(text.contains("1 created, 0 destroyed, 1 live"));
        assert!(text.contains("A.a@1[A.java:1]"));
    }
}
