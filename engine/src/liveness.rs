//! Liveness convergence: keeps `alive` equal to "has a playable continuation".
//!
//! The sweep walks the id space in fixed windows. Each window first revives
//! dead words that have a supporter, then kills alive words that have none,
//! committing each phase on its own. A supporter of `w` is any approved,
//! alive, unconsumed word whose start syllable is in `expand(end(w))`.
//! Passes repeat until one flips nothing. Starting from "everything alive"
//! this reaches the greatest fixpoint, so mutually supporting cycles survive.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use wordchain_config::LivenessConfig;
use wordchain_store::{StoreResult, WordFilter, WordGraphStore};
use wordchain_types::{WordId, WordNode, expand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceOptions {
    pub window_size: u64,
    pub max_passes: u32,
}

impl Default for ConvergenceOptions {
    fn default() -> Self {
        Self {
            window_size: 1000,
            max_passes: 10_000,
        }
    }
}

impl ConvergenceOptions {
    /// Raise zero window size or pass limit to one.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            window_size: self.window_size.max(1),
            max_passes: self.max_passes.max(1),
        }
    }
}

impl From<&LivenessConfig> for ConvergenceOptions {
    fn from(config: &LivenessConfig) -> Self {
        Self {
            window_size: config.window_size,
            max_passes: config.max_passes,
        }
        .clamped()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConvergenceReport {
    pub passes: u32,
    pub revived: u64,
    pub killed: u64,
    /// Window failures summed over all passes.
    pub failed_windows: u64,
    pub converged: bool,
    pub cancelled: bool,
    pub alive_after: u64,
}

#[derive(Debug, Default)]
struct PassStats {
    revived: u64,
    killed: u64,
    windows: u64,
    failed: u64,
}

pub struct LivenessEngine {
    store: Arc<dyn WordGraphStore>,
    options: ConvergenceOptions,
    running: Arc<AtomicBool>,
}

impl LivenessEngine {
    /// `options` is [clamped](ConvergenceOptions::clamped).
    pub fn new(store: Arc<dyn WordGraphStore>, options: ConvergenceOptions) -> Self {
        Self {
            store,
            options: options.clamped(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop the current and any future run at the next window boundary.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark every word alive, then converge.
    ///
    /// Used after a full reset so the result is the greatest fixpoint no
    /// matter what the flags held before.
    pub fn recompute_from_top(&self) -> StoreResult<ConvergenceReport> {
        let flipped = self.store.set_all_alive(true)?;
        info!(flipped, "Reset all words to alive");
        self.converge()
    }

    /// Sweep until no window flips a row, starting from the current flags.
    pub fn converge(&self) -> StoreResult<ConvergenceReport> {
        let mut report = ConvergenceReport::default();
        let Some((lo, hi)) = self.store.id_bounds()? else {
            report.converged = true;
            return Ok(report);
        };

        while report.passes < self.options.max_passes {
            if !self.is_running() {
                report.cancelled = true;
                break;
            }
            report.passes += 1;
            let pass = self.run_pass(lo, hi);
            report.revived += pass.revived;
            report.killed += pass.killed;
            report.failed_windows += pass.failed;
            info!(
                pass = report.passes,
                revived = pass.revived,
                killed = pass.killed,
                failed_windows = pass.failed,
                "Convergence pass complete"
            );

            if !self.is_running() {
                report.cancelled = true;
                break;
            }
            if pass.windows > 0 && pass.failed == pass.windows {
                warn!(pass = report.passes, "Every window failed, stopping convergence");
                break;
            }
            if pass.revived + pass.killed == 0 && pass.failed == 0 {
                report.converged = true;
                break;
            }
        }

        if !report.converged && !report.cancelled && report.passes >= self.options.max_passes {
            warn!(max_passes = self.options.max_passes, "Convergence hit the pass limit");
        }

        report.alive_after = match self.store.count_words(&WordFilter::all().alive(true)) {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "Failed to count alive words after convergence");
                0
            }
        };
        Ok(report)
    }

    fn run_pass(&self, lo: WordId, hi: WordId) -> PassStats {
        let mut stats = PassStats::default();
        let size = i64::try_from(self.options.window_size).unwrap_or(i64::MAX);
        let mut start = lo.value();

        while start <= hi.value() {
            if !self.is_running() {
                break;
            }
            let end = start.saturating_add(size - 1).min(hi.value());
            stats.windows += 1;
            match self.sweep_window(WordId::new(start), WordId::new(end)) {
                Ok((revived, killed)) => {
                    stats.revived += revived;
                    stats.killed += killed;
                }
                Err(err) => {
                    stats.failed += 1;
                    warn!(lo = start, hi = end, error = %err, "Window failed, will retry next pass");
                }
            }
            match end.checked_add(1) {
                Some(next) => start = next,
                None => break,
            }
        }
        stats
    }

    fn sweep_window(&self, lo: WordId, hi: WordId) -> StoreResult<(u64, u64)> {
        let rows = self.store.scan_range(lo, hi)?;
        if rows.is_empty() {
            return Ok((0, 0));
        }

        let mut support = SupportCache::new(self.store.as_ref());
        let mut revive = Vec::new();
        for node in rows.iter().filter(|n| !n.alive) {
            if support.has_supporter(node.end_char)? {
                revive.push(node.id);
            }
        }
        let revived = if revive.is_empty() {
            0
        } else {
            self.store.bulk_set_alive(&revive, true)?
        };

        // Reviving may have created supporters, so the kill phase re-asks.
        let mut support = SupportCache::new(self.store.as_ref());
        let mut kill = Vec::new();
        for node in rows.iter().filter(|n| n.alive || revive.contains(&n.id)) {
            if !support.has_supporter(node.end_char)? {
                kill.push(node.id);
            }
        }
        let killed = if kill.is_empty() {
            0
        } else {
            self.store.bulk_set_alive(&kill, false)?
        };

        debug!(
            lo = lo.value(),
            hi = hi.value(),
            revived,
            killed,
            "Window swept"
        );
        Ok((revived as u64, killed as u64))
    }
}

/// Memoizes "does `expand(c)` have a playable word" per end syllable.
struct SupportCache<'a> {
    store: &'a dyn WordGraphStore,
    known: HashMap<char, bool>,
}

impl<'a> SupportCache<'a> {
    fn new(store: &'a dyn WordGraphStore) -> Self {
        Self {
            store,
            known: HashMap::new(),
        }
    }

    fn has_supporter(&mut self, end_char: char) -> StoreResult<bool> {
        if let Some(&known) = self.known.get(&end_char) {
            return Ok(known);
        }
        let filter = WordFilter::playable_from(expand(end_char).as_slice());
        let supported = self.store.count_words(&filter)? > 0;
        self.known.insert(end_char, supported);
        Ok(supported)
    }
}

/// Check the fixpoint invariant directly. Returns the words whose flag disagrees.
pub fn fixpoint_violations(store: &dyn WordGraphStore) -> StoreResult<Vec<WordNode>> {
    let Some((lo, hi)) = store.id_bounds()? else {
        return Ok(Vec::new());
    };
    let mut support = SupportCache::new(store);
    let mut violations = Vec::new();
    for node in store.scan_range(lo, hi)? {
        if node.alive != support.has_supporter(node.end_char)? {
            violations.push(node);
        }
    }
    Ok(violations)
}

/// Re-run convergence every `every` on a blocking thread until `shutdown`
/// flips to `true` or the engine is cancelled.
pub fn spawn_periodic(
    engine: Arc<LivenessEngine>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; start one period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if !engine.is_running() {
                break;
            }

            let run = Arc::clone(&engine);
            match tokio::task::spawn_blocking(move || run.converge()).await {
                Ok(Ok(report)) => info!(
                    passes = report.passes,
                    revived = report.revived,
                    killed = report.killed,
                    converged = report.converged,
                    "Periodic convergence finished"
                ),
                Ok(Err(err)) => warn!(error = %err, "Periodic convergence failed"),
                Err(err) => warn!(error = %err, "Periodic convergence task panicked"),
            }
        }
        debug!("Periodic convergence stopped");
    })
}
