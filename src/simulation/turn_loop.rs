//! The world's main loop
//!
//! One background task owns the loop and is the only writer to the store.
//! Each turn snapshots the characters once and runs assemble → decide →
//! consolidate for each in creation order. Per-character failures that do
//! not involve storage are logged and the character is skipped; storage
//! failures end the loop.

use crate::error::Result;
use crate::memory::ContextAssembler;
use crate::simulation::{ConsolidationScheduler, DecisionStep};
use crate::storage::MemoryStore;
use crate::types::{Character, Turn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{error, info};

/// Shared cooperative stop signal
#[derive(Debug, Clone)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolves once [`stop`](Self::stop) has been called
    pub async fn stopped(&self) {
        loop {
            // Register before checking so a concurrent stop is not missed
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

/// Outcome of one turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub turn: Turn,
    pub decisions: usize,
    pub fallbacks: usize,
    pub facts_recorded: usize,
    pub reflections_updated: usize,
    /// Characters whose turn was abandoned after a non-storage error
    pub skipped: Vec<String>,
}

pub struct TurnLoop {
    store: Arc<dyn MemoryStore>,
    assembler: ContextAssembler,
    decision: DecisionStep,
    consolidation: ConsolidationScheduler,
    turn_delay: Duration,
    max_turns: Option<u64>,
    flag: RunFlag,
}

impl TurnLoop {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        assembler: ContextAssembler,
        decision: DecisionStep,
        consolidation: ConsolidationScheduler,
        turn_delay: Duration,
        max_turns: Option<u64>,
        flag: RunFlag,
    ) -> Self {
        Self {
            store,
            assembler,
            decision,
            consolidation,
            turn_delay,
            max_turns,
            flag,
        }
    }

    pub fn flag(&self) -> &RunFlag {
        &self.flag
    }

    /// Run turns until the flag is cleared or `max_turns` turns completed.
    ///
    /// Resumes at the turn after the last recorded one. Returns the last
    /// turn completed, or the resume point minus one if none ran.
    pub async fn run(&self) -> Result<Turn> {
        let mut turn = self.store.current_turn().await? + 1;
        let mut completed: u64 = 0;
        let reached = |completed: u64| self.max_turns.is_some_and(|max| completed >= max);

        info!("World resuming at turn {}", turn);

        while self.flag.is_running() && !reached(completed) {
            let report = self.run_turn(turn).await?;
            if !report.skipped.is_empty() {
                error!("Turn {}: skipped {}", turn, report.skipped.join(", "));
            }

            completed += 1;
            turn += 1;

            if reached(completed) {
                info!("Reached {} turns, stopping", completed);
                break;
            }

            tokio::select! {
                _ = sleep(self.turn_delay) => {}
                _ = self.flag.stopped() => {}
            }
        }

        info!("World stopped after turn {}", turn - 1);
        Ok(turn - 1)
    }

    /// Every character acts once at `turn`
    pub async fn run_turn(&self, turn: Turn) -> Result<TurnReport> {
        let characters = self.store.characters().await?;
        info!("=== Turn {} ({} characters) ===", turn, characters.len());

        let mut report = TurnReport {
            turn,
            ..Default::default()
        };

        for character in &characters {
            match self.act(turn, character, &mut report).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Turn {}: skipping {}: {}", turn, character.name, e);
                    report.skipped.push(character.name.clone());
                }
            }
        }

        Ok(report)
    }

    async fn act(&self, turn: Turn, character: &Character, report: &mut TurnReport) -> Result<()> {
        let ctx = self.assembler.assemble(character).await?;
        let decision = self.decision.decide(turn, &ctx).await?;
        report.decisions += 1;
        if decision.used_fallback {
            report.fallbacks += 1;
        }

        let consolidated = self
            .consolidation
            .consolidate(turn, character, &decision.narration, &ctx.recent_or_none())
            .await?;
        report.facts_recorded += consolidated.facts_recorded;
        if consolidated.reflection_updated {
            report.reflections_updated += 1;
        }

        Ok(())
    }
}
