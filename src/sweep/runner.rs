//! Pass orchestration.
//!
//! A pass is `counts -> enumerate -> plan -> drive every batch -> counts ->
//! record`. Drain mode repeats passes over bounded chunks until the space is
//! empty or stops shrinking. Nothing is carried between passes except the
//! cached author: every pass starts from what the read replica reports.

use super::author::AuthorResolver;
use super::enumerator::{Caps, Enumerator, Snapshot, TypeFilter};
use super::gate::{BackoffGate, Sleeper, ThreadSleeper};
use super::ops::{GraphOps, OpsBuilder};
use super::planner::{Plan, plan};
use super::progress::ProgressRecorder;
use super::transactor::{BatchOutcome, BatchReport, FailureStage, Transactor};
use crate::chain::ChainWriter;
use crate::config::{SchemaConfig, SweepConfig, TimingConfig};
use crate::graph::GraphReader;
use crate::models::{
    AuthorIdentity, GovernanceMode, ObjectCounts, ProgressRecord, SpaceId, VotingMode,
};
use crate::{Error, Result, duration_to_millis};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info_span, instrument};

/// Everything a run needs to know about its target.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Target space.
    pub space: SpaceId,
    /// Write path for every batch.
    pub mode: GovernanceMode,
    /// Deletions per batch.
    pub batch_size: usize,
    /// Caps on the objects taken per pass.
    pub caps: Caps,
    /// Type allow/deny lists.
    pub filter: TypeFilter,
    /// Repeat passes until the space is empty or stops shrinking.
    pub drain: bool,
    /// Objects enumerated per drain pass.
    pub drain_chunk_size: usize,
    /// Upper bound on drain passes.
    pub max_passes: u32,
    /// Enumerate and plan only.
    pub dry_run: bool,
    /// GraphQL page size.
    pub page_size: usize,
    /// Voting mode for proposals.
    pub voting_mode: VotingMode,
    /// Operator's personal space, required for governed writes.
    pub voter_space: Option<SpaceId>,
    /// Operator wallet address.
    pub operator_address: Option<String>,
    /// Well-known schema ids.
    pub schema: SchemaConfig,
    /// Pacing delays.
    pub timing: TimingConfig,
}

impl SweepOptions {
    /// Options with built-in defaults.
    #[must_use]
    pub fn new(space: SpaceId, mode: GovernanceMode) -> Self {
        Self::from_config(&SweepConfig::default(), space, mode)
    }

    /// Options taking limits, identity and schema from `config`.
    #[must_use]
    pub fn from_config(config: &SweepConfig, space: SpaceId, mode: GovernanceMode) -> Self {
        Self {
            space,
            mode,
            batch_size: config.batch.batch_size,
            caps: Caps::none(),
            filter: TypeFilter::any(),
            drain: false,
            drain_chunk_size: config.batch.drain_chunk_size,
            max_passes: config.batch.max_passes,
            dry_run: false,
            page_size: config.batch.page_size,
            voting_mode: config.voting_mode,
            voter_space: config.operator.personal_space_id,
            operator_address: config.operator.address.clone(),
            schema: config.schema.clone(),
            timing: config.timing,
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the caps.
    #[must_use]
    pub const fn with_caps(mut self, caps: Caps) -> Self {
        self.caps = caps;
        self
    }

    /// Sets the type filter.
    #[must_use]
    pub fn with_filter(mut self, filter: TypeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Enables drain mode.
    #[must_use]
    pub const fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }

    /// Sets the drain chunk size.
    #[must_use]
    pub const fn with_drain_chunk_size(mut self, size: usize) -> Self {
        self.drain_chunk_size = size;
        self
    }

    /// Sets the pass limit.
    #[must_use]
    pub const fn with_max_passes(mut self, max_passes: u32) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Enables dry run.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the GraphQL page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the voter space.
    #[must_use]
    pub const fn with_voter_space(mut self, voter_space: Option<SpaceId>) -> Self {
        self.voter_space = voter_space;
        self
    }

    /// Sets the operator address.
    #[must_use]
    pub fn with_operator_address(mut self, address: Option<String>) -> Self {
        self.operator_address = address;
        self
    }

    /// Sets the schema ids.
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the pacing delays.
    #[must_use]
    pub const fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    fn pass_caps(&self) -> Caps {
        if self.drain {
            self.caps.with_max_items(self.drain_chunk_size.max(1))
        } else {
            self.caps
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        if !self.dry_run && self.mode == GovernanceMode::Governed && self.voter_space.is_none() {
            return Err(Error::InvalidInput(
                "governed spaces need the operator's personal space id to vote (set [operator].personal_space_id)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Single-pass mode finished its pass.
    SinglePass,
    /// After-counts reached zero.
    Empty,
    /// A pass found nothing to delete.
    NothingEnumerated,
    /// A pass removed nothing.
    NoProgress,
    /// The pass limit was reached.
    MaxPasses,
    /// The stop flag was raised.
    Stopped,
    /// Dry run; nothing was written.
    DryRun,
}

impl StopReason {
    /// Returns the snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePass => "single_pass",
            Self::Empty => "empty",
            Self::NothingEnumerated => "nothing_enumerated",
            Self::NoProgress => "no_progress",
            Self::MaxPasses => "max_passes",
            Self::Stopped => "stopped",
            Self::DryRun => "dry_run",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dry run would do.
#[derive(Debug, Clone)]
pub struct Preview {
    /// Current counts.
    pub counts: ObjectCounts,
    /// Objects the first pass would take.
    pub enumerated: usize,
    /// Protected entities left alone.
    pub skipped_entities: usize,
    /// Relations touching protected entities.
    pub skipped_relations: usize,
    /// Objects rejected by the type filter.
    pub filtered_out: usize,
    /// More objects exist beyond the caps.
    pub truncated: bool,
    /// The batches of the first pass.
    pub plan: Plan,
    /// Existing author, if one was found.
    pub author: Option<AuthorIdentity>,
}

/// Outcome of one pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// One-based pass number.
    pub pass: u32,
    /// Counts before the pass.
    pub counts_before: ObjectCounts,
    /// Counts after the pass.
    pub counts_after: ObjectCounts,
    /// Objects enumerated.
    pub enumerated: usize,
    /// The pass's plan.
    pub plan: Plan,
    /// Per-batch results, in order.
    pub batches: Vec<BatchReport>,
    /// Batches not attempted because the run was stopped.
    pub batches_skipped: usize,
    /// Logical ops submitted.
    pub ops_attempted: usize,
    /// Wall-clock duration.
    pub elapsed_ms: u64,
    /// The pass stopped early.
    pub aborted: bool,
    /// Why the pass stopped early.
    pub error: Option<String>,
}

impl PassReport {
    fn new(pass: u32, counts_before: ObjectCounts) -> Self {
        Self {
            pass,
            counts_before,
            counts_after: counts_before,
            enumerated: 0,
            plan: Plan::default(),
            batches: Vec::new(),
            batches_skipped: 0,
            ops_attempted: 0,
            elapsed_ms: 0,
            aborted: false,
            error: None,
        }
    }

    /// Batches whose transactions went through, pending proposals included.
    #[must_use]
    pub fn batches_completed(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.outcome.is_completed())
            .count()
    }

    /// Batches that failed.
    #[must_use]
    pub fn batches_failed(&self) -> usize {
        self.batches.len() - self.batches_completed()
    }

    /// Completed batches still waiting on other voters.
    #[must_use]
    pub fn batches_pending_threshold(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.outcome == BatchOutcome::PendingThreshold)
            .count()
    }

    /// Objects that disappeared during the pass.
    #[must_use]
    pub const fn removed(&self) -> u64 {
        self.counts_before.removed_since(&self.counts_after)
    }

    /// Objects still present after every batch of the pass succeeded.
    ///
    /// Zero when a batch failed or is pending, since leftovers are expected
    /// then.
    #[must_use]
    pub fn items_remaining(&self) -> u64 {
        let clean = !self.aborted
            && !self.batches.is_empty()
            && self.batches_failed() == 0
            && self.batches_pending_threshold() == 0;
        if clean { self.counts_after.total() } else { 0 }
    }

    /// Builds the progress record for this pass.
    #[must_use]
    pub fn to_record(&self, space: SpaceId, mode: GovernanceMode, batch_size: usize) -> ProgressRecord {
        ProgressRecord {
            timestamp: Utc::now(),
            space_id: space,
            pass: self.pass,
            mode,
            batch_size,
            counts_before: self.counts_before,
            counts_after: self.counts_after,
            ops_attempted: self.ops_attempted,
            batches_completed: self.batches_completed(),
            batches_failed: self.batches_failed(),
            batches_pending_threshold: self.batches_pending_threshold(),
            elapsed_ms: self.elapsed_ms,
            aborted: self.aborted,
            error: self.error.clone(),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Target space.
    pub space: SpaceId,
    /// Write path used.
    pub mode: GovernanceMode,
    /// Nothing was written.
    pub dry_run: bool,
    /// Dry-run preview.
    pub preview: Option<Preview>,
    /// Passes, in order.
    pub passes: Vec<PassReport>,
    /// Why the run ended.
    pub stop_reason: StopReason,
}

impl SweepReport {
    /// Logical ops submitted across all passes.
    #[must_use]
    pub fn ops_attempted(&self) -> usize {
        self.passes.iter().map(|p| p.ops_attempted).sum()
    }

    /// Batches submitted across all passes.
    #[must_use]
    pub fn batches_total(&self) -> usize {
        self.passes.iter().map(|p| p.batches.len()).sum()
    }

    /// Completed batches across all passes.
    #[must_use]
    pub fn batches_completed(&self) -> usize {
        self.passes.iter().map(PassReport::batches_completed).sum()
    }

    /// Failed batches across all passes.
    #[must_use]
    pub fn batches_failed(&self) -> usize {
        self.passes.iter().map(PassReport::batches_failed).sum()
    }

    /// Pending-threshold batches across all passes.
    #[must_use]
    pub fn batches_pending_threshold(&self) -> usize {
        self.passes
            .iter()
            .map(PassReport::batches_pending_threshold)
            .sum()
    }

    /// Counts before the first pass.
    #[must_use]
    pub fn counts_before(&self) -> Option<ObjectCounts> {
        self.preview
            .as_ref()
            .map(|p| p.counts)
            .or_else(|| self.passes.first().map(|p| p.counts_before))
    }

    /// Counts after the last pass.
    #[must_use]
    pub fn counts_after(&self) -> Option<ObjectCounts> {
        self.passes.last().map(|p| p.counts_after)
    }

    /// Returns `true` if any pass was aborted.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.passes.iter().any(|p| p.aborted)
    }

    /// One-paragraph human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(preview) = &self.preview {
            let author = preview.author.as_ref().map_or_else(
                || "none (would be created)".to_string(),
                |a| format!("{} ({:?})", a.id, a.source),
            );
            return format!(
                "Dry run for {} ({}): {}\n  enumerated {} ({} protected entities, {} protected relations, {} filtered{})\n  plan: {}\n  author: {}",
                self.space,
                self.mode,
                preview.counts,
                preview.enumerated,
                preview.skipped_entities,
                preview.skipped_relations,
                preview.filtered_out,
                if preview.truncated { ", more beyond caps" } else { "" },
                preview.plan,
                author,
            );
        }

        let before = self
            .counts_before()
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let after = self
            .counts_after()
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        format!(
            "Sweep of {} ({}): {} passes, {} batches ({} completed, {} pending threshold, {} failed), {} ops\n  before: {}\n  after:  {}\n  stopped: {}",
            self.space,
            self.mode,
            self.passes.len(),
            self.batches_total(),
            self.batches_completed(),
            self.batches_pending_threshold(),
            self.batches_failed(),
            self.ops_attempted(),
            before,
            after,
            self.stop_reason,
        )
    }
}

/// Runs passes against one space.
pub struct SweepRunner<'a, R, W, B = GraphOps, S = ThreadSleeper>
where
    R: GraphReader,
    W: ChainWriter,
    B: OpsBuilder,
    S: Sleeper,
{
    reader: &'a R,
    writer: &'a W,
    ops: B,
    options: SweepOptions,
    recorder: Option<ProgressRecorder>,
    gate: BackoffGate<S>,
    stop: Arc<AtomicBool>,
}

impl<'a, R: GraphReader, W: ChainWriter> SweepRunner<'a, R, W> {
    /// Creates a runner with the standard ops builder and a sleeping gate.
    #[must_use]
    pub fn new(reader: &'a R, writer: &'a W, options: SweepOptions) -> Self {
        Self {
            reader,
            writer,
            ops: GraphOps::new(&options.schema),
            gate: BackoffGate::from_timing(&options.timing),
            options,
            recorder: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl<'a, R, W, B, S> SweepRunner<'a, R, W, B, S>
where
    R: GraphReader,
    W: ChainWriter,
    B: OpsBuilder,
    S: Sleeper,
{
    /// Swaps the ops builder.
    #[must_use]
    pub fn with_ops<B2: OpsBuilder>(self, ops: B2) -> SweepRunner<'a, R, W, B2, S> {
        SweepRunner {
            reader: self.reader,
            writer: self.writer,
            ops,
            options: self.options,
            recorder: self.recorder,
            gate: self.gate,
            stop: self.stop,
        }
    }

    /// Swaps the sleep primitive used between batches.
    #[must_use]
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> SweepRunner<'a, R, W, B, S2> {
        SweepRunner {
            reader: self.reader,
            writer: self.writer,
            ops: self.ops,
            gate: BackoffGate::new(&self.options.timing, sleeper),
            options: self.options,
            recorder: self.recorder,
            stop: self.stop,
        }
    }

    /// Records one progress line per pass.
    #[must_use]
    pub fn with_recorder(mut self, recorder: ProgressRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Shares a stop flag checked between batches and passes.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// The run options.
    #[must_use]
    pub const fn options(&self) -> &SweepOptions {
        &self.options
    }

    /// The pacing gate.
    #[must_use]
    pub const fn gate(&self) -> &BackoffGate<S> {
        &self.gate
    }

    /// Runs the sweep.
    ///
    /// Batch failures are reported, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unusable options and
    /// [`Error::Enumeration`] when a pass cannot enumerate its targets (that
    /// pass is still recorded as aborted).
    #[instrument(
        name = "spacesweep.run",
        skip(self),
        fields(space = %self.options.space, mode = %self.options.mode, drain = self.options.drain)
    )]
    pub fn run(&self) -> Result<SweepReport> {
        self.options.validate()?;

        let enumerator = Enumerator::new(
            self.reader,
            self.options.page_size,
            self.options.schema.account_type_id,
        )
        .with_operator_address(self.options.operator_address.clone());
        let authors = AuthorResolver::new(
            self.reader,
            &self.ops,
            self.options.schema.account_type_id,
            self.options.operator_address.clone(),
        );

        if self.options.dry_run {
            return self.preview(&enumerator, &authors);
        }

        let transactor = Transactor::new(self.writer, self.options.space, self.options.mode)
            .with_voting_mode(self.options.voting_mode)
            .with_voter_space(self.options.voter_space);

        let mut passes = Vec::new();
        let mut pass_number = 0_u32;
        let stop_reason = loop {
            if self.stopped() {
                break StopReason::Stopped;
            }
            pass_number += 1;
            let report = self.run_pass(pass_number, &enumerator, &authors, &transactor);
            let report = match report {
                Ok(report) => report,
                Err((report, err)) => {
                    passes.push(report);
                    return Err(err);
                },
            };
            let reason = self.next_step(&report, pass_number);
            passes.push(report);
            if let Some(reason) = reason {
                break reason;
            }
        };

        tracing::info!(
            passes = passes.len(),
            stop_reason = %stop_reason,
            "Sweep finished"
        );
        Ok(SweepReport {
            space: self.options.space,
            mode: self.options.mode,
            dry_run: false,
            preview: None,
            passes,
            stop_reason,
        })
    }

    /// Decides whether another pass should follow `report`.
    fn next_step(&self, report: &PassReport, pass_number: u32) -> Option<StopReason> {
        if report.aborted {
            return Some(if self.stopped() {
                StopReason::Stopped
            } else {
                StopReason::NoProgress
            });
        }
        if !self.options.drain {
            return Some(StopReason::SinglePass);
        }
        if report.counts_after.is_empty() {
            return Some(StopReason::Empty);
        }
        if report.enumerated == 0 {
            return Some(StopReason::NothingEnumerated);
        }
        if report.batches_completed() == 0 || report.counts_after == report.counts_before {
            tracing::warn!(
                pass = report.pass,
                counts = %report.counts_after,
                "Pass made no progress, stopping drain"
            );
            return Some(StopReason::NoProgress);
        }
        if pass_number >= self.options.max_passes {
            return Some(StopReason::MaxPasses);
        }
        None
    }

    fn preview<BB: OpsBuilder>(
        &self,
        enumerator: &Enumerator<'_, R>,
        authors: &AuthorResolver<'_, R, BB>,
    ) -> Result<SweepReport> {
        let space = self.options.space;
        let caps = self.options.pass_caps();
        let counts = enumerator.counts(space, &self.options.filter)?;
        let snapshot = enumerator.enumerate(space, &self.options.filter, caps)?;
        let plan = plan(&snapshot, caps, self.options.batch_size)?;
        let author = authors.lookup(space)?;

        tracing::info!(
            counts = %counts,
            plan = %plan,
            author = ?author.as_ref().map(|a| a.id),
            "Dry run complete"
        );
        Ok(SweepReport {
            space,
            mode: self.options.mode,
            dry_run: true,
            preview: Some(Preview {
                counts,
                enumerated: snapshot.total(),
                skipped_entities: snapshot.skipped_entities,
                skipped_relations: snapshot.skipped_relations,
                filtered_out: snapshot.filtered_out,
                truncated: snapshot.truncated,
                plan,
                author,
            }),
            passes: Vec::new(),
            stop_reason: StopReason::DryRun,
        })
    }

    /// Runs one pass. An `Err` carries the aborted pass alongside the error.
    #[allow(clippy::cast_precision_loss)]
    fn run_pass<BB: OpsBuilder>(
        &self,
        pass: u32,
        enumerator: &Enumerator<'_, R>,
        authors: &AuthorResolver<'_, R, BB>,
        transactor: &Transactor<'_, W>,
    ) -> std::result::Result<PassReport, (PassReport, Error)> {
        let space = self.options.space;
        let span = info_span!("spacesweep.pass", space = %space, pass);
        let _enter = span.enter();
        let start = Instant::now();

        let filter = &self.options.filter;
        let mut counted = None;
        let prepared = enumerator.counts(space, filter).and_then(|before| {
            counted = Some(before);
            let caps = self.options.pass_caps();
            let snapshot = enumerator.enumerate(space, filter, caps)?;
            let plan = plan(&snapshot, caps, self.options.batch_size)?;
            Ok((before, snapshot, plan))
        });
        let (before, snapshot, plan) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                let err = match err {
                    Error::Enumeration { .. } | Error::InvalidInput(_) => err,
                    other => Error::Enumeration {
                        cause: other.to_string(),
                    },
                };
                tracing::error!(error = %err, "Enumeration failed, aborting pass");
                let mut report = PassReport::new(pass, counted.unwrap_or_default());
                report.aborted = true;
                report.error = Some(err.to_string());
                report.elapsed_ms = duration_to_millis(start.elapsed());
                self.record(&report);
                return Err((report, err));
            },
        };

        let mut report = PassReport::new(pass, before);
        report.enumerated = snapshot.total();
        log_snapshot(&snapshot, &plan, before);
        report.plan = plan;

        if !report.plan.is_empty() {
            self.drive_batches(&mut report, authors, transactor);
        }

        report.counts_after = match enumerator.counts(space, filter) {
            Ok(after) => after,
            Err(err) => {
                tracing::warn!(error = %err, "Could not read counts after pass");
                before
            },
        };
        report.elapsed_ms = duration_to_millis(start.elapsed());
        metrics::histogram!("sweep_pass_duration_ms").record(report.elapsed_ms as f64);

        let remaining = report.items_remaining();
        if remaining > 0 {
            tracing::info!(remaining, "Items remain, re-run");
        }
        tracing::info!(
            before = %report.counts_before,
            after = %report.counts_after,
            completed = report.batches_completed(),
            failed = report.batches_failed(),
            pending = report.batches_pending_threshold(),
            elapsed_ms = report.elapsed_ms,
            "Pass finished"
        );

        self.record(&report);
        Ok(report)
    }

    #[allow(clippy::cast_precision_loss)]
    fn drive_batches<BB: OpsBuilder>(
        &self,
        report: &mut PassReport,
        authors: &AuthorResolver<'_, R, BB>,
        transactor: &Transactor<'_, W>,
    ) {
        let space = self.options.space;
        if let Err(err) = authors.resolve(space) {
            tracing::error!(error = %err, "Author resolution failed, aborting pass");
            report.aborted = true;
            report.error = Some(err.to_string());
            report.batches_skipped = report.plan.batches.len();
            return;
        }

        let total = report.plan.batches.len();
        let started = Instant::now();
        for batch in &report.plan.batches {
            if self.stopped() {
                report.batches_skipped = total - batch.index;
                report.aborted = true;
                report.error = Some("stopped by operator".to_string());
                tracing::warn!(skipped = report.batches_skipped, "Stop requested");
                break;
            }

            let span = info_span!(
                "spacesweep.batch",
                index = batch.index,
                items = batch.len(),
            );
            let _enter = span.enter();

            let batch_report = match authors.resolve(space) {
                Ok(author) => {
                    let mut ops = author.creation_ops;
                    ops.extend(
                        batch
                            .deletions
                            .iter()
                            .flat_map(|deletion| self.ops.ops_for(deletion)),
                    );
                    let result = transactor.drive(batch, &ops, &author.identity);
                    if result.outcome.is_completed() {
                        authors.mark_created(space);
                    } else {
                        authors.forget_uncreated(space);
                    }
                    result
                },
                Err(err) => BatchReport::not_submitted(batch, FailureStage::Author, &err),
            };

            report.ops_attempted += batch_report.ops;
            metrics::counter!("sweep_batches_total", "outcome" => batch_report.outcome.label())
                .increment(1);
            metrics::counter!("sweep_ops_attempted_total").increment(batch_report.ops as u64);
            metrics::histogram!("sweep_batch_duration_ms").record(batch_report.elapsed_ms as f64);

            let done = batch.index + 1;
            let eta_ms = duration_to_millis(started.elapsed()) / done as u64 * (total - done) as u64;
            match &batch_report.outcome {
                BatchOutcome::Failed { stage, error } => tracing::warn!(
                    stage = %stage,
                    error = %error,
                    ops = batch_report.ops,
                    elapsed_ms = batch_report.elapsed_ms,
                    "Batch {}/{} failed",
                    done,
                    total
                ),
                outcome => tracing::info!(
                    outcome = outcome.label(),
                    ops = batch_report.ops,
                    elapsed_ms = batch_report.elapsed_ms,
                    eta_ms,
                    "Batch {}/{} done",
                    done,
                    total
                ),
            }
            report.batches.push(batch_report);

            self.gate
                .wait_after_batch(transactor.mode(), batch.index, total);
        }
    }

    fn record(&self, report: &PassReport) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let record = report.to_record(self.options.space, self.options.mode, self.options.batch_size);
        if let Err(err) = recorder.append(&record) {
            tracing::warn!(
                path = %recorder.path().display(),
                error = %err,
                "Failed to append progress record"
            );
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

fn log_snapshot(snapshot: &Snapshot, plan: &Plan, before: ObjectCounts) {
    tracing::info!(
        counts = %before,
        enumerated = snapshot.total(),
        skipped_entities = snapshot.skipped_entities,
        skipped_relations = snapshot.skipped_relations,
        filtered_out = snapshot.filtered_out,
        truncated = snapshot.truncated,
        plan = %plan,
        "Pass planned"
    );
}
