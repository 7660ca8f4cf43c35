//! End-to-end sweeps against an in-memory space.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use spacesweep::chain::ChainWriter;
use spacesweep::config::SchemaConfig;
use spacesweep::graph::{GovernanceScript, InMemorySpace, WriteCall, WriteKind};
use spacesweep::models::{Entity, ObjectCounts, ObjectId, Relation, SpaceId};
use spacesweep::sweep::{
    BatchOutcome, FailureStage, Op, ProgressRecorder, RecordingSleeper, StopReason, SweepOptions,
    SweepRunner, TxState, TypeFilter, synthesized_author_id,
};
use spacesweep::{Error, GovernanceMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const OPERATOR: &str = "0x1111111111111111111111111111111111111111";

fn new_space() -> SpaceId {
    SpaceId::new(ObjectId::generate())
}

fn options(space: SpaceId, mode: GovernanceMode) -> SweepOptions {
    SweepOptions::new(space, mode)
        .with_operator_address(Some(OPERATOR.to_string()))
        .with_voter_space(Some(new_space()))
}

fn relation_between(from: ObjectId, to: ObjectId) -> Relation {
    Relation {
        id: ObjectId::generate(),
        type_id: ObjectId::generate(),
        from_id: from,
        to_id: to,
    }
}

/// Three relations and two entities, one of them holding values.
fn scenario_a_space(space: SpaceId) -> InMemorySpace {
    let store = InMemorySpace::new(space);
    let plain = ObjectId::generate();
    let valued = ObjectId::generate();
    store.insert_entity(Entity::new(plain));
    store.insert_entity(
        Entity::new(valued)
            .with_property(ObjectId::generate())
            .with_property(ObjectId::generate()),
    );
    store.insert_relation(relation_between(plain, valued));
    store.insert_relation(relation_between(valued, plain));
    store.insert_relation(relation_between(plain, plain));
    store
}

fn entities_only(space: SpaceId, count: usize) -> InMemorySpace {
    let store = InMemorySpace::new(space);
    for _ in 0..count {
        store.insert_entity(Entity::new(ObjectId::generate()));
    }
    store
}

fn author_creations(store: &InMemorySpace) -> usize {
    let account_type = SchemaConfig::default().account_type_id;
    store
        .writes()
        .iter()
        .flat_map(|w| w.ops().to_vec())
        .filter(|op| matches!(op, Op::CreateRelation { to_entity, .. } if *to_entity == account_type))
        .count()
}

#[test]
fn test_scenario_a_single_batch_empties_space() {
    let space = new_space();
    let store = scenario_a_space(space);
    let runner = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal).with_batch_size(10),
    )
    .with_sleeper(RecordingSleeper::new());

    let report = runner.run().expect("run");
    let pass = &report.passes[0];
    assert_eq!(pass.plan.batches.len(), 1);
    assert_eq!(pass.plan.estimated_ops, 6);
    assert_eq!(pass.counts_before, ObjectCounts::new(2, 3));
    assert_eq!(pass.counts_after, ObjectCounts::new(0, 0));
    assert_eq!(pass.batches[0].outcome, BatchOutcome::Confirmed);
    // Author creation rides along with the only batch.
    assert_eq!(pass.ops_attempted, 6 + 2);
    assert!(runner.gate().sleeper().slept().is_empty());
}

#[test]
fn test_scenario_b_three_paced_batches() {
    let space = new_space();
    let store = entities_only(space, 12_000);
    let runner = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal).with_batch_size(5_000),
    )
    .with_sleeper(RecordingSleeper::new());

    let report = runner.run().expect("run");
    let pass = &report.passes[0];
    let sizes: Vec<usize> = pass.batches.iter().map(|b| b.items).collect();
    assert_eq!(sizes, vec![5_000, 5_000, 2_000]);
    assert!(pass.batches.iter().all(|b| b.outcome.is_completed()));
    assert_eq!(
        runner.gate().sleeper().slept(),
        vec![Duration::from_millis(2_000), Duration::from_millis(2_000)]
    );
    assert_eq!(pass.counts_after, ObjectCounts::new(0, 0));
}

#[test]
fn test_scenario_c_pending_threshold_counts_as_completed() {
    let space = new_space();
    let store = scenario_a_space(space).with_governance(GovernanceScript::Pending);
    let runner = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Governed).with_batch_size(10),
    )
    .with_sleeper(RecordingSleeper::new());

    let report = runner.run().expect("run");
    let pass = &report.passes[0];
    let batch = &pass.batches[0];
    assert_eq!(batch.outcome, BatchOutcome::PendingThreshold);
    assert!(batch.outcome.is_completed());
    assert_eq!(batch.final_state(), TxState::PendingThreshold);
    let vote = batch.vote.expect("vote result");
    assert!(vote.voted);
    assert!(!vote.executed);
    assert_eq!(pass.counts_after, pass.counts_before);
    assert_eq!(pass.batches_pending_threshold(), 1);
    assert_eq!(pass.items_remaining(), 0);

    // Other members approve; the next pass sees an empty space.
    for proposal in store.pending_proposals() {
        store.approve_externally(proposal).expect("approve");
    }
    let again = SweepRunner::new(&store, &store, options(space, GovernanceMode::Governed))
        .with_sleeper(RecordingSleeper::new())
        .run()
        .expect("rerun");
    assert_eq!(again.passes[0].counts_before, ObjectCounts::new(0, 0));
    assert_eq!(again.batches_total(), 0);
}

#[test]
fn test_scenario_d_second_run_is_a_no_op() {
    let space = new_space();
    let store = scenario_a_space(space);
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join(format!("progress-{space}.jsonl"));

    for _ in 0..2 {
        SweepRunner::new(&store, &store, options(space, GovernanceMode::Personal))
            .with_sleeper(RecordingSleeper::new())
            .with_recorder(ProgressRecorder::new(&log))
            .run()
            .expect("run");
    }

    let records = ProgressRecorder::new(&log).read_all().expect("read");
    assert_eq!(records.len(), 2);
    let second = &records[1];
    assert_eq!(second.ops_attempted, 0);
    assert_eq!(second.batches_completed, 0);
    assert_eq!(second.counts_before, ObjectCounts::new(0, 0));
    assert_eq!(store.writes().len(), 1);
}

#[test]
fn test_governed_auto_execute_and_explicit_execute() {
    for (script, expected) in [
        (GovernanceScript::AutoExecute, BatchOutcome::Executed { auto: true }),
        (
            GovernanceScript::ThresholdReached,
            BatchOutcome::Executed { auto: false },
        ),
    ] {
        let space = new_space();
        let store = scenario_a_space(space).with_governance(script);
        let report = SweepRunner::new(&store, &store, options(space, GovernanceMode::Governed))
            .with_sleeper(RecordingSleeper::new())
            .run()
            .expect("run");
        let pass = &report.passes[0];
        assert_eq!(pass.batches[0].outcome, expected);
        assert_eq!(pass.counts_after, ObjectCounts::new(0, 0));

        let executes = store
            .writes()
            .iter()
            .filter(|w| matches!(w, WriteCall::Execute { .. }))
            .count();
        assert_eq!(executes, usize::from(script == GovernanceScript::ThresholdReached));
    }
}

#[test]
fn test_drain_is_idempotent() {
    let space = new_space();
    let store = entities_only(space, 45);
    let drain = |store: &InMemorySpace| {
        SweepRunner::new(
            store,
            store,
            options(space, GovernanceMode::Personal)
                .with_batch_size(8)
                .with_drain(true)
                .with_drain_chunk_size(20),
        )
        .with_sleeper(RecordingSleeper::new())
        .run()
        .expect("drain")
    };

    let first = drain(&store);
    assert_eq!(first.stop_reason, StopReason::Empty);
    assert_eq!(first.passes.len(), 3);
    assert_eq!(first.counts_after(), Some(ObjectCounts::new(0, 0)));

    let writes_after_first = store.writes().len();
    let second = drain(&store);
    assert_eq!(second.stop_reason, StopReason::Empty);
    assert_eq!(second.ops_attempted(), 0);
    assert_eq!(store.writes().len(), writes_after_first);
}

#[test]
fn test_drain_stops_when_nothing_moves() {
    let space = new_space();
    let store = entities_only(space, 30).with_governance(GovernanceScript::Pending);
    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Governed)
            .with_drain(true)
            .with_drain_chunk_size(10),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("drain");

    assert_eq!(report.stop_reason, StopReason::NoProgress);
    assert_eq!(report.passes.len(), 1);
}

#[test]
fn test_drain_respects_max_passes() {
    let space = new_space();
    let store = entities_only(space, 50);
    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal)
            .with_drain(true)
            .with_drain_chunk_size(10)
            .with_max_passes(2),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("drain");

    assert_eq!(report.stop_reason, StopReason::MaxPasses);
    assert_eq!(report.passes.len(), 2);
    assert_eq!(report.counts_after(), Some(ObjectCounts::new(30, 0)));
}

#[test]
fn test_dry_run_matches_live_run() {
    let space = new_space();
    let store = scenario_a_space(space);
    let base = options(space, GovernanceMode::Personal).with_batch_size(2);

    let preview_report = SweepRunner::new(&store, &store, base.clone().with_dry_run(true))
        .with_sleeper(RecordingSleeper::new())
        .run()
        .expect("dry run");
    assert!(preview_report.dry_run);
    assert_eq!(preview_report.stop_reason, StopReason::DryRun);
    assert!(store.writes().is_empty());
    let preview = preview_report.preview.expect("preview");
    assert!(preview.author.is_none());

    let live = SweepRunner::new(&store, &store, base)
        .with_sleeper(RecordingSleeper::new())
        .run()
        .expect("live");
    let pass = &live.passes[0];
    assert_eq!(pass.plan, preview.plan);
    let published: usize = store.writes().iter().map(|w| w.ops().len()).sum();
    assert_eq!(published, preview.plan.estimated_ops + 2);
}

#[test]
fn test_author_created_once_across_runs() {
    let space = new_space();
    let store = entities_only(space, 6);
    let run = |store: &InMemorySpace| {
        SweepRunner::new(
            store,
            store,
            options(space, GovernanceMode::Personal).with_batch_size(2),
        )
        .with_sleeper(RecordingSleeper::new())
        .run()
        .expect("run")
    };

    run(&store);
    for _ in 0..4 {
        store.insert_entity(Entity::new(ObjectId::generate()));
    }
    let second = run(&store);

    assert_eq!(author_creations(&store), 1);
    assert_eq!(second.passes[0].counts_after, ObjectCounts::new(0, 0));
    // The author object itself survives the sweep.
    assert_eq!(store.object_counts(), ObjectCounts::new(1, 1));
}

#[test]
fn test_pending_author_creation_is_not_duplicated_across_runs() {
    let space = new_space();
    let store = entities_only(space, 3).with_governance(GovernanceScript::Pending);
    let run = |store: &InMemorySpace| {
        SweepRunner::new(store, store, options(space, GovernanceMode::Governed))
            .with_sleeper(RecordingSleeper::new())
            .run()
            .expect("run")
    };

    // Neither run can see the other's author: both proposals are still open.
    run(&store);
    run(&store);
    assert_eq!(store.pending_proposals().len(), 2);
    assert_eq!(author_creations(&store), 2);

    for proposal in store.pending_proposals() {
        store.approve_externally(proposal).expect("approve");
    }
    assert!(store.contains_entity(synthesized_author_id(space, OPERATOR)));
    assert_eq!(store.object_counts(), ObjectCounts::new(1, 1));

    store.set_governance(GovernanceScript::AutoExecute);
    let third = run(&store);
    assert_eq!(third.passes[0].counts_before, ObjectCounts::new(0, 0));
    assert_eq!(author_creations(&store), 2);
}

#[test]
fn test_failed_first_batch_retries_author_creation() {
    let space = new_space();
    let store = entities_only(space, 6);
    store.fail_next(WriteKind::Publish, 1);

    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal).with_batch_size(2),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("run");

    let pass = &report.passes[0];
    assert!(matches!(
        pass.batches[0].outcome,
        BatchOutcome::Failed {
            stage: FailureStage::Publish,
            ..
        }
    ));
    assert_eq!(pass.batches_completed(), 2);
    assert_eq!(author_creations(&store), 1);
    assert_eq!(pass.counts_after, ObjectCounts::new(2, 0));
}

#[test]
fn test_vote_failure_is_isolated_to_its_batch() {
    let space = new_space();
    let store = entities_only(space, 9);
    store.fail_next(WriteKind::Vote, 1);

    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Governed).with_batch_size(3),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("run");

    let pass = &report.passes[0];
    assert_eq!(pass.batches.len(), 3);
    assert!(matches!(
        pass.batches[0].outcome,
        BatchOutcome::Failed {
            stage: FailureStage::Vote,
            ..
        }
    ));
    assert_eq!(pass.batches[0].final_state(), TxState::Failed);
    assert_eq!(pass.batches_completed(), 2);
    // The failed proposal is never voted on again.
    assert_eq!(store.pending_proposals().len(), 1);
    assert_eq!(author_creations(&store), 2);
}

#[test]
fn test_enumeration_failure_records_aborted_pass() {
    let space = new_space();
    let store = scenario_a_space(space);
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join("progress.jsonl");
    store.fail_reads(10);

    let result = SweepRunner::new(&store, &store, options(space, GovernanceMode::Personal))
        .with_sleeper(RecordingSleeper::new())
        .with_recorder(ProgressRecorder::new(&log))
        .run();

    assert!(matches!(result, Err(Error::Enumeration { .. })));
    let records = ProgressRecorder::new(&log).read_all().expect("read");
    assert_eq!(records.len(), 1);
    assert!(records[0].aborted);
    assert!(records[0].error.is_some());
    assert!(store.writes().is_empty());
}

#[test]
fn test_stop_flag_between_batches() {
    struct StopAfterFirst<'a> {
        inner: &'a InMemorySpace,
        stop: Arc<AtomicBool>,
    }

    impl ChainWriter for StopAfterFirst<'_> {
        fn publish(
            &self,
            space: SpaceId,
            author: &spacesweep::models::AuthorIdentity,
            name: &str,
            ops: &[Op],
        ) -> spacesweep::Result<spacesweep::chain::Confirmation> {
            let confirmation = self.inner.publish(space, author, name, ops)?;
            self.stop.store(true, Ordering::SeqCst);
            Ok(confirmation)
        }

        fn propose(
            &self,
            space: SpaceId,
            author: &spacesweep::models::AuthorIdentity,
            ops: &[Op],
            voting_mode: spacesweep::models::VotingMode,
        ) -> spacesweep::Result<spacesweep::chain::Confirmation> {
            self.inner.propose(space, author, ops, voting_mode)
        }

        fn vote(
            &self,
            proposal: spacesweep::models::ProposalId,
            voter_space: SpaceId,
            option: spacesweep::models::VoteOption,
        ) -> spacesweep::Result<spacesweep::chain::Confirmation> {
            self.inner.vote(proposal, voter_space, option)
        }

        fn execute(
            &self,
            proposal: spacesweep::models::ProposalId,
        ) -> spacesweep::Result<spacesweep::chain::Confirmation> {
            self.inner.execute(proposal)
        }

        fn proposal_status(
            &self,
            proposal: spacesweep::models::ProposalId,
        ) -> spacesweep::Result<spacesweep::models::ProposalStatus> {
            self.inner.proposal_status(proposal)
        }
    }

    let space = new_space();
    let store = entities_only(space, 10);
    let stop = Arc::new(AtomicBool::new(false));
    let writer = StopAfterFirst {
        inner: &store,
        stop: Arc::clone(&stop),
    };
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join("progress.jsonl");

    let report = SweepRunner::new(
        &store,
        &writer,
        options(space, GovernanceMode::Personal).with_batch_size(3),
    )
    .with_sleeper(RecordingSleeper::new())
    .with_stop_flag(stop)
    .with_recorder(ProgressRecorder::new(&log))
    .run()
    .expect("run");

    assert_eq!(report.stop_reason, StopReason::Stopped);
    let pass = &report.passes[0];
    assert_eq!(pass.batches.len(), 1);
    assert_eq!(pass.batches_skipped, 3);
    assert!(pass.aborted);
    assert_eq!(pass.counts_after, ObjectCounts::new(7, 0));

    let records = ProgressRecorder::new(&log).read_all().expect("read");
    assert!(records[0].aborted);
}

#[test]
fn test_filtered_sweep_reports_nothing_remaining() {
    let space = new_space();
    let store = InMemorySpace::new(space);
    let person = ObjectId::generate();
    let place = ObjectId::generate();
    for _ in 0..3 {
        store.insert_entity(Entity::new(ObjectId::generate()).with_type(person));
        store.insert_entity(Entity::new(ObjectId::generate()).with_type(place));
    }

    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal).with_filter(TypeFilter::any().with_include(person)),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("run");

    let pass = &report.passes[0];
    assert_eq!(pass.batches_failed(), 0);
    assert_eq!(pass.counts_after, ObjectCounts::new(0, 0));
    assert_eq!(pass.items_remaining(), 0);
}

#[test]
fn test_legacy_wallet_author_does_not_block_verification() {
    let space = new_space();
    let store = entities_only(space, 4);
    let legacy = ObjectId::generate();
    store.insert_entity(Entity::new(legacy).with_name("0x2222222222222222222222222222222222222222"));
    store.insert_relation(relation_between(legacy, legacy));

    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal)
            .with_batch_size(2)
            .with_drain(true),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("run");

    assert_eq!(report.stop_reason, StopReason::Empty);
    assert_eq!(report.passes.len(), 1);
    assert_eq!(report.passes[0].counts_before, ObjectCounts::new(4, 0));
    assert_eq!(report.passes[0].items_remaining(), 0);
    assert!(store.contains_entity(legacy));
    assert_eq!(author_creations(&store), 0);
}

#[test]
fn test_type_filter_and_protected_objects() {
    let space = new_space();
    let store = InMemorySpace::new(space);
    let keep_type = ObjectId::generate();
    let drop_type = ObjectId::generate();
    let kept = ObjectId::generate();
    let dropped = ObjectId::generate();
    let wallet = ObjectId::generate();
    store.insert_entity(Entity::new(kept).with_type(keep_type));
    store.insert_entity(Entity::new(dropped).with_type(drop_type));
    store.insert_entity(Entity::new(wallet).with_name(OPERATOR));
    store.insert_relation(relation_between(wallet, dropped));

    let report = SweepRunner::new(
        &store,
        &store,
        options(space, GovernanceMode::Personal)
            .with_filter(TypeFilter::any().with_exclude(keep_type)),
    )
    .with_sleeper(RecordingSleeper::new())
    .run()
    .expect("run");

    let pass = &report.passes[0];
    assert_eq!(pass.enumerated, 1);
    assert!(store.contains_entity(kept));
    assert!(store.contains_entity(wallet));
    assert!(!store.contains_entity(dropped));
    // The wallet-named entity is reused as the author.
    assert_eq!(author_creations(&store), 0);
}
