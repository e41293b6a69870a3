//! Property tests for step selection.

use std::rc::Rc;

use flowmodal_core::{CascadeStorage, Flow, ManualClock, MemoryBackend, ModalConfig, StepConfig};
use proptest::prelude::*;

fn mount(steps: &[(bool, bool)]) -> Flow {
    let configs: Vec<_> = steps
        .iter()
        .map(|&(ready, skippable)| step(ready, skippable, None))
        .collect();
    mount_with(ManualClock::new(1_000), &configs)
}

fn mount_with(clock: Rc<ManualClock>, steps: &[StepConfig]) -> Flow {
    let modal = ModalConfig::default();
    let storage = CascadeStorage::new(
        modal.storage_namespace.clone(),
        modal.storage_duration_ms,
        clock.clone(),
        vec![Box::new(MemoryBackend::new())],
    );
    steps
        .iter()
        .fold(
            Flow::builder(modal).clock(clock).storage(storage),
            |builder, config| builder.step(config.clone()),
        )
        .build()
        .unwrap()
}

fn step(ready: bool, skippable: bool, timeout_ms: Option<u64>) -> StepConfig {
    StepConfig {
        ready,
        skippable,
        timeout_duration_ms: timeout_ms,
        ..StepConfig::default()
    }
}

fn step_strategy() -> impl Strategy<Value = StepConfig> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::option::of(1_000u64..5_000),
    )
        .prop_map(|(ready, skippable, timeout)| step(ready, skippable, timeout))
}

/// Something a page can do to a mounted flow.
#[derive(Debug, Clone)]
enum Op {
    Refresh(bool),
    Deactivated(bool),
    Insert(usize, StepConfig),
    Remove(usize),
    Hide(usize),
    Show(usize),
    Skippable(usize, bool),
    Ready(usize, bool),
    Wait(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Refresh),
        any::<bool>().prop_map(Op::Deactivated),
        (0usize..8, step_strategy()).prop_map(|(i, config)| Op::Insert(i, config)),
        (0usize..8).prop_map(Op::Remove),
        (0usize..8).prop_map(Op::Hide),
        (0usize..8).prop_map(Op::Show),
        (0usize..8, any::<bool>()).prop_map(|(i, flag)| Op::Skippable(i, flag)),
        (0usize..8, any::<bool>()).prop_map(|(i, flag)| Op::Ready(i, flag)),
        (1u64..3_000).prop_map(Op::Wait),
    ]
}

/// Apply `op`. Calls the flow rejects, such as hiding an inactive step or an
/// index past the end, are part of the exercise and their errors are ignored.
fn apply(flow: &mut Flow, clock: &ManualClock, op: Op) {
    let _ = match op {
        Op::Refresh(force) => flow.refresh_state(force),
        Op::Deactivated(flag) => flow.set_deactivated(flag),
        Op::Insert(i, config) => flow.insert_step(i.min(flow.len()), config, None),
        Op::Remove(i) => flow.remove_step(i).map(|_| ()),
        Op::Hide(i) => flow.hide_modal(i),
        Op::Show(i) => flow.show_modal(i),
        Op::Skippable(i, flag) => flow.set_skippable(i, flag),
        Op::Ready(i, flag) => flow.set_ready(i, flag),
        Op::Wait(ms) => {
            clock.advance(ms);
            flow.tick().map(|_| ())
        }
    };
}

/// Where a fresh flow should land.
fn expected_step(steps: &[(bool, bool)]) -> Option<usize> {
    let mut candidate = None;
    for (i, &(ready, skippable)) in steps.iter().enumerate() {
        if !ready {
            break;
        }
        candidate = Some(i);
        if !skippable {
            break;
        }
    }
    candidate
}

proptest! {
    #[test]
    fn fresh_flow_follows_the_skip_chain(
        steps in prop::collection::vec((any::<bool>(), any::<bool>()), 0..8)
    ) {
        let flow = mount(&steps);
        prop_assert_eq!(flow.activated_step_index(), expected_step(&steps));
    }

    #[test]
    fn at_most_one_step_is_active(
        steps in prop::collection::vec(step_strategy(), 1..6),
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let clock = ManualClock::new(1_000);
        let mut flow = mount_with(clock.clone(), &steps);
        for op in ops {
            apply(&mut flow, &clock, op.clone());
            let active = flow.steps().iter().filter(|s| s.active()).count();
            prop_assert!(active <= 1, "{} steps active after {:?}", active, op);
        }
    }
}
