use std::collections::HashMap;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded};
use overcrab_core::config::{OverWindowConfig, RetentionConfig};
use overcrab_core::runtime::{ParallelRunner, Task};
use overcrab_core::state::HashMapStateBackend;
use overcrab_core::time::ManualClock;
use overcrab_core::types::{JoinedRow, StreamElement};
use overcrab_core::window::{AggregateFunction, AggregateFunctionExecutor, OverWindowOperator};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
struct Event {
    user: String,
    seq: u32,
    value: i64,
}

struct SumValues;

impl AggregateFunction<Event, i64, i64> for SumValues {
    fn create_accumulator(&self) -> i64 {
        0
    }

    fn add(&self, acc: &mut i64, element: &Event) {
        *acc += element.value;
    }

    fn get_result(&self, acc: i64) -> i64 {
        acc
    }
}

type SumOperator<C> = OverWindowOperator<
    String,
    Event,
    i64,
    AggregateFunctionExecutor<SumValues, i64>,
    HashMapStateBackend,
    C,
>;

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn gen_events(seed: u64, n: usize, num_users: usize) -> Vec<Event> {
    let mut state = seed;
    let mut seqs = vec![0u32; num_users];
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let user = (lcg_next(&mut state) % num_users as u64) as usize;
        let value = (lcg_next(&mut state) % 100) as i64;
        out.push(Event {
            user: format!("user_{user}"),
            seq: seqs[user],
            value,
        });
        seqs[user] += 1;
    }
    out
}

/// Sum of each event's value and the `preceding` events of the same user before it.
fn expected_sums(events: &[Event], preceding: usize) -> HashMap<(String, u32), i64> {
    let mut history: HashMap<String, Vec<i64>> = HashMap::new();
    let mut expected = HashMap::new();
    for event in events {
        let values = history.entry(event.user.clone()).or_default();
        values.push(event.value);
        let start = values.len().saturating_sub(preceding + 1);
        expected.insert(
            (event.user.clone(), event.seq),
            values[start..].iter().sum::<i64>(),
        );
    }
    expected
}

#[test]
fn parallel_sums_match_a_sequential_model() {
    let events = gen_events(7, 2_000, 13);
    let preceding = 4;

    let runner = ParallelRunner::new(4, |_subtask| {
        OverWindowOperator::with_defaults(
            OverWindowConfig::new(preceding as u64),
            AggregateFunctionExecutor::<_, i64>::new(SumValues),
        )
    })
    .unwrap();
    let input: Vec<(String, Event)> = events.iter().map(|e| (e.user.clone(), e.clone())).collect();
    let outputs: Vec<JoinedRow<Event, i64>> = runner.run(input).unwrap();

    assert_eq!(outputs.len(), events.len());
    let expected = expected_sums(&events, preceding);
    let mut last_seq: HashMap<String, u32> = HashMap::new();
    for row in &outputs {
        let key = (row.input.user.clone(), row.input.seq);
        assert_eq!(row.aggregate, expected[&key], "window sum for {key:?}");

        // Per-user output order follows input order.
        if let Some(previous) = last_seq.insert(row.input.user.clone(), row.input.seq) {
            assert!(previous < row.input.seq);
        }
    }
}

fn manual_operator(clock: &ManualClock) -> SumOperator<ManualClock> {
    OverWindowOperator::new(
        OverWindowConfig::new(2).with_retention(RetentionConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(120),
        )),
        AggregateFunctionExecutor::new(SumValues),
        HashMapStateBackend::new(),
        clock.clone(),
    )
    .unwrap()
}

fn records(rx: &crossbeam_channel::Receiver<StreamElement<JoinedRow<Event, i64>>>) -> Vec<i64> {
    rx.try_iter()
        .filter_map(|element| match element {
            StreamElement::Record(row) => Some(row.aggregate),
            _ => None,
        })
        .collect()
}

#[test]
fn checkpoint_restore_resumes_windows() {
    let events = gen_events(42, 40, 3);
    let (first, second) = events.split_at(25);
    let clock = ManualClock::new(1_000);

    // Uninterrupted reference run.
    let (in_tx, in_rx) = bounded(64);
    let (out_tx, out_rx) = unbounded();
    let mut task = Task::with_clock(0, in_rx, out_tx, manual_operator(&clock), clock.clone());
    for event in &events {
        in_tx
            .send(StreamElement::record((event.user.clone(), event.clone())))
            .unwrap();
    }
    in_tx.send(StreamElement::End).unwrap();
    task.run().unwrap();
    let reference = records(&out_rx);

    // Same input, checkpointed after the first part and resumed in a new task.
    let (in_tx, in_rx) = bounded(64);
    let (out_tx, out_rx) = unbounded();
    let (ack_tx, ack_rx) = unbounded();
    let mut task = Task::with_clock(0, in_rx, out_tx, manual_operator(&clock), clock.clone())
        .with_checkpointing(ack_tx);
    for event in first {
        in_tx
            .send(StreamElement::record((event.user.clone(), event.clone())))
            .unwrap();
    }
    in_tx.send(StreamElement::barrier(1)).unwrap();
    in_tx.send(StreamElement::End).unwrap();
    task.run().unwrap();
    let mut resumed = records(&out_rx);
    let ack = ack_rx.try_recv().unwrap();

    let (in_tx, in_rx) = bounded(64);
    let (out_tx, out_rx) = unbounded();
    let mut task = Task::with_clock(0, in_rx, out_tx, manual_operator(&clock), clock.clone());
    task.restore(&ack.state).unwrap();
    for event in second {
        in_tx
            .send(StreamElement::record((event.user.clone(), event.clone())))
            .unwrap();
    }
    in_tx.send(StreamElement::End).unwrap();
    task.run().unwrap();
    resumed.extend(records(&out_rx));

    assert_eq!(resumed, reference);
}
