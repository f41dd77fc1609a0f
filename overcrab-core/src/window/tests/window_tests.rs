use super::*;
use crate::config::RetentionConfig;
use crate::time::ManualClock;
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

type RowsFn = fn(&[String]) -> Result<Vec<String>>;
type RowsOperator = OverWindowOperator<
    String,
    String,
    Vec<String>,
    FnExecutor<RowsFn>,
    HashMapStateBackend,
    ManualClock,
>;

fn collect_rows(rows: &[String]) -> Result<Vec<String>> {
    Ok(rows.to_vec())
}

fn rows_operator(config: OverWindowConfig, clock: &ManualClock) -> RowsOperator {
    OverWindowOperator::new(
        config,
        FnExecutor::new(collect_rows as RowsFn),
        HashMapStateBackend::new(),
        clock.clone(),
    )
    .unwrap()
}

fn no_retention(lower_boundary: u64) -> OverWindowConfig {
    OverWindowConfig::new(lower_boundary).with_retention(RetentionConfig::disabled())
}

fn key(k: &str) -> String {
    k.to_string()
}

fn strings(rows: &[&str]) -> Vec<String> {
    rows.iter().map(|r| r.to_string()).collect()
}

/// Reports where the triggering row sits alongside the window rows.
struct Positions;

impl AggregateExecutor<String, (usize, usize, Vec<String>)> for Positions {
    fn execute(
        &mut self,
        request: &WindowRequest<'_, String>,
    ) -> Result<(usize, usize, Vec<String>)> {
        Ok((
            request.window_rank,
            request.trigger_index,
            request.rows.to_vec(),
        ))
    }
}

// --- SortedTimestamps ---

#[test]
fn test_sorted_timestamps_insert_is_idempotent() {
    let mut index = SortedTimestamps::new();
    assert!(index.insert(105));
    assert!(index.insert(100));
    assert!(!index.insert(105));
    assert_eq!(index.as_slice(), &[100, 105]);
    assert_eq!(index.rank_of(105), Some(1));
    assert_eq!(index.rank_of(101), None);

    index.clear();
    assert!(index.is_empty());
}

#[test]
fn test_sorted_timestamps_rebuild_replaces_contents() {
    let mut index = SortedTimestamps::new();
    index.rebuild([7, 3]);
    index.rebuild([42, 1, 42, 9]);
    assert_eq!(index.as_slice(), &[1, 9, 42]);
    assert_eq!(index.len(), 3);
}

// --- WindowBuffer ---

#[test]
fn test_buffer_append_preserves_arrival_order() {
    let mut backend = HashMapStateBackend::new();
    backend.set_current_key(b"k".to_vec());
    let buffer = WindowBuffer::<String>::new("buckets");

    assert_eq!(buffer.append(&mut backend, 100, key("r1")).unwrap(), 0);
    assert_eq!(buffer.append(&mut backend, 100, key("r2")).unwrap(), 1);
    assert_eq!(buffer.append(&mut backend, 105, key("r3")).unwrap(), 0);

    assert_eq!(buffer.get(&backend, 100).unwrap(), Some(strings(&["r1", "r2"])));
    let mut keys = buffer.keys(&backend).unwrap();
    keys.sort_unstable();
    assert_eq!(keys, vec![100, 105]);

    buffer.remove(&mut backend, 100).unwrap();
    assert_eq!(buffer.get(&backend, 100).unwrap(), None);
    buffer.clear(&mut backend).unwrap();
    assert!(backend.is_empty());
}

// --- Executors ---

struct Sum;

impl AggregateFunction<i64, i64, i64> for Sum {
    fn create_accumulator(&self) -> i64 {
        0
    }

    fn add(&self, acc: &mut i64, element: &i64) {
        *acc += element;
    }

    fn get_result(&self, acc: i64) -> i64 {
        acc
    }
}

#[test]
fn test_aggregate_function_executor_folds_window_rows() {
    let bucket: [i64; 2] = [4, 5];
    let rows: [i64; 3] = [3, 4, 5];
    let request = WindowRequest {
        bucket: &bucket,
        trigger_index: 1,
        window_rank: 1,
        rows: &rows,
    };
    let mut executor = AggregateFunctionExecutor::<_, i64>::new(Sum);
    assert_eq!(executor.execute(&request).unwrap(), 12);
    assert_eq!(request.trigger_row(), Some(&5));
}

// --- OverWindowOperator ---

#[test]
fn test_new_rejects_invalid_config() {
    let config = OverWindowConfig::new(1).with_retention(RetentionConfig::new(
        Duration::from_secs(2),
        Duration::from_secs(1),
    ));
    let result = OverWindowOperator::<String, String, Vec<String>, _, _, _>::new(
        config,
        FnExecutor::new(collect_rows as RowsFn),
        HashMapStateBackend::new(),
        ManualClock::new(0),
    );
    assert!(result.is_err());
}

#[test]
fn test_rows_sharing_and_spanning_buckets() {
    let clock = ManualClock::new(100);
    let mut op = OverWindowOperator::new(
        no_retention(1),
        Positions,
        HashMapStateBackend::new(),
        clock.clone(),
    )
    .unwrap();
    let mut out = Vec::new();

    op.process_element(&key("k"), key("R1"), &mut out).unwrap();
    op.process_element(&key("k"), key("R2"), &mut out).unwrap();
    clock.set(105);
    op.process_element(&key("k"), key("R3"), &mut out).unwrap();

    assert_eq!(out.len(), 3);
    assert_eq!(out[0].input, "R1");
    assert_eq!(out[0].aggregate, (0, 0, strings(&["R1"])));
    assert_eq!(out[1].input, "R2");
    assert_eq!(out[1].aggregate, (0, 1, strings(&["R1", "R2"])));
    assert_eq!(out[2].input, "R3");
    assert_eq!(out[2].aggregate, (1, 0, strings(&["R2", "R3"])));
}

#[test]
fn test_window_walks_several_earlier_buckets() {
    let clock = ManualClock::new(10);
    let mut op = rows_operator(no_retention(3), &clock);
    let mut out = Vec::new();

    op.process_element(&key("k"), key("a"), &mut out).unwrap();
    op.process_element(&key("k"), key("b"), &mut out).unwrap();
    clock.set(20);
    op.process_element(&key("k"), key("c"), &mut out).unwrap();
    clock.set(30);
    op.process_element(&key("k"), key("d"), &mut out).unwrap();
    op.process_element(&key("k"), key("e"), &mut out).unwrap();

    let windows: Vec<_> = out.iter().map(|row| row.aggregate.clone()).collect();
    assert_eq!(
        windows,
        vec![
            strings(&["a"]),
            strings(&["a", "b"]),
            strings(&["a", "b", "c"]),
            strings(&["a", "b", "c", "d"]),
            strings(&["b", "c", "d", "e"]),
        ]
    );
}

#[test]
fn test_zero_preceding_rows_is_the_row_itself() {
    let clock = ManualClock::new(1);
    let mut op = rows_operator(no_retention(0), &clock);
    let mut out = Vec::new();

    op.process_element(&key("k"), key("x"), &mut out).unwrap();
    op.process_element(&key("k"), key("y"), &mut out).unwrap();

    assert_eq!(out[1].aggregate, strings(&["y"]));
}

#[test]
fn test_buckets_outside_the_window_are_pruned() {
    let clock = ManualClock::new(100);
    let mut op = rows_operator(no_retention(1), &clock);
    let mut out = Vec::new();

    op.process_element(&key("k"), key("R1"), &mut out).unwrap();
    op.process_element(&key("k"), key("R2"), &mut out).unwrap();
    clock.set(105);
    op.process_element(&key("k"), key("R3"), &mut out).unwrap();
    // {R2, R3} still reaches into the bucket at 100.
    assert_eq!(op.buffered_timestamps(&key("k")).unwrap(), vec![100, 105]);

    clock.set(110);
    op.process_element(&key("k"), key("R4"), &mut out).unwrap();
    assert_eq!(out[3].aggregate, strings(&["R3", "R4"]));
    assert_eq!(op.buffered_timestamps(&key("k")).unwrap(), vec![105, 110]);
}

#[test]
fn test_full_current_bucket_prunes_all_earlier_buckets() {
    let clock = ManualClock::new(100);
    let mut op = rows_operator(no_retention(1), &clock);
    let mut out = Vec::new();

    op.process_element(&key("k"), key("a"), &mut out).unwrap();
    clock.set(200);
    op.process_element(&key("k"), key("b"), &mut out).unwrap();
    op.process_element(&key("k"), key("c"), &mut out).unwrap();

    assert_eq!(out[2].aggregate, strings(&["b", "c"]));
    assert_eq!(op.buffered_timestamps(&key("k")).unwrap(), vec![200]);
}

#[test]
fn test_keys_never_share_windows() {
    let clock = ManualClock::new(100);
    let mut op = rows_operator(no_retention(2), &clock);
    let mut out = Vec::new();

    op.process_element(&key("a"), key("a1"), &mut out).unwrap();
    op.process_element(&key("b"), key("b1"), &mut out).unwrap();
    clock.set(101);
    op.process_element(&key("a"), key("a2"), &mut out).unwrap();
    op.process_element(&key("b"), key("b2"), &mut out).unwrap();

    assert_eq!(out[2].aggregate, strings(&["a1", "a2"]));
    assert_eq!(out[3].aggregate, strings(&["b1", "b2"]));
}

#[test]
fn test_executor_failure_emits_nothing_and_keeps_the_row_buffered() {
    let clock = ManualClock::new(100);
    let executor = FnExecutor::new(|rows: &[String]| {
        if rows.last().is_some_and(|row| row == "boom") {
            anyhow::bail!("cannot aggregate boom");
        }
        Ok(rows.len())
    });
    let mut op = OverWindowOperator::new(
        no_retention(5),
        executor,
        HashMapStateBackend::new(),
        clock.clone(),
    )
    .unwrap();
    let mut out = Vec::new();

    op.process_element(&key("k"), key("a"), &mut out).unwrap();
    let err = op
        .process_element(&key("k"), key("boom"), &mut out)
        .unwrap_err();
    assert!(format!("{err:#}").contains("cannot aggregate boom"));
    assert_eq!(out.len(), 1);
    assert_eq!(
        op.buffered_rows(&key("k"), 100).unwrap(),
        Some(strings(&["a", "boom"]))
    );

    // The failed row is not emitted later in place of the next one.
    clock.set(101);
    op.process_element(&key("k"), key("c"), &mut out).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].input, "c");
    assert_eq!(out[1].aggregate, 3);
}

#[test]
fn test_idle_key_is_purged_after_retention() {
    let clock = ManualClock::new(1_000);
    let config = OverWindowConfig::new(2).with_retention(RetentionConfig::new(
        Duration::from_millis(100),
        Duration::from_millis(200),
    ));
    let mut op = rows_operator(config, &clock);
    let mut out = Vec::new();

    op.process_element(&key("idle"), key("r1"), &mut out).unwrap();
    assert!(op.timers().contains(&bincode::serialize(&key("idle")).unwrap(), 1_200));

    // Another key's row fires the overdue timer before it is processed.
    clock.set(1_300);
    op.process_element(&key("busy"), key("x"), &mut out).unwrap();
    assert!(op.buffered_timestamps(&key("idle")).unwrap().is_empty());

    clock.set(1_310);
    op.process_element(&key("idle"), key("r2"), &mut out).unwrap();
    assert_eq!(out[2].aggregate, strings(&["r2"]));
}

#[test]
fn test_on_processing_time_purges_without_input() {
    let clock = ManualClock::new(0);
    let config = OverWindowConfig::new(1).with_retention(RetentionConfig::new(
        Duration::from_millis(10),
        Duration::from_millis(20),
    ));
    let mut op = rows_operator(config, &clock);
    let mut out = Vec::new();
    op.process_element(&key("k"), key("r"), &mut out).unwrap();

    Operator::on_processing_time(&mut op, 19, &mut out).unwrap();
    assert_eq!(op.buffered_timestamps(&key("k")).unwrap(), vec![0]);

    Operator::on_processing_time(&mut op, 20, &mut out).unwrap();
    assert!(op.timers().is_empty());
    assert!(op.backend().is_empty());
    assert_eq!(out.len(), 1);
}

#[test]
fn test_snapshot_and_restore_continue_windows() {
    let clock = ManualClock::new(100);
    let mut op = rows_operator(OverWindowConfig::new(2), &clock);
    let mut out = Vec::new();
    op.process_element(&key("k"), key("a"), &mut out).unwrap();
    clock.set(101);
    op.process_element(&key("k"), key("b"), &mut out).unwrap();

    let snapshot = op.snapshot_state().unwrap();

    let mut restored = rows_operator(OverWindowConfig::new(2), &clock);
    restored.restore_state(&snapshot).unwrap();
    assert_eq!(restored.timers().len(), 1);

    clock.set(102);
    let mut out = Vec::new();
    restored.process_element(&key("k"), key("c"), &mut out).unwrap();
    assert_eq!(out[0].aggregate, strings(&["a", "b", "c"]));
}

#[test]
fn test_restore_rejects_garbage() {
    let clock = ManualClock::new(0);
    let mut op = rows_operator(no_retention(1), &clock);
    assert!(op.restore_state(&[1, 2, 3]).is_err());
}

#[test]
fn test_process_batch_emits_in_input_order() {
    let clock = ManualClock::new(7);
    let mut op = rows_operator(no_retention(1), &clock);
    let mut out = Vec::new();
    let batch = vec![
        (key("a"), key("1")),
        (key("b"), key("2")),
        (key("a"), key("3")),
    ];

    op.process_batch(&batch, &mut out).unwrap();

    let inputs: Vec<_> = out.iter().map(|row| row.input.as_str()).collect();
    assert_eq!(inputs, vec!["1", "2", "3"]);
    assert_eq!(out[2].aggregate, strings(&["1", "3"]));
}

// --- Properties ---

fn collect_numbers(rows: &[u32]) -> Result<Vec<u32>> {
    Ok(rows.to_vec())
}

proptest! {
    #[test]
    fn prop_window_is_the_latest_rows_of_the_key(
        lower_boundary in 0u64..4,
        steps in prop::collection::vec((0u64..3, 0u8..3), 1..60),
    ) {
        let clock = ManualClock::new(0);
        let mut op = OverWindowOperator::new(
            no_retention(lower_boundary),
            FnExecutor::new(collect_numbers as fn(&[u32]) -> Result<Vec<u32>>),
            HashMapStateBackend::new(),
            clock.clone(),
        )
        .unwrap();
        let mut history: HashMap<u8, Vec<u32>> = HashMap::new();
        let mut out = Vec::new();

        for (seq, (delta, k)) in steps.iter().enumerate() {
            clock.advance(Duration::from_millis(*delta));
            let row = seq as u32;
            op.process_element(k, row, &mut out).unwrap();

            let rows = history.entry(*k).or_default();
            rows.push(row);
            let start = rows.len().saturating_sub(lower_boundary as usize + 1);
            let emitted = out.last().unwrap();
            prop_assert_eq!(emitted.input, row);
            prop_assert_eq!(&emitted.aggregate, &rows[start..].to_vec());
        }
        prop_assert_eq!(out.len(), steps.len());
    }

    #[test]
    fn prop_sorted_timestamps_rank_counts_smaller(keys in prop::collection::vec(-50i64..50, 0..40)) {
        let mut index = SortedTimestamps::new();
        index.rebuild(keys.iter().copied());

        prop_assert!(index.as_slice().windows(2).all(|w| w[0] < w[1]));
        for k in &keys {
            let smaller = index.as_slice().iter().filter(|t| *t < k).count();
            prop_assert_eq!(index.rank_of(*k), Some(smaller));
        }
    }
}
