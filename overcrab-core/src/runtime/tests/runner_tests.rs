use super::*;

/// Tags each row with the subtask that processed it; fails on a negative value.
struct Tag {
    subtask: usize,
}

impl Operator<(String, i32)> for Tag {
    type OUT = (String, i32, usize);

    fn process_batch(
        &mut self,
        input: &[(String, i32)],
        output: &mut Vec<Self::OUT>,
    ) -> Result<()> {
        for (key, value) in input {
            if *value < 0 {
                bail!("negative value for {key}");
            }
            output.push((key.clone(), *value, self.subtask));
        }
        Ok(())
    }
}

fn rows(keys: usize, per_key: i32) -> Vec<(String, i32)> {
    let mut rows = Vec::new();
    for value in 0..per_key {
        for k in 0..keys {
            rows.push((format!("key-{k}"), value));
        }
    }
    rows
}

#[test]
fn test_zero_parallelism_is_rejected() {
    let result = ParallelRunner::new(0, |subtask| Ok::<_, anyhow::Error>(Tag { subtask }));
    assert!(result.is_err());
}

#[test]
fn test_every_record_is_emitted_once() {
    let runner = ParallelRunner::new(3, |subtask| Ok(Tag { subtask }))
        .unwrap()
        .with_channel_capacity(2);
    let outputs = runner.run(rows(10, 20)).unwrap();
    assert_eq!(outputs.len(), 200);
}

#[test]
fn test_key_stays_on_one_subtask_in_order() {
    let runner = ParallelRunner::new(4, |subtask| Ok(Tag { subtask })).unwrap();
    let outputs = runner.run(rows(8, 25)).unwrap();

    for k in 0..8 {
        let key = format!("key-{k}");
        let of_key: Vec<_> = outputs.iter().filter(|(name, _, _)| *name == key).collect();
        let values: Vec<i32> = of_key.iter().map(|(_, value, _)| *value).collect();
        assert_eq!(values, (0..25).collect::<Vec<_>>());
        assert!(of_key.iter().all(|(_, _, subtask)| *subtask == of_key[0].2));
    }
}

#[test]
fn test_subtask_error_fails_the_run() {
    let runner = ParallelRunner::new(2, |subtask| Ok(Tag { subtask })).unwrap();
    let mut input = rows(4, 10);
    input.insert(5, ("key-1".to_string(), -1));

    let err = runner.run(input).unwrap_err();
    assert!(format!("{err:#}").contains("negative value for key-1"));
}

#[test]
fn test_factory_error_fails_before_running() {
    let runner = ParallelRunner::new(2, |subtask| {
        if subtask == 1 {
            bail!("no operator for subtask 1");
        }
        Ok(Tag { subtask })
    })
    .unwrap();
    let err = runner.run(rows(1, 1)).unwrap_err();
    assert!(format!("{err:#}").contains("no operator for subtask 1"));
}
