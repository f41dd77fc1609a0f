//! Built-in numeric aggregates over `key,value` readings.

use std::fmt;

use clap::ValueEnum;
use overcrab_core::window::AggregateFunction;
use serde::{Deserialize, Serialize};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub key: String,
    pub value: f64,
}

impl Reading {
    /// Parse `key,value`.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let (key, value) = line
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("expected `key,value`, got {line:?}"))?;
        let value = value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("bad value in {line:?}: {e}"))?;
        Ok(Self {
            key: key.trim().to_string(),
            value,
        })
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.key, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AggregateKind {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

/// Folds the window's values into running stats and reports one of them.
#[derive(Debug, Clone, Copy)]
pub struct ReadingAggregate {
    kind: AggregateKind,
}

impl ReadingAggregate {
    pub fn new(kind: AggregateKind) -> Self {
        Self { kind }
    }
}

impl AggregateFunction<Reading, Stats, f64> for ReadingAggregate {
    fn create_accumulator(&self) -> Stats {
        Stats {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&self, acc: &mut Stats, element: &Reading) {
        acc.count += 1;
        acc.sum += element.value;
        acc.min = acc.min.min(element.value);
        acc.max = acc.max.max(element.value);
    }

    fn get_result(&self, acc: Stats) -> f64 {
        match self.kind {
            AggregateKind::Sum => acc.sum,
            AggregateKind::Avg if acc.count == 0 => f64::NAN,
            AggregateKind::Avg => acc.sum / acc.count as f64,
            AggregateKind::Count => acc.count as f64,
            AggregateKind::Min => acc.min,
            AggregateKind::Max => acc.max,
        }
    }
}
