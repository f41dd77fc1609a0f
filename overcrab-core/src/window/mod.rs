//! Processing-time `ROWS BETWEEN n PRECEDING AND CURRENT ROW` windows.
//!
//! Rows are buffered per key in buckets keyed by the processing time they
//! arrived at. Every row triggers one aggregate over the `n + 1` most recent
//! rows of its key, itself included, and is emitted joined with the result.

use std::marker::PhantomData;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::OverWindowConfig;
use crate::runtime::Operator;
use crate::state::{HashMapStateBackend, KeyedStateBackend, ListStateHandle, MapStateHandle};
use crate::time::{ProcessingTimeService, RetentionTimerManager, SystemClock, TimerService};
use crate::types::{JoinedRow, ProcessingTime, StreamData};

mod buffer;
mod functions;
mod index;
mod operator;

pub use buffer::*;
pub use functions::*;
pub use index::*;
pub use operator::*;

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
