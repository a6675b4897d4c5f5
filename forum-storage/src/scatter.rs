//! Scatter-gather executor.
//!
//! Turns an ordered list of ids into an ordered list of items by running one
//! fetch per id concurrently. Responses arrive in completion order, tagged
//! with the position of their id; the gather step waits for all of them,
//! picks an error if any fetch failed, and otherwise restores input order.
//!
//! A failure never cancels sibling fetches and never yields a partial list.

use std::future::Future;

use forum_core::{DataConfig, ErrorCode, ErrorSelection, ForumError, ForumResult};
use futures_util::stream::{self, StreamExt};

use crate::telemetry;

/// Result of one fetch, tagged with the position of its id.
#[derive(Debug)]
pub struct FetchResponse<T> {
    pub seq: usize,
    pub result: ForumResult<T>,
}

impl<T> FetchResponse<T> {
    /// Error classification, or `None` for a successful fetch.
    pub fn status(&self) -> Option<ErrorCode> {
        self.result.as_ref().err().map(ForumError::code)
    }
}

/// Bounded concurrent fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScatterGather {
    max_in_flight: usize,
    error_selection: ErrorSelection,
}

impl Default for ScatterGather {
    fn default() -> Self {
        Self::from_config(&DataConfig::default())
    }
}

impl ScatterGather {
    /// `max_in_flight` of zero is treated as one.
    pub fn new(max_in_flight: usize, error_selection: ErrorSelection) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            error_selection,
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.effective_max_in_flight(), config.error_selection)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn error_selection(&self) -> ErrorSelection {
        self.error_selection
    }

    /// Fetch every id and return the items in the order of `ids`.
    ///
    /// At most `max_in_flight` fetches run at once. All fetches run to
    /// completion before the result is decided.
    pub async fn gather<I, T, F, Fut>(&self, ids: &[I], fetch: F) -> ForumResult<Vec<T>>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = ForumResult<T>>,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let responses: Vec<FetchResponse<T>> = stream::iter(ids.iter().cloned().enumerate())
            .map(|(seq, id)| {
                let pending = fetch(id);
                async move {
                    FetchResponse {
                        seq,
                        result: pending.await,
                    }
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let outcome = assemble(responses, self.error_selection);
        if let Some(metrics) = telemetry::metrics() {
            metrics.record_batch(ids.len(), outcome.is_ok());
        }
        outcome
    }
}

/// Decide the outcome of a batch from responses in receipt order.
pub fn assemble<T>(
    responses: Vec<FetchResponse<T>>,
    selection: ErrorSelection,
) -> ForumResult<Vec<T>> {
    let total = responses.len();
    let mut items: Vec<(usize, T)> = Vec::with_capacity(total);
    let mut failure: Option<(usize, ForumError)> = None;
    let mut failed = 0usize;

    for response in responses {
        match response.result {
            Ok(item) => items.push((response.seq, item)),
            Err(e) => {
                failed += 1;
                let replace = match (&failure, selection) {
                    (None, _) => true,
                    (Some((seq, _)), ErrorSelection::LowestSequence) => response.seq < *seq,
                    (Some(_), ErrorSelection::FirstReceived) => false,
                };
                if replace {
                    failure = Some((response.seq, e));
                }
            }
        }
    }

    if let Some((seq, error)) = failure {
        tracing::debug!(
            total,
            failed,
            seq,
            error = %error,
            "batch fetch failed"
        );
        return Err(error);
    }

    items.sort_unstable_by_key(|(seq, _)| *seq);
    Ok(items.into_iter().map(|(_, item)| item).collect())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use forum_core::EntityType;
    use proptest::prelude::*;
    use std::time::Duration;

    fn paused_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime builds")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Output order follows input order for any completion order.
        #[test]
        fn prop_order_preserved(
            delays in prop::collection::vec(0u64..50, 0..40),
            cap in 1usize..10,
        ) {
            let ids: Vec<usize> = (0..delays.len()).collect();
            let result = paused_runtime().block_on(
                ScatterGather::new(cap, ErrorSelection::default()).gather(&ids, |i| {
                    let delay = delays[i];
                    async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        Ok::<usize, ForumError>(i)
                    }
                }),
            );
            prop_assert_eq!(result, Ok(ids));
        }

        /// Any failing id fails the batch; with lowest-sequence selection the
        /// surfaced error is the earliest failing position.
        #[test]
        fn prop_all_or_nothing(
            failing in prop::collection::vec(any::<bool>(), 1..30),
            delays in prop::collection::vec(0u64..20, 30),
        ) {
            let ids: Vec<usize> = (0..failing.len()).collect();
            let result = paused_runtime().block_on(
                ScatterGather::new(5, ErrorSelection::LowestSequence).gather(&ids, |i| {
                    let fail = failing[i];
                    let delay = delays[i];
                    async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        if fail {
                            Err(ForumError::not_found(EntityType::Event, i as i64))
                        } else {
                            Ok(i)
                        }
                    }
                }),
            );
            match failing.iter().position(|f| *f) {
                Some(first) => prop_assert_eq!(
                    result,
                    Err(ForumError::not_found(EntityType::Event, first as i64))
                ),
                None => prop_assert_eq!(result, Ok(ids)),
            }
        }
    }
}
