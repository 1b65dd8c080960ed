//! Bounded worker pool over an item list.
//!
//! Fetch futures run with at most `limit` in flight; completion order is
//! whatever the network gives us, but results come back in input order.
//! Workers encode their own transient failures as absence inside their
//! result type; the only error expected to escape a worker is the
//! reauthentication signal, which aborts the whole pool at once.

use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::api::FetchError;

pub async fn run_pool<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    worker: F,
) -> Result<Vec<R>, FetchError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, FetchError>>,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let limit = limit.clamp(1, total);

    let mut completed: Vec<(usize, R)> = Vec::with_capacity(total);
    let mut in_flight = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = worker(item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(limit);

    while let Some((index, result)) = in_flight.next().await {
        match result {
            Ok(value) => completed.push((index, value)),
            Err(e) => return Err(e),
        }
    }

    completed.sort_by_key(|(index, _)| *index);
    Ok(completed.into_iter().map(|(_, value)| value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let result: Vec<i32> = run_pool(Vec::<i32>::new(), 4, |v| async move { Ok(v) })
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn limit_is_clamped_to_item_count() {
        // limit 0 must still make progress
        let result = run_pool(vec![1, 2, 3], 0, |v| async move { Ok(v * 2) })
            .await
            .unwrap();
        assert_eq!(result, vec![2, 4, 6]);

        let result = run_pool(vec![1], 100, |v| async move { Ok(v) }).await.unwrap();
        assert_eq!(result, vec![1]);
    }

    #[tokio::test]
    async fn results_preserve_input_order_under_reordered_completion() {
        // Earlier items sleep longer, so completion order is reversed.
        let result = run_pool(vec![30u64, 20, 10], 3, |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(delay)
        })
        .await
        .unwrap();
        assert_eq!(result, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn worker_encoded_failure_does_not_abort_siblings() {
        // Item 3's worker catches its own error and returns absence.
        let result = run_pool(vec![1, 2, 3, 4, 5], 2, |v| async move {
            if v == 3 {
                Ok(None)
            } else {
                Ok(Some(v))
            }
        })
        .await
        .unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result[2], None);
        assert_eq!(result[4], Some(5));
    }

    #[tokio::test]
    async fn reauth_aborts_the_pool() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);

        let result = run_pool(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, move |v| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if v == 2 {
                    Err(FetchError::ReauthRequired)
                } else {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(v)
                }
            }
        })
        .await;

        assert!(matches!(result, Err(FetchError::ReauthRequired)));
        // With a limit of 2, nowhere near all eight items were dispatched.
        assert!(started.load(Ordering::SeqCst) < 8);
    }

    #[tokio::test]
    async fn at_most_limit_workers_in_flight() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (active_ref, peak_ref) = (Arc::clone(&active), Arc::clone(&peak));
        run_pool(vec![(); 20], 3, move |_| {
            let active = Arc::clone(&active_ref);
            let peak = Arc::clone(&peak_ref);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
