//! Chunked execution of bulk key lookups.
//!
//! SQLite caps the number of bind variables per statement, so unbounded key
//! collections are split into bounded chunks before they reach the store.

use std::future::Future;

use anyhow::Result;

/// Runs `fetch` once per successive chunk of at most `chunk_size` keys and
/// concatenates the results in chunk order.
///
/// An empty input returns an empty vec without invoking `fetch` at all;
/// callers rely on that to skip the store round trip entirely. Input keys are
/// not deduplicated, and ordering within or across chunks is whatever the
/// store returns.
pub async fn execute_large_inputs<K, R, F, Fut>(
    keys: &[K],
    chunk_size: usize,
    mut fetch: F,
) -> Result<Vec<R>>
where
    K: Clone,
    F: FnMut(Vec<K>) -> Fut,
    Fut: Future<Output = Result<Vec<R>>>,
{
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    // A zero chunk size is a caller bug; clamp instead of looping forever.
    let chunk_size = chunk_size.max(1);

    let mut results = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(chunk_size) {
        results.extend(fetch(chunk.to_vec()).await?);
    }
    Ok(results)
}
