//! Chunked and paginated fetching on top of the retry layer.

use std::collections::HashMap;
use std::future::Future;

use tracing::debug;

use crate::contract::Page;
use crate::error::SyncError;

/// Per-call ceiling on ids for the batched endpoints.
pub const MAX_BATCH_SIZE: usize = 50;

pub fn split_batches<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Follows continuation tokens until the last page. An empty token ends the walk.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, SyncError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, SyncError>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(token.take()).await?;
        pages += 1;
        items.extend(page.items);
        match page.next_page_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    debug!(pages, items = items.len(), "Pagination finished");
    Ok(items)
}

/// Issues one call per chunk of at most [`MAX_BATCH_SIZE`] keys and returns the
/// results keyed and ordered like `keys`. Keys the remote did not answer for are
/// absent; repeated keys appear once.
pub async fn fetch_batched<V, F, Fut>(keys: &[String], mut fetch_batch: F) -> Result<Vec<(String, V)>, SyncError>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<(String, V)>, SyncError>>,
{
    let mut by_key: HashMap<String, V> = HashMap::with_capacity(keys.len());

    for batch in split_batches(keys, MAX_BATCH_SIZE) {
        let results = fetch_batch(batch.to_vec()).await?;
        if results.is_empty() {
            debug!(batch_size = batch.len(), "Batch returned no items");
            continue;
        }
        by_key.extend(results);
    }

    Ok(keys
        .iter()
        .filter_map(|key| by_key.remove(key).map(|value| (key.clone(), value)))
        .collect())
}
