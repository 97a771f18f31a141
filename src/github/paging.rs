//! Lazy, restartable iteration over paged listings.
//!
//! `paginate` turns a page fetcher into a stream of pages. Nothing is
//! requested until the stream is polled, and a consumer that stops early
//! can resume later by starting a new stream from the last page's `next`.

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::future::Future;

use super::transport::{Page, PageRequest};
use crate::error::{Result, StoreError};

struct PagingState<F> {
  fetch: F,
  next: Option<PageRequest>,
  fetched: u32,
}

/// Stream pages starting at `start`, stopping when the server reports no
/// further page or after `max_pages` pages.
pub fn paginate<T, F, Fut>(
  start: PageRequest,
  max_pages: Option<u32>,
  fetch: F,
) -> impl Stream<Item = Result<Page<T>>>
where
  F: FnMut(PageRequest) -> Fut,
  Fut: Future<Output = Result<Page<T>>>,
{
  let state = PagingState {
    fetch,
    next: Some(start),
    fetched: 0,
  };

  stream::try_unfold(state, move |mut state| async move {
    let request = match state.next {
      Some(request) => request,
      None => return Ok::<_, StoreError>(None),
    };
    if max_pages.is_some_and(|max| state.fetched >= max) {
      return Ok(None);
    }

    let page = (state.fetch)(request).await?;
    state.next = page.next;
    state.fetched += 1;
    Ok(Some((page, state)))
  })
}

/// Flatten a page stream into its items.
pub fn items<T, S>(pages: S) -> impl Stream<Item = Result<T>>
where
  S: Stream<Item = Result<Page<T>>>,
{
  pages
    .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<T, StoreError>)))
    .try_flatten()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  fn numbers(total: u32) -> impl FnMut(PageRequest) -> futures::future::Ready<Result<Page<u32>>> {
    move |request: PageRequest| {
      let start = (request.page - 1) * request.per_page;
      let end = (start + request.per_page).min(total);
      let items: Vec<u32> = (start..end).collect();
      let next = (end < total).then(|| request.next());
      futures::future::ready(Ok(Page {
        items,
        request,
        next,
      }))
    }
  }

  #[tokio::test]
  async fn test_collects_every_page() {
    let all: Vec<u32> = items(paginate(PageRequest::first(3), None, numbers(8)))
      .try_collect()
      .await
      .unwrap();
    assert_eq!(all, (0..8).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn test_max_pages_bounds_requests() {
    let all: Vec<u32> = items(paginate(PageRequest::first(3), Some(2), numbers(8)))
      .try_collect()
      .await
      .unwrap();
    assert_eq!(all, (0..6).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn test_restart_from_next_page() {
    let mut pages = Box::pin(paginate(PageRequest::first(3), None, numbers(8)));
    let first = pages.try_next().await.unwrap().unwrap();
    drop(pages);

    let resume = first.next.unwrap();
    let rest: Vec<u32> = items(paginate(resume, None, numbers(8)))
      .try_collect()
      .await
      .unwrap();
    assert_eq!(rest, (3..8).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn test_lazy_until_polled() {
    let calls = Cell::new(0);
    let pages = paginate(PageRequest::first(3), None, |request| {
      calls.set(calls.get() + 1);
      numbers(8)(request)
    });
    assert_eq!(calls.get(), 0);

    let mut pages = Box::pin(pages);
    pages.try_next().await.unwrap();
    assert_eq!(calls.get(), 1);
  }

  #[tokio::test]
  async fn test_error_stops_stream() {
    let pages = paginate(PageRequest::first(3), None, |_request| {
      futures::future::ready(Err::<Page<u32>, _>(StoreError::Transport {
        status: 502,
        message: "Bad Gateway".to_string(),
      }))
    });
    let result: Result<Vec<u32>> = items(pages).try_collect().await;
    assert_eq!(result.unwrap_err().status(), Some(502));
  }
}
