//! Shared types and streaming infrastructure for the YouTube API client.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

type OneFuturePage<'a, F, T> =
    Pin<Box<dyn Future<Output = eyre::Result<(F, (VecDeque<T>, Option<String>))>> + 'a + Send>>;

/// Returned by a [`PagedStream`] when the continuation-token chain is longer than its page cap.
#[derive(Debug, thiserror::Error)]
#[error("stopped after {max_pages} pages while the API still reported more results")]
pub struct PageLimitExceeded {
    /// The configured cap that was reached.
    pub max_pages: usize,
}

/// A paginated stream that automatically fetches subsequent pages from a YouTube API list endpoint.
///
/// This stream yields items one by one, automatically fetching the next page when the current
/// page is exhausted. Only supports forward pagination (no previous page support).
///
/// A page whose `nextPageToken` is absent or empty is the last page. If a page cap is set with
/// [`PagedStream::with_max_pages`] and the last permitted page still carries a token, the stream
/// yields a [`PageLimitExceeded`] error instead of following the chain forever.
pub struct PagedStream<'a, T, F> {
    /// Current batch of items from the most recent API response
    current_items: VecDeque<T>,
    /// Future representing the currently pending API request, if any
    pending_request: Option<OneFuturePage<'a, F, T>>,
    /// Whether we've reached the end of all available data
    is_done: bool,
    /// Number of pages received so far
    pages_fetched: usize,
    /// Upper bound on the number of pages to fetch
    max_pages: Option<usize>,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// Create a new PagedStream from the first page of results.
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
    {
        let first_page = async move {
            let results = fetcher(None).await?;
            Ok((fetcher, results))
        };
        Self {
            pending_request: Some(Box::pin(first_page)),
            current_items: VecDeque::new(),
            is_done: false,
            pages_fetched: 0,
            max_pages: None,
        }
    }

    /// Bounds the number of pages this stream will fetch. `None` means unbounded.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn page_limit_reached(&self) -> Option<usize> {
        self.max_pages.filter(|&max| self.pages_fetched >= max)
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<(VecDeque<T>, Option<String>)>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // If we have items in the current batch, return the next one
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            // If we're done (no more pages), return None
            if self.is_done {
                return Poll::Ready(None);
            }

            // If we have a pending request, poll it
            if let Some(pending) = self.pending_request.as_mut() {
                match pending.as_mut().poll(cx) {
                    Poll::Ready(Ok((fetcher, (items, next_token)))) => {
                        self.pages_fetched += 1;
                        self.pending_request = None;

                        // The API sometimes sends an empty token on the final page.
                        let next_token = next_token.filter(|token| !token.is_empty());
                        let Some(next_token) = next_token else {
                            self.current_items.extend(items);
                            self.is_done = true;
                            continue;
                        };

                        if let Some(max_pages) = self.page_limit_reached() {
                            self.is_done = true;
                            return Poll::Ready(Some(Err(PageLimitExceeded { max_pages }.into())));
                        }

                        self.current_items.extend(items);
                        // Set up the future for the next page (but don't poll it yet)
                        self.pending_request = Some(Box::pin(async move {
                            let results = fetcher(Some(next_token)).await?;
                            Ok((fetcher, results))
                        }));
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        // Error fetching next page
                        self.pending_request = None;
                        self.is_done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => {
                        // Still waiting for the response
                        return Poll::Pending;
                    }
                }
            } else {
                // No pending request and no next page token means we're done
                self.is_done = true;
                return Poll::Ready(None);
            }
        }
    }
}

/// Paging details for lists of resources.
///
/// Includes the total number of items available and the number of resources
/// returned in a single page response.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults")]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
}

/// Identifies the resource a search result or playlist item refers to.
///
/// Exactly one of the id fields is set, depending on `kind`.
///
/// See: <https://developers.google.com/youtube/v3/docs/search#id>
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResourceId {
    /// The type of the referenced resource, e.g. `youtube#channel` or `youtube#video`.
    pub kind: String,
    #[serde(rename = "channelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(rename = "videoId", skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(rename = "playlistId", skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    /// Builds pages of consecutive integers; page `i` links to page `i + 1` by token.
    fn pages(sizes: &[usize]) -> Vec<(VecDeque<usize>, Option<String>)> {
        let mut next = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let items = (next..next + size).collect();
                next += size;
                let token = (i + 1 < sizes.len()).then(|| (i + 1).to_string());
                (items, token)
            })
            .collect()
    }

    async fn drain<S>(stream: S) -> (Vec<usize>, Option<eyre::Report>)
    where
        S: Stream<Item = eyre::Result<usize>>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(item) => items.push(item),
                Err(e) => return (items, Some(e)),
            }
        }
        (items, None)
    }

    #[tokio::test]
    async fn yields_every_item_across_pages_in_order() {
        let pages = pages(&[50, 50, 7]);
        let fetches = AtomicUsize::new(0);
        let stream = PagedStream::new(|token: Option<String>| {
            fetches.fetch_add(1, Ordering::SeqCst);
            let index = token.map_or(0, |t| t.parse::<usize>().unwrap());
            let page = pages[index].clone();
            async move { Ok::<_, eyre::Report>(page) }
        });

        let (items, error) = drain(stream).await;
        assert!(error.is_none());
        assert_eq!(items, (0..107).collect::<Vec<_>>());
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_first_page_ends_the_stream() {
        let stream = PagedStream::new(|_token: Option<String>| async {
            Ok::<_, eyre::Report>((VecDeque::<usize>::new(), None))
        });

        let (items, error) = drain(stream).await;
        assert!(error.is_none());
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn empty_continuation_token_is_the_last_page() {
        let fetches = AtomicUsize::new(0);
        let stream = PagedStream::new(|_token: Option<String>| {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, eyre::Report>((VecDeque::from([1, 2]), Some(String::new()))) }
        });

        let (items, error) = drain(stream).await;
        assert!(error.is_none());
        assert_eq!(items, vec![1, 2]);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_cap_stops_an_endless_token_chain() {
        let fetches = AtomicUsize::new(0);
        let stream = PagedStream::new(|_token: Option<String>| {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, eyre::Report>((VecDeque::from([0]), Some("again".to_string()))) }
        })
        .with_max_pages(Some(3));

        let (items, error) = drain(stream).await;
        let error = error.expect("page cap should produce an error");
        let limit = error
            .downcast_ref::<PageLimitExceeded>()
            .expect("error should be PageLimitExceeded");
        assert_eq!(limit.max_pages, 3);
        assert_eq!(items.len(), 2);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn page_cap_is_not_an_error_when_the_chain_ends_in_time() {
        let pages = pages(&[2, 1]);
        let stream = PagedStream::new(|token: Option<String>| {
            let index = token.map_or(0, |t| t.parse::<usize>().unwrap());
            let page = pages[index].clone();
            async move { Ok::<_, eyre::Report>(page) }
        })
        .with_max_pages(Some(2));

        let (items, error) = drain(stream).await;
        assert!(error.is_none());
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn fetch_error_is_yielded_once_then_the_stream_ends() {
        let stream = PagedStream::new(|token: Option<String>| async move {
            match token {
                None => Ok((VecDeque::from([7]), Some("next".to_string()))),
                Some(_) => Err(eyre::eyre!("boom")),
            }
        });

        let mut stream = std::pin::pin!(stream);
        assert_eq!(stream.next().await.unwrap().unwrap(), 7);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
