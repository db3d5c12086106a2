//! Request orchestration for views.
//!
//! A `Query<R, T>` owns one logical data source. Each `dispatch(request)`
//! supersedes the previous one: the older task is aborted and any result it
//! still manages to send is discarded, so the state always reflects the most
//! recent request.
//!
//! # Example
//!
//! ```ignore
//! let news = cached_client.clone();
//! let mut query = Query::new(move |req: FeedRequest| {
//!     let news = news.clone();
//!     async move { news.read(&req.intent, req.force_refresh).await.map_err(|e| e.to_string()) }
//! });
//!
//! query.dispatch(FeedRequest::new(intent));
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<R, T> = Box<dyn Fn(R) -> BoxFuture<T> + Send + Sync>;

/// Result of one dispatch, tagged with the generation that produced it
type Tagged<T> = (u64, Result<T, String>);

/// Async query driven by request values.
pub struct Query<R, T> {
  state: QueryState<T>,
  fetcher: FetcherFn<R, T>,
  /// Bumped on every dispatch; only results from the current generation land
  generation: u64,
  request: Option<R>,
  task: Option<JoinHandle<()>>,
  sender: mpsc::UnboundedSender<Tagged<T>>,
  receiver: mpsc::UnboundedReceiver<Tagged<T>>,
  fetched_at: Option<Instant>,
}

impl<R: Clone + Send + 'static, T: Send + 'static> Query<R, T> {
  /// Create a new query. The fetcher is called once per dispatched request.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move |req| Box::pin(fetcher(req))),
      generation: 0,
      request: None,
      task: None,
      sender,
      receiver,
      fetched_at: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// The most recently dispatched request
  pub fn request(&self) -> Option<&R> {
    self.request.as_ref()
  }

  /// When the current data arrived
  pub fn fetched_at(&self) -> Option<Instant> {
    self.fetched_at
  }

  /// Start a request, superseding any request still in flight.
  pub fn dispatch(&mut self, request: R) {
    if let Some(task) = self.task.take() {
      if !task.is_finished() {
        debug!(generation = self.generation, "superseding in-flight request");
      }
      task.abort();
    }

    self.generation += 1;
    let generation = self.generation;
    self.request = Some(request.clone());
    self.state = QueryState::Loading;

    let future = (self.fetcher)(request);
    let tx = self.sender.clone();
    self.task = Some(tokio::spawn(async move {
      let result = future.await;
      // Receiver lives as long as the query
      let _ = tx.send((generation, result));
    }));
  }

  /// Dispatch the last request again.
  pub fn refetch(&mut self) {
    if let Some(request) = self.request.clone() {
      self.dispatch(request);
    }
  }

  /// Apply any finished results. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok((generation, result)) = self.receiver.try_recv() {
      if generation != self.generation {
        debug!(generation, current = self.generation, "dropping stale response");
        continue;
      }
      self.task = None;
      changed = true;
      match result {
        Ok(data) => {
          self.state = QueryState::Success(data);
          self.fetched_at = Some(Instant::now());
        }
        Err(error) => self.state = QueryState::Error(error),
      }
    }
    changed
  }
}

impl<R, T> Drop for Query<R, T> {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}

impl<R: std::fmt::Debug, T: std::fmt::Debug> std::fmt::Debug for Query<R, T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("generation", &self.generation)
      .field("request", &self.request)
      .field("fetched_at", &self.fetched_at)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|n: u32| async move { Ok::<_, String>(vec![n; 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.dispatch(1);
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 1, 1]));
    assert!(query.fetched_at().is_some());
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<(), i32> = Query::new(|_| async { Err("Something went wrong".to_string()) });

    query.dispatch(());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_poll_without_result_is_unchanged() {
    let mut query = Query::new(|n: u32| async move {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(n)
    });

    assert!(!query.poll());
    query.dispatch(7);
    assert!(!query.poll());
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_later_dispatch_wins_even_if_earlier_finishes_last() {
    // First request is slow, second is fast: the slow result must not land
    let mut query = Query::new(|delay_ms: u64| async move {
      tokio::time::sleep(Duration::from_millis(delay_ms)).await;
      Ok::<_, String>(delay_ms)
    });

    query.dispatch(80);
    query.dispatch(5);
    tokio::time::sleep(Duration::from_millis(120)).await;

    query.poll();
    assert_eq!(query.data(), Some(&5));
    assert_eq!(query.request(), Some(&5));
  }

  #[tokio::test]
  async fn test_superseded_task_is_aborted() {
    let completed = Arc::new(AtomicU32::new(0));
    let counter = completed.clone();

    let mut query = Query::new(move |delay_ms: u64| {
      let counter = counter.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(delay_ms)
      }
    });

    query.dispatch(50);
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.dispatch(1);
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    assert_eq!(query.data(), Some(&1));
    assert_eq!(completed.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_repeats_last_request() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let mut query = Query::new(move |n: u32| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(n * 2)
      }
    });

    query.refetch();
    assert!(matches!(query.state(), QueryState::Idle));

    query.dispatch(21);
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    query.refetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(query.data(), Some(&42));
  }
}
