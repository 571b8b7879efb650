use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use staysearch_core::{CoreResult, EventPublisher, IdAllocator, SearchRepository};
use staysearch_shared::{SearchCriteria, SearchEvent};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Upper bound on ids remembered while their records are on the way to the
/// store. Past it the oldest reservation is forgotten.
const MAX_IN_FLIGHT: usize = 10_000;

/// Reservations checked against the store on every submission.
const PRUNE_BATCH: usize = 4;

/// Ids handed out whose records may not be stored yet. `order` holds the
/// same ids oldest first and is rotated by pruning.
#[derive(Debug, Default)]
struct InFlight {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl InFlight {
    fn claim(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.ids.len() >= MAX_IN_FLIGHT {
            if let Some(oldest) = self.order.pop_front() {
                warn!("Too many searches in flight, forgetting reservation {}", oldest);
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    fn release(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.order.retain(|held| held != id);
        }
    }

    fn take_oldest(&mut self, n: usize) -> Vec<String> {
        let n = n.min(self.order.len());
        self.order.drain(..n).collect()
    }

    fn requeue(&mut self, id: String) {
        if self.ids.contains(&id) {
            self.order.push_back(id);
        }
    }
}

/// Accepts a search and hands it to the event channel. Returns as soon as
/// the event is handed off; the record lands in the store later.
pub struct SearchService {
    repo: Arc<dyn SearchRepository>,
    allocator: Arc<dyn IdAllocator>,
    publisher: Arc<dyn EventPublisher>,
    in_flight: Mutex<InFlight>,
}

impl SearchService {
    pub fn new(
        repo: Arc<dyn SearchRepository>,
        allocator: Arc<dyn IdAllocator>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repo,
            allocator,
            publisher,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Criteria are expected to be validated by the caller.
    pub async fn submit(&self, criteria: SearchCriteria) -> CoreResult<String> {
        let search_id = self.reserve_id().await?;

        let event = SearchEvent::new(search_id.clone(), criteria);
        self.publisher.publish(event);

        debug!("Search {} accepted", search_id);
        self.prune_landed().await;
        Ok(search_id)
    }

    // An id is ours once it is neither stored nor held by another
    // submission still in flight. A store error aborts the submission; we
    // never hand out an id we could not check.
    async fn reserve_id(&self) -> CoreResult<String> {
        loop {
            let candidate = self.allocator.allocate();
            if !self.in_flight.lock().await.claim(&candidate) {
                warn!("Allocated search id {} is still in flight, drawing another", candidate);
                continue;
            }

            match self.repo.exists(&candidate).await {
                Ok(false) => return Ok(candidate),
                Ok(true) => {
                    self.in_flight.lock().await.release(&candidate);
                    warn!("Allocated search id {} already stored, drawing another", candidate);
                }
                Err(e) => {
                    self.in_flight.lock().await.release(&candidate);
                    return Err(e.into());
                }
            }
        }
    }

    // Once a record is stored `exists` guards its id, so the reservation
    // can go.
    async fn prune_landed(&self) {
        let oldest = self.in_flight.lock().await.take_oldest(PRUNE_BATCH);
        let mut pending = oldest.into_iter();

        while let Some(id) = pending.next() {
            match self.repo.exists(&id).await {
                Ok(true) => self.in_flight.lock().await.release(&id),
                Ok(false) => self.in_flight.lock().await.requeue(id),
                Err(e) => {
                    debug!("Skipping reservation pruning: {}", e);
                    let mut in_flight = self.in_flight.lock().await;
                    in_flight.requeue(id);
                    pending.for_each(|rest| in_flight.requeue(rest));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use staysearch_core::{
        ChannelError, CoreError, Delivery, EventChannel, InMemorySearchRepository, UuidAllocator,
    };
    use staysearch_shared::SearchRecord;
    use crate::publisher::{RecoveryHandler, RetryPolicy, SearchEventPublisher, Sleeper};

    /// Hands out a fixed script first, then `fresh-N` ids.
    struct ScriptedAllocator {
        script: std::sync::Mutex<VecDeque<String>>,
        fresh: std::sync::Mutex<u64>,
    }

    impl ScriptedAllocator {
        fn new(script: &[&str]) -> Self {
            Self {
                script: std::sync::Mutex::new(script.iter().map(|s| s.to_string()).collect()),
                fresh: std::sync::Mutex::new(0),
            }
        }
    }

    impl IdAllocator for ScriptedAllocator {
        fn allocate(&self) -> String {
            if let Some(id) = self.script.lock().unwrap().pop_front() {
                return id;
            }
            let mut n = self.fresh.lock().unwrap();
            *n += 1;
            format!("fresh-{}", n)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        events: std::sync::Mutex<Vec<SearchEvent>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, event: SearchEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct DownChannel;

    #[async_trait]
    impl EventChannel for DownChannel {
        fn destination(&self) -> &str {
            "searches"
        }

        async fn send(&self, _event: &SearchEvent) -> Result<Delivery, ChannelError> {
            Err(ChannelError::Send {
                topic: "searches".to_string(),
                reason: "broker down".to_string(),
            })
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    struct ChannelRecovery {
        tx: tokio::sync::mpsc::UnboundedSender<SearchEvent>,
    }

    impl RecoveryHandler for ChannelRecovery {
        fn recover(&self, _error: &ChannelError, event: &SearchEvent) {
            let _ = self.tx.send(event.clone());
        }
    }

    fn criteria() -> SearchCriteria {
        SearchCriteria::new("1234", "29/12/2023", "12/01/2024", vec![12, 32, 61, 19])
    }

    async fn seeded_repo(ids: &[&str]) -> Arc<InMemorySearchRepository> {
        let repo = Arc::new(InMemorySearchRepository::new());
        for id in ids {
            repo.upsert(&SearchRecord::new(*id, criteria())).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_submit_publishes_event_with_returned_id() {
        let publisher = Arc::new(RecordingPublisher::default());
        let service = SearchService::new(
            Arc::new(InMemorySearchRepository::new()),
            Arc::new(UuidAllocator),
            publisher.clone(),
        );

        let id = service.submit(criteria()).await.unwrap();

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].search_id, id);
        assert_eq!(events[0].criteria(), criteria());
    }

    #[tokio::test]
    async fn test_repeated_collisions_are_skipped() {
        let repo = seeded_repo(&["taken-1", "taken-2"]).await;
        let allocator = Arc::new(ScriptedAllocator::new(&["taken-1", "taken-2", "taken-1", "free"]));
        let service = SearchService::new(repo, allocator, Arc::new(RecordingPublisher::default()));

        assert_eq!(service.submit(criteria()).await.unwrap(), "free");
    }

    #[tokio::test]
    async fn test_in_flight_id_is_not_handed_out_twice() {
        // Nothing is stored: the first "dup" only exists as an event in flight.
        let allocator = Arc::new(ScriptedAllocator::new(&["dup", "dup", "free"]));
        let service = SearchService::new(
            Arc::new(InMemorySearchRepository::new()),
            allocator,
            Arc::new(RecordingPublisher::default()),
        );

        let first = service.submit(criteria()).await.unwrap();
        let second = service.submit(criteria()).await.unwrap();

        assert_eq!(first, "dup");
        assert_eq!(second, "free");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_get_distinct_ids() {
        let taken = ["taken-0", "taken-1", "taken-2", "taken-3", "taken-4"];
        let repo = seeded_repo(&taken).await;
        let script: Vec<&str> = taken.iter().cycle().take(25).copied().collect();
        let publisher = Arc::new(RecordingPublisher::default());
        let service = Arc::new(SearchService::new(
            repo,
            Arc::new(ScriptedAllocator::new(&script)),
            publisher.clone(),
        ));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let service = service.clone();
            tasks.spawn(async move { service.submit(criteria()).await });
        }

        let mut ids = HashSet::new();
        while let Some(res) = tasks.join_next().await {
            let id = res.unwrap().unwrap();
            assert!(!id.starts_with("taken-"), "collided id {} accepted", id);
            assert!(ids.insert(id), "duplicate id returned");
        }
        assert_eq!(ids.len(), 20);
        assert_eq!(publisher.events.lock().unwrap().len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_unseeded_collisions_get_distinct_ids() {
        let script = vec!["same"; 30];
        let service = Arc::new(SearchService::new(
            Arc::new(InMemorySearchRepository::new()),
            Arc::new(ScriptedAllocator::new(&script)),
            Arc::new(RecordingPublisher::default()),
        ));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let service = service.clone();
            tasks.spawn(async move { service.submit(criteria()).await });
        }

        let mut ids = HashSet::new();
        while let Some(res) = tasks.join_next().await {
            assert!(ids.insert(res.unwrap().unwrap()), "duplicate id returned");
        }
        assert_eq!(ids.len(), 10);
        assert!(ids.contains("same"));
    }

    #[tokio::test]
    async fn test_stored_reservations_are_released() {
        let repo = Arc::new(InMemorySearchRepository::new());
        let service = SearchService::new(
            repo.clone(),
            Arc::new(ScriptedAllocator::new(&["a"])),
            Arc::new(RecordingPublisher::default()),
        );

        service.submit(criteria()).await.unwrap();
        assert!(service.in_flight.lock().await.ids.contains("a"));

        // The subscriber catches up, the next submission notices.
        repo.upsert(&SearchRecord::new("a", criteria())).await.unwrap();
        let next = service.submit(criteria()).await.unwrap();

        let in_flight = service.in_flight.lock().await;
        assert!(!in_flight.ids.contains("a"));
        assert!(in_flight.ids.contains(&next));
        assert_eq!(in_flight.order.len(), in_flight.ids.len());
    }

    #[test]
    fn test_in_flight_is_bounded() {
        let mut in_flight = InFlight::default();
        for n in 0..=MAX_IN_FLIGHT {
            assert!(in_flight.claim(&format!("id-{}", n)));
        }

        assert_eq!(in_flight.ids.len(), MAX_IN_FLIGHT);
        assert!(!in_flight.ids.contains("id-0"));
        assert!(!in_flight.claim("id-1"));
    }

    #[tokio::test]
    async fn test_store_unavailable_aborts_without_publishing() {
        let repo = Arc::new(InMemorySearchRepository::new());
        repo.set_unavailable(true);
        let publisher = Arc::new(RecordingPublisher::default());
        let service = SearchService::new(repo, Arc::new(UuidAllocator), publisher.clone());

        let err = service.submit(criteria()).await.unwrap_err();

        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        assert!(publisher.events.lock().unwrap().is_empty());
        assert!(service.in_flight.lock().await.ids.is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_still_returns_id_and_recovers_once() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let publisher = SearchEventPublisher::new(Arc::new(DownChannel), RetryPolicy::default())
            .with_sleeper(Arc::new(NoSleep))
            .with_recovery(Arc::new(ChannelRecovery { tx }));
        let repo = Arc::new(InMemorySearchRepository::new());
        let service = SearchService::new(repo.clone(), Arc::new(UuidAllocator), Arc::new(publisher));

        let id = service.submit(criteria()).await.unwrap();

        let recovered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recovered.search_id, id);
        assert_eq!(recovered.criteria(), criteria());

        // The background task is done once recovery has run.
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(!repo.exists(&id).await.unwrap());
    }
}
