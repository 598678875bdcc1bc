use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use botdesk_core::domain::user::UserId;

use crate::client::{TelegramClient, TransportError};
use crate::events::{classify_update, IncomingUpdate};
use crate::service::ConversationService;
use crate::types::Update;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Inbound half of the bot transport.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream is closed for good.
    async fn next_update(&self) -> Result<Option<Update>, TransportError>;
    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateSource;

#[async_trait]
impl UpdateSource for NoopUpdateSource {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<Update>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: i64) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Long-polls `getUpdates`. Telegram confirms an update once a later call
/// passes an offset past its id, so acknowledging only moves the offset.
pub struct TelegramUpdateSource {
    client: TelegramClient,
    poll_timeout: Duration,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    offset: Option<i64>,
    buffered: VecDeque<Update>,
}

impl TelegramUpdateSource {
    pub fn new(client: TelegramClient, poll_timeout: Duration) -> Self {
        Self { client, poll_timeout, state: Mutex::new(PollState::default()) }
    }
}

#[async_trait]
impl UpdateSource for TelegramUpdateSource {
    async fn connect(&self) -> Result<(), TransportError> {
        let me = self.client.get_me().await?;
        info!(
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            bot_id = me.id,
            "telegram bot identity confirmed"
        );
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<Update>, TransportError> {
        loop {
            let offset = {
                let mut state = self.state.lock().await;
                if let Some(update) = state.buffered.pop_front() {
                    return Ok(Some(update));
                }
                state.offset
            };

            let updates = self.client.get_updates(offset, self.poll_timeout).await?;
            debug!(count = updates.len(), offset = ?offset, "long poll returned");
            self.state.lock().await.buffered.extend(updates);
        }
    }

    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        let next = update_id + 1;
        if state.offset.map_or(true, |offset| offset < next) {
            state.offset = Some(next);
        }
        Ok(())
    }
}

/// How long a user's worker waits for another update before it exits.
pub const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(300);

struct UserWorker {
    generation: u64,
    sender: mpsc::UnboundedSender<IncomingUpdate>,
    handle: JoinHandle<()>,
}

type WorkerMap = Arc<Mutex<HashMap<UserId, UserWorker>>>;

/// One sequential worker per user: a user's events apply in arrival order
/// while different users proceed concurrently. Workers that sit idle for
/// `idle_timeout` remove themselves; the next update for that user spawns a
/// fresh one.
pub struct UserQueues {
    service: Arc<ConversationService>,
    workers: WorkerMap,
    idle_timeout: Duration,
    next_generation: AtomicU64,
}

impl UserQueues {
    pub fn new(service: Arc<ConversationService>) -> Self {
        Self::with_idle_timeout(service, DEFAULT_WORKER_IDLE)
    }

    pub fn with_idle_timeout(service: Arc<ConversationService>, idle_timeout: Duration) -> Self {
        Self {
            service,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
            next_generation: AtomicU64::new(0),
        }
    }

    pub async fn enqueue(&self, update: IncomingUpdate) {
        let key = update.user.user_id.clone();
        let mut workers = self.workers.lock().await;

        let update = match workers.get(&key) {
            Some(worker) => match worker.sender.send(update) {
                Ok(()) => return,
                Err(error) => error.0,
            },
            None => update,
        };

        // Either no worker yet or the previous one is gone.
        let worker = self.spawn_worker(key.clone());
        if worker.sender.send(update).is_err() {
            warn!(user_id = %key, "fresh user worker rejected update");
        }
        workers.insert(key, worker);
    }

    pub async fn active_users(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Closes every queue and waits for in-flight work to drain.
    pub async fn shutdown(&self) {
        let workers: Vec<_> = self.workers.lock().await.drain().collect();
        for (user_id, worker) in workers {
            drop(worker.sender);
            if let Err(error) = worker.handle.await {
                warn!(user_id = %user_id, error = %error, "user worker ended abnormally");
            }
        }
    }

    fn spawn_worker(&self, user_id: UserId) -> UserWorker {
        let (sender, mut receiver) = mpsc::unbounded_channel::<IncomingUpdate>();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let service = Arc::clone(&self.service);
        let workers = Arc::clone(&self.workers);
        let idle_timeout = self.idle_timeout;

        let handle = tokio::spawn(async move {
            loop {
                let update = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
                    Ok(Some(update)) => update,
                    Ok(None) => break,
                    Err(_) => {
                        // `enqueue` sends under this lock, so once the queue is
                        // empty here no update can slip in before the entry goes.
                        let mut map = workers.lock().await;
                        match receiver.try_recv() {
                            Ok(update) => {
                                drop(map);
                                update
                            }
                            Err(_) => {
                                if map.get(&user_id).map_or(false, |w| w.generation == generation) {
                                    map.remove(&user_id);
                                }
                                receiver.close();
                                debug!(user_id = %user_id, "idle user worker retired");
                                break;
                            }
                        }
                    }
                };

                let report = service.handle(update).await;
                if report.message_failures > 0 || report.persistence_failed {
                    debug!(
                        user_id = %user_id,
                        message_failures = report.message_failures,
                        persistence_failed = report.persistence_failed,
                        "update handled with degraded side effects"
                    );
                }
            }
        });
        UserWorker { generation, sender, handle }
    }
}

pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    queues: UserQueues,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        service: Arc<ConversationService>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, queues: UserQueues::new(service), reconnect_policy }
    }

    /// Runs until the source closes or retries run out. Transport failures
    /// never crash the process; pending user work is drained before returning.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let mut delivered = 0_usize;
            match self.connect_and_pump(attempt, &mut delivered).await {
                Ok(()) => break,
                Err(transport_error) => {
                    // A healthy stretch of polling earns a fresh retry budget.
                    if delivered > 0 {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "telegram polling failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "telegram polling retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }

        self.queues.shutdown().await;
        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        delivered: &mut usize,
    ) -> Result<(), TransportError> {
        info!(attempt, "connecting to telegram");
        self.source.connect().await?;
        info!(attempt, "telegram long polling started");

        loop {
            let Some(update) = self.source.next_update().await? else {
                info!(attempt, "telegram update stream closed");
                return Ok(());
            };
            let correlation_id = format!("upd-{}", update.update_id);

            if let Err(error) = self.source.acknowledge(update.update_id).await {
                warn!(
                    event_name = "ingress.telegram.ack_sent",
                    correlation_id = %correlation_id,
                    error = %error,
                    "failed to acknowledge telegram update"
                );
            }
            *delivered += 1;

            let Some(incoming) = classify_update(&update) else {
                debug!(
                    event_name = "ingress.telegram.update_ignored",
                    correlation_id = %correlation_id,
                    "ignoring unsupported or bot-originated update"
                );
                continue;
            };

            info!(
                event_name = "ingress.telegram.update_received",
                correlation_id = %correlation_id,
                user_id = %incoming.user.user_id,
                kind = incoming.kind.name(),
                "received telegram update"
            );
            self.queues.enqueue(incoming).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use botdesk_core::audit::InMemoryAuditSink;
    use botdesk_core::catalog::Catalog;
    use botdesk_core::flows::InMemorySessionStore;
    use botdesk_core::notify::InMemoryNotifier;
    use botdesk_core::SessionMachine;
    use botdesk_db::InMemoryRequestRepository;

    use super::{PollingRunner, ReconnectPolicy, UpdateSource, UserQueues};
    use crate::client::TransportError;
    use crate::events::classify_update;
    use crate::dispatch::ActionDispatcher;
    use crate::render::WELCOME_TEXT;
    use crate::service::ConversationService;
    use crate::testing::RecordingTransport;
    use crate::types::Update;

    #[derive(Default)]
    struct ScriptedSource {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        updates: VecDeque<Result<Option<Update>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<i64>,
    }

    impl ScriptedSource {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            updates: Vec<Result<Option<Update>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    updates: updates.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<i64> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_update(&self) -> Result<Option<Update>, TransportError> {
            self.state.lock().await.updates.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError> {
            self.state.lock().await.acknowledgements.push(update_id);
            Ok(())
        }
    }

    fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
        let raw = serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "chat": { "id": user_id },
                "from": { "id": user_id, "is_bot": false, "first_name": "Grace" },
                "text": text
            }
        });
        serde_json::from_value(raw).expect("text update")
    }

    fn callback_update(update_id: i64, user_id: i64, data: &str) -> Update {
        let raw = serde_json::json!({
            "update_id": update_id,
            "callback_query": {
                "id": format!("cb-{update_id}"),
                "from": { "id": user_id, "is_bot": false, "first_name": "Grace" },
                "message": { "message_id": 1, "chat": { "id": user_id } },
                "data": data
            }
        });
        serde_json::from_value(raw).expect("callback update")
    }

    fn bot_update(update_id: i64) -> Update {
        let raw = serde_json::json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "chat": { "id": 5 },
                "from": { "id": 5, "is_bot": true, "first_name": "Relay" },
                "text": "/start"
            }
        });
        serde_json::from_value(raw).expect("bot update")
    }

    fn service(transport: Arc<RecordingTransport>) -> Arc<ConversationService> {
        let audit = Arc::new(InMemoryAuditSink::default());
        let machine = SessionMachine::new(
            Arc::new(Catalog::default()),
            Arc::new(InMemorySessionStore::default()),
        );
        let dispatcher = ActionDispatcher::new(
            transport.clone(),
            Arc::new(InMemoryRequestRepository::default()),
            Arc::new(InMemoryNotifier::default()),
            audit.clone(),
            "ops@example.com",
        );
        Arc::new(ConversationService::new(machine, dispatcher, transport, audit))
    }

    fn instant_retries(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(RecordingTransport::default());
        let source = Arc::new(ScriptedSource::with_script(
            vec![Err(TransportError::Request { method: "getMe".to_owned(), reason: "dns".to_owned() })],
            vec![Ok(Some(text_update(10, 77, "/start"))), Ok(None)],
        ));

        let runner = PollingRunner::new(source.clone(), service(transport.clone()), instant_retries(2));
        runner.start().await.expect("runner should not fail");

        assert_eq!(source.connect_attempts().await, 2);
        assert_eq!(source.acknowledgements().await, vec![10]);
        let texts = transport.texts().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains(WELCOME_TEXT));
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let failure =
            || Err(TransportError::Api { method: "getMe".to_owned(), description: "Unauthorized".to_owned() });
        let source = Arc::new(ScriptedSource::with_script(vec![failure(), failure(), failure()], vec![]));

        let runner = PollingRunner::new(
            source.clone(),
            service(Arc::new(RecordingTransport::default())),
            instant_retries(2),
        );
        runner.start().await.expect("runner should degrade gracefully");

        assert_eq!(source.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn one_users_events_apply_in_arrival_order() {
        let transport = Arc::new(RecordingTransport::default());
        let source = Arc::new(ScriptedSource::with_script(
            vec![],
            vec![
                Ok(Some(callback_update(1, 77, "pricing"))),
                Ok(Some(text_update(2, 88, "/start"))),
                Ok(Some(text_update(3, 77, "basic_bot, api_integration"))),
                Ok(None),
            ],
        ));

        let runner = PollingRunner::new(source.clone(), service(transport.clone()), instant_retries(0));
        runner.start().await.expect("runner");

        let for_77: Vec<String> = transport
            .messages()
            .await
            .into_iter()
            .filter(|(chat, _)| chat.0 == 77)
            .map(|(_, message)| message.text)
            .collect();
        assert_eq!(for_77.len(), 2);
        assert!(for_77[0].starts_with("💰 *Pricing Calculator*"));
        assert_eq!(for_77[1], "💰 Estimated Price: *$80*");
        assert_eq!(transport.answered_callbacks().await, vec!["cb-1".to_owned()]);
    }

    #[tokio::test]
    async fn bot_updates_are_acknowledged_but_ignored() {
        let transport = Arc::new(RecordingTransport::default());
        let source = Arc::new(ScriptedSource::with_script(vec![], vec![Ok(Some(bot_update(4))), Ok(None)]));

        let runner = PollingRunner::new(source.clone(), service(transport.clone()), instant_retries(0));
        runner.start().await.expect("runner");

        assert_eq!(source.acknowledgements().await, vec![4]);
        assert!(transport.messages().await.is_empty());
    }

    #[tokio::test]
    async fn mid_stream_failure_reconnects_with_fresh_budget() {
        let transport = Arc::new(RecordingTransport::default());
        let poll_error =
            || Err(TransportError::Request { method: "getUpdates".to_owned(), reason: "reset".to_owned() });
        let source = Arc::new(ScriptedSource::with_script(
            vec![],
            vec![
                Ok(Some(text_update(1, 77, "/start"))),
                poll_error(),
                Ok(Some(text_update(2, 77, "/start"))),
                poll_error(),
                Ok(None),
            ],
        ));

        let runner = PollingRunner::new(source.clone(), service(transport.clone()), instant_retries(1));
        runner.start().await.expect("runner");

        assert_eq!(source.connect_attempts().await, 3);
        assert_eq!(transport.texts().await.len(), 2);
    }

    #[tokio::test]
    async fn idle_workers_retire_and_respawn_on_demand() {
        let transport = Arc::new(RecordingTransport::default());
        let queues =
            UserQueues::with_idle_timeout(service(transport.clone()), Duration::from_millis(200));

        for user in 1..=20 {
            let incoming = classify_update(&text_update(user, user, "/start")).expect("incoming");
            queues.enqueue(incoming).await;
        }
        assert_eq!(queues.active_users().await, 20);

        for _ in 0..200 {
            if queues.active_users().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert_eq!(queues.active_users().await, 0);
        assert_eq!(transport.texts().await.len(), 20);

        let returning = classify_update(&text_update(21, 1, "/start")).expect("incoming");
        queues.enqueue(returning).await;
        assert_eq!(queues.active_users().await, 1);

        queues.shutdown().await;
        assert_eq!(transport.texts().await.len(), 21);
        assert_eq!(queues.active_users().await, 0);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(40), Duration::from_millis(1_000));
    }
}
