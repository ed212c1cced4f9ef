//! Application state and event loop
//!
//! [`App`] owns the transient view state (due-queue, connection state,
//! permission) and wires the services together. The store stays the
//! source of truth; the app only ever reads snapshots of it.

use crate::clock::Clock;
use crate::commands::{Command, HELP};
use crate::config::TEST_NOTIFICATION_BODY;
use crate::error::Result;
use crate::services::connection::{ConnectionProvider, ConnectionState};
use crate::services::dispatcher::{DispatchOutcome, Dispatcher, DueQueue};
use crate::services::notifier::Notifier;
use crate::services::permission::{request_permission, PermissionState};
use crate::services::reminders::{RemindersService, Snapshot};
use crate::services::scheduler::{DueCheck, Ticker};
use crate::services::settings::AppSettings;
use crate::storage::Entries;
use crate::ui::{self, Screen};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Runtime options derived from settings
#[derive(Debug, Clone, Copy)]
pub struct AppOptions {
    pub reminder_offset_ms: i64,
    pub due_check: DueCheck,
}

impl From<&AppSettings> for AppOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            reminder_offset_ms: settings.reminder_offset_ms(),
            due_check: DueCheck::new(settings.due_check, crate::config::TICK_INTERVAL),
        }
    }
}

/// Whether the event loop keeps going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    options: AppOptions,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    dispatcher: Dispatcher,
    permission: PermissionState,
    connection: ConnectionState,
    reminders: Option<RemindersService>,
    queue: DueQueue,
    dispatch_pending: bool,
    last_rendered: Option<Arc<Entries>>,
    screen: Screen,
}

impl App {
    pub fn new(
        options: AppOptions,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        screen: Screen,
    ) -> Self {
        Self {
            options,
            clock,
            dispatcher: Dispatcher::new(Arc::clone(&notifier)),
            notifier,
            permission: PermissionState::default(),
            connection: ConnectionState::Connecting,
            reminders: None,
            queue: DueQueue::new(),
            dispatch_pending: false,
            last_rendered: None,
            screen,
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn reminders(&self) -> Option<&RemindersService> {
        self.reminders.as_ref()
    }

    pub fn queue(&self) -> &DueQueue {
        &self.queue
    }

    /// Whether the due-queue changed since the last dispatch and still has
    /// entries
    pub fn dispatch_pending(&self) -> bool {
        self.dispatch_pending
    }

    pub fn snapshot(&self) -> Snapshot {
        self.reminders
            .as_ref()
            .map(RemindersService::snapshot)
            .unwrap_or_default()
    }

    /// Ask the notifier for permission and remember the answer
    pub async fn request_permission(&mut self) -> PermissionState {
        self.permission = request_permission(self.notifier.as_ref()).await;
        self.permission
    }

    /// Take a new connection state. The first `Ready` state loads the
    /// reminder store; a load failure is treated like a failed connection.
    pub async fn apply_connection(&mut self, state: ConnectionState) -> Result<()> {
        let mut state = state;

        let service = match (&state, &self.reminders) {
            (ConnectionState::Ready(connection), None) => Some(RemindersService::new(
                Arc::clone(&connection.store),
                Arc::clone(&self.clock),
                self.options.reminder_offset_ms,
            )),
            _ => None,
        };

        if let Some(service) = service {
            match service.load().await {
                Ok(()) => self.reminders = Some(service),
                Err(e) => {
                    tracing::error!("Failed to load reminder store: {}", e);
                    state = ConnectionState::Failed(e.to_string());
                }
            }
        }

        self.connection = state;
        self.screen
            .print(&ui::render_status(&self.connection, &self.permission))?;
        self.render_list_if_changed()
    }

    /// One scheduler tick: refresh, due-check, enqueue. Returns the number
    /// of reminders enqueued.
    pub async fn tick(&mut self) -> Result<usize> {
        let now = self.clock.now();
        // The clock runs whether or not the store is up
        self.screen.set_title(&ui::format_clock(&now))?;

        let Some(reminders) = &self.reminders else {
            return Ok(0);
        };

        // Judge against a fresh copy so peer writes are seen
        let snapshot = reminders.refresh().await;
        let due = self.options.due_check.scan(&snapshot, &now);
        let count = due.len();

        if count > 0 {
            tracing::info!("{} reminder(s) due", count);
            self.queue.extend(due);
            self.dispatch_pending = true;
        }

        self.render_list_if_changed()?;
        Ok(count)
    }

    /// Dispatch the head of the due-queue. Popping is itself a queue
    /// change, so another dispatch stays pending while entries remain.
    pub async fn dispatch_next(&mut self) -> DispatchOutcome {
        let snapshot = self.snapshot();
        let outcome = self
            .dispatcher
            .dispatch_one(&mut self.queue, &snapshot, self.permission)
            .await;
        self.dispatch_pending = !self.queue.is_empty();

        if outcome.marks_stale() {
            if let Some(reminders) = &self.reminders {
                reminders.refresh().await;
            }
        }

        outcome
    }

    /// Handle one line of input
    pub async fn submit(&mut self, line: &str) -> Result<Flow> {
        self.handle(Command::parse(line)).await
    }

    pub async fn handle(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Create(message) => {
                let Some(reminders) = &self.reminders else {
                    return self.not_connected();
                };
                match reminders.create(&message).await {
                    Ok(Some(entry)) => {
                        let due = ui::format_due(&entry.reminder, &self.clock.now().timezone());
                        self.screen
                            .print(&format!("Reminder {} set for {}", entry.id, due))?;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("Failed to create reminder: {}", e);
                        self.screen.print(&format!("Could not save reminder: {}", e))?;
                    }
                }
                self.render_list_if_changed()?;
            }
            Command::Delete(id) => {
                let Some(reminders) = &self.reminders else {
                    return self.not_connected();
                };
                if let Err(e) = reminders.delete(&id).await {
                    tracing::error!("Failed to delete reminder {}: {}", id, e);
                    self.screen.print(&format!("Could not delete reminder: {}", e))?;
                }
                self.render_list_if_changed()?;
            }
            Command::TestNotification => {
                match self.dispatcher.notify(self.permission, TEST_NOTIFICATION_BODY).await {
                    Ok(true) => {}
                    Ok(false) => self.screen.print(&format!(
                        "Notifications are not permitted ({})",
                        self.permission.permission
                    ))?,
                    Err(e) => {
                        tracing::error!("Test notification failed: {}", e);
                        self.screen.print(&format!("Test notification failed: {}", e))?;
                    }
                }
            }
            Command::List => {
                let snapshot = self.snapshot();
                self.screen
                    .print(&ui::render_list(&snapshot, &self.clock.now()))?;
                self.last_rendered = Some(snapshot.entries);
            }
            Command::Status => self
                .screen
                .print(&ui::render_status(&self.connection, &self.permission))?,
            Command::Clock => self
                .screen
                .print(&ui::format_clock(&self.clock.now()).to_string())?,
            Command::Help => self.screen.print(HELP)?,
            Command::Unknown(input) => self
                .screen
                .print(&format!("Unknown command: {} (try /help)", input))?,
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    /// Drive the application until `/quit`, end of input or Ctrl-C.
    ///
    /// Input is read as raw lines and decoded lossily. A command that fails
    /// is logged and the loop keeps going.
    pub async fn run<R>(mut self, connection: ConnectionProvider, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.split(b'\n');
        let mut connection_rx = connection.subscribe();
        let mut ticker = Ticker::new(self.options.due_check.tick());

        self.request_permission().await;
        tracing::debug!("Starting with {:?}", self.options.due_check);

        // Whatever the provider already knows, then the help text
        let initial = connection_rx.borrow_and_update().clone();
        if let Err(e) = self.apply_connection(initial).await {
            tracing::error!("Failed to show connection state: {}", e);
        }
        self.screen.print(HELP)?;

        loop {
            tokio::select! {
                () = ticker.fired() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!("Tick failed: {}", e);
                    }
                    // Re-arm only after the tick finished
                    ticker.rearm();
                }
                changed = connection_rx.changed() => {
                    if changed.is_ok() {
                        let state = connection_rx.borrow_and_update().clone();
                        if let Err(e) = self.apply_connection(state).await {
                            tracing::error!("Failed to show connection state: {}", e);
                        }
                    }
                }
                // One entry per turn so ticks and input interleave with a long queue
                () = std::future::ready(()), if self.dispatch_pending => {
                    self.dispatch_next().await;
                }
                segment = lines.next_segment() => {
                    match segment {
                        Ok(Some(bytes)) => {
                            let line = decode_line(&bytes);
                            match self.submit(&line).await {
                                Ok(Flow::Quit) => break,
                                Ok(Flow::Continue) => {}
                                Err(e) => tracing::error!("Command failed: {}", e),
                            }
                        }
                        Ok(None) => {
                            tracing::info!("Input closed");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Failed to read input: {}", e);
                            break;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(connection) = self.connection.connection() {
            connection.node.close().await;
        }
        tracing::info!("dReminder stopped");
    }

    fn not_connected(&mut self) -> Result<Flow> {
        self.screen.print("Not connected to the reminder store")?;
        Ok(Flow::Continue)
    }

    fn render_list_if_changed(&mut self) -> Result<()> {
        let Some(reminders) = &self.reminders else {
            return Ok(());
        };

        let snapshot = reminders.snapshot();
        let unchanged = self
            .last_rendered
            .as_ref()
            .is_some_and(|last| **last == *snapshot.entries);
        if unchanged {
            return Ok(());
        }

        self.screen
            .print(&ui::render_list(&snapshot, &self.clock.now()))?;
        self.last_rendered = Some(snapshot.entries);
        Ok(())
    }
}

/// One input line without its terminator. Invalid UTF-8 becomes U+FFFD.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::services::notifier::MemoryNotifier;
    use crate::services::permission::Permission;
    use crate::services::connection::Connection;
    use crate::storage::{KeyValueStore, MemoryKvStore};
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};

    const T: i64 = 1_700_000_000_000;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        app: App,
        clock: Arc<ManualClock>,
        notifier: Arc<MemoryNotifier>,
        store: Arc<MemoryKvStore>,
        output: SharedBuffer,
    }

    /// App with a loaded in-memory store. Connection state is applied by
    /// the caller through a `Ready` connection backed by a memory node.
    async fn create_test_app(permission: Permission) -> Harness {
        let clock = Arc::new(ManualClock::new(T));
        let notifier = Arc::new(MemoryNotifier::new(permission));
        let store = Arc::new(MemoryKvStore::new("reminders"));
        let output = SharedBuffer::default();

        let mut app = App::new(
            AppOptions {
                reminder_offset_ms: 180_000,
                due_check: DueCheck::default(),
            },
            clock.clone(),
            notifier.clone(),
            Screen::new(Box::new(output.clone())),
        );
        app.request_permission().await;

        let node = crate::node::Node::from_repository(crate::database::Repository::new(
            crate::database::create_memory_pool().await.unwrap(),
        ))
        .await
        .unwrap();
        app.apply_connection(ConnectionState::Ready(Connection {
            node,
            store: store.clone(),
        }))
        .await
        .unwrap();

        Harness {
            app,
            clock,
            notifier,
            store,
            output,
        }
    }

    #[tokio::test]
    async fn test_commands_before_connection() {
        let output = SharedBuffer::default();
        let mut app = App::new(
            AppOptions {
                reminder_offset_ms: 180_000,
                due_check: DueCheck::default(),
            },
            Arc::new(ManualClock::new(T)),
            Arc::new(MemoryNotifier::new(Permission::Granted)),
            Screen::new(Box::new(output.clone())),
        );

        assert_eq!(app.submit("Lunch time").await.unwrap(), Flow::Continue);
        assert_eq!(app.tick().await.unwrap(), 0);
        assert!(output.contents().contains("Not connected"));
    }

    #[tokio::test]
    async fn test_reminder_fires_after_offset() {
        let mut h = create_test_app(Permission::Granted).await;

        h.app.submit("Lunch time").await.unwrap();
        assert_eq!(h.app.snapshot().len(), 1);

        h.clock.advance(179_000);
        assert_eq!(h.app.tick().await.unwrap(), 0);

        h.clock.advance(1_000);
        assert_eq!(h.app.tick().await.unwrap(), 1);
        assert!(h.app.dispatch_pending());

        let outcome = h.app.dispatch_next().await;
        assert!(matches!(outcome, DispatchOutcome::Notified { ref message, .. } if message == "Lunch time"));
        assert!(h.app.queue().is_empty());
        assert!(!h.app.dispatch_pending());
        assert_eq!(h.notifier.shown()[0].1, "Lunch time");
    }

    #[tokio::test]
    async fn test_deleted_before_dispatch_is_dropped() {
        let mut h = create_test_app(Permission::Granted).await;

        h.app.submit("Call back").await.unwrap();
        let id = h.app.snapshot().entries.keys().next().cloned().unwrap();

        h.clock.advance(180_000);
        assert_eq!(h.app.tick().await.unwrap(), 1);

        h.app.submit(&format!("/del {}", id)).await.unwrap();
        assert!(h.store.all().is_empty());

        let outcome = h.app.dispatch_next().await;
        assert_eq!(outcome, DispatchOutcome::Dropped { id });
        assert!(h.notifier.shown().is_empty());
    }

    #[tokio::test]
    async fn test_queue_of_three_needs_three_dispatches() {
        let mut h = create_test_app(Permission::Granted).await;

        for message in ["one", "two", "three"] {
            h.app.submit(message).await.unwrap();
        }
        h.clock.advance(180_000);
        assert_eq!(h.app.tick().await.unwrap(), 3);

        for remaining in [2, 1, 0] {
            assert!(h.app.dispatch_pending());
            h.app.dispatch_next().await;
            assert_eq!(h.app.queue().len(), remaining);
        }
        assert!(!h.app.dispatch_pending());
        assert_eq!(h.notifier.shown().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let mut h = create_test_app(Permission::Granted).await;

        h.app.submit("").await.unwrap();
        h.app.submit("    ").await.unwrap();

        assert!(h.store.all().is_empty());
    }

    #[tokio::test]
    async fn test_escaped_slash_creates_reminder() {
        let mut h = create_test_app(Permission::Granted).await;

        h.app.submit("//2 cups of flour").await.unwrap();

        assert_eq!(stored_messages(&h.store), vec!["/2 cups of flour"]);
    }

    #[tokio::test]
    async fn test_test_notification_respects_permission() {
        let mut granted = create_test_app(Permission::Granted).await;
        granted.app.submit("/test").await.unwrap();
        assert_eq!(granted.notifier.shown()[0].1, TEST_NOTIFICATION_BODY);

        let mut denied = create_test_app(Permission::Denied).await;
        denied.app.submit("/test").await.unwrap();
        assert!(denied.notifier.shown().is_empty());
        assert!(denied.output.contents().contains("not permitted"));
    }

    #[tokio::test]
    async fn test_status_and_quit() {
        let mut h = create_test_app(Permission::Granted).await;

        assert_eq!(h.app.submit("/status").await.unwrap(), Flow::Continue);
        assert!(h.output.contents().contains("Node connected"));
        assert!(h.output.contents().contains("Store instantiated: "));
        assert_eq!(h.app.submit("/quit").await.unwrap(), Flow::Quit);
    }

    struct RunHarness {
        app: App,
        provider: ConnectionProvider,
        clock: Arc<ManualClock>,
        notifier: Arc<MemoryNotifier>,
        store: Arc<MemoryKvStore>,
        output: SharedBuffer,
    }

    /// App that has not started yet, with a provider that is already ready
    async fn create_run_app() -> RunHarness {
        let clock = Arc::new(ManualClock::new(T));
        let notifier = Arc::new(MemoryNotifier::new(Permission::Granted));
        let store = Arc::new(MemoryKvStore::new("reminders"));
        let node = crate::node::Node::from_repository(crate::database::Repository::new(
            crate::database::create_memory_pool().await.unwrap(),
        ))
        .await
        .unwrap();
        let provider = ConnectionProvider::ready(Connection {
            node,
            store: store.clone(),
        });
        let output = SharedBuffer::default();
        let app = App::new(
            AppOptions {
                reminder_offset_ms: 180_000,
                due_check: DueCheck::default(),
            },
            clock.clone(),
            notifier.clone(),
            Screen::new(Box::new(output.clone())),
        );

        RunHarness {
            app,
            provider,
            clock,
            notifier,
            store,
            output,
        }
    }

    fn stored_messages(store: &MemoryKvStore) -> Vec<String> {
        store
            .all()
            .values()
            .filter_map(crate::database::Reminder::from_value)
            .map(|reminder| reminder.message)
            .collect()
    }

    #[tokio::test]
    async fn test_run_until_end_of_input() {
        let h = create_run_app().await;

        let input: &[u8] = b"Water plants\n/list\n";
        h.app.run(h.provider, input).await.unwrap();

        assert_eq!(h.store.all().len(), 1);
        assert!(h.output.contents().contains("Water plants"));
    }

    #[tokio::test]
    async fn test_run_survives_invalid_utf8_line() {
        let h = create_run_app().await;

        let input: &[u8] = b"caf\xe9 break\r\nWater plants\n";
        h.app.run(h.provider, input).await.unwrap();

        let mut messages = stored_messages(&h.store);
        messages.sort();
        assert_eq!(messages, vec!["Water plants", "caf\u{FFFD} break"]);
    }

    #[tokio::test]
    async fn test_run_ticks_and_dispatches() {
        let h = create_run_app().await;
        tokio::time::pause();

        let (reader, mut writer) = tokio::io::duplex(256);
        let clock = h.clock.clone();
        let notifier = h.notifier.clone();

        let user = async move {
            writer.write_all(b"Lunch time\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(notifier.shown().is_empty());

            // the next tick lands in the due second
            clock.advance(180_000);
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            assert_eq!(
                notifier.shown(),
                vec![("dReminder".to_string(), "Lunch time".to_string())]
            );

            clock.advance(1_000);
            writer.write_all(b"/quit\n").await.unwrap();
        };

        let (result, ()) = tokio::join!(h.app.run(h.provider, BufReader::new(reader)), user);
        result.unwrap();
        assert_eq!(h.store.all().len(), 1);
    }
}
