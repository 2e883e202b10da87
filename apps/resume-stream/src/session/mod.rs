#![allow(dead_code)]

//! Stream session: one résumé extraction request, end to end.
//!
//! `StreamSession` is a cheap handle; all state lives in a single worker task
//! that owns the `SessionMachine`. Commands (`start`, `cancel`, `clear`) and
//! transport events (message, close, error) are funnelled into that task, so
//! events are applied one at a time, in arrival order, and every transport
//! event is tagged with the generation that opened it.
//!
//! Observers read the latest state through a `watch` channel of
//! `SessionView`s. `transitions()` hands out every published view in order,
//! including short-lived ones such as a generation cancelled by a new start.

pub mod machine;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::errors::SessionError;
use crate::extraction_client::{ExtractionTransport, TransportError};

pub use machine::{validate_input, SessionMachine, SessionState, SessionView, Step};

const INBOUND_BUFFER: usize = 64;
const TRANSITION_BUFFER: usize = 64;

#[derive(Debug)]
enum Command {
    Start { generation: u64, text: String },
    Cancel,
    Clear { generation: u64 },
}

#[derive(Debug)]
enum Inbound {
    Message(String),
    Closed,
    Failed(TransportError),
}

pub struct StreamSession {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    transitions: broadcast::Sender<SessionView>,
    generations: AtomicU64,
}

impl StreamSession {
    /// Spawns the session worker. Must be called inside a Tokio runtime.
    pub fn spawn(transport: Arc<dyn ExtractionTransport>) -> Self {
        let machine = SessionMachine::new();
        let (view_tx, view_rx) = watch::channel(machine.view());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);

        let worker = SessionWorker {
            transport,
            machine,
            view: view_tx,
            transitions: transitions.clone(),
            commands: commands_rx,
            inbound_tx,
            inbound_rx,
            pump: None,
        };
        tokio::spawn(worker.run());

        Self {
            commands: commands_tx,
            view: view_rx,
            transitions,
            generations: AtomicU64::new(0),
        }
    }

    /// Starts a new generation and returns its number immediately. Blank
    /// input is rejected here, before anything reaches the transport.
    pub fn start(&self, text: impl Into<String>) -> Result<u64, SessionError> {
        let text = text.into();
        validate_input(&text)?;

        let generation = self.next_generation();
        self.commands
            .send(Command::Start { generation, text })
            .map_err(|_| SessionError::Closed)?;
        Ok(generation)
    }

    pub fn cancel(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::Cancel)
            .map_err(|_| SessionError::Closed)
    }

    /// Abandons the current session and returns to `Idle`.
    pub fn clear(&self) -> Result<u64, SessionError> {
        let generation = self.next_generation();
        self.commands
            .send(Command::Clear { generation })
            .map_err(|_| SessionError::Closed)?;
        Ok(generation)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Every view published from now on, in order. A receiver that falls
    /// more than the buffer behind gets `RecvError::Lagged`.
    pub fn transitions(&self) -> broadcast::Receiver<SessionView> {
        self.transitions.subscribe()
    }

    pub fn current(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Waits until `generation` reaches a terminal state, or until a newer
    /// generation has replaced it, and returns that view.
    pub async fn settled(&self, generation: u64) -> Result<SessionView, SessionError> {
        let mut view = self.view.clone();
        let settled = view
            .wait_for(|v| {
                v.generation > generation || (v.generation == generation && v.state.is_terminal())
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(settled.clone())
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }
}

struct SessionWorker {
    transport: Arc<dyn ExtractionTransport>,
    machine: SessionMachine,
    view: watch::Sender<SessionView>,
    transitions: broadcast::Sender<SessionView>,
    commands: mpsc::UnboundedReceiver<Command>,
    inbound_tx: mpsc::Sender<(u64, Inbound)>,
    inbound_rx: mpsc::Receiver<(u64, Inbound)>,
    pump: Option<JoinHandle<()>>,
}

impl SessionWorker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle is gone.
                    None => break,
                },
                Some((generation, inbound)) = self.inbound_rx.recv() => {
                    self.handle_inbound(generation, inbound);
                }
            }
        }
        self.stop_pump();
        debug!("Session worker stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { generation, text } => {
                // The handle validated `text`, so the running generation can
                // be cancelled and published before the new one begins.
                if self.machine.supersede(generation) == Step::Published {
                    self.stop_pump();
                    self.publish();
                }
                match self.machine.begin(generation, &text) {
                    Ok(Step::Published) => {
                        self.stop_pump();
                        self.spawn_pump(generation, text);
                        self.publish();
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Start rejected: {e}"),
                }
            }
            Command::Cancel => {
                if self.machine.cancel() == Step::Published {
                    self.stop_pump();
                    self.publish();
                }
            }
            Command::Clear { generation } => {
                if self.machine.clear(generation) == Step::Published {
                    self.stop_pump();
                    self.publish();
                }
            }
        }
    }

    fn handle_inbound(&mut self, generation: u64, inbound: Inbound) {
        let step = match inbound {
            Inbound::Message(raw) => self.machine.on_message(generation, &raw),
            Inbound::Closed => self.machine.on_close(generation),
            Inbound::Failed(e) => self.machine.on_transport_error(generation, e),
        };

        if step == Step::Published {
            if self.machine.state().is_terminal() {
                self.stop_pump();
            }
            self.publish();
        }
    }

    /// Opens the transport for `generation` on its own task and relays every
    /// event into the worker, tagged with the generation.
    fn spawn_pump(&mut self, generation: u64, text: String) {
        let transport = Arc::clone(&self.transport);
        let tx = self.inbound_tx.clone();

        self.pump = Some(tokio::spawn(async move {
            let mut events = match transport.open(&text).await {
                Ok(events) => events,
                Err(e) => {
                    let _ = tx.send((generation, Inbound::Failed(e))).await;
                    return;
                }
            };

            while let Some(item) = events.next().await {
                let (inbound, last) = match item {
                    Ok(raw) => (Inbound::Message(raw), false),
                    Err(e) => (Inbound::Failed(e), true),
                };
                if tx.send((generation, inbound)).await.is_err() || last {
                    return;
                }
            }

            let _ = tx.send((generation, Inbound::Closed)).await;
        }));
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn publish(&self) {
        let view = self.machine.view();
        // No subscribers is fine.
        let _ = self.transitions.send(view.clone());
        self.view.send_replace(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_stream::wrappers::ReceiverStream;

    use crate::errors::{Failure, CONNECTION_ERROR_MESSAGE};
    use crate::extraction_client::EventStream;

    const TEXT: &str = "Jane Doe\njane@example.com\nSoftware Engineer at Tech Corp";

    const CONTACT: &str = r#"{"contact_info":{"name":"Jane Doe","email":"jane@example.com"}}"#;
    const CONTACT_SUMMARY_WORK: &str = r#"{"contact_info":{"name":"Jane Doe"},"summary":"Engineer","work_experience":[{"role":"Software Engineer","company":"Tech Corp"}]}"#;
    const OTHER_PERSON: &str = r#"{"contact_info":{"name":"John Doe"},"projects":[{"name":"Task Management App"}]}"#;

    /// One scripted response per `open` call, consumed in order.
    enum Script {
        Events(Vec<Result<String, TransportError>>),
        Live(mpsc::Receiver<Result<String, TransportError>>),
        Refuse(TransportError),
    }

    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        opened: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                opened: Mutex::new(Vec::new()),
            })
        }

        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExtractionTransport for ScriptedTransport {
        async fn open(&self, text: &str) -> Result<EventStream, TransportError> {
            self.opened.lock().unwrap().push(text.to_string());
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("no script left for open()");
            match script {
                Script::Events(events) => Ok(Box::pin(tokio_stream::iter(events))),
                Script::Live(rx) => Ok(Box::pin(ReceiverStream::new(rx))),
                Script::Refuse(e) => Err(e),
            }
        }
    }

    fn events(raw: &[&str]) -> Script {
        Script::Events(raw.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn session(transport: &Arc<ScriptedTransport>) -> StreamSession {
        StreamSession::spawn(Arc::clone(transport) as Arc<dyn ExtractionTransport>)
    }

    #[tokio::test]
    async fn test_completed_session_forces_score_to_100() {
        let transport = ScriptedTransport::new(vec![events(&[CONTACT, CONTACT_SUMMARY_WORK])]);
        let session = session(&transport);

        let generation = session.start(TEXT).unwrap();
        let view = session.settled(generation).await.unwrap();

        assert_eq!(view.state, SessionState::Completed);
        assert_eq!(view.score, 100);
        assert_eq!(view.document.summary.as_deref(), Some("Engineer"));
        assert_eq!(transport.opened(), vec![TEXT.to_string()]);
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected_before_transport() {
        let transport = ScriptedTransport::new(vec![]);
        let session = session(&transport);

        let err = session.start("   ").unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        tokio::task::yield_now().await;
        assert_eq!(session.current().state, SessionState::Idle);
        assert!(transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let transport = ScriptedTransport::new(vec![
            events(&[CONTACT, r#"{"summary": "Engin"#, CONTACT_SUMMARY_WORK]),
            events(&[CONTACT, CONTACT_SUMMARY_WORK]),
        ]);
        let session = session(&transport);

        let noisy = session.start(TEXT).unwrap();
        let noisy = session.settled(noisy).await.unwrap();
        let clean = session.start(TEXT).unwrap();
        let clean = session.settled(clean).await.unwrap();

        assert_eq!(noisy.state, SessionState::Completed);
        assert_eq!(noisy.document, clean.document);
    }

    #[tokio::test]
    async fn test_remote_error_fails_and_stops_consuming() {
        let transport = ScriptedTransport::new(vec![events(&[
            CONTACT,
            r#"{"error": "Resume could not be parsed"}"#,
            CONTACT_SUMMARY_WORK,
        ])]);
        let session = session(&transport);

        let generation = session.start(TEXT).unwrap();
        let view = session.settled(generation).await.unwrap();

        assert_eq!(
            view.state,
            SessionState::Failed(Failure::Remote("Resume could not be parsed".to_string()))
        );
        // The last good document stays visible.
        assert!(view.document.summary.is_none());
        assert_eq!(view.score, 14);
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let transport = ScriptedTransport::new(vec![Script::Events(vec![
            Ok(CONTACT.to_string()),
            Err(TransportError::Disconnected("connection reset".to_string())),
        ])]);
        let session = session(&transport);

        let generation = session.start(TEXT).unwrap();
        let view = session.settled(generation).await.unwrap();

        assert_eq!(
            view.state,
            SessionState::Failed(Failure::Transport(CONNECTION_ERROR_MESSAGE.to_string()))
        );
        assert_eq!(view.score, 14);
    }

    #[tokio::test]
    async fn test_refused_stream_fails() {
        let transport = ScriptedTransport::new(vec![Script::Refuse(TransportError::Status {
            status: 400,
            message: "Resume text is required".to_string(),
        })]);
        let session = session(&transport);

        let generation = session.start(TEXT).unwrap();
        let view = session.settled(generation).await.unwrap();

        assert_eq!(view.state.as_str(), "failed");
        assert!(view.document.is_empty());
    }

    #[tokio::test]
    async fn test_new_start_isolates_previous_generation() {
        let (old_tx, old_rx) = mpsc::channel(8);
        let transport = ScriptedTransport::new(vec![
            Script::Live(old_rx),
            events(&[OTHER_PERSON]),
        ]);
        let session = session(&transport);
        let mut updates = session.subscribe();

        let first = session.start(TEXT).unwrap();
        old_tx.send(Ok(CONTACT.to_string())).await.unwrap();
        updates
            .wait_for(|v| v.generation == first && v.score > 0)
            .await
            .unwrap();

        let second = session.start("John Doe\nTask Management App").unwrap();
        let view = session.settled(second).await.unwrap();
        assert_eq!(view.state, SessionState::Completed);

        // Late delivery from the superseded stream, if it still gets through.
        let _ = old_tx.send(Ok(CONTACT_SUMMARY_WORK.to_string())).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let current = session.current();
        assert_eq!(current.generation, second);
        assert_eq!(current.state, SessionState::Completed);
        let name = current.document.contact.as_ref().and_then(|c| c.name.clone());
        assert_eq!(name.as_deref(), Some("John Doe"));
        assert!(current.document.summary.is_none());
    }

    #[tokio::test]
    async fn test_new_start_publishes_cancelled_previous_generation() {
        let (old_tx, old_rx) = mpsc::channel(8);
        let transport = ScriptedTransport::new(vec![
            Script::Live(old_rx),
            events(&[OTHER_PERSON]),
        ]);
        let session = session(&transport);
        let mut transitions = session.transitions();

        let first = session.start(TEXT).unwrap();
        old_tx.send(Ok(CONTACT.to_string())).await.unwrap();
        loop {
            let view = transitions.recv().await.unwrap();
            if view.generation == first && view.score > 0 {
                break;
            }
        }

        let second = session.start("John Doe\nTask Management App").unwrap();
        let mut seen = Vec::new();
        loop {
            let view = transitions.recv().await.unwrap();
            seen.push((view.generation, view.state.as_str()));
            if view.generation == second && view.state.is_terminal() {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                (first, "cancelled"),
                (second, "streaming"),
                (second, "streaming"),
                (second, "completed"),
            ]
        );
        drop(old_tx);
    }

    #[tokio::test]
    async fn test_cancel_drops_in_flight_events() {
        let (tx, rx) = mpsc::channel(8);
        let transport = ScriptedTransport::new(vec![Script::Live(rx)]);
        let session = session(&transport);
        let mut updates = session.subscribe();

        let generation = session.start(TEXT).unwrap();
        tx.send(Ok(CONTACT.to_string())).await.unwrap();
        updates.wait_for(|v| v.score == 14).await.unwrap();

        session.cancel().unwrap();
        let view = session.settled(generation).await.unwrap();
        assert_eq!(view.state, SessionState::Cancelled);

        let _ = tx.send(Ok(CONTACT_SUMMARY_WORK.to_string())).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let current = session.current();
        assert_eq!(current.state, SessionState::Cancelled);
        assert_eq!(current.score, 14);
    }

    #[tokio::test]
    async fn test_clear_returns_to_idle() {
        let transport = ScriptedTransport::new(vec![events(&[CONTACT_SUMMARY_WORK])]);
        let session = session(&transport);

        let generation = session.start(TEXT).unwrap();
        session.settled(generation).await.unwrap();

        let cleared = session.clear().unwrap();
        let mut updates = session.subscribe();
        let view = updates
            .wait_for(|v| v.generation == cleared)
            .await
            .unwrap()
            .clone();

        assert_eq!(view.state, SessionState::Idle);
        assert!(view.document.is_empty());
        assert_eq!(view.score, 0);
    }
}
