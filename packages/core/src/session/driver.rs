//! Драйвер сессии
//!
//! [`SecureSession`] в отдельной задаче tokio. Команды идут через
//! ограниченную очередь, а `PeerDisconnected` и `RoomJoined` через
//! приоритетный канал управления: пришедшие посреди раунда, они
//! прерывают его (future раунда drop'ается до шага установки) и
//! сбрасывают сессию.

use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::crypto::{Capabilities, PublicKey};
use crate::protocol::messages::Message;
use crate::session::{
    Outbound, SecureSession, SessionEvent, SessionSnapshot, TransportEvent,
};
use crate::state::RoomId;
use crate::utils::error::{Result, TandemError};

enum Command {
    Transport(TransportEvent),
    Send {
        text: String,
        reply: oneshot::Sender<Result<Message>>,
    },
    Initiate {
        peer: PublicKey,
        reply: oneshot::Sender<Result<()>>,
    },
    JoinRoom(RoomId),
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Клиентская сторона драйвера. Драйвер живёт, пока жив хотя бы один handle.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    control: mpsc::UnboundedSender<TransportEvent>,
}

/// Выходы драйвера
pub struct SessionChannels {
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

/// Запустить сессию в фоне. Требует рантайм tokio.
pub fn spawn<C>(caps: C) -> (SessionHandle, SessionChannels)
where
    C: Capabilities + 'static,
{
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::channel(Config::global().command_queue_capacity.max(1));
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let driver = Driver {
        session: SecureSession::with_events(caps, events_tx),
        commands: commands_rx,
        control: control_rx,
        outbound: outbound_tx,
    };
    tokio::spawn(driver.run());

    (
        SessionHandle {
            commands: commands_tx,
            control: control_tx,
        },
        SessionChannels {
            events: events_rx,
            outbound: outbound_rx,
        },
    )
}

impl SessionHandle {
    /// Передать событие транспорта
    pub async fn transport(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::PeerDisconnected | TransportEvent::RoomJoined(_) => self
                .control
                .send(event)
                .map_err(|_| TandemError::Cancelled),
            other => self.submit(Command::Transport(other)).await,
        }
    }

    /// Отправить текст собеседнику. Конверты уходят в `SessionChannels::outbound`,
    /// возвращается локальное эхо.
    pub async fn send(&self, text: impl Into<String>) -> Result<Message> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Send {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| TandemError::Cancelled)?
    }

    pub async fn initiate_key_exchange(&self, peer: PublicKey) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Initiate { peer, reply }).await?;
        rx.await.map_err(|_| TandemError::Cancelled)?
    }

    pub async fn join_room(&self, room: RoomId) -> Result<()> {
        self.submit(Command::JoinRoom(room)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| TandemError::Cancelled)
    }

    async fn submit(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TandemError::Cancelled)
    }
}

struct Driver<C: Capabilities> {
    session: SecureSession<C>,
    commands: mpsc::Receiver<Command>,
    control: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl<C: Capabilities> Driver<C> {
    async fn run(mut self) {
        tracing::debug!(target: "session", "Session driver started");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.control.recv() => self.interrupt(event).await,
                Some(command) = self.commands.recv() => self.execute(command).await,
                else => break,
            }
        }
        tracing::debug!(target: "session", "Session driver stopped");
    }

    /// Выполнить команду, прервав её, если придёт событие управления
    async fn execute(&mut self, command: Command) {
        let interrupted = {
            let round = run_command(&mut self.session, &self.outbound, command);
            tokio::pin!(round);
            tokio::select! {
                biased;
                Some(event) = self.control.recv() => Some(event),
                _ = &mut round => None,
            }
        };

        if let Some(event) = interrupted {
            tracing::warn!(target: "session", "In-flight round cancelled");
            self.interrupt(event).await;
        }
    }

    async fn interrupt(&mut self, event: TransportEvent) {
        match self.session.handle_transport_event(event).await {
            Ok(outs) => forward(&self.outbound, outs),
            Err(err) => tracing::warn!(target: "session", error = %err, "Control event failed"),
        }
    }
}

async fn run_command<C: Capabilities>(
    session: &mut SecureSession<C>,
    outbound: &mpsc::UnboundedSender<Outbound>,
    command: Command,
) {
    match command {
        Command::Transport(event) => match session.handle_transport_event(event).await {
            Ok(outs) => forward(outbound, outs),
            Err(err) => tracing::debug!(target: "session", error = %err, "Transport event failed"),
        },
        Command::Send { text, reply } => {
            let result = session.send_content(&text).await.map(|sent| {
                forward(outbound, sent.envelopes.into_iter().map(Outbound::Envelope));
                sent.echo
            });
            let _ = reply.send(result);
        }
        Command::Initiate { peer, reply } => {
            let result = session
                .initiate_key_exchange(peer)
                .await
                .map(|envelope| forward(outbound, [Outbound::Envelope(envelope)]));
            let _ = reply.send(result);
        }
        Command::JoinRoom(room) => forward(outbound, [session.join_room(room)]),
        Command::Snapshot { reply } => {
            let _ = reply.send(session.snapshot());
        }
    }
}

fn forward(outbound: &mpsc::UnboundedSender<Outbound>, outs: impl IntoIterator<Item = Outbound>) {
    for out in outs {
        if outbound.send(out).is_err() {
            tracing::trace!(target: "session", "Outbound receiver dropped");
            break;
        }
    }
}
