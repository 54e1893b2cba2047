use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, select};
use engine::{ClipperConfig, Command, Engine, EngineErrorEvent, Event, PlayerBackend};
use iced::futures::{SinkExt, StreamExt, channel::mpsc as futures_mpsc, executor};
use iced::{Subscription, stream};
use player_mpv::MpvBackend;
use tracing::{debug, info};

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 32;

/// Sender used by the UI thread to dispatch commands to the engine thread.
pub type EngineCommandSender = Sender<Command>;

/// Receiver used by the UI thread to read events emitted by the engine thread.
pub type EngineEventReceiver = Receiver<Event>;

/// Messages emitted by the engine bridge subscription.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Ready(EngineCommandSender),
    Event(Event),
    Disconnected,
}

/// Builds a subscription that starts an mpv-backed engine and forwards its events.
pub fn engine_subscription(config: &ClipperConfig) -> Subscription<BridgeEvent> {
    let config = config.clone();
    Subscription::run_with_id(
        "engine-bridge",
        bridge_worker_stream_with(move || spawn_mpv_bridge(&config)),
    )
}

fn bridge_worker_stream_with<F>(spawn_bridge: F) -> impl iced::futures::Stream<Item = BridgeEvent>
where
    F: FnOnce() -> (EngineCommandSender, EngineEventReceiver) + Send + 'static,
{
    stream::channel(
        SUBSCRIPTION_CHANNEL_CAPACITY,
        move |mut output| async move {
            let (engine_tx, engine_rx) = spawn_bridge();
            let _ = output.send(BridgeEvent::Ready(engine_tx)).await;

            let (forward_tx, mut forward_rx) =
                futures_mpsc::channel::<BridgeEvent>(SUBSCRIPTION_CHANNEL_CAPACITY);

            thread::spawn(move || {
                let mut forward_tx = forward_tx;
                while let Ok(event) = engine_rx.recv() {
                    if executor::block_on(forward_tx.send(BridgeEvent::Event(event))).is_err() {
                        return;
                    }
                }
                let _ = executor::block_on(forward_tx.send(BridgeEvent::Disconnected));
            });

            while let Some(event) = forward_rx.next().await {
                if output.send(event).await.is_err() {
                    break;
                }
            }
        },
    )
}

/// Spawns the production bridge driving mpv players.
pub fn spawn_mpv_bridge(config: &ClipperConfig) -> (EngineCommandSender, EngineEventReceiver) {
    spawn_engine_bridge(Engine::with_config(MpvBackend::from_config(config), config))
}

/// Spawns the engine thread around any player backend.
///
/// The thread waits on UI commands, widget signals and the poll deadline, and
/// exits once the command sender is dropped or the event receiver is gone.
pub fn spawn_engine_bridge<B>(mut engine: Engine<B>) -> (EngineCommandSender, EngineEventReceiver)
where
    B: PlayerBackend + Send + 'static,
    B::Widget: Send,
{
    let (command_tx, command_rx) = crossbeam_channel::bounded::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = crossbeam_channel::bounded::<Event>(EVENT_CHANNEL_CAPACITY);

    thread::spawn(move || {
        let signals = engine.signals();
        info!("engine thread started");

        'run: loop {
            let poll = engine
                .poll_deadline()
                .map_or_else(crossbeam_channel::never::<Instant>, crossbeam_channel::at);

            let events = select! {
                recv(command_rx) -> command => match command {
                    Ok(command) => match engine.handle_command(command) {
                        Ok(events) => events,
                        Err(error) => vec![Event::Error(EngineErrorEvent::from_error(&error))],
                    },
                    Err(_) => break 'run,
                },
                recv(signals) -> tagged => match tagged {
                    Ok(tagged) => engine.handle_signal(tagged),
                    Err(_) => Vec::new(),
                },
                recv(poll) -> _ => engine.poll_tick(),
            };

            for event in events {
                if event_tx.send(event).is_err() {
                    debug!("event receiver dropped, stopping engine thread");
                    return;
                }
            }
        }

        debug!(engine = ?engine, "command channel closed, stopping engine thread");
    });

    (command_tx, event_rx)
}
