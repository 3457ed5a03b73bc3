//! The controller task: owns the gesture state machine, the dispatcher and the live-view
//! socket. Everything reaches it as a message, so gestures, link changes and replies are
//! handled strictly in arrival order.

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use rtp_stream::{frame_queue, FrameReceiver, FrameSender, LiveViewSocket};
use serde::Serialize;
use shared::{
    domain::{CameraCommand, CameraMode, ExposureMode, GestureState, WifiStatus},
    error::CameraError,
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    catalog::gateway_base,
    config::Settings,
    dispatcher::{Completion, Dispatch, Dispatcher, PendingRequest, PropertyUpdate, ReplyOutcome},
    state_machine::{GestureEvent, GestureStateMachine, Transition},
    transport::CameraTransport,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    FocusPressed,
    FocusReleased,
    ShutterPressed,
    ShutterReleased,
}

impl From<Gesture> for GestureEvent {
    fn from(gesture: Gesture) -> Self {
        match gesture {
            Gesture::FocusPressed => GestureEvent::FocusPressed,
            Gesture::FocusReleased => GestureEvent::FocusReleased,
            Gesture::ShutterPressed => GestureEvent::ShutterPressed,
            Gesture::ShutterReleased => GestureEvent::ShutterReleased,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerMessage {
    Gesture(Gesture),
    LinkStatus {
        status: WifiStatus,
        local_address: Ipv4Addr,
    },
    RefreshProperties,
    SetLiveViewEnabled(bool),
    FetchLastImage,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CameraEvent {
    StateEntered {
        state: GestureState,
    },
    WifiStatusChanged {
        status: WifiStatus,
    },
    ValueChanged {
        command: CameraCommand,
        value: String,
    },
    ExposureModeChanged {
        mode: ExposureMode,
    },
    CameraModeChanged {
        mode: CameraMode,
    },
    ImageReceived {
        command: CameraCommand,
        size: usize,
        #[serde(skip)]
        data: Vec<u8>,
    },
    CommandFailed {
        command: CameraCommand,
        reason: String,
    },
}

/// Cheap, cloneable entry point into a running controller.
#[derive(Clone)]
pub struct CameraHandle {
    tx: mpsc::UnboundedSender<ControllerMessage>,
    events: broadcast::Sender<CameraEvent>,
}

impl CameraHandle {
    pub fn send(&self, message: ControllerMessage) -> Result<(), CameraError> {
        self.tx
            .send(message)
            .map_err(|_| CameraError::ControllerClosed)
    }

    pub fn focus_pressed(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::Gesture(Gesture::FocusPressed))
    }

    pub fn focus_released(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::Gesture(Gesture::FocusReleased))
    }

    pub fn shutter_pressed(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::Gesture(Gesture::ShutterPressed))
    }

    pub fn shutter_released(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::Gesture(Gesture::ShutterReleased))
    }

    pub fn report_link(&self, status: WifiStatus, local_address: Ipv4Addr) -> Result<(), CameraError> {
        self.send(ControllerMessage::LinkStatus {
            status,
            local_address,
        })
    }

    pub fn refresh_properties(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::RefreshProperties)
    }

    pub fn set_live_view_enabled(&self, enabled: bool) -> Result<(), CameraError> {
        self.send(ControllerMessage::SetLiveViewEnabled(enabled))
    }

    pub fn fetch_last_image(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::FetchLastImage)
    }

    pub fn shutdown(&self) -> Result<(), CameraError> {
        self.send(ControllerMessage::Shutdown)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CameraEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// A handle with no controller behind it; messages land in the returned receiver.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<ControllerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        (Self { tx, events }, rx)
    }
}

pub struct Controller {
    settings: Settings,
    transport: Arc<dyn CameraTransport>,
    fsm: GestureStateMachine,
    dispatcher: Dispatcher,
    wifi: WifiStatus,
    local_address: Ipv4Addr,
    live_view: Option<LiveViewSocket>,
    frames: FrameSender,
    events: broadcast::Sender<CameraEvent>,
    replies: mpsc::UnboundedSender<(u64, ReplyOutcome)>,
    in_flight: Option<JoinHandle<()>>,
}

impl Controller {
    /// Starts the controller task on the current tokio runtime.
    pub fn spawn(
        settings: Settings,
        transport: Arc<dyn CameraTransport>,
    ) -> Result<(CameraHandle, FrameReceiver, JoinHandle<()>), CameraError> {
        let base = gateway_base(&settings.gateway)?;
        let dispatcher = Dispatcher::new(base, settings.live_view_quality.clone());
        let (frames, frame_rx) = frame_queue();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (tx, inbox) = mpsc::unbounded_channel();
        let (replies, reply_rx) = mpsc::unbounded_channel();

        let mut fsm = GestureStateMachine::new();
        let state_events = events.clone();
        fsm.add_listener(move |state: GestureState| {
            let _ = state_events.send(CameraEvent::StateEntered { state });
        });

        let controller = Controller {
            settings,
            transport,
            fsm,
            dispatcher,
            wifi: WifiStatus::NotConnected,
            local_address: Ipv4Addr::LOCALHOST,
            live_view: None,
            frames,
            events: events.clone(),
            replies,
            in_flight: None,
        };
        let task = tokio::spawn(controller.run(inbox, reply_rx));

        Ok((CameraHandle { tx, events }, frame_rx, task))
    }

    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<ControllerMessage>,
        mut replies: mpsc::UnboundedReceiver<(u64, ReplyOutcome)>,
    ) {
        self.fsm.start();
        loop {
            tokio::select! {
                Some((ticket, outcome)) = replies.recv() => self.on_reply(ticket, outcome),
                message = inbox.recv() => match message {
                    Some(ControllerMessage::Shutdown) | None => break,
                    Some(message) => self.on_message(message).await,
                },
            }
            self.pump();
        }
        self.teardown();
    }

    async fn on_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::Gesture(gesture) => {
                let transition = self.fsm.handle(gesture.into());
                self.enqueue_transition(transition);
            }
            ControllerMessage::LinkStatus {
                status,
                local_address,
            } => self.on_link_status(status, local_address).await,
            ControllerMessage::RefreshProperties => self.refresh_properties(),
            ControllerMessage::SetLiveViewEnabled(enabled) => {
                self.dispatcher.set_live_view_enabled(enabled);
            }
            ControllerMessage::FetchLastImage => self.dispatcher.enqueue(CameraCommand::GetLastImage),
            ControllerMessage::Shutdown => {}
        }
    }

    /// Polling never interleaves with a gesture: it needs both buttons up and an idle queue.
    fn refresh_properties(&mut self) {
        if !self.fsm.is_rec_mode_available() || self.wifi != WifiStatus::CameraConnected {
            return;
        }
        if self.dispatcher.queue_len() > 0 || self.dispatcher.in_flight().is_some() {
            return;
        }
        self.dispatcher.enqueue_exposure_properties();
    }

    async fn on_link_status(&mut self, status: WifiStatus, local_address: Ipv4Addr) {
        let previous = self.wifi;
        let address_changed = local_address != self.local_address;
        self.wifi = status;
        self.local_address = local_address;

        if status != previous {
            info!(?previous, ?status, %local_address, "wifi status changed");
            let _ = self.events.send(CameraEvent::WifiStatusChanged { status });
        }

        match status {
            WifiStatus::NotConnected => {
                if self.live_view.take().is_some() {
                    debug!("live view socket closed");
                }
                self.dispatcher.set_live_view_port(None);
            }
            WifiStatus::Connected | WifiStatus::CameraConnected => {
                if self.live_view.is_none() || address_changed {
                    self.bind_live_view(local_address).await;
                }
            }
        }

        if previous == WifiStatus::CameraConnected && status != WifiStatus::CameraConnected {
            self.abort_in_flight();
            self.dispatcher.reset_session();
            let transition = self.fsm.link_lost();
            self.enqueue_transition(transition);
        }
        if status == WifiStatus::CameraConnected && previous != WifiStatus::CameraConnected {
            self.dispatcher.enqueue_command_list();
        }
    }

    async fn bind_live_view(&mut self, local_address: Ipv4Addr) {
        self.live_view = None;
        match LiveViewSocket::bind(IpAddr::V4(local_address), self.frames.clone()).await {
            Ok(socket) => {
                debug!(port = socket.port(), "live view port published");
                self.dispatcher.set_live_view_port(Some(socket.port()));
                self.live_view = Some(socket);
            }
            Err(err) => {
                warn!(error = %err, "live view unavailable");
                self.dispatcher.set_live_view_port(None);
            }
        }
    }

    fn on_reply(&mut self, ticket: u64, outcome: ReplyOutcome) {
        match self.dispatcher.complete(ticket, outcome) {
            Completion::Processed { command, update } => {
                self.in_flight = None;
                if let Some(update) = update {
                    self.publish(update);
                }
                self.command_processed(command);
            }
            Completion::Failed { command, error } => {
                self.in_flight = None;
                warn!(command = command.as_str(), error = %error, "camera command failed");
                let _ = self.events.send(CameraEvent::CommandFailed {
                    command,
                    reason: error.to_string(),
                });
                let transition = self.fsm.error();
                self.enqueue_transition(transition);
            }
            Completion::TimedOut { command } => {
                self.in_flight = None;
                warn!(command = command.as_str(), timeout_ms = self.settings.command_timeout_ms, "camera command timed out");
                let _ = self.events.send(CameraEvent::CommandFailed {
                    command,
                    reason: "timed out".to_string(),
                });
                let transition = self.fsm.timeout();
                self.enqueue_transition(transition);
            }
            Completion::Stale => debug!(ticket, "dropping stale camera reply"),
        }
    }

    fn command_processed(&mut self, command: CameraCommand) {
        let transition = self.fsm.commands_processed(command);
        self.enqueue_transition(transition);
    }

    fn enqueue_transition(&mut self, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        for &command in transition.commands {
            // Live-view commands always pass through the dispatcher's start/stop flags.
            match command {
                CameraCommand::StopLiveView => self.dispatcher.enqueue_live_view(false),
                CameraCommand::StartLiveView => self.dispatcher.enqueue_live_view(true),
                command => self.dispatcher.enqueue(command),
            }
        }
    }

    fn publish(&self, update: PropertyUpdate) {
        let event = match update {
            PropertyUpdate::Value { command, value } => CameraEvent::ValueChanged { command, value },
            PropertyUpdate::ExposureMode(mode) => CameraEvent::ExposureModeChanged { mode },
            PropertyUpdate::CameraMode(mode) => CameraEvent::CameraModeChanged { mode },
            PropertyUpdate::ShutterSpeedSupported => {
                info!("camera reports shutter speed");
                return;
            }
            PropertyUpdate::Binary { command, bytes } => CameraEvent::ImageReceived {
                command,
                size: bytes.len(),
                data: bytes,
            },
        };
        let _ = self.events.send(event);
    }

    /// Drains every command that needs no traffic, then sends the next request if any.
    fn pump(&mut self) {
        loop {
            match self.dispatcher.process_next() {
                Dispatch::Idle => return,
                Dispatch::Skipped(command) => self.command_processed(command),
                Dispatch::Send(request) => {
                    self.send(request);
                    return;
                }
            }
        }
    }

    fn send(&mut self, request: PendingRequest) {
        let transport = Arc::clone(&self.transport);
        let replies = self.replies.clone();
        let limit = self.settings.command_timeout();
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = match tokio::time::timeout(limit, transport.get(request.url)).await {
                Ok(Ok(body)) => ReplyOutcome::Success(body),
                Ok(Err(err)) => ReplyOutcome::Failed(err),
                Err(_) => ReplyOutcome::TimedOut,
            };
            let _ = replies.send((request.ticket, outcome));
        }));
    }

    fn abort_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn teardown(&mut self) {
        self.fsm.teardown();
        self.abort_in_flight();
        self.dispatcher.abandon();
        self.live_view = None;
        info!("camera controller stopped");
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
