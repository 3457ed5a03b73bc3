//! Command queue with at most one request outstanding.
//!
//! The dispatcher does no I/O itself: [`Dispatcher::process_next`] hands out the request for
//! the queue head and [`Dispatcher::complete`] takes the reply back. The head stays queued
//! until its reply has been applied.

use std::collections::VecDeque;

use shared::{
    domain::{CameraCommand, CameraMode, ExposureMode},
    error::CameraError,
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    catalog::{request_url, RequestContext},
    reply::{advertises_shutter_speed, classify_drive_mode, extract_value, reply_shape, ReplyShape},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub ticket: u64,
    pub command: CameraCommand,
    pub url: Url,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A request is out, or nothing is queued.
    Idle,
    Send(PendingRequest),
    /// The head produced no traffic and was popped as processed.
    Skipped(CameraCommand),
}

#[derive(Debug)]
pub enum ReplyOutcome {
    Success(Vec<u8>),
    Failed(CameraError),
    TimedOut,
}

/// Side effect of a processed reply that listeners may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyUpdate {
    Value {
        command: CameraCommand,
        value: String,
    },
    ExposureMode(ExposureMode),
    CameraMode(CameraMode),
    ShutterSpeedSupported,
    Binary {
        command: CameraCommand,
        bytes: Vec<u8>,
    },
}

#[derive(Debug)]
pub enum Completion {
    Processed {
        command: CameraCommand,
        update: Option<PropertyUpdate>,
    },
    /// Queue was flushed.
    Failed {
        command: CameraCommand,
        error: CameraError,
    },
    /// Queue was flushed.
    TimedOut { command: CameraCommand },
    /// Reply for a request that was abandoned.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    command: CameraCommand,
}

pub struct Dispatcher {
    base: Url,
    live_view_quality: String,
    live_view_port: Option<u16>,
    queue: VecDeque<CameraCommand>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    camera_mode: CameraMode,
    exposure_mode: ExposureMode,
    has_shutter_speed: bool,
    live_view_enabled: bool,
    live_view_potentially_started: bool,
}

impl Dispatcher {
    pub fn new(base: Url, live_view_quality: impl Into<String>) -> Self {
        Self {
            base,
            live_view_quality: live_view_quality.into(),
            live_view_port: None,
            queue: VecDeque::new(),
            in_flight: None,
            next_ticket: 0,
            camera_mode: CameraMode::Undefined,
            exposure_mode: ExposureMode::Undefined,
            has_shutter_speed: false,
            live_view_enabled: false,
            live_view_potentially_started: false,
        }
    }

    pub fn enqueue(&mut self, command: CameraCommand) {
        self.queue.push_back(command);
    }

    pub fn queued(&self) -> impl Iterator<Item = CameraCommand> + '_ {
        self.queue.iter().copied()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> Option<CameraCommand> {
        self.in_flight.map(|f| f.command)
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.camera_mode
    }

    pub fn exposure_mode(&self) -> ExposureMode {
        self.exposure_mode
    }

    pub fn has_shutter_speed(&self) -> bool {
        self.has_shutter_speed
    }

    pub fn live_view_enabled(&self) -> bool {
        self.live_view_enabled
    }

    pub fn live_view_potentially_started(&self) -> bool {
        self.live_view_potentially_started
    }

    pub fn set_live_view_port(&mut self, port: Option<u16>) {
        self.live_view_port = port;
    }

    /// Starting only reaches the camera once the user has enabled live view; until then the
    /// request is remembered so enabling it later starts the stream.
    pub fn enqueue_live_view(&mut self, start: bool) {
        if start {
            self.live_view_potentially_started = true;
            if self.live_view_enabled {
                self.enqueue(CameraCommand::StartLiveView);
            }
        } else {
            self.live_view_potentially_started = false;
            self.enqueue(CameraCommand::StopLiveView);
        }
    }

    pub fn set_live_view_enabled(&mut self, enabled: bool) {
        self.live_view_enabled = enabled;
        if self.live_view_potentially_started {
            self.enqueue(if enabled {
                CameraCommand::StartLiveView
            } else {
                CameraCommand::StopLiveView
            });
        }
    }

    /// Queues one round of property polling. Re-entering rec mode also restarts live view,
    /// since the camera may still stream to a port from an earlier session.
    pub fn enqueue_exposure_properties(&mut self) {
        if self.camera_mode != CameraMode::Rec {
            self.enqueue(CameraCommand::SetRecMode);
            self.enqueue(CameraCommand::StopLiveView);
            self.enqueue_live_view(true);
        }
        if self.has_shutter_speed {
            self.enqueue(CameraCommand::RequestShutterSpeed);
        }
        self.enqueue(CameraCommand::RequestFocalValue);
        self.enqueue(CameraCommand::RequestEvValue);
        self.enqueue(CameraCommand::RequestIsoValue);
        self.enqueue(CameraCommand::RequestDriveMode);
    }

    pub fn enqueue_command_list(&mut self) {
        self.enqueue(CameraCommand::RequestCommandList);
    }

    pub fn process_next(&mut self) -> Dispatch {
        if self.in_flight.is_some() {
            return Dispatch::Idle;
        }
        let Some(&command) = self.queue.front() else {
            return Dispatch::Idle;
        };

        let ctx = RequestContext {
            live_view_port: self.live_view_port,
            live_view_quality: &self.live_view_quality,
        };
        match request_url(&self.base, command, &ctx) {
            Ok(Some(url)) => {
                let ticket = self.next_ticket;
                self.next_ticket += 1;
                self.in_flight = Some(InFlight { ticket, command });
                Dispatch::Send(PendingRequest {
                    ticket,
                    command,
                    url,
                })
            }
            Ok(None) => {
                debug!(command = command.as_str(), "no request for command; skipping");
                self.queue.pop_front();
                Dispatch::Skipped(command)
            }
            Err(err) => {
                warn!(command = command.as_str(), error = %err, "could not build camera request; skipping");
                self.queue.pop_front();
                Dispatch::Skipped(command)
            }
        }
    }

    pub fn complete(&mut self, ticket: u64, outcome: ReplyOutcome) -> Completion {
        let Some(in_flight) = self.in_flight.filter(|f| f.ticket == ticket) else {
            return Completion::Stale;
        };
        self.in_flight = None;
        let command = in_flight.command;

        match outcome {
            ReplyOutcome::Success(body) => {
                self.queue.pop_front();
                let update = self.apply_reply(command, body);
                Completion::Processed { command, update }
            }
            ReplyOutcome::Failed(error) => {
                self.queue.clear();
                Completion::Failed { command, error }
            }
            ReplyOutcome::TimedOut => {
                self.queue.clear();
                Completion::TimedOut { command }
            }
        }
    }

    /// Forgets the queue and any outstanding request. A reply that still arrives is stale.
    pub fn abandon(&mut self) {
        self.queue.clear();
        self.in_flight = None;
    }

    /// New camera session: mode must be re-established before polling.
    pub fn reset_session(&mut self) {
        self.abandon();
        self.camera_mode = CameraMode::Undefined;
        self.exposure_mode = ExposureMode::Undefined;
    }

    fn apply_reply(&mut self, command: CameraCommand, body: Vec<u8>) -> Option<PropertyUpdate> {
        match command {
            CameraCommand::SetRecMode => {
                self.camera_mode = CameraMode::Rec;
                return Some(PropertyUpdate::CameraMode(self.camera_mode));
            }
            CameraCommand::SetShutterMode => {
                self.camera_mode = CameraMode::Shutter;
                return Some(PropertyUpdate::CameraMode(self.camera_mode));
            }
            _ => {}
        }

        match reply_shape(command) {
            ReplyShape::Value => {
                let text = String::from_utf8_lossy(&body);
                let value = extract_value(&text);
                (!value.is_empty()).then(|| PropertyUpdate::Value {
                    command,
                    value: value.to_string(),
                })
            }
            ReplyShape::DriveMode => {
                let text = String::from_utf8_lossy(&body);
                self.exposure_mode = classify_drive_mode(extract_value(&text));
                Some(PropertyUpdate::ExposureMode(self.exposure_mode))
            }
            ReplyShape::CommandList => {
                let text = String::from_utf8_lossy(&body);
                if advertises_shutter_speed(&text) && !self.has_shutter_speed {
                    self.has_shutter_speed = true;
                    return Some(PropertyUpdate::ShutterSpeedSupported);
                }
                None
            }
            ReplyShape::Binary => Some(PropertyUpdate::Binary {
                command,
                bytes: body,
            }),
            ReplyShape::Ignored => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
