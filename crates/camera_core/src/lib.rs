pub mod catalog;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod link_monitor;
pub mod reply;
pub mod state_machine;
pub mod transport;

pub use config::{load_settings_from, Settings};
pub use controller::{CameraEvent, CameraHandle, Controller, ControllerMessage, Gesture};
pub use link_monitor::{LinkMonitor, NetworkProbe, PollSchedule, SystemProbe};
pub use transport::{CameraTransport, HttpTransport, MissingCameraTransport};
