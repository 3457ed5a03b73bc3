use serde::{Deserialize, Serialize};

/// Where the remote sits in the half-press / full-press gesture sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureState {
    #[default]
    Init,
    FocusRequested,
    Focused,
    FocusReleasing,
    TriggerRequested,
    Triggered,
    TriggerReleasing,
}

impl GestureState {
    pub const ALL: [GestureState; 7] = [
        GestureState::Init,
        GestureState::FocusRequested,
        GestureState::Focused,
        GestureState::FocusReleasing,
        GestureState::TriggerRequested,
        GestureState::Triggered,
        GestureState::TriggerReleasing,
    ];
}

/// A single CGI request understood by the camera firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraCommand {
    NoCommand,
    SetRecMode,
    SetShutterMode,
    FirstPush,
    FirstRelease,
    SecondPush,
    SecondRelease,
    FirstSecondPush,
    SecondFirstRelease,
    RequestShutterSpeed,
    RequestFocalValue,
    RequestEvValue,
    RequestIsoValue,
    RequestDriveMode,
    StartLiveView,
    StopLiveView,
    GetLastImage,
    GetRecView,
    StoreImage,
    RequestCommandList,
}

impl CameraCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            CameraCommand::NoCommand => "no_command",
            CameraCommand::SetRecMode => "set_rec_mode",
            CameraCommand::SetShutterMode => "set_shutter_mode",
            CameraCommand::FirstPush => "first_push",
            CameraCommand::FirstRelease => "first_release",
            CameraCommand::SecondPush => "second_push",
            CameraCommand::SecondRelease => "second_release",
            CameraCommand::FirstSecondPush => "first_second_push",
            CameraCommand::SecondFirstRelease => "second_first_release",
            CameraCommand::RequestShutterSpeed => "request_shutter_speed",
            CameraCommand::RequestFocalValue => "request_focal_value",
            CameraCommand::RequestEvValue => "request_ev_value",
            CameraCommand::RequestIsoValue => "request_iso_value",
            CameraCommand::RequestDriveMode => "request_drive_mode",
            CameraCommand::StartLiveView => "start_live_view",
            CameraCommand::StopLiveView => "stop_live_view",
            CameraCommand::GetLastImage => "get_last_image",
            CameraCommand::GetRecView => "get_rec_view",
            CameraCommand::StoreImage => "store_image",
            CameraCommand::RequestCommandList => "request_command_list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    #[default]
    Undefined,
    Rec,
    Shutter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureMode {
    #[default]
    Undefined,
    Normal,
    Continuous,
    SelfTimer,
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiStatus {
    #[default]
    NotConnected,
    Connected,
    CameraConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_names_match_serde_names() {
        for cmd in [
            CameraCommand::SetRecMode,
            CameraCommand::FirstSecondPush,
            CameraCommand::RequestEvValue,
            CameraCommand::RequestCommandList,
        ] {
            let json = serde_json::to_string(&cmd).expect("serialize");
            assert_eq!(json, format!("\"{}\"", cmd.as_str()));
        }
    }

    #[test]
    fn defaults_are_the_unobserved_values() {
        assert_eq!(GestureState::default(), GestureState::Init);
        assert_eq!(CameraMode::default(), CameraMode::Undefined);
        assert_eq!(ExposureMode::default(), ExposureMode::Undefined);
        assert_eq!(WifiStatus::default(), WifiStatus::NotConnected);
    }
}
