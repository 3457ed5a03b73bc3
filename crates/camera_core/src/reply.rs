//! Interpretation of camera replies.

use shared::domain::{CameraCommand, ExposureMode};

const VALUE_OPEN: &str = "<value>";
const VALUE_CLOSE: &str = "</value>";
const SHUTTER_SPEED_PROPERTY: &str = "shutspeedvalue";

/// How the body of a successful reply is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Single `<value>` token reported to listeners as-is.
    Value,
    /// `<value>` token classified into an [`ExposureMode`].
    DriveMode,
    /// Capability discovery by substring.
    CommandList,
    /// Opaque bytes.
    Binary,
    /// Body is irrelevant; success itself is the information.
    Ignored,
}

pub fn reply_shape(command: CameraCommand) -> ReplyShape {
    match command {
        CameraCommand::RequestShutterSpeed
        | CameraCommand::RequestFocalValue
        | CameraCommand::RequestEvValue
        | CameraCommand::RequestIsoValue => ReplyShape::Value,
        CameraCommand::RequestDriveMode => ReplyShape::DriveMode,
        CameraCommand::RequestCommandList => ReplyShape::CommandList,
        CameraCommand::GetLastImage | CameraCommand::GetRecView | CameraCommand::StoreImage => {
            ReplyShape::Binary
        }
        _ => ReplyShape::Ignored,
    }
}

/// Text strictly between the first `<value>` and the first `</value>`; empty when either
/// marker is missing or they appear in the wrong order.
pub fn extract_value(reply: &str) -> &str {
    let (Some(open), Some(close)) = (reply.find(VALUE_OPEN), reply.find(VALUE_CLOSE)) else {
        return "";
    };
    let start = open + VALUE_OPEN.len();
    if start > close {
        return "";
    }
    &reply[start..close]
}

/// Drive modes reported by the camera: "normal", "continuous…", "selftimer",
/// "customselftimer" and "livetime" (composite).
pub fn classify_drive_mode(value: &str) -> ExposureMode {
    if value.starts_with("normal") {
        ExposureMode::Normal
    } else if value.starts_with("cont") {
        ExposureMode::Continuous
    } else if value.starts_with("self") {
        ExposureMode::SelfTimer
    } else if value.starts_with("livetime") {
        ExposureMode::Composite
    } else {
        ExposureMode::Undefined
    }
}

pub fn advertises_shutter_speed(command_list: &str) -> bool {
    command_list.contains(SHUTTER_SPEED_PROPERTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_value_between_tags() {
        let reply = "<?xml version=\"1.0\"?><desc><propname>isospeedvalue</propname>\
                     <value>Auto</value><enum>Auto 200 400</enum></desc>";
        assert_eq!(extract_value(reply), "Auto");
    }

    #[test]
    fn malformed_replies_have_no_value() {
        assert_eq!(extract_value(""), "");
        assert_eq!(extract_value("<value>dangling"), "");
        assert_eq!(extract_value("dangling</value>"), "");
        assert_eq!(extract_value("</value>backwards<value>"), "");
        assert_eq!(extract_value("<value></value>"), "");
    }

    #[test]
    fn drive_mode_prefixes_in_order() {
        assert_eq!(classify_drive_mode("normal"), ExposureMode::Normal);
        assert_eq!(
            classify_drive_mode("continuous-shot"),
            ExposureMode::Continuous
        );
        assert_eq!(classify_drive_mode("selftimer"), ExposureMode::SelfTimer);
        // only a prefix counts
        assert_eq!(
            classify_drive_mode("customselftimer"),
            ExposureMode::Undefined
        );
        assert_eq!(classify_drive_mode("livetime"), ExposureMode::Composite);
        assert_eq!(classify_drive_mode(""), ExposureMode::Undefined);
    }

    #[test]
    fn continuous_drive_mode_reply() {
        let reply = "<desc><propname>cameradrivemode</propname><value>continuous-shot</value></desc>";
        assert_eq!(
            classify_drive_mode(extract_value(reply)),
            ExposureMode::Continuous
        );
    }

    #[test]
    fn command_list_discovery() {
        assert!(advertises_shutter_speed(
            "<commandlist><cgi name=\"get_camprop\"><cmd1 name=\"desc\"><param1 name=\"shutspeedvalue\"/>"
        ));
        assert!(!advertises_shutter_speed("<commandlist></commandlist>"));
    }

    #[test]
    fn reply_shapes() {
        assert_eq!(reply_shape(CameraCommand::RequestEvValue), ReplyShape::Value);
        assert_eq!(
            reply_shape(CameraCommand::RequestDriveMode),
            ReplyShape::DriveMode
        );
        assert_eq!(
            reply_shape(CameraCommand::RequestCommandList),
            ReplyShape::CommandList
        );
        assert_eq!(reply_shape(CameraCommand::GetLastImage), ReplyShape::Binary);
        assert_eq!(reply_shape(CameraCommand::FirstPush), ReplyShape::Ignored);
    }
}
