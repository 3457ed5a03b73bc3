//! Mapping from [`CameraCommand`] to the CGI request the firmware expects.

use shared::{domain::CameraCommand, error::CameraError};
use url::Url;

/// Ports below this are never handed to the camera as a live-view target.
pub const MIN_LIVE_VIEW_PORT: u16 = 1024;

/// Controller-side values that some requests embed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    pub live_view_port: Option<u16>,
    pub live_view_quality: &'a str,
}

/// Path and query relative to the camera gateway, or `None` when the command
/// produces no traffic in the current context.
pub fn request_path(command: CameraCommand, ctx: &RequestContext<'_>) -> Option<String> {
    let path = match command {
        CameraCommand::SetRecMode => {
            format!("switch_cammode.cgi?mode=rec&lvqty={}", ctx.live_view_quality)
        }
        CameraCommand::SetShutterMode => "switch_cammode.cgi?mode=shutter".to_string(),
        CameraCommand::FirstPush => shutter("1stpush"),
        CameraCommand::FirstRelease => shutter("1strelease"),
        CameraCommand::SecondPush => shutter("2ndpush"),
        CameraCommand::SecondRelease => shutter("2ndrelease"),
        CameraCommand::FirstSecondPush => shutter("1st2ndpush"),
        CameraCommand::SecondFirstRelease => shutter("2nd1strelease"),
        CameraCommand::RequestShutterSpeed => property("shutspeedvalue"),
        CameraCommand::RequestFocalValue => property("focalvalue"),
        CameraCommand::RequestEvValue => property("expcomp"),
        CameraCommand::RequestIsoValue => property("isospeedvalue"),
        CameraCommand::RequestDriveMode => property("cameradrivemode"),
        CameraCommand::StartLiveView => {
            let port = ctx
                .live_view_port
                .filter(|port| *port >= MIN_LIVE_VIEW_PORT)?;
            format!("exec_takemisc.cgi?com=startliveview&port={port}")
        }
        CameraCommand::StopLiveView => misc("stopliveview"),
        CameraCommand::GetLastImage => misc("getlastjpg"),
        CameraCommand::GetRecView => misc("getrecview"),
        CameraCommand::RequestCommandList => "get_commandlist.cgi".to_string(),
        CameraCommand::NoCommand | CameraCommand::StoreImage => return None,
    };
    Some(path)
}

fn shutter(com: &str) -> String {
    format!("exec_shutter.cgi?com={com}")
}

fn property(name: &str) -> String {
    format!("get_camprop.cgi?com=desc&propname={name}")
}

fn misc(com: &str) -> String {
    format!("exec_takemisc.cgi?com={com}")
}

/// `gateway` is a host or `host:port`.
pub fn gateway_base(gateway: &str) -> Result<Url, CameraError> {
    let raw = format!("http://{gateway}/");
    Url::parse(&raw).map_err(|err| CameraError::InvalidUrl {
        url: raw,
        reason: err.to_string(),
    })
}

pub fn request_url(
    base: &Url,
    command: CameraCommand,
    ctx: &RequestContext<'_>,
) -> Result<Option<Url>, CameraError> {
    let Some(path) = request_path(command, ctx) else {
        return Ok(None);
    };
    base.join(&path)
        .map(Some)
        .map_err(|err| CameraError::InvalidUrl {
            url: format!("{base}{path}"),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: RequestContext<'static> = RequestContext {
        live_view_port: Some(40_000),
        live_view_quality: "0320x0240",
    };

    #[test]
    fn shutter_and_mode_paths() {
        assert_eq!(
            request_path(CameraCommand::SetRecMode, &CTX).as_deref(),
            Some("switch_cammode.cgi?mode=rec&lvqty=0320x0240")
        );
        assert_eq!(
            request_path(CameraCommand::SetShutterMode, &CTX).as_deref(),
            Some("switch_cammode.cgi?mode=shutter")
        );
        assert_eq!(
            request_path(CameraCommand::FirstPush, &CTX).as_deref(),
            Some("exec_shutter.cgi?com=1stpush")
        );
        assert_eq!(
            request_path(CameraCommand::SecondFirstRelease, &CTX).as_deref(),
            Some("exec_shutter.cgi?com=2nd1strelease")
        );
        assert_eq!(
            request_path(CameraCommand::RequestShutterSpeed, &CTX).as_deref(),
            Some("get_camprop.cgi?com=desc&propname=shutspeedvalue")
        );
        assert_eq!(
            request_path(CameraCommand::RequestCommandList, &CTX).as_deref(),
            Some("get_commandlist.cgi")
        );
    }

    #[test]
    fn live_view_start_needs_a_bound_unprivileged_port() {
        assert_eq!(
            request_path(CameraCommand::StartLiveView, &CTX).as_deref(),
            Some("exec_takemisc.cgi?com=startliveview&port=40000")
        );
        let unbound = RequestContext {
            live_view_port: None,
            ..CTX
        };
        assert_eq!(request_path(CameraCommand::StartLiveView, &unbound), None);
        let privileged = RequestContext {
            live_view_port: Some(80),
            ..CTX
        };
        assert_eq!(request_path(CameraCommand::StartLiveView, &privileged), None);
    }

    #[test]
    fn silent_commands_have_no_request() {
        assert_eq!(request_path(CameraCommand::NoCommand, &CTX), None);
        assert_eq!(request_path(CameraCommand::StoreImage, &CTX), None);
    }

    #[test]
    fn urls_are_relative_to_gateway() {
        let base = gateway_base("192.168.0.10").expect("base");
        let url = request_url(&base, CameraCommand::StopLiveView, &CTX)
            .expect("url")
            .expect("request");
        assert_eq!(
            url.as_str(),
            "http://192.168.0.10/exec_takemisc.cgi?com=stopliveview"
        );

        let base = gateway_base("127.0.0.1:8080").expect("base");
        let url = request_url(&base, CameraCommand::SetRecMode, &CTX)
            .expect("url")
            .expect("request");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/switch_cammode.cgi?mode=rec&lvqty=0320x0240"
        );
    }
}
