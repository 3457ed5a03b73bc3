//! Background WiFi poller. Runs on its own OS thread and talks to the controller only
//! through a [`CameraHandle`].

use std::{
    fs, io,
    net::{IpAddr, Ipv4Addr},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use shared::domain::WifiStatus;
use tracing::{debug, info, warn};

use crate::{config::Settings, controller::CameraHandle};

const ROUTE_TABLE: &str = "/proc/net/route";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl InterfaceAddr {
    fn same_subnet(&self, other: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        u32::from(self.ip) & mask == u32::from(other) & mask
    }
}

/// What the host network looks like at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// Up, non-loopback IPv4 addresses.
    pub interfaces: Vec<InterfaceAddr>,
    pub default_gateways: Vec<Ipv4Addr>,
}

impl LinkSnapshot {
    /// Camera connected when one of the default routes points at the camera; the local
    /// address is then the interface sharing its subnet.
    pub fn classify(&self, camera: Ipv4Addr) -> (WifiStatus, Ipv4Addr) {
        if self.interfaces.is_empty() {
            return (WifiStatus::NotConnected, Ipv4Addr::LOCALHOST);
        }
        if !self.default_gateways.contains(&camera) {
            return (WifiStatus::Connected, Ipv4Addr::LOCALHOST);
        }
        let local = self
            .interfaces
            .iter()
            .find(|iface| iface.same_subnet(camera))
            .or_else(|| self.interfaces.first())
            .map_or(Ipv4Addr::LOCALHOST, |iface| iface.ip);
        (WifiStatus::CameraConnected, local)
    }
}

pub trait NetworkProbe: Send {
    fn snapshot(&mut self) -> io::Result<LinkSnapshot>;
}

/// Probe backed by the operating system's interface list and IPv4 routing table.
pub struct SystemProbe;

impl NetworkProbe for SystemProbe {
    fn snapshot(&mut self) -> io::Result<LinkSnapshot> {
        let interfaces = if_addrs::get_if_addrs()?
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.addr {
                if_addrs::IfAddr::V4(v4) => Some(InterfaceAddr {
                    ip: v4.ip,
                    netmask: v4.netmask,
                }),
                if_addrs::IfAddr::V6(_) => None,
            })
            .collect();

        // No routing table (non-Linux) just means the camera is never recognised.
        let default_gateways = match fs::read_to_string(ROUTE_TABLE) {
            Ok(table) => parse_default_gateways(&table),
            Err(err) => {
                debug!(error = %err, "routing table unavailable");
                Vec::new()
            }
        };

        Ok(LinkSnapshot {
            interfaces,
            default_gateways,
        })
    }
}

/// Default-route gateways from the `/proc/net/route` format. Addresses there are
/// little-endian hex.
pub fn parse_default_gateways(table: &str) -> Vec<Ipv4Addr> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _iface = fields.next()?;
            let destination = fields.next()?;
            let gateway = fields.next()?;
            if destination != "00000000" {
                return None;
            }
            let raw = u32::from_str_radix(gateway, 16).ok()?;
            let addr = Ipv4Addr::from(raw.to_le_bytes());
            (!addr.is_unspecified()).then_some(addr)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub tick: Duration,
    pub wifi_every: u64,
    pub properties_every: u64,
}

impl PollSchedule {
    pub fn from_settings(settings: &Settings) -> Self {
        let tick = settings.poll_tick();
        let ticks = |interval: Duration| (interval.as_millis() / tick.as_millis()).max(1) as u64;
        Self {
            tick,
            wifi_every: ticks(settings.wifi_poll_interval()),
            properties_every: ticks(settings.property_poll_interval()),
        }
    }
}

pub struct LinkMonitor {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl LinkMonitor {
    pub fn spawn(
        mut probe: Box<dyn NetworkProbe>,
        camera: Ipv4Addr,
        schedule: PollSchedule,
        handle: CameraHandle,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("link-monitor".into())
            .spawn(move || {
                let mut status = WifiStatus::NotConnected;
                let mut counter: u64 = 0;
                while !stop_flag.load(Ordering::Relaxed) {
                    thread::sleep(schedule.tick);

                    if counter % schedule.wifi_every == 0 {
                        let (next, local) = match probe.snapshot() {
                            Ok(snapshot) => snapshot.classify(camera),
                            Err(err) => {
                                warn!(error = %err, "network probe failed");
                                (WifiStatus::NotConnected, Ipv4Addr::LOCALHOST)
                            }
                        };
                        if next != status {
                            info!(status = ?next, local = %IpAddr::V4(local), "link status");
                        }
                        status = next;
                        if handle.report_link(status, local).is_err() {
                            break;
                        }
                    }

                    if counter % schedule.properties_every == 0
                        && status == WifiStatus::CameraConnected
                        && handle.refresh_properties().is_err()
                    {
                        break;
                    }

                    counter = counter.wrapping_add(1);
                }
                debug!("link monitor stopped");
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for LinkMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/link_monitor_tests.rs"]
mod tests;
