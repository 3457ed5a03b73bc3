//! Live-view reassembly: RTP datagrams in, complete frames out.
//!
//! The camera streams each live-view image as a run of RTP packets whose last
//! packet carries the marker bit. Payloads are concatenated until the marker
//! arrives and the finished frame is handed to a bounded queue. Frame bytes are
//! never interpreted here.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::time::Duration;
use tracing::trace;

mod socket;

pub use crossbeam_channel::RecvTimeoutError;
pub use socket::LiveViewSocket;

/// Completed frames held before the consumer catches up; newer frames are dropped beyond this.
pub const FRAME_QUEUE_CAPACITY: usize = 20;

const FIXED_HEADER_LEN: usize = 12;
const CSRC_LEN: usize = 4;
const EXTENSION_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: Option<u16>,
}

impl RtpHeader {
    /// Reads as many header fields as `data` holds. Short buffers leave later fields at their defaults.
    pub fn parse(data: &[u8]) -> Self {
        let mut header = Self::default();
        if let Some(&b0) = data.first() {
            header.version = b0 >> 6;
            header.padding = b0 & 0x20 != 0;
            header.extension = b0 & 0x10 != 0;
            header.csrc_count = b0 & 0x0F;
        }
        if let Some(&b1) = data.get(1) {
            header.marker = b1 & 0x80 != 0;
            header.payload_type = b1 & 0x7F;
        }
        if data.len() > 3 {
            header.sequence_number = Some(u16::from_be_bytes([data[2], data[3]]));
        }
        header
    }

    /// Only headers carrying a sequence number are used for reassembly.
    pub fn is_complete(&self) -> bool {
        self.sequence_number.is_some()
    }

    fn fixed_len(&self) -> usize {
        FIXED_HEADER_LEN + CSRC_LEN * usize::from(self.csrc_count)
    }
}

/// Byte range of the media payload inside `data`, or `None` when the packet is too short for
/// its own header, extension or padding declarations.
pub fn payload_range(header: &RtpHeader, data: &[u8]) -> Option<std::ops::Range<usize>> {
    let mut start = header.fixed_len();
    if header.extension {
        let ext = data.get(start..start + EXTENSION_HEADER_LEN)?;
        let words = usize::from(u16::from_be_bytes([ext[2], ext[3]]));
        start += EXTENSION_HEADER_LEN + 4 * words;
    }
    let padding = if header.padding {
        usize::from(*data.last()?)
    } else {
        0
    };
    let end = data.len().checked_sub(padding)?;
    (start <= end).then_some(start..end)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Count of frame boundaries seen before this one since the reassembler started.
    pub number: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Header too short to carry a sequence number.
    Skipped,
    Accumulating,
    FrameQueued,
    /// Marker seen, but the frame was the leading fragment or the queue was full.
    FrameDropped,
}

pub fn frame_queue() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = bounded(FRAME_QUEUE_CAPACITY);
    (FrameSender { tx }, FrameReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: Sender<Frame>,
}

impl FrameSender {
    fn offer(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                trace!(frame = frame.number, "frame queue full; dropping frame");
                false
            }
            Err(TrySendError::Disconnected(frame)) => {
                trace!(frame = frame.number, "frame consumer gone; dropping frame");
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameReceiver {
    rx: Receiver<Frame>,
}

impl FrameReceiver {
    pub fn try_recv(&self) -> Option<Frame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Frame, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

pub struct Reassembler {
    partial: Vec<u8>,
    markers_seen: u64,
    frames: FrameSender,
}

impl Reassembler {
    pub fn new(frames: FrameSender) -> Self {
        Self {
            partial: Vec::new(),
            markers_seen: 0,
            frames,
        }
    }

    pub fn markers_seen(&self) -> u64 {
        self.markers_seen
    }

    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }

    pub fn process_datagram(&mut self, data: &[u8]) -> DatagramOutcome {
        let header = RtpHeader::parse(data);
        if !header.is_complete() {
            return DatagramOutcome::Skipped;
        }

        if let Some(range) = payload_range(&header, data) {
            self.partial.extend_from_slice(&data[range]);
        }

        if !header.marker {
            return DatagramOutcome::Accumulating;
        }

        let data = std::mem::take(&mut self.partial);
        let number = self.markers_seen;
        self.markers_seen += 1;

        // The first boundary closes whatever was mid-flight before we started listening.
        if number == 0 {
            return DatagramOutcome::FrameDropped;
        }
        if self.frames.offer(Frame { number, data }) {
            DatagramOutcome::FrameQueued
        } else {
            DatagramOutcome::FrameDropped
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
