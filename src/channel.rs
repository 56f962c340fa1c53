//! Short-range link between buses and stations.
//!
//! Frames are single-line JSON objects, one message per line, sent
//! fire-and-forget over a serial transceiver. The link is optional
//! hardware: when the device cannot be opened the channel runs
//! disconnected, where sends report `Unavailable` and receives yield
//! nothing, and the rest of the unit keeps working.

use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Read timeout on the underlying port. Short so a drain poll never
/// stalls the loop; partial lines are buffered across polls.
const PORT_TIMEOUT: Duration = Duration::from_millis(200);

/// Ceiling on a buffered partial line. Frames are tiny JSON objects; a
/// newline-less byte stream past this length is dropped as a malformed
/// frame so the buffer and the poll both stay bounded.
const MAX_FRAME_LEN: usize = 1024;

/// A bus→station broadcast announcing an estimated arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub bus_id: String,
    pub station_id: String,
    /// Estimated arrival in minutes
    pub eta: f64,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}

/// I/O seam over the transceiver so tests can supply in-memory links.
pub trait ReadWrite: Read + Write + Send {}
impl<T: Read + Write + Send> ReadWrite for T {}

pub struct ShortRangeChannel {
    link: Option<Box<dyn ReadWrite>>,
    /// Bytes read but not yet terminated by a newline, at most
    /// `MAX_FRAME_LEN` of them
    pending: Vec<u8>,
    /// Set while the tail of an already-dropped oversized frame is still
    /// arriving; everything up to its newline is skipped
    discarding: bool,
}

impl ShortRangeChannel {
    /// Open the configured serial device. Availability is resolved here,
    /// once: on failure the channel comes up disconnected and the unit
    /// runs degraded instead of aborting.
    pub fn open(device: &str, baud_rate: u32) -> Self {
        let builder = serialport::new(device, baud_rate)
            .timeout(PORT_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None);

        match builder.open_native() {
            Ok(port) => {
                info!(device, baud_rate, "Transceiver connected");
                Self::from_link(Box::new(port))
            }
            Err(e) => {
                warn!(device, error = %e, "Transceiver not connected, channel disconnected");
                Self::disconnected()
            }
        }
    }

    /// Build a channel over an already-open link.
    pub fn from_link(link: Box<dyn ReadWrite>) -> Self {
        Self {
            link: Some(link),
            pending: Vec::new(),
            discarding: false,
        }
    }

    /// A channel with no device behind it.
    pub fn disconnected() -> Self {
        Self {
            link: None,
            pending: Vec::new(),
            discarding: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Send one message as a single line. Fire-and-forget: no
    /// acknowledgement and no retry.
    pub fn send(&mut self, msg: &ChannelMessage) -> Result<(), ChannelError> {
        let Some(link) = self.link.as_mut() else {
            return Err(ChannelError::Unavailable("link not connected".to_string()));
        };

        let mut line =
            serde_json::to_vec(msg).map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        line.push(b'\n');

        link.write_all(&line)
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        link.flush()
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        Ok(())
    }

    /// Non-blocking receive step: returns a message if a complete line
    /// is available, `None` when nothing (or only a partial line) is
    /// buffered. A line that fails to parse is consumed and reported as
    /// `MalformedFrame`; a line growing past `MAX_FRAME_LEN` with no
    /// terminator is dropped the same way. Later frames are unaffected
    /// either way.
    pub fn try_receive(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(None);
        };

        let mut buf = [0u8; 256];
        loop {
            while let Some(line) = next_line(&mut self.pending) {
                if self.discarding {
                    // Tail of an oversized frame that was already dropped
                    self.discarding = false;
                    continue;
                }
                if line.is_empty() {
                    continue;
                }
                return match serde_json::from_slice::<ChannelMessage>(&line) {
                    Ok(msg) => Ok(Some(msg)),
                    Err(_) => Err(ChannelError::MalformedFrame(
                        String::from_utf8_lossy(&line).into_owned(),
                    )),
                };
            }

            if self.pending.len() > MAX_FRAME_LEN {
                self.pending.clear();
                self.discarding = true;
                return Err(ChannelError::MalformedFrame(format!(
                    "frame exceeds {} bytes",
                    MAX_FRAME_LEN
                )));
            }

            match link.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(ChannelError::Unavailable(e.to_string())),
            }
        }
    }
}

/// Pop the first complete line off the buffer, stripping the newline and
/// any carriage return.
fn next_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = pending.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}
