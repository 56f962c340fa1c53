//! Arrivals board renderer for the roadside unit.
//!
//! Writes the station display snapshot to any `io::Write`; production
//! units print to stdout, real display hardware would sit behind the
//! same seam.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::presence::PresenceRecord;

/// Render the board for one snapshot, one bus line per record in
/// snapshot order.
pub fn render(
    out: &mut dyn Write,
    station_id: &str,
    now: DateTime<Utc>,
    buses: &[PresenceRecord],
) -> io::Result<()> {
    writeln!(out, "--- STATION DISPLAY UPDATE ---")?;
    writeln!(out, "Station ID: {}", station_id)?;
    writeln!(out, "Current time: {}", now.format("%H:%M:%S"))?;
    writeln!(out)?;
    writeln!(out, "Approaching buses:")?;
    for bus in buses {
        writeln!(out, "Bus {} - ETA: {:.1} minutes", bus.bus_id, bus.eta)?;
    }
    writeln!(out, "-----------------------------")?;
    out.flush()
}
