/*
 * Copyright (C) 2021 Evtech Solutions, Ltd., dba 3D-P
 * Copyright (C) 2021 Neil Tallim <neiltallim@3d-p.com>
 *
 * This file is part of rampperf.
 *
 * rampperf is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * rampperf is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with rampperf.  If not, see <https://www.gnu.org/licenses/>.
 */

use serde::Serialize;

/// the header line preceding csv records; downstream plotting keys on these names
pub const CSV_HEADER: &str = "timestamp,mbps,latency_avg_ns,drops";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// one reporting window's worth of receiver measurements
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IntervalReport {
    /// receiver clock at the end of the window, whole seconds
    pub timestamp_seconds: u64,
    /// megabits per second over the window
    pub achieved_mbps: f64,
    pub mean_latency_ns: u64,
    pub packets_lost: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub window_seconds: f64,
}

impl IntervalReport {
    pub fn to_csv(&self) -> String {
        format!(
            "{},{:.2},{},{}",
            self.timestamp_seconds, self.achieved_mbps, self.mean_latency_ns, self.packets_lost
        )
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Csv => self.to_csv(),
            OutputFormat::Json => match serde_json::to_string(self) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("unable to serialise interval report: {}", e);
                    self.to_csv()
                }
            },
        }
    }
}

/// totals across every window of a receiver run
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunTotals {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_lost: u64,
    pub mean_latency_ns: u64,
    pub reports_emitted: u64,
}

impl std::fmt::Display for RunTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packets ({} bytes) received, {} lost, mean latency {}ns over {} reports",
            self.packets_received, self.bytes_received, self.packets_lost, self.mean_latency_ns, self.reports_emitted
        )
    }
}
