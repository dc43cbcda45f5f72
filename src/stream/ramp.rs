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

use std::time::Duration;

use crate::error::{Error, Result};

/// one load level of the ramp
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateStep {
    /// MiB/s
    pub target_mbps: u32,
    pub duration_sec: u32,
}

impl RateStep {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_sec as u64)
    }
}

/// ascending load levels from 1 to a maximum, inclusive, each held equally long
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RampSchedule {
    steps: Vec<RateStep>,
}

impl RampSchedule {
    pub fn new(max_mbps: u32, duration_sec: u32) -> Result<RampSchedule> {
        if max_mbps == 0 {
            return Err(Error::Config("maximum rate must be at least 1 MB/s".to_string()));
        }
        if duration_sec == 0 {
            return Err(Error::Config("each rate step must last at least one second".to_string()));
        }
        let steps = (1..=max_mbps)
            .map(|target_mbps| RateStep {
                target_mbps,
                duration_sec,
            })
            .collect();
        Ok(RampSchedule { steps })
    }

    pub fn steps(&self) -> &[RateStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(RateStep::duration).sum()
    }
}
