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

use crate::{error_gen, BoxResult};

/// pins the calling thread to one of a configured set of cores, round-robin
pub struct CpuAffinityManager {
    enabled_cores: Vec<core_affinity::CoreId>,
    last_core_pointer: usize,
}

impl CpuAffinityManager {
    /// `cores` is a comma-separated list of core ids; empty disables pinning
    pub fn new(cores: &str) -> BoxResult<CpuAffinityManager> {
        let mut enabled_cores = Vec::new();
        if !cores.trim().is_empty() {
            let core_ids = core_affinity::get_core_ids().unwrap_or_default();
            log::debug!("enumerated CPU cores: {:?}", core_ids.iter().map(|c| c.id).collect::<Vec<usize>>());

            for spec in cores.split(',') {
                let id: usize = spec
                    .trim()
                    .parse()
                    .map_err(|_| error_gen!("invalid core id: {}", spec))?;
                match core_ids.iter().find(|c| c.id == id) {
                    Some(c) => enabled_cores.push(*c),
                    None => log::warn!("unknown CPU core: {}", id),
                }
            }
            log::debug!("selecting from CPU cores {:?}", enabled_cores.iter().map(|c| c.id).collect::<Vec<usize>>());
        }

        Ok(CpuAffinityManager {
            enabled_cores,
            last_core_pointer: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.enabled_cores.is_empty()
    }

    pub fn set_affinity(&mut self) {
        if self.enabled_cores.is_empty() {
            log::debug!("CPU affinity is not configured; not doing anything");
            return;
        }
        let core_id = self.enabled_cores[self.last_core_pointer];
        log::info!("setting CPU affinity to {}", core_id.id);
        if !core_affinity::set_for_current(core_id) {
            log::warn!("unable to pin to CPU core {}", core_id.id);
        }
        self.last_core_pointer = (self.last_core_pointer + 1) % self.enabled_cores.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_disables_pinning() {
        let mut manager = CpuAffinityManager::new("").unwrap();
        assert!(!manager.is_enabled());
        manager.set_affinity();
    }

    #[test]
    fn garbage_spec_is_rejected() {
        assert!(CpuAffinityManager::new("one,two").is_err());
    }
}
