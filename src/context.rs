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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// run-scoped state shared between a role's loop and the termination handler
#[derive(Clone, Debug)]
pub struct RunContext {
    alive: Arc<AtomicBool>,
}

impl Default for RunContext {
    fn default() -> Self {
        RunContext::new()
    }
}

impl RunContext {
    pub fn new() -> RunContext {
        RunContext {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// when false, the role is shutting down
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// returns whether the context was still alive before this call
    pub fn kill(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    pub fn alive_flag(&self) -> &AtomicBool {
        &self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_is_visible_through_clones() {
        let ctx = RunContext::new();
        let handler = ctx.clone();
        assert!(ctx.is_alive());
        assert!(handler.kill());
        assert!(!ctx.is_alive());
        assert!(!handler.kill());
    }
}
