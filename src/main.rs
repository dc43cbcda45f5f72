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

use clap::Parser;
use rampperf::{
    args::Args,
    client,
    config::Role,
    context::RunContext,
    server, BoxResult, Error,
};

fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run(args: &Args) -> BoxResult<i32> {
    let role = Role::from_args(args)?;

    let ctx = RunContext::new();
    let c_ctx = ctx.clone();
    ctrlc2::set_handler(move || {
        if c_ctx.kill() {
            log::warn!("shutdown requested; please allow a moment for the current step or window to end...");
        }
        true
    })
    .map_err(|e| Error::String(format!("unable to install signal handler: {}", e)))?;

    match role {
        Role::Receiver(cfg) => {
            let outcome = server::serve(&cfg, &ctx)?;
            println!("{}", outcome.exit);
            Ok(outcome.exit.exit_code())
        }
        Role::Sender(cfg) => {
            println!("Starting Sender to {}...", cfg.peer.ip());
            client::execute(&cfg, &ctx)?;
            println!("Test Complete.");
            Ok(0)
        }
    }
}
