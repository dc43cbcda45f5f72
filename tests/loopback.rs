//! a short ramp over real IPv4 loopback sockets

use std::net::{Ipv4Addr, SocketAddrV4};
use std::thread;
use std::time::Duration;

use rampperf::config::{ReceiverConfig, SenderConfig, DEFAULT_SOCKET_BUFFER};
use rampperf::context::RunContext;
use rampperf::protocol::results::OutputFormat;
use rampperf::stream::clock::ClockSource;
use rampperf::stream::pacer::WaitPolicy;
use rampperf::stream::ramp::RampSchedule;
use rampperf::stream::udp::receiver::ReceiverExit;
use rampperf::stream::watchdog::{WatchdogConfig, WatchdogExpiry};
use rampperf::{client, server};

#[test]
fn ramp_over_loopback_is_measured() {
    let receiver_cfg = ReceiverConfig {
        bind: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
        read_timeout: Duration::from_millis(50),
        report_interval: Duration::from_secs(1),
        receive_buffer: DEFAULT_SOCKET_BUFFER,
        watchdog: WatchdogConfig {
            startup_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(1),
            check_every: 2,
        },
        format: OutputFormat::Json,
        clock: ClockSource::Monotonic,
    };
    let socket = server::bind_receive_socket(&receiver_cfg).unwrap();
    let port = socket.local_addr().unwrap().port();

    let receiver_ctx = RunContext::new();
    let c_ctx = receiver_ctx.clone();
    let c_cfg = receiver_cfg.clone();
    let receiver = thread::spawn(move || server::serve_on(socket, &c_cfg, &c_ctx));

    let sender_cfg = SenderConfig {
        peer: SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
        schedule: RampSchedule::new(2, 1).unwrap(),
        send_buffer: DEFAULT_SOCKET_BUFFER,
        wait_policy: WaitPolicy::default(),
        clock: ClockSource::Monotonic,
        affinity: String::new(),
    };
    let summaries = client::execute(&sender_cfg, &RunContext::new()).unwrap();
    assert_eq!(summaries.len(), 2);
    let sent: u64 = summaries.iter().map(|s| s.packets_sent).sum();
    assert!(sent > 0);

    let outcome = receiver.join().unwrap();
    assert!(matches!(
        outcome.exit,
        ReceiverExit::Watchdog(WatchdogExpiry::TrafficStopped { .. })
    ));
    assert!(outcome.totals.packets_received > 0);
    assert!(outcome.totals.packets_received <= sent);
    assert!(outcome.totals.reports_emitted >= 1);
}

#[test]
fn interrupted_receiver_stops_without_traffic() {
    let cfg = ReceiverConfig {
        bind: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
        read_timeout: Duration::from_millis(20),
        report_interval: Duration::from_secs(1),
        receive_buffer: DEFAULT_SOCKET_BUFFER,
        watchdog: WatchdogConfig::default(),
        format: OutputFormat::Csv,
        clock: ClockSource::Monotonic,
    };
    let socket = server::bind_receive_socket(&cfg).unwrap();
    let ctx = RunContext::new();
    let c_ctx = ctx.clone();
    let receiver = thread::spawn(move || server::serve_on(socket, &cfg, &c_ctx));

    thread::sleep(Duration::from_millis(100));
    assert!(ctx.kill());
    let outcome = receiver.join().unwrap();
    assert_eq!(outcome.exit, ReceiverExit::Interrupted);
    assert_eq!(outcome.totals.packets_received, 0);
}
