//! Binary entry point: parses configuration, builds the shared protocol state, and runs the
//! single-threaded `mio` event loop that drives the TCP listener (and the UDP stub) against
//! `eip_proto`'s pure dispatch functions.

mod config;
mod connection;

use clap::{App, Arg};
use config::ServerConfig;
use connection::Connection;
use eip_proto::dispatch::dispatch_encap;
use eip_proto::{DeviceIdentity, SessionRegistry, TagStore};
use flux::logging::{self, debug, error, info, warn, Logger};
use indexmap::IndexMap;
use mio::net::{TcpListener, UdpSocket};
use mio::{Events, Poll, PollOpt, Ready, Token};
use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::str::FromStr;
use std::time::{Duration, Instant};

const TCP_LISTENER_TOKEN: Token = Token(0);
const UDP_SOCKET_TOKEN: Token = Token(1);
const FIRST_CONNECTION_TOKEN: usize = 2;
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

fn main() {
    let matches = App::new("EtherNet/IP Simulator")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Serves a simulated EtherNet/IP device over TCP and UDP.")
        .arg(Arg::with_name("config").long("config").takes_value(true).help("Path to a JSON configuration file"))
        .arg(Arg::with_name("tcp-port").long("tcp-port").takes_value(true))
        .arg(Arg::with_name("udp-port").long("udp-port").takes_value(true))
        .arg(Arg::with_name("bind-host").long("bind-host").takes_value(true))
        .arg(Arg::with_name("log-level").long("log-level").takes_value(true))
        .get_matches();

    let mut settings = match matches.value_of("config") {
        Some(path) => ServerConfig::load(path).unwrap_or_else(|err| {
            eprintln!("fatal: {}", err);
            process::exit(1);
        }),
        None => ServerConfig::default(),
    };

    settings.apply_env();

    if let Some(value) = matches.value_of("tcp-port") {
        settings.tcp_port = parse_or_exit(value, "tcp-port");
    }
    if let Some(value) = matches.value_of("udp-port") {
        settings.udp_port = parse_or_exit(value, "udp-port");
    }
    if let Some(value) = matches.value_of("bind-host") {
        settings.bind_host = value.to_string();
    }
    if let Some(value) = matches.value_of("log-level") {
        settings.log_level = value.to_string();
    }

    let logger = logging::init(logging::parse_level(&settings.log_level));

    info!(logger, "starting eip_server";
        "tcp_port" => settings.tcp_port,
        "udp_port" => settings.udp_port,
        "bind_host" => settings.bind_host.clone(),
        "tag_count" => settings.tag_count,
    );

    if let Err(err) = run(settings, logger.clone()) {
        error!(logger, "fatal startup error"; "error" => err.to_string());
        process::exit(1);
    }
}

fn parse_or_exit<T: FromStr>(value: &str, flag: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("fatal: invalid value for --{}: {}", flag, value);
        process::exit(1);
    })
}

fn run(settings: ServerConfig, logger: Logger) -> std::io::Result<()> {
    let local_ip = Ipv4Addr::from_str(&settings.bind_host).unwrap_or(Ipv4Addr::UNSPECIFIED);

    let tcp_addr: SocketAddr = format!("{}:{}", settings.bind_host, settings.tcp_port).parse().map_err(to_io_error)?;
    let udp_addr: SocketAddr = format!("{}:{}", settings.bind_host, settings.udp_port).parse().map_err(to_io_error)?;

    let listener = TcpListener::bind(&tcp_addr)?;
    let udp_socket = UdpSocket::bind(&udp_addr)?;

    let poll = Poll::new()?;
    poll.register(&listener, TCP_LISTENER_TOKEN, Ready::readable(), PollOpt::edge())?;
    poll.register(&udp_socket, UDP_SOCKET_TOKEN, Ready::readable(), PollOpt::edge())?;

    let mut events = Events::with_capacity(1024);
    let mut connections: IndexMap<Token, Connection> = IndexMap::new();
    let mut next_token = FIRST_CONNECTION_TOKEN;

    let identity = DeviceIdentity::new(settings.vendor_id, settings.device_type, settings.product_code, settings.product_name.clone());
    let mut sessions = SessionRegistry::new();
    let mut tags = TagStore::new(settings.tag_count);

    let idle_timeout_ms = settings.idle_timeout_ms;
    let sweep_interval = Duration::from_millis(settings.sweep_interval_ms);
    let mut last_sweep = Instant::now();
    let mut udp_scratch = [0u8; 512];

    info!(logger, "listening"; "tcp_addr" => tcp_addr.to_string(), "udp_addr" => udp_addr.to_string());

    loop {
        poll.poll(&mut events, Some(POLL_TIMEOUT))?;

        for event in events.iter() {
            match event.token() {
                TCP_LISTENER_TOKEN => accept_connections(&listener, &poll, &mut connections, &mut next_token, &logger),
                UDP_SOCKET_TOKEN => {
                    // Stub listener: drain datagrams without parsing or replying.
                    while udp_socket.recv_from(&mut udp_scratch).is_ok() {}
                }
                token => service_connection(
                    token,
                    &poll,
                    &mut connections,
                    &mut sessions,
                    &mut tags,
                    &identity,
                    local_ip,
                    &logger,
                ),
            }
        }

        if last_sweep.elapsed() >= sweep_interval {
            let expired = sessions.sweep(flux::time::timestamp_millis(), idle_timeout_ms);
            if !expired.is_empty() {
                debug!(logger, "swept idle sessions"; "count" => expired.len());
            }
            last_sweep = Instant::now();
        }
    }
}

fn to_io_error<E: std::fmt::Display>(err: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
}

fn accept_connections(
    listener: &TcpListener,
    poll: &Poll,
    connections: &mut IndexMap<Token, Connection>,
    next_token: &mut usize,
    logger: &Logger,
) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                let token = Token(*next_token);
                *next_token += 1;

                if let Err(err) = poll.register(&stream, token, Ready::readable() | Ready::writable(), PollOpt::edge()) {
                    warn!(logger, "failed to register connection"; "error" => err.to_string());
                    continue;
                }

                debug!(logger, "accepted connection"; "peer" => peer.to_string());
                connections.insert(token, Connection::new(stream));
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(err) => {
                warn!(logger, "accept failed"; "error" => err.to_string());
                break;
            }
        }
    }
}

fn service_connection(
    token: Token,
    poll: &Poll,
    connections: &mut IndexMap<Token, Connection>,
    sessions: &mut SessionRegistry,
    tags: &mut TagStore,
    identity: &DeviceIdentity,
    local_ip: Ipv4Addr,
    logger: &Logger,
) {
    let mut drop_connection = false;

    if let Some(conn) = connections.get_mut(&token) {
        match conn.read_available() {
            Ok(true) => {
                let now = flux::time::timestamp_millis();
                let mut responses: Vec<Vec<u8>> = Vec::new();
                let mut registered: Vec<u32> = Vec::new();
                let mut unregistered: Vec<u32> = Vec::new();

                eip_proto::reassembler::drain(
                    &mut conn.inbound,
                    |frame| {
                        debug!(logger, "dispatching frame"; "command" => frame.packet.header.command);
                        let command = frame.packet.header.command;
                        let response = dispatch_encap(&frame.packet, frame.byte_order, sessions, tags, identity, local_ip, now);

                        if response.header.status == eip_proto::EncapStatus::Success.code() {
                            if command == eip_proto::encap::CMD_REGISTER_SESSION {
                                registered.push(response.header.session_handle);
                            } else if command == eip_proto::encap::CMD_UNREGISTER_SESSION {
                                unregistered.push(response.header.session_handle);
                            }
                        }

                        responses.push(eip_proto::encap::encode(&response, frame.byte_order));
                    },
                    |err| warn!(logger, "dropping malformed frame"; "error" => err.to_string()),
                );

                for bytes in responses {
                    conn.queue_write(&bytes);
                }
                for handle in registered {
                    conn.sessions.insert(handle);
                }
                for handle in unregistered {
                    conn.sessions.remove(&handle);
                }
            }
            Ok(false) => drop_connection = true,
            Err(err) => {
                warn!(logger, "read failed"; "error" => err.to_string());
                drop_connection = true;
            }
        }

        if !drop_connection {
            if let Err(err) = conn.flush_outbound() {
                warn!(logger, "write failed"; "error" => err.to_string());
                drop_connection = true;
            }
        }
    }

    if drop_connection {
        if let Some(conn) = connections.remove(&token) {
            let _ = poll.deregister(&conn.stream);
            for handle in &conn.sessions {
                sessions.remove(*handle);
            }
        }
    }
}
