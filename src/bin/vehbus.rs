use clap::{App, Arg};
use colored::*;
use std::fs::File;
use std::io::BufWriter;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn, Level};
use vehbus::command_source::{forward_stdin, parse_remote_line};
use vehbus::dashboard::{SnapshotConsumer, TerminalDashboard};
use vehbus::{
    BroadcastSink, CandumpSink, ChannelCommandSource, CommandToken, Frame, LogSink, SimConfig, SimError,
    TransportSink, VehicleSimulator,
};

const COMMAND_CHANNEL_SIZE: usize = 256;
const FRAME_BROADCAST_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("vehbus")
        .version("0.1.0")
        .author("Vehicle Systems Engineering Team")
        .about("🚗 Vehicle Bus Simulator - longitudinal dynamics with fixed-format telemetry frames")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file; missing fields keep their defaults")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("transport")
                .short("t")
                .long("transport")
                .value_name("TRANSPORT")
                .help("Where telemetry frames go")
                .takes_value(true)
                .possible_values(&["tcp", "candump", "log"])
                .default_value("tcp"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("TCP port for frame subscribers and remote commands")
                .takes_value(true)
                .validator(|v| v.parse::<u16>().map(|_| ()).map_err(|_| "Port must be a number between 0 and 65535".into())),
        )
        .arg(
            Arg::with_name("interface")
                .short("i")
                .long("interface")
                .value_name("NAME")
                .help("Interface label written into candump lines")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("FILE")
                .help("Write candump lines to a file instead of stdout")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("tick-ms")
                .long("tick-ms")
                .value_name("MS")
                .help("Tick period in milliseconds")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(ms) if ms > 0 => Ok(()),
                    _ => Err("Tick period must be a positive number".into()),
                }),
        )
        .arg(
            Arg::with_name("dashboard")
                .short("d")
                .long("dashboard")
                .help("Redraw the terminal dashboard every tick"),
        )
        .arg(
            Arg::with_name("no-countdown")
                .long("no-countdown")
                .help("Start ticking immediately"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let transport = matches.value_of("transport").unwrap_or("tcp");
    let level = if transport == "log" {
        Level::TRACE
    } else if matches.is_present("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = match matches.value_of("config") {
        Some(path) => SimConfig::load(path).map_err(|e| {
            error!("Failed to load {}: {}", path, e);
            SimError::from(e)
        })?,
        None => SimConfig::default(),
    };
    if let Some(port) = matches.value_of("port").and_then(|v| v.parse().ok()) {
        config.tcp_port = port;
    }
    if let Some(interface) = matches.value_of("interface") {
        config.interface = interface.to_string();
    }
    if let Some(tick_ms) = matches.value_of("tick-ms").and_then(|v| v.parse().ok()) {
        config.tick_ms = tick_ms;
    }
    if matches.is_present("no-countdown") {
        config.countdown_s = 0;
    }
    config.validate().map_err(SimError::from)?;

    println!("{}", "🚗 Vehicle Bus Simulator".bright_blue().bold());
    println!("{}", "========================".bright_blue());

    let (command_tx, mut commands) = ChannelCommandSource::channel(COMMAND_CHANNEL_SIZE);

    let mut server = None;
    let mut sink: Box<dyn TransportSink> = match transport {
        "tcp" => {
            let addr = format!("127.0.0.1:{}", config.tcp_port);
            let listener = TcpListener::bind(&addr).await.map_err(|source| {
                error!("Failed to bind {}: {}", addr, source);
                SimError::Bind { addr: addr.clone(), source }
            })?;
            println!("{} Frames on tcp://{}", "📡".bright_blue(), addr.bright_cyan());

            let broadcast = BroadcastSink::new(FRAME_BROADCAST_BUFFER_SIZE);
            server = Some(tokio::spawn(serve_clients(listener, broadcast.sender(), command_tx.clone())));
            Box::new(broadcast)
        }
        "candump" => match matches.value_of("output") {
            Some(path) => {
                let file = File::create(path).map_err(|e| {
                    error!("Failed to open {}: {}", path, e);
                    SimError::from(vehbus::TransportError::from(e))
                })?;
                println!("{} Frames to {} as {}", "📡".bright_blue(), path.bright_cyan(), config.interface);
                Box::new(CandumpSink::new(BufWriter::new(file), config.interface.clone()))
            }
            None => Box::new(CandumpSink::new(std::io::stdout(), config.interface.clone())),
        },
        _ => Box::new(LogSink),
    };
    info!(sink = sink.name(), base_id = config.base_id, tick_ms = config.tick_ms, "Transport ready");

    tokio::spawn(forward_stdin(command_tx.clone()));

    let ctrl_c_tx = command_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c_tx.send(CommandToken::Quit).await;
        }
    });
    drop(command_tx);

    println!("{}", "⌨️  Keys (then Enter): A accelerate, B brake, S start/stop, D/R/N/P selector, Q quit".dimmed());
    for remaining in (1..=config.countdown_s).rev() {
        println!("🔄 Starting in {}...", remaining);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let mut dashboard = if matches.is_present("dashboard") {
        Some(TerminalDashboard::stdout())
    } else {
        None
    };
    let tick_period = config.tick_period();
    let mut sim = VehicleSimulator::new(&config);

    while sim.is_running() {
        let report = sim.run_tick(&mut commands, sink.as_mut(), Instant::now());
        for transition in &report.transitions {
            info!("{:?}", transition);
        }
        if let Some(dashboard) = dashboard.as_mut() {
            dashboard.render(&sim.snapshot());
        }
        if report.quit {
            break;
        }
        tokio::time::sleep(tick_period).await;
    }

    if let Some(server) = server {
        server.abort();
    }

    let stats = sim.stats();
    println!(
        "{} Stopped after {} ticks, {} frames sent, {} TX errors",
        "🛑".red(),
        stats.ticks,
        stats.frames_sent,
        stats.tx_errors
    );
    Ok(())
}

async fn serve_clients(listener: TcpListener, frames: broadcast::Sender<Frame>, commands: mpsc::Sender<CommandToken>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New client connected: {}", addr);
                let frame_rx = frames.subscribe();
                let command_tx = commands.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, frame_rx, command_tx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Streams every frame to the client as a JSON line and feeds its input
/// lines back as commands.
async fn handle_client(
    stream: TcpStream,
    mut frames: broadcast::Receiver<Frame>,
    commands: mpsc::Sender<CommandToken>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();

    let frame_task = tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(frame) => {
                    let Ok(json) = serde_json::to_string(&frame) else {
                        continue;
                    };
                    if let Err(e) = writer.write_all(format!("{}\n", json).as_bytes()).await {
                        warn!("Failed to send frame: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Client fell behind, {} frames skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    'read: while let Some(line) = lines.next_line().await? {
        for token in parse_remote_line(&line) {
            if commands.send(token).await.is_err() {
                break 'read;
            }
        }
    }

    frame_task.abort();
    Ok(())
}
