use clap::{App, Arg};
use colored::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn, Level};
use vehbus::config::{DEFAULT_BASE_ID, DEFAULT_TCP_PORT};
use vehbus::dashboard::TerminalDashboard;
use vehbus::telemetry::{DecodeError, Signal};
use vehbus::{DashboardReadout, Frame};

const DEFAULT_HOST: &str = "127.0.0.1";

fn parse_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a valid identifier", value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let default_port = DEFAULT_TCP_PORT.to_string();
    let default_base = format!("{:#x}", DEFAULT_BASE_ID);
    let matches = App::new("vehbus-dash")
        .version("0.1.0")
        .author("Vehicle Systems Engineering Team")
        .about("📟 Instrument cluster for the vehicle bus simulator")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(&default_port),
        )
        .arg(
            Arg::with_name("base-id")
                .short("b")
                .long("base-id")
                .value_name("ID")
                .help("Identifier of the first signal frame")
                .takes_value(true)
                .default_value(&default_base)
                .validator(|v| parse_id(&v).map(|_| ())),
        )
        .arg(
            Arg::with_name("candump")
                .long("candump")
                .help("Read candump lines from stdin instead of connecting"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).init();

    let base_id = matches
        .value_of("base-id")
        .map(parse_id)
        .transpose()?
        .unwrap_or(DEFAULT_BASE_ID);
    let mut cluster = Cluster::new(base_id);

    if matches.is_present("candump") {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match Frame::parse_candump(&line) {
                Ok(frame) => cluster.apply(&frame),
                Err(e) => debug!("{}", e),
            }
        }
        return Ok(());
    }

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(default_port.as_str());
    println!("{} {}:{}", "Connecting to".dimmed(), host, port);
    let stream = TcpStream::connect(format!("{}:{}", host, port)).await?;
    info!("Connected to {}:{}", host, port);

    let (reader, mut writer) = stream.into_split();
    let keys = tokio::spawn(async move {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin.next_line().await {
            if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        match serde_json::from_str::<Frame>(&line) {
            Ok(frame) => cluster.apply(&frame),
            Err(e) => debug!("Skipping line: {}", e),
        }
    }

    keys.abort();
    println!("{}", "Simulator closed the connection".yellow());
    Ok(())
}

/// Readout plus the display; redraws once per complete frame set.
struct Cluster {
    readout: DashboardReadout,
    display: TerminalDashboard<std::io::Stdout>,
    decode_errors: u64,
}

impl Cluster {
    fn new(base_id: u32) -> Self {
        Self {
            readout: DashboardReadout::new(base_id),
            display: TerminalDashboard::stdout(),
            decode_errors: 0,
        }
    }

    fn apply(&mut self, frame: &Frame) {
        match self.readout.apply(frame) {
            Ok(true) => {
                if frame.id == self.readout.base_id + Signal::GearPosition.offset() {
                    self.display.render_readout(&self.readout);
                }
            }
            Ok(false) => {}
            Err(e) => self.report(&e),
        }
    }

    fn report(&mut self, error: &DecodeError) {
        self.decode_errors += 1;
        if self.decode_errors % 10 == 1 {
            warn!(total = self.decode_errors, "Bad frame: {}", error);
        }
    }
}
