use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use qlp_core::config::{self, parse_device_id};
use qlp_core::{
    CommonAnswer, CommonAnswerCode, Config, ControlCommand, ControlRequest, Controller,
    DeviceIdentity, DeviceService, DeviceState, LogFormat, MemoryStrip, PacketType, ResetHandle,
    Rgb, SERVICE_PORT, ServiceExit, UdpTransport, Verdict, decode_common_answer, encode_frame,
    validate,
};
use serde::Serialize;
use tracing::info;

/// Exit code after a reboot command; a supervisor restarts the device.
const EXIT_RESET: u8 = 3;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("QLP_BUILD_COMMIT"),
    ", ",
    env!("QLP_BUILD_DATE"),
    ")"
);

const EXAMPLES: &str = "Examples:\n  qlp device run --device-id 00C0FFEE --strip-length 60\n  qlp discover --timeout-ms 1500\n  qlp send --device 00C0FFEE fill ff8000\n  qlp frame inspect 514c50010141424873";

#[derive(Parser, Debug)]
#[command(name = "qlp")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "QLP LED device control plane: simulated device, controller and frame tools.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a device on this host.
    Device {
        #[command(subcommand)]
        command: DeviceCommands,
    },
    /// Broadcast a discovery request and list the devices that answer.
    Discover(DiscoverArgs),
    /// Send one command to a device.
    #[command(
        after_help = "Examples:\n  qlp send --device 2A fill ff0000\n  qlp send --device 2A line 0 10 00ff00\n  qlp send --device 2A --wait-ms 0 reboot"
    )]
    Send(SendArgs),
    /// Offline frame tools (no network).
    Frame {
        #[command(subcommand)]
        command: FrameCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DeviceCommands {
    /// Serve the protocol with an in-memory LED strip.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Config file (TOML); must exist when given
    #[arg(long)]
    config: Option<PathBuf>,

    /// Service port (listen and reply)
    #[arg(long)]
    port: Option<u16>,

    /// Device id, up to 8 hex digits (random when not configured)
    #[arg(long, value_parser = parse_hex_id)]
    device_id: Option<u32>,

    /// Name announced in discovery replies
    #[arg(long)]
    name: Option<String>,

    /// Initial strip length in pixels
    #[arg(long)]
    strip_length: Option<u16>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Args, Debug)]
struct NetworkArgs {
    /// Service port
    #[arg(long, default_value_t = SERVICE_PORT)]
    port: u16,

    /// Broadcast address requests are sent to
    #[arg(long, default_value_t = Ipv4Addr::BROADCAST)]
    broadcast: Ipv4Addr,
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    #[command(flatten)]
    network: NetworkArgs,

    /// How long to collect replies
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Print devices as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Target device id, up to 8 hex digits
    #[arg(long, value_parser = parse_hex_id)]
    device: u32,

    #[command(flatten)]
    network: NetworkArgs,

    /// How long to wait for the answer; 0 sends without waiting
    #[arg(long, default_value_t = 500)]
    wait_ms: u64,

    #[command(subcommand)]
    action: SendAction,
}

#[derive(Subcommand, Debug)]
enum SendAction {
    /// Paint every pixel (color as RRGGBB hex)
    Fill {
        #[arg(value_parser = parse_color)]
        color: Rgb,
    },
    /// Paint one pixel
    Pixel {
        index: u16,
        #[arg(value_parser = parse_color)]
        color: Rgb,
    },
    /// Paint pixels in [START, END)
    Line {
        start: u16,
        end: u16,
        #[arg(value_parser = parse_color)]
        color: Rgb,
    },
    /// Resize the strip and mark its last pixel
    Length { length: u8 },
    /// Blank the strip and restart the device
    Reboot,
}

#[derive(Subcommand, Debug)]
enum FrameCommands {
    /// Validate a hex-encoded frame and print the verdict as JSON
    Inspect {
        /// Frame bytes as hex (whitespace ignored)
        hex: String,
    },
    /// Encode a typed frame and print it as hex
    Encode {
        #[arg(value_enum)]
        packet_type: PacketTypeArg,
        /// Payload bytes as hex
        payload_hex: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PacketTypeArg {
    None,
    Discovery,
    Broadcast,
    Control,
}

impl From<PacketTypeArg> for PacketType {
    fn from(arg: PacketTypeArg) -> Self {
        match arg {
            PacketTypeArg::None => PacketType::None,
            PacketTypeArg::Discovery => PacketType::Discovery,
            PacketTypeArg::Broadcast => PacketType::Broadcast,
            PacketTypeArg::Control => PacketType::Control,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Device {
            command: DeviceCommands::Run(args),
        } => cmd_device_run(args),
        Commands::Discover(args) => cmd_discover(args),
        Commands::Send(args) => cmd_send(args),
        Commands::Frame { command } => match command {
            FrameCommands::Inspect { hex } => cmd_frame_inspect(&hex),
            FrameCommands::Encode {
                packet_type,
                payload_hex,
            } => cmd_frame_encode(packet_type.into(), payload_hex.as_deref()),
        },
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn parse_hex_id(value: &str) -> Result<u32, String> {
    parse_device_id(value).map_err(|err| err.to_string())
}

fn parse_color(value: &str) -> Result<Rgb, String> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    match hex::decode(digits) {
        Ok(bytes) if bytes.len() == 3 => Ok(Rgb::new(bytes[0], bytes[1], bytes[2])),
        _ => Err(format!("expected RRGGBB hex, got '{value}'")),
    }
}

fn decode_hex_arg(what: &str, value: &str) -> Result<Vec<u8>, CliError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|err| {
        CliError::new(
            format!("invalid {what} hex: {err}"),
            Some("use an even number of hex digits, e.g. 514c5001...".to_string()),
        )
    })
}

fn init_logging(level: &str, format: LogFormat) -> Result<(), CliError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| {
            CliError::new(
                format!("invalid log level '{level}': {err}"),
                Some("use error, warn, info, debug or trace".to_string()),
            )
        })?;
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|err| CliError::new(format!("failed to initialise logging: {err}"), None))
}

fn load_config(args: &RunArgs) -> Result<Config, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::new(
                    format!("config file not found: {}", path.display()),
                    Some("omit --config to use ~/.config/qlp/config.toml or /etc/qlp/config.toml".to_string()),
                ));
            }
            Config::load(path)
        }
        None => Config::load_first(&config::search_paths()),
    }
    .map_err(|err| CliError::new(err.to_string(), Some("fix or remove the config file".to_string())))?;

    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .map_err(|err| CliError::new(err.to_string(), Some("fix or unset the QLP_* variable".to_string())))?;

    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(id) = args.device_id {
        config.device.id = Some(id);
    }
    if let Some(name) = &args.name {
        config.device.name = name.clone();
    }
    if let Some(strip_length) = args.strip_length {
        config.device.strip_length = strip_length;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format.into();
    }

    config
        .validate()
        .map_err(|err| CliError::new(err.to_string(), None))?;
    Ok(config)
}

/// Ends the process after the current poll; the exit code tells the
/// supervisor to start the device again.
struct ProcessReset;

impl ResetHandle for ProcessReset {
    fn reset(&mut self) {
        info!(exit_code = EXIT_RESET, "device reset");
    }
}

fn cmd_device_run(args: RunArgs) -> Result<ExitCode, CliError> {
    let config = load_config(&args)?;
    init_logging(&config.logging.level, config.logging.format)?;

    let shutdown = shutdown_on_signal()?;
    let mut rng = rand::thread_rng();
    let device_id = config.resolve_device_id(&mut rng);
    let transport = UdpTransport::bind(config.bind_addr()).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("another process may hold the port; try --port".to_string()),
        )
    })?;
    let state = DeviceState::new(
        DeviceIdentity::new(device_id, config.device.name.clone()),
        MemoryStrip::new(config.device.strip_length),
    );
    let mut service = DeviceService::new(
        transport,
        config.broadcast_addr(),
        state,
        rng,
        ProcessReset,
    );

    let exit = service
        .run(config.poll_interval(), &shutdown)
        .context("device service failed")?;
    Ok(match exit {
        ServiceExit::Reset => ExitCode::from(EXIT_RESET),
        ServiceExit::Shutdown => {
            info!("device stopped by signal");
            ExitCode::SUCCESS
        }
    })
}

/// Flag raised by SIGINT or SIGTERM; the poll loop checks it between datagrams.
fn shutdown_on_signal() -> Result<Arc<AtomicBool>, CliError> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&flag)).map_err(|err| {
            CliError::new(format!("cannot install signal handler: {err}"), None)
        })?;
    }
    Ok(flag)
}

fn controller(network: &NetworkArgs) -> Result<Controller<UdpTransport>, CliError> {
    init_logging("warn", LogFormat::Text)?;
    let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), network.port);
    let transport = UdpTransport::bind(bind).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("answers arrive on the service port; stop a local device or pick another --port".to_string()),
        )
    })?;
    Ok(Controller::new(
        transport,
        SocketAddr::new(IpAddr::V4(network.broadcast), network.port),
    ))
}

fn cmd_discover(args: DiscoverArgs) -> Result<ExitCode, CliError> {
    let mut controller = controller(&args.network)?;
    let devices = controller
        .discover(Duration::from_millis(args.timeout_ms))
        .context("discovery failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&devices).context("JSON serialization failed")?;
        println!("{json}");
    } else if devices.is_empty() {
        eprintln!("no devices answered within {} ms", args.timeout_ms);
    } else {
        for device in &devices {
            println!("{:08X}  {:<21}  {}", device.device_id, device.addr, device.name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn send_action_command(action: SendAction) -> ControlCommand {
    match action {
        SendAction::Fill { color } => ControlCommand::Fill { color },
        SendAction::Pixel { index, color } => ControlCommand::SetPixel { index, color },
        SendAction::Line { start, end, color } => ControlCommand::SetLine { start, end, color },
        SendAction::Length { length } => ControlCommand::SetLength { length },
        SendAction::Reboot => ControlCommand::Reboot,
    }
}

#[derive(Serialize)]
struct AnswerReport {
    packet_type: PacketType,
    code: CommonAnswerCode,
    #[serde(skip_serializing_if = "String::is_empty")]
    data_hex: String,
}

impl From<&CommonAnswer> for AnswerReport {
    fn from(answer: &CommonAnswer) -> Self {
        Self {
            packet_type: answer.packet_type,
            code: answer.code,
            data_hex: hex::encode(&answer.data),
        }
    }
}

fn cmd_send(args: SendArgs) -> Result<ExitCode, CliError> {
    let mut controller = controller(&args.network)?;
    let command = send_action_command(args.action);
    controller
        .send(args.device, &command)
        .context("send failed")?;
    if args.wait_ms == 0 {
        return Ok(ExitCode::SUCCESS);
    }

    match controller
        .await_answer(Duration::from_millis(args.wait_ms))
        .context("waiting for the answer failed")?
    {
        Some(answer) => {
            let json = serde_json::to_string(&AnswerReport::from(&answer))
                .context("JSON serialization failed")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        None => Err(CliError::new(
            format!("no answer from {:08X} within {} ms", args.device, args.wait_ms),
            Some("devices stay silent for other ids and unknown commands; check --device with `qlp discover`".to_string()),
        )),
    }
}

#[derive(Serialize)]
struct InspectReport {
    length: usize,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    packet_type: Option<PacketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<RejectionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    control: Option<ControlReport>,
    /// Set when the bytes decode as a device answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    common_answer: Option<AnswerReport>,
}

#[derive(Serialize)]
struct RejectionReport {
    reply_type: PacketType,
    code: CommonAnswerCode,
    code_value: u8,
    reason: String,
}

#[derive(Serialize)]
struct ControlReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<ControlCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn control_report(request: Result<ControlRequest<'_>, qlp_core::CommandError>) -> ControlReport {
    let request = match request {
        Ok(request) => request,
        Err(err) => {
            return ControlReport {
                device_id: None,
                command_id: None,
                command: None,
                error: Some(err.to_string()),
            };
        }
    };
    let (command, error) = match ControlCommand::parse(request.command_id, request.data) {
        Ok(Some(command)) => (Some(command), None),
        Ok(None) => (None, Some("unknown command id".to_string())),
        Err(err) => (None, Some(err.to_string())),
    };
    ControlReport {
        device_id: Some(format!("{:08X}", request.device_id)),
        command_id: Some(request.command_id),
        command,
        error,
    }
}

fn cmd_frame_inspect(hex_arg: &str) -> Result<ExitCode, CliError> {
    let bytes = decode_hex_arg("frame", hex_arg)?;
    let mut report = InspectReport {
        length: bytes.len(),
        valid: false,
        packet_type: None,
        payload_hex: None,
        rejection: None,
        control: None,
        common_answer: decode_common_answer(&bytes)
            .ok()
            .map(|answer| AnswerReport::from(&answer)),
    };

    match validate(&bytes) {
        Verdict::Valid(packet) => {
            report.valid = true;
            report.packet_type = Some(packet.packet_type());
            report.payload_hex = Some(hex::encode(packet.payload()));
            if packet.packet_type() == PacketType::Control {
                report.control = Some(control_report(ControlRequest::parse(&packet)));
            }
        }
        Verdict::Rejected(rejection) => {
            report.rejection = Some(RejectionReport {
                reply_type: rejection.reply_type,
                code: rejection.code(),
                code_value: rejection.code().as_u8(),
                reason: rejection.error.to_string(),
            });
        }
    }

    let json = serde_json::to_string_pretty(&report).context("JSON serialization failed")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn cmd_frame_encode(packet_type: PacketType, payload_hex: Option<&str>) -> Result<ExitCode, CliError> {
    let payload = match payload_hex {
        Some(value) => decode_hex_arg("payload", value)?,
        None => Vec::new(),
    };
    println!("{}", hex::encode(encode_frame(packet_type, &payload)));
    Ok(ExitCode::SUCCESS)
}
