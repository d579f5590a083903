//! `mdc` command line: run MDC commands and scripts against one or many displays

use std::{process::ExitCode, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use tracing::{debug, info};

use samsung_mdc::{
    args::{self, TargetSpec},
    client::MDCConnection,
    command::Code,
    commands,
    executor::{self, Script, ScriptOptions, Step, Target, TargetReport},
    proto, ConnectionConfig, ConnectionMode, Error, ParseMode, Value,
};

const TARGET_HELP: &str = "\
TARGET may be:
  DISPLAY_ID@IP[:PORT]   (default port: 1515, example: 0@192.168.0.10:1515)
  DISPLAY_ID@PORT_NAME   serial port (example: 1@COM1, 1@/dev/ttyUSB0)
  FILENAME               target list, one per line

For multiple targets commands run concurrently, so result order may differ.";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Serial when the address looks like a port name
    Auto,
    Tcp,
    Serial
}

#[derive(Parser)]
#[command(name = "mdc", version, about = "Samsung MDC display control", after_help = TARGET_HELP)]
struct Cli {
    /// DISPLAY_ID@ADDRESS or file with targets
    #[arg(required_unless_present = "list")]
    target: Option<String>,

    /// Transport
    #[arg(short, long, value_enum, default_value = "auto")]
    mode: Mode,

    /// 4-digit PIN for secured TLS connection ("Secured Protocol" must be enabled on the display)
    #[arg(short, long)]
    pin: Option<u16>,

    /// Read/write/connect timeout in seconds
    #[arg(short, long, default_value = "5", value_parser = parse_seconds)]
    timeout: Duration,

    /// Connect timeout in seconds, defaults to --timeout
    #[arg(long, value_parser = parse_seconds)]
    connect_timeout: Option<Duration>,

    /// Serial line speed
    #[arg(long, default_value_t = 9600)]
    baud_rate: u32,

    /// Keep unknown enumeration values instead of failing
    #[arg(long)]
    lenient: bool,

    /// Log every frame
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// List known commands and exit
    #[arg(long, exclusive = true)]
    list: bool,

    #[command(subcommand)]
    action: Option<Action>
}

#[derive(Subcommand)]
enum Action {
    /// Run commands from a file, one per line, plus `sleep SECONDS` and `disconnect`
    Script {
        /// Pause between commands (seconds)
        #[arg(short, long, default_value = "0", value_parser = parse_seconds)]
        sleep: Duration,
        /// Retry command if failed (count)
        #[arg(long, default_value_t = 0)]
        retry_command: usize,
        /// Sleep before command retry (seconds), defaults to --sleep
        #[arg(long, default_value = "0", value_parser = parse_seconds)]
        retry_command_sleep: Duration,
        /// Retry script if failed (count)
        #[arg(short, long, default_value_t = 0)]
        retry_script: usize,
        /// Sleep before script retry (seconds), defaults to --sleep
        #[arg(long, default_value = "0", value_parser = parse_seconds)]
        retry_script_sleep: Duration,
        /// Ignore negative acknowledgement errors
        #[arg(long)]
        ignore_nak: bool,
        /// Text file with commands
        file: String
    },
    /// Send raw bytes, for testing
    Raw {
        /// Command and optional subcommand in hex (example: a1 or a1:b2)
        command: String,
        /// Payload in hex (example: a1:b2)
        #[arg(default_value = "")]
        data: String
    },
    /// Any command from --list, followed by its arguments
    #[command(external_subcommand)]
    Call(Vec<String>)
}

fn parse_seconds(text: &str) -> Result<Duration, String> {
    text.parse::<f64>()
        .ok()
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .ok_or_else(|| format!("\"{text}\" is not a number of seconds"))
}

fn render(values: &[Value]) -> String {
    values.iter().map(Value::to_string).collect::<Vec<_>>().join(" ")
}

fn print_result(label: &str, result: &Result<Vec<Value>, Error>) {
    match result {
        Ok(values) => println!("{label} {}", render(values)),
        Err(e) => println!("{label} {}: {e}", e.kind())
    }
}

fn print_commands() {
    for command in commands::all() {
        let code = match command.code {
            Code::Fixed(code) => format!("0x{code:02X}"),
            Code::Indexed { index, resolve } => format!("0x{:02X}+{}", resolve(1), index.name)
        };
        let code = match command.subcode {
            Some(subcode) => format!("{code}:0x{subcode:02X}"),
            None => code
        };
        let access = match (command.get, command.set) {
            (true, true) => "get/set",
            (true, false) => "get",
            _ => "set"
        };
        let fields: Vec<_> = command.fields.iter().map(|f| format!("{}:{}", f.name, f.value_type())).collect();
        println!("{:<24} {:<16} {:<8} {}", command.name, code, access, fields.join(" "));
        if !command.doc.is_empty() {
            println!("{:<24} {}", "", command.doc);
        }
    }
}

fn connect(specs: Vec<TargetSpec>, cli: &Cli) -> Vec<Target> {
    specs.into_iter()
        .map(|spec| {
            let mode = match cli.mode {
                Mode::Auto => spec.mode,
                Mode::Tcp => ConnectionMode::Tcp,
                Mode::Serial => ConnectionMode::Serial
            };
            let mut config = ConnectionConfig::default()
                .with_mode(mode)
                .with_timeout(cli.timeout)
                .with_baud_rate(cli.baud_rate);
            if let Some(timeout) = cli.connect_timeout {
                config = config.with_connect_timeout(timeout);
            }
            if let Some(pin) = cli.pin {
                config = config.with_pin(pin);
            }
            Target::new(spec.display_id, MDCConnection::new(spec.address, config))
        })
        .collect()
}

async fn send_raw(targets: &mut [Target], command: &str, data: &str) -> Result<usize> {
    let code = args::parse_hex(command)?;
    let (code, subcode) = match code[..] {
        [code] => (code, None),
        [code, subcode] => (code, Some(subcode)),
        _ => bail!("COMMAND must be one or two hex bytes (example: a1 or a1:b2)")
    };
    let data = args::parse_hex(data)?;

    let failed = join_all(targets.iter_mut().map(|target| {
        let data = &data;
        async move {
            let label = target.label();
            match target.connection.send(code, subcode, target.display_id, data).await {
                Ok(response) => {
                    let echoed = match response.subcode {
                        Some(subcode) => vec![response.code, subcode],
                        None => vec![response.code]
                    };
                    println!(
                        "{label} {} {} {}",
                        if response.ack { "A" } else { "N" },
                        proto::repr_hex(&echoed),
                        proto::repr_hex(&response.data)
                    );
                    false
                }
                Err(e) => {
                    println!("{label} {}: {e}", e.kind());
                    true
                }
            }
        }
    }))
    .await;
    executor::close_all(targets).await;
    Ok(failed.into_iter().filter(|failed| *failed).count())
}

fn script_failures(reports: &[TargetReport]) -> usize {
    let mut failed = 0;
    for report in reports {
        if let Err(e) = &report.result {
            println!("{} Script failed indefinitely: {e}", report.label);
            failed += 1;
        }
    }
    failed
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.list {
        print_commands();
        return Ok(ExitCode::SUCCESS);
    }
    let (Some(target), Some(action)) = (cli.target.as_deref(), cli.action.as_ref()) else {
        bail!("TARGET and a command are required, see --help");
    };

    let specs = args::load_targets(target)?;
    let mut targets = connect(specs, &cli);
    info!("{} target(s)", targets.len());
    let parse_mode = if cli.lenient { ParseMode::Permissive } else { ParseMode::Strict };

    let failed = match action {
        Action::Raw { command, data } => send_raw(&mut targets, command, data).await?,
        Action::Script { sleep, retry_command, retry_command_sleep, retry_script, retry_script_sleep, ignore_nak, file } => {
            let contents = std::fs::read_to_string(file).with_context(|| format!("Reading {file}"))?;
            let script = args::parse_script(file, &contents)?;
            let options = ScriptOptions {
                sleep: *sleep,
                retry_command: *retry_command,
                retry_command_sleep: *retry_command_sleep,
                retry_script: *retry_script,
                retry_script_sleep: *retry_script_sleep,
                ignore_nak: *ignore_nak,
                parse_mode
            };
            let on_step = |label: &str, step: &Step, result: &Result<Vec<Value>, Error>| {
                debug!(target = label, "{step}");
                if let Step::Command { .. } = step {
                    print_result(label, result);
                }
            };
            let reports = executor::run_all(&mut targets, &script, &options, &on_step).await;
            script_failures(&reports)
        }
        Action::Call(words) => {
            let Some((name, texts)) = words.split_first() else {
                bail!("Missing command");
            };
            let command = commands::find(name).with_context(|| format!("Unknown command: {name}, see --list"))?;
            let script = Script::single(command, args::parse_args(command, texts)?);
            let options = ScriptOptions { parse_mode, ..Default::default() };
            let reports = executor::run_all(&mut targets, &script, &options, &|label, _, result| {
                print_result(label, result)
            })
            .await;
            reports.iter().filter(|report| !report.is_ok()).count()
        }
    };

    if failed == 0 {
        return Ok(ExitCode::SUCCESS);
    }
    if targets.len() > 1 {
        println!("Failed targets: {failed}");
    }
    Ok(ExitCode::FAILURE)
}
