//! Headless runner: builds a machine from a TOML description and runs it on
//! the reference Z80-subset engine.

use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

use log::{debug, info};
#[cfg(test)]
use tempfile as _;
use zemu_core::{Device, Instance, RunState, Z80Core};

const USAGE_TEXT: &str = "\
Usage: zemu-run <machine.toml> [options]

Options:
  -c, --max-cycles <n>  Stop once at least n cycles have run (default: until halt)
  -i, --input <text>    Text pushed into the serial port before running
  -s, --serial <name>   Serial port to feed and drain (default: first declared)
  -b, --break <addr>    Stop when execution reaches addr (decimal or 0x hex); repeatable
  -h, --help            Show this help message

Serial output is written to stdout; the final run state goes to stderr.
Set RUST_LOG=debug for device traffic.

Examples:
  zemu-run machine.toml
  zemu-run machine.toml --input 'Hello' --max-cycles 100000
  zemu-run machine.toml -b 0x0100 -b 0x0200
";

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    machine: PathBuf,
    max_cycles: Option<u64>,
    input: Option<String>,
    serial: Option<String>,
    breakpoints: Vec<u16>,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut machine: Option<PathBuf> = None;
    let mut max_cycles = None;
    let mut input = None;
    let mut serial = None;
    let mut breakpoints = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Ok(ParseResult::Help);
        }

        if arg == "--max-cycles" || arg == "-c" {
            let value = option_value(&mut args, "--max-cycles")?;
            max_cycles = Some(parse_cycles(&value)?);
            continue;
        }

        if arg == "--input" || arg == "-i" {
            input = Some(option_value(&mut args, "--input")?);
            continue;
        }

        if arg == "--serial" || arg == "-s" {
            serial = Some(option_value(&mut args, "--serial")?);
            continue;
        }

        if arg == "--break" || arg == "-b" {
            let value = option_value(&mut args, "--break")?;
            breakpoints.push(parse_address(&value)?);
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if machine.is_some() {
            return Err("multiple machine descriptions provided".to_string());
        }
        machine = Some(PathBuf::from(arg));
    }

    let machine = machine.ok_or_else(|| "missing machine description".to_string())?;
    Ok(ParseResult::Run(RunArgs {
        machine,
        max_cycles,
        input,
        serial,
        breakpoints,
    }))
}

fn option_value(args: &mut impl Iterator<Item = OsString>, option: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().into_owned())
        .ok_or_else(|| format!("missing value for {option}"))
}

fn parse_cycles(text: &str) -> Result<u64, String> {
    text.parse()
        .map_err(|_| format!("invalid cycle count: {text}"))
}

fn parse_address(text: &str) -> Result<u16, String> {
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid address: {text}"))
}

fn first_serial_port(instance: &Instance) -> Option<String> {
    instance
        .bus()
        .devices()
        .iter()
        .find_map(|device| device.as_serial_port().map(|port| port.name().to_string()))
}

fn run(args: RunArgs) -> Result<(), i32> {
    let mut instance = match Instance::from_file(&args.machine, Box::new(Z80Core::new())) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("error: {}: {e}", args.machine.display());
            return Err(1);
        }
    };
    info!("loaded {}", args.machine.display());

    for addr in &args.breakpoints {
        instance.set_breakpoint(*addr);
    }

    let serial = args.serial.or_else(|| first_serial_port(&instance));
    if let Some(name) = &serial {
        if instance.serial_port(name).is_none() {
            eprintln!("error: no serial port named `{name}`");
            return Err(1);
        }
    }

    if let Some(text) = &args.input {
        let Some(port) = serial.as_deref().and_then(|name| instance.serial_port(name)) else {
            eprintln!("error: --input needs a serial port in the machine description");
            return Err(1);
        };
        debug!("queued {} input bytes", text.len());
        port.puts(text.as_bytes());
    }

    let executed = instance.continue_execution(args.max_cycles);

    if let Some(port) = serial.as_deref().and_then(|name| instance.serial_port(name)) {
        let output = port.gets(None);
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(&output).and_then(|()| stdout.flush()) {
            eprintln!("error: failed to write serial output: {e}");
            return Err(1);
        }
    }

    let state = match instance.run_state() {
        RunState::Halted => "halted",
        RunState::Break => "break",
        RunState::Running | RunState::Undefined => "budget exhausted",
    };
    eprintln!(
        "{state} after {executed} cycles at pc {:#06X}",
        instance.program_counter()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => match run(args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(items: &[&str]) -> impl Iterator<Item = OsString> {
        items
            .iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_full_command_line() {
        let result = parse_args(args(&[
            "machine.toml",
            "--max-cycles",
            "5000",
            "-i",
            "Hello",
            "--serial",
            "tty",
            "-b",
            "0x0100",
            "--break",
            "42",
        ]))
        .expect("valid args should parse");

        let ParseResult::Run(run_args) = result else {
            panic!("expected run arguments");
        };
        assert_eq!(
            run_args,
            RunArgs {
                machine: PathBuf::from("machine.toml"),
                max_cycles: Some(5000),
                input: Some("Hello".to_string()),
                serial: Some("tty".to_string()),
                breakpoints: vec![0x0100, 42],
            }
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_missing_machine() {
        let error = parse_args(args(&["-c", "10"])).expect_err("missing path should fail");
        assert!(error.contains("missing machine"));
    }

    #[test]
    fn rejects_unknown_option() {
        let error = parse_args(args(&["m.toml", "--turbo"])).expect_err("unknown option");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn rejects_option_without_value() {
        let error = parse_args(args(&["m.toml", "--break"])).expect_err("missing value");
        assert!(error.contains("missing value for --break"));
    }

    #[test]
    fn rejects_second_machine() {
        let error = parse_args(args(&["a.toml", "b.toml"])).expect_err("two machines");
        assert!(error.contains("multiple"));
    }

    #[test]
    fn parses_addresses() {
        assert_eq!(parse_address("0x1F"), Ok(0x1F));
        assert_eq!(parse_address("0XFFFF"), Ok(0xFFFF));
        assert_eq!(parse_address("256"), Ok(256));
        assert!(parse_address("0x10000").is_err());
        assert!(parse_address("label").is_err());
    }

    #[test]
    fn parses_cycle_counts() {
        assert_eq!(parse_cycles("0"), Ok(0));
        assert!(parse_cycles("-1").is_err());
    }
}
