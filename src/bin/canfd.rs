// canfd/src/bin/canfd.rs
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Command line CAN FD reader and writer.
//!
//! ```text
//! $ canfd read
//! $ canfd --config my_config.yaml write
//! ```
//!
//! Both modes run until interrupted with ^C. The reader notices the
//! interrupt once its read returns, so configure a `read_timeout_ms` for a
//! prompt exit; a second ^C exits immediately.

use anyhow::{anyhow, Context, Result};
use canfd::{reader, writer, Config, Session};
use clap::{arg, ArgAction, Command};
use env_logger::Env;
use nix::sys::prctl;
use std::{
    ffi::CString,
    io,
    process,
    sync::atomic::{AtomicBool, Ordering},
};

// Make the app version the same as the package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

// The config file used when none is given on the command line.
const DEFAULT_CONFIG: &str = "config/canfd_config.yaml";

// Exit status used when a second ^C forces the exit.
const INTERRUPTED: i32 = 130;

static QUIT: AtomicBool = AtomicBool::new(false);

// --------------------------------------------------------------------------

/// Names the process as seen by `ps`, `top`, etc.
fn set_process_name(name: &str) {
    let res = CString::new(name)
        .map_err(|err| anyhow!(err))
        .and_then(|cname| prctl::set_name(&cname).map_err(|err| anyhow!(err)));

    if let Err(err) = res {
        log::warn!("Unable to set process name to {}: {}", name, err);
    }
}

/// Loads the configuration and opens the CAN FD session from it.
fn open_session(config_path: &str) -> Result<Session> {
    println!("Initializing CANFD with config file: {}", config_path);

    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let sess = Session::open(&config).with_context(|| {
        format!(
            "Failed to open CAN FD socket on interface {}",
            config.interface_name
        )
    })?;
    Ok(sess)
}

/// Process the 'read' subcommand.
fn read_cmd(config_path: &str) -> Result<()> {
    println!("Starting CAN FD Reader...");
    set_process_name("CANFD_Reader");

    let sess = open_session(config_path)?;

    let stdout = io::stdout();
    let n = reader::run(&sess, &mut stdout.lock(), &QUIT)?;

    log::info!("Received {} frames on {}", n, sess.interface());
    Ok(())
}

/// Process the 'write' subcommand.
fn write_cmd(config_path: &str) -> Result<()> {
    println!("Starting CAN FD Writer...");
    set_process_name("CANFD_Writer");

    let sess = open_session(config_path)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let n = writer::run(&sess, &mut stdin.lock(), &mut stdout.lock(), &QUIT)?;

    log::info!("Sent {} frames on {}", n, sess.interface());
    Ok(())
}

// --------------------------------------------------------------------------

fn main() {
    let opts = Command::new("canfd")
        .version(VERSION)
        .about("Read or interactively write CAN FD frames on a SocketCAN interface")
        .disable_help_flag(true)
        .arg(
            arg!(--help "Print help information")
                .short('?')
                .action(ArgAction::Help)
                .global(true),
        )
        .arg(
            arg!(-c --config <PATH> "The YAML configuration file")
                .required(false)
                .default_value(DEFAULT_CONFIG),
        )
        .subcommand(Command::new("read").about("Receive frames and print them"))
        .subcommand(Command::new("write").about("Prompt for frames and send them"))
        .get_matches();

    let env = Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();

    let config_path = opts
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG);

    let res = ctrlc::set_handler(|| {
        if QUIT.swap(true, Ordering::Relaxed) {
            process::exit(INTERRUPTED);
        }
    })
    .context("Failed to set ^C signal handler")
    .and_then(|_| match opts.subcommand_name() {
        Some("read") => read_cmd(config_path),
        Some("write") => write_cmd(config_path),
        _ => Err(anyhow!("Need to specify a subcommand (-? for help).")),
    });

    if let Err(err) = res {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
