//! Supervisor CLI - build, launch, and babysit the user-space network stack

mod cli;
mod commands;
mod logging;

use clap::Parser;
use cli::{Cli, Commands};
use commands::check_requirements;
use console::style;
use log::{debug, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use stacksup::{SupervisorBuilder, SupervisorConfig};

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    if let Some(Commands::Check) = cli.command {
        check_requirements();
        return;
    }

    if let Err(e) = run_supervisor(cli) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_supervisor(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            SupervisorConfig::from_json_file(path)?
        }
        None => SupervisorConfig::default(),
    };

    if let Some(iface) = &cli.iface {
        debug!("Overriding interface name: {}", iface);
        config.interface.name = iface.clone();
    }

    if let Some(t) = cli.ready_timeout {
        debug!("Overriding ready timeout: {}s", t);
        config.ready_timeout_ms = t * 1000;
    }

    if let Some(g) = cli.term_grace {
        debug!("Overriding termination grace: {}s", g);
        config.term_grace_ms = g * 1000;
    }

    let mut builder = SupervisorBuilder::new().config(config);

    if let Some(cidr) = &cli.cidr {
        debug!("Overriding interface address: {}", cidr);
        builder = builder.cidr(cidr)?;
    }

    builder = match (&cli.stack_binary, &cli.manifest_dir) {
        (Some(binary), _) => {
            debug!("Using prebuilt stack binary {}", binary.display());
            builder.prebuilt(binary)
        }
        (None, Some(dir)) => builder.cargo_build(dir, &cli.bin_name),
        // Original deployment: run from the stack crate's own directory
        (None, None) => builder.cargo_build(".", &cli.bin_name),
    };

    let mut supervisor = builder.build()?;

    let shutdown = supervisor.shutdown_handle();
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, shutdown.clone())?;
    }

    info!(
        "Supervising stack on {} ({})",
        supervisor.config().interface.name,
        supervisor.config().interface.cidr()
    );

    let exit = supervisor.run()?;

    let code = exit.status_code();
    let code_styled = if code == 0 {
        style(code).green().bold()
    } else {
        style(code).red().bold()
    };
    println!(
        "{}={} | {}={:?} | {}={:?}",
        style("exit_code").dim(),
        code_styled,
        style("exited").dim(),
        exit.code,
        style("signal").dim(),
        exit.signal,
    );

    std::process::exit(code)
}
