use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stacksup")]
#[command(version, about = "Supervise a user-space TCP/IP stack on a TUN device", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Build the stack crate, launch it, configure tun0
    stacksup --manifest-dir ~/src/netstack --bin-name netstack

    # Launch a prebuilt binary with a custom address
    stacksup --stack-binary ./netstack --cidr 10.0.0.1/24

    # Load settings from a config file, override the readiness timeout
    stacksup --config supervisor.json --ready-timeout 10

    # Check system readiness
    stacksup check
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to a prebuilt stack binary (skips the build phase)
    #[arg(short = 'b', long, value_name = "PATH", global = true)]
    pub stack_binary: Option<PathBuf>,

    /// Directory of the stack crate to build with cargo
    #[arg(short, long, value_name = "DIR", global = true)]
    pub manifest_dir: Option<PathBuf>,

    /// Binary name produced by the stack crate
    #[arg(long, value_name = "NAME", default_value = "netstack", global = true)]
    pub bin_name: String,

    /// Interface name the stack creates
    #[arg(short, long, value_name = "NAME", global = true)]
    pub iface: Option<String>,

    /// Address to assign, in addr/prefix notation
    #[arg(short, long, value_name = "CIDR", global = true)]
    pub cidr: Option<String>,

    /// Seconds to wait for the interface to appear
    #[arg(short = 't', long, value_name = "SECONDS", global = true)]
    pub ready_timeout: Option<u64>,

    /// Seconds between SIGTERM and SIGKILL on shutdown
    #[arg(short = 'g', long, value_name = "SECONDS", global = true)]
    pub term_grace: Option<u64>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, launch, and supervise the stack process (default)
    Run,

    /// Check system readiness for supervising the stack
    Check,
}
