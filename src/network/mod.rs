//! Network layer: interface model and provisioning
//!
//! The stack process creates the TUN interface; this module waits for it to
//! appear, assigns the configured address, and brings the link up.

pub mod interface;
pub mod provision;

pub use interface::InterfaceConfig;
pub use provision::{wait_for_interface, IpCommand, NetConfigurer};
