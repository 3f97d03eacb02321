use log::info;
use stacksup::utils::{self, SystemReadiness};

pub fn check_requirements() {
    info!("Checking supervisor requirements");
    println!("Checking supervisor requirements...\n");

    let readiness = SystemReadiness::detect();
    println!("{}", readiness.summary());

    println!();
    if readiness.can_provision() {
        println!("Interface provisioning is available");
    } else {
        println!("Interface provisioning is NOT available");
        println!("Run as root, or grant CAP_NET_ADMIN and install iproute2");
    }

    println!("\nSystem info:");
    println!("  UID: {}", utils::get_euid());
    println!("  GID: {}", utils::get_egid());
}
