//! Version command - show version information.

use anyhow::Result;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command.
pub fn run() -> Result<()> {
    println!("Kiln - content-addressed cached pipeline engine");
    println!();
    println!("Version:     {}", VERSION);
    println!(
        "Platform:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!();
    println!("Components:");
    println!("  kiln-core      Pipelines, signatures, module traits, event log");
    println!("  kiln-executor  Persistent cache and cached interpreter");
    println!("  kiln-modules   Standard modules (kiln.basic)");
    println!("  kiln-cli       Command-line interface");

    Ok(())
}
