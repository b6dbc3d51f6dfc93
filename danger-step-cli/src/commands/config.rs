//! Config command - show the effective toolchain configuration

use std::path::Path;

use danger_step_core::Config;

/// Print the toolchain configuration the run command would use
pub fn show_config(config: &Config, source: Option<&Path>) {
    println!("Danger Step Configuration");
    println!("=========================");
    println!();
    println!("Tools:");
    println!("  review_tool: {}", config.tools.review_tool);
    println!("  package_manager: {}", config.tools.package_manager);
    println!("  package_manager_gem: {}", config.tools.package_manager_gem);
    println!("  gem_command: {}", config.tools.gem_command);
    println!("  lock_file: {}", config.lock_file_path().display());
    println!();
    println!("Execution:");
    println!("  workdir: {}", config.workdir().display());
    match config.exec.timeout {
        Some(timeout) => println!("  timeout: {}s", timeout.as_secs()),
        None => println!("  timeout: (none)"),
    }
    println!();
    match source {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none - using defaults)"),
    }
}
