use std::path::Path;

use anyhow::{Result, bail};

use crate::registry::Registry;

pub fn run(name: &str, home_dir: Option<&Path>) -> Result<()> {
    let reg = Registry::load(home_dir)?;

    let entry = match reg.daemons.get(name) {
        Some(e) => e,
        None => bail!("No daemon '{}' in registry. Run `greenfloor ps` to see registered daemons.", name),
    };

    if !Registry::is_pid_alive(entry.pid) {
        println!("Daemon '{}' (PID {}) is already dead. Cleaning up registry.", name, entry.pid);
        Registry::deregister(home_dir, name)?;
        return Ok(());
    }

    println!("Stopping '{}' (PID {})...", name, entry.pid);
    unsafe {
        libc::kill(entry.pid as i32, libc::SIGTERM);
    }

    for _ in 0..20 {
        std::thread::sleep(std::time::Duration::from_millis(500));
        if !Registry::is_pid_alive(entry.pid) {
            println!("Daemon '{}' stopped. Deregistering.", name);
            Registry::deregister(home_dir, name)?;
            return Ok(());
        }
    }

    println!("Process didn't exit cleanly, sending SIGKILL...");
    unsafe {
        libc::kill(entry.pid as i32, libc::SIGKILL);
    }
    std::thread::sleep(std::time::Duration::from_millis(500));
    Registry::deregister(home_dir, name)?;
    println!("Daemon '{}' killed and deregistered.", name);

    Ok(())
}
