use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Result, bail};

use crate::registry::Registry;

pub fn run(name: &str, lines: usize, follow: bool, home_dir: Option<&Path>) -> Result<()> {
    let reg = Registry::load(home_dir)?;

    let entry = match reg.daemons.get(name) {
        Some(e) => e,
        None => bail!("No daemon '{}' in registry. Run `greenfloor ps` to see registered daemons.", name),
    };

    let log_path = &entry.log_file;
    if !log_path.exists() {
        bail!("Log file not found: {}", log_path.display());
    }

    print_tail(log_path, lines)?;
    if follow {
        follow_file(log_path)?;
    }

    Ok(())
}

fn print_tail(path: &Path, n: usize) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let all_lines: Vec<&str> = content.lines().collect();
    let start = all_lines.len().saturating_sub(n);
    for line in &all_lines[start..] {
        println!("{}", line);
    }
    Ok(())
}

fn follow_file(path: &Path) -> Result<()> {
    use std::io::Seek;

    let mut file = std::fs::File::open(path)?;
    file.seek(std::io::SeekFrom::End(0))?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => std::thread::sleep(std::time::Duration::from_millis(200)),
            Ok(_) => print!("{}", line),
            Err(e) => {
                eprintln!("Error reading log: {}", e);
                break;
            }
        }
    }

    #[allow(unreachable_code)]
    Ok(())
}
