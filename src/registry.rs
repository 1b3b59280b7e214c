//! Process registry: tracks the daemon instance running against each config
//! file so `ps`/`stop`/`logs` can find it later. JSON-file backed, written
//! atomically (write to a `.tmp` sibling, then rename) so a crash mid-write
//! never leaves a half-written registry behind.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub pid: u32,
    pub config_path: String,
    pub network: String,
    pub started_at: String,
    pub log_file: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub daemons: HashMap<String, RegistryEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Running,
    Crashed,
}

pub struct DaemonInfo {
    pub name: String,
    pub entry: RegistryEntry,
    pub status: DaemonStatus,
}

impl Registry {
    fn path(home_dir: Option<&Path>) -> PathBuf {
        let home = home_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".greenfloor"));
        home.join("run").join("registry.json")
    }

    pub fn load(home_dir: Option<&Path>) -> Result<Self> {
        let path = Self::path(home_dir);
        if !path.exists() {
            return Ok(Registry::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading registry at {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing registry at {}", path.display()))
    }

    fn save(&self, home_dir: Option<&Path>) -> Result<()> {
        let path = Self::path(home_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, payload)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn register(home_dir: Option<&Path>, name: &str, entry: RegistryEntry) -> Result<()> {
        let mut registry = Self::load(home_dir)?;
        registry.daemons.insert(name.to_string(), entry);
        registry.save(home_dir)
    }

    pub fn deregister(home_dir: Option<&Path>, name: &str) -> Result<()> {
        let mut registry = Self::load(home_dir)?;
        registry.daemons.remove(name);
        registry.save(home_dir)
    }

    pub fn is_pid_alive(pid: u32) -> bool {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    pub fn status_all(home_dir: Option<&Path>) -> Result<Vec<DaemonInfo>> {
        let registry = Self::load(home_dir)?;
        let mut infos: Vec<DaemonInfo> = registry
            .daemons
            .into_iter()
            .map(|(name, entry)| {
                let status = if Self::is_pid_alive(entry.pid) {
                    DaemonStatus::Running
                } else {
                    DaemonStatus::Crashed
                };
                DaemonInfo { name, entry, status }
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    pub fn find(home_dir: Option<&Path>, name: &str) -> Result<RegistryEntry> {
        let registry = Self::load(home_dir)?;
        registry
            .daemons
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no daemon named '{name}' in registry"))
    }
}

pub fn name_from_config_path(config_path: &Path) -> Result<String> {
    config_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("cannot derive a daemon name from {}", config_path.display()))
}

pub fn ensure_pid_alive_or_cleanup(home_dir: Option<&Path>, name: &str) -> Result<Option<RegistryEntry>> {
    let entry = Registry::find(home_dir, name);
    let entry = match entry {
        Ok(e) => e,
        Err(_) => bail!("no daemon named '{name}' in registry"),
    };
    if Registry::is_pid_alive(entry.pid) {
        Ok(Some(entry))
    } else {
        Registry::deregister(home_dir, name)?;
        Ok(None)
    }
}
