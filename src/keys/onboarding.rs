use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ChiaKeysDiscovery {
    pub chia_keys_dir: PathBuf,
    pub keyring_yaml_path: PathBuf,
    pub has_existing_keys: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyOnboardingSelection {
    pub selected_source: String,
    pub key_id: String,
    pub network: String,
    #[serde(default)]
    pub chia_keys_dir: Option<String>,
    #[serde(default)]
    pub keyring_yaml_path: Option<String>,
    #[serde(default)]
    pub mnemonic_word_count: Option<u32>,
}

pub fn discover_chia_keys(chia_keys_dir: Option<&Path>) -> ChiaKeysDiscovery {
    let base_dir = chia_keys_dir.map(Path::to_path_buf).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chia_keys")
    });
    let keyring_yaml_path = base_dir.join("keyring.yaml");
    let has_existing_keys = keyring_yaml_path.exists();
    ChiaKeysDiscovery {
        chia_keys_dir: base_dir,
        keyring_yaml_path,
        has_existing_keys,
    }
}

/// Mirrors the source's onboarding decision tree: prefer existing keys when
/// the caller confirms it, otherwise fall back to an explicit import/generate
/// choice, prompting (returning a `prompt_*` sentinel) whenever the caller
/// hasn't decided yet.
pub fn determine_onboarding_branch(
    has_existing_keys: bool,
    use_existing_keys: Option<bool>,
    fallback_choice: Option<&str>,
) -> Result<String, String> {
    if has_existing_keys {
        match use_existing_keys {
            None => return Ok("prompt_use_existing_keys".to_string()),
            Some(true) => return Ok("use_chia_keys".to_string()),
            Some(false) => {}
        }
    }
    match fallback_choice {
        None => Ok("prompt_fallback_choice".to_string()),
        Some(choice) if choice == "import_words" || choice == "generate_new" => {
            Ok(choice.to_string())
        }
        Some(other) => Err(format!("unsupported fallback choice: {other}")),
    }
}

pub fn save_key_onboarding_selection(
    path: &Path,
    selection: &KeyOnboardingSelection,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string(selection).unwrap_or_else(|_| "{}".to_string());
    std::fs::write(path, payload)
}

pub fn load_key_onboarding_selection(path: &Path) -> Option<KeyOnboardingSelection> {
    if !path.exists() {
        return None;
    }
    let raw = std::fs::read_to_string(path).ok()?;
    let selection: KeyOnboardingSelection = serde_json::from_str(&raw).ok()?;
    if selection.selected_source.is_empty() || selection.key_id.is_empty() || selection.network.is_empty() {
        return None;
    }
    Some(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_prompts_when_undecided() {
        assert_eq!(
            determine_onboarding_branch(true, None, None).unwrap(),
            "prompt_use_existing_keys"
        );
        assert_eq!(
            determine_onboarding_branch(false, None, None).unwrap(),
            "prompt_fallback_choice"
        );
    }

    #[test]
    fn branch_uses_existing_when_confirmed() {
        assert_eq!(
            determine_onboarding_branch(true, Some(true), None).unwrap(),
            "use_chia_keys"
        );
    }

    #[test]
    fn branch_rejects_unsupported_fallback() {
        assert!(determine_onboarding_branch(false, None, Some("yolo")).is_err());
    }
}
