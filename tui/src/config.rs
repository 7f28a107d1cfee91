use anyhow::{bail, Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Keymap {
    pub quit: String,
    pub submit: String,
    pub open_menu: String,
    pub add_main_branch: String,
    pub open_editor: String,
    pub close_editor: String,
    pub toggle_expand: String,
    pub edit: String,
    pub reload: String,
    pub focus_next: String,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            quit: "q".to_string(),
            submit: "ctrl-s".to_string(),
            open_menu: "m".to_string(),
            add_main_branch: "a".to_string(),
            open_editor: "e".to_string(),
            close_editor: "c".to_string(),
            toggle_expand: "space".to_string(),
            edit: "enter".to_string(),
            reload: "r".to_string(),
            focus_next: "tab".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    /// Owner the branch store is scoped to
    pub user: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("branchdoc.db"),
            user: "local".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Logging is off when unset; the terminal belongs to the UI
    pub file: Option<PathBuf>,
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            filter: "info".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub log: LogConfig,
    pub keymap: Keymap,
}

/// Read the config at `path`, writing the defaults there first if it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let toml = toml::to_string(&config).context("serializing default config")?;
        fs::write(path, toml).with_context(|| format!("writing default config to {}", path.display()))?;
        return Ok(config);
    }

    let content = fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
}

/// A single key chord such as `ctrl-s` or `enter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim().to_lowercase();
        let mut modifiers = KeyModifiers::NONE;
        let mut parts: Vec<&str> = spec.split('-').collect();
        // a trailing "-" means the minus key itself
        let key = if spec.ends_with("--") || spec == "-" {
            parts.truncate(parts.len().saturating_sub(2));
            "-"
        } else {
            parts.pop().unwrap_or_default()
        };

        for modifier in parts {
            modifiers |= match modifier {
                "ctrl" | "control" => KeyModifiers::CONTROL,
                "alt" => KeyModifiers::ALT,
                "shift" => KeyModifiers::SHIFT,
                other => bail!("unknown modifier {:?} in key binding {:?}", other, spec),
            };
        }

        let code = match key {
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "space" => KeyCode::Char(' '),
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "insert" | "ins" => KeyCode::Insert,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" => KeyCode::PageUp,
            "pagedown" => KeyCode::PageDown,
            f if f.len() > 1 && f.starts_with('f') => {
                let n: u8 = f[1..]
                    .parse()
                    .with_context(|| format!("invalid function key in key binding {:?}", spec))?;
                KeyCode::F(n)
            }
            c if c.chars().count() == 1 => KeyCode::Char(c.chars().next().unwrap_or(' ')),
            _ => bail!("unknown key in key binding {:?}", spec),
        };

        Ok(Self { code, modifiers })
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        // Shift is already folded into the character for printable keys
        let relevant = if matches!(key.code, KeyCode::Char(_)) {
            key.modifiers.difference(KeyModifiers::SHIFT)
        } else {
            key.modifiers
        };
        let code = match key.code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        code == self.code && relevant == self.modifiers
    }
}

/// The keymap with every entry parsed
#[derive(Debug, Clone)]
pub struct Bindings {
    pub quit: KeyBinding,
    pub submit: KeyBinding,
    pub open_menu: KeyBinding,
    pub add_main_branch: KeyBinding,
    pub open_editor: KeyBinding,
    pub close_editor: KeyBinding,
    pub toggle_expand: KeyBinding,
    pub edit: KeyBinding,
    pub reload: KeyBinding,
    pub focus_next: KeyBinding,
}

impl Bindings {
    pub fn from_keymap(keymap: &Keymap) -> Result<Self> {
        Ok(Self {
            quit: KeyBinding::parse(&keymap.quit)?,
            submit: KeyBinding::parse(&keymap.submit)?,
            open_menu: KeyBinding::parse(&keymap.open_menu)?,
            add_main_branch: KeyBinding::parse(&keymap.add_main_branch)?,
            open_editor: KeyBinding::parse(&keymap.open_editor)?,
            close_editor: KeyBinding::parse(&keymap.close_editor)?,
            toggle_expand: KeyBinding::parse(&keymap.toggle_expand)?,
            edit: KeyBinding::parse(&keymap.edit)?,
            reload: KeyBinding::parse(&keymap.reload)?,
            focus_next: KeyBinding::parse(&keymap.focus_next)?,
        })
    }
}
