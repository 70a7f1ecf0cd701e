use std::collections::HashMap;
use std::str::FromStr;
use winit::keyboard::{Key, NamedKey};

use crate::command::{Command, Direction, ParseCommandError};

/// A key as written in a binding: a named key or a single character.
/// `shift-x` is spelled as the upper-case character.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySpec {
    Named(NamedKey),
    Char(char),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseKeyError {
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("binding must look like KEY=COMMAND (got '{0}')")]
    MissingSeparator(String),
    #[error(transparent)]
    Command(#[from] ParseCommandError),
}

const NAMED_KEYS: &[(&str, NamedKey)] = &[
    ("left", NamedKey::ArrowLeft),
    ("right", NamedKey::ArrowRight),
    ("up", NamedKey::ArrowUp),
    ("down", NamedKey::ArrowDown),
    ("space", NamedKey::Space),
    ("escape", NamedKey::Escape),
    ("esc", NamedKey::Escape),
    ("enter", NamedKey::Enter),
    ("return", NamedKey::Enter),
    ("tab", NamedKey::Tab),
    ("home", NamedKey::Home),
    ("end", NamedKey::End),
    ("pageup", NamedKey::PageUp),
    ("pagedown", NamedKey::PageDown),
    ("backspace", NamedKey::Backspace),
    ("delete", NamedKey::Delete),
];

impl KeySpec {
    /// The binding key for a winit logical key, if it is one we can bind.
    pub fn from_key(key: &Key) -> Option<KeySpec> {
        match key {
            Key::Named(named) => Some(KeySpec::Named(*named)),
            Key::Character(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(' '), None) => Some(KeySpec::Named(NamedKey::Space)),
                    (Some(c), None) => Some(KeySpec::Char(c)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl FromStr for KeySpec {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_lowercase();
        if let Some(&(_, named)) = NAMED_KEYS.iter().find(|(name, _)| *name == lower) {
            return Ok(KeySpec::Named(named));
        }

        let (shift, rest) = match s.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("shift-") => (true, &s[6..]),
            _ => (false, s),
        };
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if shift => Ok(KeySpec::Char(c.to_ascii_uppercase())),
            (Some(c), None) => Ok(KeySpec::Char(c)),
            _ => Err(ParseKeyError::UnknownKey(s.to_string())),
        }
    }
}

/// Parse a `KEY=COMMAND` pair as given to `--bind`.
pub fn parse_binding(s: &str) -> Result<(KeySpec, Command), ParseKeyError> {
    let (key, cmd) = s
        .split_once('=')
        .ok_or_else(|| ParseKeyError::MissingSeparator(s.to_string()))?;
    Ok((key.parse()?, cmd.parse()?))
}

// ---------------------------------------------------------------------------
// Binding table
// ---------------------------------------------------------------------------

pub struct Bindings {
    map: HashMap<KeySpec, Command>,
}

impl Bindings {
    /// The stock table. `R` moves the current file into `trash_dir`.
    pub fn with_defaults(trash_dir: &str) -> Self {
        use KeySpec::{Char, Named};

        let trash = format!("{}/", trash_dir.trim_end_matches('/'));
        let table = [
            (Named(NamedKey::ArrowLeft), Command::Prev),
            (Named(NamedKey::ArrowRight), Command::Next),
            (Named(NamedKey::Space), Command::Next),
            (Char('H'), Command::Prev),
            (Char('L'), Command::Next),
            (Char('h'), Command::Pan(Direction::Left)),
            (Char('j'), Command::Pan(Direction::Down)),
            (Char('k'), Command::Pan(Direction::Up)),
            (Char('l'), Command::Pan(Direction::Right)),
            (Named(NamedKey::ArrowUp), Command::Pan(Direction::Up)),
            (Named(NamedKey::ArrowDown), Command::Pan(Direction::Down)),
            (Char('r'), Command::Fit),
            (
                Char('R'),
                Command::RunExternal(vec!["mv".into(), "%".into(), trash]),
            ),
            (Char('q'), Command::Quit),
            (Named(NamedKey::Escape), Command::Quit),
        ];
        Self {
            map: table.into_iter().collect(),
        }
    }

    pub fn bind(&mut self, key: KeySpec, cmd: Command) {
        if let Some(old) = self.map.insert(key.clone(), cmd) {
            log::debug!("Rebinding {:?} (was '{}')", key, old);
        }
    }

    pub fn lookup(&self, key: &Key) -> Option<&Command> {
        KeySpec::from_key(key).and_then(|spec| self.map.get(&spec))
    }
}
