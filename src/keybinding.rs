//! Configurable keybindings for the diff viewer
//!
//! Bindings are written as single keys (`"j"`, `"R"`), modifier keys
//! (`"Ctrl-d"`), or two-key sequences (`["]", "c"]`).

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use smallvec::SmallVec;
use std::fmt;
use std::time::{Duration, Instant};

/// Timeout for key sequences (500ms)
pub const SEQUENCE_TIMEOUT: Duration = Duration::from_millis(500);

/// Named special keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Tab,
    BackTab,
    Esc,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
}

impl NamedKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "enter" | "return" | "cr" => Some(Self::Enter),
            "tab" => Some(Self::Tab),
            "backtab" | "shifttab" => Some(Self::BackTab),
            "esc" | "escape" => Some(Self::Esc),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "pageup" | "pgup" => Some(Self::PageUp),
            "pagedown" | "pgdn" => Some(Self::PageDown),
            _ => None,
        }
    }

    fn from_keycode(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Enter => Some(Self::Enter),
            KeyCode::Tab => Some(Self::Tab),
            KeyCode::BackTab => Some(Self::BackTab),
            KeyCode::Esc => Some(Self::Esc),
            KeyCode::Up => Some(Self::Up),
            KeyCode::Down => Some(Self::Down),
            KeyCode::Left => Some(Self::Left),
            KeyCode::Right => Some(Self::Right),
            KeyCode::PageUp => Some(Self::PageUp),
            KeyCode::PageDown => Some(Self::PageDown),
            _ => None,
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Tab => "Tab",
            Self::BackTab => "Shift-Tab",
            Self::Esc => "Esc",
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::PageUp => "PageUp",
            Self::PageDown => "PageDown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCodeConfig {
    Char(char),
    Named(NamedKey),
}

/// Single key plus modifiers. Uppercase letters are stored lowercase with
/// `shift` set, so `"G"` and `"Shift-g"` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCodeConfig,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyBinding {
    pub fn char(c: char) -> Self {
        Self {
            code: KeyCodeConfig::Char(c.to_ascii_lowercase()),
            ctrl: false,
            shift: c.is_ascii_uppercase(),
            alt: false,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            ctrl: true,
            ..Self::char(c)
        }
    }

    pub fn named(key: NamedKey) -> Self {
        Self {
            code: KeyCodeConfig::Named(key),
            ctrl: false,
            shift: false,
            alt: false,
        }
    }

    /// Normalise a terminal event for comparison
    pub fn from_event(event: &KeyEvent) -> Option<Self> {
        let (code, upper) = match event.code {
            KeyCode::Char(c) => (
                KeyCodeConfig::Char(c.to_ascii_lowercase()),
                c.is_ascii_uppercase(),
            ),
            other => (KeyCodeConfig::Named(NamedKey::from_keycode(other)?), false),
        };
        // Shift on a symbol (e.g. `[` → `{`) is already in the char itself
        let shift_from_mods = matches!(code, KeyCodeConfig::Char(c) if c.is_ascii_alphabetic())
            && event.modifiers.contains(KeyModifiers::SHIFT);
        Some(Self {
            code,
            ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
            shift: upper || shift_from_mods,
            alt: event.modifiers.contains(KeyModifiers::ALT),
        })
    }

    pub fn display(&self) -> String {
        let key = match self.code {
            KeyCodeConfig::Char(c) if self.shift => c.to_ascii_uppercase().to_string(),
            KeyCodeConfig::Char(c) => c.to_string(),
            KeyCodeConfig::Named(n) => n.display_name().to_string(),
        };
        let mut parts: Vec<&str> = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.alt {
            parts.push("Alt");
        }
        if parts.is_empty() {
            key
        } else {
            format!("{}-{}", parts.join("-"), key)
        }
    }
}

/// Parse a key string like "j", "G", "Enter", or "Ctrl-d"
fn parse_key_string(s: &str) -> Result<KeyBinding, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("key string cannot be empty".to_string());
    }

    let mut ctrl = false;
    let mut alt = false;
    let mut shift = false;
    let mut rest = s;
    loop {
        if let Some(r) = rest.strip_prefix("Ctrl-").or(rest.strip_prefix("C-")) {
            ctrl = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix("Alt-").or(rest.strip_prefix("A-")) {
            alt = true;
            rest = r;
        } else if let Some(r) = rest.strip_prefix("Shift-").or(rest.strip_prefix("S-")) {
            shift = true;
            rest = r;
        } else {
            break;
        }
    }

    let mut chars = rest.chars();
    let binding = match (chars.next(), chars.next()) {
        (Some(c), None) => KeyBinding {
            ctrl,
            alt,
            shift: shift || c.is_ascii_uppercase(),
            ..KeyBinding::char(c)
        },
        _ => {
            let named = NamedKey::parse(rest).ok_or_else(|| format!("unknown key: {}", rest))?;
            KeyBinding {
                ctrl,
                alt,
                shift,
                ..KeyBinding::named(named)
            }
        }
    };
    Ok(binding)
}

/// One or two keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeySequence(pub Vec<KeyBinding>);

impl KeySequence {
    pub fn single(key: KeyBinding) -> Self {
        Self(vec![key])
    }

    pub fn double(first: KeyBinding, second: KeyBinding) -> Self {
        Self(vec![first, second])
    }

    pub fn display(&self) -> String {
        self.0.iter().map(|k| k.display()).collect()
    }
}

impl<'de> Deserialize<'de> for KeyBinding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(KeyBindingVisitor)
    }
}

struct KeyBindingVisitor;

impl<'de> Visitor<'de> for KeyBindingVisitor {
    type Value = KeyBinding;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string like \"j\" or an object like { key = \"d\", ctrl = true }")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse_key_string(v).map_err(de::Error::custom)
    }

    fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut key: Option<String> = None;
        let (mut ctrl, mut shift, mut alt) = (false, false, false);

        while let Some(k) = map.next_key::<String>()? {
            match k.as_str() {
                "key" => key = Some(map.next_value()?),
                "ctrl" => ctrl = map.next_value()?,
                "shift" => shift = map.next_value()?,
                "alt" => alt = map.next_value()?,
                other => return Err(de::Error::unknown_field(other, &["key", "ctrl", "shift", "alt"])),
            }
        }

        let key = key.ok_or_else(|| de::Error::missing_field("key"))?;
        let base = parse_key_string(&key).map_err(de::Error::custom)?;
        Ok(KeyBinding {
            ctrl: ctrl || base.ctrl,
            shift: shift || base.shift,
            alt: alt || base.alt,
            ..base
        })
    }
}

impl<'de> Deserialize<'de> for KeySequence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(KeySequenceVisitor)
    }
}

struct KeySequenceVisitor;

impl<'de> Visitor<'de> for KeySequenceVisitor {
    type Value = KeySequence;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a key string, a key object, or an array of two keys")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        KeyBindingVisitor.visit_str(v).map(KeySequence::single)
    }

    fn visit_map<M>(self, map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        KeyBindingVisitor.visit_map(map).map(KeySequence::single)
    }

    fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
    where
        S: SeqAccess<'de>,
    {
        let mut keys = Vec::new();
        while let Some(key) = seq.next_element::<KeyBinding>()? {
            keys.push(key);
        }
        match keys.len() {
            0 => Err(de::Error::custom("key sequence cannot be empty")),
            1 | 2 => Ok(KeySequence(keys)),
            _ => Err(de::Error::custom(
                "key sequences longer than 2 keys are not supported",
            )),
        }
    }
}

/// Commands of the diff viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    SwitchPane,
    NextFile,
    PrevFile,
    Visual,
    Comment,
    Suggest,
    Menu,
    Refresh,
    NextComment,
    PrevComment,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Keybindings {
    pub quit: KeySequence,
    pub down: KeySequence,
    pub up: KeySequence,
    pub page_down: KeySequence,
    pub page_up: KeySequence,
    pub top: KeySequence,
    pub bottom: KeySequence,
    pub switch_pane: KeySequence,
    pub next_file: KeySequence,
    pub prev_file: KeySequence,
    pub visual: KeySequence,
    pub comment: KeySequence,
    pub suggest: KeySequence,
    pub menu: KeySequence,
    pub refresh: KeySequence,
    pub next_comment: KeySequence,
    pub prev_comment: KeySequence,
}

impl Default for Keybindings {
    fn default() -> Self {
        let key = |c| KeySequence::single(KeyBinding::char(c));
        let pair = |a, b| KeySequence::double(KeyBinding::char(a), KeyBinding::char(b));
        Self {
            quit: key('q'),
            down: key('j'),
            up: key('k'),
            page_down: KeySequence::single(KeyBinding::ctrl('d')),
            page_up: KeySequence::single(KeyBinding::ctrl('u')),
            top: pair('g', 'g'),
            bottom: key('G'),
            switch_pane: KeySequence::single(KeyBinding::named(NamedKey::Tab)),
            next_file: pair(']', 'f'),
            prev_file: pair('[', 'f'),
            visual: key('v'),
            comment: key('c'),
            suggest: key('s'),
            menu: key('m'),
            refresh: key('R'),
            next_comment: pair(']', 'c'),
            prev_comment: pair('[', 'c'),
        }
    }
}

impl Keybindings {
    pub fn entries(&self) -> [(Action, &KeySequence); 17] {
        [
            (Action::Quit, &self.quit),
            (Action::Down, &self.down),
            (Action::Up, &self.up),
            (Action::PageDown, &self.page_down),
            (Action::PageUp, &self.page_up),
            (Action::Top, &self.top),
            (Action::Bottom, &self.bottom),
            (Action::SwitchPane, &self.switch_pane),
            (Action::NextFile, &self.next_file),
            (Action::PrevFile, &self.prev_file),
            (Action::Visual, &self.visual),
            (Action::Comment, &self.comment),
            (Action::Suggest, &self.suggest),
            (Action::Menu, &self.menu),
            (Action::Refresh, &self.refresh),
            (Action::NextComment, &self.next_comment),
            (Action::PrevComment, &self.prev_comment),
        ]
    }
}

/// Outcome of feeding one key into the sequence state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResult {
    Action(Action),
    /// Prefix of a longer binding; waiting for the next key
    Pending,
    Unbound,
}

#[derive(Debug, Clone, Default)]
pub struct SequenceState {
    pending: SmallVec<[KeyBinding; 2]>,
    pending_since: Option<Instant>,
}

impl SequenceState {
    pub fn clear(&mut self) {
        self.pending.clear();
        self.pending_since = None;
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop a half-typed sequence after the timeout
    pub fn check_timeout(&mut self) {
        if self
            .pending_since
            .is_some_and(|since| since.elapsed() > SEQUENCE_TIMEOUT)
        {
            self.clear();
        }
    }

    fn lookup(&self, bindings: &Keybindings) -> KeyResult {
        let mut partial = false;
        for (action, sequence) in bindings.entries() {
            if !sequence.0.starts_with(&self.pending) {
                continue;
            }
            if sequence.0.len() == self.pending.len() {
                return KeyResult::Action(action);
            }
            partial = true;
        }
        if partial {
            KeyResult::Pending
        } else {
            KeyResult::Unbound
        }
    }

    /// Feed a key. A key that breaks a pending sequence is retried on its own.
    pub fn feed(&mut self, key: KeyBinding, bindings: &Keybindings) -> KeyResult {
        self.check_timeout();
        let had_pending = self.is_pending();
        if !had_pending {
            self.pending_since = Some(Instant::now());
        }
        self.pending.push(key);

        match self.lookup(bindings) {
            KeyResult::Pending => KeyResult::Pending,
            KeyResult::Action(action) => {
                self.clear();
                KeyResult::Action(action)
            }
            KeyResult::Unbound => {
                self.clear();
                if had_pending {
                    self.feed(key, bindings)
                } else {
                    KeyResult::Unbound
                }
            }
        }
    }
}
