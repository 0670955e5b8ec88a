//! Key chords and the pressed-key tracker.
//!
//! Keys arriving from the OS listener are normalized before anything else
//! looks at them: left/right modifier variants fold into one identifier and
//! letters are tracked lower-cased, independent of shift state. A chord is
//! satisfied when every member is in the pressed set, no matter what else is
//! held down.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChordParseError {
    #[error("unknown key name: {0:?}")]
    UnknownKey(String),
    #[error("chord must contain at least one key")]
    Empty,
}

/// A normalized key identifier. The OS listener reports physical keys
/// (left/right modifiers, shifted letters); these collapse into the identity
/// a chord definition cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChordKey {
    Meta,
    Shift,
    Control,
    Alt,
    Char(char),
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordKey::Meta => write!(f, "cmd"),
            ChordKey::Shift => write!(f, "shift"),
            ChordKey::Control => write!(f, "ctrl"),
            ChordKey::Alt => write!(f, "alt"),
            ChordKey::Char(c) => write!(f, "{}", c),
        }
    }
}

/// Normalize a raw listener key. Returns `None` for keys that can never be
/// part of a chord; callers ignore those additively.
pub fn normalize(key: rdev::Key) -> Option<ChordKey> {
    use rdev::Key::*;

    let key = match key {
        MetaLeft | MetaRight => ChordKey::Meta,
        ShiftLeft | ShiftRight => ChordKey::Shift,
        ControlLeft | ControlRight => ChordKey::Control,
        Alt | AltGr => ChordKey::Alt,
        KeyA => ChordKey::Char('a'),
        KeyB => ChordKey::Char('b'),
        KeyC => ChordKey::Char('c'),
        KeyD => ChordKey::Char('d'),
        KeyE => ChordKey::Char('e'),
        KeyF => ChordKey::Char('f'),
        KeyG => ChordKey::Char('g'),
        KeyH => ChordKey::Char('h'),
        KeyI => ChordKey::Char('i'),
        KeyJ => ChordKey::Char('j'),
        KeyK => ChordKey::Char('k'),
        KeyL => ChordKey::Char('l'),
        KeyM => ChordKey::Char('m'),
        KeyN => ChordKey::Char('n'),
        KeyO => ChordKey::Char('o'),
        KeyP => ChordKey::Char('p'),
        KeyQ => ChordKey::Char('q'),
        KeyR => ChordKey::Char('r'),
        KeyS => ChordKey::Char('s'),
        KeyT => ChordKey::Char('t'),
        KeyU => ChordKey::Char('u'),
        KeyV => ChordKey::Char('v'),
        KeyW => ChordKey::Char('w'),
        KeyX => ChordKey::Char('x'),
        KeyY => ChordKey::Char('y'),
        KeyZ => ChordKey::Char('z'),
        Num0 => ChordKey::Char('0'),
        Num1 => ChordKey::Char('1'),
        Num2 => ChordKey::Char('2'),
        Num3 => ChordKey::Char('3'),
        Num4 => ChordKey::Char('4'),
        Num5 => ChordKey::Char('5'),
        Num6 => ChordKey::Char('6'),
        Num7 => ChordKey::Char('7'),
        Num8 => ChordKey::Char('8'),
        Num9 => ChordKey::Char('9'),
        Space => ChordKey::Char(' '),
        _ => return None,
    };
    Some(key)
}

/// Parse a single key name from configuration.
fn parse_key(name: &str) -> Result<ChordKey, ChordParseError> {
    let lower = name.trim().to_lowercase();
    let key = match lower.as_str() {
        "cmd" | "command" | "meta" | "super" | "win" => ChordKey::Meta,
        "shift" => ChordKey::Shift,
        "ctrl" | "control" => ChordKey::Control,
        "alt" | "option" => ChordKey::Alt,
        "space" => ChordKey::Char(' '),
        s => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => ChordKey::Char(c),
                _ => return Err(ChordParseError::UnknownKey(name.to_string())),
            }
        }
    };
    Ok(key)
}

/// A fixed set of keys that must be simultaneously pressed. Non-empty and
/// immutable once parsed from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    keys: HashSet<ChordKey>,
}

impl Chord {
    pub fn new(keys: impl IntoIterator<Item = ChordKey>) -> Result<Self, ChordParseError> {
        let keys: HashSet<ChordKey> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(ChordParseError::Empty);
        }
        Ok(Self { keys })
    }

    /// Parse a chord from configured key names, e.g. `["cmd", "shift", "z"]`.
    pub fn parse(names: &[String]) -> Result<Self, ChordParseError> {
        let keys = names
            .iter()
            .map(|n| parse_key(n))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(keys)
    }

    /// Whether `key` is a member of this chord.
    pub fn contains(&self, key: ChordKey) -> bool {
        self.keys.contains(&key)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&ChordKey> = self.keys.iter().collect();
        keys.sort();
        let parts: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", parts.join("+"))
    }
}

/// The set of currently-depressed keys. Mutated only by the event context;
/// entries leave only via explicit release events.
#[derive(Debug, Default)]
pub struct KeyTracker {
    pressed: HashSet<ChordKey>,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: rdev::Key) {
        if let Some(key) = normalize(key) {
            self.pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: rdev::Key) {
        if let Some(key) = normalize(key) {
            self.pressed.remove(&key);
        }
    }

    /// True iff every member of `chord` is currently pressed. Extra pressed
    /// keys never matter.
    pub fn is_satisfied(&self, chord: &Chord) -> bool {
        chord.keys.is_subset(&self.pressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(names: &[&str]) -> Chord {
        Chord::parse(&names.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_left_right_modifiers_fold() {
        let mut tracker = KeyTracker::new();
        let c = chord(&["cmd", "shift", "z"]);

        tracker.press(rdev::Key::MetaRight);
        tracker.press(rdev::Key::ShiftRight);
        tracker.press(rdev::Key::KeyZ);
        assert!(tracker.is_satisfied(&c));

        // Releasing the left variant clears the folded identifier too.
        tracker.release(rdev::Key::MetaLeft);
        assert!(!tracker.is_satisfied(&c));
    }

    #[test]
    fn test_satisfied_regardless_of_order_and_extras() {
        let mut tracker = KeyTracker::new();
        let c = chord(&["cmd", "shift", "a"]);

        tracker.press(rdev::Key::KeyA);
        tracker.press(rdev::Key::KeyQ); // unrelated
        tracker.press(rdev::Key::ShiftLeft);
        assert!(!tracker.is_satisfied(&c));
        tracker.press(rdev::Key::MetaLeft);
        assert!(tracker.is_satisfied(&c));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut tracker = KeyTracker::new();
        let c = chord(&["z"]);

        tracker.press(rdev::Key::Escape);
        tracker.press(rdev::Key::F5);
        assert!(!tracker.is_satisfied(&c));
        tracker.press(rdev::Key::KeyZ);
        assert!(tracker.is_satisfied(&c));
        // Releasing an unknown key is a no-op, not a panic.
        tracker.release(rdev::Key::Escape);
        assert!(tracker.is_satisfied(&c));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(
            chord(&["command", "shift", "z"]),
            chord(&["meta", "SHIFT", "Z"])
        );
        assert_eq!(chord(&["option", "1"]), chord(&["alt", "1"]));
    }

    #[test]
    fn test_parse_rejects_empty_and_unknown() {
        assert_eq!(Chord::parse(&[]), Err(ChordParseError::Empty));
        assert!(matches!(
            Chord::parse(&["hyper".to_string()]),
            Err(ChordParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_chord_contains_normalized_member() {
        let c = chord(&["cmd", "shift", "z"]);
        assert!(c.contains(normalize(rdev::Key::MetaRight).unwrap()));
        assert!(c.contains(normalize(rdev::Key::KeyZ).unwrap()));
        assert!(!c.contains(normalize(rdev::Key::KeyA).unwrap()));
    }

    #[test]
    fn test_display_is_stable() {
        assert_eq!(chord(&["z", "shift", "cmd"]).to_string(), "cmd+shift+z");
    }
}
