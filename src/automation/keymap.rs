//! US QWERTY mapping from characters and key names to HID usage codes.

use crate::packets::hid::Modifiers;

/// Looks up a modifier by name (`ctrl`, `shift`, `alt`, `cmd`, ...), ignoring case.
pub fn modifier(name: &str) -> Option<Modifiers> {
    Some(match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Modifiers::LEFT_CTRL,
        "shift" => Modifiers::LEFT_SHIFT,
        "alt" | "option" => Modifiers::LEFT_ALT,
        "gui" | "win" | "cmd" | "command" | "meta" | "super" => Modifiers::LEFT_GUI,
        _ => return None,
    })
}

/// Usage code of an unshifted character.
fn base_key(c: char) -> Option<u8> {
    Some(match c {
        'a'..='z' => 0x04 + (c as u8 - b'a'),
        '1'..='9' => 0x1E + (c as u8 - b'1'),
        '0' => 0x27,
        '\n' => 0x28,
        '\u{8}' => 0x2A,
        '\t' => 0x2B,
        ' ' => 0x2C,
        '-' => 0x2D,
        '=' => 0x2E,
        '[' => 0x2F,
        ']' => 0x30,
        '\\' => 0x31,
        ';' => 0x33,
        '\'' => 0x34,
        '`' => 0x35,
        ',' => 0x36,
        '.' => 0x37,
        '/' => 0x38,
        _ => return None,
    })
}

/// The unshifted character sharing a key with a shifted symbol.
fn unshifted(c: char) -> Option<char> {
    Some(match c {
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '~' => '`',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        _ => return None,
    })
}

/// Numpad keys, named with a `num` prefix (`num7`, `num+`, `numenter`).
pub fn numpad_key(name: &str) -> Option<u8> {
    Some(match name.to_ascii_lowercase().as_str() {
        "num0" => 0x62,
        "num1" => 0x59,
        "num2" => 0x5A,
        "num3" => 0x5B,
        "num4" => 0x5C,
        "num5" => 0x5D,
        "num6" => 0x5E,
        "num7" => 0x5F,
        "num8" => 0x60,
        "num9" => 0x61,
        "numlock" => 0x53,
        "numenter" | "num\n" => 0x58,
        "num/" => 0x54,
        "num*" => 0x55,
        "num-" => 0x56,
        "num+" => 0x57,
        "num." => 0x63,
        _ => return None,
    })
}

/// Named keys such as `f1`, `enter` or `pagedown`, including numpad keys.
pub fn special_key(name: &str) -> Option<u8> {
    let name = name.to_ascii_lowercase();

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        return (1..=12).contains(&n).then(|| 0x3A + n - 1);
    }

    Some(match name.as_str() {
        "printscreen" => 0x46,
        "scrolllock" => 0x47,
        "pause" => 0x48,
        "insert" => 0x49,
        "home" => 0x4A,
        "pageup" => 0x4B,
        "delete" => 0x4C,
        "end" => 0x4D,
        "pagedown" => 0x4E,
        "right" => 0x4F,
        "left" => 0x50,
        "down" => 0x51,
        "up" => 0x52,
        "enter" => 0x28,
        "backspace" => 0x2A,
        "tab" => 0x2B,
        "esc" => 0x29,
        "space" => 0x2C,
        _ => return numpad_key(&name),
    })
}

/// Translates a character into the modifiers and usage code that type it.
///
/// ```
/// # use ch9329_serial::{automation::keymap::char_to_hid, packets::hid::Modifiers};
/// assert_eq!(char_to_hid('a'), Some((Modifiers::empty(), 0x04)));
/// assert_eq!(char_to_hid('A'), Some((Modifiers::LEFT_SHIFT, 0x04)));
/// assert_eq!(char_to_hid('!'), Some((Modifiers::LEFT_SHIFT, 0x1E)));
/// ```
pub fn char_to_hid(c: char) -> Option<(Modifiers, u8)> {
    if c.is_ascii_uppercase() {
        return base_key(c.to_ascii_lowercase()).map(|code| (Modifiers::LEFT_SHIFT, code));
    }

    if let Some(base) = unshifted(c) {
        return base_key(base).map(|code| (Modifiers::LEFT_SHIFT, code));
    }

    base_key(c).map(|code| (Modifiers::empty(), code))
}

/// Translates a single character or a key name.
pub fn key_to_hid(key: &str) -> Option<(Modifiers, u8)> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(mapped) = char_to_hid(c) {
            return Some(mapped);
        }
    }

    special_key(key).map(|code| (Modifiers::empty(), code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits() {
        assert_eq!(char_to_hid('z'), Some((Modifiers::empty(), 0x1D)));
        assert_eq!(char_to_hid('Z'), Some((Modifiers::LEFT_SHIFT, 0x1D)));
        assert_eq!(char_to_hid('1'), Some((Modifiers::empty(), 0x1E)));
        assert_eq!(char_to_hid('9'), Some((Modifiers::empty(), 0x26)));
        assert_eq!(char_to_hid('0'), Some((Modifiers::empty(), 0x27)));
    }

    #[test]
    fn shifted_symbols() {
        assert_eq!(char_to_hid('?'), Some((Modifiers::LEFT_SHIFT, 0x38)));
        assert_eq!(char_to_hid('"'), Some((Modifiers::LEFT_SHIFT, 0x34)));
        assert_eq!(char_to_hid(')'), Some((Modifiers::LEFT_SHIFT, 0x27)));
    }

    #[test]
    fn unmapped_characters() {
        assert_eq!(char_to_hid('é'), None);
        assert_eq!(key_to_hid("nonsense"), None);
    }

    #[test]
    fn named_keys() {
        assert_eq!(special_key("F1"), Some(0x3A));
        assert_eq!(special_key("f12"), Some(0x45));
        assert_eq!(special_key("f13"), None);
        assert_eq!(special_key("Enter"), Some(0x28));
        assert_eq!(special_key("num7"), Some(0x5F));
        assert_eq!(key_to_hid("esc"), Some((Modifiers::empty(), 0x29)));
        assert_eq!(key_to_hid("f"), Some((Modifiers::empty(), 0x09)));
    }

    #[test]
    fn modifier_names() {
        assert_eq!(modifier("CMD"), Some(Modifiers::LEFT_GUI));
        assert_eq!(modifier("option"), Some(Modifiers::LEFT_ALT));
        assert_eq!(modifier("a"), None);
    }
}
