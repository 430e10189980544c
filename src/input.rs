//! Key bindings: WASD drives player 1, the arrow keys drive player 2.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::grid::{Direction, TokenId};
use crate::session::Command;

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(Command),
    Pause,
    Confirm,
    Quit,
    None,
}

/// Map key event to game action. Letters are matched case-insensitively.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if !plain(modifiers) {
        return Action::None;
    }
    let code = match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    };
    let player = |token, dir| Action::Move(Command::new(token, dir));
    match code {
        KeyCode::Char('w') => player(TokenId::A, Direction::Up),
        KeyCode::Char('s') => player(TokenId::A, Direction::Down),
        KeyCode::Char('a') => player(TokenId::A, Direction::Left),
        KeyCode::Char('d') => player(TokenId::A, Direction::Right),
        KeyCode::Up => player(TokenId::B, Direction::Up),
        KeyCode::Down => player(TokenId::B, Direction::Down),
        KeyCode::Left => player(TokenId::B, Direction::Left),
        KeyCode::Right => player(TokenId::B, Direction::Right),
        KeyCode::Char('p') => Action::Pause,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Confirm,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}

/// Whether the key is the save key (only meaningful while paused).
pub fn is_save_key(key: KeyEvent) -> bool {
    plain(key.modifiers) && matches!(key.code, KeyCode::Char('s' | 'S'))
}

/// No modifier, or only Shift.
fn plain(modifiers: KeyModifiers) -> bool {
    modifiers.is_empty() || modifiers == KeyModifiers::SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_wasd_moves_first_player() {
        assert_eq!(
            key_to_action(press(KeyCode::Char('w'))),
            Action::Move(Command::new(TokenId::A, Direction::Up))
        );
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('D'), KeyModifiers::SHIFT)),
            Action::Move(Command::new(TokenId::A, Direction::Right))
        );
    }

    #[test]
    fn test_arrows_move_second_player() {
        assert_eq!(
            key_to_action(press(KeyCode::Left)),
            Action::Move(Command::new(TokenId::B, Direction::Left))
        );
        assert_eq!(
            key_to_action(press(KeyCode::Down)),
            Action::Move(Command::new(TokenId::B, Direction::Down))
        );
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(key_to_action(press(KeyCode::Char('p'))), Action::Pause);
        assert_eq!(key_to_action(press(KeyCode::Enter)), Action::Confirm);
        assert_eq!(key_to_action(press(KeyCode::Esc)), Action::Quit);
        assert_eq!(key_to_action(press(KeyCode::Char('x'))), Action::None);
        assert_eq!(
            key_to_action(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            Action::None
        );
        assert!(is_save_key(press(KeyCode::Char('s'))));
    }

    #[test]
    fn test_save_key_ignores_modified_s() {
        assert!(is_save_key(KeyEvent::new(KeyCode::Char('S'), KeyModifiers::SHIFT)));
        assert!(!is_save_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)));
        assert!(!is_save_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::ALT)));
    }
}
