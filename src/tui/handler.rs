use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    MoveToTop,
    MoveToBottom,
    ScrollDetailUp,
    ScrollDetailDown,
    CycleFilter,
    CycleTopic,
    Reload,
    OpenInBrowser,
    ShowHelp,
    HideHelp,
    // Title search input
    SearchStart,
    SearchInputChar(char),
    SearchInputBackspace,
    SearchInputConfirm,
    SearchInputCancel,
}

pub fn handle_key_event(
    key: KeyEvent,
    search_input_active: bool,
    show_help: bool,
) -> Option<AppAction> {
    // If help is showing, any key closes it
    if show_help {
        return Some(AppAction::HideHelp);
    }

    // Search input mode
    if search_input_active {
        return match key.code {
            KeyCode::Enter => Some(AppAction::SearchInputConfirm),
            KeyCode::Esc => Some(AppAction::SearchInputCancel),
            KeyCode::Backspace => Some(AppAction::SearchInputBackspace),
            KeyCode::Char(c) => Some(AppAction::SearchInputChar(c)),
            _ => None,
        };
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(AppAction::MoveToTop),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(AppAction::MoveToBottom),

        (KeyCode::PageDown, _) | (KeyCode::Char(' '), _) => Some(AppAction::ScrollDetailDown),
        (KeyCode::PageUp, _) | (KeyCode::Char('b'), _) => Some(AppAction::ScrollDetailUp),

        (KeyCode::Char('f'), _) => Some(AppAction::CycleFilter),
        (KeyCode::Char('t'), _) => Some(AppAction::CycleTopic),
        (KeyCode::Char('/'), _) => Some(AppAction::SearchStart),
        (KeyCode::Char('r'), _) => Some(AppAction::Reload),
        (KeyCode::Char('o'), _) => Some(AppAction::OpenInBrowser),

        (KeyCode::Char('?'), _) => Some(AppAction::ShowHelp),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn normal_mode_bindings() {
        assert_eq!(handle_key_event(key(KeyCode::Char('j')), false, false), Some(AppAction::MoveDown));
        assert_eq!(handle_key_event(key(KeyCode::Up), false, false), Some(AppAction::MoveUp));
        assert_eq!(handle_key_event(key(KeyCode::Char('f')), false, false), Some(AppAction::CycleFilter));
        assert_eq!(handle_key_event(key(KeyCode::Char('t')), false, false), Some(AppAction::CycleTopic));
        assert_eq!(handle_key_event(key(KeyCode::Char('/')), false, false), Some(AppAction::SearchStart));
        assert_eq!(handle_key_event(key(KeyCode::PageDown), false, false), Some(AppAction::ScrollDetailDown));
        assert_eq!(
            handle_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), false, false),
            Some(AppAction::Quit)
        );
        assert_eq!(handle_key_event(key(KeyCode::Char('x')), false, false), None);
    }

    #[test]
    fn search_mode_captures_typing() {
        assert_eq!(
            handle_key_event(key(KeyCode::Char('q')), true, false),
            Some(AppAction::SearchInputChar('q'))
        );
        assert_eq!(handle_key_event(key(KeyCode::Enter), true, false), Some(AppAction::SearchInputConfirm));
        assert_eq!(handle_key_event(key(KeyCode::Esc), true, false), Some(AppAction::SearchInputCancel));
        assert_eq!(handle_key_event(key(KeyCode::Backspace), true, false), Some(AppAction::SearchInputBackspace));
    }

    #[test]
    fn help_swallows_keys() {
        assert_eq!(handle_key_event(key(KeyCode::Char('q')), false, true), Some(AppAction::HideHelp));
    }
}
