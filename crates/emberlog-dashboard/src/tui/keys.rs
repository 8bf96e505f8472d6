use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuiAction {
    Quit,
    ToggleHelp,
    StartSearch,
    NextType,
    PrevType,
    NextPage,
    PrevPage,
    MoveSelectionUp,
    MoveSelectionDown,
    ToggleDetails,
    Refresh,
}

/// Keys while the search prompt is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchKey {
    Input(char),
    Backspace,
    Apply,
    Cancel,
}

pub fn key_to_action(key: KeyCode) -> Option<TuiAction> {
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(TuiAction::Quit),
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H') => Some(TuiAction::ToggleHelp),
        KeyCode::Char('/') => Some(TuiAction::StartSearch),
        KeyCode::Char('t') => Some(TuiAction::NextType),
        KeyCode::Char('T') => Some(TuiAction::PrevType),
        KeyCode::Right | KeyCode::Char('n') => Some(TuiAction::NextPage),
        KeyCode::Left | KeyCode::Char('p') => Some(TuiAction::PrevPage),
        KeyCode::Up | KeyCode::Char('k') => Some(TuiAction::MoveSelectionUp),
        KeyCode::Down | KeyCode::Char('j') => Some(TuiAction::MoveSelectionDown),
        KeyCode::Enter => Some(TuiAction::ToggleDetails),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(TuiAction::Refresh),
        _ => None,
    }
}

pub fn search_key(key: KeyCode) -> Option<SearchKey> {
    match key {
        KeyCode::Char(c) => Some(SearchKey::Input(c)),
        KeyCode::Backspace => Some(SearchKey::Backspace),
        KeyCode::Enter => Some(SearchKey::Apply),
        KeyCode::Esc => Some(SearchKey::Cancel),
        _ => None,
    }
}
