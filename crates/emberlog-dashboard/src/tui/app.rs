use crate::state::DashboardState;
use crate::tui::keys::{SearchKey, TuiAction};
use emberlog_core::Incident;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    /// Search prompt open with its draft text.
    Search(String),
}

/// What the event loop should do after a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    None,
    Fetch,
    Quit,
}

pub struct TuiApp {
    pub state: DashboardState,
    pub selected_index: usize,
    pub expanded: Option<i64>,
    pub show_help: bool,
    pub input: InputMode,
    pub notification: Option<(String, Instant)>,
}

impl TuiApp {
    pub fn new(state: DashboardState) -> Self {
        Self {
            state,
            selected_index: 0,
            expanded: None,
            show_help: false,
            input: InputMode::Normal,
            notification: None,
        }
    }

    pub fn selected_incident(&self) -> Option<&Incident> {
        self.state.view.visible().get(self.selected_index).copied()
    }

    /// Keep the cursor on a row after the list shrinks.
    pub fn clamp_selection(&mut self) {
        let len = self.state.view.visible().len();
        if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
        if let Some(id) = self.expanded {
            if !self.state.view.visible().iter().any(|i| i.id == id) {
                self.expanded = None;
            }
        }
    }

    pub fn handle_action(&mut self, action: TuiAction) -> AppCommand {
        match action {
            TuiAction::Quit => AppCommand::Quit,
            TuiAction::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            TuiAction::StartSearch => {
                self.input = InputMode::Search(self.state.view.state().search().to_string());
                AppCommand::None
            }
            TuiAction::NextType | TuiAction::PrevType => {
                let next = self
                    .state
                    .view
                    .next_type_filter(action == TuiAction::PrevType);
                let changed = self.state.view.state_mut().set_type_filter(Some(&next));
                self.after_view_change(changed)
            }
            TuiAction::NextPage => {
                let changed = self.state.view.has_next() && self.state.view.state_mut().next_page();
                self.after_view_change(changed)
            }
            TuiAction::PrevPage => {
                let changed = self.state.view.has_prev() && self.state.view.state_mut().prev_page();
                self.after_view_change(changed)
            }
            TuiAction::MoveSelectionUp => {
                self.selected_index = self.selected_index.saturating_sub(1);
                AppCommand::None
            }
            TuiAction::MoveSelectionDown => {
                let len = self.state.view.visible().len();
                if self.selected_index + 1 < len {
                    self.selected_index += 1;
                }
                AppCommand::None
            }
            TuiAction::ToggleDetails => {
                let selected = self.selected_incident().map(|i| i.id);
                self.expanded = if self.expanded == selected { None } else { selected };
                AppCommand::None
            }
            TuiAction::Refresh => {
                self.state.view.state_mut().refresh();
                AppCommand::Fetch
            }
        }
    }

    pub fn handle_search_key(&mut self, key: SearchKey) -> AppCommand {
        let InputMode::Search(draft) = &mut self.input else {
            return AppCommand::None;
        };

        match key {
            SearchKey::Input(c) => {
                draft.push(c);
                AppCommand::None
            }
            SearchKey::Backspace => {
                draft.pop();
                AppCommand::None
            }
            SearchKey::Apply => {
                let text = std::mem::take(draft);
                self.input = InputMode::Normal;
                let changed = self.state.view.state_mut().set_search(&text);
                self.after_view_change(changed)
            }
            SearchKey::Cancel => {
                self.input = InputMode::Normal;
                AppCommand::None
            }
        }
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some((message.into(), Instant::now()));
    }

    fn after_view_change(&mut self, changed: bool) -> AppCommand {
        if !changed {
            return AppCommand::None;
        }
        self.selected_index = 0;
        self.expanded = None;
        AppCommand::Fetch
    }
}
