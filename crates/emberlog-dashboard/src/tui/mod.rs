pub mod app;
pub mod keys;
pub mod ui;
pub mod widgets;

pub use app::TuiApp;
pub use ui::run_tui;
