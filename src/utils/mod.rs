pub mod render;
pub mod tui;
