pub mod input;
pub mod render;
pub mod shell;
pub mod theme;
