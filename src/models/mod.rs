pub mod category;
pub mod code;
pub mod menu;
pub mod program;
