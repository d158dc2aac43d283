mod draw;
mod styles;

pub use draw::draw_ui;
