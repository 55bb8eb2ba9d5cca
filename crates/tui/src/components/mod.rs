pub mod chat;
pub mod footer;
pub mod input_box;
pub mod welcome;
