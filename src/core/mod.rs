//! Terminal input state.

pub mod line_buffer;
