pub mod helpers;

pub use helpers::{render_payload, timestamp, tokenize};
