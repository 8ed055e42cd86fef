pub mod common;
pub mod giveaway;
pub mod telegram;

pub use common::*;
pub use giveaway::*;
