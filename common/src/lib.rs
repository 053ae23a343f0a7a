pub mod api;
pub mod game;
pub mod room;
pub mod rules;

pub use api::*;
pub use game::*;
pub use room::*;
pub use rules::*;
