pub mod game;
pub mod schedule;
pub mod state;

pub use game::*;
pub use schedule::*;
pub use state::*;
