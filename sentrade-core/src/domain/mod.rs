//! Domain types shared by the policy and its collaborators.

pub mod bar;
pub mod news;
pub mod order;

pub use bar::Bar;
pub use news::NewsEvent;
pub use order::{BracketOrder, OrderSide};

/// Symbol type alias
pub type Symbol = String;
