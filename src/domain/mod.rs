mod campaign;
mod newsletter;
mod referenced_item;
mod subscriber;

pub use campaign::*;
pub use newsletter::*;
pub use referenced_item::*;
pub use subscriber::*;
