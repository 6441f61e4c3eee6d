mod ingredients;
mod recipes;
mod relations;
mod shopping_list;
mod subscriptions;
mod tags;
mod users;

pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use shopping_list::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
