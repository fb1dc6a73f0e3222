mod api;
mod date;
mod retry;

pub use self::api::*;
pub use self::date::*;
pub use self::retry::*;
