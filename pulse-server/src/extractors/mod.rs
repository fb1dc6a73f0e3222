mod signed_json;

pub use self::signed_json::*;
