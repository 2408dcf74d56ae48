//! Cookie jar and the subscriber that keeps it in sync with traffic.

mod cookie;
mod error;
mod jar;
mod parser;
mod plugin;

pub use cookie::CookieRecord;
pub use error::{CookieError, Result};
pub use jar::{CookieJar, MemoryCookieJar};
pub use parser::{parse_cookie_header, parse_set_cookie};
pub use plugin::{CookiePlugin, DISABLE_PARAM};
