//! Redirect following with a hop limit and browser-style method rewriting.

mod options;
mod plugin;

pub use options::RedirectOptions;
pub use plugin::{DISABLE_PARAM, MAX_PARAM, RedirectPlugin, STRICT_PARAM};
