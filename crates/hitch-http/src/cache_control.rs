//! `Cache-Control` directive parsing shared by requests and responses.

use std::fmt;

/// Tolerance for stale responses requested by `max-stale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxStale {
    /// `max-stale` without a value: any staleness is acceptable.
    Any,
    Seconds(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age:          Option<u64>,
    pub s_maxage:         Option<u64>,
    pub max_stale:        Option<MaxStale>,
    pub min_fresh:        Option<u64>,
    pub no_cache:         bool,
    pub no_store:         bool,
    pub no_transform:     bool,
    pub only_if_cached:   bool,
    pub must_revalidate:  bool,
    pub proxy_revalidate: bool,
    pub private:          bool,
    pub public:           bool,
}

fn seconds(value: Option<&str>) -> Option<u64> { value.and_then(|v| v.trim().trim_matches('"').parse().ok()) }

impl CacheControl {
    /// Parses a comma separated directive list. Unknown directives and
    /// malformed values are ignored.
    pub fn parse(header: &str) -> Self {
        let mut control = Self::default();

        for directive in header.split(',') {
            let directive = directive.trim();
            if directive.is_empty() {
                continue;
            }
            let (name, value) = match directive.split_once('=') {
                Some((name, value)) => (name.trim().to_ascii_lowercase(), Some(value)),
                None => (directive.to_ascii_lowercase(), None),
            };

            match name.as_str() {
                "max-age" => control.max_age = seconds(value),
                "s-maxage" => control.s_maxage = seconds(value),
                "min-fresh" => control.min_fresh = seconds(value),
                "max-stale" => {
                    control.max_stale = match value {
                        None => Some(MaxStale::Any),
                        Some(_) => seconds(value).map(MaxStale::Seconds),
                    }
                },
                "no-cache" => control.no_cache = true,
                "no-store" => control.no_store = true,
                "no-transform" => control.no_transform = true,
                "only-if-cached" => control.only_if_cached = true,
                "must-revalidate" => control.must_revalidate = true,
                "proxy-revalidate" => control.proxy_revalidate = true,
                "private" => control.private = true,
                "public" => control.public = true,
                _ => {},
            }
        }

        control
    }

    /// Parses every value of a multi-valued header as one directive list.
    pub fn from_values(values: &[String]) -> Self { Self::parse(&values.join(",")) }

    /// Lifetime granted by the directives, `s-maxage` first.
    pub fn lifetime(&self) -> Option<u64> { self.s_maxage.or(self.max_age) }

    pub fn requires_revalidation(&self) -> bool { self.no_cache || self.must_revalidate }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let flags = [
            ("public", self.public),
            ("private", self.private),
            ("no-cache", self.no_cache),
            ("no-store", self.no_store),
            ("no-transform", self.no_transform),
            ("only-if-cached", self.only_if_cached),
            ("must-revalidate", self.must_revalidate),
            ("proxy-revalidate", self.proxy_revalidate),
        ];
        parts.extend(flags.iter().filter(|(_, on)| *on).map(|(name, _)| (*name).to_string()));
        if let Some(age) = self.max_age {
            parts.push(format!("max-age={age}"));
        }
        if let Some(age) = self.s_maxage {
            parts.push(format!("s-maxage={age}"));
        }
        match self.max_stale {
            Some(MaxStale::Any) => parts.push("max-stale".to_string()),
            Some(MaxStale::Seconds(s)) => parts.push(format!("max-stale={s}")),
            None => {},
        }
        if let Some(fresh) = self.min_fresh {
            parts.push(format!("min-fresh={fresh}"));
        }
        f.write_str(&parts.join(", "))
    }
}
