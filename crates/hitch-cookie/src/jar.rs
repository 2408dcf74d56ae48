use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::cookie::CookieRecord;
use crate::error::{CookieError, Result};

/// Cookie storage.
pub trait CookieJar: Send + Sync {
    /// Unexpired cookies matching `host` and `path`.
    fn get_cookies(&self, host: &str, path: &str) -> Vec<CookieRecord>;

    /// Stores `cookie`, replacing one with the same name, domain and path.
    fn save(&self, cookie: CookieRecord) -> Result<()>;

    /// Removes cookies matching every given filter and returns the count.
    fn clear(&self, domain: Option<&str>, path: Option<&str>, name: Option<&str>) -> usize;

    /// Removes session cookies.
    fn clear_temporary(&self) -> usize;

    fn delete_expired(&self) -> usize;

    fn all(&self) -> Vec<CookieRecord>;
}

#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<Vec<CookieRecord>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    fn lock(&self) -> MutexGuard<'_, Vec<CookieRecord>> { self.cookies.lock().unwrap_or_else(PoisonError::into_inner) }

    fn retain(&self, keep: impl FnMut(&CookieRecord) -> bool) -> usize {
        let mut cookies = self.lock();
        let before = cookies.len();
        cookies.retain(keep);
        before - cookies.len()
    }

    /// Cookies that outlive the session, for persisting with serde.
    pub fn export(&self) -> Vec<CookieRecord> {
        let now = Utc::now();
        self.lock()
            .iter()
            .filter(|cookie| !cookie.is_temporary() && !cookie.is_expired(now))
            .cloned()
            .collect()
    }

    /// Restores exported cookies; invalid ones are skipped.
    pub fn import(&self, cookies: impl IntoIterator<Item = CookieRecord>) -> usize {
        cookies
            .into_iter()
            .filter(|cookie| self.save(cookie.clone()).is_ok())
            .count()
    }

    pub fn get_cookies_at(&self, host: &str, path: &str, now: DateTime<Utc>) -> Vec<CookieRecord> {
        self.lock()
            .iter()
            .filter(|cookie| !cookie.is_expired(now) && cookie.matches_domain(host) && cookie.matches_path(path))
            .cloned()
            .collect()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get_cookies(&self, host: &str, path: &str) -> Vec<CookieRecord> { self.get_cookies_at(host, path, Utc::now()) }

    fn save(&self, cookie: CookieRecord) -> Result<()> {
        if cookie.domain.trim_start_matches('.').is_empty() {
            return Err(CookieError::Invalid("domain"));
        }
        if cookie.name.is_empty() {
            return Err(CookieError::Invalid("name"));
        }
        let mut cookies = self.lock();
        match cookies.iter_mut().find(|existing| existing.same_identity(&cookie)) {
            Some(existing) => *existing = cookie,
            None => {
                trace!(name = %cookie.name, domain = %cookie.domain, "new cookie");
                cookies.push(cookie);
            },
        }
        Ok(())
    }

    fn clear(&self, domain: Option<&str>, path: Option<&str>, name: Option<&str>) -> usize {
        self.retain(|cookie| {
            let matches = domain.is_none_or(|d| cookie.domain.trim_start_matches('.') == d.trim_start_matches('.'))
                && path.is_none_or(|p| cookie.path == p)
                && name.is_none_or(|n| cookie.name == n);
            !matches
        })
    }

    fn clear_temporary(&self) -> usize { self.retain(|cookie| !cookie.is_temporary()) }

    fn delete_expired(&self) -> usize {
        let now = Utc::now();
        self.retain(|cookie| !cookie.is_expired(now))
    }

    fn all(&self) -> Vec<CookieRecord> { self.lock().clone() }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn jar() -> MemoryCookieJar {
        let jar = MemoryCookieJar::new();
        let future = Utc::now() + Duration::hours(1);
        jar.save(CookieRecord::new("session", "s", "example.com")).unwrap();
        jar.save(CookieRecord::new("pref", "p", ".example.com").with_expires(future)).unwrap();
        jar.save(CookieRecord::new("docs", "d", "example.com").with_path("/docs").with_expires(future)).unwrap();
        jar.save(CookieRecord::new("old", "o", "example.com").with_expires(Utc::now() - Duration::hours(1)))
            .unwrap();
        jar
    }

    #[test]
    fn test_get_cookies_filters_domain_path_and_expiry() {
        let jar = jar();
        let names = |host: &str, path: &str| {
            let mut names: Vec<String> = jar.get_cookies(host, path).into_iter().map(|c| c.name).collect();
            names.sort();
            names
        };
        assert_eq!(names("example.com", "/"), vec!["pref", "session"]);
        assert_eq!(names("example.com", "/docs/a"), vec!["docs", "pref", "session"]);
        assert_eq!(names("api.example.com", "/"), vec!["pref"]);
        assert!(names("other.org", "/").is_empty());
    }

    #[test]
    fn test_save_replaces_same_identity() {
        let jar = jar();
        jar.save(CookieRecord::new("session", "new", "example.com")).unwrap();
        let sessions: Vec<_> = jar.all().into_iter().filter(|c| c.name == "session").collect();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].value, "new");
    }

    #[test]
    fn test_save_requires_domain_and_name() {
        let jar = MemoryCookieJar::new();
        assert!(matches!(jar.save(CookieRecord::new("a", "1", "")), Err(CookieError::Invalid("domain"))));
        assert!(matches!(jar.save(CookieRecord::new("", "1", "h")), Err(CookieError::Invalid("name"))));
    }

    #[test]
    fn test_export_import_through_json() {
        let json = serde_json::to_string(&jar().export()).unwrap();
        let restored = MemoryCookieJar::new();
        let cookies: Vec<CookieRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.import(cookies), 2);
        let mut names: Vec<String> = restored.all().into_iter().map(|c| c.name).collect();
        names.sort();
        assert_eq!(names, vec!["docs", "pref"]);
    }

    #[test]
    fn test_maintenance() {
        let jar = jar();
        assert_eq!(jar.delete_expired(), 1);
        assert_eq!(jar.clear_temporary(), 1);
        assert_eq!(jar.clear(None, Some("/docs"), None), 1);
        assert_eq!(jar.clear(Some("example.com"), None, Some("pref")), 1);
        assert!(jar.is_empty());
    }
}
