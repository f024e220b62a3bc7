use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Non-sensitive flag read by the navigation gate. It never carries the token.
pub const AUTH_FLAG_COOKIE: &str = "hasAuth";
pub const AUTH_FLAG_MAX_AGE_SECS: i64 = 8 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Coordinador,
    Cajero,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "unknown_role")]
    pub rol: Role,
}

fn unknown_role() -> Role {
    Role::Unknown
}

impl User {
    pub fn from_json(v: Option<&Value>) -> Option<User> {
        let v = v?;
        if v.is_null() {
            return None;
        }
        serde_json::from_value(v.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub http_only: bool,
}

impl StoredCookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CookieUpdate {
    Set(StoredCookie),
    Remove(String),
}

/// Parse one `Set-Cookie` header value.
pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<CookieUpdate> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"').to_string();

    let mut max_age: Option<i64> = None;
    let mut expires: Option<DateTime<Utc>> = None;
    let mut http_only = false;
    for attr in parts {
        let attr = attr.trim();
        let (k, v) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr, ""),
        };
        match k.to_ascii_lowercase().as_str() {
            "max-age" => max_age = v.parse::<i64>().ok(),
            "expires" => {
                expires = DateTime::parse_from_rfc2822(v)
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            }
            "httponly" => http_only = true,
            _ => {}
        }
    }

    // Max-Age takes precedence over Expires.
    let expires_at = match max_age {
        Some(secs) if secs <= 0 => return Some(CookieUpdate::Remove(name.to_string())),
        Some(secs) => Some(now + Duration::seconds(secs)),
        None => expires,
    };
    if value.is_empty() || expires_at.map(|t| t <= now).unwrap_or(false) {
        return Some(CookieUpdate::Remove(name.to_string()));
    }
    Some(CookieUpdate::Set(StoredCookie {
        name: name.to_string(),
        value,
        expires_at,
        http_only,
    }))
}

/// Backend cookies for the current session (the HTTP-only token lives here).
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, StoredCookie>,
    dirty: bool,
}

impl CookieJar {
    pub fn load(&mut self, cookies: Vec<StoredCookie>) {
        self.cookies = cookies.into_iter().map(|c| (c.name.clone(), c)).collect();
        self.dirty = false;
    }

    pub fn apply(&mut self, update: CookieUpdate) {
        match update {
            CookieUpdate::Set(c) => {
                self.cookies.insert(c.name.clone(), c);
            }
            CookieUpdate::Remove(name) => {
                self.cookies.remove(&name);
            }
        }
        self.dirty = true;
    }

    pub fn header_value(&self, now: DateTime<Utc>) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .values()
            .filter(|c| !c.is_expired(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    pub fn cookies(&self) -> impl Iterator<Item = &StoredCookie> {
        self.cookies.values()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.cookies.is_empty() {
            self.cookies.clear();
            self.dirty = true;
        }
    }

    /// Returns whether the jar changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// Auth context: the signed-in user plus the gate flag.
#[derive(Debug, Default)]
pub struct Session {
    pub user: Option<User>,
    pub flag_expires_at: Option<DateTime<Utc>>,
    pub jar: CookieJar,
}

impl Session {
    pub fn has_auth_flag(&self, now: DateTime<Utc>) -> bool {
        self.flag_expires_at.map(|t| t > now).unwrap_or(false)
    }

    pub fn set_auth_flag(&mut self, now: DateTime<Utc>) {
        self.flag_expires_at = Some(now + Duration::seconds(AUTH_FLAG_MAX_AGE_SECS));
    }

    pub fn clear_auth_flag(&mut self) {
        self.flag_expires_at = None;
    }

    pub fn sign_out(&mut self) {
        self.user = None;
        self.clear_auth_flag();
        self.jar.clear();
    }
}
