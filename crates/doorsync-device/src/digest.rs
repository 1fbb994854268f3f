//! HTTP Digest access authentication (RFC 2617 / RFC 7616).
//!
//! The terminal answers every unauthenticated request with `401` and a
//! `WWW-Authenticate: Digest ...` challenge. This module parses that
//! challenge, computes the `Authorization` header for a request, and keeps the
//! per-client session (last challenge and nonce count) so later requests can
//! authenticate preemptively.
//!
//! # Supported Parameters
//!
//! | Parameter | Values |
//! |-----------|--------|
//! | `algorithm` | `MD5` (default), `MD5-sess`, `SHA-256`, `SHA-256-sess` |
//! | `qop` | `auth`, or absent (RFC 2069 compatibility) |
//!
//! `auth-int` is not supported: the terminal always offers `auth`.

use doorsync_core::{Error, Result};
use md5::Md5;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Mutex;

/// Hash algorithm named in the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl Algorithm {
    /// Parse the `algorithm` challenge parameter (case-insensitive).
    ///
    /// # Errors
    /// Returns `Error::Auth` for algorithms this client cannot compute.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "MD5-SESS" => Ok(Self::Md5Sess),
            "SHA-256" => Ok(Self::Sha256),
            "SHA-256-SESS" => Ok(Self::Sha256Sess),
            other => Err(Error::auth(format!("unsupported digest algorithm {other}"))),
        }
    }

    /// Name as written back in the `Authorization` header.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    fn is_session(self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }

    fn hash(self, data: &str) -> String {
        match self {
            Self::Md5 | Self::Md5Sess => hex::encode(Md5::digest(data.as_bytes())),
            Self::Sha256 | Self::Sha256Sess => hex::encode(Sha256::digest(data.as_bytes())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    /// `true` when the server offered `qop=auth`
    pub qop_auth: bool,
    /// `true` when the server rejected a previous nonce as stale
    pub stale: bool,
}

impl Challenge {
    /// Parse a single `WWW-Authenticate` header value.
    ///
    /// # Errors
    /// Returns `Error::Auth` if the scheme is not Digest, if `realm` or
    /// `nonce` is missing, or if only `qop=auth-int` is offered.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorsync_device::digest::{Algorithm, Challenge};
    ///
    /// let challenge = Challenge::parse(
    ///     r#"Digest realm="DS-K1T341", qop="auth", nonce="4e6a4d7a", stale="FALSE""#,
    /// ).unwrap();
    ///
    /// assert_eq!(challenge.realm, "DS-K1T341");
    /// assert_eq!(challenge.algorithm, Algorithm::Md5);
    /// assert!(challenge.qop_auth);
    /// ```
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
        if !scheme.eq_ignore_ascii_case("digest") {
            return Err(Error::auth(format!("expected Digest challenge, got {scheme}")));
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = Algorithm::Md5;
        let mut qop = None;
        let mut stale = false;

        for (key, value) in parse_params(params) {
            match key.as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => algorithm = Algorithm::parse(&value)?,
                "qop" => qop = Some(value),
                "stale" => stale = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        let qop_auth = match qop {
            None => false,
            Some(options) => {
                if options.split(',').any(|option| option.trim().eq_ignore_ascii_case("auth")) {
                    true
                } else {
                    return Err(Error::auth(format!("unsupported qop options {options}")));
                }
            }
        };

        Ok(Self {
            realm: realm.ok_or_else(|| Error::auth("digest challenge without realm"))?,
            nonce: nonce.ok_or_else(|| Error::auth("digest challenge without nonce"))?,
            opaque,
            algorithm,
            qop_auth,
            stale,
        })
    }

    /// Pick the first Digest challenge among several header values.
    ///
    /// Terminals behind a reverse proxy sometimes also advertise `Basic`.
    ///
    /// # Errors
    /// Returns `Error::Auth` if no value is a usable Digest challenge.
    pub fn from_header_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut last_error = None;
        for value in values {
            match Self::parse(value) {
                Ok(challenge) => return Ok(challenge),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::auth("401 without WWW-Authenticate header")))
    }

    /// Compute the `Authorization` header value for one request.
    ///
    /// `nc` is the nonce count (1 for the first use of a nonce) and `cnonce`
    /// the client nonce; both are ignored for challenges without `qop`.
    #[must_use]
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: &str,
    ) -> String {
        let response = self.response(username, password, method, uri, nc, cnonce);

        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", algorithm={}, response="{}""#,
            quote(username),
            quote(&self.realm),
            quote(&self.nonce),
            quote(uri),
            self.algorithm,
            response
        );
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{}""#, quote(opaque)));
        }
        if self.qop_auth {
            header.push_str(&format!(r#", qop=auth, nc={nc:08x}, cnonce="{}""#, quote(cnonce)));
        }
        header
    }

    /// The `response` digest as defined by RFC 7616 §3.4.1.
    #[must_use]
    pub fn response(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: &str,
    ) -> String {
        let alg = self.algorithm;

        let mut ha1 = alg.hash(&format!("{username}:{}:{password}", self.realm));
        if alg.is_session() {
            ha1 = alg.hash(&format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = alg.hash(&format!("{method}:{uri}"));

        if self.qop_auth {
            alg.hash(&format!("{ha1}:{}:{nc:08x}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            alg.hash(&format!("{ha1}:{}:{ha2}", self.nonce))
        }
    }
}

/// Split `key=value, key="quoted, value"` into lowercase keys and unquoted
/// values.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim_end().to_string();
        }

        params.push((key.trim().to_ascii_lowercase(), value));
    }

    params
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Fresh client nonce: 16 random bytes, hex encoded.
#[must_use]
pub fn generate_cnonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug)]
struct SessionState {
    challenge: Challenge,
    nonce_count: u32,
}

/// Digest session shared by every request of one client.
///
/// Holds the most recent challenge so requests after the first can carry
/// credentials immediately. The nonce count is incremented per use, as the
/// terminal rejects replayed counts.
#[derive(Debug, Default)]
pub struct DigestSession {
    state: Mutex<Option<SessionState>>,
}

impl DigestSession {
    /// Create an empty session (no challenge seen yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached challenge.
    ///
    /// The nonce count restarts only for a new nonce. Concurrent requests
    /// challenged with the same nonce keep counting, so no `nc` is reused.
    pub fn update(&self, challenge: Challenge) {
        let mut state = self.lock();
        let nonce_count = match state.as_ref() {
            Some(current) if current.challenge.nonce == challenge.nonce => current.nonce_count,
            _ => 0,
        };
        *state = Some(SessionState {
            challenge,
            nonce_count,
        });
    }

    /// Forget the cached challenge.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Returns `true` once a challenge has been cached.
    pub fn is_primed(&self) -> bool {
        self.lock().is_some()
    }

    /// Compute the next `Authorization` header from the cached challenge, or
    /// `None` if no challenge was seen yet.
    pub fn authorize(&self, username: &str, password: &str, method: &str, uri: &str) -> Option<String> {
        let mut state = self.lock();
        let state = state.as_mut()?;
        state.nonce_count = state.nonce_count.wrapping_add(1);

        Some(state.challenge.authorization(
            username,
            password,
            method,
            uri,
            state.nonce_count,
            &generate_cnonce(),
        ))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<SessionState>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
