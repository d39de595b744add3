use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::config::ServerConfig;

pub const CHALLENGE: &str = "Basic realm=\"chemviz\"";

/// HTTP Basic credentials the server accepts.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => Ok(Self::new(username, password)),
            _ => Err(anyhow!("server credentials are not configured")),
        }
    }

    /// `Authorization` header value for these credentials.
    pub fn header_value(&self) -> String {
        basic_header(&self.username, &self.password)
    }

    pub fn verify(&self, authorization: Option<&str>) -> bool {
        let Some((username, password)) = authorization.and_then(decode_basic) else {
            return false;
        };
        // Evaluate both so a wrong username costs the same as a wrong password.
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & pass_ok
    }
}

pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
