//! DIGEST-MD5 SASL client (RFC 2831)
//!
//! Only the `auth` quality of protection is supported: the mechanism is used to
//! authenticate a bind, never to wrap the connection.

use crate::error::CryptoError;
use crate::hash::{md5_digest, md5_hex};
use base64::{engine::general_purpose::STANDARD, Engine};

/// Nonce count; each challenge is answered with a fresh client nonce.
const NONCE_COUNT: &str = "00000001";

const QOP_AUTH: &str = "auth";

/// Client-side inputs to a DIGEST-MD5 response
#[derive(Debug, Clone)]
pub struct DigestPreferences {
    /// Service and host, e.g. `ldap/dc1.example.com`
    pub digest_uri: String,
    pub username: String,
    pub password: String,
    /// Identity to act as, if different from `username`
    pub authzid: Option<String>,
}

impl DigestPreferences {
    pub fn new(
        digest_uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            digest_uri: digest_uri.into(),
            username: username.into(),
            password: password.into(),
            authzid: None,
        }
    }
}

/// Parsed server challenge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DigestChallenge {
    pub realms: Vec<String>,
    pub nonce: String,
    pub qop: Vec<String>,
    pub charset: Option<String>,
    pub algorithm: Option<String>,
    pub maxbuf: Option<u32>,
    pub stale: bool,
}

impl DigestChallenge {
    pub fn parse(bytes: &[u8]) -> Result<Self, CryptoError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CryptoError::MalformedChallenge(format!("not UTF-8: {}", e)))?;

        let mut challenge = DigestChallenge::default();
        let mut nonce = None;

        for (name, value) in parse_directives(text)? {
            match name.to_ascii_lowercase().as_str() {
                "realm" => challenge.realms.push(value),
                "nonce" => nonce = Some(value),
                "qop" => {
                    challenge.qop = value
                        .split(',')
                        .map(|q| q.trim().to_string())
                        .filter(|q| !q.is_empty())
                        .collect()
                }
                "charset" => challenge.charset = Some(value),
                "algorithm" => challenge.algorithm = Some(value),
                "maxbuf" => challenge.maxbuf = value.parse().ok(),
                "stale" => challenge.stale = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        challenge.nonce =
            nonce.ok_or_else(|| CryptoError::MalformedChallenge("missing nonce".into()))?;
        Ok(challenge)
    }
}

/// Whether the payload is the server's final `rspauth` verification message.
pub fn is_rspauth(challenge: &[u8]) -> bool {
    challenge.starts_with(b"rspauth=")
}

/// Answer a server challenge with a freshly generated client nonce.
///
/// The final `rspauth=` message is answered with an empty response.
pub fn compute_digest_response(
    challenge: &[u8],
    prefs: &DigestPreferences,
) -> Result<Vec<u8>, CryptoError> {
    if is_rspauth(challenge) {
        return Ok(Vec::new());
    }

    compute_digest_response_with_cnonce(challenge, prefs, &generate_cnonce())
}

pub fn compute_digest_response_with_cnonce(
    challenge: &[u8],
    prefs: &DigestPreferences,
    cnonce: &str,
) -> Result<Vec<u8>, CryptoError> {
    let challenge = DigestChallenge::parse(challenge)?;

    if !challenge.qop.is_empty() && !challenge.qop.iter().any(|q| q == QOP_AUTH) {
        return Err(CryptoError::UnsupportedQop(challenge.qop.join(",")));
    }

    let realm = challenge.realms.first().cloned().unwrap_or_default();
    let response = response_value(&challenge, prefs, &realm, cnonce);

    let mut fields = Vec::new();
    if challenge.charset.as_deref() == Some("utf-8") {
        fields.push("charset=utf-8".to_string());
    }
    fields.push(format!("username={}", quote(&prefs.username)));
    fields.push(format!("realm={}", quote(&realm)));
    fields.push(format!("nonce={}", quote(&challenge.nonce)));
    fields.push(format!("nc={}", NONCE_COUNT));
    fields.push(format!("cnonce={}", quote(cnonce)));
    fields.push(format!("digest-uri={}", quote(&prefs.digest_uri)));
    fields.push(format!("response={}", response));
    fields.push(format!("qop={}", QOP_AUTH));
    if let Some(authzid) = &prefs.authzid {
        fields.push(format!("authzid={}", quote(authzid)));
    }

    Ok(fields.join(",").into_bytes())
}

fn response_value(
    challenge: &DigestChallenge,
    prefs: &DigestPreferences,
    realm: &str,
    cnonce: &str,
) -> String {
    let secret = md5_digest(format!("{}:{}:{}", prefs.username, realm, prefs.password).as_bytes());

    let mut a1 = secret.to_vec();
    a1.extend_from_slice(format!(":{}:{}", challenge.nonce, cnonce).as_bytes());
    if let Some(authzid) = &prefs.authzid {
        a1.extend_from_slice(format!(":{}", authzid).as_bytes());
    }

    let a2 = format!("AUTHENTICATE:{}", prefs.digest_uri);

    let kd = format!(
        "{}:{}:{}:{}:{}:{}",
        md5_hex(&a1),
        challenge.nonce,
        NONCE_COUNT,
        cnonce,
        QOP_AUTH,
        md5_hex(a2.as_bytes())
    );

    md5_hex(kd.as_bytes())
}

fn generate_cnonce() -> String {
    let bytes: [u8; 16] = rand::random();
    STANDARD.encode(bytes)
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Split `name=value, name="quoted, value"` into pairs.
fn parse_directives(text: &str) -> Result<Vec<(String, String)>, CryptoError> {
    let mut directives = Vec::new();
    let mut chars = text.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        for c in chars.by_ref() {
            if c == '=' {
                break;
            }
            name.push(c);
        }
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(CryptoError::MalformedChallenge("empty directive name".into()));
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(CryptoError::MalformedChallenge(format!(
                    "unterminated value for {}",
                    name
                )));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        directives.push((name, value));
    }

    Ok(directives)
}
