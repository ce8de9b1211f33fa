//! NTLM messages (MS-NLMP) for the GSS-SPNEGO SASL mechanism
//!
//! Only what a client needs: build the Type 1 negotiate message, parse the
//! server's Type 2 challenge and answer it with an NTLMv2 Type 3 message.

use crate::error::CryptoError;
use crate::hash::{hmac_md5, md4_digest, utf16le};

pub const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

/// Negotiate flags
pub mod flags {
    pub const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
    pub const NEGOTIATE_OEM: u32 = 0x0000_0002;
    pub const REQUEST_TARGET: u32 = 0x0000_0004;
    pub const NEGOTIATE_NTLM: u32 = 0x0000_0200;
    pub const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
    pub const NEGOTIATE_EXTENDED_SESSION_SECURITY: u32 = 0x0008_0000;
    pub const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;

    pub const TYPE1_DEFAULT: u32 = NEGOTIATE_UNICODE
        | NEGOTIATE_OEM
        | REQUEST_TARGET
        | NEGOTIATE_NTLM
        | NEGOTIATE_ALWAYS_SIGN
        | NEGOTIATE_EXTENDED_SESSION_SECURITY;

    pub const TYPE3_DEFAULT: u32 = NEGOTIATE_UNICODE
        | REQUEST_TARGET
        | NEGOTIATE_NTLM
        | NEGOTIATE_ALWAYS_SIGN
        | NEGOTIATE_EXTENDED_SESSION_SECURITY;
}

const NEGOTIATE: u32 = 1;
const CHALLENGE: u32 = 2;
const AUTHENTICATE: u32 = 3;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01
const FILETIME_UNIX_OFFSET: u64 = 11_644_473_600;

// ============================================================================
// Type 1
// ============================================================================

#[derive(Debug, Clone)]
pub struct NegotiateMessage {
    pub flags: u32,
    pub domain: Vec<u8>,
    pub workstation: Vec<u8>,
}

impl Default for NegotiateMessage {
    fn default() -> Self {
        Self {
            flags: flags::TYPE1_DEFAULT,
            domain: Vec::new(),
            workstation: Vec::new(),
        }
    }
}

impl NegotiateMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = MessageWriter::new(NEGOTIATE, 32);
        writer.put_u32(self.flags);
        writer.put_buffer(&self.domain);
        writer.put_buffer(&self.workstation);
        writer.finish()
    }
}

// ============================================================================
// Type 2
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeMessage {
    pub flags: u32,
    pub target_name: Vec<u8>,
    pub challenge: [u8; 8],
    pub context: [u8; 8],
    pub target_info: Vec<u8>,
}

impl ChallengeMessage {
    pub fn parse(bytes: &[u8]) -> Result<Self, CryptoError> {
        check_header(bytes, CHALLENGE)?;
        if bytes.len() < 32 {
            return Err(CryptoError::InvalidNtlmMessage(format!(
                "challenge message is {} bytes, expected at least 32",
                bytes.len()
            )));
        }

        let target_name = security_buffer(bytes, 12)?.to_vec();
        let flags = read_u32(bytes, 20)?;

        let mut challenge = [0u8; 8];
        challenge.copy_from_slice(&bytes[24..32]);

        let mut context = [0u8; 8];
        if bytes.len() >= 40 {
            context.copy_from_slice(&bytes[32..40]);
        }

        let target_info = if bytes.len() >= 48 {
            security_buffer(bytes, 40)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            target_name,
            challenge,
            context,
            target_info,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = MessageWriter::new(CHALLENGE, 48);
        writer.put_buffer(&self.target_name);
        writer.put_u32(self.flags);
        writer.put_raw(&self.challenge);
        writer.put_raw(&self.context);
        writer.put_buffer(&self.target_info);
        writer.finish()
    }

    pub fn set_target_name(&mut self, target_name: Vec<u8>) {
        self.target_name = target_name;
    }

    fn is_unicode(&self) -> bool {
        self.flags & flags::NEGOTIATE_UNICODE != 0
    }

    /// Answer the challenge with NTLMv2 responses.
    ///
    /// The target name is used as the user's domain, so callers that know the
    /// domain replace it (UTF-16LE encoded) before calling this.
    pub fn response(&self, user: &str, password: &str, options: &ResponseOptions) -> AuthenticateMessage {
        let key = ntlmv2_hash(user, password, &self.target_name);

        let lm_response = lmv2_response(&key, &self.challenge, &options.client_challenge);
        let nt_response = ntlmv2_response(
            &key,
            &self.challenge,
            &options.client_challenge,
            options.timestamp,
            &self.target_info,
        );

        let encode = |s: &str| {
            if self.is_unicode() {
                utf16le(s)
            } else {
                s.as_bytes().to_vec()
            }
        };

        AuthenticateMessage {
            flags: flags::TYPE3_DEFAULT,
            lm_response,
            nt_response,
            domain: self.target_name.clone(),
            user: encode(user),
            workstation: encode(&options.workstation),
            session_key: Vec::new(),
        }
    }
}

// ============================================================================
// Type 3
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticateMessage {
    pub flags: u32,
    pub lm_response: Vec<u8>,
    pub nt_response: Vec<u8>,
    pub domain: Vec<u8>,
    pub user: Vec<u8>,
    pub workstation: Vec<u8>,
    pub session_key: Vec<u8>,
}

impl AuthenticateMessage {
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = MessageWriter::new(AUTHENTICATE, 64);
        writer.put_buffer(&self.lm_response);
        writer.put_buffer(&self.nt_response);
        writer.put_buffer(&self.domain);
        writer.put_buffer(&self.user);
        writer.put_buffer(&self.workstation);
        writer.put_buffer(&self.session_key);
        writer.put_u32(self.flags);
        writer.finish()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CryptoError> {
        check_header(bytes, AUTHENTICATE)?;
        Ok(Self {
            lm_response: security_buffer(bytes, 12)?.to_vec(),
            nt_response: security_buffer(bytes, 20)?.to_vec(),
            domain: security_buffer(bytes, 28)?.to_vec(),
            user: security_buffer(bytes, 36)?.to_vec(),
            workstation: security_buffer(bytes, 44)?.to_vec(),
            session_key: security_buffer(bytes, 52)?.to_vec(),
            flags: read_u32(bytes, 60)?,
        })
    }
}

/// Per-response randomness; [`ResponseOptions::generate`] for real exchanges.
#[derive(Debug, Clone)]
pub struct ResponseOptions {
    pub client_challenge: [u8; 8],
    /// FILETIME: 100ns intervals since 1601-01-01
    pub timestamp: u64,
    pub workstation: String,
}

impl ResponseOptions {
    pub fn generate() -> Self {
        let now = chrono::Utc::now();
        let secs = now.timestamp().max(0) as u64 + FILETIME_UNIX_OFFSET;
        let timestamp = secs * 10_000_000 + u64::from(now.timestamp_subsec_nanos()) / 100;

        Self {
            client_challenge: rand::random(),
            timestamp,
            workstation: String::new(),
        }
    }
}

// ============================================================================
// NTLMv2 computation
// ============================================================================

/// NTOWFv1: MD4 of the UTF-16LE password
pub fn nt_hash(password: &str) -> [u8; 16] {
    md4_digest(&utf16le(password))
}

/// NTOWFv2 keyed on the upper-cased user and the raw target (domain) bytes
pub fn ntlmv2_hash(user: &str, password: &str, target: &[u8]) -> [u8; 16] {
    let mut identity = utf16le(&user.to_uppercase());
    identity.extend_from_slice(target);
    hmac_md5(&nt_hash(password), &identity)
}

pub fn lmv2_response(key: &[u8; 16], server_challenge: &[u8; 8], client_challenge: &[u8; 8]) -> Vec<u8> {
    let mut data = server_challenge.to_vec();
    data.extend_from_slice(client_challenge);

    let mut response = hmac_md5(key, &data).to_vec();
    response.extend_from_slice(client_challenge);
    response
}

pub fn ntlmv2_response(
    key: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
    timestamp: u64,
    target_info: &[u8],
) -> Vec<u8> {
    let mut blob = vec![0x01, 0x01, 0x00, 0x00];
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let mut data = server_challenge.to_vec();
    data.extend_from_slice(&blob);

    let mut response = hmac_md5(key, &data).to_vec();
    response.extend_from_slice(&blob);
    response
}

// ============================================================================
// Wire helpers
// ============================================================================

/// Fixed header followed by a payload that security buffers point into.
struct MessageWriter {
    header: Vec<u8>,
    payload: Vec<u8>,
    header_len: usize,
}

impl MessageWriter {
    fn new(message_type: u32, header_len: usize) -> Self {
        let mut header = Vec::with_capacity(header_len);
        header.extend_from_slice(SIGNATURE);
        header.extend_from_slice(&message_type.to_le_bytes());
        Self {
            header,
            payload: Vec::new(),
            header_len,
        }
    }

    fn put_u32(&mut self, value: u32) {
        self.header.extend_from_slice(&value.to_le_bytes());
    }

    fn put_raw(&mut self, bytes: &[u8]) {
        self.header.extend_from_slice(bytes);
    }

    fn put_buffer(&mut self, bytes: &[u8]) {
        let offset = (self.header_len + self.payload.len()) as u32;
        let len = bytes.len() as u16;
        self.header.extend_from_slice(&len.to_le_bytes());
        self.header.extend_from_slice(&len.to_le_bytes());
        self.header.extend_from_slice(&offset.to_le_bytes());
        self.payload.extend_from_slice(bytes);
    }

    fn finish(mut self) -> Vec<u8> {
        debug_assert_eq!(self.header.len(), self.header_len);
        self.header.append(&mut self.payload);
        self.header
    }
}

fn check_header(bytes: &[u8], expected: u32) -> Result<(), CryptoError> {
    if bytes.len() < 12 || &bytes[..8] != SIGNATURE {
        return Err(CryptoError::InvalidNtlmMessage("missing NTLMSSP signature".into()));
    }
    let message_type = read_u32(bytes, 8)?;
    if message_type != expected {
        return Err(CryptoError::InvalidNtlmMessage(format!(
            "expected message type {}, got {}",
            expected, message_type
        )));
    }
    Ok(())
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, CryptoError> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| CryptoError::InvalidNtlmMessage(format!("truncated at offset {}", at)))
}

/// Resolve the security buffer descriptor (len, max len, offset) found at `at`.
pub fn security_buffer(bytes: &[u8], at: usize) -> Result<&[u8], CryptoError> {
    let descriptor = bytes
        .get(at..at + 8)
        .ok_or_else(|| CryptoError::InvalidNtlmMessage(format!("truncated at offset {}", at)))?;

    let len = u16::from_le_bytes([descriptor[0], descriptor[1]]) as usize;
    let offset = u32::from_le_bytes([descriptor[4], descriptor[5], descriptor[6], descriptor[7]]) as usize;

    bytes.get(offset..offset + len).ok_or_else(|| {
        CryptoError::InvalidNtlmMessage(format!(
            "security buffer at {} points outside the message ({}+{})",
            at, offset, len
        ))
    })
}
