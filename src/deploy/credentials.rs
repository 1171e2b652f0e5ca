//! Generated secrets: per-key database passwords and the cluster join key.
//!
//! Each password is generated once per key and cached for the lifetime of
//! the store, so the `.env` file, compose manifest and `system.yaml` always
//! agree. The join key is generated at most once.

use dashmap::DashMap;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use std::fmt;
use std::sync::OnceLock;

/// Length of generated passwords
pub const PASSWORD_LENGTH: usize = 24;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
/// Specials safe inside single-quoted env values and YAML scalars
const SPECIAL: &[u8] = b"!@#%^&*()-_=+[]{}|;:,.<>/?";

/// Caches generated secrets for one deployment
#[derive(Clone, Default)]
pub struct CredentialStore {
    passwords: DashMap<String, String>,
    join_key: OnceLock<String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a caller-provided join key, used verbatim
    pub fn with_join_key(join_key: impl Into<String>) -> Self {
        let store = Self::default();
        let _ = store.join_key.set(join_key.into());
        store
    }

    /// Password for `key`, generated on first use
    pub fn generate_password(&self, key: &str) -> String {
        self.passwords
            .entry(key.to_string())
            .or_insert_with(generate_secure_password)
            .clone()
    }

    /// Same as [`generate_password`](Self::generate_password)
    pub fn get_password(&self, key: &str) -> String {
        self.generate_password(key)
    }

    /// Join key, generated on first use as 32 lowercase hex characters
    pub fn generate_join_key(&self) -> String {
        self.join_key.get_or_init(generate_hex_join_key).clone()
    }

    /// Join key if one was generated or provided
    pub fn join_key(&self) -> Option<&str> {
        self.join_key.get().map(String::as_str)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.passwords.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        f.debug_struct("CredentialStore")
            .field("passwords", &keys)
            .field("join_key", &self.join_key.get().map(|_| "<redacted>"))
            .finish()
    }
}

/// Random password with at least one upper, lower, digit and special character
pub fn generate_secure_password() -> String {
    let mut rng = rand::rng();
    let all: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL].concat();

    let mut chars: Vec<u8> = Vec::with_capacity(PASSWORD_LENGTH);
    for class in [UPPER, LOWER, DIGITS, SPECIAL] {
        if let Some(&c) = class.choose(&mut rng) {
            chars.push(c);
        }
    }
    while chars.len() < PASSWORD_LENGTH {
        if let Some(&c) = all.choose(&mut rng) {
            chars.push(c);
        }
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

fn generate_hex_join_key() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
