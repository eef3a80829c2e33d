//! Secret protection: key derivation, authenticated encryption and digests.
//!
//! Values are sealed with AES-256-GCM. Each call draws a fresh random nonce,
//! and the nonce travels with the ciphertext since it does not need to be secret:
//!
//! ```text
//! <hex nonce>:<hex tag>:<hex ciphertext>
//! ```
//!
//! New bundles use a 12-byte nonce. Bundles with a 16-byte nonce, as written
//! by earlier deployments under the same passphrase, are still accepted.
//!
//! The tag is verified before any plaintext is released, so a tampered bundle
//! fails as a whole.
//!
//! This is not used for API keys. Those are stored as bcrypt hashes because
//! they only ever need to be compared, never recovered.

use aes_gcm::{
    Aes256Gcm, AesGcm, Key,
    aead::{AeadInPlace, KeyInit, consts::U16, generic_array::GenericArray},
    aes::Aes256,
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// AES-256-GCM with a 128-bit nonce, for reading older bundles.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Static salt for passphrase key derivation.
///
/// Every instance derives the same key from the same passphrase, which is
/// what lets separately started processes read each other's bundles.
const KDF_SALT: &[u8] = b"salt";

/// scrypt cost parameters (N = 2^14, r = 8, p = 1).
const KDF_LOG_N: u8 = 14;
const KDF_R: u32 = 8;
const KDF_P: u32 = 1;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const LEGACY_NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Domain separation for the digest subkey.
const DIGEST_CONTEXT: &[u8] = b"tenant-setting-digest";

const FIELD_DELIMITER: char = ':';

/// Errors returned by [`SecretProtection::decrypt`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecryptError {
    /// The bundle does not have exactly three delimited fields.
    #[error("ciphertext bundle must have exactly 3 fields, found {0}")]
    BundleMalformed(usize),

    /// The nonce, tag or body failed authentication.
    #[error("ciphertext failed authentication")]
    AuthenticationFailure,

    /// Authenticated plaintext is not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    NotUtf8,
}

/// A derived 256-bit encryption key.
///
/// Built once at startup and handed to [`SecretProtection::new`]. There is no
/// way to change it afterwards.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Derive the key from the configured passphrase.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingEncryptionKey`] if the passphrase is absent or blank
    /// - [`ConfigError::KeyDerivation`] if scrypt rejects its parameters
    pub fn derive(passphrase: Option<&str>) -> Result<Self, ConfigError> {
        let passphrase = passphrase
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingEncryptionKey)?;

        let params = scrypt::Params::new(KDF_LOG_N, KDF_R, KDF_P, KEY_LEN)
            .map_err(|e| ConfigError::KeyDerivation(e.to_string()))?;

        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(passphrase.as_bytes(), KDF_SALT, &params, &mut key)
            .map_err(|e| ConfigError::KeyDerivation(e.to_string()))?;

        Ok(Self(key))
    }

    /// A separate key for `context`, so the encryption key itself is never
    /// used for anything but encryption.
    fn subkey(&self, context: &[u8]) -> [u8; KEY_LEN] {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.0).expect("HMAC key length is valid");
        mac.update(context);

        let mut subkey = [0u8; KEY_LEN];
        subkey.copy_from_slice(&mac.finalize().into_bytes());
        subkey
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Authenticated encryption and keyed digests over a single process-wide key.
///
/// Stateless per call, so one instance can be shared behind an `Arc`.
#[derive(Clone)]
pub struct SecretProtection {
    cipher: Aes256Gcm,
    legacy_cipher: Aes256Gcm16,
    digest_key: [u8; KEY_LEN],
}

impl std::fmt::Debug for SecretProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretProtection").finish_non_exhaustive()
    }
}

impl SecretProtection {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0)),
            legacy_cipher: Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(&key.0)),
            digest_key: key.subkey(DIGEST_CONTEXT),
        }
    }

    /// Encrypt `plaintext` into a `<nonce>:<tag>:<ciphertext>` bundle.
    ///
    /// Encrypting the same plaintext twice yields different bundles.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let nonce: [u8; NONCE_LEN] = rand::random();
        let mut buffer = plaintext.as_bytes().to_vec();

        // Only fails past GCM's ~64 GiB plaintext limit
        let tag = self
            .cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", &mut buffer)
            .expect("plaintext within AES-GCM length limit");

        format!(
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(buffer)
        )
    }

    /// Decrypt a bundle produced by [`encrypt`](Self::encrypt), or an older
    /// bundle with a 16-byte nonce.
    ///
    /// # Errors
    ///
    /// - [`DecryptError::BundleMalformed`] unless there are exactly three fields
    /// - [`DecryptError::AuthenticationFailure`] if any field was altered
    pub fn decrypt(&self, bundle: &str) -> Result<String, DecryptError> {
        let fields: Vec<&str> = bundle.split(FIELD_DELIMITER).collect();
        let (nonce_hex, tag_hex, body_hex) = match fields.as_slice() {
            [nonce, tag, body] => (*nonce, *tag, *body),
            _ => return Err(DecryptError::BundleMalformed(fields.len())),
        };

        // Undecodable fields cannot authenticate either
        let nonce = hex::decode(nonce_hex).map_err(|_| DecryptError::AuthenticationFailure)?;
        let tag = decode_exact(tag_hex, TAG_LEN)?;
        let mut buffer =
            hex::decode(body_hex).map_err(|_| DecryptError::AuthenticationFailure)?;
        let tag = GenericArray::from_slice(&tag);

        let verified = match nonce.len() {
            NONCE_LEN => self.cipher.decrypt_in_place_detached(
                GenericArray::from_slice(&nonce),
                b"",
                &mut buffer,
                tag,
            ),
            LEGACY_NONCE_LEN => self.legacy_cipher.decrypt_in_place_detached(
                GenericArray::from_slice(&nonce),
                b"",
                &mut buffer,
                tag,
            ),
            _ => return Err(DecryptError::AuthenticationFailure),
        };
        verified.map_err(|_| DecryptError::AuthenticationFailure)?;

        String::from_utf8(buffer).map_err(|_| DecryptError::NotUtf8)
    }

    /// Keyed HMAC-SHA256 hex digest of a secret value.
    ///
    /// Deterministic for a given encryption key, so stored values can be
    /// compared without decrypting them. Useless for guessing without the key.
    /// Stays server-side.
    pub fn digest(&self, value: &str) -> String {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.digest_key).expect("HMAC key length is valid");
        mac.update(value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// SHA-256 hex digest for equality checks on non-secret values.
    ///
    /// Not suitable for secrets or credentials: it is fast, unsalted and
    /// unkeyed. Use [`digest`](Self::digest) for those.
    pub fn fingerprint(value: &str) -> String {
        hex::encode(Sha256::digest(value.as_bytes()))
    }
}

fn decode_exact(field: &str, len: usize) -> Result<Vec<u8>, DecryptError> {
    match hex::decode(field) {
        Ok(bytes) if bytes.len() == len => Ok(bytes),
        _ => Err(DecryptError::AuthenticationFailure),
    }
}
