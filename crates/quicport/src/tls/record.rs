// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AEAD record protection.
//!
//! Every QUIC packet is sealed as one AES-256-GCM record:
//!
//! ```text
//! +----------------+---------------------------------------+
//! | seq (8, BE)    | AES-256-GCM(key, nonce, packet, aad=∅) |
//! +----------------+---------------------------------------+
//! ```
//!
//! The nonce is `IV XOR be12(seq)`; the sequence counter is strictly
//! monotonic per encryptor and resets to zero on key rotation. Key and IV
//! are swapped atomically so in-flight decrypt calls see a consistent
//! configuration.

use crate::config::{RECORD_SEQ_LEN, TLS_IV_LEN, TLS_KEY_LEN};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use zeroize::Zeroize;

/// Errors raised by the record layer.
#[derive(Debug)]
pub enum RecordError {
    /// Key material is not exactly 32 octets.
    InvalidKey(usize),
    /// IV is not exactly 12 octets.
    InvalidIv(usize),
    /// Record shorter than the 8-octet sequence prefix plus one tag.
    RecordTooShort(usize),
    /// Sealing failed; the record was not produced.
    EncryptionFailed,
    /// Authentication tag mismatch or corrupted ciphertext.
    DecryptionFailed,
    /// The system CSPRNG refused to produce key material.
    KeyGenerationFailed,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey(n) => write!(f, "invalid key length: {} (expected {})", n, TLS_KEY_LEN),
            Self::InvalidIv(n) => write!(f, "invalid IV length: {} (expected {})", n, TLS_IV_LEN),
            Self::RecordTooShort(n) => write!(f, "record too short: {} bytes", n),
            Self::EncryptionFailed => write!(f, "AEAD encryption failed"),
            Self::DecryptionFailed => write!(f, "AEAD decryption failed (tag mismatch or wrong key)"),
            Self::KeyGenerationFailed => write!(f, "system CSPRNG failed to generate key material"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Symmetric key material for the record layer.
///
/// Immutable for the lifetime of one protection epoch; replaced atomically
/// on rotation. Key bytes are scrubbed on drop.
#[derive(Clone)]
pub struct TlsConfig {
    key: [u8; TLS_KEY_LEN],
    iv: [u8; TLS_IV_LEN],
}

impl TlsConfig {
    /// Build a config from explicit key and IV slices.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, RecordError> {
        let key: [u8; TLS_KEY_LEN] =
            key.try_into().map_err(|_| RecordError::InvalidKey(key.len()))?;
        let iv: [u8; TLS_IV_LEN] = iv.try_into().map_err(|_| RecordError::InvalidIv(iv.len()))?;
        Ok(Self { key, iv })
    }

    /// Generate a fresh random key and IV from the system CSPRNG.
    pub fn generate() -> Result<Self, RecordError> {
        let rng = SystemRandom::new();
        let mut key = [0u8; TLS_KEY_LEN];
        let mut iv = [0u8; TLS_IV_LEN];
        rng.fill(&mut key).map_err(|_| RecordError::KeyGenerationFailed)?;
        rng.fill(&mut iv).map_err(|_| RecordError::KeyGenerationFailed)?;
        Ok(Self { key, iv })
    }

    /// All-zero key and IV, for loopback and test topologies only.
    pub fn zeroed() -> Self {
        Self {
            key: [0u8; TLS_KEY_LEN],
            iv: [0u8; TLS_IV_LEN],
        }
    }

    /// Borrow the IV.
    pub fn iv(&self) -> &[u8; TLS_IV_LEN] {
        &self.iv
    }
}

impl Drop for TlsConfig {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material never reaches logs.
        f.debug_struct("TlsConfig").finish_non_exhaustive()
    }
}

/// Capability trait for record protection.
///
/// Concrete implementations are selected at construction; no dynamic
/// dispatch crosses layer boundaries.
pub trait RecordCipher: Send + Sync {
    /// Seal one packet into a sequence-prefixed record.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, RecordError>;

    /// Open one record back into the packet it carried.
    fn decrypt(&self, record: &[u8]) -> Result<Vec<u8>, RecordError>;

    /// Swap key material and reset the sequence counter.
    fn rotate(&self, next: TlsConfig);
}

/// Observer invoked after each key rotation with the number of records
/// sealed under the retiring key.
type RotationObserver = Box<dyn Fn(u64) + Send + Sync>;

struct RotationState {
    interval: Duration,
    last_rotation: Instant,
}

/// AES-256-GCM record protection with scheduled key rotation.
pub struct RecordProtection {
    config: ArcSwap<TlsConfig>,
    /// Next sequence number to seal with; also the count of records sealed.
    seq: Mutex<u64>,
    observers: Mutex<Vec<RotationObserver>>,
    rotation: Mutex<RotationState>,
}

impl RecordProtection {
    /// Create a protection instance with the default rotation interval.
    pub fn new(config: TlsConfig) -> Self {
        Self::with_rotation_interval(config, crate::config::DEFAULT_KEY_ROTATION_INTERVAL)
    }

    /// Create a protection instance with an explicit rotation interval.
    pub fn with_rotation_interval(config: TlsConfig, interval: Duration) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            seq: Mutex::new(0),
            observers: Mutex::new(Vec::new()),
            rotation: Mutex::new(RotationState {
                interval,
                last_rotation: Instant::now(),
            }),
        }
    }

    /// Register an observer notified after each key rotation.
    pub fn register_rotation_observer<F>(&self, observer: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.observers.lock().push(Box::new(observer));
    }

    /// Next sequence number that `encrypt` will use.
    pub fn sequence_number(&self) -> u64 {
        *self.seq.lock()
    }

    /// Rotate to freshly generated key material if the interval elapsed.
    ///
    /// Returns `true` when a rotation happened.
    pub fn maybe_rotate(&self) -> Result<bool, RecordError> {
        let due = {
            let state = self.rotation.lock();
            state.last_rotation.elapsed() >= state.interval
        };
        if !due {
            return Ok(false);
        }
        self.rotate(TlsConfig::generate()?);
        Ok(true)
    }

    fn notify_observers(&self, sealed_under_old_key: u64) {
        let observers = self.observers.lock();
        for observer in observers.iter() {
            if catch_unwind(AssertUnwindSafe(|| observer(sealed_under_old_key))).is_err() {
                log::error!("[TLS] rotation observer panicked; continuing");
            }
        }
    }
}

impl RecordCipher for RecordProtection {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, RecordError> {
        // Counter and config are read under the same lock rotation takes,
        // so a concurrent rotation cannot pair an old sequence number with
        // the new IV. The counter advances whether or not sealing
        // succeeds; a failed record must never cause nonce reuse.
        let (seq, config) = {
            let mut seq_guard = self.seq.lock();
            let seq = *seq_guard;
            *seq_guard += 1;
            (seq, self.config.load_full())
        };
        let nonce = derive_nonce(&config.iv, seq);
        let unbound = UnboundKey::new(&AES_256_GCM, &config.key)
            .map_err(|_| RecordError::EncryptionFailed)?;
        let mut sealing_key = SealingKey::new(unbound, OneShotNonce::new(nonce));

        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| RecordError::EncryptionFailed)?;

        let mut record = Vec::with_capacity(RECORD_SEQ_LEN + in_out.len());
        record.extend_from_slice(&seq.to_be_bytes());
        record.extend_from_slice(&in_out);
        log::debug!("[TLS] sealed record seq={} len={}", seq, record.len());
        Ok(record)
    }

    fn decrypt(&self, record: &[u8]) -> Result<Vec<u8>, RecordError> {
        if record.len() < RECORD_SEQ_LEN + 1 {
            return Err(RecordError::RecordTooShort(record.len()));
        }
        let mut seq_bytes = [0u8; 8];
        seq_bytes.copy_from_slice(&record[..RECORD_SEQ_LEN]);
        let seq = u64::from_be_bytes(seq_bytes);

        let config = self.config.load();
        let nonce = derive_nonce(&config.iv, seq);
        let unbound = UnboundKey::new(&AES_256_GCM, &config.key)
            .map_err(|_| RecordError::DecryptionFailed)?;
        let mut opening_key = OpeningKey::new(unbound, OneShotNonce::new(nonce));

        let mut in_out = record[RECORD_SEQ_LEN..].to_vec();
        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| RecordError::DecryptionFailed)?;
        log::debug!("[TLS] opened record seq={} len={}", seq, plaintext.len());
        Ok(plaintext.to_vec())
    }

    fn rotate(&self, next: TlsConfig) {
        let sealed = {
            let mut seq_guard = self.seq.lock();
            let sealed = *seq_guard;
            *seq_guard = 0;
            self.config.store(Arc::new(next));
            sealed
        };
        {
            let mut state = self.rotation.lock();
            state.last_rotation = Instant::now();
        }
        log::info!("[TLS] key rotated after {} records", sealed);
        self.notify_observers(sealed);
    }
}

/// Per-record nonce: `IV XOR be12(seq)`.
fn derive_nonce(iv: &[u8; TLS_IV_LEN], seq: u64) -> [u8; TLS_IV_LEN] {
    let mut seq_bytes = [0u8; TLS_IV_LEN];
    seq_bytes[TLS_IV_LEN - 8..].copy_from_slice(&seq.to_be_bytes());
    let mut nonce = [0u8; TLS_IV_LEN];
    for (i, out) in nonce.iter_mut().enumerate() {
        *out = iv[i] ^ seq_bytes[i];
    }
    nonce
}

/// Nonce sequence yielding exactly one externally derived nonce.
///
/// ring's `BoundKey` API requires a `NonceSequence`; records derive their
/// nonce from the sequence prefix, so each key binding is used once.
struct OneShotNonce {
    nonce: Option<[u8; TLS_IV_LEN]>,
}

impl OneShotNonce {
    fn new(nonce: [u8; TLS_IV_LEN]) -> Self {
        Self { nonce: Some(nonce) }
    }
}

impl NonceSequence for OneShotNonce {
    fn advance(&mut self) -> Result<Nonce, Unspecified> {
        let bytes = self.nonce.take().ok_or(Unspecified)?;
        Nonce::try_assume_unique_for_key(&bytes)
    }
}
