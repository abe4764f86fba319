//! Field-level envelope encryption for Keystore.
//!
//! This crate is the cryptographic core of the credential vault. Nothing
//! here performs I/O; every function is pure and safe to call concurrently.
//!
//! # Modules
//!
//! - [`kdf`]: SHA-256 key derivation, per-user salts and field keys.
//! - [`crypto`]: AES-256-GCM encryption/decryption of single fields.
//! - [`envelope`]: The `(ciphertext, nonce, tag)` envelope and its stored form.
//! - [`identity`]: Lookup identifiers derived from normalized emails.
//! - [`session`]: Token invalidation after credential rotation.
//! - [`record`]: The vault record model and its update rules.
//! - [`error`]: Unified error types.
//!
//! # Quick Start
//!
//! ```rust
//! use keystore_vault::{crypto, identity, EncryptionSalt, FieldKey};
//!
//! # fn example() -> keystore_vault::Result<()> {
//! // At registration: index the user and generate their salt.
//! let lookup_id = identity::identify("Alice@Example.com");
//! let salt = EncryptionSalt::generate()?;
//!
//! // Seal a field under the user's key.
//! let key = FieldKey::derive(&salt);
//! let name = crypto::encrypt("Alice", &key)?;
//!
//! assert_eq!(crypto::decrypt(&name, &key)?, "Alice");
//! assert_eq!(lookup_id, identity::identify("alice@example.com"));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod kdf;
pub mod record;
pub mod session;

// Re-export the most commonly used types at the crate root for convenience.
pub use envelope::EncryptedField;
pub use error::{Result, VaultError};
pub use identity::LookupId;
pub use kdf::{EncryptionSalt, FieldKey};
pub use record::{EntryFields, EntryPatch, PlainEntry, SealedEntry, VaultRecord};
pub use session::{CredentialClock, is_token_valid};
