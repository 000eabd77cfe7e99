//! Database session lifecycle: create, load, unlock, export, lock, close.
//!
//! A [`DatabaseSession`] owns at most one open [`PortfolioDb`] and the
//! password that will seal it on export:
//!
//! ```text
//! Empty ──create──────────────▶ Ready(encrypted)
//! Empty ──load(plain)─────────▶ Ready(encrypted=false)
//! Empty ──load(ENCDB)─────────▶ Locked(pending container)
//! Locked ──unlock(ok)─────────▶ Ready(encrypted=true)
//! Locked ──unlock(wrong pw)───▶ Locked (pending kept)
//! Ready(encrypted) ──lock─────▶ Locked (pending = fresh container)
//! any ──close─────────────────▶ Empty
//! ```
//!
//! Loading is transient: it happens inside a single `&mut self` call and is
//! never observable. Every failure either resets the session to `Empty` or
//! leaves it `Locked`; no half-open handle survives an error.

use std::fs;
use std::path::{Path, PathBuf};

use folio_crypto_core::{envelope, looks_like_container};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::db::PortfolioDb;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File name of an encrypted export.
pub const ENCRYPTED_FILE_NAME: &str = "database.enc";

/// Media type of an encrypted export.
pub const ENCRYPTED_MEDIA_TYPE: &str = "application/octet-stream";

/// File name of a plain (unencrypted) export.
pub const PLAIN_FILE_NAME: &str = "database.db";

/// Media type of a plain (unencrypted) export.
pub const PLAIN_MEDIA_TYPE: &str = "application/x-sqlite3";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Observable session state, safe to hand to a UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SessionStatus {
    /// No database loaded.
    Empty,
    /// A database is open.
    Ready {
        /// Whether exports will be sealed under a password.
        encrypted: bool,
    },
    /// An encrypted container is waiting for its password.
    Locked,
}

impl SessionStatus {
    const fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Ready { encrypted: true } => "ready (encrypted)",
            Self::Ready { encrypted: false } => "ready (unencrypted)",
            Self::Locked => "locked",
        }
    }
}

/// What [`DatabaseSession::load_from_bytes`] did with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadOutcome {
    /// The bytes were a plain database and are now open.
    Opened,
    /// The bytes are an encrypted container; prompt for the password.
    PasswordRequired,
}

/// Which password dialog the user answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PasswordPrompt {
    /// Start a new encrypted database.
    Create,
    /// Unlock the pending encrypted file.
    Unlock,
    /// Replace the password of an encrypted database.
    ChangePassword,
    /// Start encrypting an unencrypted database.
    AddEncryption,
}

/// A file ready to be saved or uploaded.
pub struct ExportedDatabase {
    /// Conventional file name ([`ENCRYPTED_FILE_NAME`] or [`PLAIN_FILE_NAME`]).
    pub file_name: &'static str,
    /// Media type matching `file_name`.
    pub media_type: &'static str,
    /// Whether `bytes` is an `ENCDB` container.
    pub encrypted: bool,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ExportedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedDatabase")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("encrypted", &self.encrypted)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

enum SessionState {
    Empty,
    Ready {
        db: PortfolioDb,
        password: Option<SecretString>,
    },
    Locked {
        pending: Vec<u8>,
    },
}

impl SessionState {
    const fn status(&self) -> SessionStatus {
        match self {
            Self::Empty => SessionStatus::Empty,
            Self::Ready { password, .. } => SessionStatus::Ready {
                encrypted: password.is_some(),
            },
            Self::Locked { .. } => SessionStatus::Locked,
        }
    }
}

// ---------------------------------------------------------------------------
// DatabaseSession
// ---------------------------------------------------------------------------

/// The single active local database session.
///
/// Every mutating operation takes `&mut self`, so two transitions can never
/// interleave on the same session.
pub struct DatabaseSession {
    state: SessionState,
    source_file: Option<PathBuf>,
}

impl std::fmt::Debug for DatabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSession")
            .field("status", &self.status())
            .field("source_file", &self.source_file)
            .finish()
    }
}

impl Default for DatabaseSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseSession {
    /// A session with nothing loaded.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Empty,
            source_file: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// `true` when a database is open and exports will be encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        matches!(self.status(), SessionStatus::Ready { encrypted: true })
    }

    /// The file the session was loaded from, if any.
    #[must_use]
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// The open database, when `Ready`.
    #[must_use]
    pub const fn database(&self) -> Option<&PortfolioDb> {
        match &self.state {
            SessionState::Ready { db, .. } => Some(db),
            _ => None,
        }
    }

    /// The raw container bytes waiting for a password, when `Locked`.
    #[must_use]
    pub fn pending_source(&self) -> Option<&[u8]> {
        match &self.state {
            SessionState::Locked { pending } => Some(pending),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Replace the session with a new, empty, unencrypted database.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EngineInitFailed`] or [`VaultError::MigrationFailed`];
    /// the session is `Empty` afterwards.
    pub fn create_empty(&mut self) -> Result<(), VaultError> {
        self.create(None)
    }

    /// Replace the session with a new, empty database that will be sealed
    /// under `password` on export.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EmptyPassword`] without touching the session,
    /// otherwise as [`create_empty`](Self::create_empty).
    pub fn create_encrypted(&mut self, password: &str) -> Result<(), VaultError> {
        let password = non_empty(password)?;
        self.create(Some(password))
    }

    fn create(&mut self, password: Option<SecretString>) -> Result<(), VaultError> {
        self.reset();
        let db = PortfolioDb::open_empty()?;
        let encrypted = password.is_some();
        self.state = SessionState::Ready { db, password };
        info!(encrypted, "created new database");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Route raw file bytes into the session.
    ///
    /// Bytes starting with the container magic are held as the pending source
    /// and the session becomes `Locked`; no password is guessed. Anything
    /// else is opened directly as an unencrypted database.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EngineInitFailed`] or [`VaultError::MigrationFailed`]
    /// for a plain file the engine rejects; the session is `Empty` afterwards.
    pub fn load_from_bytes(&mut self, bytes: Vec<u8>) -> Result<LoadOutcome, VaultError> {
        self.reset();

        if looks_like_container(&bytes) {
            debug!(size_bytes = bytes.len(), "encrypted container detected");
            self.state = SessionState::Locked { pending: bytes };
            return Ok(LoadOutcome::PasswordRequired);
        }

        match PortfolioDb::from_bytes(&bytes) {
            Ok(db) => {
                self.state = SessionState::Ready { db, password: None };
                info!(size_bytes = bytes.len(), "opened unencrypted database");
                Ok(LoadOutcome::Opened)
            }
            Err(e) => {
                warn!(error = %e, "failed to open database");
                Err(e)
            }
        }
    }

    /// Read `path` and route its contents through
    /// [`load_from_bytes`](Self::load_from_bytes), remembering the file.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the file cannot be read (the session is
    /// left untouched), otherwise as [`load_from_bytes`](Self::load_from_bytes).
    pub fn load_from_file(&mut self, path: &Path) -> Result<LoadOutcome, VaultError> {
        let bytes = fs::read(path)?;
        let outcome = self.load_from_bytes(bytes)?;
        self.source_file = Some(path.to_path_buf());
        Ok(outcome)
    }

    /// Decrypt the pending container and open it.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTransition`] unless `Locked`.
    /// - [`VaultError::EmptyPassword`] / [`VaultError::DecryptionFailed`]:
    ///   the session stays `Locked` with its pending source, ready for a retry.
    /// - [`VaultError::MalformedContainer`], [`VaultError::EngineInitFailed`],
    ///   [`VaultError::MigrationFailed`]: the session resets to `Empty`.
    pub fn unlock(&mut self, password: &str) -> Result<(), VaultError> {
        let SessionState::Locked { pending } = &self.state else {
            return Err(self.invalid("unlock"));
        };
        let password = non_empty(password)?;

        let opened = envelope::open(pending, password.expose_secret())
            .map_err(VaultError::from)
            .and_then(|plaintext| PortfolioDb::from_bytes(plaintext.expose()));

        match opened {
            Ok(db) => {
                self.state = SessionState::Ready {
                    db,
                    password: Some(password),
                };
                info!("unlocked encrypted database");
                Ok(())
            }
            Err(VaultError::DecryptionFailed) => {
                debug!("unlock rejected, keeping pending source");
                Err(VaultError::DecryptionFailed)
            }
            Err(e) => {
                warn!(error = %e, "pending source unusable, resetting session");
                self.reset();
                Err(e)
            }
        }
    }

    /// Dismiss the password prompt for the pending file.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidTransition`] unless `Locked`.
    pub fn cancel_unlock(&mut self) -> Result<(), VaultError> {
        if !matches!(self.state, SessionState::Locked { .. }) {
            return Err(self.invalid("cancel unlock"));
        }
        self.reset();
        debug!("unlock cancelled");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Serialize the open database, sealing it when a password is set.
    ///
    /// Does not change the session.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTransition`] unless `Ready`.
    /// - [`VaultError::Database`] / [`VaultError::Io`] if serialization fails.
    /// - [`VaultError::Crypto`] if sealing fails.
    pub fn export(&self) -> Result<ExportedDatabase, VaultError> {
        let SessionState::Ready { db, password } = &self.state else {
            return Err(self.invalid("export"));
        };

        let mut raw = db.to_bytes()?;
        let exported = match password {
            Some(password) => {
                let sealed = envelope::seal(&raw, password.expose_secret());
                raw.zeroize();
                ExportedDatabase {
                    file_name: ENCRYPTED_FILE_NAME,
                    media_type: ENCRYPTED_MEDIA_TYPE,
                    encrypted: true,
                    bytes: sealed?,
                }
            }
            None => ExportedDatabase {
                file_name: PLAIN_FILE_NAME,
                media_type: PLAIN_MEDIA_TYPE,
                encrypted: false,
                bytes: raw,
            },
        };

        debug!(
            encrypted = exported.encrypted,
            size_bytes = exported.bytes.len(),
            "database exported"
        );
        Ok(exported)
    }

    /// Export into `dir` under the conventional file name.
    ///
    /// The file is written to a `.tmp` sibling and renamed into place. If
    /// either step fails the `.tmp` file is removed.
    ///
    /// # Errors
    ///
    /// As [`export`](Self::export), plus [`VaultError::Io`] on write failure.
    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf, VaultError> {
        let exported = self.export()?;
        let path = dir.join(exported.file_name);
        let tmp = path.with_extension("tmp");

        fs::create_dir_all(dir)?;
        if let Err(e) = fs::write(&tmp, &exported.bytes).and_then(|()| fs::rename(&tmp, &path)) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(error = %cleanup, "no partial export to remove");
            }
            warn!(error = %e, "export write failed");
            return Err(e.into());
        }

        info!(encrypted = exported.encrypted, "export written");
        Ok(path)
    }

    // -----------------------------------------------------------------------
    // Password management
    // -----------------------------------------------------------------------

    /// Replace the password of an encrypted database.
    ///
    /// Nothing is re-encrypted now; the next export uses the new password.
    ///
    /// # Errors
    ///
    /// - [`VaultError::EmptyPassword`] for an empty password.
    /// - [`VaultError::InvalidTransition`] unless `Ready(encrypted=true)`.
    pub fn change_password(&mut self, new_password: &str) -> Result<(), VaultError> {
        self.set_password(new_password, true, "change password")?;
        info!("password changed");
        Ok(())
    }

    /// Start encrypting an unencrypted database.
    ///
    /// # Errors
    ///
    /// - [`VaultError::EmptyPassword`] for an empty password.
    /// - [`VaultError::InvalidTransition`] unless `Ready(encrypted=false)`.
    pub fn add_encryption(&mut self, new_password: &str) -> Result<(), VaultError> {
        self.set_password(new_password, false, "add encryption")?;
        info!("encryption enabled");
        Ok(())
    }

    fn set_password(
        &mut self,
        new_password: &str,
        expect_encrypted: bool,
        operation: &'static str,
    ) -> Result<(), VaultError> {
        if self.status() != (SessionStatus::Ready { encrypted: expect_encrypted }) {
            return Err(self.invalid(operation));
        }
        let new_password = non_empty(new_password)?;
        if let SessionState::Ready { password, .. } = &mut self.state {
            *password = Some(new_password);
        }
        Ok(())
    }

    /// Answer a password dialog, dispatching to the matching transition.
    ///
    /// # Errors
    ///
    /// As the operation `prompt` maps to.
    pub fn submit_password(
        &mut self,
        prompt: PasswordPrompt,
        password: &str,
    ) -> Result<(), VaultError> {
        match prompt {
            PasswordPrompt::Create => self.create_encrypted(password),
            PasswordPrompt::Unlock => self.unlock(password),
            PasswordPrompt::ChangePassword => self.change_password(password),
            PasswordPrompt::AddEncryption => self.add_encryption(password),
        }
    }

    // -----------------------------------------------------------------------
    // Lock / close
    // -----------------------------------------------------------------------

    /// Seal the open database under the current password, drop the handle
    /// and the password, and wait for an unlock.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidTransition`] unless `Ready(encrypted=true)`.
    /// - Export errors; the session stays `Ready` in that case.
    pub fn lock(&mut self) -> Result<(), VaultError> {
        if !self.is_encrypted() {
            return Err(self.invalid("lock"));
        }
        let exported = self.export()?;
        self.state = SessionState::Locked {
            pending: exported.bytes,
        };
        info!("database locked");
        Ok(())
    }

    /// Drop everything and return to `Empty`.
    pub fn close(&mut self) {
        self.reset();
        info!("session closed");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Drop the current handle, password and pending source.
    fn reset(&mut self) {
        self.state = SessionState::Empty;
        self.source_file = None;
    }

    fn invalid(&self, operation: &'static str) -> VaultError {
        VaultError::InvalidTransition {
            operation,
            state: self.status().label(),
        }
    }
}

fn non_empty(password: &str) -> Result<SecretString, VaultError> {
    if password.is_empty() {
        return Err(VaultError::EmptyPassword);
    }
    Ok(SecretString::from(password.to_owned()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
