//! Credential storage for the Bluesky app password
//!
//! Credentials live in the OS keyring under a fixed service name. Two
//! entries make up one stored credential:
//!
//! - account `"username"` holds the remembered handle
//! - account `{handle}` holds that handle's app password
//!
//! [`CredentialManager`] wraps a [`CredentialStore`] backend and a
//! [`Prompter`] for the interactive fallback. A broken keyring never makes
//! the CLI unusable: lookup faults are logged and the user is prompted
//! instead.
//!
//! # Example
//!
//! ```no_run
//! use libskypost::credentials::{ClearOutcome, CredentialManager};
//! use secrecy::ExposeSecret;
//!
//! # fn example() -> libskypost::error::Result<()> {
//! let manager = CredentialManager::system();
//!
//! let password = manager.get_credential("Bluesky", "alice.bsky.social")?;
//! assert!(!password.expose_secret().is_empty());
//!
//! match manager.clear_credentials("Bluesky")? {
//!     ClearOutcome::Removed(handle) => println!("Forgot {}", handle),
//!     ClearOutcome::NotFound => println!("Nothing stored"),
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use secrecy::SecretString;

use crate::error::{CredentialError, Result};

/// Keyring account under which the remembered username is stored
pub const USERNAME_KEY: &str = "username";

pub const STORE_CREDENTIALS_PROMPT: &str = "Store credentials in keychain? (y/n): ";

/// Key-value secret storage keyed by (service, account)
pub trait CredentialStore: Send + Sync {
    /// Look up a secret; `Ok(None)` when no entry exists
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()>;

    /// Remove a secret. Deleting a missing entry is not an error.
    fn delete(&self, service: &str, account: &str) -> Result<()>;

    /// Backend identifier for logs
    fn backend_name(&self) -> &str;
}

/// OS-native keyring storage backend
///
/// - **macOS**: Keychain
/// - **Windows**: Credential Manager
/// - **Linux**: Secret Service (GNOME Keyring/KWallet) via D-Bus
///
/// Headless systems without a keyring daemon fail every call with
/// `CredentialError::KeyringUnavailable`.
#[derive(Debug, Default)]
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(service: &str, account: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, account)
            .map_err(|e| CredentialError::KeyringUnavailable(e.to_string()).into())
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved {}/{} from OS keyring", service, account);
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Keyring(e.to_string()).into()),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|e| CredentialError::Keyring(e.to_string()))?;
        tracing::debug!("Stored {}/{} in OS keyring", service, account);
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<()> {
        match Self::entry(service, account)?.delete_password() {
            Ok(()) => {
                tracing::debug!("Deleted {}/{} from OS keyring", service, account);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Keyring(e.to_string()).into()),
        }
    }

    fn backend_name(&self) -> &str {
        "keyring"
    }
}

/// In-memory storage backend
///
/// Clones share the same entries. `failing` builds a store whose every call
/// errors, standing in for a locked or missing keyring.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<(String, String), String>>>,
    mutations: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Number of successful `set`/`delete` calls that changed an entry
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(reason) => Err(CredentialError::Keyring(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn key(service: &str, account: &str) -> (String, String) {
        (service.to_string(), account.to_string())
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&Self::key(service, account))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(Self::key(service, account), secret.to_string());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<()> {
        self.check()?;
        if self
            .entries
            .lock()
            .unwrap()
            .remove(&Self::key(service, account))
            .is_some()
        {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Interactive input used when no stored credential is available
pub trait Prompter {
    /// Read a secret without echo
    fn password(&self, prompt: &str) -> Result<SecretString>;

    /// Ask a y/n question; anything but `y` is no
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Show a message to the user
    fn say(&self, message: &str);
}

/// Prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn password(&self, prompt: &str) -> Result<SecretString> {
        let password = rpassword::prompt_password(prompt).map_err(CredentialError::Prompt)?;
        Ok(SecretString::from(password))
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        if !atty::is(atty::Stream::Stdin) {
            tracing::debug!("stdin is not a terminal, answering no to: {}", prompt.trim());
            return Ok(false);
        }

        print!("{}", prompt);
        io::stdout().flush().map_err(CredentialError::Prompt)?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(CredentialError::Prompt)?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }

    fn say(&self, message: &str) {
        println!("{}", message);
    }
}

/// Prompter that replays canned answers and records what was shown
///
/// Clones share the same script and transcript.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    passwords: Arc<Mutex<VecDeque<String>>>,
    answers: Arc<Mutex<VecDeque<bool>>>,
    transcript: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(self, password: &str) -> Self {
        self.passwords.lock().unwrap().push_back(password.to_string());
        self
    }

    pub fn with_answer(self, answer: bool) -> Self {
        self.answers.lock().unwrap().push_back(answer);
        self
    }

    /// Prompts and messages, in the order they were shown
    pub fn transcript(&self) -> Vec<String> {
        self.transcript.lock().unwrap().clone()
    }

    fn log(&self, line: &str) {
        self.transcript.lock().unwrap().push(line.to_string());
    }
}

impl Prompter for ScriptedPrompter {
    fn password(&self, prompt: &str) -> Result<SecretString> {
        self.log(prompt);
        let password = self.passwords.lock().unwrap().pop_front().ok_or_else(|| {
            CredentialError::Prompt(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no scripted password left",
            ))
        })?;
        Ok(SecretString::from(password))
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.log(prompt);
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }

    fn say(&self, message: &str) {
        self.log(message);
    }
}

/// Result of [`CredentialManager::clear_credentials`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The username marker and the named account's secret were removed
    Removed(String),
    /// Nothing was stored; the store was not touched
    NotFound,
}

impl std::fmt::Display for ClearOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClearOutcome::Removed(_) => write!(f, "Credentials removed from keychain."),
            ClearOutcome::NotFound => write!(f, "No stored credentials found."),
        }
    }
}

/// Credential lookup with interactive fallback
pub struct CredentialManager {
    store: Box<dyn CredentialStore>,
    prompter: Box<dyn Prompter>,
}

impl CredentialManager {
    pub fn new(store: impl CredentialStore + 'static, prompter: impl Prompter + 'static) -> Self {
        Self {
            store: Box::new(store),
            prompter: Box::new(prompter),
        }
    }

    /// OS keyring with terminal prompts
    pub fn system() -> Self {
        Self::new(KeyringStore::new(), TerminalPrompter)
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    /// The stored secret for `username`, if the remembered username matches
    fn lookup(&self, service: &str, username: &str) -> Result<Option<SecretString>> {
        let Some(stored_username) = self.store.get(service, USERNAME_KEY)? else {
            return Ok(None);
        };

        if stored_username != username {
            tracing::debug!(
                "Stored credentials belong to {}, not {}",
                stored_username,
                username
            );
            return Ok(None);
        }

        Ok(self
            .store
            .get(service, &stored_username)?
            .map(SecretString::from))
    }

    fn password_prompt(service: &str) -> String {
        format!("Enter your {} password: ", service)
    }

    /// Get the password for `username`, prompting if none is stored
    ///
    /// When prompting, offers to remember the credentials. Store faults are
    /// logged and degrade to a plain prompt; only a failed prompt is an
    /// error.
    pub fn get_credential(&self, service: &str, username: &str) -> Result<SecretString> {
        match self.lookup(service, username) {
            Ok(Some(password)) => return Ok(password),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Keyring access error ({}): {}", self.backend_name(), e);
                self.prompter
                    .say(&format!("Warning: Could not access secure keyring: {}", e));
                return self.prompter.password(&Self::password_prompt(service));
            }
        }

        let password = self.prompter.password(&Self::password_prompt(service))?;

        if self.prompter.confirm(STORE_CREDENTIALS_PROMPT)? {
            if let Err(e) = self.set_credentials(service, username, &password) {
                tracing::error!("Failed to store credentials: {}", e);
                self.prompter
                    .say(&format!("Warning: Could not store credentials: {}", e));
            }
        }

        Ok(password)
    }

    /// Remember `username` and its password
    pub fn set_credentials(
        &self,
        service: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        use secrecy::ExposeSecret;

        // Only one account is remembered; drop the previous one's secret
        if let Some(previous) = self.store.get(service, USERNAME_KEY)? {
            if previous != username {
                self.store.delete(service, &previous)?;
                tracing::debug!("Forgot stored credentials for {}", previous);
            }
        }

        self.store.set(service, USERNAME_KEY, username)?;
        self.store.set(service, username, password.expose_secret())?;
        self.prompter
            .say(&format!("Credentials for {} stored securely.", username));
        Ok(())
    }

    /// Forget the remembered username and its password
    pub fn clear_credentials(&self, service: &str) -> Result<ClearOutcome> {
        let Some(stored_username) = self.store.get(service, USERNAME_KEY)? else {
            return Ok(ClearOutcome::NotFound);
        };

        self.store.delete(service, USERNAME_KEY)?;
        self.store.delete(service, &stored_username)?;
        tracing::info!("Removed stored credentials for {}", stored_username);

        Ok(ClearOutcome::Removed(stored_username))
    }
}
