//! Single-slot credential store guarded by one mutex.

// self
use crate::{_prelude::*, credential::Credential};

/// Holds at most one live [`Credential`].
///
/// Readers receive owned snapshots, and writers swap the whole record in one critical section, so
/// a token is never observed alongside the type or expiry of a different issuance.
#[derive(Debug, Default)]
pub struct TokenStore(Mutex<Option<Credential>>);
impl TokenStore {
	/// Returns a snapshot of the current credential without mutating the slot.
	pub fn peek(&self) -> Option<Credential> {
		self.0.lock().clone()
	}

	/// Returns the current credential only if it is usable at `now` given `safety_margin`.
	pub fn peek_usable_at(
		&self,
		now: OffsetDateTime,
		safety_margin: Duration,
	) -> Option<Credential> {
		self.0.lock().as_ref().filter(|current| current.is_usable_at(now, safety_margin)).cloned()
	}

	/// Atomically swaps in `credential`, returning the record it replaced.
	pub fn replace(&self, credential: Credential) -> Option<Credential> {
		self.0.lock().replace(credential)
	}

	/// Stores `credential` unless the slot already holds one that expires later.
	///
	/// Returns `false` when the stored record was kept. Overlapping issuances that complete out of
	/// order therefore never replace a longer-lived credential with a shorter-lived one.
	pub fn replace_if_newer(&self, credential: Credential) -> bool {
		let mut slot = self.0.lock();

		if slot.as_ref().is_some_and(|current| current.expires_at > credential.expires_at) {
			return false;
		}

		*slot = Some(credential);

		true
	}

	/// Empties the slot, returning the record that was stored.
	pub fn clear(&self) -> Option<Credential> {
		self.0.lock().take()
	}
}
