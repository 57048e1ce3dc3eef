//! The `/verify` state machine.
//!
//! A validation request resolves through a fixed decision tree; the first
//! matching branch is the outcome and nothing past it runs. The ordering is a
//! security property: authentication and scoping gates come before anything
//! that could disclose key state, expiry is checked before any HWID logic so
//! an expired key can never bind or rebind, and the unbound branch precedes
//! the match/mismatch branches because a key with no stored HWID is not a
//! mismatch.

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use crate::db::Store;
use crate::services::AuthService;

/// A validation request. All four fields are required; empty means missing.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub key_code: String,
    pub hwid: String,
    pub token: String,
    pub service_id: String,
}

/// The authoritative outcome of one validation request.
///
/// `Bound` and `Valid` are the only accepting verdicts. `UnknownKey`,
/// `Expired` and `HwidMismatch` are business outcomes, deliberately reported
/// inside a successful response envelope so the HTTP status does not leak
/// whether a key exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// One or more request parameters were missing or empty.
    MissingParams,
    /// The bearer token did not resolve to a user.
    InvalidToken,
    /// No key with the presented code exists.
    UnknownKey,
    /// The key belongs to a different account than the token's user.
    WrongOwner,
    /// The key has no service or is scoped to a different service.
    WrongService,
    /// The key's expiration date has passed.
    Expired,
    /// First use: the key was unbound and is now locked to the presented HWID.
    Bound,
    /// The key is bound to this HWID; `last_used` was refreshed.
    Valid,
    /// The key is currently bound to a different device.
    HwidMismatch,
}

impl Verdict {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Bound | Self::Valid)
    }
}

#[derive(Clone)]
pub struct ValidationEngine {
    store: Store,
    auth: AuthService,
}

impl ValidationEngine {
    #[must_use]
    pub const fn new(store: Store, auth: AuthService) -> Self {
        Self { store, auth }
    }

    /// Runs the decision tree for one request, mutating the key record as a
    /// side effect on the binding and touch branches.
    ///
    /// The key lookup, the HWID check and the mutation share one store lock,
    /// so two concurrent requests cannot both bind the same key. A persist
    /// failure after an accepting decision is an error, never a false
    /// positive.
    pub async fn verify(&self, request: &VerifyRequest) -> anyhow::Result<Verdict> {
        // 1. All parameters are required.
        if request.key_code.is_empty()
            || request.hwid.is_empty()
            || request.token.is_empty()
            || request.service_id.is_empty()
        {
            return Ok(Verdict::MissingParams);
        }

        // 2. The token must resolve before any key state is consulted.
        let Some(user) = self.auth.resolve_token(&request.token).await else {
            return Ok(Verdict::InvalidToken);
        };

        let mut store = self.store.lock().await;

        // 3. Unknown code.
        let Some(key) = store.key_by_code(&request.key_code) else {
            return Ok(Verdict::UnknownKey);
        };

        // 4. Ownership scoping.
        if key.owner_id != user.id {
            return Ok(Verdict::WrongOwner);
        }

        // 5. Service scoping; an unscoped key validates for no service.
        if key.service_id.as_deref() != Some(request.service_id.as_str()) {
            return Ok(Verdict::WrongService);
        }

        let now = Utc::now();

        // 6. Expiry gates all HWID logic.
        if key.is_expired(now) {
            return Ok(Verdict::Expired);
        }

        // 7-9. HWID binding. Clone the stored value so the shared borrow of
        // the store ends before the mutating branches re-borrow it.
        let stored_hwid = key.hwid.clone();

        match stored_hwid.as_deref() {
            None => {
                let key = store
                    .key_by_code_mut(&request.key_code)
                    .context("Key vanished inside the critical section")?;
                key.hwid = Some(request.hwid.clone());
                key.first_used = Some(now);

                store
                    .persist_keys()
                    .await
                    .context("Failed to persist HWID binding")?;

                info!("HWID bound: key {}", request.key_code);
                Ok(Verdict::Bound)
            }
            Some(stored) if stored == request.hwid => {
                let key = store
                    .key_by_code_mut(&request.key_code)
                    .context("Key vanished inside the critical section")?;
                key.last_used = Some(now);

                store
                    .persist_keys()
                    .await
                    .context("Failed to persist key usage")?;

                Ok(Verdict::Valid)
            }
            Some(_) => Ok(Verdict::HwidMismatch),
        }
    }
}
