//! Signing zome calls on behalf of applets.
//!
//! Applet code builds an [`UnsignedCall`] and asks the host to sign it. Key
//! material stays on this side: the delegate validates the call, computes
//! the bytes to sign and hands them to the runtime, which checks the
//! agent's grants and signs with the provenance key.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use framelink_identity::AgentKey;
use framelink_protocol::{SignedCall, UnsignedCall};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::caller::Caller;
use crate::dispatcher::ZOME_CALL_LOG_TARGET;
use crate::error::SigningError;
use crate::services::RuntimeClient;

/// Length of a call nonce in bytes.
pub const NONCE_LEN: usize = 32;

const SIGNING_DOMAIN: &[u8] = b"framelink/zome-call/v1\0";

/// The bytes a call's signature covers: a domain-separated SHA-256 of the
/// call's JSON encoding.
pub fn data_to_sign(call: &UnsignedCall) -> Result<[u8; 32], SigningError> {
    let encoded = serde_json::to_vec(call)?;
    let mut hasher = Sha256::new();
    hasher.update(SIGNING_DOMAIN);
    hasher.update(&encoded);
    Ok(hasher.finalize().into())
}

/// Turns unsigned calls into signed ones.
#[derive(Clone)]
pub struct SigningDelegate {
    runtime: Arc<dyn RuntimeClient>,
    log_calls: bool,
}

impl SigningDelegate {
    pub fn new(runtime: Arc<dyn RuntimeClient>) -> Self {
        Self {
            runtime,
            log_calls: false,
        }
    }

    pub fn with_call_logging(mut self, enabled: bool) -> Self {
        self.log_calls = enabled;
        self
    }

    /// Validate and sign a call made by `caller`.
    pub async fn sign(
        &self,
        caller: &Caller,
        call: UnsignedCall,
    ) -> Result<SignedCall, SigningError> {
        if call.nonce.len() != NONCE_LEN {
            return Err(SigningError::InvalidNonce {
                expected: NONCE_LEN,
                found: call.nonce.len(),
            });
        }
        if call.provenance != call.cell_id.agent_key {
            return Err(SigningError::ProvenanceMismatch {
                provenance: call.provenance,
            });
        }

        let data = data_to_sign(&call)?;
        let signature = match self.runtime.sign_call(&call, &data).await {
            Ok(signature) => signature,
            Err(e) => {
                warn!(
                    %caller,
                    zome = %call.zome_name,
                    function = %call.fn_name,
                    "signing refused: {e}"
                );
                return Err(e);
            }
        };

        if self.log_calls {
            info!(
                target: ZOME_CALL_LOG_TARGET,
                %caller,
                zome = %call.zome_name,
                function = %call.fn_name,
                "signed zome call"
            );
        }
        Ok(SignedCall { call, signature })
    }
}

/// Which functions an agent lets the host sign calls to.
#[derive(Debug, Clone, Default)]
enum Grants {
    #[default]
    None,
    All,
    Functions(BTreeSet<(String, String)>),
}

impl Grants {
    fn allows(&self, zome: &str, function: &str) -> bool {
        match self {
            Grants::None => false,
            Grants::All => true,
            Grants::Functions(functions) => {
                functions.contains(&(zome.to_string(), function.to_string()))
            }
        }
    }
}

struct AgentKeypair {
    key: SigningKey,
    grants: Grants,
}

/// A local ed25519 keystore with per-agent function grants.
///
/// Stands in for the runtime's keystore when embedding the host without
/// one, and in tests.
#[derive(Default)]
pub struct KeystoreSigner {
    agents: Mutex<BTreeMap<AgentKey, AgentKeypair>>,
}

impl KeystoreSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent from a 32-byte secret seed. It starts with no grants.
    pub async fn add_agent(&self, seed: [u8; 32]) -> AgentKey {
        let key = SigningKey::from_bytes(&seed);
        let agent = AgentKey::from_core(key.verifying_key().to_bytes());
        self.agents.lock().await.insert(
            agent,
            AgentKeypair {
                key,
                grants: Grants::None,
            },
        );
        agent
    }

    pub async fn grant(&self, agent: &AgentKey, zome: &str, function: &str) -> bool {
        let mut agents = self.agents.lock().await;
        let Some(entry) = agents.get_mut(agent) else {
            return false;
        };
        match &mut entry.grants {
            Grants::All => {}
            Grants::Functions(functions) => {
                functions.insert((zome.to_string(), function.to_string()));
            }
            Grants::None => {
                entry.grants = Grants::Functions(BTreeSet::from([(
                    zome.to_string(),
                    function.to_string(),
                )]));
            }
        }
        true
    }

    pub async fn grant_all(&self, agent: &AgentKey) -> bool {
        match self.agents.lock().await.get_mut(agent) {
            Some(entry) => {
                entry.grants = Grants::All;
                true
            }
            None => false,
        }
    }

    pub async fn revoke_all(&self, agent: &AgentKey) {
        if let Some(entry) = self.agents.lock().await.get_mut(agent) {
            entry.grants = Grants::None;
        }
    }

    /// Sign on behalf of the call's provenance.
    pub async fn sign(
        &self,
        call: &UnsignedCall,
        data_to_sign: &[u8],
    ) -> Result<Vec<u8>, SigningError> {
        let agents = self.agents.lock().await;
        let entry = agents
            .get(&call.provenance)
            .ok_or(SigningError::UnknownAgent(call.provenance))?;
        if !entry.grants.allows(&call.zome_name, &call.fn_name) {
            return Err(SigningError::Refused(format!(
                "agent has not granted access to {}/{}",
                call.zome_name, call.fn_name
            )));
        }
        debug!(agent = %call.provenance, "signing call");
        Ok(entry.key.sign(data_to_sign).to_bytes().to_vec())
    }
}

/// Check a signature against the agent key that supposedly made it.
pub fn verify_signature(agent: &AgentKey, data: &[u8], signature: &[u8]) -> bool {
    let Ok(public) = <[u8; 32]>::try_from(agent.core()) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&public) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}
