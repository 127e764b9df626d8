//! Pair registry
//!
//! Maps every canonical token pair to exactly one [`Pair`]. Pairs are held
//! as `Arc<Mutex<Pair>>` so a router can lock them for a whole call while
//! other pairs stay available.

use crate::error::{AmmError, Result};
use crate::logging::LogEmoji;
use crate::pair::Pair;
use crate::v2_math::V2Math;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dex_config::PairConfig;
use ethers_core::types::Address;
use ethers_core::utils::{get_create2_address_from_hash, keccak256};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared handle to a registered pair
pub type PairHandle = Arc<Mutex<Pair>>;

/// Domain separator hashed into every derived pair address
const PAIR_CODE_DOMAIN: &[u8] = b"dex-amm/pair/v1";

/// Registry of all pairs created under one deployment
pub struct Registry {
    address: Address,
    owner: Address,
    config: PairConfig,

    /// Canonical (token0, token1) -> pair
    pairs: DashMap<(Address, Address), PairHandle>,

    /// Pair addresses in creation order
    all_pairs: RwLock<Vec<Address>>,
}

impl Registry {
    /// Create an empty registry whose pairs all use `config`
    ///
    /// Fails with `InvalidConfig` if the fee or the share lock is out of range.
    pub fn new(address: Address, owner: Address, config: PairConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AmmError::InvalidConfig(format!("{:#}", e)))?;

        Ok(Self {
            address,
            owner,
            config,
            pairs: DashMap::new(),
            all_pairs: RwLock::new(Vec::new()),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Parameters every new pair is created with
    pub fn config(&self) -> &PairConfig {
        &self.config
    }

    /// Pair for `(token_a, token_b)` in either order, if one was created
    pub fn get_pair(&self, token_a: Address, token_b: Address) -> Option<PairHandle> {
        let key = V2Math::sort_tokens(token_a, token_b).ok()?;
        self.pairs.get(&key).map(|entry| entry.clone())
    }

    /// Deterministic address a pair for these tokens has (or would have)
    ///
    /// Derived CREATE2-style from the registry address, the sorted tokens
    /// as salt and a fixed code hash, so it is known before creation.
    pub fn pair_address(&self, token_a: Address, token_b: Address) -> Result<Address> {
        let (token0, token1) = V2Math::sort_tokens(token_a, token_b)?;
        Ok(self.derive_address(token0, token1))
    }

    fn derive_address(&self, token0: Address, token1: Address) -> Address {
        let mut salt_input = [0u8; 40];
        salt_input[..20].copy_from_slice(token0.as_bytes());
        salt_input[20..].copy_from_slice(token1.as_bytes());
        get_create2_address_from_hash(
            self.address,
            keccak256(salt_input),
            keccak256(PAIR_CODE_DOMAIN),
        )
    }

    /// Create the pair for `(token_a, token_b)` and return its address
    ///
    /// Fails with `PairExists` if the canonical key is already registered.
    /// Concurrent calls for the same key race on the map entry; exactly one
    /// of them creates the pair.
    pub fn create_pair(&self, token_a: Address, token_b: Address) -> Result<Address> {
        let (token0, token1) = V2Math::sort_tokens(token_a, token_b)?;

        match self.pairs.entry((token0, token1)) {
            Entry::Occupied(_) => Err(AmmError::PairExists { token0, token1 }),
            Entry::Vacant(slot) => {
                let address = self.derive_address(token0, token1);
                let pair = Pair::new(address, token0, token1, &self.config)?;
                slot.insert(Arc::new(Mutex::new(pair)));

                let mut all_pairs = self.all_pairs.write();
                all_pairs.push(address);

                info!(
                    "{} Pair created: {:?} for ({:?}, {:?}), {} total",
                    LogEmoji::POOL,
                    address,
                    token0,
                    token1,
                    all_pairs.len()
                );
                Ok(address)
            }
        }
    }

    /// Number of pairs created
    pub fn all_pairs_length(&self) -> usize {
        self.all_pairs.read().len()
    }

    /// Address of the `index`-th created pair
    pub fn all_pairs(&self, index: usize) -> Option<Address> {
        self.all_pairs.read().get(index).copied()
    }

    /// Remove a pair created by a call that later failed
    pub(crate) fn discard_pair(&self, token0: Address, token1: Address) {
        if let Some((_, handle)) = self.pairs.remove(&(token0, token1)) {
            let address = handle.lock().address();
            self.all_pairs.write().retain(|a| *a != address);
            debug!(
                "{} Discarded pair {:?} after failed creation call",
                LogEmoji::WARNING,
                address
            );
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("address", &self.address)
            .field("owner", &self.owner)
            .field("config", &self.config)
            .field("pairs", &self.pairs.len())
            .finish()
    }
}
