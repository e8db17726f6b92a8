//! Library linking
//!
//! Compilers leave a 40-character placeholder in bytecode wherever a
//! library address belongs. Two formats exist:
//!
//! - legacy: `__` + qualified name truncated to 36 chars, `_`-padded to 40
//! - hashed: `__$` + first 34 hex chars of keccak256(qualified name) + `$__`
//!
//! Linking either replaces every placeholder or fails listing all of them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use conduit_primitives::{keccak256, Address};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;

use crate::contract::{CompiledArtifact, ContractBinder};
use crate::error::{ClientError, Result};

/// Width of a placeholder in hex text, the width of an address
pub const PLACEHOLDER_LEN: usize = 40;

/// Legacy placeholder for `name`
pub fn legacy_placeholder(name: &str) -> String {
    let truncated: String = name.chars().take(36).collect();
    format!("{:_<width$}", format!("__{}", truncated), width = PLACEHOLDER_LEN)
}

/// Hashed placeholder for `name`
pub fn hashed_placeholder(name: &str) -> String {
    let hash = hex::encode(keccak256(name.as_bytes()).as_bytes());
    format!("__${}$__", &hash[..34])
}

/// Human-readable form of a placeholder as it appears in bytecode
fn describe(marker: &str) -> String {
    marker.trim_matches('_').to_string()
}

/// Placeholders in `bytecode`, in order of first appearance
///
/// A trailing fragment too short to be a full placeholder is reported as is.
pub fn find_placeholders(bytecode: &str) -> Vec<String> {
    let bytes = bytecode.as_bytes();
    let mut found: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'_' {
            i += 1;
            continue;
        }
        let marker = match bytecode.get(i..i + PLACEHOLDER_LEN) {
            Some(m) => m.to_string(),
            None => String::from_utf8_lossy(&bytes[i..]).into_owned(),
        };
        if !found.contains(&marker) {
            found.push(marker);
        }
        i += PLACEHOLDER_LEN;
    }
    found
}

/// Library name to deployed address
///
/// Append-only and safe to read concurrently. Library deployments through
/// [`deploy_library`](Self::deploy_library) are exclusive per name.
#[derive(Default)]
pub struct LinkTable {
    entries: RwLock<BTreeMap<String, Address>>,
    deploying: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl std::fmt::Debug for LinkTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.read().iter()).finish()
    }
}

impl LinkTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` at `address`
    ///
    /// Re-inserting the same address is a no-op; a different address is an
    /// error, entries never change once committed.
    pub fn insert(&self, name: impl Into<String>, address: Address) -> Result<()> {
        let name = name.into();
        let mut entries = self.entries.write();
        match entries.get(&name) {
            Some(existing) if *existing == address => Ok(()),
            Some(existing) => Err(ClientError::Artifact(format!(
                "library {} is already linked at {}",
                name, existing
            ))),
            None => {
                entries.insert(name, address);
                Ok(())
            }
        }
    }

    /// Address recorded for `name`
    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries.read().get(name).copied()
    }

    /// Number of libraries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of every entry, ordered by name
    pub fn entries(&self) -> BTreeMap<String, Address> {
        self.entries.read().clone()
    }

    /// Both placeholder forms of every entry, mapped to its address
    fn markers(&self) -> HashMap<String, Address> {
        let entries = self.entries.read();
        let mut markers = HashMap::with_capacity(entries.len() * 2);
        for (name, address) in entries.iter() {
            markers.insert(legacy_placeholder(name), *address);
            markers.insert(hashed_placeholder(name), *address);
        }
        markers
    }

    /// Link `bytecode` against this table
    pub fn link(&self, bytecode: &str) -> Result<String> {
        link(bytecode, self)
    }

    /// Deploy `artifact` as a library and record it under its name
    ///
    /// Concurrent calls for the same name deploy once; later callers get the
    /// committed address. The library's own bytecode is linked against this
    /// table first.
    pub async fn deploy_library(
        &self,
        binder: &ContractBinder,
        artifact: &CompiledArtifact,
        sender: &Address,
    ) -> Result<Address> {
        let guard = self
            .deploying
            .lock()
            .entry(artifact.name.clone())
            .or_default()
            .clone();
        let _exclusive = guard.lock().await;

        if let Some(address) = self.get(&artifact.name) {
            return Ok(address);
        }

        let linked = artifact.linked(self)?;
        let handle = binder.deploy(&linked, &[], sender, None).await?;
        self.insert(artifact.name.clone(), handle.address())?;
        tracing::info!(library = %artifact.name, address = %handle.address(), "library deployed");
        Ok(handle.address())
    }
}

/// Replace every placeholder in `bytecode` with its library address
///
/// Fails with [`ClientError::UnresolvedLink`] naming every placeholder the
/// table cannot resolve; partial output is never returned. Linking linked
/// bytecode returns it unchanged.
pub fn link(bytecode: &str, table: &LinkTable) -> Result<String> {
    let placeholders = find_placeholders(bytecode);
    if placeholders.is_empty() {
        return Ok(bytecode.to_string());
    }

    let markers = table.markers();
    let unresolved: Vec<String> = placeholders
        .iter()
        .filter(|p| !markers.contains_key(p.as_str()))
        .map(|p| describe(p))
        .collect();
    if !unresolved.is_empty() {
        return Err(ClientError::UnresolvedLink {
            placeholders: unresolved,
        });
    }

    let mut linked = bytecode.to_string();
    for placeholder in &placeholders {
        let address = markers[placeholder.as_str()];
        linked = linked.replace(placeholder.as_str(), &address.to_hex_unprefixed());
    }
    tracing::debug!(libraries = placeholders.len(), "bytecode linked");
    Ok(linked)
}
