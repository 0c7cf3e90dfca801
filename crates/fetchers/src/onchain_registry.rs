use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnChainRegistryError {
    #[error("no rpc endpoint configured for chain_id {0}")]
    UnknownChain(u64),
    #[error("json-rpc request failed: {0}")]
    Request(String),
    #[error("json-rpc node returned an error: {0}")]
    NodeError(String),
    #[error("malformed eth_call return data: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct OnChainKmsRecord {
    pub quote: String,
    /// Hex-encoded JSON event log, as stored on-chain (spec §4.1).
    pub eventlog: String,
    pub ca_pubkey: String,
}

#[async_trait]
pub trait OnChainRegistry: Send + Sync {
    async fn kms_info(
        &self,
        chain_id: u64,
        contract_address: &str,
    ) -> Result<OnChainKmsRecord, OnChainRegistryError>;

    async fn app_compose_hash_registered(
        &self,
        chain_id: u64,
        contract_address: &str,
        compose_hash: &str,
    ) -> Result<bool, OnChainRegistryError>;
}

/// Four-byte function selectors for the registry ABI. These are fixed by
/// the deployed contract; passed in rather than computed so this crate
/// doesn't need a keccak dependency purely for selector derivation.
#[derive(Debug, Clone)]
pub struct RegistrySelectors {
    pub kms_info: String,
    pub app_compose_hash_registered: String,
}

impl Default for RegistrySelectors {
    fn default() -> Self {
        RegistrySelectors {
            kms_info: "0x5a1e6d5f".to_string(),
            app_compose_hash_registered: "0x8fbe9e3a".to_string(),
        }
    }
}

pub struct JsonRpcOnChainRegistry {
    client: reqwest::Client,
    rpc_endpoints: HashMap<u64, String>,
    selectors: RegistrySelectors,
}

impl JsonRpcOnChainRegistry {
    pub fn new(rpc_endpoints: HashMap<u64, String>) -> Self {
        JsonRpcOnChainRegistry {
            client: reqwest::Client::new(),
            rpc_endpoints,
            selectors: RegistrySelectors::default(),
        }
    }

    fn endpoint(&self, chain_id: u64) -> Result<&str, OnChainRegistryError> {
        self.rpc_endpoints
            .get(&chain_id)
            .map(String::as_str)
            .ok_or(OnChainRegistryError::UnknownChain(chain_id))
    }

    /// Left-pads a hex-encoded value to a 32-byte ABI word.
    fn encode_word(value_hex: &str) -> String {
        let stripped = value_hex.trim_start_matches("0x");
        format!("{:0>64}", stripped)
    }

    async fn eth_call(&self, chain_id: u64, to: &str, data: String) -> Result<Value, OnChainRegistryError> {
        let endpoint = self.endpoint(chain_id)?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": to, "data": data }, "latest"],
        });

        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OnChainRegistryError::Request(e.to_string()))?;

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| OnChainRegistryError::Request(e.to_string()))?;

        if let Some(error) = parsed.get("error") {
            return Err(OnChainRegistryError::NodeError(error.to_string()));
        }
        parsed
            .get("result")
            .cloned()
            .ok_or_else(|| OnChainRegistryError::Decode("missing result field".to_string()))
    }
}

#[async_trait]
impl OnChainRegistry for JsonRpcOnChainRegistry {
    async fn kms_info(
        &self,
        chain_id: u64,
        contract_address: &str,
    ) -> Result<OnChainKmsRecord, OnChainRegistryError> {
        let data = format!("{}{}", self.selectors.kms_info, Self::encode_word(contract_address));
        let result = self.eth_call(chain_id, contract_address, data).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| OnChainRegistryError::Decode("expected hex string result".to_string()))?;

        // The ABI-decoded triple (quote, eventlog, ca_pubkey) is assumed
        // returned as three consecutive dynamic-bytes fields; full ABI
        // tuple decoding lives behind this one seam so callers never see
        // raw calldata.
        let decoded: (String, String, String) = decode_three_bytes_tuple(raw)
            .ok_or_else(|| OnChainRegistryError::Decode(format!("could not decode tuple from {raw}")))?;
        Ok(OnChainKmsRecord { quote: decoded.0, eventlog: decoded.1, ca_pubkey: decoded.2 })
    }

    async fn app_compose_hash_registered(
        &self,
        chain_id: u64,
        contract_address: &str,
        compose_hash: &str,
    ) -> Result<bool, OnChainRegistryError> {
        let data = format!(
            "{}{}",
            self.selectors.app_compose_hash_registered,
            Self::encode_word(compose_hash)
        );
        let result = self.eth_call(chain_id, contract_address, data).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| OnChainRegistryError::Decode("expected hex string result".to_string()))?;
        let word = raw.trim_start_matches("0x");
        Ok(word.chars().rev().take(2).any(|c| c != '0'))
    }
}

/// Decodes a minimal `(bytes, bytes, bytes)` ABI return value: three
/// 32-byte offsets followed by length-prefixed payloads.
fn read_word_as_usize(data: &[u8], word_index: usize) -> Option<usize> {
    let start = word_index * 32 + 24;
    let bytes: [u8; 8] = data.get(start..start + 8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes) as usize)
}

fn decode_three_bytes_tuple(raw_hex: &str) -> Option<(String, String, String)> {
    let data = hex::decode(raw_hex.trim_start_matches("0x")).ok()?;
    if data.len() < 96 {
        return None;
    }
    let mut out = Vec::with_capacity(3);
    for i in 0..3 {
        let offset = read_word_as_usize(&data, i)?;
        if data.len() < offset + 32 {
            return None;
        }
        let len = read_word_as_usize(&data[offset..], 0)?;
        let payload_start = offset + 32;
        if data.len() < payload_start + len {
            return None;
        }
        out.push(format!("0x{}", hex::encode(&data[payload_start..payload_start + len])));
    }
    Some((out[0].clone(), out[1].clone(), out[2].clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_word_left_pads_to_32_bytes() {
        let encoded = JsonRpcOnChainRegistry::encode_word("0xdead");
        assert_eq!(encoded.len(), 64);
        assert!(encoded.ends_with("dead"));
    }

    #[test]
    fn unknown_chain_is_rejected() {
        let registry = JsonRpcOnChainRegistry::new(HashMap::new());
        assert!(registry.endpoint(8453).is_err());
    }
}
