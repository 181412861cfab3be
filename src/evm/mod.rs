//! Slot discovery against the protocol chain
//!
//! Read-only contract calls: the protocol state contract points at the node
//! registry, which lists the slot (node) IDs a wallet owns.

use std::str::FromStr;
use std::time::Duration;

use alloy::contract::Error as ContractError;
use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use backoff::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::errors::{SlotQueryError, SnapshotterResult};

sol! {
    #[sol(rpc)]
    contract ProtocolState {
        function snapshotterState() external view returns (address);
    }

    #[sol(rpc)]
    contract SnapshotterState {
        function getUserOwnedNodeIds(address user) external view returns (uint256[] memory);
    }
}

/// Maximum total time spent retrying a flaky RPC before giving up
const RPC_RETRY_MAX_ELAPSED_SECS: u64 = 60;

fn rpc_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(10),
        max_elapsed_time: Some(Duration::from_secs(RPC_RETRY_MAX_ELAPSED_SECS)),
        ..Default::default()
    }
}

fn parse_address(value: &str, what: &str, rpc_url: &str) -> SnapshotterResult<Address> {
    Address::from_str(value.trim()).map_err(|e| {
        SlotQueryError::with_url(format!("Invalid {what} address {value:?}: {e}"), rpc_url).into()
    })
}

/// Whether a contract call failure can heal on retry.
///
/// An error response from the node (a revert, a bad method) will keep
/// failing; transport-level trouble is worth retrying. ABI/decoding errors
/// are permanent too.
fn is_permanent_contract_error(e: &ContractError) -> bool {
    match e {
        ContractError::TransportError(te) => te.as_error_resp().is_some(),
        _ => true,
    }
}

fn call_error(
    e: ContractError,
    what: &str,
    rpc_url: &str,
    contract: &str,
) -> backoff::Error<SlotQueryError> {
    let err = SlotQueryError::with_contract(format!("{what} failed: {e}"), rpc_url, contract);
    if is_permanent_contract_error(&e) {
        backoff::Error::permanent(err)
    } else {
        warn!(rpc_url, error = %err, "Transient RPC failure, retrying");
        backoff::Error::transient(err)
    }
}

/// Convert registry node IDs to slot IDs, rejecting values past `u64::MAX`.
fn node_ids_to_slots(
    ids: Vec<U256>,
    rpc_url: &str,
    contract: &str,
) -> Result<Vec<u64>, SlotQueryError> {
    ids.into_iter()
        .map(|id| {
            u64::try_from(id).map_err(|_| {
                SlotQueryError::with_contract(
                    format!("Node ID {id} does not fit in 64 bits"),
                    rpc_url,
                    contract,
                )
            })
        })
        .collect()
}

/// Fetch the slot IDs owned by `wallet_address`.
///
/// Resolves the node registry through the protocol state contract, then
/// queries owned node IDs. An empty list is a valid result. Transport
/// failures are retried with exponential backoff; reverts and malformed
/// responses fail immediately.
pub async fn fetch_owned_slots(
    wallet_address: &str,
    rpc_url: &str,
    protocol_state_contract_address: &str,
) -> SnapshotterResult<Vec<u64>> {
    let wallet = parse_address(wallet_address, "wallet", rpc_url)?;
    let protocol_state = parse_address(
        protocol_state_contract_address,
        "protocol state contract",
        rpc_url,
    )?;

    info!(
        rpc_url,
        wallet = %wallet,
        contract = %protocol_state,
        "Querying owned slots"
    );

    let slots = backoff::future::retry(rpc_backoff(), || {
        query_owned_slots(wallet, rpc_url, protocol_state)
    })
    .await?;

    if slots.is_empty() {
        info!(wallet = %wallet, "No slots owned by wallet");
    } else {
        info!(wallet = %wallet, count = slots.len(), "Found owned slots");
    }
    Ok(slots)
}

async fn query_owned_slots(
    wallet: Address,
    rpc_url: &str,
    protocol_state_address: Address,
) -> Result<Vec<u64>, backoff::Error<SlotQueryError>> {
    let provider = ProviderBuilder::new().connect(rpc_url).await.map_err(|e| {
        let err = SlotQueryError::with_url(format!("Failed to connect to RPC: {e}"), rpc_url);
        warn!(rpc_url, error = %err, "RPC connect failed, retrying");
        backoff::Error::transient(err)
    })?;

    let contract_str = protocol_state_address.to_string();
    let protocol_state = ProtocolState::new(protocol_state_address, &provider);
    let registry_address = protocol_state
        .snapshotterState()
        .call()
        .await
        .map_err(|e| call_error(e, "snapshotterState()", rpc_url, &contract_str))?;

    debug!(registry = %registry_address, "Resolved node registry contract");

    let registry_str = registry_address.to_string();
    let registry = SnapshotterState::new(registry_address, &provider);
    let node_ids = registry
        .getUserOwnedNodeIds(wallet)
        .call()
        .await
        .map_err(|e| call_error(e, "getUserOwnedNodeIds()", rpc_url, &registry_str))?;

    node_ids_to_slots(node_ids, rpc_url, &registry_str).map_err(backoff::Error::permanent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::transports::TransportErrorKind;

    #[test]
    fn test_parse_address_valid() {
        let addr = parse_address(
            "0x000AA7d3a6a2556496f363B59e56D9aA1881548F",
            "wallet",
            "https://rpc",
        );
        assert!(addr.is_ok());
    }

    #[test]
    fn test_parse_address_trims_whitespace() {
        let addr = parse_address(
            "  0x000AA7d3a6a2556496f363B59e56D9aA1881548F  ",
            "wallet",
            "https://rpc",
        );
        assert!(addr.is_ok());
    }

    #[test]
    fn test_parse_address_invalid() {
        let err = parse_address("not-an-address", "wallet", "https://rpc").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("wallet"));
        assert!(msg.contains("not-an-address"));
    }

    #[test]
    fn test_node_ids_in_range_convert() {
        let slots =
            node_ids_to_slots(vec![U256::from(5481u64), U256::from(1u64)], "https://rpc", "0x0")
                .unwrap();
        assert_eq!(slots, vec![5481, 1]);
    }

    #[test]
    fn test_oversized_node_id_is_an_error_not_a_panic() {
        let err = node_ids_to_slots(
            vec![U256::from(1u64), U256::MAX],
            "https://rpc",
            "0xRegistry",
        )
        .unwrap_err();
        assert!(err.message.contains("does not fit in 64 bits"));
        assert_eq!(err.rpc_url, Some("https://rpc".to_string()));
    }

    #[test]
    fn test_transport_trouble_is_transient() {
        let e = ContractError::TransportError(TransportErrorKind::custom_str("connection reset"));
        assert!(!is_permanent_contract_error(&e));

        let classified = call_error(
            ContractError::TransportError(TransportErrorKind::custom_str("connection reset")),
            "snapshotterState()",
            "https://rpc",
            "0x0",
        );
        assert!(matches!(classified, backoff::Error::Transient { .. }));
    }

    #[tokio::test]
    async fn test_fetch_owned_slots_bad_wallet() {
        let result = fetch_owned_slots(
            "bogus",
            "https://rpc.invalid",
            "0x000AA7d3a6a2556496f363B59e56D9aA1881548F",
        )
        .await;
        assert!(result.is_err());
    }
}
