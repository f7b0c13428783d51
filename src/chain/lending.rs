//! Lending pool client (Aave v3 style)
//!
//! Hand-encodes the pool's supply/borrow/repay/withdraw entrypoints the same
//! way the EVM client encodes ERC20 calls, and decodes the
//! getUserAccountData tuple for position reporting.

use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{address, Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;

use super::{address_word, encode_call, u256_word, EvmClient};

/// supply(address,uint256,address,uint16)
const SUPPLY: [u8; 4] = [0x61, 0x7b, 0xa0, 0x37];
/// borrow(address,uint256,uint256,uint16,address)
const BORROW: [u8; 4] = [0xa4, 0x15, 0xbc, 0xad];
/// repay(address,uint256,uint256,address)
const REPAY: [u8; 4] = [0x57, 0x3a, 0xde, 0x81];
/// withdraw(address,uint256,address)
const WITHDRAW: [u8; 4] = [0x69, 0x32, 0x8d, 0xec];
/// getUserAccountData(address)
const GET_USER_ACCOUNT_DATA: [u8; 4] = [0xbf, 0x92, 0x85, 0x7c];

/// Variable-rate borrows only; stable rate mode is deprecated on v3
const VARIABLE_RATE: u64 = 2;

/// Decoded getUserAccountData tuple.
///
/// Base-currency figures use 8 decimals (USD-denominated on every chain the
/// kit supports); the health factor is a wad.
#[derive(Debug, Clone, Copy)]
pub struct AccountData {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

impl AccountData {
    /// Decode the six-word return of getUserAccountData
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 192 {
            return Err(Error::Chain(format!(
                "getUserAccountData returned {} bytes, expected 192",
                data.len()
            )));
        }
        let word = |i: usize| U256::from_be_slice(&data[i * 32..(i + 1) * 32]);
        Ok(Self {
            total_collateral_base: word(0),
            total_debt_base: word(1),
            available_borrows_base: word(2),
            current_liquidation_threshold: word(3),
            ltv: word(4),
            health_factor: word(5),
        })
    }

    /// Health factor as a float; positions with no debt report infinity.
    pub fn health_factor_f64(&self) -> f64 {
        scaled_to_f64(self.health_factor, 18)
    }

    pub fn total_collateral_usd(&self) -> f64 {
        scaled_to_f64(self.total_collateral_base, 8)
    }

    pub fn total_debt_usd(&self) -> f64 {
        scaled_to_f64(self.total_debt_base, 8)
    }
}

fn scaled_to_f64(value: U256, decimals: u32) -> f64 {
    if value > U256::from(u128::MAX) {
        return f64::INFINITY;
    }
    value.to::<u128>() as f64 / 10f64.powi(decimals as i32)
}

/// Client for the lending pool contracts
#[derive(Debug, Clone)]
pub struct LendingClient {
    evm: EvmClient,
}

impl LendingClient {
    pub fn new(evm: EvmClient) -> Self {
        Self { evm }
    }

    pub fn from_env() -> Self {
        Self::new(EvmClient::from_env())
    }

    /// Pool contract address per chain
    pub fn pool_address(chain_id: u64) -> Option<Address> {
        match chain_id {
            1 => Some(address!("87870bca3f3fd6335c3f4ce8392d69350b4fa4e2")),
            42161 | 10 => Some(address!("794a61358d6845594f94dc1db02a252b5b4814ad")),
            8453 => Some(address!("a238dd80c259a72e81d7e4664a9801593f98d1c5")),
            _ => None,
        }
    }

    fn pool(chain_id: u64) -> Result<Address> {
        Self::pool_address(chain_id)
            .ok_or_else(|| Error::Config(format!("No lending pool deployed on chain {}", chain_id)))
    }

    /// Supply an asset as collateral
    pub async fn supply(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        asset: Address,
        amount: U256,
    ) -> Result<B256> {
        let calldata = encode_call(
            SUPPLY,
            &[
                address_word(asset),
                u256_word(amount),
                address_word(wallet.address()),
                u256_word(U256::ZERO), // referral code
            ],
        );
        self.send(chain_id, wallet, calldata).await
    }

    /// Borrow against supplied collateral (variable rate)
    pub async fn borrow(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        asset: Address,
        amount: U256,
    ) -> Result<B256> {
        let calldata = encode_call(
            BORROW,
            &[
                address_word(asset),
                u256_word(amount),
                u256_word(U256::from(VARIABLE_RATE)),
                u256_word(U256::ZERO), // referral code
                address_word(wallet.address()),
            ],
        );
        self.send(chain_id, wallet, calldata).await
    }

    /// Repay borrowed debt (variable rate)
    pub async fn repay(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        asset: Address,
        amount: U256,
    ) -> Result<B256> {
        let calldata = encode_call(
            REPAY,
            &[
                address_word(asset),
                u256_word(amount),
                u256_word(U256::from(VARIABLE_RATE)),
                address_word(wallet.address()),
            ],
        );
        self.send(chain_id, wallet, calldata).await
    }

    /// Withdraw supplied collateral back to the wallet
    pub async fn withdraw(
        &self,
        chain_id: u64,
        wallet: &SecureWallet,
        asset: Address,
        amount: U256,
    ) -> Result<B256> {
        let calldata = encode_call(
            WITHDRAW,
            &[
                address_word(asset),
                u256_word(amount),
                address_word(wallet.address()),
            ],
        );
        self.send(chain_id, wallet, calldata).await
    }

    /// Read a user's aggregate position
    pub async fn account_data(&self, chain_id: u64, user: Address) -> Result<AccountData> {
        let pool = Self::pool(chain_id)?;
        let calldata = encode_call(GET_USER_ACCOUNT_DATA, &[address_word(user)]);
        let tx = TransactionRequest::default()
            .to(pool)
            .input(Bytes::from(calldata).into());
        let data = self.evm.call(chain_id, tx).await?;
        AccountData::decode(&data)
    }

    async fn send(&self, chain_id: u64, wallet: &SecureWallet, calldata: Vec<u8>) -> Result<B256> {
        let pool = Self::pool(chain_id)?;
        let tx = TransactionRequest::default()
            .to(pool)
            .input(Bytes::from(calldata).into());
        self.evm.submit(chain_id, wallet, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_wallet() -> SecureWallet {
        SecureWallet::from_hex("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap()
    }

    #[test]
    fn pool_addresses_per_chain() {
        assert!(LendingClient::pool_address(1).is_some());
        // Arbitrum and Optimism share a deployment address
        assert_eq!(
            LendingClient::pool_address(42161),
            LendingClient::pool_address(10)
        );
        assert!(LendingClient::pool_address(8453).is_some());
        assert!(LendingClient::pool_address(137).is_none());
    }

    #[test]
    fn supply_calldata_layout() {
        let wallet = test_wallet();
        let asset = Address::from([0x33u8; 20]);
        let amount = U256::from(5_000_000u64);

        let calldata = encode_call(
            SUPPLY,
            &[
                address_word(asset),
                u256_word(amount),
                address_word(wallet.address()),
                u256_word(U256::ZERO),
            ],
        );

        assert_eq!(calldata.len(), 4 + 4 * 32);
        assert_eq!(&calldata[..4], &SUPPLY);
        assert_eq!(&calldata[16..36], asset.as_slice());
        assert_eq!(U256::from_be_slice(&calldata[36..68]), amount);
        assert_eq!(&calldata[80..100], wallet.address().as_slice());
    }

    #[test]
    fn borrow_uses_variable_rate() {
        let wallet = test_wallet();
        let asset = Address::from([0x44u8; 20]);
        let calldata = encode_call(
            BORROW,
            &[
                address_word(asset),
                u256_word(U256::from(1u64)),
                u256_word(U256::from(VARIABLE_RATE)),
                u256_word(U256::ZERO),
                address_word(wallet.address()),
            ],
        );
        // Third word carries the rate mode
        assert_eq!(U256::from_be_slice(&calldata[68..100]), U256::from(2u64));
    }

    #[test]
    fn account_data_decodes_six_words() {
        let mut data = Vec::new();
        for value in [
            1_000_000_000_000u64, // 10_000 USD collateral at 8 decimals
            250_000_000_000,      // 2_500 USD debt
            500_000_000_000,
            8_000,
            7_500,
            0,
        ] {
            data.extend_from_slice(&u256_word(U256::from(value)));
        }
        // Health factor of 1.5 as a wad
        let hf = U256::from(1_500_000_000_000_000_000u128);
        data.splice(160..192, u256_word(hf));

        let decoded = AccountData::decode(&data).unwrap();
        assert!((decoded.total_collateral_usd() - 10_000.0).abs() < 1e-9);
        assert!((decoded.total_debt_usd() - 2_500.0).abs() < 1e-9);
        assert!((decoded.health_factor_f64() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn account_data_no_debt_is_infinite_health() {
        let mut data = vec![0u8; 192];
        // Aave reports uint256 max when there is no debt
        data.splice(160..192, [0xffu8; 32]);
        let decoded = AccountData::decode(&data).unwrap();
        assert!(decoded.health_factor_f64().is_infinite());
    }

    #[test]
    fn short_return_is_an_error() {
        assert!(AccountData::decode(&[0u8; 64]).is_err());
    }
}
