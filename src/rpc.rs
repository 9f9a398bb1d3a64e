//! Read-only RPC capability used by the normalizer and the account readers.

use async_trait::async_trait;
use solana_address_lookup_table_interface::state::AddressLookupTable;
use solana_client::{
    nonblocking::rpc_client::RpcClient, rpc_client::GetConfirmedSignaturesForAddress2Config,
};
use solana_program_pack::Pack;
use solana_sdk::{account::Account, message::AddressLookupTableAccount, pubkey::Pubkey};
use spl_token_interface::state::Account as TokenAccount;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("RPC read failed: {0}")]
pub struct ReadError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub err: Option<String>,
}

#[async_trait]
pub trait RpcAccessor: Send + Sync {
    /// Native balance in lamports.
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ReadError>;

    /// Raw amount held by a token account, `None` when the account does not exist.
    async fn get_token_account_amount(&self, address: &Pubkey) -> Result<Option<u64>, ReadError>;

    /// Lookup table contents, `None` when the address holds no data.
    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AddressLookupTableAccount>, ReadError>;

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, ReadError>;
}

#[async_trait]
impl RpcAccessor for RpcClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ReadError> {
        RpcClient::get_balance(self, address)
            .await
            .map_err(|e| ReadError(e.to_string()))
    }

    async fn get_token_account_amount(&self, address: &Pubkey) -> Result<Option<u64>, ReadError> {
        let account = self
            .get_account_with_commitment(address, self.commitment())
            .await
            .map_err(|e| ReadError(e.to_string()))?
            .value;

        account
            .map(|account| token_amount(address, &account))
            .transpose()
    }

    async fn get_address_lookup_table(
        &self,
        address: &Pubkey,
    ) -> Result<Option<AddressLookupTableAccount>, ReadError> {
        let Some(account) = self
            .get_account_with_commitment(address, self.commitment())
            .await
            .map_err(|e| ReadError(e.to_string()))?
            .value
        else {
            return Ok(None);
        };

        let table = AddressLookupTable::deserialize(&account.data)
            .map_err(|e| ReadError(format!("invalid lookup table {address}: {e}")))?;
        Ok(Some(AddressLookupTableAccount {
            key: *address,
            addresses: table.addresses.to_vec(),
        }))
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, ReadError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            ..Default::default()
        };
        let statuses = self
            .get_signatures_for_address_with_config(address, config)
            .await
            .map_err(|e| ReadError(e.to_string()))?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureInfo {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                err: status.err.map(|e| format!("{e:?}")),
            })
            .collect())
    }
}

/// Amount held by an initialized SPL token account owned by the token program.
fn token_amount(address: &Pubkey, account: &Account) -> Result<u64, ReadError> {
    if account.owner != spl_token_interface::id() {
        return Err(ReadError(format!(
            "{address} is owned by {}, not the token program",
            account.owner
        )));
    }
    let state = TokenAccount::unpack(&account.data)
        .map_err(|e| ReadError(format!("invalid token account {address}: {e}")))?;
    Ok(state.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spl_token_interface::state::AccountState;

    fn token_account(amount: u64, state: AccountState) -> Account {
        let mut data = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(
            TokenAccount {
                mint: Pubkey::new_unique(),
                owner: Pubkey::new_unique(),
                amount,
                state,
                ..Default::default()
            },
            &mut data,
        )
        .unwrap();
        Account {
            lamports: 2_039_280,
            data,
            owner: spl_token_interface::id(),
            executable: false,
            rent_epoch: 0,
        }
    }

    #[test]
    fn reads_amount_from_initialized_account() {
        let account = token_account(1_500_000, AccountState::Initialized);
        assert_eq!(token_amount(&Pubkey::new_unique(), &account).unwrap(), 1_500_000);
    }

    #[test]
    fn rejects_account_owned_by_another_program() {
        let mut account = token_account(1_500_000, AccountState::Initialized);
        account.owner = Pubkey::new_unique();
        assert!(token_amount(&Pubkey::new_unique(), &account).is_err());

        let foreign = Account {
            lamports: 1,
            data: vec![0xFF; 72],
            owner: Pubkey::new_unique(),
            executable: false,
            rent_epoch: 0,
        };
        assert!(token_amount(&Pubkey::new_unique(), &foreign).is_err());
    }

    #[test]
    fn rejects_uninitialized_or_malformed_data() {
        let account = token_account(7, AccountState::Uninitialized);
        assert!(token_amount(&Pubkey::new_unique(), &account).is_err());

        let mut short = token_account(7, AccountState::Initialized);
        short.data.truncate(72);
        assert!(token_amount(&Pubkey::new_unique(), &short).is_err());
    }
}
