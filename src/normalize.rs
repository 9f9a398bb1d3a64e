//! Turns the aggregator's prebuilt transaction into the instruction list the
//! passkey relay expects: decoded, lookup tables resolved, compute-budget
//! instructions removed.

use base64::{engine::general_purpose::STANDARD, Engine};
use futures::stream::{self, StreamExt, TryStreamExt};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    message::{AddressLookupTableAccount, MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    transaction::{Transaction, VersionedTransaction},
};
use tracing::{debug, info};

use crate::{quote::TxVersion, rpc::RpcAccessor, swap::RawTransactionPayload, SwapError};

pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ComputeBudget111111111111111111111111111111");

/// Maximum number of lookup tables fetched concurrently.
pub const LOOKUP_TABLE_FANOUT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum SwapTransaction {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedSwap {
    pub instructions: Vec<Instruction>,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
}

impl SwapTransaction {
    pub fn decode(payload: &RawTransactionPayload) -> Result<Self, SwapError> {
        let bytes = STANDARD
            .decode(payload.transaction.trim())
            .map_err(|e| SwapError::Decode(format!("invalid base64: {e}")))?;

        match payload.version {
            TxVersion::Legacy => bincode::deserialize::<Transaction>(&bytes)
                .map(Self::Legacy)
                .map_err(|e| SwapError::Decode(format!("invalid legacy transaction: {e}"))),
            TxVersion::V0 => bincode::deserialize::<VersionedTransaction>(&bytes)
                .map(Self::Versioned)
                .map_err(|e| SwapError::Decode(format!("invalid versioned transaction: {e}"))),
        }
    }

    /// Distinct lookup tables referenced by the message, in first-seen order.
    pub fn lookup_table_addresses(&self) -> Vec<Pubkey> {
        let Self::Versioned(tx) = self else {
            return Vec::new();
        };
        let mut addresses: Vec<Pubkey> = Vec::new();
        for lookup in tx.message.address_table_lookups().unwrap_or_default() {
            if !addresses.contains(&lookup.account_key) {
                addresses.push(lookup.account_key);
            }
        }
        addresses
    }

    /// Expands compiled instructions into absolute ones.
    ///
    /// Loaded addresses follow the static keys: every table's writable entries
    /// first, then every table's read-only entries.
    pub fn decompile(
        &self,
        tables: &[AddressLookupTableAccount],
    ) -> Result<Vec<Instruction>, SwapError> {
        match self {
            Self::Legacy(tx) => {
                let message = &tx.message;
                let keys = AccountKeys::new(&message.header, &message.account_keys, vec![], vec![]);
                message
                    .instructions
                    .iter()
                    .map(|ix| keys.instruction(ix.program_id_index, &ix.accounts, &ix.data))
                    .collect()
            }
            Self::Versioned(tx) => match &tx.message {
                VersionedMessage::Legacy(message) => {
                    let keys =
                        AccountKeys::new(&message.header, &message.account_keys, vec![], vec![]);
                    message
                        .instructions
                        .iter()
                        .map(|ix| keys.instruction(ix.program_id_index, &ix.accounts, &ix.data))
                        .collect()
                }
                VersionedMessage::V0(message) => {
                    let mut writable = Vec::new();
                    let mut readonly = Vec::new();
                    for lookup in &message.address_table_lookups {
                        let table = tables
                            .iter()
                            .find(|t| t.key == lookup.account_key)
                            .ok_or_else(|| SwapError::LookupTableResolution {
                                address: lookup.account_key,
                                reason: "not resolved".to_string(),
                            })?;
                        writable.extend(select(table, &lookup.writable_indexes)?);
                        readonly.extend(select(table, &lookup.readonly_indexes)?);
                    }

                    let keys =
                        AccountKeys::new(&message.header, &message.account_keys, writable, readonly);
                    message
                        .instructions
                        .iter()
                        .map(|ix| keys.instruction(ix.program_id_index, &ix.accounts, &ix.data))
                        .collect()
                }
            },
        }
    }
}

fn select(table: &AddressLookupTableAccount, indexes: &[u8]) -> Result<Vec<Pubkey>, SwapError> {
    indexes
        .iter()
        .map(|&i| {
            table.addresses.get(i as usize).copied().ok_or_else(|| {
                SwapError::Decode(format!(
                    "lookup index {i} out of range for table {} ({} entries)",
                    table.key,
                    table.addresses.len()
                ))
            })
        })
        .collect()
}

struct AccountKeys<'a> {
    header: &'a MessageHeader,
    static_keys: &'a [Pubkey],
    writable: Vec<Pubkey>,
    readonly: Vec<Pubkey>,
}

impl<'a> AccountKeys<'a> {
    fn new(
        header: &'a MessageHeader,
        static_keys: &'a [Pubkey],
        writable: Vec<Pubkey>,
        readonly: Vec<Pubkey>,
    ) -> Self {
        Self {
            header,
            static_keys,
            writable,
            readonly,
        }
    }

    fn meta(&self, index: u8) -> Result<AccountMeta, SwapError> {
        let index = index as usize;
        let num_static = self.static_keys.len();
        let num_signers = self.header.num_required_signatures as usize;

        if let Some(pubkey) = self.static_keys.get(index) {
            let is_signer = index < num_signers;
            let is_writable = if is_signer {
                index < num_signers.saturating_sub(self.header.num_readonly_signed_accounts as usize)
            } else {
                index - num_signers
                    < num_static
                        .saturating_sub(num_signers)
                        .saturating_sub(self.header.num_readonly_unsigned_accounts as usize)
            };
            return Ok(AccountMeta {
                pubkey: *pubkey,
                is_signer,
                is_writable,
            });
        }

        let loaded = index - num_static;
        if let Some(pubkey) = self.writable.get(loaded) {
            return Ok(AccountMeta::new(*pubkey, false));
        }
        self.readonly
            .get(loaded - self.writable.len())
            .map(|pubkey| AccountMeta::new_readonly(*pubkey, false))
            .ok_or_else(|| SwapError::Decode(format!("account index {index} out of range")))
    }

    fn instruction(
        &self,
        program_id_index: u8,
        accounts: &[u8],
        data: &[u8],
    ) -> Result<Instruction, SwapError> {
        let program_id = self.meta(program_id_index)?.pubkey;
        let accounts = accounts
            .iter()
            .map(|&i| self.meta(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Instruction {
            program_id,
            accounts,
            data: data.to_vec(),
        })
    }
}

/// Fetches every table concurrently and returns them in `addresses` order.
/// The first missing table fails the whole batch.
pub async fn resolve_lookup_tables<R>(
    rpc: &R,
    addresses: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>, SwapError>
where
    R: RpcAccessor + ?Sized,
{
    stream::iter(addresses.iter().copied())
        .map(|address| async move {
            match rpc.get_address_lookup_table(&address).await {
                Ok(Some(table)) => {
                    debug!(%address, entries = table.addresses.len(), "Resolved lookup table");
                    Ok(table)
                }
                Ok(None) => Err(SwapError::LookupTableResolution {
                    address,
                    reason: "no data".to_string(),
                }),
                Err(e) => Err(SwapError::LookupTableResolution {
                    address,
                    reason: e.to_string(),
                }),
            }
        })
        .buffered(LOOKUP_TABLE_FANOUT)
        .try_collect()
        .await
}

pub fn is_compute_budget(instruction: &Instruction) -> bool {
    instruction.program_id == COMPUTE_BUDGET_PROGRAM_ID
}

/// Drops compute-budget instructions; the relay sets its own limit and price.
pub fn strip_compute_budget(instructions: Vec<Instruction>) -> Vec<Instruction> {
    instructions
        .into_iter()
        .filter(|ix| !is_compute_budget(ix))
        .collect()
}

pub async fn normalize<R>(
    payload: &RawTransactionPayload,
    rpc: &R,
) -> Result<NormalizedSwap, SwapError>
where
    R: RpcAccessor + ?Sized,
{
    let transaction = SwapTransaction::decode(payload)?;

    let lookup_tables = match &transaction {
        SwapTransaction::Legacy(_) => Vec::new(),
        SwapTransaction::Versioned(_) => {
            let addresses = transaction.lookup_table_addresses();
            if addresses.is_empty() {
                Vec::new()
            } else {
                resolve_lookup_tables(rpc, &addresses).await?
            }
        }
    };

    let decompiled = transaction.decompile(&lookup_tables)?;
    let total = decompiled.len();
    let instructions = strip_compute_budget(decompiled);

    info!(
        version = %payload.version,
        instructions = instructions.len(),
        stripped = total - instructions.len(),
        lookup_tables = lookup_tables.len(),
        "Normalized swap transaction"
    );

    Ok(NormalizedSwap {
        instructions,
        lookup_tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{ReadError, SignatureInfo};
    use async_trait::async_trait;
    use solana_sdk::{
        hash::Hash,
        message::{v0, Message},
        signature::Signature,
    };
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[derive(Default)]
    struct TableRpc {
        tables: HashMap<Pubkey, AddressLookupTableAccount>,
        calls: AtomicUsize,
        slow: Option<Pubkey>,
    }

    impl TableRpc {
        fn with(tables: Vec<AddressLookupTableAccount>) -> Self {
            Self {
                tables: tables.into_iter().map(|t| (t.key, t)).collect(),
                ..Default::default()
            }
        }

        fn slow_on(mut self, address: Pubkey) -> Self {
            self.slow = Some(address);
            self
        }
    }

    #[async_trait]
    impl RpcAccessor for TableRpc {
        async fn get_balance(&self, _: &Pubkey) -> Result<u64, ReadError> {
            Ok(0)
        }

        async fn get_token_account_amount(&self, _: &Pubkey) -> Result<Option<u64>, ReadError> {
            Ok(None)
        }

        async fn get_address_lookup_table(
            &self,
            address: &Pubkey,
        ) -> Result<Option<AddressLookupTableAccount>, ReadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow == Some(*address) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(self.tables.get(address).cloned())
        }

        async fn get_signatures_for_address(
            &self,
            _: &Pubkey,
            _: usize,
        ) -> Result<Vec<SignatureInfo>, ReadError> {
            Ok(vec![])
        }
    }

    fn compute_unit_limit_ix(units: u32) -> Instruction {
        let mut data = vec![2u8];
        data.extend_from_slice(&units.to_le_bytes());
        Instruction::new_with_bytes(COMPUTE_BUDGET_PROGRAM_ID, &data, vec![])
    }

    fn compute_unit_price_ix(micro_lamports: u64) -> Instruction {
        let mut data = vec![3u8];
        data.extend_from_slice(&micro_lamports.to_le_bytes());
        Instruction::new_with_bytes(COMPUTE_BUDGET_PROGRAM_ID, &data, vec![])
    }

    fn swap_ix(payer: Pubkey, accounts: &[Pubkey]) -> Instruction {
        let mut metas = vec![AccountMeta::new(payer, true)];
        metas.extend(accounts.iter().map(|a| AccountMeta::new(*a, false)));
        Instruction::new_with_bytes(Pubkey::new_unique(), &[9, 9, 9], metas)
    }

    fn legacy_payload(payer: &Pubkey, instructions: &[Instruction]) -> RawTransactionPayload {
        let tx = Transaction::new_unsigned(Message::new(instructions, Some(payer)));
        RawTransactionPayload {
            transaction: STANDARD.encode(bincode::serialize(&tx).unwrap()),
            version: TxVersion::Legacy,
        }
    }

    fn v0_payload(
        payer: &Pubkey,
        instructions: &[Instruction],
        tables: &[AddressLookupTableAccount],
    ) -> RawTransactionPayload {
        let message = v0::Message::try_compile(payer, instructions, tables, Hash::default()).unwrap();
        let tx = VersionedTransaction {
            signatures: vec![Signature::default(); message.header.num_required_signatures as usize],
            message: VersionedMessage::V0(message),
        };
        RawTransactionPayload {
            transaction: STANDARD.encode(bincode::serialize(&tx).unwrap()),
            version: TxVersion::V0,
        }
    }

    fn table(addresses: Vec<Pubkey>) -> AddressLookupTableAccount {
        AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses,
        }
    }

    #[tokio::test]
    async fn legacy_strips_compute_budget_without_rpc() {
        let payer = Pubkey::new_unique();
        let swap = swap_ix(payer, &[Pubkey::new_unique(), Pubkey::new_unique()]);
        let payload = legacy_payload(
            &payer,
            &[compute_unit_limit_ix(400_000), compute_unit_price_ix(100_000), swap.clone()],
        );
        let rpc = TableRpc::default();

        let normalized = normalize(&payload, &rpc).await.unwrap();

        assert_eq!(normalized.instructions, vec![swap]);
        assert!(normalized.lookup_tables.is_empty());
        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn versioned_resolves_every_table_then_decompiles() {
        let payer = Pubkey::new_unique();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let c = Pubkey::new_unique();
        let t1 = table(vec![a, Pubkey::new_unique()]);
        let t2 = table(vec![Pubkey::new_unique(), b]);

        let mut swap = swap_ix(payer, &[a, b]);
        swap.accounts.push(AccountMeta::new_readonly(c, false));
        let payload = v0_payload(
            &payer,
            &[compute_unit_limit_ix(1_400_000), swap.clone()],
            &[t1.clone(), t2.clone()],
        );
        let rpc = TableRpc::with(vec![t1.clone(), t2.clone()]);

        let normalized = normalize(&payload, &rpc).await.unwrap();

        assert_eq!(rpc.calls.load(Ordering::SeqCst), 2);
        assert_eq!(normalized.instructions, vec![swap]);
        assert_eq!(normalized.lookup_tables, vec![t1, t2]);
    }

    #[tokio::test]
    async fn slow_first_table_keeps_message_order() {
        let payer = Pubkey::new_unique();
        let t1 = table(vec![Pubkey::new_unique()]);
        let t2 = table(vec![Pubkey::new_unique()]);
        let t3 = table(vec![Pubkey::new_unique()]);
        let ix = swap_ix(payer, &[t1.addresses[0], t2.addresses[0], t3.addresses[0]]);
        let payload = v0_payload(&payer, &[ix.clone()], &[t1.clone(), t2.clone(), t3.clone()]);
        let order = SwapTransaction::decode(&payload).unwrap().lookup_table_addresses();
        let rpc = TableRpc::with(vec![t1.clone(), t2.clone(), t3.clone()]).slow_on(order[0]);

        let resolved = resolve_lookup_tables(&rpc, &order).await.unwrap();

        assert_eq!(resolved.iter().map(|t| t.key).collect::<Vec<_>>(), order);
        let normalized = normalize(&payload, &rpc).await.unwrap();
        assert_eq!(normalized.instructions, vec![ix]);
    }

    #[tokio::test]
    async fn readonly_lookup_entries_stay_readonly() {
        let payer = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        let t = table(vec![oracle]);
        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1],
            vec![AccountMeta::new(payer, true), AccountMeta::new_readonly(oracle, false)],
        );
        let payload = v0_payload(&payer, &[ix.clone()], &[t.clone()]);

        let tx = SwapTransaction::decode(&payload).unwrap();
        assert_eq!(tx.lookup_table_addresses(), vec![t.key]);
        assert_eq!(tx.decompile(&[t]).unwrap(), vec![ix]);
    }

    #[tokio::test]
    async fn missing_table_aborts_with_its_address() {
        let payer = Pubkey::new_unique();
        let present = table(vec![Pubkey::new_unique()]);
        let missing = table(vec![Pubkey::new_unique()]);
        let ix = swap_ix(payer, &[present.addresses[0], missing.addresses[0]]);
        let payload = v0_payload(&payer, &[ix], &[present.clone(), missing.clone()]);
        let rpc = TableRpc::with(vec![present]);

        let err = normalize(&payload, &rpc).await.unwrap_err();

        match err {
            SwapError::LookupTableResolution { address, .. } => assert_eq!(address, missing.key),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn versioned_without_lookups_skips_resolution() {
        let payer = Pubkey::new_unique();
        let swap = swap_ix(payer, &[Pubkey::new_unique()]);
        let payload = v0_payload(&payer, &[compute_unit_price_ix(5), swap.clone()], &[]);
        let rpc = TableRpc::default();

        let normalized = normalize(&payload, &rpc).await.unwrap();

        assert_eq!(rpc.calls.load(Ordering::SeqCst), 0);
        assert_eq!(normalized.instructions, vec![swap]);
    }

    #[test]
    fn decompile_requires_resolved_tables() {
        let payer = Pubkey::new_unique();
        let t = table(vec![Pubkey::new_unique()]);
        let payload = v0_payload(&payer, &[swap_ix(payer, &[t.addresses[0]])], &[t.clone()]);
        let tx = SwapTransaction::decode(&payload).unwrap();

        assert!(matches!(
            tx.decompile(&[]),
            Err(SwapError::LookupTableResolution { address, .. }) if address == t.key
        ));
    }

    #[test]
    fn short_table_is_a_decode_error() {
        let payer = Pubkey::new_unique();
        let entry = Pubkey::new_unique();
        let full = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: vec![Pubkey::new_unique(), entry],
        };
        let payload = v0_payload(&payer, &[swap_ix(payer, &[entry])], &[full.clone()]);
        let tx = SwapTransaction::decode(&payload).unwrap();
        let truncated = AddressLookupTableAccount {
            key: full.key,
            addresses: vec![full.addresses[0]],
        };

        assert!(matches!(tx.decompile(&[truncated]), Err(SwapError::Decode(_))));
    }

    #[test]
    fn decode_rejects_garbage() {
        let bad_base64 = RawTransactionPayload {
            transaction: "not base64!".to_string(),
            version: TxVersion::Legacy,
        };
        assert!(matches!(
            SwapTransaction::decode(&bad_base64),
            Err(SwapError::Decode(_))
        ));

        let bad_bytes = RawTransactionPayload {
            transaction: STANDARD.encode([1u8, 2, 3]),
            version: TxVersion::V0,
        };
        assert!(matches!(
            SwapTransaction::decode(&bad_bytes),
            Err(SwapError::Decode(_))
        ));
    }

    #[test]
    fn decompile_is_deterministic() {
        let payer = Pubkey::new_unique();
        let payload = legacy_payload(&payer, &[swap_ix(payer, &[Pubkey::new_unique()])]);
        let tx = SwapTransaction::decode(&payload).unwrap();
        assert_eq!(tx.decompile(&[]).unwrap(), tx.decompile(&[]).unwrap());
    }
}
