use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, RoleId, UserId};
use std::collections::HashMap;
use std::sync::Arc;

use super::persist::{now_timestamp, StateFile};

/// Something members can buy with their vault balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: String,
    pub guild_id: GuildId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: u64,

    /// Remaining units, unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,

    /// Each user may own at most one
    #[serde(default)]
    pub exclusive: bool,

    /// Role granted on purchase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,

    pub created_at: DateTime<Utc>,
}

impl ShopItem {
    pub fn in_stock(&self) -> bool {
        self.stock.map_or(true, |n| n > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub at: DateTime<Utc>,
    /// Positive for credits, negative for debits
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vault {
    pub guild_id: GuildId,
    pub user: UserId,
    pub balance: u64,
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
    /// IDs of purchased items, one per unit
    #[serde(default)]
    pub inventory: Vec<String>,
    pub opened_at: DateTime<Utc>,
}

impl Vault {
    pub fn owns(&self, item_id: &str) -> bool {
        self.inventory.iter().any(|i| i == item_id)
    }
}

pub fn vault_key(guild_id: GuildId, user: UserId) -> String {
    format!("{}|{}", guild_id, user)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultStore {
    pub version: u32,
    pub last_updated: i64,

    /// "guild|user" -> vault
    pub vaults: HashMap<String, Vault>,

    /// Item ID -> item
    pub items: HashMap<String, ShopItem>,
}

impl Default for VaultStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: now_timestamp(),
            vaults: HashMap::new(),
            items: HashMap::new(),
        }
    }
}

impl StateFile for VaultStore {
    const FILE_NAME: &'static str = "vault.json";

    fn touch(&mut self) {
        self.last_updated = now_timestamp();
    }
}

impl VaultStore {
    /// Get the user's vault, opening it with `starting_balance` on first use
    pub fn vault_or_open(
        &mut self,
        guild_id: GuildId,
        user: UserId,
        starting_balance: u64,
        now: DateTime<Utc>,
    ) -> &mut Vault {
        self.vaults
            .entry(vault_key(guild_id, user))
            .or_insert_with(|| {
                let mut ledger = Vec::new();
                if starting_balance > 0 {
                    ledger.push(LedgerEntry {
                        at: now,
                        amount: starting_balance as i64,
                        reason: "starting balance".to_string(),
                    });
                }
                Vault {
                    guild_id,
                    user,
                    balance: starting_balance,
                    ledger,
                    inventory: Vec::new(),
                    opened_at: now,
                }
            })
    }

    pub fn vault(&self, guild_id: GuildId, user: UserId) -> Option<&Vault> {
        self.vaults.get(&vault_key(guild_id, user))
    }

    /// Items of a guild, cheapest first
    pub fn items_of(&self, guild_id: GuildId) -> Vec<&ShopItem> {
        let mut items: Vec<&ShopItem> = self.items.values().filter(|i| i.guild_id == guild_id).collect();
        items.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        items
    }
}

pub type SharedVaultStore = Arc<tokio::sync::RwLock<VaultStore>>;

pub fn create_shared_vault_store(store: VaultStore) -> SharedVaultStore {
    Arc::new(tokio::sync::RwLock::new(store))
}
