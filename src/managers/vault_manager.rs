use chrono::{DateTime, Utc};
use serde::Serialize;
use serenity::model::id::{GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::role_manager::SharedRoleSync;
use crate::config::ShopConfig;
use crate::error::{BotError, Result};
use crate::locks::KeyedLocks;
use crate::state::{save_state, LedgerEntry, SharedVaultStore, ShopItem, StateFile, Vault, VaultStore};

#[derive(Debug, Clone)]
pub struct NewItem {
    pub guild_id: GuildId,
    pub name: String,
    pub description: String,
    pub price: u64,
    pub stock: Option<u32>,
    pub exclusive: bool,
    pub role: Option<RoleId>,
}

/// Result of a successful purchase
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub item_id: String,
    pub item_name: String,
    pub price: u64,
    pub balance: u64,
    pub role_granted: bool,
}

pub struct VaultManager {
    store: SharedVaultStore,
    /// Keyed by (guild, user)
    locks: KeyedLocks<(GuildId, UserId)>,
    roles: SharedRoleSync,
    config: ShopConfig,
    state_path: Option<String>,
}

impl VaultManager {
    pub fn new(store: SharedVaultStore, roles: SharedRoleSync, config: ShopConfig, state_path: Option<String>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            roles,
            config,
            state_path,
        }
    }

    async fn persist(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            let mut store: tokio::sync::RwLockWriteGuard<'_, VaultStore> = self.store.write().await;
            store.touch();
            save_state(&*store, path).await?;
        }
        Ok(())
    }

    /// The user's vault, opened on first access
    pub async fn vault(&self, guild_id: GuildId, user: UserId, now: DateTime<Utc>) -> Result<Vault> {
        let _guard = self.locks.lock((guild_id, user)).await;
        let (vault, opened) = {
            let mut store = self.store.write().await;
            let opened = store.vault(guild_id, user).is_none();
            (
                store
                    .vault_or_open(guild_id, user, self.config.starting_balance, now)
                    .clone(),
                opened,
            )
        };
        if opened {
            info!("Opened vault for {} in {}", user, guild_id);
            self.persist().await?;
        }
        Ok(vault)
    }

    pub async fn balance(&self, guild_id: GuildId, user: UserId, now: DateTime<Utc>) -> Result<u64> {
        Ok(self.vault(guild_id, user, now).await?.balance)
    }

    pub async fn credit(
        &self,
        guild_id: GuildId,
        user: UserId,
        amount: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let amount_signed = i64::try_from(amount).map_err(|_| BotError::Internal {
            message: format!("credit of {} is out of range", amount),
        })?;
        let _guard = self.locks.lock((guild_id, user)).await;

        let balance = {
            let mut store = self.store.write().await;
            let vault = store.vault_or_open(guild_id, user, self.config.starting_balance, now);
            vault.balance = vault.balance.saturating_add(amount);
            vault.ledger.push(LedgerEntry {
                at: now,
                amount: amount_signed,
                reason: reason.to_string(),
            });
            vault.balance
        };

        info!("Credited {} to {} ({}), balance {}", amount, user, reason, balance);
        self.persist().await?;
        Ok(balance)
    }

    pub async fn debit(
        &self,
        guild_id: GuildId,
        user: UserId,
        amount: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let amount_signed = i64::try_from(amount).map_err(|_| BotError::Internal {
            message: format!("debit of {} is out of range", amount),
        })?;
        let _guard = self.locks.lock((guild_id, user)).await;

        let balance = {
            let mut store = self.store.write().await;
            let vault = store.vault_or_open(guild_id, user, self.config.starting_balance, now);
            if vault.balance < amount {
                return Err(BotError::InsufficientFunds {
                    balance: vault.balance,
                    price: amount,
                });
            }
            vault.balance -= amount;
            vault.ledger.push(LedgerEntry {
                at: now,
                amount: -amount_signed,
                reason: reason.to_string(),
            });
            vault.balance
        };

        info!("Debited {} from {} ({}), balance {}", amount, user, reason, balance);
        self.persist().await?;
        Ok(balance)
    }

    pub async fn add_item(&self, new: NewItem) -> Result<ShopItem> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(BotError::ConfigValidation {
                message: "item name cannot be empty".to_string(),
            });
        }
        if i64::try_from(new.price).is_err() {
            return Err(BotError::ConfigValidation {
                message: format!("price {} is out of range", new.price),
            });
        }

        let item = ShopItem {
            id: uuid::Uuid::new_v4().to_string(),
            guild_id: new.guild_id,
            name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            exclusive: new.exclusive,
            role: new.role,
            created_at: Utc::now(),
        };

        {
            let mut store = self.store.write().await;
            store.items.insert(item.id.clone(), item.clone());
        }
        info!("Added shop item '{}' ({}) for {}", item.name, item.id, item.price);
        self.persist().await?;
        Ok(item)
    }

    pub async fn remove_item(&self, item_id: &str) -> Result<ShopItem> {
        let item = {
            let mut store = self.store.write().await;
            store.items.remove(item_id).ok_or_else(|| BotError::NotFound {
                kind: "Item",
                id: item_id.to_string(),
            })?
        };
        info!("Removed shop item '{}'", item.name);
        self.persist().await?;
        Ok(item)
    }

    pub async fn items(&self, guild_id: GuildId) -> Vec<ShopItem> {
        let store = self.store.read().await;
        store.items_of(guild_id).into_iter().cloned().collect()
    }

    /// Buy one unit of an item and grant its role reward
    pub async fn purchase(&self, guild_id: GuildId, user: UserId, item_id: &str, now: DateTime<Utc>) -> Result<Receipt> {
        let _guard = self.locks.lock((guild_id, user)).await;

        let (item, balance) = {
            let mut store = self.store.write().await;
            let item = store
                .items
                .get(item_id)
                .filter(|i| i.guild_id == guild_id)
                .cloned()
                .ok_or_else(|| BotError::NotFound {
                    kind: "Item",
                    id: item_id.to_string(),
                })?;
            if !item.in_stock() {
                return Err(BotError::OutOfStock { item: item.name });
            }

            let vault = store.vault_or_open(guild_id, user, self.config.starting_balance, now);
            if item.exclusive && vault.owns(&item.id) {
                return Err(BotError::AlreadyOwned { item: item.name });
            }
            if vault.balance < item.price {
                return Err(BotError::InsufficientFunds {
                    balance: vault.balance,
                    price: item.price,
                });
            }

            vault.balance -= item.price;
            vault.ledger.push(LedgerEntry {
                at: now,
                amount: -(item.price as i64),
                reason: format!("purchase: {}", item.name),
            });
            vault.inventory.push(item.id.clone());
            let balance = vault.balance;

            if let Some(stored) = store.items.get_mut(item_id) {
                if let Some(stock) = stored.stock.as_mut() {
                    *stock -= 1;
                }
            }
            (item, balance)
        };

        info!("{} bought '{}' for {}, balance {}", user, item.name, item.price, balance);
        self.persist().await?;

        let mut role_granted = false;
        if let Some(role) = item.role {
            let reason = format!("Purchased {}", item.name);
            match self.roles.add_role(guild_id, user, role, &reason).await {
                Ok(()) => role_granted = true,
                Err(e) => warn!("Purchase of '{}' by {} could not grant role {}: {}", item.name, user, role, e),
            }
        } else {
            debug!("'{}' carries no role reward", item.name);
        }

        Ok(Receipt {
            item_id: item.id,
            item_name: item.name,
            price: item.price,
            balance,
            role_granted,
        })
    }
}

pub type SharedVaultManager = Arc<VaultManager>;

pub fn create_shared_vault_manager(
    store: SharedVaultStore,
    roles: SharedRoleSync,
    config: ShopConfig,
    state_path: Option<String>,
) -> SharedVaultManager {
    Arc::new(VaultManager::new(store, roles, config, state_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::role_manager::testing::RecordingRoleSync;
    use crate::state::create_shared_vault_store;

    const GUILD: GuildId = GuildId::new(1);
    const USER: UserId = UserId::new(2);

    fn setup(starting_balance: u64) -> (VaultManager, Arc<RecordingRoleSync>) {
        let roles = Arc::new(RecordingRoleSync::default());
        let manager = VaultManager::new(
            create_shared_vault_store(VaultStore::default()),
            roles.clone(),
            ShopConfig { starting_balance },
            None,
        );
        (manager, roles)
    }

    fn item(price: u64, stock: Option<u32>, exclusive: bool, role: Option<RoleId>) -> NewItem {
        NewItem {
            guild_id: GUILD,
            name: "Badge".to_string(),
            description: String::new(),
            price,
            stock,
            exclusive,
            role,
        }
    }

    #[tokio::test]
    async fn test_credit_and_debit_keep_ledger() {
        let (manager, _) = setup(50);
        let now = Utc::now();

        assert_eq!(manager.credit(GUILD, USER, 30, "war win", now).await.unwrap(), 80);
        assert_eq!(manager.debit(GUILD, USER, 20, "fine", now).await.unwrap(), 60);

        let err = manager.debit(GUILD, USER, 100, "too much", now).await.unwrap_err();
        assert!(matches!(err, BotError::InsufficientFunds { balance: 60, price: 100 }));

        let vault = manager.vault(GUILD, USER, now).await.unwrap();
        let amounts: Vec<i64> = vault.ledger.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![50, 30, -20]);
    }

    #[tokio::test]
    async fn test_purchase_grants_role_and_decrements_stock() {
        let (manager, roles) = setup(100);
        let now = Utc::now();
        let badge = manager
            .add_item(item(40, Some(1), false, Some(RoleId::new(9))))
            .await
            .unwrap();

        let receipt = manager.purchase(GUILD, USER, &badge.id, now).await.unwrap();
        assert_eq!(receipt.balance, 60);
        assert!(receipt.role_granted);
        assert_eq!(roles.added(), vec![USER]);

        let err = manager.purchase(GUILD, UserId::new(3), &badge.id, now).await.unwrap_err();
        assert!(matches!(err, BotError::OutOfStock { .. }));
        assert_eq!(manager.items(GUILD).await[0].stock, Some(0));
    }

    #[tokio::test]
    async fn test_exclusive_items_are_bought_once() {
        let (manager, _) = setup(100);
        let now = Utc::now();
        let title = manager.add_item(item(10, None, true, None)).await.unwrap();

        let receipt = manager.purchase(GUILD, USER, &title.id, now).await.unwrap();
        assert!(!receipt.role_granted);

        let err = manager.purchase(GUILD, USER, &title.id, now).await.unwrap_err();
        assert!(matches!(err, BotError::AlreadyOwned { .. }));
        assert_eq!(manager.balance(GUILD, USER, now).await.unwrap(), 90);
    }

    #[tokio::test]
    async fn test_purchase_rejects_insufficient_funds_without_changes() {
        let (manager, roles) = setup(5);
        let now = Utc::now();
        let badge = manager
            .add_item(item(40, Some(3), false, Some(RoleId::new(9))))
            .await
            .unwrap();

        let err = manager.purchase(GUILD, USER, &badge.id, now).await.unwrap_err();
        assert!(matches!(err, BotError::InsufficientFunds { balance: 5, price: 40 }));
        assert!(roles.calls().is_empty());
        assert_eq!(manager.items(GUILD).await[0].stock, Some(3));
        assert!(manager.vault(GUILD, USER, now).await.unwrap().inventory.is_empty());
    }

    #[tokio::test]
    async fn test_items_belong_to_their_guild() {
        let (manager, _) = setup(100);
        let badge = manager.add_item(item(10, None, false, None)).await.unwrap();

        let err = manager
            .purchase(GuildId::new(99), USER, &badge.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::NotFound { .. }));
    }
}
