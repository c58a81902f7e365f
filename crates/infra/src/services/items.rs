use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use billdesk_core::ItemId;
use billdesk_core::error::optional_text;
use billdesk_inventory::{Item, ItemDetails, NewItem};

use super::{CodeKind, MAX_CODE_ATTEMPTS, ServiceError, ServiceResult, Services, exhausted};
use crate::query::{ItemQuery, Page};
use crate::store::{ItemStore, StoreError};

impl Services {
    /// Create an item. A blank code is generated; a supplied code is used
    /// as-is and must be unique.
    #[instrument(skip(self, new), fields(name = %new.name), err)]
    pub async fn create_item(&self, new: NewItem) -> ServiceResult<Item> {
        let now = Utc::now();
        let supplied = optional_text(new.item_code.as_deref());
        let generated = supplied.is_none();
        let item_code = match supplied {
            Some(code) => code,
            None => self.free_code(CodeKind::ItemCode, now.date_naive()).await?,
        };
        let mut item = Item::create(ItemId::new(), item_code, new, now)?;

        for _ in 0..MAX_CODE_ATTEMPTS {
            match self.store.insert_item(&item).await {
                Ok(()) => {
                    info!(item_id = %item.id_typed(), item_code = item.item_code(), "item created");
                    return Ok(item);
                }
                Err(StoreError::DuplicateKey(field)) if generated && field == CodeKind::ItemCode.field() => {
                    warn!(item_code = item.item_code(), "item code collided on insert");
                    item.reassign_item_code(self.free_code(CodeKind::ItemCode, now.date_naive()).await?);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(exhausted(CodeKind::ItemCode))
    }

    pub async fn get_item(&self, id: ItemId) -> ServiceResult<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("item {id}")))
    }

    pub async fn list_items(&self, query: &ItemQuery) -> ServiceResult<Page<Item>> {
        Ok(self.store.list_items(query).await?)
    }

    /// Items at or below `threshold`, lowest stock first.
    pub async fn low_stock_items(&self, threshold: i32) -> ServiceResult<Vec<Item>> {
        Ok(self.store.low_stock_items(threshold).await?)
    }

    #[instrument(skip(self, details), err)]
    pub async fn update_item(&self, id: ItemId, details: ItemDetails) -> ServiceResult<Item> {
        self.mutate_item(id, |item| item.update(details)).await
    }

    #[instrument(skip(self), err)]
    pub async fn update_item_stock(&self, id: ItemId, quantity: i32) -> ServiceResult<Item> {
        self.mutate_item(id, |item| item.set_stock(quantity)).await
    }

    #[instrument(skip(self), err)]
    pub async fn update_item_price(&self, id: ItemId, price: Decimal) -> ServiceResult<Item> {
        self.mutate_item(id, |item| item.set_price(price)).await
    }

    pub async fn activate_item(&self, id: ItemId) -> ServiceResult<Item> {
        self.mutate_item(id, |item| {
            item.activate();
            Ok(())
        })
        .await
    }

    pub async fn deactivate_item(&self, id: ItemId) -> ServiceResult<Item> {
        self.mutate_item(id, |item| {
            item.deactivate();
            Ok(())
        })
        .await
    }

    /// Fails with `Conflict` while any bill line references the item.
    #[instrument(skip(self), err)]
    pub async fn delete_item(&self, id: ItemId) -> ServiceResult<()> {
        if !self.store.delete_item(id).await? {
            return Err(ServiceError::not_found(format!("item {id}")));
        }
        info!(item_id = %id, "item deleted");
        Ok(())
    }

    async fn mutate_item<F>(&self, id: ItemId, mutate: F) -> ServiceResult<Item>
    where
        F: FnOnce(&mut Item) -> billdesk_core::DomainResult<()>,
    {
        let mut item = self.get_item(id).await?;
        mutate(&mut item)?;
        self.store.update_item(&item).await?;
        Ok(item)
    }
}
