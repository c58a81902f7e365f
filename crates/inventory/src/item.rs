use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use billdesk_core::error::{optional_text, require_text};
use billdesk_core::{DomainError, DomainResult, Entity, ItemId, money};

/// Item availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [ItemStatus::Active, ItemStatus::Inactive, ItemStatus::OutOfStock];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "ACTIVE",
            ItemStatus::Inactive => "INACTIVE",
            ItemStatus::OutOfStock => "OUT_OF_STOCK",
        }
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown item status '{s}'")))
    }
}

/// Form input for creating an item.
///
/// A blank `item_code` asks the service to generate one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub item_code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub status: Option<ItemStatus>,
}

/// Full set of editable item fields.
///
/// `item_code: None` keeps the current code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item_code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub status: ItemStatus,
}

/// Sellable inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    item_code: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock_quantity: i32,
    status: ItemStatus,
    created_at: DateTime<Utc>,
}

impl Item {
    /// Create an item. `item_code` is the already-resolved (supplied or
    /// generated) code.
    pub fn create(
        id: ItemId,
        item_code: impl Into<String>,
        new: NewItem,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let stock_quantity = validate_stock(new.stock_quantity)?;
        let mut item = Self {
            id,
            item_code: require_text("item code", &item_code.into())?,
            name: require_text("item name", &new.name)?,
            description: optional_text(new.description.as_deref()),
            price: money::positive("price", new.price)?,
            stock_quantity: 0,
            status: new.status.unwrap_or_default(),
            created_at,
        };
        item.apply_stock(stock_quantity);
        Ok(item)
    }

    /// Rebuild a stored record without re-running validation.
    pub fn restore(
        id: ItemId,
        item_code: String,
        details: ItemDetails,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item_code,
            name: details.name,
            description: details.description,
            price: details.price,
            stock_quantity: details.stock_quantity,
            status: details.status,
            created_at,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn item_code(&self) -> &str {
        &self.item_code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn stock_quantity(&self) -> i32 {
        self.stock_quantity
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_low_stock(&self, threshold: i32) -> bool {
        self.stock_quantity <= threshold
    }

    /// Replace the generated code (used when a generated code collided).
    pub fn reassign_item_code(&mut self, item_code: impl Into<String>) {
        self.item_code = item_code.into();
    }

    /// Set the stock level and re-derive availability.
    ///
    /// - stock `<= 0` forces `OUT_OF_STOCK`
    /// - stock `> 0` while `OUT_OF_STOCK` reverts to `ACTIVE`
    /// - otherwise the current (manual) status is kept
    pub fn set_stock(&mut self, quantity: i32) -> DomainResult<()> {
        let quantity = validate_stock(quantity)?;
        self.apply_stock(quantity);
        Ok(())
    }

    pub fn set_price(&mut self, price: Decimal) -> DomainResult<()> {
        self.price = money::positive("price", price)?;
        Ok(())
    }

    pub fn activate(&mut self) {
        self.status = ItemStatus::Active;
    }

    pub fn deactivate(&mut self) {
        self.status = ItemStatus::Inactive;
    }

    /// Replace every editable field.
    ///
    /// The requested status is applied first, then the stock coupling, so a
    /// request of `ACTIVE` with zero stock still ends up `OUT_OF_STOCK`.
    pub fn update(&mut self, details: ItemDetails) -> DomainResult<()> {
        let item_code = match details.item_code.as_deref() {
            Some(code) if !code.trim().is_empty() => code.trim().to_string(),
            _ => self.item_code.clone(),
        };
        let name = require_text("item name", &details.name)?;
        let price = money::positive("price", details.price)?;
        let stock_quantity = validate_stock(details.stock_quantity)?;

        self.item_code = item_code;
        self.name = name;
        self.description = optional_text(details.description.as_deref());
        self.price = price;
        self.status = details.status;
        self.apply_stock(stock_quantity);
        Ok(())
    }

    /// Case-insensitive substring match over name and item code.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        needle.is_empty()
            || self.name.to_lowercase().contains(&needle)
            || self.item_code.to_lowercase().contains(&needle)
    }

    /// Snapshot of the editable fields.
    pub fn details(&self) -> ItemDetails {
        ItemDetails {
            item_code: Some(self.item_code.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            stock_quantity: self.stock_quantity,
            status: self.status,
        }
    }

    fn apply_stock(&mut self, quantity: i32) {
        self.stock_quantity = quantity;
        if quantity <= 0 {
            self.status = ItemStatus::OutOfStock;
        } else if self.status == ItemStatus::OutOfStock {
            self.status = ItemStatus::Active;
        }
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_stock(quantity: i32) -> DomainResult<i32> {
    if quantity < 0 {
        return Err(DomainError::validation("stock quantity must not be negative"));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn new_item(stock: i32) -> NewItem {
        NewItem {
            item_code: None,
            name: "Printer paper".to_string(),
            description: Some("A4, 500 sheets".to_string()),
            price: Decimal::new(1250, 2),
            stock_quantity: stock,
            status: None,
        }
    }

    fn item(stock: i32) -> Item {
        Item::create(ItemId::new(), "ITM-20240101-AAAA", new_item(stock), Utc::now()).unwrap()
    }

    #[test]
    fn create_defaults_to_active() {
        let item = item(5);
        assert_eq!(item.status(), ItemStatus::Active);
        assert_eq!(item.price().to_string(), "12.50");
    }

    #[test]
    fn create_with_zero_stock_is_out_of_stock() {
        assert_eq!(item(0).status(), ItemStatus::OutOfStock);
    }

    #[test]
    fn create_rejects_non_positive_price() {
        let err = Item::create(
            ItemId::new(),
            "ITM-1",
            NewItem { price: Decimal::ZERO, ..new_item(1) },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::Validation("price must be greater than 0".into()));
    }

    #[test]
    fn negative_stock_is_rejected() {
        let mut item = item(3);
        assert!(item.set_stock(-1).is_err());
        assert_eq!(item.stock_quantity(), 3);
        assert_eq!(item.status(), ItemStatus::Active);
    }

    #[test]
    fn restocking_out_of_stock_item_reactivates_it() {
        let mut item = item(0);
        item.set_stock(12).unwrap();
        assert_eq!(item.status(), ItemStatus::Active);
    }

    #[test]
    fn restocking_keeps_manual_inactive_status() {
        let mut item = item(4);
        item.deactivate();
        item.set_stock(40).unwrap();
        assert_eq!(item.status(), ItemStatus::Inactive);
    }

    #[test]
    fn update_applies_stock_coupling_after_requested_status() {
        let mut item = item(4);
        let mut details = item.details();
        details.stock_quantity = 0;
        details.status = ItemStatus::Active;
        item.update(details).unwrap();
        assert_eq!(item.status(), ItemStatus::OutOfStock);
    }

    #[test]
    fn update_with_blank_code_keeps_existing_code() {
        let mut item = item(4);
        let mut details = item.details();
        details.item_code = Some("  ".into());
        details.name = "Paper".into();
        item.update(details).unwrap();
        assert_eq!(item.item_code(), "ITM-20240101-AAAA");
        assert_eq!(item.name(), "Paper");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("out_of_stock".parse::<ItemStatus>().unwrap(), ItemStatus::OutOfStock);
        assert!("discontinued".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn keyword_matches_name_or_code() {
        let item = item(1);
        assert!(item.matches_keyword("PAPER"));
        assert!(item.matches_keyword("itm-2024"));
        assert!(!item.matches_keyword("toner"));
    }

    fn any_status() -> impl Strategy<Value = ItemStatus> {
        prop_oneof![
            Just(ItemStatus::Active),
            Just(ItemStatus::Inactive),
            Just(ItemStatus::OutOfStock),
        ]
    }

    proptest! {
        #[test]
        fn zero_stock_always_means_out_of_stock(status in any_status(), stock in 0i32..1000) {
            let mut item = item(stock);
            let mut details = item.details();
            details.status = status;
            item.update(details).unwrap();

            item.set_stock(0).unwrap();
            prop_assert_eq!(item.status(), ItemStatus::OutOfStock);
        }

        #[test]
        fn positive_stock_never_leaves_item_out_of_stock(
            status in any_status(),
            initial in 0i32..5,
            stock in 1i32..1000,
        ) {
            let mut item = item(initial);
            let mut details = item.details();
            details.status = status;
            item.update(details).unwrap();
            let before = item.status();

            item.set_stock(stock).unwrap();
            prop_assert_ne!(item.status(), ItemStatus::OutOfStock);
            if before != ItemStatus::OutOfStock {
                prop_assert_eq!(item.status(), before);
            }
        }
    }
}
