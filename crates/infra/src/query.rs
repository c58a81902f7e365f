//! List queries: pagination, sorting and filters.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use billdesk_billing::BillStatus;
use billdesk_core::{CustomerId, DomainError};
use billdesk_inventory::ItemStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Apply defaults and clamp `size` into `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(0),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(u64::from(request.size)),
        }
    }

    /// Slice an already filtered and sorted collection.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let content = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.size as usize)
            .collect();
        Self::new(content, request, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DomainError::validation(format!(
                "sort direction must be asc or desc, got '{other}'"
            ))),
        }
    }
}

/// Sortable field with a stable SQL column name.
pub trait SortField: Copy {
    fn column(&self) -> &'static str;
}

/// Defines a sort-field enum parsed from its column name or camelCase alias.
macro_rules! sort_fields {
    ($name:ident, $what:literal, { $($variant:ident => $column:literal $(| $alias:literal)?),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl SortField for $name {
            fn column(&self) -> &'static str {
                match self {
                    $($name::$variant => $column),+
                }
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($column $(| $alias)? => Ok($name::$variant),)+
                    other => Err(DomainError::validation(format!(
                        concat!("unknown ", $what, " sort field '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

sort_fields!(CustomerSortField, "customer", {
    Name => "name",
    AccountNumber => "account_number" | "accountNumber",
    Email => "email",
    CreatedAt => "created_at" | "createdAt",
});

sort_fields!(ItemSortField, "item", {
    Name => "name",
    ItemCode => "item_code" | "itemCode",
    Price => "price",
    StockQuantity => "stock_quantity" | "stockQuantity",
    Status => "status",
    CreatedAt => "created_at" | "createdAt",
});

sort_fields!(BillSortField, "bill", {
    BillNumber => "bill_number" | "billNumber",
    TotalAmount => "total_amount" | "totalAmount",
    FinalAmount => "final_amount" | "finalAmount",
    Status => "status",
    CreatedAt => "created_at" | "createdAt",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: SortField> Sort<F> {
    pub fn new(field: F, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Customer list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerQuery {
    pub keyword: Option<String>,
    pub sort: Sort<CustomerSortField>,
    pub page: PageRequest,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            sort: Sort::new(CustomerSortField::Name, SortDirection::Asc),
            page: PageRequest::default(),
        }
    }
}

/// Item list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub keyword: Option<String>,
    pub status: Option<ItemStatus>,
    pub sort: Sort<ItemSortField>,
    pub page: PageRequest,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            status: None,
            sort: Sort::new(ItemSortField::Name, SortDirection::Asc),
            page: PageRequest::default(),
        }
    }
}

/// Inclusive creation-time range; a missing end is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// Inclusive amount range over `total_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl AmountRange {
    pub fn contains(&self, amount: Decimal) -> bool {
        self.min.is_none_or(|min| amount >= min) && self.max.is_none_or(|max| amount <= max)
    }
}

/// Bill list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillQuery {
    pub status: Option<BillStatus>,
    pub customer_id: Option<CustomerId>,
    pub created: DateRange,
    pub total_amount: AmountRange,
    /// Substring of the bill number.
    pub keyword: Option<String>,
    pub sort: Sort<BillSortField>,
    pub page: PageRequest,
}

impl Default for BillQuery {
    fn default() -> Self {
        Self {
            status: None,
            customer_id: None,
            created: DateRange::default(),
            total_amount: AmountRange::default(),
            keyword: None,
            sort: Sort::new(BillSortField::CreatedAt, SortDirection::Desc),
            page: PageRequest::default(),
        }
    }
}

/// Lower-cased, trimmed keyword; blank means "no filter".
pub fn normalized_keyword(keyword: Option<&str>) -> Option<String> {
    keyword
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
}
