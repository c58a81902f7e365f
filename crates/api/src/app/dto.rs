//! Form and query DTOs.
//!
//! HTML forms submit empty strings for untouched inputs, so every field is
//! read as an optional string and parsed here: blank means "absent", and a
//! value that does not parse is a `400 validation_error` rather than an
//! extractor rejection.

use core::fmt::Display;
use core::str::FromStr;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use billdesk_auth::NewUser;
use billdesk_billing::{Bill, BillStatus, BillUpdate, Charges, LineRequest};
use billdesk_core::{CustomerId, DomainError, ItemId};
use billdesk_customers::{ContactDetails, CustomerDetails};
use billdesk_infra::query::{
    AmountRange, BillQuery, BillSortField, CustomerQuery, CustomerSortField, DateRange, ItemQuery, ItemSortField,
    PageRequest, Sort, SortDirection, SortField,
};
use billdesk_infra::services::{DASHBOARD_LOW_STOCK_THRESHOLD, NewBill};
use billdesk_inventory::{Item, ItemDetails, ItemStatus, NewItem};

use crate::app::errors;

type Parsed<T> = Result<T, Response>;

// -------------------------
// Parsing helpers
// -------------------------

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_opt<T>(field: &str, value: Option<&str>) -> Parsed<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    present(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| errors::validation_error(format!("{field} is invalid: {e}")))
        })
        .transpose()
}

fn parse_required<T>(field: &str, value: Option<&str>) -> Parsed<T>
where
    T: FromStr,
    T::Err: Display,
{
    parse_opt(field, value)?.ok_or_else(|| errors::validation_error(format!("{field} is required")))
}

/// Parse types whose `FromStr` already speaks the domain error language
/// (ids, statuses, sort fields).
fn parse_domain<T>(value: Option<&str>) -> Parsed<Option<T>>
where
    T: FromStr<Err = DomainError>,
{
    present(value)
        .map(|v| v.parse::<T>().map_err(errors::domain_error_to_response))
        .transpose()
}

/// RFC 3339 timestamp or `YYYY-MM-DD`; a bare date as an upper bound means
/// the end of that day.
fn parse_instant(field: &str, value: Option<&str>, end_of_day: bool) -> Parsed<Option<DateTime<Utc>>> {
    let Some(raw) = present(value) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        errors::validation_error(format!("{field} must be an RFC 3339 timestamp or a YYYY-MM-DD date"))
    })?;
    let at = if end_of_day {
        date.and_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    at.map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| errors::validation_error(format!("{field} is out of range")))
}

fn text(value: Option<String>) -> String {
    value.unwrap_or_default()
}

fn page_request(page: Option<&str>, size: Option<&str>) -> Parsed<PageRequest> {
    Ok(PageRequest::new(parse_opt("page", page)?, parse_opt("size", size)?))
}

fn sort<F>(sort_by: Option<&str>, sort_dir: Option<&str>, default: Sort<F>) -> Parsed<Sort<F>>
where
    F: SortField + FromStr<Err = DomainError>,
{
    Ok(Sort::new(
        parse_domain::<F>(sort_by)?.unwrap_or(default.field),
        parse_domain::<SortDirection>(sort_dir)?.unwrap_or(default.direction),
    ))
}

pub fn parse_id<T>(raw: &str) -> Parsed<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(errors::domain_error_to_response)
}

// -------------------------
// Auth forms
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl SignupForm {
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            name: text(self.name),
            username: text(self.username),
            email: text(self.email),
            password: text(self.password),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

// -------------------------
// Customer forms
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CustomerForm {
    pub name: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
}

impl CustomerForm {
    pub fn into_details(self) -> CustomerDetails {
        CustomerDetails {
            name: text(self.name),
            address: text(self.address),
            telephone: text(self.telephone),
            email: self.email,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    pub telephone: Option<String>,
    pub email: Option<String>,
}

impl ContactForm {
    pub fn into_contact(self) -> ContactDetails {
        ContactDetails {
            telephone: text(self.telephone),
            email: self.email,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AddressForm {
    pub address: Option<String>,
}

// -------------------------
// Item forms
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ItemForm {
    pub item_code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub stock_quantity: Option<String>,
    pub status: Option<String>,
}

impl ItemForm {
    pub fn into_new_item(self) -> Parsed<NewItem> {
        Ok(NewItem {
            price: parse_required("price", self.price.as_deref())?,
            stock_quantity: parse_required("stock quantity", self.stock_quantity.as_deref())?,
            status: parse_domain(self.status.as_deref())?,
            item_code: self.item_code,
            name: text(self.name),
            description: self.description,
        })
    }

    /// Full edit; an absent status keeps the item's current one.
    pub fn into_details(self, current: &Item) -> Parsed<ItemDetails> {
        Ok(ItemDetails {
            price: parse_required("price", self.price.as_deref())?,
            stock_quantity: parse_required("stock quantity", self.stock_quantity.as_deref())?,
            status: parse_domain(self.status.as_deref())?.unwrap_or(current.status()),
            item_code: self.item_code,
            name: text(self.name),
            description: self.description,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockForm {
    pub stock_quantity: Option<String>,
}

impl StockForm {
    pub fn quantity(&self) -> Parsed<i32> {
        parse_required("stock quantity", self.stock_quantity.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceForm {
    pub price: Option<String>,
}

impl PriceForm {
    pub fn price(&self) -> Parsed<Decimal> {
        parse_required("price", self.price.as_deref())
    }
}

// -------------------------
// Bill forms
// -------------------------

/// Bill creation form. Lines arrive as parallel repeated keys:
/// `item_ids=..&quantities=..&unit_prices=..`.
#[derive(Debug, Default, Deserialize)]
pub struct BillForm {
    pub customer_id: Option<String>,
    #[serde(default)]
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub quantities: Vec<String>,
    #[serde(default)]
    pub unit_prices: Vec<String>,
    pub tax_amount: Option<String>,
    pub discount_amount: Option<String>,
    pub status: Option<String>,
}

impl BillForm {
    pub fn into_new_bill(self) -> Parsed<NewBill> {
        let customer_id = parse_domain::<CustomerId>(self.customer_id.as_deref())?
            .ok_or_else(|| errors::validation_error("customer is required"))?;
        if self.quantities.len() != self.item_ids.len() {
            return Err(errors::validation_error("every item needs a quantity"));
        }

        let mut lines = Vec::with_capacity(self.item_ids.len());
        for (index, (item_id, quantity)) in self.item_ids.iter().zip(&self.quantities).enumerate() {
            let quantity: i32 = parse_opt("quantity", Some(quantity.as_str()))?.unwrap_or(0);
            if quantity <= 0 {
                // Unused rows of the form are dropped without touching the item id.
                continue;
            }
            let item_id = parse_domain::<ItemId>(Some(item_id.as_str()))?
                .ok_or_else(|| errors::validation_error("item is required for every quantity"))?;
            lines.push(LineRequest {
                item_id,
                quantity,
                unit_price: parse_opt("unit price", self.unit_prices.get(index).map(String::as_str))?,
            });
        }

        Ok(NewBill {
            customer_id,
            lines,
            charges: Charges {
                tax_amount: parse_opt("tax amount", self.tax_amount.as_deref())?,
                discount_amount: parse_opt("discount amount", self.discount_amount.as_deref())?,
            },
            status: parse_domain(self.status.as_deref())?,
        })
    }
}

/// Bill header edit. Every blank or absent field keeps the bill's current
/// value; send `0` to clear tax or discount.
#[derive(Debug, Default, Deserialize)]
pub struct BillEditForm {
    pub customer_id: Option<String>,
    pub tax_amount: Option<String>,
    pub discount_amount: Option<String>,
    pub status: Option<String>,
}

impl BillEditForm {
    pub fn into_update(self, current: &Bill) -> Parsed<BillUpdate> {
        Ok(BillUpdate {
            customer_id: parse_domain(self.customer_id.as_deref())?.unwrap_or(current.customer_id()),
            charges: Charges {
                tax_amount: parse_opt("tax amount", self.tax_amount.as_deref())?.or(Some(current.tax_amount())),
                discount_amount: parse_opt("discount amount", self.discount_amount.as_deref())?
                    .or(Some(current.discount_amount())),
            },
            status: parse_domain(self.status.as_deref())?.unwrap_or(current.status()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    pub status: Option<String>,
}

impl StatusForm {
    pub fn status(&self) -> Parsed<BillStatus> {
        parse_domain(self.status.as_deref())?.ok_or_else(|| errors::validation_error("status is required"))
    }
}

// -------------------------
// Query strings
// -------------------------

/// `GET /customers` and `GET /items`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl ListQuery {
    pub fn customer_query(&self) -> Parsed<CustomerQuery> {
        let defaults = CustomerQuery::default();
        Ok(CustomerQuery {
            keyword: present(self.search.as_deref()).map(str::to_string),
            sort: sort::<CustomerSortField>(self.sort_by.as_deref(), self.sort_dir.as_deref(), defaults.sort)?,
            page: page_request(self.page.as_deref(), self.size.as_deref())?,
        })
    }

    pub fn item_query(&self) -> Parsed<ItemQuery> {
        let defaults = ItemQuery::default();
        Ok(ItemQuery {
            keyword: present(self.search.as_deref()).map(str::to_string),
            status: parse_domain::<ItemStatus>(self.status.as_deref())?,
            sort: sort::<ItemSortField>(self.sort_by.as_deref(), self.sort_dir.as_deref(), defaults.sort)?,
            page: page_request(self.page.as_deref(), self.size.as_deref())?,
        })
    }
}

/// `GET /bills`.
#[derive(Debug, Default, Deserialize)]
pub struct BillListQuery {
    pub page: Option<String>,
    pub size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub search: Option<String>,
}

impl BillListQuery {
    pub fn bill_query(&self) -> Parsed<BillQuery> {
        let defaults = BillQuery::default();
        Ok(BillQuery {
            status: parse_domain(self.status.as_deref())?,
            customer_id: parse_domain(self.customer_id.as_deref())?,
            created: date_range(self.from.as_deref(), self.to.as_deref())?,
            total_amount: AmountRange {
                min: parse_opt("min amount", self.min_amount.as_deref())?,
                max: parse_opt("max amount", self.max_amount.as_deref())?,
            },
            keyword: present(self.search.as_deref()).map(str::to_string),
            sort: sort::<BillSortField>(self.sort_by.as_deref(), self.sort_dir.as_deref(), defaults.sort)?,
            page: page_request(self.page.as_deref(), self.size.as_deref())?,
        })
    }
}

fn date_range(from: Option<&str>, to: Option<&str>) -> Parsed<DateRange> {
    Ok(DateRange {
        from: parse_instant("from", from, false)?,
        to: parse_instant("to", to, true)?,
    })
}

/// `GET /customers/search` and `GET /items/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

impl SearchQuery {
    pub fn customer_query(&self) -> Parsed<CustomerQuery> {
        Ok(CustomerQuery {
            keyword: present(self.query.as_deref()).map(str::to_string),
            page: page_request(self.page.as_deref(), self.size.as_deref())?,
            ..CustomerQuery::default()
        })
    }

    pub fn item_query(&self) -> Parsed<ItemQuery> {
        Ok(ItemQuery {
            keyword: present(self.query.as_deref()).map(str::to_string),
            page: page_request(self.page.as_deref(), self.size.as_deref())?,
            ..ItemQuery::default()
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<String>,
}

impl ThresholdQuery {
    pub fn threshold(&self) -> Parsed<i32> {
        Ok(parse_opt("threshold", self.threshold.as_deref())?.unwrap_or(DASHBOARD_LOW_STOCK_THRESHOLD))
    }
}

/// `GET /bills/revenue`.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RangeQuery {
    pub fn range(&self) -> Parsed<DateRange> {
        date_range(self.from.as_deref(), self.to.as_deref())
    }
}

/// `GET /customers/:id/bills`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

impl StatusFilter {
    pub fn status(&self) -> Parsed<Option<BillStatus>> {
        parse_domain(self.status.as_deref())
    }
}
