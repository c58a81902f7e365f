//! PostgreSQL-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `StoreError` |
//! |------------|-----------------|--------------|
//! | unique violation | `23505` | `DuplicateKey(field)`, field taken from the constraint name |
//! | foreign key violation | `23503` | `Conflict` |
//! | check violation | `23514` | `Conflict` |
//! | anything else | any | `Backend` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use billdesk_auth::User;
use billdesk_billing::{Bill, BillItem, BillRecord, BillStatus, BillSummary};
use billdesk_core::{BillId, BillItemId, CustomerId, ItemId, Money, UserId};
use billdesk_customers::{Customer, CustomerDetails};
use billdesk_inventory::{Item, ItemDetails, ItemStatus};

use super::{BillStore, CustomerStore, ItemStore, StoreError, UserStore};
use crate::query::{BillQuery, CustomerQuery, DateRange, ItemQuery, Page, SortField, normalized_keyword};

/// Unique constraint name -> logical field name.
const UNIQUE_CONSTRAINTS: &[(&str, &str)] = &[
    ("customers_account_number_key", "account_number"),
    ("items_item_code_key", "item_code"),
    ("items_name_key", "item_name"),
    ("bills_bill_number_key", "bill_number"),
    ("users_username_key", "username"),
    ("users_email_key", "email"),
];

const CUSTOMER_COLUMNS: &str = "id, account_number, name, address, telephone, email, created_at";
const ITEM_COLUMNS: &str = "id, item_code, name, description, price, stock_quantity, status, created_at";
const BILL_COLUMNS: &str = "id, bill_number, customer_id, total_amount, tax_amount, discount_amount, \
                            final_amount, status, created_at, paid_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!(max_connections, "connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn count(&self, operation: &str, sql: &str, status: Option<&str>) -> Result<u64, StoreError> {
        let row = sqlx::query(sql)
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error(operation, e))?;
        Ok(total as u64)
    }

    async fn load_lines(&self, bill_id: BillId) -> Result<Vec<BillItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, quantity, unit_price
            FROM bill_items
            WHERE bill_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(bill_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_bill_items", e))?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("load_bill_items", e))?;
                let item_id: Uuid = row.try_get("item_id").map_err(|e| map_sqlx_error("load_bill_items", e))?;
                let quantity: i32 = row.try_get("quantity").map_err(|e| map_sqlx_error("load_bill_items", e))?;
                let unit_price: Decimal = row.try_get("unit_price").map_err(|e| map_sqlx_error("load_bill_items", e))?;
                BillItem::restore(BillItemId::from_uuid(id), ItemId::from_uuid(item_id), quantity, unit_price)
                    .map_err(|e| StoreError::Backend(format!("corrupt bill line {id}: {e}")))
            })
            .collect()
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => {
                    let field = db_err
                        .constraint()
                        .and_then(|name| UNIQUE_CONSTRAINTS.iter().find(|(c, _)| *c == name))
                        .map(|(_, field)| field.to_string())
                        .unwrap_or_else(|| "unique value".to_string());
                    StoreError::DuplicateKey(field)
                }
                Some("23503") => StoreError::Conflict(msg),
                // numeric_value_out_of_range, string_data_right_truncation, check_violation
                Some("22003") | Some("22001") | Some("23514") => StoreError::InvalidValue(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn decode_err(operation: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| map_sqlx_error(operation, e)
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    let e = decode_err("decode_customer");
    Ok(Customer::restore(
        CustomerId::from_uuid(row.try_get("id").map_err(&e)?),
        row.try_get("account_number").map_err(&e)?,
        CustomerDetails {
            name: row.try_get("name").map_err(&e)?,
            address: row.try_get("address").map_err(&e)?,
            telephone: row.try_get("telephone").map_err(&e)?,
            email: row.try_get("email").map_err(&e)?,
        },
        row.try_get("created_at").map_err(&e)?,
    ))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let e = decode_err("decode_item");
    let status: String = row.try_get("status").map_err(&e)?;
    let status: ItemStatus = status
        .parse()
        .map_err(|err| StoreError::Backend(format!("corrupt item status: {err}")))?;
    Ok(Item::restore(
        ItemId::from_uuid(row.try_get("id").map_err(&e)?),
        row.try_get("item_code").map_err(&e)?,
        ItemDetails {
            item_code: None,
            name: row.try_get("name").map_err(&e)?,
            description: row.try_get("description").map_err(&e)?,
            price: row.try_get("price").map_err(&e)?,
            stock_quantity: row.try_get("stock_quantity").map_err(&e)?,
            status,
        },
        row.try_get("created_at").map_err(&e)?,
    ))
}

fn bill_record_from_row(row: &PgRow) -> Result<BillRecord, StoreError> {
    let e = decode_err("decode_bill");
    let status: String = row.try_get("status").map_err(&e)?;
    let status: BillStatus = status
        .parse()
        .map_err(|err| StoreError::Backend(format!("corrupt bill status: {err}")))?;
    Ok(BillRecord {
        id: BillId::from_uuid(row.try_get("id").map_err(&e)?),
        bill_number: row.try_get("bill_number").map_err(&e)?,
        customer_id: CustomerId::from_uuid(row.try_get("customer_id").map_err(&e)?),
        total_amount: row.try_get("total_amount").map_err(&e)?,
        tax_amount: row.try_get("tax_amount").map_err(&e)?,
        discount_amount: row.try_get("discount_amount").map_err(&e)?,
        final_amount: row.try_get("final_amount").map_err(&e)?,
        status,
        created_at: row.try_get("created_at").map_err(&e)?,
        paid_at: row.try_get("paid_at").map_err(&e)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let e = decode_err("decode_user");
    let name: String = row.try_get("name").map_err(&e)?;
    let username: String = row.try_get("username").map_err(&e)?;
    let email: String = row.try_get("email").map_err(&e)?;
    let password_hash: String = row.try_get("password_hash").map_err(&e)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(&e)?;
    Ok(User::new(
        UserId::from_uuid(row.try_get("id").map_err(&e)?),
        name,
        username,
        email,
        password_hash,
        created_at,
    ))
}

#[async_trait]
impl CustomerStore for PostgresStore {
    #[instrument(skip(self, customer), fields(customer_id = %customer.id_typed()), err)]
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, account_number, name, address, telephone, email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(customer.id_typed().as_uuid())
        .bind(customer.account_number())
        .bind(customer.name())
        .bind(customer.address())
        .bind(customer.telephone())
        .bind(customer.email())
        .bind(customer.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id_typed()), err)]
    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET account_number = $2, name = $3, address = $4, telephone = $5, email = $6
            WHERE id = $1
            "#,
        )
        .bind(customer.id_typed().as_uuid())
        .bind(customer.account_number())
        .bind(customer.name())
        .bind(customer.address())
        .bind(customer.telephone())
        .bind(customer.email())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("customer {}", customer.id_typed())));
        }
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_customer", e))?;
        row.as_ref().map(customer_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_customer(&self, id: CustomerId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn account_number_exists(&self, account_number: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM customers WHERE account_number = $1) AS taken")
            .bind(account_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("account_number_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("account_number_exists", e))
    }

    #[instrument(skip(self, query), err)]
    async fn list_customers(&self, query: &CustomerQuery) -> Result<Page<Customer>, StoreError> {
        let pattern = normalized_keyword(query.keyword.as_deref()).map(|k| like_pattern(&k));
        let filter = r#"
            WHERE ($1::text IS NULL
                OR LOWER(name) LIKE $1
                OR LOWER(account_number) LIKE $1
                OR LOWER(COALESCE(email, '')) LIKE $1
                OR LOWER(telephone) LIKE $1)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM customers {filter}"))
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_customers", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers {filter} ORDER BY {} {}, id ASC LIMIT $2 OFFSET $3",
            query.sort.field.column(),
            query.sort.direction.as_sql(),
        ))
        .bind(pattern.as_deref())
        .bind(query.page.limit() as i64)
        .bind(query.page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_customers", e))?;

        let content = rows.iter().map(customer_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, query.page, total as u64))
    }

    async fn count_customers(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM customers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_customers", e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("count_customers", e))?;
        Ok(total as u64)
    }
}

#[async_trait]
impl ItemStore for PostgresStore {
    #[instrument(skip(self, item), fields(item_id = %item.id_typed()), err)]
    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, item_code, name, description, price, stock_quantity, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(item.id_typed().as_uuid())
        .bind(item.item_code())
        .bind(item.name())
        .bind(item.description())
        .bind(item.price())
        .bind(item.stock_quantity())
        .bind(item.status().as_str())
        .bind(item.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id_typed()), err)]
    async fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET item_code = $2, name = $3, description = $4, price = $5, stock_quantity = $6, status = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id_typed().as_uuid())
        .bind(item.item_code())
        .bind(item.name())
        .bind(item.description())
        .bind(item.price())
        .bind(item.stock_quantity())
        .bind(item.status().as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("item {}", item.id_typed())));
        }
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn item_code_exists(&self, item_code: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM items WHERE item_code = $1) AS taken")
            .bind(item_code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("item_code_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("item_code_exists", e))
    }

    #[instrument(skip(self, query), err)]
    async fn list_items(&self, query: &ItemQuery) -> Result<Page<Item>, StoreError> {
        let pattern = normalized_keyword(query.keyword.as_deref()).map(|k| like_pattern(&k));
        let status = query.status.map(|s| s.as_str());
        let filter = r#"
            WHERE ($1::text IS NULL OR LOWER(name) LIKE $1 OR LOWER(item_code) LIKE $1)
              AND ($2::text IS NULL OR status = $2)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM items {filter}"))
            .bind(pattern.as_deref())
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_items", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items {filter} ORDER BY {} {}, id ASC LIMIT $3 OFFSET $4",
            query.sort.field.column(),
            query.sort.direction.as_sql(),
        ))
        .bind(pattern.as_deref())
        .bind(status)
        .bind(query.page.limit() as i64)
        .bind(query.page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let content = rows.iter().map(item_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, query.page, total as u64))
    }

    async fn low_stock_items(&self, threshold: i32) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE stock_quantity <= $1 ORDER BY stock_quantity ASC, name ASC"
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    async fn count_items(&self, status: Option<ItemStatus>) -> Result<u64, StoreError> {
        self.count(
            "count_items",
            "SELECT COUNT(*) AS total FROM items WHERE ($1::text IS NULL OR status = $1)",
            status.map(|s| s.as_str()),
        )
        .await
    }

    async fn count_low_stock(&self, threshold: i32) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM items WHERE stock_quantity <= $1")
            .bind(threshold)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_low_stock", e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("count_low_stock", e))?;
        Ok(total as u64)
    }
}

#[async_trait]
impl BillStore for PostgresStore {
    async fn next_bill_sequence(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT nextval('bill_number_seq') AS value")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("next_bill_sequence", e))?;
        let value: i64 = row.try_get("value").map_err(|e| map_sqlx_error("next_bill_sequence", e))?;
        Ok(value as u64)
    }

    #[instrument(
        skip(self, bill),
        fields(bill_id = %bill.id_typed(), bill_number = bill.bill_number(), line_count = bill.items().len()),
        err
    )]
    async fn insert_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!(
            "INSERT INTO bills ({BILL_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(bill.id_typed().as_uuid())
        .bind(bill.bill_number())
        .bind(bill.customer_id().as_uuid())
        .bind(bill.total_amount())
        .bind(bill.tax_amount())
        .bind(bill.discount_amount())
        .bind(bill.final_amount())
        .bind(bill.status().as_str())
        .bind(bill.created_at())
        .bind(bill.paid_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_bill", e))?;

        for (position, line) in bill.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO bill_items (id, bill_id, item_id, position, quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id_typed().as_uuid())
            .bind(bill.id_typed().as_uuid())
            .bind(line.item_id().as_uuid())
            .bind(position as i32)
            .bind(line.quantity())
            .bind(line.unit_price())
            .bind(line.total_price())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_bill_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, bill), fields(bill_id = %bill.id_typed(), status = %bill.status()), err)]
    async fn update_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bills
            SET customer_id = $2, total_amount = $3, tax_amount = $4, discount_amount = $5,
                final_amount = $6, status = $7, paid_at = $8
            WHERE id = $1
            "#,
        )
        .bind(bill.id_typed().as_uuid())
        .bind(bill.customer_id().as_uuid())
        .bind(bill.total_amount())
        .bind(bill.tax_amount())
        .bind(bill.discount_amount())
        .bind(bill.final_amount())
        .bind(bill.status().as_str())
        .bind(bill.paid_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_bill", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("bill {}", bill.id_typed())));
        }
        Ok(())
    }

    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, StoreError> {
        let row = sqlx::query(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_bill", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let record = bill_record_from_row(&row)?;
        let lines = self.load_lines(id).await?;
        Ok(Some(Bill::restore(record, lines)))
    }

    #[instrument(skip(self), err)]
    async fn delete_bill(&self, id: BillId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_bill", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, query), err)]
    async fn list_bills(&self, query: &BillQuery) -> Result<Page<BillSummary>, StoreError> {
        let pattern = normalized_keyword(query.keyword.as_deref()).map(|k| like_pattern(&k));
        let status = query.status.map(|s| s.as_str());
        let customer_id = query.customer_id.map(|c| *c.as_uuid());
        let filter = r#"
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR customer_id = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
              AND ($5::numeric IS NULL OR total_amount >= $5)
              AND ($6::numeric IS NULL OR total_amount <= $6)
              AND ($7::text IS NULL OR LOWER(bill_number) LIKE $7)
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM bills {filter}"))
            .bind(status)
            .bind(customer_id)
            .bind(query.created.from)
            .bind(query.created.to)
            .bind(query.total_amount.min)
            .bind(query.total_amount.max)
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_bills", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {BILL_COLUMNS} FROM bills {filter} ORDER BY {} {}, id ASC LIMIT $8 OFFSET $9",
            query.sort.field.column(),
            query.sort.direction.as_sql(),
        ))
        .bind(status)
        .bind(customer_id)
        .bind(query.created.from)
        .bind(query.created.to)
        .bind(query.total_amount.min)
        .bind(query.total_amount.max)
        .bind(pattern.as_deref())
        .bind(query.page.limit() as i64)
        .bind(query.page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_bills", e))?;

        let content = rows
            .iter()
            .map(|row| bill_record_from_row(row).map(BillSummary::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(content, query.page, total as u64))
    }

    async fn bills_for_customer(
        &self,
        customer_id: CustomerId,
        status: Option<BillStatus>,
    ) -> Result<Vec<BillSummary>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {BILL_COLUMNS} FROM bills \
             WHERE customer_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id.as_uuid())
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("bills_for_customer", e))?;
        rows.iter()
            .map(|row| bill_record_from_row(row).map(BillSummary::from))
            .collect()
    }

    async fn count_bills(&self, status: Option<BillStatus>) -> Result<u64, StoreError> {
        self.count(
            "count_bills",
            "SELECT COUNT(*) AS total FROM bills WHERE ($1::text IS NULL OR status = $1)",
            status.map(|s| s.as_str()),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn paid_revenue(&self, range: DateRange) -> Result<Money, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(total_amount), 0) AS revenue
            FROM bills
            WHERE status = 'PAID'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("paid_revenue", e))?;
        let revenue: Decimal = row.try_get("revenue").map_err(|e| map_sqlx_error("paid_revenue", e))?;
        Ok(billdesk_core::money::at_currency_scale(revenue))
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(username = user.username()), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id_typed().as_uuid())
        .bind(user.name())
        .bind(user.username())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_username", e))?;
        row.as_ref().map(user_from_row).transpose()
    }
}
