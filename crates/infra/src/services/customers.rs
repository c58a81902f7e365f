use chrono::Utc;
use tracing::{info, instrument, warn};

use billdesk_billing::{BillStatus, BillSummary};
use billdesk_core::CustomerId;
use billdesk_customers::{ContactDetails, Customer, CustomerDetails};

use super::{CodeKind, MAX_CODE_ATTEMPTS, ServiceError, ServiceResult, Services, exhausted};
use crate::query::{CustomerQuery, Page};
use crate::store::{BillStore, CustomerStore, StoreError};

impl Services {
    /// Register a customer under a freshly generated account number.
    ///
    /// A number that collides at insert time (raced past the existence check)
    /// is redrawn like any other collision.
    #[instrument(skip(self, details), err)]
    pub async fn create_customer(&self, details: CustomerDetails) -> ServiceResult<Customer> {
        let now = Utc::now();
        let account_number = self.free_code(CodeKind::AccountNumber, now.date_naive()).await?;
        let mut customer = Customer::register(CustomerId::new(), account_number, details, now)?;

        for _ in 0..MAX_CODE_ATTEMPTS {
            match self.store.insert_customer(&customer).await {
                Ok(()) => {
                    info!(
                        customer_id = %customer.id_typed(),
                        account_number = customer.account_number(),
                        "customer registered"
                    );
                    return Ok(customer);
                }
                Err(StoreError::DuplicateKey(field)) if field == CodeKind::AccountNumber.field() => {
                    warn!(account_number = customer.account_number(), "account number collided on insert");
                    customer.reassign_account_number(
                        self.free_code(CodeKind::AccountNumber, now.date_naive()).await?,
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(exhausted(CodeKind::AccountNumber))
    }

    pub async fn get_customer(&self, id: CustomerId) -> ServiceResult<Customer> {
        self.store
            .get_customer(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("customer {id}")))
    }

    /// The customer plus its bills (newest first), optionally by status.
    pub async fn get_customer_with_bills(
        &self,
        id: CustomerId,
        status: Option<BillStatus>,
    ) -> ServiceResult<(Customer, Vec<BillSummary>)> {
        let customer = self.get_customer(id).await?;
        let bills = self.store.bills_for_customer(id, status).await?;
        Ok((customer, bills))
    }

    pub async fn list_customers(&self, query: &CustomerQuery) -> ServiceResult<Page<Customer>> {
        Ok(self.store.list_customers(query).await?)
    }

    #[instrument(skip(self, details), err)]
    pub async fn update_customer(&self, id: CustomerId, details: CustomerDetails) -> ServiceResult<Customer> {
        let mut customer = self.get_customer(id).await?;
        customer.update_details(details)?;
        self.store.update_customer(&customer).await?;
        Ok(customer)
    }

    #[instrument(skip(self, contact), err)]
    pub async fn update_customer_contact(&self, id: CustomerId, contact: ContactDetails) -> ServiceResult<Customer> {
        let mut customer = self.get_customer(id).await?;
        customer.update_contact(contact)?;
        self.store.update_customer(&customer).await?;
        Ok(customer)
    }

    #[instrument(skip(self, address), err)]
    pub async fn update_customer_address(&self, id: CustomerId, address: &str) -> ServiceResult<Customer> {
        let mut customer = self.get_customer(id).await?;
        customer.update_address(address)?;
        self.store.update_customer(&customer).await?;
        Ok(customer)
    }

    /// Delete a customer and, with it, all of its bills.
    #[instrument(skip(self), err)]
    pub async fn delete_customer(&self, id: CustomerId) -> ServiceResult<()> {
        if !self.store.delete_customer(id).await? {
            return Err(ServiceError::not_found(format!("customer {id}")));
        }
        info!(customer_id = %id, "customer deleted");
        Ok(())
    }
}
