use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use billdesk_core::error::{optional_text, require_text};
use billdesk_core::{CustomerId, DomainError, DomainResult, Entity};

/// Editable customer fields, as submitted by a form.
///
/// Values are raw until passed through [`CustomerDetails::validated`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub address: String,
    pub telephone: String,
    pub email: Option<String>,
}

impl CustomerDetails {
    /// Trim every field and enforce the required/format constraints.
    pub fn validated(self) -> DomainResult<Self> {
        let contact = ContactDetails {
            telephone: self.telephone,
            email: self.email,
        }
        .validated()?;

        Ok(Self {
            name: require_text("customer name", &self.name)?,
            address: require_text("address", &self.address)?,
            telephone: contact.telephone,
            email: contact.email,
        })
    }
}

/// Contact-only update (telephone + email).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactDetails {
    pub telephone: String,
    pub email: Option<String>,
}

impl ContactDetails {
    pub fn validated(self) -> DomainResult<Self> {
        let telephone = require_text("telephone", &self.telephone)?;
        if !is_valid_telephone(&telephone) {
            return Err(DomainError::validation("invalid telephone format"));
        }

        let email = optional_text(self.email.as_deref());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(DomainError::validation("invalid email address"));
            }
        }

        Ok(Self { telephone, email })
    }
}

/// Telephone numbers may contain digits, `+`, `-`, whitespace and parentheses.
pub fn is_valid_telephone(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')') || c.is_whitespace())
}

/// Customer record.
///
/// The account number is assigned once at registration and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    account_number: String,
    name: String,
    address: String,
    telephone: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl Customer {
    /// Register a new customer from validated details.
    pub fn register(
        id: CustomerId,
        account_number: impl Into<String>,
        details: CustomerDetails,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let details = details.validated()?;
        let account_number = require_text("account number", &account_number.into())?;
        Ok(Self {
            id,
            account_number,
            name: details.name,
            address: details.address,
            telephone: details.telephone,
            email: details.email,
            created_at,
        })
    }

    /// Rebuild a stored record without re-running validation.
    pub fn restore(
        id: CustomerId,
        account_number: String,
        details: CustomerDetails,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_number,
            name: details.name,
            address: details.address,
            telephone: details.telephone,
            email: details.email,
            created_at,
        }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn telephone(&self) -> &str {
        &self.telephone
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replace the account number (used when a generated number collided).
    pub fn reassign_account_number(&mut self, account_number: impl Into<String>) {
        self.account_number = account_number.into();
    }

    /// Replace name, address and contact details; account number and creation
    /// time are kept.
    pub fn update_details(&mut self, details: CustomerDetails) -> DomainResult<()> {
        let details = details.validated()?;
        self.name = details.name;
        self.address = details.address;
        self.telephone = details.telephone;
        self.email = details.email;
        Ok(())
    }

    pub fn update_contact(&mut self, contact: ContactDetails) -> DomainResult<()> {
        let contact = contact.validated()?;
        self.telephone = contact.telephone;
        self.email = contact.email;
        Ok(())
    }

    pub fn update_address(&mut self, address: &str) -> DomainResult<()> {
        self.address = require_text("address", address)?;
        Ok(())
    }

    /// Case-insensitive substring match over name, account number, email and
    /// telephone.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.name.as_str()),
            Some(self.account_number.as_str()),
            self.email.as_deref(),
            Some(self.telephone.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Snapshot of the editable fields.
    pub fn details(&self) -> CustomerDetails {
        CustomerDetails {
            name: self.name.clone(),
            address: self.address.clone(),
            telephone: self.telephone.clone(),
            email: self.email.clone(),
        }
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
