use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, Entity};

orderflow_core::typed_id!(
    /// Customer identifier.
    CustomerId
);

/// A registered customer.
///
/// Immutable from the point of view of order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    name: String,
    email: String,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>, email: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let email = email.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("customer name must not be empty"));
        }
        if !email.contains('@') {
            return Err(DomainError::validation("customer email must contain '@'"));
        }

        Ok(Self { id, name, email })
    }

    /// Rebuild a customer already held by the registry, as stored.
    ///
    /// No input validation: the registry owns these records.
    pub fn from_record(id: CustomerId, name: String, email: String) -> Self {
        Self { id, name, email }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
