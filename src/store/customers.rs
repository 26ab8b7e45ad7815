use std::ops::Deref;

use log::debug;
use rand::Rng;

use crate::error::{Error, Result};
use crate::models::{normalize_mobile, Customer, CustomerPatch};

use super::entity::{EntityStore, Outcome};

/// Attempts at drawing an unused customer code
const CODE_ATTEMPTS: usize = 50;

/// Customers with their login codes
#[derive(Clone)]
pub struct CustomerStore {
    inner: EntityStore<Customer>,
}

impl CustomerStore {
    pub fn new(inner: EntityStore<Customer>) -> Self {
        Self { inner }
    }

    /// Draw a 6-digit code not held by any loaded customer
    pub async fn generate_code(&self) -> Result<String> {
        let taken: Vec<String> = self
            .inner
            .items()
            .await
            .into_iter()
            .map(|c| c.customer_code)
            .collect();

        let mut rng = rand::thread_rng();
        for _ in 0..CODE_ATTEMPTS {
            let code = rng.gen_range(100_000..=999_999).to_string();
            if !taken.contains(&code) {
                return Ok(code);
            }
        }
        Err(Error::validation("no unused customer code found"))
    }

    /// Add a customer. The mobile must be unused; an empty customer code is
    /// generated.
    pub async fn add(&self, mut customer: Customer) -> Result<Outcome<Customer>> {
        customer.mobile = normalize_mobile(&customer.mobile);
        if self.find_by_mobile(&customer.mobile).await.is_some() {
            return Err(Error::Duplicate {
                field: "mobile",
                value: customer.mobile,
            });
        }

        if customer.customer_code.is_empty() {
            customer.customer_code = self.generate_code().await?;
            debug!("Generated customer code {}", customer.customer_code);
        } else if self.find_by_code(&customer.customer_code).await.is_some() {
            return Err(Error::Duplicate {
                field: "customer code",
                value: customer.customer_code,
            });
        }

        self.inner.add(customer).await
    }

    /// Update a customer. Moving onto another customer's mobile is rejected
    /// before any write.
    pub async fn update(&self, id: &str, patch: CustomerPatch) -> Result<Outcome<Customer>> {
        if let Some(mobile) = &patch.mobile {
            let mobile = normalize_mobile(mobile);
            let taken = self
                .inner
                .filter(|c| c.id != id && c.mobile == mobile)
                .await;
            if !taken.is_empty() {
                return Err(Error::Duplicate {
                    field: "mobile",
                    value: mobile,
                });
            }
        }
        self.inner.update(id, patch).await
    }

    pub async fn find_by_mobile(&self, mobile: &str) -> Option<Customer> {
        let mobile = normalize_mobile(mobile);
        self.inner
            .filter(|c| c.mobile == mobile)
            .await
            .into_iter()
            .next()
    }

    pub async fn find_by_code(&self, code: &str) -> Option<Customer> {
        let code = code.trim();
        self.inner
            .filter(|c| c.customer_code == code)
            .await
            .into_iter()
            .next()
    }
}

impl Deref for CustomerStore {
    type Target = EntityStore<Customer>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
