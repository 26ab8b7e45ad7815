use std::ops::Deref;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{generate_id, normalize_mobile, Billing, Reception, Status};

use super::entity::{EntityStore, Outcome};

/// Vehicle intakes
#[derive(Clone)]
pub struct ReceptionStore {
    inner: EntityStore<Reception>,
}

impl ReceptionStore {
    pub fn new(inner: EntityStore<Reception>) -> Self {
        Self { inner }
    }

    /// Register an intake. New receptions start pending and get a vehicle id
    /// when none was given.
    pub async fn add(&self, mut reception: Reception) -> Result<Outcome<Reception>> {
        reception.status = Status::Pending;
        reception.completed_at = None;
        reception.completed_by = None;
        if reception.vehicle_info.id.is_empty() {
            reception.vehicle_info.id = generate_id();
        }
        self.inner.add(reception).await
    }

    /// Move a reception forward; going back is rejected.
    ///
    /// Completion is not a plain status change: it goes through
    /// `Shopfront::complete_reception` so the vehicle's tasks are completed
    /// with it.
    pub async fn set_status(&self, id: &str, status: Status) -> Result<Outcome<Reception>> {
        if status == Status::Completed {
            return Err(Error::validation(
                "receptions are completed with their invoice, not by status",
            ));
        }
        self.inner
            .update_with(id, move |reception| {
                if reception.status == status {
                    return Ok(false);
                }
                if !reception.status.can_transition_to(status) {
                    return Err(Error::InvalidTransition {
                        from: reception.status,
                        to: status,
                    });
                }
                reception.status = status;
                Ok(true)
            })
            .await
    }

    /// Close a reception with its invoice in one write. The billing total is
    /// recomputed. Completing twice is rejected.
    pub async fn complete_reception(
        &self,
        id: &str,
        mut billing: Billing,
        completed_by: &str,
    ) -> Result<Outcome<Reception>> {
        billing.total = billing.compute_total();
        let completed_by = completed_by.to_string();
        self.inner
            .update_with(id, move |reception| {
                if reception.status == Status::Completed {
                    return Err(Error::InvalidTransition {
                        from: Status::Completed,
                        to: Status::Completed,
                    });
                }
                reception.status = Status::Completed;
                reception.billing = Some(billing);
                reception.completed_at = Some(Utc::now());
                reception.completed_by = Some(completed_by);
                Ok(true)
            })
            .await
    }

    /// Receptions of one customer, by customer id or mobile
    pub async fn for_customer(&self, customer_id: &str, mobile: &str) -> Vec<Reception> {
        let mobile = normalize_mobile(mobile);
        self.inner
            .filter(|r| {
                r.customer_info.customer_id.as_deref() == Some(customer_id)
                    || (!mobile.is_empty() && r.customer_info.mobile == mobile)
            })
            .await
    }

    pub async fn by_status(&self, status: Status) -> Vec<Reception> {
        self.inner.filter(|r| r.status == status).await
    }
}

impl Deref for ReceptionStore {
    type Target = EntityStore<Reception>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
