use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    cells, format_bool, format_time, normalize_mobile, opt, parse_bool, parse_time, require,
    require_mobile, Cells, Record,
};
use crate::error::{Error, Result};
use crate::store::Row;

/// A shop customer. Mobile plus customer code sign in to the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    /// Six digits, generated by the customer store when left empty
    pub customer_code: String,
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub can_login: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(name: &str, mobile: &str) -> Self {
        Self {
            name: name.to_string(),
            mobile: normalize_mobile(mobile),
            can_login: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<Option<String>>,
    pub can_login: Option<bool>,
}

pub(crate) fn is_customer_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) && !code.starts_with('0')
}

impl Record for Customer {
    type Patch = CustomerPatch;

    const TABLE: &'static str = "Customers";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "customerCode",
        "name",
        "mobile",
        "email",
        "canLogin",
        "createdAt",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn to_cells(&self) -> Result<Cells> {
        Ok(cells([
            ("id", self.id.clone()),
            ("customerCode", self.customer_code.clone()),
            ("name", self.name.clone()),
            ("mobile", self.mobile.clone()),
            ("email", self.email.clone().unwrap_or_default()),
            ("canLogin", format_bool(self.can_login)),
            ("createdAt", format_time(self.created_at)),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get("id").to_string(),
            customer_code: row.get("customerCode").trim().to_string(),
            name: row.get("name").to_string(),
            mobile: normalize_mobile(row.get("mobile")),
            email: opt(row.get("email")),
            can_login: parse_bool(row.get("canLogin")),
            created_at: parse_time(row.get("createdAt")),
        })
    }

    fn apply(&mut self, patch: &CustomerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(mobile) = &patch.mobile {
            self.mobile = normalize_mobile(mobile);
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(can_login) = patch.can_login {
            self.can_login = can_login;
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require_mobile(&self.mobile)?;
        if !self.customer_code.is_empty() && !is_customer_code(&self.customer_code) {
            return Err(Error::validation(format!(
                "customer code must be 6 digits, got '{}'",
                self.customer_code
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_validation() {
        let customer = Customer::new("Ali", "0912-123-4567");
        assert_eq!(customer.mobile, "09121234567");
        assert!(customer.validate().is_ok());

        let bad = Customer::new("Ali", "12345");
        match bad.validate() {
            Err(Error::Validation(msg)) => assert!(msg.contains("mobile")),
            other => panic!("Expected Validation error, got {:?}", other),
        }

        let mut coded = Customer::new("Ali", "09121234567");
        coded.customer_code = "12ab56".to_string();
        assert!(coded.validate().is_err());
    }

    #[test]
    fn test_customer_row_keeps_leading_zero() {
        // cells written by hand sometimes lose the leading zero
        let row = Row::from_pairs(3, &[("id", "c1"), ("mobile", "9121234567"), ("canLogin", "false")]);
        let customer = Customer::from_row(&row).unwrap();
        assert_eq!(customer.mobile, "09121234567");
        assert!(!customer.can_login);
    }
}
