//! Staff login and the customer self-service portal
//!
//! There are no passwords: staff sign in by username (or a linked external
//! sign-in account) and customers by mobile number plus customer code.

use log::{info, warn};

use crate::error::{Error, Result};
use crate::models::{normalize_mobile, Permissions, Reception, Role, User};
use crate::store::{CustomerStore, ReceptionStore, UserStore};

/// A signed-in staff member
#[derive(Debug, Clone, PartialEq)]
pub struct StaffSession {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    pub permissions: Permissions,
}

impl StaffSession {
    fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
            permissions: user.permissions.clone(),
        }
    }

    /// Admins may do everything
    pub fn can(&self, permission: &str) -> bool {
        self.role == Role::Admin || self.permissions.allows(permission)
    }
}

/// A signed-in customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSession {
    pub customer_id: String,
    pub customer_code: String,
    pub name: String,
    pub mobile: String,
}

#[derive(Clone)]
pub struct Portal {
    users: UserStore,
    customers: CustomerStore,
    receptions: ReceptionStore,
}

impl Portal {
    pub fn new(users: UserStore, customers: CustomerStore, receptions: ReceptionStore) -> Self {
        Self {
            users,
            customers,
            receptions,
        }
    }

    fn staff_session(user: User) -> Result<StaffSession> {
        if !user.active {
            warn!("Login refused for disabled user {}", user.username);
            return Err(Error::AccountDisabled(user.username));
        }
        info!("{} signed in as {}", user.username, user.role);
        Ok(StaffSession::from_user(&user))
    }

    pub async fn login_staff(&self, username: &str) -> Result<StaffSession> {
        self.users.ensure_loaded().await?;
        let user = self
            .users
            .find_by_username(username)
            .await
            .ok_or(Error::InvalidCredentials)?;
        Self::staff_session(user)
    }

    /// Sign in through a linked external account id
    pub async fn login_staff_external(&self, auth_id: &str) -> Result<StaffSession> {
        if auth_id.trim().is_empty() {
            return Err(Error::InvalidCredentials);
        }
        self.users.ensure_loaded().await?;
        let user = self
            .users
            .find_by_auth_id(auth_id)
            .await
            .ok_or(Error::InvalidCredentials)?;
        Self::staff_session(user)
    }

    pub async fn login_customer(&self, mobile: &str, code: &str) -> Result<CustomerSession> {
        self.customers.ensure_loaded().await?;
        let customer = self
            .customers
            .find_by_mobile(mobile)
            .await
            .filter(|c| !c.customer_code.is_empty() && c.customer_code == code.trim())
            .ok_or(Error::InvalidCredentials)?;

        if !customer.can_login {
            return Err(Error::AccountDisabled(customer.mobile));
        }

        info!("Customer {} signed in", customer.customer_code);
        Ok(CustomerSession {
            customer_id: customer.id,
            customer_code: customer.customer_code,
            name: customer.name,
            mobile: normalize_mobile(&customer.mobile),
        })
    }

    /// Receptions belonging to the signed-in customer, newest first
    pub async fn customer_receptions(&self, session: &CustomerSession) -> Result<Vec<Reception>> {
        self.receptions.ensure_loaded().await?;
        Ok(self
            .receptions
            .for_customer(&session.customer_id, &session.mobile)
            .await)
    }
}
