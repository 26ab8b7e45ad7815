use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{
    cells, format_time, normalize_mobile, opt, parse_json, parse_time, require, require_mobile,
    to_json, Cells, Record, Status,
};
use crate::error::Result;
use crate::store::Row;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerInfo {
    /// Authoritative link to the customers table, when known
    pub customer_id: Option<String>,
    pub name: String,
    pub mobile: String,
    pub national_id: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleInfo {
    /// Vehicle id referenced by tasks; generated on intake when empty
    pub id: String,
    pub plate_number: String,
    pub make: String,
    pub model: String,
    pub year: Option<String>,
    pub color: Option<String>,
    pub vin: Option<String>,
    pub mileage: Option<String>,
}

impl VehicleInfo {
    /// Short label used next to vehicle ids elsewhere
    pub fn label(&self) -> String {
        let name = format!("{} {}", self.make, self.model);
        let name = name.trim();
        if name.is_empty() {
            self.plate_number.clone()
        } else {
            format!("{} ({})", name, self.plate_number)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceInfo {
    pub description: String,
    pub customer_requests: Vec<String>,
    /// Signature pad image as a `data:` URL or a file URL
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceItem {
    pub description: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PartItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Invoice attached to a completed reception
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Billing {
    pub services: Vec<ServiceItem>,
    pub parts: Vec<PartItem>,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
}

impl Billing {
    pub fn subtotal(&self) -> Decimal {
        let services: Decimal = self.services.iter().map(|s| s.price).sum();
        let parts: Decimal = self.parts.iter().map(|p| p.quantity * p.unit_price).sum();
        services + parts
    }

    /// Subtotal minus discount, plus tax on the discounted amount, to 2 dp
    pub fn compute_total(&self) -> Decimal {
        let hundred = Decimal::ONE_HUNDRED;
        let discounted = self.subtotal() * (hundred - self.discount_percent) / hundred;
        let total = discounted * (hundred + self.tax_percent) / hundred;
        total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// A vehicle intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Reception {
    pub id: String,
    pub customer_info: CustomerInfo,
    pub vehicle_info: VehicleInfo,
    pub service_info: ServiceInfo,
    pub status: Status,
    pub billing: Option<Billing>,
    /// Image and document URLs
    pub images: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
}

impl Reception {
    pub fn new(customer: CustomerInfo, vehicle: VehicleInfo, created_by: &str) -> Self {
        Self {
            customer_info: CustomerInfo {
                mobile: normalize_mobile(&customer.mobile),
                ..customer
            },
            vehicle_info: vehicle,
            created_by: created_by.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReceptionPatch {
    pub customer_info: Option<CustomerInfo>,
    pub vehicle_info: Option<VehicleInfo>,
    pub service_info: Option<ServiceInfo>,
    pub billing: Option<Billing>,
    pub images: Option<Vec<String>>,
}

impl Record for Reception {
    type Patch = ReceptionPatch;

    const TABLE: &'static str = "Receptions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "customerInfo",
        "vehicleInfo",
        "serviceInfo",
        "status",
        "billing",
        "images",
        "createdAt",
        "createdBy",
        "completedAt",
        "completedBy",
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
        let billing = match &self.billing {
            Some(billing) => to_json(billing)?,
            None => String::new(),
        };
        Ok(cells([
            ("id", self.id.clone()),
            ("customerInfo", to_json(&self.customer_info)?),
            ("vehicleInfo", to_json(&self.vehicle_info)?),
            ("serviceInfo", to_json(&self.service_info)?),
            ("status", self.status.as_str().to_string()),
            ("billing", billing),
            ("images", to_json(&self.images)?),
            ("createdAt", format_time(self.created_at)),
            ("createdBy", self.created_by.clone()),
            ("completedAt", format_time(self.completed_at)),
            ("completedBy", self.completed_by.clone().unwrap_or_default()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let billing = if row.get("billing").trim().is_empty() {
            None
        } else {
            Some(parse_json(Self::TABLE, row, "billing")?)
        };
        Ok(Self {
            id: row.get("id").to_string(),
            customer_info: parse_json(Self::TABLE, row, "customerInfo")?,
            vehicle_info: parse_json(Self::TABLE, row, "vehicleInfo")?,
            service_info: parse_json(Self::TABLE, row, "serviceInfo")?,
            status: Status::parse(row.get("status")),
            billing,
            images: parse_json(Self::TABLE, row, "images")?,
            created_at: parse_time(row.get("createdAt")),
            created_by: row.get("createdBy").to_string(),
            completed_at: parse_time(row.get("completedAt")),
            completed_by: opt(row.get("completedBy")),
        })
    }

    fn apply(&mut self, patch: &ReceptionPatch) {
        if let Some(info) = &patch.customer_info {
            self.customer_info = CustomerInfo {
                mobile: normalize_mobile(&info.mobile),
                ..info.clone()
            };
        }
        if let Some(info) = &patch.vehicle_info {
            self.vehicle_info = info.clone();
        }
        if let Some(info) = &patch.service_info {
            self.service_info = info.clone();
        }
        if let Some(billing) = &patch.billing {
            let mut billing = billing.clone();
            billing.total = billing.compute_total();
            self.billing = Some(billing);
        }
        if let Some(images) = &patch.images {
            self.images = images.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.customer_info.name, "customer name")?;
        require_mobile(&self.customer_info.mobile)?;
        require(&self.vehicle_info.plate_number, "plate number")
    }
}
