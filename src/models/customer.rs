use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Customer identity resolved per trigger
/// Maps to the `profiles` table; always re-read per event, never cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub business_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Email address, if present and not blank
    pub fn contact_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    /// Phone number, if present and not blank
    pub fn contact_phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// Name used in greetings, falling back to the company
    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .or(self.company_name.as_deref())
            .filter(|n| !n.trim().is_empty())
    }
}

/// Order fields read by the automation core
/// Maps to the `orders` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub total_amount: f64,
    pub status: String,
    pub payment_status: Option<String>,
    pub destination_country: Option<String>,
}

/// Export order fields read by the automation core
/// Maps to the `export_orders` table; linked back to its originating order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExportOrder {
    pub id: Uuid,
    pub order_id: Uuid,
    pub current_phase: String,
    pub destination_country: Option<String>,
}
