//! Lead records, their enums and the status state machine.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;

use super::common::{parse_json, string_enum, to_json, Salutation};
use super::communication::{Attachment, Communication};

string_enum! {
    /// Which form (or staff action) produced a lead
    LeadSource {
        Website => "website",
        Automation => "automation",
        Digitalization => "digitalization",
        Contact => "contact",
        Manual => "manual",
    }
}

string_enum! {
    /// Pipeline stage of a lead
    LeadStatus {
        New => "new",
        Contacted => "contacted",
        Qualified => "qualified",
        Proposal => "proposal",
        Negotiation => "negotiation",
        ClosedWon => "closed-won",
        ClosedLost => "closed-lost",
    }
}

string_enum! {
    LeadType {
        Hot => "hot",
        Warm => "warm",
        Cold => "cold",
    }
}

string_enum! {
    Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

/// A status change the transition table does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("status cannot change from '{from}' to '{to}'")]
pub struct TransitionError {
    pub from: LeadStatus,
    pub to: LeadStatus,
}

impl LeadStatus {
    /// Statuses reachable in one step
    pub fn allowed_next(&self) -> &'static [LeadStatus] {
        use LeadStatus::*;
        match self {
            New => &[Contacted, Qualified, ClosedLost],
            Contacted => &[Qualified, Proposal, ClosedLost],
            Qualified => &[Proposal, ClosedLost],
            Proposal => &[Negotiation, ClosedWon, ClosedLost],
            Negotiation => &[Proposal, ClosedWon, ClosedLost],
            ClosedWon => &[],
            ClosedLost => &[New],
        }
    }

    /// Setting the current status again is always allowed (no-op).
    pub fn can_transition_to(&self, to: LeadStatus) -> bool {
        *self == to || self.allowed_next().contains(&to)
    }

    pub fn transition(self, to: LeadStatus) -> Result<LeadStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LeadStatus::ClosedWon | LeadStatus::ClosedLost)
    }
}

impl Priority {
    /// Priority from the urgency choice of the intake forms.
    pub fn from_urgency(urgency: &str) -> Priority {
        match urgency {
            "sofort" => Priority::High,
            "1-3 Monate" => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// Company block of a lead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteDetails {
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub current_website: Option<String>,
}

/// ROI calculator inputs and results submitted with an automation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationDetails {
    #[serde(default)]
    pub processes: Vec<String>,
    pub budget: f64,
    pub monthly_leads: f64,
    pub current_conversion_rate: f64,
    pub target_conversion_rate: f64,
    pub average_deal_value: f64,
    pub additional_customers: f64,
    pub monthly_revenue_increase: f64,
    pub annual_revenue_increase: f64,
    pub roi_percent: f64,
    /// None when the automation never pays back
    #[serde(default)]
    pub payback_months: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalizationDetails {
    pub target_url: String,
    #[serde(default)]
    pub areas: Vec<String>,
    #[serde(default)]
    pub urgency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    #[serde(default)]
    pub subject: Option<String>,
}

/// Service payload, keyed by the lead source that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceDetails {
    Website(WebsiteDetails),
    Automation(AutomationDetails),
    Digitalization(DigitalizationDetails),
    Contact(ContactDetails),
}

impl ServiceDetails {
    pub fn source(&self) -> LeadSource {
        match self {
            ServiceDetails::Website(_) => LeadSource::Website,
            ServiceDetails::Automation(_) => LeadSource::Automation,
            ServiceDetails::Digitalization(_) => LeadSource::Digitalization,
            ServiceDetails::Contact(_) => LeadSource::Contact,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LeadRow {
    pub id: String,
    pub salutation: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: String,
    pub status: String,
    pub lead_type: Option<String>,
    pub priority: String,
    pub estimated_value: Option<f64>,
    pub service_details: Option<String>,
    pub message: Option<String>,
    pub privacy_consent: bool,
    pub marketing_consent: bool,
    pub customer_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Lead as stored and returned by the API.
///
/// Enum-valued fields stay strings so that rows written by older versions
/// still load; use the typed accessors when the value matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub salutation: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<Company>,
    pub source: String,
    pub status: String,
    #[serde(default)]
    pub lead_type: Option<String>,
    pub priority: String,
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub service_details: Option<ServiceDetails>,
    #[serde(default)]
    pub message: Option<String>,
    pub privacy_consent: bool,
    #[serde(default)]
    pub marketing_consent: bool,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub communications: Vec<Communication>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Self {
            company: parse_json(row.company.as_deref()),
            service_details: parse_json(row.service_details.as_deref()),
            id: row.id,
            salutation: row.salutation,
            name: row.name,
            email: row.email,
            phone: row.phone,
            source: row.source,
            status: row.status,
            lead_type: row.lead_type,
            priority: row.priority,
            estimated_value: row.estimated_value,
            message: row.message,
            privacy_consent: row.privacy_consent,
            marketing_consent: row.marketing_consent,
            customer_id: row.customer_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            communications: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// Create-lead payload as sent by the forms.
///
/// Everything is optional on the wire so that validation can report each
/// missing field by name instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    #[serde(default)]
    pub salutation: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_details: Option<ServiceDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub privacy_consent: bool,
    #[serde(default)]
    pub marketing_consent: bool,
}

/// A validated lead ready for insertion
#[derive(Debug, Clone)]
pub struct NewLead {
    pub salutation: Salutation,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<Company>,
    pub source: LeadSource,
    pub lead_type: Option<LeadType>,
    pub priority: Priority,
    pub estimated_value: Option<f64>,
    pub service_details: Option<ServiceDetails>,
    pub message: Option<String>,
    pub marketing_consent: bool,
    pub customer_id: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Outcome of a compare-and-set status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Updated,
    /// The stored status no longer matched the expected one
    Stale,
}

impl Lead {
    pub fn status_enum(&self) -> Option<LeadStatus> {
        self.status.parse().ok()
    }

    pub fn source_enum(&self) -> Option<LeadSource> {
        self.source.parse().ok()
    }

    pub fn company_name(&self) -> Option<&str> {
        self.company.as_ref().and_then(|c| c.name.as_deref())
    }

    pub async fn insert(pool: &SqlitePool, new: &NewLead) -> Result<Lead, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO leads (
                id, salutation, name, email, phone, company, source, status, lead_type,
                priority, estimated_value, service_details, message, privacy_consent,
                marketing_consent, customer_id, created_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'new', ?, ?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new.salutation.as_str())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(to_json(new.company.as_ref()))
        .bind(new.source.as_str())
        .bind(new.lead_type.map(|t| t.as_str()))
        .bind(new.priority.as_str())
        .bind(new.estimated_value)
        .bind(to_json(new.service_details.as_ref()))
        .bind(&new.message)
        .bind(new.marketing_consent)
        .bind(&new.customer_id)
        .bind(&new.created_by)
        .execute(pool)
        .await?;

        let row: LeadRow = sqlx::query_as("SELECT * FROM leads WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await?;
        Ok(row.into())
    }

    /// Fetch a lead with its communications and attachments
    pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Lead>, sqlx::Error> {
        let row: Option<LeadRow> = sqlx::query_as("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lead = Lead::from(row);
        lead.communications = Communication::list_for_lead(pool, id).await?;
        lead.attachments = Attachment::list_for_lead(pool, id).await?;
        Ok(Some(lead))
    }

    /// All leads, newest first, without their collections
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Lead>, sqlx::Error> {
        let rows: Vec<LeadRow> = sqlx::query_as("SELECT * FROM leads ORDER BY created_at DESC, id")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Lead::from).collect())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(pool)
            .await
    }

    /// Write `to` only if the stored status still equals `expected`.
    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        expected: &str,
        to: LeadStatus,
    ) -> Result<StatusWrite, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE leads SET status = ?, updated_at = datetime('now') WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(expected)
        .execute(pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            StatusWrite::Updated
        } else {
            StatusWrite::Stale
        })
    }

    /// Attach unlinked leads with this e-mail to a customer account
    pub async fn link_customer(
        pool: &SqlitePool,
        email: &str,
        customer_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE leads SET customer_id = ?, updated_at = datetime('now') WHERE email = ? AND customer_id IS NULL",
        )
        .bind(customer_id)
        .bind(email)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
