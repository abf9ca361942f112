//! Contact log entries and file attachments of a lead.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::common::string_enum;

string_enum! {
    CommunicationType {
        Email => "email",
        Phone => "phone",
        Meeting => "meeting",
        Note => "note",
    }
}

string_enum! {
    Direction {
        Inbound => "inbound",
        Outbound => "outbound",
    }
}

/// One entry of the append-only contact log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Communication {
    pub id: String,
    pub lead_id: String,
    #[serde(rename = "type")]
    pub comm_type: String,
    pub subject: Option<String>,
    pub content: String,
    pub direction: String,
    pub created_by: Option<String>,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommunicationRequest {
    #[serde(rename = "type")]
    pub comm_type: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    /// When the contact happened; defaults to now
    #[serde(default)]
    pub date: Option<String>,
}

fn default_direction() -> String {
    Direction::Outbound.as_str().to_string()
}

impl Communication {
    pub async fn list_for_lead(
        pool: &SqlitePool,
        lead_id: &str,
    ) -> Result<Vec<Communication>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lead_communications WHERE lead_id = ? ORDER BY date, id")
            .bind(lead_id)
            .fetch_all(pool)
            .await
    }

    pub async fn append(
        pool: &SqlitePool,
        lead_id: &str,
        comm_type: CommunicationType,
        direction: Direction,
        subject: Option<&str>,
        content: &str,
        date: Option<&str>,
        created_by: Option<&str>,
    ) -> Result<Communication, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO lead_communications (id, lead_id, comm_type, subject, content, direction, created_by, date)
            VALUES (?, ?, ?, ?, ?, ?, ?, COALESCE(?, datetime('now')))
            "#,
        )
        .bind(&id)
        .bind(lead_id)
        .bind(comm_type.as_str())
        .bind(subject)
        .bind(content)
        .bind(direction.as_str())
        .bind(created_by)
        .bind(date)
        .execute(pool)
        .await?;

        sqlx::query("UPDATE leads SET updated_at = datetime('now') WHERE id = ?")
            .bind(lead_id)
            .execute(pool)
            .await?;

        sqlx::query_as("SELECT * FROM lead_communications WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await
    }
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub lead_id: String,
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
    pub uploaded_by: Option<String>,
    pub uploaded_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub lead_id: String,
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
    pub uploaded_by: Option<String>,
}

impl Attachment {
    pub async fn list_for_lead(
        pool: &SqlitePool,
        lead_id: &str,
    ) -> Result<Vec<Attachment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM lead_attachments WHERE lead_id = ? ORDER BY uploaded_at, id")
            .bind(lead_id)
            .fetch_all(pool)
            .await
    }

    pub async fn insert(pool: &SqlitePool, new: &NewAttachment) -> Result<Attachment, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO lead_attachments (id, lead_id, filename, original_name, url, size, mime_type, uploaded_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.lead_id)
        .bind(&new.filename)
        .bind(&new.original_name)
        .bind(&new.url)
        .bind(new.size)
        .bind(&new.mime_type)
        .bind(&new.uploaded_by)
        .execute(pool)
        .await?;

        sqlx::query_as("SELECT * FROM lead_attachments WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_outbound() {
        let req: CreateCommunicationRequest =
            serde_json::from_str(r#"{"type":"phone","content":"Rückruf vereinbart"}"#).unwrap();
        assert_eq!(req.comm_type, "phone");
        assert_eq!(req.direction, "outbound");
        assert!(req.date.is_none());
    }

    #[test]
    fn test_communication_serializes_type_field() {
        let entry = Communication {
            id: "c1".to_string(),
            lead_id: "l1".to_string(),
            comm_type: "email".to_string(),
            subject: Some("Angebot".to_string()),
            content: "Angebot verschickt".to_string(),
            direction: "outbound".to_string(),
            created_by: None,
            date: "2024-05-02 09:00:00".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "email");
        assert_eq!(json["leadId"], "l1");
    }
}
