//! Notifications sent when leads arrive.
//!
//! Mail goes out on a spawned task so a slow or failing SMTP server never
//! holds up or fails the request that created the lead.

pub mod email;

pub use email::LeadMailer;

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::db::Lead;

/// Send the sales notice and the prospect confirmation in the background.
pub fn notify_new_lead(mailer: Arc<LeadMailer>, lead: Lead) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = mailer.send_new_lead_notice(&lead).await {
            tracing::error!(lead_id = %lead.id, error = %e, "Failed to send new-lead notice");
        }
        if let Err(e) = mailer.send_confirmation(&lead).await {
            tracing::error!(lead_id = %lead.id, error = %e, "Failed to send lead confirmation");
        }
    })
}
