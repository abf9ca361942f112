//! Lead statistics for the dashboard.
//!
//! Stats are computed from an already scoped lead set, so admins and
//! customers share one code path and a customer can never see totals that
//! include other customers' leads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::lead::{Lead, LeadSource, LeadStatus, Priority};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total: i64,
    pub open: i64,
    pub won: i64,
    pub lost: i64,
    pub new_this_month: i64,
    /// Won leads as a percentage of all closed leads
    pub conversion_rate: f64,
    /// Sum of estimated values of open leads
    pub pipeline_value: f64,
    pub won_value: f64,
    pub by_status: BTreeMap<String, i64>,
    pub by_source: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
}

impl LeadStats {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let month = chrono::Utc::now().format("%Y-%m").to_string();
        Self::from_leads_in_month(leads, &month)
    }

    /// `month` is a `YYYY-MM` prefix matched against `created_at`.
    pub fn from_leads_in_month(leads: &[Lead], month: &str) -> Self {
        let mut stats = LeadStats {
            by_status: LeadStatus::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect(),
            by_source: LeadSource::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect(),
            by_priority: Priority::ALL
                .iter()
                .map(|p| (p.as_str().to_string(), 0))
                .collect(),
            ..Default::default()
        };

        for lead in leads {
            stats.total += 1;
            *stats.by_status.entry(lead.status.clone()).or_default() += 1;
            *stats.by_source.entry(lead.source.clone()).or_default() += 1;
            *stats.by_priority.entry(lead.priority.clone()).or_default() += 1;

            if lead.created_at.starts_with(month) {
                stats.new_this_month += 1;
            }

            let value = lead.estimated_value.unwrap_or(0.0);
            match lead.status_enum() {
                Some(LeadStatus::ClosedWon) => {
                    stats.won += 1;
                    stats.won_value += value;
                }
                Some(status) if status.is_closed() => stats.lost += 1,
                _ => {
                    stats.open += 1;
                    stats.pipeline_value += value;
                }
            }
        }

        let closed = stats.won + stats.lost;
        if closed > 0 {
            stats.conversion_rate = (stats.won as f64 / closed as f64 * 1000.0).round() / 10.0;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: &str, source: &str, value: Option<f64>, created_at: &str) -> Lead {
        Lead {
            id: uuid::Uuid::new_v4().to_string(),
            salutation: "herr".to_string(),
            name: "Test".to_string(),
            email: "test@example.de".to_string(),
            phone: None,
            company: None,
            source: source.to_string(),
            status: status.to_string(),
            lead_type: None,
            priority: "medium".to_string(),
            estimated_value: value,
            service_details: None,
            message: None,
            privacy_consent: true,
            marketing_consent: false,
            customer_id: None,
            created_by: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            communications: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_empty_set_has_all_buckets() {
        let stats = LeadStats::from_leads_in_month(&[], "2024-05");
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_status.len(), LeadStatus::ALL.len());
        assert_eq!(stats.by_status["closed-won"], 0);
        assert_eq!(stats.by_source["manual"], 0);
        assert_eq!(stats.conversion_rate, 0.0);
    }

    #[test]
    fn test_counts_and_values() {
        let leads = vec![
            lead("new", "website", Some(1000.0), "2024-05-03 08:00:00"),
            lead("proposal", "automation", Some(2500.0), "2024-04-20 08:00:00"),
            lead("closed-won", "website", Some(4000.0), "2024-05-10 08:00:00"),
            lead("closed-lost", "contact", None, "2024-03-01 08:00:00"),
            lead("closed-lost", "contact", Some(900.0), "2024-05-11 08:00:00"),
        ];

        let stats = LeadStats::from_leads_in_month(&leads, "2024-05");
        assert_eq!(stats.total, 5);
        assert_eq!(stats.open, 2);
        assert_eq!(stats.won, 1);
        assert_eq!(stats.lost, 2);
        assert_eq!(stats.new_this_month, 3);
        assert_eq!(stats.pipeline_value, 3500.0);
        assert_eq!(stats.won_value, 4000.0);
        assert_eq!(stats.conversion_rate, 33.3);
        assert_eq!(stats.by_source["website"], 2);
        assert_eq!(stats.by_status["closed-lost"], 2);
    }

    #[test]
    fn test_unknown_status_counts_as_open() {
        let leads = vec![lead("archived", "website", Some(10.0), "2024-05-01 00:00:00")];
        let stats = LeadStats::from_leads_in_month(&leads, "2024-05");
        assert_eq!(stats.open, 1);
        assert_eq!(stats.by_status["archived"], 1);
    }
}
