//! Role-scoped dashboard data.
//!
//! Staff (`admin`, `vertrieb`) see every lead. Customers (`kunde`, `lead`)
//! see a lead when it is linked to their account, carries their e-mail, or,
//! for old records without a customer link, when the legacy company-name
//! heuristic matches. The heuristic only exists to keep records created
//! before customer ids visible; it is not an access-control boundary and can
//! be switched off with `dashboard.legacy_company_match = false`.

use serde::Serialize;

use crate::db::{Lead, LeadStats, LeadStatus, Priority, User, UserResponse};

/// Label and colour used to render a status or priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: String,
    pub color: &'static str,
}

impl Badge {
    fn new(label: &str, color: &'static str) -> Self {
        Self {
            label: label.to_string(),
            color,
        }
    }

    /// Unknown values are shown as-is in grey
    fn neutral(raw: &str) -> Self {
        let label = if raw.trim().is_empty() { "Unbekannt" } else { raw };
        Self::new(label, "gray")
    }
}

pub fn status_badge(status: &str) -> Badge {
    match status.parse::<LeadStatus>() {
        Ok(LeadStatus::New) => Badge::new("Neu", "blue"),
        Ok(LeadStatus::Contacted) => Badge::new("Kontaktiert", "yellow"),
        Ok(LeadStatus::Qualified) => Badge::new("Qualifiziert", "purple"),
        Ok(LeadStatus::Proposal) => Badge::new("Angebot", "indigo"),
        Ok(LeadStatus::Negotiation) => Badge::new("Verhandlung", "orange"),
        Ok(LeadStatus::ClosedWon) => Badge::new("Gewonnen", "green"),
        Ok(LeadStatus::ClosedLost) => Badge::new("Verloren", "red"),
        Err(_) => Badge::neutral(status),
    }
}

pub fn priority_badge(priority: &str) -> Badge {
    match priority.parse::<Priority>() {
        Ok(Priority::Low) => Badge::new("Niedrig", "gray"),
        Ok(Priority::Medium) => Badge::new("Mittel", "blue"),
        Ok(Priority::High) => Badge::new("Hoch", "orange"),
        Ok(Priority::Urgent) => Badge::new("Dringend", "red"),
        Err(_) => Badge::neutral(priority),
    }
}

/// Legacy linkage: the company name, lower-cased with all whitespace
/// removed, appears in the local part of the e-mail address.
///
/// Known to produce false positives for short names (company "A" matches
/// every address whose local part contains an "a").
pub fn legacy_company_match(company_name: &str, email: &str) -> bool {
    let needle: String = company_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if needle.is_empty() {
        return false;
    }

    let local_part = email.split('@').next().unwrap_or_default().to_lowercase();
    local_part.contains(&needle)
}

/// Whether a customer may see this lead
pub fn lead_belongs_to(user: &User, lead: &Lead, legacy_match: bool) -> bool {
    if lead.customer_id.as_deref() == Some(user.id.as_str()) {
        return true;
    }
    if lead.email.trim().eq_ignore_ascii_case(user.email.trim()) {
        return true;
    }
    if legacy_match && lead.customer_id.is_none() {
        if let Some(company) = lead.company_name() {
            return legacy_company_match(company, &user.email);
        }
    }
    false
}

pub fn can_see_lead(user: &User, lead: &Lead, legacy_match: bool) -> bool {
    user.role_enum().is_staff() || lead_belongs_to(user, lead, legacy_match)
}

/// Filter the full lead set down to what `user` may see
pub fn scope_leads(user: &User, leads: Vec<Lead>, legacy_match: bool) -> Vec<Lead> {
    if user.role_enum().is_staff() {
        return leads;
    }
    leads
        .into_iter()
        .filter(|lead| lead_belongs_to(user, lead, legacy_match))
        .collect()
}

/// One table row of the dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLead {
    #[serde(flatten)]
    pub lead: Lead,
    pub status_badge: Badge,
    pub priority_badge: Badge,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub user: UserResponse,
    /// `admin` for staff, `customer` otherwise
    pub view: &'static str,
    pub stats: LeadStats,
    pub leads: Vec<DashboardLead>,
}

impl DashboardData {
    pub fn build(user: User, leads: Vec<Lead>, legacy_match: bool) -> Self {
        let role = user.role_enum();
        let leads = scope_leads(&user, leads, legacy_match);
        let stats = LeadStats::from_leads(&leads);

        let leads = leads
            .into_iter()
            .map(|lead| DashboardLead {
                status_badge: status_badge(&lead.status),
                priority_badge: priority_badge(&lead.priority),
                lead,
            })
            .collect();

        Self {
            view: if role.is_staff() { "admin" } else { "customer" },
            user: UserResponse::from(user),
            stats,
            leads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Company;

    fn user(id: &str, email: &str, role: &str) -> User {
        User {
            id: id.to_string(),
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            salutation: None,
            company: None,
            company_url: None,
            phone: None,
            department: None,
            position: None,
            last_login_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn lead(id: &str, email: &str, company: Option<&str>, customer_id: Option<&str>) -> Lead {
        Lead {
            id: id.to_string(),
            salutation: "herr".to_string(),
            name: "Lead".to_string(),
            email: email.to_string(),
            phone: None,
            company: company.map(|name| Company {
                name: Some(name.to_string()),
                ..Default::default()
            }),
            source: "contact".to_string(),
            status: "new".to_string(),
            lead_type: None,
            priority: "medium".to_string(),
            estimated_value: None,
            service_details: None,
            message: None,
            privacy_consent: true,
            marketing_consent: false,
            customer_id: customer_id.map(str::to_string),
            created_by: None,
            created_at: "2024-05-01 10:00:00".to_string(),
            updated_at: "2024-05-01 10:00:00".to_string(),
            communications: Vec::new(),
            attachments: Vec::new(),
        }
    }

    fn ids(leads: &[Lead]) -> Vec<&str> {
        leads.iter().map(|l| l.id.as_str()).collect()
    }

    fn sample() -> Vec<Lead> {
        vec![
            lead("by-email", "max@mueller-bau.de", None, None),
            lead("by-id", "other@elsewhere.de", None, Some("u1")),
            lead("by-company", "info@mb.de", Some("Mueller Bau"), None),
            lead("linked-elsewhere", "x@y.de", Some("Mueller Bau"), Some("u9")),
            lead("unrelated", "someone@else.de", Some("Schmidt GmbH"), None),
            lead("no-company", "nobody@else.de", None, None),
        ]
    }

    #[test]
    fn test_staff_sees_everything() {
        for role in ["admin", "vertrieb"] {
            let staff = user("s1", "staff@lead.online", role);
            assert_eq!(scope_leads(&staff, sample(), true).len(), 6);
        }
    }

    #[test]
    fn test_customer_scoping() {
        let customer = user("u1", "muellerbau.max@mueller-bau.de", "kunde");
        let scoped = scope_leads(&customer, sample(), true);
        assert_eq!(ids(&scoped), vec!["by-id", "by-company"]);

        let customer = user("u1", "MAX@mueller-bau.de", "lead");
        let scoped = scope_leads(&customer, sample(), true);
        assert_eq!(ids(&scoped), vec!["by-email", "by-id"]);
    }

    #[test]
    fn test_legacy_match_can_be_disabled() {
        let customer = user("u1", "muellerbau.max@mueller-bau.de", "kunde");
        let scoped = scope_leads(&customer, sample(), false);
        assert_eq!(ids(&scoped), vec!["by-id"]);
    }

    #[test]
    fn test_heuristic_false_positive() {
        let leads = vec![lead("company-a", "ceo@a-corp.de", Some("A"), None)];
        let unrelated = user("u2", "hannah@gmail.com", "kunde");
        assert_eq!(ids(&scope_leads(&unrelated, leads.clone(), true)), vec!["company-a"]);

        let no_a = user("u3", "tom@gmail.com", "kunde");
        assert!(scope_leads(&no_a, leads, true).is_empty());
    }

    #[test]
    fn test_legacy_company_match() {
        assert!(legacy_company_match("Mueller Bau", "muellerbau@x.de"));
        assert!(legacy_company_match("ACME", "sales.acme@x.de"));
        assert!(!legacy_company_match("ACME", "sales@acme.de"));
        assert!(!legacy_company_match("   ", "anything@x.de"));
        assert!(!legacy_company_match("", "anything@x.de"));
    }

    #[test]
    fn test_invalid_role_gets_customer_view() {
        let legacy = user("u4", "nobody@else.de", "superuser");
        let scoped = scope_leads(&legacy, sample(), true);
        assert_eq!(ids(&scoped), vec!["no-company"]);
    }

    #[test]
    fn test_badges_are_exhaustive() {
        for status in LeadStatus::ALL {
            assert_ne!(status_badge(status.as_str()).color, "gray");
        }
        for priority in Priority::ALL {
            assert_ne!(priority_badge(priority.as_str()).label, priority.as_str());
        }
        assert_eq!(status_badge("archived"), Badge::new("archived", "gray"));
        assert_eq!(priority_badge(""), Badge::new("Unbekannt", "gray"));
    }

    #[test]
    fn test_dashboard_data_for_customer() {
        let customer = user("u1", "max@mueller-bau.de", "kunde");
        let data = DashboardData::build(customer, sample(), false);
        assert_eq!(data.view, "customer");
        assert_eq!(data.stats.total, 2);
        assert_eq!(data.leads[0].status_badge.label, "Neu");

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["leads"][0]["statusBadge"]["color"], "blue");
        assert!(json["leads"][0]["email"].is_string());
        assert_eq!(data.user.role, "kunde");
    }
}
