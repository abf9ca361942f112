//! Input validation for API requests.
//!
//! Messages are user-facing (German) and name the offending field. They are
//! collected in check order through [`ValidationErrorBuilder`], so the first
//! message is the one a form shows.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::db::{
    CommunicationType, CreateCommunicationRequest, CreateLeadRequest, Direction, LeadSource,
    LeadType, NewLead, Priority, RegisterRequest, Salutation, ServiceDetails,
};

lazy_static! {
    /// Pragmatic e-mail check: one `@`, no whitespace, a dot in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub const MAX_MESSAGE_LEN: usize = 5000;
pub const MAX_NAME_LEN: usize = 200;

pub const MSG_NAME: &str = "Bitte geben Sie Ihren Namen an.";
pub const MSG_EMAIL: &str = "Bitte geben Sie Ihre E-Mail-Adresse an.";
pub const MSG_EMAIL_INVALID: &str = "Bitte geben Sie eine gültige E-Mail-Adresse an.";
pub const MSG_SALUTATION: &str = "Bitte wählen Sie eine Anrede aus.";
pub const MSG_PRIVACY: &str = "Bitte stimmen Sie der Datenschutzerklärung zu.";
pub const MSG_URL: &str = "Bitte geben Sie die URL Ihrer Website an.";
pub const MSG_AREAS: &str = "Bitte wählen Sie mindestens einen Bereich aus.";

/// Who is creating a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadOrigin {
    /// Unauthenticated form submission; a form source is required
    Public,
    /// Staff entry; the source defaults to `manual`
    Staff,
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Trim and lower-case an e-mail address for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns None if valid, or the message to show
pub fn validate_password_strength(password: &str) -> Option<&'static str> {
    if password.chars().count() < 8 {
        return Some("Das Passwort muss mindestens 8 Zeichen lang sein.");
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Some("Das Passwort muss mindestens einen Buchstaben und eine Ziffer enthalten.");
    }
    None
}

/// Check a create-lead payload and turn it into a typed [`NewLead`].
pub fn validate_create_lead(req: CreateLeadRequest, origin: LeadOrigin) -> Result<NewLead, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let source = match (non_empty(req.source.clone()), origin) {
        (Some(raw), _) => match raw.parse::<LeadSource>() {
            Ok(LeadSource::Manual) if origin == LeadOrigin::Public => {
                errors.add("source", "Diese Quelle ist nur für interne Einträge zulässig.");
                None
            }
            Ok(source) => Some(source),
            Err(_) => {
                errors.add("source", format!("Unbekannte Quelle: {}", raw));
                None
            }
        },
        (None, LeadOrigin::Staff) => Some(LeadSource::Manual),
        (None, LeadOrigin::Public) => {
            errors.add("source", "Bitte geben Sie die Quelle der Anfrage an.");
            None
        }
    };

    if let (Some(source), Some(details)) = (source, &req.service_details) {
        if source != LeadSource::Manual && details.source() != source {
            errors.add("serviceDetails", "Die Leistungsdetails passen nicht zur Quelle.");
        }
    }

    if let Some(ServiceDetails::Digitalization(details)) = &req.service_details {
        errors.check(!details.target_url.trim().is_empty(), "targetUrl", MSG_URL);
        errors.check(!details.areas.is_empty(), "areas", MSG_AREAS);
    }

    let salutation = match non_empty(req.salutation.clone()) {
        Some(raw) => match raw.parse::<Salutation>() {
            Ok(s) => Some(s),
            Err(_) => {
                errors.add("salutation", MSG_SALUTATION);
                None
            }
        },
        None => {
            errors.add("salutation", MSG_SALUTATION);
            None
        }
    };

    let name = non_empty(req.name.clone());
    match &name {
        None => {
            errors.add("name", MSG_NAME);
        }
        Some(n) if n.chars().count() > MAX_NAME_LEN => {
            errors.add("name", "Der Name ist zu lang.");
        }
        _ => {}
    }

    let email = non_empty(req.email.clone()).map(|e| normalize_email(&e));
    match &email {
        None => {
            errors.add("email", MSG_EMAIL);
        }
        Some(e) if !is_valid_email(e) => {
            errors.add("email", MSG_EMAIL_INVALID);
        }
        _ => {}
    }

    errors.check(req.privacy_consent, "privacyConsent", MSG_PRIVACY);

    let lead_type = match non_empty(req.lead_type.clone()) {
        Some(raw) => match raw.parse::<LeadType>() {
            Ok(t) => Some(t),
            Err(_) => {
                errors.add("leadType", format!("Unbekannter Lead-Typ: {}", raw));
                None
            }
        },
        None => None,
    };

    let priority = match non_empty(req.priority.clone()) {
        Some(raw) => match raw.parse::<Priority>() {
            Ok(p) => p,
            Err(_) => {
                errors.add("priority", format!("Unbekannte Priorität: {}", raw));
                Priority::Medium
            }
        },
        None => match &req.service_details {
            Some(ServiceDetails::Digitalization(details)) => details
                .urgency
                .as_deref()
                .map(Priority::from_urgency)
                .unwrap_or(Priority::Medium),
            _ => Priority::Medium,
        },
    };

    if let Some(value) = req.estimated_value {
        errors.check(
            value.is_finite() && value >= 0.0,
            "estimatedValue",
            "Der geschätzte Wert muss eine positive Zahl sein.",
        );
    }

    let message = non_empty(req.message.clone());
    if let Some(m) = &message {
        errors.check(
            m.chars().count() <= MAX_MESSAGE_LEN,
            "message",
            "Die Nachricht ist zu lang.",
        );
    }

    errors.finish()?;

    // All required values are present once the builder is empty
    match (source, salutation, name, email) {
        (Some(source), Some(salutation), Some(name), Some(email)) => Ok(NewLead {
            salutation,
            name,
            email,
            phone: non_empty(req.phone),
            company: req.company,
            source,
            lead_type,
            priority,
            estimated_value: req.estimated_value,
            service_details: req.service_details,
            message,
            marketing_consent: req.marketing_consent,
            customer_id: None,
            created_by: None,
        }),
        _ => Err(ApiError::internal("Validierung unvollständig")),
    }
}

pub fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check(!req.name.trim().is_empty(), "name", MSG_NAME);
    if req.email.trim().is_empty() {
        errors.add("email", MSG_EMAIL);
    } else {
        errors.check(is_valid_email(&normalize_email(&req.email)), "email", MSG_EMAIL_INVALID);
    }
    if let Some(message) = validate_password_strength(&req.password) {
        errors.add("password", message);
    }
    if let Some(salutation) = non_empty(req.salutation.clone()) {
        errors.check(salutation.parse::<Salutation>().is_ok(), "salutation", MSG_SALUTATION);
    }

    errors.finish()
}

/// Check a contact-log entry and return its typed type and direction.
pub fn validate_communication(
    req: &CreateCommunicationRequest,
) -> Result<(CommunicationType, Direction), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    let comm_type = req.comm_type.parse::<CommunicationType>().ok();
    errors.check(
        comm_type.is_some(),
        "type",
        "Bitte wählen Sie eine gültige Art der Kommunikation (email, phone, meeting, note).",
    );

    let direction = req.direction.parse::<Direction>().ok();
    errors.check(
        direction.is_some(),
        "direction",
        "Die Richtung muss inbound oder outbound sein.",
    );

    errors.check(
        !req.content.trim().is_empty(),
        "content",
        "Bitte geben Sie einen Inhalt an.",
    );
    errors.check(
        req.content.chars().count() <= MAX_MESSAGE_LEN,
        "content",
        "Der Inhalt ist zu lang.",
    );

    if let Some(date) = &req.date {
        errors.check(
            chrono::DateTime::parse_from_rfc3339(date).is_ok()
                || chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").is_ok(),
            "date",
            "Das Datum ist ungültig.",
        );
    }

    errors.finish()?;

    match (comm_type, direction) {
        (Some(comm_type), Some(direction)) => Ok((comm_type, direction)),
        _ => Err(ApiError::internal("Validierung unvollständig")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AutomationDetails, DigitalizationDetails};

    fn valid_request() -> CreateLeadRequest {
        CreateLeadRequest {
            salutation: Some("frau".to_string()),
            name: Some("Erika Musterfrau".to_string()),
            email: Some(" Erika@Example.de ".to_string()),
            source: Some("contact".to_string()),
            privacy_consent: true,
            ..Default::default()
        }
    }

    fn messages(err: ApiError) -> Vec<String> {
        err.errors().to_vec()
    }

    #[test]
    fn test_valid_lead() {
        let lead = validate_create_lead(valid_request(), LeadOrigin::Public).unwrap();
        assert_eq!(lead.email, "erika@example.de");
        assert_eq!(lead.salutation, Salutation::Frau);
        assert_eq!(lead.source, LeadSource::Contact);
        assert_eq!(lead.priority, Priority::Medium);
    }

    #[test]
    fn test_each_missing_field_is_named() {
        let cases: Vec<(fn(&mut CreateLeadRequest), &str)> = vec![
            (|r| r.salutation = None, MSG_SALUTATION),
            (|r| r.name = Some("  ".to_string()), MSG_NAME),
            (|r| r.email = None, MSG_EMAIL),
            (|r| r.privacy_consent = false, MSG_PRIVACY),
        ];

        for (mutate, expected) in cases {
            let mut req = valid_request();
            mutate(&mut req);
            let err = validate_create_lead(req, LeadOrigin::Public).unwrap_err();
            assert_eq!(err.message(), expected);
            assert_eq!(messages(err), vec![expected.to_string()]);
        }
    }

    #[test]
    fn test_digitalization_order_and_priority() {
        let mut req = valid_request();
        req.source = Some("digitalization".to_string());
        req.name = None;
        req.service_details = Some(ServiceDetails::Digitalization(DigitalizationDetails {
            target_url: String::new(),
            areas: Vec::new(),
            urgency: Some("sofort".to_string()),
        }));

        let err = validate_create_lead(req.clone(), LeadOrigin::Public).unwrap_err();
        assert_eq!(messages(err), vec![MSG_URL, MSG_AREAS, MSG_NAME]);

        req.name = Some("Max".to_string());
        req.service_details = Some(ServiceDetails::Digitalization(DigitalizationDetails {
            target_url: "https://example.de".to_string(),
            areas: vec!["prozesse".to_string()],
            urgency: Some("sofort".to_string()),
        }));
        let lead = validate_create_lead(req, LeadOrigin::Public).unwrap();
        assert_eq!(lead.priority, Priority::High);
    }

    #[test]
    fn test_details_must_match_source() {
        let mut req = valid_request();
        req.source = Some("website".to_string());
        req.service_details = Some(ServiceDetails::Automation(AutomationDetails::default()));
        let err = validate_create_lead(req, LeadOrigin::Public).unwrap_err();
        assert!(err.message().contains("Leistungsdetails"));
    }

    #[test]
    fn test_source_rules() {
        let mut req = valid_request();
        req.source = Some("manual".to_string());
        assert!(validate_create_lead(req.clone(), LeadOrigin::Public).is_err());
        assert!(validate_create_lead(req.clone(), LeadOrigin::Staff).is_ok());

        req.source = None;
        assert!(validate_create_lead(req.clone(), LeadOrigin::Public).is_err());
        let staff = validate_create_lead(req, LeadOrigin::Staff).unwrap();
        assert_eq!(staff.source, LeadSource::Manual);
    }

    #[test]
    fn test_invalid_email_and_enums() {
        let mut req = valid_request();
        req.email = Some("not-an-email".to_string());
        req.priority = Some("critical".to_string());
        let err = validate_create_lead(req, LeadOrigin::Public).unwrap_err();
        let errors = messages(err);
        assert_eq!(errors[0], MSG_EMAIL_INVALID);
        assert!(errors[1].contains("critical"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("abc123").is_some());
        assert!(validate_password_strength("abcdefgh").is_some());
        assert!(validate_password_strength("12345678").is_some());
        assert!(validate_password_strength("sicher123").is_none());
    }

    #[test]
    fn test_communication_validation() {
        let req: CreateCommunicationRequest =
            serde_json::from_str(r#"{"type":"meeting","content":"Termin vor Ort"}"#).unwrap();
        assert_eq!(
            validate_communication(&req).unwrap(),
            (CommunicationType::Meeting, Direction::Outbound)
        );

        let bad: CreateCommunicationRequest =
            serde_json::from_str(r#"{"type":"fax","content":"","direction":"sideways"}"#).unwrap();
        assert_eq!(validate_communication(&bad).unwrap_err().errors().len(), 3);
    }
}
