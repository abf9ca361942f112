use super::{ContactFields, FormError, LeadForm};
use crate::api::validation::{MSG_AREAS, MSG_URL};
use crate::db::{CreateLeadRequest, DigitalizationDetails, LeadSource, Priority, ServiceDetails};

/// Digitalization check request: a website to review and the areas of interest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DigitalizationForm {
    pub target_url: String,
    pub areas: Vec<String>,
    /// `sofort`, `1-3 Monate`, ...
    pub urgency: String,
    pub contact: ContactFields,
}

impl DigitalizationForm {
    pub fn priority(&self) -> Priority {
        Priority::from_urgency(&self.urgency)
    }
}

impl LeadForm for DigitalizationForm {
    const SOURCE: LeadSource = LeadSource::Digitalization;

    /// URL, areas, then the contact block
    fn validate(&self) -> Result<(), FormError> {
        if self.target_url.trim().is_empty() {
            return Err(FormError::new("targetUrl", MSG_URL));
        }
        if self.areas.is_empty() {
            return Err(FormError::new("areas", MSG_AREAS));
        }
        self.contact.validate()
    }

    fn to_request(&self) -> CreateLeadRequest {
        let mut request = self.contact.to_request(Self::SOURCE);
        request.priority = Some(self.priority().as_str().to_string());
        request.service_details = Some(ServiceDetails::Digitalization(DigitalizationDetails {
            target_url: self.target_url.trim().to_string(),
            areas: self.areas.clone(),
            urgency: super::optional(&self.urgency),
        }));
        request
    }
}
