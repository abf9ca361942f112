use super::{optional, ContactFields, FormError, LeadForm};
use crate::db::{Company, CreateLeadRequest, LeadSource, ServiceDetails, WebsiteDetails};

/// Website (re)design request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebsiteForm {
    pub contact: ContactFields,
    pub current_website: String,
    pub goals: Vec<String>,
    pub style: String,
    pub timeline: String,
    pub budget: String,
}

impl LeadForm for WebsiteForm {
    const SOURCE: LeadSource = LeadSource::Website;

    fn validate(&self) -> Result<(), FormError> {
        self.contact.validate()
    }

    fn to_request(&self) -> CreateLeadRequest {
        let mut request = self.contact.to_request(Self::SOURCE);

        let current_website = optional(&self.current_website);
        if let Some(url) = &current_website {
            let company = request.company.get_or_insert_with(Company::default);
            company.website = Some(url.clone());
        }

        request.service_details = Some(ServiceDetails::Website(WebsiteDetails {
            goals: self.goals.clone(),
            style: optional(&self.style),
            timeline: optional(&self.timeline),
            budget: optional(&self.budget),
            current_website,
        }));
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::testing::contact;

    #[test]
    fn test_current_website_lands_on_company() {
        let form = WebsiteForm {
            contact: contact(),
            current_website: "https://alt.example.de".to_string(),
            goals: vec!["mehr Anfragen".to_string()],
            budget: "5.000-10.000 €".to_string(),
            ..Default::default()
        };
        assert!(form.validate().is_ok());

        let request = form.to_request();
        assert_eq!(
            request.company.and_then(|c| c.website).as_deref(),
            Some("https://alt.example.de")
        );
        match request.service_details {
            Some(ServiceDetails::Website(details)) => {
                assert_eq!(details.goals, vec!["mehr Anfragen".to_string()]);
                assert!(details.style.is_none());
                assert_eq!(details.budget.as_deref(), Some("5.000-10.000 €"));
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }
}
