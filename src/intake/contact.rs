use super::{optional, ContactFields, FormError, LeadForm};
use crate::db::{ContactDetails, CreateLeadRequest, LeadSource, ServiceDetails};

/// General contact request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactForm {
    pub contact: ContactFields,
    pub subject: String,
}

impl LeadForm for ContactForm {
    const SOURCE: LeadSource = LeadSource::Contact;

    fn validate(&self) -> Result<(), FormError> {
        self.contact.validate()
    }

    fn to_request(&self) -> CreateLeadRequest {
        let mut request = self.contact.to_request(Self::SOURCE);
        request.service_details = Some(ServiceDetails::Contact(ContactDetails {
            subject: optional(&self.subject),
        }));
        request
    }
}
