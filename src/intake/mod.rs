//! Lead intake forms.
//!
//! Each form validates its required fields locally, in a fixed order, before
//! anything goes over the network. [`FormController`] drives a form through
//! open, submit and reset, and talks to the API through a [`LeadSink`].

mod automation;
mod contact;
mod digitalization;
mod website;

pub use automation::{AutomationForm, RoiFigures};
pub use contact::ContactForm;
pub use digitalization::DigitalizationForm;
pub use website::WebsiteForm;

use async_trait::async_trait;
use thiserror::Error;

use crate::api::validation::{
    is_valid_email, MSG_EMAIL, MSG_EMAIL_INVALID, MSG_NAME, MSG_PRIVACY, MSG_SALUTATION,
};
use crate::client::ClientError;
use crate::db::{Company, CreateLeadRequest, Lead, LeadSource, Salutation};

pub const MSG_SUBMITTED: &str =
    "Vielen Dank! Ihre Anfrage wurde erfolgreich übermittelt. Wir melden uns in Kürze bei Ihnen.";
pub const MSG_SUBMIT_FAILED: &str =
    "Beim Senden Ihrer Anfrage ist ein Fehler aufgetreten. Bitte versuchen Sie es erneut.";

/// The first missing or invalid field of a form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FormError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FormError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Receives validated submissions
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn create_lead(&self, request: CreateLeadRequest) -> Result<Lead, ClientError>;
}

/// A submittable intake form. `Default` is the empty initial state.
pub trait LeadForm: Default + Send {
    const SOURCE: LeadSource;

    /// Ok, or the first failing field in check order
    fn validate(&self) -> Result<(), FormError>;

    fn to_request(&self) -> CreateLeadRequest;
}

/// Contact block shared by every form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactFields {
    /// `herr` or `frau`
    pub salutation: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub message: String,
    pub privacy_consent: bool,
    pub marketing_consent: bool,
}

impl ContactFields {
    /// Salutation, name, e-mail and privacy consent, in that order
    pub fn validate(&self) -> Result<(), FormError> {
        if self.salutation.parse::<Salutation>().is_err() {
            return Err(FormError::new("salutation", MSG_SALUTATION));
        }
        if self.name.trim().is_empty() {
            return Err(FormError::new("name", MSG_NAME));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(FormError::new("email", MSG_EMAIL));
        }
        if !is_valid_email(email) {
            return Err(FormError::new("email", MSG_EMAIL_INVALID));
        }
        if !self.privacy_consent {
            return Err(FormError::new("privacyConsent", MSG_PRIVACY));
        }
        Ok(())
    }

    /// Request with the contact block filled in
    pub fn to_request(&self, source: LeadSource) -> CreateLeadRequest {
        CreateLeadRequest {
            salutation: Some(self.salutation.clone()),
            name: Some(self.name.trim().to_string()),
            email: Some(self.email.trim().to_string()),
            phone: optional(&self.phone),
            company: optional(&self.company).map(|name| Company {
                name: Some(name),
                ..Default::default()
            }),
            source: Some(source.as_str().to_string()),
            message: optional(&self.message),
            privacy_consent: self.privacy_consent,
            marketing_consent: self.marketing_consent,
            ..Default::default()
        }
    }
}

pub(crate) fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Local validation failed; nothing was sent
    Invalid(FormError),
    Submitted(Lead),
    /// The API call failed; the form keeps its data
    Failed(String),
}

/// State of one form dialog
pub struct FormController<F: LeadForm> {
    form: F,
    open: bool,
    notification: Option<Notification>,
}

impl<F: LeadForm> Default for FormController<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: LeadForm> FormController<F> {
    pub fn new() -> Self {
        Self {
            form: F::default(),
            open: false,
            notification: None,
        }
    }

    pub fn open(&mut self) {
        self.open = true;
        self.notification = None;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notification = Some(Notification {
            kind,
            message: message.into(),
        });
    }

    /// Validate, then send. On success the form resets and closes; on
    /// failure it stays populated for another try.
    pub async fn submit(&mut self, sink: &dyn LeadSink) -> SubmitOutcome {
        if let Err(error) = self.form.validate() {
            self.notify(NotificationKind::Error, error.message);
            return SubmitOutcome::Invalid(error);
        }

        match sink.create_lead(self.form.to_request()).await {
            Ok(lead) => {
                tracing::info!(lead_id = %lead.id, source = %F::SOURCE, "Lead submitted");
                self.form = F::default();
                self.open = false;
                self.notify(NotificationKind::Success, MSG_SUBMITTED);
                SubmitOutcome::Submitted(lead)
            }
            Err(e) => {
                tracing::error!(source = %F::SOURCE, error = %e, "Lead submission failed");
                self.notify(NotificationKind::Error, MSG_SUBMIT_FAILED);
                SubmitOutcome::Failed(e.to_string())
            }
        }
    }
}
