//! Lead notification e-mails.
//!
//! Sends the sales inbox a notice for every new lead and the prospect a
//! confirmation, using the SMTP settings from the main config file.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;
use crate::db::{Lead, Salutation};

/// Service for sending lead e-mails
pub struct LeadMailer {
    config: EmailConfig,
    public_url: String,
}

impl LeadMailer {
    pub fn new(config: EmailConfig, public_url: impl Into<String>) -> Self {
        Self {
            config,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Tell the sales inbox about a new lead
    pub async fn send_new_lead_notice(&self, lead: &Lead) -> Result<()> {
        let Some(to_email) = self.config.notify_address.as_deref() else {
            tracing::warn!(lead_id = %lead.id, "No notify address configured, skipping new-lead notice");
            return Ok(());
        };
        if !self.is_enabled() {
            tracing::warn!(lead_id = %lead.id, "Email not configured, skipping new-lead notice");
            return Ok(());
        }

        let subject = format!("Neuer Lead: {} ({})", lead.name, lead.source);
        let lead_url = format!("{}/dashboard/leads/{}", self.public_url, lead.id);
        let text_body = render_lead_notice_text(lead, &lead_url);
        let html_body = render_lead_notice_html(lead, &lead_url);

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Confirm receipt to the prospect
    pub async fn send_confirmation(&self, lead: &Lead) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping confirmation to {}",
                lead.email
            );
            return Ok(());
        }

        let subject = "Vielen Dank für Ihre Anfrage".to_string();
        let text_body = render_confirmation_text(lead);
        let html_body = format!(
            "<p>{}</p>",
            html_escape(&text_body).replace("\n\n", "</p><p>").replace('\n', "<br>")
        );

        self.send_email(&lead.email, &subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!(
            to = %to_email,
            subject = %subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

fn greeting(lead: &Lead) -> String {
    match lead.salutation.parse::<Salutation>() {
        Ok(Salutation::Herr) => format!("Sehr geehrter Herr {},", lead.name),
        Ok(Salutation::Frau) => format!("Sehr geehrte Frau {},", lead.name),
        Err(_) => format!("Guten Tag {},", lead.name),
    }
}

fn render_lead_notice_text(lead: &Lead, lead_url: &str) -> String {
    let mut lines = vec![
        format!("Neuer Lead über das Formular \"{}\"", lead.source),
        String::new(),
        format!("Name: {}", lead.name),
        format!("E-Mail: {}", lead.email),
    ];
    if let Some(phone) = &lead.phone {
        lines.push(format!("Telefon: {}", phone));
    }
    if let Some(company) = lead.company_name() {
        lines.push(format!("Firma: {}", company));
    }
    lines.push(format!("Priorität: {}", lead.priority));
    if let Some(value) = lead.estimated_value {
        lines.push(format!("Geschätzter Wert: {:.2} EUR", value));
    }
    if let Some(message) = &lead.message {
        lines.push(String::new());
        lines.push("Nachricht:".to_string());
        lines.push(message.clone());
    }
    lines.push(String::new());
    lines.push(format!("Im Dashboard öffnen: {}", lead_url));
    lines.join("\n")
}

fn render_lead_notice_html(lead: &Lead, lead_url: &str) -> String {
    let text = render_lead_notice_text(lead, lead_url);
    format!(
        "<pre style=\"font-family: sans-serif\">{}</pre><p><a href=\"{}\">Lead öffnen</a></p>",
        html_escape(&text),
        html_escape(lead_url)
    )
}

fn render_confirmation_text(lead: &Lead) -> String {
    format!(
        "{greeting}\n\nvielen Dank für Ihre Anfrage. Wir haben Ihre Angaben erhalten und melden uns innerhalb von zwei Werktagen bei Ihnen.\n\nMit freundlichen Grüßen\nIhr LeadGenPro-Team",
        greeting = greeting(lead),
    )
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Company;

    fn lead() -> Lead {
        Lead {
            id: "l1".to_string(),
            salutation: "frau".to_string(),
            name: "Erika <Musterfrau>".to_string(),
            email: "erika@example.de".to_string(),
            phone: Some("0301234".to_string()),
            company: Some(Company {
                name: Some("Muster & Co".to_string()),
                ..Default::default()
            }),
            source: "website".to_string(),
            status: "new".to_string(),
            lead_type: None,
            priority: "medium".to_string(),
            estimated_value: Some(4500.0),
            service_details: None,
            message: Some("Bitte um Rückruf".to_string()),
            privacy_consent: true,
            marketing_consent: false,
            customer_id: None,
            created_by: None,
            created_at: String::new(),
            updated_at: String::new(),
            communications: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("Tom & Jerry"), "Tom &amp; Jerry");
    }

    #[test]
    fn test_notice_contents() {
        let text = render_lead_notice_text(&lead(), "https://lead.online/dashboard/leads/l1");
        assert!(text.contains("Firma: Muster & Co"));
        assert!(text.contains("Geschätzter Wert: 4500.00 EUR"));
        assert!(text.contains("Bitte um Rückruf"));

        let html = render_lead_notice_html(&lead(), "https://lead.online/dashboard/leads/l1");
        assert!(html.contains("Muster &amp; Co"));
        assert!(!html.contains("<Musterfrau>"));
    }

    #[test]
    fn test_confirmation_greeting() {
        assert!(render_confirmation_text(&lead()).starts_with("Sehr geehrte Frau"));
        let mut herr = lead();
        herr.salutation = "herr".to_string();
        assert!(greeting(&herr).starts_with("Sehr geehrter Herr"));
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_skips() {
        let mailer = LeadMailer::new(EmailConfig::default(), "http://localhost:5000/");
        assert!(!mailer.is_enabled());
        assert!(mailer.send_confirmation(&lead()).await.is_ok());
        assert!(mailer.send_new_lead_notice(&lead()).await.is_ok());
    }
}
