use super::{ContactFields, FormError, LeadForm};
use crate::db::{AutomationDetails, CreateLeadRequest, LeadSource, ServiceDetails};

/// Automation request with its ROI calculator inputs.
/// Rates are percentages, money is in euros per month unless noted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutomationForm {
    pub contact: ContactFields,
    pub processes: Vec<String>,
    /// One-off investment
    pub budget: f64,
    pub monthly_leads: f64,
    pub current_conversion_rate: f64,
    pub target_conversion_rate: f64,
    pub average_deal_value: f64,
}

/// Calculator results, rounded for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiFigures {
    pub additional_customers: f64,
    pub monthly_revenue_increase: f64,
    pub annual_revenue_increase: f64,
    pub roi_percent: f64,
    /// None when the monthly gain is zero
    pub payback_months: Option<f64>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

impl AutomationForm {
    pub fn roi(&self) -> RoiFigures {
        let leads = non_negative(self.monthly_leads);
        let current = non_negative(self.current_conversion_rate).min(100.0);
        let target = non_negative(self.target_conversion_rate).min(100.0);
        let deal = non_negative(self.average_deal_value);
        let budget = non_negative(self.budget);

        let additional_customers = (leads * (target - current) / 100.0).max(0.0);
        let monthly = additional_customers * deal;
        let annual = monthly * 12.0;

        let roi_percent = if budget > 0.0 {
            (annual - budget) / budget * 100.0
        } else {
            0.0
        };
        let payback_months = (monthly > 0.0).then(|| round1(budget / monthly));

        RoiFigures {
            additional_customers: round1(additional_customers),
            monthly_revenue_increase: round2(monthly),
            annual_revenue_increase: round2(annual),
            roi_percent: round1(roi_percent),
            payback_months,
        }
    }
}

impl LeadForm for AutomationForm {
    const SOURCE: LeadSource = LeadSource::Automation;

    fn validate(&self) -> Result<(), FormError> {
        self.contact.validate()
    }

    fn to_request(&self) -> CreateLeadRequest {
        let roi = self.roi();
        let mut request = self.contact.to_request(Self::SOURCE);
        let budget = non_negative(self.budget);
        request.estimated_value = (budget > 0.0).then_some(budget);
        request.service_details = Some(ServiceDetails::Automation(AutomationDetails {
            processes: self.processes.clone(),
            budget,
            monthly_leads: non_negative(self.monthly_leads),
            current_conversion_rate: non_negative(self.current_conversion_rate),
            target_conversion_rate: non_negative(self.target_conversion_rate),
            average_deal_value: non_negative(self.average_deal_value),
            additional_customers: roi.additional_customers,
            monthly_revenue_increase: roi.monthly_revenue_increase,
            annual_revenue_increase: roi.annual_revenue_increase,
            roi_percent: roi.roi_percent,
            payback_months: roi.payback_months,
        }));
        request
    }
}
