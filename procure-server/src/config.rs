//! Service configuration loaded from the environment

/// Configuration for the procurement core
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL used when building invitation links
    pub base_url: String,
    /// Tax rate applied to supplier quote subtotals (fraction, e.g. 0.10)
    pub tax_rate: f64,
    /// Currency for payment intents (lowercase ISO code)
    pub currency: String,
    /// Validity window for supplier submission tokens, in days
    pub quote_submission_days: i64,
    /// Default invitation expiry, in hours
    pub invitation_expiry_hours: i64,
    /// Default admin profile created by the bootstrap step
    pub default_admin_email: String,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            base_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            tax_rate: std::env::var("TAX_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.10),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "usd".into()),
            quote_submission_days: std::env::var("QUOTE_SUBMISSION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            invitation_expiry_hours: std::env::var("INVITATION_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            default_admin_email: std::env::var("DEFAULT_ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@example.com".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            tax_rate: 0.10,
            currency: "usd".into(),
            quote_submission_days: 7,
            invitation_expiry_hours: 24,
            default_admin_email: "admin@example.com".into(),
            environment: "development".into(),
        }
    }
}
