//! Domain models for invoicing-service.

pub mod agent;
pub mod certification;
pub mod company;
pub mod currency;
pub mod invoice;
pub mod manager;
pub mod standard;
pub mod term;

pub use agent::{Agent, TargetChange};
pub use certification::Certification;
pub use company::{association_fields, Company};
pub use currency::{
    check_amount, round_money, to_inr, Currency, CurrencyError, ExchangeRate, MAX_AMOUNT,
};
pub use invoice::{Attachment, Billing, Contact, Invoice, InvoiceKind, ProformaStatus};
pub use manager::Manager;
pub use standard::Standard;
pub use term::{Term, TermStatus, TermTax};

// Optional DateTime<Utc> stored as a BSON date.
pub(crate) mod opt_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}
