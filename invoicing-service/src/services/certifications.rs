//! Individual certifications and their agent back-references.
//!
//! Same rules as invoices: the certification document is the source of
//! truth and a missing or unreachable agent only produces a warning.

use tracing::{info, instrument, warn};

use super::associations::{association_failed, missing_agent};
use super::error::{ConsistencyWarning, InvoicingError, Outcome};
use super::invoices::Listing;
use super::invoicing::{report_warnings, InvoicingService};
use super::metrics;
use super::store::Page;
use crate::dtos::certification::{CreateCertificationRequest, UpdateCertificationRequest};
use crate::models::{Certification, Contact};

const KIND: &str = "certification";

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_dates(certification: &Certification) -> Result<(), InvoicingError> {
    match (certification.registered_at, certification.expires_at) {
        (Some(registered), Some(expires)) if expires < registered => Err(
            InvoicingError::validation("expires_at must not precede registered_at"),
        ),
        _ => Ok(()),
    }
}

fn outcome_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

impl InvoicingService {
    #[instrument(skip(self, input), fields(company_name = %input.company_name))]
    pub async fn create_certification(
        &self,
        input: &CreateCertificationRequest,
    ) -> Result<Outcome<Certification>, InvoicingError> {
        let result = self.persist_certification(input).await;
        metrics::record_invoice_write(KIND, "create", outcome_label(&result));
        let outcome = result?;
        report_warnings(&outcome.data.id, &outcome.warnings);
        info!(certification_id = %outcome.data.id, "Certification created");
        Ok(outcome)
    }

    async fn persist_certification(
        &self,
        input: &CreateCertificationRequest,
    ) -> Result<Outcome<Certification>, InvoicingError> {
        let now = self.clock.now();
        let certification = Certification {
            id: uuid::Uuid::new_v4().to_string(),
            company_name: input.company_name.trim().to_string(),
            client_name: non_blank(&input.client_name),
            certification_number: non_blank(&input.certification_number),
            standard: non_blank(&input.standard),
            scope_of_work: non_blank(&input.scope_of_work),
            status: non_blank(&input.status)
                .unwrap_or_else(|| Certification::DEFAULT_STATUS.to_string()),
            agent_id: non_blank(&input.agent_id),
            contact: Contact {
                email: input.email.trim().to_lowercase(),
                alternate_emails: input.alternate_emails.clone(),
                phone: input.phone.clone(),
                city: input.city.clone(),
                country: input.country.clone(),
                address: input.address.clone(),
                website: input.website.clone(),
            },
            phone_code: input.phone_code.clone(),
            registered_at: input.registered_at,
            expires_at: input.expires_at,
            attachments: input.attachments.clone(),
            logo: input.logo.clone(),
            created_at: now,
            updated_at: now,
        };
        check_dates(&certification)?;

        let store = self.store();
        let inserted = &certification;
        self.insert_once(
            "insert_certification",
            move || store.insert_certification(inserted),
            move || store.get_certification(&inserted.id),
        )
        .await?;

        let mut warnings = Vec::new();
        if let Some(agent_id) = certification.agent_id.as_deref() {
            warnings.extend(
                self.link_certification(agent_id, &certification.id)
                    .await,
            );
        }
        Ok(Outcome::new(certification, warnings))
    }

    pub async fn get_certification(&self, id: &str) -> Result<Certification, InvoicingError> {
        let store = self.store();
        self.call("get_certification", move || store.get_certification(id))
            .await?
            .ok_or_else(|| InvoicingError::not_found("Certification", id))
    }

    /// Newest first, optionally for a single agent.
    pub async fn list_certifications(
        &self,
        agent_id: Option<&str>,
        page: Page,
    ) -> Result<Listing<Certification>, InvoicingError> {
        let store = self.store();
        let items = self
            .call("find_certifications", move || {
                store.find_certifications(agent_id, Some(page))
            })
            .await?;
        let total = self
            .call("count_certifications", move || {
                store.count_certifications(agent_id)
            })
            .await?;
        Ok(Listing { items, total, page })
    }

    #[instrument(skip(self, patch))]
    pub async fn update_certification(
        &self,
        id: &str,
        patch: &UpdateCertificationRequest,
    ) -> Result<Outcome<Certification>, InvoicingError> {
        let result = self.apply_certification_update(id, patch).await;
        metrics::record_invoice_write(KIND, "update", outcome_label(&result));
        let outcome = result?;
        report_warnings(id, &outcome.warnings);
        info!(certification_id = %id, "Certification updated");
        Ok(outcome)
    }

    async fn apply_certification_update(
        &self,
        id: &str,
        patch: &UpdateCertificationRequest,
    ) -> Result<Outcome<Certification>, InvoicingError> {
        let before = self.get_certification(id).await?;
        let after = merge_certification(&before, patch, self.clock.now());
        check_dates(&after)?;

        let warnings = self.move_certification(&before, &after).await;

        let store = self.store();
        let replaced = {
            let after = &after;
            self.call("replace_certification", move || {
                store.replace_certification(after)
            })
            .await
        };
        match replaced {
            Ok(true) => Ok(Outcome::new(after, warnings)),
            Ok(false) => {
                self.move_certification(&after, &before).await;
                Err(InvoicingError::not_found("Certification", id))
            }
            Err(e) => {
                let restored = self.move_certification(&after, &before).await;
                report_warnings(id, &restored);
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_certification(
        &self,
        id: &str,
    ) -> Result<Outcome<Certification>, InvoicingError> {
        let result = self.remove_certification(id).await;
        metrics::record_invoice_write(KIND, "delete", outcome_label(&result));
        let outcome = result?;
        report_warnings(id, &outcome.warnings);
        info!(certification_id = %id, "Certification deleted");
        Ok(outcome)
    }

    async fn remove_certification(&self, id: &str) -> Result<Outcome<Certification>, InvoicingError> {
        let certification = self.get_certification(id).await?;
        let mut warnings = Vec::new();
        if let Some(agent_id) = certification.agent_id.as_deref() {
            warnings.extend(self.unlink_certification(agent_id, id).await);
        }

        let store = self.store();
        let deleted = match self
            .call("delete_certification", move || {
                store.delete_certification(id)
            })
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                if let Some(agent_id) = certification.agent_id.as_deref() {
                    let restored: Vec<_> =
                        self.link_certification(agent_id, id).await.into_iter().collect();
                    report_warnings(id, &restored);
                }
                return Err(e.into());
            }
        };
        if !deleted {
            warn!(certification_id = %id, "Certification disappeared before it could be deleted");
        }
        Ok(Outcome::new(certification, warnings))
    }

    /// Moves the agent back-reference from `before`'s agent to `after`'s.
    async fn move_certification(
        &self,
        before: &Certification,
        after: &Certification,
    ) -> Vec<ConsistencyWarning> {
        let mut warnings = Vec::new();
        if before.agent_id == after.agent_id {
            return warnings;
        }
        if let Some(old) = before.agent_id.as_deref() {
            warnings.extend(self.unlink_certification(old, &before.id).await);
        }
        if let Some(new) = after.agent_id.as_deref() {
            warnings.extend(self.link_certification(new, &after.id).await);
        }
        warnings
    }

    async fn link_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
    ) -> Option<ConsistencyWarning> {
        let store = self.store();
        let now = self.clock.now();
        match self
            .call("link_agent_certification", move || {
                store.link_agent_certification(agent_id, certification_id, now)
            })
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(missing_agent(agent_id)),
            Err(e) => Some(association_failed("agent", agent_id, e)),
        }
    }

    async fn unlink_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
    ) -> Option<ConsistencyWarning> {
        let store = self.store();
        let now = self.clock.now();
        match self
            .call("unlink_agent_certification", move || {
                store.unlink_agent_certification(agent_id, certification_id, now)
            })
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(missing_agent(agent_id)),
            Err(e) => Some(association_failed("agent", agent_id, e)),
        }
    }
}

fn merge_certification(
    before: &Certification,
    patch: &UpdateCertificationRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> Certification {
    let pick = |value: &Option<String>, current: &Option<String>| {
        if value.is_some() {
            non_blank(value)
        } else {
            current.clone()
        }
    };
    let contact = &before.contact;
    Certification {
        id: before.id.clone(),
        company_name: patch
            .company_name
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| before.company_name.clone()),
        client_name: pick(&patch.client_name, &before.client_name),
        certification_number: pick(&patch.certification_number, &before.certification_number),
        standard: pick(&patch.standard, &before.standard),
        scope_of_work: pick(&patch.scope_of_work, &before.scope_of_work),
        status: non_blank(&patch.status).unwrap_or_else(|| before.status.clone()),
        agent_id: pick(&patch.agent_id, &before.agent_id),
        contact: Contact {
            email: patch
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .unwrap_or_else(|| contact.email.clone()),
            alternate_emails: patch
                .alternate_emails
                .clone()
                .unwrap_or_else(|| contact.alternate_emails.clone()),
            phone: patch.phone.clone().or_else(|| contact.phone.clone()),
            city: patch.city.clone().or_else(|| contact.city.clone()),
            country: patch.country.clone().or_else(|| contact.country.clone()),
            address: patch.address.clone().or_else(|| contact.address.clone()),
            website: patch.website.clone().or_else(|| contact.website.clone()),
        },
        phone_code: patch.phone_code.clone().or_else(|| before.phone_code.clone()),
        registered_at: patch.registered_at.or(before.registered_at),
        expires_at: patch.expires_at.or(before.expires_at),
        attachments: patch
            .attachments
            .clone()
            .unwrap_or_else(|| before.attachments.clone()),
        logo: patch.logo.clone().or_else(|| before.logo.clone()),
        created_at: before.created_at,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn certification() -> Certification {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        Certification {
            id: "cert-1".to_string(),
            company_name: "Acme".to_string(),
            client_name: Some("R. Iyer".to_string()),
            certification_number: None,
            standard: Some("ISO 9001".to_string()),
            scope_of_work: None,
            status: Certification::DEFAULT_STATUS.to_string(),
            agent_id: Some("agent-1".to_string()),
            contact: Contact {
                email: "ops@acme.test".to_string(),
                ..Default::default()
            },
            phone_code: None,
            registered_at: Some(at),
            expires_at: None,
            attachments: Vec::new(),
            logo: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let before = certification();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let patch = UpdateCertificationRequest {
            status: Some("Suspended".to_string()),
            ..Default::default()
        };

        let after = merge_certification(&before, &patch, now);

        assert_eq!(after.status, "Suspended");
        assert_eq!(after.agent_id, before.agent_id);
        assert_eq!(after.contact, before.contact);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.updated_at, now);
    }

    #[test]
    fn test_blank_agent_id_clears_the_agent() {
        let before = certification();
        let patch = UpdateCertificationRequest {
            agent_id: Some("  ".to_string()),
            ..Default::default()
        };

        let after = merge_certification(&before, &patch, before.updated_at);

        assert_eq!(after.agent_id, None);
    }

    #[test]
    fn test_expiry_before_registration_is_rejected() {
        let mut cert = certification();
        cert.expires_at = Some(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap());

        assert!(matches!(
            check_dates(&cert),
            Err(InvoicingError::Validation(_))
        ));
    }
}
