//! MongoDB-backed `InvoiceStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Bson, DateTime as BsonDateTime, Document},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use service_core::error::AppError;

use super::error::StoreError;
use super::store::{
    set_fields, AgentFilter, AgentPatch, CompanyPatch, InvoiceFilter, InvoiceStore, ManagerPatch,
    Page, StandardPatch,
};
use crate::models::{
    association_fields, Agent, Certification, Company, Invoice, InvoiceKind, Manager,
    ProformaStatus, Standard, TermStatus,
};

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn agents(&self) -> Collection<Agent> {
        self.db.collection("agents")
    }

    pub fn companies(&self) -> Collection<Company> {
        self.db.collection("companies")
    }

    pub fn certifications(&self) -> Collection<Certification> {
        self.db.collection("certifications")
    }

    pub fn managers(&self) -> Collection<Manager> {
        self.db.collection("managers")
    }

    pub fn standards(&self) -> Collection<Standard> {
        self.db.collection("standards")
    }

    fn leases(&self) -> Collection<Document> {
        self.db.collection("leases")
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for invoicing-service");

        create_index(
            &self.invoices(),
            doc! { "kind": 1, "invoice_no": 1 },
            "kind_invoice_no_idx",
            true,
        )
        .await?;
        create_index(
            &self.invoices(),
            doc! { "agent_id": 1, "company_id": 1 },
            "agent_company_idx",
            false,
        )
        .await?;
        create_index(
            &self.invoices(),
            doc! { "company_id": 1, "standards": 1 },
            "company_standards_idx",
            false,
        )
        .await?;
        create_index(
            &self.invoices(),
            doc! { "booked_at": -1 },
            "booked_at_idx",
            false,
        )
        .await?;
        create_index(
            &self.agents(),
            doc! { "agent_email": 1 },
            "agent_email_idx",
            true,
        )
        .await?;
        create_index(
            &self.agents(),
            doc! { "manager_id": 1 },
            "manager_id_idx",
            false,
        )
        .await?;
        create_index(
            &self.certifications(),
            doc! { "agent_id": 1, "created_at": -1 },
            "agent_created_idx",
            false,
        )
        .await?;
        create_index(&self.managers(), doc! { "email": 1 }, "email_idx", true).await?;
        create_index(
            &self.standards(),
            doc! { "standard_name": 1 },
            "standard_name_idx",
            true,
        )
        .await?;

        // Crashed holders release their leases when the TTL monitor runs.
        let lease_ttl = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("expires_at_ttl_idx".to_string())
                    .expire_after(std::time::Duration::from_secs(0))
                    .build(),
            )
            .build();
        self.leases()
            .create_index(lease_ttl, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create lease TTL index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }
}

async fn create_index<T>(
    collection: &Collection<T>,
    keys: Document,
    name: &str,
    unique: bool,
) -> Result<(), AppError>
where
    T: Send + Sync,
{
    let index = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build();

    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!("Failed to create {} index: {}", name, e);
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(())
}

fn find_options(sort: Document, page: Option<Page>) -> FindOptions {
    FindOptions::builder()
        .sort(sort)
        .skip(page.map(|p| p.offset))
        .limit(page.map(|p| p.limit))
        .build()
}

fn return_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

async fn collect<T>(
    collection: &Collection<T>,
    filter: Document,
    options: FindOptions,
) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let cursor = collection.find(filter, options).await?;
    let items: Vec<T> = cursor.try_collect().await?;
    Ok(items)
}

/// Amounts are stored with the same encoding the document serializer uses.
fn money(value: Decimal) -> Result<Bson, StoreError> {
    Ok(to_bson(&value)?)
}

fn certification_filter(agent_id: Option<&str>) -> Document {
    match agent_id {
        Some(agent_id) => doc! { "agent_id": agent_id },
        None => doc! {},
    }
}

fn set_stage(field: &str, expr: Document) -> Document {
    let mut set = Document::new();
    set.insert(field, expr);
    doc! { "$set": set }
}

/// Pipeline that adds `id` to `list` (if absent) and recomputes `count`
/// from the list length.
fn link_stages(list: &str, count: &str, id: &str) -> Vec<Document> {
    let current = doc! { "$ifNull": [format!("${}", list), []] };
    vec![
        set_stage(
            list,
            doc! { "$cond": [
                { "$in": [{ "$literal": id }, current.clone()] },
                current.clone(),
                { "$concatArrays": [current, [{ "$literal": id }]] },
            ] },
        ),
        set_stage(count, doc! { "$size": format!("${}", list) }),
    ]
}

fn unlink_stages(list: &str, count: &str, id: &str) -> Vec<Document> {
    vec![
        set_stage(
            list,
            doc! { "$filter": {
                "input": { "$ifNull": [format!("${}", list), []] },
                "as": "item",
                "cond": { "$ne": ["$$item", { "$literal": id }] },
            } },
        ),
        set_stage(count, doc! { "$size": format!("${}", list) }),
    ]
}

#[async_trait]
impl InvoiceStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.invoices().insert_one(invoice, None).await?;
        Ok(())
    }

    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self.invoices().find_one(doc! { "_id": id }, None).await?)
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<bool, StoreError> {
        let result = self
            .invoices()
            .replace_one(doc! { "_id": invoice.id.as_str() }, invoice, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_invoice(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.invoices().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Option<Page>,
    ) -> Result<Vec<Invoice>, StoreError> {
        collect(
            &self.invoices(),
            filter.to_document(),
            find_options(doc! { "created_at": -1, "_id": 1 }, page),
        )
        .await
    }

    async fn count_invoices(&self, filter: &InvoiceFilter) -> Result<u64, StoreError> {
        Ok(self
            .invoices()
            .count_documents(filter.to_document(), None)
            .await?)
    }

    async fn set_term_status(
        &self,
        invoice_id: &str,
        term_id: &str,
        status: TermStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError> {
        let pending = TermStatus::Pending.as_str();
        let paid = TermStatus::Paid.as_str();
        let pipeline = vec![
            doc! { "$set": { "terms": { "$map": {
                "input": "$terms",
                "as": "t",
                "in": { "$cond": [
                    { "$eq": ["$$t.term_id", { "$literal": term_id }] },
                    { "$mergeObjects": ["$$t", { "status": status.as_str() }] },
                    "$$t",
                ] },
            } } } },
            doc! { "$set": {
                "pending_payment_in_inr": { "$round": [{ "$sum": { "$map": {
                    "input": { "$filter": {
                        "input": "$terms",
                        "as": "t",
                        "cond": { "$eq": ["$$t.status", pending] },
                    } },
                    "as": "t",
                    "in": { "$ifNull": ["$$t.tax.total_in_inr", "$$t.term_total"] },
                } } }, 2] },
                "is_completed": { "$and": [
                    { "$gt": [{ "$size": "$terms" }, 0] },
                    { "$allElementsTrue": [{ "$map": {
                        "input": "$terms",
                        "as": "t",
                        "in": { "$eq": ["$$t.status", paid] },
                    } }] },
                ] },
                "updated_at": BsonDateTime::from_chrono(now),
            } },
        ];

        Ok(self
            .invoices()
            .find_one_and_update(
                doc! { "_id": invoice_id, "terms.term_id": term_id },
                pipeline,
                return_after(),
            )
            .await?)
    }

    async fn set_proforma_status(
        &self,
        invoice_id: &str,
        status: ProformaStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .invoices()
            .find_one_and_update(
                doc! { "_id": invoice_id, "kind": InvoiceKind::Proforma.as_str() },
                doc! { "$set": {
                    "proforma_status": status.as_str(),
                    "updated_at": BsonDateTime::from_chrono(now),
                } },
                return_after(),
            )
            .await?)
    }

    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        self.agents().insert_one(agent, None).await?;
        Ok(())
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_agents(
        &self,
        filter: &AgentFilter,
        page: Option<Page>,
    ) -> Result<Vec<Agent>, StoreError> {
        collect(
            &self.agents(),
            filter.to_document(),
            find_options(doc! { "agent_name": 1, "_id": 1 }, page),
        )
        .await
    }

    async fn update_agent(
        &self,
        id: &str,
        patch: &AgentPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Agent>, StoreError> {
        let mut set = set_fields(&[
            ("agent_name", &patch.agent_name),
            ("agent_email", &patch.agent_email),
            ("agent_number", &patch.agent_number),
            ("manager_id", &patch.manager_id),
        ]);
        set.insert("updated_at", BsonDateTime::from_chrono(now));

        Ok(self
            .agents()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_after())
            .await?)
    }

    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.agents().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn link_agent_invoice(
        &self,
        agent_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut pipeline = link_stages("invoice_ids", "invoice_count", invoice_id);
        pipeline.push(doc! { "$set": { "updated_at": BsonDateTime::from_chrono(now) } });
        let result = self
            .agents()
            .update_one(doc! { "_id": agent_id }, pipeline, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn unlink_agent_invoice(
        &self,
        agent_id: &str,
        invoice_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut pipeline = unlink_stages("invoice_ids", "invoice_count", invoice_id);
        pipeline.push(doc! { "$set": { "updated_at": BsonDateTime::from_chrono(now) } });
        let result = self
            .agents()
            .update_one(doc! { "_id": agent_id }, pipeline, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn credit_target(
        &self,
        agent_id: &str,
        invoice_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let amount = money(amount)?;
        let credited = doc! { "$ifNull": ["$credited_invoice_ids", []] };
        let seen = doc! { "$in": [{ "$literal": invoice_id }, credited.clone()] };
        // Both conditions read the pre-update list.
        let pipeline = vec![doc! { "$set": {
            "target_achieved": { "$cond": [
                seen.clone(),
                "$target_achieved",
                { "$round": [{ "$add": ["$target_achieved", amount] }, 2] },
            ] },
            "credited_invoice_ids": { "$cond": [
                seen.clone(),
                credited.clone(),
                { "$concatArrays": [credited, [{ "$literal": invoice_id }]] },
            ] },
            "updated_at": { "$cond": [
                seen,
                "$updated_at",
                BsonDateTime::from_chrono(now),
            ] },
        } }];
        let result = self
            .agents()
            .update_one(doc! { "_id": agent_id }, pipeline, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn set_agent_target(
        &self,
        agent_id: &str,
        target: Decimal,
        change_id: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<Option<Agent>, StoreError> {
        let target = money(target)?;
        let changed_at = BsonDateTime::from_chrono(changed_at);
        let history = doc! { "$ifNull": ["$target_history", []] };
        let seen = doc! { "$in": [
            { "$literal": change_id },
            { "$ifNull": ["$target_history.change_id", []] },
        ] };
        // Field paths inside one $set stage read the pre-update document.
        let pipeline = vec![doc! { "$set": {
            "target_history": { "$cond": [
                seen.clone(),
                history.clone(),
                { "$concatArrays": [
                    history,
                    [{
                        "change_id": { "$literal": change_id },
                        "previous_target": "$target",
                        "previous_achieved": "$target_achieved",
                        "changed_at": changed_at,
                    }],
                ] },
            ] },
            "target": { "$cond": [seen.clone(), "$target", target] },
            "updated_at": { "$cond": [seen, "$updated_at", changed_at] },
        } }];

        Ok(self
            .agents()
            .find_one_and_update(doc! { "_id": agent_id }, pipeline, return_after())
            .await?)
    }

    async fn link_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut pipeline =
            link_stages("certification_ids", "certification_count", certification_id);
        pipeline.push(doc! { "$set": { "updated_at": BsonDateTime::from_chrono(now) } });
        let result = self
            .agents()
            .update_one(doc! { "_id": agent_id }, pipeline, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn unlink_agent_certification(
        &self,
        agent_id: &str,
        certification_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut pipeline =
            unlink_stages("certification_ids", "certification_count", certification_id);
        pipeline.push(doc! { "$set": { "updated_at": BsonDateTime::from_chrono(now) } });
        let result = self
            .agents()
            .update_one(doc! { "_id": agent_id }, pipeline, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn insert_company(&self, company: &Company) -> Result<(), StoreError> {
        self.companies().insert_one(company, None).await?;
        Ok(())
    }

    async fn get_company(&self, id: &str) -> Result<Option<Company>, StoreError> {
        Ok(self.companies().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_companies(&self, page: Option<Page>) -> Result<Vec<Company>, StoreError> {
        collect(
            &self.companies(),
            doc! {},
            find_options(doc! { "created_at": -1, "_id": 1 }, page),
        )
        .await
    }

    async fn count_companies(&self) -> Result<u64, StoreError> {
        Ok(self.companies().count_documents(doc! {}, None).await?)
    }

    async fn update_company(
        &self,
        id: &str,
        patch: &CompanyPatch,
    ) -> Result<Option<Company>, StoreError> {
        let set = set_fields(&[
            ("company_name", &patch.company_name),
            ("status", &patch.status),
        ]);
        if set.is_empty() {
            return self.get_company(id).await;
        }
        Ok(self
            .companies()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_after())
            .await?)
    }

    async fn delete_company(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.companies().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn link_company_invoice(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Result<bool, StoreError> {
        let (list, count) = association_fields(kind);
        let result = self
            .companies()
            .update_one(
                doc! { "_id": company_id },
                link_stages(list, count, invoice_id),
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn unlink_company_invoice(
        &self,
        company_id: &str,
        kind: InvoiceKind,
        invoice_id: &str,
    ) -> Result<bool, StoreError> {
        let (list, count) = association_fields(kind);
        let result = self
            .companies()
            .update_one(
                doc! { "_id": company_id },
                unlink_stages(list, count, invoice_id),
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn insert_certification(
        &self,
        certification: &Certification,
    ) -> Result<(), StoreError> {
        self.certifications().insert_one(certification, None).await?;
        Ok(())
    }

    async fn get_certification(&self, id: &str) -> Result<Option<Certification>, StoreError> {
        Ok(self
            .certifications()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn find_certifications(
        &self,
        agent_id: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<Certification>, StoreError> {
        collect(
            &self.certifications(),
            certification_filter(agent_id),
            find_options(doc! { "created_at": -1, "_id": 1 }, page),
        )
        .await
    }

    async fn count_certifications(&self, agent_id: Option<&str>) -> Result<u64, StoreError> {
        Ok(self
            .certifications()
            .count_documents(certification_filter(agent_id), None)
            .await?)
    }

    async fn replace_certification(
        &self,
        certification: &Certification,
    ) -> Result<bool, StoreError> {
        let result = self
            .certifications()
            .replace_one(doc! { "_id": certification.id.as_str() }, certification, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_certification(&self, id: &str) -> Result<bool, StoreError> {
        let result = self
            .certifications()
            .delete_one(doc! { "_id": id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_manager(&self, manager: &Manager) -> Result<(), StoreError> {
        self.managers().insert_one(manager, None).await?;
        Ok(())
    }

    async fn get_manager(&self, id: &str) -> Result<Option<Manager>, StoreError> {
        Ok(self.managers().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_managers(&self, page: Option<Page>) -> Result<Vec<Manager>, StoreError> {
        collect(
            &self.managers(),
            doc! {},
            find_options(doc! { "name": 1, "_id": 1 }, page),
        )
        .await
    }

    async fn update_manager(
        &self,
        id: &str,
        patch: &ManagerPatch,
    ) -> Result<Option<Manager>, StoreError> {
        let set = set_fields(&[
            ("name", &patch.name),
            ("email", &patch.email),
            ("mobile", &patch.mobile),
        ]);
        if set.is_empty() {
            return self.get_manager(id).await;
        }
        Ok(self
            .managers()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_after())
            .await?)
    }

    async fn delete_manager(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.managers().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_standard(&self, standard: &Standard) -> Result<(), StoreError> {
        self.standards().insert_one(standard, None).await?;
        Ok(())
    }

    async fn get_standard(&self, id: &str) -> Result<Option<Standard>, StoreError> {
        Ok(self.standards().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_standards(&self, page: Option<Page>) -> Result<Vec<Standard>, StoreError> {
        collect(
            &self.standards(),
            doc! {},
            find_options(doc! { "standard_name": 1 }, page),
        )
        .await
    }

    async fn update_standard(
        &self,
        id: &str,
        patch: &StandardPatch,
    ) -> Result<Option<Standard>, StoreError> {
        let set = set_fields(&[
            ("standard_name", &patch.standard_name),
            ("description", &patch.description),
        ]);
        if set.is_empty() {
            return self.get_standard(id).await;
        }
        Ok(self
            .standards()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, return_after())
            .await?)
    }

    async fn delete_standard(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.standards().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let expires_at = BsonDateTime::from_chrono(expires_at);
        let fresh = doc! { "_id": key, "holder": holder, "expires_at": expires_at };

        match self.leases().insert_one(fresh, None).await {
            Ok(_) => Ok(true),
            Err(e) => match StoreError::from(e) {
                // Held: take it over if it has expired or is already ours.
                StoreError::Duplicate(_) => {
                    let taken = self
                        .leases()
                        .find_one_and_update(
                            doc! {
                                "_id": key,
                                "$or": [
                                    { "expires_at": { "$lte": BsonDateTime::from_chrono(now) } },
                                    { "holder": holder },
                                ],
                            },
                            doc! { "$set": { "holder": holder, "expires_at": expires_at } },
                            None,
                        )
                        .await?;
                    Ok(taken.is_some())
                }
                other => Err(other),
            },
        }
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<(), StoreError> {
        self.leases()
            .delete_one(doc! { "_id": key, "holder": holder }, None)
            .await?;
        Ok(())
    }
}
