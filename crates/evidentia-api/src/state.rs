//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every tenant-owned record lives in a [`Store`] keyed by id. Lookups go
//! through [`Store::get_in`] and [`Store::list_in`], which never return a
//! record owned by another tenant. The audit trail is a separate
//! append-only structure, [`AuditTrail`], that has no update or remove
//! operations at all.
//!
//! When `DATABASE_URL` is set, handlers write through to Postgres and the
//! stores are hydrated from it at startup (see [`AppState::hydrate_from_db`]).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::OwnedMutexGuard;
use utoipa::ToSchema;
use uuid::Uuid;

use evidentia_core::{
    AuditAction, EmployeeBand, EvidenceSource, Frequency, Industry, RegulatoryFramework,
    RequirementCategory, ResourceType, Role,
};
use evidentia_state::audit_chain::{self, chain_hash};
use evidentia_state::{
    derive_status, days_until_due, CatalogError, ChainIntegrity, ChainLink, EvidenceStatus,
    ReportStatus, ReportType, RequirementStatus, Subscription, TemplateCatalog, GENESIS_HASH,
};

use crate::blob::{BlobError, BlobSigner};
use crate::config::AppConfig;

// -- Generic In-Memory Store --------------------------------------------------

/// Records owned by exactly one tenant.
pub trait TenantOwned {
    /// Owning tenant.
    fn tenant_id(&self) -> Uuid;
}

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Records matching a predicate.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &Uuid, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync + TenantOwned> Store<T> {
    /// Retrieve a record only if the tenant owns it.
    pub fn get_in(&self, tenant_id: Uuid, id: &Uuid) -> Option<T> {
        self.data
            .read()
            .get(id)
            .filter(|r| r.tenant_id() == tenant_id)
            .cloned()
    }

    /// All records of one tenant.
    pub fn list_in(&self, tenant_id: Uuid) -> Vec<T> {
        self.filter(|r| r.tenant_id() == tenant_id)
    }

    /// Atomically read-validate-update a record of the owning tenant. The
    /// closure runs under the store's write lock. A record of another
    /// tenant behaves as absent.
    pub fn try_update_in<R, E>(
        &self,
        tenant_id: Uuid,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data
            .write()
            .get_mut(id)
            .filter(|r| r.tenant_id() == tenant_id)
            .map(f)
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Write Serialization ------------------------------------------------------

/// One async mutex per key, created on first use.
///
/// Handlers that read several records, write Postgres and then update
/// memory hold the key's guard for the whole sequence. The guard is a
/// `tokio` mutex because it is held across `.await`.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Arc<Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>>,
}

impl<K> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());
        lock.lock_owned().await
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! tenant_owned {
    ($($ty:ty => $field:ident),+ $(,)?) => {
        $(impl TenantOwned for $ty {
            fn tenant_id(&self) -> Uuid {
                self.$field
            }
        })+
    };
}

// -- Tenant Directory ---------------------------------------------------------

/// Tenant root.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationRecord {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "financial_services")]
    pub industry: Industry,
    #[schema(value_type = String, example = "1-10")]
    pub employee_count: EmployeeBand,
    #[schema(value_type = String, example = "sec_ria")]
    pub regulatory_framework: RegulatoryFramework,
    pub website: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Object)]
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

/// Account status of a tenant member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Can sign in and occupies a seat.
    Active,
    /// Registered, e-mail not yet verified.
    Pending,
    /// Soft-deleted.
    Inactive,
}

impl UserStatus {
    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Inactive => "inactive",
        }
    }

    /// Parse a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Tenant member.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRecord {
    /// Identity-provider subject.
    pub id: Uuid,
    #[serde(rename = "organization_id")]
    pub tenant_id: Uuid,
    pub email: String,
    pub full_name: String,
    #[schema(value_type = String, example = "compliance_officer")]
    pub role: Role,
    pub status: UserStatus,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Invitation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationStatus {
    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Parse a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Invitation to join a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvitationRecord {
    pub id: Uuid,
    #[serde(rename = "organization_id")]
    pub tenant_id: Uuid,
    pub email: String,
    #[schema(value_type = String)]
    pub role: Role,
    pub invited_by: Uuid,
    pub message: Option<String>,
    /// Acceptance secret. Delivered out of band, never serialized.
    #[serde(skip)]
    pub token: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// -- Requirements -------------------------------------------------------------

/// A tenant's activation of a catalog template.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequirementRecord {
    pub id: Uuid,
    #[serde(rename = "organization_id")]
    pub tenant_id: Uuid,
    pub template_id: String,
    pub title: String,
    pub description: String,
    #[schema(value_type = String)]
    pub category: RequirementCategory,
    pub authority: String,
    pub evidence_types: Vec<String>,
    #[schema(value_type = String)]
    pub frequency: Frequency,
    pub next_due_date: Option<DateTime<Utc>>,
    pub last_completed_date: Option<DateTime<Utc>>,
    /// Live evidence attached. Maintained by evidence transitions.
    pub evidence_count: i64,
    pub notes: Option<String>,
    pub is_active: bool,
    pub activated_at: DateTime<Utc>,
    pub activated_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

impl RequirementRecord {
    /// Status as of `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> RequirementStatus {
        derive_status(self.evidence_count, self.next_due_date, now)
    }
}

/// A requirement with its status derived at read time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequirementView {
    #[serde(flatten)]
    pub record: RequirementRecord,
    #[schema(value_type = String, example = "compliant")]
    pub status: RequirementStatus,
    pub days_until_due: Option<i64>,
}

impl RequirementView {
    /// Derive the view as of `now`.
    pub fn at(record: RequirementRecord, now: DateTime<Utc>) -> Self {
        Self {
            status: record.status_at(now),
            days_until_due: record.next_due_date.map(|due| days_until_due(due, now)),
            record,
        }
    }
}

// -- Evidence -----------------------------------------------------------------

/// Evidence item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceRecord {
    pub id: Uuid,
    #[serde(rename = "organization_id")]
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "manual_upload")]
    pub source: EvidenceSource,
    /// When the real-world activity happened.
    pub evidence_date: Option<DateTime<Utc>>,
    /// Object locator in the blob bucket.
    pub blob_locator: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub external_link: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
    pub requirement_ids: Vec<Uuid>,
    pub uploaded_by: Uuid,
    #[schema(value_type = String, example = "active")]
    pub status: EvidenceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Reports ------------------------------------------------------------------

/// Recorded report request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportRecord {
    pub id: Uuid,
    #[serde(rename = "organization_id")]
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "comprehensive")]
    pub report_type: ReportType,
    pub requirement_ids: Vec<Uuid>,
    #[schema(value_type = String, example = "pending")]
    pub status: ReportStatus,
    pub output_locator: Option<String>,
    pub generated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

tenant_owned! {
    UserRecord => tenant_id,
    InvitationRecord => tenant_id,
    RequirementRecord => tenant_id,
    EvidenceRecord => tenant_id,
    ReportRecord => tenant_id,
}

// -- Audit Trail --------------------------------------------------------------

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    #[serde(rename = "organization_id")]
    pub tenant_id: Uuid,
    /// Position in the tenant's chain, starting at 1.
    pub sequence: i64,
    /// Server-assigned, microsecond precision.
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    #[schema(value_type = String, example = "evidence_created")]
    pub action: AuditAction,
    #[schema(value_type = String, example = "evidence")]
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub description: String,
    #[schema(value_type = Object)]
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
    pub previous_hash: String,
    pub entry_hash: String,
}

impl ChainLink for AuditLogEntry {
    fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    fn entry_hash(&self) -> &str {
        &self.entry_hash
    }

    fn payload(&self) -> String {
        serde_json::json!([
            self.id,
            self.tenant_id,
            self.sequence,
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            self.user_id,
            self.user_email,
            self.action.as_str(),
            self.resource_type.as_str(),
            self.resource_id,
            self.description,
            self.changes,
            self.ip_address,
            self.user_agent,
            self.metadata,
        ])
        .to_string()
    }
}

/// Everything about an audit entry except what the trail assigns.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub tenant_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub user_email: Option<String>,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub description: String,
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Append-only, per-tenant hash-chained log.
///
/// Appends for all tenants are serialized under one write lock so each
/// tenant's chain is linear.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    chains: Arc<RwLock<HashMap<Uuid, Vec<AuditLogEntry>>>>,
}

impl AuditTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain and append an entry.
    pub fn append(&self, draft: AuditDraft) -> AuditLogEntry {
        let mut guard = self.chains.write();
        let chain = guard.entry(draft.tenant_id).or_default();
        let previous_hash = chain
            .last()
            .map(|e| e.entry_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let sequence = chain.last().map(|e| e.sequence + 1).unwrap_or(1);

        let mut entry = AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id: draft.tenant_id,
            sequence,
            timestamp: draft.timestamp,
            user_id: draft.user_id,
            user_email: draft.user_email,
            action: draft.action,
            resource_type: draft.resource_type,
            resource_id: draft.resource_id,
            description: draft.description,
            changes: draft.changes,
            ip_address: draft.ip_address,
            user_agent: draft.user_agent,
            metadata: draft.metadata,
            previous_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = chain_hash(&entry.previous_hash, &entry.payload());
        chain.push(entry.clone());
        entry
    }

    /// Restore persisted entries. Each tenant's entries are ordered by
    /// sequence; stored hashes are kept as-is so verification can detect
    /// tampering at rest.
    pub fn restore(&self, entries: Vec<AuditLogEntry>) {
        let mut guard = self.chains.write();
        for entry in entries {
            guard.entry(entry.tenant_id).or_default().push(entry);
        }
        for chain in guard.values_mut() {
            chain.sort_by_key(|e| e.sequence);
        }
    }

    /// A tenant's entries, oldest first.
    pub fn entries(&self, tenant_id: Uuid) -> Vec<AuditLogEntry> {
        self.chains.read().get(&tenant_id).cloned().unwrap_or_default()
    }

    /// A tenant's matching entries, newest first, at most `limit`.
    pub fn query(&self, tenant_id: Uuid, pred: impl Fn(&AuditLogEntry) -> bool, limit: usize) -> Vec<AuditLogEntry> {
        self.chains
            .read()
            .get(&tenant_id)
            .map(|chain| {
                chain
                    .iter()
                    .rev()
                    .filter(|e| pred(e))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of entries for a tenant.
    pub fn count(&self, tenant_id: Uuid) -> usize {
        self.chains.read().get(&tenant_id).map_or(0, Vec::len)
    }

    /// Recompute a tenant's chain.
    pub fn verify(&self, tenant_id: Uuid) -> ChainIntegrity {
        let guard = self.chains.read();
        match guard.get(&tenant_id) {
            Some(chain) => audit_chain::verify(chain.iter()),
            None => audit_chain::verify(std::iter::empty::<&AuditLogEntry>()),
        }
    }

    #[cfg(test)]
    pub(crate) fn tamper(&self, tenant_id: Uuid, index: usize, f: impl FnOnce(&mut AuditLogEntry)) {
        if let Some(entry) = self
            .chains
            .write()
            .get_mut(&tenant_id)
            .and_then(|c| c.get_mut(index))
        {
            f(entry);
        }
    }
}

// -- Application State --------------------------------------------------------

/// Startup failures while assembling the state.
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    /// The template catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The blob signer could not be built.
    #[error("blob signer: {0}")]
    Blob(#[from] BlobError),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub organizations: Store<OrganizationRecord>,
    pub users: Store<UserRecord>,
    pub invitations: Store<InvitationRecord>,
    pub requirements: Store<RequirementRecord>,
    pub evidence: Store<EvidenceRecord>,
    pub reports: Store<ReportRecord>,
    pub audit: AuditTrail,
    /// Serializes read-check-write sequences within one tenant.
    pub tenant_locks: KeyedLocks<Uuid>,
    /// Serializes user creation across tenants, where e-mail uniqueness
    /// is checked. Taken before any tenant lock.
    pub account_lock: Arc<tokio::sync::Mutex<()>>,
    pub catalog: Arc<TemplateCatalog>,
    pub blob: BlobSigner,
    pub config: AppConfig,
    /// Postgres pool. `None` runs in-memory only.
    pub db_pool: Option<PgPool>,
    /// Prometheus recorder handle rendered at `/metrics`.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("organizations", &self.organizations.len())
            .field("users", &self.users.len())
            .field("requirements", &self.requirements.len())
            .field("evidence", &self.evidence.len())
            .field("reports", &self.reports.len())
            .field("catalog", &self.catalog.len())
            .field("config", &self.config)
            .field("db_pool", &self.db_pool.is_some())
            .finish()
    }
}

impl AppState {
    /// Build state from configuration. Loads the template catalog from
    /// `EVIDENTIA_TEMPLATE_CATALOG` when set, the built-in one otherwise.
    pub fn try_with_config(config: AppConfig) -> Result<Self, StateError> {
        let catalog = match &config.template_catalog {
            Some(path) => TemplateCatalog::from_path(path)?,
            None => TemplateCatalog::builtin()?,
        };
        Self::with_catalog(config, catalog)
    }

    /// Build state with an explicit catalog.
    pub fn with_catalog(config: AppConfig, catalog: TemplateCatalog) -> Result<Self, StateError> {
        let blob = BlobSigner::new(
            &config.blob_base_url,
            &config.blob_bucket,
            config.blob_signing_key.as_bytes(),
        )?;
        Ok(Self {
            organizations: Store::new(),
            users: Store::new(),
            invitations: Store::new(),
            requirements: Store::new(),
            evidence: Store::new(),
            reports: Store::new(),
            audit: AuditTrail::new(),
            tenant_locks: KeyedLocks::new(),
            account_lock: Arc::new(tokio::sync::Mutex::new(())),
            catalog: Arc::new(catalog),
            blob,
            config,
            db_pool: None,
            metrics: None,
        })
    }

    /// Attach a database pool for write-through persistence.
    pub fn with_db_pool(mut self, pool: Option<PgPool>) -> Self {
        self.db_pool = pool;
        self
    }

    /// Attach the Prometheus handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Active users of a tenant. Only these occupy seats.
    pub fn active_user_count(&self, tenant_id: Uuid) -> u32 {
        let n = self
            .users
            .filter(|u| u.tenant_id == tenant_id && u.status == UserStatus::Active)
            .len();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    /// Look up a user by e-mail across all tenants.
    pub fn user_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users
            .filter(|u| u.email == email)
            .into_iter()
            .next()
    }

    /// Load all persisted state into the in-memory stores.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };

        let orgs = crate::db::organizations::load_all(pool)
            .await
            .map_err(|e| format!("failed to load organizations: {e}"))?;
        let org_count = orgs.len();
        for org in orgs {
            self.organizations.insert(org.id, org);
        }

        let users = crate::db::users::load_all(pool)
            .await
            .map_err(|e| format!("failed to load users: {e}"))?;
        let user_count = users.len();
        for user in users {
            self.users.insert(user.id, user);
        }

        let invitations = crate::db::invitations::load_all(pool)
            .await
            .map_err(|e| format!("failed to load invitations: {e}"))?;
        let invitation_count = invitations.len();
        for inv in invitations {
            self.invitations.insert(inv.id, inv);
        }

        let requirements = crate::db::requirements::load_all(pool)
            .await
            .map_err(|e| format!("failed to load requirements: {e}"))?;
        let requirement_count = requirements.len();
        for req in requirements {
            self.requirements.insert(req.id, req);
        }

        let evidence = crate::db::evidence::load_all(pool)
            .await
            .map_err(|e| format!("failed to load evidence: {e}"))?;
        let evidence_count = evidence.len();
        for ev in evidence {
            self.evidence.insert(ev.id, ev);
        }

        let reports = crate::db::reports::load_all(pool)
            .await
            .map_err(|e| format!("failed to load reports: {e}"))?;
        let report_count = reports.len();
        for report in reports {
            self.reports.insert(report.id, report);
        }

        let entries = crate::db::audit::load_all(pool)
            .await
            .map_err(|e| format!("failed to load audit log: {e}"))?;
        let audit_count = entries.len();
        self.audit.restore(entries);

        tracing::info!(
            organizations = org_count,
            users = user_count,
            invitations = invitation_count,
            requirements = requirement_count,
            evidence = evidence_count,
            reports = report_count,
            audit_entries = audit_count,
            "hydrated in-memory stores from database"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(tenant_id: Uuid, action: AuditAction) -> AuditDraft {
        AuditDraft {
            tenant_id,
            timestamp: Utc::now(),
            user_id: Some(Uuid::new_v4()),
            user_email: Some("cco@acme-ria.com".into()),
            action,
            resource_type: ResourceType::Requirement,
            resource_id: Some(Uuid::new_v4()),
            description: "x".into(),
            changes: None,
            ip_address: None,
            user_agent: None,
            metadata: None,
        }
    }

    fn requirement(tenant_id: Uuid) -> RequirementRecord {
        let now = Utc::now();
        RequirementRecord {
            id: Uuid::new_v4(),
            tenant_id,
            template_id: "sec-ria-001".into(),
            title: "Code of Ethics Acknowledgment".into(),
            description: String::new(),
            category: RequirementCategory::EmployeeTraining,
            authority: "SEC Rule 204A-1".into(),
            evidence_types: vec![],
            frequency: Frequency::Ongoing,
            next_due_date: None,
            last_completed_date: None,
            evidence_count: 0,
            notes: None,
            is_active: true,
            activated_at: now,
            activated_by: Uuid::new_v4(),
            updated_at: now,
            updated_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn scoped_lookup_hides_other_tenants() {
        let store: Store<RequirementRecord> = Store::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rec = requirement(a);
        store.insert(rec.id, rec.clone());

        assert!(store.get_in(a, &rec.id).is_some());
        assert!(store.get_in(b, &rec.id).is_none());
        assert_eq!(store.list_in(a).len(), 1);
        assert!(store.list_in(b).is_empty());
        assert!(store
            .try_update_in(b, &rec.id, |r| -> Result<(), ()> {
                r.evidence_count = 99;
                Ok(())
            })
            .is_none());
        assert_eq!(store.get(&rec.id).map(|r| r.evidence_count), Some(0));
    }

    #[test]
    fn view_derives_status_on_read() {
        let now = Utc::now();
        let mut rec = requirement(Uuid::new_v4());
        assert_eq!(RequirementView::at(rec.clone(), now).status, RequirementStatus::NotStarted);
        rec.evidence_count = 1;
        assert_eq!(RequirementView::at(rec.clone(), now).status, RequirementStatus::Compliant);
        rec.next_due_date = Some(now + Duration::days(3) + Duration::hours(1));
        let view = RequirementView::at(rec, now);
        assert_eq!(view.status, RequirementStatus::AtRisk);
        assert_eq!(view.days_until_due, Some(3));
    }

    #[test]
    fn audit_chain_links_per_tenant() {
        let trail = AuditTrail::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let first = trail.append(draft(a, AuditAction::RequirementActivated));
        let second = trail.append(draft(a, AuditAction::EvidenceCreated));
        let other = trail.append(draft(b, AuditAction::Login));

        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.entry_hash);
        assert_eq!(other.previous_hash, GENESIS_HASH);
        assert_eq!((first.sequence, second.sequence, other.sequence), (1, 2, 1));

        let integrity = trail.verify(a);
        assert!(integrity.chain_valid);
        assert_eq!(integrity.total_entries, 2);
    }

    #[test]
    fn altered_entry_fails_verification() {
        let trail = AuditTrail::new();
        let t = Uuid::new_v4();
        for action in [
            AuditAction::RequirementActivated,
            AuditAction::EvidenceCreated,
            AuditAction::EvidenceDeleted,
        ] {
            trail.append(draft(t, action));
        }
        assert!(trail.verify(t).chain_valid);

        trail.tamper(t, 1, |e| e.description = "nothing happened".into());
        let integrity = trail.verify(t);
        assert!(!integrity.chain_valid);
        assert_eq!(integrity.tampered_entries, 1);
    }

    #[test]
    fn query_is_newest_first_and_limited() {
        let trail = AuditTrail::new();
        let t = Uuid::new_v4();
        trail.append(draft(t, AuditAction::Login));
        trail.append(draft(t, AuditAction::EvidenceCreated));
        trail.append(draft(t, AuditAction::Logout));

        let newest = trail.query(t, |_| true, 2);
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].action, AuditAction::Logout);
        assert_eq!(newest[1].action, AuditAction::EvidenceCreated);

        let logins = trail.query(t, |e| e.action == AuditAction::Login, 100);
        assert_eq!(logins.len(), 1);
        assert_eq!(trail.count(t), 3);
    }

    #[test]
    fn restore_keeps_sequence_order() {
        let source = AuditTrail::new();
        let t = Uuid::new_v4();
        source.append(draft(t, AuditAction::Login));
        source.append(draft(t, AuditAction::Logout));
        let mut entries = source.entries(t);
        entries.reverse();

        let restored = AuditTrail::new();
        restored.restore(entries);
        assert!(restored.verify(t).chain_valid);
        assert_eq!(restored.entries(t)[0].action, AuditAction::Login);
    }

    #[test]
    fn builtin_state_constructs() {
        let state = AppState::try_with_config(AppConfig::new("s", "k")).unwrap();
        assert!(!state.catalog.is_empty());
        assert!(state.db_pool.is_none());
        assert_eq!(state.active_user_count(Uuid::new_v4()), 0);
    }
}
