use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use docvault::application::access::{AccessChecker, DocumentAccessPolicy};
use docvault::application::ports::cache_port::CacheClient;
use docvault::application::ports::document_repository::{
    DocumentError, DocumentReader, DocumentWriter,
};
use docvault::application::ports::session_port::SessionResolver;
use docvault::application::services::documents::{DocumentService, DocumentServiceSettings};
use docvault::domain::documents::document::{
    Document, NewDocument, Payload, PayloadKind, SubmittedPayload,
};
use docvault::domain::documents::filter::{AttributeValue, DocumentColumn, ListFilter};
use docvault::domain::users::identity::Identity;
use docvault::infrastructure::cache::MemoryCache;

// --- fakes ---

#[derive(Default)]
struct StoreCalls {
    list: AtomicUsize,
    get: AtomicUsize,
    payload: AtomicUsize,
}

struct FakeStore {
    users: Vec<Identity>,
    rows: Mutex<HashMap<Uuid, (Document, Payload)>>,
    calls: StoreCalls,
}

impl FakeStore {
    fn new(users: &[Identity]) -> Self {
        Self {
            users: users.to_vec(),
            rows: Mutex::new(HashMap::new()),
            calls: StoreCalls::default(),
        }
    }

    fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst)
    }
}

fn matches_attribute(doc: &Document, column: DocumentColumn, value: &AttributeValue) -> bool {
    match (column, value) {
        (DocumentColumn::Id, AttributeValue::Id(id)) => doc.id == *id,
        (DocumentColumn::Name, AttributeValue::Text(s)) => doc.name == *s,
        (DocumentColumn::Mime, AttributeValue::Text(s)) => doc.mime == *s,
        (DocumentColumn::IsFile, AttributeValue::Bool(b)) => doc.is_file == *b,
        (DocumentColumn::IsPublic, AttributeValue::Bool(b)) => doc.is_public == *b,
        _ => false,
    }
}

#[async_trait]
impl DocumentReader for FakeStore {
    async fn list_readable(
        &self,
        requester: &Identity,
        filter: &ListFilter,
    ) -> anyhow::Result<Vec<Document>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().await;
        let mut docs: Vec<Document> = rows
            .values()
            .map(|(d, _)| d.clone())
            .filter(|d| DocumentAccessPolicy.can_read(requester, d))
            .filter(|d| filter.owner_login.as_ref().is_none_or(|o| d.owner == *o))
            .filter(|d| {
                filter
                    .attribute
                    .as_ref()
                    .is_none_or(|a| matches_attribute(d, a.column, &a.value))
            })
            .collect();
        docs.sort_by(|a, b| (&a.name, a.created_at).cmp(&(&b.name, b.created_at)));
        if let Some(limit) = filter.limit {
            docs.truncate(limit as usize);
        }
        Ok(docs)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Document>> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().await.get(&id).map(|(d, _)| d.clone()))
    }

    async fn get_payload(&self, id: Uuid, kind: PayloadKind) -> anyhow::Result<Option<Payload>> {
        self.calls.payload.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .await
            .get(&id)
            .map(|(_, p)| p.clone())
            .filter(|p| p.kind() == kind))
    }
}

#[async_trait]
impl DocumentWriter for FakeStore {
    async fn create(&self, doc: &Document, payload: &Payload) -> Result<(), DocumentError> {
        for login in &doc.grant {
            if !self.users.iter().any(|u| u.login == *login) {
                return Err(DocumentError::Validation(format!("unknown grantee: {login}")));
            }
        }
        self.rows
            .lock()
            .await
            .insert(doc.id, (doc.clone(), payload.clone()));
        Ok(())
    }

    async fn delete(
        &self,
        requester: &Identity,
        id: Uuid,
        access: &dyn AccessChecker,
    ) -> Result<(), DocumentError> {
        let mut rows = self.rows.lock().await;
        let (doc, _) = rows.get(&id).ok_or(DocumentError::NotFound)?;
        if !access.can_delete(requester, doc) {
            return Err(DocumentError::AccessDenied);
        }
        rows.remove(&id);
        Ok(())
    }
}

struct FakeSessions(HashMap<String, Identity>);

#[async_trait]
impl SessionResolver for FakeSessions {
    async fn resolve_identity(&self, token: &str) -> anyhow::Result<Option<Identity>> {
        Ok(self.0.get(token).cloned())
    }
}

struct BrokenCache;

#[async_trait]
impl CacheClient for BrokenCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        anyhow::bail!("connection refused")
    }
    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
    async fn delete(&self, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
    async fn delete_by_prefix(&self, _prefix: &str) -> anyhow::Result<u64> {
        anyhow::bail!("connection refused")
    }
}

struct StalledCache;

#[async_trait]
impl CacheClient for StalledCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
    async fn delete(&self, _key: &str) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
    async fn delete_by_prefix(&self, _prefix: &str) -> anyhow::Result<u64> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(0)
    }
}

// --- harness ---

const ALICE: &str = "tok-alice";
const BOB: &str = "tok-bob";
const CAROL: &str = "tok-carol";

struct Harness {
    service: DocumentService,
    store: Arc<FakeStore>,
}

fn identity(login: &str) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        login: login.into(),
    }
}

fn harness_with(cache: Arc<dyn CacheClient>) -> Harness {
    let users = [identity("alice"), identity("bob"), identity("carol")];
    let store = Arc::new(FakeStore::new(&users));
    let sessions: HashMap<String, Identity> = [ALICE, BOB, CAROL]
        .into_iter()
        .map(str::to_string)
        .zip(users.iter().cloned())
        .collect();
    let service = DocumentService::new(
        store.clone(),
        store.clone(),
        Arc::new(DocumentAccessPolicy),
        Arc::new(FakeSessions(sessions)),
        cache,
        DocumentServiceSettings::default(),
    );
    Harness { service, store }
}

fn harness() -> Harness {
    harness_with(Arc::new(MemoryCache::new()))
}

fn json_doc(name: &str, is_public: bool, grant: &[&str]) -> NewDocument {
    NewDocument {
        name: name.into(),
        is_public,
        grant: grant.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn json_payload(text: &str) -> SubmittedPayload {
    SubmittedPayload {
        json: Some(text.into()),
        file: None,
    }
}

// --- tests ---

#[tokio::test]
async fn report_shared_with_bob() {
    let h = harness();
    let doc = h
        .service
        .create(ALICE, json_doc("report", false, &["bob"]), json_payload(r#"{"x":1}"#))
        .await
        .unwrap();
    assert_eq!(doc.owner, "alice");
    assert_eq!(doc.grant, vec!["bob".to_string()]);

    let (_, payload) = h.service.get_by_id(BOB, doc.id).await.unwrap();
    assert_eq!(payload, Payload::Json(r#"{"x":1}"#.into()));

    let carol = h.service.get_by_id(CAROL, doc.id).await.unwrap_err();
    assert!(matches!(carol, DocumentError::AccessDenied));

    let bob_delete = h.service.delete(BOB, doc.id).await.unwrap_err();
    assert!(matches!(bob_delete, DocumentError::AccessDenied));

    h.service.delete(ALICE, doc.id).await.unwrap();
    let gone = h.service.get_by_id(ALICE, doc.id).await.unwrap_err();
    assert!(matches!(gone, DocumentError::NotFound));
}

#[tokio::test]
async fn create_then_get_round_trips_exactly() {
    let h = harness();
    let text = "{ \"x\" : [1, 2.50, \"é\"] }";
    let created = h
        .service
        .create(ALICE, json_doc("spaced", false, &["carol", "bob"]), json_payload(text))
        .await
        .unwrap();

    let (doc, payload) = h.service.get_by_id(ALICE, created.id).await.unwrap();
    assert_eq!(doc, created);
    assert_eq!(doc.grant, vec!["carol".to_string(), "bob".to_string()]);
    assert_eq!(payload.as_bytes(), text.as_bytes());

    let bytes = vec![0u8, 159, 146, 150, 255];
    let file = h
        .service
        .create(
            ALICE,
            NewDocument {
                name: "blob.bin".into(),
                mime: "application/x-test".into(),
                is_file: true,
                ..Default::default()
            },
            SubmittedPayload {
                file: Some(bytes.clone()),
                json: None,
            },
        )
        .await
        .unwrap();
    let (doc, payload) = h.service.get_by_id(ALICE, file.id).await.unwrap();
    assert_eq!(doc.mime, "application/x-test");
    assert_eq!(payload, Payload::File(bytes));
}

#[tokio::test]
async fn cached_metadata_is_rechecked_per_requester() {
    let h = harness();
    let doc = h
        .service
        .create(ALICE, json_doc("private", false, &["bob"]), json_payload("{}"))
        .await
        .unwrap();

    h.service.get_by_id(BOB, doc.id).await.unwrap();
    assert_eq!(h.store.get_calls(), 1);

    // served from the doc entry, still denied
    let err = h.service.get_by_id(CAROL, doc.id).await.unwrap_err();
    assert!(matches!(err, DocumentError::AccessDenied));
    assert_eq!(h.store.get_calls(), 1);
}

#[tokio::test]
async fn delete_clears_the_actors_cached_views() {
    let h = harness();
    let doc = h
        .service
        .create(ALICE, json_doc("notes", true, &[]), json_payload("[]"))
        .await
        .unwrap();

    let listed = h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    h.service.get_by_id(ALICE, doc.id).await.unwrap();
    h.service.get_by_id(BOB, doc.id).await.unwrap();

    h.service.delete(ALICE, doc.id).await.unwrap();

    let err = h.service.get_by_id(ALICE, doc.id).await.unwrap_err();
    assert!(matches!(err, DocumentError::NotFound));
    let err = h.service.get_by_id(BOB, doc.id).await.unwrap_err();
    assert!(matches!(err, DocumentError::NotFound));
    assert!(h.service.list(ALICE, &ListFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn repeated_list_is_served_from_cache() {
    let h = harness();
    h.service
        .create(ALICE, json_doc("a", false, &[]), json_payload("1"))
        .await
        .unwrap();

    let filter = ListFilter::from_raw(Some("alice"), None, None, Some(10)).unwrap();
    let first = h.service.list(ALICE, &filter).await.unwrap();
    let second = h.service.list(ALICE, &filter).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.store.list_calls(), 1);

    // a different filter is a different key
    h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(h.store.list_calls(), 2);
}

#[tokio::test]
async fn own_mutation_refreshes_own_lists() {
    let h = harness();
    assert!(h.service.list(ALICE, &ListFilter::default()).await.unwrap().is_empty());
    h.service
        .create(ALICE, json_doc("fresh", false, &[]), json_payload("true"))
        .await
        .unwrap();
    let docs = h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(h.store.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn grantee_list_stays_stale_until_ttl() {
    let h = harness();
    assert!(h.service.list(BOB, &ListFilter::default()).await.unwrap().is_empty());

    let doc = h
        .service
        .create(ALICE, json_doc("shared", false, &["bob"]), json_payload("{}"))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(299)).await;
    assert!(h.service.list(BOB, &ListFilter::default()).await.unwrap().is_empty());
    assert_eq!(h.store.list_calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    let docs = h.service.list(BOB, &ListFilter::default()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, doc.id);
}

#[tokio::test]
async fn list_honours_filters_and_order() {
    let h = harness();
    for (name, public) in [("zeta", true), ("alpha", false), ("mid", true)] {
        h.service
            .create(ALICE, json_doc(name, public, &[]), json_payload("0"))
            .await
            .unwrap();
    }
    h.service
        .create(BOB, json_doc("bobs", false, &["alice"]), json_payload("0"))
        .await
        .unwrap();

    let all = h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["alpha", "bobs", "mid", "zeta"]);

    let public = ListFilter::from_raw(None, Some("public"), Some("true"), None).unwrap();
    let carol_sees = h.service.list(CAROL, &public).await.unwrap();
    assert_eq!(carol_sees.len(), 2);

    let by_bob = ListFilter::from_raw(Some("bob"), None, None, None).unwrap();
    let docs = h.service.list(ALICE, &by_bob).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].owner, "bob");

    let limited = ListFilter::from_raw(None, None, None, Some(2)).unwrap();
    assert_eq!(h.service.list(ALICE, &limited).await.unwrap().len(), 2);
}

#[tokio::test]
async fn broken_cache_falls_back_to_store() {
    let h = harness_with(Arc::new(BrokenCache));
    let doc = h
        .service
        .create(ALICE, json_doc("report", false, &[]), json_payload("{}"))
        .await
        .unwrap();

    h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(h.store.list_calls(), 2);

    h.service.get_by_id(ALICE, doc.id).await.unwrap();
    h.service.delete(ALICE, doc.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stalled_cache_counts_as_miss() {
    let h = harness_with(Arc::new(StalledCache));
    h.service
        .create(ALICE, json_doc("report", false, &[]), json_payload("{}"))
        .await
        .unwrap();
    let docs = h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let h = harness();
    let err = h
        .service
        .create(ALICE, json_doc("bad", false, &[]), json_payload("{not json"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Validation(_)));

    let err = h
        .service
        .create(
            ALICE,
            NewDocument {
                name: "upload".into(),
                is_file: true,
                ..Default::default()
            },
            SubmittedPayload::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Validation(_)));

    let err = h
        .service
        .create(ALICE, json_doc("x", false, &["mallory"]), json_payload("{}"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Validation(_)));
    assert!(h.service.list(ALICE, &ListFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_tokens_are_unauthenticated() {
    let h = harness();
    let err = h
        .service
        .list("nobody", &ListFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Unauthenticated));

    let err = h.service.get_by_id("", Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DocumentError::Unauthenticated));
    assert_eq!(h.store.list_calls(), 0);
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let h = harness();
    let err = h.service.get_by_id(ALICE, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DocumentError::NotFound));
    let err = h.service.delete(ALICE, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DocumentError::NotFound));
}

#[tokio::test]
async fn padded_metadata_round_trips_unchanged() {
    let h = harness();
    let created = h
        .service
        .create(
            ALICE,
            json_doc(" report ", false, &["bob", "carol"]),
            json_payload(r#"{"x":1}"#),
        )
        .await
        .unwrap();
    assert_eq!(created.name, " report ");

    let (doc, _) = h.service.get_by_id(ALICE, created.id).await.unwrap();
    assert_eq!(doc.name, " report ");
    assert_eq!(doc.grant, vec!["bob".to_string(), "carol".to_string()]);
    assert_eq!(doc, created);
}

#[tokio::test]
async fn json_document_keeps_submitted_mime() {
    let h = harness();
    let mut meta = json_doc("typed", false, &[]);
    meta.mime = "application/json".into();
    let created = h
        .service
        .create(ALICE, meta, json_payload("{}"))
        .await
        .unwrap();
    let (doc, payload) = h.service.get_by_id(ALICE, created.id).await.unwrap();
    assert_eq!(doc.mime, "application/json");
    assert_eq!(payload, Payload::Json("{}".into()));
}

#[tokio::test]
async fn racing_deletes_succeed_once() {
    let h = harness();
    let doc = h
        .service
        .create(ALICE, json_doc("once", false, &[]), json_payload("{}"))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        h.service.delete(ALICE, doc.id),
        h.service.delete(ALICE, doc.id)
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(DocumentError::NotFound)))
    );
}

#[tokio::test]
async fn failed_create_leaves_cached_lists_alone() {
    let h = harness();
    h.service
        .create(ALICE, json_doc("kept", false, &[]), json_payload("{}"))
        .await
        .unwrap();
    let before = h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(h.store.list_calls(), 1);

    // rejected by the store
    let err = h
        .service
        .create(ALICE, json_doc("ghost", false, &["mallory"]), json_payload("{}"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Validation(_)));
    // rejected before reaching the store
    let err = h
        .service
        .create(ALICE, json_doc("broken", false, &[]), json_payload("{oops"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Validation(_)));

    let after = h.service.list(ALICE, &ListFilter::default()).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(h.store.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn document_entry_expires_after_ten_minutes() {
    let h = harness();
    let doc = h
        .service
        .create(ALICE, json_doc("timed", false, &[]), json_payload("{}"))
        .await
        .unwrap();

    h.service.get_by_id(ALICE, doc.id).await.unwrap();
    assert_eq!(h.store.get_calls(), 1);

    tokio::time::advance(Duration::from_secs(599)).await;
    h.service.get_by_id(ALICE, doc.id).await.unwrap();
    assert_eq!(h.store.get_calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    h.service.get_by_id(ALICE, doc.id).await.unwrap();
    assert_eq!(h.store.get_calls(), 2);
}
