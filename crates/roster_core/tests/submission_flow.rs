use roster_core::db::open_db_in_memory;
use roster_core::{
    DedupKey, Identity, IdentityRepository, MailgunConfig, MailgunNotifier, NotificationPayload,
    Notifier, NotifyResult, RepoResult, SqliteIdentityRepository, StatusLevel, SubmissionOutcome,
    SubmissionRequest, SubmissionService, WorkflowConfig,
};
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mailgun_config(api_base: &str) -> MailgunConfig {
    MailgunConfig {
        domain: "mg.example.com".to_string(),
        api_key: "key-test-123".to_string(),
        recipients: vec!["ops@example.com".to_string()],
        api_base: api_base.to_string(),
    }
}

async fn mount_provider(server: &MockServer, status: u16, body: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v3/mg.example.com/messages"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(calls)
        .mount(server)
        .await;
}

async fn sent_forms(server: &MockServer) -> Vec<HashMap<String, String>> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| url::form_urlencoded::parse(&request.body).into_owned().collect())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn new_name_succeeds_and_repeat_is_duplicate() {
    let server = MockServer::start().await;
    mount_provider(&server, 200, "Queued", 1).await;
    let config = mailgun_config(&server.uri());

    let (first, second, stored) = tokio::task::spawn_blocking(move || {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();
        let notifier = MailgunNotifier::new(config).unwrap();
        let service = SubmissionService::new(&repo, notifier, WorkflowConfig::default());

        let first = service.submit(&SubmissionRequest::new("Ana", None)).unwrap();
        let second = service.submit(&SubmissionRequest::new("Ana", None)).unwrap();
        let stored = (repo.find_by_key("Ana").unwrap(), repo.list_all().unwrap());
        (first, second, stored)
    })
    .await
    .unwrap();

    assert!(matches!(&first, SubmissionOutcome::Success(identity) if identity.name == "Ana"));
    assert_eq!(first.status_message().level, StatusLevel::Success);

    assert_eq!(
        second,
        SubmissionOutcome::Duplicate {
            key: "Ana".to_string()
        }
    );
    assert!(second.status_message().text.contains("already exists"));

    let (found, all) = stored;
    assert_eq!(found.unwrap().name, "Ana");
    assert_eq!(all.len(), 1);

    let forms = sent_forms(&server).await;
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["to"], "ops@example.com");
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_failure_keeps_record_and_surfaces_status_and_body() {
    let server = MockServer::start().await;
    mount_provider(&server, 500, "quota exceeded", 1).await;
    let config = mailgun_config(&server.uri());

    let (outcome, found) = tokio::task::spawn_blocking(move || {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();
        let workflow = WorkflowConfig { require_email: true };
        let notifier = MailgunNotifier::new(config).unwrap();
        let service = SubmissionService::new(&repo, notifier, workflow);

        let outcome = service
            .submit(&SubmissionRequest::new(
                "Bia",
                Some("bia@x.com".to_string()),
            ))
            .unwrap();
        (outcome, repo.find_by_key("Bia").unwrap())
    })
    .await
    .unwrap();

    assert!(matches!(
        &outcome,
        SubmissionOutcome::PersistedButNotNotified { .. }
    ));
    let message = outcome.status_message();
    assert!(message.text.contains("500"));
    assert!(message.text.contains("quota exceeded"));

    let found = found.unwrap();
    assert_eq!(found.name, "Bia");
    assert_eq!(found.email.as_deref(), Some("bia@x.com"));

    let forms = sent_forms(&server).await;
    assert_eq!(forms[0]["to"], "ops@example.com,bia@x.com");
}

/// Store whose lookup always misses, as if another writer inserted between
/// the check and the write.
struct StaleLookup<'a>(SqliteIdentityRepository<'a>);

impl IdentityRepository for StaleLookup<'_> {
    fn dedup_key(&self) -> DedupKey {
        self.0.dedup_key()
    }

    fn find_by_key(&self, _key: &str) -> RepoResult<Option<Identity>> {
        Ok(None)
    }

    fn insert(&self, identity: &Identity) -> RepoResult<Identity> {
        self.0.insert(identity)
    }

    fn list_all(&self) -> RepoResult<Vec<Identity>> {
        self.0.list_all()
    }
}

struct UnreachableNotifier;

impl Notifier for UnreachableNotifier {
    fn notify(&self, _payload: &NotificationPayload) -> NotifyResult<()> {
        panic!("notifier must not be called for a duplicate");
    }
}

#[test]
fn unique_constraint_catches_a_lost_check_then_insert_race() {
    let conn = open_db_in_memory().unwrap();
    SqliteIdentityRepository::try_new(&conn, DedupKey::Name)
        .unwrap()
        .insert(&Identity::new("Ana", None))
        .unwrap();

    let repo = StaleLookup(SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap());
    let service = SubmissionService::new(repo, UnreachableNotifier, WorkflowConfig::default());

    let outcome = service.submit(&SubmissionRequest::new("Ana", None)).unwrap();
    assert_eq!(
        outcome,
        SubmissionOutcome::Duplicate {
            key: "Ana".to_string()
        }
    );
    assert_eq!(service.list_identities().unwrap().len(), 1);
}
