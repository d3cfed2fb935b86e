//! Lifecycle behaviour of `VexenContainer`, driven through an instrumented
//! factory that records every construction and release.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vexen::auth::AuthConfig;
use vexen::identity::{IdentityConfig, InMemoryUserRepository};
use vexen::rbac::RbacConfig;
use vexen::{
    ContainerError, ContainerState, IdentityHandle, LifecycleError, ScopeError, Subsystem,
    SubsystemFactory, SubsystemKind, VexenConfig, VexenContainer,
};
use vexen_core::UserRepository;

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct FakeHandle {
    kind: SubsystemKind,
    log: Log,
    fail_shutdown: bool,
}

#[async_trait]
impl Subsystem for FakeHandle {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("release {}", self.kind));
        if self.fail_shutdown {
            anyhow::bail!("{} refused to shut down", self.kind);
        }
        Ok(())
    }
}

struct FakeIdentity {
    handle: FakeHandle,
    active: Arc<AtomicBool>,
    users: Arc<dyn UserRepository>,
}

impl std::fmt::Debug for FakeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeIdentity")
            .field("handle", &self.handle)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Subsystem for FakeIdentity {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.active.store(false, Ordering::SeqCst);
        self.handle.shutdown().await
    }
}

impl IdentityHandle for FakeIdentity {
    fn repository(&self) -> Arc<dyn UserRepository> {
        Arc::clone(&self.users)
    }
}

#[derive(Default)]
struct FakeFactory {
    log: Log,
    identity_active: Arc<AtomicBool>,
    fail_construct: Option<SubsystemKind>,
    fail_shutdown: HashSet<SubsystemKind>,
}

impl FakeFactory {
    fn failing_construct(kind: SubsystemKind) -> Self {
        Self {
            fail_construct: Some(kind),
            ..Self::default()
        }
    }

    fn failing_shutdown(kinds: &[SubsystemKind]) -> Self {
        Self {
            fail_shutdown: kinds.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn construct(&self, kind: SubsystemKind) -> anyhow::Result<FakeHandle> {
        self.log.lock().unwrap().push(format!("construct {kind}"));
        if self.fail_construct == Some(kind) {
            anyhow::bail!("{kind} backend unreachable");
        }
        Ok(FakeHandle {
            kind,
            log: Arc::clone(&self.log),
            fail_shutdown: self.fail_shutdown.contains(&kind),
        })
    }
}

#[async_trait]
impl SubsystemFactory for FakeFactory {
    type Identity = FakeIdentity;
    type Authorization = FakeHandle;
    type Authentication = FakeHandle;

    async fn identity(&self, _config: IdentityConfig) -> anyhow::Result<FakeIdentity> {
        let handle = self.construct(SubsystemKind::Identity)?;
        self.identity_active.store(true, Ordering::SeqCst);
        Ok(FakeIdentity {
            handle,
            active: Arc::clone(&self.identity_active),
            users: Arc::new(InMemoryUserRepository::new()),
        })
    }

    async fn authorization(&self, _config: RbacConfig) -> anyhow::Result<FakeHandle> {
        self.construct(SubsystemKind::Authorization)
    }

    async fn authentication(
        &self,
        _config: AuthConfig,
        _users: Arc<dyn UserRepository>,
    ) -> anyhow::Result<FakeHandle> {
        let active = self.identity_active.load(Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("authentication sees identity active: {active}"));
        self.construct(SubsystemKind::Authentication)
    }
}

fn config() -> VexenConfig {
    VexenConfig::new("memory://lifecycle", "lifecycle-secret")
}

fn container(factory: FakeFactory) -> (VexenContainer<FakeFactory>, Log) {
    let log = Arc::clone(&factory.log);
    (VexenContainer::with_factory(config(), factory), log)
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn init_makes_every_subsystem_available() {
    let (mut container, _) = container(FakeFactory::default());
    container.init().await.unwrap();

    assert_eq!(container.state(), ContainerState::Ready);
    assert!(container.identity().is_ok());
    assert!(container.authorization().is_ok());
    assert!(container.authentication().is_ok());

    container.close().await.unwrap();
}

#[tokio::test]
async fn construction_follows_dependency_order() {
    let (mut container, log) = container(FakeFactory::default());
    container.init().await.unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "construct identity",
            "construct authorization",
            "authentication sees identity active: true",
            "construct authentication",
        ]
    );
    container.close().await.unwrap();
}

#[tokio::test]
async fn close_releases_in_reverse_order() {
    let (mut container, log) = container(FakeFactory::default());
    container.init().await.unwrap();
    log.lock().unwrap().clear();

    container.close().await.unwrap();

    assert_eq!(
        entries(&log),
        vec!["release authentication", "release authorization", "release identity"]
    );
    assert_eq!(container.state(), ContainerState::Closed);
}

#[tokio::test]
async fn authorization_failure_rolls_back_identity() {
    let (mut container, log) = container(FakeFactory::failing_construct(SubsystemKind::Authorization));

    let err = container.init().await.unwrap_err();
    let ContainerError::Init(init) = err else {
        panic!("expected an init error, got {err:?}");
    };
    assert_eq!(init.step, SubsystemKind::Authorization);
    assert!(init.rollback.is_empty());
    assert!(init.to_string().contains("authorization"));

    assert_eq!(
        entries(&log),
        vec!["construct identity", "construct authorization", "release identity"]
    );
    assert_eq!(container.state(), ContainerState::Closed);
    assert!(container.identity().is_err());
}

#[tokio::test]
async fn rollback_failures_are_reported_with_the_init_error() {
    let factory = FakeFactory {
        fail_construct: Some(SubsystemKind::Authentication),
        fail_shutdown: [SubsystemKind::Identity].into_iter().collect(),
        ..FakeFactory::default()
    };
    let (mut container, log) = container(factory);

    let ContainerError::Init(init) = container.init().await.unwrap_err() else {
        panic!("expected an init error");
    };
    assert_eq!(init.step, SubsystemKind::Authentication);
    assert_eq!(init.rollback.len(), 1);
    assert_eq!(init.rollback[0].subsystem, SubsystemKind::Identity);
    assert!(entries(&log).ends_with(&[
        "release authorization".to_string(),
        "release identity".to_string()
    ]));
}

#[tokio::test]
async fn close_without_init_is_a_no_op() {
    let (mut container, log) = container(FakeFactory::default());
    container.close().await.unwrap();
    assert!(entries(&log).is_empty());
    assert_eq!(container.state(), ContainerState::Uninitialized);

    container.init().await.unwrap();
    assert_eq!(container.state(), ContainerState::Ready);
    container.close().await.unwrap();
    assert_eq!(container.state(), ContainerState::Closed);
}

#[tokio::test]
async fn second_close_is_a_no_op() {
    let (mut container, log) = container(FakeFactory::default());
    container.init().await.unwrap();
    container.close().await.unwrap();
    let after_first = entries(&log).len();

    container.close().await.unwrap();
    assert_eq!(entries(&log).len(), after_first);
}

#[tokio::test]
async fn teardown_attempts_every_release_and_reports_all_failures() {
    let (mut container, log) = container(FakeFactory::failing_shutdown(&[
        SubsystemKind::Authorization,
        SubsystemKind::Identity,
    ]));
    container.init().await.unwrap();

    let err = container.close().await.unwrap_err();
    assert_eq!(
        err.subsystems(),
        vec![SubsystemKind::Authorization, SubsystemKind::Identity]
    );
    let rendered = err.to_string();
    assert!(rendered.contains("authorization"));
    assert!(rendered.contains("identity"));
    assert!(entries(&log).contains(&"release authentication".to_string()));
    assert_eq!(container.state(), ContainerState::Closed);
}

#[tokio::test]
async fn scope_releases_everything_when_the_body_fails() {
    let (mut container, log) = container(FakeFactory::default());

    let err = container
        .scope(async |c| {
            assert!(c.authentication().is_ok());
            Err::<(), _>("unrelated failure")
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ScopeError::Body("unrelated failure")));
    let released: Vec<_> = entries(&log)
        .into_iter()
        .filter(|e| e.starts_with("release"))
        .collect();
    assert_eq!(
        released,
        vec!["release authentication", "release authorization", "release identity"]
    );
    assert_eq!(container.state(), ContainerState::Closed);
}

#[tokio::test]
async fn scope_returns_the_body_value() {
    let (mut container, _) = container(FakeFactory::default());
    let value = container
        .scope(async |c| Ok::<_, std::convert::Infallible>(c.state()))
        .await
        .unwrap();
    assert_eq!(value, ContainerState::Ready);
}

#[tokio::test]
async fn scope_reports_body_and_teardown_failures_together() {
    let (mut container, _) = container(FakeFactory::failing_shutdown(&[SubsystemKind::Identity]));
    let err = container
        .scope(async |_| Err::<(), _>("body broke"))
        .await
        .unwrap_err();

    assert_eq!(err.body(), Some(&"body broke"));
    assert_eq!(
        err.teardown().map(|t| t.subsystems()),
        Some(vec![SubsystemKind::Identity])
    );
}

#[tokio::test]
async fn scope_skips_the_body_when_init_fails() {
    let (mut container, _) = container(FakeFactory::failing_construct(SubsystemKind::Identity));
    let ran = AtomicBool::new(false);

    let err = container
        .scope(async |_| {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, std::convert::Infallible>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ScopeError::Init(ContainerError::Init(_))));
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn accessors_fail_before_init() {
    let (container, _) = container(FakeFactory::default());
    let err = container.authentication().unwrap_err();
    assert_eq!(err.subsystem, SubsystemKind::Authentication);
    assert_eq!(err.state, ContainerState::Uninitialized);
}

#[tokio::test]
async fn accessors_fail_after_close() {
    let (mut container, _) = container(FakeFactory::default());
    container.init().await.unwrap();
    container.close().await.unwrap();
    assert_eq!(container.identity().unwrap_err().state, ContainerState::Closed);
}

#[tokio::test]
async fn init_is_rejected_when_ready_or_closed() {
    let (mut container, log) = container(FakeFactory::default());
    container.init().await.unwrap();
    assert!(matches!(
        container.init().await,
        Err(ContainerError::Lifecycle(LifecycleError::AlreadyInitialized))
    ));

    container.close().await.unwrap();
    let constructed = entries(&log).len();
    assert!(matches!(
        container.init().await,
        Err(ContainerError::Lifecycle(LifecycleError::Closed))
    ));
    assert_eq!(entries(&log).len(), constructed);
}

#[tokio::test]
async fn invalid_configuration_fails_before_any_construction() {
    let factory = FakeFactory::default();
    let log = Arc::clone(&factory.log);
    let mut container = VexenContainer::with_factory(config().with_algorithm("SHA256"), factory);

    assert!(matches!(
        container.init().await,
        Err(ContainerError::Config(_))
    ));
    assert!(entries(&log).is_empty());
    assert_eq!(container.state(), ContainerState::Closed);
}
