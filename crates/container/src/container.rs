//! The Vexen container: builds identity, authorization and authentication in
//! dependency order and tears them down in reverse.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::VexenConfig;
use crate::error::{
    AccessError, ContainerError, ContainerState, InitError, LifecycleError, ReleaseFailure,
    ScopeError, SubsystemKind, TeardownError,
};
use crate::factory::{IdentityHandle, Subsystem, SubsystemFactory, VexenSubsystems};

/// Owns one instance of each subsystem for the lifetime of a session.
///
/// `init` and `close` take `&mut self`; a container is driven by one task at a
/// time. Once closed (explicitly or by a failed `init`) it cannot be reused.
pub struct VexenContainer<F: SubsystemFactory = VexenSubsystems> {
    config: Arc<VexenConfig>,
    factory: F,
    state: ContainerState,
    identity: Option<Arc<F::Identity>>,
    authorization: Option<Arc<F::Authorization>>,
    authentication: Option<Arc<F::Authentication>>,
    /// Active subsystems in construction order; unwound from the back.
    active: Vec<(SubsystemKind, Arc<dyn Subsystem>)>,
}

impl<F: SubsystemFactory> core::fmt::Debug for VexenContainer<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VexenContainer")
            .field("state", &self.state)
            .field(
                "active",
                &self.active.iter().map(|(kind, _)| *kind).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl VexenContainer {
    /// A container using the workspace's own subsystems.
    pub fn new(config: VexenConfig) -> Self {
        Self::with_factory(config, VexenSubsystems)
    }
}

impl<F: SubsystemFactory> VexenContainer<F> {
    pub fn with_factory(config: VexenConfig, factory: F) -> Self {
        Self {
            config: Arc::new(config),
            factory,
            state: ContainerState::Uninitialized,
            identity: None,
            authorization: None,
            authentication: None,
            active: Vec::with_capacity(SubsystemKind::ALL.len()),
        }
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn config(&self) -> &VexenConfig {
        &self.config
    }

    pub fn identity(&self) -> Result<&F::Identity, AccessError> {
        self.available(SubsystemKind::Identity, self.identity.as_deref())
    }

    pub fn authorization(&self) -> Result<&F::Authorization, AccessError> {
        self.available(SubsystemKind::Authorization, self.authorization.as_deref())
    }

    pub fn authentication(&self) -> Result<&F::Authentication, AccessError> {
        self.available(SubsystemKind::Authentication, self.authentication.as_deref())
    }

    fn available<'a, H>(&self, subsystem: SubsystemKind, handle: Option<&'a H>) -> Result<&'a H, AccessError> {
        match (self.state, handle) {
            (ContainerState::Ready, Some(handle)) => Ok(handle),
            (state, _) => Err(AccessError { subsystem, state }),
        }
    }

    /// Validate the configuration and construct every subsystem.
    ///
    /// On failure the already-active subsystems are released in reverse order
    /// and the container is left `Closed`.
    #[instrument(name = "container_init", skip(self))]
    pub async fn init(&mut self) -> Result<(), ContainerError> {
        match self.state {
            ContainerState::Uninitialized => {}
            ContainerState::Ready => return Err(LifecycleError::AlreadyInitialized.into()),
            ContainerState::Closed => return Err(LifecycleError::Closed.into()),
        }

        if let Err(e) = self.config.validate() {
            warn!(error = %e, "configuration rejected");
            self.state = ContainerState::Closed;
            return Err(e.into());
        }

        match self.start().await {
            Ok(()) => {
                self.state = ContainerState::Ready;
                info!("container ready");
                Ok(())
            }
            Err((step, source)) => {
                error!(subsystem = %step, error = %source, "initialization failed; rolling back");
                let rollback = self.release_all().await;
                self.state = ContainerState::Closed;
                Err(InitError {
                    step,
                    source,
                    rollback,
                }
                .into())
            }
        }
    }

    async fn start(&mut self) -> Result<(), (SubsystemKind, anyhow::Error)> {
        let config = Arc::clone(&self.config);

        let identity = self
            .factory
            .identity(config.identity_config())
            .await
            .map_err(|e| (SubsystemKind::Identity, e))?;
        let identity = Arc::new(identity);
        self.activate(SubsystemKind::Identity, Arc::clone(&identity) as Arc<dyn Subsystem>);
        self.identity = Some(Arc::clone(&identity));

        let authorization = self
            .factory
            .authorization(config.rbac_config())
            .await
            .map_err(|e| (SubsystemKind::Authorization, e))?;
        let authorization = Arc::new(authorization);
        self.activate(SubsystemKind::Authorization, Arc::clone(&authorization) as Arc<dyn Subsystem>);
        self.authorization = Some(authorization);

        let auth_config = config
            .auth_config()
            .map_err(|e| (SubsystemKind::Authentication, anyhow::Error::from(e)))?;
        let authentication = self
            .factory
            .authentication(auth_config, identity.repository())
            .await
            .map_err(|e| (SubsystemKind::Authentication, e))?;
        let authentication = Arc::new(authentication);
        self.activate(SubsystemKind::Authentication, Arc::clone(&authentication) as Arc<dyn Subsystem>);
        self.authentication = Some(authentication);

        Ok(())
    }

    fn activate(&mut self, kind: SubsystemKind, handle: Arc<dyn Subsystem>) {
        debug!(subsystem = %kind, "subsystem active");
        self.active.push((kind, handle));
    }

    /// Shut down every active subsystem, newest first, attempting all of them.
    async fn release_all(&mut self) -> Vec<ReleaseFailure> {
        self.authentication = None;
        self.authorization = None;
        self.identity = None;

        let mut failures = Vec::new();
        while let Some((subsystem, handle)) = self.active.pop() {
            match handle.shutdown().await {
                Ok(()) => debug!(%subsystem, "subsystem released"),
                Err(source) => {
                    warn!(%subsystem, error = %source, "subsystem release failed");
                    failures.push(ReleaseFailure { subsystem, source });
                }
            }
        }
        failures
    }

    /// Release every subsystem. A no-op on an uninitialized or closed
    /// container; an uninitialized one can still be initialized afterwards.
    #[instrument(name = "container_close", skip(self), fields(state = %self.state))]
    pub async fn close(&mut self) -> Result<(), TeardownError> {
        match self.state {
            ContainerState::Uninitialized => {
                debug!("container never initialized");
                return Ok(());
            }
            ContainerState::Closed => {
                debug!("container already closed");
                return Ok(());
            }
            ContainerState::Ready => {}
        }

        let failures = self.release_all().await;
        self.state = ContainerState::Closed;
        if failures.is_empty() {
            info!("container closed");
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }

    /// Run `body` between `init` and `close`.
    ///
    /// `close` runs whether or not the body fails. If `init` fails the body
    /// never runs.
    pub async fn scope<T, E, B>(&mut self, body: B) -> Result<T, ScopeError<E>>
    where
        B: AsyncFnOnce(&Self) -> Result<T, E>,
    {
        self.init().await.map_err(ScopeError::Init)?;
        let outcome = body(&*self).await;
        let teardown = self.close().await;

        match (outcome, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(body), Ok(())) => Err(ScopeError::Body(body)),
            (Ok(_), Err(teardown)) => Err(ScopeError::Teardown(teardown)),
            (Err(body), Err(teardown)) => Err(ScopeError::BodyAndTeardown { body, teardown }),
        }
    }
}

impl<F: SubsystemFactory> Drop for VexenContainer<F> {
    fn drop(&mut self) {
        if self.state == ContainerState::Ready {
            warn!(
                active = self.active.len(),
                "container dropped while ready; subsystems were not closed"
            );
        }
    }
}
