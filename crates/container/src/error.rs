//! Container error model.
//!
//! Every failure names the subsystem and the lifecycle phase it came from.

use thiserror::Error;

use crate::config::ConfigError;

/// The three subsystems, in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemKind {
    Identity,
    Authorization,
    Authentication,
}

impl SubsystemKind {
    pub const ALL: [SubsystemKind; 3] = [Self::Identity, Self::Authorization, Self::Authentication];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Authorization => "authorization",
            Self::Authentication => "authentication",
        }
    }
}

impl core::fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container lifecycle: `Uninitialized` -> `Ready` -> `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Uninitialized,
    Ready,
    /// After `close`, or after a failed `init`. Terminal.
    Closed,
}

impl core::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Closed => "closed",
        })
    }
}

/// One subsystem that failed to shut down.
#[derive(Debug, Error)]
#[error("{subsystem}: {source:#}")]
pub struct ReleaseFailure {
    pub subsystem: SubsystemKind,
    #[source]
    pub source: anyhow::Error,
}

fn list(failures: &[ReleaseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_teardown(failures: &[ReleaseFailure]) -> String {
    format!("teardown failed for {} subsystem(s): {}", failures.len(), list(failures))
}

fn rollback_note(failures: &[ReleaseFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" (rollback also failed: {})", list(failures))
    }
}

/// A construction step failed; already-active subsystems were rolled back.
#[derive(Debug, Error)]
#[error("{step} subsystem failed to initialize: {source:#}{}", rollback_note(.rollback))]
pub struct InitError {
    pub step: SubsystemKind,
    #[source]
    pub source: anyhow::Error,
    /// Release failures hit while rolling back, in release order.
    pub rollback: Vec<ReleaseFailure>,
}

/// Every release failure from one `close`, in release order.
#[derive(Debug, Error)]
#[error("{}", describe_teardown(.failures))]
pub struct TeardownError {
    pub failures: Vec<ReleaseFailure>,
}

impl TeardownError {
    pub fn subsystems(&self) -> Vec<SubsystemKind> {
        self.failures.iter().map(|f| f.subsystem).collect()
    }
}

/// A subsystem accessor was used while the container was not ready.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{subsystem} subsystem is not available: container is {state}")]
pub struct AccessError {
    pub subsystem: SubsystemKind,
    pub state: ContainerState,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("container is already initialized")]
    AlreadyInitialized,

    #[error("container is closed and cannot be reinitialized")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

/// Outcome of `VexenContainer::scope` when anything failed.
#[derive(Debug, Error)]
pub enum ScopeError<E> {
    /// `init` failed; the body never ran.
    #[error(transparent)]
    Init(ContainerError),

    #[error("scope body failed: {0}")]
    Body(E),

    /// The body succeeded but `close` did not.
    #[error(transparent)]
    Teardown(TeardownError),

    #[error("scope body failed: {body}; {teardown}")]
    BodyAndTeardown { body: E, teardown: TeardownError },
}

impl<E> ScopeError<E> {
    pub fn body(&self) -> Option<&E> {
        match self {
            Self::Body(e) | Self::BodyAndTeardown { body: e, .. } => Some(e),
            _ => None,
        }
    }

    pub fn teardown(&self) -> Option<&TeardownError> {
        match self {
            Self::Teardown(t) | Self::BodyAndTeardown { teardown: t, .. } => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(subsystem: SubsystemKind, msg: &'static str) -> ReleaseFailure {
        ReleaseFailure {
            subsystem,
            source: anyhow::anyhow!(msg),
        }
    }

    #[test]
    fn teardown_display_lists_every_failure() {
        let err = TeardownError {
            failures: vec![
                failure(SubsystemKind::Authorization, "pool busy"),
                failure(SubsystemKind::Identity, "socket reset"),
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("2 subsystem(s)"));
        assert!(rendered.contains("authorization: pool busy"));
        assert!(rendered.contains("identity: socket reset"));
    }

    #[test]
    fn init_display_names_step_and_rollback() {
        let err = InitError {
            step: SubsystemKind::Authentication,
            source: anyhow::anyhow!("bad secret"),
            rollback: vec![failure(SubsystemKind::Identity, "stuck")],
        };
        assert_eq!(
            err.to_string(),
            "authentication subsystem failed to initialize: bad secret \
             (rollback also failed: identity: stuck)"
        );
    }
}
