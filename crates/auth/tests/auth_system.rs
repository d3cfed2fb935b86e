use secrecy::SecretString;

use vexen_auth::{AuthConfig, AuthError, AuthStartupError, VexenAuth};
use vexen_identity::{CreateUserRequest, IdentityConfig, VexenUser};
use vexen_infra::{DatabaseSettings, StoreError};

fn settings() -> DatabaseSettings {
    DatabaseSettings::new("memory://auth-tests")
}

fn auth_config() -> AuthConfig {
    AuthConfig::new(settings(), SecretString::new("integration-secret".to_string()))
}

#[tokio::test]
async fn authentication_sees_users_created_through_identity() {
    let identity = VexenUser::connect(IdentityConfig::new(settings())).await.unwrap();
    let auth = VexenAuth::connect(auth_config(), identity.repository())
        .await
        .unwrap();

    let user = identity
        .service()
        .create(CreateUserRequest::new("linus@example.com", "Linus"))
        .await
        .unwrap();
    auth.service().register(user.id, "hunter2hunter2").await.unwrap();

    let pair = auth
        .service()
        .login("linus@example.com", "hunter2hunter2")
        .await
        .unwrap();
    let claims = auth.service().verify_access_token(&pair.access_token).await.unwrap();
    assert_eq!(claims.sub, user.id);

    auth.close().await;
    identity.close().await;
}

#[tokio::test]
async fn deactivation_in_identity_blocks_login() {
    let identity = VexenUser::connect(IdentityConfig::new(settings())).await.unwrap();
    let auth = VexenAuth::connect(auth_config(), identity.repository())
        .await
        .unwrap();

    let user = identity
        .service()
        .create(CreateUserRequest::new("ken@example.com", "Ken"))
        .await
        .unwrap();
    auth.service().register(user.id, "password123").await.unwrap();
    identity.service().deactivate(user.id).await.unwrap();

    let err = auth
        .service()
        .login("ken@example.com", "password123")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InactiveUser(id) if id == user.id));
}

#[tokio::test]
async fn unsupported_store_url_fails_startup() {
    let identity = VexenUser::connect(IdentityConfig::new(settings())).await.unwrap();
    let config = AuthConfig::new(
        DatabaseSettings::new("sqlite://vexen.db"),
        SecretString::new("x".to_string()),
    );
    let err = VexenAuth::connect(config, identity.repository())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthStartupError::Store(StoreError::UnsupportedScheme(_))
    ));
}
