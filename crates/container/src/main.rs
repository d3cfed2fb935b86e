use anyhow::Context;
use tracing::{info, warn};

use vexen::identity::CreateUserRequest;
use vexen::rbac::CreateRoleRequest;
use vexen::{ConfigError, VexenConfig, VexenContainer};

const DEV_DATABASE_URL: &str = "memory://vexen-demo";
const DEV_SECRET_KEY: &str = "dev-secret";

fn load_config() -> anyhow::Result<VexenConfig> {
    match VexenConfig::from_env() {
        Ok(config) => Ok(config),
        Err(ConfigError::Missing(var)) => {
            warn!(missing = var, "VEXEN_DATABASE_URL/VEXEN_SECRET_KEY not set; using insecure in-memory dev defaults");
            Ok(VexenConfig::new(DEV_DATABASE_URL, DEV_SECRET_KEY))
        }
        Err(e) => Err(e).context("loading configuration from the environment"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vexen_observability::init();

    let config = load_config()?;
    info!(database_url = config.database_url(), algorithm = config.algorithm(), "starting vexen demo");

    let mut container = VexenContainer::new(config);
    container
        .scope(async |vexen| {
            let user = vexen
                .identity()?
                .service()
                .create(CreateUserRequest::new("capo@example.com", "capo"))
                .await?;
            info!(user_id = %user.id, email = %user.email, "user created");

            let auth = vexen.authentication()?.service();
            auth.register(user.id, "capo1234").await?;
            let tokens = auth.login("capo@example.com", "capo1234").await?;
            let claims = auth.verify_access_token(&tokens.access_token).await?;
            info!(subject = %claims.sub, expires_in = tokens.expires_in, "logged in");

            let roles = vexen.authorization()?.roles();
            roles
                .create(
                    CreateRoleRequest::new("admin")
                        .with_description("full access")
                        .with_permission("users:read")
                        .with_permission("users:write"),
                )
                .await?;
            roles.assign_role(user.id, "admin").await?;

            let explanation = roles.explain(user.id, "users:write").await?;
            println!("{}", serde_json::to_string_pretty(&explanation)?);

            Ok::<_, anyhow::Error>(())
        })
        .await?;

    Ok(())
}
