use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use tracing::debug;

use super::{expect_listing, ocl_org, Case, Suite};
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::fixtures::owner_url;
use crate::model::{org_body, OwnerKind, PublicAccess};

/// Org listing as seen by anonymous, staff and an org owner
#[derive(Debug, Clone, Copy, Default)]
pub struct OrgVisibilitySuite;

#[derive(Debug)]
pub struct OrgVisibilityContext {
    client: ApiClient,
    user: String,
    org: String,
    admin_org: String,
    admin_token: Option<String>,
    user_token: Option<String>,
}

impl OrgVisibilityContext {
    fn org_projection(id: &str) -> Value {
        json!({ "id": id, "name": id, "url": owner_url(OwnerKind::Organization, id) })
    }

    fn admin_token(&self) -> Result<&str> {
        self.admin_token
            .as_deref()
            .ok_or_else(|| ConformanceError::Internal("admin token missing".to_string()))
    }
}

#[async_trait]
impl Suite for OrgVisibilitySuite {
    type Context = OrgVisibilityContext;

    fn name(&self) -> String {
        "org-visibility".to_string()
    }

    fn context(&self, client: ApiClient, _config: &Config) -> Self::Context {
        let unique_id = format!("{:x}", fastrand::u32(..100_000_000));
        OrgVisibilityContext {
            client,
            user: format!("Test{}User", unique_id),
            org: format!("Test{}Org", unique_id),
            admin_org: format!("Test{}AdminOrg", unique_id),
            admin_token: None,
            user_token: None,
        }
    }

    async fn before_all(&self, ctx: &mut Self::Context) -> Result<()> {
        let admin = ctx.client.authenticate_admin().await?;
        ctx.admin_token = Some(admin.clone());
        let admin_org_url = owner_url(OwnerKind::Organization, &ctx.admin_org);
        ctx.client.delete(&admin_org_url, Some(&admin)).await?;
        ctx.client
            .post("orgs/", &org_body(&ctx.admin_org, Some(PublicAccess::None)), Some(&admin))
            .await?;

        ctx.client.new_user(&ctx.user, &ctx.user, &admin).await?;
        let user_token = ctx
            .client
            .authenticate(&ctx.user, &ctx.user)
            .await?
            .ok_or_else(|| ConformanceError::Authentication { username: ctx.user.clone() })?;

        let org_url = owner_url(OwnerKind::Organization, &ctx.org);
        ctx.client.delete(&org_url, Some(&user_token)).await?;
        ctx.client
            .post("orgs/", &org_body(&ctx.org, Some(PublicAccess::None)), Some(&user_token))
            .await?;

        debug!(user = %ctx.user, org = %ctx.org, "Created private orgs");
        ctx.user_token = Some(user_token);
        Ok(())
    }

    fn cases(&self) -> Vec<Case<OrgVisibilityContext>> {
        vec![
            Case::new("without authentication should list only public orgs", |ctx: &OrgVisibilityContext| {
                async move {
                    let private = [
                        OrgVisibilityContext::org_projection(&ctx.org),
                        OrgVisibilityContext::org_projection(&ctx.admin_org),
                    ];
                    expect_listing(&ctx.client, "orgs/", None, None, &[ocl_org()], &private).await?;
                    Ok(())
                }
                .boxed()
            }),
            Case::new("with staff privileges should list all orgs", |ctx: &OrgVisibilityContext| {
                async move {
                    let expected = [
                        ocl_org(),
                        OrgVisibilityContext::org_projection(&ctx.org),
                        OrgVisibilityContext::org_projection(&ctx.admin_org),
                    ];
                    expect_listing(&ctx.client, "orgs/", Some(ctx.admin_token()?), Some(200), &expected, &[])
                        .await?;
                    Ok(())
                }
                .boxed()
            }),
            Case::new(
                "with regular privileges should list public and belonging orgs",
                |ctx: &OrgVisibilityContext| {
                    async move {
                        let expected = [ocl_org(), OrgVisibilityContext::org_projection(&ctx.org)];
                        let hidden = [OrgVisibilityContext::org_projection(&ctx.admin_org)];
                        expect_listing(
                            &ctx.client,
                            "orgs/",
                            ctx.user_token.as_deref(),
                            Some(200),
                            &expected,
                            &hidden,
                        )
                        .await?;
                        Ok(())
                    }
                    .boxed()
                },
            ),
        ]
    }

    async fn after_all(&self, ctx: &Self::Context) -> Result<()> {
        let Some(admin) = ctx.admin_token.as_deref() else {
            return Ok(());
        };
        for url in [
            owner_url(OwnerKind::Organization, &ctx.org),
            owner_url(OwnerKind::Organization, &ctx.admin_org),
            owner_url(OwnerKind::User, &ctx.user),
        ] {
            ctx.client.delete(&url, Some(admin)).await?;
        }
        Ok(())
    }
}
