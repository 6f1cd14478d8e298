use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};

use super::{expect_listing, ocl_org, Case, Suite};
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::fixtures::{owner_url, Fixtures};
use crate::matchers::{array_contains_all, array_excludes, object_contains};
use crate::model::{Actor, OwnerKind, PublicAccess};

/// Organization listing, create, update and delete per actor
#[derive(Debug, Clone, Copy, Default)]
pub struct OrgSuite;

/// Existing org a denied request is aimed at
#[derive(Debug, Clone, Copy)]
enum Target {
    Ocl,
    Private,
    View,
    Edit,
}

impl Target {
    fn url(&self, f: &Fixtures) -> String {
        match self {
            Target::Ocl => "orgs/OCL/".to_string(),
            Target::Private => f.private_org.url.clone(),
            Target::View => f.view_org.url.clone(),
            Target::Edit => f.edit_org.url.clone(),
        }
    }

    fn projection(&self, f: &Fixtures) -> Value {
        match self {
            Target::Ocl => ocl_org(),
            Target::Private => f.to_org(&f.private_org.id, None),
            Target::View => f.to_org(&f.view_org.id, None),
            Target::Edit => f.to_org(&f.edit_org.id, None),
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Target::Ocl => "should",
            Target::Private => "with none access should",
            Target::View => "with view access should",
            Target::Edit => "with edit access should",
        }
    }
}

fn access_prefix(access: Option<PublicAccess>) -> String {
    match access {
        None => "should".to_string(),
        Some(access) => format!("with {} access should", PublicAccess::label(Some(access))),
    }
}

/// Orgs listed to admin, which sees everything
async fn admin_listing(f: &Fixtures) -> Result<Value> {
    Ok(f.client().get("orgs/", Some(f.admin_token()?)).await?.body)
}

/// Create a throwaway org owned by the member and queue it for deletion
async fn member_org(f: &Fixtures, access: Option<PublicAccess>) -> Result<(String, String, Value)> {
    let org_id = f.new_id("Org");
    let org_url = owner_url(OwnerKind::Organization, &org_id);
    let created = f.post_org(&org_id, f.token(Actor::Member), access).await?;
    f.cleanup([org_url.clone()]).await;
    Ok((org_id, org_url, created.body))
}

fn listing(
    name: &str,
    actor: Actor,
    path: &'static str,
    status: Option<u16>,
    include: fn(&Fixtures) -> Vec<Value>,
    exclude: fn(&Fixtures) -> Vec<Value>,
) -> Case<Fixtures> {
    Case::new(name, move |f: &Fixtures| {
        async move {
            expect_listing(f.client(), path, f.token(actor), status, &include(f), &exclude(f)).await?;
            Ok(())
        }
        .boxed()
    })
}

/// Anonymous or nonmember update/delete that must be refused
fn denied(name: String, actor: Actor, target: Target, delete: bool, status: u16) -> Case<Fixtures> {
    Case::new(name, move |f: &Fixtures| {
        async move {
            let url = target.url(f);
            let response = if delete {
                f.client().delete(&url, f.token(actor)).await?
            } else {
                let body = json!({ "name": f.new_id("Org") });
                f.client().post(&url, &body, f.token(actor)).await?
            };
            response.expect_status(status)?;

            array_contains_all(&admin_listing(f).await?, &[target.projection(f)])
        }
        .boxed()
    })
}

fn updated_by(actor: Actor, access: Option<PublicAccess>) -> Case<Fixtures> {
    let name = format!("{} be updated by {}", access_prefix(access), actor);
    Case::new(name, move |f: &Fixtures| {
        async move {
            let (org_id, org_url, _) = member_org(f, access).await?;
            let response = f.client().post(&org_url, &json!({ "name": "test" }), f.token(actor)).await?;
            object_contains(&response.body, &f.to_org(&org_id, Some("test")))
        }
        .boxed()
    })
}

fn deleted_by_staff(access: Option<PublicAccess>) -> Case<Fixtures> {
    let name = format!("{} be deleted by staff", access_prefix(access));
    Case::new(name, move |f: &Fixtures| {
        async move {
            let (org_id, org_url, created) = member_org(f, access).await?;
            object_contains(&created, &f.to_org(&org_id, None))?;

            f.client().delete(&org_url, f.token(Actor::Staff)).await?;
            array_excludes(&admin_listing(f).await?, &[f.to_org(&org_id, None)])
        }
        .boxed()
    })
}

fn not_deleted_by_member(access: Option<PublicAccess>) -> Case<Fixtures> {
    let name = format!("{} not be deleted by authenticated member", access_prefix(access));
    Case::new(name, move |f: &Fixtures| {
        async move {
            let (org_id, org_url, created) = member_org(f, access).await?;
            object_contains(&created, &f.to_org(&org_id, None))?;

            f.client()
                .delete(&org_url, f.token(Actor::Member))
                .await?
                .expect_status(403)?;
            array_contains_all(&admin_listing(f).await?, &[f.to_org(&org_id, None)])
        }
        .boxed()
    })
}

const ACCESS_LEVELS: [Option<PublicAccess>; 4] = [
    None,
    Some(PublicAccess::None),
    Some(PublicAccess::View),
    Some(PublicAccess::Edit),
];

const TARGETS: [Target; 4] = [Target::Ocl, Target::Private, Target::View, Target::Edit];

#[async_trait]
impl Suite for OrgSuite {
    type Context = Fixtures;

    fn name(&self) -> String {
        "org".to_string()
    }

    fn context(&self, client: ApiClient, config: &Config) -> Self::Context {
        Fixtures::new(client, config.clone())
    }

    async fn before_all(&self, ctx: &mut Fixtures) -> Result<()> {
        ctx.setup().await
    }

    fn cases(&self) -> Vec<Case<Fixtures>> {
        let mut cases = vec![
            listing(
                "should list only public orgs for anonymous",
                Actor::Anonymous,
                "orgs/",
                None,
                |f| vec![ocl_org(), f.to_org(&f.view_org.id, None), f.to_org(&f.edit_org.id, None)],
                |f| vec![f.to_org(&f.private_org.id, None), f.to_org(&f.private_admin_org.id, None)],
            ),
            listing(
                "orgs list should not be affected by query params",
                Actor::Anonymous,
                "orgs/?q=*",
                None,
                |_| vec![ocl_org()],
                |f| vec![f.to_org(&f.private_org.id, None), f.to_org(&f.private_admin_org.id, None)],
            ),
            Case::new("should not be created by anonymous", |f: &Fixtures| {
                async move {
                    let org_id = f.new_id("Org");
                    f.cleanup([owner_url(OwnerKind::Organization, &org_id)]).await;
                    f.post_org(&org_id, None, None).await?.expect_status(401)?;

                    array_excludes(&admin_listing(f).await?, &[f.to_org(&org_id, None)])
                }
                .boxed()
            }),
        ];

        for target in TARGETS {
            cases.push(denied(
                format!("{} not be updated by anonymous", target.prefix()),
                Actor::Anonymous,
                target,
                false,
                401,
            ));
        }
        for target in TARGETS {
            cases.push(denied(
                format!("{} not be deleted by anonymous", target.prefix()),
                Actor::Anonymous,
                target,
                true,
                401,
            ));
        }

        cases.push(listing(
            "should list all orgs for staff",
            Actor::Staff,
            "orgs/",
            Some(200),
            |f| {
                vec![
                    ocl_org(),
                    f.to_org(&f.private_org.id, None),
                    f.to_org(&f.private_admin_org.id, None),
                    f.to_org(&f.view_org.id, None),
                    f.to_org(&f.edit_org.id, None),
                ]
            },
            |_| vec![],
        ));
        cases.extend(ACCESS_LEVELS.into_iter().map(|access| updated_by(Actor::Staff, access)));
        cases.extend(ACCESS_LEVELS.into_iter().map(deleted_by_staff));

        let member_sees: fn(&Fixtures) -> Vec<Value> = |f| {
            vec![
                ocl_org(),
                f.to_org(&f.private_org.id, None),
                f.to_org(&f.view_org.id, None),
                f.to_org(&f.edit_org.id, None),
            ]
        };
        let member_hidden: fn(&Fixtures) -> Vec<Value> = |f| vec![f.to_org(&f.private_admin_org.id, None)];
        cases.push(listing(
            "should list public and belonging orgs for authenticated member",
            Actor::Member,
            "orgs/",
            Some(200),
            member_sees,
            member_hidden,
        ));
        // search widening for members is not settled server side yet
        cases.push(
            listing(
                "with query params should list public and belonging orgs for authenticated member",
                Actor::Member,
                "orgs/?q=*",
                Some(200),
                member_sees,
                member_hidden,
            )
            .skipped(),
        );
        cases.extend(ACCESS_LEVELS.into_iter().map(|access| updated_by(Actor::Member, access)));
        cases.extend(ACCESS_LEVELS.into_iter().map(not_deleted_by_member));

        cases.push(listing(
            "should list public orgs for authenticated nonmember",
            Actor::NonMember,
            "orgs/",
            Some(200),
            |f| vec![ocl_org(), f.to_org(&f.edit_org.id, None), f.to_org(&f.view_org.id, None)],
            |f| vec![f.to_org(&f.private_admin_org.id, None), f.to_org(&f.private_org.id, None)],
        ));
        for target in [Target::Ocl, Target::Private, Target::View] {
            cases.push(denied(
                format!("{} not be updated by authenticated nonmember", target.prefix()),
                Actor::NonMember,
                target,
                false,
                403,
            ));
        }
        cases.push(Case::new(
            "with edit access should be updated by authenticated nonmember",
            |f: &Fixtures| {
                async move {
                    let (org_id, org_url, _) = member_org(f, Some(PublicAccess::Edit)).await?;
                    let new_name = f.new_id("Org");
                    f.client()
                        .post(&org_url, &json!({ "name": new_name }), f.token(Actor::NonMember))
                        .await?
                        .expect_status(200)?;

                    array_contains_all(&admin_listing(f).await?, &[f.to_org(&org_id, Some(&new_name))])
                }
                .boxed()
            },
        ));
        for target in TARGETS {
            cases.push(denied(
                format!("{} not be deleted by authenticated nonmember", target.prefix()),
                Actor::NonMember,
                target,
                true,
                403,
            ));
        }

        cases
    }

    async fn after_each(&self, ctx: &Fixtures) -> Result<()> {
        ctx.after_each().await
    }

    async fn after_all(&self, ctx: &Fixtures) -> Result<()> {
        ctx.teardown().await
    }
}
