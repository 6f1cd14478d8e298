use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};

use super::{expect_listing, Case, Suite};
use crate::client::{retry, ApiClient};
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::fixtures::{container_url, Entity, Fixtures};
use crate::matchers::{array_contains_all, array_excludes, object_contains, object_not_contains};
use crate::model::{Actor, ContainerKind, OwnerKind, PublicAccess};
use crate::url::join_url;

/// Listing, create, update and delete matrix for sources or collections
#[derive(Debug, Clone, Copy)]
pub struct ContainerSuite {
    kind: ContainerKind,
}

impl ContainerSuite {
    pub fn new(kind: ContainerKind) -> Self {
        Self { kind }
    }
}

/// Fixture containers of one kind
struct ContainerSet<'a> {
    private: &'a Entity,
    view: &'a Entity,
    edit: &'a Entity,
    private_edit_org_owned: &'a Entity,
    private_user_owned: &'a Entity,
    view_user_owned: &'a Entity,
}

fn containers(f: &Fixtures, kind: ContainerKind) -> ContainerSet<'_> {
    match kind {
        ContainerKind::Source => ContainerSet {
            private: &f.private_source,
            view: &f.view_source,
            edit: &f.edit_source,
            private_edit_org_owned: &f.private_edit_org_owned_source,
            private_user_owned: &f.private_user_owned_source,
            view_user_owned: &f.view_user_owned_source,
        },
        ContainerKind::Collection => ContainerSet {
            private: &f.private_collection,
            view: &f.view_collection,
            edit: &f.edit_collection,
            private_edit_org_owned: &f.private_edit_org_owned_collection,
            private_user_owned: &f.private_user_owned_collection,
            view_user_owned: &f.view_user_owned_collection,
        },
    }
}

/// Projection of a container owned by View-Org
fn in_view_org(f: &Fixtures, kind: ContainerKind, id: &str, name: Option<&str>) -> Value {
    f.to_container(OwnerKind::Organization, &f.view_org.id, kind, id, name)
}

/// Projections of the private, view and edit containers of View-Org
fn view_org_projections(f: &Fixtures, kind: ContainerKind) -> (Value, Value, Value) {
    let set = containers(f, kind);
    (
        in_view_org(f, kind, &set.private.id, None),
        in_view_org(f, kind, &set.view.id, None),
        in_view_org(f, kind, &set.edit.id, None),
    )
}

/// Which fixture containers a listing must show
#[derive(Debug, Clone, Copy)]
enum Visible {
    PublicOnly,
    All,
}

fn view_org_listing(name: String, kind: ContainerKind, actor: Actor, global: bool, visible: Visible) -> Case<Fixtures> {
    Case::new(name, move |f: &Fixtures| {
        async move {
            let path = if global {
                join_url(&[kind.segment()])
            } else {
                join_url(&[f.view_org.url.as_str(), kind.segment()])
            };
            let (private, view, edit) = view_org_projections(f, kind);
            let status = if actor == Actor::Anonymous { None } else { Some(200) };

            match visible {
                Visible::PublicOnly => {
                    expect_listing(f.client(), &path, f.token(actor), status, &[view, edit], &[private]).await?
                }
                Visible::All => {
                    expect_listing(f.client(), &path, f.token(actor), status, &[view, edit, private], &[]).await?
                }
            };
            Ok(())
        }
        .boxed()
    })
}

fn case_name(access: Option<PublicAccess>, allowed: bool, verb: &str, actor: Actor) -> String {
    let prefix = match access {
        None => "should".to_string(),
        Some(_) => format!("with {} access should", PublicAccess::label(access)),
    };
    let negation = if allowed { "" } else { "not " };
    format!("{} {}be {} by {}", prefix, negation, verb, actor)
}

/// Create a throwaway container in View-Org as the member and queue it for deletion
async fn member_container(f: &Fixtures, kind: ContainerKind, access: Option<PublicAccess>) -> Result<(String, String, Value)> {
    let id = f.new_id(kind.id_kind());
    let url = container_url(OwnerKind::Organization, &f.view_org.id, kind, &id);
    let created = f
        .post_container(OwnerKind::Organization, &f.view_org.id, kind, &id, f.token(Actor::Member), access)
        .await?;
    f.cleanup([url.clone()]).await;
    Ok((id, url, created.body))
}

fn update_case(kind: ContainerKind, actor: Actor, access: Option<PublicAccess>, allowed: bool) -> Case<Fixtures> {
    Case::new(case_name(access, allowed, "updated", actor), move |f: &Fixtures| {
        async move {
            let (id, url, _) = member_container(f, kind, access).await?;
            let response = f.client().put(&url, Some(&json!({ "name": "test" })), f.token(actor)).await?;
            let renamed = in_view_org(f, kind, &id, Some("test"));

            if allowed {
                response.expect_status(200)?;
                object_contains(&response.body, &renamed)
            } else {
                response.expect_any_status(&[401, 403])?;
                object_not_contains(&response.body, &renamed)
            }
        }
        .boxed()
    })
}

fn delete_case(kind: ContainerKind, actor: Actor, access: Option<PublicAccess>, allowed: bool) -> Case<Fixtures> {
    Case::new(case_name(access, allowed, "deleted", actor), move |f: &Fixtures| {
        async move {
            let (id, url, created) = member_container(f, kind, access).await?;
            let projection = in_view_org(f, kind, &id, None);
            object_contains(&created, &projection)?;

            let response = f.client().delete(&url, f.token(actor)).await?;
            if allowed {
                response.expect_status(204)?;
            } else {
                response.expect_any_status(&[401, 403])?;
            }

            let listing_path = join_url(&[f.view_org.url.as_str(), kind.segment()]);
            let listing = f.client().get(&listing_path, f.token(Actor::Staff)).await?;
            if allowed {
                array_excludes(&listing.body, &[projection])
            } else {
                array_contains_all(&listing.body, &[projection])
            }
        }
        .boxed()
    })
}

/// Which (actor, access) pairs may modify a View-Org container
fn permission_matrix() -> Vec<(Actor, Option<PublicAccess>, bool)> {
    let mut matrix = Vec::new();
    for access in [PublicAccess::None, PublicAccess::View, PublicAccess::Edit] {
        matrix.push((Actor::Anonymous, Some(access), false));
    }
    for actor in [Actor::Staff, Actor::Member, Actor::NonMember] {
        for access in [None, Some(PublicAccess::None), Some(PublicAccess::View), Some(PublicAccess::Edit)] {
            let allowed = actor != Actor::NonMember || access == Some(PublicAccess::Edit);
            matrix.push((actor, access, allowed));
        }
    }
    matrix
}

fn expect_single_with(body: &Value, expected: &Value) -> Result<()> {
    match body.as_array() {
        Some(items) if items.len() == 1 => object_contains(&items[0], expected),
        _ => Err(ConformanceError::assertion(format!(
            "Expected exactly one item containing {}, got {}",
            expected, body
        ))),
    }
}

/// Editing a concept after a version is cut leaves the version snapshot untouched
async fn version_snapshot_survives_edit(f: &Fixtures) -> Result<()> {
    let member = f.token(Actor::Member);
    let timing = &f.config().timing;
    let delay = f.config().retry_delay();

    let (_, source_url, _) = member_container(f, ContainerKind::Source, None).await?;
    let concept_id = f.new_id("Concept");
    let concept_url = join_url(&[source_url.as_str(), "concepts", concept_id.as_str()]);
    f.post_concept(&source_url, &concept_id, member).await?;

    f.client()
        .post(&join_url(&[source_url.as_str(), "versions"]), &json!({ "id": "v1" }), member)
        .await?;

    let v1_concepts = join_url(&[source_url.as_str(), "v1", "concepts"]);
    let head_concepts = join_url(&[source_url.as_str(), "concepts"]);
    let (v1_concepts, head_concepts) = (v1_concepts.as_str(), head_concepts.as_str());

    retry(timing.retry_attempts, delay, move || async move {
        let response = f.client().get(v1_concepts, member).await?;
        match response.body.as_array() {
            Some(items) if items.len() == 1 => Ok(()),
            _ => Err(ConformanceError::assertion(format!(
                "Version v1 should hold one concept, got {}",
                response.body
            ))),
        }
    })
    .await?;

    f.client()
        .put(&concept_url, Some(&json!({ "external_id": "new value" })), member)
        .await?;

    retry(timing.retry_attempts, delay, move || async move {
        let snapshot = f.client().get(v1_concepts, member).await?;
        expect_single_with(&snapshot.body, &json!({ "external_id": null }))?;
        let head = f.client().get(head_concepts, member).await?;
        expect_single_with(&head.body, &json!({ "external_id": "new value" }))
    })
    .await
}

#[async_trait]
impl Suite for ContainerSuite {
    type Context = Fixtures;

    fn name(&self) -> String {
        self.kind.singular().to_string()
    }

    fn context(&self, client: ApiClient, config: &Config) -> Self::Context {
        Fixtures::new(client, config.clone())
    }

    async fn before_all(&self, ctx: &mut Fixtures) -> Result<()> {
        ctx.setup().await
    }

    fn cases(&self) -> Vec<Case<Fixtures>> {
        let kind = self.kind;
        let plural = kind.segment();

        let mut cases = vec![
            view_org_listing(
                format!("global search should list only public {} for anonymous", plural),
                kind,
                Actor::Anonymous,
                true,
                Visible::PublicOnly,
            ),
            view_org_listing(
                format!("global search should list all {} for staff", plural),
                kind,
                Actor::Staff,
                true,
                Visible::All,
            ),
            view_org_listing(
                format!("global search should list public and belonging {} for authenticated member", plural),
                kind,
                Actor::Member,
                true,
                Visible::All,
            ),
            view_org_listing(
                format!("should list public and belonging {} for authenticated member", plural),
                kind,
                Actor::Member,
                false,
                Visible::All,
            ),
            view_org_listing(
                format!("global search should list only public {} for authenticated nonmember", plural),
                kind,
                Actor::NonMember,
                true,
                Visible::PublicOnly,
            ),
            view_org_listing(
                format!("should list only public {} for anonymous", plural),
                kind,
                Actor::Anonymous,
                false,
                Visible::PublicOnly,
            ),
            view_org_listing(
                format!("should list all {} for staff", plural),
                kind,
                Actor::Staff,
                false,
                Visible::All,
            ),
            view_org_listing(
                format!("should list only public {} for authenticated nonmember", plural),
                kind,
                Actor::NonMember,
                false,
                Visible::PublicOnly,
            ),
        ];

        if kind == ContainerKind::Source {
            cases.push(Case::new(
                "should list public and belonging sources in all orgs for authenticated member",
                |f: &Fixtures| {
                    async move {
                        let member = f.token(Actor::Member);
                        let by_user = join_url(&[f.member_user.url.as_str(), "orgs", "sources"]);
                        let res = f.client().get(&by_user, member).await?;
                        let res2 = f.client().get("user/orgs/sources/", member).await?;
                        res.expect_status(200)?;
                        res2.expect_status(200)?;

                        let set = containers(f, ContainerKind::Source);
                        let (private, view, edit) = view_org_projections(f, ContainerKind::Source);
                        let edit_org_private = f.to_source(&f.edit_org.id, &set.private_edit_org_owned.id, None);
                        array_contains_all(&res.body, &[view, edit, private, edit_org_private])?;

                        if res.body != res2.body {
                            return Err(ConformanceError::assertion(format!(
                                "{} and {} disagree: {} vs {}",
                                res.url, res2.url, res.body, res2.body
                            )));
                        }
                        Ok(())
                    }
                    .boxed()
                },
            ));
        }

        cases.push(Case::new(
            format!("should list all {} belonging to an authenticated user", plural),
            move |f: &Fixtures| {
                async move {
                    let set = containers(f, kind);
                    let owner = &f.non_member_user;
                    let path = join_url(&[owner.url.as_str(), kind.segment()]);
                    let expected = [
                        f.to_container(OwnerKind::User, &owner.id, kind, &set.private_user_owned.id, None),
                        f.to_container(OwnerKind::User, &owner.id, kind, &set.view_user_owned.id, None),
                    ];
                    expect_listing(f.client(), &path, f.token(Actor::NonMember), Some(200), &expected, &[]).await?;
                    Ok(())
                }
                .boxed()
            },
        ));
        cases.push(Case::new(
            format!("should list only public {} for anonymous user", plural),
            move |f: &Fixtures| {
                async move {
                    let set = containers(f, kind);
                    let owner = &f.non_member_user;
                    let path = join_url(&[owner.url.as_str(), kind.segment()]);
                    let public = [f.to_container(OwnerKind::User, &owner.id, kind, &set.view_user_owned.id, None)];
                    let private = [f.to_container(OwnerKind::User, &owner.id, kind, &set.private_user_owned.id, None)];
                    expect_listing(f.client(), &path, None, Some(200), &public, &private).await?;
                    Ok(())
                }
                .boxed()
            },
        ));

        cases.push(Case::new("should not be created by anonymous", move |f: &Fixtures| {
            async move {
                let id = f.new_id(kind.id_kind());
                f.cleanup([container_url(OwnerKind::Organization, "OCL", kind, &id)]).await;
                f.post_container(OwnerKind::Organization, "OCL", kind, &id, None, None)
                    .await?
                    .expect_status(403)?;

                let listing = f
                    .client()
                    .get(&join_url(&["orgs", "OCL", kind.segment()]), f.token(Actor::Staff))
                    .await?;
                array_excludes(
                    &listing.body,
                    &[f.to_container(OwnerKind::Organization, "OCL", kind, &id, None)],
                )
            }
            .boxed()
        }));

        let matrix = permission_matrix();
        cases.extend(
            matrix
                .iter()
                .map(|&(actor, access, allowed)| update_case(kind, actor, access, allowed)),
        );
        cases.extend(
            matrix
                .iter()
                .map(|&(actor, access, allowed)| delete_case(kind, actor, access, allowed)),
        );

        if kind == ContainerKind::Source {
            cases.push(Case::new(
                "should not delete concept from previous source version after edit",
                |f: &Fixtures| version_snapshot_survives_edit(f).boxed(),
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
