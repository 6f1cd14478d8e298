use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use super::{Case, Suite};
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::fixtures::{Entity, Fixtures};
use crate::model::{Actor, ContainerKind, PublicAccess};
use crate::url::join_url;

/// Resource living inside a source or collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Concept,
    Mapping,
}

impl ChildKind {
    fn segment(&self) -> &'static str {
        match self {
            ChildKind::Concept => "concepts",
            ChildKind::Mapping => "mappings",
        }
    }
}

/// Listing matrix for concepts or mappings, plus their create/retrieve checks
#[derive(Debug, Clone, Copy)]
pub struct ChildResourceSuite {
    kind: ChildKind,
}

impl ChildResourceSuite {
    pub fn new(kind: ChildKind) -> Self {
        Self { kind }
    }
}

fn container(f: &Fixtures, kind: ContainerKind, access: PublicAccess) -> &Entity {
    match (kind, access) {
        (ContainerKind::Source, PublicAccess::None) => &f.private_source,
        (ContainerKind::Source, PublicAccess::View) => &f.view_source,
        (ContainerKind::Source, PublicAccess::Edit) => &f.edit_source,
        (ContainerKind::Collection, PublicAccess::None) => &f.private_collection,
        (ContainerKind::Collection, PublicAccess::View) => &f.view_collection,
        (ContainerKind::Collection, PublicAccess::Edit) => &f.edit_collection,
    }
}

fn adjective(access: PublicAccess) -> &'static str {
    match access {
        PublicAccess::None => "private",
        PublicAccess::View => "viewable",
        PublicAccess::Edit => "editable",
    }
}

/// Status a listing returns; `None` means an empty list is expected
fn listing_denial(actor: Actor, access: PublicAccess) -> Option<u16> {
    match (access, actor) {
        (PublicAccess::None, Actor::Anonymous) => Some(401),
        (PublicAccess::None, Actor::NonMember) => Some(403),
        _ => None,
    }
}

fn listing_case(child: ChildKind, kind: ContainerKind, actor: Actor, access: PublicAccess) -> Case<Fixtures> {
    let denial = listing_denial(actor, access);
    let verb = if denial.is_some() { "should not list" } else { "should list" };
    let name = format!(
        "{} {} from {} {} for {}",
        verb,
        child.segment(),
        adjective(access),
        kind.singular(),
        actor
    );

    Case::new(name, move |f: &Fixtures| {
        async move {
            let path = join_url(&[container(f, kind, access).url.as_str(), child.segment()]);
            let response = f.client().get(&path, f.token(actor)).await?;
            match denial {
                Some(status) => {
                    response.expect_status(status)?;
                }
                None => {
                    if response.body != Value::Array(Vec::new()) {
                        return Err(ConformanceError::assertion(format!(
                            "Expected an empty list from {}, got {} (status {})",
                            response.url, response.body, response.status
                        )));
                    }
                }
            }
            Ok(())
        }
        .boxed()
    })
}

fn concept_create_case(actor: Actor, access: PublicAccess, status: u16) -> Case<Fixtures> {
    let adjective = match access {
        PublicAccess::None => "private",
        PublicAccess::View => "public",
        PublicAccess::Edit => "editable",
    };
    let verb = if status == 201 { "should be created" } else { "should not be created" };
    let name = format!("{} in {} source by {}", verb, adjective, actor);

    Case::new(name, move |f: &Fixtures| {
        async move {
            let source = container(f, ContainerKind::Source, access);
            let concept_id = f.new_id("Concept");
            let response = f.post_concept(&source.url, &concept_id, f.token(actor)).await?;
            if response.is_success() {
                f.cleanup([join_url(&[source.url.as_str(), "concepts", concept_id.as_str()])])
                    .await;
            }
            response.expect_status(status)?;
            Ok(())
        }
        .boxed()
    })
}

/// Post a mapping between two concepts and read it back as `reader`
async fn retrieve_mapping(
    f: &Fixtures,
    source: &Entity,
    from: &Entity,
    to: &Entity,
    author: Actor,
    reader: Actor,
) -> Result<()> {
    let created = f
        .post_mapping(&source.url, &from.url, &to.url, f.token(author))
        .await?;
    let id = created.field("id")?.clone();
    let id_segment = match &id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let path = join_url(&[source.url.as_str(), "mappings", id_segment.as_str()]);
    f.cleanup([path.clone()]).await;

    let response = f.client().get(&path, f.token(reader)).await?;
    response.expect_status(200)?;
    let fetched = response.field("id")?;
    if *fetched != id {
        return Err(ConformanceError::assertion(format!(
            "Retrieved mapping id {} does not match created id {}",
            fetched, id
        )));
    }
    Ok(())
}

#[async_trait]
impl Suite for ChildResourceSuite {
    type Context = Fixtures;

    fn name(&self) -> String {
        match self.kind {
            ChildKind::Concept => "concept".to_string(),
            ChildKind::Mapping => "mapping".to_string(),
        }
    }

    fn context(&self, client: ApiClient, config: &Config) -> Self::Context {
        Fixtures::new(client, config.clone())
    }

    async fn before_all(&self, ctx: &mut Fixtures) -> Result<()> {
        ctx.setup().await
    }

    fn cases(&self) -> Vec<Case<Fixtures>> {
        let child = self.kind;
        let mut cases = Vec::new();

        for kind in [ContainerKind::Source, ContainerKind::Collection] {
            for actor in [Actor::Anonymous, Actor::NonMember, Actor::Member, Actor::Staff] {
                for access in [PublicAccess::View, PublicAccess::Edit, PublicAccess::None] {
                    cases.push(listing_case(child, kind, actor, access));
                }
            }
        }

        match child {
            ChildKind::Concept => {
                for actor in [Actor::Anonymous, Actor::NonMember] {
                    for access in [PublicAccess::View, PublicAccess::None, PublicAccess::Edit] {
                        let status = match (actor, access) {
                            (Actor::Anonymous, _) => 401,
                            (_, PublicAccess::Edit) => 201,
                            _ => 403,
                        };
                        cases.push(concept_create_case(actor, access, status));
                    }
                }
            }
            ChildKind::Mapping => {
                cases.push(Case::new(
                    "should retrieve private mapping if mapping owner",
                    |f: &Fixtures| {
                        retrieve_mapping(
                            f,
                            &f.private_user_owned_source,
                            &f.private_user_owned_concept_1,
                            &f.private_user_owned_concept_2,
                            Actor::NonMember,
                            Actor::NonMember,
                        )
                        .boxed()
                    },
                ));
                cases.push(Case::new(
                    "should retrieve private mapping if org member",
                    |f: &Fixtures| {
                        retrieve_mapping(
                            f,
                            &f.private_org1_owned_source,
                            &f.private_org1_owned_concept_1,
                            &f.private_org1_owned_concept_2,
                            Actor::Member,
                            Actor::SecondMember,
                        )
                        .boxed()
                    },
                ));
            }
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
