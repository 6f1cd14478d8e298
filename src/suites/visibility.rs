// src/suites/visibility.rs - Public-access listings for sources and collections

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Case, Suite};
use crate::client::{settle, ApiClient};
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::fixtures::{container_url, owner_url};
use crate::matchers::{array_excludes, same_members_by_id};
use crate::model::{org_body, ContainerKind, OwnerKind, PublicAccess};
use crate::url::join_url;

const ADJECTIVES: &[&str] = &[
    "brave", "calm", "eager", "gentle", "happy", "jolly", "kind", "lively", "proud", "witty",
];
const NOUNS: &[&str] = &[
    "otter", "falcon", "maple", "river", "comet", "harbor", "lantern", "meadow", "pebble", "willow",
];
const COMPANIES: &[&str] = &[
    "Acme Health",
    "Globex Clinics",
    "Initech Labs",
    "Hooli Medical",
    "Stark Diagnostics",
    "Wayne Care",
];

const USER_PASSWORD: &str = "Visibility123";
const CUSTOM_SCHEMA_QUERY: &str = "&customValidationSchema=OpenMRS";

fn pick(words: &[&'static str]) -> &'static str {
    words[fastrand::usize(..words.len())]
}

/// Container body with randomized descriptive fields
fn container_fixture(id: &str, access: PublicAccess) -> Value {
    let short_code = pick(NOUNS);
    let company = pick(COMPANIES);
    json!({
        "type": "Collection",
        "uuid": Uuid::new_v4().to_string(),
        "id": id,
        "external_id": "",
        "short_code": short_code,
        "name": company,
        "full_name": format!("{} {}", company, short_code),
        "collection_type": "Core Dataset",
        "public_access": access.as_str(),
        "supported_locales": "en,es",
        "website": "",
        "description": "",
        "extras": {},
        "custom_validation_schema": "OpenMRS",
    })
}

/// Four distinct numeric ids below 100 000
fn container_ids() -> Vec<String> {
    let mut ids: Vec<u32> = Vec::with_capacity(4);
    while ids.len() < 4 {
        let id = fastrand::u32(..100_000);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids.into_iter().map(|id| id.to_string()).collect()
}

/// Listing entry reduced to what the assertions compare
fn project(item: &Value) -> Value {
    let id = match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    json!({ "id": id, "url": item.get("url").cloned().unwrap_or(Value::Null) })
}

/// Public-access listing suite for one container kind
#[derive(Debug, Clone, Copy)]
pub struct VisibilitySuite {
    kind: ContainerKind,
}

impl VisibilitySuite {
    pub fn new(kind: ContainerKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone)]
pub struct VisibilityUser {
    pub username: String,
    token: Option<String>,
}

/// Which owner a container lives under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    FirstUser,
    Org,
}

#[derive(Debug, Clone)]
struct Placed {
    scope: Scope,
    public: bool,
    id: String,
    url: String,
}

/// Who issues a listing request
#[derive(Debug, Clone, Copy)]
enum Reader {
    Anonymous,
    User(usize),
}

#[derive(Debug)]
pub struct VisibilityContext {
    client: ApiClient,
    config: Config,
    kind: ContainerKind,
    admin_token: Option<String>,
    users: Vec<VisibilityUser>,
    org_id: String,
    org_created: bool,
    container_ids: Vec<String>,
    containers: Vec<Placed>,
}

impl VisibilityContext {
    fn admin_token(&self) -> Result<&str> {
        self.admin_token
            .as_deref()
            .ok_or_else(|| ConformanceError::Internal("admin token missing".to_string()))
    }

    fn token(&self, reader: Reader) -> Result<Option<&str>> {
        match reader {
            Reader::Anonymous => Ok(None),
            Reader::User(index) => self
                .users
                .get(index)
                .and_then(|u| u.token.as_deref())
                .map(Some)
                .ok_or_else(|| ConformanceError::Authentication {
                    username: self
                        .users
                        .get(index)
                        .map(|u| u.username.clone())
                        .unwrap_or_default(),
                }),
        }
    }

    fn scope_path(&self, scope: Scope) -> String {
        let segment = self.kind.segment();
        let base = match scope {
            Scope::Global => join_url(&[segment]),
            Scope::FirstUser => join_url(&[
                owner_url(OwnerKind::User, &self.users[0].username).as_str(),
                segment,
            ]),
            Scope::Org => join_url(&[owner_url(OwnerKind::Organization, &self.org_id).as_str(), segment]),
        };
        format!("{}?verbose=true", base)
    }

    fn placed(&self, filter: fn(&Placed) -> bool) -> Vec<Value> {
        self.containers
            .iter()
            .filter(|p| filter(p))
            .map(|p| json!({ "id": p.id, "url": p.url }))
            .collect()
    }

    async fn listing(&self, reader: Reader, scope: Scope, extra_query: &str) -> Result<Value> {
        let path = format!("{}{}", self.scope_path(scope), extra_query);
        let response = self.client.get(&path, self.token(reader)?).await?;
        response.expect_status(200)?;
        let items = response.json_array()?;
        Ok(Value::Array(items.iter().map(project).collect()))
    }

    async fn purge_public_containers(&self, admin: &str) -> Result<()> {
        let path = format!("{}?verbose=true", join_url(&[self.kind.segment()]));
        let response = self.client.get(&path, None).await?;
        let urls: Vec<String> = response
            .json_array()?
            .iter()
            .filter_map(|item| item.get("url").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        for url in &urls {
            self.client.delete(url, Some(admin)).await?;
        }
        info!(kind = %self.kind.segment(), purged = urls.len(), "Purged leftover public containers");
        Ok(())
    }
}

/// Listing of `scope` by `reader` holds exactly the containers matching `filter`
fn exactly(
    name: String,
    reader: Reader,
    scope: Scope,
    extra_query: &'static str,
    filter: fn(&Placed) -> bool,
) -> Case<VisibilityContext> {
    Case::new(name, move |ctx: &VisibilityContext| {
        async move {
            let listed = ctx.listing(reader, scope, extra_query).await?;
            same_members_by_id(&listed, &ctx.placed(filter))
        }
        .boxed()
    })
}

/// Listing of `scope` by `reader` holds none of the containers matching `filter`
fn never(name: String, reader: Reader, scope: Scope, filter: fn(&Placed) -> bool) -> Case<VisibilityContext> {
    Case::new(name, move |ctx: &VisibilityContext| {
        async move {
            let listed = ctx.listing(reader, scope, "").await?;
            array_excludes(&listed, &ctx.placed(filter))
        }
        .boxed()
    })
}

fn user_all(p: &Placed) -> bool {
    p.scope == Scope::FirstUser
}

fn user_public(p: &Placed) -> bool {
    p.scope == Scope::FirstUser && p.public
}

fn user_private(p: &Placed) -> bool {
    p.scope == Scope::FirstUser && !p.public
}

fn org_all(p: &Placed) -> bool {
    p.scope == Scope::Org
}

fn org_public(p: &Placed) -> bool {
    p.scope == Scope::Org && p.public
}

fn org_private(p: &Placed) -> bool {
    p.scope == Scope::Org && !p.public
}

fn any_public(p: &Placed) -> bool {
    p.public
}

#[async_trait]
impl Suite for VisibilitySuite {
    type Context = VisibilityContext;

    fn name(&self) -> String {
        format!("{}-visibility", self.kind.singular())
    }

    fn context(&self, client: ApiClient, config: &Config) -> Self::Context {
        let users = (0..3)
            .map(|_| VisibilityUser {
                username: format!("{}{}{:x}", pick(ADJECTIVES), pick(NOUNS), fastrand::u32(..0x100000)),
                token: None,
            })
            .collect();

        VisibilityContext {
            client,
            config: config.clone(),
            kind: self.kind,
            admin_token: None,
            users,
            org_id: format!("{}-{}-{:x}", pick(ADJECTIVES), pick(NOUNS), fastrand::u32(..0x100000)),
            org_created: false,
            container_ids: container_ids(),
            containers: Vec::new(),
        }
    }

    async fn before_all(&self, ctx: &mut Self::Context) -> Result<()> {
        let admin = ctx.client.authenticate_admin().await?;
        ctx.admin_token = Some(admin.clone());

        if ctx.config.timing.purge_public_containers {
            ctx.purge_public_containers(&admin).await?;
        }

        for index in 0..ctx.users.len() {
            let username = ctx.users[index].username.clone();
            ctx.client.new_user(&username, USER_PASSWORD, &admin).await?;
            let token = ctx
                .client
                .authenticate(&username, USER_PASSWORD)
                .await?
                .ok_or_else(|| ConformanceError::Authentication { username: username.clone() })?;
            ctx.users[index].token = Some(token);
        }

        ctx.client
            .post("orgs/", &org_body(&ctx.org_id, None), Some(&admin))
            .await?
            .expect_status(201)?;
        ctx.org_created = true;

        for member in &ctx.users[..2] {
            let path = join_url(&["orgs", ctx.org_id.as_str(), "members", member.username.as_str()]);
            ctx.client.put(&path, None, Some(&admin)).await?;
        }

        let creator = ctx.token(Reader::User(0))?.map(str::to_string);
        let layout = [
            (Scope::FirstUser, false),
            (Scope::FirstUser, true),
            (Scope::Org, false),
            (Scope::Org, true),
        ];
        for ((scope, public), id) in layout.into_iter().zip(ctx.container_ids.clone()) {
            let (owner, owner_id) = match scope {
                Scope::Org => (OwnerKind::Organization, ctx.org_id.clone()),
                _ => (OwnerKind::User, ctx.users[0].username.clone()),
            };
            let access = if public { PublicAccess::View } else { PublicAccess::None };
            let path = join_url(&[owner_url(owner, &owner_id).as_str(), ctx.kind.segment()]);

            ctx.client
                .post(&path, &container_fixture(&id, access), creator.as_deref())
                .await?
                .expect_status(201)?;
            ctx.containers.push(Placed {
                scope,
                public,
                url: container_url(owner, &owner_id, ctx.kind, &id),
                id,
            });
        }

        debug!(
            org = %ctx.org_id,
            users = ctx.users.len(),
            containers = ctx.containers.len(),
            "Built visibility graph"
        );
        settle(ctx.config.visibility_settle()).await;
        Ok(())
    }

    fn cases(&self) -> Vec<Case<VisibilityContext>> {
        let plural = self.kind.segment();
        let mut cases = vec![
            exactly(
                format!("logged in user can see their own {}", plural),
                Reader::User(0),
                Scope::FirstUser,
                "",
                user_all,
            ),
            exactly(
                format!("logged in user can see their org's {}", plural),
                Reader::User(1),
                Scope::Org,
                "",
                org_all,
            ),
            exactly(
                format!("logged in user can see another user's public {}", plural),
                Reader::User(1),
                Scope::FirstUser,
                "",
                user_public,
            ),
            exactly(
                format!("logged in user can see another org's public {}", plural),
                Reader::User(2),
                Scope::Org,
                "",
                org_public,
            ),
            never(
                format!("logged in user cannot see another user's private {}", plural),
                Reader::User(1),
                Scope::FirstUser,
                user_private,
            ),
            never(
                format!("logged in user cannot see another org's private {}", plural),
                Reader::User(2),
                Scope::Org,
                org_private,
            ),
            exactly(
                format!("not logged in user can see a user's public {}", plural),
                Reader::Anonymous,
                Scope::FirstUser,
                "",
                user_public,
            ),
            exactly(
                format!("not logged in user can see an org's public {}", plural),
                Reader::Anonymous,
                Scope::Org,
                "",
                org_public,
            ),
            never(
                format!("not logged in user cannot see a user's private {}", plural),
                Reader::Anonymous,
                Scope::FirstUser,
                user_private,
            ),
            never(
                format!("not logged in user cannot see an org's private {}", plural),
                Reader::Anonymous,
                Scope::Org,
                org_private,
            ),
        ];

        for (label, reader) in [
            ("user 1", Reader::User(0)),
            ("user 2", Reader::User(1)),
            ("user 3", Reader::User(2)),
            ("anonymous", Reader::Anonymous),
        ] {
            cases.push(exactly(
                format!("global listing shows only public {} to {}", plural, label),
                reader,
                Scope::Global,
                "",
                any_public,
            ));
        }

        cases.push(exactly(
            format!("query params do not reset the global {} result set", plural),
            Reader::User(0),
            Scope::Global,
            CUSTOM_SCHEMA_QUERY,
            any_public,
        ));

        cases
    }

    async fn after_all(&self, ctx: &Self::Context) -> Result<()> {
        let Some(admin) = ctx.admin_token.as_deref() else {
            return Ok(());
        };

        let mut urls: Vec<String> = ctx.containers.iter().rev().map(|p| p.url.clone()).collect();
        if ctx.org_created {
            urls.push(owner_url(OwnerKind::Organization, &ctx.org_id));
        }
        urls.extend(
            ctx.users
                .iter()
                .filter(|u| u.token.is_some())
                .map(|u| owner_url(OwnerKind::User, &u.username)),
        );

        for url in &urls {
            if let Err(e) = ctx.client.delete(url, Some(admin)).await {
                warn!(url = %url, error = %e, "Delete failed");
            }
        }
        Ok(())
    }
}
