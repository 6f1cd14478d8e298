// src/fixtures.rs - Owner/container graph shared by the authorization suites

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{settle, ApiClient, ApiResponse};
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::model::{
    concept_body, container_body, mapping_body, org_body, Actor, ContainerKind, OwnerKind,
    PublicAccess,
};
use crate::url::join_url;

/// Id and relative URL of one fixture entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
struct Tokens {
    admin: Option<String>,
    member: Option<String>,
    second_member: Option<String>,
    non_member: Option<String>,
}

/// Random lowercase hex below 100 000 000
fn random_hex() -> String {
    format!("{:x}", fastrand::u32(..100_000_000))
}

pub fn owner_url(owner: OwnerKind, owner_id: &str) -> String {
    join_url(&[owner.segment(), owner_id])
}

pub fn container_url(owner: OwnerKind, owner_id: &str, kind: ContainerKind, id: &str) -> String {
    join_url(&[owner.segment(), owner_id, kind.segment(), id])
}

/// The named graph of users, orgs, containers and concepts.
///
/// Names are derived once per run from `unique_id`; the graph itself is only
/// created by [`Fixtures::setup`]. Cases share the fixtures immutably, so the
/// per-case cleanup queue sits behind a mutex.
#[derive(Debug)]
pub struct Fixtures {
    client: ApiClient,
    config: Config,
    unique_id: String,
    tokens: Tokens,
    urls_to_delete: Mutex<Vec<String>>,

    pub member_user: Entity,
    pub member_user_2: Entity,
    pub non_member_user: Entity,

    pub org1: Entity,
    pub private_org: Entity,
    pub private_admin_org: Entity,
    pub view_org: Entity,
    pub edit_org: Entity,

    pub private_source: Entity,
    pub view_source: Entity,
    pub edit_source: Entity,
    pub private_edit_org_owned_source: Entity,

    pub private_collection: Entity,
    pub view_collection: Entity,
    pub edit_collection: Entity,
    pub private_edit_org_owned_collection: Entity,

    pub private_user_owned_source: Entity,
    pub view_user_owned_source: Entity,
    pub private_org1_owned_source: Entity,
    pub private_user_owned_collection: Entity,
    pub view_user_owned_collection: Entity,

    pub private_user_owned_concept_1: Entity,
    pub private_user_owned_concept_2: Entity,
    pub private_org1_owned_concept_1: Entity,
    pub private_org1_owned_concept_2: Entity,
}

impl Fixtures {
    pub fn new(client: ApiClient, config: Config) -> Self {
        let unique_id = random_hex();
        let new_id = |kind: &str| format!("Test-{}-{}-{}", unique_id, random_hex(), kind);

        let user = |kind: &str| {
            let id = new_id(kind);
            Entity { url: owner_url(OwnerKind::User, &id), id }
        };
        let org = |kind: &str| {
            let id = new_id(kind);
            Entity { url: owner_url(OwnerKind::Organization, &id), id }
        };
        let under = |parent: &Entity, segment: &str, kind: &str| {
            let id = new_id(kind);
            Entity { url: join_url(&[parent.url.as_str(), segment, id.as_str()]), id }
        };

        let member_user = user("Member-User");
        let member_user_2 = user("Member-User-2");
        let non_member_user = user("NonMember-User");

        let org1 = org("Org-1");
        let private_org = org("Private-Org");
        let private_admin_org = org("Private-Org");
        let view_org = org("View-Org");
        let edit_org = org("Edit-Org");

        let private_source = under(&view_org, "sources", "Private-Source");
        let view_source = under(&view_org, "sources", "View-Source");
        let edit_source = under(&view_org, "sources", "Edit-Source");
        let private_edit_org_owned_source =
            under(&edit_org, "sources", "Private-Edit-Org-Owned-Source");

        let private_collection = under(&view_org, "collections", "Private-Collection");
        let view_collection = under(&view_org, "collections", "View-Collection");
        let edit_collection = under(&view_org, "collections", "Edit-Collection");
        let private_edit_org_owned_collection =
            under(&edit_org, "collections", "Private-Edit-Org-Owned-Collection");

        let private_user_owned_source =
            under(&non_member_user, "sources", "Private-User-Owned-Source");
        let view_user_owned_source = under(&non_member_user, "sources", "View-User-Owned-Source");
        let private_org1_owned_source = under(&org1, "sources", "Private-Org-1-Owned-Source");
        let private_user_owned_collection =
            under(&non_member_user, "collections", "Private-User-Owned-Collection");
        let view_user_owned_collection =
            under(&non_member_user, "collections", "View-User-Owned-Collection");

        let private_user_owned_concept_1 =
            under(&private_user_owned_source, "concepts", "Private-User-Owned-Concept-1");
        let private_user_owned_concept_2 =
            under(&private_user_owned_source, "concepts", "Private-User-Owned-Concept-2");
        let private_org1_owned_concept_1 =
            under(&private_org1_owned_source, "concepts", "Private-Org-1-Owned-Concept-1");
        let private_org1_owned_concept_2 =
            under(&private_org1_owned_source, "concepts", "Private-Org-1-Owned-Concept-2");

        Self {
            client,
            config,
            unique_id,
            tokens: Tokens::default(),
            urls_to_delete: Mutex::new(Vec::new()),
            member_user,
            member_user_2,
            non_member_user,
            org1,
            private_org,
            private_admin_org,
            view_org,
            edit_org,
            private_source,
            view_source,
            edit_source,
            private_edit_org_owned_source,
            private_collection,
            view_collection,
            edit_collection,
            private_edit_org_owned_collection,
            private_user_owned_source,
            view_user_owned_source,
            private_org1_owned_source,
            private_user_owned_collection,
            view_user_owned_collection,
            private_user_owned_concept_1,
            private_user_owned_concept_2,
            private_org1_owned_concept_1,
            private_org1_owned_concept_2,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn new_id(&self, kind: &str) -> String {
        format!("Test-{}-{}-{}", self.unique_id, random_hex(), kind)
    }

    /// Token a request is issued with; `None` means anonymous
    pub fn token(&self, actor: Actor) -> Option<&str> {
        match actor {
            Actor::Anonymous => None,
            Actor::Staff => self.tokens.admin.as_deref(),
            Actor::Member => self.tokens.member.as_deref(),
            Actor::SecondMember => self.tokens.second_member.as_deref(),
            Actor::NonMember => self.tokens.non_member.as_deref(),
        }
    }

    pub fn admin_token(&self) -> Result<&str> {
        self.tokens
            .admin
            .as_deref()
            .ok_or_else(|| ConformanceError::Internal("Fixtures used before setup".to_string()))
    }

    async fn login(&self, user: &Entity) -> Result<String> {
        self.client
            .authenticate(&user.id, &user.id)
            .await?
            .ok_or_else(|| ConformanceError::Authentication {
                username: user.id.clone(),
            })
    }

    /// Build the graph, in dependency order
    pub async fn setup(&mut self) -> Result<()> {
        let started = std::time::Instant::now();
        info!(unique_id = %self.unique_id, "Creating fixture graph");

        let admin = self.client.authenticate_admin().await?;
        self.tokens.admin = Some(admin.clone());
        let admin = Some(admin.as_str());

        self.client.delete(&self.private_admin_org.url, admin).await?;
        self.post_org(&self.private_admin_org.id, admin, Some(PublicAccess::None))
            .await?;

        for user in [&self.member_user, &self.member_user_2, &self.non_member_user] {
            self.client.new_user(&user.id, &user.id, admin.unwrap_or_default()).await?;
        }
        self.tokens.member = Some(self.login(&self.member_user).await?);
        self.tokens.second_member = Some(self.login(&self.member_user_2).await?);
        self.tokens.non_member = Some(self.login(&self.non_member_user).await?);

        let member = self.token(Actor::Member);
        let non_member = self.token(Actor::NonMember);

        self.client.delete(&self.org1.url, member).await?;
        self.post_org(&self.org1.id, member, Some(PublicAccess::None)).await?;
        self.client.delete(&self.private_org.url, member).await?;
        self.post_org(&self.private_org.id, member, Some(PublicAccess::None)).await?;
        self.post_org(&self.view_org.id, member, Some(PublicAccess::View)).await?;
        self.post_org(&self.edit_org.id, member, Some(PublicAccess::Edit)).await?;

        self.add_user_to_org(&self.org1.id, &self.member_user.id).await?;
        self.add_user_to_org(&self.org1.id, &self.member_user_2.id).await?;

        let view_org = self.view_org.id.as_str();
        let edit_org = self.edit_org.id.as_str();
        self.post_org_source(view_org, &self.private_source.id, member, Some(PublicAccess::None)).await?;
        self.post_org_source(view_org, &self.view_source.id, member, Some(PublicAccess::View)).await?;
        self.post_org_source(view_org, &self.edit_source.id, member, Some(PublicAccess::Edit)).await?;
        self.post_org_source(edit_org, &self.private_edit_org_owned_source.id, member, Some(PublicAccess::None))
            .await?;

        self.post_org_collection(view_org, &self.private_collection.id, member, Some(PublicAccess::None))
            .await?;
        self.post_org_collection(view_org, &self.view_collection.id, member, Some(PublicAccess::View))
            .await?;
        self.post_org_collection(view_org, &self.edit_collection.id, member, Some(PublicAccess::Edit))
            .await?;
        self.post_org_collection(
            edit_org,
            &self.private_edit_org_owned_collection.id,
            member,
            Some(PublicAccess::None),
        )
        .await?;

        let non_member_id = self.non_member_user.id.as_str();
        self.post_user_source(non_member_id, &self.private_user_owned_source.id, non_member, Some(PublicAccess::None))
            .await?;
        self.post_org_source(&self.org1.id, &self.private_org1_owned_source.id, member, Some(PublicAccess::None))
            .await?;
        self.post_user_source(non_member_id, &self.view_user_owned_source.id, non_member, Some(PublicAccess::View))
            .await?;

        self.post_user_collection(
            non_member_id,
            &self.private_user_owned_collection.id,
            non_member,
            Some(PublicAccess::None),
        )
        .await?;
        self.post_user_collection(
            non_member_id,
            &self.view_user_owned_collection.id,
            non_member,
            Some(PublicAccess::View),
        )
        .await?;

        let user_source = self.private_user_owned_source.url.as_str();
        let org1_source = self.private_org1_owned_source.url.as_str();
        self.post_concept(user_source, &self.private_user_owned_concept_1.id, non_member).await?;
        self.post_concept(user_source, &self.private_user_owned_concept_2.id, non_member).await?;
        self.post_concept(org1_source, &self.private_org1_owned_concept_1.id, member).await?;
        self.post_concept(org1_source, &self.private_org1_owned_concept_2.id, member).await?;

        info!(
            unique_id = %self.unique_id,
            "Fixture graph created in {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Delete the graph as admin, children before parents
    pub async fn teardown(&self) -> Result<()> {
        let urls = [
            &self.private_org1_owned_concept_2,
            &self.private_org1_owned_concept_1,
            &self.private_user_owned_concept_2,
            &self.private_user_owned_concept_1,
            &self.private_user_owned_collection,
            &self.view_user_owned_collection,
            &self.private_org1_owned_source,
            &self.private_user_owned_source,
            &self.view_user_owned_source,
            &self.private_edit_org_owned_collection,
            &self.private_collection,
            &self.edit_collection,
            &self.view_collection,
            &self.private_edit_org_owned_source,
            &self.private_source,
            &self.edit_source,
            &self.view_source,
            &self.view_org,
            &self.edit_org,
            &self.private_org,
            &self.org1,
            &self.private_admin_org,
            &self.non_member_user,
            &self.member_user_2,
            &self.member_user,
        ];

        let urls: Vec<&str> = urls.iter().map(|e| e.url.as_str()).collect();
        self.delete_all(&urls).await
    }

    /// Queue URLs for deletion after the current case
    pub async fn cleanup<S: Into<String>>(&self, urls: impl IntoIterator<Item = S>) {
        let mut queue = self.urls_to_delete.lock().await;
        queue.extend(urls.into_iter().map(Into::into));
    }

    /// Delete queued URLs newest-first
    pub async fn after_each(&self) -> Result<()> {
        let urls: Vec<String> = {
            let mut queue = self.urls_to_delete.lock().await;
            queue.drain(..).rev().collect()
        };
        if urls.is_empty() {
            return Ok(());
        }

        debug!(count = urls.len(), "Deleting case resources");
        let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
        self.delete_all(&urls).await
    }

    async fn delete_all(&self, urls: &[&str]) -> Result<()> {
        let admin = self.admin_token()?;
        for url in urls {
            match self.client.delete(url, Some(admin)).await {
                Ok(response) if !response.is_success() && response.status != 404 => {
                    warn!(url = %url, status = response.status, "Delete was refused");
                }
                Ok(_) => {}
                Err(e) => warn!(url = %url, error = %e, "Delete failed"),
            }
        }
        Ok(())
    }

    pub async fn add_user_to_org(&self, org_id: &str, user_id: &str) -> Result<ApiResponse> {
        let url = join_url(&["orgs", org_id, "members", user_id]);
        self.client.put(&url, None, Some(self.admin_token()?)).await
    }

    pub async fn post_org(
        &self,
        org_id: &str,
        token: Option<&str>,
        access: Option<PublicAccess>,
    ) -> Result<ApiResponse> {
        self.client.post("orgs/", &org_body(org_id, access), token).await
    }

    /// Create a container and wait for the index
    pub async fn post_container(
        &self,
        owner: OwnerKind,
        owner_id: &str,
        kind: ContainerKind,
        id: &str,
        token: Option<&str>,
        access: Option<PublicAccess>,
    ) -> Result<ApiResponse> {
        let url = join_url(&[owner.segment(), owner_id, kind.segment()]);
        let response = self.client.post(&url, &container_body(id, access), token).await?;
        settle(self.config.index_settle()).await;
        Ok(response)
    }

    pub async fn post_org_source(
        &self,
        org_id: &str,
        source_id: &str,
        token: Option<&str>,
        access: Option<PublicAccess>,
    ) -> Result<ApiResponse> {
        self.post_container(OwnerKind::Organization, org_id, ContainerKind::Source, source_id, token, access)
            .await
    }

    pub async fn post_org_collection(
        &self,
        org_id: &str,
        collection_id: &str,
        token: Option<&str>,
        access: Option<PublicAccess>,
    ) -> Result<ApiResponse> {
        self.post_container(
            OwnerKind::Organization,
            org_id,
            ContainerKind::Collection,
            collection_id,
            token,
            access,
        )
        .await
    }

    pub async fn post_user_source(
        &self,
        user_id: &str,
        source_id: &str,
        token: Option<&str>,
        access: Option<PublicAccess>,
    ) -> Result<ApiResponse> {
        self.post_container(OwnerKind::User, user_id, ContainerKind::Source, source_id, token, access)
            .await
    }

    pub async fn post_user_collection(
        &self,
        user_id: &str,
        collection_id: &str,
        token: Option<&str>,
        access: Option<PublicAccess>,
    ) -> Result<ApiResponse> {
        self.post_container(OwnerKind::User, user_id, ContainerKind::Collection, collection_id, token, access)
            .await
    }

    pub async fn post_concept(&self, container_url: &str, concept_id: &str, token: Option<&str>) -> Result<ApiResponse> {
        let url = join_url(&[container_url, "concepts"]);
        let response = self.client.post(&url, &concept_body(concept_id), token).await?;
        settle(self.config.index_settle()).await;
        Ok(response)
    }

    pub async fn post_mapping(
        &self,
        container_url: &str,
        from_concept_url: &str,
        to_concept_url: &str,
        token: Option<&str>,
    ) -> Result<ApiResponse> {
        let url = join_url(&[container_url, "mappings"]);
        let external_id = self.new_id("Mapping-External-Id");
        let body = mapping_body(from_concept_url, to_concept_url, &external_id);
        let response = self.client.post(&url, &body, token).await?;
        settle(self.config.index_settle()).await;
        Ok(response)
    }

    pub fn to_org(&self, org_id: &str, name: Option<&str>) -> Value {
        json!({
            "id": org_id,
            "name": name.unwrap_or(org_id),
            "url": owner_url(OwnerKind::Organization, org_id),
        })
    }

    /// List projection of a container; collections also expose `id`
    pub fn to_container(
        &self,
        owner: OwnerKind,
        owner_id: &str,
        kind: ContainerKind,
        id: &str,
        name: Option<&str>,
    ) -> Value {
        let mut projection = json!({
            "name": name.unwrap_or(id),
            "owner": owner_id,
            "owner_type": owner.owner_type(),
            "owner_url": owner_url(owner, owner_id),
            "short_code": id,
            "url": container_url(owner, owner_id, kind, id),
        });
        if kind == ContainerKind::Collection {
            projection["id"] = json!(id);
        }
        projection
    }

    pub fn to_source(&self, org_id: &str, source_id: &str, name: Option<&str>) -> Value {
        self.to_container(OwnerKind::Organization, org_id, ContainerKind::Source, source_id, name)
    }

    pub fn to_user_source(&self, user_id: &str, source_id: &str, name: Option<&str>) -> Value {
        self.to_container(OwnerKind::User, user_id, ContainerKind::Source, source_id, name)
    }

    pub fn to_org_collection(&self, org_id: &str, collection_id: &str, name: Option<&str>) -> Value {
        self.to_container(OwnerKind::Organization, org_id, ContainerKind::Collection, collection_id, name)
    }

    pub fn to_user_collection(&self, user_id: &str, collection_id: &str, name: Option<&str>) -> Value {
        self.to_container(OwnerKind::User, user_id, ContainerKind::Collection, collection_id, name)
    }
}
