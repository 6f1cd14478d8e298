// src/suites/mod.rs - Suite trait, case type and the suite registry

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::matchers::{array_contains_all, array_excludes};
use crate::model::ContainerKind;
use crate::runner::RunnableSuite;

pub mod child_resource;
pub mod container;
pub mod login;
pub mod org;
pub mod org_visibility;
pub mod signup;
pub mod visibility;

pub use child_resource::{ChildKind, ChildResourceSuite};
pub use container::ContainerSuite;
pub use login::LoginSuite;
pub use org::OrgSuite;
pub use org_visibility::OrgVisibilitySuite;
pub use signup::SignupSuite;
pub use visibility::VisibilitySuite;

/// A group of cases sharing one context.
///
/// The context is built without I/O by [`Suite::context`] so that
/// [`Suite::after_all`] can still clean up when [`Suite::before_all`] fails
/// half way.
#[async_trait]
pub trait Suite: Send + Sync {
    type Context: Send + Sync;

    fn name(&self) -> String;

    fn context(&self, client: ApiClient, config: &Config) -> Self::Context;

    async fn before_all(&self, _ctx: &mut Self::Context) -> Result<()> {
        Ok(())
    }

    /// Cases in execution order
    fn cases(&self) -> Vec<Case<Self::Context>>;

    async fn after_each(&self, _ctx: &Self::Context) -> Result<()> {
        Ok(())
    }

    async fn after_all(&self, _ctx: &Self::Context) -> Result<()> {
        Ok(())
    }
}

type CheckFn<C> = Box<dyn for<'a> Fn(&'a C) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// One named check run against a suite context
pub struct Case<C> {
    pub name: String,
    pub skip: bool,
    check: CheckFn<C>,
}

impl<C> Case<C> {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            skip: false,
            check: Box::new(check),
        }
    }

    /// Keep the case listed but do not run it
    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn run<'a>(&self, ctx: &'a C) -> BoxFuture<'a, Result<()>> {
        (self.check)(ctx)
    }
}

impl<C> std::fmt::Debug for Case<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Case")
            .field("name", &self.name)
            .field("skip", &self.skip)
            .finish()
    }
}

/// Every suite, in the order `run` executes them
pub fn all() -> Vec<Box<dyn RunnableSuite>> {
    vec![
        Box::new(LoginSuite),
        Box::new(SignupSuite),
        Box::new(OrgVisibilitySuite),
        Box::new(OrgSuite),
        Box::new(ContainerSuite::new(ContainerKind::Source)),
        Box::new(ContainerSuite::new(ContainerKind::Collection)),
        Box::new(ChildResourceSuite::new(ChildKind::Concept)),
        Box::new(ChildResourceSuite::new(ChildKind::Mapping)),
        Box::new(VisibilitySuite::new(ContainerKind::Source)),
        Box::new(VisibilitySuite::new(ContainerKind::Collection)),
    ]
}

/// Select suites by name, keeping registry order
pub fn select(names: &[String]) -> Result<Vec<Box<dyn RunnableSuite>>> {
    let suites = all();
    if names.is_empty() {
        return Ok(suites);
    }

    let known: Vec<String> = suites.iter().map(|s| s.name()).collect();
    if let Some(unknown) = names.iter().find(|n| !known.contains(n)) {
        return Err(ConformanceError::Configuration(format!(
            "Unknown suite '{}'. Available: {}",
            unknown,
            known.join(", ")
        )));
    }

    Ok(suites
        .into_iter()
        .filter(|s| names.contains(&s.name()))
        .collect())
}

/// The built-in public organization every server carries
pub fn ocl_org() -> Value {
    json!({ "id": "OCL", "name": "Open Concept Lab", "url": "/orgs/OCL/" })
}

/// GET `path` and check the listing holds every `include` item and none of `exclude`
pub async fn expect_listing(
    client: &ApiClient,
    path: &str,
    token: Option<&str>,
    status: Option<u16>,
    include: &[Value],
    exclude: &[Value],
) -> Result<Value> {
    let response = client.get(path, token).await?;
    if let Some(status) = status {
        response.expect_status(status)?;
    }
    array_contains_all(&response.body, include)?;
    array_excludes(&response.body, exclude)?;
    Ok(response.body)
}
