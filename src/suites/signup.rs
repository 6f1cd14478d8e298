use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use super::{Case, Suite};
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::fixtures::Fixtures;
use crate::model::{login_body, signup_body};

const SIGNUP_URL: &str = "users/signup/";
const VERIFICATION_NOTICE: &str = "A verification email has been sent to the address on record.";

/// Self-service account creation
#[derive(Debug, Clone, Copy, Default)]
pub struct SignupSuite;

/// `detail` may come back as a string or a list of strings
fn detail_mentions(detail: &Value, needle: &str) -> bool {
    match detail {
        Value::String(s) => s.contains(needle),
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(needle)),
        _ => false,
    }
}

async fn create_account(ctx: &Fixtures) -> Result<()> {
    let username = ctx.new_id("user");
    let response = ctx
        .client()
        .post(SIGNUP_URL, &signup_body(&username, "test_password"), None)
        .await?;

    response.expect_status(201)?;
    let echoed = response.field_str("username")?;
    if echoed != username {
        return Err(ConformanceError::assertion(format!(
            "Signup echoed username '{}', expected '{}'",
            echoed, username
        )));
    }
    Ok(())
}

async fn requires_confirmation(ctx: &Fixtures) -> Result<()> {
    let username = ctx.new_id("user");
    let password = "test_password";
    ctx.client()
        .post(SIGNUP_URL, &signup_body(&username, password), None)
        .await?;

    let login = ctx
        .client()
        .post("users/login/", &login_body(&username, password), None)
        .await?;
    let detail = login.field("detail")?;
    if !detail_mentions(detail, VERIFICATION_NOTICE) {
        return Err(ConformanceError::assertion(format!(
            "Login before verification returned detail {}",
            detail
        )));
    }
    Ok(())
}

#[async_trait]
impl Suite for SignupSuite {
    type Context = Fixtures;

    fn name(&self) -> String {
        "signup".to_string()
    }

    fn context(&self, client: ApiClient, config: &Config) -> Self::Context {
        Fixtures::new(client, config.clone())
    }

    fn cases(&self) -> Vec<Case<Fixtures>> {
        vec![
            Case::new("allows user to create account", |ctx: &Fixtures| create_account(ctx).boxed()),
            Case::new("requires email confirmation", |ctx: &Fixtures| requires_confirmation(ctx).boxed()),
        ]
    }
}
