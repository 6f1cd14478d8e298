use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};

use super::{Case, Suite};
use crate::client::ApiClient;
use crate::config::Config;
use crate::model::login_body;

const LOGIN_URL: &str = "users/login/";

/// Credential checks against `users/login/`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginSuite;

/// Post `body` anonymously and expect `status`
fn rejected(name: &str, body: Value, status: u16) -> Case<ApiClient> {
    Case::new(name, move |client: &ApiClient| {
        let body = body.clone();
        async move {
            client.post(LOGIN_URL, &body, None).await?.expect_status(status)?;
            Ok(())
        }
        .boxed()
    })
}

#[async_trait]
impl Suite for LoginSuite {
    type Context = ApiClient;

    fn name(&self) -> String {
        "login".to_string()
    }

    fn context(&self, client: ApiClient, _config: &Config) -> Self::Context {
        client
    }

    fn cases(&self) -> Vec<Case<ApiClient>> {
        vec![
            Case::new("succeeds with correct credentials", |client: &ApiClient| {
                async move {
                    let body = login_body(client.admin_user(), client.admin_password());
                    let response = client.post(LOGIN_URL, &body, None).await?;
                    response.expect_status(200)?;
                    response.field("token")?;
                    Ok(())
                }
                .boxed()
            }),
            rejected("fails with invalid username", login_body("someuser", "somepassword"), 401),
            rejected("fails with invalid password", login_body("admin", "somepassword"), 401),
            rejected("fails with missing credentials", json!({}), 400),
            rejected("fails with missing username", json!({ "password": "Admin123" }), 400),
            rejected("fails with missing password", json!({ "username": "admin" }), 400),
            rejected("fails with username ignoring case", login_body("ADMIN", "Admin123"), 401),
            rejected("fails with password ignoring case", login_body("admin", "admin123"), 401),
        ]
    }
}
