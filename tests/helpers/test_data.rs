// tests/helpers/test_data.rs - Test data generators

use serde_json::{json, Value};

/// Org list entry as the API renders it
pub fn org_entry(id: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "url": format!("/orgs/{}/", id),
        "members": 1,
        "public_access": "View",
    })
}

/// Verbose source entry owned by a user
pub fn user_source_entry(user: &str, id: &str, public_access: &str) -> Value {
    json!({
        "id": id,
        "short_code": id,
        "name": id,
        "owner": user,
        "owner_type": "User",
        "owner_url": format!("/users/{}/", user),
        "url": format!("/users/{}/sources/{}/", user, id),
        "public_access": public_access,
        "versions_url": format!("/users/{}/sources/{}/versions/", user, id),
    })
}
