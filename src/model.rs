use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Public access level of an owner or container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicAccess {
    None,
    View,
    Edit,
}

impl PublicAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicAccess::None => "None",
            PublicAccess::View => "View",
            PublicAccess::Edit => "Edit",
        }
    }

    /// Lowercase label used in case names
    pub fn label(access: Option<PublicAccess>) -> &'static str {
        match access {
            None => "default",
            Some(PublicAccess::None) => "none",
            Some(PublicAccess::View) => "view",
            Some(PublicAccess::Edit) => "edit",
        }
    }
}

impl fmt::Display for PublicAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerKind {
    Organization,
    User,
}

impl OwnerKind {
    pub fn segment(&self) -> &'static str {
        match self {
            OwnerKind::Organization => "orgs",
            OwnerKind::User => "users",
        }
    }

    /// Value of `owner_type` in list projections
    pub fn owner_type(&self) -> &'static str {
        match self {
            OwnerKind::Organization => "Organization",
            OwnerKind::User => "User",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Source,
    Collection,
}

impl ContainerKind {
    pub fn segment(&self) -> &'static str {
        match self {
            ContainerKind::Source => "sources",
            ContainerKind::Collection => "collections",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            ContainerKind::Source => "source",
            ContainerKind::Collection => "collection",
        }
    }

    /// Id suffix used for throwaway containers
    pub fn id_kind(&self) -> &'static str {
        match self {
            ContainerKind::Source => "Source",
            ContainerKind::Collection => "Collection",
        }
    }
}

/// Who issues a request in an authorization case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    Anonymous,
    Staff,
    Member,
    SecondMember,
    NonMember,
}

impl Actor {
    pub fn label(&self) -> &'static str {
        match self {
            Actor::Anonymous => "anonymous",
            Actor::Staff => "staff",
            Actor::Member => "authenticated member",
            Actor::SecondMember => "second org member",
            Actor::NonMember => "authenticated nonmember",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn org_body(id: &str, access: Option<PublicAccess>) -> Value {
    container_body(id, access)
}

/// Body shared by org, source and collection creates
pub fn container_body(id: &str, access: Option<PublicAccess>) -> Value {
    match access {
        Some(access) => json!({ "id": id, "name": id, "public_access": access.as_str() }),
        None => json!({ "id": id, "name": id }),
    }
}

pub fn concept_body(id: &str) -> Value {
    json!({
        "id": id,
        "datatype": "None",
        "concept_class": "Test",
        "names": [{ "name": id, "locale": "en", "name_type": "FULLY_SPECIFIED" }],
    })
}

pub fn mapping_body(from_concept_url: &str, to_concept_url: &str, external_id: &str) -> Value {
    json!({
        "from_concept_url": from_concept_url,
        "to_concept_url": to_concept_url,
        "map_type": "NARROWER-THAN",
        "external_id": external_id,
    })
}

pub fn user_body(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "password": password,
        "name": username,
        "email": format!("{}@openconceptlab.org", username),
    })
}

pub fn login_body(username: &str, password: &str) -> Value {
    json!({ "username": username, "password": password })
}

/// Self-service signup; the verify urls are required by the API but never followed
pub fn signup_body(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "name": "test_name",
        "password": password,
        "email": format!("{}test@openconceptlab.org", username),
        "email_verify_success_url": "https://example.org",
        "email_verify_failure_url": "https://example.org",
    })
}
