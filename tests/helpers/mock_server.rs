// tests/helpers/mock_server.rs - Mock OCL API for testing

use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;

const VERIFICATION_NOTICE: &str = "A verification email has been sent to the address on record.";

/// One request as the mock saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

/// What `/sources/` and `/collections/` return to a signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlobalSearch {
    /// Public containers plus the ones the user owns or shares an org with
    #[default]
    PublicAndBelonging,
    /// Public containers only, whoever asks (staff still sees everything)
    PublicOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requester {
    Anonymous,
    Staff,
    User(String),
}

impl Requester {
    fn username(&self) -> Option<&str> {
        match self {
            Requester::User(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    verified: bool,
}

#[derive(Debug, Clone)]
struct Org {
    id: String,
    name: String,
    public_access: String,
    members: Vec<String>,
}

impl Org {
    fn url(&self) -> String {
        format!("/orgs/{}/", self.id)
    }

    fn entry(&self) -> Value {
        json!({ "id": self.id, "name": self.name, "url": self.url() })
    }

    fn detail(&self) -> Value {
        let mut detail = self.entry();
        detail["public_access"] = json!(self.public_access);
        detail["members_url"] = json!(format!("{}members/", self.url()));
        detail
    }

    fn is_public(&self) -> bool {
        self.public_access != "None"
    }
}

#[derive(Debug, Clone)]
struct Container {
    owner_segment: String,
    owner: String,
    kind: String,
    id: String,
    name: String,
    short_code: String,
    public_access: String,
    created_by: Option<String>,
    concepts: Vec<Value>,
    versions: Vec<(String, Vec<Value>)>,
}

impl Container {
    fn url(&self) -> String {
        format!("/{}/{}/{}/{}/", self.owner_segment, self.owner, self.kind, self.id)
    }

    fn is_public(&self) -> bool {
        self.public_access != "None"
    }

    /// Entry as rendered in a plain listing
    fn entry(&self) -> Value {
        let owner_type = if self.owner_segment == "orgs" { "Organization" } else { "User" };
        let mut entry = json!({
            "name": self.name,
            "owner": self.owner,
            "owner_type": owner_type,
            "owner_url": format!("/{}/{}/", self.owner_segment, self.owner),
            "short_code": self.short_code,
            "url": self.url(),
        });
        if self.kind == "collections" {
            entry["id"] = json!(self.id);
        }
        entry
    }

    fn verbose(&self) -> Value {
        let mut detail = self.entry();
        detail["id"] = json!(self.id);
        detail["public_access"] = json!(self.public_access);
        detail
    }

    fn render(&self, verbose: bool) -> Value {
        if verbose {
            self.verbose()
        } else {
            self.entry()
        }
    }
}

fn denied(who: &Requester) -> (u16, Value) {
    match who {
        Requester::Anonymous => (401, json!({ "detail": "Authentication credentials were not provided." })),
        _ => (403, json!({ "detail": "You do not have permission to perform this action." })),
    }
}

fn not_found() -> (u16, Value) {
    (404, json!({ "detail": "Not found." }))
}

/// Ids arrive as strings from the fixtures and as numbers from some callers
fn body_id(body: &Value) -> Option<String> {
    match body.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn is_owner_segment(segment: &str) -> bool {
    segment == "orgs" || segment == "users"
}

fn is_container_kind(segment: &str) -> bool {
    segment == "sources" || segment == "collections"
}

/// Users, orgs and containers with the access rules the suites check
#[derive(Debug)]
struct ApiState {
    accounts: HashMap<String, Account>,
    orgs: Vec<Org>,
    containers: Vec<Container>,
    global_search: GlobalSearch,
    leak_private: bool,
}

impl ApiState {
    fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            orgs: vec![Org {
                id: "OCL".to_string(),
                name: "Open Concept Lab".to_string(),
                public_access: "View".to_string(),
                members: Vec::new(),
            }],
            containers: Vec::new(),
            global_search: GlobalSearch::default(),
            leak_private: false,
        }
    }

    fn org(&self, id: &str) -> Option<&Org> {
        self.orgs.iter().find(|o| o.id == id)
    }

    fn is_member(&self, org_id: &str, username: &str) -> bool {
        self.org(org_id)
            .map(|o| o.members.iter().any(|m| m == username))
            .unwrap_or(false)
    }

    fn container_index(&self, owner_segment: &str, owner: &str, kind: &str, id: &str) -> Option<usize> {
        self.containers
            .iter()
            .position(|c| c.owner_segment == owner_segment && c.owner == owner && c.kind == kind && c.id == id)
    }

    fn belongs(&self, container: &Container, who: &Requester) -> bool {
        match who {
            Requester::Staff => true,
            Requester::Anonymous => false,
            Requester::User(name) => {
                container.created_by.as_deref() == Some(name.as_str())
                    || (container.owner_segment == "users" && container.owner == *name)
                    || (container.owner_segment == "orgs" && self.is_member(&container.owner, name))
            }
        }
    }

    fn can_view(&self, container: &Container, who: &Requester) -> bool {
        self.leak_private || container.is_public() || self.belongs(container, who)
    }

    fn can_edit(&self, container: &Container, who: &Requester) -> bool {
        match who {
            Requester::Anonymous => false,
            _ => container.public_access == "Edit" || self.belongs(container, who),
        }
    }

    fn login(&self, admin_user: &str, admin_password: &str, body: &Value) -> (u16, Value) {
        let (Some(username), Some(password)) = (body["username"].as_str(), body["password"].as_str()) else {
            return (400, json!({ "detail": "Must include username and password." }));
        };

        if username == admin_user && password == admin_password {
            return (200, json!({ "token": format!("tok-{}", username) }));
        }
        match self.accounts.get(username) {
            Some(account) if account.password == password && account.verified => {
                (200, json!({ "token": format!("tok-{}", username) }))
            }
            Some(account) if account.password == password => (401, json!({ "detail": VERIFICATION_NOTICE })),
            _ => (401, json!({ "detail": "Unable to log in with provided credentials." })),
        }
    }

    fn register(&mut self, body: &Value, verified: bool) -> (u16, Value) {
        let username = body["username"].as_str().unwrap_or_default().to_string();
        let password = body["password"].as_str().unwrap_or_default().to_string();
        if username.is_empty() {
            return (400, json!({ "detail": "username is required" }));
        }
        self.accounts.insert(username.clone(), Account { password, verified });
        (201, json!({ "username": username, "url": format!("/users/{}/", username) }))
    }

    fn reactivate(&mut self, who: &Requester, username: &str) -> (u16, Value) {
        if *who != Requester::Staff {
            return denied(who);
        }
        match self.accounts.get_mut(username) {
            Some(account) => {
                account.verified = true;
                (204, Value::Null)
            }
            None => not_found(),
        }
    }

    fn delete_user(&mut self, who: &Requester, username: &str) -> (u16, Value) {
        if *who != Requester::Staff {
            return denied(who);
        }
        match self.accounts.remove(username) {
            Some(_) => (204, Value::Null),
            None => not_found(),
        }
    }

    fn list_orgs(&self, who: &Requester) -> (u16, Value) {
        let visible: Vec<Value> = self
            .orgs
            .iter()
            .filter(|o| {
                *who == Requester::Staff
                    || o.is_public()
                    || who.username().map(|u| o.members.iter().any(|m| m == u)).unwrap_or(false)
            })
            .map(Org::entry)
            .collect();
        (200, Value::Array(visible))
    }

    fn create_org(&mut self, who: &Requester, body: &Value) -> (u16, Value) {
        if *who == Requester::Anonymous {
            return denied(who);
        }
        let Some(id) = body_id(body) else {
            return (400, json!({ "id": ["This field is required."] }));
        };
        if self.org(&id).is_some() {
            return (400, json!({ "detail": format!("Organization with mnemonic {} already exists.", id) }));
        }

        let org = Org {
            name: body["name"].as_str().unwrap_or(&id).to_string(),
            public_access: body["public_access"].as_str().unwrap_or("View").to_string(),
            members: who.username().map(|u| vec![u.to_string()]).unwrap_or_default(),
            id,
        };
        let detail = org.detail();
        self.orgs.push(org);
        (201, detail)
    }

    fn get_org(&self, who: &Requester, id: &str) -> (u16, Value) {
        match self.org(id) {
            None => not_found(),
            Some(org)
                if org.is_public()
                    || *who == Requester::Staff
                    || who.username().map(|u| self.is_member(id, u)).unwrap_or(false) =>
            {
                (200, org.detail())
            }
            Some(_) => denied(who),
        }
    }

    fn update_org(&mut self, who: &Requester, id: &str, body: &Value) -> (u16, Value) {
        if *who == Requester::Anonymous {
            return denied(who);
        }
        let member = who.username().map(|u| self.is_member(id, u)).unwrap_or(false);
        let Some(org) = self.orgs.iter_mut().find(|o| o.id == id) else {
            return not_found();
        };
        if !(*who == Requester::Staff || member || org.public_access == "Edit") {
            return denied(who);
        }
        if let Some(name) = body["name"].as_str() {
            org.name = name.to_string();
        }
        (200, org.detail())
    }

    fn delete_org(&mut self, who: &Requester, id: &str) -> (u16, Value) {
        if self.org(id).is_none() {
            return not_found();
        }
        if *who != Requester::Staff {
            return denied(who);
        }
        self.orgs.retain(|o| o.id != id);
        self.containers.retain(|c| !(c.owner_segment == "orgs" && c.owner == id));
        (204, Value::Null)
    }

    fn add_member(&mut self, who: &Requester, org_id: &str, username: &str) -> (u16, Value) {
        let member = who.username().map(|u| self.is_member(org_id, u)).unwrap_or(false);
        let Some(org) = self.orgs.iter_mut().find(|o| o.id == org_id) else {
            return not_found();
        };
        if !(*who == Requester::Staff || member) {
            return denied(who);
        }
        if !org.members.iter().any(|m| m == username) {
            org.members.push(username.to_string());
        }
        (204, Value::Null)
    }

    fn search(&self, who: &Requester, kind: &str, verbose: bool) -> (u16, Value) {
        let items: Vec<Value> = self
            .containers
            .iter()
            .filter(|c| c.kind == kind)
            .filter(|c| match self.global_search {
                GlobalSearch::PublicAndBelonging => self.can_view(c, who),
                GlobalSearch::PublicOnly => self.leak_private || c.is_public() || *who == Requester::Staff,
            })
            .map(|c| c.render(verbose))
            .collect();
        (200, Value::Array(items))
    }

    fn list_owned(&self, who: &Requester, owner_segment: &str, owner: &str, kind: &str, verbose: bool) -> (u16, Value) {
        if owner_segment == "orgs" && self.org(owner).is_none() {
            return not_found();
        }
        let items: Vec<Value> = self
            .containers
            .iter()
            .filter(|c| c.owner_segment == owner_segment && c.owner == owner && c.kind == kind)
            .filter(|c| self.can_view(c, who))
            .map(|c| c.render(verbose))
            .collect();
        (200, Value::Array(items))
    }

    /// Sources owned by every org `username` belongs to
    fn org_sources_of(&self, who: &Requester, username: &str) -> (u16, Value) {
        let items: Vec<Value> = self
            .containers
            .iter()
            .filter(|c| c.kind == "sources" && c.owner_segment == "orgs" && self.is_member(&c.owner, username))
            .filter(|c| self.can_view(c, who))
            .map(Container::entry)
            .collect();
        (200, Value::Array(items))
    }

    fn create_container(
        &mut self,
        who: &Requester,
        owner_segment: &str,
        owner: &str,
        kind: &str,
        body: &Value,
    ) -> (u16, Value) {
        if *who == Requester::Anonymous {
            return (403, json!({ "detail": "You do not have permission to perform this action." }));
        }
        let allowed = match owner_segment {
            "orgs" => {
                if self.org(owner).is_none() {
                    return not_found();
                }
                *who == Requester::Staff || who.username().map(|u| self.is_member(owner, u)).unwrap_or(false)
            }
            _ => *who == Requester::Staff || who.username() == Some(owner),
        };
        if !allowed {
            return denied(who);
        }
        let Some(id) = body_id(body) else {
            return (400, json!({ "id": ["This field is required."] }));
        };
        if self.container_index(owner_segment, owner, kind, &id).is_some() {
            return (400, json!({ "__all__": ["Container with this id already exists."] }));
        }

        let container = Container {
            owner_segment: owner_segment.to_string(),
            owner: owner.to_string(),
            kind: kind.to_string(),
            name: body["name"].as_str().unwrap_or(&id).to_string(),
            short_code: body["short_code"].as_str().unwrap_or(&id).to_string(),
            public_access: body["public_access"].as_str().unwrap_or("View").to_string(),
            created_by: who.username().map(str::to_string),
            concepts: Vec::new(),
            versions: Vec::new(),
            id,
        };
        let detail = container.verbose();
        self.containers.push(container);
        (201, detail)
    }

    fn get_container(&self, who: &Requester, index: usize) -> (u16, Value) {
        let container = &self.containers[index];
        if self.can_view(container, who) {
            (200, container.verbose())
        } else {
            denied(who)
        }
    }

    fn update_container(&mut self, who: &Requester, index: usize, body: &Value) -> (u16, Value) {
        if !self.can_edit(&self.containers[index], who) {
            return denied(who);
        }
        let container = &mut self.containers[index];
        if let Some(name) = body["name"].as_str() {
            container.name = name.to_string();
        }
        if let Some(access) = body["public_access"].as_str() {
            container.public_access = access.to_string();
        }
        (200, container.verbose())
    }

    fn delete_container(&mut self, who: &Requester, index: usize) -> (u16, Value) {
        if !self.can_edit(&self.containers[index], who) {
            return denied(who);
        }
        self.containers.remove(index);
        (204, Value::Null)
    }

    fn create_concept(&mut self, who: &Requester, index: usize, body: &Value) -> (u16, Value) {
        if !self.can_edit(&self.containers[index], who) {
            return denied(who);
        }
        let (Some(id), true) = (body_id(body), body.is_object()) else {
            return (400, json!({ "id": ["This field is required."] }));
        };

        let container = &mut self.containers[index];
        let mut concept = body.clone();
        concept["url"] = json!(format!("{}concepts/{}/", container.url(), id));
        if concept.get("external_id").is_none() {
            concept["external_id"] = Value::Null;
        }
        container.concepts.push(concept.clone());
        (201, concept)
    }

    fn update_concept(&mut self, who: &Requester, index: usize, concept_id: &str, body: &Value) -> (u16, Value) {
        if !self.can_edit(&self.containers[index], who) {
            return denied(who);
        }
        let Some(changes) = body.as_object() else {
            return (400, json!({ "detail": "Expected an object." }));
        };
        let container = &mut self.containers[index];
        let Some(concept) = container
            .concepts
            .iter_mut()
            .find(|c| c["id"].as_str() == Some(concept_id))
        else {
            return not_found();
        };
        for (key, value) in changes {
            concept[key.as_str()] = value.clone();
        }
        (200, concept.clone())
    }

    fn list_concepts(&self, who: &Requester, index: usize, version: Option<&str>) -> (u16, Value) {
        let container = &self.containers[index];
        if !self.can_view(container, who) {
            return denied(who);
        }
        match version {
            None => (200, Value::Array(container.concepts.clone())),
            Some(version) => match container.versions.iter().find(|(id, _)| id == version) {
                Some((_, concepts)) => (200, Value::Array(concepts.clone())),
                None => not_found(),
            },
        }
    }

    /// Snapshot the current concepts under a new version id
    fn create_version(&mut self, who: &Requester, index: usize, body: &Value) -> (u16, Value) {
        if !self.can_edit(&self.containers[index], who) {
            return denied(who);
        }
        let Some(id) = body_id(body) else {
            return (400, json!({ "id": ["This field is required."] }));
        };
        let container = &mut self.containers[index];
        let snapshot = container.concepts.clone();
        container.versions.push((id.clone(), snapshot));
        (201, json!({ "id": id, "url": format!("{}{}/", container.url(), id) }))
    }
}

/// Mock API holding users, orgs, sources, collections and concepts in memory.
///
/// Logins issue `tok-<username>`; the admin token acts as staff. Container
/// reads and writes follow public access, ownership and org membership.
/// Anything it does not model is accepted: GET lists nothing, writes echo.
#[derive(Clone)]
pub struct MockOclApi {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    canned: Arc<Mutex<HashMap<(String, String), (u16, Value)>>>,
    state: Arc<Mutex<ApiState>>,
    admin_user: String,
    admin_password: String,
}

impl MockOclApi {
    pub fn new(admin_user: &str, admin_password: &str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            canned: Arc::new(Mutex::new(HashMap::new())),
            state: Arc::new(Mutex::new(ApiState::new())),
            admin_user: admin_user.to_string(),
            admin_password: admin_password.to_string(),
        }
    }

    /// Answer `method path` with a fixed response
    pub async fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.canned
            .lock()
            .await
            .insert((method.to_string(), path.to_string()), (status, body));
    }

    pub async fn set_global_search(&self, global_search: GlobalSearch) {
        self.state.lock().await.global_search = global_search;
    }

    /// Stop filtering private containers out of listings
    pub async fn leak_private_containers(&self) {
        self.state.lock().await.leak_private = true;
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn requests_with(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub async fn clear_requests(&self) {
        self.requests.lock().await.clear();
    }

    fn requester(&self, state: &ApiState, authorization: Option<&str>) -> Requester {
        let Some(username) = authorization
            .and_then(|h| h.strip_prefix("Token "))
            .and_then(|t| t.strip_prefix("tok-"))
        else {
            return Requester::Anonymous;
        };

        if username == self.admin_user {
            Requester::Staff
        } else if state.accounts.get(username).map(|a| a.verified).unwrap_or(false) {
            Requester::User(username.to_string())
        } else {
            Requester::Anonymous
        }
    }

    async fn handle(&self, request: RecordedRequest) -> (u16, Value) {
        self.requests.lock().await.push(request.clone());

        let key = (request.method.clone(), request.path.clone());
        if let Some(canned) = self.canned.lock().await.get(&key) {
            return canned.clone();
        }

        let mut state = self.state.lock().await;
        let who = self.requester(&state, request.authorization.as_deref());
        let verbose = request.query.split('&').any(|p| p == "verbose=true");
        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        let body = &request.body;

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["users", "login"]) => state.login(&self.admin_user, &self.admin_password, body),
            ("POST", ["users", "signup"]) => state.register(body, false),
            ("POST", ["users"]) => state.register(body, true),
            ("PUT", ["users", user, "reactivate"]) => state.reactivate(&who, user),
            ("DELETE", ["users", user]) => state.delete_user(&who, user),
            ("GET", ["users", user, "orgs", "sources"]) => state.org_sources_of(&who, user),
            ("GET", ["user", "orgs", "sources"]) => match who.username() {
                Some(user) => state.org_sources_of(&who, user),
                None => denied(&who),
            },

            ("GET", ["orgs"]) => state.list_orgs(&who),
            ("POST", ["orgs"]) => state.create_org(&who, body),
            ("GET", ["orgs", org]) => state.get_org(&who, org),
            ("PUT", ["orgs", org]) => state.update_org(&who, org, body),
            ("DELETE", ["orgs", org]) => state.delete_org(&who, org),
            ("PUT", ["orgs", org, "members", user]) => state.add_member(&who, org, user),

            ("GET", [kind]) if is_container_kind(kind) => state.search(&who, kind, verbose),
            ("GET", [segment, owner, kind]) if is_owner_segment(segment) && is_container_kind(kind) => {
                state.list_owned(&who, segment, owner, kind, verbose)
            }
            ("POST", [segment, owner, kind]) if is_owner_segment(segment) && is_container_kind(kind) => {
                state.create_container(&who, segment, owner, kind, body)
            }

            (method, [segment, owner, kind, id, rest @ ..])
                if is_owner_segment(segment) && is_container_kind(kind) =>
            {
                let Some(index) = state.container_index(segment, owner, kind, id) else {
                    return not_found();
                };
                match (method, rest) {
                    ("GET", []) => state.get_container(&who, index),
                    ("PUT", []) => state.update_container(&who, index, body),
                    ("DELETE", []) => state.delete_container(&who, index),
                    ("GET", ["concepts"]) => state.list_concepts(&who, index, None),
                    ("POST", ["concepts"]) => state.create_concept(&who, index, body),
                    ("PUT", ["concepts", concept]) => state.update_concept(&who, index, concept, body),
                    ("POST", ["versions"]) => state.create_version(&who, index, body),
                    ("GET", [version, "concepts"]) => state.list_concepts(&who, index, Some(*version)),
                    ("GET", _) => (200, json!([])),
                    ("POST", _) => (201, body.clone()),
                    ("PUT", _) => (200, body.clone()),
                    _ => (204, Value::Null),
                }
            }

            ("GET", _) => (200, json!([])),
            ("POST", _) => (201, body.clone()),
            ("PUT", _) => (200, body.clone()),
            ("DELETE", _) => (204, Value::Null),
            _ => (405, json!({ "detail": "Method not allowed." })),
        }
    }

    /// Start the mock HTTP server on an ephemeral port
    pub async fn start(&self) -> SocketAddr {
        use warp::Filter;

        let server = self.clone();
        let route = warp::method()
            .and(warp::path::full())
            .and(warp::query::raw().or(warp::any().map(String::new)).unify())
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::header::optional::<String>("content-type"))
            .and(warp::body::bytes())
            .and(warp::any().map(move || server.clone()))
            .and_then(
                |method: warp::http::Method,
                 path: warp::path::FullPath,
                 query: String,
                 authorization: Option<String>,
                 content_type: Option<String>,
                 body: Bytes,
                 server: MockOclApi| async move {
                    let request = RecordedRequest {
                        method: method.to_string(),
                        path: path.as_str().to_string(),
                        query,
                        authorization,
                        content_type,
                        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
                    };
                    let (status, body) = server.handle(request).await;
                    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    Ok::<_, warp::Rejection>(warp::reply::with_status(warp::reply::json(&body), status))
                },
            );

        let (addr, serving) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serving);
        addr
    }
}

/// Start a mock that knows the default admin account and return it with its base URL
pub async fn start_mock_api() -> (MockOclApi, String) {
    let mock = MockOclApi::new("root", "Root123");
    let addr = mock.start().await;
    (mock, format!("http://{}", addr))
}
