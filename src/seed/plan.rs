// src/seed/plan.rs - Seeding profiles and the documents they write

use bson::{doc, Bson, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::{ensure_document, id_string, Datastore, Ensured};
use crate::error::{ConformanceError, Result};

pub const PERF_TEST_TOKEN: &str = "PERF_TEST_TOKEN";

const HASHED_PASSWORD: &str =
    "pbkdf2_sha256$12000$yMqFqGO18PDJ$EBtldEM060wWn0cgsQ+gW7Gr5BLy/Xl/9sXZw82bsbI=";

/// Organization and source mnemonics seeded by every profile
pub const ORG_SOURCES: [(&str, &str); 19] = [
    ("perf", "src"),
    ("IHTSDO", "SNOMED-CT"),
    ("WHO", "ICD-10-WHO"),
    ("AMPATH", "AMPATH"),
    ("IMO", "IMO-ProblemIT"),
    ("3BT", "3BT"),
    ("WICC", "ICPC2"),
    ("IHTSDO", "SNOMED-NP"),
    ("PIH", "PIH"),
    ("IMO", "IMO-ProcedureIT"),
    ("HL7", "HL-7-CVX"),
    ("Regenstrief", "LOINC"),
    ("PIH", "PIH-Malawi"),
    ("OpenMRS", "org.openmrs.module.mdrtb"),
    ("NLM", "RxNORM"),
    ("WHO", "ICD-10-WHO-2nd"),
    ("CIEL", "SNOMED-MVP"),
    ("NLM", "RxNORM-Comb"),
    ("OpenMRS", "org.openmrs.module.emrapi"),
];

const CHILD_COLLECTIONS: [&str; 3] = ["concepts_concept", "concepts_conceptversion", "mappings_mapping"];
const CONTAINER_COLLECTIONS: [&str; 3] = ["orgs_organization", "sources_source", "sources_sourceversion"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedProfile {
    /// Wipe and reseed a performance-test database owned by `perftest`
    PerfTest,
    /// Add the fixed orgs and sources to a database that already has `root`
    RootUser,
}

impl SeedProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedProfile::PerfTest => "perf-test",
            SeedProfile::RootUser => "root-user",
        }
    }

    /// Username recorded in `created_by` / `updated_by`
    pub fn actor(&self) -> &'static str {
        match self {
            SeedProfile::PerfTest => "perftest",
            SeedProfile::RootUser => "root",
        }
    }
}

impl fmt::Display for SeedProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeedProfile {
    type Err = ConformanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "perf-test" => Ok(SeedProfile::PerfTest),
            "root-user" => Ok(SeedProfile::RootUser),
            other => Err(ConformanceError::Configuration(format!(
                "Unknown seed profile '{}'. Available: perf-test, root-user",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub profile: Option<SeedProfile>,
    pub removed: u64,
    pub organizations: usize,
    pub sources: usize,
    pub versions: usize,
    pub inserted: usize,
    pub reused: usize,
    pub perf_source_id: Option<String>,
}

impl SeedReport {
    fn record(&mut self, ensured: &Ensured) {
        if ensured.was_inserted() {
            self.inserted += 1;
        } else {
            self.reused += 1;
        }
    }
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(profile) = self.profile {
            writeln!(f, "Profile:        {}", profile)?;
        }
        writeln!(f, "Removed:        {}", self.removed)?;
        writeln!(f, "Organizations:  {}", self.organizations)?;
        writeln!(f, "Sources:        {}", self.sources)?;
        writeln!(f, "Versions:       {}", self.versions)?;
        writeln!(f, "Inserted:       {}", self.inserted)?;
        write!(f, "Reused:         {}", self.reused)?;
        if let Some(id) = &self.perf_source_id {
            write!(f, "\nPerf source id: {}", id)?;
        }
        Ok(())
    }
}

pub fn org_document(org: &str, actor: &str, created: BsonDateTime) -> Document {
    doc! {
        "full_name": format!("perf_test_org {}", org),
        "mnemonic": org,
        "name": org,
        "uri": format!("/orgs/{}/", org),
        "public_access": "View",
        "created_by": actor,
        "updated_by": actor,
        "is_active": true,
        "created_at": created,
        "updated_at": created,
    }
}

pub fn source_document(
    org: &str,
    source: &str,
    parent_id: &str,
    parent_type_id: Bson,
    actor: &str,
    created: BsonDateTime,
) -> Document {
    doc! {
        "full_name": format!("perf_test_source {}", source),
        "mnemonic": source,
        "name": source,
        "uri": format!("/orgs/{}/sources/{}/", org, source),
        "parent_id": parent_id,
        "parent_type_id": parent_type_id,
        "default_locale": "en",
        "source_type": "Dictionary",
        "public_access": "View",
        "created_by": actor,
        "updated_by": actor,
        "is_active": true,
        "created_at": created,
        "updated_at": created,
    }
}

/// The `HEAD` version every source starts with
pub fn head_version_document(
    org: &str,
    source: &str,
    source_id: &str,
    source_type_id: Bson,
    actor: &str,
    created: BsonDateTime,
) -> Document {
    doc! {
        "full_name": format!("perf_test_source {}", source),
        "mnemonic": "HEAD",
        "name": source,
        "uri": format!("/orgs/{}/sources/{}/HEAD/", org, source),
        "concepts": [],
        "mappings": [],
        "versioned_object_id": source_id,
        "versioned_object_type_id": source_type_id,
        "default_locale": "en",
        "source_type": "Dictionary",
        "previous_version_id": Bson::Null,
        "released": false,
        "public_access": "View",
        "created_by": actor,
        "updated_by": actor,
        "is_active": true,
        "created_at": created,
        "updated_at": created,
    }
}

fn profile_document(profile: SeedProfile, user_id: Bson, now: BsonDateTime) -> Document {
    let (mnemonic, full_name) = match profile {
        SeedProfile::PerfTest => ("perftest", "Perf Test"),
        SeedProfile::RootUser => ("root_user", "Root"),
    };
    let actor = profile.actor();
    doc! {
        "mnemonic": mnemonic,
        "hashed_password": HASHED_PASSWORD,
        "user_id": user_id,
        "updated_by": actor,
        "organizations": [],
        "created_at": now,
        "is_active": true,
        "updated_at": now,
        "created_by": actor,
        "uri": format!("/users/{}/", mnemonic),
        "full_name": full_name,
        "public_access": "View",
    }
}

async fn content_type_id(store: &dyn Datastore, model: &str) -> Result<Bson> {
    let found = store
        .find_one("django_content_type", doc! { "model": model })
        .await?
        .ok_or_else(|| ConformanceError::Datastore(format!("content type '{}' not found", model)))?;
    found
        .get("_id")
        .cloned()
        .ok_or_else(|| ConformanceError::Datastore(format!("content type '{}' has no _id", model)))
}

/// Seed `store` for `profile`, stamping documents with the current time
pub async fn seed(store: &dyn Datastore, profile: SeedProfile) -> Result<SeedReport> {
    seed_at(store, profile, Utc::now()).await
}

/// Seed `store` for `profile`; every org, source and version shares `now`
pub async fn seed_at(store: &dyn Datastore, profile: SeedProfile, now: DateTime<Utc>) -> Result<SeedReport> {
    let now = BsonDateTime::from_chrono(now);
    let actor = profile.actor();
    let mut report = SeedReport {
        profile: Some(profile),
        ..SeedReport::default()
    };

    info!(profile = %profile, "Seeding datastore");

    let user_id = match profile {
        SeedProfile::PerfTest => {
            for collection in CHILD_COLLECTIONS {
                report.removed += store.remove_all(collection).await?;
            }

            report.removed += store.remove_all("auth_user").await?;
            let user = doc! {
                "first_name": "Perf",
                "last_name": "Test",
                "is_staff": true,
                "is_superuser": true,
                "username": "perftest",
                "email": "perftest@ocl.com",
                "date_joined": now,
            };
            let user = ensure_document(store, "auth_user", user).await?;
            report.record(&user);
            user.id()?.clone()
        }
        SeedProfile::RootUser => store
            .find_one("auth_user", doc! { "username": "root" })
            .await?
            .and_then(|user| user.get("_id").cloned())
            .ok_or_else(|| ConformanceError::Datastore("user 'root' not found".to_string()))?,
    };

    if profile == SeedProfile::PerfTest {
        report.removed += store.remove_all("users_userprofile").await?;
    }
    let user_profile = ensure_document(store, "users_userprofile", profile_document(profile, user_id.clone(), now)).await?;
    report.record(&user_profile);

    if profile == SeedProfile::PerfTest {
        report.removed += store.remove_all("authtoken_token").await?;
        let token = doc! { "_id": PERF_TEST_TOKEN, "user_id": user_id, "created": now };
        report.record(&ensure_document(store, "authtoken_token", token).await?);

        for collection in CONTAINER_COLLECTIONS {
            report.removed += store.remove_all(collection).await?;
        }
    }

    let org_type_id = content_type_id(store, "organization").await?;
    let source_type_id = content_type_id(store, "source").await?;

    for (org, source) in ORG_SOURCES {
        let org_doc = ensure_document(store, "orgs_organization", org_document(org, actor, now)).await?;
        report.record(&org_doc);
        report.organizations += 1;

        let parent_id = id_string(org_doc.id()?);
        let source_doc = ensure_document(
            store,
            "sources_source",
            source_document(org, source, &parent_id, org_type_id.clone(), actor, now),
        )
        .await?;
        report.record(&source_doc);
        report.sources += 1;

        let source_id = id_string(source_doc.id()?);
        let version = ensure_document(
            store,
            "sources_sourceversion",
            head_version_document(org, source, &source_id, source_type_id.clone(), actor, now),
        )
        .await?;
        report.record(&version);
        report.versions += 1;

        debug!(org = %org, source = %source, source_id = %source_id, "Seeded source");
    }

    report.perf_source_id = store
        .find_one("sources_source", doc! { "mnemonic": "src" })
        .await?
        .and_then(|source| source.get("_id").map(id_string));

    info!(
        profile = %profile,
        inserted = report.inserted,
        reused = report.reused,
        removed = report.removed,
        "Seeding complete"
    );
    Ok(report)
}
