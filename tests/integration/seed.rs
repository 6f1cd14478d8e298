// tests/integration/seed.rs - Seeding profiles through the datastore factory

use anyhow::Result;
use bson::doc;

use ocl_conformance::config::Config;
use ocl_conformance::seed::{create_datastore, seed, MemoryDatastore, SeedProfile, ORG_SOURCES};
use ocl_conformance::{ConformanceError, Datastore};

use crate::integration::print_test_header;

#[tokio::test]
async fn test_memory_factory_seeds_perf_test() -> Result<()> {
    print_test_header("perf-test seeding", "🌱");
    let config = Config::default();
    let store = create_datastore(&config.seed, "memory").await?;

    let report = seed(store.as_ref(), SeedProfile::PerfTest).await?;

    assert_eq!(report.organizations, ORG_SOURCES.len());
    assert!(report.perf_source_id.is_some());
    let text = report.to_string();
    assert!(text.contains("Organizations:  19"));
    assert!(text.contains("Perf source id:"));

    let token = store
        .find_one("authtoken_token", doc! { "_id": "PERF_TEST_TOKEN" })
        .await?
        .expect("token seeded");
    let user = store
        .find_one("auth_user", doc! { "username": "perftest" })
        .await?
        .expect("user seeded");
    assert_eq!(token.get("user_id"), user.get("_id"));
    Ok(())
}

#[tokio::test]
async fn test_root_user_profile_after_perf_test_fails() -> Result<()> {
    let store = MemoryDatastore::preloaded();
    seed(&store, SeedProfile::PerfTest).await?;

    // perf-test replaces every auth_user, root included
    let result = seed(&store, SeedProfile::RootUser).await;
    assert!(matches!(result, Err(ConformanceError::Datastore(msg)) if msg.contains("root")));
    Ok(())
}

#[tokio::test]
async fn test_reseeding_perf_test_is_idempotent() -> Result<()> {
    let store = MemoryDatastore::preloaded();
    seed(&store, SeedProfile::PerfTest).await?;
    let first_orgs = store.documents("orgs_organization").len();

    let second = seed(&store, SeedProfile::PerfTest).await?;

    assert!(second.removed > 0);
    assert_eq!(store.documents("orgs_organization").len(), first_orgs);
    assert_eq!(store.documents("sources_sourceversion").len(), ORG_SOURCES.len());
    Ok(())
}

#[cfg(feature = "mongo")]
#[tokio::test]
#[serial_test::serial]
async fn test_mongo_seed() -> Result<()> {
    if crate::helpers::skip_if_no_env("OCL_MONGODB_URI") {
        return Ok(());
    }
    let config = Config::from_env()?;
    let store = create_datastore(&config.seed, "mongo").await?;

    let report = seed(store.as_ref(), SeedProfile::PerfTest).await?;
    assert_eq!(report.sources, ORG_SOURCES.len());
    Ok(())
}
