//! Migration runs against a real store directory

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::snapshot_tree;
use nes::migration::dedup::{DedupConfig, DedupRecord, Deduplicator};
use nes::migration::registry::MANIFEST_FILE;
use nes::migration::{plan_commits, MigrationMetadata, MigrationStats, NoopSink};
use nes::{
    EntityData, EntityType, Error, MigrationContext, MigrationRegistry, MigrationRunner,
    MigrationUnit, PublicationService,
};
use tempfile::tempdir;

const SEED_MANIFEST: &str = r#"
[metadata]
author = "author:system:seed"
date = "2025-01-15"
description = "Seed parties and members"
change_description = "seeded from party lists"

[data]
entities = ["parties.json", "people.json"]
relationships = ["memberships.json"]
"#;

const PARTIES: &str = r#"[
  {"slug": "nepali-congress", "type": "organization", "sub_type": "political_party",
   "names": [{"kind": "PRIMARY", "en": {"full": "Nepali Congress"}, "ne": {"full": "नेपाली कांग्रेस"}}]}
]"#;

const PEOPLE: &str = r#"[
  {"slug": "ram-example", "type": "person",
   "names": [{"kind": "PRIMARY", "en": {"full": "Ram Example"}}],
   "attributes": {"party": "nepali-congress"}, "tags": ["mp"]}
]"#;

const MEMBERSHIPS: &str = r#"[
  {"source_entity_id": "entity:person/ram-example",
   "target_entity_id": "entity:organization/political_party/nepali-congress",
   "type": "MEMBER_OF", "start_date": "2022-12-01"}
]"#;

fn write_seed_unit(migrations: &Path) {
    let dir = migrations.join("001-seed-parties");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(MANIFEST_FILE), SEED_MANIFEST).unwrap();
    fs::write(dir.join("parties.json"), PARTIES).unwrap();
    fs::write(dir.join("people.json"), PEOPLE).unwrap();
    fs::write(dir.join("memberships.json"), MEMBERSHIPS).unwrap();
}

fn runner(store: &Path, migrations: &Path, registry: &MigrationRegistry) -> MigrationRunner {
    let publication = Arc::new(PublicationService::open(store));
    let units = registry.discover(migrations).unwrap();
    MigrationRunner::new(publication, units)
}

#[test]
fn second_run_changes_nothing() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let store = dir.path().join("db");
    let migrations = dir.path().join("migrations");
    write_seed_unit(&migrations);
    let registry = MigrationRegistry::new();

    let first = runner(&store, &migrations, &registry).run(&mut NoopSink::default())?;
    assert_eq!(first.applied.len(), 1);
    assert_eq!(first.applied[0].stats.created, 3);
    let after_first = snapshot_tree(&store);

    let mut sink = NoopSink::default();
    let second = runner(&store, &migrations, &registry).run(&mut sink)?;
    assert!(second.applied.is_empty());
    assert!(sink.seen.is_empty());
    assert_eq!(snapshot_tree(&store), after_first);
    Ok(())
}

#[test]
fn replaying_a_declarative_unit_only_rewrites_its_marker() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let store = dir.path().join("db");
    let migrations = dir.path().join("migrations");
    write_seed_unit(&migrations);
    let registry = MigrationRegistry::new();

    runner(&store, &migrations, &registry).run(&mut NoopSink::default())?;
    let without_markers = |tree: std::collections::BTreeMap<PathBuf, Vec<u8>>| {
        tree.into_iter()
            .filter(|(p, _)| !p.starts_with("migration-markers"))
            .collect::<Vec<_>>()
    };
    let before = without_markers(snapshot_tree(&store));

    fs::remove_file(store.join("migration-markers/001-seed-parties.json")).unwrap();
    let report = runner(&store, &migrations, &registry).run(&mut NoopSink::default())?;

    let stats = &report.applied[0].stats;
    assert_eq!((stats.created, stats.updated), (0, 0));
    assert_eq!(without_markers(snapshot_tree(&store)), before);
    Ok(())
}

/// Imports projects from a CSV file, skipping likely duplicates
struct ImportProjects;

impl MigrationUnit for ImportProjects {
    fn run(&self, ctx: &mut MigrationContext<'_>) -> anyhow::Result<()> {
        #[derive(serde::Deserialize)]
        struct Row {
            slug: String,
            name: String,
            donor: String,
            amount: f64,
        }

        let existing = ctx
            .publication()
            .records()
            .entities()?
            .filter_map(|e| e.ok())
            .filter(|e| e.entity_type() == EntityType::Project)
            .map(|e| DedupRecord::from_entity(&e))
            .collect();
        let dedup = Deduplicator::new(existing, DedupConfig::default());

        for row in ctx.read_csv_as::<Row>("projects.csv")? {
            let candidate = DedupRecord {
                key: row.slug.clone(),
                name: row.name.clone(),
                donor: Some(row.donor.clone()),
                identifiers: Vec::new(),
                amount: Some(row.amount),
            };
            let result = dedup.find_match(&candidate);
            if result.skip {
                ctx.log(format!("skipping {}: {}", row.slug, result.reason));
                continue;
            }
            ctx.create_entity(
                EntityData::new(EntityType::Project, None, row.slug, row.name)
                    .with_attribute("donor", row.donor)
                    .with_attribute("total_commitment", row.amount),
            )?;
        }
        Ok(())
    }
}

#[test]
fn code_unit_with_deduplication() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let store = dir.path().join("db");
    let migrations = dir.path().join("migrations");

    let first = migrations.join("001-primary-projects");
    fs::create_dir_all(&first).unwrap();
    fs::write(
        first.join(MANIFEST_FILE),
        "[metadata]\nauthor = \"author:system:importer\"\ndate = \"2025-01-15\"\ndescription = \"Primary source\"\n",
    )
    .unwrap();
    fs::write(
        first.join("projects.csv"),
        "slug,name,donor,amount\nmelamchi-water-supply,Melamchi Water Supply Project,ADB,100000000\n",
    )
    .unwrap();

    let second = migrations.join("002-secondary-projects");
    fs::create_dir_all(&second).unwrap();
    fs::write(
        second.join(MANIFEST_FILE),
        "[metadata]\nauthor = \"author:system:importer\"\ndate = \"2025-01-20\"\ndescription = \"Secondary source\"\n",
    )
    .unwrap();
    fs::write(
        second.join("projects.csv"),
        "slug,name,donor,amount\n\
         melamchi-water-supply-2,Nepal: Melamchi Water Supply Project,ADB,95000000\n\
         kathmandu-air-quality,Kathmandu Valley Air Quality,World Bank,5000000\n",
    )
    .unwrap();

    let mut registry = MigrationRegistry::new();
    registry.register("001-primary-projects", ImportProjects);
    registry.register("002-secondary-projects", ImportProjects);

    let report = runner(&store, &migrations, &registry).run(&mut NoopSink::default())?;
    assert_eq!(report.applied[0].stats.created, 1);
    assert_eq!(report.applied[1].stats.created, 1);

    let publication = PublicationService::open(&store);
    assert!(publication.get_entity("entity:project/kathmandu-air-quality").is_ok());
    assert!(publication.records().find("entity:project/melamchi-water-supply-2")?.is_none());
    Ok(())
}

#[test]
fn failed_unit_is_retried_on_next_run() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let store = dir.path().join("db");
    let migrations = dir.path().join("migrations");
    write_seed_unit(&migrations);

    let broken = migrations.join("002-broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(
        broken.join(MANIFEST_FILE),
        "[metadata]\nauthor = \"author:system:seed\"\ndate = \"2025-01-16\"\ndescription = \"Broken\"\n\n[data]\nentities = [\"bad.json\"]\n",
    )
    .unwrap();
    fs::write(
        broken.join("bad.json"),
        r#"[{"slug": "x", "type": "person", "names": [{"kind": "PRIMARY", "en": {"full": "X"}}]}]"#,
    )
    .unwrap();
    let registry = MigrationRegistry::new();

    let err = runner(&store, &migrations, &registry)
        .run(&mut NoopSink::default())
        .unwrap_err();
    assert!(matches!(err, Error::MigrationFailed { ref name, .. } if name == "002-broken"));

    // fix the data; only the failed unit runs again
    fs::write(
        broken.join("bad.json"),
        r#"[{"slug": "xyz-person", "type": "person", "names": [{"kind": "PRIMARY", "en": {"full": "X Y Z"}}]}]"#,
    )
    .unwrap();
    let report = runner(&store, &migrations, &registry).run(&mut NoopSink::default())?;
    assert_eq!(report.skipped, vec!["001-seed-parties".to_string()]);
    assert_eq!(report.applied[0].name, "002-broken");
    Ok(())
}

#[test]
fn writes_from_a_failed_attempt_are_committed_on_retry() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let store = dir.path().join("db");
    let migrations = dir.path().join("migrations");

    let unit = migrations.join("001-partial");
    fs::create_dir_all(&unit).unwrap();
    fs::write(
        unit.join(MANIFEST_FILE),
        "[metadata]\nauthor = \"author:system:seed\"\ndate = \"2025-01-16\"\ndescription = \"Partial\"\n\n[data]\nentities = [\"people.json\"]\n",
    )
    .unwrap();
    let people = |second_slug: &str| {
        format!(
            r#"[{{"slug": "good-person", "type": "person", "names": [{{"kind": "PRIMARY", "en": {{"full": "Good Person"}}}}]}},
                {{"slug": "{}", "type": "person", "names": [{{"kind": "PRIMARY", "en": {{"full": "X Y Z"}}}}]}}]"#,
            second_slug
        )
    };
    fs::write(unit.join("people.json"), people("x")).unwrap();
    let registry = MigrationRegistry::new();

    let mut failed = NoopSink::default();
    assert!(runner(&store, &migrations, &registry).run(&mut failed).is_err());
    assert!(failed.seen.is_empty());
    assert!(store.join("migration-pending/001-partial.json").exists());

    fs::write(unit.join("people.json"), people("xyz-person")).unwrap();
    let mut retried = NoopSink::default();
    runner(&store, &migrations, &registry).run(&mut retried)?;

    let committed: Vec<PathBuf> = retried
        .seen
        .iter()
        .flat_map(|b| b.paths.iter().cloned())
        .collect();
    for expected in [
        "entities/person/good-person.json",
        "versions/entities/person/good-person/1.json",
        "entities/person/xyz-person.json",
        "versions/entities/person/xyz-person/1.json",
        "migration-markers/001-partial.json",
    ] {
        assert!(committed.contains(&PathBuf::from(expected)), "missing {}", expected);
    }
    assert!(!committed.iter().any(|p| p.starts_with("migration-pending")));
    assert!(!store.join("migration-pending/001-partial.json").exists());
    Ok(())
}

#[test]
fn twenty_five_hundred_files_make_three_batches() {
    let metadata = MigrationMetadata {
        name: "005-import-projects".into(),
        author: "author:system:project-importer".into(),
        date: "2025-01-15".into(),
        description: "Import projects".into(),
        change_description: None,
    };
    let stats = MigrationStats {
        created: 2500,
        updated: 0,
        deleted: 0,
        duration: Duration::from_secs(3),
    };
    let paths: Vec<PathBuf> = (0..2500)
        .map(|i| PathBuf::from(format!("entities/project/p-{:04}.json", (i * 7919) % 2500)))
        .collect();

    let batches = plan_commits(paths.clone(), &metadata, &stats, 1000);
    let again = plan_commits(paths.into_iter().rev(), &metadata, &stats, 1000);

    let sizes: Vec<usize> = batches.iter().map(|b| b.paths.len()).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    assert_eq!(batches, again);
    assert!(batches[0].message.contains("Author: author:system:project-importer"));
    assert!(batches[0].message.contains("Created: 2500"));
}
