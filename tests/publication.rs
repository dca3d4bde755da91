//! End-to-end behavior of the publication core

mod common;

use common::{snapshot_tree, AUTHOR};
use nes::core::identifiers::{build_entity_id, parse_entity_id};
use nes::core::value::AttributeValue;
use chrono::NaiveDate;
use nes::{
    EntityData, EntitySubType, EntityType, Error, ErrorKind, PublicationService, RelationshipData,
    RelationshipType,
};
use tempfile::tempdir;

fn ram() -> EntityData {
    EntityData::new(EntityType::Person, None, "ram-example", "Ram Example")
}

#[test]
fn ram_example_scenario() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());

    let created = publication.create_entity(ram(), AUTHOR, Some("initial import"))?;
    assert_eq!(created.id, "entity:person/ram-example");
    assert_eq!(created.version_summary.version_number, 1);
    assert_eq!(publication.get_entity(&created.id)?.version(), 1);

    let updated = publication.update_entity(
        &created.id,
        |d| {
            d.attributes
                .insert("party".into(), AttributeValue::from("nepali-congress"));
        },
        AUTHOR,
        Some("party affiliation"),
    )?;
    assert_eq!(updated.version(), 2);

    let versions = publication.get_versions(&created.id)?;
    let v1 = versions.iter().find(|v| v.version_number == 1).unwrap();
    let v2 = versions.iter().find(|v| v.version_number == 2).unwrap();
    let s1 = v1.snapshot.as_ref().unwrap();
    let s2 = v2.snapshot.as_ref().unwrap();
    assert_eq!(s2["attributes"]["party"], "nepali-congress");
    assert_eq!(s1["names"], s2["names"]);
    Ok(())
}

#[test]
fn versions_are_gapless_and_state_matches_latest() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());
    let entity = publication.create_entity(ram(), AUTHOR, None)?;

    for i in 0..12i64 {
        publication.update_entity(
            &entity.id,
            |d| {
                d.attributes.insert("revision".into(), AttributeValue::from(i));
            },
            AUTHOR,
            None,
        )?;
    }

    let numbers = publication.versions().version_numbers(&entity.id)?;
    assert_eq!(numbers, (1..=13).collect::<Vec<u64>>());

    let latest = publication.versions().latest(&entity.id)?.unwrap();
    let current = publication.records().get(&entity.id)?.to_snapshot()?;
    assert_eq!(latest.snapshot.as_ref(), Some(&current));
    Ok(())
}

#[test]
fn entity_id_round_trip() -> nes::Result<()> {
    let cases = [
        ("person", None, "ram-example"),
        ("organization", Some("political_party"), "nepali-congress"),
        ("location", Some("rural_municipality"), "bheri-ganga"),
        ("project", Some("development_project"), "melamchi-water-supply"),
    ];
    for (t, s, slug) in cases {
        let id = build_entity_id(t, s, slug)?;
        let (pt, ps, pslug) = parse_entity_id(&id)?;
        assert_eq!(pt.as_str(), t);
        assert_eq!(ps.map(|s| s.as_str()), s);
        assert_eq!(pslug, slug);
    }
    Ok(())
}

#[test]
fn dangling_relationship_writes_nothing() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());
    let person = publication.create_entity(ram(), AUTHOR, None)?;
    let before = snapshot_tree(dir.path());

    let err = publication
        .create_relationship(
            RelationshipData::new(
                &person.id,
                "entity:organization/political_party/missing-party",
                RelationshipType::MemberOf,
            ),
            AUTHOR,
            None,
        )
        .unwrap_err();

    match err {
        Error::DanglingReference { field, id } => {
            assert_eq!(field, "target_entity_id");
            assert_eq!(id, "entity:organization/political_party/missing-party");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(snapshot_tree(dir.path()), before);
    Ok(())
}

#[test]
fn update_of_missing_entity_writes_nothing() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());
    publication.create_entity(ram(), AUTHOR, None)?;
    let before = snapshot_tree(dir.path());

    let err = publication
        .update_entity("entity:person/nobody-here", |d| d.tags.clear(), AUTHOR, None)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(snapshot_tree(dir.path()), before);
    Ok(())
}

#[test]
fn invalid_entity_is_rejected_before_any_write() {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());
    let mut data = ram();
    data.names.clear();

    let err = publication.create_entity(data, AUTHOR, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(snapshot_tree(dir.path()).is_empty());
}

#[test]
fn non_finite_attribute_is_rejected_before_any_write() {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());

    let err = publication
        .create_entity(ram().with_attribute("score", f64::NAN), AUTHOR, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.field_errors()[0].field, "attributes.score");
    assert!(snapshot_tree(dir.path()).is_empty());
}

#[test]
fn relationship_update_versions_and_revalidates_dates() -> nes::Result<()> {
    let dir = tempdir().unwrap();
    let publication = PublicationService::open(dir.path());
    let person = publication.create_entity(ram(), AUTHOR, None)?;
    let party = publication.create_entity(
        EntityData::new(
            EntityType::Organization,
            Some(EntitySubType::PoliticalParty),
            "nepali-congress",
            "Nepali Congress",
        ),
        AUTHOR,
        None,
    )?;
    let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

    let rel = publication.create_relationship(
        RelationshipData::new(&person.id, &party.id, RelationshipType::MemberOf)
            .between(Some(date("2010-01-01")), None),
        AUTHOR,
        None,
    )?;
    assert_eq!(rel.version(), 1);

    let updated = publication.update_relationship(
        &rel.id,
        |d| d.end_date = Some(date("2020-12-31")),
        AUTHOR,
        Some("left the party"),
    )?;
    assert_eq!(updated.id, rel.id);
    assert_eq!(updated.version(), 2);
    assert_eq!(publication.get_relationship(&rel.id)?.data.end_date, Some(date("2020-12-31")));

    let before = snapshot_tree(dir.path());
    let err = publication
        .update_relationship(&rel.id, |d| d.end_date = Some(date("2009-01-01")), AUTHOR, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.field_errors()[0].field, "end_date");
    assert_eq!(snapshot_tree(dir.path()), before);
    assert_eq!(publication.versions().version_numbers(&rel.id)?, vec![1, 2]);
    Ok(())
}
