use std::{
    collections::HashSet,
    sync::atomic::{AtomicI64, Ordering},
};

use bson::{Bson, Document, doc};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use doctable::{memory::InMemoryStore, prelude::*};
use pretty_assertions::assert_eq;

/// Advances one second on every reading, so successive stamps strictly increase.
#[derive(Debug)]
struct SteppingClock {
    start: DateTime<Utc>,
    ticks: AtomicI64,
}

impl SteppingClock {
    fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        self.start + TimeDelta::seconds(self.ticks.fetch_add(1, Ordering::SeqCst))
    }
}

fn database() -> Database<InMemoryStore, SteppingClock> {
    Database::with_clock(InMemoryStore::new(), SteppingClock::new())
}

fn keys(document: &Document) -> Vec<&str> {
    let mut keys = document.keys().map(String::as_str).collect::<Vec<_>>();
    keys.sort();
    keys
}

fn names(items: &[Document]) -> Vec<&str> {
    items
        .iter()
        .map(|item| item.get_str("name").unwrap())
        .collect()
}

#[tokio::test]
async fn create_read_update_delete_round_trip() {
    let db = database();

    let eve = db.create_item("users", doc! { "name": "Eve" }, None).await.unwrap();

    let created = db
        .get_item_by_pid("users", &eve.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(keys(&created), vec!["created_at", "name", "pid", "updated_at"]);
    assert_eq!(created.pid(), Some(eve.pid.as_str()));
    assert_eq!(created.created_at(), created.updated_at());

    let updated = db
        .update_item_by_pid("users", &eve.pid, doc! { "name": "Eve QA" }, None)
        .await
        .unwrap();
    assert!(updated);

    let reread = db
        .get_item_by_pid("users", &eve.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reread.get_str("name").unwrap(), "Eve QA");
    assert!(reread.updated_at().unwrap() > created.updated_at().unwrap());
    assert_eq!(reread.created_at(), created.created_at());

    assert!(db.delete_item_by_pid("users", &eve.pid).await.unwrap());
    assert_eq!(
        db.get_item_by_pid("users", &eve.pid, Fields::All, vec![]).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn default_clock_moves_updated_at_on_every_write() {
    let db = Database::new(InMemoryStore::new());

    for n in 0..50 {
        let item = db
            .create_item("users", doc! { "name": format!("user-{n}"), "tags": [] }, None)
            .await
            .unwrap();
        let created = db
            .get_item_by_pid("users", &item.pid, Fields::All, vec![])
            .await
            .unwrap()
            .unwrap();

        assert!(db.update_item_by_pid("users", &item.pid, doc! { "seen": n }, None).await.unwrap());
        let updated = db
            .get_item_by_pid("users", &item.pid, Fields::All, vec![])
            .await
            .unwrap()
            .unwrap();
        assert!(updated.updated_at().unwrap() > created.updated_at().unwrap());
        assert_eq!(updated.created_at(), created.created_at());

        assert!(db.array_push_item_by_pid("users", &item.pid, "tags", "x", None).await.unwrap());
        assert!(db.array_push_item_by_pid("users", &item.pid, "tags", "x", None).await.unwrap());
        let pushed = db
            .get_item_by_pid("users", &item.pid, Fields::All, vec![])
            .await
            .unwrap()
            .unwrap();
        assert!(pushed.updated_at().unwrap() > updated.updated_at().unwrap());
        assert_eq!(pushed.get_array("tags").unwrap(), &vec![Bson::from("x")]);
    }
}

#[tokio::test]
async fn field_selection_shapes_reads() {
    let db = database();
    let fred = db
        .create_item("users", doc! { "name": "Fred", "email": "fred@example.com", "role": "dev" }, Some("seeder"))
        .await
        .unwrap();

    let id_only = db
        .get_item_by_pid("users", &fred.pid, Fields::IdOnly, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id_only, fred.to_document());

    let empty_only = db
        .get_item_by_pid("users", &fred.pid, Fields::only(Vec::<String>::new()), vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empty_only, fred.to_document());

    let some = db
        .get_item_by_pid("users", &fred.pid, Fields::only(["name", "email"]), vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(keys(&some), vec!["email", "name", "pid"]);

    let all = db
        .get_item_by_pid("users", &fred.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(all.created_by(), Some("seeder"));
    assert_eq!(all.updated_by(), None);
    assert_eq!(all.get_str("role").unwrap(), "dev");
}

#[tokio::test]
async fn bulk_create_returns_unique_pids_in_order() {
    let db = database();

    let created = db
        .create_items(
            "users",
            vec![doc! { "name": "Gina" }, doc! { "name": "Hal" }, doc! { "name": "Ivy" }],
            Some("seeder"),
        )
        .await
        .unwrap();

    let unique = created.iter().map(|c| c.pid.as_str()).collect::<HashSet<_>>();
    assert_eq!(unique.len(), 3);

    for (item, name) in created.iter().zip(["Gina", "Hal", "Ivy"]) {
        let stored = db
            .get_item_by_pid("users", &item.pid, Fields::only(["name"]), vec![])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_str("name").unwrap(), name);
    }

    assert!(db.create_items("users", vec![], None).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_fields_cannot_be_supplied_by_callers() {
    let db = database();
    let item = db.create_item("users", doc! { "name": "Jo" }, None).await.unwrap();

    let on_create = db.create_item("users", doc! { "pid": "mine", "name": "Jo" }, None).await;
    assert!(matches!(on_create, Err(DatabaseError::ReservedField(field)) if field == "pid"));

    let on_update = db
        .update_item_by_pid("users", &item.pid, doc! { "pid": "stolen" }, None)
        .await;
    assert!(matches!(on_update, Err(DatabaseError::ReservedField(_))));

    let still_there = db
        .get_item_by_pid("users", &item.pid, Fields::IdOnly, vec![])
        .await
        .unwrap();
    assert_eq!(still_there, Some(item.to_document()));
}

#[tokio::test]
async fn updates_stamp_actor_and_count_modified_items() {
    let db = database();
    db.create_items(
        "users",
        vec![
            doc! { "name": "Kim", "role": "dev" },
            doc! { "name": "Lee", "role": "dev" },
            doc! { "name": "Max", "role": "qa" },
        ],
        None,
    )
    .await
    .unwrap();

    let modified = db
        .update_items_by_attr("users", doc! { "role": "dev" }, doc! { "level": 2 }, Some("lead"))
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let single = db
        .update_item_by_attr("users", doc! { "role": "dev" }, doc! { "level": 3 }, Some("lead"))
        .await
        .unwrap();
    assert!(single);

    let page = db
        .get_items(
            "users",
            ItemsQuery::builder()
                .filter(doc! { "updated_by": "lead" })
                .fields(Fields::only(["name", "level"]))
                .sort_by("name", SortDirection::Asc)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(names(&page.items), vec!["Kim", "Lee"]);
    assert_eq!(page.items[0].get_i32("level").unwrap(), 3);
    assert_eq!(page.items[1].get_i32("level").unwrap(), 2);

    let nobody = db
        .update_item_by_attr("users", doc! { "role": "ops" }, doc! { "level": 1 }, None)
        .await
        .unwrap();
    assert!(!nobody);
}

#[tokio::test]
async fn pid_list_operations() {
    let db = database();
    let created = db
        .create_items(
            "users",
            vec![doc! { "name": "Ned" }, doc! { "name": "Ola" }, doc! { "name": "Pat" }],
            None,
        )
        .await
        .unwrap();
    let first_two = created[..2].iter().map(|c| c.pid.clone()).collect::<Vec<_>>();

    let modified = db
        .update_items_by_pids("users", &first_two, doc! { "active": false }, None)
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let deleted = db.delete_items_by_pids("users", &first_two).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining = db
        .get_items("users", ItemsQuery::builder().fields(Fields::All).build())
        .await
        .unwrap()
        .into_items();
    assert_eq!(names(&remaining), vec!["Pat"]);
    assert!(!remaining[0].contains_key("active"));
}

#[tokio::test]
async fn pagination_statistics() {
    let db = database();
    let users = (1..=7)
        .map(|n| doc! { "name": format!("user-{n}") })
        .collect::<Vec<_>>();
    db.create_items("users", users, None).await.unwrap();

    let page = db
        .get_items(
            "users",
            ItemsQuery::builder()
                .fields(Fields::only(["name"]))
                .sort_by("name", SortDirection::Asc)
                .skip(2)
                .limit(2)
                .with_stats()
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(names(&page.items), vec!["user-3", "user-4"]);
    assert_eq!(
        page.stats,
        Some(PaginationStats {
            items_count: 7,
            page_size: 2,
            first_index_returned: Some(2),
            pages_count: 4,
        })
    );

    let empty = db
        .get_items(
            "users",
            ItemsQuery::builder()
                .filter(doc! { "name": "nobody" })
                .limit(2)
                .with_stats()
                .build(),
        )
        .await
        .unwrap();

    assert!(empty.items.is_empty());
    assert_eq!(
        empty.stats,
        Some(PaginationStats {
            items_count: 0,
            page_size: 2,
            first_index_returned: None,
            pages_count: 0,
        })
    );
}

#[tokio::test]
async fn zero_limit_means_no_limit() {
    let db = database();
    db.create_items("users", vec![doc! { "name": "Quinn" }, doc! { "name": "Rae" }], None)
        .await
        .unwrap();

    let page = db
        .get_items("users", ItemsQuery::builder().limit(0).with_stats().build())
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    let stats = page.stats.unwrap();
    assert_eq!(stats.page_size, 2);
    assert_eq!(stats.pages_count, 1);
}

#[tokio::test]
async fn statistics_serialize_with_camel_case_keys() {
    let db = database();
    db.create_item("users", doc! { "name": "Sam" }, None).await.unwrap();

    let stats = db
        .get_items("users", ItemsQuery::builder().limit(10).with_stats().build())
        .await
        .unwrap()
        .stats
        .unwrap();

    assert_eq!(
        serde_json::to_value(stats).unwrap(),
        serde_json::json!({
            "itemsCount": 1,
            "pageSize": 10,
            "firstIndexReturned": 0,
            "pagesCount": 1,
        })
    );
}

#[tokio::test]
async fn array_push_has_set_semantics() {
    let db = database();
    let project = db
        .create_item("projects", doc! { "name": "Data Pipeline", "tags": ["data"] }, None)
        .await
        .unwrap();

    assert!(db.array_push_item_by_pid("projects", &project.pid, "tags", "urgent", Some("pm")).await.unwrap());
    assert!(db.array_push_item_by_pid("projects", &project.pid, "tags", "urgent", Some("pm")).await.unwrap());

    let stored = db
        .get_item_by_pid("projects", &project.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.get_array("tags").unwrap(), &vec![Bson::from("data"), Bson::from("urgent")]);
    assert_eq!(stored.updated_by(), Some("pm"));

    assert!(
        !db.array_push_item_by_pid("projects", "no-such-pid", "tags", "x", None)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn array_pull_removes_every_occurrence_and_still_touches() {
    let db = database();
    let project = db
        .create_item("projects", doc! { "name": "Mobile", "tags": ["hotfix", "ios", "hotfix"] }, None)
        .await
        .unwrap();

    let before = db
        .get_item_by_pid("projects", &project.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();

    assert!(db.array_pull_item_by_pid("projects", &project.pid, "tags", "hotfix", None).await.unwrap());

    let after = db
        .get_item_by_pid("projects", &project.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.get_array("tags").unwrap(), &vec![Bson::from("ios")]);

    // Pulling a value that is not there still refreshes the audit stamp.
    assert!(db.array_pull_item_by_pid("projects", &project.pid, "tags", "android", None).await.unwrap());

    let touched = db
        .get_item_by_pid("projects", &project.pid, Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(touched.get_array("tags").unwrap(), &vec![Bson::from("ios")]);
    assert!(touched.updated_at().unwrap() > after.updated_at().unwrap());
    assert!(after.updated_at().unwrap() > before.updated_at().unwrap());
}

#[tokio::test]
async fn array_operations_by_attributes() {
    let db = database();
    db.create_items(
        "teams",
        vec![
            doc! { "name": "Core", "kind": "eng", "members": [] },
            doc! { "name": "Ops", "kind": "eng", "members": ["u1"] },
            doc! { "name": "Sales", "kind": "biz", "members": [] },
        ],
        None,
    )
    .await
    .unwrap();

    let pushed = db
        .array_push_item_by_attr("teams", doc! { "kind": "eng" }, "members", "u1", None)
        .await
        .unwrap();
    assert_eq!(pushed, 2);

    let pulled = db
        .array_pull_item_by_attr("teams", doc! { "members": "u1" }, "members", "u1", None)
        .await
        .unwrap();
    assert_eq!(pulled, 2);

    let reserved = db
        .array_push_item_by_attr("teams", doc! {}, "pid", "x", None)
        .await;
    assert!(matches!(reserved, Err(DatabaseError::ReservedField(_))));
}

#[tokio::test]
async fn deleting_missing_items_is_not_an_error() {
    let db = database();

    assert!(!db.delete_item_by_pid("users", "missing").await.unwrap());
    assert_eq!(db.delete_items_by_attr("users", doc! { "name": "nobody" }).await.unwrap(), 0);
    assert!(!db.update_item_by_pid("users", "missing", doc! { "name": "x" }, None).await.unwrap());
    assert_eq!(db.get_item_by_pid("users", "missing", Fields::All, vec![]).await.unwrap(), None);
}

#[tokio::test]
async fn extra_stages_join_other_collections() {
    let db = database();

    let users = db
        .create_items(
            "users",
            vec![doc! { "name": "Uma" }, doc! { "name": "Vic" }, doc! { "name": "Wes" }],
            None,
        )
        .await
        .unwrap();
    let (uma, vic, wes) = (&users[0].pid, &users[1].pid, &users[2].pid);

    let teams = db
        .create_items(
            "teams",
            vec![
                doc! { "name": "Core", "members": [uma.as_str(), vic.as_str()] },
                doc! { "name": "Ops", "members": [wes.as_str()] },
            ],
            None,
        )
        .await
        .unwrap();

    db.create_items(
        "projects",
        vec![
            doc! { "name": "Data Pipeline", "teams": [teams[0].pid.as_str()] },
            doc! { "name": "Mobile", "teams": [teams[1].pid.as_str()] },
            doc! { "name": "Website", "teams": [teams[0].pid.as_str(), teams[1].pid.as_str()] },
        ],
        None,
    )
    .await
    .unwrap();

    let lookup = doc! {
        "$lookup": {
            "from": "teams",
            "localField": "teams",
            "foreignField": "pid",
            "as": "teams_info",
        }
    };

    let page = db
        .get_items(
            "projects",
            ItemsQuery::builder()
                .fields(Fields::All)
                .stage(lookup.clone())
                .stage(doc! { "$match": { "teams_info.members": { "$in": [wes.as_str()] } } })
                .sort_by("name", SortDirection::Asc)
                .with_stats()
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(names(&page.items), vec!["Mobile", "Website"]);
    assert_eq!(page.stats.unwrap().items_count, 2);
    assert_eq!(page.items[1].get_array("teams_info").unwrap().len(), 2);

    // The projection runs before caller stages, so joined fields need `Fields::All`.
    let single = db
        .get_item_by_attr("projects", doc! { "name": "Data Pipeline" }, Fields::All, vec![lookup])
        .await
        .unwrap()
        .unwrap();
    let joined = single.get_array("teams_info").unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].as_document().unwrap().get_str("name").unwrap(), "Core");
}

#[tokio::test]
async fn storage_id_is_hidden_by_projections_but_kept_in_stage_output() {
    let db = database();
    db.collection("users")
        .insert(vec![doc! { "_id": 7, "pid": "raw-1", "name": "Raw", "role": "ops" }])
        .await
        .unwrap();
    db.create_items(
        "users",
        vec![doc! { "name": "Ann", "role": "dev" }, doc! { "name": "Ben", "role": "dev" }],
        None,
    )
    .await
    .unwrap();

    let id_only = db
        .get_item_by_pid("users", "raw-1", Fields::IdOnly, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id_only, doc! { "pid": "raw-1" });

    let some = db
        .get_item_by_pid("users", "raw-1", Fields::only(["name"]), vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(keys(&some), vec!["name", "pid"]);

    let all = db
        .get_item_by_pid("users", "raw-1", Fields::All, vec![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(all.get_i32("_id").unwrap(), 7);

    let page = db
        .get_items(
            "users",
            ItemsQuery::builder()
                .fields(Fields::only(["role"]))
                .stage(doc! { "$group": { "_id": "$role", "n": { "$sum": 1 } } })
                .sort(doc! { "_id": 1 })
                .with_stats()
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(
        page.items,
        vec![doc! { "_id": "dev", "n": 2 }, doc! { "_id": "ops", "n": 1 }]
    );
    assert_eq!(page.stats.map(|stats| stats.items_count), Some(2));
}

#[tokio::test]
async fn collections_are_isolated_and_clearable() {
    let db = database();
    db.create_items("users", vec![doc! { "name": "Xia" }, doc! { "name": "Yan" }], None)
        .await
        .unwrap();
    db.create_item("projects", doc! { "name": "Zeta" }, None).await.unwrap();

    assert_eq!(db.clear("users").await.unwrap(), 2);

    let users = db.get_items("users", ItemsQuery::default()).await.unwrap();
    let projects = db.get_items("projects", ItemsQuery::default()).await.unwrap();
    assert!(users.items.is_empty());
    assert_eq!(projects.items.len(), 1);
    assert_eq!(db.collection("projects").name(), "projects");

    db.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_stages_surface_as_operation_errors() {
    let db = database();
    db.create_item("users", doc! { "name": "Ann" }, None).await.unwrap();

    let result = db
        .get_items("users", ItemsQuery::builder().stage(doc! { "$bogus": {} }).build())
        .await;

    assert!(matches!(result, Err(DatabaseError::Operation(_))));
}
