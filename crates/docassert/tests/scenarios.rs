//! End-to-end checking scenarios with the default test reporter.

mod common;

use std::panic::AssertUnwindSafe;

use bson::doc;
use docassert::{bind, MemoryCollection, Operation, TestReporter};
use futures::FutureExt as _;
use serde::Serialize;

/// Runs `future`, returning the panic message if it panicked.
async fn panic_message<F>(future: F) -> Option<String>
where
    F: std::future::Future<Output = ()>,
{
    let payload = AssertUnwindSafe(future).catch_unwind().await.err()?;
    Some(
        payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default(),
    )
}

#[tokio::test]
async fn test_scenario_a_condition_prepares_collection() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::with_documents("person", [doc! { "name": "Zoe" }]);

    bind(&t, &people)
        .condition()
        .empty()
        .await
        .exists([doc! { "name": "Alice", "age": 22 }])
        .await;

    let mut documents = people.documents();
    assert_eq!(documents.len(), 1);
    documents[0].remove("_id");
    assert_eq!(documents[0], doc! { "name": "Alice", "age": 22 });
    assert!(!t.failed());
}

#[tokio::test]
async fn test_scenario_b_assert_passes() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice", "age": 24 }]);

    bind(&t, &people)
        .assert()
        .exists([doc! { "name": "Alice", "age": 24 }])
        .await
        .not_exists([doc! { "name": "Bob" }])
        .await;

    assert!(!t.failed());
}

#[tokio::test]
async fn test_scenario_c_assert_fails_and_continues() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice", "age": 24 }]);

    bind(&t, &people)
        .assert()
        .not_exists([doc! { "name": "Alice", "age": 24 }])
        .await;

    // Execution continues after a recorded failure
    bind(&t, &people)
        .assert()
        .exists([doc! { "name": "Alice" }])
        .await;

    assert!(t.failed());
    assert_eq!(
        t.into_failures(),
        vec![r#"document [{ "name": "Alice", "age": 24 }] found in collection [person]"#.to_owned()]
    );
}

#[tokio::test]
#[should_panic(expected = r#"document [{ "name": "Bob" }] not found in collection [person]"#)]
async fn test_scenario_d_require_halts() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice", "age": 24 }]);

    bind(&t, &people)
        .require()
        .exists([doc! { "name": "Bob" }])
        .await;
}

#[tokio::test]
async fn test_scenario_e_condition_not_exists_halts_without_delete() {
    common::init_tracing();
    let t = TestReporter::new("scenario_e");
    let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice", "age": 24 }]);

    let message = panic_message(async {
        bind(&t, &people)
            .condition()
            .not_exists([doc! { "name": "Alice" }])
            .await;
    })
    .await;

    assert_eq!(
        message.as_deref(),
        Some(r#"scenario_e: document [{ "name": "Alice" }] found in collection [person]"#)
    );
    assert_eq!(people.len(), 1);
    assert_eq!(people.journal(), vec![Operation::FindOne(doc! { "name": "Alice" })]);
}

#[tokio::test]
async fn test_require_mid_test_checkpoints() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::new("person");
    let person = bind(&t, &people);

    person.require().not_exists([doc! { "name": "Alice", "age": 24 }]).await;

    // Second part of the logic under test
    people.insert(doc! { "name": "Alice", "age": 24 });

    person.require().exists([doc! { "name": "Alice", "age": 24 }]).await;
    assert!(!people.was_written());
}

#[tokio::test]
async fn test_multiple_requirements_in_both_styles() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::with_documents(
        "person",
        [
            doc! { "name": "Alice", "age": 24 },
            doc! { "name": "Bob", "age": 16 },
            doc! { "name": "Charlie", "age": 53 },
        ],
    );

    bind(&t, &people)
        .assert()
        .exists([
            doc! { "name": "Alice", "age": 24 },
            doc! { "name": "Bob", "age": 16 },
            doc! { "name": "Charlie", "age": 53 },
        ])
        .await;

    bind(&t, &people)
        .assert()
        .exists([doc! { "name": "Alice", "age": 24 }])
        .await
        .exists([doc! { "name": "Bob", "age": 16 }])
        .await
        .exists([doc! { "name": "Charlie", "age": 53 }])
        .await;

    assert_eq!(people.journal().len(), 6);
}

#[tokio::test]
async fn test_struct_filters() {
    #[derive(Serialize)]
    struct Person {
        name: String,
        age:  i32,
    }

    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::new("person");
    let alice = Person {
        name: "Alice".to_owned(),
        age:  22,
    };

    bind(&t, &people).condition().empty().await.exists([&alice]).await;
    bind(&t, &people).assert().exists([&alice]).await;

    assert_eq!(people.len(), 1);
}

#[tokio::test]
#[should_panic(expected = "recorded 1 failure(s)")]
async fn test_soft_failures_fail_the_test_at_the_end() {
    common::init_tracing();
    let t = TestReporter::current();
    let people = MemoryCollection::with_documents("person", [doc! { "name": "Alice" }]);

    bind(&t, &people).assert().empty().await;
}
