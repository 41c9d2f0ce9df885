//! End-to-end record access against SQLite.

mod common;

use common::{seed_funds, setup};
use pretty_assertions::assert_eq;
use watchdog_db::{
    DbError, ErrorCode, FilterExpression, FilterMap, SelectOptions, ValidationErrorKind, Value,
    filter, row,
};

fn codes(rows: &[watchdog_db::RowData]) -> Vec<String> {
    rows.iter()
        .map(|r| r.get::<String>("code").unwrap())
        .collect()
}

#[tokio::test]
async fn test_insert_and_select_round_trip() {
    let db = setup().await;
    let outcome = db
        .dao
        .insert_row("fund", &row! { "code" => "161725", "name" => "Liquor Index", "age" => 9 })
        .await
        .unwrap();
    assert_eq!(outcome.affected_rows, 1);
    assert_eq!(outcome.last_insert_id, Some(1));

    let found = db
        .dao
        .select_one("fund", &["name", "age"], filter! { "code" => "161725" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.columns().collect::<Vec<_>>(), vec!["name", "age"]);
    assert_eq!(found.get::<String>("name").unwrap(), "Liquor Index");
    assert_eq!(found.get::<i64>("age").unwrap(), 9);

    let missing = db
        .dao
        .select_one("fund", &[], filter! { "code" => "000000" })
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_operator_filters() {
    let db = setup().await;
    seed_funds(&db).await;
    let all = SelectOptions::new().asc("code");

    let rows = db
        .dao
        .select_rows("fund", &["code"], filter! { "code" => ("IN", vec!["161725", "160632"]) }, &all)
        .await
        .unwrap();
    assert_eq!(codes(&rows), vec!["160632", "161725"]);

    let rows = db
        .dao
        .select_rows("fund", &["code"], filter! { "age" => ("BETWEEN", 8, 9) }, &all)
        .await
        .unwrap();
    assert_eq!(codes(&rows), vec!["161725", "501018"]);

    let rows = db
        .dao
        .select_rows("fund", &["code"], filter! { "name" => ("LIKE", "%Oil%") }, &all)
        .await
        .unwrap();
    assert_eq!(codes(&rows), vec!["162411", "501018"]);

    let rows = db
        .dao
        .select_rows("fund", &["code"], filter! { "status" => Value::Null }, &all)
        .await
        .unwrap();
    assert_eq!(codes(&rows), vec!["164906"]);

    let rows = db
        .dao
        .select_rows("fund", &["code"], FilterExpression::is_not_null("status"), &all)
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);

    let rows = db
        .dao
        .select_rows(
            "fund",
            &["code"],
            filter! { "code" => ("NOT IN", vec!["161725", "501018", "160632"]) },
            &all,
        )
        .await
        .unwrap();
    assert_eq!(codes(&rows), vec!["162411", "164906"]);
}

#[tokio::test]
async fn test_or_group_binds_tighter_than_and() {
    let db = setup().await;
    seed_funds(&db).await;

    let shorthand = filter! {
        "age" => (">", 8),
        "OR" => [filter! { "status" => "open" }, filter! { "status" => "limited" }],
    };
    let typed = FilterExpression::and([
        FilterExpression::gt("age", 8),
        FilterExpression::or([
            FilterExpression::eq("status", "open"),
            FilterExpression::eq("status", "limited"),
        ]),
    ]);

    let options = SelectOptions::new().asc("code");
    let a = db.dao.select_rows("fund", &["code"], shorthand, &options).await.unwrap();
    let b = db.dao.select_rows("fund", &["code"], typed, &options).await.unwrap();
    assert_eq!(codes(&a), vec!["161725", "162411"]);
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_json_filter_document() {
    let db = setup().await;
    seed_funds(&db).await;

    let json = serde_json::json!({
        "status": "open",
        "age": [">=", 10],
    });
    let filter = FilterMap::from_json(&json).unwrap();
    let rows = db
        .dao
        .select_rows("fund", &["code"], filter, &SelectOptions::new())
        .await
        .unwrap();
    assert_eq!(codes(&rows), vec!["162411"]);
}

#[tokio::test]
async fn test_values_are_never_spliced() {
    let db = setup().await;
    let hostile = "x'); DROP TABLE fund; --";
    db.dao
        .insert_row("fund", &row! { "code" => "999999", "name" => hostile })
        .await
        .unwrap();

    let row = db
        .dao
        .select_one("fund", &["name"], filter! { "name" => hostile })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get::<String>("name").unwrap(), hostile);
    assert_eq!(db.dao.count_rows("fund", ()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unconditional_writes_are_refused() {
    let db = setup().await;
    seed_funds(&db).await;

    let err = db
        .dao
        .update_rows("fund", &row! { "status" => "closed" }, FilterMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::EmptyFilter));

    let err = db.dao.delete_rows("fund", ()).await.unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::EmptyFilter));

    assert_eq!(db.dao.count_rows("fund", ()).await.unwrap(), 5);
    assert_eq!(
        db.dao.count_rows("fund", filter! { "status" => "closed" }).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_update_and_delete() {
    let db = setup().await;
    seed_funds(&db).await;

    let n = db
        .dao
        .update_rows("fund", &row! { "status" => "suspended" }, filter! { "age" => (">", 10) })
        .await
        .unwrap();
    assert_eq!(n, 2);

    let n = db
        .dao
        .delete_rows("fund", filter! { "status" => "suspended" })
        .await
        .unwrap();
    assert_eq!(n, 2);
    assert_eq!(db.dao.count_rows("fund", ()).await.unwrap(), 3);
    assert!(!db.dao.exists("fund", filter! { "code" => "160632" }).await.unwrap());
    assert!(db.dao.exists("fund", filter! { "code" => "161725" }).await.unwrap());
}

#[tokio::test]
async fn test_insert_many_is_all_or_nothing() {
    let db = setup().await;
    let rows = vec![
        row! { "code" => "A", "name" => "first" },
        row! { "code" => "B", "name" => "second" },
        row! { "code" => "A", "name" => "duplicate" },
    ];
    let err = db.dao.insert_many("fund", &rows).await.unwrap_err();
    match err {
        DbError::Query(q) => {
            assert_eq!(q.code, ErrorCode::UniqueConstraint);
            assert_eq!(q.batch_index, Some(2));
            assert_eq!(q.params, vec![Value::from("A"), Value::from("duplicate")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(db.dao.count_rows("fund", ()).await.unwrap(), 0);
    assert_eq!(db.pool.status().in_use, 0);
}

#[tokio::test]
async fn test_insert_many_rejects_mismatched_rows() {
    let db = setup().await;
    let err = db
        .dao
        .insert_many("fund", &[row! { "code" => "A" }, row! { "name" => "B" }])
        .await
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::MismatchedColumns));
    assert_eq!(db.dao.insert_many("fund", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_upsert_many_updates_existing() {
    let db = setup().await;
    db.dao
        .insert_many(
            "price",
            &[
                row! { "code" => "161725", "date" => "2024-06-03", "price" => 1.00, "volume" => 10 },
                row! { "code" => "161725", "date" => "2024-06-04", "price" => 1.01, "volume" => 20 },
            ],
        )
        .await
        .unwrap();

    db.dao
        .upsert_many(
            "price",
            &[
                row! { "code" => "161725", "date" => "2024-06-04", "price" => 1.05, "volume" => 99 },
                row! { "code" => "161725", "date" => "2024-06-05", "price" => 1.07, "volume" => 30 },
            ],
            &["code", "date"],
            &["price"],
        )
        .await
        .unwrap();

    let rows = db
        .dao
        .select_rows(
            "price",
            &["date", "price", "volume"],
            filter! { "code" => "161725" },
            &SelectOptions::new().asc("date"),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].get::<f64>("price").unwrap(), 1.05);
    // Only the listed update columns change on conflict.
    assert_eq!(rows[1].get::<i64>("volume").unwrap(), 20);
    assert_eq!(rows[2].get::<String>("date").unwrap(), "2024-06-05");
}

#[tokio::test]
async fn test_pagination() {
    let db = setup().await;
    seed_funds(&db).await;

    let page = db
        .dao
        .select_rows(
            "fund",
            &["code"],
            (),
            &SelectOptions::new().desc("age").limit(2).offset(1),
        )
        .await
        .unwrap();
    assert_eq!(codes(&page), vec!["160632", "161725"]);

    let tail = db
        .dao
        .select_rows("fund", &["code"], (), &SelectOptions::new().asc("age").offset(3))
        .await
        .unwrap();
    assert_eq!(codes(&tail), vec!["160632", "162411"]);
}

#[tokio::test]
async fn test_raw_value_in_update() {
    let db = setup().await;
    seed_funds(&db).await;

    db.dao
        .update_rows(
            "fund",
            &row! { "age" => Value::raw("age + 1") },
            filter! { "code" => "161725" },
        )
        .await
        .unwrap();
    let row = db
        .dao
        .select_one("fund", &["age"], filter! { "code" => "161725" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get::<i64>("age").unwrap(), 10);
}

#[tokio::test]
async fn test_price_rows_filtered_by_threshold() {
    let db = setup().await;
    let inserted = db
        .dao
        .insert_many(
            "price",
            &[
                row! { "code" => "A", "date" => "2024-06-03", "price" => 1.1 },
                row! { "code" => "B", "date" => "2024-06-03", "price" => 2.2 },
            ],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(db.dao.count_rows("price", ()).await.unwrap(), 2);

    let rows = db
        .dao
        .select_rows(
            "price",
            &["code", "price"],
            filter! { "price" => (">", 2.0) },
            &SelectOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String>("code").unwrap(), "B");
    assert_eq!(rows[0].get::<f64>("price").unwrap(), 2.2);
}

#[tokio::test]
async fn test_single_member_group_limits_delete() {
    let db = setup().await;
    seed_funds(&db).await;

    // Without the parentheses, open fund 162411 would match too.
    let deleted = db
        .dao
        .delete_rows(
            "fund",
            filter! {
                "code" => "161725",
                "AND" => [filter! {
                    "OR" => [filter! { "age" => 9 }, filter! { "status" => "open" }],
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(db.dao.count_rows("fund", ()).await.unwrap(), 4);
    assert!(db.dao.exists("fund", filter! { "code" => "162411" }).await.unwrap());
}
