//! Session verbs against an in-memory executor.

mod common;

use common::{MockExecutor, Obj, accounts, users};
use polyorm::{
    AssociationDescriptor, AssociationKind, Assembler, Assignment, ColumnDescriptor, Dialect,
    DriverFeature, ExecResult, OrmConfig, OrmError, Registry, Row, Session, TableDescriptor, Value,
    args,
};

fn registry() -> Registry {
    let mut r = Registry::new();
    r.register(users().association(AssociationDescriptor::new(
        "posts",
        AssociationKind::HasMany,
        "user_id",
        "posts",
    )))
    .unwrap();
    r.register(accounts()).unwrap();
    r.register(
        TableDescriptor::new("posts")
            .column(ColumnDescriptor::new("id").primary_key().auto_increment())
            .column(ColumnDescriptor::new("user_id"))
            .column(ColumnDescriptor::new("title")),
    )
    .unwrap();
    r.finalize().unwrap();
    r
}

fn mysql() -> MockExecutor {
    MockExecutor::new(
        Dialect::MySql,
        &[DriverFeature::LastInsertId, DriverFeature::Transactions],
    )
}

// ============================================
// Construction
// ============================================

#[test]
fn session_checks_dialect_and_registry() {
    let exec = mysql();
    let r = registry();

    let err = Session::new(&exec, &r, OrmConfig::new(Dialect::Postgres)).unwrap_err();
    assert!(err.is_invalid_configuration());

    let unfinalized = Registry::new();
    let err = Session::new(&exec, &unfinalized, OrmConfig::new(Dialect::MySql)).unwrap_err();
    assert!(err.is_invalid_configuration());

    let err = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql).batch_size(0)).unwrap_err();
    assert!(err.is_invalid_configuration());

    assert!(Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).is_ok());
}

// ============================================
// Reads
// ============================================

#[tokio::test]
async fn find_maps_rows_onto_records() {
    let exec = mysql();
    exec.push_rows(vec![
        Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::BigInt(1), Value::from("ann")],
        ),
        Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::BigInt(2), Value::from("bob")],
        ),
    ]);
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let found: Vec<Obj> = session
        .find(&session.model("users").unwrap().filter("name <> ?", ["eve"]))
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[1].values.get("name"), Some(&Value::from("bob")));
    assert!(found.iter().all(|o| o.persisted));

    let statements = exec.statements();
    assert_eq!(
        statements[0].0,
        "SELECT `id`, `name` FROM `users` WHERE (name <> ?)"
    );
    assert_eq!(statements[0].1, args!["eve"]);
}

#[tokio::test]
async fn first_orders_by_primary_key() {
    let exec = mysql();
    exec.push_rows(vec![Row::new(vec!["id".into()], vec![Value::BigInt(3)])]);
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let first: Obj = session.first(&session.model("users").unwrap()).await.unwrap();
    assert_eq!(first.values.get("id"), Some(&Value::BigInt(3)));
    assert_eq!(
        exec.sql()[0],
        "SELECT `id`, `name` FROM `users` ORDER BY `id` LIMIT 1"
    );

    let err = session
        .first::<Obj>(&session.model("users").unwrap().order_by("name"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(exec.sql()[1].ends_with("ORDER BY name LIMIT 1"));
}

#[tokio::test]
async fn count_reads_the_single_value() {
    let exec = mysql();
    exec.push_rows(vec![Row::new(vec!["COUNT(*)".into()], vec![Value::BigInt(4)])]);
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let n = session.count(&session.model("accounts").unwrap()).await.unwrap();
    assert_eq!(n, 4);
    assert_eq!(
        exec.sql()[0],
        "SELECT COUNT(*) FROM `accounts` WHERE (`deleted_at` IS NULL)"
    );

    let err = session.count(&session.model("accounts").unwrap()).await.unwrap_err();
    assert!(err.is_mapping());
}

// ============================================
// Create
// ============================================

#[tokio::test]
async fn create_chunks_inside_a_transaction() {
    let exec = mysql();
    exec.push_exec(Ok(ExecResult::new(2).with_last_insert_id(10i64)));
    exec.push_exec(Ok(ExecResult::new(2).with_last_insert_id(12i64)));
    exec.push_exec(Ok(ExecResult::new(1).with_last_insert_id(14i64)));
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql).batch_size(2)).unwrap();

    let mut objects: Vec<Obj> = ["a", "b", "c", "d", "e"].into_iter().map(Obj::named).collect();
    let outcome = session
        .create(&session.model("users").unwrap(), &mut objects)
        .await
        .unwrap();

    assert_eq!(outcome.written, 5);
    assert_eq!(outcome.backfilled, 5);
    assert_eq!(exec.transactions(), vec!["begin", "commit"]);
    assert_eq!(exec.statements().len(), 3);
    let ids: Vec<_> = objects.iter().map(|o| o.values["id"].clone()).collect();
    assert_eq!(ids, args![10i64, 11i64, 12i64, 13i64, 14i64]);
}

#[tokio::test]
async fn create_rolls_back_on_failure() {
    let exec = mysql();
    exec.push_exec(Ok(ExecResult::new(2)));
    exec.push_exec(Err(OrmError::Execution("deadlock".into())));
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql).batch_size(2)).unwrap();

    let mut objects: Vec<Obj> = ["a", "b", "c"].into_iter().map(Obj::named).collect();
    let err = session
        .create(&session.model("users").unwrap(), &mut objects)
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::Execution(_)));
    assert_eq!(exec.transactions(), vec!["begin", "rollback"]);
}

#[tokio::test]
async fn create_without_transactions() {
    let exec = MockExecutor::new(Dialect::Sqlite, &[]);
    let r = registry();

    let strict = OrmConfig::new(Dialect::Sqlite)
        .batch_size(1)
        .require_transactions(true);
    let session = Session::new(&exec, &r, strict).unwrap();
    let mut objects = vec![Obj::named("a"), Obj::named("b")];
    let err = session
        .create(&session.model("users").unwrap(), &mut objects)
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(exec.statements().is_empty());

    let lenient = OrmConfig::new(Dialect::Sqlite).batch_size(1);
    let session = Session::new(&exec, &r, lenient).unwrap();
    let outcome = session
        .create(&session.model("users").unwrap(), &mut objects)
        .await
        .unwrap();
    assert_eq!(outcome.written, 2);
    assert_eq!(exec.statements().len(), 2);
    assert!(exec.transactions().is_empty());
}

#[tokio::test]
async fn create_uses_the_query_upsert() {
    let exec = MockExecutor::new(Dialect::Postgres, &[]);
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::Postgres)).unwrap();

    let mut objects = vec![Obj::named("a")];
    session
        .create(
            &session.model("users").unwrap().on_conflict_update(&["name"]),
            &mut objects,
        )
        .await
        .unwrap();

    assert_eq!(
        exec.sql()[0],
        r#"INSERT INTO "users" ("name") VALUES (?) ON CONFLICT ("id") DO UPDATE SET "name" = excluded."name""#
    );
}

#[tokio::test]
async fn create_requires_a_model() {
    let exec = mysql();
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let mut objects = vec![Obj::named("a")];
    let err = session
        .create(&session.query().table("users"), &mut objects)
        .await
        .unwrap_err();
    assert!(err.is_invalid_configuration());
}

// ============================================
// Save / update / delete
// ============================================

#[tokio::test]
async fn save_updates_persisted_objects_by_key() {
    let exec = mysql();
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let mut account = Obj::named("bob").with("id", 7i64);
    account.persisted = true;
    let affected = session.save("accounts", &mut account).await.unwrap();

    assert_eq!(affected, 1);
    assert!(matches!(account.values.get("updated_at"), Some(Value::Timestamp(_))));
    let (sql, args) = exec.statements().remove(0);
    assert_eq!(
        sql,
        "UPDATE `accounts` SET `name` = ?, `updated_at` = ? WHERE (`deleted_at` IS NULL) AND (`id` = ?)"
    );
    assert_eq!(args.len(), 3);
    assert_eq!(args[0], Value::from("bob"));
    assert_eq!(args[2], Value::BigInt(7));
}

#[tokio::test]
async fn save_inserts_new_objects() {
    let exec = mysql();
    exec.push_exec(Ok(ExecResult::new(1).with_last_insert_id(31i64)));
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let mut user = Obj::named("new");
    session.save("users", &mut user).await.unwrap();

    assert!(user.persisted);
    assert_eq!(user.values.get("id"), Some(&Value::BigInt(31)));
    assert_eq!(exec.sql()[0], "INSERT INTO `users` (`name`) VALUES (?)");
}

#[tokio::test]
async fn save_requires_key_value() {
    let exec = mysql();
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let mut user = Obj::named("nokey");
    user.persisted = true;
    let err = session.save("users", &mut user).await.unwrap_err();
    assert!(err.is_mapping());
    assert!(exec.statements().is_empty());
}

#[tokio::test]
async fn updates_stamp_updated_at() {
    let exec = mysql();
    exec.push_exec(Ok(ExecResult::new(3)));
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let n = session
        .updates(
            &session.model("accounts").unwrap().filter("id > ?", [1]),
            &[Assignment::set("name", "x")],
        )
        .await
        .unwrap();

    assert_eq!(n, 3);
    assert_eq!(
        exec.sql()[0],
        "UPDATE `accounts` SET `name` = ?, `updated_at` = ? WHERE (`deleted_at` IS NULL) AND (id > ?)"
    );

    // An explicit updated_at is left alone.
    session
        .updates(
            &session.model("accounts").unwrap().filter("id > ?", [1]),
            &[Assignment::set("updated_at", Value::Null)],
        )
        .await
        .unwrap();
    assert_eq!(
        exec.sql()[1],
        "UPDATE `accounts` SET `updated_at` = ? WHERE (`deleted_at` IS NULL) AND (id > ?)"
    );
    assert_eq!(exec.statements()[1].1[0], Value::Null);

    session
        .updates(
            &session.model("users").unwrap().filter("id = ?", [1]),
            &[Assignment::increment("visits", 1)],
        )
        .await
        .unwrap();
    assert_eq!(
        exec.sql()[2],
        "UPDATE `users` SET `visits` = `visits` + 1 WHERE (id = ?)"
    );
}

#[tokio::test]
async fn delete_is_soft_for_scoped_models() {
    let exec = mysql();
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    session
        .delete(&session.model("accounts").unwrap().filter("id = ?", [5]))
        .await
        .unwrap();
    session
        .delete(&session.model("accounts").unwrap().unscoped().filter("id = ?", [5]))
        .await
        .unwrap();
    session
        .delete(&session.model("users").unwrap().filter("id = ?", [6]))
        .await
        .unwrap();

    let sql = exec.sql();
    assert_eq!(
        sql[0],
        "UPDATE `accounts` SET `deleted_at` = ? WHERE (`deleted_at` IS NULL) AND (id = ?)"
    );
    assert_eq!(sql[1], "DELETE FROM `accounts` WHERE (id = ?)");
    assert_eq!(sql[2], "DELETE FROM `users` WHERE (id = ?)");
}

// ============================================
// Preload
// ============================================

#[test]
fn preload_queries_collect_owner_keys() {
    let exec = mysql();
    let r = registry();
    let session = Session::new(&exec, &r, OrmConfig::new(Dialect::MySql)).unwrap();

    let owners = vec![
        Obj::named("a").with("id", 1i64),
        Obj::named("b").with("id", 2i64),
        Obj::named("c"),
    ];
    let queries = session
        .preload_queries(&session.model("users").unwrap().preload("posts"), &owners)
        .unwrap();

    assert_eq!(queries.len(), 1);
    let (name, query) = &queries[0];
    assert_eq!(name, "posts");
    let built = Assembler::new(Dialect::MySql).build_select(query, false).unwrap();
    assert_eq!(
        built.sql,
        "SELECT `id`, `user_id`, `title` FROM `posts` WHERE (`user_id` IN (?, ?))"
    );
    assert_eq!(built.args, args![1i64, 2i64]);

    let none = session
        .preload_queries(&session.model("users").unwrap(), &owners)
        .unwrap();
    assert!(none.is_empty());
}
