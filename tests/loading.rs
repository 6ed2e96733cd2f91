#![cfg(feature = "rusqlite")]

use common::{UserModel, setup_repo, users_tasks_tags};
use trellis::error::TrellisError;
use trellis::prelude::*;

mod common;

#[test]
fn test_plain_relation() {
    let repo = setup_repo();
    let users = repo.relation("users").unwrap().to_vec().unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].type_name(), "User");
    assert_eq!(users[0].field_names(), ["id", "name", "email"]);
    assert_eq!(users[0].str("name"), Some("Jane"));
    assert_eq!(users[1].value("email"), Some(&Value::Null));
}

#[test]
fn test_many_nests_children() {
    let repo = setup_repo();
    let users = users_tasks_tags(&repo).to_vec().unwrap();

    assert_eq!(users.len(), 2);
    let jane_tasks = users[0].many("tasks").unwrap();
    assert_eq!(jane_tasks.len(), 1);
    assert_eq!(jane_tasks[0].str("title"), Some("Jane Task"));
    assert_eq!(jane_tasks[0].many("tags").unwrap()[0].str("name"), Some("red"));

    let joe_tasks = users[1].many("tasks").unwrap();
    assert_eq!(joe_tasks[0].str("title"), Some("Joe Task"));
    assert_eq!(joe_tasks[0].many("tags").unwrap()[0].str("name"), Some("blue"));
}

#[test]
fn test_many_without_children_is_empty() {
    let repo = setup_repo();
    repo.command_on("create", "users")
        .unwrap()
        .call(Payload::new().with("name", "Lonely"))
        .unwrap();

    let lonely = users_tasks_tags(&repo)
        .restrict(Criteria::new().eq("name", "Lonely"))
        .unwrap()
        .one_exact()
        .unwrap();
    assert_eq!(lonely.get("tasks"), Some(&Field::Many(Vec::new())));
}

#[test]
fn test_one_takes_single_child_or_null() {
    let repo = setup_repo();
    repo.command_on("create", "users")
        .unwrap()
        .call(Payload::new().with("name", "Lonely"))
        .unwrap();

    let tasks = repo.relation("tasks").unwrap();
    let users = repo
        .relation("users")
        .unwrap()
        .combine_children(CombineKind::One, &tasks)
        .unwrap()
        .to_vec()
        .unwrap();

    assert_eq!(users[0].one("task").and_then(|t| t.str("title")), Some("Jane Task"));
    assert_eq!(users[2].get("task"), Some(&Field::One(None)));
}

#[test]
fn test_wrap_nests_owner() {
    let repo = setup_repo();
    let users = repo.relation("users").unwrap();
    let tasks = repo
        .relation("tasks")
        .unwrap()
        .wrap_parent(&users)
        .unwrap()
        .to_vec()
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].one("user").and_then(|u| u.str("name")), Some("Jane"));
    assert_eq!(tasks[1].one("user").and_then(|u| u.str("name")), Some("Joe"));
}

#[test]
fn test_wrap_with_declared_association() {
    let repo = setup_repo();
    let users = repo.relation("users").unwrap();
    let post = repo
        .relation("posts")
        .unwrap()
        .wrap("author", &users)
        .unwrap()
        .one_exact()
        .unwrap();

    assert_eq!(post.one("author").and_then(|u| u.str("name")), Some("Jane"));
}

#[test]
fn test_restricted_root_limits_child_fetch() {
    let repo = setup_repo();
    let joe = users_tasks_tags(&repo).by_id(2).unwrap().one().unwrap().unwrap();

    assert_eq!(joe.str("name"), Some("Joe"));
    assert_eq!(joe.many("tasks").unwrap().len(), 1);
}

#[test]
fn test_order_limit_offset() {
    let repo = setup_repo();
    let users = repo.relation("users").unwrap();

    let joe = users.order([OrderBy::desc("name")]).unwrap().first().unwrap().unwrap();
    assert_eq!(joe.str("name"), Some("Joe"));

    let second = users.order(["name"]).unwrap().offset(1).limit(5).to_vec().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].str("name"), Some("Joe"));
}

#[test]
fn test_project_keeps_combination_keys() {
    let repo = setup_repo();
    let graph = users_tasks_tags(&repo);

    let slim = graph.project(["id", "name"]).unwrap().to_vec().unwrap();
    assert_eq!(slim[0].field_names(), ["id", "name", "tasks"]);

    let err = graph.project(["name"]).unwrap_err();
    assert!(matches!(err, TrellisError::InvalidKeyPair { .. }));
}

#[test]
fn test_unknown_attribute_is_rejected() {
    let repo = setup_repo();
    let err = repo
        .relation("users")
        .unwrap()
        .restrict(Criteria::new().eq("nope", 1))
        .unwrap_err();
    assert!(matches!(err, TrellisError::UnknownAttribute { .. }));
    assert!(matches!(
        repo.relation("nope").unwrap_err(),
        TrellisError::UnknownRelation(_)
    ));
}

#[test]
fn test_one_rejects_many_tuples() {
    let repo = setup_repo();
    let err = repo.relation("users").unwrap().one().unwrap_err();
    assert!(matches!(
        err,
        TrellisError::TupleCountMismatch { actual: 2, .. }
    ));
}

#[test]
fn test_declared_struct() {
    let repo = setup_repo();
    let users = repo.relation("users").unwrap().as_struct("UserModel").unwrap();

    let jane = users.by_id(1).unwrap().one_exact().unwrap();
    assert_eq!(jane.type_name(), "UserModel");
    assert_eq!(jane.field_names(), ["id", "name"]);

    let typed: Vec<UserModel> = users.to_vec_as().unwrap();
    assert_eq!(
        typed,
        [
            UserModel { id: 1, name: "Jane".into() },
            UserModel { id: 2, name: "Joe".into() },
        ]
    );

    let err = users.project(["name"]).unwrap_err();
    assert!(matches!(err, TrellisError::StructConstruction { .. }));

    let err = repo
        .relation("users")
        .unwrap()
        .project(["name"])
        .unwrap()
        .as_struct("UserModel")
        .unwrap_err();
    assert!(matches!(
        err,
        TrellisError::StructConstruction { ref attribute, .. } if attribute == "id"
    ));
}

#[test]
fn test_custom_primary_key() {
    let repo = setup_repo();
    let comments = repo.relation("comments").unwrap();
    assert_eq!(
        comments.schema().primary_key().map(|k| k.as_str()),
        Some("message_id")
    );
    let created = repo
        .command("create", &comments)
        .unwrap()
        .call(Payload::new().with("author", "Jane").with("body", "hi"))
        .unwrap();
    let id = created.int("message_id").unwrap();
    assert_eq!(comments.by_id(id).unwrap().one_exact().unwrap(), created);
}

#[test]
fn test_json_output() {
    let repo = setup_repo();
    let jane = users_tasks_tags(&repo).by_id(1).unwrap().one_exact().unwrap();
    let json = jane.to_json().unwrap();
    assert_eq!(json["name"], "Jane");
    assert_eq!(json["tasks"][0]["tags"][0]["name"], "red");
}
