#![cfg(feature = "rusqlite")]
#![allow(dead_code)]

use ::rusqlite::Connection;
use serde::Deserialize;
use trellis::prelude::*;
use trellis::sqlite::SqliteStorage;

pub const SCHEMA: &str = r#"
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT
    );
    CREATE TABLE tasks (
        id INTEGER PRIMARY KEY,
        user_id INTEGER REFERENCES users(id),
        title TEXT NOT NULL
    );
    CREATE TABLE tags (
        id INTEGER PRIMARY KEY,
        task_id INTEGER,
        name TEXT NOT NULL
    );
    CREATE TABLE posts (
        id INTEGER PRIMARY KEY,
        author_id INTEGER REFERENCES users(id),
        title TEXT NOT NULL
    );
    CREATE TABLE labels (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE posts_labels (
        post_id INTEGER NOT NULL REFERENCES posts(id),
        label_id INTEGER NOT NULL REFERENCES labels(id),
        PRIMARY KEY (post_id, label_id)
    );
    CREATE TABLE comments (
        message_id INTEGER PRIMARY KEY,
        author TEXT NOT NULL,
        body TEXT
    );
"#;

pub const SEED: &str = r#"
    INSERT INTO users (name, email) VALUES ('Jane', 'jane@example.com'), ('Joe', NULL);
    INSERT INTO tasks (user_id, title) VALUES (1, 'Jane Task'), (2, 'Joe Task');
    INSERT INTO tags (task_id, name) VALUES (1, 'red'), (2, 'blue');
    INSERT INTO posts (author_id, title) VALUES (1, 'Hello');
    INSERT INTO labels (name) VALUES ('rust'), ('sql'), ('unused');
    INSERT INTO posts_labels (post_id, label_id) VALUES (1, 1), (1, 2);
"#;

#[derive(Debug, Deserialize, PartialEq)]
pub struct UserModel {
    pub id: i64,
    pub name: String,
}

pub fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch(SCHEMA).expect("Failed to create tables");
    conn.execute_batch(SEED).expect("Failed to seed tables");
    conn
}

pub fn registry() -> Registry {
    Registry::builder()
        .relation(
            RelationDecl::new("users")
                .associate(Association::many("tasks"))
                .associate(Association::many("posts").keys("id", "author_id")),
        )
        .relation(
            RelationDecl::new("tasks").associate(Association::belongs("user").relation("users")),
        )
        .relation(RelationDecl::new("tags"))
        .relation(
            RelationDecl::new("posts")
                .associate(Association::belongs("author").relation("users"))
                .associate(Association::many("labels").through("posts_labels")),
        )
        .relation(RelationDecl::new("labels"))
        .relation(RelationDecl::new("posts_labels"))
        .relation(RelationDecl::new("comments"))
        .struct_schema(StructSchema::new("UserModel", ["id", "name"]))
        .command("users", "upsert", CommandType::Create)
        .command("users", "remove", CommandType::Delete)
        .build()
}

pub fn setup_repo() -> Repository {
    Repository::new(registry(), SqliteStorage::new(setup_db())).expect("Failed to resolve registry")
}

/// `users` with their tasks, each task with its tags.
pub fn users_tasks_tags(repo: &Repository) -> RelationNode {
    let tags = repo.relation("tags").unwrap();
    let tasks = repo
        .relation("tasks")
        .unwrap()
        .combine_children(CombineKind::Many, &tags)
        .unwrap();
    repo.relation("users")
        .unwrap()
        .combine_children(CombineKind::Many, &tasks)
        .unwrap()
}

pub fn count(repo: &Repository, relation: &str) -> usize {
    repo.relation(relation).unwrap().to_vec().unwrap().len()
}
