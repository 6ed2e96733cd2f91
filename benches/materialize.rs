use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use trellis::core::MemoryStorage;
use trellis::prelude::*;

const USERS: i64 = 200;
const TASKS_PER_USER: i64 = 5;

fn memory_storage() -> MemoryStorage {
    let storage = MemoryStorage::new()
        .table(
            "users",
            [
                AttributeDef::new("id", ScalarType::Serial).primary_key(),
                AttributeDef::new("name", ScalarType::Text),
            ],
        )
        .table(
            "tasks",
            [
                AttributeDef::new("id", ScalarType::Serial).primary_key(),
                AttributeDef::new("user_id", ScalarType::Integer).references("users"),
                AttributeDef::new("title", ScalarType::Text),
            ],
        );
    for user in 1..=USERS {
        storage
            .insert("users", Tuple::new().with("name", format!("User {user}")))
            .unwrap();
        for task in 0..TASKS_PER_USER {
            storage
                .insert(
                    "tasks",
                    Tuple::new()
                        .with("user_id", user)
                        .with("title", format!("Task {task}")),
                )
                .unwrap();
        }
    }
    storage
}

fn registry() -> Registry {
    Registry::builder()
        .relation(RelationDecl::new("users"))
        .relation(RelationDecl::new("tasks"))
        .build()
}

fn users_with_tasks(repo: &Repository) -> RelationNode {
    let tasks = repo.relation("tasks").unwrap();
    repo.relation("users")
        .unwrap()
        .combine_children(CombineKind::Many, &tasks)
        .unwrap()
}

fn bench_memory(c: &mut Criterion) {
    let repo = Repository::new(registry(), memory_storage()).unwrap();
    let graph = users_with_tasks(&repo);

    c.bench_function("memory/users_with_tasks", |b| {
        b.iter(|| black_box(graph.to_vec().unwrap()))
    });
    c.bench_function("memory/ast", |b| b.iter(|| black_box(graph.to_ast().to_string())));
}

#[cfg(feature = "rusqlite")]
fn bench_sqlite(c: &mut Criterion) {
    use trellis::sqlite::SqliteStorage;

    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE tasks (
             id INTEGER PRIMARY KEY,
             user_id INTEGER REFERENCES users(id),
             title TEXT NOT NULL
         );",
    )
    .unwrap();
    let repo = Repository::new(registry(), SqliteStorage::new(conn)).unwrap();
    let graph = users_with_tasks(&repo);
    let create = repo.command("create", &graph).unwrap();
    for user in 0..USERS {
        let tasks = (0..TASKS_PER_USER)
            .map(|task| Payload::new().with("title", format!("Task {task}")))
            .collect();
        create
            .call(Payload::new().with("name", format!("User {user}")).many("tasks", tasks))
            .unwrap();
    }

    c.bench_function("sqlite/users_with_tasks", |b| {
        b.iter(|| black_box(graph.to_vec().unwrap()))
    });
    c.bench_function("sqlite/create_nested", |b| {
        b.iter_batched(
            || {
                Payload::new()
                    .with("name", "Bench")
                    .many("tasks", vec![Payload::new().with("title", "One")])
            },
            |payload| black_box(create.call(payload).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

#[cfg(not(feature = "rusqlite"))]
fn bench_sqlite(_: &mut Criterion) {}

criterion_group!(benches, bench_memory, bench_sqlite);
criterion_main!(benches);
