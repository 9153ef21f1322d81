//! Chained CRUD against an in-memory SQLite database.
//!
//! Run with `RUST_LOG=rowsmith_core=debug` to see every statement.

use rowsmith_core::executor::sqlite::SqlitePool;
use rowsmith_core::{op, record, AggregateResultExt, Engine};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Clone)]
struct User {
    id: u64,
    name: String,
    email: String,
    age: i32,
}

record!(User {
    id: "id,auto_increment",
    name: "user_name",
    email,
    age,
});

#[tokio::main]
async fn main() -> rowsmith_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::new(SqlitePool::in_memory().await?);
    engine
        .exec(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_name TEXT NOT NULL,
                email TEXT NOT NULL,
                age INTEGER NOT NULL
            )",
        )
        .await?;

    // INSERT, single and batch
    let id = engine
        .table("users")
        .insert(&User {
            id: 0,
            name: "John Doe".into(),
            email: "john@example.com".into(),
            age: 30,
        })
        .await?;
    println!("inserted user {id}");

    let others = vec![
        User { id: 0, name: "Jane".into(), email: "jane@example.com".into(), age: 17 },
        User { id: 0, name: "Jim".into(), email: "jim@example.com".into(), age: 45 },
    ];
    engine.table("users").insert_batch(&others).await?;

    // SELECT as text rows
    let adults = engine
        .table("users")
        .field(("user_name", "age"))
        .where_(("age", op::GTE, 18))
        .order(&["age", "desc"])
        .limit(10)
        .select()
        .await?;
    for row in &adults {
        println!("{:?} is {:?}", row.get("user_name"), row.get("age"));
    }

    // FIND into typed records
    let mut users: Vec<User> = Vec::new();
    engine
        .table("users")
        .where_(("email", op::LIKE, "j%"))
        .find(&mut users)
        .await?;
    println!("found {} users, last SQL: {}", users.len(), engine.last_sql());

    // UPDATE and DELETE
    let changed = engine
        .table("users")
        .where_(("user_name", "Jane"))
        .update(("age", 18))
        .await?;
    println!("updated {changed} rows");

    let removed = engine
        .table("users")
        .where_(("id", op::IN, vec![2, 3]))
        .where_(("age", op::LT, 40))
        .delete()
        .await?;
    println!("deleted {removed} rows");

    // Aggregates
    let count = engine.table("users").count("*").await.or_sentinel();
    let oldest = engine.table("users").max("age").await?;
    println!("{count} users left, oldest is {oldest}");

    Ok(())
}
