//! Explicit transactions: every statement between `begin` and
//! `commit`/`rollback` runs on the transaction's connection.

use rowsmith_core::executor::sqlite::SqlitePool;
use rowsmith_core::{op, record, Engine, Error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Clone)]
struct Account {
    id: i64,
    owner: String,
    balance: i64,
}

record!(Account {
    id: "id,AUTO_INCREMENT",
    owner,
    balance,
});

async fn transfer(engine: &mut Engine<SqlitePool>, from: i64, to: i64, amount: i64) -> rowsmith_core::Result<()> {
    engine.begin().await?;
    match move_balance(engine, from, to, amount).await {
        Ok(()) => engine.commit().await,
        Err(err) => {
            engine.rollback().await?;
            Err(err)
        }
    }
}

async fn move_balance(engine: &mut Engine<SqlitePool>, from: i64, to: i64, amount: i64) -> rowsmith_core::Result<()> {
    let source: Account = engine.table("accounts").where_(("id", from)).find_one().await?;
    if source.balance < amount {
        return Err(Error::transaction(format!(
            "account {from} holds {} but {amount} was requested",
            source.balance
        )));
    }

    engine
        .exec(&format!("UPDATE accounts SET balance = balance - {amount} WHERE id = {from}"))
        .await?;
    engine
        .exec(&format!("UPDATE accounts SET balance = balance + {amount} WHERE id = {to}"))
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> rowsmith_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::new(SqlitePool::in_memory().await?);
    engine
        .exec("CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, owner TEXT, balance INTEGER)")
        .await?;
    engine
        .table("accounts")
        .insert_batch(&[
            Account { id: 0, owner: "alice".into(), balance: 100 },
            Account { id: 0, owner: "bob".into(), balance: 20 },
        ])
        .await?;

    transfer(&mut engine, 1, 2, 30).await?;
    println!("first transfer committed");

    match transfer(&mut engine, 2, 1, 500).await {
        Ok(()) => println!("unexpected success"),
        Err(err) => println!("second transfer rolled back: {err}"),
    }

    // A second begin while one is active is rejected
    engine.begin().await?;
    if let Err(err) = engine.begin().await {
        println!("nested begin refused: {err}");
    }
    engine.rollback().await?;

    let rich = engine
        .table("accounts")
        .where_(("balance", op::GT, 0))
        .order(&["balance", "desc"])
        .select()
        .await?;
    for row in rich {
        println!("{:?}: {:?}", row.get("owner"), row.get("balance"));
    }
    Ok(())
}
