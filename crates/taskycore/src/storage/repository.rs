//! Generic data-access facade over named entity collections.
//!
//! Each `Repository<E>` exposes the same async create/get/filter/all/
//! update/delete/count surface for one collection. The SQLite work is
//! synchronous, so every operation hops onto the blocking thread pool.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use crate::core::error::AppResult;
use crate::storage::db::{get_connection, DbConnection, DbPool};

/// A record that lives in a named collection and is addressed by integer id.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, also used in log lines and not-found messages
    const COLLECTION: &'static str;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);
}

pub struct Repository<E: Entity> {
    pool: DbPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Runs `op` with a pooled connection on the blocking thread pool.
    async fn blocking<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbConnection) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            op(&mut conn)
        })
        .await?
    }

    /// Inserts `entity` and returns it with its assigned id.
    pub async fn create(&self, entity: E) -> AppResult<E> {
        self.blocking(move |conn| insert(conn, entity)).await
    }

    pub async fn get(&self, id: i64) -> AppResult<Option<E>> {
        self.blocking(move |conn| load_one::<E>(conn, id)).await
    }

    /// First entity (lowest id) matching `predicate`.
    pub async fn find<P>(&self, predicate: P) -> AppResult<Option<E>>
    where
        P: Fn(&E) -> bool + Send + 'static,
    {
        self.blocking(move |conn| Ok(load_all::<E>(conn)?.into_iter().find(|e| predicate(e))))
            .await
    }

    /// Entities matching `predicate`, ordered by id.
    pub async fn filter<P>(&self, predicate: P) -> AppResult<Vec<E>>
    where
        P: Fn(&E) -> bool + Send + 'static,
    {
        self.blocking(move |conn| {
            Ok(load_all::<E>(conn)?.into_iter().filter(|e| predicate(e)).collect())
        })
        .await
    }

    /// Every entity in the collection, ordered by id.
    pub async fn all(&self) -> AppResult<Vec<E>> {
        self.blocking(|conn| load_all::<E>(conn)).await
    }

    /// Applies `mutate` to the stored entity and persists the result.
    ///
    /// Returns `None` without touching the store when `id` is absent.
    pub async fn update<F>(&self, id: i64, mutate: F) -> AppResult<Option<E>>
    where
        F: FnOnce(&mut E) + Send + 'static,
    {
        Ok(self.update_with(id, mutate).await?.map(|(entity, ())| entity))
    }

    /// Like [`update`](Self::update), but hands back whatever `mutate` returns.
    ///
    /// Read, mutate and write share one write transaction, so a check made
    /// inside `mutate` still holds when the result is stored.
    pub async fn update_with<F, R>(&self, id: i64, mutate: F) -> AppResult<Option<(E, R)>>
    where
        F: FnOnce(&mut E) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(mut entity) = load_one::<E>(&tx, id)? else {
                return Ok(None);
            };
            let outcome = mutate(&mut entity);
            entity.set_id(id);
            tx.execute(
                "UPDATE entities SET body = ?1, updated_at = ?2 WHERE id = ?3 AND collection = ?4",
                params![serde_json::to_string(&entity)?, Utc::now().to_rfc3339(), id, E::COLLECTION],
            )?;
            tx.commit()?;
            Ok(Some((entity, outcome)))
        })
        .await
    }

    /// Returns the first entity matching `predicate`, inserting `make()` when none does.
    ///
    /// Lookup and insert share one write transaction, so concurrent callers
    /// can't create duplicates.
    pub async fn find_or_create<P, F>(&self, predicate: P, make: F) -> AppResult<(E, bool)>
    where
        P: Fn(&E) -> bool + Send + 'static,
        F: FnOnce() -> E + Send + 'static,
    {
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(existing) = load_all::<E>(&tx)?.into_iter().find(|e| predicate(e)) {
                return Ok((existing, false));
            }
            let created = insert(&tx, make())?;
            tx.commit()?;
            Ok((created, true))
        })
        .await
    }

    /// Deletes the entity; `false` when nothing was stored under `id`.
    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM entities WHERE id = ?1 AND collection = ?2",
                params![id, E::COLLECTION],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn count<P>(&self, predicate: P) -> AppResult<usize>
    where
        P: Fn(&E) -> bool + Send + 'static,
    {
        self.blocking(move |conn| Ok(load_all::<E>(conn)?.into_iter().filter(|e| predicate(e)).count()))
            .await
    }

    pub async fn count_all(&self) -> AppResult<usize> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE collection = ?1",
                params![E::COLLECTION],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }
}

fn insert<E: Entity>(conn: &rusqlite::Connection, mut entity: E) -> AppResult<E> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO entities (collection, body, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![E::COLLECTION, serde_json::to_string(&entity)?, now],
    )?;
    let id = conn.last_insert_rowid();
    entity.set_id(id);
    // keep the stored body's id in sync with the row id
    conn.execute(
        "UPDATE entities SET body = ?1 WHERE id = ?2",
        params![serde_json::to_string(&entity)?, id],
    )?;
    log::debug!("Created {} #{}", E::COLLECTION, id);
    Ok(entity)
}

fn load_one<E: Entity>(conn: &rusqlite::Connection, id: i64) -> AppResult<Option<E>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM entities WHERE id = ?1 AND collection = ?2",
            params![id, E::COLLECTION],
            |row| row.get(0),
        )
        .optional()?;

    body.map(|body| decode::<E>(id, &body)).transpose()
}

fn load_all<E: Entity>(conn: &rusqlite::Connection) -> AppResult<Vec<E>> {
    let mut stmt = conn.prepare_cached("SELECT id, body FROM entities WHERE collection = ?1 ORDER BY id")?;
    let rows = stmt.query_map(params![E::COLLECTION], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entities = Vec::new();
    for row in rows {
        let (id, body) = row?;
        entities.push(decode::<E>(id, &body)?);
    }
    Ok(entities)
}

fn decode<E: Entity>(id: i64, body: &str) -> AppResult<E> {
    let mut entity: E = serde_json::from_str(body)?;
    entity.set_id(id);
    Ok(entity)
}
