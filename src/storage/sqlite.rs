use std::collections::HashMap;
use std::path::Path;
use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use crate::core::error::Result;
use crate::core::types::Id;
use crate::storage::batcher::Batcher;
use crate::storage::codec::{decode_id_map, decode_ids};
use crate::storage::{Fetched, Fetcher, IndexKind, IndexWrite, Storage, StoredResource};

const SCHEMA: &str = "
create table if not exists resources (
    id integer primary key,
    type text,
    summary blob not null,
    details blob,
    stamp integer not null
);
create index if not exists resources_stamp on resources(stamp);
create table if not exists indexes (
    id text not null,
    type integer not null,
    payload blob not null,
    primary key (id, type)
);
create table if not exists updated (
    id text not null,
    type integer not null,
    primary key (id, type)
);
";

const SUMMARY_FILL: &str = "select id, summary, 0, type from resources where id in #IN#";
const DETAILS_FILL: &str =
    "select id, ifnull(details, summary), details is not null, type from resources where id in #IN#";

const IDS_KEY: &str = "ids";

/// SQLite-backed storage. One connection serialized behind a mutex; statements are
/// prepared once and cached by the connection.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    summary: Batcher,
    details: Batcher,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P, batch_sizes: &[usize]) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?, batch_sizes)
    }

    pub fn open_in_memory(batch_sizes: &[usize]) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, batch_sizes)
    }

    fn with_connection(conn: Connection, batch_sizes: &[usize]) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStorage {
            conn: Mutex::new(conn),
            summary: Batcher::new(SUMMARY_FILL, batch_sizes),
            details: Batcher::new(DETAILS_FILL, batch_sizes),
        })
    }

    fn count(&self, kind: IndexKind) -> u32 {
        let conn = self.conn.lock();
        conn.query_row(
            "select count(*) from indexes where type = ?",
            params![kind as i64],
            |row| row.get::<_, u32>(0),
        )
        .unwrap_or(0)
    }

    fn each(&self, kind: IndexKind, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        let sql = if only_new {
            "select i.id, i.payload from indexes i join updated u on i.id = u.id and i.type = u.type
             where i.type = ? order by i.id"
        } else {
            "select id, payload from indexes where type = ? order by id"
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let mut rows = stmt.query(params![kind as i64])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let payload: Vec<u8> = row.get(1)?;
            f(&name, decode_ids(&payload));
        }
        Ok(())
    }

    fn upsert(&self, kind: IndexKind, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        put_index(&tx, kind, name, payload)?;
        tx.commit()?;
        Ok(decode_ids(payload))
    }

    fn remove(&self, kind: IndexKind, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("delete from indexes where id = ?1 and type = ?2", params![name, kind as i64])?;
        conn.execute("delete from updated where id = ?1 and type = ?2", params![name, kind as i64])?;
        Ok(())
    }
}

/// Write one index row and mark it changed. Rolled back with `tx` unless committed.
fn put_index(tx: &Transaction<'_>, kind: IndexKind, name: &str, payload: &[u8]) -> Result<()> {
    tx.prepare_cached("insert or replace into indexes (id, type, payload) values (?1, ?2, ?3)")?
        .execute(params![name, kind as i64, payload])?;
    tx.prepare_cached("insert or ignore into updated (id, type) values (?1, ?2)")?
        .execute(params![name, kind as i64])?;
    Ok(())
}

impl Fetcher for SqliteStorage {
    fn get(&self, id: Id) -> Result<Option<Fetched>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "select ifnull(details, summary), details is not null, type from resources where id = ?",
        )?;
        let fetched = stmt
            .query_row(params![id.0], |row| {
                Ok(Fetched {
                    id,
                    payload: Bytes::from(row.get::<_, Vec<u8>>(0)?),
                    detailed: row.get(1)?,
                    tpe: row.get(2)?,
                })
            })
            .optional()?;
        Ok(fetched)
    }

    fn fill(&self, ids: &[Id], detailed: bool, found: &mut dyn FnMut(Fetched)) -> Result<()> {
        let batcher = if detailed { &self.details } else { &self.summary };
        let conn = self.conn.lock();
        for batch in batcher.query(ids) {
            let mut stmt = conn.prepare_cached(batch.statement)?;
            let mut rows = stmt.query(params_from_iter(batch.ids.iter().map(|id| id.0)))?;
            while let Some(row) = rows.next()? {
                found(Fetched {
                    id: Id(row.get(0)?),
                    payload: Bytes::from(row.get::<_, Vec<u8>>(1)?),
                    detailed: row.get(2)?,
                    tpe: row.get(3)?,
                });
            }
        }
        Ok(())
    }

    fn load_n_resources(&self, n: usize) -> Result<Vec<StoredResource>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "select id, type, summary, details from resources order by stamp desc limit ?",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(StoredResource {
                id: Id(row.get(0)?),
                tpe: row.get(1)?,
                summary: Bytes::from(row.get::<_, Vec<u8>>(2)?),
                details: row.get::<_, Option<Vec<u8>>>(3)?.map(Bytes::from),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl Storage for SqliteStorage {
    fn set_count(&self) -> u32 {
        self.count(IndexKind::Set)
    }

    fn list_count(&self) -> u32 {
        self.count(IndexKind::List)
    }

    fn each_set(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        self.each(IndexKind::Set, only_new, f)
    }

    fn each_list(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        self.each(IndexKind::List, only_new, f)
    }

    fn upsert_set(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        self.upsert(IndexKind::Set, name, payload)
    }

    fn upsert_list(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        self.upsert(IndexKind::List, name, payload)
    }

    fn upsert_indexes(&self, writes: &[IndexWrite]) -> Result<Vec<Vec<Id>>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for write in writes {
            put_index(&tx, write.kind, &write.name, &write.payload)?;
        }
        tx.commit()?;
        Ok(writes.iter().map(|write| decode_ids(&write.payload)).collect())
    }

    fn remove_set(&self, name: &str) -> Result<()> {
        self.remove(IndexKind::Set, name)
    }

    fn remove_list(&self, name: &str) -> Result<()> {
        self.remove(IndexKind::List, name)
    }

    fn load_ids(&self) -> Result<HashMap<String, Id>> {
        let conn = self.conn.lock();
        let payload: Option<Vec<u8>> = conn
            .query_row(
                "select payload from indexes where id = ?1 and type = ?2",
                params![IDS_KEY, IndexKind::Ids as i64],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => decode_id_map(&payload),
            None => Ok(HashMap::new()),
        }
    }

    fn update_ids(&self, payload: &[u8]) -> Result<HashMap<String, Id>> {
        let ids = decode_id_map(payload)?;
        let conn = self.conn.lock();
        conn.execute(
            "insert or replace into indexes (id, type, payload) values (?1, ?2, ?3)",
            params![IDS_KEY, IndexKind::Ids as i64, payload],
        )?;
        Ok(ids)
    }

    fn upsert_resource(&self, resource: &StoredResource) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "insert or replace into resources (id, type, summary, details, stamp)
             values (?1, ?2, ?3, ?4, (select ifnull(max(stamp), 0) + 1 from resources))",
        )?;
        stmt.execute(params![
            resource.id.0,
            resource.tpe,
            &resource.summary[..],
            resource.details.as_deref(),
        ])?;
        Ok(())
    }

    fn remove_resource(&self, id: Id) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("delete from resources where id = ?", params![id.0])?;
        Ok(())
    }

    fn clear_new(&self) -> Result<()> {
        self.conn.lock().execute("delete from updated", [])?;
        Ok(())
    }
}
