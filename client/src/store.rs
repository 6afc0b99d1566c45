use crate::error::ClientError;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use zsm_common::Identity;
use zsm_crypto::{CryptoError, SessionKeyStore, SessionKeys};

/// A persisted conversation entry (§3 "Local message record").
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalMessage {
    pub author: Identity,
    pub recipient: Identity,
    pub content: String,
    pub timestamp: u64,
}

/// The client's persistence boundary (§4.4 `[NEW]`): exactly the operations
/// the session and UI need, so a non-SQLite backend could be swapped in
/// behind this trait without touching `ClientSession`.
pub trait Store: SessionKeyStore {
    fn append_message(&self, message: &LocalMessage) -> Result<(), ClientError>;
    fn messages_between(&self, a: &Identity, b: &Identity) -> Result<Vec<LocalMessage>, ClientError>;
    fn set_nickname(&self, identity: &Identity, nickname: &str) -> Result<(), ClientError>;
    fn nickname(&self, identity: &Identity) -> Result<Option<String>, ClientError>;
    fn resolve_nickname(&self, nickname: &str) -> Result<Option<Identity>, ClientError>;
    fn backup_to(&self, path: &Path) -> Result<(), ClientError>;
}

/// SQLite-backed default implementation of [`Store`] (§6 "Persisted state
/// layout"), matching the `Users`/`Messages` two-table schema.
///
/// All access goes through one `Mutex<Connection>` — the "single mutex
/// around the database handle" invariant shared by the send path and the
/// receive task (§4.4 "Key-cache coherence", §5 "Client" shared-resource
/// policy).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, ClientError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, ClientError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<(), ClientError> {
        // `Users` rows are keyed by the *peer's* identity hex — there is
        // deliberately no row for the local identity itself, so the FK
        // annotations below document intent rather than being enforced
        // (`PRAGMA foreign_keys` is left at SQLite's default off): an
        // outgoing message's `author` column is our own identity, which has
        // no corresponding `Users` row.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS Users (
                username TEXT PRIMARY KEY,
                nickname TEXT,
                receive_key BLOB,
                send_key BLOB
            );
            CREATE TABLE IF NOT EXISTS Messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author TEXT NOT NULL,
                recipient TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                FOREIGN KEY(author) REFERENCES Users(username),
                FOREIGN KEY(recipient) REFERENCES Users(username)
            );",
        )?;
        Ok(())
    }

    fn ensure_user_row(conn: &Connection, identity: &Identity) -> Result<(), ClientError> {
        conn.execute("INSERT OR IGNORE INTO Users (username) VALUES (?1)", params![identity.to_hex()])?;
        Ok(())
    }
}

impl SessionKeyStore for SqliteStore {
    fn get_session_keys(&self, peer: &Identity) -> Result<Option<SessionKeys>, CryptoError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let result = conn.query_row(
            "SELECT send_key, receive_key FROM Users WHERE username = ?1 AND send_key IS NOT NULL",
            params![peer.to_hex()],
            |row| {
                let send: Vec<u8> = row.get(0)?;
                let receive: Vec<u8> = row.get(1)?;
                Ok((send, receive))
            },
        );

        match result {
            Ok((send, receive)) => {
                if send.len() != 32 || receive.len() != 32 {
                    return Err(CryptoError::Store("cached session key has the wrong length".into()));
                }
                let mut send_key = [0u8; 32];
                let mut receive_key = [0u8; 32];
                send_key.copy_from_slice(&send);
                receive_key.copy_from_slice(&receive);
                Ok(Some(SessionKeys { send: send_key, receive: receive_key }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(CryptoError::Store(err.to_string())),
        }
    }

    fn put_session_keys(&self, peer: &Identity, keys: &SessionKeys) -> Result<(), CryptoError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        SqliteStore::ensure_user_row(&conn, peer).map_err(|err| CryptoError::Store(err.to_string()))?;
        conn.execute(
            "UPDATE Users SET send_key = ?2, receive_key = ?3 WHERE username = ?1",
            params![peer.to_hex(), keys.send.to_vec(), keys.receive.to_vec()],
        )
        .map_err(|err| CryptoError::Store(err.to_string()))?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_message(&self, message: &LocalMessage) -> Result<(), ClientError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO Messages (author, recipient, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![message.author.to_hex(), message.recipient.to_hex(), message.content, message.timestamp as i64],
        )?;
        Ok(())
    }

    fn messages_between(&self, a: &Identity, b: &Identity) -> Result<Vec<LocalMessage>, ClientError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT author, recipient, content, timestamp FROM Messages
             WHERE (author = ?1 AND recipient = ?2) OR (author = ?2 AND recipient = ?1)
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![a.to_hex(), b.to_hex()], |row| {
            let author: String = row.get(0)?;
            let recipient: String = row.get(1)?;
            let content: String = row.get(2)?;
            let timestamp: i64 = row.get(3)?;
            Ok((author, recipient, content, timestamp))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (author, recipient, content, timestamp) = row?;
            messages.push(LocalMessage {
                author: author.parse().map_err(|_| ClientError::Config("corrupt author hex in store".into()))?,
                recipient: recipient
                    .parse()
                    .map_err(|_| ClientError::Config("corrupt recipient hex in store".into()))?,
                content,
                timestamp: timestamp as u64,
            });
        }
        Ok(messages)
    }

    fn set_nickname(&self, identity: &Identity, nickname: &str) -> Result<(), ClientError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        SqliteStore::ensure_user_row(&conn, identity)?;
        conn.execute("UPDATE Users SET nickname = ?2 WHERE username = ?1", params![identity.to_hex(), nickname])?;
        Ok(())
    }

    fn nickname(&self, identity: &Identity) -> Result<Option<String>, ClientError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let result = conn.query_row(
            "SELECT nickname FROM Users WHERE username = ?1",
            params![identity.to_hex()],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(nickname) => Ok(nickname),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn resolve_nickname(&self, nickname: &str) -> Result<Option<Identity>, ClientError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let result = conn.query_row(
            "SELECT username FROM Users WHERE nickname = ?1",
            params![nickname],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(username) => Ok(username.parse().ok()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn backup_to(&self, path: &Path) -> Result<(), ClientError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let destination = path.to_string_lossy().replace('\'', "''");
        conn.execute_batch(&format!("VACUUM INTO '{destination}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(byte: u8) -> Identity {
        Identity::from_bytes([byte; 32])
    }

    #[test]
    fn session_key_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let peer = id(1);
        assert!(store.get_session_keys(&peer).unwrap().is_none());

        let keys = SessionKeys { send: [1u8; 32], receive: [2u8; 32] };
        store.put_session_keys(&peer, &keys).unwrap();

        let fetched = store.get_session_keys(&peer).unwrap().unwrap();
        assert_eq!(fetched.send, keys.send);
        assert_eq!(fetched.receive, keys.receive);
    }

    #[test]
    fn messages_round_trip_in_insertion_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = id(1);
        let b = id(2);

        store.append_message(&LocalMessage { author: a, recipient: b, content: "hi".into(), timestamp: 1 }).unwrap();
        store
            .append_message(&LocalMessage { author: b, recipient: a, content: "hey".into(), timestamp: 2 })
            .unwrap();

        let messages = store.messages_between(&a, &b).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hey");
    }

    #[test]
    fn nickname_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let peer = id(3);
        assert!(store.nickname(&peer).unwrap().is_none());
        store.set_nickname(&peer, "alice").unwrap();
        assert_eq!(store.nickname(&peer).unwrap().as_deref(), Some("alice"));
        assert_eq!(store.resolve_nickname("alice").unwrap(), Some(peer));
    }
}
