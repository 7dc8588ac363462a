//! Cache generation storage used by the service worker.
//!
//! A generation is a named container of URL -> response pairs. Deleting a
//! generation cascades to its entries.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use rusqlite::{params, OptionalExtension};

use super::{LocalStore, Result, StoreError};
use crate::worker::network::{FetchResponse, ResponseType};

impl LocalStore {
    /// Create the named generation if it does not exist yet.
    pub fn open_cache(&self, name: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Names of every generation, sorted.
    pub fn cache_names(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Delete a generation and all its entries.
    pub fn delete_cache(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM caches WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }

    /// Store a response under `url` in generation `name`, replacing any
    /// previous entry.
    pub fn cache_put(&self, name: &str, url: &str, response: &FetchResponse) -> Result<()> {
        self.open_cache(name)?;

        // Values are raw bytes and need not be UTF-8.
        let headers: Vec<(String, String)> = response
            .headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), STANDARD.encode(v.as_bytes())))
            .collect();

        self.conn().execute(
            "INSERT OR REPLACE INTO cache_entries
                (cache_name, url, status, kind, headers, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                name,
                url,
                response.status.as_u16(),
                response.kind.as_str(),
                serde_json::to_string(&headers)?,
                response.body.as_ref(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Look up `url` in a single generation.
    pub fn cache_match(&self, name: &str, url: &str) -> Result<Option<FetchResponse>> {
        let row: Option<(u16, String, String, Vec<u8>)> = self
            .conn()
            .query_row(
                "SELECT status, kind, headers, body FROM cache_entries
                 WHERE cache_name = ?1 AND url = ?2",
                params![name, url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(status, kind, headers, body)| decode_entry(status, &kind, &headers, body))
            .transpose()
    }

    /// URLs stored in a generation, sorted.
    pub fn cache_keys(&self, name: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT url FROM cache_entries WHERE cache_name = ?1 ORDER BY url ASC")?;
        let rows = stmt.query_map(params![name], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

fn decode_entry(status: u16, kind: &str, headers: &str, body: Vec<u8>) -> Result<FetchResponse> {
    let status = StatusCode::from_u16(status)
        .map_err(|e| StoreError::Corrupt(format!("cache status: {}", e)))?;
    let pairs: Vec<(String, String)> = serde_json::from_str(headers)?;

    let mut header_map = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StoreError::Corrupt(format!("cache header name: {}", e)))?;
        let raw = STANDARD
            .decode(value)
            .map_err(|e| StoreError::Corrupt(format!("cache header {}: {}", name, e)))?;
        let value = HeaderValue::from_bytes(&raw)
            .map_err(|e| StoreError::Corrupt(format!("cache header {}: {}", name, e)))?;
        header_map.append(name, value);
    }

    Ok(FetchResponse {
        status,
        kind: ResponseType::parse(kind).unwrap_or(ResponseType::Basic),
        headers: header_map,
        body: Bytes::from(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_match_round_trip_headers() {
        let store = LocalStore::open_in_memory().unwrap();
        let response = FetchResponse::new(StatusCode::OK, "<html></html>")
            .with_content_type("text/html");

        store
            .cache_put("v1-runtime", "http://localhost/index.html", &response)
            .unwrap();

        let hit = store
            .cache_match("v1-runtime", "http://localhost/index.html")
            .unwrap()
            .unwrap();
        assert_eq!(hit, response);
        assert!(store
            .cache_match("v1-precache", "http://localhost/index.html")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_non_utf8_header_values_survive() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut response = FetchResponse::new(StatusCode::OK, "body");
        let latin1 = HeaderValue::from_bytes(b"attachment; filename=\"caf\xe9.txt\"").unwrap();
        response
            .headers
            .insert(reqwest::header::CONTENT_DISPOSITION, latin1.clone());
        response
            .headers
            .append("x-trace", HeaderValue::from_static("a"));
        response
            .headers
            .append("x-trace", HeaderValue::from_static("b"));

        store
            .cache_put("v1-runtime", "http://localhost/file", &response)
            .unwrap();
        let hit = store
            .cache_match("v1-runtime", "http://localhost/file")
            .unwrap()
            .unwrap();

        assert_eq!(hit.headers.get(reqwest::header::CONTENT_DISPOSITION), Some(&latin1));
        let traces: Vec<_> = hit.headers.get_all("x-trace").iter().collect();
        assert_eq!(traces, vec!["a", "b"]);
        assert_eq!(hit, response);
    }

    #[test]
    fn test_delete_cascades_to_entries() {
        let store = LocalStore::open_in_memory().unwrap();
        let response = FetchResponse::new(StatusCode::OK, "body");
        store.cache_put("v0-stale", "http://localhost/a.js", &response).unwrap();

        assert!(store.delete_cache("v0-stale").unwrap());
        assert!(store.cache_names().unwrap().is_empty());

        // Recreating the generation must not resurrect old entries.
        store.open_cache("v0-stale").unwrap();
        assert!(store.cache_keys("v0-stale").unwrap().is_empty());
    }

    #[test]
    fn test_open_cache_is_idempotent() {
        let store = LocalStore::open_in_memory().unwrap();
        store.open_cache("v1-precache").unwrap();
        store.open_cache("v1-precache").unwrap();
        assert_eq!(store.cache_names().unwrap(), vec!["v1-precache".to_string()]);
    }
}
