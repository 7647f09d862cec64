use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use uuid::Uuid;

pub const CLIENT_COOKIE: &str = "client_id";

/// Selections kept before the least recently selected one is dropped.
pub const MAX_SESSIONS: usize = 10_000;

struct Selection {
    model: String,
    seq: u64,
}

#[derive(Default)]
struct Selections {
    by_client: HashMap<Uuid, Selection>,
    next_seq: u64,
}

/// Model selected by each browser, keyed by its `client_id` cookie. Lives
/// only in memory; a restart forgets every selection. Holds at most
/// `capacity` clients.
pub struct SessionStore {
    capacity: usize,
    selections: Mutex<Selections>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn with_capacity(capacity: usize) -> Self {
        SessionStore {
            capacity: capacity.max(1),
            selections: Mutex::new(Selections::default()),
        }
    }

    pub fn selected_model(&self, client: &Uuid) -> Option<String> {
        let map = self.selections.lock().unwrap_or_else(PoisonError::into_inner);
        map.by_client.get(client).map(|s| s.model.clone())
    }

    pub fn select_model(&self, client: Uuid, model: &str) {
        let mut map = self.selections.lock().unwrap_or_else(PoisonError::into_inner);
        if !map.by_client.contains_key(&client) && map.by_client.len() >= self.capacity {
            let oldest = map
                .by_client
                .iter()
                .min_by_key(|(_, s)| s.seq)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                map.by_client.remove(&oldest);
                log::debug!("Dropped model selection of client {}", oldest);
            }
        }
        let seq = map.next_seq;
        map.next_seq += 1;
        map.by_client.insert(
            client,
            Selection {
                model: model.to_string(),
                seq,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let map = self.selections.lock().unwrap_or_else(PoisonError::into_inner);
        map.by_client.len()
    }

    /// Selected model for the request's client, if it has one.
    pub fn model_for(&self, req: &HttpRequest) -> Option<String> {
        client_id(req).and_then(|id| self.selected_model(&id))
    }
}

pub fn client_id(req: &HttpRequest) -> Option<Uuid> {
    req.cookie(CLIENT_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

/// The request's client id, or a fresh one plus the cookie that hands it out.
pub fn client_id_or_new(req: &HttpRequest) -> (Uuid, Option<Cookie<'static>>) {
    match client_id(req) {
        Some(id) => (id, None),
        None => {
            let id = Uuid::new_v4();
            (id, Some(client_cookie(id)))
        }
    }
}

pub fn client_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build(CLIENT_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn selection_is_per_client() {
        let store = SessionStore::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.select_model(a, "deepseek-r1:7b");
        assert_eq!(store.selected_model(&a).as_deref(), Some("deepseek-r1:7b"));
        assert_eq!(store.selected_model(&b), None);

        store.select_model(a, "deepseek-r1:14b");
        assert_eq!(store.selected_model(&a).as_deref(), Some("deepseek-r1:14b"));
    }

    #[test]
    fn oldest_selection_is_dropped_at_capacity() {
        let store = SessionStore::with_capacity(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        store.select_model(a, "m1");
        store.select_model(b, "m2");
        // reselecting refreshes a, so b is now the oldest
        store.select_model(a, "m3");
        store.select_model(c, "m4");

        assert_eq!(store.len(), 2);
        assert_eq!(store.selected_model(&a).as_deref(), Some("m3"));
        assert_eq!(store.selected_model(&b), None);
        assert_eq!(store.selected_model(&c).as_deref(), Some("m4"));
    }

    #[test]
    fn reads_client_cookie() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .cookie(client_cookie(id))
            .to_http_request();
        assert_eq!(client_id(&req), Some(id));
        let (same, cookie) = client_id_or_new(&req);
        assert_eq!(same, id);
        assert!(cookie.is_none());
    }

    #[test]
    fn invalid_or_missing_cookie_gets_new_id() {
        let req = TestRequest::default()
            .cookie(Cookie::new(CLIENT_COOKIE, "not-a-uuid"))
            .to_http_request();
        assert_eq!(client_id(&req), None);
        let (id, cookie) = client_id_or_new(&req);
        let cookie = cookie.unwrap();
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn model_for_request() {
        let store = SessionStore::default();
        let id = Uuid::new_v4();
        store.select_model(id, "m");
        let req = TestRequest::default()
            .cookie(client_cookie(id))
            .to_http_request();
        assert_eq!(store.model_for(&req).as_deref(), Some("m"));
        assert_eq!(
            store.model_for(&TestRequest::default().to_http_request()),
            None
        );
    }
}
