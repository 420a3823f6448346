// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Browser sessions and the cookie that identifies them.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ecocode_core::CredentialStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State kept for one browser.
#[derive(Debug)]
pub struct BrowserSession {
    /// Backend credential shared by every request from this browser.
    pub credential: CredentialStore,
    /// Chat user id forwarded with status checks.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Unix milliseconds of the last request that used this session.
    last_seen: AtomicI64,
}

impl BrowserSession {
    fn new() -> Self {
        let mut user_id = uuid::Uuid::new_v4().simple().to_string();
        user_id.truncate(12);
        let created_at = Utc::now();
        Self {
            credential: CredentialStore::new(),
            user_id,
            created_at,
            last_seen: AtomicI64::new(created_at.timestamp_millis()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_present()
    }

    pub fn touch(&self) {
        self.last_seen
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_seen.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    fn idle_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_seen()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Map of session id -> browser session.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<BrowserSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<BrowserSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers a fresh session and returns its id.
    pub fn create(&self) -> (String, Arc<BrowserSession>) {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(BrowserSession::new());
        self.sessions.insert(id.clone(), Arc::clone(&session));
        tracing::debug!(session_id = %id, "browser session created");
        (id, session)
    }

    /// Puts `session` back under `id` if a sweep dropped it meanwhile.
    pub fn restore(&self, id: &str, session: &Arc<BrowserSession>) {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::clone(session));
    }

    pub fn remove(&self, id: &str) -> Option<Arc<BrowserSession>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session named by the request's cookie, if it is still registered.
    /// Marks the session as used.
    pub fn resolve(&self, jar: &CookieJar, cookie_name: &str) -> Option<(String, Arc<BrowserSession>)> {
        let id = jar.get(cookie_name)?.value().to_string();
        let session = self.get(&id)?;
        session.touch();
        Some((id, session))
    }

    /// Drops sessions unused for longer than `idle` and sessions that no
    /// longer hold a backend credential. Returns how many were dropped.
    pub fn evict(&self, idle: Duration) -> usize {
        self.evict_at(idle, Utc::now())
    }

    fn evict_at(&self, idle: Duration, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.is_authenticated() && session.idle_at(now) <= idle);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.sessions.len(), "browser sessions evicted");
        }
        evicted
    }
}

/// How often to sweep for sessions idle longer than `idle`.
pub fn sweep_period(idle: Duration) -> Duration {
    (idle / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

/// Evicts idle sessions from `registry` every `period` until `shutdown`
/// is cancelled.
pub fn spawn_session_sweeper(
    registry: SessionRegistry,
    idle: Duration,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    registry.evict(idle);
                }
            }
        }
        tracing::debug!("session sweeper stopped");
    })
}

/// httpOnly cookie carrying the session id.
pub fn session_cookie(name: &str, id: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Cookie that removes the session id from the browser.
pub fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), String::new()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecocode_core::SessionCredential;

    #[test]
    fn created_sessions_are_isolated() {
        let registry = SessionRegistry::new();
        let (a_id, a) = registry.create();
        let (b_id, b) = registry.create();
        assert_ne!(a_id, b_id);
        assert_ne!(a.user_id, b.user_id);
        assert_eq!(a.user_id.len(), 12);

        a.credential.replace(SessionCredential::new("session=a"));
        assert!(registry.get(&a_id).unwrap().is_authenticated());
        assert!(!registry.get(&b_id).unwrap().is_authenticated());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn resolve_reads_cookie() {
        let registry = SessionRegistry::new();
        let (id, _) = registry.create();

        let jar = CookieJar::new().add(session_cookie("sid", &id));
        assert_eq!(registry.resolve(&jar, "sid").unwrap().0, id);
        assert!(registry.resolve(&jar, "other").is_none());

        registry.remove(&id);
        assert!(registry.resolve(&jar, "sid").is_none());
        assert!(registry.is_empty());
    }

    fn signed_in(registry: &SessionRegistry) -> (String, Arc<BrowserSession>) {
        let (id, session) = registry.create();
        session.credential.replace(SessionCredential::new("session=x"));
        (id, session)
    }

    #[test]
    fn eviction_drops_idle_sessions_only() {
        let registry = SessionRegistry::new();
        let (stale_id, _) = signed_in(&registry);
        let (fresh_id, fresh) = signed_in(&registry);

        let later = Utc::now() + chrono::Duration::seconds(120);
        fresh
            .last_seen
            .store(later.timestamp_millis(), Ordering::Relaxed);

        assert_eq!(registry.evict_at(Duration::from_secs(60), later), 1);
        assert!(registry.get(&stale_id).is_none());
        assert!(registry.get(&fresh_id).is_some());
    }

    #[test]
    fn resolve_keeps_a_session_alive() {
        let registry = SessionRegistry::new();
        let (id, session) = signed_in(&registry);
        session.last_seen.store(0, Ordering::Relaxed);

        let jar = CookieJar::new().add(session_cookie("sid", &id));
        registry.resolve(&jar, "sid").unwrap();
        assert_eq!(registry.evict(Duration::from_secs(60)), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn eviction_drops_sessions_without_credential() {
        let registry = SessionRegistry::new();
        let (id, session) = signed_in(&registry);
        registry.create();

        session.credential.clear();
        assert_eq!(registry.evict(Duration::from_secs(3600)), 2);
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn restore_reinserts_a_swept_session() {
        let registry = SessionRegistry::new();
        let (id, session) = registry.create();
        registry.evict(Duration::from_secs(3600));
        assert!(registry.is_empty());

        registry.restore(&id, &session);
        registry.restore(&id, &session);
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.get(&id).unwrap(), &session));
    }

    #[test]
    fn sweep_period_is_bounded() {
        assert_eq!(sweep_period(Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(sweep_period(Duration::from_secs(120)), Duration::from_secs(30));
        assert_eq!(sweep_period(Duration::from_secs(1800)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn sweeper_evicts_until_shutdown() {
        let registry = SessionRegistry::new();
        let shutdown = CancellationToken::new();
        let handle = spawn_session_sweeper(
            registry.clone(),
            Duration::from_millis(20),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        signed_in(&registry);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(registry.is_empty());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = session_cookie("sid", "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
