//! # Command Router
//!
//! One entry point per inbound request: validate shape, resolve the bearer
//! token, dispatch to the owning component, translate the outcome into the
//! response envelope, and keep the presence machine fed. Components never
//! see the transport; the router never mutates component state itself.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog};
use crate::bus::{EventBus, Subscription};
use crate::config::ServiceConfig;
use crate::identity::{Argon2PasswordHasher, IdentityError, IdentityRegistry, Role};
use crate::lock::WriterLock;
use crate::messages::MessageService;
use crate::observability::Logger;
use crate::session::{AuthContext, JwtTokenSigner, SessionAuthority};
use crate::store::{MemoryStore, SqliteStore, Store};

use super::command::{Command, CommandRequest};
use super::errors::{BuildError, BuildResult};
use super::presence::PresenceTracker;
use super::response::{Envelope, ErrorBody, ErrorKind};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 50;

/// The composition point of the service core.
pub struct CommandRouter {
    registry: Arc<IdentityRegistry>,
    authority: Arc<SessionAuthority>,
    lock: Arc<WriterLock>,
    bus: Arc<EventBus>,
    messages: Arc<MessageService>,
    audit: Arc<AuditLog>,
    presence: Arc<PresenceTracker>,
    max_request_bytes: usize,
}

impl CommandRouter {
    /// Wire the whole core together from configuration.
    pub fn build(config: &ServiceConfig) -> BuildResult<Arc<Self>> {
        let store: Arc<dyn Store> = match (&config.chat_db_path, &config.logs_db_path) {
            (Some(chat), Some(logs)) => Arc::new(
                SqliteStore::open(chat, logs).map_err(|e| BuildError::Store(e.to_string()))?,
            ),
            _ => Arc::new(MemoryStore::new()),
        };

        let registry = Arc::new(
            IdentityRegistry::new(
                Arc::new(Argon2PasswordHasher::new()),
                config.lockout_threshold,
                config.lockout_secs,
            )
            .map_err(|e| BuildError::Identity(e.to_string()))?,
        );

        let authority = Arc::new(SessionAuthority::new(
            Arc::new(JwtTokenSigner::new(&config.token_secret)),
            Arc::clone(&registry),
            config.token_ttl_secs,
        ));

        let audit = Arc::new(AuditLog::new(
            Arc::clone(&store),
            config.audit_ring_capacity,
            config.strict_audit,
        ));
        let bus = Arc::new(EventBus::new(config.queue_capacity));
        let lock = Arc::new(WriterLock::new(Arc::clone(&audit), Arc::clone(&bus)));
        let messages = Arc::new(MessageService::new(
            store,
            Arc::clone(&lock),
            Arc::clone(&audit),
            Arc::clone(&bus),
        ));
        let presence = Arc::new(PresenceTracker::new(config.grace_secs));

        if let Some(password) = &config.seed_admin_password {
            match registry.register(&config.seed_admin, password, Role::Admin) {
                Ok(_) => Logger::info("ADMIN_SEEDED", &[("username", &config.seed_admin)]),
                Err(IdentityError::UsernameTaken) => {}
                Err(e) => return Err(BuildError::SeedAdmin(e.to_string())),
            }
        }

        Ok(Arc::new(Self {
            registry,
            authority,
            lock,
            bus,
            messages,
            audit,
            presence,
            max_request_bytes: config.max_request_bytes,
        }))
    }

    /// Handle one raw JSON request.
    pub fn handle(&self, raw: &str) -> Envelope {
        self.handle_with_deadline(raw, None)
    }

    /// Handle one request under an optional transport deadline.
    ///
    /// Work that would start past the deadline is refused with `timeout`
    /// before any state changes, so no partial effects are possible.
    pub fn handle_with_deadline(
        &self,
        raw: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> Envelope {
        let request = match CommandRequest::parse(raw, self.max_request_bytes) {
            Ok(request) => request,
            Err(error) => return Envelope::failure(error),
        };

        if deadline_exceeded(deadline) {
            return self.fail(ErrorBody::new(ErrorKind::Timeout, "request deadline exceeded"));
        }

        match request.command {
            Command::Register {
                username,
                password,
                role,
            } => self.handle_register(&username, &password, role, deadline),
            Command::Login { username, password } => {
                self.handle_login(&username, &password, deadline)
            }
            command => {
                let ctx = match self.authenticate(request.token.as_deref()) {
                    Ok(ctx) => ctx,
                    Err(error) => return self.fail(error),
                };
                self.dispatch_authenticated(&ctx, command, deadline)
            }
        }
    }

    fn dispatch_authenticated(
        &self,
        ctx: &AuthContext,
        command: Command,
        deadline: Option<DateTime<Utc>>,
    ) -> Envelope {
        match command {
            Command::Register { .. } | Command::Login { .. } => {
                unreachable!("handled before authentication")
            }

            Command::Logout => {
                self.presence.logout(&ctx.username);
                self.lock.client_vanished(&ctx.username);
                Envelope::success(json!({}))
            }

            Command::ListMessages { page, limit } => {
                let page = page.unwrap_or(DEFAULT_PAGE);
                let limit = limit.unwrap_or(DEFAULT_LIMIT);
                match self.messages.list(page, limit, Some(&ctx.username)) {
                    Ok(page) => Envelope::success(to_value(&page)),
                    Err(e) => self.fail(e.into()),
                }
            }

            Command::CreateMessage { body } => {
                if let Err(error) = self.require_writer(ctx) {
                    return self.fail(error);
                }
                if deadline_exceeded(deadline) {
                    return self
                        .fail(ErrorBody::new(ErrorKind::Timeout, "request deadline exceeded"));
                }
                match self.messages.create(&ctx.username, &body) {
                    Ok(message) => Envelope::success(json!({
                        "id": message.id,
                        "author": message.author,
                        "body": message.body,
                        "created_at": message.created_at,
                    })),
                    Err(e) => self.fail(e.into()),
                }
            }

            Command::UpdateMessage { id, body } => {
                if let Err(error) = self.require_writer(ctx) {
                    return self.fail(error);
                }
                if deadline_exceeded(deadline) {
                    return self
                        .fail(ErrorBody::new(ErrorKind::Timeout, "request deadline exceeded"));
                }
                match self.messages.update(&ctx.username, id, &body) {
                    Ok(updated) => Envelope::success(to_value(&updated)),
                    Err(e) => self.fail(e.into()),
                }
            }

            Command::DeleteMessage { id } => {
                if let Err(error) = self.require_writer(ctx) {
                    return self.fail(error);
                }
                if deadline_exceeded(deadline) {
                    return self
                        .fail(ErrorBody::new(ErrorKind::Timeout, "request deadline exceeded"));
                }
                match self.messages.delete(&ctx.username, id) {
                    Ok(id) => Envelope::success(json!({ "id": id })),
                    Err(e) => self.fail(e.into()),
                }
            }

            Command::AcquireWriter => {
                match self.lock.try_acquire(&ctx.username, ctx.role) {
                    Ok(acquired_at) => Envelope::success(json!({
                        "owner": ctx.username,
                        "acquired_at": acquired_at,
                    })),
                    Err(e) => self.fail(e.into()),
                }
            }

            Command::ReleaseWriter => match self.lock.release(&ctx.username) {
                Ok(()) => Envelope::success(json!({})),
                Err(e) => self.fail(e.into()),
            },

            Command::GetStatus => Envelope::success(to_value(&self.lock.status())),

            Command::ListAudit { page, limit } => {
                if !ctx.role.is_admin() {
                    return self
                        .fail(ErrorBody::new(ErrorKind::Forbidden, "admin role required"));
                }
                let page = page.unwrap_or(DEFAULT_PAGE);
                let limit = limit.unwrap_or(DEFAULT_LIMIT);
                match self.audit.list(page, limit) {
                    Ok(page) => Envelope::success(to_value(&page)),
                    Err(e) => self.fail(e.into()),
                }
            }

            Command::SetWriterEnabled { enabled } => {
                if !ctx.role.is_admin() {
                    return self
                        .fail(ErrorBody::new(ErrorKind::Forbidden, "admin role required"));
                }
                match self.lock.admin_set_enabled(enabled, &ctx.username) {
                    Ok(snapshot) => Envelope::success(json!({
                        "writer_enabled": snapshot.writer_enabled,
                    })),
                    Err(e) => self.fail(e.into()),
                }
            }
        }
    }

    fn handle_register(
        &self,
        username: &str,
        password: &str,
        role: Option<Role>,
        deadline: Option<DateTime<Utc>>,
    ) -> Envelope {
        if deadline_exceeded(deadline) {
            return self.fail(ErrorBody::new(ErrorKind::Timeout, "request deadline exceeded"));
        }

        let role = role.unwrap_or(Role::Reader);
        match self.registry.register(username, password, role) {
            Ok(summary) => {
                self.audit.append(
                    AuditAction::Register,
                    Some(username),
                    &format!("registered with role {}", role),
                    self.lock.status().lock_value,
                );

                let issued = match self.authority.issue(&summary) {
                    Ok(issued) => issued,
                    Err(e) => return self.fail(e.into()),
                };
                self.presence.touch(username, Some(issued.expires_at));

                Envelope::success(json!({
                    "username": summary.username,
                    "role": summary.role,
                    "token": issued.token,
                }))
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn handle_login(
        &self,
        username: &str,
        password: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> Envelope {
        if deadline_exceeded(deadline) {
            return self.fail(ErrorBody::new(ErrorKind::Timeout, "request deadline exceeded"));
        }

        let lock_value = self.lock.status().lock_value;
        match self.registry.authenticate(username, password) {
            Ok(summary) => {
                self.audit
                    .append(AuditAction::Login, Some(username), "login ok", lock_value);

                let issued = match self.authority.issue(&summary) {
                    Ok(issued) => issued,
                    Err(e) => return self.fail(e.into()),
                };
                self.presence.touch(username, Some(issued.expires_at));

                Envelope::success(json!({
                    "username": summary.username,
                    "role": summary.role,
                    "token": issued.token,
                }))
            }
            Err(e) => {
                match &e {
                    IdentityError::InvalidCredentials { lockout_triggered } => {
                        self.audit.append(
                            AuditAction::LoginFailed,
                            Some(username),
                            "invalid credentials",
                            lock_value,
                        );
                        if *lockout_triggered {
                            self.audit.append(
                                AuditAction::Lockout,
                                Some(username),
                                "lockout threshold reached",
                                lock_value,
                            );
                            Logger::warn("ACCOUNT_LOCKED", &[("principal", username)]);
                        }
                    }
                    IdentityError::AccountLocked { .. } => {
                        self.audit.append(
                            AuditAction::LoginFailed,
                            Some(username),
                            "attempt while locked",
                            lock_value,
                        );
                    }
                    _ => {}
                }
                self.fail(e.into())
            }
        }
    }

    /// Open a live event subscription for a valid token.
    ///
    /// The subscription immediately carries a synthetic `lock_state`
    /// snapshot; the caller drains it with `poll`.
    pub fn subscribe(&self, token: &str) -> Result<Subscription, ErrorBody> {
        let ctx = self.authenticate(Some(token))?;
        self.presence.subscribed(&ctx.username);
        Ok(self.bus.subscribe(&ctx.username, &self.lock.status()))
    }

    /// Close a subscription and feed the presence machine.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        if let Ok(principal) = self.bus.unsubscribe(subscription.id()) {
            self.presence.unsubscribed(&principal);
        }
    }

    /// Expire vanished principals and release the lock if one of them held
    /// it. Returns the vanished usernames.
    pub fn sweep_presence(&self) -> Vec<String> {
        let vanished = self.presence.sweep();
        for username in &vanished {
            self.lock.client_vanished(username);
        }
        vanished
    }

    /// Re-broadcast the lock state if it drifted since the last emission.
    pub fn reconcile_lock_state(&self) -> bool {
        self.bus.reconcile(&self.lock.status())
    }

    /// Background maintenance: periodic lock-state reconciliation and
    /// presence sweeping. Both tasks call the same methods tests call.
    pub fn spawn_maintenance(
        self: &Arc<Self>,
        reconcile_interval: StdDuration,
        sweep_interval: StdDuration,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let reconciler = Arc::clone(self);
        let reconcile_task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(reconcile_interval);
            loop {
                tick.tick().await;
                reconciler.reconcile_lock_state();
            }
        });

        let sweeper = Arc::clone(self);
        let sweep_task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_interval);
            loop {
                tick.tick().await;
                sweeper.sweep_presence();
            }
        });

        vec![reconcile_task, sweep_task]
    }

    fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, ErrorBody> {
        let token =
            token.ok_or_else(|| ErrorBody::new(ErrorKind::TokenInvalid, "missing bearer token"))?;
        let ctx = self.authority.resolve(token)?;
        self.presence.touch(&ctx.username, Some(ctx.expires_at));
        Ok(ctx)
    }

    fn require_writer(&self, ctx: &AuthContext) -> Result<(), ErrorBody> {
        if ctx.role.can_write() {
            Ok(())
        } else {
            Err(ErrorBody::new(
                ErrorKind::Forbidden,
                "writer or admin role required",
            ))
        }
    }

    /// Build a failure envelope, redacting infrastructure detail down to a
    /// correlation id that appears only in server logs.
    fn fail(&self, error: ErrorBody) -> Envelope {
        if error.kind.is_infrastructure() {
            let correlation = Uuid::new_v4().to_string();
            Logger::error(
                "REQUEST_FAILED",
                &[
                    ("kind", error.kind.as_str()),
                    ("detail", &error.message),
                    ("correlation_id", &correlation),
                ],
            );
            let mut redacted = ErrorBody::new(
                error.kind,
                format!("internal failure (ref {})", correlation),
            );
            redacted.retry_after = error.retry_after;
            Envelope::failure(redacted)
        } else {
            Envelope::failure(error)
        }
    }

    pub fn writer_lock(&self) -> &Arc<WriterLock> {
        &self.lock
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }
}

fn deadline_exceeded(deadline: Option<DateTime<Utc>>) -> bool {
    deadline.map(|d| Utc::now() >= d).unwrap_or(false)
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("response serialization cannot fail")
}
