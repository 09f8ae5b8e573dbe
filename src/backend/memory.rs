//! In-process backend. Mirrors the hosted tables closely enough to drive the
//! admin workflows without a network: the profile trigger that fires on
//! sign-up, `is_admin()` answering from `user_roles`, and per-operation faults.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::{AuthProvider, RoleStore};
use crate::error::{AdminError, AdminResult};
use crate::models::{emails_match, AuthUser, Profile, Role, Session, SignUpRequest, UserRole};

/// Backend calls, used for fault injection and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CurrentSession,
    SignUp,
    ListUsers,
    FindRole,
    DeleteRoles,
    InsertRole,
    ListRoleHolders,
    IsAdminRpc,
    GetProfile,
    FindProfileByEmail,
    UpdateProfileRole,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    users: Vec<AuthUser>,
    roles: Vec<UserRole>,
    profiles: HashMap<String, Profile>,
    rpc_grants: HashSet<String>,
    next_user_ids: VecDeque<String>,
    failures: HashMap<Operation, (u16, String)>,
    calls: Vec<Operation>,
}

pub struct MemoryBackend {
    state: Mutex<State>,
    profile_trigger: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            profile_trigger: true,
        }
    }

    /// Disable the emulated trigger that creates a profile row on sign-up.
    pub fn without_profile_trigger(mut self) -> Self {
        self.profile_trigger = false;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and return the injected fault, if any.
    fn enter(&self, op: Operation) -> AdminResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(op);
        if let Some((status, message)) = state.failures.get(&op) {
            return Err(AdminError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(state)
    }

    pub fn set_session(&self, session: Option<Session>) {
        self.lock().session = session;
    }

    /// Register an account in auth together with its profile row.
    pub fn add_user(&self, id: &str, email: &str) {
        let mut state = self.lock();
        state.users.push(AuthUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_metadata: serde_json::Value::Null,
            created_at: None,
        });
        state.profiles.insert(id.to_string(), new_profile(id, email, None));
    }

    /// A profile row with no matching auth account visible to the listing.
    pub fn add_profile(&self, id: &str, email: &str, role: Option<Role>) {
        self.lock()
            .profiles
            .insert(id.to_string(), new_profile(id, email, role));
    }

    pub fn set_profile_role(&self, id: &str, role: Option<Role>) {
        if let Some(profile) = self.lock().profiles.get_mut(id) {
            profile.role = role.map(|r| r.as_str().to_string());
        }
    }

    pub fn add_role(&self, user_id: &str, role: Role) {
        self.lock().roles.push(UserRole::new(user_id, role));
    }

    /// Make `is_admin()` answer true for the user regardless of `user_roles`.
    pub fn grant_rpc_admin(&self, user_id: &str) {
        self.lock().rpc_grants.insert(user_id.to_string());
    }

    /// Id handed out by the next successful sign-up.
    pub fn queue_user_id(&self, id: &str) {
        self.lock().next_user_ids.push_back(id.to_string());
    }

    pub fn fail(&self, op: Operation, message: &str) {
        self.fail_with_status(op, 500, message);
    }

    pub fn fail_with_status(&self, op: Operation, status: u16, message: &str) {
        self.lock()
            .failures
            .insert(op, (status, message.to_string()));
    }

    pub fn clear_failure(&self, op: Operation) {
        self.lock().failures.remove(&op);
    }

    pub fn role_count(&self, user_id: &str, role: Role) -> usize {
        self.lock()
            .roles
            .iter()
            .filter(|r| r.user_id == user_id && r.is(role))
            .count()
    }

    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.lock().profiles.get(id).cloned()
    }

    pub fn user_by_email(&self, email: &str) -> Option<AuthUser> {
        self.lock()
            .users
            .iter()
            .find(|u| u.email_matches(email))
            .cloned()
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }
}

fn new_profile(id: &str, email: &str, role: Option<Role>) -> Profile {
    Profile {
        id: id.to_string(),
        email: Some(email.to_string()),
        name: None,
        role: role.map(|r| r.as_str().to_string()),
        created_at: Some(chrono::Utc::now()),
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn current_session(&self) -> AdminResult<Option<Session>> {
        let state = self.enter(Operation::CurrentSession)?;
        Ok(state.session.clone())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AdminResult<AuthUser> {
        let mut state = self.enter(Operation::SignUp)?;
        if state.users.iter().any(|u| u.email_matches(&request.email)) {
            return Err(AdminError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let id = state
            .next_user_ids
            .pop_front()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let user = AuthUser {
            id: id.clone(),
            email: Some(request.email.clone()),
            user_metadata: serde_json::to_value(&request.metadata)
                .map_err(|e| AdminError::Internal(e.to_string()))?,
            created_at: Some(chrono::Utc::now()),
        };
        state.users.push(user.clone());

        if self.profile_trigger {
            let mut profile = new_profile(&id, &request.email, Some(Role::User));
            profile.name = Some(request.metadata.name.clone());
            state.profiles.insert(id, profile);
        }
        Ok(user)
    }

    async fn list_users(&self) -> AdminResult<Vec<AuthUser>> {
        let state = self.enter(Operation::ListUsers)?;
        Ok(state.users.clone())
    }
}

#[async_trait]
impl RoleStore for MemoryBackend {
    async fn find_role(&self, user_id: &str, role: Role) -> AdminResult<Option<UserRole>> {
        let state = self.enter(Operation::FindRole)?;
        Ok(state
            .roles
            .iter()
            .find(|r| r.user_id == user_id && r.is(role))
            .cloned())
    }

    async fn delete_roles(&self, user_id: &str, role: Role) -> AdminResult<u64> {
        let mut state = self.enter(Operation::DeleteRoles)?;
        let before = state.roles.len();
        state.roles.retain(|r| !(r.user_id == user_id && r.is(role)));
        Ok((before - state.roles.len()) as u64)
    }

    async fn insert_role(&self, user_id: &str, role: Role) -> AdminResult<UserRole> {
        let mut state = self.enter(Operation::InsertRole)?;
        if state.roles.iter().any(|r| r.user_id == user_id && r.is(role)) {
            return Err(AdminError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint \"user_roles_user_id_role_key\""
                    .to_string(),
            });
        }
        let mut row = UserRole::new(user_id, role);
        row.created_at = Some(chrono::Utc::now());
        state.roles.push(row.clone());
        Ok(row)
    }

    async fn list_role_holders(&self, role: Role) -> AdminResult<Vec<String>> {
        let state = self.enter(Operation::ListRoleHolders)?;
        Ok(state
            .roles
            .iter()
            .filter(|r| r.is(role))
            .map(|r| r.user_id.clone())
            .collect())
    }

    async fn is_admin_rpc(&self, session: &Session) -> AdminResult<bool> {
        let state = self.enter(Operation::IsAdminRpc)?;
        let has_role = state
            .roles
            .iter()
            .any(|r| r.user_id == session.user_id && r.is(Role::Admin));
        Ok(has_role || state.rpc_grants.contains(&session.user_id))
    }

    async fn get_profile(&self, user_id: &str) -> AdminResult<Option<Profile>> {
        let state = self.enter(Operation::GetProfile)?;
        Ok(state.profiles.get(user_id).cloned())
    }

    async fn find_profile_by_email(&self, email: &str) -> AdminResult<Option<Profile>> {
        let state = self.enter(Operation::FindProfileByEmail)?;
        let email = email.trim();
        Ok(state
            .profiles
            .values()
            .find(|p| p.email.as_deref().is_some_and(|e| emails_match(e, email)))
            .cloned())
    }

    async fn update_profile_role(&self, user_id: &str, role: Role) -> AdminResult<u64> {
        let mut state = self.enter(Operation::UpdateProfileRole)?;
        match state.profiles.get_mut(user_id) {
            Some(profile) => {
                profile.role = Some(role.as_str().to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
