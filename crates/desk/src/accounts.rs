use chrono::Utc;
use tracing::{info, instrument, warn};
use wayfare_core::forms::{
    ForgotPasswordForm, LoginForm, PasswordChangeForm, ProfileForm, RegistrationForm,
    ResetPasswordForm,
};
use wayfare_core::{new_id, PasswordReset, Session, User, UserRole, ValidationErrors};
use wayfare_storage::TravelStore;

use crate::credentials::{hash_password, new_session_token, reset_token_digest, verify_password};
use crate::notify;
use crate::{DeskError, DeskResult, TravelDesk};

const BAD_CREDENTIALS: &str = "Invalid username/email or password.";

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: RegistrationForm) -> DeskResult<User> {
        form.validate()?;
        let now = Utc::now();
        let user = User {
            user_id: new_id(),
            username: form.username.trim().to_string(),
            email: form.normalized_email(),
            password_hash: hash_password(&form.password)?,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            phone: form.cleaned_phone(),
            bio: None,
            role: UserRole::Traveler,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(&user).await?;
        info!(user_id = %user.user_id, "user registered");
        Ok(user)
    }

    /// Checks credentials and opens a session.
    #[instrument(skip(self, form))]
    pub async fn login(&self, form: LoginForm) -> DeskResult<(User, Session)> {
        form.validate()?;
        let login = form.username_or_email.trim();
        let Some(user) = self.store.find_user_by_login(login).await? else {
            return Err(DeskError::Unauthorized(BAD_CREDENTIALS.to_string()));
        };
        if !verify_password(&form.password, &user.password_hash) {
            warn!(user_id = %user.user_id, "failed login");
            return Err(DeskError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
        if !user.is_active {
            return Err(DeskError::Forbidden(
                "Your account has been deactivated. Please contact support.".to_string(),
            ));
        }
        let session = self.open_session(&user).await?;
        info!(user_id = %user.user_id, "user logged in");
        Ok((user, session))
    }

    pub async fn open_session(&self, user: &User) -> DeskResult<Session> {
        let now = Utc::now();
        let session = Session {
            session_id: new_session_token()?,
            user_id: user.user_id.clone(),
            created_at: now,
            expires_at: now + self.settings.session_ttl,
        };
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    pub async fn logout(&self, session_id: &str) -> DeskResult<()> {
        self.store.delete_session(session_id).await?;
        Ok(())
    }

    /// Resolves a live session to its active user; stale sessions are dropped.
    pub async fn authenticate(&self, session_id: &str) -> DeskResult<Option<User>> {
        let Some(session) = self.store.load_session(session_id).await? else {
            return Ok(None);
        };
        if !session.is_live(Utc::now()) {
            self.store.delete_session(session_id).await?;
            return Ok(None);
        }
        let user = self.store.get_user(&session.user_id).await?;
        Ok(user.filter(|user| user.is_active))
    }

    pub async fn get_user(&self, user_id: &str) -> DeskResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(DeskError::NotFound("user"))
    }

    #[instrument(skip(self, form))]
    pub async fn update_profile(&self, user_id: &str, form: ProfileForm) -> DeskResult<User> {
        form.validate()?;
        let mut user = self.get_user(user_id).await?;
        user.first_name = form.first_name.trim().to_string();
        user.last_name = form.last_name.trim().to_string();
        user.email = form.email.trim().to_lowercase();
        user.phone = form
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());
        user.bio = form
            .bio
            .map(|bio| bio.trim().to_string())
            .filter(|bio| !bio.is_empty());
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        Ok(user)
    }

    #[instrument(skip(self, form))]
    pub async fn change_password(&self, user_id: &str, form: PasswordChangeForm) -> DeskResult<()> {
        form.validate()?;
        let mut user = self.get_user(user_id).await?;
        if !verify_password(&form.current_password, &user.password_hash) {
            return Err(ValidationErrors::single(
                "current_password",
                "Current password is incorrect.",
            )
            .into());
        }
        user.password_hash = hash_password(&form.new_password)?;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        info!(user_id = %user.user_id, "password changed");
        Ok(())
    }

    /// Emails a single-use reset link to an active account. Unknown or
    /// disabled addresses get the same `Ok` so the endpoint does not reveal
    /// who is registered.
    #[instrument(skip(self, form))]
    pub async fn request_password_reset(&self, form: ForgotPasswordForm) -> DeskResult<()> {
        form.validate()?;
        let email = form.normalized_email();
        let user = self
            .store
            .find_user_by_login(&email)
            .await?
            .filter(|user| user.is_active && user.email == email);
        let Some(user) = user else {
            info!("password reset requested for unknown address");
            return Ok(());
        };

        let token = new_session_token()?;
        let now = Utc::now();
        let ttl = self.settings.password_reset_ttl;
        self.store
            .insert_password_reset(&PasswordReset {
                token_hash: reset_token_digest(&token),
                user_id: user.user_id.clone(),
                created_at: now,
                expires_at: now + ttl,
                used_at: None,
            })
            .await?;
        let link = format!(
            "{}/reset-password?token={token}",
            self.settings.public_url.trim_end_matches('/')
        );
        self.deliver(notify::password_reset(&user, &link, ttl.num_minutes()))
            .await;
        info!(user_id = %user.user_id, "password reset issued");
        Ok(())
    }

    /// Sets a new password from an emailed token. The token is spent and
    /// every open session of the account is closed.
    #[instrument(skip(self, form))]
    pub async fn reset_password(&self, form: ResetPasswordForm) -> DeskResult<()> {
        form.validate()?;
        let now = Utc::now();
        let invalid = || {
            DeskError::from(ValidationErrors::single(
                "token",
                "This reset link is invalid or has expired.",
            ))
        };
        let mut grant = self
            .store
            .find_password_reset(&reset_token_digest(&form.token))
            .await?
            .filter(|grant| grant.is_usable(now))
            .ok_or_else(invalid)?;
        let mut user = self
            .store
            .get_user(&grant.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(invalid)?;

        user.password_hash = hash_password(&form.password)?;
        user.updated_at = now;
        self.store.update_user(&user).await?;
        grant.used_at = Some(now);
        self.store.update_password_reset(&grant).await?;
        self.store.delete_sessions_for_user(&user.user_id).await?;
        info!(user_id = %user.user_id, "password reset completed");
        Ok(())
    }

    pub async fn list_users(&self) -> DeskResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    #[instrument(skip(self, actor))]
    pub async fn set_admin(&self, actor: &User, user_id: &str, admin: bool) -> DeskResult<User> {
        if actor.user_id == user_id && !admin {
            return Err(DeskError::BadRequest(
                "You cannot remove your own admin role.".to_string(),
            ));
        }
        let mut user = self.get_user(user_id).await?;
        user.role = if admin {
            UserRole::Admin
        } else {
            UserRole::Traveler
        };
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        info!(user_id = %user.user_id, role = user.role.as_str(), "role changed");
        Ok(user)
    }

    #[instrument(skip(self, actor))]
    pub async fn set_active(&self, actor: &User, user_id: &str, active: bool) -> DeskResult<User> {
        if actor.user_id == user_id && !active {
            return Err(DeskError::BadRequest(
                "You cannot deactivate your own account.".to_string(),
            ));
        }
        let mut user = self.get_user(user_id).await?;
        user.is_active = active;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        if !active {
            self.store.delete_sessions_for_user(user_id).await?;
        }
        info!(user_id = %user.user_id, active, "account status changed");
        Ok(user)
    }

    /// Users with bookings are kept for the booking history; disable them
    /// instead.
    #[instrument(skip(self, actor))]
    pub async fn delete_user(&self, actor: &User, user_id: &str) -> DeskResult<()> {
        if actor.user_id == user_id {
            return Err(DeskError::BadRequest(
                "You cannot delete your own account.".to_string(),
            ));
        }
        let user = self.get_user(user_id).await?;
        if !self.store.list_bookings_for_user(user_id).await?.is_empty() {
            return Err(DeskError::Conflict(format!(
                "Cannot delete user {} because they have bookings. Deactivate the account instead.",
                user.username
            )));
        }
        self.store.delete_sessions_for_user(user_id).await?;
        self.store.delete_user(user_id).await?;
        info!(user_id = %user_id, "user deleted");
        Ok(())
    }

    /// Creates an administrator, or promotes the matching account when the
    /// username or email is already registered.
    pub async fn ensure_admin(&self, form: RegistrationForm) -> DeskResult<User> {
        let existing = match self.store.find_user_by_login(form.username.trim()).await? {
            Some(user) => Some(user),
            None => self.store.find_user_by_login(&form.normalized_email()).await?,
        };
        let mut user = match existing {
            Some(user) => user,
            None => self.register(form).await?,
        };
        user.role = UserRole::Admin;
        user.is_active = true;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        info!(user_id = %user.user_id, "administrator ensured");
        Ok(user)
    }

    pub async fn purge_sessions(&self) -> DeskResult<u64> {
        Ok(self.store.purge_expired(Utc::now()).await?)
    }
}
