use crate::storage::TableStore;
use crate::user_models::{IdentityProfile, Role, User};
use anyhow::{bail, Result};

impl TableStore {
    /// Inserts or refreshes the user behind an external identity.
    ///
    /// Supplied profile fields overwrite the stored ones and `last_signed_in`
    /// is bumped on every call. The configured owner identity is always
    /// stored as [`Role::Admin`]; nobody else is ever promoted here.
    pub async fn upsert_user(
        &self,
        profile: IdentityProfile,
        owner_open_id: Option<&str>,
    ) -> Result<User> {
        if profile.open_id.trim().is_empty() {
            bail!("User openId is required for upsert");
        }

        let is_owner = owner_open_id == Some(profile.open_id.as_str());
        let open_id = profile.open_id.clone();
        let create_profile = profile.clone();

        self.users
            .upsert_with(
                |u| u.open_id == open_id,
                |u| u.apply_sign_in(profile, is_owner.then_some(Role::Admin)),
                |id| {
                    let role = if is_owner { Role::Admin } else { Role::User };
                    User::new(id, create_profile, role)
                },
            )
            .await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(id).await)
    }

    pub async fn get_user_by_open_id(&self, open_id: &str) -> Result<Option<User>> {
        Ok(self.users.find(|u| u.open_id == open_id).await)
    }
}
