use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::response::PageMeta;
use crate::users::{
    dto::{PageRequest, SignUpRequest, UpdateUserRequest},
    password::{hash_password, is_strong_password},
    repo::{StoreError, UserStore},
    repo_types::{NewAccount, NewUser, User, UserDetails},
};

/// Plans and transactions loaded alongside a user.
pub const RELATED_PREVIEW_LIMIT: i64 = 5;

const USER_NOT_FOUND: &str = "User not found";
const USER_EXISTS: &str = "User already exists with these details";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Ids that are not UUIDs cannot name a stored user.
pub fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(USER_NOT_FOUND))
}

pub async fn create_user(
    store: &dyn UserStore,
    req: SignUpRequest,
) -> Result<UserDetails, ApiError> {
    if !is_strong_password(&req.password) {
        warn!("password rejected by strength policy");
        return Err(ApiError::invalid("Invalid password"));
    }

    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(ApiError::invalid("Invalid email"));
    }

    let password = hash_password(&req.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::internal("Failed to create user")
    })?;

    let new_user = NewUser {
        username: req.username,
        email: req.email,
        password,
        phone_number: req.phone_number,
        first_name: req.first_name,
        last_name: req.last_name,
    };

    match store
        .create_with_account(new_user, NewAccount::default_cash())
        .await
    {
        Ok(details) => {
            info!(user_id = %details.user.id, email = %details.user.email, "user created");
            Ok(details)
        }
        Err(StoreError::Duplicate(key)) => {
            warn!(%key, "user already exists");
            Err(ApiError::conflict(USER_EXISTS))
        }
        Err(StoreError::DefaultAccount(cause)) => {
            error!(error = %cause, "default account insert failed; signup rolled back");
            Err(ApiError::internal(format!("Failed to create user account: {cause}")))
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Err(ApiError::internal(format!("Failed to create user: {e}")))
        }
    }
}

pub async fn delete_user(store: &dyn UserStore, id: Uuid) -> Result<(), ApiError> {
    match store.delete_cascade(id).await {
        Ok(()) => {
            info!(user_id = %id, "user deleted");
            Ok(())
        }
        Err(StoreError::NotFound) => Err(ApiError::not_found(USER_NOT_FOUND)),
        Err(e) => {
            error!(error = %e, user_id = %id, "cascade delete failed");
            Err(ApiError::internal("Failed to delete user"))
        }
    }
}

pub async fn fetch_user(store: &dyn UserStore, id: Uuid) -> Result<UserDetails, ApiError> {
    match store.load_details(id, RELATED_PREVIEW_LIMIT).await {
        Ok(Some(details)) => Ok(details),
        Ok(None) | Err(StoreError::NotFound) => Err(ApiError::not_found(USER_NOT_FOUND)),
        Err(e) => {
            error!(error = %e, user_id = %id, "load user failed");
            Err(ApiError::internal("Internal Server Error"))
        }
    }
}

pub async fn fetch_users(
    store: &dyn UserStore,
    page: PageRequest,
) -> Result<(Vec<UserDetails>, PageMeta), ApiError> {
    let failed = |e: StoreError| {
        error!(error = %e, page = page.page, page_size = page.page_size, "list users failed");
        ApiError::internal("Failed to fetch users")
    };

    let total_items = store.count_users().await.map_err(failed)?;
    let users = store
        .list_details(page.page_size, page.offset(), RELATED_PREVIEW_LIMIT)
        .await
        .map_err(failed)?;

    Ok((users, PageMeta::new(page.page, page.page_size, total_items)))
}

/// Looks the user up before parsing `body`, so a missing user wins over a bad body.
pub async fn update_user(
    store: &dyn UserStore,
    id: Uuid,
    body: &[u8],
) -> Result<User, ApiError> {
    match store.find_user(id).await {
        Ok(Some(_)) => {}
        Ok(None) | Err(StoreError::NotFound) => return Err(ApiError::not_found(USER_NOT_FOUND)),
        Err(e) => {
            error!(error = %e, user_id = %id, "find user failed");
            return Err(ApiError::internal("Failed to update user"));
        }
    }

    let patch: UpdateUserRequest = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "invalid update body");
        ApiError::invalid("Invalid request")
    })?;

    match store
        .update_profile(id, &patch.username, &patch.phone_number)
        .await
    {
        Ok(user) => {
            info!(user_id = %id, "user updated");
            Ok(user)
        }
        Err(StoreError::NotFound) => Err(ApiError::not_found(USER_NOT_FOUND)),
        Err(StoreError::Duplicate(key)) => {
            warn!(%key, user_id = %id, "username taken");
            Err(ApiError::conflict(USER_EXISTS))
        }
        Err(e) => {
            error!(error = %e, user_id = %id, "update user failed");
            Err(ApiError::internal("Failed to update user"))
        }
    }
}
