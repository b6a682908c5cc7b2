use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_ACCOUNT_NAME: &str = "Cash";
pub const DEFAULT_ACCOUNT_CATEGORY: &str = "💵 Cash";

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // Argon2 hash, not exposed in JSON
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: String,
    pub balance: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Saving plan owned by a user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A user together with its eagerly loaded collections.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub accounts: Vec<Account>,
    pub plans: Vec<Plan>,
    pub transactions: Vec<Transaction>,
}

impl UserDetails {
    pub fn bare(user: User) -> Self {
        Self {
            user,
            accounts: Vec::new(),
            plans: Vec::new(),
            transactions: Vec::new(),
        }
    }
}

/// Row values for a user insert; `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub category: String,
    pub balance: Decimal,
}

impl NewAccount {
    /// The account every user starts with.
    pub fn default_cash() -> Self {
        Self {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            category: DEFAULT_ACCOUNT_CATEGORY.to_string(),
            balance: Decimal::new(0, 2),
        }
    }
}
