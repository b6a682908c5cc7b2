use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::users::repo_types::{Account, NewAccount, NewUser, Plan, Transaction, User, UserDetails};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate key: {0}")]
    Duplicate(String),
    /// The user row was accepted but the default account insert failed.
    #[error("{0}")]
    DefaultAccount(String),
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Persistence operations the user service relies on.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user and its default account atomically.
    async fn create_with_account(
        &self,
        user: NewUser,
        account: NewAccount,
    ) -> Result<UserDetails, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Load a user with all accounts and the first `related_limit` plans and transactions.
    async fn load_details(
        &self,
        id: Uuid,
        related_limit: i64,
    ) -> Result<Option<UserDetails>, StoreError>;

    async fn list_details(
        &self,
        limit: i64,
        offset: i64,
        related_limit: i64,
    ) -> Result<Vec<UserDetails>, StoreError>;

    async fn count_users(&self) -> Result<i64, StoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        phone_number: &str,
    ) -> Result<User, StoreError>;

    /// Delete accounts, plans, transactions and then the user, all or nothing.
    /// Returns `StoreError::NotFound` without touching anything if the user is absent.
    async fn delete_cascade(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn insert_user_tx(
        tx: &mut PgTransaction<'_, Postgres>,
        user: &NewUser,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password, phone_number, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, password, phone_number, first_name, last_name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.phone_number)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&mut **tx)
        .await
    }

    async fn insert_account_tx(
        tx: &mut PgTransaction<'_, Postgres>,
        user_id: Uuid,
        account: &NewAccount,
    ) -> Result<Account, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, user_id, name, category, balance)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, name, category, balance, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&account.name)
        .bind(&account.category)
        .bind(account.balance)
        .fetch_one(&mut **tx)
        .await
    }

    /// Fetch the related collections for a set of users and stitch them on.
    async fn attach_related(
        &self,
        users: Vec<User>,
        related_limit: i64,
    ) -> Result<Vec<UserDetails>, StoreError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();

        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, name, category, balance, created_at
              FROM accounts
             WHERE user_id = ANY($1)
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let plans = sqlx::query_as::<_, Plan>(
            r#"
            SELECT id, user_id, name, target_amount, current_amount, created_at
              FROM (
                    SELECT p.*,
                           ROW_NUMBER() OVER (
                               PARTITION BY p.user_id ORDER BY p.created_at, p.id
                           ) AS rn
                      FROM plans p
                     WHERE p.user_id = ANY($1)
                   ) ranked
             WHERE rn <= $2
             ORDER BY user_id, rn
            "#,
        )
        .bind(&ids)
        .bind(related_limit)
        .fetch_all(&self.db)
        .await?;

        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, account_id, amount, category, description, created_at
              FROM (
                    SELECT t.*,
                           ROW_NUMBER() OVER (
                               PARTITION BY t.user_id ORDER BY t.created_at, t.id
                           ) AS rn
                      FROM transactions t
                     WHERE t.user_id = ANY($1)
                   ) ranked
             WHERE rn <= $2
             ORDER BY user_id, rn
            "#,
        )
        .bind(&ids)
        .bind(related_limit)
        .fetch_all(&self.db)
        .await?;

        let mut accounts_by_user = group_by_user(accounts, |a| a.user_id);
        let mut plans_by_user = group_by_user(plans, |p| p.user_id);
        let mut transactions_by_user = group_by_user(transactions, |t| t.user_id);

        Ok(users
            .into_iter()
            .map(|user| {
                let id = user.id;
                UserDetails {
                    user,
                    accounts: accounts_by_user.remove(&id).unwrap_or_default(),
                    plans: plans_by_user.remove(&id).unwrap_or_default(),
                    transactions: transactions_by_user.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }
}

fn group_by_user<T>(rows: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<T>> {
    let mut out: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        out.entry(key(&row)).or_default().push(row);
    }
    out
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_with_account(
        &self,
        user: NewUser,
        account: NewAccount,
    ) -> Result<UserDetails, StoreError> {
        let mut tx = self.db.begin().await?;

        // dropping `tx` on an early return rolls it back
        let user = Self::insert_user_tx(&mut tx, &user).await?;
        let account = Self::insert_account_tx(&mut tx, user.id, &account)
            .await
            .map_err(|e| StoreError::DefaultAccount(e.to_string()))?;

        tx.commit().await?;
        debug!(user_id = %user.id, account_id = %account.id, "user and default account committed");

        Ok(UserDetails {
            accounts: vec![account],
            ..UserDetails::bare(user)
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, phone_number, first_name, last_name, created_at
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn load_details(
        &self,
        id: Uuid,
        related_limit: i64,
    ) -> Result<Option<UserDetails>, StoreError> {
        let Some(user) = self.find_user(id).await? else {
            return Ok(None);
        };
        Ok(self.attach_related(vec![user], related_limit).await?.pop())
    }

    async fn list_details(
        &self,
        limit: i64,
        offset: i64,
        related_limit: i64,
    ) -> Result<Vec<UserDetails>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password, phone_number, first_name, last_name, created_at
              FROM users
             ORDER BY created_at ASC, id ASC
             LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        self.attach_related(users, related_limit).await
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        phone_number: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET username = $2, phone_number = $3
             WHERE id = $1
            RETURNING id, username, email, password, phone_number, first_name, last_name, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(phone_number)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        for stmt in [
            "DELETE FROM accounts WHERE user_id = $1",
            "DELETE FROM plans WHERE user_id = $1",
            "DELETE FROM transactions WHERE user_id = $1",
            "DELETE FROM users WHERE id = $1",
        ] {
            let done = sqlx::query(stmt).bind(id).execute(&mut *tx).await?;
            debug!(user_id = %id, rows = done.rows_affected(), stmt, "cascade step");
        }

        tx.commit().await?;
        Ok(())
    }
}
