//! In-memory [`UserStore`] used by tests in place of Postgres.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{Account, NewAccount, NewUser, Plan, Transaction, User, UserDetails};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    accounts: Vec<Account>,
    plans: Vec<Plan>,
    transactions: Vec<Transaction>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
    fail_default_account: AtomicBool,
    fail_backend: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_default_account(&self, fail: bool) {
        self.fail_default_account.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent call fail with a backend error.
    pub fn fail_backend(&self, fail: bool) {
        self.fail_backend.store(fail, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    /// Rows in accounts, plans and transactions owned by `user_id`.
    pub fn related_counts(&self, user_id: Uuid) -> (usize, usize, usize) {
        let t = self.tables.lock().unwrap();
        (
            t.accounts.iter().filter(|a| a.user_id == user_id).count(),
            t.plans.iter().filter(|p| p.user_id == user_id).count(),
            t.transactions.iter().filter(|x| x.user_id == user_id).count(),
        )
    }

    /// Insert a user directly, bypassing validation and call counting.
    pub fn seed_user(&self, username: &str) -> Uuid {
        let mut t = self.tables.lock().unwrap();
        let id = Uuid::new_v4();
        t.users.push(User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "$argon2id$seeded".to_string(),
            phone_number: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            created_at: OffsetDateTime::now_utc(),
        });
        id
    }

    pub fn seed_plans(&self, user_id: Uuid, n: usize) {
        let mut t = self.tables.lock().unwrap();
        for i in 0..n {
            t.plans.push(Plan {
                id: Uuid::new_v4(),
                user_id,
                name: format!("plan {i}"),
                target_amount: Decimal::new(100_000, 2),
                current_amount: Decimal::ZERO,
                created_at: OffsetDateTime::now_utc(),
            });
        }
    }

    pub fn seed_transactions(&self, user_id: Uuid, n: usize) {
        let mut t = self.tables.lock().unwrap();
        for i in 0..n {
            t.transactions.push(Transaction {
                id: Uuid::new_v4(),
                user_id,
                account_id: None,
                amount: Decimal::new(i as i64 * 100, 2),
                category: "food".to_string(),
                description: format!("txn {i}"),
                created_at: OffsetDateTime::now_utc(),
            });
        }
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_backend.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".into()));
        }
        Ok(())
    }

    fn details(t: &Tables, user: &User, related_limit: i64) -> UserDetails {
        let limit = usize::try_from(related_limit).unwrap_or(0);
        UserDetails {
            user: user.clone(),
            accounts: t.accounts.iter().filter(|a| a.user_id == user.id).cloned().collect(),
            plans: t
                .plans
                .iter()
                .filter(|p| p.user_id == user.id)
                .take(limit)
                .cloned()
                .collect(),
            transactions: t
                .transactions
                .iter()
                .filter(|x| x.user_id == user.id)
                .take(limit)
                .cloned()
                .collect(),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_with_account(
        &self,
        user: NewUser,
        account: NewAccount,
    ) -> Result<UserDetails, StoreError> {
        self.enter()?;
        let mut t = self.tables.lock().unwrap();
        if t
            .users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }
        if self.fail_default_account.load(Ordering::SeqCst) {
            return Err(StoreError::DefaultAccount("accounts table unavailable".into()));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password: user.password,
            phone_number: user.phone_number,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now,
        };
        let account = Account {
            id: Uuid::new_v4(),
            user_id: user.id,
            name: account.name,
            category: account.category,
            balance: account.balance,
            created_at: now,
        };
        t.users.push(user.clone());
        t.accounts.push(account.clone());
        Ok(UserDetails {
            accounts: vec![account],
            ..UserDetails::bare(user)
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.enter()?;
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn load_details(
        &self,
        id: Uuid,
        related_limit: i64,
    ) -> Result<Option<UserDetails>, StoreError> {
        self.enter()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| Self::details(&t, u, related_limit)))
    }

    async fn list_details(
        &self,
        limit: i64,
        offset: i64,
        related_limit: i64,
    ) -> Result<Vec<UserDetails>, StoreError> {
        self.enter()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .users
            .iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|u| Self::details(&t, u, related_limit))
            .collect())
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        self.enter()?;
        Ok(self.tables.lock().unwrap().users.len() as i64)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        phone_number: &str,
    ) -> Result<User, StoreError> {
        self.enter()?;
        let mut t = self.tables.lock().unwrap();
        if t.users.iter().any(|u| u.id != id && u.username == username) {
            return Err(StoreError::Duplicate("users_username_key".into()));
        }
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        user.username = username.to_string();
        user.phone_number = phone_number.to_string();
        Ok(user.clone())
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<(), StoreError> {
        self.enter()?;
        let mut t = self.tables.lock().unwrap();
        if !t.users.iter().any(|u| u.id == id) {
            return Err(StoreError::NotFound);
        }
        t.accounts.retain(|a| a.user_id != id);
        t.plans.retain(|p| p.user_id != id);
        t.transactions.retain(|x| x.user_id != id);
        t.users.retain(|u| u.id != id);
        Ok(())
    }
}
