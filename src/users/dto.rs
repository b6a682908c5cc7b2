use serde::Deserialize;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Request body for user signup.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Profile fields that may be changed after signup. Missing fields become empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone_number: String,
}

/// Raw `?page=&page_size=` values, kept as text so bad input never rejects the request.
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl PageQuery {
    /// First occurrence of each key wins; unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut q = PageQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" if q.page.is_none() => q.page = Some(value),
                "page_size" if q.page_size.is_none() => q.page_size = Some(value),
                _ => {}
            }
        }
        q
    }

    /// Non-numeric values read as 0, then everything is clamped into range.
    pub fn resolve(&self) -> PageRequest {
        let page = parse_or_zero(self.page.as_deref(), DEFAULT_PAGE);
        let page_size = parse_or_zero(self.page_size.as_deref(), DEFAULT_PAGE_SIZE);
        PageRequest {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

fn parse_or_zero(raw: Option<&str>, default: i64) -> i64 {
    match raw {
        None => default,
        Some(v) => v.trim().parse::<i64>().unwrap_or(0),
    }
}
