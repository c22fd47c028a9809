use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(EventId);

const MAX_PRODUCT_ID_LEN: usize = 64;
const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Accepts the raw path segment of `/product/:id`.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_PRODUCT_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub summary: String,
}

pub fn default_catalog() -> Vec<Product> {
    vec![Product {
        id: ProductId("1".into()),
        title: "Insurance Quote".into(),
        summary: "Click below to get a quote for our services.".into(),
    }]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Name,
    Email,
}

impl FormField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
        }
    }
}

/// In-progress form state for one form instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteDraft {
    pub name: String,
    pub email: String,
    submitted: bool,
}

impl QuoteDraft {
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        match field {
            FormField::Name => self.name = value.into(),
            FormField::Email => self.email = value.into(),
        }
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Email => &self.email,
        }
    }

    pub fn submitted(&self) -> bool {
        self.submitted
    }

    /// One-way: there is no way to clear the flag again.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    pub fn snapshot(&self) -> QuoteRequest {
        QuoteRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub name: String,
    pub email: String,
}

impl QuoteRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new(FormField::Name, "name is required"));
        } else if name.chars().count() > MAX_NAME_LEN {
            errors.push(FieldError::new(FormField::Name, "name is too long"));
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(FieldError::new(FormField::Email, "email is required"));
        } else if email.len() > MAX_EMAIL_LEN {
            errors.push(FieldError::new(FormField::Email, "email is too long"));
        } else if !looks_like_email(email) {
            errors.push(FieldError::new(
                FormField::Email,
                "email must look like name@example.com",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
