use std::collections::HashMap;

use axum::extract::Multipart;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::AppError;

/// A fully buffered multipart body, keyed by part name. Later parts win.
#[derive(Debug, Default)]
pub struct Form {
    parts: HashMap<String, Vec<u8>>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut parts = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::InvalidInput(format!("malformed multipart body: {err}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let bytes = field.bytes().await.map_err(|err| {
                AppError::InvalidInput(format!("failed to read part '{name}': {err}"))
            })?;
            parts.insert(name, bytes.to_vec());
        }

        Ok(Self { parts })
    }

    pub fn text(&self, name: &str) -> Result<Option<String>, AppError> {
        self.parts
            .get(name)
            .map(|bytes| {
                String::from_utf8(bytes.clone())
                    .map_err(|_| AppError::InvalidInput(format!("part '{name}' is not utf-8")))
            })
            .transpose()
    }

    /// Binary part; an empty upload counts as absent.
    pub fn file(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name).filter(|bytes| !bytes.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<String, AppError> {
        self.text(name)?
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("missing part '{name}'")))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("missing authorization header".to_string()))
}
