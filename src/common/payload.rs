// src/common/payload.rs

use std::{fmt::Display, str::FromStr};

use axum::{
    extract::{FromRequest, Request},
    http::header,
    Json,
};
use axum_extra::extract::Form;
use serde::{
    de::{DeserializeOwned, IntoDeserializer},
    Deserialize, Deserializer,
};

use crate::common::error::AppError;

// Extrator que aceita o mesmo payload como JSON (modais AJAX)
// ou como formulário (application/x-www-form-urlencoded).
// O Form do axum-extra entende chaves repetidas (multi-select).
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
            Ok(Payload(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
            Ok(Payload(value))
        }
    }
}

/// `""` (campo de formulário vazio) e `null` viram `None`.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => T::deserialize(s.into_deserializer()).map(Some),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

/// Número opcional vindo de JSON (número) ou de formulário (texto, possivelmente vazio).
pub fn optional_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Option::<NumberOrText<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    #[derive(Debug, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
    #[serde(rename_all = "snake_case")]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        colors: BTreeSet<Color>,
        #[serde(default, deserialize_with = "empty_as_none")]
        favorite: Option<Color>,
        #[serde(default, deserialize_with = "optional_number")]
        price: Option<Decimal>,
        #[serde(default, deserialize_with = "optional_number")]
        quantity: Option<i32>,
    }

    fn request(content_type: &str, body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn decodes_form_with_repeated_keys_and_blank_fields() {
        let req = request(
            "application/x-www-form-urlencoded",
            "name=ACME&colors=red&colors=blue&favorite=&price=&quantity=3",
        );
        let Payload(sample) = Payload::<Sample>::from_request(req, &()).await.unwrap();

        assert_eq!(sample.name, "ACME");
        assert_eq!(sample.colors.len(), 2);
        assert!(sample.colors.contains(&Color::Blue));
        assert_eq!(sample.favorite, None);
        assert_eq!(sample.price, None);
        assert_eq!(sample.quantity, Some(3));
    }

    #[tokio::test]
    async fn decodes_json_numbers_and_enums() {
        let req = request(
            "application/json",
            r#"{"name":"ACME","favorite":"red","price":12.5,"quantity":null}"#,
        );
        let Payload(sample) = Payload::<Sample>::from_request(req, &()).await.unwrap();

        assert_eq!(sample.favorite, Some(Color::Red));
        assert_eq!(sample.price, Some(Decimal::new(125, 1)));
        assert_eq!(sample.quantity, None);
        assert!(sample.colors.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_payload() {
        let req = request("application/json", "{not json");
        let result = Payload::<Sample>::from_request(req, &()).await;
        assert!(matches!(result, Err(AppError::InvalidPayload(_))));
    }
}
