// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::labels::Lang;

// Extrator de idioma (Accept-Language). Usado nos rótulos da exportação CSV.
pub struct Locale(pub String);

impl Locale {
    pub fn lang(&self) -> Lang {
        Lang::from_tag(&self.0)
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let lang = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .and_then(|header_str| {
                accept_language::parse(header_str)
                    .first()
                    // "pt-BR" -> "pt", "zh-TW" -> "zh"
                    .map(|tag| tag.split('-').next().unwrap_or(tag).to_lowercase())
            })
            .unwrap_or_else(|| "en".to_string());

        Ok(Locale(lang))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn locale_for(header_value: Option<&str>) -> Locale {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header_value {
            builder = builder.header(header::ACCEPT_LANGUAGE, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Locale::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn picks_the_preferred_primary_language() {
        assert_eq!(locale_for(Some("pt-BR,pt;q=0.9,en;q=0.8")).await.lang(), Lang::Pt);
        assert_eq!(locale_for(Some("zh-TW")).await.lang(), Lang::Zh);
        assert_eq!(locale_for(Some("en;q=0.5, zh;q=0.9")).await.lang(), Lang::Zh);
    }

    #[tokio::test]
    async fn unknown_or_missing_language_falls_back_to_english() {
        assert_eq!(locale_for(None).await.lang(), Lang::En);
        assert_eq!(locale_for(Some("fr-FR")).await.lang(), Lang::En);
    }
}
