// src/common/labels.rs

// Rótulos legíveis para os enums exportados (CSV, telas).
// O idioma vem do extrator `Locale` (cabeçalho Accept-Language).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Pt,
    Zh,
}

impl Lang {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "pt" => Lang::Pt,
            "zh" => Lang::Zh,
            _ => Lang::En,
        }
    }

    /// Escolhe entre as três traduções (en, pt, zh).
    pub fn pick(self, en: &'static str, pt: &'static str, zh: &'static str) -> &'static str {
        match self {
            Lang::En => en,
            Lang::Pt => pt,
            Lang::Zh => zh,
        }
    }
}

pub trait Labeled {
    fn label(&self, lang: Lang) -> &'static str;
}

impl<T: Labeled> Labeled for Option<T> {
    fn label(&self, lang: Lang) -> &'static str {
        self.as_ref().map(|v| v.label(lang)).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(Lang::from_tag("pt"), Lang::Pt);
        assert_eq!(Lang::from_tag("zh"), Lang::Zh);
        assert_eq!(Lang::from_tag("fr"), Lang::En);
    }
}
