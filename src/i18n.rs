use std::collections::HashMap;
use std::fmt;
use std::future::{Ready, ready};

use actix_web::http::header::ACCEPT_LANGUAGE;
use actix_web::{FromRequest, HttpRequest, web};
use serde::Deserialize;

use crate::errors::AppError;

const BASE_BUNDLE: &str = include_str!("../i18n/messages.toml");
const EN_US_BUNDLE: &str = include_str!("../i18n/messages_en_US.toml");
const ZH_CN_BUNDLE: &str = include_str!("../i18n/messages_zh_CN.toml");

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    pub language: String,
    pub country: Option<String>,
}

impl Locale {
    pub fn new(language: &str, country: Option<&str>) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            country: country.map(str::to_ascii_uppercase),
        }
    }

    pub fn en_us() -> Self {
        Self::new("en", Some("US"))
    }

    /// Accepts `zh_CN`, `zh-CN` and `zh`.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let mut parts = tag.split(['-', '_']);
        let language = parts.next().filter(|l| {
            !l.is_empty() && l.len() <= 8 && l.chars().all(|c| c.is_ascii_alphabetic())
        })?;
        let country = parts
            .next()
            .filter(|c| !c.is_empty() && c.chars().all(|c| c.is_ascii_alphanumeric()));
        Some(Self::new(language, country))
    }

    fn bundle_key(&self) -> String {
        match &self.country {
            Some(c) => format!("{}_{}", self.language, c),
            None => self.language.clone(),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(c) => write!(f, "{}-{}", self.language, c),
            None => f.write_str(&self.language),
        }
    }
}

/// Message bundles keyed by `lang_COUNTRY`, with `""` as the base bundle.
pub struct MessageSource {
    bundles: HashMap<String, HashMap<String, String>>,
    default_locale: Locale,
}

impl MessageSource {
    pub fn new(default_locale: Locale) -> Self {
        Self {
            bundles: HashMap::new(),
            default_locale,
        }
    }

    pub fn with_bundle(mut self, key: &str, source: &str) -> anyhow::Result<Self> {
        let messages: HashMap<String, String> = toml::from_str(source)?;
        self.bundles.insert(key.to_string(), messages);
        Ok(self)
    }

    /// The bundles compiled into the binary.
    pub fn embedded() -> anyhow::Result<Self> {
        Self::new(Locale::en_us())
            .with_bundle("", BASE_BUNDLE)?
            .with_bundle("en_US", EN_US_BUNDLE)?
            .with_bundle("zh_CN", ZH_CN_BUNDLE)
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    fn lookup(&self, code: &str, locale: &Locale) -> Option<&str> {
        let candidates = [
            locale.bundle_key(),
            locale.language.clone(),
            self.default_locale.bundle_key(),
            self.default_locale.language.clone(),
            String::new(),
        ];
        candidates
            .iter()
            .find_map(|key| self.bundles.get(key)?.get(code))
            .map(String::as_str)
    }

    /// Formats `code` with positional `{n}` arguments; an unknown code is
    /// returned as is.
    pub fn get_message(&self, code: &str, args: &[&str], locale: &Locale) -> String {
        let Some(template) = self.lookup(code, locale) else {
            return code.to_string();
        };
        format_placeholders(template, args)
    }
}

/// Replaces each `{n}` in one left-to-right pass, so text coming from an
/// argument is never expanded again. Placeholders without a matching
/// argument are kept.
fn format_placeholders(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let arg = tail.find('}').and_then(|close| {
            let index = tail[1..close].parse::<usize>().ok()?;
            Some((args.get(index)?, close))
        });
        match arg {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `lang` query parameter, else the first `Accept-Language` tag, else
/// `default`.
pub fn resolve_locale(lang: Option<&str>, accept_language: Option<&str>, default: &Locale) -> Locale {
    if let Some(locale) = lang.and_then(Locale::parse) {
        return locale;
    }
    accept_language
        .and_then(|header| header.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag))
        .and_then(Locale::parse)
        .unwrap_or_else(|| default.clone())
}

#[derive(Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

/// Locale of the current request.
#[derive(Debug, Clone)]
pub struct RequestLocale(pub Locale);

impl FromRequest for RequestLocale {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let default = req
            .app_data::<web::Data<MessageSource>>()
            .map(|m| m.default_locale().clone())
            .unwrap_or_else(Locale::en_us);
        let lang = web::Query::<LangQuery>::from_query(req.query_string())
            .ok()
            .and_then(|q| q.into_inner().lang);
        let accept = req
            .headers()
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        ready(Ok(RequestLocale(resolve_locale(lang.as_deref(), accept, &default))))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn formats_per_locale() {
        let messages = MessageSource::embedded().unwrap();
        assert_eq!(
            messages.get_message("test", &["Rust"], &Locale::en_us()),
            "Make Rust Great Again"
        );
        assert_eq!(
            messages.get_message("test", &["Rust"], &Locale::new("zh", Some("CN"))),
            "让 Rust 再次伟大"
        );
        assert_eq!(
            messages.get_message("test", &["Rust"], &Locale::new("fr", None)),
            "Make Rust Great Again"
        );
    }

    #[test]
    fn arguments_are_substituted_once() {
        let messages = MessageSource::new(Locale::en_us())
            .with_bundle("", "pair = \"{0} and {1}\"")
            .unwrap();
        assert_eq!(
            messages.get_message("pair", &["{1}", "b"], &Locale::en_us()),
            "{1} and b"
        );
        assert_eq!(format_placeholders("{0}{0}", &["x"]), "xx");
        assert_eq!(format_placeholders("{2} {x} {", &["a"]), "{2} {x} {");
        assert_eq!(format_placeholders("{{0}}", &["a"]), "{a}");
    }

    #[test]
    fn unknown_code_is_echoed() {
        let messages = MessageSource::embedded().unwrap();
        assert_eq!(
            messages.get_message("missing.code", &[], &Locale::en_us()),
            "missing.code"
        );
    }

    #[test]
    fn resolves_from_param_then_header_then_default() {
        let default = Locale::en_us();
        assert_eq!(
            resolve_locale(Some("zh_CN"), Some("fr"), &default).to_string(),
            "zh-CN"
        );
        assert_eq!(
            resolve_locale(None, Some("zh-CN,zh;q=0.9"), &default).to_string(),
            "zh-CN"
        );
        assert_eq!(resolve_locale(None, Some("fr"), &default).to_string(), "fr");
        assert_eq!(resolve_locale(None, None, &default).to_string(), "en-US");
        assert_eq!(
            resolve_locale(Some("!!"), None, &default).to_string(),
            "en-US"
        );
    }

    #[actix_web::test]
    async fn extracts_request_locale() {
        let req = TestRequest::with_uri("/?lang=zh_CN").to_http_request();
        let RequestLocale(locale) = RequestLocale::extract(&req).await.unwrap();
        assert_eq!(locale, Locale::new("zh", Some("CN")));

        let req = TestRequest::default()
            .insert_header((ACCEPT_LANGUAGE, "fr"))
            .to_http_request();
        let RequestLocale(locale) = RequestLocale::extract(&req).await.unwrap();
        assert_eq!(locale.to_string(), "fr");
    }
}
