//! Response Renderer (spec.md §4.1)
//!
//! Converts a configured denial specification into a ready-to-emit HTTP
//! response. JSON bodies are parsed once at config-load time and
//! re-serialized on every emit; HTML/TEXT bodies are emitted as raw UTF-8.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReturnAs {
    Json,
    Html,
    Text,
}

impl ReturnAs {
    fn parse(raw: &str) -> Result<Self, FilterError> {
        match raw.trim().to_uppercase().as_str() {
            "JSON" => Ok(ReturnAs::Json),
            "HTML" => Ok(ReturnAs::Html),
            "TEXT" => Ok(ReturnAs::Text),
            other => Err(FilterError::Config(format!(
                "\"return_as\" must be either JSON, HTML or TEXT, got {:?}",
                other
            ))),
        }
    }
}

/// The raw, declarative shape of a response as it appears in the config
/// file. Validated (and its JSON body parsed) into a [`ResponseSpec`] at
/// load time — see [`ResponseSpecRaw::into_spec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSpecRaw {
    pub response: String,
    pub status_code: u16,
    pub return_as: String,
}

impl ResponseSpecRaw {
    pub fn into_spec(self) -> Result<ResponseSpec, FilterError> {
        let return_as = ReturnAs::parse(&self.return_as)?;
        let status = StatusCode::from_u16(self.status_code)
            .map_err(|_| FilterError::Config(format!("invalid status code {}", self.status_code)))?;

        let body = match return_as {
            ReturnAs::Json => {
                let value: serde_json::Value = serde_json::from_str(&self.response)
                    .map_err(|e| FilterError::Config(format!("invalid JSON response body: {}", e)))?;
                ResponseBody::Json(value)
            }
            ReturnAs::Html => ResponseBody::Html(self.response),
            ReturnAs::Text => ResponseBody::Text(self.response),
        };

        Ok(ResponseSpec { status, body })
    }
}

fn default_forbidden_raw() -> ResponseSpecRaw {
    ResponseSpecRaw {
        response: r#"{"detail":"Forbidden"}"#.to_string(),
        status_code: 403,
        return_as: "JSON".to_string(),
    }
}

/// A validated, ready-to-render denial response.
#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub status: StatusCode,
    pub body: ResponseBody,
}

#[derive(Debug, Clone)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Html(String),
    Text(String),
}

impl ResponseSpec {
    pub fn forbidden_default() -> Self {
        default_forbidden_raw()
            .into_spec()
            .expect("default forbidden response is always valid")
    }

    pub fn render(&self) -> Response {
        match &self.body {
            ResponseBody::Json(value) => {
                let bytes = serde_json::to_vec(value).unwrap_or_default();
                (
                    self.status,
                    [(header::CONTENT_TYPE, "application/json")],
                    bytes,
                )
                    .into_response()
            }
            ResponseBody::Html(s) => (
                self.status,
                [(header::CONTENT_TYPE, "text/html")],
                s.clone(),
            )
                .into_response(),
            ResponseBody::Text(s) => (
                self.status,
                [(header::CONTENT_TYPE, "text/plain")],
                s.clone(),
            )
                .into_response(),
        }
    }
}

/// The denial category used to select a [`ResponseSpec`] and to log the
/// block reason. Mirrors `original_source`'s literal block-condition names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyCategory {
    InboundBadIp,
    OutboundBadIp,
    Continent,
    Country,
    Asn,
    RdnsHostname,
    Hosting,
    Proxy,
    Ip,
}

impl DenyCategory {
    /// The block-condition name used in the log line, matching
    /// `original_source`'s `"{type} block condition"` strings.
    pub fn label(&self) -> &'static str {
        match self {
            DenyCategory::InboundBadIp => "inbound bad IP",
            DenyCategory::OutboundBadIp => "outbound bad IP",
            DenyCategory::Continent => "continent",
            DenyCategory::Country => "country",
            DenyCategory::Asn => "ASN",
            DenyCategory::RdnsHostname => "RDNS hostname",
            DenyCategory::Hosting => "hosting",
            DenyCategory::Proxy => "proxy",
            DenyCategory::Ip => "IP",
        }
    }
}

/// Per-category response specs plus the optional `all` override.
#[derive(Debug, Clone)]
pub struct ResponseMapping {
    pub all: Option<ResponseSpec>,
    pub ip: ResponseSpec,
    pub continent: ResponseSpec,
    pub country: ResponseSpec,
    pub asn: ResponseSpec,
    pub rdns_hostname: ResponseSpec,
    pub bad_ip: ResponseSpec,
    pub hosting: ResponseSpec,
    pub proxy: ResponseSpec,
}

impl ResponseMapping {
    pub fn select(&self, category: DenyCategory) -> &ResponseSpec {
        if let Some(all) = &self.all {
            return all;
        }

        match category {
            DenyCategory::InboundBadIp | DenyCategory::OutboundBadIp => &self.bad_ip,
            DenyCategory::Continent => &self.continent,
            DenyCategory::Country => &self.country,
            DenyCategory::Asn => &self.asn,
            DenyCategory::RdnsHostname => &self.rdns_hostname,
            DenyCategory::Hosting => &self.hosting,
            DenyCategory::Proxy => &self.proxy,
            DenyCategory::Ip => &self.ip,
        }
    }
}

impl Default for ResponseMapping {
    fn default() -> Self {
        Self {
            all: None,
            ip: ResponseSpec::forbidden_default(),
            continent: ResponseSpec::forbidden_default(),
            country: ResponseSpec::forbidden_default(),
            asn: ResponseSpec::forbidden_default(),
            rdns_hostname: ResponseSpec::forbidden_default(),
            bad_ip: ResponseSpec::forbidden_default(),
            hosting: ResponseSpec::forbidden_default(),
            proxy: ResponseSpec::forbidden_default(),
        }
    }
}

/// 503 Service Unavailable with a fixed JSON body, used for every
/// short-circuit that is not a configured denial (private IP, rate limit,
/// upstream failure).
pub fn service_unavailable(retry_after_epoch: Option<i64>) -> Response {
    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"detail":"Service Unavailable"}"#,
    )
        .into_response();

    if let Some(reset_at) = retry_after_epoch {
        if let Ok(value) = HeaderValue::from_str(&reset_at.to_string()) {
            response.headers_mut().insert("Retry-After", value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_return_as_case_insensitively() {
        assert_eq!(ReturnAs::parse(" json ").unwrap(), ReturnAs::Json);
        assert_eq!(ReturnAs::parse("Html").unwrap(), ReturnAs::Html);
        assert!(ReturnAs::parse("xml").is_err());
    }

    #[test]
    fn rejects_invalid_json_body() {
        let raw = ResponseSpecRaw {
            response: "{not json".to_string(),
            status_code: 403,
            return_as: "JSON".to_string(),
        };
        assert!(raw.into_spec().is_err());
    }

    #[test]
    fn default_mapping_is_forbidden_json() {
        let mapping = ResponseMapping::default();
        let spec = mapping.select(DenyCategory::Country);
        assert_eq!(spec.status, StatusCode::FORBIDDEN);
        matches!(spec.body, ResponseBody::Json(_));
    }

    #[test]
    fn all_overrides_category() {
        let mut mapping = ResponseMapping::default();
        mapping.all = Some(ResponseSpec {
            status: StatusCode::IM_A_TEAPOT,
            body: ResponseBody::Text("nope".to_string()),
        });
        let spec = mapping.select(DenyCategory::Hosting);
        assert_eq!(spec.status, StatusCode::IM_A_TEAPOT);
    }
}
