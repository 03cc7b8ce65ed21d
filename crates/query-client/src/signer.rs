//! Query-string escaping and request signing.
//!
//! Three signature versions are supported:
//!
//! - **v0**: HMAC-SHA1 over `Action` followed by `Timestamp` (or `Expires`).
//! - **v1**: HMAC-SHA1 over every parameter, sorted case-insensitively by
//!   name, concatenated as `name1value1name2value2…`.
//! - **v2**: HMAC-SHA256 (or SHA1 when requested through `SignatureMethod`)
//!   over `METHOD\nhost\npath\ncanonical-query`.
//!
//! Signing works on a prepared copy of the caller's parameters, so a request
//! can be signed again (for a method switch, a retry or a redirect) without
//! carrying over anything from the previous signature.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use crate::error::{Error, ErrorKind, Result};
use crate::request::{HttpMethod, Params};

/// Timestamp format the query services expect.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

/// Percent-encode a value the way the query services canonicalize it.
///
/// Everything except ASCII letters, digits and `- _ . ~` is encoded, with
/// non-ASCII input encoded byte-wise as UTF-8. Space becomes `%20`, never `+`.
///
/// ```
/// use aws_query_client::escape;
///
/// assert_eq!(escape("a b*c+d~e"), "a%20b%2Ac%2Bd~e");
/// ```
pub fn escape(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Signature protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureVersion {
    V0,
    V1,
    #[default]
    V2,
}

impl SignatureVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureVersion::V0 => "0",
            SignatureVersion::V1 => "1",
            SignatureVersion::V2 => "2",
        }
    }
}

impl fmt::Display for SignatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" => Ok(SignatureVersion::V0),
            "1" => Ok(SignatureVersion::V1),
            "2" => Ok(SignatureVersion::V2),
            other => Err(Error::new(ErrorKind::Signing(format!(
                "unknown signature version ({other}) requested"
            )))),
        }
    }
}

/// HMAC digest used for a v2 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMethod {
    HmacSha1,
    HmacSha256,
}

impl SignatureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethod::HmacSha1 => "HmacSHA1",
            SignatureMethod::HmacSha256 => "HmacSHA256",
        }
    }

    /// The method named by a parameter value. Anything unrecognized falls
    /// back to SHA-256.
    fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("HmacSHA1") => SignatureMethod::HmacSha1,
            _ => SignatureMethod::HmacSha256,
        }
    }
}

/// Format a UTC instant as a request timestamp.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Copy `params` and add what signing needs: a `Timestamp` (unless one of
/// `Timestamp`/`Expires` is already present), the `SignatureVersion`, and
/// for v2 a valid `SignatureMethod`.
pub fn prepare(params: &Params, version: SignatureVersion, now: DateTime<Utc>) -> Params {
    let mut prepared = params.clone();
    if !prepared.contains("Timestamp") && !prepared.contains("Expires") {
        prepared.set("Timestamp", timestamp(now));
    }
    prepared.set("SignatureVersion", version.as_str());
    if version == SignatureVersion::V2 {
        let method = SignatureMethod::from_param(prepared.get("SignatureMethod"));
        prepared.set("SignatureMethod", method.as_str());
    }
    prepared
}

/// Sign already-prepared parameters and return the query string to send.
pub fn sign(
    secret: &str,
    prepared: &Params,
    version: SignatureVersion,
    method: HttpMethod,
    host: &str,
    path: &str,
) -> Result<String> {
    match version {
        SignatureVersion::V0 => {
            let string_to_sign = format!(
                "{}{}",
                prepared.get("Action").unwrap_or_default(),
                prepared
                    .get("Timestamp")
                    .or_else(|| prepared.get("Expires"))
                    .unwrap_or_default()
            );
            let signature = hmac_base64(SignatureMethod::HmacSha1, secret, &string_to_sign)?;
            Ok(insertion_order_query(prepared, &signature))
        }
        SignatureVersion::V1 => {
            let mut sorted: Vec<&(String, String)> = prepared.iter().collect();
            sorted.sort_by_key(|(k, _)| k.to_lowercase());
            let string_to_sign: String = sorted
                .iter()
                .flat_map(|(k, v)| [k.as_str(), v.as_str()])
                .collect();
            let signature = hmac_base64(SignatureMethod::HmacSha1, secret, &string_to_sign)?;
            Ok(insertion_order_query(prepared, &signature))
        }
        SignatureVersion::V2 => {
            let canonical = canonical_query(prepared);
            let digest = SignatureMethod::from_param(prepared.get("SignatureMethod"));
            let string_to_sign = format!(
                "{}\n{}\n{}\n{}",
                method.as_str(),
                host.to_lowercase(),
                path,
                canonical
            );
            let signature = hmac_base64(digest, secret, &string_to_sign)?;
            Ok(format!("{canonical}&Signature={}", escape(&signature)))
        }
    }
}

/// Prepare and sign in one step.
pub fn sign_request(
    secret: &str,
    params: &Params,
    version: SignatureVersion,
    method: HttpMethod,
    host: &str,
    path: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let prepared = prepare(params, version, now);
    sign(secret, &prepared, version, method, host, path)
}

/// Pairs sorted by raw name, escaped, joined with `&`.
pub fn canonical_query(params: &Params) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    join_pairs(sorted.into_iter())
}

fn insertion_order_query(params: &Params, signature: &str) -> String {
    let mut signed = params.clone();
    signed.set("Signature", signature);
    join_pairs(signed.iter())
}

fn join_pairs<'a>(pairs: impl Iterator<Item = &'a (String, String)>) -> String {
    pairs
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_base64(method: SignatureMethod, secret: &str, data: &str) -> Result<String> {
    let invalid_key = |e: hmac::digest::InvalidLength| {
        Error::new(ErrorKind::Signing(format!("invalid signing key: {e}")))
    };
    let digest = match method {
        SignatureMethod::HmacSha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).map_err(invalid_key)?;
            mac.update(data.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        SignatureMethod::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(invalid_key)?;
            mac.update(data.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(STANDARD.encode(digest))
}
