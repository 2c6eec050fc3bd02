use crate::transport::HttpRequest;
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic fingerprint of a request, used as both cache and dedup key.
///
/// Covers method, canonical URL (query parameters are sorted before the
/// URL is built) and the JSON body. `serde_json` serializes object keys in
/// sorted order, so equal bodies hash equally.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct Signature(String);

impl Signature {
    pub fn of(request: &HttpRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.method.as_str().as_bytes());
        hasher.update(request.url.as_bytes());
        if let Some(body) = &request.body {
            hasher.update(body.to_string().as_bytes());
        }
        Signature(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Method;
    use serde_json::json;

    fn request(method: Method, url: &str, body: Option<serde_json::Value>) -> HttpRequest {
        HttpRequest {
            url: url.to_string(),
            method,
            headers: vec![],
            body,
        }
    }

    #[test]
    fn identical_requests_share_a_signature() {
        let a = Signature::of(&request(Method::Get, "https://api.talent.example/skills", None));
        let b = Signature::of(&request(Method::Get, "https://api.talent.example/skills", None));

        assert_eq!(a, b);
    }

    #[test]
    fn method_url_and_body_all_discriminate() {
        let base = request(Method::Get, "https://api.talent.example/skills", None);
        let by_method = request(Method::Post, "https://api.talent.example/skills", None);
        let by_url = request(Method::Get, "https://api.talent.example/companies", None);
        let by_body = request(
            Method::Get,
            "https://api.talent.example/skills",
            Some(json!({"level": "senior"})),
        );

        let signature = Signature::of(&base);
        assert_ne!(signature, Signature::of(&by_method));
        assert_ne!(signature, Signature::of(&by_url));
        assert_ne!(signature, Signature::of(&by_body));
    }
}
