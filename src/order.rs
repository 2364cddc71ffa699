//! Issuance steps a diagnostic run drives against a CA.
//!
//! Each step is a single request (or, for polling, a bounded series of requests) and returns the
//! CA's answer as an [`AcmeResource`] so callers can render it untouched.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    api::{
        self, ChallengeResponse, ChallengeStatus, Deactivation, Endpoint, NewOrder, Problem,
        Revocation,
    },
    client::AcmeResource,
    error::{Error, Result},
    Client,
};

impl Client {
    /// Creates an order for the given DNS names.
    ///
    /// Names are deduplicated, keeping their first position. The returned resource's `location`
    /// is the order URL.
    pub async fn new_order<'a>(
        &self,
        identifiers: impl IntoIterator<Item = &'a str>,
    ) -> Result<AcmeResource> {
        let dir = self.directory().await?;
        let url = dir.url(Endpoint::NewOrder)?;

        let order = NewOrder::dns(identifiers);
        log::debug!("Creating order for {:?}", order.identifiers);

        self.call(url, Endpoint::NewOrder.legacy_name(), &order)
            .await
    }

    /// Tells the CA the challenge at `url` is ready for validation.
    ///
    /// For v1 the challenge is read first to compute the `http-01` key authorization the draft
    /// protocol expects in the payload; v2 posts an empty object.
    pub async fn respond_to_challenge(&self, url: &str) -> Result<AcmeResource> {
        match self.dialect() {
            crate::Dialect::V2 => self.call(url, "challenge", &api::EmptyObject).await,

            crate::Dialect::V1 => {
                let challenge = self.fetch(url).await?;
                let token = challenge
                    .body
                    .get("token")
                    .and_then(|token| token.as_str())
                    .ok_or_else(|| Error::MalformedChallengeResponse {
                        url: url.to_owned(),
                    })?;

                let response = ChallengeResponse::http_01(self.key_authorization(token));
                self.call(url, "challenge", &response).await
            }
        }
    }

    /// Re-fetches the challenge at `url` until it is `valid`, giving up after `timeout`.
    pub async fn poll_challenge(&self, url: &str, timeout: Duration) -> Result<AcmeResource> {
        self.poll_challenge_with_cancel(url, timeout, &CancellationToken::new())
            .await
    }

    /// Like [`poll_challenge`](Self::poll_challenge), stopping early when `cancel` fires.
    ///
    /// A `pending` or `processing` challenge is re-fetched every poll interval. An `invalid`
    /// challenge fails with the CA's problem document attached. Any other answer is reported as
    /// a malformed response.
    pub async fn poll_challenge_with_cancel(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<AcmeResource> {
        tokio::select! {
            res = tokio::time::timeout(timeout, self.poll_until_settled(url)) => match res {
                Ok(res) => res,
                Err(_) => Err(Error::PollTimeout {
                    url: url.to_owned(),
                    timeout,
                }),
            },

            _ = cancel.cancelled() => Err(Error::PollCancelled {
                url: url.to_owned(),
            }),
        }
    }

    async fn poll_until_settled(&self, url: &str) -> Result<AcmeResource> {
        loop {
            let challenge = self.fetch(url).await?;

            let status = challenge
                .status_field()
                .and_then(ChallengeStatus::parse)
                .ok_or_else(|| Error::MalformedChallengeResponse {
                    url: url.to_owned(),
                })?;

            match status {
                ChallengeStatus::Valid => return Ok(challenge),

                ChallengeStatus::Invalid => {
                    let problem = challenge
                        .body
                        .get("error")
                        .and_then(|err| serde_json::from_value::<Problem>(err.clone()).ok());

                    return Err(Error::ChallengeInvalid {
                        url: url.to_owned(),
                        problem,
                    });
                }

                ChallengeStatus::Pending | ChallengeStatus::Processing => {
                    let interval = self.config().poll_interval;
                    log::debug!("Challenge is {status:?}, checking again in {interval:?}");
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    /// Deactivates the authorization at `url`.
    pub async fn deactivate_authorization(&self, url: &str) -> Result<AcmeResource> {
        self.call(url, "authz", &Deactivation::default()).await
    }

    /// Revokes a certificate given as hex-encoded DER.
    ///
    /// Whitespace in `der_hex` is ignored. The certificate is sent base64url encoded.
    pub async fn revoke_certificate(
        &self,
        der_hex: &str,
        reason: RevocationReason,
    ) -> Result<AcmeResource> {
        let der = hex::decode(der_hex.split_whitespace().collect::<String>())?;

        let reason = match reason {
            // > the reason code CRL entry extension SHOULD be absent instead of
            // > using the unspecified (0) reasonCode value
            // see <https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1>
            RevocationReason::Unspecified => None,

            reason => Some(reason as usize),
        };

        let dir = self.directory().await?;
        let url = dir.url(Endpoint::RevokeCert)?;

        let revocation = Revocation::from_der(&der, reason);
        self.call(url, Endpoint::RevokeCert.legacy_name(), &revocation)
            .await
    }

    /// Key authorization for `token`, the body an `http-01` challenge serves.
    pub fn key_authorization(&self, token: &str) -> String {
        self.key().key_authorization(token)
    }

    /// Value of the `_acme-challenge` TXT record for a `dns-01` challenge with `token`.
    pub fn dns_key_authorization(&self, token: &str) -> String {
        self.key().dns_key_authorization(token)
    }
}

/// Enumeration of reasons for revocation.
///
/// The reason codes are taken from [RFC 5280 §5.3.1].
///
/// [RFC 5280 §5.3.1]: https://tools.ietf.org/html/rfc5280#section-5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevocationReason {
    #[default]
    Unspecified = 0,
    KeyCompromise = 1,
    CACompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    // value 7 is not used
    RemoveFromCRL = 8,
    PrivilegeWithdrawn = 9,
    AACompromise = 10,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::prelude::*;
    use tokio_util::sync::CancellationToken;

    use super::RevocationReason;
    use crate::{
        error::ErrorKind,
        test::{with_ca, CaBehavior, EC_JWK, RSA_JWK},
        Dialect,
    };

    const POLL_TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_new_order_sequence() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);

        let order = client
            .new_order(["acme-test.example.com", "www.example.com", "acme-test.example.com"])
            .await
            .unwrap();
        assert_eq!(order.status, 201);
        assert_eq!(
            order.location.as_deref(),
            Some(format!("{}/acme/order/1", server.url).as_str())
        );
        assert_eq!(order.status_field(), Some("pending"));

        let api_order = order.json::<crate::api::Order>().unwrap();
        assert_eq!(
            api_order.domains(),
            ["acme-test.example.com", "www.example.com"]
        );

        let requests = server.requests();
        let calls = requests
            .iter()
            .map(|req| (req.method.as_str(), req.path.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            calls,
            [
                ("GET", "/directory"),
                ("HEAD", "/acme/new-nonce"),
                ("POST", "/acme/new-acct"),
                ("POST", "/acme/new-order"),
            ]
        );

        // the account lookup is the only request carrying the JWK
        assert!(requests[2].protected().get("jwk").is_some());
        let protected = requests[3].protected();
        assert!(protected.get("jwk").is_none());
        assert_eq!(
            protected["kid"],
            format!("{}/acme/acct/123", server.url).as_str()
        );
        assert_eq!(
            protected["url"],
            format!("{}/acme/new-order", server.url).as_str()
        );

        // each signed request used its own nonce
        assert_ne!(requests[2].protected()["nonce"], protected["nonce"]);
    }

    #[tokio::test]
    async fn test_respond_and_poll() {
        let server = with_ca(CaBehavior::default());
        let client = server
            .client(EC_JWK, Dialect::V2)
            .registering_new_account();
        let url = format!("{}/acme/chall/eventually-valid", server.url);

        let res = client.respond_to_challenge(&url).await.unwrap();
        assert_eq!(res.status_field(), Some("processing"));
        assert_eq!(server.requests().last().unwrap().payload(), serde_json::json!({}));

        let res = client.poll_challenge(&url, POLL_TIMEOUT).await.unwrap();
        assert_eq!(res.status_field(), Some("valid"));

        // POST-as-GET with an empty payload
        let last = server.requests().last().unwrap().clone();
        assert_eq!(last.method, "POST");
        assert_eq!(last.raw_payload(), Some(""));
        assert!(last.protected().get("kid").is_some());
    }

    #[tokio::test]
    async fn test_poll_invalid() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);
        let url = format!("{}/acme/chall/invalid", server.url);

        let err = client.poll_challenge(&url, POLL_TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChallengeInvalid);

        let crate::Error::ChallengeInvalid { problem, .. } = err else {
            panic!("expected invalid challenge");
        };
        let problem = problem.unwrap();
        assert_eq!(problem._type, "urn:ietf:params:acme:error:unauthorized");
        assert_eq!(problem.detail.as_deref(), Some("Invalid response from web server"));
    }

    #[tokio::test]
    async fn test_poll_malformed() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);

        for name in ["bogus", "no-status"] {
            let url = format!("{}/acme/chall/{name}", server.url);
            let err = client.poll_challenge(&url, POLL_TIMEOUT).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedChallengeResponse);
            assert_eq!(err.url(), Some(url.as_str()));
        }
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);
        let url = format!("{}/acme/chall/stuck", server.url);

        let err = client
            .poll_challenge(&url, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PollTimeout);
    }

    #[tokio::test]
    async fn test_poll_cancelled() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);
        let url = format!("{}/acme/chall/stuck", server.url);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = client
            .poll_challenge_with_cancel(&url, POLL_TIMEOUT, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PollCancelled);
    }

    #[tokio::test]
    async fn test_deactivate_authorization() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(RSA_JWK, Dialect::V2);
        let url = format!("{}/acme/authz/1", server.url);

        let res = client.deactivate_authorization(&url).await.unwrap();
        assert_eq!(res.status_field(), Some("deactivated"));
        assert_eq!(
            server.requests().last().unwrap().payload(),
            serde_json::json!({ "status": "deactivated" })
        );
    }

    #[tokio::test]
    async fn test_revoke_certificate() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);

        let res = client
            .revoke_certificate("30 82 01 0a\n02", RevocationReason::Unspecified)
            .await
            .unwrap();
        assert_eq!(res.status, 200);

        let payload = server.requests().last().unwrap().payload();
        assert_eq!(
            payload["certificate"],
            BASE64_URL_SAFE_NO_PAD.encode([0x30, 0x82, 0x01, 0x0a, 0x02])
        );
        assert!(payload.get("reason").is_none());

        client
            .revoke_certificate("3082010a02", RevocationReason::KeyCompromise)
            .await
            .unwrap();
        let payload = server.requests().last().unwrap().payload();
        assert_eq!(payload["reason"], 1);
    }

    #[tokio::test]
    async fn test_revoke_bad_hex() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);

        let err = client
            .revoke_certificate("not hex", RevocationReason::Superseded)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCertificate);
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_v1_flow() {
        let server = with_ca(CaBehavior::v1());
        let client = server.client(EC_JWK, Dialect::V1);
        let url = format!("{}/acme/chall/eventually-valid", server.url);

        let res = client.respond_to_challenge(&url).await.unwrap();
        assert_eq!(res.status_field(), Some("processing"));

        let requests = server.requests();
        let calls = requests
            .iter()
            .map(|req| (req.method.as_str(), req.path.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            calls,
            [
                ("GET", "/acme/chall/eventually-valid"),
                ("GET", "/directory"),
                ("POST", "/acme/chall/eventually-valid"),
            ]
        );

        let response = requests.last().unwrap();
        assert_eq!(response.content_type, None);
        assert!(response.protected().get("jwk").is_some());
        assert!(response.protected().get("kid").is_none());

        let payload = response.payload();
        assert_eq!(payload["resource"], "challenge");
        assert_eq!(payload["type"], "http-01");
        assert_eq!(
            payload["keyAuthorization"],
            client.key_authorization("tok-eventually-valid").as_str()
        );

        // v1 polls with unauthenticated GETs
        let res = client.poll_challenge(&url, POLL_TIMEOUT).await.unwrap();
        assert_eq!(res.status_field(), Some("valid"));
        assert_eq!(server.requests().last().unwrap().method, "GET");
    }

    #[tokio::test]
    async fn test_v1_revoke_is_tagged() {
        let server = with_ca(CaBehavior::v1());
        let client = server.client(RSA_JWK, Dialect::V1);

        client
            .revoke_certificate("3082", RevocationReason::Unspecified)
            .await
            .unwrap();

        let revoke = server.requests().last().unwrap().clone();
        assert_eq!(revoke.path, "/acme/revoke-cert");
        assert_eq!(revoke.payload()["resource"], "revoke-cert");
        assert!(revoke.protected().get("jwk").is_some());
    }

    #[tokio::test]
    async fn test_v1_refills_nonce_from_directory() {
        let server = with_ca(CaBehavior::v1());
        let client = server.client(EC_JWK, Dialect::V1);

        client.directory().await.unwrap();
        while client.nonce_pool().pop().is_some() {}
        assert_eq!(client.nonce_pool().len(), 0);

        client
            .revoke_certificate("3082", RevocationReason::KeyCompromise)
            .await
            .unwrap();

        let requests = server.requests();
        let calls = requests
            .iter()
            .map(|req| (req.method.as_str(), req.path.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            calls,
            [
                ("GET", "/directory"),
                ("GET", "/directory"),
                ("POST", "/acme/revoke-cert"),
            ]
        );

        // the refilled nonce is the one the CA just issued
        let revoke = requests.last().unwrap();
        assert_eq!(revoke.protected()["nonce"], "nonce-2");
        assert_eq!(revoke.payload()["reason"], 1);
    }

    #[test]
    fn test_key_authorization() {
        let client = crate::test::client_for("ca.invalid", EC_JWK, Dialect::V2);
        assert_eq!(
            client.key_authorization("abc"),
            format!("abc.{}", crate::test::EC_THUMBPRINT)
        );
        assert_eq!(
            client.dns_key_authorization("abc"),
            "9FJKbUdBsEffOQy7Vc8nZStRGnr9UijtMoE5t4Y17dw"
        );
    }
}
