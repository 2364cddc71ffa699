use crate::{
    api::{self, Endpoint},
    error::{Error, Result},
    req::{req_handle_error, req_header, req_is_conflict},
    Client,
};

impl Client {
    /// Resolves the account URL bound to the client's key, used as `kid` from then on.
    ///
    /// Posts to `newAccount` with the JWK embedded, asking the CA to only look up an existing
    /// account unless `register_new` is set. A `200`, `201` or `409` answer carrying a `Location`
    /// header all identify the account. The URL is memoized, so only the first call talks to the
    /// CA.
    pub async fn ensure_account(&self, register_new: bool) -> Result<String> {
        if let Some(account_id) = self.account_id() {
            return Ok(account_id);
        }

        let dir = self.directory().await?;
        let url = dir.url(Endpoint::NewAccount)?;

        let payload = api::Account::lookup_or_register(register_new);
        let res = self
            .send_signed(url, Endpoint::NewAccount.legacy_name(), &payload, None)
            .await?;

        let res = if req_is_conflict(&res) {
            log::debug!("Account for this key already exists");
            res
        } else {
            req_handle_error(url, res).await.map_err(|err| {
                if let Error::Server { problem, .. } = &err {
                    if problem.is_account_does_not_exist() {
                        log::warn!(
                            "No account is bound to this key at {}, register one first",
                            self.hostname()
                        );
                    }
                }
                err
            })?
        };

        let account_id = req_header(&res, "location").ok_or_else(|| {
            Error::MissingAccountLocation {
                url: url.to_owned(),
            }
        })?;
        log::debug!("Key ID is: {account_id}");

        let mut known = self.account_id.lock();
        Ok(known.get_or_insert(account_id).clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::ErrorKind,
        test::{with_ca, AccountMode, CaBehavior, EC_JWK, RSA_JWK},
        Dialect,
    };

    #[tokio::test]
    async fn test_lookup_existing_account() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(EC_JWK, Dialect::V2);

        let account_id = client.ensure_account(false).await.unwrap();
        assert_eq!(account_id, format!("{}/acme/acct/123", server.url));
        assert_eq!(client.account_id().as_deref(), Some(account_id.as_str()));

        let requests = server.requests();
        let new_acct = requests.last().unwrap();
        assert_eq!(new_acct.path, "/acme/new-acct");
        assert_eq!(
            new_acct.content_type.as_deref(),
            Some("application/jose+json")
        );

        let protected = new_acct.protected();
        assert!(protected.get("jwk").is_some());
        assert!(protected.get("kid").is_none());

        let payload = new_acct.payload();
        assert_eq!(payload["onlyReturnExisting"], true);
        assert_eq!(payload["termsOfServiceAgreed"], true);

        // memoized
        let count = server.requests().len();
        client.ensure_account(false).await.unwrap();
        assert_eq!(server.requests().len(), count);
    }

    #[tokio::test]
    async fn test_register_new_account() {
        let server = with_ca(CaBehavior::default());
        let client = server.client(RSA_JWK, Dialect::V2);

        client.ensure_account(true).await.unwrap();

        let payload = server.requests().last().unwrap().payload();
        assert!(payload.get("onlyReturnExisting").is_none());
        assert_eq!(payload["termsOfServiceAgreed"], true);
    }

    #[tokio::test]
    async fn test_conflict_is_existing_account() {
        let server = with_ca(CaBehavior {
            account: AccountMode::Conflict,
            ..Default::default()
        });
        let client = server.client(EC_JWK, Dialect::V2);

        let account_id = client.ensure_account(true).await.unwrap();
        assert_eq!(account_id, format!("{}/acme/acct/123", server.url));
    }

    #[tokio::test]
    async fn test_missing_location() {
        let server = with_ca(CaBehavior {
            account: AccountMode::NoLocation,
            ..Default::default()
        });
        let client = server.client(EC_JWK, Dialect::V2);

        let err = client.ensure_account(false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingAccountLocation);
        assert_eq!(err.url(), Some(format!("{}/acme/new-acct", server.url).as_str()));
        assert!(client.account_id().is_none());
    }

    #[tokio::test]
    async fn test_account_does_not_exist() {
        let server = with_ca(CaBehavior {
            account: AccountMode::DoesNotExist,
            ..Default::default()
        });
        let client = server.client(EC_JWK, Dialect::V2);

        let err = client.ensure_account(false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerProblem);

        let crate::Error::Server { status, problem, .. } = err else {
            panic!("expected server problem");
        };
        assert_eq!(status, 400);
        assert!(problem.is_account_does_not_exist());
    }

    #[tokio::test]
    async fn test_v1_registration_is_tagged() {
        let server = with_ca(CaBehavior::v1());
        let client = server.client(EC_JWK, Dialect::V1);

        let account_id = client.ensure_account(true).await.unwrap();
        assert_eq!(account_id, format!("{}/acme/acct/123", server.url));

        let new_reg = server.requests().last().unwrap().clone();
        assert_eq!(new_reg.path, "/acme/new-reg");
        assert_eq!(new_reg.content_type, None);
        assert_eq!(new_reg.payload()["resource"], "new-reg");
    }
}
