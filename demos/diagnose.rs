//! Walks an issuance against a CA step by step and prints each answer.
//!
//! ```sh
//! cargo run --example diagnose -- acme-staging-v02.api.letsencrypt.org example.org [key.jwk] [--respond]
//! ```
//!
//! Without a key file an account key is generated for the run.

use std::{env, fs, time::Duration};

use acme::{api, ClientConfig, ClientRegistry, MemoryKeyStore};
use eyre::eyre;

const POLL_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    let respond = match args.iter().position(|arg| arg == "--respond") {
        Some(idx) => {
            args.remove(idx);
            true
        }
        None => false,
    };

    let [hostname, domain, rest @ ..] = args.as_slice() else {
        return Err(eyre!("usage: diagnose <ca-hostname> <domain> [key.jwk] [--respond]"));
    };

    let registry = ClientRegistry::new(ClientConfig::default())?;
    let client = match rest.first() {
        Some(path) => registry.client(hostname, &fs::read_to_string(path)?)?,
        None => registry.anonymous_client(hostname, &MemoryKeyStore::new()),
    };

    println!("{} at {}", client.dialect(), client.directory_url());

    let dir = client.directory().await?;
    for (name, url) in dir.operations() {
        println!("  {name}: {url}");
    }

    let order = client.new_order([domain.as_str()]).await?;
    println!("order {} ({})", order.location.as_deref().unwrap_or("-"), order.status);
    println!("{:#}", order.body);

    let order = order.json::<api::Order>()?;

    for authz_url in &order.authorizations {
        let authz = client.fetch(authz_url).await?.json::<api::Authorization>()?;
        println!(
            "authorization {authz_url} for {} is {:?}",
            authz.identifier.value, authz.status
        );

        if let Some(chall) = authz.challenge("dns-01") {
            let token = chall.token.as_deref().unwrap_or_default();
            println!(
                "  dns-01: _acme-challenge.{} TXT {}",
                authz.identifier.value,
                client.dns_key_authorization(token)
            );
        }

        let Some(chall) = authz.challenge("http-01") else {
            continue;
        };
        let token = chall.token.as_deref().unwrap_or_default();
        println!(
            "  http-01: /.well-known/acme-challenge/{token} -> {}",
            client.key_authorization(token)
        );

        if respond {
            client.respond_to_challenge(&chall.url).await?;

            match client.poll_challenge(&chall.url, POLL_TIMEOUT).await {
                Ok(res) => println!("  challenge settled: {}", res.body),
                Err(err) => println!("  challenge failed [{}]: {err}", err.kind()),
            }
        }
    }

    Ok(())
}
