use reqwest::{header, Client, Response, StatusCode};

use crate::{
    api::Problem,
    error::{Error, Result},
};

pub(crate) async fn req_get(http: &Client, url: &str) -> Result<Response> {
    log::trace!("GET {url}");
    http.get(url)
        .send()
        .await
        .map_err(|err| Error::transport(url, err))
}

pub(crate) async fn req_head(http: &Client, url: &str) -> Result<Response> {
    log::trace!("HEAD {url}");
    http.head(url)
        .send()
        .await
        .map_err(|err| Error::transport(url, err))
}

/// POST a JWS body, with `content_type` or, when `None`, without any content-type header.
pub(crate) async fn req_post(
    http: &Client,
    url: &str,
    body: String,
    content_type: Option<&str>,
) -> Result<Response> {
    log::trace!("POST {url} {body}");

    let mut req = http.post(url).body(body);
    if let Some(content_type) = content_type {
        req = req.header(header::CONTENT_TYPE, content_type);
    }

    req.send().await.map_err(|err| Error::transport(url, err))
}

/// Turns non-2xx responses into [`Error::Server`], passing successful ones through.
pub(crate) async fn req_handle_error(url: &str, res: Response) -> Result<Response> {
    // ok responses pass through
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status();
    let is_problem = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/problem+json"));

    let body = req_safe_read_body(res).await;

    let problem = if is_problem {
        // if we were sent a problem+json, deserialize it
        serde_json::from_str(&body).unwrap_or_else(|err| Problem {
            _type: "problemJsonFail".to_owned(),
            detail: Some(format!(
                "Failed to deserialize application/problem+json ({err}) body: {body}"
            )),
            ..Default::default()
        })
    } else {
        // some other problem
        Problem {
            _type: "httpReqError".to_owned(),
            detail: Some(format!("{status} body: {body}")),
            ..Default::default()
        }
    };

    if problem.is_bad_nonce() {
        log::debug!("CA rejected the nonce sent to {url}");
    }

    Err(Error::Server {
        url: url.to_owned(),
        status: status.as_u16(),
        problem,
    })
}

pub(crate) fn req_header(res: &Response, name: &str) -> Option<String> {
    res.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

pub(crate) fn req_is_conflict(res: &Response) -> bool {
    res.status() == StatusCode::CONFLICT
}

pub(crate) async fn req_safe_read_body(res: Response) -> String {
    // letsencrypt sometimes closes the TLS abruptly causing io error
    // even though we did capture the body.
    res.text().await.unwrap_or_default()
}

/// Reads a JSON body, reporting malformed JSON against `url`.
pub(crate) async fn req_json<T: serde::de::DeserializeOwned>(url: &str, res: Response) -> Result<T> {
    let body = res.text().await.map_err(|err| Error::transport(url, err))?;
    log::debug!("{body}");

    serde_json::from_str(&body).map_err(|source| Error::Json {
        url: url.to_owned(),
        source,
    })
}
