//! One-shot HTTP execution of composed operations.

use std::time::Duration;

use http::HeaderMap;
use url::Url;

use crate::error::HttpError;
use crate::graphql;
use crate::select::Operation;
use crate::select::Selection;
use crate::select::compose;

/// The decoded outcome of a successful execution: the typed value plus
/// any GraphQL-level errors the server attached beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<R> {
    pub data: R,
    pub errors: Vec<graphql::Error>,
}

/// Executes one operation per call against a fixed endpoint.
///
/// Each call owns its request/response pair end to end: there is no
/// shared mutable state between concurrent in-flight calls, no retrying,
/// and no partial result. A call suspends at the network exchange and
/// resumes exactly once with a [`Reply`] or an [`HttpError`].
#[derive(Clone)]
pub struct Client {
    endpoint: String,
    headers: HeaderMap,
    timeout: Option<Duration>,
    http: reqwest::Client,
}

#[buildstructor::buildstructor]
impl Client {
    /// Builder for a [`Client`]: `endpoint` is required; `headers` are
    /// attached to every request; `timeout` bounds one whole exchange.
    #[builder(visibility = "pub")]
    fn new(endpoint: String, headers: Option<HeaderMap>, timeout: Option<Duration>) -> Self {
        Self {
            endpoint,
            headers: headers.unwrap_or_default(),
            timeout,
            http: reqwest::Client::new(),
        }
    }
}

impl Client {
    /// Executes `selection` as a query.
    pub async fn query<R: 'static, T: 'static>(
        &self,
        selection: &Selection<R, T>,
    ) -> Result<Reply<R>, HttpError> {
        self.execute(Operation::Query, None, selection).await
    }

    /// Executes `selection` as a mutation.
    pub async fn mutate<R: 'static, T: 'static>(
        &self,
        selection: &Selection<R, T>,
    ) -> Result<Reply<R>, HttpError> {
        self.execute(Operation::Mutation, None, selection).await
    }

    /// Executes one operation: compose, POST, check status, decode.
    ///
    /// A malformed endpoint fails with [`HttpError::BadUrl`] before any
    /// I/O is attempted. A non-success status fails with
    /// [`HttpError::BadStatus`] without a decode attempt.
    pub async fn execute<R: 'static, T: 'static>(
        &self,
        operation: Operation,
        operation_name: Option<&str>,
        selection: &Selection<R, T>,
    ) -> Result<Reply<R>, HttpError> {
        let url = Url::parse(&self.endpoint).map_err(|err| HttpError::BadUrl {
            reason: err.to_string(),
        })?;
        let request = compose(operation, operation_name, selection);
        tracing::debug!(url = %url, operation_name, "sending graphql operation");

        let mut builder = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(&request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::BadStatus {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(transport_error)?;
        let envelope: graphql::Response =
            serde_json::from_slice(&body).map_err(|err| HttpError::BadPayload {
                reason: format!("response is not a GraphQL envelope: {err}"),
            })?;
        decode_reply(selection, envelope)
    }
}

fn transport_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Network {
            reason: err.to_string(),
        }
    }
}

/// Decodes one response envelope through the selection that requested it.
/// Shared by the one-shot executor and the stream subscriber.
///
/// A `null` (or absent) top-level `data` means the whole request failed
/// and its `errors` explain why, so it is reported as [`HttpError::BadPayload`]
/// carrying those messages. Nullability of a field belongs inside the
/// selection (`Selection::nullable` on the field), not at the envelope.
pub(crate) fn decode_reply<R: 'static, T: 'static>(
    selection: &Selection<R, T>,
    envelope: graphql::Response,
) -> Result<Reply<R>, HttpError> {
    let data = match envelope.data {
        Some(data) if !data.is_null() => data,
        _ => {
            let messages: Vec<&str> = envelope
                .errors
                .iter()
                .map(|error| error.message.as_str())
                .collect();
            let reason = if messages.is_empty() {
                "response carries no data".to_owned()
            } else {
                format!("response carries no data: {}", messages.join("; "))
            };
            return Err(HttpError::BadPayload { reason });
        }
    };
    let decoded = selection.decode(&data)?;
    Ok(Reply {
        data: decoded,
        errors: envelope.errors,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_partial_json;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    use super::*;
    use crate::select::Fields;

    struct Query;

    fn hello_selection() -> Selection<String, Query> {
        Selection::new(|fields: &mut Fields<Query>| fields.leaf("hello", vec![]))
    }

    #[test(tokio::test)]
    async fn malformed_endpoint_is_bad_url_with_zero_io() {
        let client = Client::builder().endpoint("not a url").build();
        let err = client.query(&hello_selection()).await.unwrap_err();
        assert!(matches!(err, HttpError::BadUrl { .. }));
    }

    #[test(tokio::test)]
    async fn http_500_is_bad_status_and_never_a_decode_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("not even json"))
            .mount(&server)
            .await;

        let client = Client::builder().endpoint(server.uri()).build();
        let err = client.query(&hello_selection()).await.unwrap_err();
        assert_eq!(err, HttpError::BadStatus { status: 500 });
    }

    #[test(tokio::test)]
    async fn successful_query_round_trips() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({
                "query": "query {\n  hello_e3b0c442: hello\n}"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"hello_e3b0c442": "world"}
            })))
            .mount(&server)
            .await;

        let client = Client::builder().endpoint(server.uri()).build();
        let reply = client.query(&hello_selection()).await.unwrap();
        assert_eq!(reply.data, "world");
        assert!(reply.errors.is_empty());
    }

    #[test(tokio::test)]
    async fn graphql_errors_are_surfaced_beside_the_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"hello_e3b0c442": "world"},
                "errors": [{"message": "deprecated field"}]
            })))
            .mount(&server)
            .await;

        let client = Client::builder().endpoint(server.uri()).build();
        let reply = client.query(&hello_selection()).await.unwrap();
        assert_eq!(reply.data, "world");
        assert_eq!(reply.errors[0].message, "deprecated field");
    }

    #[test(tokio::test)]
    async fn data_free_response_is_bad_payload_with_error_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "boom"}]
            })))
            .mount(&server)
            .await;

        let client = Client::builder().endpoint(server.uri()).build();
        let err = client.query(&hello_selection()).await.unwrap_err();
        match err {
            HttpError::BadPayload { reason } => assert!(reason.contains("boom")),
            other => panic!("expected BadPayload, got {other:?}"),
        }
    }

    #[test(tokio::test)]
    async fn null_data_is_a_failed_request_even_for_nullable_selections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null
            })))
            .mount(&server)
            .await;

        // Envelope-level null is a request failure; field-level null is
        // what `nullable` models.
        let client = Client::builder().endpoint(server.uri()).build();
        let err = client
            .query(&hello_selection().nullable())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::BadPayload { .. }));
    }

    #[test(tokio::test)]
    async fn non_envelope_body_is_bad_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1, 2, 3]"))
            .mount(&server)
            .await;

        let client = Client::builder().endpoint(server.uri()).build();
        let err = client.query(&hello_selection()).await.unwrap_err();
        assert!(matches!(err, HttpError::BadPayload { .. }));
    }

    #[test(tokio::test)]
    async fn slow_server_is_a_timeout_not_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"hello_e3b0c442": "late"}}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = Client::builder()
            .endpoint(server.uri())
            .timeout(Duration::from_millis(100))
            .build();
        let err = client.query(&hello_selection()).await.unwrap_err();
        assert_eq!(err, HttpError::Timeout);
    }

    #[test(tokio::test)]
    async fn unreachable_endpoint_is_a_network_error() {
        // Port 1 is reserved and refuses connections.
        let client = Client::builder()
            .endpoint("http://127.0.0.1:1/")
            .timeout(Duration::from_secs(2))
            .build();
        let err = client.query(&hello_selection()).await.unwrap_err();
        assert!(matches!(
            err,
            HttpError::Network { .. } | HttpError::Timeout
        ));
    }
}
