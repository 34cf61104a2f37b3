// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

extern crate azure_arm_lro as lro;

#[cfg(test)]
mod fake_service;

#[cfg(test)]
mod tests {
    use super::fake_service::*;
    use gax::error::FailureState;
    use gax::http_client::{HttpClient, HttpRequest, ReqwestClient};
    use gax::options::RequestOptions;
    use gax::polling_error_policy::{ArmStrict, PollingErrorPolicyExt};
    use http::{Method, StatusCode};
    use httptest::{Expectation, Server, all_of, matchers::*, responders::*};
    use lro::{OperationDescriptor, Phase, PollOutcome, PollState, PollTarget, Poller};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    type Result<T> = anyhow::Result<T>;

    fn responses(list: Vec<String>) -> impl Responder {
        cycle(
            list.into_iter()
                .map(|body| Box::new(status_code(200).body(body)) as Box<dyn Responder>)
                .collect(),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_operation_until_done() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", VAULT_PATH),
                request::query(url_decoded(contains(("api-version", API_VERSION)))),
                request::body(json_decoded(eq(json!({"location": "eastus"})))),
            ])
            .respond_with(
                status_code(201)
                    .insert_header("azure-asyncoperation", operation_url(&server))
                    .body(vault("Creating")),
            ),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", OPERATION_PATH),
                request::query(url_decoded(contains(("api-version", API_VERSION)))),
            ])
            .times(4)
            .respond_with(responses(vec![
                operation_status("InProgress"),
                operation_status("InProgress"),
                operation_status("InProgress"),
                operation_status("Succeeded"),
            ])),
        );
        // The resource URL is never polled.
        server.expect(
            Expectation::matching(request::method_path("GET", VAULT_PATH))
                .times(0)
                .respond_with(status_code(200).body(vault("Succeeded"))),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        assert_eq!(operation.phase(), Phase::Initiated);
        assert_eq!(
            operation.polling_request().target(),
            PollTarget::AsyncOperation
        );

        let got = operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(got.name, "op-1");
        assert_eq!(got.status, "Succeeded");
        assert_eq!(operation.state(), PollState::Succeeded);
        assert_eq!(operation.polling_state().attempt_count, 4);

        // Completed operations answer from the cached outcome.
        operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(operation.poll_once().await?, PollState::Succeeded);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resource_polling() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .respond_with(status_code(201).body(vault("Creating"))),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", VAULT_PATH),
                request::query(url_decoded(contains(("api-version", API_VERSION)))),
                request::headers(contains(("x-ms-client-request-id", "req-1"))),
            ])
            .times(2)
            .respond_with(responses(vec![vault("Updating"), vault("Succeeded")])),
        );

        let client = client(&server)?;
        let mut options = RequestOptions::default();
        options.set_header(
            http::HeaderName::from_static("x-ms-client-request-id"),
            http::HeaderValue::from_static("req-1"),
        );
        let mut operation = client
            .start::<_, Vault>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                options,
            )
            .await?;
        assert_eq!(operation.polling_request().target(), PollTarget::Resource);
        let got = operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(got.name, "v1");
        assert_eq!(got.properties.provisioning_state, "Succeeded");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completes_without_polling() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .respond_with(status_code(200).body(vault("Succeeded"))),
        );
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(0)
                .respond_with(status_code(500)),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<_, Vault>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        assert_eq!(operation.phase(), Phase::Succeeded);
        assert_eq!(
            operation.model().map(|v| v.name.as_str()),
            Some("v1")
        );
        let got = operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(got.properties.provisioning_state, "Succeeded");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn operation_failed() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH)).respond_with(
                status_code(201)
                    .insert_header("azure-asyncoperation", operation_url(&server))
                    .body(vault("Creating")),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", OPERATION_PATH))
                .times(1)
                .respond_with(
                    status_code(200)
                        .insert_header("x-ms-request-id", "req-failed")
                        .body(
                            json!({
                                "name": "op-1",
                                "status": "Failed",
                                "error": {"code": "VaultAlreadyExists", "message": "name is taken"},
                            })
                            .to_string(),
                        ),
                ),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        let err = operation
            .poll_until_done(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_operation_failed(), "{err:?}");
        let failure = err.operation_failure().expect("has failure details");
        assert_eq!(failure.state, FailureState::Failed);
        assert_eq!(
            failure.headers.get("x-ms-request-id"),
            Some(&http::HeaderValue::from_static("req-failed"))
        );
        assert_eq!(
            err.cloud_error().map(|c| c.code.as_str()),
            Some("VaultAlreadyExists")
        );
        assert_eq!(operation.phase(), Phase::Failed);

        // No more requests once the operation failed.
        let err = operation
            .poll_until_done(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_operation_failed(), "{err:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unexpected_initial_status() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .times(1)
                .respond_with(
                    status_code(404).body(error("ResourceGroupNotFound", "rg-1 not found")),
                ),
        );
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(0)
                .respond_with(status_code(500)),
        );

        let client = client(&server)?;
        let err = client
            .start::<_, Vault>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_unexpected_status(), "{err:?}");
        assert_eq!(err.http_status_code(), Some(404));
        assert_eq!(
            err.cloud_error().map(|c| c.code.as_str()),
            Some("ResourceGroupNotFound")
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn put_accepted_with_async_operation() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .times(1)
                .respond_with(
                    status_code(202)
                        .insert_header("azure-asyncoperation", operation_url(&server)),
                ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", OPERATION_PATH))
                .times(2)
                .respond_with(responses(vec![
                    operation_status("Running"),
                    operation_status("Succeeded"),
                ])),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", VAULT_PATH))
                .times(0)
                .respond_with(status_code(200).body(vault("Succeeded"))),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        assert_eq!(operation.phase(), Phase::Initiated);
        assert_eq!(
            operation.polling_request().target(),
            PollTarget::AsyncOperation
        );

        let got = operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(got.status, "Succeeded");
        assert_eq!(operation.polling_state().attempt_count, 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn status_not_in_expected_set() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .times(1)
                .respond_with(status_code(204)),
        );

        let client = client(&server)?;
        let err = client
            .start::<_, Vault>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.is_unexpected_status(), "{err:?}");
        assert_eq!(err.http_status_code(), Some(204));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delete_with_location() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", VAULT_PATH)).respond_with(
                status_code(202)
                    .insert_header("location", location_url(&server))
                    .insert_header("retry-after", "0"),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", LOCATION_PATH))
                .times(2)
                .respond_with(cycle(vec![
                    Box::new(status_code(202)) as Box<dyn Responder>,
                    Box::new(status_code(204)),
                ])),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<(), ()>(
                &OperationDescriptor::delete(VAULT_TEMPLATE),
                VAULT_PARAMS,
                None,
                RequestOptions::default(),
            )
            .await?;
        assert_eq!(operation.polling_request().target(), PollTarget::Location);
        operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(operation.phase(), Phase::Succeeded);
        assert_eq!(operation.last_response().status, StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delete_resource_gone() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", VAULT_PATH))
                .respond_with(status_code(202)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", VAULT_PATH))
                .times(2)
                .respond_with(cycle(vec![
                    Box::new(status_code(200).body(vault("Deleting"))) as Box<dyn Responder>,
                    Box::new(status_code(404).body(error("ResourceNotFound", "gone"))),
                ])),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<(), Option<Vault>>(
                &OperationDescriptor::delete(VAULT_TEMPLATE),
                VAULT_PARAMS,
                None,
                RequestOptions::default(),
            )
            .await?;
        let got = operation
            .poll_until_done(&CancellationToken::new())
            .await?;
        assert_eq!(got, &None);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn poll_error_status_fails() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH)).respond_with(
                status_code(201)
                    .insert_header("azure-asyncoperation", operation_url(&server))
                    .body(vault("Creating")),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", OPERATION_PATH))
                .times(1)
                .respond_with(status_code(500).body(error("InternalServerError", "uh-oh"))),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        let err = operation
            .poll_until_done(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_operation_failed(), "{err:?}");
        assert_eq!(err.http_status_code(), Some(500));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_while_waiting() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH)).respond_with(
                status_code(201)
                    .insert_header("azure-asyncoperation", operation_url(&server))
                    .body(vault("Creating")),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", OPERATION_PATH))
                .times(1)
                .respond_with(
                    status_code(200)
                        .insert_header("retry-after", "60")
                        .body(operation_status("InProgress")),
                ),
        );

        let client = client(&server)?;
        let mut operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;

        let cancel = CancellationToken::new();
        let canceler = cancel.clone();
        let canceled_at = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceler.cancel();
            std::time::Instant::now()
        });
        let err = operation.poll_until_done(&cancel).await.unwrap_err();
        let returned_at = std::time::Instant::now();
        assert!(err.is_wait_canceled(), "{err:?}");
        // The service asked for a 60s wait, the loop returns as soon as the
        // token fires.
        let canceled_at = canceled_at.await?;
        let lag = returned_at.saturating_duration_since(canceled_at);
        assert!(lag < Duration::from_millis(250), "{lag:?}");
        assert_eq!(operation.phase(), Phase::Polling);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn polling_deadline() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH)).respond_with(
                status_code(201)
                    .insert_header("azure-asyncoperation", operation_url(&server))
                    .body(vault("Creating")),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", OPERATION_PATH))
                .times(1)
                .respond_with(
                    status_code(200)
                        .insert_header("retry-after", "60")
                        .body(operation_status("InProgress")),
                ),
        );

        let client = client(&server)?;
        let mut options = RequestOptions::default();
        options.set_polling_deadline(Duration::from_secs(10));
        let mut operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                options,
            )
            .await?;
        let err = operation
            .poll_until_done(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn initiating_request_retries() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .times(2)
                .respond_with(cycle(vec![
                    Box::new(status_code(503).body(error("ServiceUnavailable", "try-again")))
                        as Box<dyn Responder>,
                    Box::new(status_code(200).body(vault("Succeeded"))),
                ])),
        );

        let client = client(&server)?;
        let operation = client
            .start::<_, Vault>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        assert_eq!(operation.phase(), Phase::Succeeded);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn initiating_request_throttled() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH))
                .times(2)
                .respond_with(cycle(vec![
                    Box::new(
                        status_code(429)
                            .insert_header("retry-after", "1")
                            .body(error("TooManyRequests", "slow down")),
                    ) as Box<dyn Responder>,
                    Box::new(status_code(200).body(vault("Succeeded"))),
                ])),
        );

        // The client backs off for 1ms, the service asks for 1s.
        let client = client(&server)?;
        let start = std::time::Instant::now();
        let operation = client
            .start::<_, Vault>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        assert!(start.elapsed() >= Duration::from_secs(1), "{:?}", start.elapsed());
        assert_eq!(operation.phase(), Phase::Succeeded);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn non_idempotent_not_retried() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/regenerate"))
                .times(1)
                .respond_with(status_code(503).body(error("ServiceUnavailable", "try-again"))),
        );

        let client = client(&server)?;
        let err = client
            .start::<_, serde_json::Value>(
                &OperationDescriptor::post("/regenerate"),
                &[],
                Some(&json!({"keyName": "key1"})),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), Some(503));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn execute_synchronous() -> Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", VAULT_PATH),
                request::query(url_decoded(contains(("api-version", "2024-11-01")))),
            ])
            .respond_with(status_code(200).body(vault("Succeeded"))),
        );

        let client = client(&server)?;
        let mut options = RequestOptions::default();
        options.set_api_version("2024-11-01");
        let got = client
            .execute::<(), Vault>(
                &OperationDescriptor::get(VAULT_TEMPLATE),
                VAULT_PARAMS,
                None,
                options,
            )
            .await?;
        assert_eq!(got.name, "v1");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn poller_stream() -> Result<()> {
        use futures::StreamExt;
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", VAULT_PATH)).respond_with(
                status_code(201)
                    .insert_header("azure-asyncoperation", operation_url(&server))
                    .body(vault("Creating")),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", OPERATION_PATH))
                .times(2)
                .respond_with(responses(vec![
                    operation_status("InProgress"),
                    operation_status("Succeeded"),
                ])),
        );

        let client = client(&server)?;
        let operation = client
            .start::<_, OperationStatus>(
                &OperationDescriptor::put(VAULT_TEMPLATE),
                VAULT_PARAMS,
                Some(&json!({"location": "eastus"})),
                RequestOptions::default(),
            )
            .await?;
        let results = operation.into_poller().into_stream().collect::<Vec<_>>().await;
        assert_eq!(results.len(), 2, "{results:?}");
        assert!(
            matches!(&results[0], lro::PollingResult::InProgress(Some(r)) if r.status == StatusCode::OK),
            "{results:?}"
        );
        assert!(
            matches!(&results[1], lro::PollingResult::Completed(Ok(s)) if s.status == "Succeeded"),
            "{results:?}"
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn custom_purge_poller() -> Result<()> {
        const DELETED_PATH: &str =
            "/subscriptions/sub-1/providers/Microsoft.KeyVault/locations/eastus/deletedVaults/v1";
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", DELETED_PATH))
                .times(3)
                .respond_with(cycle(vec![
                    Box::new(status_code(200).body(vault("Purging"))) as Box<dyn Responder>,
                    Box::new(status_code(200).body(vault("Purging"))),
                    Box::new(status_code(404).body(error("ResourceNotFound", "purged"))),
                ])),
        );

        let client = Arc::new(ReqwestClient::new());
        let url = url::Url::parse(&server.url_str(DELETED_PATH))?;
        let poller = lro::new_custom_poller(
            Arc::new(ArmStrict.with_error_limit(3)),
            Arc::new(test_backoff()),
            move || {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client
                        .execute(HttpRequest::new(Method::GET, url), None)
                        .await?;
                    match response.status {
                        StatusCode::NOT_FOUND => Ok(PollOutcome::Succeeded(())),
                        s if s.is_success() => Ok(PollOutcome::InProgress),
                        _ => Err(response.into_error()),
                    }
                }
            },
        );
        poller.until_done(&CancellationToken::new()).await?;
        Ok(())
    }
}
