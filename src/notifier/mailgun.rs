//! Mailgun HTTP API mailer.

use async_trait::async_trait;
use std::time::Duration;

use super::{EmailMessage, Mailer};
use crate::config::MailConfig;
use crate::error::{IntakeError, Result};

#[derive(Clone)]
pub struct MailgunMailer {
    client: reqwest::Client,
    base_url: String,
    domain: String,
    api_key: String,
    timeout: Duration,
}

impl MailgunMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            domain: config.domain.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v3/{}/messages", self.base_url, self.domain)
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    #[tracing::instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let url = self.messages_url();
        tracing::debug!(url = %url, "Posting message to Mailgun");

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .timeout(self.timeout)
            .form(&[
                ("from", message.from.as_str()),
                ("to", message.to.as_str()),
                ("subject", message.subject.as_str()),
                ("text", message.text.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntakeError::Mail(format!(
                "mailgun returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> MailConfig {
        MailConfig {
            api_key: "key-123".to_string(),
            domain: "mg.example.com".to_string(),
            base_url,
            sender_name: "Submissions".to_string(),
            timeout_ms: 2000,
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            from: "Submissions <noreply@mg.example.com>".to_string(),
            to: "a@b.com".to_string(),
            subject: "Submission Status".to_string(),
            text: "Hey,\n\n1024 bytes".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mg.example.com/messages"))
            .and(header_exists("authorization"))
            .and(body_string_contains("subject=Submission+Status"))
            .and(body_string_contains("to=a%40b.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"message":"Queued"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = MailgunMailer::new(&config(format!("{}/", server.uri())));
        mailer.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejected_by_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let mailer = MailgunMailer::new(&config(server.uri()));
        let err = mailer.send(&message()).await.unwrap_err();

        match err {
            IntakeError::Mail(detail) => assert_eq!(detail, "mailgun returned 401: Forbidden"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_transport_error() {
        let mailer = MailgunMailer::new(&config("http://127.0.0.1:9".to_string()));
        let err = mailer.send(&message()).await.unwrap_err();
        assert!(matches!(err, IntakeError::HttpClient(_)));
    }
}
