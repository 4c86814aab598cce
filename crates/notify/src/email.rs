//! SMTP email notifier via `lettre` with TLS support.
//!
//! Delivers alerts as plain-text emails. Supports implicit TLS
//! (`use_tls`), STARTTLS (`use_starttls`) and unencrypted relays.

use lettre::{
    message::Mailbox,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use ponghub_core::EmailConfig;

use crate::traits::{Notifier, NotifyError};

/// Sends alerts as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    /// Async SMTP transport for sending emails.
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    reply_to: Option<Mailbox>,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("{addr:?}: {e}")))
}

/// Port used when the config leaves `smtp_port` at 0.
fn default_port(config: &EmailConfig) -> u16 {
    match (config.use_tls, config.use_starttls) {
        (true, _) => 465,
        (false, true) => 587,
        (false, false) => 25,
    }
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from SMTP configuration.
    ///
    /// SMTP credentials are resolved from the `SMTP_USERNAME` and `SMTP_PASSWORD`
    /// environment variables. If both are set, they are passed to the transport;
    /// otherwise the connection is unauthenticated.
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        if config.smtp_host.trim().is_empty() {
            return Err(NotifyError::Config("smtp_host is required".to_string()));
        }

        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }
        let reply_to = config
            .reply_to
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(parse_mailbox)
            .transpose()?;

        let host = config.smtp_host.trim();
        let port = match config.smtp_port {
            0 => default_port(config),
            p => p,
        };

        let tls = if config.use_tls || config.use_starttls {
            let params = TlsParameters::builder(host.to_string())
                .dangerous_accept_invalid_certs(config.skip_verify)
                .build()
                .map_err(|e| NotifyError::Config(e.to_string()))?;
            if config.use_tls {
                Tls::Wrapper(params)
            } else {
                Tls::Required(params)
            }
        } else {
            Tls::None
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .tls(tls);

        // Attach credentials from environment if available.
        if let (Ok(username), Ok(password)) =
            (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            reply_to,
        })
    }

    fn build_message(&self, title: &str, message: &str) -> Result<Message, NotifyError> {
        let mut message_builder = Message::builder().from(self.from.clone());

        for recipient in &self.to {
            message_builder = message_builder.to(recipient.clone());
        }
        if let Some(reply_to) = &self.reply_to {
            message_builder = message_builder.reply_to(reply_to.clone());
        }

        message_builder
            .subject(title)
            .body(message.to_string())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    /// Send an alert email to all configured recipients.
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let email = self.build_message(title, message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "email",
            subject = %title,
            recipients = self.to.len(),
            "notification delivered"
        );

        Ok(())
    }

    /// Returns `"email"`.
    fn channel_name(&self) -> &str {
        "email"
    }
}
