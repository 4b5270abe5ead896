//! SMTP delivery through lettre's async transport.

use super::{EmailError, EmailProvider, NotificationEmailContent};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        AsyncSmtpTransportBuilder,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::warn;

const SMTPS_PORT: u16 = 465;

/// How the connection to the relay is secured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Security {
    Plain,
    StartTls,
    /// SMTPS: TLS from the first byte.
    Implicit,
}

impl Security {
    fn choose(use_tls: bool, port: u16) -> Self {
        match (use_tls, port) {
            (false, _) => Security::Plain,
            (true, SMTPS_PORT) => Security::Implicit,
            (true, _) => Security::StartTls,
        }
    }
}

/// Login credentials, when both halves are configured.
pub fn credentials(username: Option<&str>, password: Option<&str>) -> Option<Credentials> {
    match (username, password) {
        (Some(user), Some(pass)) => Some(Credentials::new(user.to_string(), pass.to_string())),
        (None, None) => None,
        _ => {
            warn!("only one of SMTP_USERNAME and SMTP_PASSWORD is set, connecting without auth");
            None
        }
    }
}

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<Credentials>,
        use_tls: bool,
    ) -> Result<Self, EmailError> {
        let mut builder = transport_builder(host, port, Security::choose(use_tls, port))?;
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn transport_builder(
    host: &str,
    port: u16,
    security: Security,
) -> Result<AsyncSmtpTransportBuilder, EmailError> {
    let relay_error = |e: lettre::transport::smtp::Error| {
        EmailError::InvalidConfig(format!("SMTP relay {}: {}", host, e))
    };
    let tls = || {
        TlsParameters::new(host.to_string())
            .map_err(|e| EmailError::InvalidConfig(format!("TLS parameters for {}: {}", host, e)))
    };

    let builder = match security {
        Security::Plain => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(relay_error)?
            .tls(Tls::Required(tls()?)),
        Security::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(relay_error)?
            .tls(Tls::Wrapper(tls()?)),
    };
    Ok(builder.port(port))
}

fn mailbox(address: &str, name: Option<&str>, role: &str) -> Result<Mailbox, EmailError> {
    let raw = match name {
        Some(name) => format!("{} <{}>", name, address),
        None => address.to_string(),
    };
    raw.parse()
        .map_err(|e| EmailError::InvalidConfig(format!("Invalid {} address: {}", role, e)))
}

fn build_message(
    to: &str,
    content: &NotificationEmailContent,
    from_address: &str,
    from_name: Option<&str>,
) -> Result<Message, EmailError> {
    let body = MultiPart::alternative()
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(content.text.clone()),
        )
        .singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(content.html.clone()),
        );

    Message::builder()
        .from(mailbox(from_address, from_name, "from")?)
        .to(mailbox(to, None, "recipient")?)
        .subject(content.subject.clone())
        .multipart(body)
        .map_err(|e| EmailError::SendFailed(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send_email(
        &self,
        to: &str,
        content: &NotificationEmailContent,
        from_address: &str,
        from_name: Option<&str>,
    ) -> Result<(), EmailError> {
        let message = build_message(to, content, from_address, from_name)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| EmailError::SendFailed(e.to_string()))
    }
}
