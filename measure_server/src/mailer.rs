//! E-mail delivery of measurement reports.
use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentType, ContentTypeErr},
        Attachment, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::{
    report::{email_body, PDF_ATTACHMENT_NAME},
    store::Measurement,
};

pub const SUBJECT: &str = "Your Body Measurement Results";

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("invalid content type: {0}")]
    ContentType(#[from] ContentTypeErr),

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("{0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends a measurement report with its PDF attached.
#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report(
        &self,
        to: &str,
        name: &str,
        measurement: &Measurement,
        pdf: Vec<u8>,
    ) -> Result<(), MailError>;
}

/// Compose the report message.
pub fn build_message(
    from: &str,
    to: &str,
    name: &str,
    measurement: &Measurement,
    pdf: Vec<u8>,
) -> Result<Message, MailError> {
    let attachment = Attachment::new(PDF_ATTACHMENT_NAME.to_owned())
        .body(pdf, ContentType::parse("application/pdf")?);

    let message = Message::builder()
        .from(from.parse::<Mailbox>()?)
        .to(to.parse::<Mailbox>()?)
        .subject(SUBJECT)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(email_body(name, measurement)))
                .singlepart(attachment),
        )?;
    Ok(message)
}

/// Mailer logging into an SMTP server, upgrading to TLS when offered.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl SmtpMailer {
    pub fn new(server: &str, port: u16, sender: &str, password: &str) -> Result<Self, MailError> {
        let tls = TlsParameters::new(server.to_owned())?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
            .port(port)
            .tls(Tls::Opportunistic(tls))
            .credentials(Credentials::new(sender.to_owned(), password.to_owned()))
            .build();

        Ok(Self {
            transport,
            sender: sender.to_owned(),
        })
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send_report(
        &self,
        to: &str,
        name: &str,
        measurement: &Measurement,
        pdf: Vec<u8>,
    ) -> Result<(), MailError> {
        let message = build_message(&self.sender, to, name, measurement, pdf)?;
        log::info!("Sending measurement {} to {}", measurement.id, to);
        let response = self.transport.send(message).await?;
        log::debug!("SMTP server answered {:?}", response.code());
        Ok(())
    }
}
