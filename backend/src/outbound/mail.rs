//! SMTP adapter for account mail (activation, password reset) and mailed
//! reports.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, instrument};

use crate::domain::ports::{MailError, MailMessage, Mailer};
use crate::server::config::MailConfig;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|err| MailError::Compose(format!("invalid sender address: {err}")))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|err| MailError::Transport(err.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.login.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { transport, from })
    }

    fn compose(&self, message: &MailMessage) -> Result<Message, MailError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|err| MailError::Compose(format!("invalid recipient address: {err}")))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject);
        let built = match &message.attachment {
            Some((file_name, payload)) => {
                let content_type = ContentType::parse("application/pdf")
                    .map_err(|err| MailError::Compose(err.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(message.body.clone()))
                        .singlepart(
                            Attachment::new(file_name.clone()).body(payload.clone(), content_type),
                        ),
                )
            }
            None => builder.body(message.body.clone()),
        };
        built.map_err(|err| MailError::Compose(err.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let composed = self.compose(&message)?;
        self.transport
            .send(composed)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;
        info!("mail dispatched");
        Ok(())
    }
}
