//! Emails sent to members and the ways of delivering them.

use anyhow::Context;
use askama::Template;
use async_trait::async_trait;
use mailgun_v3::email::{self as mailgun_email, Message, MessageBody};
use mailgun_v3::{Credentials, EmailAddress};

use crate::config::MailConfig;

pub mod activation;
pub mod reset_password;

/// An email template along with who it goes to.
pub trait Email: Template {
    fn subject(&self) -> String;
    fn recipient(&self) -> Recipient;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub address: String,
}

impl Recipient {
    /// The `Name <address>` form mail servers expect
    pub fn mailbox(&self) -> String {
        format!("{} <{}>", self.name.replace(['<', '>', '"'], ""), self.address)
    }
}

/// A rendered email, ready to be delivered
#[derive(Clone, Debug)]
pub struct OutgoingEmail {
    pub to: Recipient,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

pub async fn send_email(mailer: &dyn Mailer, email: impl Email) -> anyhow::Result<()> {
    let outgoing = OutgoingEmail {
        to: email.recipient(),
        subject: email.subject(),
        html: email.render().context("Failed to render email")?,
    };

    tracing::info!(to = %outgoing.to.address, subject = %outgoing.subject, "sending email");
    mailer.deliver(outgoing).await
}

/// Sends through Mailgun.
pub struct MailgunMailer {
    credentials: Credentials,
    sender: EmailAddress,
}

impl MailgunMailer {
    pub fn new(token: String, config: &MailConfig) -> Self {
        Self {
            credentials: Credentials::new(token, config.mailgun_domain.as_str()),
            sender: EmailAddress::name_address(
                config.from_name.clone(),
                config.from_address.clone(),
            ),
        }
    }
}

fn mailgun_message(email: OutgoingEmail) -> Message {
    Message {
        to: vec![EmailAddress::name_address(email.to.name, email.to.address)],
        subject: email.subject,
        body: MessageBody::Html(email.html),
        ..Default::default()
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    async fn deliver(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let message = mailgun_message(email);
        mailgun_email::async_impl::send_email(&self.credentials, &self.sender, message)
            .await
            .map(|_| ())
            .map_err(|error| anyhow::anyhow!("Mailgun refused the email: {error}"))
    }
}

/// Writes emails to the log instead of sending them, for development setups
/// without a Mailgun account.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        tracing::warn!(
            to = %email.to.mailbox(),
            subject = %email.subject,
            body = %email.html,
            "no Mailgun token configured, email not sent"
        );
        Ok(())
    }
}

/// Picks Mailgun when it is configured and the log otherwise.
pub fn mailer_from_config(config: &MailConfig) -> Box<dyn Mailer> {
    match &config.mailgun_token {
        Some(token) => Box::new(MailgunMailer::new(token.clone(), config)),
        None => Box::new(LogMailer),
    }
}
