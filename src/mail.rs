/// Outgoing mail for the password reset flow
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use crate::config::MailConfig;
use crate::error::{AppError, AppResult};
use crate::models::User;

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// SMTP が設定されていればそれを使い、無ければ `.eml` ファイルとして書き出す。
pub struct Mailer {
    transport: Transport,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &MailConfig) -> anyhow::Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| anyhow::anyhow!("Invalid DEFAULT_FROM_EMAIL address: {}", e))?;

        let transport = match config.smtp_host {
            Some(ref host) => {
                let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| anyhow::anyhow!("Failed to configure SMTP transport: {}", e))?
                    .port(config.smtp_port);

                let builder = if let (Some(username), Some(password)) =
                    (&config.smtp_username, &config.smtp_password)
                {
                    builder.credentials(Credentials::new(username.to_string(), password.to_string()))
                } else {
                    builder
                };

                info!("Sending mail through SMTP relay {}:{}", host, config.smtp_port);
                Transport::Smtp(builder.build())
            }
            None => {
                std::fs::create_dir_all(&config.file_path).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to create mail directory {}: {}",
                        config.file_path.display(),
                        e
                    )
                })?;
                warn!(
                    "SMTP host not configured; writing mail to {}",
                    config.file_path.display()
                );
                Transport::File(AsyncFileTransport::<Tokio1Executor>::new(&config.file_path))
            }
        };

        Ok(Mailer { transport, from })
    }

    /// パスワード再設定リンクをユーザーに送る。メールアドレス未登録なら何もしない。
    pub async fn send_password_reset(&self, user: &User, link: &str) -> AppResult<()> {
        if user.email.trim().is_empty() {
            warn!("User {} has no email address, skipping password reset mail", user.id);
            return Ok(());
        }

        let subject = "Password reset on Yatube";
        let body = format!(
            "You're receiving this email because you requested a password reset for your user account at Yatube.\n\n\
             Please go to the following page and choose a new password:\n{}\n\n\
             Your username, in case you've forgotten: {}\n\n\
             The link can be used once and expires in 3 days.\n",
            link, user.username
        );

        self.send(&user.email, subject, body).await
    }

    async fn send(&self, recipient: &str, subject: &str, body: String) -> AppResult<()> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| AppError::validation(format!("Invalid recipient email address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build email message: {}", e)))?;

        match self.transport {
            Transport::Smtp(ref transport) => {
                transport
                    .send(email)
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to send email: {}", e)))?;
            }
            Transport::File(ref transport) => {
                transport
                    .send(email)
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to write email: {}", e)))?;
            }
        }

        info!(subject, "email sent successfully");
        Ok(())
    }
}
