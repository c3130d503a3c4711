//! 邮件投递抽象与实现。
//!
//! 验证链接、密码重置链接、邮箱验证码以及订单通知都经由 [`Mailer`] 发出。
//! 投递在请求路径上同步等待，失败会作为错误冒泡给调用方，不做静默吞掉。

use async_trait::async_trait;
use reqwest::Url;
use skybook_core::{Booking, Flight};
use tracing::info;

const MESSAGE_STREAM: &str = "outbound";
const SERVER_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

/// 收件人（姓名用于称呼，地址用于投递）
#[derive(Debug, Clone)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// 邮件发送端抽象
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &Recipient, url: &str) -> anyhow::Result<()>;

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> anyhow::Result<()>;

    async fn send_two_factor_code(&self, to: &Recipient, code: &str) -> anyhow::Result<()>;

    async fn send_booking_confirmation(
        &self,
        to: &Recipient,
        booking: &Booking,
        flight: &Flight,
    ) -> anyhow::Result<()>;

    async fn send_booking_cancellation(
        &self,
        to: &Recipient,
        booking: &Booking,
        flight: &Flight,
    ) -> anyhow::Result<()>;
}

/// 通过 HTTP 邮件服务投递（Postmark 风格接口）
pub struct HttpMailer {
    http_client: reqwest::Client,
    base_url: String,
    server_token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(base_url: String, server_token: String, from: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            server_token,
            from,
        }
    }

    async fn deliver(&self, to: &Recipient, subject: &str, body: &str) -> anyhow::Result<()> {
        let base = Url::parse(&self.base_url)?;
        let url = base.join("/email")?;

        let request_body = SendEmailRequest {
            from: &self.from,
            to: &to.email,
            subject,
            html_body: body,
            text_body: body,
            message_stream: MESSAGE_STREAM,
        };

        self.http_client
            .post(url)
            .header(SERVER_TOKEN_HEADER, &self.server_token)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[derive(serde::Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification(&self, to: &Recipient, url: &str) -> anyhow::Result<()> {
        let body = format!(
            "Dear {},\n\nWelcome to Skybook! Please verify your email address to \
             complete your registration:\n\n{}\n\nThis verification link will expire \
             in 24 hours. If you didn't create an account, please ignore this email.",
            to.name, url
        );
        self.deliver(to, "Email Verification - Skybook", &body).await
    }

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> anyhow::Result<()> {
        let body = format!(
            "Dear {},\n\nWe received a request to reset your password. Open the link \
             below to choose a new one:\n\n{}\n\nThis link will expire in 10 minutes. \
             If you didn't request a password reset, please ignore this email.",
            to.name, url
        );
        self.deliver(to, "Password Reset - Skybook", &body).await
    }

    async fn send_two_factor_code(&self, to: &Recipient, code: &str) -> anyhow::Result<()> {
        let body = format!(
            "Dear {},\n\nYour two-factor authentication code is:\n\n{}\n\nThis code \
             will expire in 10 minutes. Never share it with anyone. If you didn't \
             request this code, change your password immediately.",
            to.name, code
        );
        self.deliver(to, "Two-Factor Authentication Code - Skybook", &body)
            .await
    }

    async fn send_booking_confirmation(
        &self,
        to: &Recipient,
        booking: &Booking,
        flight: &Flight,
    ) -> anyhow::Result<()> {
        let body = format!(
            "Dear {},\n\nYour flight booking has been confirmed.\n\nFlight {} ({}), \
             {} to {}, departing {}.\nBooking ID: {}\nPassengers: {}\nTotal amount: \
             {}\n\nThank you for choosing Skybook!",
            to.name,
            flight.flight_number,
            flight.airline,
            flight.origin,
            flight.destination,
            flight.departure_at,
            booking.id,
            booking.passengers.len(),
            booking.total_amount
        );
        self.deliver(to, "Booking Confirmation - Skybook", &body)
            .await
    }

    async fn send_booking_cancellation(
        &self,
        to: &Recipient,
        booking: &Booking,
        flight: &Flight,
    ) -> anyhow::Result<()> {
        let body = format!(
            "Dear {},\n\nYour booking {} on flight {} ({} to {}) has been cancelled.\n\
             Refund amount: {}. The refund process has been initiated and will be \
             completed within 5-7 business days.\n\nWe hope to serve you again soon!",
            to.name,
            booking.id,
            flight.flight_number,
            flight.origin,
            flight.destination,
            booking.total_amount
        );
        self.deliver(to, "Booking Cancellation - Skybook", &body)
            .await
    }
}

/// 本地开发用发送端：只打日志，不真正投递
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &Recipient, url: &str) -> anyhow::Result<()> {
        info!(to = %to.email, url = %url, "verification email send stub");
        Ok(())
    }

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> anyhow::Result<()> {
        info!(to = %to.email, url = %url, "password reset email send stub");
        Ok(())
    }

    async fn send_two_factor_code(&self, to: &Recipient, code: &str) -> anyhow::Result<()> {
        info!(to = %to.email, code = %code, "two-factor code email send stub");
        Ok(())
    }

    async fn send_booking_confirmation(
        &self,
        to: &Recipient,
        booking: &Booking,
        _flight: &Flight,
    ) -> anyhow::Result<()> {
        info!(to = %to.email, booking_id = %booking.id, "booking confirmation email send stub");
        Ok(())
    }

    async fn send_booking_cancellation(
        &self,
        to: &Recipient,
        booking: &Booking,
        _flight: &Flight,
    ) -> anyhow::Result<()> {
        info!(to = %to.email, booking_id = %booking.id, "booking cancellation email send stub");
        Ok(())
    }
}
