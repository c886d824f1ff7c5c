//! Outbound email: transport trait, concrete senders and message templates.

use anyhow::Result;
use async_trait::async_trait;
use bucket_types::api::ErrorReport;
use resend_rs::{Resend, types::CreateEmailBaseOptions};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// Development transport: writes each message to the log instead of sending it.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "Email (log transport)\n{}", email.html_body);
        Ok(())
    }
}

/// Sends through Resend.
pub struct ResendEmailSender {
    client: Resend,
    from: String,
}

impl ResendEmailSender {
    pub fn new(api_key: &str, from: String) -> Self {
        Self {
            client: Resend::new(api_key),
            from,
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message =
            CreateEmailBaseOptions::new(&self.from, [email.to.as_str()], &email.subject)
                .with_html(&email.html_body);

        if let Err(e) = self.client.emails.send(message).await {
            warn!("Resend rejected message to {}: {}", email.to, e);
            return Err(e.into());
        }
        Ok(())
    }
}

// -- Templates --

pub fn otp_email(to: &str, code: &str) -> OutgoingEmail {
    let content = format!(
        "<p>Hello,</p>\
         <p>Please use the following 6-digit code to verify your Bucket account.</p>\
         <h2 style=\"font-size: 32px; letter-spacing: 4px; color: #1a74e4; text-align: center; margin: 30px 0;\">{}</h2>\
         <p>This code will expire in 15 minutes.</p>",
        escape_html(code)
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Your Bucket Verification Code".into(),
        html_body: layout("Your Verification Code", &content),
    }
}

pub fn magic_link_email(to: &str, link: &str) -> OutgoingEmail {
    let link = escape_html(link);
    let content = format!(
        "<p>Hello,</p>\
         <p>Click the button below to sign in to Bucket. This link expires in 60 minutes.</p>\
         <p style=\"text-align: center; margin: 30px 0;\">\
         <a href=\"{link}\" style=\"background: #1a74e4; color: #ffffff; padding: 12px 24px; border-radius: 6px; text-decoration: none;\">Sign in to Bucket</a></p>\
         <p style=\"font-size: 12px; color: #6b7280;\">If the button does not work, paste this URL into your browser:<br>{link}</p>"
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Your Bucket sign-in link".into(),
        html_body: layout("Sign in to Bucket", &content),
    }
}

/// Crash report for an administrator. All report fields are caller-controlled.
pub fn crash_report_email(to: &str, report: &ErrorReport) -> OutgoingEmail {
    let message = report.message.as_deref().unwrap_or("N/A");
    let digest = report.digest.as_deref().unwrap_or("N/A");
    let path = report.path.as_deref().unwrap_or("Unknown path");

    let mut content = format!(
        "<div style=\"background-color: #fef2f2; border: 1px solid #fee2e2; border-radius: 8px; padding: 16px; margin-bottom: 24px;\">\
         <h3 style=\"color: #991b1b; margin-top: 0;\">Unhandled Client Error</h3>\
         <p><strong>Message:</strong> <span style=\"font-family: monospace;\">{}</span></p>\
         <p><strong>Digest:</strong> <span style=\"font-family: monospace;\">{}</span></p>\
         <p><strong>Path:</strong> <span style=\"font-family: monospace;\">{}</span></p>\
         </div>",
        escape_html(message),
        escape_html(digest),
        escape_html(path)
    );
    if let Some(stack) = report.stack.as_deref() {
        content.push_str(&format!(
            "<h4>Stack Trace:</h4>\
             <pre style=\"background: #1f2937; color: #f3f4f6; padding: 16px; border-radius: 8px; font-size: 12px;\">{}</pre>",
            escape_html(stack)
        ));
    }

    let headline: String = match report.message.as_deref() {
        Some(m) => m.chars().take(50).collect(),
        None => digest.to_string(),
    };
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("[CRITICAL] Bucket Error Report: {}", headline),
        html_body: layout("High Severity Crash Report", &content),
    }
}

fn layout(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family: -apple-system, Segoe UI, sans-serif; color: #111827;\">\
         <div style=\"max-width: 560px; margin: 0 auto; padding: 24px;\">\
         <h1 style=\"font-size: 22px;\">{}</h1>{}\
         <p style=\"font-size: 12px; color: #9ca3af; margin-top: 32px;\">Bucket</p>\
         </div></body></html>",
        escape_html(title),
        content
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
