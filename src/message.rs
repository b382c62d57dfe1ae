// src/message.rs

use eyre::{eyre, Result};
use log::debug;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

/// A file attached to a message, decoded from its transfer encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub payload: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: &str, payload: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            payload: payload.to_vec(),
        }
    }

    /// Lowercased text after the last dot, if the filename has one.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    /// IMAP UID; the handle used when marking the message consumed.
    pub uid: u32,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub subject: String,
    /// Raw `Date:` header, or the server's INTERNALDATE when that is missing.
    pub date: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Create a bare message; thread headers and attachments are added with the builders.
    pub fn new(uid: u32, subject: &str, date: &str, html: &str) -> Self {
        Message {
            uid,
            message_id: None,
            in_reply_to: None,
            references: Vec::new(),
            subject: subject.to_string(),
            date: date.to_string(),
            html: html.to_string(),
            attachments: Vec::new(),
        }
    }

    pub fn with_message_id(mut self, message_id: &str) -> Self {
        self.message_id = Some(message_id.to_string());
        self
    }

    pub fn with_in_reply_to(mut self, in_reply_to: &str) -> Self {
        self.in_reply_to = Some(in_reply_to.to_string());
        self
    }

    pub fn with_references(mut self, refs: &[&str]) -> Self {
        self.references = refs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_attachment(mut self, filename: &str, payload: &[u8]) -> Self {
        self.attachments.push(Attachment::new(filename, payload));
        self
    }

    /// Parse a full RFC-822 message as returned by `BODY.PEEK[]`.
    pub fn from_rfc822(uid: u32, raw: &[u8], internal_date: Option<String>) -> Result<Self> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| eyre!("Failed to parse UID {}: {}", uid, e))?;

        let headers = &parsed.headers;
        let message_id = headers.get_first_value("Message-ID").and_then(|v| first_msg_id(&v));
        let in_reply_to = headers.get_first_value("In-Reply-To").and_then(|v| first_msg_id(&v));
        let references: Vec<String> = headers
            .get_first_value("References")
            .map(|refs| refs.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        let subject = headers.get_first_value("Subject").unwrap_or_default();
        let date = headers
            .get_first_value("Date")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .or(internal_date)
            .unwrap_or_default();

        let mut parts = BodyParts::default();
        collect_parts(&parsed, &mut parts)?;

        let html = match (parts.html, parts.text) {
            (Some(html), _) => html,
            (None, Some(text)) => format!("<pre>{}</pre>", escape_html(&text)),
            (None, None) => String::new(),
        };

        debug!(
            "Parsed UID {}: message_id={:?} in_reply_to={:?} references={} attachments={}",
            uid,
            message_id,
            in_reply_to,
            references.len(),
            parts.attachments.len()
        );

        Ok(Message {
            uid,
            message_id,
            in_reply_to,
            references,
            subject,
            date,
            html,
            attachments: parts.attachments,
        })
    }

    /// True when the message is a reply somewhere inside a thread.
    pub fn carries_references(&self) -> bool {
        !self.references.is_empty()
    }
}

#[derive(Default)]
struct BodyParts {
    html: Option<String>,
    text: Option<String>,
    attachments: Vec<Attachment>,
}

fn collect_parts(part: &ParsedMail, out: &mut BodyParts) -> Result<()> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, out)?;
        }
        return Ok(());
    }

    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned();

    let is_attachment = matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some();
    if is_attachment {
        let payload = part.get_body_raw()?;
        out.attachments.push(Attachment {
            filename: filename.unwrap_or_else(|| "attachment".to_string()),
            payload,
        });
        return Ok(());
    }

    match part.ctype.mimetype.as_str() {
        "text/html" if out.html.is_none() => out.html = Some(part.get_body()?),
        "text/plain" if out.text.is_none() => out.text = Some(part.get_body()?),
        _ => {}
    }
    Ok(())
}

/// `In-Reply-To` may carry comments or several ids; keep the first `<...>` token.
fn first_msg_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let (Some(start), Some(end)) = (raw.find('<'), raw.find('>')) {
        if start < end {
            return Some(raw[start..=end].to_string());
        }
    }
    raw.split_whitespace().next().map(String::from)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
