use base64ct::{Base64, Encoding};

use crate::error::SendError;

/// A plain-text message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMessage {
    pub fn new(from: &str, to: &str, subject: &str, body: &str) -> Result<Self, SendError> {
        for (name, value) in [("from", from), ("to", to), ("subject", subject)] {
            if value.contains(['\r', '\n']) {
                return Err(SendError::InvalidMessage(format!(
                    "{name} header contains a line break"
                )));
            }
        }
        if to.trim().is_empty() {
            return Err(SendError::InvalidMessage("recipient is empty".into()));
        }
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        })
    }

    /// RFC 5322 rendering with CRLF line endings.
    pub fn to_rfc822(&self) -> String {
        let mut out = String::new();
        if !self.from.is_empty() {
            out.push_str(&format!("From: {}\r\n", self.from));
        }
        out.push_str(&format!("To: {}\r\n", self.to));
        out.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
        out.push_str("\r\n");
        out.push_str(&self.body.replace("\r\n", "\n").replace('\n', "\r\n"));
        out
    }
}

fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", Base64::encode_string(value.as_bytes()))
    }
}
