//! Raw MIME message builder
//!
//! Produces a `multipart/mixed` message whose first part is a
//! `multipart/alternative` text/HTML body and whose second part is the report
//! attachment. Text parts and the attachment are base64 encoded, lines end in
//! CRLF.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

const CRLF: &str = "\r\n";
const BASE64_LINE_LEN: usize = 76;

/// File attached to the message
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// An outgoing email with text and HTML alternatives plus one attachment
#[derive(Debug, Clone)]
pub struct ReportMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub attachment: Attachment,
}

impl ReportMessage {
    /// Render the message as raw MIME bytes
    pub fn to_mime(&self) -> Vec<u8> {
        let mixed = format!("mixed-{}", Uuid::new_v4().simple());
        let alternative = format!("alt-{}", Uuid::new_v4().simple());
        let mut out = String::new();

        push_line(&mut out, &format!("From: {}", self.sender));
        push_line(&mut out, &format!("To: {}", self.recipients.join(", ")));
        push_line(&mut out, &format!("Subject: {}", encode_header(&self.subject)));
        push_line(&mut out, "MIME-Version: 1.0");
        push_line(
            &mut out,
            &format!("Content-Type: multipart/mixed; boundary=\"{}\"", mixed),
        );
        push_line(&mut out, "");

        push_line(&mut out, &format!("--{}", mixed));
        push_line(
            &mut out,
            &format!(
                "Content-Type: multipart/alternative; boundary=\"{}\"",
                alternative
            ),
        );
        push_line(&mut out, "");

        for (subtype, body) in [("plain", &self.body_text), ("html", &self.body_html)] {
            push_line(&mut out, &format!("--{}", alternative));
            push_line(
                &mut out,
                &format!("Content-Type: text/{}; charset=\"utf-8\"", subtype),
            );
            push_line(&mut out, "Content-Transfer-Encoding: base64");
            push_line(&mut out, "");
            push_base64(&mut out, body.as_bytes());
        }
        push_line(&mut out, &format!("--{}--", alternative));
        push_line(&mut out, "");

        let filename = sanitize_filename(&self.attachment.filename);
        push_line(&mut out, &format!("--{}", mixed));
        push_line(
            &mut out,
            &format!("Content-Type: application/octet-stream; name=\"{}\"", filename),
        );
        push_line(
            &mut out,
            &format!("Content-Disposition: attachment; filename=\"{}\"", filename),
        );
        push_line(&mut out, "Content-Transfer-Encoding: base64");
        push_line(&mut out, "");
        push_base64(&mut out, &self.attachment.content);
        push_line(&mut out, &format!("--{}--", mixed));

        out.into_bytes()
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

fn push_base64(out: &mut String, data: &[u8]) {
    let encoded = STANDARD.encode(data);
    // base64 output is pure ASCII, so byte chunks are valid UTF-8
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_LEN) {
        push_line(out, &String::from_utf8_lossy(chunk));
    }
}

/// Make a file name safe for a quoted MIME header parameter
fn sanitize_filename(name: &str) -> String {
    name.replace(['"', '\\', '\r', '\n'], "_")
}

/// RFC 2047 encoded-word for non-ASCII header values
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}
