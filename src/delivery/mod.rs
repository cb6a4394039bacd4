//! One-shot transcript email delivery on meeting completion.

use crate::db::{MeetingRecord, MeetingStore};
use crate::mailer::{MailTransport, OutgoingMail};
use crate::transcript::TranscriptEntry;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a delivery call finished without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    AlreadySent,
    NoAddress,
    EmptyTranscript,
}

pub struct TranscriptDelivery {
    store: MeetingStore,
    mailer: Arc<dyn MailTransport>,
    from_address: String,
}

impl TranscriptDelivery {
    pub fn new(store: MeetingStore, mailer: Arc<dyn MailTransport>, from_address: String) -> Self {
        Self {
            store,
            mailer,
            from_address,
        }
    }

    /// Send the meeting's transcript to its configured address.
    ///
    /// The skip cases are normal control flow, each logged distinctly. A
    /// transport failure propagates and leaves `email_sent` false; there is
    /// no retry here.
    pub async fn deliver(&self, meeting: &MeetingRecord) -> Result<DeliveryOutcome> {
        if meeting.email_sent {
            debug!("Transcript for meeting {} already emailed", meeting.id);
            return Ok(DeliveryOutcome::AlreadySent);
        }

        let to = match meeting.transcript_email.as_deref() {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => {
                info!("No transcript email configured for meeting {}", meeting.id);
                return Ok(DeliveryOutcome::NoAddress);
            }
        };

        let entries = self.store.transcript(&meeting.id).await?.unwrap_or_default();
        if entries.is_empty() {
            info!(
                "Transcript for meeting {} is empty, nothing to send",
                meeting.id
            );
            return Ok(DeliveryOutcome::EmptyTranscript);
        }

        let mail = OutgoingMail {
            from: self.from_address.clone(),
            to: to.clone(),
            subject: subject_for(meeting),
            text: render_text(meeting, &entries),
            html: render_html(meeting, &entries),
        };

        let receipt = self.mailer.send(mail).await?;
        self.store.mark_email_sent(&meeting.id).await?;

        info!(
            "Transcript email for meeting {} sent to {} ({} entries, receipt {:?})",
            meeting.id,
            to,
            entries.len(),
            receipt.message_id
        );
        Ok(DeliveryOutcome::Sent)
    }
}

fn subject_for(meeting: &MeetingRecord) -> String {
    match meeting.name.as_deref() {
        Some(name) if !name.is_empty() => format!("Meeting transcript: {}", name),
        _ => "Meeting transcript".to_string(),
    }
}

/// Split an entry into its speaker tag and spoken text.
fn split_tag(content: &str) -> (Option<&str>, &str) {
    if let Some(rest) = content.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let name = rest[..end].trim();
            if !name.is_empty() {
                return (Some(name), rest[end + 1..].trim_start());
            }
        }
    }
    (None, content)
}

/// Consecutive lines from the same speaker, with repeated identical lines
/// collapsed (the realtime feed occasionally re-sends a finalized fragment).
fn group_entries(entries: &[TranscriptEntry]) -> Vec<(Option<String>, Vec<String>)> {
    let mut groups: Vec<(Option<String>, Vec<String>)> = Vec::new();
    for entry in entries {
        let (speaker, text) = split_tag(&entry.content);
        let speaker = speaker.map(|s| s.to_string());
        let text = text.to_string();

        match groups.last_mut() {
            Some((last_speaker, lines)) if *last_speaker == speaker => {
                if lines.last() != Some(&text) {
                    lines.push(text);
                }
            }
            _ => groups.push((speaker, vec![text])),
        }
    }
    groups
}

fn render_text(meeting: &MeetingRecord, entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    if let Some(name) = meeting.name.as_deref() {
        out.push_str(name);
        out.push('\n');
    }
    out.push_str(&format!("Recorded {} UTC\n\n", meeting.created_at));

    for (speaker, lines) in group_entries(entries) {
        match speaker {
            Some(name) => {
                out.push_str(&format!("{}:\n", name));
                for line in lines {
                    out.push_str(&format!("  {}\n", line));
                }
            }
            None => {
                for line in lines {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
        out.push('\n');
    }
    out
}

fn render_html(meeting: &MeetingRecord, entries: &[TranscriptEntry]) -> String {
    let title = meeting
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or("Meeting transcript");

    let mut body = String::new();
    for (speaker, lines) in group_entries(entries) {
        body.push_str("<p>");
        if let Some(name) = speaker {
            body.push_str(&format!("<strong>{}</strong><br>", escape_html(&name)));
        }
        let escaped: Vec<String> = lines.iter().map(|l| escape_html(l)).collect();
        body.push_str(&escaped.join("<br>"));
        body.push_str("</p>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html><body style=\"font-family: sans-serif; max-width: 640px; margin: 0 auto;\">\n\
         <h2>{}</h2>\n\
         <p style=\"color: #666;\">Recorded {} UTC</p>\n\
         {}\
         </body></html>",
        escape_html(title),
        escape_html(&meeting.created_at),
        body
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
