// src/utils.rs

use crate::message::Attachment;

/// Substitutions applied, in order, to `{subject}--{timestamp}`.
/// `"Re: "` goes first; once spaces are rewritten it could never match.
const FILENAME_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("Re: ", ""),
    (" ", "_"),
    ("/", "-"),
    ("!", ""),
    ("?", ""),
    ("@", "-"),
    (":", ""),
];

/// Filesystem-safe stem for a conversation's PDF, without the `.pdf` suffix.
pub fn format_filename(subject: &str, timestamp: &str) -> String {
    let mut filename = format!("{}--{}", subject, timestamp);
    for (from, to) in FILENAME_SUBSTITUTIONS {
        filename = filename.replace(from, to);
    }
    filename
}

/// True when the attachment's extension is in `allowed`, ignoring case.
pub fn extension_allowed(attachment: &Attachment, allowed: &[String]) -> bool {
    match attachment.extension() {
        Some(ext) => allowed.iter().any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext)),
        None => false,
    }
}
