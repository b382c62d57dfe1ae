// src/imap_source.rs

use eyre::{eyre, Result};
use imap::types::NameAttribute;
use imap::Session;
use log::{debug, info};
use native_tls::TlsStream;
use std::net::TcpStream;

use crate::cfg::config::Credentials;
use crate::client_ops::{quote_imap, MessageSource, SearchFilter};
use crate::message::Message;

const IMAPS_PORT: u16 = 993;

/// Full message without touching `\Seen`.
const FETCH_QUERY: &str = "(UID INTERNALDATE BODY.PEEK[])";

/// `MessageSource` backed by a live Gmail IMAP session.
pub struct ImapSource {
    client: Session<TlsStream<TcpStream>>,
}

/// Connect over TLS and log in with a password or XOAUTH2.
pub fn connect(domain: &str, credentials: Credentials, debug: bool) -> Result<ImapSource> {
    info!("Connecting to {}:{}", domain, IMAPS_PORT);
    let tls = native_tls::TlsConnector::builder().build()?;
    let client = imap::connect((domain, IMAPS_PORT), domain, &tls)?;

    let mut session = match credentials {
        Credentials::Password { username, password } => client
            .login(&username, password.unsecure())
            .map_err(|(e, _)| eyre!("IMAP login failed for {}: {}", username, e))?,
        Credentials::OAuth2 { username, oauth2 } => {
            let auth = oauth2.authenticator(&username)?;
            client
                .authenticate("XOAUTH2", &auth)
                .map_err(|(e, _)| eyre!("XOAUTH2 authentication failed for {}: {}", username, e))?
        }
    };
    session.debug = debug;

    info!("✅ Logged in to {}", domain);
    Ok(ImapSource::new(session))
}

impl ImapSource {
    pub fn new(client: Session<TlsStream<TcpStream>>) -> Self {
        ImapSource { client }
    }

    fn fetch_uids(&mut self, uids: &[u32]) -> Result<Vec<Message>> {
        if uids.is_empty() {
            return Ok(vec![]);
        }

        let uid_set = join_uids(uids);
        debug!("UID FETCH {} {}", uid_set, FETCH_QUERY);
        let fetches = self.client.uid_fetch(&uid_set, FETCH_QUERY)?;
        debug!("FETCH returned {} records", fetches.len());

        let mut out = Vec::with_capacity(fetches.len());
        for fetch in fetches.iter() {
            let uid = fetch
                .uid
                .ok_or_else(|| eyre!("FETCH record for seq {} carried no UID", fetch.message))?;
            let raw = fetch
                .body()
                .ok_or_else(|| eyre!("FETCH for UID {} returned no body", uid))?;
            let internal_date = fetch.internal_date().map(|dt| dt.to_rfc3339());

            out.push(Message::from_rfc822(uid, raw, internal_date)?);
        }

        out.sort_by_key(|m| m.uid);
        Ok(out)
    }

    /// Gmail only accepts COPY into a label that already exists.
    fn ensure_label(&mut self, label: &str) -> Result<()> {
        let matches = self.client.list(Some(""), Some(&quote_imap(label)))?;
        if lists_exact(matches.iter().map(|n| n.name()), label) {
            debug!("Label '{}' already exists", label);
            return Ok(());
        }

        info!("🏷 Consumed label '{}' not found; creating it", label);
        self.client
            .create(label)
            .map_err(|e| eyre!("Failed to create label '{}': {}", label, e))
    }

    fn search_uids(&mut self, query: &str) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self.client.uid_search(query)?.into_iter().collect();
        uids.sort_unstable();
        debug!("UID SEARCH {} → {} hits", query, uids.len());
        Ok(uids)
    }
}

impl MessageSource for ImapSource {
    fn list_folders(&mut self, parent: &str) -> Result<Vec<String>> {
        let names = self.client.list(Some(parent), Some("*"))?;
        // "Receipts*" also matches siblings like "ReceiptsOld"
        let folders: Vec<String> = names
            .iter()
            .filter(|n| !n.attributes().contains(&NameAttribute::NoSelect))
            .filter(|n| {
                let delimiter = n.delimiter().unwrap_or("/");
                n.name() == parent || n.name().starts_with(&format!("{}{}", parent, delimiter))
            })
            .map(|n| n.name().to_string())
            .collect();

        if folders.is_empty() {
            return Err(eyre!("No selectable folder matches '{}'", parent));
        }
        debug!("Folders under '{}': {:?}", parent, folders);
        Ok(folders)
    }

    fn select(&mut self, folder: &str) -> Result<()> {
        let mailbox = self
            .client
            .select(folder)
            .map_err(|e| eyre!("Failed to select '{}': {}", folder, e))?;
        debug!("Selected '{}' ({} messages)", folder, mailbox.exists);
        Ok(())
    }

    fn search(&mut self, filter: &SearchFilter) -> Result<Vec<Message>> {
        let uids = self.search_uids(&filter.to_imap_query())?;
        self.fetch_uids(&uids)
    }

    fn fetch_by_header(&mut self, field: &str, value: &str) -> Result<Vec<Message>> {
        let query = format!("HEADER {} {}", quote_imap(field), quote_imap(value));
        let uids = self.search_uids(&query)?;
        self.fetch_uids(&uids)
    }

    fn copy(&mut self, uids: &[u32], label: &str) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        self.ensure_label(label)?;
        self.client
            .uid_copy(join_uids(uids), label)
            .map_err(|e| eyre!("Failed to COPY {} messages → '{}': {:?}", uids.len(), label, e))
    }

    fn logout(&mut self) -> Result<()> {
        info!("Logging out from IMAP");
        self.client.logout()?;
        Ok(())
    }
}

/// LIST patterns treat `%` and `*` as wildcards, so only an exact name counts.
fn lists_exact<'a>(mut names: impl Iterator<Item = &'a str>, label: &str) -> bool {
    names.any(|name| name == label)
}

fn join_uids(uids: &[u32]) -> String {
    uids.iter().map(|u| u.to_string()).collect::<Vec<_>>().join(",")
}
