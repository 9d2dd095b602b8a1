use crate::models::user::User;
use anyhow::{anyhow, bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// WAL operation types
#[derive(Debug, Clone, PartialEq)]
pub enum WalOperation {
    /// Full record after a create or update
    PutUser(User),
    RemoveUser { id: u32 },
}

// Text columns are hex encoded so '|' and newlines never break a line
fn encode_text(value: &str) -> String {
    hex::encode(value.as_bytes())
}

fn decode_text(part: &str, column: &str) -> Result<String> {
    let bytes = hex::decode(part).context(format!("Invalid {} hex", column))?;
    String::from_utf8(bytes).context(format!("{} is not valid UTF-8", column))
}

fn encode_timestamp(value: Option<i64>) -> String {
    match value {
        Some(ts) => ts.to_string(),
        None => "-".to_string(),
    }
}

fn decode_timestamp(part: &str, column: &str) -> Result<Option<i64>> {
    if part == "-" {
        return Ok(None);
    }
    part.parse::<i64>()
        .map(Some)
        .context(format!("Invalid {}", column))
}

impl WalOperation {
    fn encode(&self) -> Result<String> {
        match self {
            WalOperation::PutUser(user) => {
                let id = user
                    .user_id
                    .ok_or_else(|| anyhow!("Cannot journal a user without an id"))?;
                Ok(format!(
                    "PUT_USER|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                    id,
                    encode_text(&user.user_name),
                    encode_text(&user.password),
                    user.access_level,
                    encode_text(&user.email_address),
                    encode_text(&user.full_name),
                    encode_text(&user.affiliation),
                    encode_timestamp(user.date_created),
                    encode_timestamp(user.date_modified),
                ))
            }
            WalOperation::RemoveUser { id } => Ok(format!("REMOVE_USER|{}", id)),
        }
    }

    fn decode(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split('|').collect();

        match parts.first() {
            Some(&"PUT_USER") => {
                if parts.len() != 10 {
                    bail!("Invalid PUT_USER format");
                }
                let id = parts[1].parse::<u32>().context("Invalid user ID")?;
                let access_level = parts[4].parse::<i32>().context("Invalid access level")?;

                Ok(WalOperation::PutUser(User {
                    user_id: Some(id),
                    user_name: decode_text(parts[2], "userName")?,
                    password: decode_text(parts[3], "password")?,
                    access_level,
                    email_address: decode_text(parts[5], "emailAddress")?,
                    full_name: decode_text(parts[6], "fullName")?,
                    affiliation: decode_text(parts[7], "affiliation")?,
                    date_created: decode_timestamp(parts[8], "dateCreated")?,
                    date_modified: decode_timestamp(parts[9], "dateModified")?,
                }))
            }
            Some(&"REMOVE_USER") => {
                if parts.len() != 2 {
                    bail!("Invalid REMOVE_USER format");
                }
                let id = parts[1].parse::<u32>().context("Invalid user ID")?;

                Ok(WalOperation::RemoveUser { id })
            }
            _ => bail!("Unknown operation type"),
        }
    }
}

pub struct Wal {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl Wal {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open WAL file")?;

        Ok(Wal {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn log_operation(&self, op: WalOperation) -> Result<()> {
        let line = op.encode()?;
        let mut file = self.file.lock().map_err(|_| anyhow!("WAL lock poisoned"))?;
        writeln!(file, "{}", line).context("Failed to write to WAL")?;
        file.flush().context("Failed to flush WAL")?;
        Ok(())
    }

    pub fn replay(&self) -> Result<Vec<WalOperation>> {
        let file = File::open(&self.path).context("Failed to open WAL for replay")?;
        let reader = BufReader::new(file);
        let mut operations = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from WAL")?;
            let line = line.trim();

            // Skip empty lines
            if line.is_empty() {
                continue;
            }

            match WalOperation::decode(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse WAL line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }

    /// Replace the journal contents with the given operations
    ///
    /// The new contents are written to a sibling file and renamed over the
    /// journal, so a failure part way leaves the old journal in place.
    pub fn rewrite(&self, operations: &[WalOperation]) -> Result<()> {
        let lines = operations
            .iter()
            .map(WalOperation::encode)
            .collect::<Result<Vec<_>>>()?;

        let mut file = self.file.lock().map_err(|_| anyhow!("WAL lock poisoned"))?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let mut tmp = File::create(&tmp_path).context("Failed to create WAL rewrite file")?;
        for line in &lines {
            writeln!(tmp, "{}", line).context("Failed to write WAL rewrite file")?;
        }
        tmp.sync_all().context("Failed to sync WAL rewrite file")?;

        fs::rename(&tmp_path, &self.path).context("Failed to replace WAL")?;

        *file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to reopen WAL file")?;
        Ok(())
    }
}
