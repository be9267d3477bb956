//! Playlist rendering and atomic file replacement
//!
//! Every entry carries the HTTP identity twice: once as `#EXTVLCOPT` lines
//! for VLC and once appended to the URL (`|User-Agent=..&Referer=..`) for
//! players that read Kodi-style header suffixes.

use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::HttpIdentityConfig;
use crate::errors::AppResult;
use crate::models::PlaylistEntry;

#[cfg(unix)]
const PLAYLIST_MODE: u32 = 0o644;

/// What happened to the playlist file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { path: PathBuf, entries: usize },
    /// No entries; an older playlist was deleted
    Removed { path: PathBuf },
    /// No entries and no older playlist
    Untouched,
}

/// Render the complete playlist text for `entries`
pub fn render_playlist(entries: &[PlaylistEntry], user_agent: &str, referer: &str) -> String {
    let mut out = String::from("#EXTM3U\n");
    for entry in entries {
        out.push_str(&format!(
            "\n#EXTINF:-1, {name}\n\
             #EXTVLCOPT:http-user-agent={ua}\n\
             #EXTVLCOPT:http-referrer={referer}\n\
             {url}|User-Agent={ua}&Referer={referer}\n",
            name = entry.channel.display_name(),
            ua = user_agent,
            referer = referer,
            url = entry.url(),
        ));
    }
    out
}

pub struct PlaylistWriter {
    path: PathBuf,
    user_agent: String,
    referer: String,
}

impl PlaylistWriter {
    pub fn new(path: impl Into<PathBuf>, identity: &HttpIdentityConfig) -> Self {
        Self {
            path: path.into(),
            user_agent: identity.user_agent.clone(),
            referer: identity.referer.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the playlist with `entries`.
    ///
    /// The text goes to a temporary file in the target directory which is
    /// then renamed over the target, so readers see either the old or the
    /// new playlist. An empty list removes the file instead.
    pub fn write(&self, entries: &[PlaylistEntry]) -> AppResult<WriteOutcome> {
        if entries.is_empty() {
            info!("No live channels; not writing {}", self.path.display());
            return Ok(if self.remove_stale()? {
                WriteOutcome::Removed { path: self.path.clone() }
            } else {
                WriteOutcome::Untouched
            });
        }

        let contents = render_playlist(entries, &self.user_agent, &self.referer);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(contents.as_bytes())?;
        // Temp files start out owner-only; players and web servers must read it.
        #[cfg(unix)]
        {
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(PLAYLIST_MODE))?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        info!("Saved {} channels to {}", entries.len(), self.path.display());
        Ok(WriteOutcome::Written {
            path: self.path.clone(),
            entries: entries.len(),
        })
    }

    /// Delete a playlist left by an earlier run. Returns whether one existed.
    pub fn remove_stale(&self) -> AppResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed stale playlist {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
