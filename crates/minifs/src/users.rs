//! In-memory credentials table, persisted as a regular file
//! (`/etc/passwd`) inside the very file system it describes rather than
//! as external state.

use std::collections::HashMap;

use log::warn;

use crate::descriptor::OpenFlags;
use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
    pub uid: u32,
    pub gid: u32,
}

pub(crate) struct UserManager {
    by_name: HashMap<String, User>,
    by_uid: HashMap<u32, String>,
    current: Option<String>,
}

impl UserManager {
    pub fn new() -> Self {
        let mut manager = Self {
            by_name: HashMap::new(),
            by_uid: HashMap::new(),
            current: None,
        };
        manager
            .add("root", "root", 0, 0)
            .expect("default root user always installs cleanly");
        manager
    }

    fn add(&mut self, username: &str, password: &str, uid: u32, gid: u32) -> FsResult<()> {
        if self.by_name.contains_key(username) {
            return Err(FsError::Exists);
        }
        if self.by_uid.contains_key(&uid) {
            return Err(FsError::Exists);
        }
        self.by_uid.insert(uid, username.to_string());
        self.by_name.insert(
            username.to_string(),
            User {
                username: username.to_string(),
                password: password.to_string(),
                uid,
                gid,
            },
        );
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> FsResult<()> {
        if self.current.is_some() {
            return Err(FsError::Busy);
        }
        let user = self.by_name.get(username).ok_or(FsError::NotFound)?;
        if user.password != password {
            return Err(FsError::Permission);
        }
        self.current = Some(username.to_string());
        Ok(())
    }

    fn logout(&mut self) -> FsResult<()> {
        if self.current.take().is_none() {
            return Err(FsError::InvalidArgument("no user is logged in".into()));
        }
        Ok(())
    }

    fn exists(&self, username: &str) -> bool {
        self.by_name.contains_key(username)
    }

    fn list(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.by_name.values().collect();
        users.sort_by(|a, b| a.uid.cmp(&b.uid));
        users
    }

    fn current_user(&self) -> Option<&User> {
        self.current.as_ref().and_then(|name| self.by_name.get(name))
    }

    /// Renders the table as `/etc/passwd` lines.
    pub fn serialize(&self) -> String {
        let mut users: Vec<&User> = self.by_name.values().collect();
        users.sort_by(|a, b| a.uid.cmp(&b.uid));
        users
            .iter()
            .map(|u| format!("{}:{}:{}:{}\n", u.username, u.password, u.uid, u.gid))
            .collect()
    }

    /// Replaces the table with what `data` describes, tolerating empty
    /// lines and skipping malformed ones with a diagnostic. Ensures
    /// `root:root:0:0` exists once parsing is done.
    pub fn load_from_str(&mut self, data: &str) {
        self.by_name.clear();
        self.by_uid.clear();
        self.current = None;

        for line in data.lines() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.splitn(4, ':').collect();
            let [username, password, uid, gid] = fields[..] else {
                warn!("skipping malformed /etc/passwd line: {line:?}");
                continue;
            };
            let (Ok(uid), Ok(gid)) = (uid.parse::<u32>(), gid.parse::<u32>()) else {
                warn!("skipping malformed /etc/passwd line: {line:?}");
                continue;
            };
            if self.add(username, password, uid, gid).is_err() {
                warn!("skipping duplicate user in /etc/passwd: {username:?}");
            }
        }

        if !self.exists("root") {
            let _ = self.add("root", "root", 0, 0);
        }
    }
}

const ETC_DIR: &str = "etc";
const PASSWD_FILE: &str = "passwd";

impl FileSystem {
    pub fn add_user(&mut self, username: &str, password: &str, uid: u32, gid: u32) -> FsResult<()> {
        self.users.add(username, password, uid, gid)
    }

    pub fn login(&mut self, username: &str, password: &str) -> FsResult<()> {
        self.users.login(username, password)
    }

    pub fn logout(&mut self) -> FsResult<()> {
        self.users.logout()
    }

    pub fn user_exists(&self, username: &str) -> bool {
        self.users.exists(username)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.users.list().into_iter().cloned().collect()
    }

    pub fn is_logged_in(&self) -> bool {
        self.users.current.is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.users.current_user().cloned()
    }

    fn etc_inum(&mut self, create_if_missing: bool) -> FsResult<u32> {
        match self.lookup_in_dir(crate::layout::ROOT_INUM, ETC_DIR) {
            Ok(inum) => Ok(inum),
            Err(FsError::NotFound) if create_if_missing => {
                self.mkdir(crate::layout::ROOT_INUM, ETC_DIR)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the credentials table to `/etc/passwd`, creating `/etc`
    /// and/or the file if either is missing.
    pub fn save_passwd(&mut self) -> FsResult<()> {
        let etc = self.etc_inum(true)?;
        // `create` always yields a zero-length file; recreate so a
        // shorter table fully overwrites a longer one instead of leaving
        // a stale tail behind.
        if self.lookup_in_dir(etc, PASSWD_FILE).is_ok() {
            self.unlink(etc, PASSWD_FILE)?;
        }
        let data = self.users.serialize();
        let fd = self.open(etc, PASSWD_FILE, OpenFlags::RDWR | OpenFlags::CREATE)?;
        let bytes = data.as_bytes();
        self.write(fd, bytes, bytes.len())?;
        self.close(fd)?;
        Ok(())
    }

    /// Rebuilds the credentials table from `/etc/passwd`, if present.
    /// Leaves the table at its freshly-constructed default (root only) if
    /// the file does not exist, matching a brand-new image.
    pub fn load_passwd(&mut self) {
        let Ok(etc) = self.etc_inum(false) else {
            return;
        };
        let Ok(fd) = self.open(etc, PASSWD_FILE, OpenFlags::RDONLY) else {
            return;
        };
        let mut buf = vec![0u8; crate::layout::MAX_FILE_SIZE as usize];
        let n = self.read(fd, &mut buf, buf.len()).unwrap_or(0);
        let _ = self.close(fd);
        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
        self.users.load_from_str(&text);
    }
}
