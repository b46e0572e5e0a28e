// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Flat-file persistence: one CSV file per model under the data
//! directory. Tables are fully cached in memory; every mutation
//! rewrites the backing file through the blocking pool.

mod models;
pub use models::*;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use packet::Privileges;
use smol::lock::Mutex;

/// Lowest id handed out to a registered account. 1 is the bot, 2 is
/// kept free.
pub const FIRST_USER_ID: i32 = 3;

pub trait Record: Clone + Send + Sync + 'static {
    const FILE_NAME: &'static str;

    fn from_row(row: &str) -> Result<Self>;
    fn to_row(&self) -> String;
}

pub struct Table<T: Record> {
    path: PathBuf,
    rows: Mutex<Vec<T>>,
}

impl<T: Record> Table<T> {
    pub async fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(T::FILE_NAME);
        let rows = match smol::fs::read_to_string(&path).await {
            Ok(contents) => contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(T::from_row)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("malformed row in {path:?}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                smol::fs::write(&path, "")
                    .await
                    .with_context(|| format!("cannot create {path:?}"))?;
                Vec::new()
            }
            Err(e) => return Err(e).with_context(|| format!("cannot read {path:?}")),
        };
        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub async fn all(&self) -> Vec<T> {
        self.rows.lock().await.clone()
    }

    pub async fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.lock().await.iter().find(|row| pred(row)).cloned()
    }

    pub async fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|row| pred(row))
            .cloned()
            .collect()
    }

    pub async fn insert(&self, row: T) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.push(row);
        self.persist(&rows).await
    }

    /// Replace the first row matching `pred`. Returns false when
    /// nothing matched.
    pub async fn update(&self, pred: impl Fn(&T) -> bool, row: T) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        let Some(slot) = rows.iter_mut().find(|r| pred(r)) else {
            return Ok(false);
        };
        *slot = row;
        self.persist(&rows).await?;
        Ok(true)
    }

    pub async fn upsert(&self, pred: impl Fn(&T) -> bool, row: T) -> Result<()> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|r| pred(r)) {
            Some(slot) => *slot = row,
            None => rows.push(row),
        }
        self.persist(&rows).await
    }

    pub async fn delete(&self, pred: impl Fn(&T) -> bool) -> Result<usize> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| !pred(row));
        let removed = before - rows.len();
        if removed > 0 {
            self.persist(&rows).await?;
        }
        Ok(removed)
    }

    async fn persist(&self, rows: &[T]) -> Result<()> {
        let mut out = String::new();
        for row in rows {
            out.push_str(&row.to_row());
            out.push('\n');
        }
        smol::fs::write(&self.path, out)
            .await
            .with_context(|| format!("cannot write {:?}", self.path))
    }
}

pub struct Store {
    pub users: Table<UserRow>,
    pub stats: Table<StatsRow>,
    pub relations: Table<RelationRow>,
    pub channels: Table<ChannelRow>,
}

impl Store {
    pub async fn open(dir: &Path) -> Result<Store> {
        smol::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("cannot create the data directory {dir:?}"))?;

        let store = Store {
            users: Table::open(dir).await?,
            stats: Table::open(dir).await?,
            relations: Table::open(dir).await?,
            channels: Table::open(dir).await?,
        };

        if store.channels.all().await.is_empty() {
            for channel in default_channels() {
                store.channels.insert(channel).await?;
            }
        }

        Ok(store)
    }

    pub async fn next_user_id(&self) -> i32 {
        self.users
            .all()
            .await
            .iter()
            .map(|user| user.user_id + 1)
            .max()
            .unwrap_or(FIRST_USER_ID)
            .max(FIRST_USER_ID)
    }
}

fn default_channels() -> Vec<ChannelRow> {
    vec![
        ChannelRow {
            name: "#osu".to_owned(),
            topic: "The main channel, where everything and nothing happens.".to_owned(),
            write_privs: Privileges::PLAYER.0,
            read_privs: Privileges::PLAYER.0,
            auto_join: true,
        },
        ChannelRow {
            name: "#announce".to_owned(),
            topic: "Stay up to date!".to_owned(),
            write_privs: Privileges::STAFF.0,
            read_privs: Privileges::PLAYER.0,
            auto_join: false,
        },
        ChannelRow {
            name: "#lobby".to_owned(),
            topic: "Find yourself a multiplayer match.".to_owned(),
            write_privs: Privileges::PLAYER.0,
            read_privs: Privileges::PLAYER.0,
            auto_join: false,
        },
    ]
}
