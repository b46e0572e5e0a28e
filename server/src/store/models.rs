// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use anyhow::{bail, Context, Result};
use packet::Mode;

use super::Record;

/// Quote a field that contains the delimiter or a quote, doubling any
/// embedded quotes. The store is line-oriented, so line breaks are
/// flattened to spaces.
fn escape(field: &str) -> String {
    let mut field = field.to_owned();
    if field.contains(['\n', '\r']) {
        field = field.replace(['\n', '\r'], " ");
    }
    if field.contains([',', '"']) {
        field = format!("\"{}\"", field.replace('"', "\"\""));
    }
    field
}

/// Split one row into fields, honouring quoted fields and doubled
/// quotes. The inverse of [`escape`].
fn split_row(row: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = row.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c != '"' {
                field.push(c);
            } else if chars.peek() == Some(&'"') {
                chars.next();
                field.push('"');
            } else {
                in_quotes = false;
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' if field.is_empty() => in_quotes = true,
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        bail!("unterminated quoted field in row {row:?}");
    }
    fields.push(field);
    Ok(fields)
}

fn next_field(fields: &mut std::vec::IntoIter<String>, name: &str) -> Result<String> {
    fields.next().with_context(|| format!("missing field {name}"))
}

fn parse<T: std::str::FromStr>(value: &str, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("malformed field {name}: {value:?}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub user_id: i32,
    pub username: String,
    pub username_safe: String,
    pub password_md5: String,
    pub email: String,
    pub privileges: u32,
    pub country: String,
    pub silence_end: u64,
    pub latest_activity: u64,
}

impl Record for UserRow {
    const FILE_NAME: &'static str = "users.csv";

    fn from_row(row: &str) -> Result<Self> {
        let mut fields = split_row(row)?.into_iter();
        let row = Self {
            user_id: parse(&next_field(&mut fields, "user_id")?, "user_id")?,
            username: next_field(&mut fields, "username")?,
            username_safe: next_field(&mut fields, "username_safe")?,
            password_md5: next_field(&mut fields, "password_md5")?,
            email: next_field(&mut fields, "email")?,
            privileges: parse(&next_field(&mut fields, "privileges")?, "privileges")?,
            country: next_field(&mut fields, "country")?,
            silence_end: parse(&next_field(&mut fields, "silence_end")?, "silence_end")?,
            latest_activity: parse(
                &next_field(&mut fields, "latest_activity")?,
                "latest_activity",
            )?,
        };
        Ok(row)
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.user_id,
            escape(&self.username),
            escape(&self.username_safe),
            escape(&self.password_md5),
            escape(&self.email),
            self.privileges,
            escape(&self.country),
            self.silence_end,
            self.latest_activity,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub user_id: i32,
    pub mode: Mode,
    pub ranked_score: u64,
    pub total_score: u64,
    pub pp: u32,
    /// Percentage, 0.0 to 100.0.
    pub accuracy: f32,
    pub playcount: u32,
    pub playtime: u32,
    pub max_combo: u32,
    pub total_hits: u32,
}

impl StatsRow {
    pub fn zeroed(user_id: i32, mode: Mode) -> Self {
        Self {
            user_id,
            mode,
            ranked_score: 0,
            total_score: 0,
            pp: 0,
            accuracy: 0.0,
            playcount: 0,
            playtime: 0,
            max_combo: 0,
            total_hits: 0,
        }
    }
}

impl Record for StatsRow {
    const FILE_NAME: &'static str = "stats.csv";

    fn from_row(row: &str) -> Result<Self> {
        let mut fields = split_row(row)?.into_iter();
        let row = Self {
            user_id: parse(&next_field(&mut fields, "user_id")?, "user_id")?,
            mode: Mode::try_from(parse::<u8>(&next_field(&mut fields, "mode")?, "mode")?)
                .context("mode out of range")?,
            ranked_score: parse(&next_field(&mut fields, "ranked_score")?, "ranked_score")?,
            total_score: parse(&next_field(&mut fields, "total_score")?, "total_score")?,
            pp: parse(&next_field(&mut fields, "pp")?, "pp")?,
            accuracy: parse(&next_field(&mut fields, "accuracy")?, "accuracy")?,
            playcount: parse(&next_field(&mut fields, "playcount")?, "playcount")?,
            playtime: parse(&next_field(&mut fields, "playtime")?, "playtime")?,
            max_combo: parse(&next_field(&mut fields, "max_combo")?, "max_combo")?,
            total_hits: parse(&next_field(&mut fields, "total_hits")?, "total_hits")?,
        };
        Ok(row)
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.user_id,
            u8::from(self.mode),
            self.ranked_score,
            self.total_score,
            self.pp,
            self.accuracy,
            self.playcount,
            self.playtime,
            self.max_combo,
            self.total_hits,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Friend,
    Block,
}

impl RelationKind {
    fn as_str(self) -> &'static str {
        match self {
            RelationKind::Friend => "friend",
            RelationKind::Block => "block",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationRow {
    pub user_id: i32,
    pub friend_id: i32,
    pub kind: RelationKind,
    pub since: u64,
}

impl Record for RelationRow {
    const FILE_NAME: &'static str = "relationships.csv";

    fn from_row(row: &str) -> Result<Self> {
        let mut fields = split_row(row)?.into_iter();
        let user_id = parse(&next_field(&mut fields, "user_id")?, "user_id")?;
        let friend_id = parse(&next_field(&mut fields, "friend_id")?, "friend_id")?;
        let kind = match next_field(&mut fields, "kind")?.as_str() {
            "friend" => RelationKind::Friend,
            "block" => RelationKind::Block,
            other => bail!("unknown relation kind {other:?}"),
        };
        let since = parse(&next_field(&mut fields, "since")?, "since")?;
        Ok(Self {
            user_id,
            friend_id,
            kind,
            since,
        })
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.user_id,
            self.friend_id,
            self.kind.as_str(),
            self.since
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRow {
    pub name: String,
    pub topic: String,
    pub write_privs: u32,
    pub read_privs: u32,
    pub auto_join: bool,
}

impl Record for ChannelRow {
    const FILE_NAME: &'static str = "channels.csv";

    fn from_row(row: &str) -> Result<Self> {
        let mut fields = split_row(row)?.into_iter();
        let row = Self {
            name: next_field(&mut fields, "name")?,
            topic: next_field(&mut fields, "topic")?,
            write_privs: parse(&next_field(&mut fields, "write_privs")?, "write_privs")?,
            read_privs: parse(&next_field(&mut fields, "read_privs")?, "read_privs")?,
            auto_join: parse(&next_field(&mut fields, "auto_join")?, "auto_join")?,
        };
        Ok(row)
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            escape(&self.name),
            escape(&self.topic),
            self.write_privs,
            self.read_privs,
            self.auto_join
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_row_roundtrip() {
        let row = UserRow {
            user_id: 3,
            username: "Alice B".to_owned(),
            username_safe: "alice_b".to_owned(),
            password_md5: "5f4dcc3b5aa765d61d8327deb882cf99".to_owned(),
            email: String::new(),
            privileges: 5,
            country: "pl".to_owned(),
            silence_end: 0,
            latest_activity: 1700000000,
        };
        assert_eq!(UserRow::from_row(&row.to_row()).unwrap(), row);
    }

    #[test]
    fn relation_row_roundtrip() {
        let row = RelationRow {
            user_id: 3,
            friend_id: 4,
            kind: RelationKind::Block,
            since: 1700000000,
        };
        assert_eq!(RelationRow::from_row(&row.to_row()).unwrap(), row);
    }

    #[test]
    fn commas_in_fields_are_quoted() {
        let row = UserRow {
            user_id: 3,
            username: "Miss, Comma".to_owned(),
            username_safe: "miss,_comma".to_owned(),
            password_md5: "5f4dcc3b5aa765d61d8327deb882cf99".to_owned(),
            email: String::new(),
            privileges: 5,
            country: "pl".to_owned(),
            silence_end: 0,
            latest_activity: 1700000000,
        };
        let encoded = row.to_row();
        assert!(encoded.contains("\"Miss, Comma\""));
        assert_eq!(UserRow::from_row(&encoded).unwrap(), row);
    }

    #[test]
    fn quotes_in_fields_are_doubled() {
        let row = ChannelRow {
            name: "#osu".to_owned(),
            topic: "The main channel, where \"everything\" and nothing happens.".to_owned(),
            write_privs: 1,
            read_privs: 1,
            auto_join: true,
        };
        assert_eq!(ChannelRow::from_row(&row.to_row()).unwrap(), row);
    }

    #[test]
    fn line_breaks_are_flattened() {
        let mut row = ChannelRow {
            name: "#osu".to_owned(),
            topic: "one\ntwo".to_owned(),
            write_privs: 1,
            read_privs: 1,
            auto_join: false,
        };
        let decoded = ChannelRow::from_row(&row.to_row()).unwrap();
        row.topic = "one two".to_owned();
        assert_eq!(decoded, row);
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(UserRow::from_row("3,alice").is_err());
        assert!(RelationRow::from_row("3,4,enemy,0").is_err());
        assert!(StatsRow::from_row("3,9,0,0,0,0,0,0,0,0").is_err());
        assert!(UserRow::from_row("3,\"unterminated,md5,,5,pl,0,0").is_err());
    }
}
